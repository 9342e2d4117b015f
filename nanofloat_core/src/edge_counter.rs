//! Encoder edge tally shared between the interrupt and the control loop.
//!
//! The interrupt side only ever increments; the control loop drains with an
//! atomic swap, so an edge landing mid-drain shows up in the next drain instead
//! of being lost. Only one encoder phase is counted, so the tally has no sign:
//! the controller applies it in the direction it last commanded.

use nanofloat_traits::EdgeSink;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EdgeCounter {
    delta: AtomicU32,
    total: AtomicU64,
}

impl EdgeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one encoder edge. Lock-free; safe from interrupt context.
    #[inline]
    pub fn on_edge(&self) {
        self.delta.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Edges since the previous call, resetting the tally to zero.
    #[inline]
    pub fn take_delta(&self) -> u32 {
        self.delta.swap(0, Ordering::AcqRel)
    }

    /// Edges seen since the counter was created.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl EdgeSink for EdgeCounter {
    #[inline]
    fn on_edge(&self) {
        EdgeCounter::on_edge(self);
    }
}

#[cfg(test)]
mod tests {
    use super::EdgeCounter;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn take_delta_resets() {
        let c = EdgeCounter::new();
        for _ in 0..7 {
            c.on_edge();
        }
        assert_eq!(c.take_delta(), 7);
        assert_eq!(c.take_delta(), 0);
        assert_eq!(c.total(), 7);
    }

    #[test]
    fn no_edges_lost_while_draining_concurrently() {
        const EDGES: u64 = 200_000;
        let c = Arc::new(EdgeCounter::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let c = c.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                for _ in 0..EDGES {
                    c.on_edge();
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut drained: u64 = 0;
        while !done.load(Ordering::Acquire) {
            drained += u64::from(c.take_delta());
        }
        writer.join().unwrap();
        drained += u64::from(c.take_delta());

        assert_eq!(drained, EDGES);
        assert_eq!(c.total(), EDGES);
    }
}
