//! Stop requests from outside the control loop.
//!
//! Any thread (signal handler, shell, test) may hold a `StopHandle`. The
//! control loop drains the channel once per poll, so a request is actioned
//! within one poll interval without any cancellation machinery.
//!
//! Each request is stamped with the current epoch. A command takes a ticket
//! (`arm`) when it is called and only honors requests stamped at or after
//! that ticket, so a stop sent while idle cannot abort a later move while a
//! stop sent during command setup is never lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel as xch;

/// Epoch at which a command started listening for stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StopTicket(u64);

#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: xch::Sender<u64>,
    // Used to evict a pending stamp; stamps only grow so the newest one wins.
    rx: xch::Receiver<u64>,
    epoch: Arc<AtomicU64>,
}

impl StopHandle {
    /// Ask the controller to stop the motor. Repeated requests coalesce.
    pub fn request(&self) {
        let stamp = self.epoch.load(Ordering::Acquire);
        if let Err(xch::TrySendError::Full(_)) = self.tx.try_send(stamp) {
            let _ = self.rx.try_recv();
            let _ = self.tx.try_send(stamp);
        }
    }

    /// Start a new epoch; requests made from now on carry the returned ticket
    /// or a later one.
    pub(crate) fn arm(&self) -> StopTicket {
        StopTicket(self.epoch.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

#[derive(Debug)]
pub(crate) struct StopSignal {
    handle: StopHandle,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = xch::bounded(1);
        Self {
            handle: StopHandle {
                tx,
                rx,
                epoch: Arc::new(AtomicU64::new(0)),
            },
        }
    }

    pub(crate) fn handle(&self) -> StopHandle {
        self.handle.clone()
    }

    pub(crate) fn arm(&self) -> StopTicket {
        self.handle.arm()
    }

    /// Drain pending requests; true if any was made at or after `ticket`.
    pub(crate) fn take_since(&self, ticket: StopTicket) -> bool {
        self.handle
            .rx
            .try_iter()
            .fold(false, |hit, stamp| hit | (stamp >= ticket.0))
    }

    /// Drain pending requests regardless of when they were made.
    pub(crate) fn clear(&self) {
        let _ = self.handle.rx.try_iter().count();
    }
}

#[cfg(test)]
mod tests {
    use super::StopSignal;

    #[test]
    fn requests_coalesce_and_drain() {
        let sig = StopSignal::new();
        let ticket = sig.arm();
        let h = sig.handle();
        assert!(!sig.take_since(ticket));
        h.request();
        h.clone().request();
        assert!(sig.take_since(ticket));
        assert!(!sig.take_since(ticket));
    }

    #[test]
    fn requests_before_the_ticket_are_ignored() {
        let sig = StopSignal::new();
        sig.handle().request();
        let ticket = sig.arm();
        assert!(!sig.take_since(ticket));
    }

    #[test]
    fn newer_request_replaces_a_stale_pending_one() {
        let sig = StopSignal::new();
        let h = sig.handle();
        h.request();
        let ticket = sig.arm();
        h.request();
        assert!(sig.take_since(ticket));
    }

    #[test]
    fn an_earlier_ticket_still_sees_later_requests() {
        let sig = StopSignal::new();
        let first = sig.arm();
        // A second caller arms while the first command still runs.
        let _second = sig.arm();
        sig.handle().request();
        assert!(sig.take_since(first));
    }
}
