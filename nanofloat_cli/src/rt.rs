//! Real-time scheduling for the poll loop (Linux SCHED_FIFO / affinity / mlockall).
//!
//! Every step is best effort: a failure is logged and the command carries on
//! with normal scheduling.

use crate::cli::RtArgs;
#[cfg(target_os = "linux")]
use crate::cli::RtLock;

#[cfg(target_os = "linux")]
pub fn setup_rt_once(args: &RtArgs) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !args.rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let lock = args.rt_lock.unwrap_or(RtLock::Current);
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "RT memory lock applied"),
            Err(e) => tracing::warn!(error = %e, "mlockall failed"),
        }
        match apply_fifo_priority(args.rt_prio) {
            Ok(prio) => tracing::info!(prio, "RT SCHED_FIFO applied"),
            Err(e) => tracing::warn!(error = %e, "SCHED_FIFO not applied"),
        }
        let cpu = args.rt_cpu.unwrap_or(0);
        match apply_affinity(cpu) {
            Ok(()) => tracing::info!(cpu, "RT affinity applied"),
            Err(e) => tracing::warn!(error = %e, cpu, "affinity not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(args: &RtArgs) {
    if args.rt {
        let _ = (args.rt_lock, args.rt_prio, args.rt_cpu);
        tracing::warn!("--rt is only supported on Linux; ignoring");
    }
}

#[cfg(target_os = "linux")]
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    fn lock_with(flags: libc::c_int) -> std::io::Result<()> {
        // SAFETY: mlockall takes no pointers; any flag combination is safe to pass.
        let rc = unsafe { mlockall(flags) };
        if rc != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    let result = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => lock_with(MCL_CURRENT),
        RtLock::All => lock_with(MCL_CURRENT | MCL_FUTURE),
    };
    let Err(err) = result else {
        return Ok(());
    };
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);
    if lock == RtLock::All && retryable && lock_with(MCL_CURRENT).is_ok() {
        tracing::warn!(error = %err, "mlockall(current|future) failed; locked current pages only");
        return Ok(());
    }
    let mut msg = format!("mlockall({lock:?}) failed: {err}");
    if retryable {
        msg.push_str("; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(target_os = "linux")]
fn apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    // SAFETY: plain queries on a valid policy constant.
    let (min, max) = unsafe {
        (
            sched_get_priority_min(SCHED_FIFO),
            sched_get_priority_max(SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let prio = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: prio,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling process.
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        eyre::bail!("sched_setscheduler(SCHED_FIFO, {prio}): {err}; needs CAP_SYS_NICE or root");
    }
    Ok(prio)
}

#[cfg(target_os = "linux")]
fn apply_affinity(cpu: usize) -> eyre::Result<()> {
    let capacity = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= capacity {
        eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {capacity}");
    }
    // SAFETY: cpu_set_t is plain data; the CPU_* helpers stay within its bounds
    // because `cpu` was checked against its capacity above.
    unsafe {
        let mut allowed: libc::cpu_set_t = std::mem::zeroed();
        if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed) != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        if !libc::CPU_ISSET(cpu, &allowed) {
            eyre::bail!("CPU {cpu} not permitted by the current affinity mask");
        }
        let mut desired: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut desired);
        libc::CPU_SET(cpu, &mut desired);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &desired) != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}
