//! CLI argument definitions and shared statics.

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "nanofloat", version, about = "Nanofloat buoyancy piston control")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/nanofloat.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); default from
    /// [logging] level, then warn. RUST_LOG wins over both.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(flatten)]
    pub rt: RtArgs,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority, pins to a CPU, and calls mlockall to keep the poll loop out of page faults. Requires CAP_SYS_NICE / CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'. Failures are logged and the command continues without real-time settings."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority when --rt is enabled (clamped to the system range)
    #[arg(long, global = true, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt
    #[arg(long, global = true, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to when --rt is enabled (default 0)
    #[arg(long, global = true, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move the piston (rel|relative by N counts, abs|absolute to position N)
    Move {
        #[arg(long, value_name = "METHOD")]
        method: String,
        /// Counts (relative, may be negative) or target position (absolute)
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        amount: i64,
    },
    /// Print the persisted position and limit switch state
    Position,
    /// De-energize the motor and persist the position
    Stop,
    /// Clear a fault by re-homing against the limit switch
    ResetFault,
    /// Drive to the limit switch and adopt the configured home position
    Home,
    /// Declare the current position to be 0
    Zero,
    /// Energize or bypass the limit switch
    #[command(group(ArgGroup::new("switch").required(true).args(["enable", "disable"])))]
    Limit {
        #[arg(long, action = ArgAction::SetTrue)]
        enable: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        disable: bool,
    },
    /// Run a dive sequence (from [dive] config or a CSV plan)
    Dive {
        /// Dive plan CSV with headers 'position,hold_ms'
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,
        /// Override the number of cycles
        #[arg(long, value_name = "N")]
        cycles: Option<u32>,
    },
    /// Count encoder edges for a while without driving the motor
    EncoderTest {
        #[arg(long, value_name = "MS", default_value_t = 5_000)]
        ms: u64,
    },
    /// Quick health check (config, backend, storage, limit switch)
    SelfCheck,
    /// Interactive command shell on stdin
    Shell,
}
