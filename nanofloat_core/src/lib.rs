#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Piston motion control for the nanofloat buoyancy engine (hardware-agnostic).
//!
//! All hardware goes through the `nanofloat_traits` seams: `MotorDriver`,
//! `LimitSwitch`, `PositionStore`, and the `EdgeSink` the encoder interrupt
//! feeds. The GPIO and simulated implementations live in `nanofloat_hardware`.
//!
//! ## Architecture
//!
//! - **Edge counting**: lock-free tally drained by the control loop (`edge_counter`)
//! - **Control**: resolve target, drive, poll, stop (`MotionController`)
//! - **Safety**: limit switch on extend, stall and time-budget watchdogs, fault latch
//! - **Persistence**: position saved on every stop path with bounded retries (`store`)
//! - **Sharing**: try-lock front end that answers `Busy` (`shared`)
//! - **Dive**: repeated absolute moves with holds (`dive`)
//!
//! Positions are signed encoder counts; extending the piston increases them.

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod dive;
pub mod edge_counter;
pub mod error;
pub mod mocks;
pub mod request;
pub mod shared;
pub mod status;
pub mod stop;
pub mod store;

pub use builder::{Missing, Piston, PistonBuilder, Set, build_controller};
pub use config::{MotionCfg, PersistCfg, SafetyCfg};
pub use controller::MotionController;
pub use dive::{DiveLeg, DivePlan, DiveSummary, run_dive};
pub use edge_counter::EdgeCounter;
pub use error::{BuildError, MotionError};
pub use request::{MoveMethod, MoveRequest};
pub use shared::{SharedMotion, SharedPiston};
pub use status::{MotionState, MoveReport, Persistence, StatusView};
pub use stop::StopHandle;
pub use store::FilePositionStore;
