//! Piston hardware backends: Raspberry Pi GPIO (feature `hardware`) and a
//! simulated plant for bench runs and tests.

pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use sim::{PlantRunner, SimPistonCfg, SimulatedLimitSwitch, SimulatedMotor, SimulatedPiston};
