//! Hardware assembly: config mapping and the GPIO or simulated piston.

use std::sync::Arc;

use eyre::{Result, WrapErr};
use nanofloat_config::Config;
use nanofloat_core::{EdgeCounter, FilePositionStore, Missing, Piston, PistonBuilder};

/// Assembled controller plus whatever must stay alive while it runs.
pub struct Backend {
    pub piston: Piston,
    pub kind: &'static str,
    _keepalive: Keepalive,
}

#[allow(dead_code)]
enum Keepalive {
    Sim(nanofloat_hardware::PlantRunner),
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    Gpio(nanofloat_hardware::gpio::EncoderInterrupt),
}

fn core_builder(
    cfg: &Config,
    counter: Arc<EdgeCounter>,
) -> PistonBuilder<Missing, Missing, Missing> {
    Piston::builder()
        .with_motion((&cfg.motion).into())
        .with_safety((&cfg.motion).into())
        .with_persist((&cfg.storage).into())
        .with_edge_counter(counter)
}

pub fn open(cfg: &Config) -> Result<Backend> {
    let store = FilePositionStore::from(&cfg.storage);
    let counter = Arc::new(EdgeCounter::new());
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        open_gpio(cfg, store, counter)
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        open_sim(cfg, store, counter)
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_gpio(cfg: &Config, store: FilePositionStore, counter: Arc<EdgeCounter>) -> Result<Backend> {
    use nanofloat_hardware::gpio::{GpioLimitSwitch, GpioMotor, attach_encoder};

    let p = &cfg.pins;
    let motor = GpioMotor::new(p.motor_extend, p.motor_retract).wrap_err("open motor pins")?;
    let limit = GpioLimitSwitch::new(p.limit_in, p.limit_enable, cfg.limit.enabled)
        .wrap_err("open limit switch pins")?;
    let encoder = attach_encoder(p.encoder_a, counter.clone()).wrap_err("arm encoder interrupt")?;
    if let Some(b) = p.encoder_b {
        tracing::debug!(pin = b, "encoder phase B wired but not decoded");
    }
    let piston = core_builder(cfg, counter)
        .with_motor(motor)
        .with_limit_switch(limit)
        .with_store(store)
        .build()
        .wrap_err("assemble piston controller")?;
    Ok(Backend {
        piston,
        kind: "gpio",
        _keepalive: Keepalive::Gpio(encoder),
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_sim(cfg: &Config, mut store: FilePositionStore, counter: Arc<EdgeCounter>) -> Result<Backend> {
    use nanofloat_hardware::{SimPistonCfg, SimulatedPiston};
    use nanofloat_traits::{LimitSwitch, PositionStore};

    // The simulated piston starts wherever the last run left it.
    let start = store.load().unwrap_or(cfg.storage.default_position);
    let plant = SimulatedPiston::new(SimPistonCfg {
        ticks_per_sec: cfg.sim.ticks_per_sec,
        limit_at: cfg.sim.limit_at,
        start_position: start,
        ..SimPistonCfg::default()
    });
    plant.attach_encoder(counter.clone());
    if std::env::var_os("FLOAT_TEST_SIM_STALL").is_some() {
        tracing::warn!("simulated piston jammed (FLOAT_TEST_SIM_STALL)");
        plant.set_stalled(true);
    }
    let mut limit = plant.limit_switch();
    limit.set_enabled(cfg.limit.enabled);

    let piston = core_builder(cfg, counter)
        .with_motor(plant.motor())
        .with_limit_switch(limit)
        .with_store(store)
        .build()
        .wrap_err("assemble piston controller")?;
    let runner = plant.spawn(std::time::Duration::from_millis(1));
    tracing::info!(start, ticks_per_sec = cfg.sim.ticks_per_sec, "simulated piston running");
    Ok(Backend {
        piston,
        kind: "sim",
        _keepalive: Keepalive::Sim(runner),
    })
}
