//! One-shot command execution and result printing.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::{Result, WrapErr};
use nanofloat_config::Config;
use nanofloat_core::{DiveLeg, DivePlan, MoveReport, Persistence, Piston, run_dive};
use serde_json::json;

use crate::cli::json_mode;

/// Set by the Ctrl-C handler alongside the controller stop request.
pub static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Print one result: a JSON line in `--json` mode, text otherwise.
pub fn emit(human: impl std::fmt::Display, value: serde_json::Value) {
    if json_mode() {
        println!("{value}");
    } else {
        println!("{human}");
    }
}

pub fn persistence_name(p: &Persistence) -> &'static str {
    match p {
        Persistence::Saved => "saved",
        Persistence::Degraded(_) => "degraded",
        Persistence::Unchanged => "unchanged",
    }
}

fn warn_if_degraded(p: &Persistence) {
    if let Persistence::Degraded(e) = p
        && !json_mode()
    {
        eprintln!("warning: {e}; position kept in memory only");
    }
}

pub fn move_json(r: &MoveReport) -> serde_json::Value {
    json!({
        "command": "move",
        "start": r.start,
        "target": r.target,
        "position": r.position,
        "overshoot": r.overshoot(),
        "persistence": persistence_name(&r.persistence),
    })
}

pub fn run_move(p: &mut Piston, method: &str, amount: i64) -> Result<()> {
    let report = p.move_cmd(method, amount)?;
    emit(
        format_args!(
            "move complete: position {} (target {}, from {})",
            report.position, report.target, report.start
        ),
        move_json(&report),
    );
    warn_if_degraded(&report.persistence);
    Ok(())
}

pub fn position(p: &Piston) {
    let limit = if p.limit_state().is_triggered() {
        "triggered"
    } else {
        "clear"
    };
    emit(
        format_args!(
            "position: {} (state {}, limit {limit}{})",
            p.position(),
            p.state(),
            if p.limit_enabled() { "" } else { ", DISABLED" }
        ),
        json!({
            "position": p.position(),
            "state": p.state().to_string(),
            "limit": limit,
            "limit_enabled": p.limit_enabled(),
        }),
    );
}

pub fn stop(p: &mut Piston) {
    let persistence = p.stop();
    emit(
        format_args!("stopped at {}", p.position()),
        json!({
            "command": "stop",
            "position": p.position(),
            "persistence": persistence_name(&persistence),
        }),
    );
    warn_if_degraded(&persistence);
}

pub fn home(p: &mut Piston, reset: bool) -> Result<()> {
    let report = if reset { p.reset_fault()? } else { p.home()? };
    emit(
        format_args!("homed: position {}", report.position),
        json!({
            "command": if reset { "reset-fault" } else { "home" },
            "position": report.position,
            "state": p.state().to_string(),
            "persistence": persistence_name(&report.persistence),
        }),
    );
    warn_if_degraded(&report.persistence);
    Ok(())
}

pub fn zero(p: &mut Piston) -> Result<()> {
    let persistence = p.zero()?;
    emit(
        "position zeroed",
        json!({ "command": "zero", "position": 0, "persistence": persistence_name(&persistence) }),
    );
    warn_if_degraded(&persistence);
    Ok(())
}

pub fn limit(p: &mut Piston, enable: bool) {
    p.set_limit_enabled(enable);
    emit(
        if enable {
            "limit switch enabled"
        } else {
            "limit switch DISABLED: extend travel is unprotected"
        },
        json!({ "command": "limit", "enabled": enable }),
    );
}

pub fn load_plan(cfg: &Config, csv: Option<&Path>, cycles: Option<u32>) -> Result<DivePlan> {
    let mut plan = DivePlan::from(&cfg.dive);
    if let Some(path) = csv {
        let rows = nanofloat_config::load_dive_plan_csv(path).wrap_err("load dive plan")?;
        plan = plan.with_legs(rows.iter().map(DiveLeg::from).collect());
    }
    if let Some(n) = cycles {
        plan.cycles = n;
    }
    Ok(plan)
}

pub fn dive(p: &mut Piston, plan: &DivePlan) -> Result<()> {
    let summary = run_dive(p, plan)?;
    emit(
        format_args!(
            "dive complete: {} cycle(s), final position {}",
            summary.cycles_completed, summary.final_position
        ),
        json!({
            "command": "dive",
            "cycles": summary.cycles_completed,
            "position": summary.final_position,
        }),
    );
    Ok(())
}

/// Count encoder edges for `ms` with the motor idle, e.g. while turning the
/// piston by hand to check the encoder wiring.
pub fn encoder_test(p: &Piston, ms: u64) {
    let counter = p.edge_counter();
    let start_total = counter.total();
    let started = Instant::now();
    let budget = Duration::from_millis(ms);
    let mut last_report = started;

    while started.elapsed() < budget && !INTERRUPTED.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(10).min(budget));
        if !json_mode() && last_report.elapsed() >= Duration::from_secs(1) {
            println!("edges so far: {}", counter.total() - start_total);
            last_report = Instant::now();
        }
    }

    let edges = counter.total() - start_total;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    emit(
        format_args!("encoder test: {edges} edges in {elapsed_ms} ms"),
        json!({ "command": "encoder-test", "edges": edges, "ms": elapsed_ms }),
    );
}

pub fn self_check(p: &Piston, kind: &str, cfg: &Config) {
    let storage = match p.boot_warning() {
        Some(e) => e.to_string(),
        None => "ok".to_string(),
    };
    emit(
        format_args!(
            "self-check ok: backend {kind}, position {}, limit {}{}, storage {storage} ({})",
            p.position(),
            if p.limit_state().is_triggered() {
                "triggered"
            } else {
                "clear"
            },
            if p.limit_enabled() { "" } else { " (disabled)" },
            cfg.storage.path,
        ),
        json!({
            "ok": true,
            "backend": kind,
            "position": p.position(),
            "limit_triggered": p.limit_state().is_triggered(),
            "limit_enabled": p.limit_enabled(),
            "storage": storage,
            "storage_path": cfg.storage.path,
        }),
    );
}
