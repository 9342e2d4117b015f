//! Line-oriented command shell.
//!
//! Motion commands run on their own thread so `stop`, `position` and `state`
//! stay responsive during a move. A second motion command while one is running
//! is answered with `Busy`. `quit` (or end of input) waits for the running
//! command to finish; Ctrl-C stops it.

use std::io::BufRead;
use std::thread::JoinHandle;

use eyre::{Result, WrapErr};
use nanofloat_core::{MotionError, SharedPiston};
use serde_json::json;

use crate::cli::json_mode;
use crate::commands::{emit, move_json, persistence_name};
use crate::error_fmt::format_error_json;

const HELP: &str = "commands: move <rel|abs> <n>, stop, position, state, reset, home, help, quit";

fn report_error(e: MotionError) {
    if json_mode() {
        println!("{}", format_error_json(&eyre::Report::new(e)));
    } else {
        println!("error: {e}");
    }
}

fn spawn_job(
    jobs: &mut Vec<JoinHandle<()>>,
    shared: &SharedPiston,
    job: impl FnOnce(SharedPiston) + Send + 'static,
) {
    let shared = shared.clone();
    jobs.push(std::thread::spawn(move || job(shared)));
}

pub fn run(shared: SharedPiston) -> Result<()> {
    if !json_mode() {
        eprintln!("nanofloat shell; {HELP}");
    }
    let mut jobs: Vec<JoinHandle<()>> = Vec::new();

    for line in std::io::stdin().lock().lines() {
        let line = line.wrap_err("read shell input")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["quit" | "exit"] => break,
            ["help"] => println!("{HELP}"),
            ["stop"] => {
                let applied = shared.stop();
                emit(
                    format_args!("stop: position {}", shared.position()),
                    json!({
                        "command": "stop",
                        "position": shared.position(),
                        "immediate": applied.is_some(),
                    }),
                );
            }
            ["position"] => emit(
                format_args!("position: {}", shared.position()),
                json!({ "position": shared.position() }),
            ),
            ["state"] => {
                let status = shared.status();
                emit(
                    format_args!(
                        "state: {} (position {}, target {}{})",
                        status.state(),
                        status.position(),
                        status.target(),
                        if status.persistence_degraded() {
                            ", persistence degraded"
                        } else {
                            ""
                        }
                    ),
                    json!({
                        "state": status.state().to_string(),
                        "position": status.position(),
                        "target": status.target(),
                        "persistence_degraded": status.persistence_degraded(),
                    }),
                );
            }
            ["move", method, amount] => {
                let Ok(amount) = amount.parse::<i64>() else {
                    println!("error: amount must be an integer, got '{amount}'");
                    continue;
                };
                let method = (*method).to_string();
                spawn_job(&mut jobs, &shared, move |s| match s.move_cmd(&method, amount) {
                    Ok(r) => emit(
                        format_args!("move complete: position {} (target {})", r.position, r.target),
                        move_json(&r),
                    ),
                    Err(e) => report_error(e),
                });
            }
            ["reset"] | ["home"] => {
                let reset = words[0] == "reset";
                spawn_job(&mut jobs, &shared, move |s| {
                    let result = if reset { s.reset_fault() } else { s.home() };
                    match result {
                        Ok(r) => emit(
                            format_args!("homed: position {}", r.position),
                            json!({
                                "command": home_command_name(reset),
                                "position": r.position,
                                "persistence": persistence_name(&r.persistence),
                            }),
                        ),
                        Err(e) => report_error(e),
                    }
                });
            }
            _ => println!("error: unknown command '{line}'; {HELP}"),
        }
        jobs.retain(|j| !j.is_finished());
    }

    for job in jobs {
        if job.join().is_err() {
            tracing::error!("shell command thread panicked");
        }
    }
    Ok(())
}

fn home_command_name(reset: bool) -> &'static str {
    if reset { "reset-fault" } else { "home" }
}
