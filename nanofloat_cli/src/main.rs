#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `nanofloat` command line: one-shot piston commands, dive runs, and an
//! interactive shell, against GPIO (feature `hardware`) or a simulated piston.

mod backend;
mod cli;
mod commands;
mod error_fmt;
mod rt;
mod shell;

use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use eyre::{Result, WrapErr};
use nanofloat_config::Config;
use nanofloat_core::SharedPiston;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            if cli::json_mode() {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}

fn load_config(path: &std::path::Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = nanofloat_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console logs go to stderr (stdout carries results). `[logging] file` adds
/// a JSON-lines file sink.
fn init_tracing(cli: &Cli, cfg: &Config) -> Result<()> {
    use tracing_subscriber::{
        EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let console_level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(console_level))
        .wrap_err_with(|| format!("invalid log level '{console_level}'"))?;

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let console = if cli.json {
        console.json().boxed()
    } else {
        console.boxed()
    };

    let file_layer = match cfg.logging.file.as_deref() {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            let appender = match cfg.logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                "never" => tracing_appender::rolling::never(dir, name),
                other => eyre::bail!("logging.rotation must be never|daily|hourly, got '{other}'"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_writer(writer).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg)?;
    rt::setup_rt_once(&cli.rt);

    let mut backend = backend::open(&cfg)?;
    let kind = backend.kind;
    let piston = &mut backend.piston;

    let stop = piston.stop_handle();
    ctrlc::set_handler(move || {
        commands::INTERRUPTED.store(true, Ordering::Relaxed);
        stop.request();
    })
    .wrap_err("install Ctrl-C handler")?;

    match cli.cmd {
        Commands::Move { method, amount } => commands::run_move(piston, &method, amount)?,
        Commands::Position => commands::position(piston),
        Commands::Stop => commands::stop(piston),
        Commands::ResetFault => commands::home(piston, true)?,
        Commands::Home => commands::home(piston, false)?,
        Commands::Zero => commands::zero(piston)?,
        Commands::Limit { enable, disable } => {
            commands::limit(piston, enable && !disable);
        }
        Commands::Dive { plan, cycles } => {
            let plan = commands::load_plan(&cfg, plan.as_deref(), cycles)?;
            commands::dive(piston, &plan)?;
        }
        Commands::EncoderTest { ms } => commands::encoder_test(piston, ms),
        Commands::SelfCheck => commands::self_check(piston, kind, &cfg),
        Commands::Shell => shell::run(SharedPiston::from(backend.piston))?,
    }
    Ok(())
}
