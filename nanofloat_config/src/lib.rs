#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and dive plan parsing for the float.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Dive plans are read from CSV with strict headers.
use serde::Deserialize;

/// Pin numbers (BCM) of the piston hardware.
#[derive(Debug, Deserialize)]
pub struct Pins {
    /// Encoder phase A; rising edges are counted.
    pub encoder_a: u8,
    /// Encoder phase B; wired but not decoded.
    pub encoder_b: Option<u8>,
    pub limit_in: u8,
    /// Energizes the limit switch circuit.
    pub limit_enable: u8,
    pub motor_extend: u8,
    pub motor_retract: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Motion {
    /// Control loop period while a move is in flight.
    pub poll_interval_ms: u64,
    /// Fault if no encoder edge arrives for this long while the motor runs.
    pub stall_timeout_ms: u64,
    /// Hard cap on a single move.
    pub max_move_ms: u64,
    /// Position assigned when homing reaches the limit switch.
    pub home_position: i64,
    /// Hard cap on a homing run.
    pub home_timeout_ms: u64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            stall_timeout_ms: 500,
            max_move_ms: 120_000,
            home_position: 0,
            home_timeout_ms: 180_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Limit {
    /// Energize the limit switch at boot.
    pub enabled: bool,
}

impl Default for Limit {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// File holding the persisted piston position.
    pub path: String,
    /// Key of the position record inside that file.
    pub key: String,
    /// Position assumed when no record exists yet.
    pub default_position: i64,
    /// Extra save attempts before persistence is flagged degraded.
    pub save_retries: u8,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: "piston_pos.toml".to_string(),
            key: "piston_position".to_string(),
            default_position: 0,
            save_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Dive {
    /// Number of dive cycles in a deployment.
    pub cycles: u32,
    /// Piston position for descent (retracted, less buoyant).
    pub dive_position: i64,
    /// Piston position for ascent and recovery (extended, buoyant).
    pub surface_position: i64,
    /// Time held at each end of a cycle.
    pub hold_ms: u64,
}

impl Default for Dive {
    fn default() -> Self {
        Self {
            cycles: 6,
            dive_position: 0,
            surface_position: 4_000,
            hold_ms: 60_000,
        }
    }
}

/// Simulated plant used when the binary runs without GPIO.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sim {
    pub ticks_per_sec: u32,
    /// Physical position where the simulated limit switch closes.
    pub limit_at: i64,
}

impl Default for Sim {
    fn default() -> Self {
        Self {
            ticks_per_sec: 2_000,
            limit_at: 5_000,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub motion: Motion,
    #[serde(default)]
    pub limit: Limit,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub dive: Dive,
    #[serde(default)]
    pub sim: Sim,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let p = &self.pins;
        let mut used = vec![
            ("encoder_a", p.encoder_a),
            ("limit_in", p.limit_in),
            ("limit_enable", p.limit_enable),
            ("motor_extend", p.motor_extend),
            ("motor_retract", p.motor_retract),
        ];
        if let Some(b) = p.encoder_b {
            used.push(("encoder_b", b));
        }
        for (i, (name, pin)) in used.iter().enumerate() {
            if let Some((other, _)) = used[..i].iter().find(|(_, q)| q == pin) {
                eyre::bail!("pins.{name} and pins.{other} share GPIO {pin}");
            }
        }

        // Motion
        if self.motion.poll_interval_ms == 0 {
            eyre::bail!("motion.poll_interval_ms must be >= 1");
        }
        if self.motion.poll_interval_ms > 1_000 {
            eyre::bail!("motion.poll_interval_ms is unreasonably large (>1s)");
        }
        if self.motion.stall_timeout_ms <= self.motion.poll_interval_ms {
            eyre::bail!("motion.stall_timeout_ms must exceed motion.poll_interval_ms");
        }
        if self.motion.max_move_ms == 0 {
            eyre::bail!("motion.max_move_ms must be >= 1");
        }
        if self.motion.home_timeout_ms == 0 {
            eyre::bail!("motion.home_timeout_ms must be >= 1");
        }
        if self.motion.home_position < 0 {
            eyre::bail!("motion.home_position must be >= 0");
        }

        // Storage
        if self.storage.path.trim().is_empty() {
            eyre::bail!("storage.path must not be empty");
        }
        if !is_bare_key(&self.storage.key) {
            eyre::bail!("storage.key must be a bare TOML key (letters, digits, '_' or '-')");
        }

        // Dive
        if self.dive.dive_position < 0 || self.dive.surface_position < 0 {
            eyre::bail!("dive positions must be >= 0");
        }

        // Sim
        if self.sim.ticks_per_sec == 0 {
            eyre::bail!("sim.ticks_per_sec must be > 0");
        }

        Ok(())
    }
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// One leg of a dive plan: move to `position`, then hold for `hold_ms`.
///
/// Expected CSV headers:
/// position,hold_ms
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DiveLegRow {
    pub position: i64,
    pub hold_ms: u64,
}

pub fn load_dive_plan_csv(path: &std::path::Path) -> eyre::Result<Vec<DiveLegRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open dive plan CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["position", "hold_ms"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "dive plan CSV must have headers 'position,hold_ms', got: {}",
            actual.join(",")
        );
    }

    let mut legs = Vec::new();
    for (idx, rec) in rdr.deserialize::<DiveLegRow>().enumerate() {
        match rec {
            Ok(leg) if leg.position < 0 => {
                eyre::bail!("dive plan row {}: position must be >= 0", idx + 2);
            }
            Ok(leg) => legs.push(leg),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    if legs.is_empty() {
        eyre::bail!("dive plan {:?} has no legs", path);
    }
    Ok(legs)
}
