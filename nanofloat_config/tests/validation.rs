use nanofloat_config::load_toml;
use rstest::rstest;

const PINS: &str = r#"
[pins]
encoder_a = 1
encoder_b = 2
limit_in = 16
limit_enable = 17
motor_extend = 20
motor_retract = 18
"#;

#[test]
fn minimal_config_takes_defaults() {
    let cfg = load_toml(PINS).expect("parse TOML");
    cfg.validate().expect("defaults should validate");
    assert_eq!(cfg.storage.key, "piston_position");
    assert_eq!(cfg.storage.default_position, 0);
    assert!(cfg.limit.enabled);
    assert_eq!(cfg.motion.poll_interval_ms, 5);
}

#[test]
fn full_config_parses() {
    let toml = format!(
        "{PINS}{}",
        r#"
[motion]
poll_interval_ms = 2
stall_timeout_ms = 250
max_move_ms = 30000
home_position = 4200
home_timeout_ms = 60000

[limit]
enabled = false

[storage]
path = "/var/lib/nanofloat/pos.toml"
key = "piston_position"
default_position = 100
save_retries = 1

[logging]
file = "float.log"
level = "debug"
rotation = "daily"

[dive]
cycles = 2
dive_position = 0
surface_position = 3000
hold_ms = 1000

[sim]
ticks_per_sec = 500
limit_at = 4200
"#
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.motion.home_position, 4200);
    assert!(!cfg.limit.enabled);
    assert_eq!(cfg.storage.save_retries, 1);
    assert_eq!(cfg.dive.cycles, 2);
    assert_eq!(cfg.sim.limit_at, 4200);
}

#[rstest]
#[case("[motion]\npoll_interval_ms = 0", "poll_interval_ms must be >= 1")]
#[case(
    "[motion]\npoll_interval_ms = 10\nstall_timeout_ms = 10",
    "stall_timeout_ms must exceed"
)]
#[case("[motion]\nmax_move_ms = 0", "max_move_ms must be >= 1")]
#[case("[motion]\nhome_position = -5", "home_position must be >= 0")]
#[case("[storage]\npath = \"  \"", "storage.path must not be empty")]
#[case("[storage]\nkey = \"piston position\"", "bare toml key")]
#[case("[dive]\nsurface_position = -1", "dive positions must be >= 0")]
#[case("[sim]\nticks_per_sec = 0", "ticks_per_sec must be > 0")]
fn rejects_out_of_range_values(#[case] section: &str, #[case] needle: &str) {
    let toml = format!("{PINS}\n{section}\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").to_lowercase().contains(&needle.to_lowercase()),
        "unexpected error: {err}"
    );
}

#[test]
fn rejects_shared_pins() {
    let toml = r#"
[pins]
encoder_a = 1
limit_in = 16
limit_enable = 17
motor_extend = 20
motor_retract = 20
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("duplicate pin");
    assert!(format!("{err}").contains("share GPIO 20"));
}

#[test]
fn missing_pins_section_fails_to_parse() {
    assert!(load_toml("[motion]\npoll_interval_ms = 5\n").is_err());
}
