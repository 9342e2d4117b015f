#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must parse or be rejected; validate() must never panic.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = nanofloat_config::load_toml(data) {
        let _ = cfg.validate();
    }
});
