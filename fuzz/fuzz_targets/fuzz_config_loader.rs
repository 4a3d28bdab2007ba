#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary TOML must either fail to parse or fail validation; never panic.
    if let Ok(cfg) = ranger_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let _ = cfg.frame_len();
        }
    }
});
