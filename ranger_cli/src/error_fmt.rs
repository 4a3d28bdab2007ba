//! Human-readable error descriptions and structured JSON error formatting.

use ranger_core::error::{BuildError, RangerError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/ranger.toml for a sample."
        );
    }

    if let Some(re) = err.downcast_ref::<RangerError>() {
        return match re {
            RangerError::Timeout => "What happened: Sensor interrupt timed out.\nLikely causes: Sensor not powered, interrupt line not wired, or timeout too low.\nHow to fix: Verify the [pins] wiring and power, and consider increasing lifecycle.interrupt_timeout_ms in the config.".to_string(),
            RangerError::CalibrationFailed { attempts, reason } => format!(
                "What happened: Sensor calibration failed after {attempts} attempt(s) ({reason}).\nLikely causes: Sensor obstructed during calibration, unstable supply, or a faulty module.\nHow to fix: Clear the area in front of the sensor and restart; raise lifecycle.calibration_retries if failures are intermittent."
            ),
            RangerError::PrepareFailed(msg) => format!(
                "What happened: Sensor rejected its measurement configuration ({msg}).\nLikely causes: Out-of-range [sensor] or [range] values.\nHow to fix: Check sensor.hwaas, sensor.profile and the range geometry, then restart."
            ),
            RangerError::State(msg) => format!(
                "What happened: Measurement requested in the wrong state ({msg}).\nLikely causes: The sensor was not calibrated or the last calibration failed.\nHow to fix: Restart the run so calibration happens first."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("csv must have headers") {
        return format!(
            "Invalid headers in correction CSV. Expected 'position_mm,distance_mm' (lookup, samples) or 'distance_mm,error_mm' (error table).\nDetails: {msg}"
        );
    }

    if lower.contains("strictly increasing") || lower.contains("has no rows") {
        return format!(
            "What happened: Correction table is not usable.\nLikely causes: Rows out of order, duplicate positions, or an empty file.\nHow to fix: Sort the CSV by its first column and remove duplicates. Details: {msg}"
        );
    }

    if lower.contains("no lookup table") {
        return format!(
            "What happened: This command needs a lookup table.\nLikely causes: correction.lookup_csv is not set.\nHow to fix: Compile one with `ranger compile-table` and point correction.lookup_csv at it. Details: {msg}"
        );
    }

    if lower.contains("invalid configuration")
        || lower.contains("must be")
        || lower.contains("reading config")
    {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [range] values, a malformed [[range.lines]] list, or out-of-range values.\nHow to fix: Edit the TOML config and try again. Details: {msg}"
        );
    }

    if lower.contains("gpio") {
        return "What happened: Failed to initialize sensor GPIO lines.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable reason name used in JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<RangerError>() {
        Some(RangerError::Timeout) => "Timeout",
        Some(RangerError::CalibrationFailed { .. }) => "CalibrationFailed",
        Some(RangerError::PrepareFailed(_)) => "PrepareFailed",
        Some(RangerError::Hardware(_)) => "Hardware",
        Some(RangerError::State(_)) => "State",
        Some(RangerError::Transport(_)) => "Transport",
        None => "Error",
    }
}

/// Map lifecycle failures to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<RangerError>() {
        Some(RangerError::CalibrationFailed { .. } | RangerError::PrepareFailed(_)) => 3,
        Some(RangerError::Timeout) => 4,
        Some(RangerError::Hardware(_)) => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let reason = reason_name(err);
    if let Some(RangerError::CalibrationFailed { attempts, .. }) = err.downcast_ref::<RangerError>()
    {
        return json!({ "reason": reason, "details": { "attempts": attempts }, "message": msg })
            .to_string();
    }
    json!({ "reason": reason, "message": msg }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_failure_has_exit_code_three() {
        let err = eyre::Report::new(RangerError::CalibrationFailed {
            attempts: 2,
            reason: "rejected".into(),
        });
        assert_eq!(exit_code_for_error(&err), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "CalibrationFailed");
        assert_eq!(v["details"]["attempts"], 2);
    }

    #[test]
    fn wrapped_timeout_is_still_recognized() {
        use eyre::WrapErr;
        let err = Err::<(), _>(RangerError::Timeout)
            .wrap_err("waiting for frame")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).starts_with("What happened: Sensor interrupt timed out"));
    }

    #[test]
    fn header_errors_are_explained() {
        let err = eyre::eyre!("lookup CSV must have headers 'position_mm,distance_mm', got: a,b");
        assert!(humanize(&err).starts_with("Invalid headers in correction CSV"));
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
