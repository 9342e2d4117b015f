//! Human-readable error descriptions and structured JSON error formatting.

use nanofloat_core::error::{BuildError, MotionError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(me) = err.downcast_ref::<MotionError>() {
        return match me {
            MotionError::InvalidMethod(m) => format!(
                "What happened: Unknown move method '{m}'.\nHow to fix: Use rel|relative to move by a distance or abs|absolute to move to a position."
            ),
            MotionError::InvalidTarget(t) => format!(
                "What happened: Absolute target {t} is below zero.\nHow to fix: Absolute positions are counts from home and must be >= 0; use a relative move to go below zero."
            ),
            MotionError::Busy => "What happened: Another command is moving the piston.\nHow to fix: Wait for it to finish or send stop.".to_string(),
            MotionError::Faulted => "What happened: The controller is faulted and refuses moves.\nLikely causes: An earlier stall or time-budget fault.\nHow to fix: Clear the cause, then run reset-fault to re-home.".to_string(),
            MotionError::LimitReached { position } => format!(
                "What happened: Limit switch reached at position {position}; the piston is fully extended.\nHow to fix: Retract before extending again, or re-home if the position looks wrong."
            ),
            MotionError::StallDetected { position } => format!(
                "What happened: Encoder went silent while the motor was driven (stall) at position {position}.\nLikely causes: Jammed piston, motor or H-bridge power loss, or encoder wiring.\nHow to fix: Inspect the mechanism and encoder, then run reset-fault. Raise motion.stall_timeout_ms if the motor starts slowly."
            ),
            MotionError::MoveTimeout { position } => format!(
                "What happened: Move exceeded motion.max_move_ms at position {position}.\nLikely causes: Very long move, slow motor, or a target beyond travel with the limit switch disabled.\nHow to fix: Check the target and limit switch, then run reset-fault."
            ),
            MotionError::Stopped { position } => format!(
                "What happened: Stopped by request at position {position}."
            ),
            MotionError::HomingUnavailable => "What happened: Homing needs the limit switch, which is disabled.\nHow to fix: Run `limit --enable` (or set [limit] enabled = true) and retry.".to_string(),
            MotionError::StorageUnavailable(e) | MotionError::StorageWriteError(e) => format!(
                "What happened: Position storage failed ({e}).\nLikely causes: Read-only or full filesystem, or a bad storage.path.\nHow to fix: Check storage.path and free space; the in-memory position is still used."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingMotor => "What happened: No motor driver was provided to the controller.\nHow to fix: Ensure the motor pins open successfully.".to_string(),
            BuildError::MissingLimitSwitch => "What happened: No limit switch was provided to the controller.\nHow to fix: Ensure the limit switch pins open successfully.".to_string(),
            BuildError::MissingStore => "What happened: No position store was provided to the controller.\nHow to fix: Check the [storage] section.".to_string(),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this program.\nDetails: {te}\nHow to fix: Compare against etc/nanofloat.toml; [pins] is required."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open motor pins")
        || lower.contains("open limit switch pins")
        || lower.contains("arm encoder interrupt")
    {
        return format!(
            "What happened: Failed to initialize GPIO ({}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access GPIO.",
            root_cause(err)
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid: {}.\nHow to fix: Edit the TOML config and try again.",
            root_cause(err)
        );
    }

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file ({}).\nHow to fix: Pass --config FILE or create etc/nanofloat.toml.",
            root_cause(err)
        );
    }

    // Dive plan CSV header special-case
    let root = root_cause(err);
    if root.contains("dive plan CSV must have headers") {
        return "Invalid headers in dive plan CSV. Expected 'position,hold_ms'.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn root_cause(err: &eyre::Report) -> String {
    err.chain()
        .last()
        .map(|e| e.to_string())
        .unwrap_or_default()
}

/// Stable name of a motion outcome, used in JSON output.
pub fn reason_name(err: &MotionError) -> &'static str {
    match err {
        MotionError::InvalidMethod(_) => "InvalidMethod",
        MotionError::InvalidTarget(_) => "InvalidTarget",
        MotionError::Busy => "Busy",
        MotionError::Faulted => "Faulted",
        MotionError::LimitReached { .. } => "LimitReached",
        MotionError::StallDetected { .. } => "StallDetected",
        MotionError::MoveTimeout { .. } => "MoveTimeout",
        MotionError::Stopped { .. } => "Stopped",
        MotionError::HomingUnavailable => "HomingUnavailable",
        MotionError::StorageUnavailable(_) => "StorageUnavailable",
        MotionError::StorageWriteError(_) => "StorageWriteError",
    }
}

/// Map motion outcomes to stable exit codes; other errors return 1.
///
/// 2 is left to clap for usage errors.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    let Some(me) = err.downcast_ref::<MotionError>() else {
        return 1;
    };
    match me {
        MotionError::LimitReached { .. } => 3,
        MotionError::StallDetected { .. } => 4,
        MotionError::MoveTimeout { .. } => 5,
        MotionError::Stopped { .. } => 6,
        MotionError::Faulted => 7,
        MotionError::Busy => 8,
        MotionError::InvalidMethod(_) | MotionError::InvalidTarget(_) => 9,
        MotionError::HomingUnavailable => 10,
        MotionError::StorageUnavailable(_) | MotionError::StorageWriteError(_) => 11,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let message = humanize(err);
    match err.downcast_ref::<MotionError>() {
        Some(me) => match me.position() {
            Some(position) => json!({
                "reason": reason_name(me),
                "position": position,
                "fault": me.is_fault(),
                "message": message,
            }),
            None => json!({ "reason": reason_name(me), "message": message }),
        },
        None => json!({ "reason": "Error", "message": message }),
    }
    .to_string()
}
