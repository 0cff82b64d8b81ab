//! Caller-supplied target checks.
//!
//! The target is the only free-form value a client can send. How strict the
//! check is depends on where the value ends up.

/// Where a target will be placed in the execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetUse {
    /// Passed as data to a WASM module.
    ModuleInput,
    /// Appended as a discrete argv element after the definition's args.
    Argument,
    /// Substituted into a legacy shell command template.
    ShellTemplate,
}

/// Longest accepted target. Hostnames top out at 253; URLs get some slack.
pub const MAX_TARGET_LEN: usize = 1024;

fn is_shell_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '.' | '-' | '_' | ':' | '/' | '@' | '%' | ',' | '=' | '+'
        )
}

/// Returns a human-readable reason when `target` is not acceptable for `usage`.
pub fn check_target(target: &str, usage: TargetUse) -> Result<(), String> {
    if target.trim().is_empty() {
        return Err("target must not be empty".into());
    }
    if target.chars().count() > MAX_TARGET_LEN {
        return Err(format!("target exceeds {MAX_TARGET_LEN} characters"));
    }
    if target.chars().any(char::is_control) {
        return Err("target must not contain control characters".into());
    }

    match usage {
        TargetUse::ModuleInput => Ok(()),
        TargetUse::Argument => {
            if target.starts_with('-') {
                return Err("target must not start with '-'".into());
            }
            Ok(())
        }
        TargetUse::ShellTemplate => {
            if target.starts_with('-') {
                return Err("target must not start with '-'".into());
            }
            if let Some(bad) = target.chars().find(|c| !is_shell_safe_char(*c)) {
                return Err(format!("target contains disallowed character {bad:?}"));
            }
            Ok(())
        }
    }
}
