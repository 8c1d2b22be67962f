//! Task source: turns a task index into the concrete argument vector for one
//! invocation by substituting the increment placeholder.

use crate::error::ConfigError;

/// Literal token replaced with the task index when increment mode is on.
pub const INCREMENT_PLACEHOLDER: &str = "INC";

/// Build the argument vector for one invocation attempt. Pure function: the
/// same template and index always yield the same output. Substitution is
/// substring replacement, so a placeholder embedded in a larger argument
/// (`file-INC.txt`) is handled.
pub fn substitute(template: &[String], increment: bool, task_idx: u64) -> Vec<String> {
    if !increment {
        return template.to_vec();
    }
    let idx = task_idx.to_string();
    template
        .iter()
        .map(|arg| {
            if arg.contains(INCREMENT_PLACEHOLDER) {
                arg.replace(INCREMENT_PLACEHOLDER, &idx)
            } else {
                arg.clone()
            }
        })
        .collect()
}

pub fn contains_placeholder(args: &[String]) -> bool {
    args.iter().any(|a| a.contains(INCREMENT_PLACEHOLDER))
}

/// Pre-run check: increment mode without any placeholder in the template is a
/// configuration error, caught before any worker starts.
pub fn validate_increment_args(args: &[String], increment: bool) -> Result<(), ConfigError> {
    if increment && !contains_placeholder(args) {
        return Err(ConfigError::MissingPlaceholder {
            args: args.to_vec(),
            placeholder: INCREMENT_PLACEHOLDER,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn template(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substitute_embedded_placeholder() {
        let t = template(&["echo", "file-INC.log"]);
        assert_eq!(substitute(&t, true, 7), template(&["echo", "file-7.log"]));
    }

    #[test]
    fn test_substitute_disabled_is_passthrough() {
        let t = template(&["echo", "file-INC.log"]);
        assert_eq!(substitute(&t, false, 7), t);
    }

    #[test]
    fn test_substitute_replaces_every_occurrence() {
        let t = template(&["printf", "INC-INC"]);
        assert_eq!(substitute(&t, true, 3), template(&["printf", "3-3"]));
    }

    #[test]
    fn test_substitute_is_idempotent() {
        let t = template(&["echo", "INC"]);
        let first = substitute(&t, true, 42);
        let second = substitute(&t, true, 42);
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_names_offending_args() {
        let t = template(&["cmd", "arg"]);
        let err = validate_increment_args(&t, true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("arg"), "error should echo the args: {msg}");
        assert!(msg.contains("INC"));
    }

    #[test]
    fn test_validate_passes_when_disabled() {
        let t = template(&["cmd", "arg"]);
        assert!(validate_increment_args(&t, false).is_ok());
    }
}
