//! Colored `ok:` / `warning:` / `error:` status lines on the controlling
//! terminal, separate from the tracing log output.

use std::io::Write;

const RED: u8 = 31;
const GREEN: u8 = 32;
const YELLOW: u8 = 33;

#[derive(Debug, Clone, Copy)]
pub struct Status {
    color: bool,
}

impl Status {
    pub fn new(no_color_flag: bool) -> Self {
        let env_disabled = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self {
            color: !no_color_flag && !env_disabled && atty::is(atty::Stream::Stdout),
        }
    }

    fn line(&self, label: &str, code: u8, msg: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{label}\x1b[0m: {msg}")
        } else {
            format!("{label}: {msg}")
        }
    }

    pub fn ok(&self, msg: &str) {
        let _ = write!(std::io::stdout(), "{}", self.line("ok", GREEN, msg));
    }

    pub fn warn(&self, msg: &str) {
        let _ = write!(std::io::stdout(), "{}", self.line("warning", YELLOW, msg));
    }

    pub fn err(&self, msg: &str) {
        let _ = write!(std::io::stderr(), "{}", self.line("error", RED, msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_without_color() {
        let status = Status { color: false };
        assert_eq!(status.line("ok", GREEN, "done\n"), "ok: done\n");
    }

    #[test]
    fn test_colored_line_wraps_label_only() {
        let status = Status { color: true };
        assert_eq!(
            status.line("error", RED, "boom\n"),
            "\x1b[31merror\x1b[0m: boom\n"
        );
    }
}
