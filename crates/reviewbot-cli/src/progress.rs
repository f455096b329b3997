//! Progress feedback for CLI commands
//!
//! Spinners go to stderr and are suppressed when --quiet is set.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Create a spinner with a message
pub fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(style("{spinner:.cyan} {msg}"));
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish_with(pb: Option<ProgressBar>, template: &str, prefix: &'static str, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(style(template));
        pb.set_prefix(prefix);
        pb.finish_with_message(message.to_string());
    }
}

/// Finish a spinner with a success message
pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.green} {msg}", "✓", message);
}

/// Finish a spinner with a warning message
pub fn finish_spinner_warn(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.yellow} {msg}", "!", message);
}

/// Finish a spinner with an error message
pub fn finish_spinner_error(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.red} {msg}", "✗", message);
}

/// Remove a spinner without leaving a line behind
pub fn clear_spinner(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}
