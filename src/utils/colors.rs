//! ANSI color helper utilities for terminal output.
use crate::core::duration::PLACEHOLDER;
use crate::models::session_view::{SessionView, SyncStatus};

pub const RESET: &str = "\x1b[0m";

pub const GREY: &str = "\x1b[90m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";

/// Green while checked in, grey when idle, yellow while the state is not
/// trustworthy.
pub fn color_for_phase(view: &SessionView) -> &'static str {
    match view.sync {
        SyncStatus::Loading => YELLOW,
        SyncStatus::Lost { .. } => RED,
        SyncStatus::Live if view.is_active => GREEN,
        SyncStatus::Live => GREY,
    }
}

/// Grey out missing values (empty or the `-` placeholder).
pub fn colorize_optional(value: &str) -> String {
    let v = value.trim();
    if v.is_empty() || v == PLACEHOLDER {
        format!("{GREY}{value}{RESET}")
    } else {
        value.to_string()
    }
}

pub fn colorize_in_out(value: &str, is_in: bool) -> String {
    let v = value.trim();
    if v.is_empty() || v == PLACEHOLDER {
        return format!("{GREY}{value}{RESET}");
    }

    if is_in {
        format!("{GREEN}{value}{RESET}")
    } else {
        format!("{RED}{value}{RESET}")
    }
}
