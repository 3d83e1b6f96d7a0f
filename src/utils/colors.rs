/// ANSI color helper utilities for terminal output.
pub const RESET: &str = "\x1b[0m";

pub const GREY: &str = "\x1b[90m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Active events in green, inactive ones greyed out.
pub fn colorize_active(active: bool) -> String {
    if active {
        format!("{GREEN}active{RESET}")
    } else {
        format!("{GREY}inactive{RESET}")
    }
}

/// Distance relative to a radius: green inside, red outside.
pub fn colorize_distance(distance_m: f64, within: bool) -> String {
    let color = if within { GREEN } else { RED };
    format!("{color}{distance_m:.1} m{RESET}")
}
