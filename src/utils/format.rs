/// Human readable size with 1024-based units, e.g. `1.5 MB`, `0 B`.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let value = bytes as f64;
    if value >= TB {
        format!("{} TB", trim_decimals(value / TB))
    } else if value >= GB {
        format!("{} GB", trim_decimals(value / GB))
    } else if value >= MB {
        format!("{} MB", trim_decimals(value / MB))
    } else if value >= KB {
        format!("{} KB", trim_decimals(value / KB))
    } else {
        format!("{} B", bytes)
    }
}

// Two decimals at most, but always at least one: 2.0, 1.5, 1.23.
fn trim_decimals(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}
