use chrono::NaiveDateTime;

/// Layout of the logger's timestamp column, e.g. `07.10.2019 13:05`.
pub const DEVICE_FORMAT: &str = "%d.%m.%Y %H:%M";
/// Layout written to the merged file.
pub const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a device timestamp; `None` for anything that does not match.
pub fn parse_device_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');
    if s.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(s, DEVICE_FORMAT).ok()
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(OUTPUT_FORMAT).to_string()
}
