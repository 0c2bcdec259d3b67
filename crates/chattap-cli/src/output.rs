use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

#[derive(Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn truncate_string(s: &str, max_len: usize) -> String {
    let flat = s.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_len {
        flat
    } else {
        let kept: String = flat.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Shorten an RFC 3339 timestamp; other formats are shown as stored
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) if raw.is_empty() => "-".to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Parse either stored timestamp format: RFC 3339, or the local-time
/// capture format `2024-05-01 10:15:30,123`
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S,%3f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate_string("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("line one\nline two", 40), "line one line two");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp("2024-05-01T10:15:30.123+02:00"),
            "2024-05-01 10:15"
        );
        assert_eq!(
            format_timestamp("2024-05-01 10:15:30,123"),
            "2024-05-01 10:15:30,123"
        );
        assert_eq!(format_timestamp(""), "-");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-05-01T10:15:30+02:00").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 30).unwrap());

        let capture = parse_timestamp("2024-05-01 10:15:30,123").unwrap();
        assert_eq!(
            capture
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string(),
            "2024-05-01 10:15:30.123"
        );

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
