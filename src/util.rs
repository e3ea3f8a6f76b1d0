//! Small shared helpers.

/// Render an elapsed duration the way a human reads it: `1 year`, or up to
/// `N days N hours N minutes N seconds` with zero components left out. Once
/// the span passes a year only the year count is shown.
pub fn duration_human(total_seconds: u64) -> String {
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = (total_seconds / 3600) % 24;
    let days = total_seconds / 86_400;
    let years = (days as f64 / 365.242199) as u64;

    let mut parts = Vec::new();
    if years > 0 {
        parts.push(plural(years, "year"));
    } else {
        if days > 0 {
            parts.push(plural(days, "day"));
        }
        if hours > 0 {
            parts.push(plural(hours, "hour"));
        }
        if minutes > 0 {
            parts.push(plural(minutes, "minute"));
        }
        if seconds > 0 {
            parts.push(plural(seconds, "second"));
        }
    }
    if parts.is_empty() {
        return "0 seconds".to_string();
    }
    parts.join(" ")
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(duration_human(0), "0 seconds");
    }

    #[test]
    fn test_singular_and_plural() {
        assert_eq!(duration_human(1), "1 second");
        assert_eq!(duration_human(2), "2 seconds");
        assert_eq!(duration_human(60), "1 minute");
    }

    #[test]
    fn test_composite() {
        assert_eq!(duration_human(3661), "1 hour 1 minute 1 second");
        assert_eq!(duration_human(90_061), "1 day 1 hour 1 minute 1 second");
    }

    #[test]
    fn test_zero_components_are_skipped() {
        assert_eq!(duration_human(3600), "1 hour");
        assert_eq!(duration_human(86_400 + 30), "1 day 30 seconds");
    }

    #[test]
    fn test_years_swallow_smaller_units() {
        assert_eq!(duration_human(366 * 86_400), "1 year");
        assert_eq!(duration_human(2 * 366 * 86_400), "2 years");
    }
}
