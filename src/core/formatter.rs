use chrono::{DateTime, Utc};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Display band of a utilization value, mirroring the alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Elevated,
    Warning,
    Critical,
}

pub fn severity(utilization: f64) -> Severity {
    if utilization >= 90.0 {
        Severity::Critical
    } else if utilization >= 80.0 {
        Severity::Warning
    } else if utilization >= 60.0 {
        Severity::Elevated
    } else {
        Severity::Normal
    }
}

/// Returns "{used}% used", truncated toward zero like the menu-bar label.
pub fn format_used_percent(utilization: f64) -> String {
    format!("{}% used", utilization.max(0.0) as u64)
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" })
}

/// Returns "Resets in …" relative to `now`; "Resets now" once past.
pub fn format_reset_countdown(resets_at: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total_seconds = (*resets_at - now).num_seconds();
    if total_seconds <= 0 {
        return "Resets now".to_string();
    }

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;

    let remaining = if total_seconds < 60 {
        plural(total_seconds, "sec")
    } else if total_seconds < 3_600 {
        plural(minutes, "min")
    } else if total_seconds < 86_400 {
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            plural(hours, "hr")
        }
    } else if hours > 0 && days < 7 {
        format!("{}d {}h", days, hours)
    } else {
        format!("{}d", days)
    };
    format!("Resets in {}", remaining)
}

/// Returns "{n} secs/mins/hrs/days ago" for the time elapsed since `then`.
pub fn format_time_ago(then: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - *then).num_seconds().max(0);
    let amount = if elapsed < 60 {
        plural(elapsed, "sec")
    } else if elapsed < 3_600 {
        plural(elapsed / 60, "min")
    } else if elapsed < 86_400 {
        plural(elapsed / 3_600, "hr")
    } else {
        plural(elapsed / 86_400, "day")
    };
    format!("{} ago", amount)
}

/// Returns "[████░░░░░░░░]" where █ = used portion, ░ = headroom.
pub fn format_usage_bar(utilization: f64, width: usize) -> String {
    let utilization = utilization.clamp(0.0, 100.0);
    let used_blocks = ((utilization / 100.0) * width as f64).round() as usize;
    let free_blocks = width.saturating_sub(used_blocks);

    format!("[{}{}]", "█".repeat(used_blocks), "░".repeat(free_blocks))
}

/// Render a 0-100 series as a block sparkline, one character per value.
pub fn format_sparkline(series: &[f64]) -> String {
    series
        .iter()
        .map(|v| {
            let v = v.clamp(0.0, 100.0);
            let idx = ((v / 100.0) * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[idx]
        })
        .collect()
}

/// Keep at most `width` of the most recent points.
pub fn tail(series: &[f64], width: usize) -> &[f64] {
    &series[series.len().saturating_sub(width)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 9, 13, 12, 26, 40).unwrap()
    }

    #[test]
    fn severity_bands() {
        assert_eq!(severity(10.0), Severity::Normal);
        assert_eq!(severity(60.0), Severity::Elevated);
        assert_eq!(severity(80.0), Severity::Warning);
        assert_eq!(severity(95.0), Severity::Critical);
    }

    #[test]
    fn format_used_percent_truncates() {
        assert_eq!(format_used_percent(28.9), "28% used");
        assert_eq!(format_used_percent(0.0), "0% used");
        assert_eq!(format_used_percent(-3.0), "0% used");
    }

    #[test]
    fn countdown_past_is_now() {
        let past = now() - Duration::seconds(10);
        assert_eq!(format_reset_countdown(&past, now()), "Resets now");
    }

    #[test]
    fn countdown_units() {
        let at = |secs| now() + Duration::seconds(secs);
        assert_eq!(format_reset_countdown(&at(30), now()), "Resets in 30 secs");
        assert_eq!(format_reset_countdown(&at(60), now()), "Resets in 1 min");
        assert_eq!(format_reset_countdown(&at(7_200), now()), "Resets in 2 hrs");
        assert_eq!(format_reset_countdown(&at(8_100), now()), "Resets in 2h 15m");
        assert_eq!(format_reset_countdown(&at(90_000), now()), "Resets in 1d 1h");
        assert_eq!(format_reset_countdown(&at(86_400 * 8 + 3_600), now()), "Resets in 8d");
    }

    #[test]
    fn time_ago_units() {
        let ago = |secs| now() - Duration::seconds(secs);
        assert_eq!(format_time_ago(&ago(30), now()), "30 secs ago");
        assert_eq!(format_time_ago(&ago(1), now()), "1 sec ago");
        assert_eq!(format_time_ago(&ago(300), now()), "5 mins ago");
        assert_eq!(format_time_ago(&ago(7_200), now()), "2 hrs ago");
        assert_eq!(format_time_ago(&ago(172_800), now()), "2 days ago");
        assert_eq!(format_time_ago(&(now() + Duration::seconds(5)), now()), "0 secs ago");
    }

    #[test]
    fn usage_bar_width() {
        assert_eq!(format_usage_bar(0.0, 12), "[░░░░░░░░░░░░]");
        assert_eq!(format_usage_bar(100.0, 12), "[████████████]");
        assert_eq!(format_usage_bar(50.0, 12), "[██████░░░░░░]");
        assert_eq!(format_usage_bar(150.0, 4), "[████]");
    }

    #[test]
    fn sparkline_levels() {
        assert_eq!(format_sparkline(&[0.0, 50.0, 100.0]), "▁▅█");
        assert_eq!(format_sparkline(&[]), "");
    }

    #[test]
    fn tail_keeps_latest_points() {
        let series = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(tail(&series, 2), &[3.0, 4.0]);
        assert_eq!(tail(&series, 10), &series);
    }
}
