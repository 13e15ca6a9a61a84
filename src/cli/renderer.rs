use chrono::{DateTime, Utc};
use colored::{control, ColoredString, Colorize};

use crate::core::formatter::{
    format_reset_countdown, format_sparkline, format_time_ago, format_usage_bar,
    format_used_percent, severity, tail, Severity,
};
use crate::core::models::usage::{MetricKind, PlanInfo, UsageMetric, UsageSnapshot};
use crate::core::scheduler::{FetchFailure, PollStatus};

const BAR_WIDTH: usize = 12;
const SPARK_WIDTH: usize = 48;

/// Render a usage snapshot as a colored (or plain) block.
///
/// Layout:
/// ```text
///  Claude Max (20X)
///   Session  72% used [█████████░░░]
///            Resets in 2h 15m
///   Weekly   41% used [█████░░░░░░░]
///            Resets in 3d 4h
///   Updated  30 secs ago
/// ```
pub fn render_usage(
    snapshot: &UsageSnapshot,
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    use_color: bool,
) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = vec![header(snapshot.plan.as_ref()).bold().to_string()];

    let metrics = snapshot.metrics();
    if metrics.is_empty() {
        lines.push(format!("  {}", "No usage windows reported".dimmed()));
    }
    for (kind, metric) in metrics {
        render_metric(&mut lines, kind, metric, now);
    }

    if let Some(updated) = last_updated {
        lines.push(format!(
            "  {}  {}",
            "Updated".cyan(),
            format_time_ago(&updated, now).dimmed()
        ));
    }

    lines.join("\n")
}

fn header(plan: Option<&PlanInfo>) -> String {
    match plan {
        Some(plan) => match &plan.tier {
            Some(tier) => format!(" {} ({})", plan.subscription, tier),
            None => format!(" {}", plan.subscription),
        },
        None => " Claude".to_string(),
    }
}

fn render_metric(lines: &mut Vec<String>, kind: MetricKind, metric: &UsageMetric, now: DateTime<Utc>) {
    let percent_str = format_used_percent(metric.utilization);
    let bar_str = format_usage_bar(metric.utilization, BAR_WIDTH);

    lines.push(format!(
        "  {}  {} {}",
        format!("{:<7}", kind.label()).cyan(),
        color_by_severity(metric.utilization, &percent_str),
        bar_str.magenta()
    ));

    if let Some(resets_at) = &metric.resets_at {
        // align under the percent column
        lines.push(format!("           {}", format_reset_countdown(resets_at, now).dimmed()));
    }
}

fn color_by_severity(utilization: f64, text: &str) -> ColoredString {
    match severity(utilization) {
        Severity::Critical => text.red(),
        Severity::Warning => text.truecolor(255, 165, 0),
        Severity::Elevated => text.yellow(),
        Severity::Normal => text.green(),
    }
}

/// Render a failed poll. An expired credential is an inactive state, not a fault.
pub fn render_error(failure: &FetchFailure, use_color: bool) -> String {
    control::set_override(use_color);

    if failure.is_credential_expired() {
        let msg = "  Inactive: session expired. Run `claude` to re-authenticate.";
        format!("{}\n{}", " Claude (inactive)".bold(), msg.yellow())
    } else {
        let msg = format!("  {}", failure.message);
        format!("{}\n{}", " Claude (error)".bold(), msg.red())
    }
}

/// Render the scheduler's published state for `watch`.
pub fn render_status(
    status: &PollStatus,
    now: DateTime<Utc>,
    use_color: bool,
) -> String {
    let mut sections: Vec<String> = Vec::new();
    match &status.snapshot {
        Some(snapshot) => sections.push(render_usage(snapshot, status.last_updated, now, use_color)),
        None if status.last_error.is_none() => {
            control::set_override(use_color);
            sections.push(format!("{}\n  {}", header(None).bold(), "Waiting for first poll...".dimmed()));
        }
        None => {}
    }
    if let Some(failure) = &status.last_error {
        sections.push(render_error(failure, use_color));
    }
    sections.join("\n\n")
}

/// Render the stored trend as one sparkline per series.
pub fn render_history(session: &[f64], weekly: &[f64], use_color: bool) -> String {
    control::set_override(use_color);

    if session.is_empty() {
        return format!("  {}", "No usage history recorded yet".dimmed());
    }

    let mut lines = vec![format!(" History ({} samples)", session.len()).bold().to_string()];
    for (label, series) in [("Session", session), ("Weekly", weekly)] {
        let latest = series.last().copied().unwrap_or(0.0);
        lines.push(format!(
            "  {}  {} {}",
            format!("{:<7}", label).cyan(),
            format_sparkline(tail(series, SPARK_WIDTH)).magenta(),
            color_by_severity(latest, &format!("{}%", latest as i64))
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 4, 12, 0, 0).unwrap()
    }

    fn make_snapshot() -> UsageSnapshot {
        UsageSnapshot {
            five_hour: Some(UsageMetric {
                utilization: 72.0,
                resets_at: Some(now() + Duration::minutes(135)),
            }),
            seven_day: Some(UsageMetric {
                utilization: 41.0,
                resets_at: None,
            }),
            ..Default::default()
        }
    }

    fn make_plan() -> PlanInfo {
        PlanInfo {
            subscription: "Claude Max".to_string(),
            tier: Some("20X".to_string()),
        }
    }

    #[test]
    fn render_contains_labels_and_countdown() {
        let output = render_usage(&make_snapshot(), None, now(), false);
        assert!(output.contains("Session"));
        assert!(output.contains("72% used"));
        assert!(output.contains("Weekly"));
        assert!(output.contains("41% used"));
        assert!(output.contains("Resets in 2h 15m"));
        assert!(!output.contains("Opus"));
    }

    #[test]
    fn render_contains_plan_header() {
        let snapshot = UsageSnapshot {
            plan: Some(make_plan()),
            ..make_snapshot()
        };
        let output = render_usage(&snapshot, None, now(), false);
        assert!(output.starts_with(" Claude Max (20X)"));
    }

    #[test]
    fn render_contains_last_updated() {
        let output = render_usage(
            &make_snapshot(),
            Some(now() - Duration::minutes(5)),
            now(),
            false,
        );
        assert!(output.contains("Updated"));
        assert!(output.contains("5 mins ago"));
    }

    #[test]
    fn render_empty_snapshot() {
        let output = render_usage(&UsageSnapshot::default(), None, now(), false);
        assert!(output.contains("No usage windows reported"));
    }

    #[test]
    fn render_no_ansi_when_color_false() {
        let output = render_usage(&make_snapshot(), None, now(), false);
        assert!(!output.contains('\x1b'), "output should not contain ANSI codes");
    }

    #[test]
    fn render_expired_credential_as_inactive() {
        let failure = FetchFailure {
            kind: "credential_expired",
            message: "credential expired".to_string(),
        };
        let output = render_error(&failure, false);
        assert!(output.contains("inactive"));
        assert!(output.contains("re-authenticate"));
    }

    #[test]
    fn render_other_errors_verbatim() {
        let failure = FetchFailure {
            kind: "network_error",
            message: "network error: connection refused".to_string(),
        };
        let output = render_error(&failure, false);
        assert!(output.contains("(error)"));
        assert!(output.contains("connection refused"));
    }

    #[test]
    fn render_status_keeps_snapshot_alongside_error() {
        let status = PollStatus {
            snapshot: Some(make_snapshot()),
            last_updated: Some(now()),
            last_error: Some(FetchFailure {
                kind: "invalid_response",
                message: "invalid response (HTTP 500)".to_string(),
            }),
            ..Default::default()
        };
        let output = render_status(&status, now(), false);
        assert!(output.contains("72% used"));
        assert!(output.contains("HTTP 500"));
    }

    #[test]
    fn render_status_before_first_poll() {
        let output = render_status(&PollStatus::default(), now(), false);
        assert!(output.contains("Waiting for first poll"));
    }

    #[test]
    fn render_history_sparklines() {
        let output = render_history(&[0.0, 50.0, 100.0], &[10.0, 20.0, 30.0], false);
        assert!(output.contains("3 samples"));
        assert!(output.contains("▁▅█"));
        assert!(output.contains("30%"));
        assert!(render_history(&[], &[], false).contains("No usage history"));
    }
}
