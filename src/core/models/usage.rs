use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback layouts for `resets_at`, tried after RFC 3339 fails.
const RESET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.6f%z", "%Y-%m-%dT%H:%M:%S%z"];

/// The rate windows reported by the usage endpoint, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    FiveHour,
    SevenDay,
    SevenDayOpus,
    SevenDaySonnet,
}

impl MetricKind {
    pub fn all() -> &'static [MetricKind] {
        &[
            Self::FiveHour,
            Self::SevenDay,
            Self::SevenDayOpus,
            Self::SevenDaySonnet,
        ]
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "five_hour" | "session" => Some(Self::FiveHour),
            "seven_day" | "weekly" => Some(Self::SevenDay),
            "seven_day_opus" | "opus" => Some(Self::SevenDayOpus),
            "seven_day_sonnet" | "sonnet" => Some(Self::SevenDaySonnet),
            _ => None,
        }
    }

    /// Stable key, matching the JSON field name of the response.
    pub fn key(&self) -> &'static str {
        match self {
            Self::FiveHour => "five_hour",
            Self::SevenDay => "seven_day",
            Self::SevenDayOpus => "seven_day_opus",
            Self::SevenDaySonnet => "seven_day_sonnet",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FiveHour => "Session",
            Self::SevenDay => "Weekly",
            Self::SevenDayOpus => "Opus",
            Self::SevenDaySonnet => "Sonnet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageMetric {
    /// Percentage of the window's budget consumed, as reported (nominally 0-100)
    pub utilization: f64,
    /// When the window resets, if the server sent a parseable timestamp
    pub resets_at: Option<DateTime<Utc>>,
}

/// Account plan of the credential a snapshot was fetched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanInfo {
    /// "Claude Max", "Claude Pro" or "Claude"
    pub subscription: String,
    /// Rate multiplier such as "20X"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

/// One response from the usage endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub five_hour: Option<UsageMetric>,
    pub seven_day: Option<UsageMetric>,
    pub seven_day_opus: Option<UsageMetric>,
    pub seven_day_sonnet: Option<UsageMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanInfo>,
}

impl UsageSnapshot {
    pub fn metric(&self, kind: MetricKind) -> Option<&UsageMetric> {
        match kind {
            MetricKind::FiveHour => self.five_hour.as_ref(),
            MetricKind::SevenDay => self.seven_day.as_ref(),
            MetricKind::SevenDayOpus => self.seven_day_opus.as_ref(),
            MetricKind::SevenDaySonnet => self.seven_day_sonnet.as_ref(),
        }
    }

    /// Present metrics in display order.
    pub fn metrics(&self) -> Vec<(MetricKind, &UsageMetric)> {
        MetricKind::all()
            .iter()
            .filter_map(|kind| self.metric(*kind).map(|m| (*kind, m)))
            .collect()
    }

    /// Session and weekly utilization, only when both windows are present.
    pub fn history_pair(&self) -> Option<(f64, f64)> {
        match (&self.five_hour, &self.seven_day) {
            (Some(session), Some(weekly)) => Some((session.utilization, weekly.utilization)),
            _ => None,
        }
    }
}

/// Parse a `resets_at` string, returning `None` when no known layout matches.
pub fn parse_reset_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| {
            RESET_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
        })
        .map(|dt| dt.with_timezone(&Utc))
}
