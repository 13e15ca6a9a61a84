use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::core::models::usage::MetricKind;

pub const WARNING_THRESHOLD: u8 = 80;
pub const CRITICAL_THRESHOLD: u8 = 90;

pub const ALERT_TITLE: &str = "Claude Usage Alert";

/// Last threshold alerted per metric. Lives as long as the scheduler that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifierState {
    last_notified: HashMap<String, u8>,
}

impl NotifierState {
    pub fn last_notified(&self, metric: &str) -> Option<u8> {
        self.last_notified.get(metric).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub metric: String,
    pub threshold: u8,
    pub percentage: f64,
}

impl Alert {
    /// Stable per metric and band, so repeated deliveries replace each other.
    pub fn identifier(&self) -> String {
        format!("{}-{}", self.metric, self.threshold)
    }

    /// Numeric form of `identifier()` for notification servers that replace
    /// by id. FNV-1a, never zero (zero asks for a fresh notification).
    pub fn replace_id(&self) -> u32 {
        let hash = self
            .identifier()
            .bytes()
            .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
        hash.max(1)
    }

    pub fn body(&self) -> String {
        let label = MetricKind::from_key(&self.metric)
            .map(|k| k.label())
            .unwrap_or(self.metric.as_str());
        format!("{} usage is at {}%", label, self.percentage as i64)
    }
}

fn band(percentage: f64) -> Option<u8> {
    if percentage >= f64::from(CRITICAL_THRESHOLD) {
        Some(CRITICAL_THRESHOLD)
    } else if percentage >= f64::from(WARNING_THRESHOLD) {
        Some(WARNING_THRESHOLD)
    } else {
        None
    }
}

/// Decide whether `percentage` for `metric` warrants an alert.
///
/// Alerts once per band entered; staying in a band is silent. Dropping below
/// the warning threshold forgets the metric so the next climb alerts again.
pub fn evaluate(metric: &str, percentage: f64, state: &mut NotifierState) -> Option<Alert> {
    let Some(threshold) = band(percentage) else {
        state.last_notified.remove(metric);
        return None;
    };

    if state.last_notified(metric) == Some(threshold) {
        return None;
    }

    state.last_notified.insert(metric.to_string(), threshold);
    Some(Alert {
        metric: metric.to_string(),
        threshold,
        percentage,
    })
}

/// Where alerts are delivered.
pub trait AlertSink: Send {
    fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log.
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&self, alert: &Alert) -> Result<()> {
        warn!(
            id = %alert.identifier(),
            threshold = alert.threshold,
            percentage = alert.percentage,
            "{}",
            alert.body()
        );
        Ok(())
    }
}

/// OS desktop notification.
#[cfg(feature = "desktop-notify")]
pub struct DesktopSink;

#[cfg(feature = "desktop-notify")]
impl DesktopSink {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            static MACOS_APP_INIT: std::sync::Once = std::sync::Once::new();
            MACOS_APP_INIT.call_once(|| {
                // A bundle-less CLI has to borrow an application identity.
                if let Err(e) = notify_rust::set_application("com.apple.Terminal") {
                    warn!(error = %e, "failed to set notification application");
                }
            });
        }
        Self
    }
}

#[cfg(feature = "desktop-notify")]
impl Default for DesktopSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "desktop-notify")]
impl AlertSink for DesktopSink {
    fn deliver(&self, alert: &Alert) -> Result<()> {
        tracing::debug!(id = %alert.identifier(), "sending desktop notification");
        let mut notification = notify_rust::Notification::new();
        notification.appname("cmon").summary(ALERT_TITLE).body(&alert.body());
        #[cfg(all(unix, not(target_os = "macos")))]
        notification.id(alert.replace_id());
        notification
            .show()
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("desktop notification failed: {}", e))
    }
}
