//! Alert rule and notification types

use crate::constants::NOTIFICATION_DISPLAY_SECS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Direction of a price alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    /// Both bounds are inclusive
    pub fn is_met(&self, price: f64, target: f64) -> bool {
        match self {
            AlertCondition::Above => price >= target,
            AlertCondition::Below => price <= target,
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCondition::Above => write!(f, "above"),
            AlertCondition::Below => write!(f, "below"),
        }
    }
}

/// A user-defined price alert
///
/// Serialized with camelCase keys; the persisted array is read back by the
/// same shape and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: String,
    pub coin_id: String,
    pub coin_name: String,
    pub target_price: f64,
    pub condition: AlertCondition,
    /// Terminal once set
    pub triggered: bool,
    /// Creation time (unix ms)
    pub created_at: i64,
}

impl AlertRule {
    pub fn new(coin_id: &str, coin_name: &str, target_price: f64, condition: AlertCondition) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            coin_id: coin_id.to_string(),
            coin_name: coin_name.to_string(),
            target_price,
            condition,
            triggered: false,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Human-readable trigger message, e.g. `Bitcoin is now above $49,000`
    pub fn message(&self) -> String {
        format!(
            "{} is now {} ${}",
            self.coin_name,
            self.condition,
            format_usd(self.target_price)
        )
    }
}

/// One-shot notification emitted when a rule triggers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertNotification {
    pub id: Uuid,
    pub rule_id: String,
    pub coin_id: String,
    pub message: String,
    pub emitted_at: DateTime<Utc>,
    /// How long the consumer should keep it on screen
    pub display_for: Duration,
}

impl AlertNotification {
    pub fn for_rule(rule: &AlertRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule.id.clone(),
            coin_id: rule.coin_id.clone(),
            message: rule.message(),
            emitted_at: Utc::now(),
            display_for: Duration::from_secs(NOTIFICATION_DISPLAY_SECS),
        }
    }

    /// True once the display duration has elapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let shown = now.signed_duration_since(self.emitted_at);
        shown.num_milliseconds() >= self.display_for.as_millis() as i64
    }
}

impl fmt::Display for AlertNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Formats a dollar amount with en-US digit grouping and at most three
/// fraction digits: `49000.0` -> `49,000`, `1234.5678` -> `1,234.568`
pub fn format_usd(value: f64) -> String {
    let formatted = format!("{:.3}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && (grouped != "0" || !frac_part.is_empty()) {
        "-"
    } else {
        ""
    };

    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(49000.0), "49,000");
        assert_eq!(format_usd(1234.5678), "1,234.568");
        assert_eq!(format_usd(0.5), "0.5");
        assert_eq!(format_usd(999.0), "999");
        assert_eq!(format_usd(1_000_000.25), "1,000,000.25");
        assert_eq!(format_usd(0.0001), "0");
    }

    #[test]
    fn test_condition_bounds_are_inclusive() {
        assert!(AlertCondition::Above.is_met(100.0, 100.0));
        assert!(!AlertCondition::Above.is_met(99.99, 100.0));
        assert!(AlertCondition::Below.is_met(100.0, 100.0));
        assert!(!AlertCondition::Below.is_met(100.01, 100.0));
    }

    #[test]
    fn test_rule_message() {
        let rule = AlertRule::new("bitcoin", "Bitcoin", 49000.0, AlertCondition::Above);
        assert_eq!(rule.message(), "Bitcoin is now above $49,000");

        let rule = AlertRule::new("solana", "Solana", 142.5, AlertCondition::Below);
        assert_eq!(rule.message(), "Solana is now below $142.5");
    }

    #[test]
    fn test_rule_serializes_with_camel_case_keys() {
        let rule = AlertRule {
            id: "a1".to_string(),
            coin_id: "ethereum".to_string(),
            coin_name: "Ethereum".to_string(),
            target_price: 3000.0,
            condition: AlertCondition::Below,
            triggered: false,
            created_at: 1_700_000_000_000,
        };

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "a1",
                "coinId": "ethereum",
                "coinName": "Ethereum",
                "targetPrice": 3000.0,
                "condition": "below",
                "triggered": false,
                "createdAt": 1_700_000_000_000i64
            })
        );
    }

    #[test]
    fn test_notification_expiry() {
        let rule = AlertRule::new("bitcoin", "Bitcoin", 1.0, AlertCondition::Above);
        let notification = AlertNotification::for_rule(&rule);

        assert!(!notification.is_expired(notification.emitted_at));
        assert!(notification.is_expired(notification.emitted_at + chrono::Duration::seconds(5)));
        assert_eq!(notification.to_string(), "Bitcoin is now above $1");
    }
}
