//! Alert engine: rule set, evaluation and notifications

use crate::{
    alerts::{
        rule::{AlertCondition, AlertNotification, AlertRule},
        storage::KeyValueStore,
    },
    constants::{ALERTS_STORAGE_KEY, NOTIFICATION_CHANNEL_CAPACITY},
    error::{AlertError, StorageError},
    types::PriceSnapshot,
};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Holds the alert rules and turns price snapshots into notifications
///
/// Rules are loaded once from the store and written back after every
/// mutation. `evaluate` is the only path that sets `triggered`.
///
/// Notifications go two ways: every emission is broadcast to subscribers,
/// and the most recent one sits in a single slot (last emitted wins) until
/// the consumer dismisses it.
pub struct AlertEngine {
    rules: watch::Sender<Vec<AlertRule>>,
    store: Arc<dyn KeyValueStore>,
    latest: watch::Sender<Option<AlertNotification>>,
    events: broadcast::Sender<AlertNotification>,
}

impl AlertEngine {
    /// Loads the persisted rules from `store`
    ///
    /// A missing, unreadable or corrupt value loads as an empty rule set.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let rules = load_rules(store.as_ref());
        tracing::info!(rules = rules.len(), "Alert rules loaded");

        let (rules, _) = watch::channel(rules);
        let (latest, _) = watch::channel(None);
        let (events, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);

        Self {
            rules,
            store,
            latest,
            events,
        }
    }

    /// Returns the rules in creation order
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.borrow().clone()
    }

    /// Subscribes to rule list changes
    pub fn watch_rules(&self) -> watch::Receiver<Vec<AlertRule>> {
        self.rules.subscribe()
    }

    /// Appends a new untriggered rule
    ///
    /// Rejects targets that are not finite positive numbers without touching
    /// the rule set.
    pub fn add_rule(
        &self,
        coin_id: &str,
        coin_name: &str,
        target_price: f64,
        condition: AlertCondition,
    ) -> Result<AlertRule, AlertError> {
        if !target_price.is_finite() || target_price <= 0.0 {
            return Err(AlertError::InvalidTargetPrice(target_price));
        }

        let rule = AlertRule::new(coin_id, coin_name, target_price, condition);
        self.rules.send_modify(|rules| {
            rules.push(rule.clone());
            self.persist(rules);
        });

        tracing::info!(
            rule_id = %rule.id,
            coin = %rule.coin_id,
            target_price,
            condition = %condition,
            "Alert rule added"
        );
        Ok(rule)
    }

    /// Deletes a rule by id; returns whether one was removed
    pub fn remove_rule(&self, id: &str) -> bool {
        let removed = self.rules.send_if_modified(|rules| {
            let before = rules.len();
            rules.retain(|r| r.id != id);
            if rules.len() == before {
                return false;
            }
            self.persist(rules);
            true
        });

        if removed {
            tracing::info!(rule_id = id, "Alert rule removed");
        }
        removed
    }

    /// Evaluates untriggered rules against a fresh price snapshot
    ///
    /// Returns the notifications emitted by this pass, one per rule that
    /// triggered. Rules whose coin is not in the snapshot are left alone.
    pub fn evaluate(&self, snapshot: &[PriceSnapshot]) -> Vec<AlertNotification> {
        if snapshot.is_empty() {
            return Vec::new();
        }

        let mut fired = Vec::new();
        self.rules.send_if_modified(|rules| {
            for rule in rules.iter_mut().filter(|r| !r.triggered) {
                let Some(coin) = snapshot.iter().find(|p| p.id == rule.coin_id) else {
                    continue;
                };

                if rule.condition.is_met(coin.current_price, rule.target_price) {
                    rule.triggered = true;
                    fired.push(AlertNotification::for_rule(rule));
                }
            }

            if fired.is_empty() {
                return false;
            }
            self.persist(rules);
            true
        });

        for notification in &fired {
            tracing::info!(
                rule_id = %notification.rule_id,
                message = %notification.message,
                "Alert triggered"
            );
            self.latest.send_replace(Some(notification.clone()));
            // No subscribers is fine, the latest slot still holds it
            let _ = self.events.send(notification.clone());
        }

        fired
    }

    /// Most recent notification, until dismissed
    pub fn latest_notification(&self) -> Option<AlertNotification> {
        self.latest.borrow().clone()
    }

    /// Clears the latest-notification slot
    pub fn dismiss_notification(&self) {
        self.latest.send_replace(None);
    }

    /// Follows the latest-notification slot
    pub fn watch_notification(&self) -> watch::Receiver<Option<AlertNotification>> {
        self.latest.subscribe()
    }

    /// Receives every notification as it is emitted
    pub fn subscribe(&self) -> broadcast::Receiver<AlertNotification> {
        self.events.subscribe()
    }

    fn persist(&self, rules: &[AlertRule]) {
        let result = serde_json::to_string(rules)
            .map_err(StorageError::from)
            .and_then(|raw| self.store.set(ALERTS_STORAGE_KEY, &raw));

        // The in-memory set stays authoritative when the write fails
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist alert rules");
        }
    }
}

fn load_rules(store: &dyn KeyValueStore) -> Vec<AlertRule> {
    let raw = match store.get(ALERTS_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read alert rules, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!(error = %e, "Stored alert rules are corrupt, starting empty");
            Vec::new()
        }
    }
}
