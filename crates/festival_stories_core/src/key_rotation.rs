//! crates/festival_stories_core/src/key_rotation.rs
//!
//! Round-robin selection across the configured credentials of a rate-limited
//! external service. The manager is a pure state machine over usage counters:
//! it reports what it did as `RotationEvent`s and leaves notification to the caller.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Assumed per-credential daily request cap enforced by the external service.
pub const DAILY_REQUEST_CAP: u32 = 50;
/// Requests today at which a credential counts as near its limit.
pub const WARNING_THRESHOLD: u32 = 45;
/// The next credential must be this many requests below the current one
/// before a proactive switch happens.
pub const PROACTIVE_SWITCH_MARGIN: u32 = 10;

/// A named credential for the external service.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
    pub name: String,
    pub key: String,
}

impl ApiCredential {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    pub requests: u32,
    pub errors: u32,
}

/// Per-credential, per-day counters. A day with no entry reads as zero, so
/// counters reset by themselves when the date rolls over.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    by_key: HashMap<String, HashMap<String, DailyUsage>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage(&self, key_name: &str, day: NaiveDate) -> DailyUsage {
        self.by_key
            .get(key_name)
            .and_then(|days| days.get(&day_key(day)))
            .copied()
            .unwrap_or_default()
    }

    pub fn record(&mut self, key_name: &str, day: NaiveDate, success: bool) {
        let usage = self
            .by_key
            .entry(key_name.to_string())
            .or_default()
            .entry(day_key(day))
            .or_default();
        usage.requests += 1;
        if !success {
            usage.errors += 1;
        }
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// What the manager did in response to a usage report or a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationEvent {
    /// The current credential neared its cap and a noticeably fresher one took over.
    ProactiveSwitch {
        from: String,
        to: String,
        from_requests: u32,
        to_requests: u32,
    },
    /// The external service rejected the current credential; the next one took over.
    ReactiveSwitch { from: String, to: String },
    /// No other credential is left to switch to.
    Exhausted,
}

/// Usage snapshot of one credential, safe to show to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub name: String,
    pub requests: u32,
    pub errors: u32,
    pub daily_cap: u32,
    pub active: bool,
    pub near_limit: bool,
}

pub struct KeyRotationManager {
    keys: Vec<ApiCredential>,
    current: usize,
    ledger: UsageLedger,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl KeyRotationManager {
    pub fn new(keys: Vec<ApiCredential>) -> Self {
        Self::with_ledger(keys, UsageLedger::new(), local_today)
    }

    /// Builds a manager over existing counters and an explicit calendar.
    pub fn with_ledger(keys: Vec<ApiCredential>, ledger: UsageLedger, today: fn() -> NaiveDate) -> Self {
        Self {
            keys,
            current: 0,
            ledger,
            today,
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// The credential at the rotation index, or `None` when nothing is configured.
    pub fn current_key(&self) -> Option<&ApiCredential> {
        self.keys.get(self.current)
    }

    pub fn daily_usage(&self, key_name: &str) -> DailyUsage {
        self.ledger.usage(key_name, (self.today)())
    }

    fn current_usage(&self) -> DailyUsage {
        self.current_key()
            .map(|key| self.daily_usage(&key.name))
            .unwrap_or_default()
    }

    /// True once the current credential has used `WARNING_THRESHOLD` requests today.
    pub fn should_warn(&self) -> bool {
        self.current_key().is_some() && self.current_usage().requests >= WARNING_THRESHOLD
    }

    /// Counts one call against the current credential. A successful call that
    /// pushes the credential past the warning threshold may rotate proactively.
    pub fn record_usage(&mut self, success: bool) -> Option<RotationEvent> {
        let name = self.current_key()?.name.clone();
        let today = (self.today)();
        self.ledger.record(&name, today, success);

        if success && self.should_warn() {
            self.proactive_switch()
        } else {
            None
        }
    }

    fn next_index(&self) -> usize {
        (self.current + 1) % self.keys.len()
    }

    fn proactive_switch(&mut self) -> Option<RotationEvent> {
        if self.keys.len() <= 1 {
            return None;
        }
        let next = self.next_index();
        let from = self.keys[self.current].name.clone();
        let to = self.keys[next].name.clone();
        let from_requests = self.daily_usage(&from).requests;
        let to_requests = self.daily_usage(&to).requests;

        if to_requests + PROACTIVE_SWITCH_MARGIN < from_requests {
            self.current = next;
            Some(RotationEvent::ProactiveSwitch {
                from,
                to,
                from_requests,
                to_requests,
            })
        } else {
            None
        }
    }

    /// Advances to the next credential regardless of its usage, or reports
    /// exhaustion when there is nothing to advance to.
    pub fn handle_rate_limit_error(&mut self) -> RotationEvent {
        if self.keys.len() <= 1 {
            return RotationEvent::Exhausted;
        }
        let from = self.keys[self.current].name.clone();
        self.current = self.next_index();
        RotationEvent::ReactiveSwitch {
            from,
            to: self.keys[self.current].name.clone(),
        }
    }

    pub fn status(&self) -> Vec<KeyStatus> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let usage = self.daily_usage(&key.name);
                KeyStatus {
                    name: key.name.clone(),
                    requests: usage.requests,
                    errors: usage.errors,
                    daily_cap: DAILY_REQUEST_CAP,
                    active: i == self.current,
                    near_limit: usage.requests >= WARNING_THRESHOLD,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
    }

    fn keys(n: usize) -> Vec<ApiCredential> {
        (0..n)
            .map(|i| ApiCredential::new(format!("key{}", i), format!("sk-{}", i)))
            .collect()
    }

    fn ledger_with(counts: &[(&str, u32)]) -> UsageLedger {
        let mut ledger = UsageLedger::new();
        for (name, count) in counts {
            for _ in 0..*count {
                ledger.record(name, fixed_day(), true);
            }
        }
        ledger
    }

    #[test]
    fn no_keys_means_no_current_key() {
        let mut manager = KeyRotationManager::new(Vec::new());
        assert!(manager.current_key().is_none());
        assert!(!manager.should_warn());
        assert_eq!(manager.record_usage(true), None);
        assert_eq!(manager.handle_rate_limit_error(), RotationEvent::Exhausted);
    }

    #[test]
    fn switches_proactively_to_a_much_fresher_key() {
        let ledger = ledger_with(&[("key0", 46), ("key1", 10)]);
        let mut manager = KeyRotationManager::with_ledger(keys(3), ledger, fixed_day);

        let event = manager.record_usage(true);

        assert_eq!(
            event,
            Some(RotationEvent::ProactiveSwitch {
                from: "key0".into(),
                to: "key1".into(),
                from_requests: 47,
                to_requests: 10,
            })
        );
        assert_eq!(manager.current_key().unwrap().name, "key1");
    }

    #[test]
    fn does_not_thrash_between_similarly_used_keys() {
        let ledger = ledger_with(&[("key0", 46), ("key1", 40)]);
        let mut manager = KeyRotationManager::with_ledger(keys(2), ledger, fixed_day);

        assert_eq!(manager.record_usage(true), None);
        assert_eq!(manager.current_key().unwrap().name, "key0");
        assert!(manager.should_warn());
    }

    #[test]
    fn failed_calls_count_errors_and_never_rotate_proactively() {
        let ledger = ledger_with(&[("key0", 46)]);
        let mut manager = KeyRotationManager::with_ledger(keys(2), ledger, fixed_day);

        assert_eq!(manager.record_usage(false), None);
        assert_eq!(manager.daily_usage("key0"), DailyUsage { requests: 47, errors: 1 });
        assert_eq!(manager.current_key().unwrap().name, "key0");
    }

    #[test]
    fn rate_limit_with_one_key_is_exhaustion() {
        let mut manager = KeyRotationManager::with_ledger(keys(1), UsageLedger::new(), fixed_day);
        assert_eq!(manager.handle_rate_limit_error(), RotationEvent::Exhausted);
        assert_eq!(manager.current_key().unwrap().name, "key0");
    }

    #[test]
    fn rate_limit_advances_and_wraps_regardless_of_usage() {
        let ledger = ledger_with(&[("key1", 49)]);
        let mut manager = KeyRotationManager::with_ledger(keys(2), ledger, fixed_day);

        assert_eq!(
            manager.handle_rate_limit_error(),
            RotationEvent::ReactiveSwitch { from: "key0".into(), to: "key1".into() }
        );
        assert_eq!(
            manager.handle_rate_limit_error(),
            RotationEvent::ReactiveSwitch { from: "key1".into(), to: "key0".into() }
        );
    }

    #[test]
    fn yesterdays_usage_does_not_count_today() {
        let mut ledger = UsageLedger::new();
        let yesterday = fixed_day().pred_opt().unwrap();
        for _ in 0..48 {
            ledger.record("key0", yesterday, true);
        }
        let manager = KeyRotationManager::with_ledger(keys(1), ledger, fixed_day);
        assert_eq!(manager.daily_usage("key0"), DailyUsage::default());
        assert!(!manager.should_warn());
    }

    #[test]
    fn status_marks_active_and_near_limit_keys() {
        let ledger = ledger_with(&[("key0", 45), ("key1", 3)]);
        let manager = KeyRotationManager::with_ledger(keys(2), ledger, fixed_day);
        let status = manager.status();
        assert!(status[0].active && status[0].near_limit);
        assert!(!status[1].active && !status[1].near_limit);
        assert!(!format!("{:?}", manager.current_key()).contains("sk-0"));
    }
}
