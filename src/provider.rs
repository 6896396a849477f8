use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Literal prefix of every prediction identifier.
pub const PREDICTION_ID_PREFIX: &str = "demo_";

/// Number of hex characters following the prefix.
pub const PREDICTION_ID_HEX_LEN: usize = 12;

/// Source of wall-clock time and identifier randomness.
///
/// These are the only impure inputs of a prediction; swapping the provider
/// makes responses fully reproducible in tests.
pub trait RuntimeProvider: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Fresh prediction identifier (`demo_` + 12 hex characters).
    fn prediction_id(&self) -> String;
}

/// Production provider backed by the system clock and UUID v4 randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProvider;

impl RuntimeProvider for SystemProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn prediction_id(&self) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{}{}", PREDICTION_ID_PREFIX, &hex[..PREDICTION_ID_HEX_LEN])
    }
}

/// Deterministic provider: a frozen clock and a fixed id suffix.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    pub now: DateTime<Utc>,
    pub id_suffix: String,
}

impl FixedProvider {
    pub fn new(now: DateTime<Utc>, id_suffix: impl Into<String>) -> Self {
        Self {
            now,
            id_suffix: id_suffix.into(),
        }
    }
}

impl RuntimeProvider for FixedProvider {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn prediction_id(&self) -> String {
        format!("{}{}", PREDICTION_ID_PREFIX, self.id_suffix)
    }
}

/// Checks the `demo_` + 12 lowercase hex characters shape.
pub fn is_prediction_id(id: &str) -> bool {
    id.strip_prefix(PREDICTION_ID_PREFIX).is_some_and(|suffix| {
        suffix.len() == PREDICTION_ID_HEX_LEN
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_system_ids_have_expected_shape() {
        let provider = SystemProvider;
        for _ in 0..50 {
            let id = provider.prediction_id();
            assert!(is_prediction_id(&id), "unexpected id {}", id);
        }
    }

    #[test]
    fn test_system_ids_are_fresh() {
        let provider = SystemProvider;
        let ids: HashSet<String> = (0..100).map(|_| provider.prediction_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_fixed_provider_is_stable() {
        let now = Utc::now();
        let provider = FixedProvider::new(now, "0123456789ab");
        assert_eq!(provider.now(), now);
        assert_eq!(provider.prediction_id(), "demo_0123456789ab");
        assert_eq!(provider.prediction_id(), provider.prediction_id());
    }

    #[test]
    fn test_id_shape_check() {
        assert!(is_prediction_id("demo_abcdef012345"));
        assert!(!is_prediction_id("demo_ABCDEF012345"));
        assert!(!is_prediction_id("demo_abcdef01234"));
        assert!(!is_prediction_id("test_abcdef012345"));
        assert!(!is_prediction_id("demo_abcdef01234g"));
    }
}
