use jitsugraph_core::{JitsuGraphError, Result, UsageLedger};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Outcome of an allowed rate check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub used: u64,
    pub limit: u64,
}

/// Decides whether a user may start a pipeline run. Allows iff
/// `used < limit`; a user with no configured limit gets `limit = 0` from the
/// ledger and is denied.
pub struct RateLimitGate {
    ledger: Arc<dyn UsageLedger>,
}

impl RateLimitGate {
    pub fn new(ledger: Arc<dyn UsageLedger>) -> Self {
        Self { ledger }
    }

    /// Parse the caller-supplied identity. A malformed identifier is an
    /// `InvalidIdentity` condition, distinct from any dependency failure.
    pub fn parse_identity(user_id: &str) -> Result<Uuid> {
        Uuid::parse_str(user_id.trim())
            .map_err(|_| JitsuGraphError::InvalidIdentity(user_id.to_string()))
    }

    pub async fn check(&self, user: Uuid) -> Result<RateDecision> {
        let used = self.ledger.usage_count(user).await?;
        let limit = self.ledger.limit_rate(user).await?;
        debug!(%user, used, limit, "rate gate");

        if used < limit {
            Ok(RateDecision { used, limit })
        } else {
            Err(JitsuGraphError::QuotaExceeded { used, limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedLedger {
        used: u64,
        limit: u64,
    }

    #[async_trait]
    impl UsageLedger for FixedLedger {
        async fn usage_count(&self, _user: Uuid) -> Result<u64> {
            Ok(self.used)
        }

        async fn limit_rate(&self, _user: Uuid) -> Result<u64> {
            Ok(self.limit)
        }

        async fn record_use(&self, _user: Uuid, _metadata: serde_json::Value) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn allows_under_limit() {
        let gate = RateLimitGate::new(Arc::new(FixedLedger { used: 2, limit: 5 }));
        let decision = gate.check(Uuid::new_v4()).await.unwrap();
        assert_eq!(decision.used, 2);
        assert_eq!(decision.limit, 5);
    }

    #[tokio::test]
    async fn denies_at_limit() {
        let gate = RateLimitGate::new(Arc::new(FixedLedger { used: 5, limit: 5 }));
        let err = gate.check(Uuid::new_v4()).await.err().unwrap();
        assert!(matches!(
            err,
            JitsuGraphError::QuotaExceeded { used: 5, limit: 5 }
        ));
    }

    #[tokio::test]
    async fn unconfigured_limit_denies_by_default() {
        let gate = RateLimitGate::new(Arc::new(FixedLedger { used: 0, limit: 0 }));
        let err = gate.check(Uuid::new_v4()).await.err().unwrap();
        assert!(matches!(err, JitsuGraphError::QuotaExceeded { .. }));
    }

    #[test]
    fn malformed_identity_is_rejected() {
        let err = RateLimitGate::parse_identity("not-a-uuid").err().unwrap();
        assert!(matches!(err, JitsuGraphError::InvalidIdentity(_)));
    }

    #[test]
    fn well_formed_identity_parses() {
        let id = Uuid::new_v4();
        assert_eq!(RateLimitGate::parse_identity(&id.to_string()).unwrap(), id);
    }
}
