//! Fee policy resolution and fee computation.
//!
//! The policy history is append-only: an administrative update creates a
//! new record and the most recent record is the current policy. Fee
//! computation itself is a pure function; the lifecycle manager decides
//! when a task's snapshot is (re)computed.

use crate::error::{MarketError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use taskbay_storage::StorageEngine;
use taskbay_types::{Actor, Amount, FeeBreakdown, FeePolicyRecord};

/// Administrative policy update, percentages as whole numbers in [0, 100].
#[derive(Debug, Clone)]
pub struct FeePolicyUpdate {
    pub platform_fee_percent: f64,
    pub commission_percent: f64,
    pub trust_and_support_fee: Amount,
}

/// Derive the monetary fields for a budget under a policy.
pub fn compute_fees(budget: Amount, policy: &FeePolicyRecord) -> FeeBreakdown {
    let platform_fee = budget.mul_fraction(policy.platform_fee_fraction());
    let commission_amount = budget.mul_fraction(policy.commission_fraction());
    FeeBreakdown {
        platform_fee,
        commission_amount,
        trust_and_support_fee: policy.trust_and_support_fee,
        final_tasker_payout: budget.saturating_sub(commission_amount),
        total_paid_by_customer: budget
            .saturating_add(platform_fee)
            .saturating_add(policy.trust_and_support_fee),
    }
}

pub struct FeePolicyManager {
    storage: Arc<StorageEngine>,
}

impl FeePolicyManager {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// The current policy: the most recently created record, or the
    /// built-in default when none has ever been written.
    pub async fn current(&self) -> Result<FeePolicyRecord> {
        Ok(self
            .storage
            .latest_fee_policy()
            .await?
            .unwrap_or_else(FeePolicyRecord::default_policy))
    }

    pub async fn history(&self) -> Result<Vec<FeePolicyRecord>> {
        Ok(self.storage.fee_policy_history().await?)
    }

    /// Append a new policy record. Admin-only.
    pub async fn update(&self, update: FeePolicyUpdate, actor: &Actor) -> Result<FeePolicyRecord> {
        if !actor.is_admin() {
            return Err(MarketError::Forbidden(
                "only admins may update the fee policy".into(),
            ));
        }
        validate_percent("platformFeePercent", update.platform_fee_percent)?;
        validate_percent("commissionPercent", update.commission_percent)?;

        let record = FeePolicyRecord {
            platform_fee_percent: update.platform_fee_percent,
            commission_percent: update.commission_percent,
            trust_and_support_fee: update.trust_and_support_fee,
            created_at: Utc::now(),
            updated_by: Some(actor.id),
        };
        self.storage.append_fee_policy(&record).await?;

        info!(
            platform_fee_percent = record.platform_fee_percent,
            commission_percent = record.commission_percent,
            trust_and_support_fee = %record.trust_and_support_fee,
            admin = %actor.id,
            "💰 Fee policy updated"
        );
        Ok(record)
    }
}

fn validate_percent(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(MarketError::Validation(format!(
            "{} must be between 0 and 100, got {}",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbay_storage::StorageConfig;
    use taskbay_types::{Role, UserId};

    fn engine() -> Arc<StorageEngine> {
        Arc::new(
            StorageEngine::new(StorageConfig {
                backend_type: taskbay_storage::BackendType::Memory,
            })
            .unwrap(),
        )
    }

    fn admin() -> Actor {
        Actor::new(UserId::from_bytes([9u8; 32]), Role::Admin, "root", "root@x")
    }

    #[test]
    fn default_policy_scenario() {
        // budget 1000, default policy (5%, 15%, $2)
        let fees = compute_fees(Amount::from_major(1000), &FeePolicyRecord::default_policy());
        assert_eq!(fees.platform_fee, Amount::from_major(50));
        assert_eq!(fees.commission_amount, Amount::from_major(150));
        assert_eq!(fees.trust_and_support_fee, Amount::from_major(2));
        assert_eq!(fees.final_tasker_payout, Amount::from_major(850));
        assert_eq!(fees.total_paid_by_customer, Amount::from_major(1052));
    }

    #[test]
    fn fee_identities_hold() {
        let policy = FeePolicyRecord {
            platform_fee_percent: 7.5,
            commission_percent: 12.0,
            trust_and_support_fee: Amount::from_minor(250),
            created_at: Utc::now(),
            updated_by: None,
        };
        for budget in [1, 37, 999, 123_456] {
            let budget = Amount::from_minor(budget);
            let fees = compute_fees(budget, &policy);
            assert_eq!(
                fees.final_tasker_payout.saturating_add(fees.commission_amount),
                budget
            );
            assert_eq!(
                fees.total_paid_by_customer,
                budget
                    .saturating_add(fees.platform_fee)
                    .saturating_add(fees.trust_and_support_fee)
            );
        }
    }

    #[tokio::test]
    async fn current_falls_back_to_default() {
        let manager = FeePolicyManager::new(engine());
        let policy = manager.current().await.unwrap();
        assert_eq!(policy.platform_fee_percent, 5.0);
        assert_eq!(policy.commission_percent, 15.0);
    }

    #[tokio::test]
    async fn update_appends_and_becomes_current() {
        let manager = FeePolicyManager::new(engine());
        manager
            .update(
                FeePolicyUpdate {
                    platform_fee_percent: 8.0,
                    commission_percent: 10.0,
                    trust_and_support_fee: Amount::from_major(3),
                },
                &admin(),
            )
            .await
            .unwrap();

        let current = manager.current().await.unwrap();
        assert_eq!(current.platform_fee_percent, 8.0);
        assert_eq!(manager.history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_rejects_out_of_range_percent() {
        let manager = FeePolicyManager::new(engine());
        let err = manager
            .update(
                FeePolicyUpdate {
                    platform_fee_percent: 120.0,
                    commission_percent: 10.0,
                    trust_and_support_fee: Amount::ZERO,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn update_requires_admin() {
        let manager = FeePolicyManager::new(engine());
        let customer = Actor::new(UserId::from_bytes([1u8; 32]), Role::Customer, "c", "c@x");
        let err = manager
            .update(
                FeePolicyUpdate {
                    platform_fee_percent: 5.0,
                    commission_percent: 15.0,
                    trust_and_support_fee: Amount::ZERO,
                },
                &customer,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }
}
