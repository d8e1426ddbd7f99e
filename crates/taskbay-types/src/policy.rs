use crate::id::UserId;
use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record in the append-only fee policy history. Percentages are
/// stored as whole numbers in [0, 100] and converted to fractions at
/// computation time. The current policy is the most recently created
/// record; policy updates never mutate history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePolicyRecord {
    pub platform_fee_percent: f64,
    pub commission_percent: f64,
    pub trust_and_support_fee: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<UserId>,
}

impl FeePolicyRecord {
    /// Built-in policy used when no record has ever been created:
    /// 5% platform fee, 15% commission, $2.00 trust & support.
    pub fn default_policy() -> Self {
        Self {
            platform_fee_percent: 5.0,
            commission_percent: 15.0,
            trust_and_support_fee: Amount::from_major(2),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_by: None,
        }
    }

    pub fn platform_fee_fraction(&self) -> f64 {
        self.platform_fee_percent / 100.0
    }

    pub fn commission_fraction(&self) -> f64 {
        self.commission_percent / 100.0
    }
}

/// Monetary snapshot derived from a task's budget under a fee policy.
/// Persisted onto the task at creation and budget-edit time; never
/// recomputed retroactively when the global policy changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub platform_fee: Amount,
    pub commission_amount: Amount,
    pub trust_and_support_fee: Amount,
    pub final_tasker_payout: Amount,
    pub total_paid_by_customer: Amount,
}
