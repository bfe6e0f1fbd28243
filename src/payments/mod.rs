pub mod allocation;
pub mod commit;
pub mod schedule;

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::types::{ItemId, PlanId};

pub use allocation::{AllocationEngine, AllocationLine, AllocationPreview};
pub use commit::{apply_allocation, PlanCommit};
pub use schedule::{CustomInstallment, PlanBuilder, ScheduleGenerator};

/// payment request against an installment plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub plan_id: PlanId,
    /// installment the user selected; allocation runs forward from here
    pub start_item_id: Option<ItemId>,
    pub amount: Money,
    pub reference: String,
}

impl AllocationRequest {
    pub fn new(plan_id: PlanId, start_item_id: ItemId, amount: Money) -> Self {
        Self {
            plan_id,
            start_item_id: Some(start_item_id),
            amount,
            reference: String::new(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// reject requests that cannot reach the allocation engine at all
    pub fn validate(&self) -> Result<ItemId> {
        if !self.amount.is_positive() {
            return Err(EngineError::validation(format!(
                "payment amount {} must be positive",
                self.amount
            )));
        }
        self.start_item_id
            .ok_or_else(|| EngineError::validation("no installment selected for the payment"))
    }
}

#[cfg(test)]
pub(crate) fn example_plan() -> crate::plan::InstallmentPlan {
    use crate::decimal::Rate;
    use crate::plan::{InstallmentPlan, NewPlan, PlanDraft};
    use crate::types::{InterestMethod, PlanOwner, PlanStatus};
    use chrono::{TimeZone, Utc};

    // 120m principal, 20m deposit, 2 years quarterly: 8 x 12.5m
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let items = ScheduleGenerator::default()
        .generate_from(
            Money::from_minor(120_000_000),
            Money::from_minor(20_000_000),
            2,
            4,
            now,
        )
        .unwrap();
    let draft = PlanDraft {
        plan: NewPlan {
            owner: PlanOwner::Contract(1),
            principal_amount: Money::from_minor(120_000_000),
            deposit_amount: Money::from_minor(20_000_000),
            interest_rate: Rate::ZERO,
            interest_method: InterestMethod::Fixed,
            status: PlanStatus::Active,
        },
        items,
    };
    InstallmentPlan::from_draft(1, 1, &draft, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let ok = AllocationRequest::new(1, 3, Money::from_minor(500)).with_reference("receipt-7");
        assert_eq!(ok.validate(), Ok(3));
        assert_eq!(ok.reference, "receipt-7");

        let zero = AllocationRequest::new(1, 3, Money::ZERO);
        assert!(zero.validate().is_err());

        let unselected = AllocationRequest {
            start_item_id: None,
            ..ok
        };
        assert!(matches!(
            unselected.validate(),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_example_plan_shape() {
        let plan = example_plan();
        assert_eq!(plan.items.len(), 8);
        assert!(plan
            .items
            .iter()
            .all(|i| i.amount_due == Money::from_minor(12_500_000)));
        assert!(plan.check_invariants().is_ok());
    }
}
