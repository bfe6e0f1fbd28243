use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::types::{InterestMethod, ItemId, ItemStatus, PlanId, PlanOwner, PlanStatus};

/// a single due period within a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentItem {
    pub id: ItemId,
    pub plan_id: PlanId,
    pub installment_no: u32,
    pub due_date: DateTime<Utc>,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub amount_remaining: Money,
    pub status: ItemStatus,
}

impl InstallmentItem {
    pub fn new(
        id: ItemId,
        plan_id: PlanId,
        installment_no: u32,
        due_date: DateTime<Utc>,
        amount_due: Money,
    ) -> Self {
        Self {
            id,
            plan_id,
            installment_no,
            due_date,
            amount_due,
            amount_paid: Money::ZERO,
            amount_remaining: amount_due,
            status: ItemStatus::Pending,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    fn check(&self) -> Result<()> {
        if self.amount_paid.is_negative() || self.amount_remaining.is_negative() {
            return Err(EngineError::consistency(format!(
                "item {} carries a negative amount (paid {}, remaining {})",
                self.id, self.amount_paid, self.amount_remaining
            )));
        }
        if self.amount_paid + self.amount_remaining != self.amount_due {
            return Err(EngineError::consistency(format!(
                "item {}: paid {} + remaining {} != due {}",
                self.id, self.amount_paid, self.amount_remaining, self.amount_due
            )));
        }
        Ok(())
    }
}

/// multi-period payment schedule against principal minus deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub id: PlanId,
    pub owner: PlanOwner,
    pub principal_amount: Money,
    pub deposit_amount: Money,
    pub interest_rate: Rate,
    pub interest_method: InterestMethod,
    pub status: PlanStatus,
    pub total_paid: Money,
    pub items: Vec<InstallmentItem>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl InstallmentPlan {
    /// materialize a draft with sequential item ids starting at `first_item_id`
    pub fn from_draft(
        id: PlanId,
        first_item_id: ItemId,
        draft: &PlanDraft,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let items = draft
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                InstallmentItem::new(
                    first_item_id + idx as u64,
                    id,
                    item.installment_no,
                    item.due_date,
                    item.amount_due,
                )
            })
            .collect();

        Self {
            id,
            owner: draft.plan.owner,
            principal_amount: draft.plan.principal_amount,
            deposit_amount: draft.plan.deposit_amount,
            interest_rate: draft.plan.interest_rate,
            interest_method: draft.plan.interest_method,
            status: draft.plan.status,
            total_paid: Money::ZERO,
            items,
            version: 1,
            created_at: timestamp,
            last_modified: timestamp,
        }
    }

    /// principal minus deposit
    pub fn financed_amount(&self) -> Money {
        self.principal_amount - self.deposit_amount
    }

    /// what can still be allocated against this plan
    pub fn remaining_balance(&self) -> Money {
        self.financed_amount() - self.total_paid
    }

    pub fn payment_percentage(&self) -> Rate {
        Rate::ratio(self.total_paid, self.financed_amount())
    }

    pub fn item(&self, item_id: ItemId) -> Option<&InstallmentItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_by_no(&self, installment_no: u32) -> Option<&InstallmentItem> {
        self.items.iter().find(|i| i.installment_no == installment_no)
    }

    /// open items from `installment_no` onward, ascending
    pub fn open_items_from(&self, installment_no: u32) -> impl Iterator<Item = &InstallmentItem> {
        self.items
            .iter()
            .filter(move |i| i.installment_no >= installment_no && i.is_open())
    }

    /// soonest due date among unpaid items
    pub fn next_due_date(&self) -> Option<DateTime<Utc>> {
        self.items
            .iter()
            .filter(|i| i.is_open())
            .map(|i| i.due_date)
            .min()
    }

    /// sum remaining on unpaid items already past due
    pub fn overdue_amount(&self, now: DateTime<Utc>) -> Money {
        self.items
            .iter()
            .filter(|i| i.is_open() && i.due_date < now)
            .map(|i| i.amount_remaining)
            .sum()
    }

    pub fn all_items_paid(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.status == ItemStatus::Paid)
    }

    /// verify the persisted shape: dense numbering, non-negative balances, paid within financed
    pub fn check_invariants(&self) -> Result<()> {
        if self.deposit_amount.is_negative() || self.deposit_amount > self.principal_amount {
            return Err(EngineError::consistency(format!(
                "plan {}: deposit {} outside [0, principal {}]",
                self.id, self.deposit_amount, self.principal_amount
            )));
        }

        for (idx, item) in self.items.iter().enumerate() {
            if item.installment_no != idx as u32 + 1 {
                return Err(EngineError::consistency(format!(
                    "plan {}: installment numbers are not a dense 1..N sequence at position {}",
                    self.id,
                    idx + 1
                )));
            }
            if item.plan_id != self.id {
                return Err(EngineError::consistency(format!(
                    "item {} belongs to plan {}, found under plan {}",
                    item.id, item.plan_id, self.id
                )));
            }
            item.check()?;
        }

        if self.total_paid.is_negative() || self.total_paid > self.financed_amount() {
            return Err(EngineError::consistency(format!(
                "plan {}: total paid {} outside [0, financed {}]",
                self.id,
                self.total_paid,
                self.financed_amount()
            )));
        }

        Ok(())
    }
}

/// plan header handed to the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlan {
    pub owner: PlanOwner,
    pub principal_amount: Money,
    pub deposit_amount: Money,
    pub interest_rate: Rate,
    pub interest_method: InterestMethod,
    pub status: PlanStatus,
}

/// item row handed to the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub installment_no: u32,
    pub due_date: DateTime<Utc>,
    pub amount_due: Money,
}

/// a validated plan header plus its schedule, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDraft {
    pub plan: NewPlan,
    pub items: Vec<NewItem>,
}

impl PlanDraft {
    pub fn scheduled_total(&self) -> Money {
        self.items.iter().map(|i| i.amount_due).sum()
    }
}

/// committed allocation line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub commit_id: Uuid,
    pub plan_id: PlanId,
    pub item_id: ItemId,
    pub installment_no: u32,
    pub amount_applied: Money,
    pub remaining_after: Money,
    pub committed_at: DateTime<Utc>,
}
