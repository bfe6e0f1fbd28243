use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::plan::InstallmentPlan;
use crate::types::{ItemId, PlanId};

/// one item's share of a previewed payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub item_id: ItemId,
    pub installment_no: u32,
    pub amount_applied: Money,
    pub new_amount_remaining: Money,
    pub will_be_fully_paid: bool,
}

/// per-item breakdown of a payment, computed against one plan version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPreview {
    pub plan_id: PlanId,
    pub plan_version: u64,
    pub start_item_id: ItemId,
    pub requested: Money,
    pub lines: Vec<AllocationLine>,
    pub excess: Money,
}

impl AllocationPreview {
    pub fn total_applied(&self) -> Money {
        self.lines.iter().map(|l| l.amount_applied).sum()
    }

    pub fn items_fully_paid(&self) -> usize {
        self.lines.iter().filter(|l| l.will_be_fully_paid).count()
    }
}

/// distributes a payment across a plan's open items in installment order
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationEngine;

impl AllocationEngine {
    pub fn new() -> Self {
        Self
    }

    /// preview a payment starting at `start_item_id`
    ///
    /// Rejects any payment that would leave an unapplied excess.
    pub fn preview(
        &self,
        plan: &InstallmentPlan,
        start_item_id: ItemId,
        amount: Money,
    ) -> Result<AllocationPreview> {
        let preview = self.walk(plan, start_item_id, amount)?;

        if preview.excess.is_positive() {
            return Err(EngineError::validation(format!(
                "payment {} leaves {} unapplied after item {}; start from an earlier unpaid installment",
                amount, preview.excess, start_item_id
            )));
        }

        Ok(preview)
    }

    /// validate inputs and walk the open items, reporting any excess instead of applying it
    pub fn walk(
        &self,
        plan: &InstallmentPlan,
        start_item_id: ItemId,
        amount: Money,
    ) -> Result<AllocationPreview> {
        if !amount.is_positive() {
            return Err(EngineError::validation(format!(
                "payment amount {} must be positive",
                amount
            )));
        }
        if !plan.status.accepts_payments() {
            return Err(EngineError::validation(format!(
                "plan {} is {:?} and accepts no payments",
                plan.id, plan.status
            )));
        }

        let remaining_balance = plan.remaining_balance();
        if remaining_balance.is_negative() {
            return Err(EngineError::consistency(format!(
                "plan {} has negative remaining balance {}",
                plan.id, remaining_balance
            )));
        }
        if amount > remaining_balance {
            return Err(EngineError::validation(format!(
                "payment {} exceeds the plan's remaining balance {}",
                amount, remaining_balance
            )));
        }

        let start = plan.item(start_item_id).ok_or_else(|| {
            EngineError::validation(format!(
                "item {} does not belong to plan {}",
                start_item_id, plan.id
            ))
        })?;
        if !start.is_open() {
            return Err(EngineError::validation(format!(
                "installment {} is already {:?}",
                start.installment_no, start.status
            )));
        }

        let mut remaining = amount;
        let mut lines = Vec::new();

        for item in plan.open_items_from(start.installment_no) {
            if remaining.is_zero() {
                break;
            }

            let applied = remaining.min(item.amount_remaining);
            let new_amount_remaining = item.amount_remaining - applied;
            remaining -= applied;

            lines.push(AllocationLine {
                item_id: item.id,
                installment_no: item.installment_no,
                amount_applied: applied,
                new_amount_remaining,
                will_be_fully_paid: new_amount_remaining.is_zero(),
            });
        }

        Ok(AllocationPreview {
            plan_id: plan.id,
            plan_version: plan.version,
            start_item_id,
            requested: amount,
            lines,
            excess: remaining,
        })
    }
}
