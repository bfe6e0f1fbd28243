/// json views of plans, previews and debt
use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::debt::{CustomerDebtView, DebtLine, UnresolvedPlan};
use crate::decimal::{Money, Rate};
use crate::payments::AllocationPreview;
use crate::plan::{InstallmentItem, InstallmentPlan};
use crate::status::{is_overdue, item_status};
use crate::types::{DebtParty, DebtStatus, DisplayStatus, ItemId, PlanId, PlanOwner, PlanStatus};

/// serializable view of a plan as shown to users at a point in time
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanView {
    pub id: PlanId,
    pub owner: PlanOwner,
    pub status: PlanStatus,
    pub financial: PlanFinancialView,
    pub next_due_date: Option<DateTime<Utc>>,
    pub items: Vec<ItemView>,
    pub version: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanFinancialView {
    pub principal_amount: Money,
    pub deposit_amount: Money,
    pub financed_amount: Money,
    pub interest_rate: Rate,
    pub total_paid: Money,
    pub remaining_balance: Money,
    pub payment_percentage: Rate,
    pub overdue_amount: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemView {
    pub id: ItemId,
    pub installment_no: u32,
    pub due_date: DateTime<Utc>,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub amount_remaining: Money,
    pub status: DisplayStatus,
    pub overdue: bool,
}

impl ItemView {
    fn from_item(item: &InstallmentItem, now: DateTime<Utc>) -> Self {
        ItemView {
            id: item.id,
            installment_no: item.installment_no,
            due_date: item.due_date,
            amount_due: item.amount_due,
            amount_paid: item.amount_paid,
            amount_remaining: item.amount_remaining,
            status: item_status(item, now),
            overdue: is_overdue(item, now),
        }
    }
}

impl PlanView {
    pub fn from_plan(plan: &InstallmentPlan, time_provider: &SafeTimeProvider) -> Self {
        let now = time_provider.now();
        PlanView {
            id: plan.id,
            owner: plan.owner,
            status: plan.status,
            financial: PlanFinancialView {
                principal_amount: plan.principal_amount,
                deposit_amount: plan.deposit_amount,
                financed_amount: plan.financed_amount(),
                interest_rate: plan.interest_rate,
                total_paid: plan.total_paid,
                remaining_balance: plan.remaining_balance(),
                payment_percentage: plan.payment_percentage(),
                overdue_amount: plan.overdue_amount(now),
            },
            next_due_date: plan.next_due_date(),
            items: plan.items.iter().map(|i| ItemView::from_item(i, now)).collect(),
            version: plan.version,
            last_modified: plan.last_modified,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// payment breakdown shown for confirmation before commit
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewView {
    pub plan_id: PlanId,
    pub plan_version: u64,
    pub requested: Money,
    pub total_applied: Money,
    pub excess: Money,
    pub items_fully_paid: usize,
    pub lines: Vec<PreviewLineView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewLineView {
    pub installment_no: u32,
    pub amount_applied: Money,
    pub new_amount_remaining: Money,
    pub will_be_fully_paid: bool,
}

impl PreviewView {
    pub fn from_preview(preview: &AllocationPreview) -> Self {
        PreviewView {
            plan_id: preview.plan_id,
            plan_version: preview.plan_version,
            requested: preview.requested,
            total_applied: preview.total_applied(),
            excess: preview.excess,
            items_fully_paid: preview.items_fully_paid(),
            lines: preview
                .lines
                .iter()
                .map(|l| PreviewLineView {
                    installment_no: l.installment_no,
                    amount_applied: l.amount_applied,
                    new_amount_remaining: l.new_amount_remaining,
                    will_be_fully_paid: l.will_be_fully_paid,
                })
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// debt summary row for list screens
#[derive(Debug, Serialize, Deserialize)]
pub struct DebtSummaryView {
    pub party: DebtParty,
    pub total_order_value: Money,
    pub total_paid: Money,
    pub remaining_debt: Money,
    pub payment_percentage: Rate,
    pub debt_status: DebtStatus,
    pub has_overdue: bool,
    pub overdue_amount: Money,
    pub next_due_date: Option<DateTime<Utc>>,
    pub lines: Vec<DebtLine>,
    pub unresolved: Vec<UnresolvedPlan>,
}

impl DebtSummaryView {
    pub fn from_view(view: &CustomerDebtView) -> Self {
        DebtSummaryView {
            party: view.party,
            total_order_value: view.total_order_value,
            total_paid: view.total_paid,
            remaining_debt: view.remaining_debt,
            payment_percentage: view.payment_percentage,
            debt_status: view.debt_status,
            has_overdue: view.has_overdue,
            overdue_amount: view.overdue_amount,
            next_due_date: view.next_due_date,
            lines: view.lines.clone(),
            unresolved: view.unresolved.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
