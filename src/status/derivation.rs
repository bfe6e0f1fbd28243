use chrono::{DateTime, Utc};

use crate::decimal::Money;
use crate::plan::{InstallmentItem, InstallmentPlan};
use crate::types::{DisplayStatus, ItemId, ItemStatus, PlanStatus};

/// persisted item status from paid/due amounts alone
pub fn settled_status(amount_due: Money, amount_paid: Money) -> ItemStatus {
    if amount_paid >= amount_due {
        ItemStatus::Paid
    } else if amount_paid.is_positive() {
        ItemStatus::Partial
    } else {
        ItemStatus::Pending
    }
}

/// item status as shown to users at `now`
pub fn item_status(item: &InstallmentItem, now: DateTime<Utc>) -> DisplayStatus {
    if item.amount_remaining.is_zero() {
        DisplayStatus::Paid
    } else if item.amount_paid.is_zero() && item.due_date < now {
        DisplayStatus::Overdue
    } else if item.amount_paid.is_positive() && item.amount_paid < item.amount_due {
        DisplayStatus::Partial
    } else {
        DisplayStatus::Pending
    }
}

/// any unpaid item past its due date, partially paid or not
pub fn is_overdue(item: &InstallmentItem, now: DateTime<Utc>) -> bool {
    !item.amount_remaining.is_zero() && item.due_date < now
}

/// plan status implied by its items
///
/// Completed exactly when every item is paid; otherwise the current status
/// stands. Pending -> Active is an external edit and never derived here.
pub fn plan_status(plan: &InstallmentPlan) -> PlanStatus {
    if plan.status == PlanStatus::Cancelled {
        return PlanStatus::Cancelled;
    }
    if plan.all_items_paid() {
        PlanStatus::Completed
    } else {
        plan.status
    }
}

/// recompute every item's remaining amount and status from its paid amount
///
/// Returns the items whose status changed as (id, old, new).
pub fn rederive_items(plan: &mut InstallmentPlan) -> Vec<(ItemId, ItemStatus, ItemStatus)> {
    let mut changed = Vec::new();
    for item in plan.items.iter_mut() {
        item.amount_remaining = item.amount_due - item.amount_paid;
        let status = settled_status(item.amount_due, item.amount_paid);
        if status != item.status {
            changed.push((item.id, item.status, status));
            item.status = status;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::types::{InterestMethod, PlanOwner};
    use chrono::{Duration, TimeZone};

    fn item(due: i64, paid: i64, due_date: DateTime<Utc>) -> InstallmentItem {
        let mut item = InstallmentItem::new(1, 1, 1, due_date, Money::from_minor(due));
        item.amount_paid = Money::from_minor(paid);
        item.amount_remaining = Money::from_minor(due - paid);
        item.status = settled_status(item.amount_due, item.amount_paid);
        item
    }

    #[test]
    fn test_item_status_rules() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let past = now - Duration::days(1);
        let future = now + Duration::days(1);

        assert_eq!(item_status(&item(100, 100, past), now), DisplayStatus::Paid);
        assert_eq!(item_status(&item(100, 0, past), now), DisplayStatus::Overdue);
        assert_eq!(item_status(&item(100, 40, past), now), DisplayStatus::Partial);
        assert_eq!(item_status(&item(100, 40, future), now), DisplayStatus::Partial);
        assert_eq!(item_status(&item(100, 0, future), now), DisplayStatus::Pending);

        // partial past due still counts as overdue for ranking
        assert!(is_overdue(&item(100, 40, past), now));
        assert!(!is_overdue(&item(100, 100, past), now));
        assert!(!is_overdue(&item(100, 0, future), now));
    }

    #[test]
    fn test_settled_status_ignores_time() {
        assert_eq!(settled_status(Money::from_minor(10), Money::ZERO), ItemStatus::Pending);
        assert_eq!(settled_status(Money::from_minor(10), Money::from_minor(3)), ItemStatus::Partial);
        assert_eq!(settled_status(Money::from_minor(10), Money::from_minor(10)), ItemStatus::Paid);
    }

    fn plan_with(paid: &[i64], status: PlanStatus) -> InstallmentPlan {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let items = paid
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let mut it = item(100, *p, now);
                it.id = idx as u64 + 1;
                it.installment_no = idx as u32 + 1;
                it
            })
            .collect::<Vec<_>>();
        InstallmentPlan {
            id: 1,
            owner: PlanOwner::Contract(1),
            principal_amount: Money::from_minor(100 * paid.len() as i64),
            deposit_amount: Money::ZERO,
            interest_rate: Rate::ZERO,
            interest_method: InterestMethod::Fixed,
            status,
            total_paid: Money::from_minor(paid.iter().sum()),
            items,
            version: 1,
            created_at: now,
            last_modified: now,
        }
    }

    #[test]
    fn test_plan_status() {
        assert_eq!(plan_status(&plan_with(&[100, 100], PlanStatus::Active)), PlanStatus::Completed);
        assert_eq!(plan_status(&plan_with(&[100, 50], PlanStatus::Active)), PlanStatus::Active);
        assert_eq!(plan_status(&plan_with(&[0, 0], PlanStatus::Pending)), PlanStatus::Pending);
        assert_eq!(plan_status(&plan_with(&[100], PlanStatus::Cancelled)), PlanStatus::Cancelled);
        assert_eq!(plan_status(&plan_with(&[], PlanStatus::Active)), PlanStatus::Active);
    }

    #[test]
    fn test_rederive_is_idempotent() {
        let mut plan = plan_with(&[100, 50, 0], PlanStatus::Active);
        // simulate a crash that persisted amounts but not statuses
        for it in plan.items.iter_mut() {
            it.status = ItemStatus::Pending;
        }

        let first = rederive_items(&mut plan);
        assert_eq!(first.len(), 2);
        let snapshot = plan.clone();

        let second = rederive_items(&mut plan);
        assert!(second.is_empty());
        assert_eq!(plan, snapshot);
        assert_eq!(plan_status(&plan), plan_status(&snapshot));
    }
}
