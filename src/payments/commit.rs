use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::events::{Event, EventStore};
use crate::plan::{AllocationRecord, InstallmentPlan};
use crate::status::derivation::{plan_status, settled_status};
use crate::types::PlanId;

use super::allocation::AllocationPreview;

/// fully-applied plan state handed to persistence as one compare-and-swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCommit {
    pub commit_id: Uuid,
    pub plan_id: PlanId,
    /// version the plan must still be at for the write to succeed
    pub expected_version: u64,
    pub plan: InstallmentPlan,
    pub records: Vec<AllocationRecord>,
}

impl PlanCommit {
    pub fn amount(&self) -> Money {
        self.records.iter().map(|r| r.amount_applied).sum()
    }
}

/// apply a previewed allocation to the current plan state
///
/// Works on a copy; `current` is left untouched so a rejected commit
/// persists nothing.
pub fn apply_allocation(
    current: &InstallmentPlan,
    preview: &AllocationPreview,
    time_provider: &SafeTimeProvider,
    events: &mut EventStore,
) -> Result<PlanCommit> {
    apply_allocation_at(current, preview, time_provider.now(), events)
}

pub(crate) fn apply_allocation_at(
    current: &InstallmentPlan,
    preview: &AllocationPreview,
    now: DateTime<Utc>,
    events: &mut EventStore,
) -> Result<PlanCommit> {
    if preview.plan_id != current.id {
        return Err(EngineError::validation(format!(
            "allocation was previewed for plan {}, not plan {}",
            preview.plan_id, current.id
        )));
    }
    if preview.excess.is_positive() {
        return Err(EngineError::validation(format!(
            "allocation carries unapplied excess {}",
            preview.excess
        )));
    }
    if !current.status.accepts_payments() {
        return Err(EngineError::validation(format!(
            "plan {} is {:?} and accepts no payments",
            current.id, current.status
        )));
    }

    let total = preview.total_applied();
    if !total.is_positive() {
        return Err(EngineError::validation("allocation applies nothing"));
    }

    let available = current.remaining_balance();
    if total > available {
        return Err(EngineError::OverAllocation {
            available,
            requested: total,
        });
    }

    if preview.plan_version != current.version {
        return Err(EngineError::StaleSnapshot {
            plan_id: current.id,
            expected: preview.plan_version,
            actual: current.version,
        });
    }

    let commit_id = Uuid::new_v4();
    let mut plan = current.clone();
    let mut records = Vec::with_capacity(preview.lines.len());

    for line in &preview.lines {
        let item = plan
            .items
            .iter_mut()
            .find(|i| i.id == line.item_id)
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "item {} is not part of plan {}",
                    line.item_id, current.id
                ))
            })?;

        if !item.is_open() || line.amount_applied > item.amount_remaining {
            return Err(EngineError::OverAllocation {
                available: item.amount_remaining,
                requested: line.amount_applied,
            });
        }

        let old_status = item.status;
        item.amount_paid += line.amount_applied;
        item.amount_remaining = item
            .amount_due
            .checked_sub(item.amount_paid)
            .ok_or_else(|| {
                EngineError::consistency(format!(
                    "item {} would be paid {} against {} due",
                    item.id, item.amount_paid, item.amount_due
                ))
            })?;
        item.status = settled_status(item.amount_due, item.amount_paid);

        if item.status != old_status {
            events.emit(Event::ItemStatusChanged {
                plan_id: plan.id,
                item_id: item.id,
                installment_no: item.installment_no,
                old_status,
                new_status: item.status,
                timestamp: now,
            });
        }

        records.push(AllocationRecord {
            commit_id,
            plan_id: plan.id,
            item_id: item.id,
            installment_no: item.installment_no,
            amount_applied: line.amount_applied,
            remaining_after: item.amount_remaining,
            committed_at: now,
        });
    }

    plan.total_paid += total;

    let old_status = plan.status;
    plan.status = plan_status(&plan);
    if plan.status != old_status {
        events.emit(Event::PlanStatusChanged {
            plan_id: plan.id,
            old_status,
            new_status: plan.status,
            reason: "all installments paid".to_string(),
            timestamp: now,
        });
    }

    plan.version = current.version + 1;
    plan.last_modified = now;
    plan.check_invariants()?;

    events.emit(Event::AllocationCommitted {
        commit_id,
        plan_id: plan.id,
        amount: total,
        items_touched: records.len(),
        new_total_paid: plan.total_paid,
        timestamp: now,
    });

    Ok(PlanCommit {
        commit_id,
        plan_id: plan.id,
        expected_version: current.version,
        plan,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::allocation::AllocationEngine;
    use crate::payments::example_plan;
    use crate::types::{ItemStatus, PlanStatus};
    use hourglass_rs::TimeSource;

    fn time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 2, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_commit_applies_preview() {
        let plan = example_plan();
        let engine = AllocationEngine::new();
        let time = time();
        let mut events = EventStore::new();

        let preview = engine.preview(&plan, 1, Money::from_minor(12_500_000)).unwrap();
        let commit = apply_allocation(&plan, &preview, &time, &mut events).unwrap();

        assert_eq!(commit.expected_version, 1);
        assert_eq!(commit.plan.version, 2);
        assert_eq!(commit.plan.total_paid, Money::from_minor(12_500_000));
        assert_eq!(commit.plan.items[0].status, ItemStatus::Paid);
        assert_eq!(commit.records.len(), 1);
        assert_eq!(commit.amount(), Money::from_minor(12_500_000));

        // follow-up payment spills into item 3
        let preview = engine
            .preview(&commit.plan, 2, Money::from_minor(20_000_000))
            .unwrap();
        let second = apply_allocation(&commit.plan, &preview, &time, &mut events).unwrap();

        assert_eq!(second.plan.items[1].status, ItemStatus::Paid);
        assert_eq!(second.plan.items[2].status, ItemStatus::Partial);
        assert_eq!(second.plan.items[2].amount_remaining, Money::from_minor(5_000_000));
        assert_eq!(second.plan.total_paid, Money::from_minor(32_500_000));

        let committed = events
            .events()
            .iter()
            .filter(|e| matches!(e, Event::AllocationCommitted { .. }))
            .count();
        assert_eq!(committed, 2);
    }

    #[test]
    fn test_stale_preview_is_rejected() {
        let plan = example_plan();
        let engine = AllocationEngine::new();
        let time = time();
        let mut events = EventStore::new();

        let first = engine.preview(&plan, 1, Money::from_minor(1_000)).unwrap();
        let racing = engine.preview(&plan, 1, Money::from_minor(2_000)).unwrap();

        let commit = apply_allocation(&plan, &first, &time, &mut events).unwrap();
        let err = apply_allocation(&commit.plan, &racing, &time, &mut events).unwrap_err();

        assert_eq!(
            err,
            EngineError::StaleSnapshot {
                plan_id: 1,
                expected: 1,
                actual: 2
            }
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_over_allocation_is_rejected() {
        let plan = example_plan();
        let engine = AllocationEngine::new();
        let time = time();
        let mut events = EventStore::new();

        // two previews that each fit, but not together
        let a = engine.preview(&plan, 1, Money::from_minor(60_000_000)).unwrap();
        let b = engine.preview(&plan, 1, Money::from_minor(60_000_000)).unwrap();

        let commit = apply_allocation(&plan, &a, &time, &mut events).unwrap();
        let err = apply_allocation(&commit.plan, &b, &time, &mut events).unwrap_err();

        assert!(matches!(err, EngineError::OverAllocation { .. }));
        // the rejected commit left the plan untouched
        assert_eq!(commit.plan.total_paid, Money::from_minor(60_000_000));
    }

    #[test]
    fn test_final_payment_completes_plan() {
        let plan = example_plan();
        let engine = AllocationEngine::new();
        let time = time();
        let mut events = EventStore::new();

        let preview = engine.preview(&plan, 1, plan.remaining_balance()).unwrap();
        let commit = apply_allocation(&plan, &preview, &time, &mut events).unwrap();

        assert_eq!(commit.plan.status, PlanStatus::Completed);
        assert!(commit.plan.remaining_balance().is_zero());
        assert!(events.events().iter().any(|e| matches!(
            e,
            Event::PlanStatusChanged {
                new_status: PlanStatus::Completed,
                ..
            }
        )));
    }
}
