//! property tests for schedule, allocation and aggregation invariants

use chrono::{TimeZone, Utc};
use installment_engine::payments;
use installment_engine::status::{plan_status, rederive_items};
use installment_engine::{
    AllocationEngine, Buyer, DebtAggregator, DebtParty, DebtSnapshot, DebtStatus, EventStore,
    InstallmentPlan, InterestMethod, Money, NewPlan, Order, PaymentMethod, PlanDraft, PlanOwner,
    PlanStatus, Rate, SafeTimeProvider, ScheduleGenerator, StraightPayment,
    StraightPaymentStatus, TimeSource,
};
use proptest::prelude::*;

fn anchor() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
}

fn plan_for(principal: i64, deposit: i64, years: u32, periods_per_year: u32) -> InstallmentPlan {
    let items = ScheduleGenerator::default()
        .generate_from(
            Money::from_minor(principal),
            Money::from_minor(deposit),
            years,
            periods_per_year,
            anchor(),
        )
        .unwrap();
    let draft = PlanDraft {
        plan: NewPlan {
            owner: PlanOwner::Contract(1),
            principal_amount: Money::from_minor(principal),
            deposit_amount: Money::from_minor(deposit),
            interest_rate: Rate::ZERO,
            interest_method: InterestMethod::Fixed,
            status: PlanStatus::Active,
        },
        items,
    };
    InstallmentPlan::from_draft(1, 1, &draft, anchor())
}

fn clock() -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(anchor()))
}

fn periods() -> impl Strategy<Value = u32> {
    prop::sample::select(vec![1u32, 2, 3, 4, 6, 12])
}

proptest! {
    /// scheduled amounts always add up to the financed amount
    #[test]
    fn schedule_sums_to_financed_amount(
        principal in 1_000i64..10_000_000_000,
        deposit_pct in 0i64..80,
        years in 1u32..=10,
        ppy in periods(),
    ) {
        let deposit = principal * deposit_pct / 100;
        let plan = plan_for(principal, deposit, years, ppy);

        let scheduled: Money = plan.items.iter().map(|i| i.amount_due).sum();
        prop_assert_eq!(scheduled, Money::from_minor(principal - deposit));
        prop_assert_eq!(plan.items.len() as u32, years * ppy);
        prop_assert!(plan.items.windows(2).all(|w| w[0].due_date < w[1].due_date));
    }

    /// a preview from the first item applies exactly the requested amount
    #[test]
    fn allocation_conserves_amount(
        principal in 1_000i64..1_000_000_000,
        years in 1u32..=5,
        ppy in periods(),
        pct in 1i64..=100,
    ) {
        let plan = plan_for(principal, 0, years, ppy);
        let amount = Money::from_minor((principal * pct / 100).max(1));

        let preview = AllocationEngine::new().preview(&plan, 1, amount).unwrap();

        prop_assert_eq!(preview.total_applied(), amount);
        prop_assert_eq!(preview.excess, Money::ZERO);
        for line in &preview.lines {
            let item = plan.item(line.item_id).unwrap();
            prop_assert!(line.amount_applied <= item.amount_remaining);
            prop_assert!(line.amount_applied.is_positive());
        }
    }

    /// committing never raises an item's remaining and moves total paid by exactly the committed amount
    #[test]
    fn commits_pay_down_monotonically(
        principal in 10_000i64..1_000_000_000,
        first_pct in 1i64..60,
        second_pct in 1i64..40,
    ) {
        let plan = plan_for(principal, 0, 2, 4);
        let engine = AllocationEngine::new();
        let time = clock();
        let mut events = EventStore::new();

        let mut current = plan;
        for pct in [first_pct, second_pct] {
            let amount = Money::from_minor((principal * pct / 100).max(1));
            let start = current.items.iter().find(|i| i.is_open()).unwrap().id;
            let preview = engine.preview(&current, start, amount).unwrap();
            let commit = payments::apply_allocation(&current, &preview, &time, &mut events).unwrap();

            prop_assert_eq!(commit.plan.total_paid, current.total_paid + amount);
            prop_assert_eq!(commit.plan.version, current.version + 1);
            for (before, after) in current.items.iter().zip(&commit.plan.items) {
                prop_assert!(after.amount_remaining <= before.amount_remaining);
            }
            current = commit.plan;
        }
    }

    /// re-deriving item and plan status twice changes nothing the second time
    #[test]
    fn rederivation_is_idempotent(
        principal in 10_000i64..1_000_000_000,
        pct in 1i64..=100,
    ) {
        let plan = plan_for(principal, 0, 1, 12);
        let amount = Money::from_minor((principal * pct / 100).max(1));
        let preview = AllocationEngine::new().preview(&plan, 1, amount).unwrap();
        let mut events = EventStore::new();
        let mut committed = payments::apply_allocation(&plan, &preview, &clock(), &mut events)
            .unwrap()
            .plan;

        let first = rederive_items(&mut committed);
        prop_assert!(first.is_empty());
        let status = plan_status(&committed);
        let snapshot = committed.clone();

        prop_assert!(rederive_items(&mut committed).is_empty());
        prop_assert_eq!(&committed, &snapshot);
        prop_assert_eq!(plan_status(&committed), status);
    }

    /// listing the same order and payments several times never inflates debt
    #[test]
    fn duplicates_are_not_double_counted(
        amounts in prop::collection::vec(1i64..1_000_000, 1..6),
        copies in 1usize..4,
    ) {
        let order = Order::new(7, Buyer::Customer(3));
        let straight: Vec<StraightPayment> = amounts
            .iter()
            .enumerate()
            .map(|(idx, amount)| StraightPayment {
                id: idx as u64 + 1,
                order_id: 7,
                amount: Money::from_minor(*amount),
                prepay: Money::ZERO,
                payment_method: PaymentMethod::Cash,
                status: StraightPaymentStatus::Completed,
                version: 1,
                last_modified: anchor(),
            })
            .collect();

        let snapshot = DebtSnapshot {
            orders: vec![order; copies],
            payments: straight.iter().cloned().cycle().take(straight.len() * copies).collect(),
            ..DebtSnapshot::default()
        };
        let mut events = EventStore::new();
        let view = DebtAggregator::default()
            .build_debt_view(DebtParty::Customer(3), &snapshot, &clock(), &mut events)
            .unwrap();

        let expected: i64 = amounts.iter().sum();
        prop_assert_eq!(view.total_order_value, Money::from_minor(expected));
        prop_assert_eq!(view.total_paid, Money::from_minor(expected));
        prop_assert_eq!(view.lines.len(), amounts.len());
        prop_assert_eq!(view.debt_status, DebtStatus::Paid);
    }
}
