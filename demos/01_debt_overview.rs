/// debt overview - straight and installment debt across customers and agencies
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use installment_engine::{
    AgencyContract, AllocationRequest, Buyer, Collaborators, Contract, ContractStatus,
    DebtSummaryView, Engine, EngineConfig, EventStore, InMemoryBackend, Money, Order,
    PaymentMethod, PlanBuilder, PlanStatus, Quotation, RequestContext, SafeTimeProvider,
    StraightPayment, StraightPaymentStatus, TimeSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let ctx = RequestContext::new("demo-token", "accounts");

    let backend = Arc::new(InMemoryBackend::new());

    // customer 42 pays order 10 in installments and order 20 outright
    backend.seed_quotation(Quotation { id: 5, customer_id: 42 }).await;
    backend
        .seed_contract(Contract {
            id: 1,
            quotation_id: 5,
            order_id: Some(10),
            status: ContractStatus::Signed,
            version: 1,
        })
        .await;
    backend.seed_order(Order::new(10, Buyer::Customer(42))).await;
    backend.seed_order(Order::new(20, Buyer::Customer(42))).await;
    backend
        .seed_payment(StraightPayment {
            id: 1,
            order_id: 20,
            amount: Money::from_minor(100_000_000),
            prepay: Money::ZERO,
            payment_method: PaymentMethod::BankTransfer,
            status: StraightPaymentStatus::Pending,
            version: 1,
            last_modified: time.now(),
        })
        .await;

    // agency 9 buys on a monthly plan
    backend
        .seed_agency_contract(AgencyContract {
            id: 3,
            agency_id: 9,
            order_id: Some(11),
            status: ContractStatus::Signed,
            version: 1,
        })
        .await;
    backend.seed_order(Order::new(11, Buyer::Agency(9))).await;

    let engine = Engine::new(EngineConfig::default(), Collaborators::in_memory(backend))?;
    let mut events = EventStore::new();

    let customer_plan = engine
        .create_plan(
            &ctx,
            PlanBuilder::new()
                .contract(1)
                .principal(Money::from_minor(120_000_000))
                .deposit(Money::from_minor(20_000_000))
                .term(2, 4)
                .status(PlanStatus::Active),
            &time,
            &mut events,
        )
        .await?;
    let agency_plan = engine
        .create_plan(
            &ctx,
            PlanBuilder::new()
                .agency_contract(3)
                .principal(Money::from_minor(36_000_000))
                .term(1, 12)
                .status(PlanStatus::Active),
            &time,
            &mut events,
        )
        .await?;

    let receipt = engine.complete_straight_payment(&ctx, 1, &time, &mut events).await?;
    println!("straight payment settled: {:?}", receipt.projection);

    let preview = engine
        .preview(
            &ctx,
            &AllocationRequest::new(customer_plan.id, customer_plan.items[0].id, Money::from_minor(12_500_000))
                .with_reference("counter receipt 0001"),
        )
        .await?;
    engine.commit(&ctx, &preview, &time, &mut events).await?;

    let preview = engine
        .preview(
            &ctx,
            &AllocationRequest::new(agency_plan.id, agency_plan.items[0].id, Money::from_minor(9_000_000)),
        )
        .await?;
    engine.commit(&ctx, &preview, &time, &mut events).await?;

    // half a year on, some installments have fallen due
    controller.advance(Duration::days(182));
    println!("as of {}", time.now().format("%Y-%m-%d"));

    let overview = engine.debt_overview(&ctx, &time, &mut events).await?;
    for view in &overview.views {
        println!("{}", DebtSummaryView::from_view(view).to_json_pretty()?);
    }
    for plan in &overview.unattributed {
        println!("unattributed plan {}: {}", plan.plan_id, plan.reason);
    }

    Ok(())
}
