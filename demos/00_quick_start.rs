/// quick start - create a plan, preview a payment and commit it
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use installment_engine::{
    AllocationRequest, Buyer, Collaborators, Contract, ContractStatus, Engine, EngineConfig,
    EventStore, InMemoryBackend, Money, Order, PlanBuilder, PlanStatus, PlanView, PreviewView,
    Quotation, RequestContext, SafeTimeProvider, TimeSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let ctx = RequestContext::new("demo-token", "cashier");

    // one signed contract for customer 42 on order 10
    let backend = Arc::new(InMemoryBackend::new());
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

    let engine = Engine::new(EngineConfig::default(), Collaborators::in_memory(backend))?;
    let mut events = EventStore::new();

    // 120m with 20m down, quarterly over two years
    let plan = engine
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

    let first = plan.items[0].id;
    let preview = engine
        .preview(&ctx, &AllocationRequest::new(plan.id, first, Money::from_minor(20_000_000)))
        .await?;
    println!("{}", PreviewView::from_preview(&preview).to_json_pretty()?);

    let receipt = engine.commit(&ctx, &preview, &time, &mut events).await?;
    println!("{}", PlanView::from_plan(&receipt.plan, &time).to_json_pretty()?);
    println!("projection: {:?}", receipt.projection);
    println!("events recorded: {}", events.events().len());

    Ok(())
}
