pub mod collaborators;
pub mod config;
pub mod debt;
pub mod decimal;
pub mod engine;
pub mod entities;
pub mod errors;
pub mod events;
pub mod payments;
pub mod plan;
pub mod serialization;
pub mod status;
pub mod types;

// re-export key types
pub use collaborators::{
    Collaborators, ContractService, InMemoryBackend, OrderService, PaymentService, PlanStore,
    QuotationService, RequestContext,
};
pub use config::{DebtThresholds, EngineConfig, ProjectionThresholds, ScheduleLimits};
pub use debt::{
    rank_debt_views, ChainBreak, ChainResolution, CollectionVersions, CustomerDebtView,
    DebtAggregator, DebtLine, DebtOverview, DebtSnapshot, DebtSource, DebtViewCache,
    LookupFailure, SnapshotCollection, UnresolvedPlan,
};
pub use decimal::{Money, Rate};
pub use engine::{CommitReceipt, Engine, ProjectionOutcome, RederiveOutcome, SettlementReceipt};
pub use entities::{AgencyContract, Buyer, Contract, ContractRef, Order, Quotation, StraightPayment};
pub use errors::{EngineError, Result};
pub use events::{Event, EventStore};
pub use payments::{
    AllocationEngine, AllocationLine, AllocationPreview, AllocationRequest, CustomInstallment,
    PlanBuilder, PlanCommit, ScheduleGenerator,
};
pub use plan::{AllocationRecord, InstallmentItem, InstallmentPlan, NewItem, NewPlan, PlanDraft};
pub use serialization::{DebtSummaryView, PlanView, PreviewView};
pub use status::StatusProjector;
pub use types::{
    AgencyContractId, AgencyId, ContractId, ContractStatus, CustomerId, DebtParty, DebtStatus,
    DisplayStatus, InterestMethod, ItemId, ItemStatus, OrderId, OrderStatus, PaymentId,
    PaymentKind, PaymentMethod, PlanId, PlanOwner, PlanStatus, QuotationId,
    StraightPaymentStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
