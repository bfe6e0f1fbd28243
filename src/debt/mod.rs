pub mod aggregator;
pub mod cache;
pub mod resolution;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::entities::{AgencyContract, Contract, Order, Quotation, StraightPayment};
use crate::plan::InstallmentPlan;
use crate::types::{DebtParty, DebtStatus, OrderId, PaymentId, PlanId, PlanOwner};

pub use aggregator::{rank_debt_views, DebtAggregator, DebtOverview};
pub use cache::DebtViewCache;
pub use resolution::{ChainBreak, ChainIndex, ChainResolution};

/// generation number per collection; any write bumps its collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CollectionVersions {
    pub orders: u64,
    pub payments: u64,
    pub plans: u64,
    pub contracts: u64,
    pub agency_contracts: u64,
    pub quotations: u64,
}

/// collections a snapshot is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotCollection {
    Orders,
    Payments,
    Plans,
    Contracts,
    AgencyContracts,
    Quotations,
}

/// a collaborator read that failed while the snapshot was assembled
///
/// The collection is treated as empty (or, for payments, the one order is
/// skipped) and the failure travels with every view built from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFailure {
    pub collection: SnapshotCollection,
    /// set when only one order's payments could not be read
    pub order_id: Option<OrderId>,
    pub message: String,
}

/// point-in-time copy of every collection the aggregation reads
#[derive(Debug, Clone, Default)]
pub struct DebtSnapshot {
    pub orders: Vec<Order>,
    pub payments: Vec<StraightPayment>,
    pub plans: Vec<InstallmentPlan>,
    pub contracts: Vec<Contract>,
    pub agency_contracts: Vec<AgencyContract>,
    pub quotations: Vec<Quotation>,
    pub versions: CollectionVersions,
    pub lookup_failures: Vec<LookupFailure>,
}

impl DebtSnapshot {
    pub fn chain_index(&self) -> ChainIndex<'_> {
        ChainIndex::new(&self.contracts, &self.agency_contracts, &self.quotations)
            .with_failures(&self.lookup_failures)
    }

    /// true when every collaborator read succeeded
    pub fn is_complete(&self) -> bool {
        self.lookup_failures.is_empty()
    }
}

/// what a debt line was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DebtSource {
    StraightPayment { payment_id: PaymentId, order_id: OrderId },
    Installment { plan_id: PlanId, owner: PlanOwner },
}

/// one straight payment or plan contributing to a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtLine {
    pub source: DebtSource,
    pub order_value: Money,
    pub paid: Money,
    pub remaining: Money,
    pub next_due_date: Option<DateTime<Utc>>,
    pub overdue_amount: Money,
}

/// a plan left out of the aggregation because its chain did not resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedPlan {
    pub plan_id: PlanId,
    pub reason: ChainBreak,
}

/// consolidated debt of one customer or agency across both payment mechanisms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDebtView {
    pub party: DebtParty,
    pub total_order_value: Money,
    pub total_paid: Money,
    pub remaining_debt: Money,
    pub payment_percentage: Rate,
    pub debt_status: DebtStatus,
    pub lines: Vec<DebtLine>,
    /// this party's plans whose chain broke after reaching one of its orders
    pub unresolved: Vec<UnresolvedPlan>,
    /// reads that failed while building the view; totals exclude what they would have returned
    pub lookup_failures: Vec<LookupFailure>,
    pub next_due_date: Option<DateTime<Utc>>,
    pub overdue_amount: Money,
    pub has_overdue: bool,
    pub built_at: DateTime<Utc>,
    /// collection generations the view was built from
    pub versions: CollectionVersions,
}
