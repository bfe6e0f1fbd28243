pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{AgencyContract, Contract, ContractRef, Order, Quotation, StraightPayment};
use crate::errors::{EngineError, Result};
use crate::payments::PlanCommit;
use crate::plan::{InstallmentItem, InstallmentPlan, NewItem, NewPlan};
use crate::types::{
    AgencyContractId, AgencyId, ContractId, ContractStatus, CustomerId, OrderId, OrderStatus,
    PaymentId, PlanId, PlanStatus, QuotationId, StraightPaymentStatus,
};

pub use memory::InMemoryBackend;

/// caller credential passed explicitly to every collaborator call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub token: String,
    /// who is acting, for audit trails
    pub actor: String,
}

impl RequestContext {
    pub fn new(token: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            actor: actor.into(),
        }
    }

    pub fn require_token(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(EngineError::Collaborator {
                message: format!("request by '{}' carries no credential", self.actor),
            });
        }
        Ok(())
    }
}

#[async_trait]
pub trait OrderService: Send + Sync {
    /// orders placed by a dealer agency
    async fn get_by_agency(&self, ctx: &RequestContext, agency_id: AgencyId) -> Result<Vec<Order>>;
    async fn get_by_customer(&self, ctx: &RequestContext, customer_id: CustomerId) -> Result<Vec<Order>>;
    async fn get_by_id(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order>;
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Order>>;
    async fn update_status(&self, ctx: &RequestContext, order_id: OrderId, status: OrderStatus) -> Result<Order>;
    async fn generation(&self, ctx: &RequestContext) -> Result<u64>;
}

#[async_trait]
pub trait ContractService: Send + Sync {
    async fn get_by_id(&self, ctx: &RequestContext, contract_id: ContractId) -> Result<Contract>;
    async fn get_agency_contract(
        &self,
        ctx: &RequestContext,
        agency_contract_id: AgencyContractId,
    ) -> Result<AgencyContract>;
    /// contract of either kind covering an order
    async fn find_by_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Option<ContractRef>>;
    async fn update_status(&self, ctx: &RequestContext, contract: ContractRef, status: ContractStatus) -> Result<()>;
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Contract>>;
    async fn get_all_agency_contracts(&self, ctx: &RequestContext) -> Result<Vec<AgencyContract>>;
    async fn contract_generation(&self, ctx: &RequestContext) -> Result<u64>;
    async fn agency_contract_generation(&self, ctx: &RequestContext) -> Result<u64>;
}

/// persistence for plans and their items
///
/// `process_payment` must apply the whole commit or none of it, and only
/// while the stored version still equals `commit.expected_version`. Every
/// write that changes a plan bumps its version. Timestamps come from the
/// caller's clock.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<InstallmentPlan>>;
    async fn get_by_id(&self, ctx: &RequestContext, plan_id: PlanId) -> Result<InstallmentPlan>;
    async fn create(&self, ctx: &RequestContext, plan: NewPlan, created_at: DateTime<Utc>) -> Result<InstallmentPlan>;
    async fn create_item(&self, ctx: &RequestContext, plan_id: PlanId, item: NewItem) -> Result<InstallmentItem>;
    async fn update_plan_status(
        &self,
        ctx: &RequestContext,
        plan_id: PlanId,
        status: PlanStatus,
        expected_version: u64,
        changed_at: DateTime<Utc>,
    ) -> Result<InstallmentPlan>;
    async fn process_payment(&self, ctx: &RequestContext, commit: PlanCommit) -> Result<InstallmentPlan>;
    async fn generation(&self, ctx: &RequestContext) -> Result<u64>;
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn get_by_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Vec<StraightPayment>>;
    async fn get_by_id(&self, ctx: &RequestContext, payment_id: PaymentId) -> Result<StraightPayment>;
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<StraightPayment>>;
    async fn update_status(
        &self,
        ctx: &RequestContext,
        payment_id: PaymentId,
        status: StraightPaymentStatus,
        expected_version: u64,
        changed_at: DateTime<Utc>,
    ) -> Result<StraightPayment>;
    async fn generation(&self, ctx: &RequestContext) -> Result<u64>;
}

#[async_trait]
pub trait QuotationService: Send + Sync {
    async fn get_by_id(&self, ctx: &RequestContext, quotation_id: QuotationId) -> Result<Quotation>;
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Quotation>>;
    async fn generation(&self, ctx: &RequestContext) -> Result<u64>;
}

/// the five collaborator ports the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderService>,
    pub contracts: Arc<dyn ContractService>,
    pub plans: Arc<dyn PlanStore>,
    pub payments: Arc<dyn PaymentService>,
    pub quotations: Arc<dyn QuotationService>,
}

impl Collaborators {
    /// every port served by one in-memory backend
    pub fn in_memory(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            orders: backend.clone(),
            contracts: backend.clone(),
            plans: backend.clone(),
            payments: backend.clone(),
            quotations: backend,
        }
    }
}
