use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::debt::CollectionVersions;
use crate::decimal::Money;
use crate::entities::{AgencyContract, Buyer, Contract, ContractRef, Order, Quotation, StraightPayment};
use crate::errors::{EngineError, Result};
use crate::payments::PlanCommit;
use crate::plan::{InstallmentItem, InstallmentPlan, NewItem, NewPlan};
use crate::types::{
    AgencyContractId, AgencyId, ContractId, ContractStatus, CustomerId, ItemId, OrderId,
    OrderStatus, PaymentId, PlanId, PlanOwner, PlanStatus, QuotationId, StraightPaymentStatus,
};

use super::{ContractService, OrderService, PaymentService, PlanStore, QuotationService, RequestContext};

#[derive(Debug)]
struct Collections {
    orders: BTreeMap<OrderId, Order>,
    contracts: BTreeMap<ContractId, Contract>,
    agency_contracts: BTreeMap<AgencyContractId, AgencyContract>,
    quotations: BTreeMap<QuotationId, Quotation>,
    payments: BTreeMap<PaymentId, StraightPayment>,
    plans: BTreeMap<PlanId, InstallmentPlan>,
    next_plan_id: PlanId,
    next_item_id: ItemId,
    versions: CollectionVersions,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            orders: BTreeMap::new(),
            contracts: BTreeMap::new(),
            agency_contracts: BTreeMap::new(),
            quotations: BTreeMap::new(),
            payments: BTreeMap::new(),
            plans: BTreeMap::new(),
            next_plan_id: 1,
            next_item_id: 1,
            versions: CollectionVersions::default(),
        }
    }
}

/// reference persistence behind every collaborator port
///
/// One lock guards all collections, so each write is atomic with respect to
/// readers and bumps the generation of the collection it touched.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<Collections>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn versions(&self) -> CollectionVersions {
        self.state.read().await.versions
    }

    pub async fn seed_order(&self, order: Order) {
        let mut state = self.state.write().await;
        state.orders.insert(order.id, order);
        state.versions.orders += 1;
    }

    pub async fn seed_contract(&self, contract: Contract) {
        let mut state = self.state.write().await;
        state.contracts.insert(contract.id, contract);
        state.versions.contracts += 1;
    }

    pub async fn seed_agency_contract(&self, contract: AgencyContract) {
        let mut state = self.state.write().await;
        state.agency_contracts.insert(contract.id, contract);
        state.versions.agency_contracts += 1;
    }

    pub async fn seed_quotation(&self, quotation: Quotation) {
        let mut state = self.state.write().await;
        state.quotations.insert(quotation.id, quotation);
        state.versions.quotations += 1;
    }

    pub async fn seed_payment(&self, payment: StraightPayment) {
        let mut state = self.state.write().await;
        state.payments.insert(payment.id, payment);
        state.versions.payments += 1;
    }

    /// store a fully formed plan, keeping the id counters ahead of it
    pub async fn seed_plan(&self, plan: InstallmentPlan) {
        let mut state = self.state.write().await;
        state.next_plan_id = state.next_plan_id.max(plan.id + 1);
        if let Some(max_item) = plan.items.iter().map(|i| i.id).max() {
            state.next_item_id = state.next_item_id.max(max_item + 1);
        }
        state.plans.insert(plan.id, plan);
        state.versions.plans += 1;
    }

    /// overwrite a stored plan as-is, bypassing every check
    pub async fn overwrite_plan(&self, plan: InstallmentPlan) {
        let mut state = self.state.write().await;
        state.plans.insert(plan.id, plan);
        state.versions.plans += 1;
    }
}

fn not_found(entity: &'static str, id: u64) -> EngineError {
    EngineError::NotFound { entity, id }
}

#[async_trait]
impl OrderService for InMemoryBackend {
    async fn get_by_agency(&self, ctx: &RequestContext, agency_id: AgencyId) -> Result<Vec<Order>> {
        ctx.require_token()?;
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.buyer == Buyer::Agency(agency_id))
            .cloned()
            .collect())
    }

    async fn get_by_customer(&self, ctx: &RequestContext, customer_id: CustomerId) -> Result<Vec<Order>> {
        ctx.require_token()?;
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.buyer == Buyer::Customer(customer_id))
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        ctx.require_token()?;
        let state = self.state.read().await;
        state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| not_found("order", order_id))
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Order>> {
        ctx.require_token()?;
        Ok(self.state.read().await.orders.values().cloned().collect())
    }

    async fn update_status(&self, ctx: &RequestContext, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        ctx.require_token()?;
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| not_found("order", order_id))?;
        order.status = status;
        order.version += 1;
        let updated = order.clone();
        state.versions.orders += 1;
        Ok(updated)
    }

    async fn generation(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.require_token()?;
        Ok(self.state.read().await.versions.orders)
    }
}

#[async_trait]
impl ContractService for InMemoryBackend {
    async fn get_by_id(&self, ctx: &RequestContext, contract_id: ContractId) -> Result<Contract> {
        ctx.require_token()?;
        let state = self.state.read().await;
        state
            .contracts
            .get(&contract_id)
            .cloned()
            .ok_or_else(|| not_found("contract", contract_id))
    }

    async fn get_agency_contract(
        &self,
        ctx: &RequestContext,
        agency_contract_id: AgencyContractId,
    ) -> Result<AgencyContract> {
        ctx.require_token()?;
        let state = self.state.read().await;
        state
            .agency_contracts
            .get(&agency_contract_id)
            .cloned()
            .ok_or_else(|| not_found("agency contract", agency_contract_id))
    }

    async fn find_by_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Option<ContractRef>> {
        ctx.require_token()?;
        let state = self.state.read().await;
        let customer = state
            .contracts
            .values()
            .find(|c| c.order_id == Some(order_id))
            .map(|c| PlanOwner::Contract(c.id));
        let agency = || {
            state
                .agency_contracts
                .values()
                .find(|c| c.order_id == Some(order_id))
                .map(|c| PlanOwner::AgencyContract(c.id))
        };
        Ok(customer.or_else(agency))
    }

    async fn update_status(&self, ctx: &RequestContext, contract: ContractRef, status: ContractStatus) -> Result<()> {
        ctx.require_token()?;
        let mut state = self.state.write().await;
        match contract {
            PlanOwner::Contract(id) => {
                let c = state.contracts.get_mut(&id).ok_or_else(|| not_found("contract", id))?;
                c.status = status;
                c.version += 1;
                state.versions.contracts += 1;
            }
            PlanOwner::AgencyContract(id) => {
                let c = state
                    .agency_contracts
                    .get_mut(&id)
                    .ok_or_else(|| not_found("agency contract", id))?;
                c.status = status;
                c.version += 1;
                state.versions.agency_contracts += 1;
            }
        }
        Ok(())
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Contract>> {
        ctx.require_token()?;
        Ok(self.state.read().await.contracts.values().cloned().collect())
    }

    async fn get_all_agency_contracts(&self, ctx: &RequestContext) -> Result<Vec<AgencyContract>> {
        ctx.require_token()?;
        Ok(self.state.read().await.agency_contracts.values().cloned().collect())
    }

    async fn contract_generation(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.require_token()?;
        Ok(self.state.read().await.versions.contracts)
    }

    async fn agency_contract_generation(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.require_token()?;
        Ok(self.state.read().await.versions.agency_contracts)
    }
}

#[async_trait]
impl PlanStore for InMemoryBackend {
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<InstallmentPlan>> {
        ctx.require_token()?;
        Ok(self.state.read().await.plans.values().cloned().collect())
    }

    async fn get_by_id(&self, ctx: &RequestContext, plan_id: PlanId) -> Result<InstallmentPlan> {
        ctx.require_token()?;
        let state = self.state.read().await;
        state
            .plans
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| not_found("plan", plan_id))
    }

    async fn create(&self, ctx: &RequestContext, plan: NewPlan, created_at: DateTime<Utc>) -> Result<InstallmentPlan> {
        ctx.require_token()?;
        let mut state = self.state.write().await;
        let id = state.next_plan_id;
        state.next_plan_id += 1;

        let stored = InstallmentPlan {
            id,
            owner: plan.owner,
            principal_amount: plan.principal_amount,
            deposit_amount: plan.deposit_amount,
            interest_rate: plan.interest_rate,
            interest_method: plan.interest_method,
            status: plan.status,
            total_paid: Money::ZERO,
            items: Vec::new(),
            version: 1,
            created_at,
            last_modified: created_at,
        };
        state.plans.insert(id, stored.clone());
        state.versions.plans += 1;
        Ok(stored)
    }

    async fn create_item(&self, ctx: &RequestContext, plan_id: PlanId, item: NewItem) -> Result<InstallmentItem> {
        ctx.require_token()?;
        let mut state = self.state.write().await;
        let item_id = state.next_item_id;

        let plan = state.plans.get_mut(&plan_id).ok_or_else(|| not_found("plan", plan_id))?;
        if plan.item_by_no(item.installment_no).is_some() {
            return Err(EngineError::validation(format!(
                "plan {} already has installment {}",
                plan_id, item.installment_no
            )));
        }

        let created = InstallmentItem::new(item_id, plan_id, item.installment_no, item.due_date, item.amount_due);
        plan.items.push(created.clone());
        plan.items.sort_by_key(|i| i.installment_no);
        plan.version += 1;

        state.next_item_id += 1;
        state.versions.plans += 1;
        Ok(created)
    }

    async fn update_plan_status(
        &self,
        ctx: &RequestContext,
        plan_id: PlanId,
        status: PlanStatus,
        expected_version: u64,
        changed_at: DateTime<Utc>,
    ) -> Result<InstallmentPlan> {
        ctx.require_token()?;
        let mut state = self.state.write().await;
        let plan = state.plans.get_mut(&plan_id).ok_or_else(|| not_found("plan", plan_id))?;
        if plan.version != expected_version {
            return Err(EngineError::StaleSnapshot {
                plan_id,
                expected: expected_version,
                actual: plan.version,
            });
        }
        plan.status = status;
        plan.version += 1;
        plan.last_modified = changed_at;
        let updated = plan.clone();
        state.versions.plans += 1;
        Ok(updated)
    }

    async fn process_payment(&self, ctx: &RequestContext, commit: PlanCommit) -> Result<InstallmentPlan> {
        ctx.require_token()?;
        let mut state = self.state.write().await;
        let stored = state
            .plans
            .get_mut(&commit.plan_id)
            .ok_or_else(|| not_found("plan", commit.plan_id))?;

        // compare-and-swap on the version read at preview time
        if stored.version != commit.expected_version {
            return Err(EngineError::StaleSnapshot {
                plan_id: commit.plan_id,
                expected: commit.expected_version,
                actual: stored.version,
            });
        }
        commit.plan.check_invariants()?;

        debug!(
            plan_id = commit.plan_id,
            version = commit.plan.version,
            records = commit.records.len(),
            "persisted plan commit"
        );
        *stored = commit.plan;
        let persisted = stored.clone();
        state.versions.plans += 1;
        Ok(persisted)
    }

    async fn generation(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.require_token()?;
        Ok(self.state.read().await.versions.plans)
    }
}

#[async_trait]
impl PaymentService for InMemoryBackend {
    async fn get_by_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Vec<StraightPayment>> {
        ctx.require_token()?;
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, ctx: &RequestContext, payment_id: PaymentId) -> Result<StraightPayment> {
        ctx.require_token()?;
        let state = self.state.read().await;
        state
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| not_found("straight payment", payment_id))
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<StraightPayment>> {
        ctx.require_token()?;
        Ok(self.state.read().await.payments.values().cloned().collect())
    }

    async fn update_status(
        &self,
        ctx: &RequestContext,
        payment_id: PaymentId,
        status: StraightPaymentStatus,
        expected_version: u64,
        changed_at: DateTime<Utc>,
    ) -> Result<StraightPayment> {
        ctx.require_token()?;
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| not_found("straight payment", payment_id))?;
        if payment.version != expected_version {
            return Err(EngineError::validation(format!(
                "straight payment {} changed since it was read (version {} != {})",
                payment_id, payment.version, expected_version
            )));
        }
        payment.check_transition(status)?;
        payment.status = status;
        payment.version += 1;
        payment.last_modified = changed_at;
        let updated = payment.clone();
        state.versions.payments += 1;
        Ok(updated)
    }

    async fn generation(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.require_token()?;
        Ok(self.state.read().await.versions.payments)
    }
}

#[async_trait]
impl QuotationService for InMemoryBackend {
    async fn get_by_id(&self, ctx: &RequestContext, quotation_id: QuotationId) -> Result<Quotation> {
        ctx.require_token()?;
        let state = self.state.read().await;
        state
            .quotations
            .get(&quotation_id)
            .cloned()
            .ok_or_else(|| not_found("quotation", quotation_id))
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Quotation>> {
        ctx.require_token()?;
        Ok(self.state.read().await.quotations.values().cloned().collect())
    }

    async fn generation(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.require_token()?;
        Ok(self.state.read().await.versions.quotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::example_plan;
    use chrono::TimeZone;

    fn ctx() -> RequestContext {
        RequestContext::new("token", "tester")
    }

    #[tokio::test]
    async fn test_stale_commit_is_rejected_whole() {
        let backend = InMemoryBackend::new();
        let plan = example_plan();
        backend.seed_plan(plan.clone()).await;

        let mut changed = plan.clone();
        changed.version = 2;
        let commit = PlanCommit {
            commit_id: uuid::Uuid::new_v4(),
            plan_id: plan.id,
            expected_version: 7,
            plan: changed,
            records: Vec::new(),
        };

        let err = PlanStore::process_payment(&backend, &ctx(), commit).await.unwrap_err();
        assert!(matches!(err, EngineError::StaleSnapshot { expected: 7, actual: 1, .. }));

        let stored = PlanStore::get_by_id(&backend, &ctx(), plan.id).await.unwrap();
        assert_eq!(stored, plan);
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_bumps_generation() {
        let backend = InMemoryBackend::new();
        let before = backend.versions().await;
        let draft_plan = NewPlan {
            owner: PlanOwner::Contract(1),
            principal_amount: Money::from_minor(300),
            deposit_amount: Money::ZERO,
            interest_rate: crate::decimal::Rate::ZERO,
            interest_method: Default::default(),
            status: PlanStatus::Pending,
        };

        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let plan = PlanStore::create(&backend, &ctx(), draft_plan, created_at).await.unwrap();
        assert_eq!(plan.created_at, created_at);
        assert_eq!(plan.version, 1);

        let item = NewItem {
            installment_no: 1,
            due_date: created_at,
            amount_due: Money::from_minor(300),
        };
        let created = PlanStore::create_item(&backend, &ctx(), plan.id, item.clone()).await.unwrap();
        assert_eq!(created.plan_id, plan.id);
        assert!(PlanStore::create_item(&backend, &ctx(), plan.id, item).await.is_err());

        // adding an item is a change to the plan
        let stored = PlanStore::get_by_id(&backend, &ctx(), plan.id).await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(backend.versions().await.plans, before.plans + 2);

        let later = created_at + chrono::Duration::days(3);
        let active = PlanStore::update_plan_status(&backend, &ctx(), plan.id, PlanStatus::Active, 2, later)
            .await
            .unwrap();
        assert_eq!(active.version, 3);
        assert_eq!(active.last_modified, later);
    }

    #[tokio::test]
    async fn test_missing_credential_is_refused() {
        let backend = InMemoryBackend::new();
        let anonymous = RequestContext::new("", "nobody");

        assert!(matches!(
            OrderService::get_all(&backend, &anonymous).await,
            Err(EngineError::Collaborator { .. })
        ));
    }
}
