use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collaborators::{Collaborators, RequestContext};
use crate::config::EngineConfig;
use crate::debt::{
    CollectionVersions, CustomerDebtView, DebtAggregator, DebtOverview, DebtSnapshot,
    DebtViewCache, LookupFailure, SnapshotCollection,
};
use crate::decimal::{Money, Rate};
use crate::entities::{ContractRef, StraightPayment};
use crate::errors::{EngineError, Result};
use crate::events::{Event, EventStore};
use crate::payments::{
    apply_allocation, AllocationEngine, AllocationPreview, AllocationRequest, PlanBuilder,
    PlanCommit, ScheduleGenerator,
};
use crate::plan::{AllocationRecord, InstallmentPlan};
use crate::status::{plan_status, rederive_items, StatusProjector};
use crate::types::{
    ContractStatus, DebtParty, OrderId, OrderStatus, PaymentId, PaymentKind, PlanId, PlanOwner,
    PlanStatus, StraightPaymentStatus,
};

/// order and contract status writes made by one projection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionOutcome {
    pub order: Option<(OrderId, OrderStatus)>,
    pub contract: Option<(ContractRef, ContractStatus)>,
}

/// result of a committed allocation
///
/// The allocation is durable once a receipt exists. A failed projection is
/// reported in `projection_error`; `Engine::rederive` repairs it.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub commit_id: Uuid,
    pub plan: InstallmentPlan,
    pub records: Vec<AllocationRecord>,
    pub projection: ProjectionOutcome,
    pub projection_error: Option<EngineError>,
}

impl CommitReceipt {
    pub fn amount(&self) -> Money {
        self.records.iter().map(|r| r.amount_applied).sum()
    }
}

/// result of settling a straight payment
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub payment: StraightPayment,
    pub projection: ProjectionOutcome,
    pub projection_error: Option<EngineError>,
}

/// result of recomputing a plan from its persisted paid amounts
#[derive(Debug, Clone)]
pub struct RederiveOutcome {
    pub plan: InstallmentPlan,
    /// whether the stored plan needed repair
    pub repaired: bool,
    pub projection: ProjectionOutcome,
}

/// orchestrates allocation, status projection and debt aggregation over the collaborator ports
pub struct Engine {
    config: EngineConfig,
    collaborators: Collaborators,
    generator: ScheduleGenerator,
    allocator: AllocationEngine,
    projector: StatusProjector,
    aggregator: DebtAggregator,
    plan_locks: DashMap<PlanId, Arc<Mutex<()>>>,
    cache: DebtViewCache,
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator: ScheduleGenerator::new(config.schedule.clone()),
            allocator: AllocationEngine::new(),
            projector: StatusProjector::new(config.projection.clone()),
            aggregator: DebtAggregator::new(config.debt.clone()),
            plan_locks: DashMap::new(),
            cache: DebtViewCache::new(),
            config,
            collaborators,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &DebtViewCache {
        &self.cache
    }

    fn plan_lock(&self, plan_id: PlanId) -> Arc<Mutex<()>> {
        self.plan_locks.entry(plan_id).or_default().clone()
    }

    /// validate a plan against its contract and persist it with its schedule
    pub async fn create_plan(
        &self,
        ctx: &RequestContext,
        builder: PlanBuilder,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<InstallmentPlan> {
        let draft = builder.build(&self.generator, time_provider)?;

        // the owning contract must exist before a plan can hang off it
        match draft.plan.owner {
            PlanOwner::Contract(id) => {
                self.collaborators.contracts.get_by_id(ctx, id).await?;
            }
            PlanOwner::AgencyContract(id) => {
                self.collaborators.contracts.get_agency_contract(ctx, id).await?;
            }
        }

        let now = time_provider.now();
        let header = self.collaborators.plans.create(ctx, draft.plan.clone(), now).await?;
        for item in &draft.items {
            if let Err(e) = self.collaborators.plans.create_item(ctx, header.id, item.clone()).await {
                warn!(plan_id = header.id, error = %e, "schedule write failed, cancelling partial plan");
                let current = self.collaborators.plans.get_by_id(ctx, header.id).await?;
                self.collaborators
                    .plans
                    .update_plan_status(ctx, header.id, PlanStatus::Cancelled, current.version, now)
                    .await?;
                return Err(e);
            }
        }

        let plan = self.collaborators.plans.get_by_id(ctx, header.id).await?;
        plan.check_invariants()?;

        events.emit(Event::PlanCreated {
            plan_id: plan.id,
            owner: plan.owner,
            financed_amount: plan.financed_amount(),
            installments: plan.items.len() as u32,
            timestamp: time_provider.now(),
        });
        info!(
            plan_id = plan.id,
            owner = ?plan.owner,
            financed = plan.financed_amount().as_minor(),
            installments = plan.items.len(),
            "installment plan created"
        );

        Ok(plan)
    }

    pub async fn get_plan(&self, ctx: &RequestContext, plan_id: PlanId) -> Result<InstallmentPlan> {
        self.collaborators.plans.get_by_id(ctx, plan_id).await
    }

    /// read-only breakdown of a payment against the plan's current version
    pub async fn preview(
        &self,
        ctx: &RequestContext,
        request: &AllocationRequest,
    ) -> Result<AllocationPreview> {
        let start_item_id = request.validate()?;
        let plan = self.collaborators.plans.get_by_id(ctx, request.plan_id).await?;
        let preview = self.allocator.preview(&plan, start_item_id, request.amount)?;

        debug!(
            plan_id = plan.id,
            version = plan.version,
            amount = request.amount.as_minor(),
            lines = preview.lines.len(),
            "allocation previewed"
        );
        Ok(preview)
    }

    /// apply a preview, persist it, then project order and contract status
    ///
    /// Commits on one plan are serialized; a preview computed against an
    /// older version fails with `StaleSnapshot` and must be redone.
    pub async fn commit(
        &self,
        ctx: &RequestContext,
        preview: &AllocationPreview,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<CommitReceipt> {
        let lock = self.plan_lock(preview.plan_id);
        let _guard = lock.lock().await;

        let current = self.collaborators.plans.get_by_id(ctx, preview.plan_id).await?;
        // events only leave this function once the store accepted the commit
        let mut staged = EventStore::new();
        let commit = apply_allocation(&current, preview, time_provider, &mut staged).map_err(|e| {
            if e.is_retryable() {
                warn!(plan_id = preview.plan_id, error = %e, "allocation rejected at commit");
            }
            e
        })?;

        let PlanCommit {
            commit_id, records, ..
        } = commit.clone();
        let plan = match self.collaborators.plans.process_payment(ctx, commit).await {
            Ok(plan) => plan,
            Err(e) => {
                if let EngineError::ConsistencyViolation { .. } = e {
                    error!(plan_id = preview.plan_id, error = %e, "store refused an inconsistent commit");
                }
                return Err(e);
            }
        };

        for event in staged.take_events() {
            events.emit(event);
        }
        info!(
            %commit_id,
            plan_id = plan.id,
            version = plan.version,
            amount = preview.total_applied().as_minor(),
            total_paid = plan.total_paid.as_minor(),
            "allocation committed"
        );

        self.evict_plan_party(ctx, &plan).await;

        let (projection, projection_error) = match self.project_plan(ctx, &plan, time_provider, events).await {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                error!(plan_id = plan.id, error = %e, "status projection failed after commit");
                (ProjectionOutcome::default(), Some(e))
            }
        };

        Ok(CommitReceipt {
            commit_id,
            plan,
            records,
            projection,
            projection_error,
        })
    }

    /// explicit plan status edit (activate or cancel)
    pub async fn update_plan_status(
        &self,
        ctx: &RequestContext,
        plan_id: PlanId,
        status: PlanStatus,
        reason: &str,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<InstallmentPlan> {
        let lock = self.plan_lock(plan_id);
        let _guard = lock.lock().await;

        let current = self.collaborators.plans.get_by_id(ctx, plan_id).await?;
        if !current.status.can_transition_to(status) {
            return Err(EngineError::validation(format!(
                "plan {} cannot move from {:?} to {:?}",
                plan_id, current.status, status
            )));
        }

        let plan = self
            .collaborators
            .plans
            .update_plan_status(ctx, plan_id, status, current.version, time_provider.now())
            .await?;

        events.emit(Event::PlanStatusChanged {
            plan_id,
            old_status: current.status,
            new_status: status,
            reason: reason.to_string(),
            timestamp: time_provider.now(),
        });
        info!(plan_id, old = ?current.status, new = ?status, reason, "plan status changed");

        self.evict_plan_party(ctx, &plan).await;
        Ok(plan)
    }

    pub async fn complete_straight_payment(
        &self,
        ctx: &RequestContext,
        payment_id: PaymentId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<SettlementReceipt> {
        self.settle_straight_payment(ctx, payment_id, StraightPaymentStatus::Completed, time_provider, events)
            .await
    }

    pub async fn fail_straight_payment(
        &self,
        ctx: &RequestContext,
        payment_id: PaymentId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<SettlementReceipt> {
        self.settle_straight_payment(ctx, payment_id, StraightPaymentStatus::Failed, time_provider, events)
            .await
    }

    async fn settle_straight_payment(
        &self,
        ctx: &RequestContext,
        payment_id: PaymentId,
        status: StraightPaymentStatus,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<SettlementReceipt> {
        let current = self.collaborators.payments.get_by_id(ctx, payment_id).await?;
        current.check_transition(status)?;

        let payment = self
            .collaborators
            .payments
            .update_status(ctx, payment_id, status, current.version, time_provider.now())
            .await?;

        events.emit(Event::StraightPaymentSettled {
            payment_id,
            order_id: payment.order_id,
            amount: payment.amount,
            status,
            timestamp: time_provider.now(),
        });
        info!(
            payment_id,
            order_id = payment.order_id,
            amount = payment.amount.as_minor(),
            status = ?status,
            "straight payment settled"
        );

        if let Ok(order) = self.collaborators.orders.get_by_id(ctx, payment.order_id).await {
            self.cache.evict(order.buyer.party()).await;
        }

        let (projection, projection_error) = if status == StraightPaymentStatus::Completed {
            match self.project_straight(ctx, payment.order_id, time_provider, events).await {
                Ok(outcome) => (outcome, None),
                Err(e) => {
                    error!(payment_id, error = %e, "status projection failed after settlement");
                    (ProjectionOutcome::default(), Some(e))
                }
            }
        } else {
            (ProjectionOutcome::default(), None)
        };

        Ok(SettlementReceipt {
            payment,
            projection,
            projection_error,
        })
    }

    /// recompute item and plan status from persisted paid amounts and re-run projection
    ///
    /// Safe to run any number of times; recovers from a crash between commit
    /// and projection.
    pub async fn rederive(
        &self,
        ctx: &RequestContext,
        plan_id: PlanId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<RederiveOutcome> {
        let lock = self.plan_lock(plan_id);
        let _guard = lock.lock().await;

        let current = self.collaborators.plans.get_by_id(ctx, plan_id).await?;
        let now = time_provider.now();
        let mut plan = current.clone();
        let mut staged = EventStore::new();

        for (item_id, old_status, new_status) in rederive_items(&mut plan) {
            let installment_no = plan.item(item_id).map(|i| i.installment_no).unwrap_or_default();
            staged.emit(Event::ItemStatusChanged {
                plan_id,
                item_id,
                installment_no,
                old_status,
                new_status,
                timestamp: now,
            });
        }

        let paid: Money = plan.items.iter().map(|i| i.amount_paid).sum();
        if paid != plan.total_paid {
            warn!(
                plan_id,
                stored = plan.total_paid.as_minor(),
                derived = paid.as_minor(),
                "plan total paid disagrees with its items"
            );
            plan.total_paid = paid;
        }

        let derived = plan_status(&plan);
        if derived != plan.status {
            staged.emit(Event::PlanStatusChanged {
                plan_id,
                old_status: plan.status,
                new_status: derived,
                reason: "re-derived from item balances".to_string(),
                timestamp: now,
            });
            plan.status = derived;
        }

        // corrupt plans are never persisted or projected
        plan.check_invariants().map_err(|e| {
            error!(plan_id, error = %e, "plan cannot be repaired from its items");
            e
        })?;

        let repaired = plan != current;
        let plan = if repaired {
            plan.version = current.version + 1;
            plan.last_modified = now;
            let commit = PlanCommit {
                commit_id: Uuid::new_v4(),
                plan_id,
                expected_version: current.version,
                plan,
                records: Vec::new(),
            };
            let stored = self.collaborators.plans.process_payment(ctx, commit).await?;
            for event in staged.take_events() {
                events.emit(event);
            }
            info!(plan_id, version = stored.version, "plan repaired from item balances");
            self.evict_plan_party(ctx, &stored).await;
            stored
        } else {
            current
        };

        let projection = self.project_plan(ctx, &plan, time_provider, events).await?;
        Ok(RederiveOutcome {
            plan,
            repaired,
            projection,
        })
    }

    /// debt view for one customer or agency, served from cache when nothing changed
    pub async fn debt_view(
        &self,
        ctx: &RequestContext,
        party: DebtParty,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<CustomerDebtView> {
        ctx.require_token()?;
        let versions = self.stamp(ctx).await;
        if let Some(versions) = versions {
            if let Some(view) = self.cache.get(party, versions).await {
                debug!(?party, "debt view served from cache");
                return Ok(view);
            }
        }

        let snapshot = self
            .party_snapshot(ctx, party, versions.unwrap_or_default())
            .await?;
        let view = self
            .aggregator
            .build_debt_view(party, &snapshot, time_provider, events)?;
        if versions.is_some() && snapshot.is_complete() {
            self.cache.insert(view.clone()).await;
        }
        Ok(view)
    }

    /// ranked debt views for every customer and agency
    pub async fn debt_overview(
        &self,
        ctx: &RequestContext,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<DebtOverview> {
        ctx.require_token()?;
        let versions = self.stamp(ctx).await;
        let snapshot = self.full_snapshot(ctx, versions.unwrap_or_default()).await?;
        let overview = self.aggregator.all_debt_views(&snapshot, time_provider, events)?;
        if versions.is_some() && snapshot.is_complete() {
            for view in &overview.views {
                self.cache.insert(view.clone()).await;
            }
        }
        info!(
            parties = overview.views.len(),
            unattributed = overview.unattributed.len(),
            failed_reads = overview.lookup_failures.len(),
            "debt overview built"
        );
        Ok(overview)
    }

    /// generation stamp, or `None` when a counter could not be read and the cache must be bypassed
    async fn stamp(&self, ctx: &RequestContext) -> Option<CollectionVersions> {
        match self.collection_versions(ctx).await {
            Ok(versions) => Some(versions),
            Err(e) => {
                warn!(error = %e, "collection generations unavailable, bypassing debt view cache");
                None
            }
        }
    }

    async fn collection_versions(&self, ctx: &RequestContext) -> Result<CollectionVersions> {
        let c = &self.collaborators;
        Ok(CollectionVersions {
            orders: c.orders.generation(ctx).await?,
            payments: c.payments.generation(ctx).await?,
            plans: c.plans.generation(ctx).await?,
            contracts: c.contracts.contract_generation(ctx).await?,
            agency_contracts: c.contracts.agency_contract_generation(ctx).await?,
            quotations: c.quotations.generation(ctx).await?,
        })
    }

    /// collections read after `versions` was taken, so the stamp never runs ahead of the data
    ///
    /// Only the party's orders are required. A failed chain read counts as an
    /// empty collection and a failed payment read drops that one order; both
    /// are recorded on the snapshot.
    async fn party_snapshot(
        &self,
        ctx: &RequestContext,
        party: DebtParty,
        versions: CollectionVersions,
    ) -> Result<DebtSnapshot> {
        let c = &self.collaborators;
        let mut failures = Vec::new();
        let mut orders = match party {
            DebtParty::Customer(id) => c.orders.get_by_customer(ctx, id).await?,
            DebtParty::Agency(id) => c.orders.get_by_agency(ctx, id).await?,
        };

        let order_ids: BTreeSet<OrderId> = orders.iter().map(|o| o.id).collect();
        let mut payments = Vec::new();
        for order_id in order_ids {
            match c.payments.get_by_order(ctx, order_id).await {
                Ok(rows) => payments.extend(rows),
                Err(e) => {
                    warn!(order_id, error = %e, "payment read failed, order left out of debt view");
                    orders.retain(|o| o.id != order_id);
                    failures.push(LookupFailure {
                        collection: SnapshotCollection::Payments,
                        order_id: Some(order_id),
                        message: e.to_string(),
                    });
                }
            }
        }

        let plans = tolerant(c.plans.get_all(ctx), SnapshotCollection::Plans, &mut failures).await;
        let contracts = tolerant(c.contracts.get_all(ctx), SnapshotCollection::Contracts, &mut failures).await;
        let agency_contracts = tolerant(
            c.contracts.get_all_agency_contracts(ctx),
            SnapshotCollection::AgencyContracts,
            &mut failures,
        )
        .await;
        let quotations = tolerant(c.quotations.get_all(ctx), SnapshotCollection::Quotations, &mut failures).await;

        Ok(DebtSnapshot {
            orders,
            payments,
            plans,
            contracts,
            agency_contracts,
            quotations,
            versions,
            lookup_failures: failures,
        })
    }

    async fn full_snapshot(&self, ctx: &RequestContext, versions: CollectionVersions) -> Result<DebtSnapshot> {
        let c = &self.collaborators;
        let mut failures = Vec::new();
        let orders = c.orders.get_all(ctx).await?;
        let payments = tolerant(c.payments.get_all(ctx), SnapshotCollection::Payments, &mut failures).await;
        let plans = tolerant(c.plans.get_all(ctx), SnapshotCollection::Plans, &mut failures).await;
        let contracts = tolerant(c.contracts.get_all(ctx), SnapshotCollection::Contracts, &mut failures).await;
        let agency_contracts = tolerant(
            c.contracts.get_all_agency_contracts(ctx),
            SnapshotCollection::AgencyContracts,
            &mut failures,
        )
        .await;
        let quotations = tolerant(c.quotations.get_all(ctx), SnapshotCollection::Quotations, &mut failures).await;

        Ok(DebtSnapshot {
            orders,
            payments,
            plans,
            contracts,
            agency_contracts,
            quotations,
            versions,
            lookup_failures: failures,
        })
    }

    /// follow a plan to its party with point lookups
    async fn plan_party(&self, ctx: &RequestContext, plan: &InstallmentPlan) -> Result<DebtParty> {
        let chain_error = |e: EngineError| EngineError::ChainResolution {
            message: format!("plan {}: {}", plan.id, e),
        };
        let c = &self.collaborators;
        match plan.owner {
            PlanOwner::Contract(id) => {
                let contract = c.contracts.get_by_id(ctx, id).await.map_err(chain_error)?;
                let quotation = c
                    .quotations
                    .get_by_id(ctx, contract.quotation_id)
                    .await
                    .map_err(chain_error)?;
                Ok(DebtParty::Customer(quotation.customer_id))
            }
            PlanOwner::AgencyContract(id) => {
                let contract = c.contracts.get_agency_contract(ctx, id).await.map_err(chain_error)?;
                Ok(DebtParty::Agency(contract.agency_id))
            }
        }
    }

    async fn evict_plan_party(&self, ctx: &RequestContext, plan: &InstallmentPlan) {
        match self.plan_party(ctx, plan).await {
            Ok(party) => self.cache.evict(party).await,
            Err(e) => warn!(plan_id = plan.id, error = %e, "could not resolve plan party for cache eviction"),
        }
    }

    async fn contract_state(
        &self,
        ctx: &RequestContext,
        contract: ContractRef,
    ) -> Result<(ContractStatus, Option<OrderId>)> {
        match contract {
            PlanOwner::Contract(id) => {
                let c = self.collaborators.contracts.get_by_id(ctx, id).await?;
                Ok((c.status, c.order_id))
            }
            PlanOwner::AgencyContract(id) => {
                let c = self.collaborators.contracts.get_agency_contract(ctx, id).await?;
                Ok((c.status, c.order_id))
            }
        }
    }

    async fn apply_contract_projection(
        &self,
        ctx: &RequestContext,
        contract: ContractRef,
        current: ContractStatus,
        settled: bool,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Option<(ContractRef, ContractStatus)>> {
        let Some(next) = self.projector.project_contract(current, true, settled) else {
            return Ok(None);
        };
        self.collaborators.contracts.update_status(ctx, contract, next).await?;
        events.emit(Event::ContractStatusProjected {
            contract,
            old_status: current,
            new_status: next,
            timestamp: time_provider.now(),
        });
        info!(contract = ?contract, old = ?current, new = ?next, "contract status projected");
        Ok(Some((contract, next)))
    }

    async fn apply_order_projection(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        paid_share: Rate,
        kind: PaymentKind,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Option<(OrderId, OrderStatus)>> {
        let order = self.collaborators.orders.get_by_id(ctx, order_id).await?;
        let Some(next) = self
            .projector
            .project_order(order.status, paid_share, order.delivered, kind)
        else {
            return Ok(None);
        };
        self.collaborators.orders.update_status(ctx, order_id, next).await?;
        events.emit(Event::OrderStatusProjected {
            order_id,
            old_status: order.status,
            new_status: next,
            timestamp: time_provider.now(),
        });
        info!(order_id, old = ?order.status, new = ?next, share = %paid_share, "order status projected");
        Ok(Some((order_id, next)))
    }

    async fn project_plan(
        &self,
        ctx: &RequestContext,
        plan: &InstallmentPlan,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<ProjectionOutcome> {
        let mut outcome = ProjectionOutcome::default();
        if !plan.total_paid.is_positive() {
            return Ok(outcome);
        }

        let (status, order_id) = self.contract_state(ctx, plan.owner).await?;
        let settled = plan.status == PlanStatus::Completed;
        outcome.contract = self
            .apply_contract_projection(ctx, plan.owner, status, settled, time_provider, events)
            .await?;

        if let Some(order_id) = order_id {
            outcome.order = self
                .apply_order_projection(
                    ctx,
                    order_id,
                    plan.payment_percentage(),
                    PaymentKind::Installment,
                    time_provider,
                    events,
                )
                .await?;
        }

        Ok(outcome)
    }

    /// a completed straight payment settles its order and contract outright
    async fn project_straight(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<ProjectionOutcome> {
        let mut outcome = ProjectionOutcome {
            order: self
                .apply_order_projection(ctx, order_id, Rate::ONE, PaymentKind::Straight, time_provider, events)
                .await?,
            contract: None,
        };

        if let Some(contract) = self.collaborators.contracts.find_by_order(ctx, order_id).await? {
            let (status, _) = self.contract_state(ctx, contract).await?;
            outcome.contract = self
                .apply_contract_projection(ctx, contract, status, true, time_provider, events)
                .await?;
        }

        Ok(outcome)
    }
}

/// read a collection that may be missing; a failure is recorded and yields no rows
async fn tolerant<T>(
    read: impl Future<Output = Result<Vec<T>>>,
    collection: SnapshotCollection,
    failures: &mut Vec<LookupFailure>,
) -> Vec<T> {
    match read.await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(?collection, error = %e, "collection read failed, treating it as empty");
            failures.push(LookupFailure {
                collection,
                order_id: None,
                message: e.to_string(),
            });
            Vec::new()
        }
    }
}
