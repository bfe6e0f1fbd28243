use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{
    ContractStatus, DebtParty, ItemId, ItemStatus, OrderId, OrderStatus, PaymentId, PlanId,
    PlanOwner, PlanStatus, StraightPaymentStatus,
};

/// all events that can be emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // plan lifecycle
    PlanCreated {
        plan_id: PlanId,
        owner: PlanOwner,
        financed_amount: Money,
        installments: u32,
        timestamp: DateTime<Utc>,
    },
    PlanStatusChanged {
        plan_id: PlanId,
        old_status: PlanStatus,
        new_status: PlanStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // allocation
    AllocationCommitted {
        commit_id: Uuid,
        plan_id: PlanId,
        amount: Money,
        items_touched: usize,
        new_total_paid: Money,
        timestamp: DateTime<Utc>,
    },
    ItemStatusChanged {
        plan_id: PlanId,
        item_id: ItemId,
        installment_no: u32,
        old_status: ItemStatus,
        new_status: ItemStatus,
        timestamp: DateTime<Utc>,
    },

    // straight payments
    StraightPaymentSettled {
        payment_id: PaymentId,
        order_id: OrderId,
        amount: Money,
        status: StraightPaymentStatus,
        timestamp: DateTime<Utc>,
    },

    // projections
    OrderStatusProjected {
        order_id: OrderId,
        old_status: OrderStatus,
        new_status: OrderStatus,
        timestamp: DateTime<Utc>,
    },
    ContractStatusProjected {
        contract: PlanOwner,
        old_status: ContractStatus,
        new_status: ContractStatus,
        timestamp: DateTime<Utc>,
    },

    // aggregation
    ChainUnresolved {
        plan_id: PlanId,
        reason: String,
    },
    DebtViewBuilt {
        party: DebtParty,
        remaining_debt: Money,
        timestamp: DateTime<Utc>,
    },
}

/// events emitted by one engine call, drained by the caller
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
