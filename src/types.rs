use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

pub type PlanId = u64;
pub type ItemId = u64;
pub type ContractId = u64;
pub type AgencyContractId = u64;
pub type QuotationId = u64;
pub type CustomerId = u64;
pub type AgencyId = u64;
pub type OrderId = u64;
pub type PaymentId = u64;

/// which contract a plan is financed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanOwner {
    /// customer contract
    Contract(ContractId),
    /// dealer contract
    AgencyContract(AgencyContractId),
}

impl PlanOwner {
    /// build from the two optional foreign keys carried on the wire; exactly one must be set
    pub fn from_refs(
        contract_id: Option<ContractId>,
        agency_contract_id: Option<AgencyContractId>,
    ) -> Result<Self> {
        match (contract_id, agency_contract_id) {
            (Some(id), None) => Ok(PlanOwner::Contract(id)),
            (None, Some(id)) => Ok(PlanOwner::AgencyContract(id)),
            (Some(_), Some(_)) => Err(EngineError::validation(
                "plan references both a contract and an agency contract",
            )),
            (None, None) => Err(EngineError::validation(
                "plan references neither a contract nor an agency contract",
            )),
        }
    }

    pub fn contract_id(&self) -> Option<ContractId> {
        match self {
            PlanOwner::Contract(id) => Some(*id),
            PlanOwner::AgencyContract(_) => None,
        }
    }

    pub fn agency_contract_id(&self) -> Option<AgencyContractId> {
        match self {
            PlanOwner::AgencyContract(id) => Some(*id),
            PlanOwner::Contract(_) => None,
        }
    }
}

/// party a debt is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DebtParty {
    Customer(CustomerId),
    Agency(AgencyId),
}

/// interest method; only fixed-rate, fixed-schedule plans are modelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterestMethod {
    #[default]
    Fixed,
}

/// persisted item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Pending,
    Partial,
    Paid,
}

impl ItemStatus {
    /// can still receive allocations
    pub fn is_open(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Partial)
    }
}

/// item status as shown to users; overdue is layered on pending/partial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

/// plan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanStatus {
    /// created, contract not yet signed
    Pending,
    /// contract signed, payments expected
    Active,
    /// every item paid
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }

    /// explicit edits; completion is only ever derived
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        matches!(
            (self, next),
            (PlanStatus::Pending, PlanStatus::Active)
                | (PlanStatus::Pending, PlanStatus::Cancelled)
                | (PlanStatus::Active, PlanStatus::Cancelled)
        )
    }

    pub fn accepts_payments(&self) -> bool {
        matches!(self, PlanStatus::Pending | PlanStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StraightPaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl StraightPaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StraightPaymentStatus::Pending)
    }
}

/// external order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    /// some money received, under the ready threshold
    Partial,
    /// enough received to prepare the order
    PartialReady,
    Paid,
    /// paid and delivered
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Draft,
    Signed,
    Paying,
    Completed,
    Cancelled,
}

/// which mechanism a payment went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    Straight,
    Installment,
}

/// customer debt classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Paid,
    Partial,
    HighDebt,
    Unpaid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_owner_requires_exactly_one_ref() {
        assert_eq!(PlanOwner::from_refs(Some(3), None).unwrap(), PlanOwner::Contract(3));
        assert_eq!(
            PlanOwner::from_refs(None, Some(9)).unwrap(),
            PlanOwner::AgencyContract(9)
        );
        assert!(PlanOwner::from_refs(Some(3), Some(9)).is_err());
        assert!(PlanOwner::from_refs(None, None).is_err());
    }

    #[test]
    fn test_plan_status_edits() {
        assert!(PlanStatus::Pending.can_transition_to(PlanStatus::Active));
        assert!(PlanStatus::Active.can_transition_to(PlanStatus::Cancelled));
        assert!(!PlanStatus::Active.can_transition_to(PlanStatus::Completed));
        assert!(!PlanStatus::Active.can_transition_to(PlanStatus::Pending));
        assert!(!PlanStatus::Cancelled.can_transition_to(PlanStatus::Active));
    }

    #[test]
    fn test_debt_status_wire_names() {
        let json = serde_json::to_string(&DebtStatus::HighDebt).unwrap();
        assert_eq!(json, "\"high_debt\"");
    }
}
