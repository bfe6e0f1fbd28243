use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::types::{
    AgencyContractId, AgencyId, ContractId, ContractStatus, CustomerId, DebtParty, OrderId,
    OrderStatus, PaymentId, PaymentMethod, PlanOwner, QuotationId, StraightPaymentStatus,
};

/// reference to either kind of contract; same shape as a plan's owner
pub type ContractRef = PlanOwner;

/// who an order was sold to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Buyer {
    Customer(CustomerId),
    Agency(AgencyId),
}

impl Buyer {
    pub fn from_refs(customer_id: Option<CustomerId>, agency_id: Option<AgencyId>) -> Result<Self> {
        match (customer_id, agency_id) {
            (Some(id), None) => Ok(Buyer::Customer(id)),
            (None, Some(id)) => Ok(Buyer::Agency(id)),
            _ => Err(EngineError::validation(
                "order must be placed by exactly one of a customer or an agency",
            )),
        }
    }

    pub fn party(&self) -> DebtParty {
        match self {
            Buyer::Customer(id) => DebtParty::Customer(*id),
            Buyer::Agency(id) => DebtParty::Agency(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: Buyer,
    /// selling agency, if any
    pub agency_id: Option<AgencyId>,
    pub status: OrderStatus,
    pub delivered: bool,
    pub version: u64,
}

impl Order {
    pub fn new(id: OrderId, buyer: Buyer) -> Self {
        Self {
            id,
            buyer,
            agency_id: None,
            status: OrderStatus::Pending,
            delivered: false,
            version: 1,
        }
    }
}

/// customer contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub quotation_id: QuotationId,
    pub order_id: Option<OrderId>,
    pub status: ContractStatus,
    pub version: u64,
}

/// dealer contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyContract {
    pub id: AgencyContractId,
    pub agency_id: AgencyId,
    pub order_id: Option<OrderId>,
    pub status: ContractStatus,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub customer_id: CustomerId,
}

/// one-shot payment against an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StraightPayment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub prepay: Money,
    pub payment_method: PaymentMethod,
    pub status: StraightPaymentStatus,
    pub version: u64,
    pub last_modified: DateTime<Utc>,
}

impl StraightPayment {
    pub fn is_completed(&self) -> bool {
        self.status == StraightPaymentStatus::Completed
    }

    /// Pending -> Completed | Failed, exactly once
    pub fn check_transition(&self, next: StraightPaymentStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(EngineError::validation(format!(
                "straight payment {} is already {:?}",
                self.id, self.status
            )));
        }
        if !next.is_terminal() {
            return Err(EngineError::validation(format!(
                "straight payment {} can only settle to Completed or Failed",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(status: StraightPaymentStatus) -> StraightPayment {
        StraightPayment {
            id: 1,
            order_id: 1,
            amount: Money::from_minor(100),
            prepay: Money::ZERO,
            payment_method: PaymentMethod::Cash,
            status,
            version: 1,
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_straight_payment_settles_once() {
        let pending = payment(StraightPaymentStatus::Pending);
        assert!(pending.check_transition(StraightPaymentStatus::Completed).is_ok());
        assert!(pending.check_transition(StraightPaymentStatus::Failed).is_ok());
        assert!(pending.check_transition(StraightPaymentStatus::Pending).is_err());

        let done = payment(StraightPaymentStatus::Completed);
        assert!(done.check_transition(StraightPaymentStatus::Failed).is_err());
        assert!(payment(StraightPaymentStatus::Failed)
            .check_transition(StraightPaymentStatus::Completed)
            .is_err());
    }

    #[test]
    fn test_buyer_refs() {
        assert_eq!(Buyer::from_refs(Some(4), None).unwrap().party(), DebtParty::Customer(4));
        assert_eq!(Buyer::from_refs(None, Some(9)).unwrap().party(), DebtParty::Agency(9));
        assert!(Buyer::from_refs(Some(4), Some(9)).is_err());
        assert!(Buyer::from_refs(None, None).is_err());
    }
}
