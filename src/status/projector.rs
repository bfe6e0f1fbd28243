use crate::config::ProjectionThresholds;
use crate::decimal::Rate;
use crate::types::{ContractStatus, OrderStatus, PaymentKind};

/// maps payment progress and delivery state onto order and contract status
#[derive(Debug, Clone, Default)]
pub struct StatusProjector {
    thresholds: ProjectionThresholds,
}

impl StatusProjector {
    pub fn new(thresholds: ProjectionThresholds) -> Self {
        Self { thresholds }
    }

    /// order status implied by the paid share, `None` when nothing changes
    ///
    /// Straight payments are binary: only a full payment moves the order.
    /// Terminal orders are left alone and an order never moves backwards.
    pub fn project_order(
        &self,
        current: OrderStatus,
        paid_share: Rate,
        delivered: bool,
        kind: PaymentKind,
    ) -> Option<OrderStatus> {
        if current.is_terminal() {
            return None;
        }

        let fully_paid = paid_share >= self.thresholds.paid;
        let target = if fully_paid {
            if delivered {
                OrderStatus::Completed
            } else {
                OrderStatus::Paid
            }
        } else {
            match kind {
                PaymentKind::Straight => return None,
                PaymentKind::Installment => {
                    if paid_share >= self.thresholds.partial_ready {
                        OrderStatus::PartialReady
                    } else if paid_share > Rate::ZERO {
                        OrderStatus::Partial
                    } else {
                        return None;
                    }
                }
            }
        };

        if order_rank(target) > order_rank(current) {
            Some(target)
        } else {
            None
        }
    }

    /// contract status after a payment was recorded, `None` when nothing changes
    pub fn project_contract(
        &self,
        current: ContractStatus,
        payment_recorded: bool,
        settled: bool,
    ) -> Option<ContractStatus> {
        match current {
            ContractStatus::Signed | ContractStatus::Paying if settled => Some(ContractStatus::Completed),
            ContractStatus::Signed if payment_recorded => Some(ContractStatus::Paying),
            _ => None,
        }
    }
}

fn order_rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Partial => 1,
        OrderStatus::PartialReady => 2,
        OrderStatus::Paid => 3,
        OrderStatus::Completed => 4,
        OrderStatus::Cancelled => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(p: u32) -> Rate {
        Rate::from_percentage(p)
    }

    #[test]
    fn test_installment_tiers() {
        let projector = StatusProjector::default();
        let kind = PaymentKind::Installment;

        assert_eq!(
            projector.project_order(OrderStatus::Pending, pct(100), false, kind),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            projector.project_order(OrderStatus::PartialReady, pct(100), true, kind),
            Some(OrderStatus::Completed)
        );
        assert_eq!(
            projector.project_order(OrderStatus::Pending, pct(10), false, kind),
            Some(OrderStatus::PartialReady)
        );
        assert_eq!(
            projector.project_order(OrderStatus::Pending, Rate::from_bps(999), false, kind),
            Some(OrderStatus::Partial)
        );
        assert_eq!(projector.project_order(OrderStatus::Pending, Rate::ZERO, false, kind), None);
    }

    #[test]
    fn test_straight_payment_is_binary() {
        let projector = StatusProjector::default();
        let kind = PaymentKind::Straight;

        assert_eq!(
            projector.project_order(OrderStatus::Pending, pct(100), false, kind),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            projector.project_order(OrderStatus::Pending, pct(100), true, kind),
            Some(OrderStatus::Completed)
        );
        assert_eq!(projector.project_order(OrderStatus::Pending, pct(60), false, kind), None);
    }

    #[test]
    fn test_projection_is_idempotent_and_forward_only() {
        let projector = StatusProjector::default();
        let kind = PaymentKind::Installment;

        assert_eq!(projector.project_order(OrderStatus::PartialReady, pct(40), false, kind), None);
        assert_eq!(projector.project_order(OrderStatus::Paid, pct(40), false, kind), None);
        assert_eq!(projector.project_order(OrderStatus::Cancelled, pct(100), false, kind), None);
        assert_eq!(projector.project_order(OrderStatus::Completed, pct(100), true, kind), None);
    }

    #[test]
    fn test_contract_transitions() {
        let projector = StatusProjector::default();

        assert_eq!(
            projector.project_contract(ContractStatus::Signed, true, false),
            Some(ContractStatus::Paying)
        );
        assert_eq!(projector.project_contract(ContractStatus::Paying, true, false), None);
        assert_eq!(
            projector.project_contract(ContractStatus::Paying, true, true),
            Some(ContractStatus::Completed)
        );
        assert_eq!(
            projector.project_contract(ContractStatus::Signed, true, true),
            Some(ContractStatus::Completed)
        );
        assert_eq!(projector.project_contract(ContractStatus::Draft, true, true), None);
        assert_eq!(projector.project_contract(ContractStatus::Cancelled, true, true), None);
        assert_eq!(projector.project_contract(ContractStatus::Signed, false, false), None);
    }
}
