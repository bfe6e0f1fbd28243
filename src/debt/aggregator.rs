use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::DebtThresholds;
use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::events::{Event, EventStore};
use crate::plan::InstallmentPlan;
use crate::types::{DebtParty, DebtStatus, OrderId};

use super::resolution::ChainResolution;
use super::{
    CustomerDebtView, DebtLine, DebtSnapshot, DebtSource, LookupFailure, UnresolvedPlan,
};

/// builds per-customer and per-agency debt views from a collection snapshot
#[derive(Debug, Clone, Default)]
pub struct DebtAggregator {
    thresholds: DebtThresholds,
}

/// ranked views for every party plus what could not be attributed to any of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtOverview {
    pub views: Vec<CustomerDebtView>,
    /// broken chains that never reached a known order
    pub unattributed: Vec<UnresolvedPlan>,
    pub lookup_failures: Vec<LookupFailure>,
    pub built_at: DateTime<Utc>,
}

/// plans keyed by id with their resolved party
struct ResolvedPlans<'a> {
    by_party: BTreeMap<DebtParty, Vec<&'a InstallmentPlan>>,
    /// broken chains whose contract still named one of the party's orders
    unresolved_by_party: BTreeMap<DebtParty, Vec<UnresolvedPlan>>,
    unattributed: Vec<UnresolvedPlan>,
}

impl DebtAggregator {
    pub fn new(thresholds: DebtThresholds) -> Self {
        Self { thresholds }
    }

    /// paid / partial / high_debt / unpaid for a paid share
    ///
    /// A party with nothing ordered owes nothing and counts as paid.
    pub fn debt_status(&self, total_order_value: Money, total_paid: Money) -> DebtStatus {
        if total_order_value.is_zero() || total_paid >= total_order_value {
            return DebtStatus::Paid;
        }
        if total_paid.is_zero() {
            return DebtStatus::Unpaid;
        }
        if Rate::ratio(total_paid, total_order_value) < self.thresholds.high_debt_below {
            DebtStatus::HighDebt
        } else {
            DebtStatus::Partial
        }
    }

    /// consolidated view of one party's debt
    pub fn build_debt_view(
        &self,
        party: DebtParty,
        snapshot: &DebtSnapshot,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<CustomerDebtView> {
        let now = time_provider.now();
        let plans = resolve_plans(snapshot, events);
        self.view_for(party, snapshot, &plans, now, events)
    }

    /// one view per customer and agency in the snapshot, ranked
    pub fn all_debt_views(
        &self,
        snapshot: &DebtSnapshot,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<DebtOverview> {
        let now = time_provider.now();
        let plans = resolve_plans(snapshot, events);

        let parties: BTreeSet<DebtParty> = snapshot
            .orders
            .iter()
            .map(|o| o.buyer.party())
            .chain(plans.by_party.keys().copied())
            .collect();

        let mut views = parties
            .into_iter()
            .map(|party| self.view_for(party, snapshot, &plans, now, events))
            .collect::<Result<Vec<_>>>()?;

        rank_debt_views(&mut views);
        Ok(DebtOverview {
            views,
            unattributed: plans.unattributed,
            lookup_failures: snapshot.lookup_failures.clone(),
            built_at: now,
        })
    }

    fn view_for(
        &self,
        party: DebtParty,
        snapshot: &DebtSnapshot,
        plans: &ResolvedPlans<'_>,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<CustomerDebtView> {
        let mut lines = Vec::new();

        // orders may be listed more than once; collapse to ids first
        let order_ids: HashSet<OrderId> = snapshot
            .orders
            .iter()
            .filter(|o| o.buyer.party() == party)
            .map(|o| o.id)
            .collect();

        let mut seen_payments = HashSet::new();
        for payment in &snapshot.payments {
            if !order_ids.contains(&payment.order_id) || !seen_payments.insert(payment.id) {
                continue;
            }
            let paid = if payment.is_completed() {
                payment.amount
            } else {
                Money::ZERO
            };
            lines.push(DebtLine {
                source: DebtSource::StraightPayment {
                    payment_id: payment.id,
                    order_id: payment.order_id,
                },
                order_value: payment.amount,
                paid,
                remaining: payment.amount - paid,
                next_due_date: None,
                overdue_amount: Money::ZERO,
            });
        }

        for plan in plans.by_party.get(&party).into_iter().flatten() {
            if let Err(e) = plan.check_invariants() {
                error!(?party, plan_id = plan.id, error = %e, "corrupted plan in debt aggregation");
                return Err(e);
            }
            lines.push(DebtLine {
                source: DebtSource::Installment {
                    plan_id: plan.id,
                    owner: plan.owner,
                },
                order_value: plan.financed_amount(),
                paid: plan.total_paid,
                remaining: plan.remaining_balance(),
                next_due_date: plan.next_due_date(),
                overdue_amount: plan.overdue_amount(now),
            });
        }

        // a negative line is corrupted upstream data; other lines must not absorb it
        if let Some(line) = lines.iter().find(|l| l.remaining.is_negative()) {
            error!(
                ?party,
                source = ?line.source,
                order_value = line.order_value.as_minor(),
                paid = line.paid.as_minor(),
                "paid exceeds ordered value"
            );
            return Err(EngineError::consistency(format!(
                "{:?}: {:?} has paid {} against an ordered value of {}",
                party, line.source, line.paid, line.order_value
            )));
        }

        let total_order_value: Money = lines.iter().map(|l| l.order_value).sum();
        let total_paid: Money = lines.iter().map(|l| l.paid).sum();
        let remaining_debt = total_order_value - total_paid;
        let overdue_amount: Money = lines.iter().map(|l| l.overdue_amount).sum();
        let next_due_date = lines.iter().filter_map(|l| l.next_due_date).min();

        events.emit(Event::DebtViewBuilt {
            party,
            remaining_debt,
            timestamp: now,
        });
        debug!(
            ?party,
            lines = lines.len(),
            remaining = remaining_debt.as_minor(),
            complete = snapshot.is_complete(),
            "built debt view"
        );

        Ok(CustomerDebtView {
            party,
            total_order_value,
            total_paid,
            remaining_debt,
            payment_percentage: Rate::ratio(total_paid, total_order_value),
            debt_status: self.debt_status(total_order_value, total_paid),
            lines,
            unresolved: plans
                .unresolved_by_party
                .get(&party)
                .cloned()
                .unwrap_or_default(),
            lookup_failures: snapshot.lookup_failures.clone(),
            next_due_date,
            overdue_amount,
            has_overdue: overdue_amount.is_positive(),
            built_at: now,
            versions: snapshot.versions,
        })
    }
}

fn resolve_plans<'a>(snapshot: &'a DebtSnapshot, events: &mut EventStore) -> ResolvedPlans<'a> {
    let index = snapshot.chain_index();
    let buyers: HashMap<OrderId, DebtParty> = snapshot
        .orders
        .iter()
        .map(|o| (o.id, o.buyer.party()))
        .collect();
    let mut seen = HashSet::new();
    let mut resolved = ResolvedPlans {
        by_party: BTreeMap::new(),
        unresolved_by_party: BTreeMap::new(),
        unattributed: Vec::new(),
    };

    for plan in &snapshot.plans {
        if !seen.insert(plan.id) {
            continue;
        }
        match index.resolve(plan) {
            ChainResolution::Resolved(party) => {
                resolved.by_party.entry(party).or_default().push(plan);
            }
            ChainResolution::Unresolved(reason) => {
                warn!(plan_id = plan.id, %reason, "plan excluded from debt aggregation");
                events.emit(Event::ChainUnresolved {
                    plan_id: plan.id,
                    reason: reason.to_string(),
                });
                let entry = UnresolvedPlan {
                    plan_id: plan.id,
                    reason,
                };
                match index.reached_order(plan).and_then(|id| buyers.get(&id)) {
                    Some(party) => resolved
                        .unresolved_by_party
                        .entry(*party)
                        .or_default()
                        .push(entry),
                    None => resolved.unattributed.push(entry),
                }
            }
        }
    }

    resolved
}

/// highest remaining debt first, then overdue, then soonest due, then party
pub fn rank_debt_views(views: &mut [CustomerDebtView]) {
    views.sort_by(|a, b| {
        b.remaining_debt
            .cmp(&a.remaining_debt)
            .then_with(|| b.has_overdue.cmp(&a.has_overdue))
            .then_with(|| match (a.next_due_date, b.next_due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.party.cmp(&b.party))
    });
}
