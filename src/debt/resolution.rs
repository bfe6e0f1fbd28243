use std::collections::HashMap;

use thiserror::Error;

use crate::entities::{AgencyContract, Contract, Quotation};
use crate::errors::EngineError;
use crate::plan::InstallmentPlan;
use crate::types::{
    AgencyContractId, ContractId, DebtParty, OrderId, PlanId, PlanOwner, QuotationId,
};

use super::{LookupFailure, SnapshotCollection};

/// where a plan's foreign-key chain stopped
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChainBreak {
    #[error("plan {plan_id}: contract {contract_id} not found")]
    MissingContract {
        plan_id: PlanId,
        contract_id: ContractId,
    },

    #[error("plan {plan_id}: agency contract {agency_contract_id} not found")]
    MissingAgencyContract {
        plan_id: PlanId,
        agency_contract_id: AgencyContractId,
    },

    #[error("plan {plan_id}: quotation {quotation_id} of contract {contract_id} not found")]
    MissingQuotation {
        plan_id: PlanId,
        contract_id: ContractId,
        quotation_id: QuotationId,
    },

    #[error("plan {plan_id}: {collection:?} lookup failed: {message}")]
    LookupFailed {
        plan_id: PlanId,
        collection: SnapshotCollection,
        message: String,
    },
}

impl ChainBreak {
    pub fn plan_id(&self) -> PlanId {
        match self {
            ChainBreak::MissingContract { plan_id, .. }
            | ChainBreak::MissingAgencyContract { plan_id, .. }
            | ChainBreak::MissingQuotation { plan_id, .. }
            | ChainBreak::LookupFailed { plan_id, .. } => *plan_id,
        }
    }
}

impl From<ChainBreak> for EngineError {
    fn from(b: ChainBreak) -> Self {
        EngineError::ChainResolution {
            message: b.to_string(),
        }
    }
}

/// outcome of following a plan to the party that owes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainResolution {
    Resolved(DebtParty),
    Unresolved(ChainBreak),
}

impl ChainResolution {
    pub fn party(&self) -> Option<DebtParty> {
        match self {
            ChainResolution::Resolved(party) => Some(*party),
            ChainResolution::Unresolved(_) => None,
        }
    }
}

/// id lookups over independently fetched collections
///
/// Duplicate rows collapse onto one entry per id. A miss in a collection
/// whose read failed is reported as `LookupFailed` rather than missing.
pub struct ChainIndex<'a> {
    contracts: HashMap<ContractId, &'a Contract>,
    agency_contracts: HashMap<AgencyContractId, &'a AgencyContract>,
    quotations: HashMap<QuotationId, &'a Quotation>,
    failures: HashMap<SnapshotCollection, &'a str>,
}

impl<'a> ChainIndex<'a> {
    pub fn new(
        contracts: &'a [Contract],
        agency_contracts: &'a [AgencyContract],
        quotations: &'a [Quotation],
    ) -> Self {
        Self {
            contracts: contracts.iter().map(|c| (c.id, c)).collect(),
            agency_contracts: agency_contracts.iter().map(|c| (c.id, c)).collect(),
            quotations: quotations.iter().map(|q| (q.id, q)).collect(),
            failures: HashMap::new(),
        }
    }

    pub fn with_failures(mut self, failures: &'a [LookupFailure]) -> Self {
        self.failures = failures
            .iter()
            .map(|f| (f.collection, f.message.as_str()))
            .collect();
        self
    }

    fn miss(&self, plan_id: PlanId, collection: SnapshotCollection, missing: ChainBreak) -> ChainResolution {
        let reason = match self.failures.get(&collection) {
            Some(message) => ChainBreak::LookupFailed {
                plan_id,
                collection,
                message: message.to_string(),
            },
            None => missing,
        };
        ChainResolution::Unresolved(reason)
    }

    /// the order a plan's contract points at, when the contract itself was found
    pub fn reached_order(&self, plan: &InstallmentPlan) -> Option<OrderId> {
        match plan.owner {
            PlanOwner::Contract(id) => self.contracts.get(&id).and_then(|c| c.order_id),
            PlanOwner::AgencyContract(id) => self.agency_contracts.get(&id).and_then(|c| c.order_id),
        }
    }

    /// plan -> contract -> quotation -> customer, or plan -> agency contract -> agency
    pub fn resolve(&self, plan: &InstallmentPlan) -> ChainResolution {
        match plan.owner {
            PlanOwner::Contract(contract_id) => {
                let Some(contract) = self.contracts.get(&contract_id) else {
                    return self.miss(
                        plan.id,
                        SnapshotCollection::Contracts,
                        ChainBreak::MissingContract {
                            plan_id: plan.id,
                            contract_id,
                        },
                    );
                };
                match self.quotations.get(&contract.quotation_id) {
                    Some(q) => ChainResolution::Resolved(DebtParty::Customer(q.customer_id)),
                    None => self.miss(
                        plan.id,
                        SnapshotCollection::Quotations,
                        ChainBreak::MissingQuotation {
                            plan_id: plan.id,
                            contract_id,
                            quotation_id: contract.quotation_id,
                        },
                    ),
                }
            }
            PlanOwner::AgencyContract(agency_contract_id) => {
                match self.agency_contracts.get(&agency_contract_id) {
                    Some(ac) => ChainResolution::Resolved(DebtParty::Agency(ac.agency_id)),
                    None => self.miss(
                        plan.id,
                        SnapshotCollection::AgencyContracts,
                        ChainBreak::MissingAgencyContract {
                            plan_id: plan.id,
                            agency_contract_id,
                        },
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::example_plan;
    use crate::types::ContractStatus;

    fn contract(id: ContractId, quotation_id: QuotationId) -> Contract {
        Contract {
            id,
            quotation_id,
            order_id: None,
            status: ContractStatus::Signed,
            version: 1,
        }
    }

    #[test]
    fn test_customer_chain() {
        let plan = example_plan();
        let contracts = vec![contract(1, 5)];
        let quotations = vec![Quotation {
            id: 5,
            customer_id: 42,
        }];
        let index = ChainIndex::new(&contracts, &[], &quotations);

        assert_eq!(index.resolve(&plan), ChainResolution::Resolved(DebtParty::Customer(42)));
    }

    #[test]
    fn test_agency_chain() {
        let mut plan = example_plan();
        plan.owner = PlanOwner::AgencyContract(3);
        let agency_contracts = vec![AgencyContract {
            id: 3,
            agency_id: 8,
            order_id: None,
            status: ContractStatus::Signed,
            version: 1,
        }];
        let index = ChainIndex::new(&[], &agency_contracts, &[]);

        assert_eq!(index.resolve(&plan).party(), Some(DebtParty::Agency(8)));
    }

    #[test]
    fn test_broken_chains_are_reported() {
        let plan = example_plan();

        let index = ChainIndex::new(&[], &[], &[]);
        assert_eq!(
            index.resolve(&plan),
            ChainResolution::Unresolved(ChainBreak::MissingContract {
                plan_id: 1,
                contract_id: 1
            })
        );

        let contracts = vec![contract(1, 5)];
        let index = ChainIndex::new(&contracts, &[], &[]);
        let resolution = index.resolve(&plan);
        assert!(matches!(
            resolution,
            ChainResolution::Unresolved(ChainBreak::MissingQuotation { quotation_id: 5, .. })
        ));

        if let ChainResolution::Unresolved(b) = resolution {
            assert_eq!(b.plan_id(), 1);
            assert!(matches!(EngineError::from(b), EngineError::ChainResolution { .. }));
        }
    }

    #[test]
    fn test_failed_read_is_reported_as_lookup_failure() {
        let mut plan = example_plan();
        let failures = vec![LookupFailure {
            collection: SnapshotCollection::Quotations,
            order_id: None,
            message: "quotation service timed out".to_string(),
        }];
        let mut linked = contract(1, 5);
        linked.order_id = Some(10);
        let contracts = vec![linked];
        let index = ChainIndex::new(&contracts, &[], &[]).with_failures(&failures);

        match index.resolve(&plan) {
            ChainResolution::Unresolved(ChainBreak::LookupFailed {
                collection, message, ..
            }) => {
                assert_eq!(collection, SnapshotCollection::Quotations);
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected resolution {:?}", other),
        }
        assert_eq!(index.reached_order(&plan), Some(10));

        // the contracts read succeeded, so a missing contract is still just missing
        plan.owner = PlanOwner::Contract(2);
        assert!(matches!(
            index.resolve(&plan),
            ChainResolution::Unresolved(ChainBreak::MissingContract { contract_id: 2, .. })
        ));
        assert_eq!(index.reached_order(&plan), None);
    }
}
