use chrono::{DateTime, Months, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::debug;

use crate::config::ScheduleLimits;
use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::plan::{NewItem, NewPlan, PlanDraft};
use crate::types::{AgencyContractId, ContractId, InterestMethod, PlanOwner, PlanStatus};

/// one row of a custom-entered schedule
#[derive(Debug, Clone, PartialEq)]
pub struct CustomInstallment {
    pub due_date: DateTime<Utc>,
    pub amount: Money,
}

/// builds installment periods from principal, deposit and term
#[derive(Debug, Clone, Default)]
pub struct ScheduleGenerator {
    limits: ScheduleLimits,
}

impl ScheduleGenerator {
    pub fn new(limits: ScheduleLimits) -> Self {
        Self { limits }
    }

    /// generate a schedule whose first period falls one interval after now
    pub fn generate(
        &self,
        principal: Money,
        deposit: Money,
        years: u32,
        periods_per_year: u32,
        time_provider: &SafeTimeProvider,
    ) -> Result<Vec<NewItem>> {
        self.generate_from(principal, deposit, years, periods_per_year, time_provider.now())
    }

    /// generate a schedule anchored at `generated_at`
    pub fn generate_from(
        &self,
        principal: Money,
        deposit: Money,
        years: u32,
        periods_per_year: u32,
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<NewItem>> {
        if years == 0 {
            return Err(EngineError::invalid_schedule("term must be at least one year"));
        }
        if periods_per_year == 0 || 12 % periods_per_year != 0 {
            return Err(EngineError::invalid_schedule(format!(
                "{} periods per year does not evenly divide 12 months",
                periods_per_year
            )));
        }

        let periods = years
            .checked_mul(periods_per_year)
            .filter(|n| *n <= self.limits.max_periods)
            .ok_or_else(|| {
                EngineError::invalid_schedule(format!(
                    "{} years x {} periods exceeds the {} period bound",
                    years, periods_per_year, self.limits.max_periods
                ))
            })?;

        let financed = financed_amount(principal, deposit)?;
        let interval = 12 / periods_per_year;

        // floor share for every period, remainder on the last one
        let (share, last) = financed
            .split_floor(periods)
            .ok_or_else(|| EngineError::invalid_schedule("schedule has no periods"))?;
        if !share.is_positive() {
            return Err(EngineError::invalid_schedule(format!(
                "financed amount {} cannot be spread over {} periods",
                financed, periods
            )));
        }

        let mut items = Vec::with_capacity(periods as usize);
        for n in 1..=periods {
            let due_date = generated_at
                .checked_add_months(Months::new(interval * n))
                .ok_or_else(|| {
                    EngineError::invalid_schedule(format!("due date for period {} is out of range", n))
                })?;

            items.push(NewItem {
                installment_no: n,
                due_date,
                amount_due: if n == periods { last } else { share },
            });
        }

        debug!(
            periods,
            interval_months = interval,
            financed = financed.as_minor(),
            "generated installment schedule"
        );

        Ok(items)
    }

    /// accept an explicitly entered schedule
    pub fn custom(
        &self,
        principal: Money,
        deposit: Money,
        entries: &[CustomInstallment],
    ) -> Result<Vec<NewItem>> {
        let financed = financed_amount(principal, deposit)?;

        if entries.is_empty() {
            return Err(EngineError::invalid_schedule("custom schedule has no installments"));
        }
        if entries.len() > self.limits.max_periods as usize {
            return Err(EngineError::invalid_schedule(format!(
                "custom schedule has {} installments, bound is {}",
                entries.len(),
                self.limits.max_periods
            )));
        }
        if let Some(entry) = entries.iter().find(|e| !e.amount.is_positive()) {
            return Err(EngineError::invalid_schedule(format!(
                "installment amount {} must be positive",
                entry.amount
            )));
        }
        if entries.windows(2).any(|w| w[1].due_date <= w[0].due_date) {
            return Err(EngineError::invalid_schedule(
                "custom due dates must be strictly ascending",
            ));
        }

        let total: Money = entries.iter().map(|e| e.amount).sum();
        if total != financed {
            return Err(EngineError::invalid_schedule(format!(
                "custom installments sum to {}, financed amount is {}",
                total, financed
            )));
        }

        Ok(entries
            .iter()
            .enumerate()
            .map(|(idx, e)| NewItem {
                installment_no: idx as u32 + 1,
                due_date: e.due_date,
                amount_due: e.amount,
            })
            .collect())
    }
}

fn financed_amount(principal: Money, deposit: Money) -> Result<Money> {
    if !principal.is_positive() {
        return Err(EngineError::invalid_schedule(format!(
            "principal {} must be positive",
            principal
        )));
    }
    if deposit.is_negative() || deposit > principal {
        return Err(EngineError::invalid_schedule(format!(
            "deposit {} must be within [0, {}]",
            deposit, principal
        )));
    }
    let financed = principal - deposit;
    if !financed.is_positive() {
        return Err(EngineError::invalid_schedule(
            "principal minus deposit leaves nothing to finance",
        ));
    }
    Ok(financed)
}

enum Term {
    Generated { years: u32, periods_per_year: u32 },
    Custom(Vec<CustomInstallment>),
}

/// builder for plan drafts
pub struct PlanBuilder {
    owner: Option<PlanOwner>,
    principal: Option<Money>,
    deposit: Money,
    rate: Rate,
    status: PlanStatus,
    term: Option<Term>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            owner: None,
            principal: None,
            deposit: Money::ZERO,
            rate: Rate::ZERO,
            status: PlanStatus::Pending,
            term: None,
        }
    }

    pub fn contract(mut self, contract_id: ContractId) -> Self {
        self.owner = Some(PlanOwner::Contract(contract_id));
        self
    }

    pub fn agency_contract(mut self, agency_contract_id: AgencyContractId) -> Self {
        self.owner = Some(PlanOwner::AgencyContract(agency_contract_id));
        self
    }

    pub fn owner(mut self, owner: PlanOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn principal(mut self, principal: Money) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn deposit(mut self, deposit: Money) -> Self {
        self.deposit = deposit;
        self
    }

    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = rate;
        self
    }

    pub fn status(mut self, status: PlanStatus) -> Self {
        self.status = status;
        self
    }

    pub fn term(mut self, years: u32, periods_per_year: u32) -> Self {
        self.term = Some(Term::Generated {
            years,
            periods_per_year,
        });
        self
    }

    pub fn custom_schedule(mut self, entries: Vec<CustomInstallment>) -> Self {
        self.term = Some(Term::Custom(entries));
        self
    }

    pub fn build(
        self,
        generator: &ScheduleGenerator,
        time_provider: &SafeTimeProvider,
    ) -> Result<PlanDraft> {
        let owner = self
            .owner
            .ok_or_else(|| EngineError::validation("plan owner contract is required"))?;
        let principal = self
            .principal
            .ok_or_else(|| EngineError::validation("principal amount is required"))?;
        if !matches!(self.status, PlanStatus::Pending | PlanStatus::Active) {
            return Err(EngineError::validation(format!(
                "plans are created Pending or Active, not {:?}",
                self.status
            )));
        }

        let items = match self.term {
            Some(Term::Generated {
                years,
                periods_per_year,
            }) => generator.generate(principal, self.deposit, years, periods_per_year, time_provider)?,
            Some(Term::Custom(entries)) => generator.custom(principal, self.deposit, &entries)?,
            None => return Err(EngineError::validation("plan term or custom schedule is required")),
        };

        Ok(PlanDraft {
            plan: NewPlan {
                owner,
                principal_amount: principal,
                deposit_amount: self.deposit,
                interest_rate: self.rate,
                interest_method: InterestMethod::Fixed,
                status: self.status,
            },
            items,
        })
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}
