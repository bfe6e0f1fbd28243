use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{EngineError, Result};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub schedule: ScheduleLimits,
    pub projection: ProjectionThresholds,
    pub debt: DebtThresholds,
}

/// bounds on generated or custom schedules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleLimits {
    pub max_periods: u32,
}

impl Default for ScheduleLimits {
    fn default() -> Self {
        Self { max_periods: 240 }
    }
}

/// order status tiers for installment plans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionThresholds {
    /// at or above this share the order is ready for preparation
    pub partial_ready: Rate,
    /// at or above this share the order is paid
    pub paid: Rate,
}

impl Default for ProjectionThresholds {
    fn default() -> Self {
        Self {
            partial_ready: Rate::from_decimal(dec!(0.10)),
            paid: Rate::ONE,
        }
    }
}

/// debt classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebtThresholds {
    /// below this paid share a customer is high-debt
    pub high_debt_below: Rate,
}

impl Default for DebtThresholds {
    fn default() -> Self {
        Self {
            high_debt_below: Rate::from_decimal(dec!(0.50)),
        }
    }
}

impl EngineConfig {
    /// parse and validate a json document; missing sections take defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// monthly-only dealer financing with a tighter schedule bound
    pub fn dealer() -> Self {
        Self {
            schedule: ScheduleLimits { max_periods: 120 },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.max_periods == 0 {
            return Err(EngineError::InvalidConfiguration {
                message: "max_periods must be at least 1".to_string(),
            });
        }

        let ready = self.projection.partial_ready;
        let paid = self.projection.paid;
        if ready <= Rate::ZERO || ready > paid {
            return Err(EngineError::InvalidConfiguration {
                message: format!("partial_ready threshold {} must be in (0, {}]", ready, paid),
            });
        }
        if paid > Rate::ONE {
            return Err(EngineError::InvalidConfiguration {
                message: format!("paid threshold {} exceeds 100%", paid),
            });
        }

        let high = self.debt.high_debt_below;
        if high <= Rate::ZERO || high >= Rate::ONE {
            return Err(EngineError::InvalidConfiguration {
                message: format!("high_debt_below {} must be strictly between 0% and 100%", high),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.max_periods, 240);
        assert_eq!(config.projection.partial_ready, Rate::from_percentage(10));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = EngineConfig::from_json_str(r#"{"schedule": {"max_periods": 60}}"#).unwrap();
        assert_eq!(config.schedule.max_periods, 60);
        assert_eq!(config.debt.high_debt_below.as_decimal(), dec!(0.5));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let json = r#"{"projection": {"partial_ready": "0.9", "paid": "0.5"}}"#;
        assert!(matches!(
            EngineConfig::from_json_str(json),
            Err(EngineError::InvalidConfiguration { .. })
        ));

        assert!(EngineConfig::from_json_str("not json").is_err());
    }
}
