use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Rate, RATE_PRECISION};
use crate::errors::{LedgerError, Result};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schedule: ScheduleConfig,
    pub collateral: CollateralConfig,
    pub commission: CommissionConfig,
    /// actor name used when no authenticated user is present
    pub system_actor: String,
}

/// repayment schedule shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// installments generated per tenor unit (4 weekly installments a month)
    pub installments_per_tenor_unit: u32,
    /// days between consecutive installment maturities
    pub installment_period_days: u32,
    /// longest schedule a single loan may generate
    pub max_installments: u32,
    /// fractional digits kept on rate fractions before the final rounding
    pub rate_precision: u32,
}

/// collateral requirement at application time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollateralConfig {
    /// share of the requested amount that must sit in collateral deposit
    pub required_ratio: Rate,
}

/// adashe commission accrual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    /// the setup rate is quoted per this many days
    pub rate_period_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            installments_per_tenor_unit: 4,
            installment_period_days: 7,
            max_installments: 520,
            rate_precision: RATE_PRECISION,
        }
    }
}

impl Default for CollateralConfig {
    fn default() -> Self {
        Self {
            required_ratio: Rate::from_decimal(dec!(0.1)),
        }
    }
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self { rate_period_days: 30 }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            collateral: CollateralConfig::default(),
            commission: CommissionConfig::default(),
            system_actor: "SYSTEM".to_string(),
        }
    }
}

impl EngineConfig {
    /// parse and validate configuration from json; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json).map_err(|e| LedgerError::InvalidConfiguration {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.installments_per_tenor_unit == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "installments per tenor unit must be positive".to_string(),
            });
        }
        if self.schedule.installment_period_days == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "installment period must be at least one day".to_string(),
            });
        }
        if self.schedule.max_installments == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "max installments must be positive".to_string(),
            });
        }
        if self.schedule.rate_precision < RATE_PRECISION {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("rate precision must be at least {RATE_PRECISION} digits"),
            });
        }
        if self.collateral.required_ratio.is_negative() {
            return Err(LedgerError::InvalidConfiguration {
                message: "collateral ratio cannot be negative".to_string(),
            });
        }
        if self.commission.rate_period_days == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "commission rate period must be positive".to_string(),
            });
        }
        if self.system_actor.trim().is_empty() {
            return Err(LedgerError::InvalidConfiguration {
                message: "system actor name cannot be blank".to_string(),
            });
        }
        Ok(())
    }
}
