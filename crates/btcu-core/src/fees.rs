//! Transaction fee calculation
//!
//! Fees are charged per kilobyte of estimated transaction size, never below
//! the relay minimum.

use crate::{Error, Result};
use btcu_params::{Amount, COIN};
use serde::{Deserialize, Serialize};

/// Minimum relay fee per kilobyte
pub const MIN_RELAY_FEE_PER_KB: Amount = 10_000;

/// Default wallet fee rate per kilobyte
pub const DEFAULT_PAY_TX_FEE_PER_KB: Amount = MIN_RELAY_FEE_PER_KB;

/// Default absolute fee ceiling (1 coin)
pub const DEFAULT_MAX_TX_FEE: Amount = COIN;

/// Fixed transaction overhead in bytes
const TX_OVERHEAD_BYTES: usize = 10;
/// Estimated size of a signed standard input
const INPUT_BYTES: usize = 148;
/// Estimated size of a standard output
const OUTPUT_BYTES: usize = 34;

/// Fee rate in amount per 1000 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeeRate(Amount);

impl FeeRate {
    /// Rate per kilobyte
    pub const fn per_kb(amount: Amount) -> Self {
        Self(amount)
    }

    /// Rate per kilobyte
    pub const fn as_per_kb(&self) -> Amount {
        self.0
    }

    /// Fee for `size` bytes; non-zero rates never round down to zero.
    pub fn fee_for(&self, size: usize) -> Amount {
        let fee = self.0.saturating_mul(size as Amount) / 1000;
        if fee == 0 && self.0 > 0 {
            self.0
        } else {
            fee
        }
    }
}

/// Fee calculator
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    rate: FeeRate,
    max_fee: Amount,
}

impl FeeCalculator {
    /// Create calculator with a rate and absolute ceiling
    pub fn new(rate: FeeRate, max_fee: Amount) -> Self {
        Self { rate, max_fee }
    }

    /// Estimated serialized size for a standard transaction.
    pub fn estimate_size(num_inputs: usize, num_outputs: usize) -> usize {
        TX_OVERHEAD_BYTES + num_inputs * INPUT_BYTES + num_outputs * OUTPUT_BYTES
    }

    /// Calculate fee for a transaction shape.
    ///
    /// # Arguments
    /// * `num_inputs` - Number of inputs
    /// * `num_outputs` - Number of outputs, including change
    ///
    /// # Returns
    /// Fee in the smallest unit, at least the relay minimum.
    pub fn calculate_fee(&self, num_inputs: usize, num_outputs: usize) -> Result<Amount> {
        let size = Self::estimate_size(num_inputs, num_outputs);
        let fee = self
            .rate
            .fee_for(size)
            .max(FeeRate::per_kb(MIN_RELAY_FEE_PER_KB).fee_for(size));

        self.validate_fee(fee)?;

        tracing::debug!("Fee {} for {} bytes", fee, size);

        Ok(fee)
    }

    /// Validate fee is within acceptable range
    pub fn validate_fee(&self, fee: Amount) -> Result<()> {
        if fee < 0 {
            return Err(Error::InvalidAmount(format!("Fee {} is negative", fee)));
        }

        if fee > self.max_fee {
            return Err(Error::FeeTooHigh(format!(
                "Fee {} exceeds maximum {}",
                fee, self.max_fee
            )));
        }

        Ok(())
    }

    /// Configured rate
    pub fn rate(&self) -> FeeRate {
        self.rate
    }
}

impl Default for FeeCalculator {
    fn default() -> Self {
        Self::new(FeeRate::per_kb(DEFAULT_PAY_TX_FEE_PER_KB), DEFAULT_MAX_TX_FEE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_send_fee() {
        let calculator = FeeCalculator::default();
        let fee = calculator.calculate_fee(1, 2).unwrap();

        // 10 + 148 + 68 = 226 bytes at 10_000 per kB
        assert_eq!(fee, 2_260);
    }

    #[test]
    fn test_more_inputs_cost_more() {
        let calculator = FeeCalculator::default();

        let one = calculator.calculate_fee(1, 1).unwrap();
        let three = calculator.calculate_fee(3, 1).unwrap();

        assert!(three > one);
    }

    #[test]
    fn test_rate_never_below_relay_minimum() {
        let calculator = FeeCalculator::new(FeeRate::per_kb(1), DEFAULT_MAX_TX_FEE);
        let fee = calculator.calculate_fee(1, 1).unwrap();

        assert_eq!(fee, FeeRate::per_kb(MIN_RELAY_FEE_PER_KB).fee_for(192));
    }

    #[test]
    fn test_tiny_size_rounds_up() {
        assert_eq!(FeeRate::per_kb(500).fee_for(1), 500);
        assert_eq!(FeeRate::per_kb(0).fee_for(1_000), 0);
    }

    #[test]
    fn test_fee_validation() {
        let calculator = FeeCalculator::new(FeeRate::per_kb(10_000), 50_000);

        assert!(calculator.validate_fee(50_000).is_ok());
        assert!(matches!(
            calculator.validate_fee(50_001),
            Err(Error::FeeTooHigh(_))
        ));
        assert!(calculator.validate_fee(-1).is_err());
    }

    #[test]
    fn test_ceiling_applies_to_calculation() {
        let calculator = FeeCalculator::new(FeeRate::per_kb(COIN), COIN / 10);
        assert!(matches!(
            calculator.calculate_fee(5, 2),
            Err(Error::FeeTooHigh(_))
        ));
    }
}
