//! Commission split for completed rides

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SettlementError {
    #[error("Fare must be non-negative, got {0}")]
    NegativeFare(Decimal),

    #[error("Tip must be non-negative, got {0}")]
    NegativeTip(Decimal),

    #[error("Commission rate must be in [0, 1), got {0}")]
    InvalidRate(Decimal),
}

/// How a completed ride's money is divided
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub fare: Decimal,
    pub tip: Decimal,
    pub commission: Decimal,
    /// Credited to the driver: fare minus commission, plus the whole tip
    pub driver_earnings: Decimal,
}

impl Settlement {
    /// Split `fare` at `commission_rate`. Commission is rounded to cents and the
    /// driver gets the exact remainder, so commission + net fare == fare.
    pub fn split(
        fare: Decimal,
        tip: Decimal,
        commission_rate: Decimal,
    ) -> Result<Self, SettlementError> {
        if fare < Decimal::ZERO {
            return Err(SettlementError::NegativeFare(fare));
        }
        if tip < Decimal::ZERO {
            return Err(SettlementError::NegativeTip(tip));
        }
        if commission_rate < Decimal::ZERO || commission_rate >= Decimal::ONE {
            return Err(SettlementError::InvalidRate(commission_rate));
        }

        let commission = (fare * commission_rate).round_dp(2);
        let net_fare = fare - commission;

        Ok(Self {
            fare,
            tip,
            commission,
            driver_earnings: net_fare + tip,
        })
    }

    pub fn net_fare(&self) -> Decimal {
        self.driver_earnings - self.tip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_reference_values() {
        let s = Settlement::split(dec!(350), Decimal::ZERO, dec!(0.15)).unwrap();
        assert_eq!(s.commission, dec!(52.5));
        assert_eq!(s.driver_earnings, dec!(297.5));
        assert_eq!(s.commission + s.driver_earnings, dec!(350));
    }

    #[test]
    fn test_split_sums_to_fare_for_awkward_amounts() {
        for (fare, rate) in [
            (dec!(99.99), dec!(0.15)),
            (dec!(0.01), dec!(0.15)),
            (dec!(123.45), dec!(0.333)),
            (dec!(0), dec!(0.15)),
            (dec!(1000), dec!(0)),
        ] {
            let s = Settlement::split(fare, Decimal::ZERO, rate).unwrap();
            assert_eq!(s.commission + s.net_fare(), fare, "fare {} rate {}", fare, rate);
            assert!(s.commission >= Decimal::ZERO);
            assert!(s.net_fare() >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_tip_goes_entirely_to_driver() {
        let s = Settlement::split(dec!(350), dec!(20), dec!(0.15)).unwrap();
        assert_eq!(s.commission, dec!(52.5));
        assert_eq!(s.driver_earnings, dec!(317.5));
        assert_eq!(s.net_fare(), dec!(297.5));
    }

    #[test]
    fn test_split_rejects_invalid_input() {
        assert_eq!(
            Settlement::split(dec!(-1), Decimal::ZERO, dec!(0.15)),
            Err(SettlementError::NegativeFare(dec!(-1)))
        );
        assert_eq!(
            Settlement::split(dec!(10), dec!(-5), dec!(0.15)),
            Err(SettlementError::NegativeTip(dec!(-5)))
        );
        assert!(Settlement::split(dec!(10), Decimal::ZERO, dec!(1.0)).is_err());
    }
}
