use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use transix_core::{CoreResult, Money};

/// Fare configuration. The service fee is a flat surcharge applied once per
/// booking regardless of seat count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareConfig {
    pub service_fee: Money,
    pub currency: String,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            service_fee: Money::from_decimal(Decimal::new(200, 2)).unwrap_or_default(),
            currency: "USD".to_string(),
        }
    }
}

/// Quoted fare breakdown for a booking.
#[derive(Debug, Clone, Serialize)]
pub struct Fare {
    pub subtotal: Money,
    pub service_fee: Money,
    pub total: Money,
}

/// Computes booking totals in exact decimals.
#[derive(Clone)]
pub struct FareCalculator {
    config: FareConfig,
}

impl FareCalculator {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    /// total = unit_price * seat_count + service_fee
    pub fn quote(&self, unit_price: Money, seat_count: u32) -> CoreResult<Fare> {
        let subtotal = unit_price.checked_mul(seat_count)?;
        let total = subtotal.checked_add(self.config.service_fee)?;

        Ok(Fare {
            subtotal,
            service_fee: self.config.service_fee,
            total,
        })
    }
}

impl Default for FareCalculator {
    fn default() -> Self {
        Self::new(FareConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_two_seats() {
        let calculator = FareCalculator::default();
        let fare = calculator
            .quote(Money::parse("45.00").unwrap(), 2)
            .unwrap();

        assert_eq!(fare.subtotal.amount(), dec!(90.00));
        assert_eq!(fare.service_fee.amount(), dec!(2.00));
        assert_eq!(fare.total.amount(), dec!(92.00));
    }

    #[test]
    fn test_fee_applied_once_regardless_of_seat_count() {
        let calculator = FareCalculator::default();
        let one = calculator.quote(Money::parse("10.00").unwrap(), 1).unwrap();
        let four = calculator.quote(Money::parse("10.00").unwrap(), 4).unwrap();

        assert_eq!(one.total.amount(), dec!(12.00));
        assert_eq!(four.total.amount(), dec!(42.00));
    }

    #[test]
    fn test_quote_keeps_two_digit_scale() {
        let calculator = FareCalculator::default();
        let fare = calculator.quote(Money::parse("33.5").unwrap(), 3).unwrap();
        assert_eq!(fare.total.to_string(), "102.50");
    }
}
