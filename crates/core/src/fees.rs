use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub quote: Decimal,
    pub fee_percent: Decimal,
    pub fee: Decimal,
    pub net: Decimal,
}

/// Platform fee taken from a worker's quote. Display only; never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeSchedule {
    percent: Decimal,
}

impl FeeSchedule {
    pub fn new(percent: Decimal) -> Result<Self, DomainError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::InvalidAmount { field: "platform_fee_percent", value: percent });
        }
        Ok(Self { percent })
    }

    pub fn percent(&self) -> Decimal {
        self.percent
    }

    pub fn breakdown(&self, quote: Decimal) -> Result<FeeBreakdown, DomainError> {
        if quote <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount { field: "quoted_amount", value: quote });
        }
        // Scale down first so amounts near Decimal::MAX still fit.
        let net = quote
            .checked_div(Decimal::ONE_HUNDRED)
            .and_then(|hundredth| hundredth.checked_mul(Decimal::ONE_HUNDRED - self.percent))
            .ok_or(DomainError::InvalidAmount { field: "quoted_amount", value: quote })?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let fee = quote.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) - net;

        Ok(FeeBreakdown { quote, fee_percent: self.percent, fee, net })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::FeeSchedule;

    #[test]
    fn thirty_percent_fee_leaves_seventy_percent_net() {
        let schedule = FeeSchedule::new(Decimal::new(30, 0)).expect("valid percent");
        let breakdown = schedule.breakdown(Decimal::new(80, 0)).expect("positive quote");

        assert_eq!(breakdown.net, Decimal::new(5600, 2));
        assert_eq!(breakdown.fee, Decimal::new(2400, 2));
    }

    #[test]
    fn net_is_rounded_to_cents() {
        let schedule = FeeSchedule::new(Decimal::new(5, 0)).expect("valid percent");
        let breakdown = schedule.breakdown(Decimal::new(3333, 2)).expect("positive quote");

        assert_eq!(breakdown.net, Decimal::new(3166, 2));
        assert_eq!(breakdown.fee + breakdown.net, Decimal::new(3333, 2));
    }

    #[test]
    fn very_large_quotes_do_not_overflow() {
        let schedule = FeeSchedule::new(Decimal::new(30, 0)).expect("valid percent");
        let quote = Decimal::MAX / Decimal::TEN;
        let breakdown = schedule.breakdown(quote).expect("large quote");

        assert!(breakdown.net < quote);
        assert_eq!(breakdown.fee + breakdown.net, quote);

        let largest = schedule.breakdown(Decimal::MAX).expect("max quote");
        assert!(largest.fee > Decimal::ZERO);
    }

    #[test]
    fn out_of_range_percent_is_rejected() {
        assert!(FeeSchedule::new(Decimal::new(101, 0)).is_err());
        assert!(FeeSchedule::new(Decimal::new(-1, 0)).is_err());
    }
}
