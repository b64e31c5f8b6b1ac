//! Integer micro-USDC arithmetic.
//!
//! All monetary amounts in the simulator are integer micro-USDC
//! (1 USDC = 10^6). Floating point never touches a balance.

/// A monetary amount in micro-USDC
pub type Micro = i64;

/// One whole USDC in micro units
pub const USDC: Micro = 1_000_000;

/// Minimum platform fee charged at settlement ($0.05)
pub const FEE_FLOOR: Micro = 50_000;

/// Platform fee for a settled amount: 1% with a $0.05 floor.
///
/// The fee is implicit; it is deducted from the provider's credit and not
/// credited to any modelled agent.
pub fn platform_fee(amount: Micro) -> Micro {
    (amount / 100).max(FEE_FLOOR)
}

/// Net amount credited to the provider when `amount` settles.
pub fn settle_credit(amount: Micro) -> Micro {
    amount - platform_fee(amount)
}

/// Display formatting: `$` followed by the amount in USDC with two
/// decimal places, rounding half-up on the hundredth.
pub fn format_usd(micro: Micro) -> String {
    let negative = micro < 0;
    let abs = micro.unsigned_abs();
    let hundredths = (abs + 5_000) / 10_000;
    let sign = if negative { "-" } else { "" };
    format!("{}${}.{:02}", sign, hundredths / 100, hundredths % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_is_one_percent_above_floor() {
        assert_eq!(platform_fee(10 * USDC), 100_000);
        assert_eq!(platform_fee(100 * USDC), USDC);
    }

    #[test]
    fn test_fee_floor_applies_to_small_amounts() {
        assert_eq!(platform_fee(USDC), FEE_FLOOR);
        assert_eq!(platform_fee(1), FEE_FLOOR);
    }

    #[test]
    fn test_settle_credit() {
        // 10 USDC settles as 9.90 to the provider
        assert_eq!(settle_credit(10 * USDC), 9_900_000);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(10 * USDC), "$10.00");
        assert_eq!(format_usd(9_900_000), "$9.90");
        assert_eq!(format_usd(40_000), "$0.04");
        assert_eq!(format_usd(45_000), "$0.05");
        assert_eq!(format_usd(0), "$0.00");
    }
}
