use super::Cents;

/// Platform commission retained on every peer-to-peer transfer, in basis
/// points of the gross amount (1000 bps = 10%).
pub const COMMISSION_RATE_BPS: i64 = 1_000;

/// Commission on a gross transfer amount, rounded half-up to the cent.
pub fn commission_for(gross_cents: Cents) -> Cents {
    (gross_cents * COMMISSION_RATE_BPS + 5_000) / 10_000
}

/// Amount credited to the recipient after the platform commission.
pub fn net_after_commission(gross_cents: Cents) -> Cents {
    gross_cents - commission_for(gross_cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_is_ten_percent() {
        assert_eq!(commission_for(2000), 200);
        assert_eq!(commission_for(10_000), 1000);
        assert_eq!(net_after_commission(2000), 1800);
    }

    #[test]
    fn test_commission_rounds_half_up() {
        // 1.5 cents rounds up, 1.4 cents rounds down
        assert_eq!(commission_for(15), 2);
        assert_eq!(commission_for(14), 1);
        assert_eq!(commission_for(5), 1);
        assert_eq!(commission_for(4), 0);
        assert_eq!(commission_for(1), 0);
    }

    #[test]
    fn test_split_always_sums_to_gross() {
        for gross in [1, 4, 5, 15, 99, 100, 101, 2000, 123_456_789] {
            assert_eq!(commission_for(gross) + net_after_commission(gross), gross);
        }
    }
}
