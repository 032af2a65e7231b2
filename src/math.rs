//! Pure premium-settlement math — extracted for Kani formal verification.
//!
//! No Solana/Pubkey dependencies. Just arithmetic.
//! Kani can verify these functions exhaustively.

/// Share scale: 10^18 = 100%. Non-staker shares are parts per this unit.
pub const HUNDRED_PERCENT: u64 = 1_000_000_000_000_000_000;

/// Outcome of settling one protocol's elapsed time against its balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSettlement {
    /// Balance after the accrued debt is applied (0 on shortfall)
    pub new_balance: u64,
    /// Amount to add to the protocol's non-staker claimable pool
    pub non_stakers_delta: u64,
    /// Present when the accrued debt exceeded the balance
    pub shortfall: Option<Shortfall>,
}

/// Debt the balance could not cover, split by beneficiary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    /// Total uncovered debt
    pub amount: u64,
    /// Staker-side slice of the uncovered debt — the amount the global
    /// ledger over-accrued at the stale rate and must give back
    pub stakers: u64,
}

/// `amount * share / HUNDRED_PERCENT`, rounded down.
///
/// # Returns
/// * `Some(slice)` — always `<= amount` for `share <= HUNDRED_PERCENT`
/// * `None` — share above 100%
pub fn share_of(amount: u64, share: u64) -> Option<u64> {
    if share > HUNDRED_PERCENT {
        return None;
    }
    // u64::MAX * 10^18 fits comfortably in u128
    let slice = (amount as u128) * (share as u128) / (HUNDRED_PERCENT as u128);
    Some(slice as u64)
}

/// Split a per-second premium into (non-staker, staker) rates.
///
/// The non-staker slice is computed first (rounded down); the staker slice is
/// the exact remainder, so the two always sum to `premium` and rounding loss
/// is never doubled.
pub fn split_premium(premium: u64, non_stakers_share: u64) -> Option<(u64, u64)> {
    let non_stakers = share_of(premium, non_stakers_share)?;
    Some((non_stakers, premium - non_stakers))
}

/// Realize a rate over elapsed seconds: `rate * elapsed`.
///
/// # Returns
/// * `Some(amount)` — product fits in u64
/// * `None` — overflow (caller treats the debt as unbounded)
pub fn accrue(rate: u64, elapsed: u64) -> Option<u64> {
    let amount = (rate as u128).checked_mul(elapsed as u128)?;
    if amount > u64::MAX as u128 {
        None
    } else {
        Some(amount as u64)
    }
}

/// Apply elapsed time to a protocol's balance at its premium rate.
///
/// Solvent path (`debt <= balance`): debt leaves the balance; the non-staker
/// slice of the debt accrues to the protocol's non-staker pool; the staker
/// slice is already carried by the global ledger's incremental rate.
///
/// Shortfall path (`debt > balance`): the whole balance is consumed and split
/// with the current share fraction; the uncovered remainder is reported so
/// the caller can claw the staker slice back out of the global stored pool
/// and log the deficit. Never negative, never a panic.
///
/// # Returns
/// * `None` — share above 100% (records are validated on write, so this
///   indicates corruption, not a user error)
pub fn settle_protocol(
    balance: u64,
    premium: u64,
    non_stakers_share: u64,
    elapsed: u64,
) -> Option<ProtocolSettlement> {
    // Overflowing debt can only mean an astronomically long neglect; the
    // balance is certainly consumed, treat as a full shortfall.
    let debt = accrue(premium, elapsed).unwrap_or(u64::MAX);

    if debt <= balance {
        Some(ProtocolSettlement {
            new_balance: balance - debt,
            non_stakers_delta: share_of(debt, non_stakers_share)?,
            shortfall: None,
        })
    } else {
        let amount = debt - balance;
        let stakers = amount - share_of(amount, non_stakers_share)?;
        Some(ProtocolSettlement {
            new_balance: 0,
            non_stakers_delta: share_of(balance, non_stakers_share)?,
            shortfall: Some(Shortfall { amount, stakers }),
        })
    }
}

/// Deduct the staker-side shortfall from the stored claimable pool.
///
/// # Returns
/// (new_stored, insufficient): the clamped pool and the part of the error
/// that had already been paid out and cannot be recovered on-ledger.
pub fn absorb_staker_shortfall(stored: u64, stakers_error: u64) -> (u64, u64) {
    if stakers_error > stored {
        (0, stakers_error - stored)
    } else {
        (stored - stakers_error, 0)
    }
}

/// Runway in seconds at the current rate. Zero premium reads as zero runway.
pub fn seconds_of_coverage_left(balance: u64, premium: u64) -> u64 {
    if premium == 0 {
        0
    } else {
        balance / premium
    }
}

/// Arb payout for a coverage-runway force removal.
///
/// `remaining * (min_seconds - seconds_left) / min_seconds` — proportional to
/// how far the runway has sunk below the threshold. Zero right at the
/// threshold, the full remaining balance once the runway is gone.
///
/// # Returns
/// * `Some(payout)` — always `<= remaining`
/// * `None` — threshold unset or runway not below it (no removal right)
pub fn coverage_deficit_payout(
    remaining: u64,
    seconds_left: u64,
    min_seconds: u64,
) -> Option<u64> {
    if min_seconds == 0 || seconds_left >= min_seconds {
        return None;
    }
    let deficit = min_seconds - seconds_left;
    let payout = (remaining as u128) * (deficit as u128) / (min_seconds as u128);
    Some(payout as u64)
}

/// Incremental global-rate maintenance: `total - old_rate + new_rate`.
///
/// # Returns
/// * `None` — accounting corruption (removing a rate that was never added)
///   or overflow
pub fn apply_rate_delta(total: u64, old_rate: u64, new_rate: u64) -> Option<u64> {
    total.checked_sub(old_rate)?.checked_add(new_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_PERCENT: u64 = HUNDRED_PERCENT / 10;

    // ── Premium Split ──

    #[test]
    fn test_split_ten_percent() {
        assert_eq!(split_premium(10, TEN_PERCENT), Some((1, 9)));
    }

    #[test]
    fn test_split_zero_share_all_stakers() {
        assert_eq!(split_premium(10, 0), Some((0, 10)));
    }

    #[test]
    fn test_split_full_share_all_non_stakers() {
        assert_eq!(split_premium(10, HUNDRED_PERCENT), Some((10, 0)));
    }

    #[test]
    fn test_split_share_above_hundred_percent() {
        assert_eq!(split_premium(10, HUNDRED_PERCENT + 1), None);
    }

    #[test]
    fn test_split_sums_to_premium_with_rounding() {
        // 1/3 of 10 rounds down to 3; stakers take the exact remainder 7.
        let third = HUNDRED_PERCENT / 3;
        let (ns, st) = split_premium(10, third).unwrap();
        assert_eq!(ns, 3);
        assert_eq!(st, 7);
        assert_eq!(ns + st, 10);
    }

    #[test]
    fn test_split_large_premium_no_overflow() {
        let (ns, st) = split_premium(u64::MAX, TEN_PERCENT).unwrap();
        assert_eq!(ns, u64::MAX / 10);
        assert_eq!(ns + st, u64::MAX);
    }

    // ── Accrual ──

    #[test]
    fn test_accrue_simple() {
        assert_eq!(accrue(10, 10), Some(100));
    }

    #[test]
    fn test_accrue_zero_rate() {
        assert_eq!(accrue(0, u64::MAX), Some(0));
    }

    #[test]
    fn test_accrue_zero_elapsed() {
        assert_eq!(accrue(u64::MAX, 0), Some(0));
    }

    #[test]
    fn test_accrue_overflow() {
        assert_eq!(accrue(u64::MAX, 2), None);
    }

    #[test]
    fn test_accrue_exact_max() {
        assert_eq!(accrue(u64::MAX, 1), Some(u64::MAX));
    }

    // ── Solvent Settlement ──

    #[test]
    fn test_settle_solvent() {
        // deposit 10^17, premium 10/s, 10% to non-stakers, 10 seconds
        let s = settle_protocol(100_000_000_000_000_000, 10, TEN_PERCENT, 10).unwrap();
        assert_eq!(s.new_balance, 100_000_000_000_000_000 - 100);
        assert_eq!(s.non_stakers_delta, 10);
        assert_eq!(s.shortfall, None);
    }

    #[test]
    fn test_settle_zero_elapsed_is_noop() {
        let s = settle_protocol(1_000, 10, TEN_PERCENT, 0).unwrap();
        assert_eq!(s.new_balance, 1_000);
        assert_eq!(s.non_stakers_delta, 0);
        assert_eq!(s.shortfall, None);
    }

    #[test]
    fn test_settle_zero_premium_is_noop() {
        let s = settle_protocol(1_000, 0, TEN_PERCENT, u64::MAX).unwrap();
        assert_eq!(s.new_balance, 1_000);
        assert_eq!(s.non_stakers_delta, 0);
        assert_eq!(s.shortfall, None);
    }

    #[test]
    fn test_settle_exact_drain() {
        // Debt lands exactly on the balance: solvent, balance 0, no error.
        let s = settle_protocol(100, 10, TEN_PERCENT, 10).unwrap();
        assert_eq!(s.new_balance, 0);
        assert_eq!(s.non_stakers_delta, 10);
        assert_eq!(s.shortfall, None);
    }

    // ── Shortfall Settlement ──

    #[test]
    fn test_settle_shortfall_splits_consumed_balance() {
        // balance 50, debt 100 → whole balance consumed, 10% to non-stakers
        let s = settle_protocol(50, 10, TEN_PERCENT, 10).unwrap();
        assert_eq!(s.new_balance, 0);
        assert_eq!(s.non_stakers_delta, 5);
        let short = s.shortfall.unwrap();
        assert_eq!(short.amount, 50);
        assert_eq!(short.stakers, 45);
    }

    #[test]
    fn test_settle_shortfall_zero_balance() {
        // Nothing left to consume: the whole debt is error.
        let s = settle_protocol(0, 10, TEN_PERCENT, 7).unwrap();
        assert_eq!(s.new_balance, 0);
        assert_eq!(s.non_stakers_delta, 0);
        let short = s.shortfall.unwrap();
        assert_eq!(short.amount, 70);
        assert_eq!(short.stakers, 63);
    }

    #[test]
    fn test_settle_shortfall_staker_slice_is_remainder() {
        // shortfall 7 at 1/3 share: non-staker slice floors to 2, stakers
        // take 5 — the split never loses a unit to double rounding.
        let third = HUNDRED_PERCENT / 3;
        let s = settle_protocol(0, 7, third, 1).unwrap();
        let short = s.shortfall.unwrap();
        assert_eq!(short.amount, 7);
        assert_eq!(short.stakers, 5);
    }

    #[test]
    fn test_settle_overflowing_debt_consumes_all() {
        let s = settle_protocol(1_000, u64::MAX, TEN_PERCENT, u64::MAX).unwrap();
        assert_eq!(s.new_balance, 0);
        assert_eq!(s.non_stakers_delta, 100);
        assert!(s.shortfall.is_some());
    }

    #[test]
    fn test_settle_corrupt_share_rejected() {
        assert_eq!(settle_protocol(100, 10, HUNDRED_PERCENT + 1, 1), None);
    }

    // ── Shortfall Absorption ──

    #[test]
    fn test_absorb_pool_covers_error() {
        assert_eq!(absorb_staker_shortfall(100, 45), (55, 0));
    }

    #[test]
    fn test_absorb_pool_exhausted() {
        assert_eq!(absorb_staker_shortfall(30, 45), (0, 15));
    }

    #[test]
    fn test_absorb_exact() {
        assert_eq!(absorb_staker_shortfall(45, 45), (0, 0));
    }

    #[test]
    fn test_absorb_zero_error() {
        assert_eq!(absorb_staker_shortfall(100, 0), (100, 0));
    }

    // ── Coverage Runway ──

    #[test]
    fn test_seconds_left() {
        assert_eq!(seconds_of_coverage_left(1_000, 10), 100);
    }

    #[test]
    fn test_seconds_left_rounds_down() {
        assert_eq!(seconds_of_coverage_left(109, 10), 10);
    }

    #[test]
    fn test_seconds_left_zero_premium() {
        assert_eq!(seconds_of_coverage_left(1_000, 0), 0);
    }

    #[test]
    fn test_seconds_left_zero_balance() {
        assert_eq!(seconds_of_coverage_left(0, 10), 0);
    }

    // ── Coverage-Deficit Arb Payout ──

    #[test]
    fn test_payout_none_at_threshold() {
        assert_eq!(coverage_deficit_payout(1_000, 100, 100), None);
    }

    #[test]
    fn test_payout_none_above_threshold() {
        assert_eq!(coverage_deficit_payout(1_000, 150, 100), None);
    }

    #[test]
    fn test_payout_none_threshold_unset() {
        assert_eq!(coverage_deficit_payout(1_000, 0, 0), None);
    }

    #[test]
    fn test_payout_zero_just_below_threshold() {
        // 1 deficit second out of a huge runway rounds to nothing.
        assert_eq!(coverage_deficit_payout(10, 99_999, 100_000), Some(0));
    }

    #[test]
    fn test_payout_half_runway_gone() {
        // Half the runway burned → half the remaining balance to the arb.
        assert_eq!(coverage_deficit_payout(1_000, 50, 100), Some(500));
    }

    #[test]
    fn test_payout_full_neglect() {
        assert_eq!(coverage_deficit_payout(1_000, 0, 100), Some(1_000));
    }

    #[test]
    fn test_payout_never_exceeds_remaining() {
        let payout = coverage_deficit_payout(u64::MAX, 1, u64::MAX).unwrap();
        assert!(payout <= u64::MAX);
        assert_eq!(coverage_deficit_payout(777, 0, u64::MAX), Some(777));
    }

    // ── Global Rate Maintenance ──

    #[test]
    fn test_rate_delta_swap() {
        assert_eq!(apply_rate_delta(100, 40, 60), Some(120));
    }

    #[test]
    fn test_rate_delta_to_zero() {
        assert_eq!(apply_rate_delta(40, 40, 0), Some(0));
    }

    #[test]
    fn test_rate_delta_underflow_detected() {
        assert_eq!(apply_rate_delta(30, 40, 0), None);
    }

    #[test]
    fn test_rate_delta_overflow_detected() {
        assert_eq!(apply_rate_delta(u64::MAX, 0, 1), None);
    }

    // ── Share Slices ──

    #[test]
    fn test_share_of_rounds_down() {
        // 15 * 10% = 1.5 → 1
        assert_eq!(share_of(15, TEN_PERCENT), Some(1));
    }

    #[test]
    fn test_share_of_full() {
        assert_eq!(share_of(15, HUNDRED_PERCENT), Some(15));
    }

    #[test]
    fn test_share_of_max_amount() {
        assert_eq!(share_of(u64::MAX, HUNDRED_PERCENT), Some(u64::MAX));
    }
}
