//! Kani formal verification for aegis-premiums settlement math.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! KEY DESIGN DECISION: Functions use u32 inputs / u64 intermediates.
//! The production code uses u64/u128, but the arithmetic properties
//! (conservation, clamping, bounds) are scale-invariant. u32 keeps SAT
//! formulas tractable for CBMC (<60s per proof).
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_split_conserves

/// Share scale mirror: 10^9 = 100% (production uses 10^18; the ratio
/// arithmetic is identical, just narrower).
pub const HUNDRED_PERCENT: u32 = 1_000_000_000;

/// `amount * share / HUNDRED_PERCENT`, rounded down.
pub fn share_of(amount: u32, share: u32) -> Option<u32> {
    if share > HUNDRED_PERCENT {
        return None;
    }
    let slice = (amount as u64) * (share as u64) / (HUNDRED_PERCENT as u64);
    Some(slice as u32)
}

/// (non-staker, staker) split: non-staker floors, staker takes the remainder.
pub fn split_premium(premium: u32, share: u32) -> Option<(u32, u32)> {
    let ns = share_of(premium, share)?;
    Some((ns, premium - ns))
}

/// rate * elapsed, None above u32::MAX.
pub fn accrue(rate: u32, elapsed: u32) -> Option<u32> {
    let amount = rate as u64 * elapsed as u64;
    if amount > u32::MAX as u64 {
        None
    } else {
        Some(amount as u32)
    }
}

/// (new_balance, non_stakers_delta, shortfall_total, shortfall_stakers).
/// Mirrors the production settle: consume covered debt, clamp at zero,
/// split the uncovered remainder with the current share.
pub fn settle(
    balance: u32,
    premium: u32,
    share: u32,
    elapsed: u32,
) -> Option<(u32, u32, u32, u32)> {
    let debt = accrue(premium, elapsed).unwrap_or(u32::MAX);
    if debt <= balance {
        Some((balance - debt, share_of(debt, share)?, 0, 0))
    } else {
        let short = debt - balance;
        let stakers = short - share_of(short, share)?;
        Some((0, share_of(balance, share)?, short, stakers))
    }
}

/// (new_stored, insufficient): clamp the pool at zero, report the rest.
pub fn absorb(stored: u32, error: u32) -> (u32, u32) {
    if error > stored {
        (0, error - stored)
    } else {
        (stored - error, 0)
    }
}

/// remaining * deficit / min_seconds, the removal incentive ratio.
pub fn deficit_payout(remaining: u32, seconds_left: u32, min_seconds: u32) -> Option<u32> {
    if min_seconds == 0 || seconds_left >= min_seconds {
        return None;
    }
    let deficit = min_seconds - seconds_left;
    let payout = remaining as u64 * deficit as u64 / min_seconds as u64;
    Some(payout as u32)
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    // ── 1. Split conservation ──

    /// Non-staker + staker always equals the premium exactly.
    #[kani::proof]
    fn proof_split_conserves() {
        let premium: u32 = kani::any();
        let share: u32 = kani::any();
        kani::assume(share <= HUNDRED_PERCENT);

        let (ns, st) = split_premium(premium, share).unwrap();
        assert_eq!(ns as u64 + st as u64, premium as u64);
    }

    /// The non-staker slice never exceeds the amount it is a share of.
    #[kani::proof]
    fn proof_share_bounded() {
        let amount: u32 = kani::any();
        let share: u32 = kani::any();
        kani::assume(share <= HUNDRED_PERCENT);

        assert!(share_of(amount, share).unwrap() <= amount);
    }

    // ── 2. Settlement safety ──

    /// The settled balance never underflows and never grows.
    #[kani::proof]
    fn proof_settle_balance_never_negative() {
        let balance: u32 = kani::any();
        let premium: u32 = kani::any();
        let share: u32 = kani::any();
        let elapsed: u32 = kani::any();
        kani::assume(share <= HUNDRED_PERCENT);

        let (new_balance, _, _, _) = settle(balance, premium, share, elapsed).unwrap();
        assert!(new_balance <= balance);
    }

    /// Every beneficiary slice comes out of the consumed balance only.
    #[kani::proof]
    fn proof_settle_slices_bounded_by_consumed() {
        let balance: u32 = kani::any();
        let premium: u32 = kani::any();
        let share: u32 = kani::any();
        let elapsed: u32 = kani::any();
        kani::assume(share <= HUNDRED_PERCENT);

        let (new_balance, ns, _, _) = settle(balance, premium, share, elapsed).unwrap();
        let consumed = balance - new_balance;
        assert!(ns <= consumed);
    }

    /// A shortfall splits without losing a unit: stakers + non-staker slice
    /// of the error reassemble it exactly.
    #[kani::proof]
    fn proof_shortfall_split_conserves() {
        let balance: u32 = kani::any();
        let premium: u32 = kani::any();
        let share: u32 = kani::any();
        let elapsed: u32 = kani::any();
        kani::assume(share <= HUNDRED_PERCENT);

        let (_, _, short, stakers) = settle(balance, premium, share, elapsed).unwrap();
        let ns_err = share_of(short, share).unwrap();
        assert_eq!(ns_err as u64 + stakers as u64, short as u64);
    }

    // ── 3. Absorption ──

    /// absorbed + insufficient == error; the pool is clamped, never wrapped.
    #[kani::proof]
    fn proof_absorb_accounts_exactly() {
        let stored: u32 = kani::any();
        let error: u32 = kani::any();

        let (new_stored, insufficient) = absorb(stored, error);
        assert!(new_stored <= stored);
        assert_eq!((stored - new_stored) as u64 + insufficient as u64, error as u64);
    }

    // ── 4. Payout bounds ──

    /// The incentive never exceeds the remaining balance.
    #[kani::proof]
    fn proof_payout_bounded() {
        let remaining: u32 = kani::any();
        let seconds_left: u32 = kani::any();
        let min_seconds: u32 = kani::any();
        kani::assume(min_seconds > 0);
        kani::assume(seconds_left < min_seconds);

        let payout = deficit_payout(remaining, seconds_left, min_seconds).unwrap();
        assert!(payout <= remaining);
    }

    /// At the threshold there is no payout at all (no removal right).
    #[kani::proof]
    fn proof_payout_none_at_or_above_threshold() {
        let remaining: u32 = kani::any();
        let seconds_left: u32 = kani::any();
        let min_seconds: u32 = kani::any();
        kani::assume(seconds_left >= min_seconds);

        assert!(deficit_payout(remaining, seconds_left, min_seconds).is_none());
    }
}
