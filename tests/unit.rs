//! Unit tests for aegis-premiums settled views, state, and codec glue.

use bytemuck::Zeroable;
use aegis_premiums::math::HUNDRED_PERCENT;
use aegis_premiums::state::{
    PremiumsManager, ProtocolAccount, PROTOCOL_ACTIVE, PROTOCOL_EMPTY, PROTOCOL_REMOVED,
};
use solana_program::pubkey::Pubkey;

const TEN_PERCENT: u64 = HUNDRED_PERCENT / 10;

// ═══════════════════════════════════════════════════════════════
// Helpers: records settled as of t=1000
// ═══════════════════════════════════════════════════════════════

fn new_manager() -> PremiumsManager {
    let mut manager = PremiumsManager::zeroed();
    manager.is_initialized = 1;
    manager.bump = 255;
    manager.vault_authority_bump = 254;
    manager.last_accounted = 1_000;
    manager
}

fn new_record(balance: u64, premium: u64, share: u64) -> ProtocolAccount {
    let mut record = ProtocolAccount::zeroed();
    record.status = PROTOCOL_ACTIVE;
    record.protocol_id = [7u8; 32];
    record.agent = [2u8; 32];
    record.balance = balance;
    record.premium_per_second = premium;
    record.non_stakers_share = share;
    record.last_accounted = 1_000;
    record
}

// ═══════════════════════════════════════════════════════════════
// Global ledger views
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_claimable_premiums_accrues_with_time() {
    let mut manager = new_manager();
    manager.total_premium_per_second = 9;
    manager.claimable_premiums_stored = 100;

    assert_eq!(manager.claimable_premiums(1_000), Some(100));
    assert_eq!(manager.claimable_premiums(1_010), Some(190));
}

#[test]
fn test_claimable_premiums_is_idempotent() {
    let mut manager = new_manager();
    manager.total_premium_per_second = 9;

    // Same instant, same answer — the view never mutates
    assert_eq!(manager.claimable_premiums(1_500), manager.claimable_premiums(1_500));
}

#[test]
fn test_claimable_premiums_strictly_monotonic_under_load() {
    let mut manager = new_manager();
    manager.total_premium_per_second = 1;

    let a = manager.claimable_premiums(2_000).unwrap();
    let b = manager.claimable_premiums(2_001).unwrap();
    assert!(b > a);
}

#[test]
fn test_claimable_premiums_flat_at_zero_rate() {
    let manager = new_manager();
    assert_eq!(manager.claimable_premiums(u64::MAX), Some(0));
}

#[test]
fn test_claimable_premiums_overflow_is_detected() {
    let mut manager = new_manager();
    manager.total_premium_per_second = u64::MAX;
    manager.last_accounted = 0;
    assert_eq!(manager.claimable_premiums(2), None);
}

// ═══════════════════════════════════════════════════════════════
// Protocol record views
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_settled_balance_drains_per_second() {
    let record = new_record(1_000, 10, TEN_PERCENT);
    assert_eq!(record.settled_balance(1_000), 1_000);
    assert_eq!(record.settled_balance(1_001), 990);
    assert_eq!(record.settled_balance(1_100), 0);
}

#[test]
fn test_settled_balance_clamps_at_zero() {
    let record = new_record(1_000, 10, TEN_PERCENT);
    // Debt has long exceeded the balance
    assert_eq!(record.settled_balance(999_999), 0);
}

#[test]
fn test_settled_balance_untouched_at_zero_premium() {
    let record = new_record(1_000, 0, TEN_PERCENT);
    assert_eq!(record.settled_balance(u64::MAX), 1_000);
}

#[test]
fn test_settled_non_stakers_claimable_accrues() {
    let record = new_record(1_000, 10, TEN_PERCENT);
    // 10 seconds: debt 100, 10% of it to non-stakers
    assert_eq!(record.settled_non_stakers_claimable(1_010), Some(10));
}

#[test]
fn test_settled_non_stakers_claimable_caps_at_balance() {
    let record = new_record(50, 10, TEN_PERCENT);
    // Debt 100 > balance 50: only the covered half accrues
    assert_eq!(record.settled_non_stakers_claimable(1_010), Some(5));
}

#[test]
fn test_seconds_of_coverage_left_counts_down() {
    let record = new_record(1_000, 10, TEN_PERCENT);
    assert_eq!(record.seconds_of_coverage_left(1_000), 100);
    assert_eq!(record.seconds_of_coverage_left(1_040), 60);
    assert_eq!(record.seconds_of_coverage_left(1_100), 0);
    assert_eq!(record.seconds_of_coverage_left(9_999), 0);
}

#[test]
fn test_seconds_of_coverage_left_zero_premium_reads_zero() {
    let record = new_record(1_000, 0, 0);
    assert_eq!(record.seconds_of_coverage_left(1_000), 0);
}

#[test]
fn test_staker_rate_is_premium_remainder() {
    let record = new_record(0, 10, TEN_PERCENT);
    assert_eq!(record.staker_rate(), Some(9));
}

#[test]
fn test_coverage_amounts_rolling_pair() {
    let mut record = new_record(0, 0, 0);
    record.current_coverage = 1_500;
    record.previous_coverage = 500;
    assert_eq!(record.coverage_amounts(), (1_500, 500));
}

// ═══════════════════════════════════════════════════════════════
// Agent resolution across the lifecycle
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_agent_for_active_record() {
    let record = new_record(0, 0, 0);
    assert_eq!(record.agent_for(1_000), Some(Pubkey::new_from_array([2u8; 32])));
}

#[test]
fn test_agent_for_tombstone_within_cooldown() {
    let mut record = new_record(0, 0, 0);
    record.status = PROTOCOL_REMOVED;
    record.removed_agent = record.agent;
    record.agent = [0u8; 32];
    record.removed_valid_until = 2_000;

    assert_eq!(record.agent_for(1_500), Some(Pubkey::new_from_array([2u8; 32])));
    assert_eq!(record.agent_for(2_000), Some(Pubkey::new_from_array([2u8; 32])));
    assert_eq!(record.agent_for(2_001), None);
}

#[test]
fn test_agent_for_empty_slot() {
    let mut record = ProtocolAccount::zeroed();
    record.status = PROTOCOL_EMPTY;
    assert_eq!(record.agent_for(0), None);
}

// ═══════════════════════════════════════════════════════════════
// End-to-end split: 10% non-stakers, premium 10/s, 10 seconds
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_split_scenario_views_agree() {
    let deposit = 100_000_000_000_000_000u64; // 10^17
    let mut manager = new_manager();
    let mut record = new_record(deposit, 10, TEN_PERCENT);
    // staker slice of the rate feeds the global accumulator
    manager.total_premium_per_second = record.staker_rate().unwrap();

    assert_eq!(record.settled_balance(1_010), deposit - 100);
    assert_eq!(record.settled_non_stakers_claimable(1_010), Some(10));
    assert_eq!(manager.claimable_premiums(1_010), Some(90));

    // and the two splits plus the balance drain reconcile exactly
    let drained = deposit - record.settled_balance(1_010);
    assert_eq!(
        drained,
        record.settled_non_stakers_claimable(1_010).unwrap()
            + manager.claimable_premiums(1_010).unwrap()
    );

    // commit matches the view
    aegis_premiums::processor::settle_global(&mut manager, 1_010).unwrap();
    aegis_premiums::processor::settle_protocol_debt(&mut manager, &mut record, 1_010).unwrap();
    assert_eq!(record.balance, deposit - 100);
    assert_eq!(record.non_stakers_claimable, 10);
    assert_eq!(manager.claimable_premiums_stored, 90);
}
