//! Struct layout verification tests.
//!
//! Ensures bytemuck Pod compliance and that struct sizes
//! don't accidentally change (would break on-chain state).

use bytemuck::Zeroable;
use aegis_premiums::state::{
    PremiumsManager, ProtocolAccount, PREMIUMS_MANAGER_SIZE, PROTOCOL_ACCOUNT_SIZE,
    PROTOCOL_EMPTY,
};

#[test]
fn test_premiums_manager_size_is_272() {
    // If this changes, existing on-chain data becomes unreadable.
    // NEVER change this without a migration plan.
    assert_eq!(PREMIUMS_MANAGER_SIZE, 272);
    assert_eq!(std::mem::size_of::<PremiumsManager>(), 272);
}

#[test]
fn test_protocol_account_size_is_296() {
    assert_eq!(PROTOCOL_ACCOUNT_SIZE, 296);
    assert_eq!(std::mem::size_of::<ProtocolAccount>(), 296);
}

#[test]
fn test_premiums_manager_alignment() {
    assert_eq!(std::mem::align_of::<PremiumsManager>(), 8);
}

#[test]
fn test_protocol_account_alignment() {
    assert_eq!(std::mem::align_of::<ProtocolAccount>(), 8);
}

#[test]
fn test_premiums_manager_zeroed_is_not_initialized() {
    let manager = PremiumsManager::zeroed();
    assert_eq!(manager.is_initialized, 0);
    assert_eq!(manager.core_configured, 0);
    assert_eq!(manager.total_premium_per_second, 0);
    assert_eq!(manager.claimable_premiums_stored, 0);
    assert_eq!(manager.last_accounted, 0);
    assert_eq!(manager.min_balance, 0);
    assert_eq!(manager.min_seconds_of_coverage, 0);
}

#[test]
fn test_protocol_account_zeroed_is_empty_slot() {
    let record = ProtocolAccount::zeroed();
    assert_eq!(record.status, PROTOCOL_EMPTY);
    assert_eq!(record.balance, 0);
    assert_eq!(record.premium_per_second, 0);
    assert_eq!(record.non_stakers_claimable, 0);
    assert_eq!(record.removed_valid_until, 0);
    assert!(!record.is_active());
    assert!(!record.is_removed());
}

#[test]
fn test_bytemuck_roundtrip_manager() {
    let mut manager = PremiumsManager::zeroed();
    manager.is_initialized = 1;
    manager.bump = 42;
    manager.vault_authority_bump = 99;
    manager.total_premium_per_second = 1_000_000;
    manager.claimable_premiums_stored = 500_000;
    manager.last_accounted = 1_700_000_000;

    let bytes = bytemuck::bytes_of(&manager);
    assert_eq!(bytes.len(), 272);
    let back: &PremiumsManager = bytemuck::from_bytes(bytes);
    assert_eq!(back.total_premium_per_second, 1_000_000);
    assert_eq!(back.claimable_premiums_stored, 500_000);
    assert_eq!(back.last_accounted, 1_700_000_000);
}

#[test]
fn test_bytemuck_roundtrip_protocol() {
    let mut record = ProtocolAccount::zeroed();
    record.status = 1;
    record.bump = 7;
    record.protocol_id = [0xAB; 32];
    record.balance = 123_456_789;
    record.premium_per_second = 10;
    record.non_stakers_share = 100_000_000_000_000_000;
    record.last_accounted = 1_700_000_000;
    record.current_coverage = 1_500;
    record.previous_coverage = 500;

    let bytes = bytemuck::bytes_of(&record);
    assert_eq!(bytes.len(), 296);
    let back: &ProtocolAccount = bytemuck::from_bytes(bytes);
    assert_eq!(back.protocol_id, [0xAB; 32]);
    assert_eq!(back.balance, 123_456_789);
    assert_eq!(back.coverage_amounts(), (1_500, 500));
}
