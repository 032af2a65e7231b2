use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

use crate::math;

/// Slot discriminant: never added (or fully reclaimed) id.
pub const PROTOCOL_EMPTY: u8 = 0;
/// Slot discriminant: live protocol draining premium.
pub const PROTOCOL_ACTIVE: u8 = 1;
/// Slot discriminant: removed protocol, tombstone fields populated.
pub const PROTOCOL_REMOVED: u8 = 2;

/// How long a removed protocol's tombstone keeps resolving the old agent.
pub const TOMBSTONE_COOLDOWN: u64 = 7 * 24 * 60 * 60;

/// Premiums manager state — one per collateral mint.
/// PDA seeds: [b"manager", mint]
///
/// Carries the global premium ledger (total staker rate, stored claimable
/// pool, last settlement time) plus the collaborator addresses the handlers
/// authorize against:
/// - `owner`: operator, may add/update/remove protocols and set premiums
/// - `core`: staking pool, sole recipient of ClaimPremiums
/// - `non_stakers`: beneficiary allowed to pull per-protocol non-staker claims
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PremiumsManager {
    /// Whether the manager is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// Bump seed for the manager PDA
    pub bump: u8,

    /// Bump seed for the vault authority PDA
    pub vault_authority_bump: u8,

    /// Whether core/non-staker addresses have been configured (1 = yes)
    pub core_configured: u8,

    /// Padding for alignment
    pub _padding: [u8; 4],

    /// Operator authorized for protocol lifecycle and premium changes
    pub owner: [u8; 32],

    /// Collateral mint all balances are denominated in
    pub mint: [u8; 32],

    /// Vault holding every protocol balance plus both accrued pools
    /// (owned by the vault authority PDA)
    pub vault: [u8; 32],

    /// Staking pool address premiums are claimed to
    pub core: [u8; 32],

    /// Non-staker beneficiary address
    pub non_stakers: [u8; 32],

    /// Force-removal threshold: settled balance below this invites arbs
    pub min_balance: u64,

    /// Force-removal threshold: coverage runway below this invites arbs
    pub min_seconds_of_coverage: u64,

    /// Sum of all active protocols' staker-share premium rate,
    /// maintained incrementally on every premium/share change
    pub total_premium_per_second: u64,

    /// Accrued-but-unclaimed staker premium pool
    pub claimable_premiums_stored: u64,

    /// Unix time of the last global settlement
    pub last_accounted: u64,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of PremiumsManager in bytes
pub const PREMIUMS_MANAGER_SIZE: usize = core::mem::size_of::<PremiumsManager>();

/// Per-protocol accounting record.
/// PDA seeds: [b"protocol", manager_pda, protocol_id]
///
/// The account is created on first add and never closed; removal flips
/// `status` to PROTOCOL_REMOVED and leaves the tombstone (`removed_agent`,
/// `removed_valid_until`) and coverage history in place so queries keep
/// resolving during the cooldown. A later add reuses the slot.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct ProtocolAccount {
    /// One of PROTOCOL_EMPTY / PROTOCOL_ACTIVE / PROTOCOL_REMOVED
    pub status: u8,

    /// Bump seed for the protocol PDA
    pub bump: u8,

    /// Padding for alignment
    pub _padding: [u8; 6],

    /// The manager this record belongs to
    pub manager: [u8; 32],

    /// Caller-supplied 32-byte protocol identifier
    pub protocol_id: [u8; 32],

    /// Controller of the protocol's balance and agent-transfer rights
    pub agent: [u8; 32],

    /// Identifier of the coverage agreement currently in force
    pub coverage_id: [u8; 32],

    /// Agent at the time of removal (tombstone)
    pub removed_agent: [u8; 32],

    /// Token units held on behalf of this protocol
    pub balance: u64,

    /// Per-second debit rate; 0 = no coverage cost
    pub premium_per_second: u64,

    /// Fraction of the premium routed to non-stakers, parts per 10^18
    pub non_stakers_share: u64,

    /// Accumulated amount owed to non-stakers for this protocol
    pub non_stakers_claimable: u64,

    /// Unix time of the last settlement for this record
    pub last_accounted: u64,

    /// Declared coverage amount currently in force
    pub current_coverage: u64,

    /// Previous declared coverage amount (2-slot rolling history)
    pub previous_coverage: u64,

    /// Unix time until which the tombstone resolves the removed agent
    pub removed_valid_until: u64,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of ProtocolAccount in bytes
pub const PROTOCOL_ACCOUNT_SIZE: usize = core::mem::size_of::<ProtocolAccount>();

impl PremiumsManager {
    pub fn owner_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }

    pub fn mint_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.mint)
    }

    pub fn vault_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.vault)
    }

    pub fn core_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.core)
    }

    pub fn non_stakers_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.non_stakers)
    }

    /// Staker premiums owed as of `now`: the stored pool plus the accrual
    /// since the last global settlement. Pure — commit happens separately.
    /// Delegates to pure math module (Kani-verified).
    pub fn claimable_premiums(&self, now: u64) -> Option<u64> {
        let elapsed = now.saturating_sub(self.last_accounted);
        let accrued = math::accrue(self.total_premium_per_second, elapsed)?;
        self.claimable_premiums_stored.checked_add(accrued)
    }
}

impl ProtocolAccount {
    pub fn agent_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.agent)
    }

    pub fn removed_agent_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.removed_agent)
    }

    pub fn is_active(&self) -> bool {
        self.status == PROTOCOL_ACTIVE
    }

    pub fn is_removed(&self) -> bool {
        self.status == PROTOCOL_REMOVED
    }

    /// Seconds elapsed since this record was last settled.
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_accounted)
    }

    /// Staker-share slice of this protocol's premium rate.
    pub fn staker_rate(&self) -> Option<u64> {
        math::split_premium(self.premium_per_second, self.non_stakers_share)
            .map(|(_, stakers)| stakers)
    }

    /// Balance as of `now` with the accrued debt applied, clamped at zero.
    /// Pure read — the insolvency signal is only raised on commit.
    pub fn settled_balance(&self, now: u64) -> u64 {
        match math::accrue(self.premium_per_second, self.elapsed(now)) {
            Some(debt) if debt <= self.balance => self.balance - debt,
            _ => 0,
        }
    }

    /// Non-staker claimable as of `now`. Accrues on the debt actually
    /// coverable by the balance, so it matches what a commit would store.
    pub fn settled_non_stakers_claimable(&self, now: u64) -> Option<u64> {
        let debt = match math::accrue(self.premium_per_second, self.elapsed(now)) {
            Some(debt) => debt.min(self.balance),
            None => self.balance,
        };
        let share = math::share_of(debt, self.non_stakers_share)?;
        self.non_stakers_claimable.checked_add(share)
    }

    /// Runway left at the current premium rate. Active protocol with zero
    /// premium reads as 0; existence is the caller's check.
    pub fn seconds_of_coverage_left(&self, now: u64) -> u64 {
        math::seconds_of_coverage_left(self.settled_balance(now), self.premium_per_second)
    }

    /// (current, previous) declared coverage amounts. Also valid on a
    /// tombstone — coverage history persists through removal.
    pub fn coverage_amounts(&self) -> (u64, u64) {
        (self.current_coverage, self.previous_coverage)
    }

    /// Resolve the agent as of `now`: the live agent while active, the
    /// removed agent while the tombstone cooldown runs, nothing after.
    pub fn agent_for(&self, now: u64) -> Option<Pubkey> {
        if self.is_active() {
            Some(self.agent_pubkey())
        } else if self.is_removed() && now <= self.removed_valid_until {
            Some(self.removed_agent_pubkey())
        } else {
            None
        }
    }
}

/// Derive the manager PDA for a given collateral mint.
pub fn derive_manager_pda(program_id: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"manager", mint.as_ref()], program_id)
}

/// Derive the vault authority PDA for a given manager.
/// Controls the vault token account.
pub fn derive_vault_authority(program_id: &Pubkey, manager: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"vault_auth", manager.as_ref()], program_id)
}

/// Derive the per-protocol record PDA.
pub fn derive_protocol_pda(
    program_id: &Pubkey,
    manager: &Pubkey,
    protocol_id: &[u8; 32],
) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"protocol", manager.as_ref(), protocol_id], program_id)
}
