use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::{clock::Clock, Sysvar},
};

use crate::cpi;
use crate::error::PremiumsError;
use crate::instruction::PremiumsInstruction;
use crate::math;
use crate::state::{
    self, PremiumsManager, ProtocolAccount, PREMIUMS_MANAGER_SIZE, PROTOCOL_ACCOUNT_SIZE,
    PROTOCOL_ACTIVE, PROTOCOL_REMOVED, TOMBSTONE_COOLDOWN,
};

/// Sanity ceiling for the balance force-removal threshold: 20,000 whole
/// tokens at 6 decimals. A fat-fingered threshold above this would let arbs
/// remove every protocol on the books.
pub const MIN_BALANCE_SANITY_CEILING: u64 = 20_000 * 1_000_000;

/// Sanity ceiling for the coverage-runway force-removal threshold.
pub const MIN_SECONDS_SANITY_CEILING: u64 = 7 * 24 * 60 * 60;

pub fn process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = PremiumsInstruction::unpack(instruction_data)?;

    match instruction {
        PremiumsInstruction::Initialize { min_balance, min_seconds_of_coverage } => {
            process_initialize(program_id, accounts, min_balance, min_seconds_of_coverage)
        }
        PremiumsInstruction::SetCore => process_set_core(program_id, accounts),
        PremiumsInstruction::ProtocolAdd {
            protocol_id,
            coverage_id,
            non_stakers_share,
            coverage_amount,
        } => process_protocol_add(
            program_id, accounts, &protocol_id, &coverage_id, non_stakers_share, coverage_amount,
        ),
        PremiumsInstruction::ProtocolUpdate {
            coverage_id,
            non_stakers_share,
            coverage_amount,
        } => process_protocol_update(
            program_id, accounts, &coverage_id, non_stakers_share, coverage_amount,
        ),
        PremiumsInstruction::ProtocolRemove => process_protocol_remove(program_id, accounts),
        PremiumsInstruction::ForceRemoveByBalance => {
            process_force_remove_by_balance(program_id, accounts)
        }
        PremiumsInstruction::ForceRemoveBySecondsOfCoverage => {
            process_force_remove_by_seconds_of_coverage(program_id, accounts)
        }
        PremiumsInstruction::SetProtocolPremium { premium_per_second } => {
            process_set_protocol_premium(program_id, accounts, premium_per_second)
        }
        PremiumsInstruction::SetProtocolPremiums { premiums } => {
            process_set_protocol_premiums(program_id, accounts, &premiums)
        }
        PremiumsInstruction::DepositProtocolBalance { amount } => {
            process_deposit_protocol_balance(program_id, accounts, amount)
        }
        PremiumsInstruction::WithdrawProtocolBalance { amount } => {
            process_withdraw_protocol_balance(program_id, accounts, amount)
        }
        PremiumsInstruction::TransferProtocolAgent => {
            process_transfer_protocol_agent(program_id, accounts)
        }
        PremiumsInstruction::NonStakersClaim { amount } => {
            process_non_stakers_claim(program_id, accounts, amount)
        }
        PremiumsInstruction::ClaimPremiums => process_claim_premiums(program_id, accounts),
        PremiumsInstruction::SetMinBalance { min_balance } => {
            process_set_min_balance(program_id, accounts, min_balance)
        }
        PremiumsInstruction::SetMinSecondsOfCoverage { min_seconds_of_coverage } => {
            process_set_min_seconds_of_coverage(program_id, accounts, min_seconds_of_coverage)
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Shared helpers
// ═══════════════════════════════════════════════════════════════

fn is_zero_key(key: &Pubkey) -> bool {
    *key == Pubkey::default()
}

fn unix_now() -> Result<u64, ProgramError> {
    let ts = Clock::get()?.unix_timestamp;
    Ok(ts.max(0) as u64)
}

/// Owner must sign and match the initialized manager.
fn validate_owner(manager: &PremiumsManager, owner: &AccountInfo) -> ProgramResult {
    if !owner.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }
    if manager.owner != owner.key.to_bytes() {
        return Err(PremiumsError::Unauthorized.into());
    }
    Ok(())
}

/// Bind a protocol record to its manager and its stored id via PDA
/// re-derivation. A record passed under the wrong manager or with a forged
/// id fails here.
fn validate_protocol_binding(
    program_id: &Pubkey,
    manager_key: &Pubkey,
    protocol_info_key: &Pubkey,
    record: &ProtocolAccount,
) -> ProgramResult {
    if record.manager != manager_key.to_bytes() {
        return Err(PremiumsError::InvalidPda.into());
    }
    let (expected, _) = state::derive_protocol_pda(program_id, manager_key, &record.protocol_id);
    if expected != *protocol_info_key {
        return Err(PremiumsError::InvalidPda.into());
    }
    Ok(())
}

fn validate_vault(manager: &PremiumsManager, vault: &AccountInfo) -> ProgramResult {
    if manager.vault != vault.key.to_bytes() {
        return Err(PremiumsError::InvalidPda.into());
    }
    Ok(())
}

/// Fold the accrual since the last global settlement into the stored staker
/// pool. Every mutating path runs this before touching a protocol so rate
/// changes take effect exactly at the settlement boundary.
pub fn settle_global(manager: &mut PremiumsManager, now: u64) -> ProgramResult {
    let elapsed = now.saturating_sub(manager.last_accounted);
    let accrued = math::accrue(manager.total_premium_per_second, elapsed)
        .ok_or(PremiumsError::Overflow)?;
    manager.claimable_premiums_stored = manager
        .claimable_premiums_stored
        .checked_add(accrued)
        .ok_or(PremiumsError::Overflow)?;
    manager.last_accounted = now;
    Ok(())
}

/// Apply the elapsed debt to one protocol. On a shortfall the staker slice
/// is clawed back out of the (already settled) global pool, clamped at zero,
/// and the deficit is logged as an AccountingError event — the operation
/// still commits.
pub fn settle_protocol_debt(
    manager: &mut PremiumsManager,
    record: &mut ProtocolAccount,
    now: u64,
) -> ProgramResult {
    let settlement = math::settle_protocol(
        record.balance,
        record.premium_per_second,
        record.non_stakers_share,
        record.elapsed(now),
    )
    .ok_or(PremiumsError::Overflow)?;

    record.balance = settlement.new_balance;
    record.non_stakers_claimable = record
        .non_stakers_claimable
        .checked_add(settlement.non_stakers_delta)
        .ok_or(PremiumsError::Overflow)?;
    record.last_accounted = now;

    if let Some(shortfall) = settlement.shortfall {
        let (stored, insufficient) =
            math::absorb_staker_shortfall(manager.claimable_premiums_stored, shortfall.stakers);
        manager.claimable_premiums_stored = stored;
        msg!(
            "AccountingError(protocol={}, amount={}, insufficientTokens={})",
            Pubkey::new_from_array(record.protocol_id),
            shortfall.stakers,
            insufficient,
        );
    }
    Ok(())
}

/// Swap a (settled) protocol's premium and fold the staker-rate delta into
/// the global rate. No-op without an event when the value is unchanged.
/// Returns whether anything changed.
pub fn change_premium(
    manager: &mut PremiumsManager,
    record: &mut ProtocolAccount,
    new_premium: u64,
) -> Result<bool, ProgramError> {
    let old_premium = record.premium_per_second;
    if old_premium == new_premium {
        return Ok(false);
    }
    if new_premium != 0 && record.balance == 0 {
        return Err(PremiumsError::InsufficientBalance.into());
    }
    let old_rate = record.staker_rate().ok_or(PremiumsError::Overflow)?;
    let (_, new_rate) = math::split_premium(new_premium, record.non_stakers_share)
        .ok_or(PremiumsError::Overflow)?;
    manager.total_premium_per_second =
        math::apply_rate_delta(manager.total_premium_per_second, old_rate, new_rate)
            .ok_or(PremiumsError::Overflow)?;
    record.premium_per_second = new_premium;
    msg!(
        "ProtocolPremiumChanged(protocol={}, oldPremium={}, newPremium={})",
        Pubkey::new_from_array(record.protocol_id),
        old_premium,
        new_premium,
    );
    Ok(true)
}

/// Tombstone a settled, premium-zeroed record and emit the removal tail
/// shared by all three removal paths.
fn tombstone_protocol(record: &mut ProtocolAccount, now: u64) {
    let protocol = Pubkey::new_from_array(record.protocol_id);
    let old_agent = record.agent_pubkey();

    record.removed_agent = record.agent;
    record.removed_valid_until = now + TOMBSTONE_COOLDOWN;
    record.agent = [0u8; 32];
    record.non_stakers_share = 0;
    record.last_accounted = 0;
    record.status = PROTOCOL_REMOVED;

    msg!(
        "ProtocolAgentTransfer(protocol={}, from={}, to={})",
        protocol,
        old_agent,
        Pubkey::default(),
    );
    msg!(
        "ProtocolUpdated(protocol={}, coverageId={}, nonStakerShare={}, coverageAmount={})",
        protocol,
        Pubkey::default(),
        0,
        0,
    );
    msg!("ProtocolRemoved(protocol={})", protocol);
}

// ═══════════════════════════════════════════════════════════════
// 0: Initialize
// ═══════════════════════════════════════════════════════════════

fn process_initialize(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    min_balance: u64,
    min_seconds_of_coverage: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let mint = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;
    let rent_sysvar = next_account_info(accounts_iter)?;

    if !owner.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if min_balance > MIN_BALANCE_SANITY_CEILING
        || min_seconds_of_coverage >= MIN_SECONDS_SANITY_CEILING
    {
        return Err(PremiumsError::InvalidArgument.into());
    }

    let (expected_manager, manager_bump) = state::derive_manager_pda(program_id, mint.key);
    if *manager_pda.key != expected_manager {
        return Err(PremiumsError::InvalidPda.into());
    }
    if !manager_pda.data_is_empty() {
        return Err(PremiumsError::AlreadyInitialized.into());
    }

    let (expected_vault_auth, vault_auth_bump) =
        state::derive_vault_authority(program_id, &expected_manager);
    if *vault_auth.key != expected_vault_auth {
        return Err(PremiumsError::InvalidPda.into());
    }

    // Validate token program BEFORE any invoke_signed that grants PDA signer authority
    cpi::verify_token_program(token_program)?;

    let rent = Rent::from_account_info(rent_sysvar)?;

    // Create manager PDA account
    let manager_seeds: &[&[u8]] = &[b"manager", mint.key.as_ref(), &[manager_bump]];
    invoke_signed(
        &system_instruction::create_account(
            owner.key,
            manager_pda.key,
            rent.minimum_balance(PREMIUMS_MANAGER_SIZE),
            PREMIUMS_MANAGER_SIZE as u64,
            program_id,
        ),
        &[owner.clone(), manager_pda.clone(), system_program.clone()],
        &[manager_seeds],
    )?;

    // Initialize vault token account (authority = vault_auth PDA)
    let vault_auth_seeds: &[&[u8]] =
        &[b"vault_auth", manager_pda.key.as_ref(), &[vault_auth_bump]];
    invoke_signed(
        &spl_token::instruction::initialize_account(
            token_program.key,
            vault.key,
            mint.key,
            vault_auth.key,
        )?,
        &[vault.clone(), mint.clone(), vault_auth.clone(), rent_sysvar.clone()],
        &[vault_auth_seeds],
    )?;

    // Write manager state
    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);

    manager.is_initialized = 1;
    manager.bump = manager_bump;
    manager.vault_authority_bump = vault_auth_bump;
    manager.core_configured = 0; // Not yet — must call SetCore
    manager.owner = owner.key.to_bytes();
    manager.mint = mint.key.to_bytes();
    manager.vault = vault.key.to_bytes();
    manager.min_balance = min_balance;
    manager.min_seconds_of_coverage = min_seconds_of_coverage;
    manager.total_premium_per_second = 0;
    manager.claimable_premiums_stored = 0;
    manager.last_accounted = unix_now()?;

    msg!("MinBalance(previous={}, current={})", 0, min_balance);
    msg!("MinSecondsOfCoverage(previous={}, current={})", 0, min_seconds_of_coverage);
    msg!("PremiumsManager initialized for mint {} (core pending)", mint.key);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 1: SetCore — one-time collaborator wiring
// ═══════════════════════════════════════════════════════════════

fn process_set_core(_program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let core = next_account_info(accounts_iter)?;
    let non_stakers = next_account_info(accounts_iter)?;

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);

    validate_owner(manager, owner)?;
    if manager.core_configured == 1 {
        return Err(PremiumsError::CoreAlreadySet.into());
    }
    if is_zero_key(core.key) || is_zero_key(non_stakers.key) {
        return Err(PremiumsError::ZeroArgument.into());
    }

    manager.core = core.key.to_bytes();
    manager.non_stakers = non_stakers.key.to_bytes();
    manager.core_configured = 1;

    msg!("Core configured: core {}, non-stakers {}", core.key, non_stakers.key);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 2: ProtocolAdd
// ═══════════════════════════════════════════════════════════════

fn process_protocol_add(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    protocol_id: &[u8; 32],
    coverage_id: &[u8; 32],
    non_stakers_share: u64,
    coverage_amount: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let agent = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    if *protocol_id == [0u8; 32] || *coverage_id == [0u8; 32] || is_zero_key(agent.key) {
        return Err(PremiumsError::ZeroArgument.into());
    }
    if coverage_amount == 0 {
        return Err(PremiumsError::ZeroArgument.into());
    }
    if non_stakers_share > math::HUNDRED_PERCENT {
        return Err(PremiumsError::InvalidArgument.into());
    }

    let (expected_protocol, protocol_bump) =
        state::derive_protocol_pda(program_id, manager_pda.key, protocol_id);
    if *protocol_pda.key != expected_protocol {
        return Err(PremiumsError::InvalidPda.into());
    }

    // First add of this id: create the record account. The account is never
    // closed afterwards — removals only tombstone it.
    if protocol_pda.data_is_empty() {
        let protocol_seeds: &[&[u8]] = &[
            b"protocol", manager_pda.key.as_ref(), protocol_id, &[protocol_bump],
        ];
        let rent = Rent::get()?;
        invoke_signed(
            &system_instruction::create_account(
                owner.key,
                protocol_pda.key,
                rent.minimum_balance(PROTOCOL_ACCOUNT_SIZE),
                PROTOCOL_ACCOUNT_SIZE as u64,
                program_id,
            ),
            &[owner.clone(), protocol_pda.clone(), system_program.clone()],
            &[protocol_seeds],
        )?;
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    validate_owner(manager, owner)?;

    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);

    if record.is_active() {
        return Err(PremiumsError::InvalidConditions.into());
    }

    let now = unix_now()?;
    settle_global(manager, now)?;

    // Re-add over a tombstone: the coverage last in force rolls into the
    // history slot; the tombstone itself is cleared. The non-staker pool is
    // still owed and survives untouched.
    let previous_coverage = if record.is_removed() { record.current_coverage } else { 0 };

    record.status = PROTOCOL_ACTIVE;
    record.bump = protocol_bump;
    record.manager = manager_pda.key.to_bytes();
    record.protocol_id = *protocol_id;
    record.agent = agent.key.to_bytes();
    record.coverage_id = *coverage_id;
    record.balance = 0;
    record.premium_per_second = 0;
    record.non_stakers_share = non_stakers_share;
    record.last_accounted = now;
    record.current_coverage = coverage_amount;
    record.previous_coverage = previous_coverage;
    record.removed_agent = [0u8; 32];
    record.removed_valid_until = 0;

    let protocol = Pubkey::new_from_array(*protocol_id);
    msg!(
        "ProtocolAgentTransfer(protocol={}, from={}, to={})",
        protocol,
        Pubkey::default(),
        agent.key,
    );
    msg!("ProtocolAdded(protocol={})", protocol);
    msg!(
        "ProtocolUpdated(protocol={}, coverageId={}, nonStakerShare={}, coverageAmount={})",
        protocol,
        Pubkey::new_from_array(*coverage_id),
        non_stakers_share,
        coverage_amount,
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 3: ProtocolUpdate
// ═══════════════════════════════════════════════════════════════

fn process_protocol_update(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    coverage_id: &[u8; 32],
    non_stakers_share: u64,
    coverage_amount: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;

    if *coverage_id == [0u8; 32] || coverage_amount == 0 {
        return Err(PremiumsError::ZeroArgument.into());
    }
    if non_stakers_share > math::HUNDRED_PERCENT {
        return Err(PremiumsError::InvalidArgument.into());
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    validate_owner(manager, owner)?;

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }

    let now = unix_now()?;
    settle_global(manager, now)?;
    // Debt accrues at the old share up to this instant
    settle_protocol_debt(manager, record, now)?;

    // The premium itself is untouched, but a share change moves the
    // staker/non-staker split of the rate
    let old_rate = record.staker_rate().ok_or(PremiumsError::Overflow)?;
    let (_, new_rate) = math::split_premium(record.premium_per_second, non_stakers_share)
        .ok_or(PremiumsError::Overflow)?;
    manager.total_premium_per_second =
        math::apply_rate_delta(manager.total_premium_per_second, old_rate, new_rate)
            .ok_or(PremiumsError::Overflow)?;

    record.non_stakers_share = non_stakers_share;
    record.coverage_id = *coverage_id;
    record.previous_coverage = record.current_coverage;
    record.current_coverage = coverage_amount;

    msg!(
        "ProtocolUpdated(protocol={}, coverageId={}, nonStakerShare={}, coverageAmount={})",
        Pubkey::new_from_array(record.protocol_id),
        Pubkey::new_from_array(*coverage_id),
        non_stakers_share,
        coverage_amount,
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 4: ProtocolRemove
// ═══════════════════════════════════════════════════════════════

fn process_protocol_remove(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let agent_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    validate_owner(manager, owner)?;
    validate_vault(manager, vault)?;
    cpi::verify_token_program(token_program)?;

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }

    let now = unix_now()?;
    settle_global(manager, now)?;
    settle_protocol_debt(manager, record, now)?;

    change_premium(manager, record, 0)?;

    // Remaining balance goes home to the agent
    let remaining = record.balance;
    if remaining != 0 {
        record.balance = 0;
        cpi::verify_token_account(agent_token, &record.agent_pubkey(), &manager.mint_pubkey())?;
        let vault_auth_seeds: &[&[u8]] = &[
            b"vault_auth", manager_pda.key.as_ref(), &[manager.vault_authority_bump],
        ];
        cpi::token_transfer_out(
            token_program, vault, agent_token, vault_auth, remaining, vault_auth_seeds,
        )?;
        msg!(
            "ProtocolBalanceWithdrawn(protocol={}, amount={})",
            Pubkey::new_from_array(record.protocol_id),
            remaining,
        );
    }

    tombstone_protocol(record, now);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 5: ForceRemoveByBalance — permissionless, arb keeps the dust
// ═══════════════════════════════════════════════════════════════

fn process_force_remove_by_balance(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let caller_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    if !caller.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }
    validate_vault(manager, vault)?;
    cpi::verify_token_program(token_program)?;

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }

    let now = unix_now()?;
    settle_global(manager, now)?;
    settle_protocol_debt(manager, record, now)?;

    // Removal right exists only for a protocol that is still paying but
    // whose settled balance sank below the floor
    let remaining = record.balance;
    if record.premium_per_second == 0 || remaining >= manager.min_balance {
        return Err(PremiumsError::InvalidConditions.into());
    }

    change_premium(manager, record, 0)?;
    record.balance = 0;
    tombstone_protocol(record, now);

    if remaining != 0 {
        cpi::verify_token_account(caller_token, caller.key, &manager.mint_pubkey())?;
        let vault_auth_seeds: &[&[u8]] = &[
            b"vault_auth", manager_pda.key.as_ref(), &[manager.vault_authority_bump],
        ];
        cpi::token_transfer_out(
            token_program, vault, caller_token, vault_auth, remaining, vault_auth_seeds,
        )?;
    }
    msg!(
        "ProtocolRemovedByArb(protocol={}, arb={}, profit={})",
        Pubkey::new_from_array(record.protocol_id),
        caller.key,
        remaining,
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 6: ForceRemoveBySecondsOfCoverage — arb cut grows with neglect
// ═══════════════════════════════════════════════════════════════

fn process_force_remove_by_seconds_of_coverage(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let caller_token = next_account_info(accounts_iter)?;
    let agent_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    if !caller.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }
    validate_vault(manager, vault)?;
    cpi::verify_token_program(token_program)?;

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }

    let now = unix_now()?;

    // Runway measured as-of-now, before the commit below
    let seconds_left = record.seconds_of_coverage_left(now);
    let min_seconds = manager.min_seconds_of_coverage;
    if min_seconds == 0 || seconds_left >= min_seconds {
        return Err(PremiumsError::InvalidConditions.into());
    }

    settle_global(manager, now)?;
    settle_protocol_debt(manager, record, now)?;

    let remaining = record.balance;
    let arb_amount = math::coverage_deficit_payout(remaining, seconds_left, min_seconds)
        .ok_or(PremiumsError::InvalidConditions)?;
    let residue = remaining - arb_amount;
    let agent = record.agent_pubkey();

    change_premium(manager, record, 0)?;
    record.balance = 0;

    let vault_auth_seeds: &[&[u8]] = &[
        b"vault_auth", manager_pda.key.as_ref(), &[manager.vault_authority_bump],
    ];

    if residue != 0 {
        cpi::verify_token_account(agent_token, &agent, &manager.mint_pubkey())?;
        cpi::token_transfer_out(
            token_program, vault, agent_token, vault_auth, residue, vault_auth_seeds,
        )?;
        msg!(
            "ProtocolBalanceWithdrawn(protocol={}, amount={})",
            Pubkey::new_from_array(record.protocol_id),
            residue,
        );
    }

    tombstone_protocol(record, now);

    if arb_amount != 0 {
        cpi::verify_token_account(caller_token, caller.key, &manager.mint_pubkey())?;
        cpi::token_transfer_out(
            token_program, vault, caller_token, vault_auth, arb_amount, vault_auth_seeds,
        )?;
    }
    msg!(
        "ProtocolRemovedByArb(protocol={}, arb={}, profit={})",
        Pubkey::new_from_array(record.protocol_id),
        caller.key,
        arb_amount,
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 7: SetProtocolPremium
// ═══════════════════════════════════════════════════════════════

fn process_set_protocol_premium(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    premium_per_second: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    validate_owner(manager, owner)?;

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }

    let now = unix_now()?;
    settle_global(manager, now)?;
    settle_protocol_debt(manager, record, now)?;
    change_premium(manager, record, premium_per_second)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 8: SetProtocolPremiums — all-or-nothing batch
// ═══════════════════════════════════════════════════════════════

fn process_set_protocol_premiums(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    premiums: &[u64],
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_accounts: Vec<&AccountInfo> = accounts_iter.collect();

    if premiums.is_empty() {
        return Err(PremiumsError::InvalidArgument.into());
    }
    if protocol_accounts.len() != premiums.len() {
        return Err(PremiumsError::UnequalArrayLength.into());
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    validate_owner(manager, owner)?;

    let now = unix_now()?;
    settle_global(manager, now)?;

    // Every element settles and applies at the same instant; any failure
    // aborts the whole transaction, so the batch is all-or-nothing.
    for (protocol_pda, &premium) in protocol_accounts.iter().zip(premiums) {
        if protocol_pda.data_is_empty() {
            return Err(PremiumsError::ProtocolNotExists.into());
        }
        let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
        let record: &mut ProtocolAccount =
            bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
        validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
        if !record.is_active() {
            return Err(PremiumsError::ProtocolNotExists.into());
        }
        settle_protocol_debt(manager, record, now)?;
        change_premium(manager, record, premium)?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 9: DepositProtocolBalance
// ═══════════════════════════════════════════════════════════════

fn process_deposit_protocol_balance(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(PremiumsError::ZeroArgument.into());
    }

    let accounts_iter = &mut accounts.iter();

    let depositor = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let depositor_token = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    if !depositor.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }
    validate_vault(manager, vault)?;
    cpi::verify_token_program(token_program)?;

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }

    // Settle at the pre-deposit balance, then fund
    let now = unix_now()?;
    settle_global(manager, now)?;
    settle_protocol_debt(manager, record, now)?;

    cpi::token_transfer_in(token_program, depositor_token, vault, depositor, amount)?;

    record.balance = record.balance.checked_add(amount).ok_or(PremiumsError::Overflow)?;

    msg!(
        "Deposited {} into protocol {}",
        amount,
        Pubkey::new_from_array(record.protocol_id),
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 10: WithdrawProtocolBalance
// ═══════════════════════════════════════════════════════════════

fn process_withdraw_protocol_balance(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(PremiumsError::ZeroArgument.into());
    }

    let accounts_iter = &mut accounts.iter();

    let agent = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let agent_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    if !agent.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }
    validate_vault(manager, vault)?;
    cpi::verify_token_program(token_program)?;

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    if record.agent != agent.key.to_bytes() {
        return Err(PremiumsError::Unauthorized.into());
    }

    let now = unix_now()?;
    settle_global(manager, now)?;
    settle_protocol_debt(manager, record, now)?;

    if amount > record.balance {
        return Err(PremiumsError::InsufficientBalance.into());
    }
    record.balance -= amount;

    cpi::verify_token_account(agent_token, agent.key, &manager.mint_pubkey())?;
    let vault_auth_seeds: &[&[u8]] = &[
        b"vault_auth", manager_pda.key.as_ref(), &[manager.vault_authority_bump],
    ];
    cpi::token_transfer_out(token_program, vault, agent_token, vault_auth, amount, vault_auth_seeds)?;

    msg!(
        "Withdrew {} from protocol {}",
        amount,
        Pubkey::new_from_array(record.protocol_id),
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 11: TransferProtocolAgent
// ═══════════════════════════════════════════════════════════════

fn process_transfer_protocol_agent(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let current_agent = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let new_agent = next_account_info(accounts_iter)?;

    if !current_agent.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if is_zero_key(new_agent.key) {
        return Err(PremiumsError::ZeroArgument.into());
    }

    let manager_data = manager_pda.try_borrow_data()?;
    let manager: &PremiumsManager = bytemuck::from_bytes(&manager_data[..PREMIUMS_MANAGER_SIZE]);
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }

    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;
    if !record.is_active() {
        return Err(PremiumsError::ProtocolNotExists.into());
    }
    if record.agent == new_agent.key.to_bytes() {
        return Err(PremiumsError::InvalidArgument.into());
    }
    if record.agent != current_agent.key.to_bytes() {
        return Err(PremiumsError::Unauthorized.into());
    }

    record.agent = new_agent.key.to_bytes();

    msg!(
        "ProtocolAgentTransfer(protocol={}, from={}, to={})",
        Pubkey::new_from_array(record.protocol_id),
        current_agent.key,
        new_agent.key,
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 12: NonStakersClaim
// ═══════════════════════════════════════════════════════════════

fn process_non_stakers_claim(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(PremiumsError::ZeroArgument.into());
    }

    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let protocol_pda = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let receiver_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    if !caller.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if is_zero_key(receiver_token.key) {
        return Err(PremiumsError::ZeroArgument.into());
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }
    if manager.core_configured != 1 {
        return Err(PremiumsError::InvalidConditions.into());
    }
    if manager.non_stakers != caller.key.to_bytes() {
        return Err(PremiumsError::Unauthorized.into());
    }
    validate_vault(manager, vault)?;
    cpi::verify_token_program(token_program)?;

    // A never-funded id has nothing claimable
    if protocol_pda.data_is_empty() {
        return Err(PremiumsError::InsufficientBalance.into());
    }
    let mut protocol_data = protocol_pda.try_borrow_mut_data()?;
    let record: &mut ProtocolAccount =
        bytemuck::from_bytes_mut(&mut protocol_data[..PROTOCOL_ACCOUNT_SIZE]);
    validate_protocol_binding(program_id, manager_pda.key, protocol_pda.key, record)?;

    // The pool stays claimable after removal; only an active record still
    // accrues, so only it needs settling
    let now = unix_now()?;
    if record.is_active() {
        settle_global(manager, now)?;
        settle_protocol_debt(manager, record, now)?;
    }

    if amount > record.non_stakers_claimable {
        return Err(PremiumsError::InsufficientBalance.into());
    }
    record.non_stakers_claimable -= amount;

    let vault_auth_seeds: &[&[u8]] = &[
        b"vault_auth", manager_pda.key.as_ref(), &[manager.vault_authority_bump],
    ];
    cpi::token_transfer_out(
        token_program, vault, receiver_token, vault_auth, amount, vault_auth_seeds,
    )?;

    msg!(
        "Non-staker claim of {} from protocol {} to {}",
        amount,
        Pubkey::new_from_array(record.protocol_id),
        receiver_token.key,
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 13: ClaimPremiums — core sweeps the whole staker pool
// ═══════════════════════════════════════════════════════════════

fn process_claim_premiums(_program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;
    let vault = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let core_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    if !caller.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    if manager.is_initialized != 1 {
        return Err(PremiumsError::NotInitialized.into());
    }
    // Claims only run in a fully wired configuration, from the core itself
    if manager.core_configured != 1 || manager.core != caller.key.to_bytes() {
        return Err(PremiumsError::InvalidConditions.into());
    }
    validate_vault(manager, vault)?;
    cpi::verify_token_program(token_program)?;

    let now = unix_now()?;
    settle_global(manager, now)?;

    let amount = manager.claimable_premiums_stored;
    manager.claimable_premiums_stored = 0;

    // A zero pool is a successful no-op claim, not an error
    if amount != 0 {
        cpi::verify_token_account(core_token, &manager.core_pubkey(), &manager.mint_pubkey())?;
        let vault_auth_seeds: &[&[u8]] = &[
            b"vault_auth", manager_pda.key.as_ref(), &[manager.vault_authority_bump],
        ];
        cpi::token_transfer_out(
            token_program, vault, core_token, vault_auth, amount, vault_auth_seeds,
        )?;
    }

    msg!("Claimed {} staker premiums to core", amount);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 14: SetMinBalance
// ═══════════════════════════════════════════════════════════════

fn process_set_min_balance(
    _program_id: &Pubkey,
    accounts: &[AccountInfo],
    min_balance: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    validate_owner(manager, owner)?;

    if min_balance > MIN_BALANCE_SANITY_CEILING {
        return Err(PremiumsError::InvalidArgument.into());
    }

    msg!("MinBalance(previous={}, current={})", manager.min_balance, min_balance);
    manager.min_balance = min_balance;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 15: SetMinSecondsOfCoverage
// ═══════════════════════════════════════════════════════════════

fn process_set_min_seconds_of_coverage(
    _program_id: &Pubkey,
    accounts: &[AccountInfo],
    min_seconds_of_coverage: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let manager_pda = next_account_info(accounts_iter)?;

    let mut manager_data = manager_pda.try_borrow_mut_data()?;
    let manager: &mut PremiumsManager =
        bytemuck::from_bytes_mut(&mut manager_data[..PREMIUMS_MANAGER_SIZE]);
    validate_owner(manager, owner)?;

    if min_seconds_of_coverage >= MIN_SECONDS_SANITY_CEILING {
        return Err(PremiumsError::InvalidArgument.into());
    }

    msg!(
        "MinSecondsOfCoverage(previous={}, current={})",
        manager.min_seconds_of_coverage,
        min_seconds_of_coverage,
    );
    manager.min_seconds_of_coverage = min_seconds_of_coverage;
    Ok(())
}
