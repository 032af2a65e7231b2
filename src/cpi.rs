//! SPL Token CPI helpers — the token-transfer collaborator of the
//! accounting core. Transfers in are signed by the depositor; transfers out
//! are signed by the vault authority PDA. A failed token CPI aborts the
//! whole instruction; nothing here catches it.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
};

use crate::error::PremiumsError;

/// Verify the token program is the real SPL Token program.
/// CRITICAL: Without this check, an attacker can pass a fake token program,
/// receive PDA signer authority via invoke_signed, and drain the vault.
pub fn verify_token_program(token_program: &AccountInfo) -> ProgramResult {
    if *token_program.key != spl_token::id() {
        msg!("Error: invalid token program {}", token_program.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Verify a token account is SPL-owned, holds the expected mint, and belongs
/// to the expected wallet. Used on every outbound destination so balance
/// refunds and payouts cannot be redirected.
pub fn verify_token_account(
    token_account: &AccountInfo,
    expected_owner: &Pubkey,
    expected_mint: &Pubkey,
) -> ProgramResult {
    if token_account.owner != &spl_token::id() {
        return Err(PremiumsError::InvalidMint.into());
    }
    let data = token_account.try_borrow_data()?;
    let state = spl_token::state::Account::unpack(&data)?;
    if state.mint != *expected_mint {
        return Err(PremiumsError::InvalidMint.into());
    }
    if state.owner != *expected_owner {
        return Err(PremiumsError::Unauthorized.into());
    }
    Ok(())
}

/// Pull `amount` collateral from the payer's token account into the vault.
/// The payer signed the outer transaction.
pub fn token_transfer_in<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    payer: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    invoke(
        &spl_token::instruction::transfer(
            token_program.key,
            source.key,
            vault.key,
            payer.key,
            &[],
            amount,
        )?,
        &[source.clone(), vault.clone(), payer.clone(), token_program.clone()],
    )
}

/// Push `amount` collateral from the vault to a destination token account,
/// signing as the vault authority PDA.
pub fn token_transfer_out<'a>(
    token_program: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    vault_authority: &AccountInfo<'a>,
    amount: u64,
    vault_authority_seeds: &[&[u8]],
) -> ProgramResult {
    invoke_signed(
        &spl_token::instruction::transfer(
            token_program.key,
            vault.key,
            destination.key,
            vault_authority.key,
            &[],
            amount,
        )?,
        &[
            vault.clone(),
            destination.clone(),
            vault_authority.clone(),
            token_program.clone(),
        ],
        &[vault_authority_seeds],
    )
}
