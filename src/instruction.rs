use solana_program::program_error::ProgramError;

use crate::error::PremiumsError;

/// Instructions for the Aegis premiums program.
#[derive(Debug)]
pub enum PremiumsInstruction {
    /// Initialize the premiums manager for a collateral mint.
    /// Creates the manager PDA and the collateral vault.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Owner (pays rent, becomes operator)
    ///   1. `[writable]` Manager PDA (to be created)
    ///   2. `[]` Collateral mint
    ///   3. `[writable]` Vault token account (to be created, authority = vault_auth PDA)
    ///   4. `[]` Vault authority PDA
    ///   5. `[]` Token program
    ///   6. `[]` System program
    ///   7. `[]` Rent sysvar
    Initialize {
        min_balance: u64,
        min_seconds_of_coverage: u64,
    },

    /// Configure the core (staking pool) and non-staker collaborator
    /// addresses. One-time setup; premium claims fail until this runs.
    ///
    /// Accounts:
    ///   0. `[signer]` Owner
    ///   1. `[writable]` Manager PDA
    ///   2. `[]` Core address (receives staker premium claims)
    ///   3. `[]` Non-staker beneficiary address
    SetCore,

    /// Register a protocol. Permitted over an expired or live tombstone —
    /// the cooldown is informational, not a re-add lock.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Owner (pays rent for the protocol PDA)
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA (created if first add of this id)
    ///   3. `[]` Agent
    ///   4. `[]` System program
    ProtocolAdd {
        protocol_id: [u8; 32],
        coverage_id: [u8; 32],
        non_stakers_share: u64,
        coverage_amount: u64,
    },

    /// Update a protocol's coverage agreement and non-staker share.
    /// Settles first at the old rates; the premium itself is untouched.
    ///
    /// Accounts:
    ///   0. `[signer]` Owner
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ProtocolUpdate {
        coverage_id: [u8; 32],
        non_stakers_share: u64,
        coverage_amount: u64,
    },

    /// Remove a protocol: settle, zero the premium, return the remaining
    /// balance to the agent, tombstone the record.
    ///
    /// Accounts:
    ///   0. `[signer]` Owner
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ///   3. `[writable]` Vault token account
    ///   4. `[]` Vault authority PDA
    ///   5. `[writable]` Agent's collateral token account (receives balance)
    ///   6. `[]` Token program
    ProtocolRemove,

    /// Permissionless removal of a protocol whose settled balance fell below
    /// the minimum. The caller keeps the remaining balance as the incentive.
    ///
    /// Accounts:
    ///   0. `[signer]` Caller (arb)
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ///   3. `[writable]` Vault token account
    ///   4. `[]` Vault authority PDA
    ///   5. `[writable]` Caller's collateral token account (receives payout)
    ///   6. `[]` Token program
    ForceRemoveByBalance,

    /// Permissionless removal of a protocol whose coverage runway fell below
    /// the minimum. The caller's cut grows with the deficit; the rest goes
    /// to the agent.
    ///
    /// Accounts:
    ///   0. `[signer]` Caller (arb)
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ///   3. `[writable]` Vault token account
    ///   4. `[]` Vault authority PDA
    ///   5. `[writable]` Caller's collateral token account (receives payout)
    ///   6. `[writable]` Agent's collateral token account (receives residue)
    ///   7. `[]` Token program
    ForceRemoveBySecondsOfCoverage,

    /// Set one protocol's per-second premium. No-op (no event) when the
    /// value is unchanged; still settles.
    ///
    /// Accounts:
    ///   0. `[signer]` Owner
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    SetProtocolPremium { premium_per_second: u64 },

    /// Set several protocols' premiums atomically. Any failing element
    /// aborts the whole batch.
    ///
    /// Accounts:
    ///   0. `[signer]` Owner
    ///   1. `[writable]` Manager PDA
    ///   2.. `[writable]` One protocol PDA per premium, same order
    SetProtocolPremiums { premiums: Vec<u64> },

    /// Deposit collateral into a protocol's balance. Open to any holder.
    ///
    /// Accounts:
    ///   0. `[signer]` Depositor
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ///   3. `[writable]` Depositor's collateral token account (source)
    ///   4. `[writable]` Vault token account (destination)
    ///   5. `[]` Token program
    DepositProtocolBalance { amount: u64 },

    /// Withdraw from a protocol's settled balance. Agent only.
    ///
    /// Accounts:
    ///   0. `[signer]` Agent
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ///   3. `[writable]` Vault token account (source)
    ///   4. `[]` Vault authority PDA
    ///   5. `[writable]` Agent's collateral token account (destination)
    ///   6. `[]` Token program
    WithdrawProtocolBalance { amount: u64 },

    /// Hand a protocol's agent rights to a new address. Agent only.
    ///
    /// Accounts:
    ///   0. `[signer]` Current agent
    ///   1. `[]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ///   3. `[]` New agent
    TransferProtocolAgent,

    /// Pull from a protocol's non-staker pool to a receiver. Restricted to
    /// the configured non-staker collaborator.
    ///
    /// Accounts:
    ///   0. `[signer]` Non-staker collaborator
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Protocol PDA
    ///   3. `[writable]` Vault token account (source)
    ///   4. `[]` Vault authority PDA
    ///   5. `[writable]` Receiver's collateral token account (destination)
    ///   6. `[]` Token program
    NonStakersClaim { amount: u64 },

    /// Sweep the whole settled staker pool to the core. Core only; a zero
    /// pool still succeeds (the token transfer is skipped).
    ///
    /// Accounts:
    ///   0. `[signer]` Core
    ///   1. `[writable]` Manager PDA
    ///   2. `[writable]` Vault token account (source)
    ///   3. `[]` Vault authority PDA
    ///   4. `[writable]` Core's collateral token account (destination)
    ///   5. `[]` Token program
    ClaimPremiums,

    /// Owner updates the balance force-removal threshold.
    ///
    /// Accounts:
    ///   0. `[signer]` Owner
    ///   1. `[writable]` Manager PDA
    SetMinBalance { min_balance: u64 },

    /// Owner updates the coverage-runway force-removal threshold.
    ///
    /// Accounts:
    ///   0. `[signer]` Owner
    ///   1. `[writable]` Manager PDA
    SetMinSecondsOfCoverage { min_seconds_of_coverage: u64 },
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, ProgramError> {
    data.get(at..at + 8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .ok_or(ProgramError::InvalidInstructionData)
}

fn read_bytes32(data: &[u8], at: usize) -> Result<[u8; 32], ProgramError> {
    data.get(at..at + 32)
        .map(|b| b.try_into().unwrap())
        .ok_or(ProgramError::InvalidInstructionData)
}

impl PremiumsInstruction {
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = data.split_first().ok_or(ProgramError::InvalidInstructionData)?;

        match tag {
            0 => Ok(Self::Initialize {
                min_balance: read_u64(rest, 0)?,
                min_seconds_of_coverage: read_u64(rest, 8)?,
            }),
            1 => Ok(Self::SetCore),
            2 => Ok(Self::ProtocolAdd {
                protocol_id: read_bytes32(rest, 0)?,
                coverage_id: read_bytes32(rest, 32)?,
                non_stakers_share: read_u64(rest, 64)?,
                coverage_amount: read_u64(rest, 72)?,
            }),
            3 => Ok(Self::ProtocolUpdate {
                coverage_id: read_bytes32(rest, 0)?,
                non_stakers_share: read_u64(rest, 32)?,
                coverage_amount: read_u64(rest, 40)?,
            }),
            4 => Ok(Self::ProtocolRemove),
            5 => Ok(Self::ForceRemoveByBalance),
            6 => Ok(Self::ForceRemoveBySecondsOfCoverage),
            7 => Ok(Self::SetProtocolPremium {
                premium_per_second: read_u64(rest, 0)?,
            }),
            8 => {
                // count(2) + count * premium(8)
                let count = rest
                    .get(0..2)
                    .map(|b| u16::from_le_bytes(b.try_into().unwrap()))
                    .ok_or(ProgramError::InvalidInstructionData)?
                    as usize;
                if count == 0 {
                    return Err(PremiumsError::InvalidArgument.into());
                }
                let mut premiums = Vec::with_capacity(count);
                for i in 0..count {
                    premiums.push(read_u64(rest, 2 + i * 8)?);
                }
                Ok(Self::SetProtocolPremiums { premiums })
            }
            9 => Ok(Self::DepositProtocolBalance {
                amount: read_u64(rest, 0)?,
            }),
            10 => Ok(Self::WithdrawProtocolBalance {
                amount: read_u64(rest, 0)?,
            }),
            11 => Ok(Self::TransferProtocolAgent),
            12 => Ok(Self::NonStakersClaim {
                amount: read_u64(rest, 0)?,
            }),
            13 => Ok(Self::ClaimPremiums),
            14 => Ok(Self::SetMinBalance {
                min_balance: read_u64(rest, 0)?,
            }),
            15 => Ok(Self::SetMinSecondsOfCoverage {
                min_seconds_of_coverage: read_u64(rest, 0)?,
            }),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }
}
