use solana_program::program_error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PremiumsError {
    /// Manager already initialized for this mint
    AlreadyInitialized = 0,
    /// Manager not initialized
    NotInitialized = 1,
    /// A required id/address/amount argument was the zero value
    ZeroArgument = 2,
    /// Value out of allowed range (share > 100%, empty batch, insane threshold)
    InvalidArgument = 3,
    /// Batched premiums and protocol accounts differ in length
    UnequalArrayLength = 4,
    /// Target protocol is not active
    ProtocolNotExists = 5,
    /// State-dependent precondition failed (duplicate add, force-removal
    /// threshold not met, claim in a disallowed configuration)
    InvalidConditions = 6,
    /// Caller is not the required agent/collaborator
    Unauthorized = 7,
    /// Requested amount exceeds the settled available quantity
    InsufficientBalance = 8,
    /// Arithmetic overflow
    Overflow = 9,
    /// Invalid PDA derivation
    InvalidPda = 10,
    /// Collateral mint mismatch
    InvalidMint = 11,
    /// Core collaborator already configured
    CoreAlreadySet = 12,
}

impl From<PremiumsError> for ProgramError {
    fn from(e: PremiumsError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
