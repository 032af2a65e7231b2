//! Error code uniqueness and completeness tests.

use aegis_premiums::error::PremiumsError;
use solana_program::program_error::ProgramError;

#[test]
fn test_all_error_codes_unique() {
    let codes: Vec<u32> = vec![
        PremiumsError::AlreadyInitialized as u32,
        PremiumsError::NotInitialized as u32,
        PremiumsError::ZeroArgument as u32,
        PremiumsError::InvalidArgument as u32,
        PremiumsError::UnequalArrayLength as u32,
        PremiumsError::ProtocolNotExists as u32,
        PremiumsError::InvalidConditions as u32,
        PremiumsError::Unauthorized as u32,
        PremiumsError::InsufficientBalance as u32,
        PremiumsError::Overflow as u32,
        PremiumsError::InvalidPda as u32,
        PremiumsError::InvalidMint as u32,
        PremiumsError::CoreAlreadySet as u32,
    ];

    // Check uniqueness
    let mut sorted = codes.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), codes.len(), "Duplicate error codes detected!");

    // Check sequential (0..12)
    for (i, &code) in codes.iter().enumerate() {
        assert_eq!(code, i as u32, "Error code {} expected {}, got {}", i, i, code);
    }
}

#[test]
fn test_error_to_program_error() {
    let err: ProgramError = PremiumsError::Unauthorized.into();
    match err {
        ProgramError::Custom(code) => assert_eq!(code, 7),
        _ => panic!("Expected Custom error"),
    }
}

#[test]
fn test_all_errors_are_custom() {
    let errors = [
        PremiumsError::AlreadyInitialized,
        PremiumsError::NotInitialized,
        PremiumsError::ZeroArgument,
        PremiumsError::InvalidArgument,
        PremiumsError::UnequalArrayLength,
        PremiumsError::ProtocolNotExists,
        PremiumsError::InvalidConditions,
        PremiumsError::Unauthorized,
        PremiumsError::InsufficientBalance,
        PremiumsError::Overflow,
        PremiumsError::InvalidPda,
        PremiumsError::InvalidMint,
        PremiumsError::CoreAlreadySet,
    ];
    for e in errors {
        match ProgramError::from(e) {
            ProgramError::Custom(_) => {}
            other => panic!("Expected Custom, got {:?}", other),
        }
    }
}
