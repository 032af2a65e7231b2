//! Aegis Premiums — per-protocol premium streaming and balance accounting.
//!
//! Covered protocols fund a continuously-draining balance that pays for
//! security coverage by the second. The program keeps one global ledger of
//! staker premiums plus a record per protocol, settled lazily: state is only
//! touched when an instruction lands, and every read replays the elapsed
//! time since the last touch. Premium revenue splits between the staking
//! pool (claimed in bulk by the core program) and a non-staker beneficiary
//! (claimed per protocol).
//!
//! Architecture:
//! - PremiumsManager PDA (per mint) carries the global rate/pool and the
//!   collaborator addresses (owner, core, non-stakers)
//! - ProtocolAccount PDA (per protocol id) carries balance, premium rate,
//!   share split, coverage history, and the removal tombstone
//! - Every mutating instruction settles global-then-protocol before applying
//!   its change, so rate changes land exactly on the settlement boundary
//! - A protocol that cannot cover its accrued debt is clamped to zero and
//!   reported via an AccountingError log — never a panic, never a revert
//! - Underfunded protocols are removed permissionlessly for an incentive:
//!   the whole dust balance below the minimum, or a cut that grows the
//!   longer a below-runway protocol is left unremoved
//!
//! Instructions:
//!   0 - Initialize:                    Create manager + collateral vault
//!   1 - SetCore:                       Wire core + non-staker collaborators (once)
//!   2 - ProtocolAdd:                   Register a protocol (re-add over tombstone ok)
//!   3 - ProtocolUpdate:                New coverage agreement / non-staker share
//!   4 - ProtocolRemove:                Settle, refund agent, tombstone
//!   5 - ForceRemoveByBalance:          Permissionless removal below min balance
//!   6 - ForceRemoveBySecondsOfCoverage: Permissionless removal below min runway
//!   7 - SetProtocolPremium:            Change one drain rate
//!   8 - SetProtocolPremiums:           Change many drain rates atomically
//!   9 - DepositProtocolBalance:        Fund a protocol
//!  10 - WithdrawProtocolBalance:       Agent pulls unspent balance
//!  11 - TransferProtocolAgent:         Hand over agent rights
//!  12 - NonStakersClaim:               Non-staker beneficiary pulls its pool
//!  13 - ClaimPremiums:                 Core sweeps the staker pool
//!  14 - SetMinBalance:                 Tune the balance removal threshold
//!  15 - SetMinSecondsOfCoverage:      Tune the runway removal threshold

pub mod cpi;
pub mod error;
pub mod instruction;
pub mod math;
pub mod processor;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;
