//! Orbitfall Verify -- server-side admission of submitted scores.
//!
//! A score reaches the leaderboard only after the verifier has re-run the
//! session that produced it. The flow is:
//!
//! 1. The server issues a [`TokenRecord`](token::TokenRecord) carrying a fresh
//!    random seed and the ruleset version the client must play under.
//! 2. The client plays with that seed while recording its control log, then
//!    submits a [`SaveGameRequest`](submission::SaveGameRequest).
//! 3. [`Verifier::verify`](verifier::Verifier::verify) checks the player name,
//!    consumes the token, replays the log with the token's seed, and produces
//!    a [`GameRecord`](submission::GameRecord) only if the replay reproduces
//!    every claimed number.
//!
//! # Quick Start
//!
//! ```
//! use orbitfall_verify::prelude::*;
//!
//! assert!(validate_player_name("Ann").is_ok());
//! assert_eq!(
//!     validate_player_name("   ").unwrap_err(),
//!     NameError::OnlySpaces,
//! );
//! ```

#![deny(unsafe_code)]

pub mod names;
pub mod registry;
pub mod reservations;
pub mod submission;
pub mod token;
pub mod verifier;

use orbitfall_codec::CodecError;
use orbitfall_sim::SimError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// What a rejected player is told for every failure that is not about their
/// name. Verifier internals are never echoed back.
pub const COULD_NOT_VERIFY: &str = "Could not verify score";

/// Why a player name was refused. The `Display` text is shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The submitted name was not valid UTF-8 text.
    #[error("Name must be text")]
    NotText,

    #[error("Name must be at least {min} characters long")]
    TooShort { min: usize },

    #[error("Name must be at most {max} characters long")]
    TooLong { max: usize },

    #[error("Name contains a character that is not allowed: {0:?}")]
    InvalidCharacter(char),

    #[error("Name must contain something other than spaces")]
    OnlySpaces,

    /// Refused by a blacklist entry in a name table.
    #[error("This name is not allowed")]
    NotAllowed,

    /// The name is reserved and the request did not prove ownership.
    #[error("This name is reserved")]
    Reserved,
}

/// A submission that broke the replay-verification contract. Always a hard
/// reject; nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("token {0} was never issued")]
    UnknownToken(u64),

    #[error("token {0} was already used")]
    TokenConsumed(u64),

    /// The request names a different ruleset version than its token.
    #[error("submission claims version '{submitted}' but token was issued for '{issued}'")]
    VersionMismatch { issued: String, submitted: String },

    /// The token's ruleset version is not loaded in this verifier.
    #[error("no ruleset loaded for version '{0}'")]
    UnknownVersion(String),

    /// The replay hit the duration limit (or ran out of input before the game
    /// started) without reaching game over.
    #[error("replay stopped after {ticks} ticks without reaching game over")]
    ReplayIncomplete { ticks: u64 },

    /// A claimed number differs from the replayed one.
    #[error("claimed {field} {claimed} but replay produced {replayed}")]
    Mismatch {
        field: &'static str,
        claimed: u64,
        replayed: u64,
    },
}

/// Errors produced while verifying a submission.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid input: {0}")]
    Name(#[from] NameError),

    /// The log or ruleset could not be used by the simulation.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// A token seed in wire form failed to decode.
    #[error("invalid input: malformed seed: {0}")]
    MalformedSeed(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
}

impl VerifyError {
    /// The message safe to show the submitting player.
    pub fn user_message(&self) -> String {
        match self {
            VerifyError::Name(err) => err.to_string(),
            _ => COULD_NOT_VERIFY.to_owned(),
        }
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, VerifyError::Protocol(_))
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::names::{
        is_valid_player_name_code_point, validate_player_name, validate_player_name_bytes,
        NameAction, NameRule, NameTable, MAX_PLAYER_NAME_LENGTH, MIN_PLAYER_NAME_LENGTH,
    };
    pub use crate::registry::RulesetRegistry;
    pub use crate::reservations::NameReservations;
    pub use crate::submission::{ClaimedStats, GameRecord, SaveGameRequest};
    pub use crate::token::{decode_seed, encode_seed, MemoryTokenStore, TokenRecord, TokenStore};
    pub use crate::verifier::Verifier;
    pub use crate::{NameError, ProtocolViolation, VerifyError, COULD_NOT_VERIFY};
}
