//! Player-name admission.
//!
//! Two layers gate what can appear on the leaderboard:
//!
//! - [`validate_player_name`]: length bounds, a fixed codepoint whitelist and
//!   an all-spaces check. Clients run the same function for instant feedback;
//!   the verifier runs it again and is the one that counts.
//! - [`NameTable`]: operator-maintained phrase lists consulted only after the
//!   first layer passes.
//!
//! ```
//! use orbitfall_verify::names::{validate_player_name, NameAction, NameTable};
//!
//! let mut table = NameTable::new();
//! table.push("bad", NameAction::BlacklistContains);
//! table.push("Badger", NameAction::WhitelistExactMatch);
//!
//! assert!(validate_player_name("Badger").is_ok());
//! assert!(table.check("BADGER").is_ok());
//! assert!(table.check("badly").is_err());
//! ```

use serde::{Deserialize, Serialize};

use crate::NameError;

pub const MIN_PLAYER_NAME_LENGTH: usize = 1;
pub const MAX_PLAYER_NAME_LENGTH: usize = 16;

/// Inclusive codepoint ranges a player name may draw from.
const PLAYER_NAME_CODE_POINTS: [(u32, u32); 7] = [
    (0x0020, 0x0020), // space
    (0x0027, 0x0027), // apostrophe
    (0x0030, 0x0039), // digits
    (0x0041, 0x005A), // A-Z
    (0x0061, 0x007A), // a-z
    (0x00C0, 0x017F), // Latin-1 supplement letters, Latin extended-A
    (0x0400, 0x04FF), // Cyrillic
];

// ---------------------------------------------------------------------------
// Codepoint filter
// ---------------------------------------------------------------------------

pub fn is_valid_player_name_code_point(code: u32) -> bool {
    PLAYER_NAME_CODE_POINTS
        .iter()
        .any(|&(low, high)| (low..=high).contains(&code))
}

/// Check a player name against the length bounds and codepoint whitelist.
///
/// Length is counted in codepoints. Checks run in a fixed order so client and
/// server always report the same reason.
pub fn validate_player_name(name: &str) -> Result<(), NameError> {
    let length = name.chars().count();
    if length < MIN_PLAYER_NAME_LENGTH {
        return Err(NameError::TooShort {
            min: MIN_PLAYER_NAME_LENGTH,
        });
    }
    if length > MAX_PLAYER_NAME_LENGTH {
        return Err(NameError::TooLong {
            max: MAX_PLAYER_NAME_LENGTH,
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|&c| !is_valid_player_name_code_point(u32::from(c)))
    {
        return Err(NameError::InvalidCharacter(bad));
    }
    if name.chars().all(|c| c == ' ') {
        return Err(NameError::OnlySpaces);
    }
    Ok(())
}

/// [`validate_player_name`] for a name that arrived as raw bytes.
pub fn validate_player_name_bytes(bytes: &[u8]) -> Result<&str, NameError> {
    let name = std::str::from_utf8(bytes).map_err(|_| NameError::NotText)?;
    validate_player_name(name)?;
    Ok(name)
}

// ---------------------------------------------------------------------------
// Phrase tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameAction {
    /// Admit a name equal to the phrase, even if a blacklist entry matches.
    WhitelistExactMatch,
    /// Refuse a name equal to the phrase.
    BlacklistExactMatch,
    /// Refuse any name containing the phrase.
    BlacklistContains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRule {
    pub phrase: String,
    pub action: NameAction,
}

/// Case-insensitive phrase lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameTable {
    rules: Vec<NameRule>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of `{ "phrase": ..., "action": ... }` rules.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let rules: Vec<NameRule> = serde_json::from_str(text)?;
        let mut table = Self::new();
        for rule in rules {
            table.push(&rule.phrase, rule.action);
        }
        Ok(table)
    }

    /// Add a rule. Blank phrases are ignored.
    pub fn push(&mut self, phrase: &str, action: NameAction) {
        let phrase = phrase.trim().to_lowercase();
        if phrase.is_empty() {
            return;
        }
        self.rules.push(NameRule { phrase, action });
    }

    pub fn rules(&self) -> &[NameRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Admit or refuse `name`. Whitelist entries are consulted first.
    pub fn check(&self, name: &str) -> Result<(), NameError> {
        let name = name.trim().to_lowercase();
        let exact = |action| {
            self.rules
                .iter()
                .any(|r| r.action == action && r.phrase == name)
        };

        if exact(NameAction::WhitelistExactMatch) {
            return Ok(());
        }
        if exact(NameAction::BlacklistExactMatch) {
            return Err(NameError::NotAllowed);
        }
        let contains = self
            .rules
            .iter()
            .any(|r| r.action == NameAction::BlacklistContains && name.contains(&r.phrase));
        if contains {
            return Err(NameError::NotAllowed);
        }
        Ok(())
    }
}
