//! Single-use game tokens.
//!
//! A token binds a random seed to the ruleset version a session must be
//! played under. The client receives both when a game starts; the verifier
//! looks the token up again when the score comes back and consumes it, so a
//! recorded session can be submitted at most once.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::ThreadRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use orbitfall_codec::{decode_int_array, encode_int_array};

use crate::{ProtocolViolation, VerifyError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token_id: u64,
    pub random_seed: [u8; 16],
    pub version: String,
    /// Issue time, milliseconds since the Unix epoch.
    pub time_added: u64,
}

impl TokenRecord {
    /// The seed as sent to the client.
    pub fn seed_wire(&self) -> String {
        encode_seed(&self.random_seed)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Where issued tokens live between game start and submission.
pub trait TokenStore {
    /// Issue a fresh token for `version`.
    fn issue(&mut self, version: &str) -> TokenRecord;

    /// Find an issued, unconsumed token.
    fn lookup(&self, token_id: u64) -> Result<TokenRecord, ProtocolViolation>;

    /// Mark a token used. Fails if it is unknown or already used.
    fn consume(&mut self, token_id: u64) -> Result<TokenRecord, ProtocolViolation>;
}

#[derive(Debug, Clone)]
struct Entry {
    record: TokenRecord,
    consumed: bool,
}

/// In-process [`TokenStore`]. Token ids are sequential from 1; seeds come
/// from `R`.
#[derive(Debug)]
pub struct MemoryTokenStore<R = ThreadRng> {
    rng: R,
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

impl MemoryTokenStore<ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl Default for MemoryTokenStore<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> MemoryTokenStore<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }

    /// Number of issued tokens, consumed or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn outstanding(&self) -> usize {
        self.entries.values().filter(|e| !e.consumed).count()
    }
}

impl<R: RngCore> TokenStore for MemoryTokenStore<R> {
    fn issue(&mut self, version: &str) -> TokenRecord {
        let mut random_seed = [0u8; 16];
        self.rng.fill_bytes(&mut random_seed);

        let record = TokenRecord {
            token_id: self.next_id,
            random_seed,
            version: version.to_owned(),
            time_added: unix_millis(),
        };
        self.next_id += 1;
        self.entries.insert(
            record.token_id,
            Entry {
                record: record.clone(),
                consumed: false,
            },
        );
        tracing::debug!(token_id = record.token_id, version, "issued token");
        record
    }

    fn lookup(&self, token_id: u64) -> Result<TokenRecord, ProtocolViolation> {
        match self.entries.get(&token_id) {
            None => Err(ProtocolViolation::UnknownToken(token_id)),
            Some(entry) if entry.consumed => Err(ProtocolViolation::TokenConsumed(token_id)),
            Some(entry) => Ok(entry.record.clone()),
        }
    }

    fn consume(&mut self, token_id: u64) -> Result<TokenRecord, ProtocolViolation> {
        let entry = self
            .entries
            .get_mut(&token_id)
            .ok_or(ProtocolViolation::UnknownToken(token_id))?;
        if entry.consumed {
            return Err(ProtocolViolation::TokenConsumed(token_id));
        }
        entry.consumed = true;
        Ok(entry.record.clone())
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Seed wire form
// ---------------------------------------------------------------------------

/// Encode a seed as four little-endian `u32` words.
pub fn encode_seed(seed: &[u8; 16]) -> String {
    let words: Vec<u64> = seed
        .chunks_exact(4)
        .map(|c| u64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
        .collect();
    encode_int_array(&words)
}

pub fn decode_seed(text: &str) -> Result<[u8; 16], VerifyError> {
    let words = decode_int_array(text)?;
    if words.len() != 4 {
        return Err(VerifyError::MalformedSeed(format!(
            "expected 4 words, got {}",
            words.len()
        )));
    }

    let mut seed = [0u8; 16];
    for (chunk, &word) in seed.chunks_exact_mut(4).zip(&words) {
        let word = u32::try_from(word)
            .map_err(|_| VerifyError::MalformedSeed(format!("word {word} exceeds 32 bits")))?;
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn store() -> MemoryTokenStore<Pcg32> {
        MemoryTokenStore::with_rng(Pcg32::seed_from_u64(5))
    }

    #[test]
    fn issued_tokens_have_distinct_ids_and_seeds() {
        let mut store = store();
        let a = store.issue("1.0");
        let b = store.issue("1.0");
        assert_eq!(a.token_id, 1);
        assert_eq!(b.token_id, 2);
        assert_ne!(a.random_seed, b.random_seed);
        assert_eq!(store.len(), 2);
        assert_eq!(store.outstanding(), 2);
    }

    #[test]
    fn tokens_are_single_use() {
        let mut store = store();
        let token = store.issue("1.0");

        assert_eq!(store.lookup(token.token_id), Ok(token.clone()));
        assert_eq!(store.consume(token.token_id), Ok(token.clone()));
        assert_eq!(
            store.consume(token.token_id),
            Err(ProtocolViolation::TokenConsumed(token.token_id))
        );
        assert_eq!(
            store.lookup(token.token_id),
            Err(ProtocolViolation::TokenConsumed(token.token_id))
        );
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn unknown_tokens_are_refused() {
        let mut store = store();
        assert_eq!(store.lookup(99), Err(ProtocolViolation::UnknownToken(99)));
        assert_eq!(store.consume(99), Err(ProtocolViolation::UnknownToken(99)));
    }

    #[test]
    fn same_rng_seed_issues_same_seeds() {
        let mut a = store();
        let mut b = store();
        assert_eq!(a.issue("1.0").random_seed, b.issue("1.0").random_seed);
    }

    #[test]
    fn seed_wire_form_uses_little_endian_words() {
        let mut seed = [0u8; 16];
        seed[0] = 1; // word 0 = 1
        seed[5] = 1; // word 1 = 256
        let wire = encode_seed(&seed);
        assert_eq!(decode_int_array(&wire).unwrap(), vec![1, 256, 0, 0]);
        assert_eq!(decode_seed(&wire).unwrap(), seed);
    }

    #[test]
    fn full_width_seed_survives_the_wire() {
        let token = store().issue("1.0");
        assert_eq!(decode_seed(&token.seed_wire()).unwrap(), token.random_seed);
        assert_eq!(decode_seed(&encode_seed(&[0xFF; 16])).unwrap(), [0xFF; 16]);
    }

    #[test]
    fn malformed_seeds_are_rejected() {
        let three = encode_int_array(&[1, 2, 3]);
        assert!(matches!(
            decode_seed(&three),
            Err(VerifyError::MalformedSeed(_))
        ));

        let wide = encode_int_array(&[1, 2, 3, 1 << 32]);
        assert!(matches!(
            decode_seed(&wide),
            Err(VerifyError::MalformedSeed(_))
        ));

        assert!(matches!(decode_seed("!"), Err(VerifyError::Codec(_))));
    }

    #[test]
    fn token_record_serializes_camel_case() {
        let token = store().issue("1.0");
        let json = serde_json::to_value(&token).unwrap();
        assert!(json.get("tokenId").is_some());
        assert!(json.get("randomSeed").is_some());
        assert!(json.get("timeAdded").is_some());
    }
}
