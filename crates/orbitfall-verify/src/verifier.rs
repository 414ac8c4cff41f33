//! Replay verification of submitted scores.
//!
//! [`Verifier::verify`] runs a fixed sequence of checks and stops at the first
//! failure:
//!
//! 1. player name: codepoint filter, phrase tables, reservation credential
//! 2. token: issued, not yet used, issued for the submitted version
//! 3. token consumption (before replay, so a rejected session cannot be
//!    resubmitted with adjusted claims)
//! 4. log decoding and replay with the token's seed
//! 5. the replay must reach game over and reproduce every claimed number
//!
//! A name failure leaves the token untouched so the player can pick another
//! name and submit again.

use orbitfall_sim::replay::{replay, ReplayLog, ReplayOptions, ReplayOutcome};

use crate::names::{validate_player_name, NameTable};
use crate::registry::RulesetRegistry;
use crate::reservations::NameReservations;
use crate::submission::{ClaimedStats, GameRecord, SaveGameRequest};
use crate::token::{unix_millis, MemoryTokenStore, TokenRecord, TokenStore};
use crate::{NameError, ProtocolViolation, VerifyError};

pub struct Verifier<S = MemoryTokenStore> {
    rulesets: RulesetRegistry,
    tokens: S,
    names: NameTable,
    reservations: NameReservations,
    options: ReplayOptions,
}

impl<S: TokenStore> Verifier<S> {
    pub fn new(rulesets: RulesetRegistry, tokens: S) -> Self {
        Self {
            rulesets,
            tokens,
            names: NameTable::new(),
            reservations: NameReservations::new(),
            options: ReplayOptions::default(),
        }
    }

    pub fn with_name_table(mut self, names: NameTable) -> Self {
        self.names = names;
        self
    }

    pub fn with_reservations(mut self, reservations: NameReservations) -> Self {
        self.reservations = reservations;
        self
    }

    /// Replay options used for every verification, e.g. to record
    /// checkpoints for later inspection.
    pub fn with_replay_options(mut self, options: ReplayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn rulesets(&self) -> &RulesetRegistry {
        &self.rulesets
    }

    pub fn tokens(&self) -> &S {
        &self.tokens
    }

    pub fn reservations_mut(&mut self) -> &mut NameReservations {
        &mut self.reservations
    }

    /// Issue a token for a new game under `version`.
    pub fn issue_token(&mut self, version: &str) -> Result<TokenRecord, VerifyError> {
        if !self.rulesets.contains(version) {
            return Err(ProtocolViolation::UnknownVersion(version.to_owned()).into());
        }
        Ok(self.tokens.issue(version))
    }

    /// Every name check a submission goes through, without touching tokens.
    pub fn check_name(&self, name: &str, credential: Option<&str>) -> Result<(), NameError> {
        validate_player_name(name)?;
        self.names.check(name)?;
        self.reservations.authorize(name, credential)
    }

    /// Verify a submission and produce the record to persist.
    ///
    /// # Errors
    ///
    /// [`VerifyError::Name`] for a refused name, [`VerifyError::Protocol`]
    /// when the submission breaks the token contract or the replay disagrees
    /// with a claim, and [`VerifyError::Sim`] for a log that does not decode
    /// or replay.
    pub fn verify(&mut self, request: &SaveGameRequest) -> Result<GameRecord, VerifyError> {
        let result = self.run_checks(request);
        match &result {
            Ok(record) => tracing::info!(
                token_id = record.token_id,
                player = %record.player_name,
                score = record.score,
                level = record.level_reached,
                "accepted submission"
            ),
            Err(err) => tracing::warn!(
                token_id = request.token_id,
                player = %request.player_name,
                claimed_score = request.score,
                error = %err,
                "rejected submission"
            ),
        }
        result
    }

    fn run_checks(&mut self, request: &SaveGameRequest) -> Result<GameRecord, VerifyError> {
        self.check_name(&request.player_name, request.player_name_auth.as_deref())?;

        let token = self.tokens.lookup(request.token_id)?;
        if token.version != request.version {
            return Err(ProtocolViolation::VersionMismatch {
                issued: token.version,
                submitted: request.version.clone(),
            }
            .into());
        }
        let ruleset = self
            .rulesets
            .get(&token.version)
            .ok_or_else(|| ProtocolViolation::UnknownVersion(token.version.clone()))?;

        self.tokens.consume(token.token_id)?;

        let log = ReplayLog::from_wire(&request.log)?;
        let outcome = replay(ruleset, token.random_seed, &log, self.options.clone())?;
        tracing::debug!(
            token_id = token.token_id,
            ticks = outcome.ticks,
            events = outcome.events_applied,
            hash = %outcome.final_hash,
            "replay finished"
        );

        check_claims(request, &outcome)?;
        Ok(record_for(request, &token, &outcome))
    }
}

fn check_claims(request: &SaveGameRequest, outcome: &ReplayOutcome) -> Result<(), ProtocolViolation> {
    if !outcome.completed {
        return Err(ProtocolViolation::ReplayIncomplete {
            ticks: outcome.ticks,
        });
    }

    let stats = &outcome.stats;
    compare("score", request.score, stats.score)?;
    compare("level", request.level.into(), stats.level.into())?;

    if let Some(claimed) = request.stats {
        let replayed = ClaimedStats::from(stats);
        compare("duration", claimed.duration_ms, replayed.duration_ms)?;
        compare(
            "shots fired",
            claimed.shots_fired.into(),
            replayed.shots_fired.into(),
        )?;
        compare(
            "shots hit",
            claimed.shots_hit.into(),
            replayed.shots_hit.into(),
        )?;
        compare(
            "asteroids destroyed",
            claimed.asteroids_destroyed.into(),
            replayed.asteroids_destroyed.into(),
        )?;
        compare(
            "UFOs destroyed",
            claimed.ufos_destroyed.into(),
            replayed.ufos_destroyed.into(),
        )?;
    }
    Ok(())
}

fn compare(field: &'static str, claimed: u64, replayed: u64) -> Result<(), ProtocolViolation> {
    if claimed == replayed {
        Ok(())
    } else {
        Err(ProtocolViolation::Mismatch {
            field,
            claimed,
            replayed,
        })
    }
}

fn record_for(request: &SaveGameRequest, token: &TokenRecord, outcome: &ReplayOutcome) -> GameRecord {
    let stats = &outcome.stats;
    GameRecord {
        token_id: token.token_id,
        player_name: request.player_name.clone(),
        score: stats.score,
        level_reached: stats.level,
        duration_ms: stats.duration_ms,
        shots_fired: stats.shots_fired,
        large_ufos_destroyed: stats.large_ufos_destroyed,
        small_ufos_destroyed: stats.small_ufos_destroyed,
        asteroids_destroyed: stats.asteroids_destroyed,
        accuracy: stats.accuracy(),
        game_log: request.log.clone(),
        game_version: token.version.clone(),
        time_added: unix_millis(),
        deleted: false,
    }
}
