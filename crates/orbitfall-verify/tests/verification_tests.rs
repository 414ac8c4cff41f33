//! End-to-end tests for score verification.
//!
//! Games are played with a [`Session`] using the seed from an issued token,
//! then submitted to a [`Verifier`] the way a client would submit them.
//!
//! Most tests use a "sudden death" ruleset: a tiny playfield with one huge
//! asteroid and a single life, so every game ends on tick 1 with the ship
//! rammed by the asteroid, scoring 20 at level 1. The "gauntlet" ruleset
//! plays out a full game instead: one life on the normal field, with a small
//! UFO that aims straight at the ship arriving after a few seconds.

use orbitfall_sim::prelude::*;
use orbitfall_sim::session::SessionResult;
use orbitfall_verify::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;

const SUDDEN_DEATH: &str = "sudden-death";
const GAUNTLET: &str = "gauntlet";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn sudden_death_ruleset() -> Ruleset {
    let mut ruleset = Ruleset {
        version: SUDDEN_DEATH.into(),
        max_duration_ms: 60_000,
        world: Bounds {
            width: 100.0,
            height: 100.0,
        },
        ..Ruleset::default()
    };
    ruleset.lives.starting = 1;
    ruleset.ship.spawn_clearance = 0.0;
    ruleset.asteroids.initial_count = 1;
    ruleset.asteroids.max_count = 1;
    ruleset.asteroids.large.radius = 60.0;
    ruleset
}

fn gauntlet_ruleset() -> Ruleset {
    let mut ruleset = Ruleset {
        version: GAUNTLET.into(),
        max_duration_ms: 600_000,
        ..Ruleset::default()
    };
    ruleset.lives.starting = 1;
    ruleset.lives.extra_life_every = 0;
    ruleset.ship.spawn_clearance = 250.0;
    ruleset.bullets.ufo_lifetime_ms = 3_000;
    ruleset.ufos.spawn_min_ms = 4_000;
    ruleset.ufos.spawn_max_ms = 4_000;
    ruleset.ufos.lifetime_ms = 30_000;
    ruleset.ufos.small_chance = 1.0;
    ruleset.ufos.aim_spread = 0.0;
    ruleset.ufos.fire_interval_ms = 300;
    ruleset.ufos.bullet_speed = 400.0;
    ruleset
}

fn verifier() -> Verifier<MemoryTokenStore<Pcg32>> {
    init_logging();
    let mut rulesets = RulesetRegistry::with_default();
    rulesets.insert(sudden_death_ruleset()).unwrap();
    rulesets.insert(gauntlet_ruleset()).unwrap();
    Verifier::new(rulesets, MemoryTokenStore::with_rng(Pcg32::seed_from_u64(77)))
}

/// Play a sudden-death game with `token`'s seed and build the submission.
fn play(token: &TokenRecord, player_name: &str) -> SaveGameRequest {
    let mut session = Session::new(sudden_death_ruleset(), token.random_seed).unwrap();
    session.press(Control::Start, true).unwrap();
    session.advance(0.1);
    assert!(session.is_over());

    let result = session.finish();
    SaveGameRequest {
        player_name: player_name.to_owned(),
        player_name_auth: None,
        score: result.stats.score,
        level: result.stats.level,
        token_id: token.token_id,
        log: result.log.to_wire(),
        version: token.version.clone(),
        stats: Some(ClaimedStats::from(&result.stats)),
    }
}

/// Play a gauntlet game to the end: a short thrust, one hyperspace jump,
/// then turning and tapping fire until the ship is shot down.
fn play_gauntlet(token: &TokenRecord) -> SessionResult {
    let mut session = Session::new(gauntlet_ruleset(), token.random_seed).unwrap();
    session.press(Control::Start, true).unwrap();
    session.press(Control::Start, false).unwrap();

    for frame in 0..40_000u32 {
        // Uneven frame times, like a real render loop.
        session.advance(if frame % 3 == 0 { 0.021 } else { 0.013 });
        if session.is_over() {
            break;
        }
        match frame {
            4 => session.press(Control::Thrust, true).unwrap(),
            13 => session.press(Control::Thrust, false).unwrap(),
            100 => session.press(Control::Hyperspace, true).unwrap(),
            102 => session.press(Control::Hyperspace, false).unwrap(),
            _ => match (frame % 30, frame % 120) {
                (8, _) => session.press(Control::Fire, true).unwrap(),
                (14, _) => session.press(Control::Fire, false).unwrap(),
                (_, 20) => session.set_analog(Control::Turn, 600).unwrap(),
                (_, 60) => session.set_analog(Control::Turn, -600).unwrap(),
                (_, 100) => session.set_analog(Control::Turn, 0).unwrap(),
                _ => false,
            },
        };
    }
    assert!(session.is_over());
    session.finish()
}

// ---------------------------------------------------------------------------
// Acceptance
// ---------------------------------------------------------------------------

#[test]
fn full_game_with_every_control_is_accepted() {
    let mut verifier = verifier();
    let token = verifier.issue_token(GAUNTLET).unwrap();
    let result = play_gauntlet(&token);
    assert!(result.stats.shots_fired > 0);
    assert!(result.stats.duration_ms > 1_000);

    let controls: Vec<Control> = result.log.events().iter().map(|e| e.control).collect();
    for control in [
        Control::Thrust,
        Control::Turn,
        Control::Fire,
        Control::Hyperspace,
    ] {
        assert!(controls.contains(&control), "{control:?} never recorded");
    }

    let request = SaveGameRequest {
        player_name: "Ann".into(),
        player_name_auth: None,
        score: result.stats.score,
        level: result.stats.level,
        token_id: token.token_id,
        log: result.log.to_wire(),
        version: token.version.clone(),
        stats: Some(ClaimedStats::from(&result.stats)),
    };
    let received: SaveGameRequest =
        serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();

    let record = verifier.verify(&received).unwrap();
    assert!(record.shots_fired > 0);
    assert_eq!(record.score, result.stats.score);
    assert_eq!(record.level_reached, result.stats.level);
    assert_eq!(record.duration_ms, result.stats.duration_ms);
    assert_eq!(record.shots_fired, result.stats.shots_fired);
    assert_eq!(record.asteroids_destroyed, result.stats.asteroids_destroyed);
    assert_eq!(record.accuracy, result.stats.accuracy());
}

#[test]
fn full_game_with_inflated_hits_is_rejected() {
    let mut verifier = verifier();
    let token = verifier.issue_token(GAUNTLET).unwrap();
    let result = play_gauntlet(&token);
    let mut claimed = ClaimedStats::from(&result.stats);
    claimed.shots_hit = claimed.shots_fired + 1;

    let request = SaveGameRequest {
        player_name: "Ann".into(),
        player_name_auth: None,
        score: result.stats.score,
        level: result.stats.level,
        token_id: token.token_id,
        log: result.log.to_wire(),
        version: token.version.clone(),
        stats: Some(claimed),
    };
    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::Mismatch {
            field: "shots hit",
            ..
        })
    ));
}

#[test]
fn honest_game_is_accepted() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = play(&token, "Ann");

    let record = verifier.verify(&request).unwrap();
    assert_eq!(record.token_id, token.token_id);
    assert_eq!(record.player_name, "Ann");
    assert_eq!(record.score, 20);
    assert_eq!(record.level_reached, 1);
    assert_eq!(record.duration_ms, 16);
    assert_eq!(record.asteroids_destroyed, 1);
    assert_eq!(record.shots_fired, 0);
    assert_eq!(record.accuracy, 0.0);
    assert_eq!(record.game_version, SUDDEN_DEATH);
    assert_eq!(record.game_log, request.log);
    assert!(!record.deleted);
}

#[test]
fn submission_survives_json_transport() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = play(&token, "Дмитрий");

    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"playerName\""));
    let received: SaveGameRequest = serde_json::from_str(&json).unwrap();
    assert!(verifier.verify(&received).is_ok());
}

#[test]
fn claimed_stats_are_optional() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = SaveGameRequest {
        stats: None,
        ..play(&token, "Ann")
    };
    assert!(verifier.verify(&request).is_ok());
}

// ---------------------------------------------------------------------------
// Protocol violations
// ---------------------------------------------------------------------------

#[test]
fn token_cannot_be_used_twice() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = play(&token, "Ann");

    verifier.verify(&request).unwrap();
    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::TokenConsumed(id)) if id == token.token_id
    ));
    assert_eq!(err.user_message(), COULD_NOT_VERIFY);
}

#[test]
fn unknown_token_is_rejected() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = SaveGameRequest {
        token_id: token.token_id + 100,
        ..play(&token, "Ann")
    };
    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::UnknownToken(_))
    ));
}

#[test]
fn inflated_score_is_rejected() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = SaveGameRequest {
        score: 21,
        ..play(&token, "Ann")
    };

    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::Mismatch {
            field: "score",
            claimed: 21,
            replayed: 20,
        })
    ));
    assert_eq!(err.user_message(), COULD_NOT_VERIFY);
}

#[test]
fn failed_verification_burns_the_token() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let honest = play(&token, "Ann");
    let inflated = SaveGameRequest {
        level: 2,
        ..honest.clone()
    };

    assert!(verifier.verify(&inflated).is_err());
    let err = verifier.verify(&honest).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::TokenConsumed(_))
    ));
}

#[test]
fn inflated_stats_are_rejected() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let mut request = play(&token, "Ann");
    if let Some(stats) = request.stats.as_mut() {
        stats.ufos_destroyed = 3;
    }

    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::Mismatch {
            field: "UFOs destroyed",
            ..
        })
    ));
}

#[test]
fn version_must_match_the_token() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = SaveGameRequest {
        version: Ruleset::default().version,
        ..play(&token, "Ann")
    };

    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::VersionMismatch { .. })
    ));
    // Nothing was replayed, so the token is still outstanding.
    assert_eq!(verifier.tokens().outstanding(), 1);
}

#[test]
fn tokens_are_only_issued_for_loaded_versions() {
    let mut verifier = verifier();
    let err = verifier.issue_token("9.9").unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::UnknownVersion(_))
    ));
}

#[test]
fn game_that_never_ends_is_rejected() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    // Never pressing start leaves the game waiting forever.
    let request = SaveGameRequest {
        score: 0,
        level: 0,
        log: ReplayLog::new().to_wire(),
        stats: None,
        ..play(&token, "Ann")
    };

    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::Protocol(ProtocolViolation::ReplayIncomplete { .. })
    ));
}

#[test]
fn malformed_log_is_invalid_input() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = SaveGameRequest {
        log: "1,1,0,!".into(),
        ..play(&token, "Ann")
    };

    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(err, VerifyError::Sim(_)));
    assert_eq!(err.user_message(), COULD_NOT_VERIFY);
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

#[test]
fn all_space_name_is_rejected_without_burning_the_token() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = play(&token, "   ");

    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(err, VerifyError::Name(NameError::OnlySpaces)));
    assert_eq!(err.user_message(), NameError::OnlySpaces.to_string());

    // Same game, better name.
    let renamed = SaveGameRequest {
        player_name: "Ann".into(),
        ..request
    };
    assert!(verifier.verify(&renamed).is_ok());
}

#[test]
fn overlong_name_is_rejected() {
    let mut verifier = verifier();
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();
    let request = play(&token, &"a".repeat(MAX_PLAYER_NAME_LENGTH + 1));

    let err = verifier.verify(&request).unwrap_err();
    assert!(matches!(err, VerifyError::Name(NameError::TooLong { .. })));
}

#[test]
fn blacklisted_name_is_rejected() {
    let mut table = NameTable::new();
    table.push("admin", NameAction::BlacklistExactMatch);
    let mut verifier = verifier().with_name_table(table);
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();

    let err = verifier.verify(&play(&token, "Admin")).unwrap_err();
    assert!(matches!(err, VerifyError::Name(NameError::NotAllowed)));
    assert_eq!(err.user_message(), "This name is not allowed");
}

#[test]
fn reserved_name_needs_its_credential() {
    let mut reservations = NameReservations::new();
    reservations.reserve("Ace", "hunter2");
    let mut verifier = verifier().with_reservations(reservations);
    let token = verifier.issue_token(SUDDEN_DEATH).unwrap();

    let anonymous = play(&token, "Ace");
    let err = verifier.verify(&anonymous).unwrap_err();
    assert!(matches!(err, VerifyError::Name(NameError::Reserved)));

    let owner = SaveGameRequest {
        player_name_auth: Some("hunter2".into()),
        ..anonymous
    };
    assert!(verifier.verify(&owner).is_ok());
}
