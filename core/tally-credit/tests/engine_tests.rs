mod common;

use common::{T0, mint, mint_active, test_config, test_engine, test_issuer};
use pretty_assertions::assert_eq;
use tally_credit::{
    COST_PER_DOWNLOAD, CreditEngine, CreditError, CreditRecord, LEDGER_FILE_NAME, SECS_PER_DAY,
    UNACTIVATED_START_AT, VersionGate,
};
use tempfile::TempDir;

// ── check ────────────────────────────────────────────────────────

#[test]
fn check_returns_record_for_valid_token() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(20, T0 - 10, T0 + 100);

    let outcome = engine.check_at(&token, 5, T0).unwrap();
    assert_eq!(outcome.record.points, 20);
    assert_eq!(outcome.window.end_at, T0 + 100);
    assert_eq!(outcome.expires_in, 100);
}

#[test]
fn check_previews_activation_without_committing() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = test_issuer("v1").generate_deferred(10, 7).unwrap();

    let outcome = engine.check_at(&token, 5, T0).unwrap();
    assert_eq!(outcome.window.start_at, T0);
    assert_eq!(outcome.window.end_at, T0 + 7 * SECS_PER_DAY);
    assert_eq!(outcome.record.start_at, UNACTIVATED_START_AT);

    // Checking neither retires nor changes the token.
    engine.check_at(&token, 5, T0 + 1).unwrap();
}

#[test]
fn check_rejects_empty_token() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    assert!(matches!(engine.check_at("", 5, T0), Err(CreditError::EmptyToken)));
}

#[test]
fn expired_one_second_ago_is_rejected_and_retired() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(20, T0 - 100, T0 - 1);

    let err = engine.check_at(&token, 5, T0).unwrap_err();
    match &err {
        CreditError::Expired { end_at, record } => {
            assert_eq!(*end_at, T0 - 1);
            assert_eq!(record.points, 20);
        }
        other => panic!("expected Expired, got {other:?}"),
    }
    assert!(engine.ledger().is_recorded(&token).unwrap());
    assert!(matches!(
        engine.check_at(&token, 5, T0),
        Err(CreditError::AlreadyConsumed)
    ));
}

#[test]
fn window_end_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(20, T0 - 100, T0);

    assert!(engine.check_at(&token, 5, T0).is_ok());
    assert!(engine.consume_at(&token, 5, T0).is_ok());
}

#[test]
fn insufficient_balance_is_not_retired_while_positive() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(3, T0 - 10, T0 + 100);

    let err = engine.check_at(&token, 5, T0).unwrap_err();
    assert!(matches!(
        err,
        CreditError::InsufficientBalance { points: 3, cost: 5, .. }
    ));
    assert_eq!(err.record().map(|r| r.points), Some(3));
    assert!(!engine.ledger().is_recorded(&token).unwrap());

    // A cheaper operation still works with the same token.
    assert!(engine.check_at(&token, 1, T0).is_ok());
}

#[test]
fn zero_balance_is_retired() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(0, T0 - 10, T0 + 100);

    assert!(matches!(
        engine.check_at(&token, 1, T0),
        Err(CreditError::InsufficientBalance { points: 0, cost: 1, .. })
    ));
    assert!(engine.ledger().is_recorded(&token).unwrap());
}

#[test]
fn version_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = CreditEngine::new(test_config(dir.path()).with_version(VersionGate::fixed("v2")));
    let token = test_issuer("v1").generate_deferred(10, 7).unwrap();

    match engine.check_at(&token, 5, T0) {
        Err(CreditError::VersionMismatch {
            record_version,
            current_version,
        }) => {
            assert_eq!(record_version, "v1");
            assert_eq!(current_version, "v2");
        }
        other => panic!("expected VersionMismatch, got {other:?}"),
    }
    assert!(!engine.ledger().is_recorded(&token).unwrap());
}

#[test]
fn non_positive_cost_uses_default() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(4, T0 - 10, T0 + 100);

    assert!(matches!(
        engine.check_at(&token, 0, T0),
        Err(CreditError::InsufficientBalance { cost: COST_PER_DOWNLOAD, .. })
    ));
    assert!(matches!(
        engine.check_at(&token, -3, T0),
        Err(CreditError::InsufficientBalance { cost: COST_PER_DOWNLOAD, .. })
    ));
}

#[test]
fn unreadable_ledger_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join(LEDGER_FILE_NAME)).unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(10, T0 - 10, T0 + 100);

    let err = engine.check_at(&token, 5, T0).unwrap_err();
    assert!(matches!(err, CreditError::LedgerIo(_)));
    assert!(err.is_retryable());
}

#[test]
fn detached_engine_still_validates() {
    let engine = CreditEngine::new(
        tally_credit::EngineConfig::default()
            .with_key(common::test_key())
            .with_version(VersionGate::fixed("v1")),
    );
    let token = mint_active(10, T0 - 10, T0 + 100);
    let (next, outcome) = engine.consume_at(&token, 5, T0).unwrap();
    assert_eq!(outcome.record.points, 5);
    assert_eq!(engine.inspect(&next).unwrap().points, 5);
}

// ── consume ──────────────────────────────────────────────────────

#[test]
fn first_consume_activates_deferred_token() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = test_issuer("v1").generate_deferred(10, 7).unwrap();
    let first_use = T0 + 100;

    let (next, outcome) = engine.consume_at(&token, 5, first_use).unwrap();
    let record = engine.inspect(&next).unwrap();

    assert_eq!(record.end_at - record.start_at, 7 * SECS_PER_DAY);
    assert!((record.start_at - first_use).abs() <= 1);
    assert_eq!(record.points, 5);
    assert_eq!(outcome.record, record);
}

#[test]
fn activation_is_not_repeated() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = test_issuer("v1").generate_deferred(10, 7).unwrap();

    let (second, _) = engine.consume_at(&token, 2, T0).unwrap();
    let (third, _) = engine.consume_at(&second, 2, T0 + 3_600).unwrap();
    let record = engine.inspect(&third).unwrap();

    assert_eq!(record.start_at, T0);
    assert_eq!(record.end_at, T0 + 7 * SECS_PER_DAY);
    assert_eq!(record.points, 6);
}

#[test]
fn exhausting_token_then_reusing_it_is_already_consumed() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(5, T0 - 10, T0 + 100);

    let (next, outcome) = engine.consume_at(&token, 5, T0).unwrap();
    assert_eq!(outcome.record.points, 0);
    assert_eq!(engine.inspect(&next).unwrap().points, 0);

    assert!(matches!(
        engine.consume_at(&token, 5, T0),
        Err(CreditError::AlreadyConsumed)
    ));
    // The retired string still decodes to its original record.
    assert_eq!(engine.inspect(&token).unwrap().points, 5);
}

#[test]
fn consume_retires_input_even_with_balance_left() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(100, T0 - 10, T0 + 100);

    let (next, _) = engine.consume_at(&token, 5, T0).unwrap();
    assert!(engine.ledger().is_recorded(&token).unwrap());
    assert!(!engine.ledger().is_recorded(&next).unwrap());
    assert!(matches!(
        engine.check_at(&token, 1, T0),
        Err(CreditError::AlreadyConsumed)
    ));
    assert_eq!(engine.check_at(&next, 5, T0).unwrap().record.points, 95);
}

#[test]
fn exhausted_replacement_is_retired_on_next_use() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(5, T0 - 10, T0 + 100);

    let (next, _) = engine.consume_at(&token, 5, T0).unwrap();
    assert!(matches!(
        engine.consume_at(&next, 1, T0),
        Err(CreditError::InsufficientBalance { points: 0, .. })
    ));
    assert!(engine.ledger().is_recorded(&next).unwrap());
}

#[test]
fn failed_consume_leaves_token_usable() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint_active(3, T0 - 10, T0 + 100);

    assert!(engine.consume_at(&token, 5, T0).is_err());
    let (_, outcome) = engine.consume_at(&token, 3, T0).unwrap();
    assert_eq!(outcome.record.points, 0);
}

#[test]
fn consume_keeps_version() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(dir.path());
    let token = mint(&CreditRecord::new("v1", 10, T0 - 10, T0 + 100));
    let (next, _) = engine.consume_at(&token, 1, T0).unwrap();
    assert_eq!(engine.inspect(&next).unwrap().version, "v1");
}

#[test]
fn independent_engines_have_independent_ledgers() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let token = mint_active(10, T0 - 10, T0 + 100);

    test_engine(a.path()).consume_at(&token, 5, T0).unwrap();
    assert!(test_engine(b.path()).check_at(&token, 5, T0).is_ok());
}
