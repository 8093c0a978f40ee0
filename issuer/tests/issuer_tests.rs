use clap::Parser;
use tally_credit::{SECS_PER_DAY, TokenCodec, UNACTIVATED_START_AT};
use tally_issuer::{Args, run};

fn invoke(argv: &[&str]) -> anyhow::Result<(String, String)> {
    let args = Args::try_parse_from(argv)?;
    let mut out = Vec::new();
    let mut diag = Vec::new();
    run(&args, &mut out, &mut diag)?;
    Ok((String::from_utf8(out)?, String::from_utf8(diag)?))
}

fn strip_prefix(line: &str) -> &str {
    line.trim().strip_prefix("encrypted=").expect("key-file line")
}

#[test]
fn generate_prints_key_file_line() {
    let (out, diag) = invoke(&[
        "tally-issuer",
        "--version-tag",
        "v3",
        "generate",
        "--points",
        "500",
        "--start-date",
        "2025.01.01",
        "--end-date",
        "2025-01-31",
    ])
    .unwrap();

    let record = TokenCodec::embedded().decode(strip_prefix(&out)).unwrap();
    assert_eq!(record.version, "v3");
    assert_eq!(record.points, 500);
    assert!(record.end_at > record.start_at);
    assert!(diag.contains("v3"));
}

#[test]
fn generate_rejects_reversed_range() {
    let result = invoke(&[
        "tally-issuer",
        "generate",
        "--start-date",
        "2025.02.01",
        "--end-date",
        "2025.01.01",
    ]);
    assert!(result.is_err());
}

#[test]
fn generate_rejects_bad_date() {
    let result = invoke(&[
        "tally-issuer",
        "generate",
        "--start-date",
        "01/02/2025",
        "--end-date",
        "2025.01.01",
    ]);
    assert!(result.is_err());
}

#[test]
fn generate_deferred_is_unactivated() {
    let (out, _) = invoke(&[
        "tally-issuer",
        "generate-deferred",
        "--points",
        "10",
        "--days",
        "7",
    ])
    .unwrap();

    let record = TokenCodec::embedded().decode(strip_prefix(&out)).unwrap();
    assert_eq!(record.start_at, UNACTIVATED_START_AT);
    assert_eq!(record.duration_secs(), 7 * SECS_PER_DAY);
}

#[test]
fn batch_writes_one_distinct_token_per_line() {
    let (out, diag) = invoke(&[
        "tally-issuer",
        "batch-generate",
        "--points",
        "20",
        "--days",
        "3",
        "--count",
        "5",
    ])
    .unwrap();

    let tokens: Vec<&str> = out.lines().collect();
    assert_eq!(tokens.len(), 5);
    let unique: std::collections::HashSet<_> = tokens.iter().collect();
    assert_eq!(unique.len(), 5);

    let codec = TokenCodec::embedded();
    for token in tokens {
        assert_eq!(codec.decode(token).unwrap().points, 20);
    }
    assert!(diag.contains("generated 5 tokens"));
}

#[test]
fn non_positive_arguments_are_rejected() {
    for argv in [
        &["tally-issuer", "generate-deferred", "--points", "0"][..],
        &["tally-issuer", "generate-deferred", "--days", "0"][..],
        &["tally-issuer", "batch-generate", "--count", "0"][..],
        &[
            "tally-issuer",
            "generate",
            "--points",
            "-1",
            "--start-date",
            "2025.01.01",
            "--end-date",
            "2025.01.02",
        ][..],
    ] {
        assert!(invoke(argv).is_err(), "{argv:?}");
    }
}

#[test]
fn version_file_is_used_when_no_tag_given() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("VERSION");
    std::fs::write(&path, "\u{feff}v42\n").unwrap();

    let (out, _) = invoke(&[
        "tally-issuer",
        "--version-file",
        path.to_str().unwrap(),
        "generate-deferred",
    ])
    .unwrap();

    let record = TokenCodec::embedded().decode(strip_prefix(&out)).unwrap();
    assert_eq!(record.version, "v42");
}

#[test]
fn inspect_prints_record_json() {
    let (out, _) = invoke(&[
        "tally-issuer",
        "--version-tag",
        "v5",
        "generate-deferred",
        "--points",
        "15",
    ])
    .unwrap();
    let token = strip_prefix(&out).to_string();

    let (json, diag) = invoke(&["tally-issuer", "inspect", &token]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], "v5");
    assert_eq!(value["points"], 15);
    assert!(diag.contains("not activated"));
}

#[test]
fn inspect_rejects_garbage() {
    assert!(invoke(&["tally-issuer", "inspect", "not-a-token"]).is_err());
}

#[test]
fn overflowing_day_count_is_rejected() {
    let days = (i64::MAX / SECS_PER_DAY).to_string();
    let result = invoke(&["tally-issuer", "generate-deferred", "--days", &days]);
    assert!(result.is_err());
}
