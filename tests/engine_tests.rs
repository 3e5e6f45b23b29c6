//! Integration tests for splitting and merging archives through the engine.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;

use mboxcraft::engine::Engine;
use mboxcraft::error::MboxError;
use mboxcraft::model::mail::MailMessage;
use mboxcraft::partition::{
    DateGranularity, PartitionLabel, PartitionStrategy, UndatedPolicy,
};
use mboxcraft::progress::{NoProgress, Progress, ProgressLog, ProgressSink};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_fixture() -> Vec<MailMessage> {
    Engine::new()
        .load_archive(fixture("simple.mbox"), &NoProgress)
        .unwrap()
        .messages
}

fn record(sender: &str, body: &str) -> MailMessage {
    MailMessage {
        sender: sender.to_string(),
        recipient: None,
        subject: String::new(),
        date_raw: String::new(),
        date: None,
        body: body.to_string(),
        message_id: None,
        in_reply_to: None,
        references: None,
        attachments: None,
    }
}

fn synthetic_archive(n: usize) -> String {
    (0..n)
        .map(|i| {
            format!(
                "From user{i}@example.com Mon Jan  1 00:00:00 2024\n\
                 From: user{i}@example.com\n\
                 Subject: Item {i}\n\
                 Date: Mon, 01 Jan 2024 00:00:00 +0000\n\
                 \n\
                 Body {i}\n\n"
            )
        })
        .collect()
}

// ─── File-level merge ───────────────────────────────────────────────

#[test]
fn test_merge_files_matches_individual_parses() {
    let temp = assert_fs::TempDir::new().unwrap();
    let extra = temp.child("extra.mbox");
    extra.write_str(&synthetic_archive(3)).unwrap();
    let output = temp.child("merged.mbox");

    let engine = Engine::new();
    let inputs = vec![fixture("simple.mbox"), extra.path().to_path_buf()];
    let log = ProgressLog::new();
    let stats = engine.merge_files(&inputs, output.path(), &log).unwrap();

    assert_eq!(stats.inputs, 2);
    assert_eq!(stats.messages, 8);
    assert!(stats.output_size > 0);
    assert_eq!(log.len(), 2);
    output.assert(predicate::str::contains("Subject: Item 2"));

    let mut expected = load_fixture();
    expected.extend(engine.load_archive(extra.path(), &NoProgress).unwrap().messages);
    let merged = engine.load_archive(output.path(), &NoProgress).unwrap();
    assert_eq!(merged.messages, expected);
}

#[test]
fn test_merge_files_missing_input_creates_nothing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = temp.child("merged.mbox");
    let inputs = vec![fixture("simple.mbox"), temp.path().join("absent.mbox")];

    let err = Engine::new()
        .merge_files(&inputs, output.path(), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, MboxError::FileNotFound(_)));
    output.assert(predicate::path::missing());
}

#[test]
fn test_merge_files_into_one_of_its_inputs_is_refused() {
    let temp = assert_fs::TempDir::new().unwrap();
    let first = temp.child("first.mbox");
    first.write_str(&synthetic_archive(2)).unwrap();
    let inputs = vec![first.path().to_path_buf(), fixture("simple.mbox")];

    let err = Engine::new()
        .merge_files(&inputs, first.path(), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, MboxError::InvalidFormat(_)));
    first.assert(predicate::str::diff(synthetic_archive(2)));
}

// ─── Split, then record-level merge ─────────────────────────────────

#[test]
fn test_split_by_count_then_record_merge_keeps_every_record() {
    let engine = Engine::new();
    let original = load_fixture();

    for k in 1..=original.len() + 1 {
        let temp = assert_fs::TempDir::new().unwrap();
        let outputs = engine
            .split_to_dir(
                &original,
                &PartitionStrategy::ByCount(k),
                temp.path(),
                "simple",
                &NoProgress,
            )
            .unwrap();
        assert_eq!(outputs.len(), original.len().div_ceil(k), "k = {k}");
        temp.child("simple_part001.mbox").assert(predicate::path::exists());

        let mut reparsed = Vec::new();
        for output in &outputs {
            let report = engine.load_archive(&output.path, &NoProgress).unwrap();
            assert_eq!(report.messages.len(), output.messages, "k = {k}");
            reparsed.extend(report.messages);
        }
        assert_eq!(reparsed, original, "k = {k}");

        let merged_path = temp.child("merged.mbox");
        let refs: Vec<&MailMessage> = reparsed.iter().collect();
        let stats = engine
            .merge_messages(&refs, merged_path.path(), &NoProgress)
            .unwrap();
        assert_eq!(stats.messages, original.len(), "k = {k}");

        let merged = engine
            .load_archive(merged_path.path(), &NoProgress)
            .unwrap()
            .messages;
        assert_eq!(merged.len(), original.len(), "k = {k}");
        for msg in &original {
            assert!(merged.contains(msg), "k = {k}, missing: {}", msg.subject);
        }
        // Undated first, then chronological
        assert!(merged[0].date.is_none());
        assert!(merged[1..].windows(2).all(|w| w[0].date <= w[1].date));
    }
}

// ─── Partitioning ───────────────────────────────────────────────────

#[test]
fn test_partitions_cover_every_message() {
    let engine = Engine::new();
    let messages = load_fixture();
    let strategies = [
        PartitionStrategy::ByCount(2),
        PartitionStrategy::BySize(100),
        PartitionStrategy::ByDate {
            granularity: DateGranularity::Day,
            undated: UndatedPolicy::Bucket,
        },
        PartitionStrategy::ByDomain(vec!["example.org".into()]),
    ];

    for strategy in &strategies {
        let groups = engine.partition(&messages, strategy).unwrap();
        let total: usize = groups.iter().map(|g| g.messages.len()).sum();
        assert_eq!(total, messages.len(), "strategy: {strategy:?}");
        assert!(groups.iter().all(|g| !g.messages.is_empty()));
    }
}

#[test]
fn test_split_by_month_drops_undated() {
    let temp = assert_fs::TempDir::new().unwrap();
    let messages = load_fixture();
    let strategy = PartitionStrategy::ByDate {
        granularity: DateGranularity::Month,
        undated: UndatedPolicy::Drop,
    };

    let outputs = Engine::new()
        .split_to_dir(&messages, &strategy, temp.path(), "simple", &NoProgress)
        .unwrap();

    let labels: Vec<_> = outputs.iter().map(|o| o.label.clone()).collect();
    assert_eq!(
        labels,
        vec![
            PartitionLabel::Date("2024-01".into()),
            PartitionLabel::Date("2024-02".into()),
        ]
    );
    assert_eq!(outputs.iter().map(|o| o.messages).sum::<usize>(), 4);
    temp.child("simple_2024-02.mbox")
        .assert(predicate::str::contains("Subject: Meeting notes"));
    temp.child("simple_undated.mbox")
        .assert(predicate::path::missing());
}

#[test]
fn test_split_by_month_keeps_undated_bucket() {
    let temp = assert_fs::TempDir::new().unwrap();
    let messages = load_fixture();
    let strategy = PartitionStrategy::ByDate {
        granularity: DateGranularity::Month,
        undated: UndatedPolicy::Bucket,
    };

    let outputs = Engine::new()
        .split_to_dir(&messages, &strategy, temp.path(), "simple", &NoProgress)
        .unwrap();

    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[2].label, PartitionLabel::Undated);
    temp.child("simple_undated.mbox")
        .assert(predicate::str::contains("Subject: No date here"));
}

#[test]
fn test_split_by_domain_routes_unmatched_to_other() {
    let temp = assert_fs::TempDir::new().unwrap();
    let messages = load_fixture();

    let outputs = Engine::new()
        .split_to_dir(
            &messages,
            &PartitionStrategy::ByDomain(vec!["EXAMPLE.ORG".into()]),
            temp.path(),
            "simple",
            &NoProgress,
        )
        .unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].label, PartitionLabel::Domain("EXAMPLE.ORG".into()));
    assert_eq!(outputs[0].messages, 2);
    assert_eq!(outputs[1].label, PartitionLabel::Other);
    assert_eq!(outputs[1].messages, 3);
    temp.child("simple_other.mbox")
        .assert(predicate::str::contains("carol@lists.example.net"));
}

#[test]
fn test_size_bound_places_oversized_message_alone() {
    let messages = vec![
        record("a@x", &"a".repeat(10)),
        record("b@x", &"b".repeat(147)),
        record("c@x", &"c".repeat(10)),
        record("d@x", &"d".repeat(10)),
    ];
    assert_eq!(messages[1].estimated_size(), 150);

    let groups = Engine::new()
        .partition(&messages, &PartitionStrategy::BySize(100))
        .unwrap();

    let sizes: Vec<usize> = groups.iter().map(|g| g.messages.len()).collect();
    assert_eq!(sizes, vec![1, 1, 2]);
    assert_eq!(groups[1].messages[0].sender, "b@x");
    for group in groups.iter().filter(|g| g.messages.len() > 1) {
        assert!(group.estimated_size() <= 100);
    }
}

#[test]
fn test_zero_count_is_rejected() {
    let messages = load_fixture();
    let err = Engine::new()
        .partition(&messages, &PartitionStrategy::ByCount(0))
        .unwrap_err();
    assert!(matches!(err, MboxError::InvalidFormat(_)));
}

// ─── Cancellation ───────────────────────────────────────────────────

#[test]
fn test_cancel_after_thousand_messages() {
    let text = synthetic_archive(5000);
    let engine = Engine::new();
    let token = engine.cancel_token();
    let last_seen = Cell::new(0usize);

    let sink = |p: &Progress| {
        last_seen.set(p.completed);
        if p.completed == 1000 {
            token.cancel();
        }
    };

    let err = engine.parse_text(&text, &sink).unwrap_err();
    assert!(matches!(err, MboxError::Cancelled));
    assert_eq!(last_seen.get(), 1000);
}

#[test]
fn test_cancel_partway_through_thousand_message_archive() {
    let text = synthetic_archive(1000);
    let engine = Engine::new();
    let token = engine.cancel_token();
    let log = ProgressLog::new();

    let sink = |p: &Progress| {
        log.report(p);
        if p.completed == 400 {
            token.cancel();
        }
    };

    let err = engine.parse_text(&text, &sink).unwrap_err();
    assert!(matches!(err, MboxError::Cancelled));
    let last = log.last().expect("progress was reported");
    assert_eq!(last.total, 1000);
    assert!(last.completed < 1000);
    assert_eq!(last.completed, 400);
}
