//! Integration tests for batch execution and the interactive session
//!
//! Uses an in-memory member directory that evaluates filter clauses the
//! way the API does (`eq` on the normalized name, `like` as substring).

use async_trait::async_trait;
use pkid_common::names::split_batch;
use pkid_common::InputName;
use pkid_lookup::console::Repl;
use pkid_lookup::error::GatewayError;
use pkid_lookup::export::parse_csv;
use pkid_lookup::models::{MatchMode, MemberRecord};
use pkid_lookup::services::envelope::EnvelopeShape;
use pkid_lookup::services::query_builder::{FilterOperator, FilterRequest};
use pkid_lookup::services::{BatchRunner, FilterStrategy, MemberDirectory, MemberPage, QueryOptions};
use std::sync::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeDirectory {
    members: Vec<MemberRecord>,
    /// Filter values that fail with a transport error
    unreachable: Vec<&'static str>,
    /// Filter values answered with an unrecognized body
    garbled: Vec<&'static str>,
    /// Cancel this token after the given number of calls
    cancel_after: Option<(usize, CancellationToken)>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeDirectory {
    fn with_members(members: &[(&str, &str)]) -> Self {
        Self {
            members: members
                .iter()
                .map(|(id, name)| MemberRecord::new(*id, *name))
                .collect(),
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MemberDirectory for FakeDirectory {
    async fn fetch_page(&self, request: &FilterRequest) -> Result<MemberPage, GatewayError> {
        let clauses = &request.filters.filter_groups[0].field_filters;
        let values: Vec<String> = clauses.iter().map(|c| c.filter_value.clone()).collect();
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(values.clone());
            calls.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if call_number >= *after {
                token.cancel();
            }
        }

        if values.iter().any(|v| self.unreachable.contains(&v.as_str())) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        if values.iter().any(|v| self.garbled.contains(&v.as_str())) {
            return Ok(MemberPage::default());
        }

        let records = self
            .members
            .iter()
            .filter(|m| {
                let name = pkid_common::names::normalize(&m.display_name);
                clauses.iter().any(|c| match c.filter_operator {
                    FilterOperator::Eq => name == c.filter_value,
                    FilterOperator::Like => name.contains(&c.filter_value),
                })
            })
            .cloned()
            .collect();

        Ok(MemberPage {
            records,
            shape: Some(EnvelopeShape::KeyedList),
        })
    }
}

fn names(raw: &[&str]) -> Vec<InputName> {
    raw.iter().filter_map(|n| InputName::new(n)).collect()
}

fn options(mode: MatchMode) -> QueryOptions {
    QueryOptions {
        match_mode: mode,
        ..QueryOptions::default()
    }
}

fn roster() -> FakeDirectory {
    FakeDirectory::with_members(&[
        ("m1", "Alice Smith"),
        ("m2", "Carol Jones"),
        ("m9", "Bob Lee"),
        ("m10", "Hsiuting Chou"),
    ])
}

#[tokio::test]
async fn test_batched_exact_lookup() {
    let runner = BatchRunner::new(roster(), options(MatchMode::Exact), FilterStrategy::BatchedOr);

    let report = runner
        .run(&names(&["alice smith", "nobody here"]), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(runner.directory().call_count(), 1);
    assert_eq!(report.hit_count(), 1);
    assert_eq!(report.outcome.found[0].member_id, "m1");
    assert_eq!(report.outcome.not_found, names(&["NOBODY HERE"]));
}

#[tokio::test]
async fn test_contains_first_input_wins_across_strategies() {
    for strategy in [FilterStrategy::BatchedOr, FilterStrategy::PerName] {
        let runner = BatchRunner::new(roster(), options(MatchMode::Contains), strategy);
        let report = runner
            .run(&names(&["lee", "bob lee"]), &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(report.hit_count(), 1, "strategy {}", strategy);
        assert_eq!(report.outcome.found[0].search_name.as_str(), "LEE");
        assert_eq!(report.outcome.not_found, names(&["BOB LEE"]));
    }
}

#[tokio::test]
async fn test_per_name_failure_is_isolated() {
    let directory = FakeDirectory {
        unreachable: vec!["CAROL JONES"],
        ..roster()
    };
    let runner = BatchRunner::new(directory, options(MatchMode::Exact), FilterStrategy::PerName);

    let mut progress = Vec::new();
    let report = runner
        .run(
            &names(&["alice smith", "carol jones", "bob lee"]),
            &CancellationToken::new(),
            |p| progress.push((p.processed, p.total)),
        )
        .await
        .unwrap();

    assert_eq!(progress, [(1, 3), (2, 3), (3, 3)]);
    assert_eq!(report.hit_count(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, GatewayError::Transport(_)));
    assert_eq!(report.outcome.not_found, names(&["CAROL JONES"]));
}

#[tokio::test]
async fn test_batched_failure_fails_whole_batch() {
    let directory = FakeDirectory {
        unreachable: vec!["CAROL JONES"],
        ..roster()
    };
    let runner = BatchRunner::new(directory, options(MatchMode::Exact), FilterStrategy::BatchedOr);

    let result = runner
        .run(&names(&["alice smith", "carol jones"]), &CancellationToken::new(), |_| {})
        .await;
    assert!(matches!(result, Err(GatewayError::Transport(_))));
}

#[tokio::test]
async fn test_shape_mismatch_is_a_warning() {
    let directory = FakeDirectory {
        garbled: vec!["BOB LEE"],
        ..roster()
    };
    let runner = BatchRunner::new(directory, options(MatchMode::Exact), FilterStrategy::PerName);

    let report = runner
        .run(&names(&["alice smith", "bob lee"]), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("BOB LEE"));
    assert_eq!(report.outcome.not_found, names(&["BOB LEE"]));
}

#[tokio::test]
async fn test_cancellation_between_names() {
    let cancel = CancellationToken::new();
    let directory = FakeDirectory {
        cancel_after: Some((2, cancel.clone())),
        ..roster()
    };
    let runner = BatchRunner::new(directory, options(MatchMode::Exact), FilterStrategy::PerName);

    let report = runner
        .run(
            &names(&["alice smith", "bob lee", "carol jones", "hsiuting chou"]),
            &cancel,
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(runner.directory().call_count(), 2);
    assert_eq!(report.requests_sent, 2);
    assert_eq!(report.hit_count(), 2);
    assert_eq!(report.skipped, names(&["CAROL JONES", "HSIUTING CHOU"]));
    assert_eq!(report.outcome.not_found, names(&["CAROL JONES", "HSIUTING CHOU"]));
    assert!(report.summary().ends_with("2 skipped"));
}

#[tokio::test]
async fn test_batch_is_capped_and_deduplicated() {
    let mut text = String::new();
    for i in 0..60 {
        text.push_str(&format!("name {}\n", i));
    }
    text.push_str("name 0\n");
    let batch = split_batch(&text, 50);
    assert_eq!(batch.len(), 50);

    let runner = BatchRunner::new(roster(), options(MatchMode::Exact), FilterStrategy::BatchedOr);
    let report = runner.run(&batch, &CancellationToken::new(), |_| {}).await.unwrap();

    let calls = runner.directory().calls.lock().unwrap().clone();
    assert_eq!(calls[0].len(), 50);
    assert_eq!(report.input_count, 50);
    assert_eq!(report.outcome.not_found.len(), 50);
}

#[tokio::test]
async fn test_session_marks_survive_searches_and_export() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("out.csv");

    let script = format!(
        "add alice smith\nadd bob lee\nsearch\nmark 2\nsearch\nshow\nexport {}\nclear\nshow\nquit\n",
        csv_path.display()
    );

    let runner = BatchRunner::new(roster(), options(MatchMode::Exact), FilterStrategy::BatchedOr);
    let mut repl = Repl::new(runner).without_interrupt_watch();
    let mut out = Vec::new();
    repl.run(script.as_bytes(), &mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    let copied: Vec<&str> = text.lines().filter(|l| l.contains("[copied]")).collect();
    // Marked after the first search; shown by the second search and `show`
    assert_eq!(copied.len(), 2, "{}", text);
    assert!(copied.iter().all(|l| l.contains("m9")));
    assert!(text.contains("Marked m9 as copied."));
    assert!(text.contains("2 names, 2 hits"));
    assert!(text.contains("Copied flags cleared."));
    assert!(repl.session().copies.is_empty());

    let exported = std::fs::read_to_string(&csv_path).unwrap();
    assert!(exported.starts_with('\u{feff}'));
    let rows = parse_csv(&exported).unwrap();
    let triples: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|r| (r.search_name.as_str(), r.member_name.as_str(), r.member_id.as_str()))
        .collect();
    assert_eq!(
        triples,
        [("ALICE SMITH", "ALICE SMITH", "m1"), ("BOB LEE", "BOB LEE", "m9")]
    );
}

#[tokio::test]
async fn test_session_mode_switch_and_errors() {
    let runner = BatchRunner::new(roster(), options(MatchMode::Exact), FilterStrategy::BatchedOr);
    let mut repl = Repl::new(runner).without_interrupt_watch();
    let mut out = Vec::new();

    let script: &[u8] = b"search\nbogus\nmode contains\nadd chou\nsearch\n";
    repl.run(script, &mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("No names entered."));
    assert!(text.contains("unknown command 'bogus'"));
    assert!(text.contains("Match mode: contains"));
    assert!(text.contains("HSIUTING CHOU"));
    assert_eq!(repl.session().mode, MatchMode::Contains);
    assert_eq!(repl.session().last_found().len(), 1);
}
