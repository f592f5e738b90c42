use super::traceback::{format_traces, shared_prefix_len, shorten_path, SHARED_FRAMES_MARKER};
use super::*;
use crate::types::Field;

fn frame(function: &str, file: &str, line: u32) -> Frame {
    Frame {
        function: function.to_string(),
        file: file.to_string(),
        line,
    }
}

fn trace(frames: &[(&str, u32)]) -> Trace {
    Trace {
        frames: frames
            .iter()
            .map(|(function, line)| frame(function, "src/extraction/adapter.rs", *line))
            .collect(),
    }
}

// =============================================================================
// shared_prefix_len
// =============================================================================

#[test]
fn test_identical_traces_keep_last_frame() {
    let t = trace(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    let traces = [t.frames.as_slice(), t.frames.as_slice()];
    assert_eq!(shared_prefix_len(&traces), 3);
}

#[test]
fn test_divergence_index_is_shared_length() {
    let a = trace(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    let b = trace(&[("a", 1), ("b", 2), ("x", 9), ("d", 4)]);
    assert_eq!(shared_prefix_len(&[a.frames.as_slice(), b.frames.as_slice()]), 2);

    let c = trace(&[("z", 1), ("b", 2)]);
    assert_eq!(shared_prefix_len(&[a.frames.as_slice(), c.frames.as_slice()]), 0);
}

#[test]
fn test_shared_prefix_capped_by_shortest_trace() {
    let long = trace(&[("a", 1), ("b", 2), ("c", 3)]);
    let short = trace(&[("a", 1), ("b", 2)]);
    assert_eq!(shared_prefix_len(&[long.frames.as_slice(), short.frames.as_slice()]), 1);
}

#[test]
fn test_single_trace_and_degenerate_input() {
    let one = trace(&[("a", 1), ("b", 2)]);
    assert_eq!(shared_prefix_len(&[one.frames.as_slice()]), 1);
    assert_eq!(shared_prefix_len(&[]), 0);

    let empty = Trace::default();
    assert_eq!(shared_prefix_len(&[empty.frames.as_slice(), one.frames.as_slice()]), 0);
}

#[test]
fn test_line_difference_breaks_sharing() {
    let a = trace(&[("a", 1), ("b", 2)]);
    let b = trace(&[("a", 7), ("b", 2)]);
    assert_eq!(shared_prefix_len(&[a.frames.as_slice(), b.frames.as_slice()]), 0);
}

// =============================================================================
// shorten_path
// =============================================================================

#[test]
fn test_shorten_path_through_marker() {
    assert_eq!(
        shorten_path("/home/me/code/recipe-harvest/src/db/mod.rs", "recipe-harvest"),
        ".../recipe-harvest/src/db/mod.rs"
    );
    assert_eq!(
        shorten_path("recipe-harvest/src/lib.rs", "recipe-harvest"),
        ".../recipe-harvest/src/lib.rs"
    );
}

#[test]
fn test_shorten_path_without_marker() {
    assert_eq!(shorten_path("src/extraction/adapter.rs", "recipe-harvest"), "src/extraction/adapter.rs");
    assert_eq!(
        shorten_path("/home/me/.cargo/registry/serde_json-1.0/src/de.rs", "recipe-harvest"),
        ".../de.rs"
    );
    assert_eq!(shorten_path(r"C:\Users\me\src\x.rs", "recipe-harvest"), ".../x.rs");
}

#[test]
fn test_marker_must_be_a_whole_directory() {
    assert_eq!(
        shorten_path("/opt/not-recipe-harvest/src/a.rs", "recipe-harvest"),
        ".../a.rs"
    );
}

// =============================================================================
// FailureIndex
// =============================================================================

#[test]
fn test_index_groups_by_host_method_kind() {
    let index = FailureIndex::new();
    let t = trace(&[("a", 1)]);

    index.record("https://a.example/1", Some(Field::Title), FailureKind::SchemaMissing, "m", t.clone());
    index.record("https://a.example/2", Some(Field::Title), FailureKind::SchemaMissing, "m", t.clone());
    index.record("https://a.example/3", Some(Field::Title), FailureKind::TypeMismatch, "m", t.clone());
    index.record("https://a.example/4", Some(Field::Yields), FailureKind::SchemaMissing, "m", t.clone());
    index.record("https://b.example/1", None, FailureKind::Unparseable, "m", t);

    assert_eq!(index.len(), 5);
    let clusters = index.clusters();
    assert_eq!(clusters.len(), 4);
    assert_eq!(clusters[0].host, "a.example");
    assert_eq!(clusters[0].method, Some(Field::Title));
    assert_eq!(clusters[0].kind, FailureKind::SchemaMissing);
    assert_eq!(clusters[0].failures.len(), 2);
    assert_eq!(clusters[3].host, "b.example");
    assert_eq!(clusters[3].method_name(), GENERAL_PARSING_ERROR);

    index.clear();
    assert!(index.is_empty());
}

#[test]
fn test_host_falls_back_to_raw_url() {
    let index = FailureIndex::new();
    index.record("no-host-here", Some(Field::Title), FailureKind::SchemaMissing, "m", Trace::default());
    index.record("data:text/html,hi", Some(Field::Title), FailureKind::SchemaMissing, "m", Trace::default());

    let hosts: Vec<String> = index.clusters().into_iter().map(|c| c.host).collect();
    assert_eq!(hosts.len(), 2);
    assert!(hosts.contains(&"no-host-here".to_string()));
    assert!(hosts.contains(&"data:text/html,hi".to_string()));
}

#[test]
fn test_concurrent_records_are_all_kept() {
    let index = std::sync::Arc::new(FailureIndex::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let index = index.clone();
            std::thread::spawn(move || {
                for j in 0..25 {
                    index.record(
                        &format!("https://h{}.example/{}", i % 2, j),
                        Some(Field::Image),
                        FailureKind::ElementMissing,
                        "m",
                        Trace::capture("worker"),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.len(), 200);
    assert_eq!(index.clusters().len(), 2);
}

#[test]
fn test_trace_capture_records_call_site() {
    let line = line!() + 1;
    let t = Trace::capture("here").within("outer");

    assert_eq!(t.len(), 2);
    assert_eq!(t.frames[0].function, "outer");
    assert_eq!(t.frames[1].function, "here");
    assert_eq!(t.frames[1].line, line);
    assert!(t.frames[1].file.ends_with("tests/mod.rs"));
}

// =============================================================================
// format_traces
// =============================================================================

fn failure(url: &str, frames: &[(&str, u32)], message: &str) -> ParsingFailure {
    ParsingFailure {
        url: url.to_string(),
        kind: FailureKind::SchemaMissing,
        message: message.to_string(),
        trace: trace(frames),
    }
}

#[test]
fn test_format_traces_folds_shared_frames() {
    let failures = vec![
        failure("https://a.example/1", &[("extract", 10), ("field", 20), ("property", 30)], "no 'name'"),
        failure("https://a.example/2", &[("extract", 10), ("field", 20), ("property", 31)], "no 'name'"),
    ];

    let rendered = format_traces(&failures, "recipe-harvest");

    assert_eq!(
        rendered[0],
        vec![
            "  at extract (src/extraction/adapter.rs:10)",
            "  at field (src/extraction/adapter.rs:20)",
            "  at property (src/extraction/adapter.rs:30)",
            "SchemaPropertyMissing: no 'name'",
        ]
    );
    assert_eq!(
        rendered[1],
        vec![
            SHARED_FRAMES_MARKER,
            "  at property (src/extraction/adapter.rs:31)",
            "SchemaPropertyMissing: no 'name'",
        ]
    );
}

#[test]
fn test_format_traces_without_shared_frames_has_no_marker() {
    let failures = vec![
        failure("https://a.example/1", &[("a", 1), ("b", 2)], "x"),
        failure("https://a.example/2", &[("c", 1), ("b", 2)], "y"),
    ];

    let rendered = format_traces(&failures, "recipe-harvest");

    assert_eq!(rendered[1][0], "  at c (src/extraction/adapter.rs:1)");
    assert!(!rendered[1].iter().any(|l| l == SHARED_FRAMES_MARKER));
}

// =============================================================================
// Reports
// =============================================================================

#[test]
fn test_three_failures_make_one_report() {
    let index = FailureIndex::new();
    for i in 1..=3 {
        index.record(
            &format!("https://www.tasty.example/r/{}", i),
            Some(Field::TotalTime),
            FailureKind::TypeMismatch,
            "unexpected array for 'totalTime'",
            trace(&[("extract", 10), ("field", 20), ("total_time", 30)]),
        );
    }

    let reports = build_reports(&index, "so-1", "recipe-harvest");

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(
        report.title,
        "tasty: total time - UnexpectedType (found by recipe-harvest)"
    );
    for i in 1..=3 {
        assert!(report.body.contains(&format!("    - https://www.tasty.example/r/{}\n", i)));
    }
    assert!(report.body.contains("- host: `tasty.example`"));
    assert!(report.body.contains("- extractor version: `so-1`"));
    assert!(report.body.contains("- triggered by calling: `.total_time()`"));
    assert!(report.body.contains("indicates frames present in all traces"));
    // Shared frames rendered once, marker for the other two traces
    assert_eq!(report.body.matches("  at extract (").count(), 1);
    assert_eq!(report.body.matches("  at field (").count(), 1);
    assert_eq!(report.body.matches("  at total_time (").count(), 3);
    assert_eq!(report.body.matches(&format!("{}\n", SHARED_FRAMES_MARKER)).count(), 2);
}

#[test]
fn test_general_parsing_error_report() {
    let index = FailureIndex::new();
    index.record(
        "https://broken.example/x",
        None,
        FailureKind::Unparseable,
        "malformed JSON-LD",
        trace(&[("extract", 1), ("parse", 2)]),
    );

    let reports = build_reports(&index, "so-1", "recipe-harvest");

    assert_eq!(
        reports[0].title,
        "broken: general parsing error - DocumentUnparseable (found by recipe-harvest)"
    );
    assert!(reports[0].body.contains("`parse()`"));
    assert!(!reports[0].body.contains("indicates frames present in all traces"));
}

#[tokio::test]
async fn test_write_reports_uses_sanitized_titles() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("reports");
    let reports = vec![FailureReport {
        title: "site: title - SchemaPropertyMissing (found by recipe-harvest)".to_string(),
        body: "body".to_string(),
    }];

    let written = write_reports(&reports, &target).await.unwrap();

    assert_eq!(written, 1);
    let path = target.join("site_ title - SchemaPropertyMissing (found by recipe-harvest).md");
    assert_eq!(std::fs::read_to_string(path).unwrap(), "body");
}

#[tokio::test]
async fn test_write_reports_nothing_to_write() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("never-created");

    assert_eq!(write_reports(&[], &target).await.unwrap(), 0);
    assert!(!target.exists());
}

#[tokio::test]
async fn test_write_reports_into_file_path_fails() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let reports = vec![FailureReport {
        title: "t".to_string(),
        body: "b".to_string(),
    }];

    let result = write_reports(&reports, file.path()).await;
    assert!(matches!(result, Err(crate::Error::Io(_))));
}
