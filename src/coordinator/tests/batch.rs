use std::time::Duration;

use crate::coordinator::test_helpers::{
    next_event, wait_for_terminal, AttemptScript, MockFetcher, MockTranscoder, TestHarness,
};
use crate::error::AdapterError;
use crate::types::{Category, ConversionKind, DownloadOptions, Event};

// --- batch completion tests ---

#[tokio::test]
async fn test_batch_complete_fires_once_after_all_downloads_finish() {
    let fetcher = MockFetcher::new().with_attempts(vec![
        AttemptScript::ok("/out/a.mp4"),
        AttemptScript::fail(AdapterError::UnsupportedUrl("nope".into())),
        AttemptScript::ok("/out/c.mp4"),
    ]);
    let mut harness = TestHarness::build(
        |c| c.max_concurrent_downloads = 1,
        fetcher,
        MockTranscoder::new(),
    );

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(
            harness
                .queue
                .add_download(
                    &format!("https://www.youtube.com/watch?v=batch{i}"),
                    DownloadOptions::default(),
                )
                .unwrap(),
        );
    }

    // collect everything until the batch notification arrives
    let mut terminals_before_batch = 0;
    loop {
        match next_event(&mut harness.events).await {
            Event::TaskTerminal { .. } => terminals_before_batch += 1,
            Event::BatchComplete { category } => {
                assert_eq!(category, Category::Download);
                break;
            }
            _ => continue,
        }
    }
    assert_eq!(
        terminals_before_batch, 3,
        "the batch fires only after every task is terminal, mixed outcomes included"
    );

    // drain for a while: no second batch notification may appear
    let drained = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            if let Event::BatchComplete { .. } = next_event(&mut harness.events).await {
                return true;
            }
        }
    })
    .await;
    assert!(drained.is_err(), "BatchComplete must fire exactly once per drain");
}

#[tokio::test]
async fn test_new_submission_rearms_the_batch_latch() {
    let mut harness = TestHarness::new();

    let first = harness
        .queue
        .add_download("https://www.youtube.com/watch?v=one", DownloadOptions::default())
        .unwrap();
    wait_for_terminal(&mut harness.events, first).await;
    let batch = next_event(&mut harness.events).await;
    assert!(matches!(batch, Event::BatchComplete { category: Category::Download }));

    // a fresh task re-arms the latch; its completion fires a second batch
    let second = harness
        .queue
        .add_download("https://www.youtube.com/watch?v=two", DownloadOptions::default())
        .unwrap();
    wait_for_terminal(&mut harness.events, second).await;
    let batch = next_event(&mut harness.events).await;
    assert!(
        matches!(batch, Event::BatchComplete { category: Category::Download }),
        "a new drain after new work should notify again, got: {batch:?}"
    );
}

#[tokio::test]
async fn test_batch_never_fires_for_an_idle_category() {
    let mut harness = TestHarness::new();

    let conversion = harness
        .queue
        .add_conversion("/in/photo.png", ConversionKind::Image, "jpg", None)
        .unwrap();
    wait_for_terminal(&mut harness.events, conversion).await;

    // the conversion drain notifies; the empty download category never does
    let mut saw_conversion_batch = false;
    let result = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            match next_event(&mut harness.events).await {
                Event::BatchComplete { category: Category::Conversion } => {
                    saw_conversion_batch = true;
                }
                Event::BatchComplete { category: Category::Download } => {
                    panic!("batch fired for a category that never had tasks");
                }
                _ => continue,
            }
        }
    })
    .await;
    assert!(result.is_err(), "drain loop should only end by timeout");
    assert!(saw_conversion_batch, "the conversion category did drain");
}

#[tokio::test]
async fn test_categories_notify_independently() {
    let mut harness = TestHarness::new();

    harness
        .queue
        .add_download("https://www.youtube.com/watch?v=mix", DownloadOptions::default())
        .unwrap();
    harness
        .queue
        .add_conversion("/in/clip.mp4", ConversionKind::Video, "mkv", None)
        .unwrap();

    // the two drains interleave; collect terminals and notifications from
    // one stream so neither category's BatchComplete can be skipped over
    let mut seen = Vec::new();
    let mut terminals = 0;
    while terminals < 2 || seen.len() < 2 {
        match next_event(&mut harness.events).await {
            Event::TaskTerminal { .. } => terminals += 1,
            Event::BatchComplete { category } => seen.push(category),
            _ => continue,
        }
    }
    assert!(seen.contains(&Category::Download), "got: {seen:?}");
    assert!(seen.contains(&Category::Conversion), "got: {seen:?}");

    let extra = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            if let Event::BatchComplete { .. } = next_event(&mut harness.events).await {
                return;
            }
        }
    })
    .await;
    assert!(extra.is_err(), "one notification per category, no refiring");
}
