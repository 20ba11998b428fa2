mod mocks;

use std::{path::Path, time::Duration};

use ecyber_harvest::{
    auth_gate,
    capture::{CapturePolicy, RetryPolicy},
    types::{HarvestSummary, SubjectSelection, WeekSelection},
    HarvestContext, LectureHarvester, LectureHarvesterBuilder,
};
use mocks::{
    fetcher::MockSegmentFetcher,
    media_handler::MockMediaHandler,
    portal::{lecture_row, MockPortal, INTRO_URL},
};
use tokio_util::sync::CancellationToken;

type TestHarvester = LectureHarvester<MockPortal, MockSegmentFetcher, MockMediaHandler>;

fn test_policy() -> CapturePolicy {
    CapturePolicy {
        poll_delay: Duration::ZERO,
        misses: RetryPolicy::fixed(3, Duration::ZERO),
        completion_slack_secs: 1,
        fallback_total_secs: 99_999,
        intro_wait: Duration::ZERO,
    }
}

fn builder(
    download_dir: &Path,
    portal: MockPortal,
    fetcher: MockSegmentFetcher,
    media: MockMediaHandler,
) -> LectureHarvesterBuilder<MockPortal, MockSegmentFetcher, MockMediaHandler> {
    LectureHarvesterBuilder::new(download_dir)
        .portal(portal)
        .fetcher(fetcher)
        .media_handler(media)
        .capture_policy(test_policy())
}

/// "Calculus" with a single lecture, "Limits", in week 1.
fn calculus_portal() -> MockPortal {
    MockPortal::default()
        .with_subject("Calculus", "CALC01")
        .with_week("CALC01", 1, false, vec![lecture_row("Limits", "p1")])
}

async fn download_calculus(harvester: &TestHarvester) -> HarvestSummary {
    let mut ctx = HarvestContext::new();
    harvester.load_subjects(&mut ctx).await.unwrap();
    let subject = ctx.find_subject("Calculus").unwrap().clone();

    harvester
        .download(&mut ctx, &SubjectSelection::One(subject), WeekSelection::All)
        .await
        .unwrap()
}

fn count_calls(calls: &[String], prefix: &str) -> usize {
    calls.iter().filter(|c| c.starts_with(prefix)).count()
}

// ─── Discovery ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disabled_week_is_excluded_from_available_weeks() {
    let portal = MockPortal::default()
        .with_subject("Calculus", "CALC01")
        .with_week("CALC01", 1, false, vec![lecture_row("Limits", "p1")])
        .with_week("CALC01", 2, true, vec![lecture_row("Derivatives", "p2")])
        .with_week(
            "CALC01",
            3,
            false,
            vec![lecture_row("Integrals", "p3"), lecture_row("Series", " ")],
        );
    let calls = portal.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::default(),
        MockMediaHandler::default(),
    )
    .build();

    let mut ctx = HarvestContext::new();
    harvester.load_subjects(&mut ctx).await.unwrap();
    let subject = ctx.find_subject("Calculus").unwrap().clone();
    let weeks = harvester.load_weeks(&mut ctx, &subject).await.unwrap();

    assert_eq!(weeks, vec![1, 3]);

    let lectures = ctx.lectures(&subject.token).unwrap();
    let week_three = lectures[&3].iter().map(|u| u.title.as_str()).collect::<Vec<_>>();
    assert_eq!(week_three, vec!["Integrals"], "Locked lecture should be dropped");

    let calls = calls.lock().unwrap();
    assert_eq!(count_calls(&calls, "scrape_week_lectures:2주"), 0);
    assert!(calls.iter().any(|c| c.starts_with("show_message:")));
}

#[tokio::test]
async fn test_weeks_are_scraped_once_per_subject() {
    let portal = calculus_portal();
    let calls = portal.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::default(),
        MockMediaHandler::default(),
    )
    .build();

    let mut ctx = HarvestContext::new();
    harvester.load_subjects(&mut ctx).await.unwrap();
    let subject = ctx.find_subject("CALC01").unwrap().clone();

    let first = harvester.load_weeks(&mut ctx, &subject).await.unwrap();
    let second = harvester.load_weeks(&mut ctx, &subject).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(count_calls(&calls.lock().unwrap(), "scrape_weeks:"), 1);
}

#[tokio::test]
async fn test_subject_load_failure_is_reported() {
    let portal = MockPortal {
        fail_subjects: true,
        ..calculus_portal()
    };
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::default(),
        MockMediaHandler::default(),
    )
    .build();

    let mut ctx = HarvestContext::new();
    assert!(harvester.load_subjects(&mut ctx).await.is_err());
    assert!(ctx.subjects().is_empty());
}

// ─── Capture ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_capture_stops_once_total_minus_one_is_reached() {
    let portal = calculus_portal().with_sources(["seg1", "seg2", "seg3", "seg4"]);
    let fetcher =
        MockSegmentFetcher::with_durations([("seg1", 10.0), ("seg2", 10.0), ("seg3", 9.4), ("seg4", 10.0)]);
    let fetch_calls = fetcher.calls.clone();
    let media = MockMediaHandler::default();
    let merges = media.merges.clone();
    let extractions = media.extractions.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, media).build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.completed, 1);
    assert_eq!(*fetch_calls.lock().unwrap(), vec!["seg1", "seg2", "seg3"]);

    let lecture_dir = dir.path().join("Calculus").join("1주차").join("Limits");
    let merges = merges.lock().unwrap();
    assert_eq!(merges.len(), 1);
    let (inputs, output) = &merges[0];
    assert_eq!(inputs.len(), 3);
    assert_eq!(*output, lecture_dir.join("mp4").join("Limits_merged.mp4"));
    assert!(
        inputs.iter().all(|p| !p.exists()),
        "Segments should be removed after a successful merge"
    );

    let extractions = extractions.lock().unwrap();
    assert_eq!(
        extractions[0].1,
        lecture_dir.join("mp3").join("Limits_merged.mp3")
    );
}

#[tokio::test]
async fn test_capture_gives_up_after_miss_budget() {
    // the repeated source counts as a miss, then the queue runs dry
    let portal = calculus_portal().with_sources(["seg1", "seg1"]);
    let calls = portal.calls.clone();
    let fetcher = MockSegmentFetcher::with_durations([("seg1", 10.0)]);
    let fetch_calls = fetcher.calls.clone();
    let media = MockMediaHandler::default();
    let merges = media.merges.clone();
    let extractions = media.extractions.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, media).build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.incomplete, 1);
    assert_eq!(summary.completed, 0);
    assert_eq!(fetch_calls.lock().unwrap().len(), 1);
    assert_eq!(count_calls(&calls.lock().unwrap(), "seek_forward"), 2);

    assert!(merges.lock().unwrap().is_empty(), "A single segment is not merged");
    let extractions = extractions.lock().unwrap();
    let (video, audio) = &extractions[0];
    assert!(video.ends_with("mp4/Limits_1.mp4"));
    assert!(audio.ends_with("mp3/Limits_1.mp3"));
}

#[tokio::test]
async fn test_intro_video_is_skipped() {
    let portal = MockPortal {
        synced_video: Some(INTRO_URL.to_string()),
        single_video: Some("https://mock.portal/lecture.mp4".to_string()),
        ..calculus_portal()
    }
    .with_sources(["seg1"]);
    let calls = portal.calls.clone();
    let fetcher = MockSegmentFetcher::with_durations([("seg1", 30.0)]);
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, MockMediaHandler::default()).build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.completed, 1);
    let calls = calls.lock().unwrap();
    let locates = calls
        .iter()
        .filter(|c| c.starts_with("locate_video:"))
        .collect::<Vec<_>>();
    assert_eq!(locates, vec!["locate_video:Synced", "locate_video:Single"]);
}

#[tokio::test]
async fn test_missing_video_fails_lecture_and_leaves_player() {
    let portal = MockPortal {
        synced_video: None,
        single_video: None,
        ..calculus_portal()
    };
    let calls = portal.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::default(),
        MockMediaHandler::default(),
    )
    .build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.failed, vec!["Calculus / 1주 / Limits".to_string()]);
    assert_eq!(count_calls(&calls.lock().unwrap(), "leave_player"), 1);
}

#[tokio::test]
async fn test_failed_segment_download_is_skipped() {
    let portal = calculus_portal().with_sources(["broken", "seg2", "seg3"]);
    let fetcher = MockSegmentFetcher::with_durations([("seg2", 15.0), ("seg3", 15.0)])
        .failing_on("broken");
    let fetch_calls = fetcher.calls.clone();
    let media = MockMediaHandler::default();
    let merges = media.merges.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, media).build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.completed, 1);
    assert_eq!(fetch_calls.lock().unwrap().len(), 3);

    let merges = merges.lock().unwrap();
    let names = merges[0]
        .0
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Limits_2.mp4", "Limits_3.mp4"]);
}

#[tokio::test]
async fn test_merge_failure_falls_back_to_first_segment() {
    let portal = calculus_portal().with_sources(["seg1", "seg2"]);
    let fetcher = MockSegmentFetcher::with_durations([("seg1", 15.0), ("seg2", 15.0)]);
    let media = MockMediaHandler::failing_merge();
    let extractions = media.extractions.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, media).build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.completed, 1);
    let extractions = extractions.lock().unwrap();
    let (video, audio) = &extractions[0];
    assert!(video.ends_with("mp4/Limits_1.mp4"));
    assert!(video.exists(), "Segments are kept when the merge fails");
    assert!(audio.ends_with("mp3/Limits_1.mp3"));
}

#[tokio::test]
async fn test_missing_announced_duration_uses_fallback_total() {
    for announced in [None, Some("N/A".to_string())] {
        let portal = MockPortal {
            announced: announced.clone(),
            ..calculus_portal()
        }
        .with_sources(["seg1"]);
        let fetcher = MockSegmentFetcher::with_durations([("seg1", 10.0)]);
        let fetch_calls = fetcher.calls.clone();
        let media = MockMediaHandler::default();
        let extractions = media.extractions.clone();
        let dir = tempfile::tempdir().unwrap();
        let harvester = builder(dir.path(), portal, fetcher, media).build();

        let summary = download_calculus(&harvester).await;

        assert_eq!(summary.incomplete, 1, "announced = {announced:?}");
        assert_eq!(summary.completed, 0, "announced = {announced:?}");
        assert_eq!(fetch_calls.lock().unwrap().len(), 1);
        assert!(extractions.lock().unwrap()[0].1.ends_with("mp3/Limits_1.mp3"));
    }
}

#[tokio::test]
async fn test_segment_with_unknown_duration_counts_zero_and_is_still_merged() {
    // seg1 has no scripted duration, so reading it back fails
    let portal = calculus_portal().with_sources(["seg1", "seg2", "seg3"]);
    let fetcher = MockSegmentFetcher::with_durations([("seg2", 30.0), ("seg3", 30.0)]);
    let fetch_calls = fetcher.calls.clone();
    let media = MockMediaHandler::default();
    let merges = media.merges.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, media).build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.completed, 1);
    assert_eq!(*fetch_calls.lock().unwrap(), vec!["seg1", "seg2"]);

    let merges = merges.lock().unwrap();
    let names = merges[0]
        .0
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Limits_1.mp4", "Limits_2.mp4"]);
}

#[tokio::test]
async fn test_lectures_sharing_a_title_are_both_downloaded() {
    let portal = MockPortal::default()
        .with_subject("Calculus", "CALC01")
        .with_week(
            "CALC01",
            1,
            false,
            vec![lecture_row("Review", "p1"), lecture_row("Review", "p2")],
        )
        .with_sources(["seg1", "seg2"]);
    let calls = portal.calls.clone();
    let fetcher = MockSegmentFetcher::with_durations([("seg1", 30.0), ("seg2", 30.0)]);
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, MockMediaHandler::default()).build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(count_calls(&calls.lock().unwrap(), "open_lecture:"), 2);

    let week_dir = dir.path().join("Calculus").join("1주차");
    assert!(week_dir.join("Review/mp3/Review_1.mp3").exists());
    assert!(week_dir.join("Review (2)/mp3/Review (2)_1.mp3").exists());
}

#[tokio::test]
async fn test_existing_audio_is_not_downloaded_again() {
    let portal = calculus_portal().with_sources(["seg1"]);
    let calls = portal.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let mp3_dir = dir.path().join("Calculus").join("1주차").join("Limits").join("mp3");
    std::fs::create_dir_all(&mp3_dir).unwrap();
    std::fs::write(mp3_dir.join("Limits_1.mp3"), b"mp3").unwrap();

    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::with_durations([("seg1", 30.0)]),
        MockMediaHandler::default(),
    )
    .build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(count_calls(&calls.lock().unwrap(), "open_lecture:"), 0);
}

// ─── Secondary authentication ────────────────────────────────────────────────

#[tokio::test]
async fn test_secondary_auth_waits_for_confirmation() {
    let portal = MockPortal {
        auth_pending: true,
        ..calculus_portal()
    }
    .with_sources(["seg1"]);
    let calls = portal.calls.clone();
    let (gate, handle) = auth_gate();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::with_durations([("seg1", 30.0)]),
        MockMediaHandler::default(),
    )
    .auth_gate(gate)
    .build();

    let confirmer = tokio::spawn(async move {
        handle.requested().await;
        handle.confirm()
    });

    let summary = download_calculus(&harvester).await;

    assert!(confirmer.await.unwrap(), "Confirmer should release the gate");
    assert_eq!(summary.completed, 1);
    let calls = calls.lock().unwrap();
    assert!(calls.iter().any(|c| c.contains("identity check")));
    assert_eq!(count_calls(&calls, "enter_player"), 1);
}

#[tokio::test]
async fn test_secondary_auth_without_gate_fails_lecture() {
    let portal = MockPortal {
        auth_pending: true,
        ..calculus_portal()
    };
    let calls = portal.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::default(),
        MockMediaHandler::default(),
    )
    .build();

    let summary = download_calculus(&harvester).await;

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(count_calls(&calls.lock().unwrap(), "enter_player"), 0);
}

#[tokio::test]
async fn test_cancel_during_auth_wait_stops_run() {
    let portal = MockPortal {
        auth_pending: true,
        ..calculus_portal()
    };
    let (gate, handle) = auth_gate();
    let cancel = CancellationToken::new();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::default(),
        MockMediaHandler::default(),
    )
    .auth_gate(gate)
    .cancellation_token(cancel.clone())
    .build();

    tokio::spawn(async move {
        handle.requested().await;
        cancel.cancel();
    });

    let summary = download_calculus(&harvester).await;

    assert!(summary.cancelled);
    assert!(summary.failed.is_empty());
}

// ─── Selection & cancellation ────────────────────────────────────────────────

#[tokio::test]
async fn test_all_subjects_with_week_filter() {
    let portal = MockPortal::default()
        .with_subject("Calculus", "CALC01")
        .with_subject("Ghost", "GHOST")
        .with_subject("Physics", "PHY02")
        .with_week("CALC01", 1, false, vec![lecture_row("Limits", "p1")])
        .with_week("CALC01", 2, false, vec![lecture_row("Derivatives", "p2")])
        .with_week("PHY02", 1, false, vec![lecture_row("Kinematics", "p3")])
        .with_week("PHY02", 2, false, vec![lecture_row("Forces", "p4")])
        .with_sources(["calc2", "phy2"]);
    let calls = portal.calls.clone();
    let fetcher = MockSegmentFetcher::with_durations([("calc2", 30.0), ("phy2", 30.0)]);
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, MockMediaHandler::default()).build();

    let mut ctx = HarvestContext::new();
    let summary = harvester
        .download(&mut ctx, &SubjectSelection::All, WeekSelection::from(2))
        .await
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, vec!["Ghost".to_string()], "Subject without weeks view");

    let calls = calls.lock().unwrap();
    let opened = calls
        .iter()
        .filter(|c| c.starts_with("open_lecture:"))
        .collect::<Vec<_>>();
    assert_eq!(
        opened,
        vec![
            "open_lecture:CALC01:2:Derivatives",
            "open_lecture:PHY02:2:Forces"
        ]
    );
    assert!(dir
        .path()
        .join("Physics/2주차/Forces/mp3/Forces_1.mp3")
        .exists());
}

#[tokio::test]
async fn test_cancellation_stops_before_next_lecture() {
    let portal = MockPortal::default()
        .with_subject("Calculus", "CALC01")
        .with_week(
            "CALC01",
            1,
            false,
            vec![lecture_row("Limits", "p1"), lecture_row("Continuity", "p2")],
        )
        .with_sources(["seg1", "seg2"]);
    let calls = portal.calls.clone();
    let cancel = CancellationToken::new();
    let fetcher = MockSegmentFetcher {
        cancel_after_first: Some(cancel.clone()),
        ..MockSegmentFetcher::with_durations([("seg1", 10.0), ("seg2", 10.0)])
    };
    let media = MockMediaHandler::default();
    let extractions = media.extractions.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(dir.path(), portal, fetcher, media)
        .cancellation_token(cancel)
        .build();

    assert!(!harvester.cancellation_token().is_cancelled());
    let summary = download_calculus(&harvester).await;

    assert!(summary.cancelled);
    assert_eq!(summary.completed + summary.incomplete, 0);
    assert!(extractions.lock().unwrap().is_empty());

    let calls = calls.lock().unwrap();
    assert_eq!(count_calls(&calls, "open_lecture:"), 1);
    assert_eq!(count_calls(&calls, "leave_player"), 1);
}

#[tokio::test]
async fn test_shutdown_quits_browser() {
    let portal = calculus_portal();
    let calls = portal.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let harvester = builder(
        dir.path(),
        portal,
        MockSegmentFetcher::default(),
        MockMediaHandler::default(),
    )
    .build();

    harvester.shutdown().await;
    assert_eq!(*calls.lock().unwrap(), vec!["quit"]);
}
