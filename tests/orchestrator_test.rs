//! Orchestrator integration tests.
//!
//! Drives job creation, dispatch, retries and reporting through
//! [`TestHarness`] with fake stages, so no external tools are needed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use beer_goggles::config::WorkflowConfig;
use beer_goggles::orchestrator::{Report, ReportSummary, MASTERING_FAILED};
use beer_goggles::{Error, JobEvent, JobStatus, StatusCounts};
use common::{Behavior, FakeMastering, FakeRenderer, InFlight, TestHarness};

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_tracks_for_youtube_all_complete() {
    let h = TestHarness::new(2);
    h.audio("a.wav");
    h.audio("b.wav");
    h.audio("c.wav");

    let jobs = h
        .orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["youtube"], "*.wav")
        .unwrap();
    assert_eq!(jobs.len(), 3);

    let counts = h.orchestrator.process_all_jobs().await;
    assert_eq!(
        counts,
        StatusCounts { pending: 0, processing: 0, completed: 3, failed: 0 }
    );
    assert_eq!(h.mastering.calls(), 3);
    // youtube renders 16:9 and 9:16
    assert_eq!(h.renderer.calls(), 6);

    let job = h.orchestrator.get_job("a_0").unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert!(job.error_message().is_none());
    assert!(job.started_at().is_some());
    assert!(job.completed_at().is_some());

    let keys: Vec<&str> = job.outputs().keys().map(String::as_str).collect();
    assert_eq!(keys, ["youtube_16:9", "youtube_9:16"]);

    let landscape = job.outputs()["youtube_16:9"].as_ref().unwrap();
    assert_eq!(
        landscape,
        &h.output_dir()
            .join("videos")
            .join("a_0")
            .join("youtube")
            .join("a_0_youtube_16x9.mp4")
    );
    assert!(landscape.exists());
    assert!(h.mastered_path("a_0").exists());
}

#[tokio::test]
async fn mastering_failure_skips_rendering() {
    let h = TestHarness::with_stages(4, FakeMastering::new(Behavior::Fail), FakeRenderer::new());
    let audio = h.audio("song.wav");

    let job = h
        .orchestrator
        .add_job(&audio, &h.image(), &["youtube"], None)
        .unwrap();
    let counts = h.orchestrator.process_all_jobs().await;

    assert_eq!(counts.failed, 1);
    let job = h.orchestrator.get_job(job.id()).unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error_message(), Some(MASTERING_FAILED));
    assert!(job.outputs().is_empty());
    assert_eq!(h.renderer.calls(), 0);
}

#[tokio::test]
async fn one_failing_platform_fails_the_job_but_keeps_other_outputs() {
    let renderer = FakeRenderer::new()
        .failing_key("twitter_1:1")
        .failing_key("twitter_16:9");
    let h = TestHarness::with_stages(4, FakeMastering::succeeding(), renderer);
    let audio = h.audio("song.wav");

    h.orchestrator
        .add_job(&audio, &h.image(), &["tiktok", "twitter"], None)
        .unwrap();
    h.orchestrator.process_all_jobs().await;

    let job = h.orchestrator.get_job("song_0").unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(
        job.error_message(),
        Some("Failed to create videos: twitter_1:1, twitter_16:9")
    );

    let outputs = job.outputs();
    assert_eq!(outputs.len(), 3);
    assert!(outputs["tiktok_9:16"].as_ref().is_some_and(|p| p.exists()));
    assert_eq!(outputs["twitter_1:1"], None);
    assert_eq!(outputs["twitter_16:9"], None);

    // Platform order, then ratio order.
    let keys: Vec<String> = h.renderer.rendered().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["tiktok_9:16", "twitter_1:1", "twitter_16:9"]);
}

// ---------------------------------------------------------------------------
// Adding jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_sources_are_rejected() {
    let h = TestHarness::new(2);
    let audio = h.audio("song.wav");
    let missing = h.dir.path().join("nope.wav");

    assert_matches!(
        h.orchestrator.add_job(&missing, &h.image(), &["youtube"], None),
        Err(Error::SourceNotFound { kind: "audio file", .. })
    );
    assert_matches!(
        h.orchestrator
            .add_job(&audio, &h.dir.path().join("nope.png"), &["youtube"], None),
        Err(Error::SourceNotFound { kind: "image file", .. })
    );
    assert!(h.orchestrator.jobs().is_empty());
}

#[tokio::test]
async fn unknown_platform_adds_no_job() {
    let h = TestHarness::new(2);
    let audio = h.audio("song.wav");

    let err = h
        .orchestrator
        .add_job(&audio, &h.image(), &["youtube", "myspace", "vine"], None)
        .unwrap_err();
    assert_matches!(&err, Error::UnsupportedPlatform { platforms } if platforms == &["myspace", "vine"]);
    assert_eq!(err.to_string(), "Unsupported platforms: myspace, vine");

    let empty: [&str; 0] = [];
    assert_matches!(
        h.orchestrator.add_job(&audio, &h.image(), &empty, None),
        Err(Error::EmptyPlatforms)
    );
    assert!(h.orchestrator.jobs().is_empty());
}

#[tokio::test]
async fn platform_ids_are_normalized() {
    let h = TestHarness::new(2);
    let audio = h.audio("song.wav");

    let job = h
        .orchestrator
        .add_job(&audio, &h.image(), &["YouTube", "youtube", "TikTok"], None)
        .unwrap();
    assert_eq!(job.platforms(), ["youtube", "tiktok"]);
}

#[tokio::test]
async fn explicit_and_duplicate_job_ids() {
    let h = TestHarness::new(2);
    let audio = h.audio("song.wav");

    let job = h
        .orchestrator
        .add_job(&audio, &h.image(), &["tiktok"], Some("single"))
        .unwrap();
    assert_eq!(job.id(), "single");

    assert_matches!(
        h.orchestrator
            .add_job(&audio, &h.image(), &["tiktok"], Some("single")),
        Err(Error::DuplicateJobId(id)) if id == "single"
    );
    assert_eq!(h.orchestrator.jobs().len(), 1);

    // Auto ids use the current job count.
    let auto = h
        .orchestrator
        .add_job(&audio, &h.image(), &["tiktok"], None)
        .unwrap();
    assert_eq!(auto.id(), "song_1");
}

#[tokio::test]
async fn batch_jobs_follow_file_name_order() {
    let h = TestHarness::new(2);
    h.audio("c.wav");
    h.audio("a.wav");
    h.audio("b.wav");
    h.audio("notes.mp3");

    let jobs = h
        .orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["tiktok"], "*.wav")
        .unwrap();
    let ids: Vec<&str> = jobs.iter().map(|j| j.id()).collect();
    assert_eq!(ids, ["a_0", "b_1", "c_2"]);
    assert!(jobs.iter().all(|j| j.image_source() == h.image()));
}

#[tokio::test]
async fn batch_with_no_matches_is_empty() {
    let h = TestHarness::new(2);
    h.audio("a.flac");

    let jobs = h
        .orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["tiktok"], "*.wav")
        .unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn batch_validates_before_adding() {
    let h = TestHarness::new(2);
    h.audio("a.wav");
    h.audio("b.wav");

    assert_matches!(
        h.orchestrator.add_batch_jobs(
            &h.dir.path().join("missing"),
            &h.image(),
            &["tiktok"],
            "*.wav"
        ),
        Err(Error::SourceNotFound { .. })
    );
    assert_matches!(
        h.orchestrator
            .add_batch_jobs(&h.audio_dir(), &h.image(), &["friendster"], "*.wav"),
        Err(Error::UnsupportedPlatform { .. })
    );
    assert!(h.orchestrator.jobs().is_empty());
}

// ---------------------------------------------------------------------------
// Dispatch properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_is_a_no_op() {
    let h = TestHarness::new(2);
    h.audio("a.wav");
    h.audio("b.wav");
    h.orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["youtube"], "*.wav")
        .unwrap();

    let first = h.orchestrator.process_all_jobs().await;
    let (masters, renders) = (h.mastering.calls(), h.renderer.calls());

    let second = h.orchestrator.process_all_jobs().await;
    assert_eq!(first, second);
    assert_eq!(h.mastering.calls(), masters);
    assert_eq!(h.renderer.calls(), renders);
}

#[tokio::test]
async fn empty_orchestrator_processes_nothing() {
    let h = TestHarness::new(2);
    let counts = h.orchestrator.process_all_jobs().await;
    assert_eq!(counts, StatusCounts::default());
    assert_eq!(h.mastering.calls(), 0);
}

#[tokio::test]
async fn existing_master_is_reused_when_resuming() {
    let h = TestHarness::new(2);
    let audio = h.audio("song.wav");
    common::write_fixture(&h.mastered_path("song_0"));

    h.orchestrator
        .add_job(&audio, &h.image(), &["tiktok"], None)
        .unwrap();
    let counts = h.orchestrator.process_all_jobs().await;

    assert_eq!(counts.completed, 1);
    assert_eq!(h.mastering.calls(), 0);
    assert_eq!(h.renderer.calls(), 1);
}

#[tokio::test]
async fn existing_master_is_redone_without_resume() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkflowConfig {
        output_base_dir: dir.path().join("output"),
        resume_on_failure: false,
        ..WorkflowConfig::default()
    };
    let h = TestHarness::with_config(dir, config, FakeMastering::succeeding(), FakeRenderer::new());
    let audio = h.audio("song.wav");
    common::write_fixture(&h.mastered_path("song_0"));

    h.orchestrator
        .add_job(&audio, &h.image(), &["tiktok"], None)
        .unwrap();
    h.orchestrator.process_all_jobs().await;

    assert_eq!(h.mastering.calls(), 1);
}

#[tokio::test]
async fn interrupted_master_is_not_reused_on_retry() {
    let mastering = FakeMastering::succeeding().truncating_for("song.wav");
    let h = TestHarness::with_stages(1, mastering, FakeRenderer::new());
    let audio = h.audio("song.wav");
    h.orchestrator
        .add_job(&audio, &h.image(), &["tiktok"], None)
        .unwrap();

    let first = h.orchestrator.process_all_jobs().await;
    assert_eq!(first.failed, 1);
    assert_eq!(h.renderer.calls(), 0);
    assert!(!h.mastered_path("song_0").exists());
    let leftovers: Vec<_> = std::fs::read_dir(h.output_dir().join("mastered_audio"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");

    h.mastering.heal();
    let counts = h.orchestrator.retry_failed_jobs().await;

    assert_eq!(counts.completed, 1);
    assert_eq!(h.mastering.calls(), 2);
    assert_eq!(std::fs::read(h.mastered_path("song_0")).unwrap(), b"mastered");
}

#[tokio::test]
async fn failed_redo_removes_the_old_master() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkflowConfig {
        output_base_dir: dir.path().join("output"),
        resume_on_failure: false,
        ..WorkflowConfig::default()
    };
    let mastering = FakeMastering::succeeding().failing_for("song.wav");
    let h = TestHarness::with_config(dir, config, mastering, FakeRenderer::new());
    let audio = h.audio("song.wav");
    common::write_fixture(&h.mastered_path("song_0"));

    h.orchestrator
        .add_job(&audio, &h.image(), &["tiktok"], None)
        .unwrap();
    let counts = h.orchestrator.process_all_jobs().await;

    assert_eq!(counts.failed, 1);
    assert!(!h.mastered_path("song_0").exists());
}

#[tokio::test]
async fn failing_job_does_not_affect_siblings() {
    let mastering = FakeMastering::succeeding().failing_for("bad.wav");
    let h = TestHarness::with_stages(2, mastering, FakeRenderer::new());
    h.audio("a_good.wav");
    h.audio("bad.wav");
    h.audio("c_good.wav");
    h.orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["tiktok"], "*.wav")
        .unwrap();

    let counts = h.orchestrator.process_all_jobs().await;
    assert_eq!(counts.completed, 2);
    assert_eq!(counts.failed, 1);

    assert_eq!(h.orchestrator.get_job_status("a_good_0"), Some(JobStatus::Completed));
    assert_eq!(h.orchestrator.get_job_status("bad_1"), Some(JobStatus::Failed));
    assert_eq!(h.orchestrator.get_job_status("c_good_2"), Some(JobStatus::Completed));
    assert_eq!(h.orchestrator.get_job_status("missing"), None);

    let failed = h.orchestrator.get_failed_jobs();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id(), "bad_1");
}

#[tokio::test]
async fn panicking_stage_fails_only_its_job() {
    let mastering = FakeMastering::succeeding().panicking_for("boom.wav");
    let h = TestHarness::with_stages(2, mastering, FakeRenderer::new());
    h.audio("boom.wav");
    h.audio("fine.wav");
    h.orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["tiktok"], "*.wav")
        .unwrap();

    let counts = h.orchestrator.process_all_jobs().await;
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.failed, 1);

    let boom = h.orchestrator.get_job("boom_0").unwrap();
    let message = boom.error_message().unwrap();
    assert!(message.starts_with("Unexpected error: "), "{message}");
    assert!(message.contains("mastering exploded on boom.wav"), "{message}");
    assert_eq!(h.orchestrator.get_job_status("fine_1"), Some(JobStatus::Completed));
}

#[tokio::test]
async fn never_more_jobs_in_flight_than_configured() {
    let in_flight = Arc::new(InFlight::default());
    let mastering = FakeMastering::succeeding()
        .with_delay(Duration::from_millis(20))
        .with_in_flight(Arc::clone(&in_flight));
    let renderer = FakeRenderer::new()
        .with_delay(Duration::from_millis(10))
        .with_in_flight(Arc::clone(&in_flight));
    let h = TestHarness::with_stages(3, mastering, renderer);
    for i in 0..8 {
        h.audio(&format!("track{i}.wav"));
    }
    h.orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["tiktok"], "*.wav")
        .unwrap();

    let mut events = h.orchestrator.subscribe();
    let counts = h.orchestrator.process_all_jobs().await;
    assert_eq!(counts.completed, 8);

    let peak = in_flight.max();
    assert!(peak <= 3, "peak in-flight stage calls was {peak}");
    assert!(peak >= 2, "jobs never overlapped");

    // Processing jobs never exceed the bound either.
    let mut running: usize = 0;
    let mut max_running = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            JobEvent::Started { .. } => running += 1,
            JobEvent::Completed { .. } | JobEvent::Failed { .. } => running -= 1,
            JobEvent::Queued { .. } => {}
        }
        max_running = max_running.max(running);
    }
    assert_eq!(running, 0);
    assert!(max_running <= 3);
}

#[tokio::test]
async fn retry_reprocesses_only_failed_jobs() {
    let mastering = FakeMastering::succeeding().failing_for("flaky.wav");
    let h = TestHarness::with_stages(2, mastering, FakeRenderer::new());
    h.audio("flaky.wav");
    h.audio("solid.wav");
    h.orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["tiktok"], "*.wav")
        .unwrap();

    let first = h.orchestrator.process_all_jobs().await;
    assert_eq!(first.failed, 1);
    assert_eq!(h.mastering.calls(), 2);

    h.mastering.heal();
    let counts = h.orchestrator.retry_failed_jobs().await;
    assert_eq!(
        counts,
        StatusCounts { pending: 0, processing: 0, completed: 2, failed: 0 }
    );
    // Only the failed job ran again.
    assert_eq!(h.mastering.calls(), 3);
    let retried = h.mastering.inputs();
    assert!(retried.last().unwrap().ends_with("flaky.wav"));

    let job = h.orchestrator.get_job("flaky_0").unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert!(job.error_message().is_none());
    assert!(h.orchestrator.get_failed_jobs().is_empty());
}

#[tokio::test]
async fn retry_with_nothing_failed_changes_nothing() {
    let h = TestHarness::new(2);
    h.audio("song.wav");
    h.orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["tiktok"], "*.wav")
        .unwrap();
    h.orchestrator.process_all_jobs().await;

    let counts = h.orchestrator.retry_failed_jobs().await;
    assert_eq!(counts.completed, 1);
    assert_eq!(h.mastering.calls(), 1);
}

// ---------------------------------------------------------------------------
// Events, reports and housekeeping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_events_for_a_single_job() {
    let h = TestHarness::new(1);
    let audio = h.audio("song.wav");
    let mut events = h.orchestrator.subscribe();

    h.orchestrator
        .add_job(&audio, &h.image(), &["youtube"], None)
        .unwrap();
    h.orchestrator.process_all_jobs().await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        [
            JobEvent::Queued { job_id: "song_0".into() },
            JobEvent::Started { job_id: "song_0".into() },
            JobEvent::Completed { job_id: "song_0".into(), renditions: 2 },
        ]
    );
}

#[tokio::test]
async fn exported_report_round_trips() {
    let mastering = FakeMastering::succeeding().failing_for("b.wav");
    let h = TestHarness::with_stages(2, mastering, FakeRenderer::new());
    h.audio("a.wav");
    h.audio("b.wav");
    h.orchestrator
        .add_batch_jobs(&h.audio_dir(), &h.image(), &["youtube"], "*.wav")
        .unwrap();
    h.orchestrator.process_all_jobs().await;

    let path = h.dir.path().join("reports").join("run").join("report.json");
    h.orchestrator.export_report(&path).unwrap();

    let report = Report::load(&path).unwrap();
    assert_eq!(
        report.summary,
        ReportSummary { total_jobs: 2, completed: 1, failed: 1, pending: 0 }
    );
    assert_eq!(report.jobs.len(), 2);
    assert_eq!(report.workflow_config.max_concurrent_jobs, 2);
    assert_eq!(report.jobs[1].error_message(), Some(MASTERING_FAILED));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let first = &raw["jobs"][0];
    assert_eq!(first["job_id"], "a_0");
    assert_eq!(first["status"], "completed");
    assert!(first["output_files"]["youtube_16:9"].is_string());
    assert_eq!(raw["jobs"][1]["status"], "failed");
    assert_eq!(raw["summary"]["total_jobs"], 2);
    assert!(raw["workflow_config"]["audio_mastering"]["target_lufs"].is_number());
}

#[tokio::test]
async fn report_to_unwritable_path_fails() {
    let h = TestHarness::new(1);
    let blocker = h.dir.path().join("blocker");
    std::fs::write(&blocker, b"file").unwrap();

    assert_matches!(
        h.orchestrator.export_report(&blocker.join("report.json")),
        Err(Error::Report { .. })
    );
}

#[tokio::test]
async fn clearing_jobs_keeps_files() {
    let h = TestHarness::new(1);
    let audio = h.audio("song.wav");
    h.orchestrator
        .add_job(&audio, &h.image(), &["tiktok"], None)
        .unwrap();
    h.orchestrator.process_all_jobs().await;
    let video = h
        .output_dir()
        .join("videos/song_0/tiktok/song_0_tiktok_9x16.mp4");
    assert!(video.exists());

    h.orchestrator.clear_jobs();
    assert!(h.orchestrator.jobs().is_empty());
    assert_eq!(h.orchestrator.status_counts(), StatusCounts::default());
    assert!(video.exists());
    assert!(h.mastered_path("song_0").exists());
}

#[tokio::test]
async fn auto_ids_keep_counting_after_clear() {
    let h = TestHarness::new(1);
    let first = h.audio("song.wav");
    h.orchestrator
        .add_job(&first, &h.image(), &["tiktok"], None)
        .unwrap();
    h.orchestrator.process_all_jobs().await;
    h.orchestrator.clear_jobs();

    // Same stem, different track
    let second = h.dir.path().join("other").join("song.wav");
    common::write_fixture(&second);
    let job = h
        .orchestrator
        .add_job(&second, &h.image(), &["tiktok"], None)
        .unwrap();
    assert_eq!(job.id(), "song_1");

    let counts = h.orchestrator.process_all_jobs().await;
    assert_eq!(counts.completed, 1);
    assert_eq!(h.mastering.calls(), 2);
    let inputs = h.mastering.inputs();
    assert!(inputs.last().unwrap().ends_with("other/song.wav"));
    assert!(h.mastered_path("song_0").exists());
    assert!(h.mastered_path("song_1").exists());
}

#[tokio::test]
async fn output_directories_are_created_up_front() {
    let h = TestHarness::new(1);
    assert!(h.output_dir().join("mastered_audio").is_dir());
    assert!(h.output_dir().join("videos").is_dir());
}
