mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use wpa_aio::ZipExtractor;
use wpa_common::error::WpaError;
use wpa_common::model::{ArtifactKind, UnresolvedReason};
use wpa_common::{CancelToken, RunContext};
use wpa_core::{teardown_scratch, Analyzer, ReferenceSource};

fn analyzer(
    ctx: RunContext,
    registry: Arc<FakeRegistry>,
    fetcher: Arc<FakeFetcher>,
) -> Analyzer {
    Analyzer::with_collaborators(ctx, registry, fetcher, Arc::new(ZipExtractor))
}

fn download() -> ReferenceSource {
    ReferenceSource::Download {
        version_override: None,
    }
}

#[tokio::test]
async fn tampered_install_is_classified() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let observer = Arc::new(RecordingObserver::default());
    let ctx = RunContext::new(test_config(&scratch.path().join("run")))
        .with_observer(observer.clone());
    let report = analyzer(
        ctx,
        shared(FakeRegistry::wordpress_org()),
        shared(FakeFetcher::wordpress_org()),
    )
    .run(live.path(), download())
    .await
    .unwrap();

    let result = &report.comparison;
    assert_eq!(result.diff, vec!["wp-blog-header.php"]);
    assert_eq!(
        result.extra,
        vec![
            "wp-config.php",
            "wp-content/plugins/gravityforms/gravityforms.php"
        ]
    );
    assert_eq!(
        result.missing,
        vec!["wp-content/plugins/hello.php", "wp-cron.php"]
    );
    assert_eq!(result.upload_php, vec!["wp-content/uploads/2024/05/x.php"]);
    assert_eq!(report.core_version.as_deref(), Some("6.5"));

    assert_eq!(report.unresolved.len(), 1);
    let premium = &report.unresolved[0];
    assert_eq!(premium.kind, ArtifactKind::Plugin);
    assert_eq!(premium.slug, "gravityforms");
    assert_eq!(premium.version.as_deref(), Some("2.8"));
    assert_eq!(premium.reason, UnresolvedReason::NotInRegistry);

    let events = observer.events.lock().unwrap().clone();
    assert!(events.contains(&Event::Completed("wordpress".into())));
    assert!(events.contains(&Event::Completed("akismet".into())));
    assert!(events.contains(&Event::Completed("twentytwentyfour".into())));
    assert!(events.contains(&Event::Failed(
        "gravityforms".into(),
        UnresolvedReason::NotInRegistry
    )));
    assert!(observer.bytes.load(Ordering::SeqCst) > 0);

    // The lock is released and the reference tree left for inspection.
    let config = test_config(&scratch.path().join("run"));
    assert!(!config.lock_path().exists());
    assert!(config.reference_dir().join("wp-cron.php").is_file());
    assert!(!config
        .reference_dir()
        .join("wp-content/themes/twentytwentythree")
        .exists());
    assert!(teardown_scratch(&config).unwrap());
}

#[tokio::test]
async fn missing_core_version_fails_before_any_network_call() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());
    fs::write(
        live.path().join("wp-includes/version.php"),
        "<?php\n// version removed\n",
    )
    .unwrap();

    let registry = shared(FakeRegistry::wordpress_org());
    let fetcher = shared(FakeFetcher::wordpress_org());
    let ctx = RunContext::new(test_config(&scratch.path().join("run")));
    let err = analyzer(ctx, registry.clone(), fetcher.clone())
        .run(live.path(), download())
        .await
        .unwrap_err();

    assert!(matches!(err, WpaError::VersionNotFound(_)));
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fetcher.request_count(), 0);
    assert!(!scratch.path().join("run").exists());
}

#[tokio::test]
async fn failed_plugin_download_is_reported_not_fatal() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let fetcher = FakeFetcher::default()
        .serving(CORE_URL, core_archive())
        .serving(THEME_URL, theme_archive());
    let config = test_config(&scratch.path().join("run"));
    let reference = config.reference_dir();
    let report = analyzer(
        RunContext::new(config),
        shared(FakeRegistry::wordpress_org()),
        shared(fetcher),
    )
    .run(live.path(), download())
    .await
    .unwrap();

    let akismet = report
        .unresolved
        .iter()
        .find(|u| u.slug == "akismet")
        .expect("akismet should be unresolved");
    assert!(matches!(akismet.reason, UnresolvedReason::DownloadFailed(_)));
    assert_eq!(
        akismet.install_path().as_deref(),
        Some("wp-content/plugins/akismet")
    );
    // The copy bundled with core is a different release and must not be compared.
    assert!(!reference.join("wp-content/plugins/akismet").exists());
    assert_eq!(report.comparison.diff, vec!["wp-blog-header.php"]);
    assert!(report
        .comparison
        .extra
        .contains(&"wp-content/plugins/akismet/akismet.php".to_string()));
    assert!(report
        .comparison
        .extra
        .contains(&"wp-content/plugins/akismet/readme.txt".to_string()));
}

#[tokio::test]
async fn unlisted_plugin_does_not_fall_back_to_bundled_copy() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let registry =
        FakeRegistry::default().with(ArtifactKind::Theme, "twentytwentyfour", &["1.1"]);
    let config = test_config(&scratch.path().join("run"));
    let reference = config.reference_dir();
    let report = analyzer(
        RunContext::new(config),
        shared(registry),
        shared(FakeFetcher::wordpress_org()),
    )
    .run(live.path(), download())
    .await
    .unwrap();

    assert!(report
        .unresolved
        .iter()
        .any(|u| u.slug == "akismet" && u.reason == UnresolvedReason::NotInRegistry));
    assert!(!reference.join("wp-content/plugins/akismet").exists());
    assert!(!report
        .comparison
        .diff
        .iter()
        .any(|p| p.starts_with("wp-content/plugins/akismet/")));
}

#[tokio::test]
async fn unsafe_plugin_archive_is_an_extract_failure() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let fetcher = FakeFetcher::default()
        .serving(CORE_URL, core_archive())
        .serving(THEME_URL, theme_archive())
        .serving(
            AKISMET_URL,
            zip_bytes(&[
                ("akismet/readme.txt", AKISMET_README),
                ("akismet/../../../escape.php", "<?php"),
            ]),
        );
    let config = test_config(&scratch.path().join("run"));
    let reference = config.reference_dir();
    let report = analyzer(
        RunContext::new(config),
        shared(FakeRegistry::wordpress_org()),
        shared(fetcher),
    )
    .run(live.path(), download())
    .await
    .unwrap();

    let akismet = report
        .unresolved
        .iter()
        .find(|u| u.slug == "akismet")
        .expect("akismet should be unresolved");
    assert!(matches!(akismet.reason, UnresolvedReason::ExtractFailed(_)));
    assert!(!scratch.path().join("escape.php").exists());
    // Entries written before the bad one are gone too.
    assert!(!reference.join("wp-content/plugins/akismet").exists());
    assert!(report
        .comparison
        .extra
        .contains(&"wp-content/plugins/akismet/readme.txt".to_string()));
}

#[tokio::test]
async fn core_download_failure_is_fatal() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let fetcher = FakeFetcher::default().serving(AKISMET_URL, akismet_archive());
    let ctx = RunContext::new(test_config(&scratch.path().join("run")));
    let err = analyzer(ctx, shared(FakeRegistry::wordpress_org()), shared(fetcher))
        .run(live.path(), download())
        .await
        .unwrap_err();
    assert!(matches!(err, WpaError::NotFound(_)));
}

#[tokio::test]
async fn core_extract_failure_is_reported_as_such() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let fetcher = FakeFetcher::wordpress_org().serving(
        CORE_URL,
        zip_bytes(&[
            ("wordpress/wp-load.php", "<?php // load"),
            ("wordpress/../escape.php", "<?php"),
        ]),
    );
    let observer = Arc::new(RecordingObserver::default());
    let ctx = RunContext::new(test_config(&scratch.path().join("run")))
        .with_observer(observer.clone());
    let err = analyzer(ctx, shared(FakeRegistry::wordpress_org()), shared(fetcher))
        .run(live.path(), download())
        .await
        .unwrap_err();

    assert!(matches!(err, WpaError::CorruptArchive(_)));
    let events = observer.events.lock().unwrap().clone();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Failed(slug, UnresolvedReason::ExtractFailed(_)) if slug == "wordpress"
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::Failed(_, UnresolvedReason::DownloadFailed(_)))));
}

#[tokio::test]
async fn downloads_stay_within_the_pool_size() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let slugs = ["alpha", "bravo", "charlie", "delta", "echo"];
    let mut registry = FakeRegistry::wordpress_org();
    let mut fetcher = FakeFetcher::wordpress_org();
    for slug in slugs {
        let readme = format!("=== {slug} ===\nStable tag: 1.0\n");
        write_files(
            live.path(),
            &[(format!("wp-content/plugins/{slug}/readme.txt").as_str(), readme.as_str())],
        );
        registry = registry.with(ArtifactKind::Plugin, slug, &["1.0"]);
        fetcher = fetcher.serving(
            &format!("https://downloads.wordpress.org/plugin/{slug}.1.0.zip"),
            zip_bytes(&[(format!("{slug}/readme.txt").as_str(), readme.as_str())]),
        );
    }

    let mut config = test_config(&scratch.path().join("run"));
    config.max_concurrent_downloads = 2;
    let fetcher = shared(TrackingFetcher::new(fetcher, Duration::from_millis(50)));
    let report = Analyzer::with_collaborators(
        RunContext::new(config),
        shared(registry),
        fetcher.clone(),
        Arc::new(ZipExtractor),
    )
    .run(live.path(), download())
    .await
    .unwrap();

    // Core, akismet, the theme and the five extra plugins.
    assert_eq!(fetcher.inner.request_count(), 8);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 2);
    assert!(!report.unresolved.iter().any(|u| slugs.contains(&u.slug.as_str())));
}

#[tokio::test]
async fn empty_core_archive_is_fatal() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let fetcher = FakeFetcher::default().serving(CORE_URL, Vec::new());
    let ctx = RunContext::new(test_config(&scratch.path().join("run")));
    let err = analyzer(ctx, shared(FakeRegistry::wordpress_org()), shared(fetcher))
        .run(live.path(), download())
        .await
        .unwrap_err();
    assert!(matches!(err, WpaError::CorruptArchive(_)));
}

#[tokio::test]
async fn occupied_scratch_dir_is_a_conflict() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());
    fs::write(scratch.path().join("unrelated.txt"), "mine").unwrap();

    let ctx = RunContext::new(test_config(scratch.path()));
    let err = analyzer(
        ctx,
        shared(FakeRegistry::wordpress_org()),
        shared(FakeFetcher::wordpress_org()),
    )
    .run(live.path(), download())
    .await
    .unwrap_err();
    assert!(matches!(err, WpaError::ScratchDirConflict(..)));
    assert!(scratch.path().join("unrelated.txt").is_file());
}

#[tokio::test]
async fn reuse_skips_archives_already_downloaded() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());
    let run_dir = scratch.path().join("run");

    let first = shared(FakeFetcher::wordpress_org());
    let ctx = RunContext::new(test_config(&run_dir));
    analyzer(ctx, shared(FakeRegistry::wordpress_org()), first.clone())
        .run(live.path(), download())
        .await
        .unwrap();
    assert_eq!(first.request_count(), 3);

    let second = shared(FakeFetcher::wordpress_org());
    let mut config = test_config(&run_dir);
    config.reuse_scratch = true;
    let report = analyzer(
        RunContext::new(config),
        shared(FakeRegistry::wordpress_org()),
        second.clone(),
    )
    .run(live.path(), download())
    .await
    .unwrap();
    assert_eq!(second.request_count(), 0);
    assert_eq!(report.comparison.diff, vec!["wp-blog-header.php"]);
}

#[tokio::test]
async fn cancelled_run_stops() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let cancel = CancelToken::new();
    cancel.cancel();
    let ctx = RunContext::new(test_config(&scratch.path().join("run"))).with_cancel_token(cancel);
    let err = analyzer(
        ctx,
        shared(FakeRegistry::wordpress_org()),
        shared(FakeFetcher::wordpress_org()),
    )
    .run(live.path(), download())
    .await
    .unwrap_err();
    assert!(matches!(err, WpaError::Cancelled));
}

#[tokio::test]
async fn version_override_picks_the_reference_release() {
    let live = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    live_install(live.path());

    let fetcher = shared(
        FakeFetcher::wordpress_org()
            .serving("https://wordpress.org/wordpress-6.4.zip", core_archive()),
    );
    let ctx = RunContext::new(test_config(&scratch.path().join("run")));
    let report = analyzer(ctx, shared(FakeRegistry::wordpress_org()), fetcher.clone())
        .run(
            live.path(),
            ReferenceSource::Download {
                version_override: Some("6.4".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(report.core_version.as_deref(), Some("6.4"));
    assert!(fetcher
        .requested
        .lock()
        .unwrap()
        .contains(&"https://wordpress.org/wordpress-6.4.zip".to_string()));
}

#[tokio::test]
async fn two_installations_compare_directly() {
    let live = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    live_install(live.path());
    live_install(other.path());
    fs::remove_file(other.path().join("wp-config.php")).unwrap();
    fs::write(other.path().join("wp-load.php"), "<?php // other load").unwrap();

    let fetcher = shared(FakeFetcher::default());
    let ctx = RunContext::new(test_config(&other.path().join("unused-scratch")));
    let report = analyzer(ctx, shared(FakeRegistry::default()), fetcher.clone())
        .run(live.path(), ReferenceSource::Existing(other.path().to_path_buf()))
        .await
        .unwrap();

    assert_eq!(report.comparison.diff, vec!["wp-load.php"]);
    assert_eq!(report.comparison.extra, vec!["wp-config.php"]);
    assert!(report.comparison.missing.is_empty());
    assert!(report.unresolved.is_empty());
    assert_eq!(fetcher.request_count(), 0);
}

#[tokio::test]
async fn not_wordpress_is_rejected() {
    let live = tempfile::tempdir().unwrap();
    write_files(live.path(), &[("index.html", "<html></html>")]);
    let ctx = RunContext::new(test_config(&live.path().join("scratch")));
    let err = analyzer(
        ctx,
        shared(FakeRegistry::default()),
        shared(FakeFetcher::default()),
    )
    .run(live.path(), download())
    .await
    .unwrap_err();
    assert!(matches!(err, WpaError::NotWordPress(_)));
}
