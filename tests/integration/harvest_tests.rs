//! End-to-end harvest runs over HTTP

use crate::common::{config, listing_page, orchestrator, terms, CAPTCHA_PAGE};
use shelf_scout::harvest::StrategyRegistry;
use shelf_scout::state::JobStatus;
use shelf_scout::storage::{lock, open_storage, shared, Storage};
use shelf_scout::Orchestrator;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, source: &str, page: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/search", source)))
        .and(query_param("page", page))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_stores_canonical_records() {
    let server = MockServer::start().await;
    mount_page(&server, "shop", "1", ResponseTemplate::new(200).set_body_string(listing_page("a", 3))).await;
    mount_page(&server, "shop", "2", ResponseTemplate::new(200).set_body_string(listing_page("b", 2))).await;

    let (orch, storage) = orchestrator(config(&server.uri(), &["shop"], 2, ""));
    let summary = orch.run(&terms(&["desk lamp"]), 1).await;

    assert_eq!(summary.jobs_created, 1);
    assert_eq!(summary.jobs_completed, 1);
    assert_eq!(summary.records_inserted, 5);

    let job = orch.tracker().get(1).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.item_count, Some(5));
    assert_eq!(job.search_term, "desk lamp");

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_records().unwrap(), 5);
    assert_eq!(storage.count_records_by_source().unwrap(), vec![("shop".to_string(), 5)]);

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.query().unwrap_or("").contains("q=desk+lamp")));
}

#[tokio::test]
async fn test_hard_block_on_second_of_three_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "shop", "1", ResponseTemplate::new(200).set_body_string(listing_page("a", 2))).await;
    Mock::given(method("GET"))
        .and(path("/shop/search"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(403).set_body_string(listing_page("x", 1)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/search"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page("c", 2)))
        .expect(0)
        .mount(&server)
        .await;

    let (orch, storage) = orchestrator(config(&server.uri(), &["shop"], 3, ""));
    let summary = orch.run(&terms(&["lamp"]), 1).await;

    assert_eq!(summary.jobs_failed, 1);
    assert_eq!(summary.hard_blocks, 1);

    let job = orch.tracker().get(1).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason.as_deref(), Some("hard_block"));
    assert!(job.completed_at.is_some());
    assert_eq!(lock(&storage).unwrap().count_records().unwrap(), 2);

    server.verify().await;
}

#[tokio::test]
async fn test_soft_block_exhausted_on_last_page_completes_job() {
    let server = MockServer::start().await;
    mount_page(&server, "shop", "1", ResponseTemplate::new(200).set_body_string(listing_page("a", 4))).await;
    Mock::given(method("GET"))
        .and(path("/shop/search"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CAPTCHA_PAGE))
        .expect(2)
        .mount(&server)
        .await;

    let (orch, _) = orchestrator(config(&server.uri(), &["shop"], 2, ""));
    let summary = orch.run(&terms(&["lamp"]), 1).await;

    assert_eq!(summary.jobs_completed, 1);
    assert_eq!(summary.soft_blocks, 1);

    let job = orch.tracker().get(1).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.item_count, Some(4));

    // The soft block widened the governor window for the source
    assert!(orch.governor().snapshot("shop").unwrap().consecutive_failures >= 2);

    server.verify().await;
}

#[tokio::test]
async fn test_soft_blocks_on_both_pages_keep_first_page_records() {
    let server = MockServer::start().await;
    // Page 1 answers with a challenge once, then with its listings
    Mock::given(method("GET"))
        .and(path("/shop/search"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CAPTCHA_PAGE))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "shop", "1", ResponseTemplate::new(200).set_body_string(listing_page("a", 3))).await;
    Mock::given(method("GET"))
        .and(path("/shop/search"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CAPTCHA_PAGE))
        .expect(2)
        .mount(&server)
        .await;

    let (orch, storage) = orchestrator(config(&server.uri(), &["shop"], 2, ""));
    let summary = orch.run(&terms(&["lamp"]), 1).await;

    assert_eq!(summary.jobs_completed, 1);
    assert_eq!(summary.records_inserted, 3);
    assert_eq!(summary.records_skipped_duplicate, 0);
    assert_eq!(summary.soft_blocks, 1);

    let job = orch.tracker().get(1).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.item_count, Some(3));
    assert_eq!(lock(&storage).unwrap().count_records().unwrap(), 3);

    server.verify().await;
}

#[tokio::test]
async fn test_soft_block_with_fail_policy() {
    let server = MockServer::start().await;
    mount_page(&server, "shop", "1", ResponseTemplate::new(200).set_body_string(CAPTCHA_PAGE)).await;

    let (orch, _) = orchestrator(config(&server.uri(), &["shop"], 1, r#"on-soft-block = "fail""#));
    let summary = orch.run(&terms(&["lamp"]), 1).await;

    assert_eq!(summary.jobs_failed, 1);
    assert_eq!(
        orch.tracker().get(1).unwrap().failure_reason.as_deref(),
        Some("soft_block")
    );
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/search"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "shop", "1", ResponseTemplate::new(200).set_body_string(listing_page("a", 1))).await;

    let (orch, _) = orchestrator(config(&server.uri(), &["shop"], 1, ""));
    let summary = orch.run(&terms(&["lamp"]), 1).await;

    assert_eq!(summary.jobs_completed, 1);
    assert_eq!(summary.records_inserted, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_links_across_sources_are_skipped() {
    let server = MockServer::start().await;
    // Both sources list the same product links on the same host
    for source in ["alpha", "beta"] {
        mount_page(&server, source, "1", ResponseTemplate::new(200).set_body_string(listing_page("same", 3))).await;
    }

    let (orch, storage) = orchestrator(config(&server.uri(), &["alpha", "beta"], 1, ""));
    let summary = orch.run(&terms(&["lamp"]), 1).await;

    assert_eq!(summary.jobs_completed, 2);
    assert_eq!(summary.records_inserted, 3);
    assert_eq!(summary.records_skipped_duplicate, 3);
    assert_eq!(lock(&storage).unwrap().count_records().unwrap(), 3);
}

#[tokio::test]
async fn test_parallel_run_is_faster_than_sequential() {
    let server = MockServer::start().await;
    for source in ["alpha", "beta"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}/search", source)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(listing_page(source, 1))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;
    }

    let (orch, _) = orchestrator(config(&server.uri(), &["alpha", "beta"], 1, ""));
    let summary = orch
        .run(&terms(&["t1", "t2", "t3", "t4", "t5"]), 3)
        .await;

    assert_eq!(summary.jobs_created, 10);
    assert_eq!(summary.jobs_completed, 10);
    assert!(
        summary.elapsed < Duration::from_millis(800),
        "ten 100ms fetches at parallelism 3 took {:?}",
        summary.elapsed
    );
}

#[tokio::test]
async fn test_cancellation_fails_current_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page("slow", 1))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let (orch, _) = orchestrator(config(&server.uri(), &["shop"], 5, ""));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let summary = orch
        .run_with_cancel(&terms(&["lamp", "desk"]), 1, cancel)
        .await;

    assert_eq!(summary.jobs_created, 1);
    assert_eq!(summary.jobs_failed, 1);

    let job = orch.tracker().get(1).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason.as_deref(), Some("cancelled"));
    assert!(orch.tracker().list_pending().unwrap().is_empty());
}

#[tokio::test]
async fn test_records_persist_to_database_file() {
    let server = MockServer::start().await;
    mount_page(&server, "shop", "1", ResponseTemplate::new(200).set_body_string(listing_page("a", 2))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("scout.db");

    {
        let storage = shared(open_storage(&db_path).unwrap());
        let orch = Orchestrator::new(
            config(&server.uri(), &["shop"], 1, ""),
            storage,
            StrategyRegistry::http_default(),
        )
        .unwrap();
        orch.run(&terms(&["lamp"]), 1).await;
    }

    let reopened = open_storage(&db_path).unwrap();
    assert_eq!(reopened.count_records().unwrap(), 2);
    assert_eq!(reopened.count_jobs_by_status(JobStatus::Completed).unwrap(), 1);
}
