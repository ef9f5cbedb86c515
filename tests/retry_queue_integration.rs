//! Retry Queue Integration Tests
//!
//! Exercises the failure -> backoff -> drain -> recovery cycle against a
//! mock organiser, including the notification callouts around it.

use chrono::{Duration, Utc};
use racefeed::core::db::Database;
use racefeed::core::ingest::retry::{RetryDrainer, BACKOFF_MINUTES};
use racefeed::core::ingest::IngestionCoordinator;
use racefeed::core::notify::Notifier;
use racefeed::core::scrapers::{
    evochip::EvoChipScraper, OrganiserScraper, ProgressSender, ScrapeOptions,
};
use racefeed::core::types::JobStatus;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn results_page() -> String {
    let mut body = String::from(
        r#"<html><body><h1>Comeback 10K</h1><p>2026-06-01</p><table>
        <thead><tr><th>Pos</th><th>Bib</th><th>Name</th><th>Finish</th></tr></thead><tbody>"#,
    );
    for i in 1..=3 {
        body.push_str(&format!(
            "<tr><td>{i}</td><td>{i}</td><td>Runner {i}</td><td>40:0{i}</td></tr>"
        ));
    }
    body.push_str("</tbody></table></body></html>");
    body
}

async fn setup(notifier: Notifier) -> (Database, IngestionCoordinator) {
    let db = Database::connect_memory().await.unwrap();
    db.migrate().await.unwrap();

    let scrapers: Vec<Box<dyn OrganiserScraper>> = vec![Box::new(EvoChipScraper::new())];
    let coordinator = IngestionCoordinator::new(db.clone(), scrapers, Arc::new(notifier));
    (db, coordinator)
}

fn options() -> ScrapeOptions {
    ScrapeOptions {
        politeness_delay_ms: 0,
        ..Default::default()
    }
}

/// Pull a job's next_retry_at into the past so the drainer sees it as due
async fn force_due(db: &Database, job_id: &str) {
    sqlx::query("UPDATE scrape_jobs SET next_retry_at = ? WHERE id = ?")
        .bind(Utc::now() - Duration::minutes(1))
        .bind(job_id)
        .execute(db.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn transient_failures_recover_through_backoff() {
    let organiser = MockServer::start().await;
    // Two failing attempts, then the page comes back
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&organiser)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
        .mount(&organiser)
        .await;

    let notify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("SCRAPE FAILED"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&notify)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("SCRAPE RETRY SUCCESS"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&notify)
        .await;

    let (db, coordinator) = setup(Notifier::new(Some(notify.uri()))).await;
    let url = format!("{}/race/1", organiser.uri());

    // Attempt 1 fails: first backoff interval scheduled
    let before = Utc::now();
    let job = coordinator.enqueue("evochip", &url).await.unwrap();
    coordinator
        .run_pending_job(&job.id, &options(), &ProgressSender::noop())
        .await
        .unwrap();

    let failed = db.get_scrape_job(&job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.retry_count, 1);
    let next = failed.next_retry_at.unwrap();
    assert!(next > before + Duration::minutes(BACKOFF_MINUTES[0] - 1));
    assert!(next < before + Duration::minutes(BACKOFF_MINUTES[0] + 1));

    // Attempt 2 (drained) fails: second interval
    force_due(&db, &job.id).await;
    let drainer = RetryDrainer::new(&coordinator, options());
    let before = Utc::now();
    assert_eq!(drainer.drain().await.unwrap(), 1);

    let failed = db.get_scrape_job(&job.id).await.unwrap().unwrap();
    assert_eq!(failed.retry_count, 2);
    let next = failed.next_retry_at.unwrap();
    assert!(next > before + Duration::minutes(BACKOFF_MINUTES[1] - 1));
    assert!(next < before + Duration::minutes(BACKOFF_MINUTES[1] + 1));

    // Attempt 3 succeeds
    force_due(&db, &job.id).await;
    assert_eq!(drainer.drain().await.unwrap(), 1);

    let done = db.get_scrape_job(&job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.results_count, 3);
    assert!(done.next_retry_at.is_none());
    assert!(done.notification_sent);
}

#[tokio::test]
async fn permanent_failure_after_exhausted_retries() {
    let organiser = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&organiser)
        .await;

    let notify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("SCRAPE PERMANENTLY FAILED"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&notify)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&notify)
        .await;

    let (db, coordinator) = setup(Notifier::new(Some(notify.uri()))).await;
    let url = format!("{}/race/2", organiser.uri());

    let job = coordinator.enqueue("evochip", &url).await.unwrap();
    coordinator
        .run_pending_job(&job.id, &options(), &ProgressSender::noop())
        .await
        .unwrap();

    let drainer = RetryDrainer::new(&coordinator, options());
    for _ in 0..3 {
        force_due(&db, &job.id).await;
        assert_eq!(drainer.drain().await.unwrap(), 1);
    }

    // Four attempts total, no further retry scheduled
    let job = db.get_scrape_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 4);
    assert!(job.next_retry_at.is_none());
    assert!(job.is_permanently_failed());
    assert!(job.notification_sent);

    // A further drain finds nothing to do
    assert_eq!(drainer.drain().await.unwrap(), 0);
}

#[tokio::test]
async fn drained_job_is_claimed_exactly_once() {
    let organiser = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
        .mount(&organiser)
        .await;

    let (db, coordinator) = setup(Notifier::disabled()).await;
    let url = format!("{}/race/3", organiser.uri());

    let job = coordinator.enqueue("evochip", &url).await.unwrap();
    db.mark_job_failed(&job.id, "transport", Some(Utc::now() - Duration::minutes(1)))
        .await
        .unwrap();

    // A racing drainer already took the job
    assert!(db.claim_job_for_retry(&job.id, Utc::now()).await.unwrap());

    let drainer = RetryDrainer::new(&coordinator, options());
    assert_eq!(drainer.drain().await.unwrap(), 0);
}
