//! Scraping Pipeline Integration Tests
//!
//! End-to-end: enqueue a job against a mock organiser, run the coordinator,
//! and verify the persisted event, distances, results, checkpoints and
//! provenance rows.

use racefeed::core::db::Database;
use racefeed::core::ingest::IngestionCoordinator;
use racefeed::core::notify::Notifier;
use racefeed::core::scrapers::{
    evochip::EvoChipScraper, fields, hopasports::HopasportsScraper, table, OrganiserScraper,
    ProgressSender, ScrapeOptions,
};
use racefeed::core::types::JobStatus;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loader_page(api_base: &str) -> String {
    format!(
        r#"<html>
        <head><title>Harbour Festival</title></head>
        <body>
            <h1>Harbour Festival 2026</h1>
            <p>2026-09-20</p>
            <div data-results-loader="loadRaces('{api_base}', [{{&quot;race_id&quot;:1,&quot;pt&quot;:&quot;h1&quot;,&quot;title&quot;:&quot;Half Marathon&quot;}},{{&quot;race_id&quot;:2,&quot;pt&quot;:&quot;t2&quot;,&quot;title&quot;:&quot;10K&quot;}}])"></div>
        </body></html>"#
    )
    .replace("&quot;", "\"")
}

async fn mount_two_distance_event(server: &MockServer) -> String {
    let api_base = format!("{}/api/results", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/results"))
        .and(query_param("race_id", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"results": [
                {"pos": 1, "bib_number": "101", "full_name": "Jane Doe", "finish": "1:29:55", "5 km": "20:31", "10 km": "41:30"},
                {"pos": 2, "bib_number": "102", "full_name": "Sam Hill", "finish": "1:31:02", "5 km": "20:40", "10 km": "42:05"}
            ]}"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/results"))
        .and(query_param("race_id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"results": [
                {"pos": 1, "bib_number": "201", "full_name": "Amir Khan", "finish": "34:02"}
            ]}"#,
        ))
        .mount(server)
        .await;

    let event_path = "/events/harbour-festival";
    Mock::given(method("GET"))
        .and(path(event_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(loader_page(&api_base)))
        .mount(server)
        .await;

    format!("{}{}", server.uri(), event_path)
}

async fn coordinator(db: &Database) -> IngestionCoordinator {
    let scrapers: Vec<Box<dyn OrganiserScraper>> = vec![
        Box::new(HopasportsScraper::new()),
        Box::new(EvoChipScraper::new()),
    ];
    IngestionCoordinator::new(db.clone(), scrapers, Arc::new(Notifier::disabled()))
}

fn options() -> ScrapeOptions {
    ScrapeOptions {
        politeness_delay_ms: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn two_distance_event_persists_full_envelope() {
    let server = MockServer::start().await;
    let event_url = mount_two_distance_event(&server).await;

    let db = Database::connect_memory().await.unwrap();
    db.migrate().await.unwrap();
    let coordinator = coordinator(&db).await;

    let job = coordinator.enqueue("hopasports", &event_url).await.unwrap();
    coordinator
        .run_pending_job(&job.id, &options(), &ProgressSender::noop())
        .await
        .unwrap();

    // Job settled
    let job = db.get_scrape_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.results_count, 3);

    // Exactly one event, stamped as scraped
    let event = db.get_event_by_url(&event_url).await.unwrap().unwrap();
    assert_eq!(event.name, "Harbour Festival 2026");
    assert!(event.scraped_at.is_some());

    // Two distances with catalogue lengths
    let distances = db.get_distances_for_event(&event.id).await.unwrap();
    assert_eq!(distances.len(), 2);
    let half = distances.iter().find(|d| d.distance_name == "Half Marathon").unwrap();
    let ten_k = distances.iter().find(|d| d.distance_name == "10K").unwrap();
    assert_eq!(half.distance_meters, 21_097);
    assert_eq!(ten_k.distance_meters, 10_000);

    // Results partitioned per distance
    let results = db.get_results_for_event(&event.id).await.unwrap();
    assert_eq!(results.len(), 3);
    let half_results: Vec<_> = results
        .iter()
        .filter(|r| r.event_distance_id.as_deref() == Some(half.id.as_str()))
        .collect();
    assert_eq!(half_results.len(), 2);
    assert!(results
        .iter()
        .any(|r| r.event_distance_id.as_deref() == Some(ten_k.id.as_str())
            && r.display_name == "Amir Khan"));

    // Checkpoints preserved in order for the half results
    let jane = results.iter().find(|r| r.display_name == "Jane Doe").unwrap();
    let checkpoints = db.get_checkpoints_for_result(&jane.id).await.unwrap();
    assert_eq!(checkpoints.len(), 2);
    assert_eq!(checkpoints[0].checkpoint_name, "5km");
    assert_eq!(checkpoints[1].checkpoint_name, "10km");
    assert_eq!(checkpoints[0].cumulative_time.as_deref(), Some("20:31"));

    // Every result carries a primary provenance row naming organiser + URL
    for result in &results {
        let sources = db.get_sources_for_result(&result.id).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].organiser, "hopasports");
        assert_eq!(sources[0].source_url, event_url);
        assert!(sources[0].is_primary);
        assert!(sources[0].fields_provided.contains("\"name\""));
    }
}

#[tokio::test]
async fn rescrape_reuses_event_and_deduplicates_results() {
    let server = MockServer::start().await;
    let event_url = mount_two_distance_event(&server).await;

    let db = Database::connect_memory().await.unwrap();
    db.migrate().await.unwrap();
    let coordinator = coordinator(&db).await;

    let first = coordinator.enqueue("hopasports", &event_url).await.unwrap();
    coordinator
        .run_pending_job(&first.id, &options(), &ProgressSender::noop())
        .await
        .unwrap();
    let event_id = db.get_event_by_url(&event_url).await.unwrap().unwrap().id;

    let second = coordinator.enqueue("hopasports", &event_url).await.unwrap();
    coordinator
        .run_pending_job(&second.id, &options(), &ProgressSender::noop())
        .await
        .unwrap();

    // Same event id, no duplicated result rows
    let event_again = db.get_event_by_url(&event_url).await.unwrap().unwrap();
    assert_eq!(event_again.id, event_id);
    assert_eq!(db.count_results_for_event(&event_id).await.unwrap(), 3);

    // The second pass lands as an additional (secondary) source per result
    let results = db.get_results_for_event(&event_id).await.unwrap();
    for result in &results {
        let sources = db.get_sources_for_result(&result.id).await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources.iter().filter(|s| s.is_primary).count(), 1);
    }
}

#[tokio::test]
async fn unmatched_url_fails_without_retry() {
    let db = Database::connect_memory().await.unwrap();
    db.migrate().await.unwrap();
    let coordinator = coordinator(&db).await;

    let job = coordinator
        .enqueue("", "https://unknown-organiser.example.com/e/1")
        .await
        .unwrap();
    coordinator
        .run_pending_job(&job.id, &options(), &ProgressSender::noop())
        .await
        .unwrap();

    let job = db.get_scrape_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.next_retry_at.is_none());
    assert!(job.error_message.unwrap().contains("No scraper"));
}

#[test]
fn alias_row_and_table_row_parse_identically() {
    // The same finisher seen through the JSON alias table...
    let json_row = serde_json::json!({
        "pos": 7, "bib_number": "42", "full_name": "Jane Doe"
    });
    let from_json = fields::extract_result_fields(&json_row);

    // ...and through a results table row
    let headers: Vec<String> = ["Pos", "Bib", "Name"].iter().map(|s| s.to_string()).collect();
    let map = table::build_column_map(&headers).unwrap();
    let cells: Vec<String> = ["7", "42", "Jane Doe"].iter().map(|s| s.to_string()).collect();
    let from_table = table::row_to_result(&cells, &map).unwrap();

    assert_eq!(from_json.position, from_table.position);
    assert_eq!(from_json.bib, from_table.bib);
    assert_eq!(from_json.name.as_deref(), Some(from_table.name.as_str()));
}

#[tokio::test]
async fn truncated_static_page_without_browser_keeps_static_rows() {
    // Exactly 100 rows and no pagination: the headless heuristic fires, but
    // with no browser attached the static parse is kept with a warning.
    let server = MockServer::start().await;
    let mut body = String::from(
        r#"<html><body><h1>Night 10K</h1><p>2026-08-01</p><table>
        <thead><tr><th>Pos</th><th>Bib</th><th>Name</th><th>Finish</th></tr></thead><tbody>"#,
    );
    for i in 1..=100 {
        body.push_str(&format!(
            "<tr><td>{i}</td><td>{i}</td><td>Runner {i}</td><td>40:00</td></tr>"
        ));
    }
    body.push_str("</tbody></table></body></html>");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let scraper = EvoChipScraper::new();
    let payload = scraper
        .scrape_event(
            &format!("{}/race/7", server.uri()),
            &options(),
            &ProgressSender::noop(),
        )
        .await
        .unwrap();

    assert_eq!(payload.results.len(), 100);
    assert!(!payload.scrape_metadata.used_headless_browser);
}
