//! Endpoint Monitor Integration Tests
//!
//! Full probe -> persist -> edge cycle against mock organiser pages,
//! including the scheduler-driven pass.

use chrono::Utc;
use racefeed::core::db::{Database, MonitoredEndpoint};
use racefeed::core::monitor::EndpointMonitor;
use racefeed::core::notify::Notifier;
use racefeed::core::types::EndpointStatus;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(url: &str, notifier: Notifier) -> (Database, MonitoredEndpoint, EndpointMonitor) {
    let db = Database::connect_memory().await.unwrap();
    db.migrate().await.unwrap();

    let endpoint = MonitoredEndpoint {
        id: Uuid::new_v4().to_string(),
        organiser: "hopasports".to_string(),
        name: "harbour live".to_string(),
        url: url.to_string(),
        enabled: true,
        check_interval_minutes: 15,
        created_at: Utc::now(),
    };
    let id = db.insert_monitored_endpoint(&endpoint).await.unwrap();
    let endpoint = MonitoredEndpoint { id, ..endpoint };

    let monitor = EndpointMonitor::new(db.clone(), Arc::new(notifier));
    (db, endpoint, monitor)
}

fn loader_page(api_base: &str) -> String {
    format!(
        r#"<html><body><div data-results-loader="loadRaces('{api_base}', [{{&quot;race_id&quot;:1,&quot;pt&quot;:&quot;k&quot;,&quot;title&quot;:&quot;10K&quot;}}])"></div></body></html>"#
    )
    .replace("&quot;", "\"")
}

#[tokio::test]
async fn down_then_up_transition_advances_state_and_emits_edge() {
    let organiser = MockServer::start().await;
    let notify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("ENDPOINT UP"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&notify)
        .await;

    // Probe 1: the event page answers 500
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&organiser)
        .await;
    // Probe 2: page with loader, API answering a JSON object
    let api_base = format!("{}/api/results", organiser.uri());
    Mock::given(method("GET"))
        .and(path("/api/results"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"results": [{"name": "Jane"}]}"#),
        )
        .mount(&organiser)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(loader_page(&api_base)))
        .mount(&organiser)
        .await;

    let (db, endpoint, monitor) = setup(&organiser.uri(), Notifier::new(Some(notify.uri()))).await;

    // First probe persists down with one consecutive failure
    let t1 = monitor.check_endpoint(&endpoint).await.unwrap();
    assert_eq!(t1.current, EndpointStatus::Down);
    let status = db.get_endpoint_status(&endpoint.id).await.unwrap().unwrap();
    assert_eq!(status.status, EndpointStatus::Down);
    assert_eq!(status.consecutive_failures, 1);
    assert_eq!(status.http_status, Some(500));
    let first_change = status.last_status_change;

    // Second probe recovers through the embedded API and fires the edge
    let t2 = monitor.check_endpoint(&endpoint).await.unwrap();
    assert_eq!(t2.previous, EndpointStatus::Down);
    assert_eq!(t2.current, EndpointStatus::Up);
    assert!(t2.changed);

    let status = db.get_endpoint_status(&endpoint.id).await.unwrap().unwrap();
    assert_eq!(status.status, EndpointStatus::Up);
    assert!(status.has_results);
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.last_status_change >= first_change);

    // Both probes are in the append-only history
    let history = db.get_endpoint_history(&endpoint.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn steady_status_does_not_advance_last_change() {
    let organiser = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>calm</html>"))
        .mount(&organiser)
        .await;

    let (db, endpoint, monitor) = setup(&organiser.uri(), Notifier::disabled()).await;

    monitor.check_endpoint(&endpoint).await.unwrap();
    let first = db.get_endpoint_status(&endpoint.id).await.unwrap().unwrap();

    let t = monitor.check_endpoint(&endpoint).await.unwrap();
    assert!(!t.changed);
    let second = db.get_endpoint_status(&endpoint.id).await.unwrap().unwrap();
    assert_eq!(second.last_status_change, first.last_status_change);
    assert!(second.last_checked >= first.last_checked);
}

#[tokio::test]
async fn monitor_pass_only_checks_due_endpoints() {
    let organiser = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&organiser)
        .await;

    let (db, endpoint, monitor) = setup(&organiser.uri(), Notifier::disabled()).await;

    // First pass: never checked, so it runs
    assert_eq!(monitor.run_monitor_pass().await.unwrap(), 1);
    // Second pass inside the interval: nothing due
    assert_eq!(monitor.run_monitor_pass().await.unwrap(), 0);

    // Disabled endpoints never qualify
    db.set_endpoint_enabled(&endpoint.id, false).await.unwrap();
    sqlx::query("DELETE FROM endpoint_status_current WHERE endpoint_id = ?")
        .bind(&endpoint.id)
        .execute(db.pool())
        .await
        .unwrap();
    assert_eq!(monitor.run_monitor_pass().await.unwrap(), 0);
}
