//! Athlete Matcher Integration Tests
//!
//! Candidate generation, the auto-link uniqueness rule and the inverse
//! suggestion direction, all against a seeded database.

use chrono::Utc;
use racefeed::core::db::{result_dedup_hash, Athlete, Database, Event, RaceResult};
use racefeed::core::matcher::{AthleteMatcher, AutoMatchOutcome, AUTO_LINK_CONFIDENCE};
use racefeed::core::types::{normalize_name, ResultStatus};
use uuid::Uuid;

async fn test_db() -> Database {
    let db = Database::connect_memory().await.unwrap();
    db.migrate().await.unwrap();
    db
}

async fn seed_event(db: &Database) -> String {
    let event = Event {
        id: Uuid::new_v4().to_string(),
        url: "https://results.example.com/e/match".to_string(),
        organiser: "evochip".to_string(),
        name: "Spring Classic".to_string(),
        event_date: "2026-04-05".parse().unwrap(),
        location: None,
        metadata: None,
        scraped_at: None,
        created_at: Utc::now(),
    };
    db.insert_event(&event).await.unwrap()
}

async fn seed_athlete(db: &Database, name: &str) -> Athlete {
    let athlete = Athlete {
        id: Uuid::new_v4().to_string(),
        display_name: name.to_string(),
        normalized_name: normalize_name(name),
        gender: None,
        birth_date: None,
        country: None,
        external_user_id: None,
        created_at: Utc::now(),
    };
    db.insert_athlete(&athlete).await.unwrap();
    athlete
}

async fn seed_result(db: &Database, event_id: &str, name: &str, position: i64) -> RaceResult {
    let normalized = normalize_name(name);
    let result = RaceResult {
        id: Uuid::new_v4().to_string(),
        event_id: event_id.to_string(),
        event_distance_id: None,
        athlete_id: None,
        dedup_hash: result_dedup_hash(event_id, Some(position), None, &normalized),
        overall_position: Some(position),
        bib: None,
        display_name: name.to_string(),
        normalized_name: normalized,
        gender: None,
        category: None,
        finish_time: Some("40:00".to_string()),
        gun_time: None,
        chip_time: None,
        pace: None,
        gender_position: None,
        category_position: None,
        country: None,
        club: None,
        age: None,
        status: ResultStatus::Finished,
        time_behind: None,
        validation: None,
        metadata: None,
        created_at: Utc::now(),
    };
    db.insert_results_batch(std::slice::from_ref(&result))
        .await
        .unwrap();
    result
}

#[tokio::test]
async fn accented_result_auto_links_to_single_candidate() {
    let db = test_db().await;
    let event_id = seed_event(&db).await;
    let athlete = seed_athlete(&db, "Jose Garcia").await;
    let result = seed_result(&db, &event_id, "José García", 1).await;

    let matcher = AthleteMatcher::new(db.clone());
    let outcome = matcher.auto_match(&result).await.unwrap();

    match outcome {
        AutoMatchOutcome::Linked {
            athlete_id,
            confidence,
        } => {
            assert_eq!(athlete_id, athlete.id);
            assert!(confidence >= AUTO_LINK_CONFIDENCE);
        }
        AutoMatchOutcome::Skipped { reason } => panic!("expected link, skipped: {}", reason),
    }

    let linked = db.get_result_by_id(&result.id).await.unwrap().unwrap();
    assert_eq!(linked.athlete_id.as_deref(), Some(athlete.id.as_str()));
}

#[tokio::test]
async fn second_close_candidate_blocks_auto_link() {
    let db = test_db().await;
    let event_id = seed_event(&db).await;
    seed_athlete(&db, "Jose Garcia").await;
    // Close enough to clear the confidence bar too
    seed_athlete(&db, "Jose Garcias").await;
    let result = seed_result(&db, &event_id, "José García", 1).await;

    let matcher = AthleteMatcher::new(db.clone());

    // Sanity: both candidates clear the bar
    let candidates = matcher.match_result(&result).await.unwrap();
    let qualifying = candidates
        .iter()
        .filter(|c| c.confidence >= AUTO_LINK_CONFIDENCE)
        .count();
    assert!(qualifying >= 2, "expected an ambiguous pair, got {}", qualifying);

    let outcome = matcher.auto_match(&result).await.unwrap();
    assert!(matches!(outcome, AutoMatchOutcome::Skipped { .. }));

    let unlinked = db.get_result_by_id(&result.id).await.unwrap().unwrap();
    assert!(unlinked.athlete_id.is_none());
}

#[tokio::test]
async fn no_candidate_leaves_result_for_review() {
    let db = test_db().await;
    let event_id = seed_event(&db).await;
    seed_athlete(&db, "Wilhelmina Brook").await;
    let result = seed_result(&db, &event_id, "José García", 1).await;

    let matcher = AthleteMatcher::new(db.clone());
    let outcome = matcher.auto_match(&result).await.unwrap();
    assert!(matches!(outcome, AutoMatchOutcome::Skipped { .. }));
}

#[tokio::test]
async fn auto_match_pass_counts_outcomes() {
    let db = test_db().await;
    let event_id = seed_event(&db).await;
    seed_athlete(&db, "Jose Garcia").await;
    seed_result(&db, &event_id, "José García", 1).await;
    seed_result(&db, &event_id, "Totally Unknown", 2).await;

    let matcher = AthleteMatcher::new(db.clone());
    let (linked, skipped) = matcher.auto_match_unlinked(50).await.unwrap();
    assert_eq!(linked, 1);
    assert_eq!(skipped, 1);
}

#[tokio::test]
async fn suggestions_flow_from_athlete_to_results() {
    let db = test_db().await;
    let event_id = seed_event(&db).await;
    let athlete = seed_athlete(&db, "Jose Garcia").await;
    // Contains the athlete's normalised name
    seed_result(&db, &event_id, "Jose Garcia Lopez", 1).await;
    seed_result(&db, &event_id, "Unrelated Runner", 2).await;

    let matcher = AthleteMatcher::new(db.clone());
    let suggestions = matcher
        .suggest_matches_for_athlete(&athlete.id, 50)
        .await
        .unwrap();

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].0.display_name, "Jose Garcia Lopez");
    assert!(suggestions[0].1 > 0);
}
