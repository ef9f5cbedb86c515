//! Athlete Matcher
//!
//! Links scraped race results to athlete identities. Candidates shortlist by
//! substring over normalised names, then rank by a bigram similarity score.
//! Auto-linking is deliberately conservative: exactly one candidate above the
//! confidence bar, or the result stays unlinked for manual review.

pub mod stats;

use crate::core::db::{Athlete, Database, DbResult, RaceResult};
use crate::core::types::normalize_name;
use serde::{Deserialize, Serialize};

/// Candidates scoring at or above this distance are discarded (lower is
/// more similar; 0 = identical)
pub const MATCH_THRESHOLD: f64 = 0.6;

/// Looser threshold used for auto-match candidate generation
pub const AUTO_MATCH_THRESHOLD: f64 = 0.3;

/// Minimum confidence for an automatic link
pub const AUTO_LINK_CONFIDENCE: i64 = 90;

/// Substring shortlist cap
pub const CANDIDATE_LIMIT: i64 = 50;

/// A ranked athlete candidate for one result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub athlete: Athlete,
    /// Distance in [0,1]; 0 = identical
    pub score: f64,
    /// round((1 - score) * 100)
    pub confidence: i64,
}

/// Outcome of one auto-match attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AutoMatchOutcome {
    /// The result was linked to this athlete id
    Linked { athlete_id: String, confidence: i64 },
    /// Left for manual review
    Skipped { reason: String },
}

/// Bigram distance between two normalised names.
///
/// Sørensen–Dice over character bigrams: position-independent, minimum
/// match unit of two characters, 0 = identical. Any monotonic similarity
/// with the same orientation would do; the thresholds above assume this
/// scale.
pub fn name_distance(a: &str, b: &str) -> f64 {
    if a == b {
        return 0.0;
    }
    1.0 - strsim::sorensen_dice(a, b)
}

fn confidence_from_score(score: f64) -> i64 {
    ((1.0 - score) * 100.0).round() as i64
}

/// Matcher over the athletes table
pub struct AthleteMatcher {
    db: Database,
}

impl AthleteMatcher {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Ranked candidates for a normalised name, best first.
    ///
    /// Shortlists athletes whose normalised name contains the query, scores
    /// each, and drops candidates at or beyond `threshold`.
    pub async fn find_candidates(
        &self,
        normalized_name: &str,
        threshold: f64,
    ) -> DbResult<Vec<MatchCandidate>> {
        if normalized_name.is_empty() {
            return Ok(Vec::new());
        }

        let shortlist = self
            .db
            .search_athletes_by_normalized_name(normalized_name, CANDIDATE_LIMIT)
            .await?;

        let mut candidates: Vec<MatchCandidate> = shortlist
            .into_iter()
            .filter_map(|athlete| {
                let score = name_distance(normalized_name, &athlete.normalized_name);
                if score >= threshold {
                    return None;
                }
                Some(MatchCandidate {
                    confidence: confidence_from_score(score),
                    score,
                    athlete,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(candidates)
    }

    /// Candidates for a race result at the default threshold
    pub async fn match_result(&self, result: &RaceResult) -> DbResult<Vec<MatchCandidate>> {
        self.find_candidates(&result.normalized_name, MATCH_THRESHOLD)
            .await
    }

    /// Attempt to auto-link one result.
    ///
    /// Generation runs at the loose threshold; the link only happens when
    /// exactly one candidate clears the confidence bar. Two qualifying
    /// candidates mean ambiguity, so nothing is linked.
    #[tracing::instrument(skip(self, result), fields(result_id = %result.id))]
    pub async fn auto_match(&self, result: &RaceResult) -> DbResult<AutoMatchOutcome> {
        let candidates = self
            .find_candidates(&result.normalized_name, AUTO_MATCH_THRESHOLD)
            .await?;

        let qualifying: Vec<&MatchCandidate> = candidates
            .iter()
            .filter(|c| c.confidence >= AUTO_LINK_CONFIDENCE)
            .collect();

        match qualifying.as_slice() {
            [single] => {
                self.db
                    .link_result_to_athlete(&result.id, &single.athlete.id)
                    .await?;
                tracing::info!(
                    athlete_id = %single.athlete.id,
                    confidence = single.confidence,
                    "Auto-linked result to athlete"
                );
                Ok(AutoMatchOutcome::Linked {
                    athlete_id: single.athlete.id.clone(),
                    confidence: single.confidence,
                })
            }
            [] => Ok(AutoMatchOutcome::Skipped {
                reason: "no candidate above confidence bar".to_string(),
            }),
            many => {
                tracing::debug!(
                    candidates = many.len(),
                    "Ambiguous auto-match, leaving unlinked"
                );
                Ok(AutoMatchOutcome::Skipped {
                    reason: format!("{} candidates above confidence bar", many.len()),
                })
            }
        }
    }

    /// Run auto-match over unlinked results; returns (linked, skipped)
    pub async fn auto_match_unlinked(&self, limit: i64) -> DbResult<(usize, usize)> {
        let unlinked = self.db.get_unlinked_results(limit).await?;
        let mut linked = 0usize;
        let mut skipped = 0usize;

        for result in &unlinked {
            match self.auto_match(result).await? {
                AutoMatchOutcome::Linked { .. } => linked += 1,
                AutoMatchOutcome::Skipped { .. } => skipped += 1,
            }
        }

        tracing::info!(linked, skipped, "Auto-match pass finished");
        Ok((linked, skipped))
    }

    /// Inverse direction: unlinked results that plausibly belong to an
    /// athlete. Names must include one another (either way) before scoring.
    pub async fn suggest_matches_for_athlete(
        &self,
        athlete_id: &str,
        limit: i64,
    ) -> DbResult<Vec<(RaceResult, i64)>> {
        let Some(athlete) = self.db.get_athlete_by_id(athlete_id).await? else {
            return Ok(Vec::new());
        };

        let unlinked = self.db.get_unlinked_results(limit).await?;
        let mut suggestions: Vec<(RaceResult, f64)> = unlinked
            .into_iter()
            .filter(|result| {
                let a = &athlete.normalized_name;
                let r = &result.normalized_name;
                !r.is_empty() && (r.contains(a.as_str()) || a.contains(r.as_str()))
            })
            .filter_map(|result| {
                let score = name_distance(&athlete.normalized_name, &result.normalized_name);
                if score >= MATCH_THRESHOLD {
                    return None;
                }
                Some((result, score))
            })
            .collect();

        suggestions.sort_by(|a, b| {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(suggestions
            .into_iter()
            .map(|(result, score)| (result, confidence_from_score(score)))
            .collect())
    }
}

/// Create an athlete from a result's display name and link them
pub async fn create_athlete_from_result(
    db: &Database,
    result: &RaceResult,
) -> DbResult<Athlete> {
    let athlete = Athlete {
        id: uuid::Uuid::new_v4().to_string(),
        display_name: result.display_name.clone(),
        normalized_name: normalize_name(&result.display_name),
        gender: result.gender.clone(),
        birth_date: None,
        country: result.country.clone(),
        external_user_id: None,
        created_at: chrono::Utc::now(),
    };
    db.insert_athlete(&athlete).await?;
    db.link_result_to_athlete(&result.id, &athlete.id).await?;
    Ok(athlete)
}
