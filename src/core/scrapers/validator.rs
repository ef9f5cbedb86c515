//! Scraped payload validation
//!
//! Completeness scoring and field-population statistics over a full
//! [`ScrapedResults`] payload. A missing name is the only critical error;
//! everything else surfaces as warnings so a thin results page still ingests.

use super::{ScrapedResult, ScrapedResults};
use crate::core::checkpoints::validation::first_non_monotonic;
use crate::core::checkpoints::parse_time;
use std::collections::{HashMap, HashSet};

/// Fields that must appear on most rows before the payload looks healthy
const CORE_FIELDS: &[&str] = &["position", "bib", "name", "finish_time"];

/// Non-split fields checked against the population warning threshold
const POPULATION_FIELDS: &[&str] = &[
    "position",
    "bib",
    "name",
    "gender",
    "category",
    "finish_time",
    "country",
];

/// Warn when a field is present on fewer than this share of rows
const POPULATION_WARN_THRESHOLD: f64 = 50.0;

/// Statistics computed across all rows
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationStats {
    pub total: usize,
    pub rows_with_all_fields: usize,
    pub rows_with_checkpoints: usize,
    pub avg_checkpoints_per_result: f64,
    /// Per-field population, percent of rows
    pub field_population: HashMap<String, f64>,
}

/// Outcome of validating one scraped payload
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Mean field-population percentage over the core fields plus the
    /// declared distances' expected checkpoints
    pub completeness_score: f64,
    pub stats: ValidationStats,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn field_present(result: &ScrapedResult, field: &str) -> bool {
    match field {
        "position" => result.position.is_some(),
        "bib" => result.bib.is_some(),
        "name" => !result.name.trim().is_empty(),
        "gender" => result.gender.is_some(),
        "category" => result.category.is_some(),
        "finish_time" => result.finish_time.is_some(),
        "country" => result.country.is_some(),
        _ => false,
    }
}

/// Validate a scraped payload, producing errors, warnings and statistics
pub fn validate_results(payload: &ScrapedResults) -> ValidationReport {
    let results = &payload.results;
    let total = results.len();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Per-row critical check and duplicate detection
    let mut seen_bibs: HashMap<&str, usize> = HashMap::new();
    let mut seen_positions: HashMap<i64, usize> = HashMap::new();

    for (idx, result) in results.iter().enumerate() {
        if result.name.trim().is_empty() {
            errors.push(format!("row {}: missing name", idx + 1));
        }

        if let Some(bib) = result.bib.as_deref() {
            *seen_bibs.entry(bib).or_insert(0) += 1;
        }
        if let Some(pos) = result.position {
            *seen_positions.entry(pos).or_insert(0) += 1;
        }

        // Cumulative splits must never decrease along the course
        let cumulative: Vec<Option<u32>> = result
            .checkpoints
            .iter()
            .map(|cp| cp.cumulative_time.as_deref().and_then(parse_time))
            .collect();
        if let Some(bad) = first_non_monotonic(&cumulative) {
            warnings.push(format!(
                "row {}: checkpoint '{}' has a decreasing cumulative time",
                idx + 1,
                result.checkpoints[bad].name
            ));
        }
    }

    for (bib, count) in seen_bibs.iter().filter(|(_, c)| **c > 1) {
        warnings.push(format!("bib '{}' appears {} times", bib, count));
    }
    for (pos, count) in seen_positions.iter().filter(|(_, c)| **c > 1) {
        warnings.push(format!("position {} appears {} times", pos, count));
    }

    // Field population percentages
    let mut field_population: HashMap<String, f64> = HashMap::new();
    for field in POPULATION_FIELDS {
        let populated = results.iter().filter(|r| field_present(r, field)).count();
        let pct = if total > 0 {
            (populated as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        field_population.insert((*field).to_string(), pct);

        if total > 0 && pct < POPULATION_WARN_THRESHOLD {
            warnings.push(format!(
                "field '{}' present in only {:.0}% of rows",
                field, pct
            ));
        }
    }

    // Checkpoint population per expected checkpoint of the declared distances
    let expected: HashSet<&str> = payload
        .event
        .distances
        .iter()
        .flat_map(|d| d.expected_checkpoints.iter().map(String::as_str))
        .collect();
    let mut checkpoint_population: Vec<f64> = Vec::new();
    for name in &expected {
        let populated = results
            .iter()
            .filter(|r| r.checkpoints.iter().any(|cp| cp.name == *name))
            .count();
        let pct = if total > 0 {
            (populated as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        field_population.insert(format!("checkpoint:{}", name), pct);
        checkpoint_population.push(pct);
    }

    // Completeness: mean over core fields plus expected checkpoints
    let mut components: Vec<f64> = CORE_FIELDS
        .iter()
        .filter_map(|f| field_population.get(*f).copied())
        .collect();
    components.extend(checkpoint_population);
    let completeness_score = if components.is_empty() {
        0.0
    } else {
        components.iter().sum::<f64>() / components.len() as f64
    };

    let rows_with_all_fields = results
        .iter()
        .filter(|r| CORE_FIELDS.iter().all(|f| field_present(r, f)))
        .count();
    let rows_with_checkpoints = results.iter().filter(|r| !r.checkpoints.is_empty()).count();
    let total_checkpoints: usize = results.iter().map(|r| r.checkpoints.len()).sum();
    let avg_checkpoints_per_result = if total > 0 {
        total_checkpoints as f64 / total as f64
    } else {
        0.0
    };

    ValidationReport {
        errors,
        warnings,
        completeness_score,
        stats: ValidationStats {
            total,
            rows_with_all_fields,
            rows_with_checkpoints,
            avg_checkpoints_per_result,
            field_population,
        },
    }
}
