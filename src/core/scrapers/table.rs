//! Results table parsing
//!
//! Shared between the paginated-HTML scraper and the API scraper's HTML
//! fallback. A results table is identified by its heading labels (must carry
//! both "bib" and "name"); the header row becomes a column map and each body
//! row maps through it into a scraped result.

use super::{ScrapedCheckpoint, ScrapedResult};
use crate::core::checkpoints::{checkpoint_kind, normalize_checkpoint_name};
use crate::core::types::ResultStatus;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// Column positions resolved from header labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub position: Option<usize>,
    pub bib: Option<usize>,
    pub name: Option<usize>,
    pub country: Option<usize>,
    pub finish: Option<usize>,
    pub gender_position: Option<usize>,
    pub category_position: Option<usize>,
    /// (column index, canonical checkpoint name), in header order
    pub checkpoints: Vec<(usize, String)>,
}

static CHECKPOINT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?(?:km|mi)$").expect("checkpoint header regex"));

/// Whether a canonical header token names a timing checkpoint column
pub fn is_checkpoint_header(normalized: &str) -> bool {
    CHECKPOINT_HEADER.is_match(normalized)
        || matches!(normalized, "T1" | "T2" | "swim" | "bike" | "run")
}

/// Build a column map from header labels.
///
/// Returns `None` unless both a bib and a name column are present; that pair
/// is what distinguishes a results table from layout tables on the page.
pub fn build_column_map(headers: &[String]) -> Option<ColumnMap> {
    let mut map = ColumnMap::default();

    for (idx, raw) in headers.iter().enumerate() {
        let label = raw.trim().to_lowercase();

        if label.contains("bib") {
            map.bib.get_or_insert(idx);
        } else if label.contains("name") {
            map.name.get_or_insert(idx);
        } else if label.contains("country") || label.contains("nat") {
            map.country.get_or_insert(idx);
        } else if (label.contains("gender") || label.contains("sex"))
            && (label.contains("rank") || label.contains("pos"))
        {
            map.gender_position.get_or_insert(idx);
        } else if (label.contains("cat") || label.contains("division"))
            && (label.contains("rank") || label.contains("pos"))
        {
            map.category_position.get_or_insert(idx);
        } else if label.contains("finish") || label == "time" {
            map.finish.get_or_insert(idx);
        } else if label == "#"
            || label.contains("pos")
            || label.contains("place")
            || label.contains("rank")
            || label.contains("overall")
        {
            map.position.get_or_insert(idx);
        } else {
            let normalized = normalize_checkpoint_name(&label);
            if is_checkpoint_header(&normalized) {
                map.checkpoints.push((idx, normalized));
            }
        }
    }

    if map.bib.is_some() && map.name.is_some() {
        Some(map)
    } else {
        None
    }
}

fn cell(cells: &[String], idx: Option<usize>) -> Option<String> {
    let value = cells.get(idx?)?.trim();
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value.to_string())
    }
}

fn cell_positive_int(cells: &[String], idx: Option<usize>) -> Option<i64> {
    cell(cells, idx)?.parse::<i64>().ok().filter(|n| *n > 0)
}

/// Map one body row through the column map.
///
/// Rows without a usable name are skipped (recoverable per row).
pub fn row_to_result(cells: &[String], map: &ColumnMap) -> Option<ScrapedResult> {
    let name = cell(cells, map.name)?;
    let mut provided = vec!["name".to_string()];

    let position = cell_positive_int(cells, map.position);
    if position.is_some() {
        provided.push("position".to_string());
    }
    let bib = cell(cells, map.bib);
    if bib.is_some() {
        provided.push("bib".to_string());
    }
    let country = cell(cells, map.country);
    if country.is_some() {
        provided.push("country".to_string());
    }
    let finish_time = cell(cells, map.finish);
    if finish_time.is_some() {
        provided.push("finish_time".to_string());
    }
    let gender_position = cell_positive_int(cells, map.gender_position);
    if gender_position.is_some() {
        provided.push("gender_position".to_string());
    }
    let category_position = cell_positive_int(cells, map.category_position);
    if category_position.is_some() {
        provided.push("category_position".to_string());
    }

    let mut checkpoints = Vec::new();
    for (order, (idx, cp_name)) in map.checkpoints.iter().enumerate() {
        if let Some(cumulative) = cell(cells, Some(*idx)) {
            checkpoints.push(ScrapedCheckpoint {
                name: cp_name.clone(),
                kind: checkpoint_kind(cp_name),
                order: (order + 1) as i64,
                split_time: None,
                cumulative_time: Some(cumulative),
                pace: None,
                segment_distance_meters: None,
            });
        }
    }

    Some(ScrapedResult {
        position,
        bib,
        name,
        gender: None,
        category: None,
        finish_time,
        gun_time: None,
        chip_time: None,
        pace: None,
        gender_position,
        category_position,
        country,
        club: None,
        age: None,
        status: ResultStatus::Finished,
        time_behind: None,
        distance_name: None,
        checkpoints,
        fields_provided: provided,
    })
}

/// Locate the results table in a document and return (headers, rows)
pub fn find_results_table(html: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").ok()?;
    let header_sel = Selector::parse("thead th, tr th").ok()?;
    let row_sel = Selector::parse("tbody tr, tr").ok()?;
    let cell_sel = Selector::parse("td").ok()?;

    for table in document.select(&table_sel) {
        let headers: Vec<String> = table
            .select(&header_sel)
            .map(|th| th.text().collect::<String>().trim().to_string())
            .collect();

        let joined = headers.join(" ").to_lowercase();
        if !(joined.contains("bib") && joined.contains("name")) {
            continue;
        }

        let rows: Vec<Vec<String>> = table
            .select(&row_sel)
            .map(|tr| {
                tr.select(&cell_sel)
                    .map(|td| td.text().collect::<String>().trim().to_string())
                    .collect::<Vec<String>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        return Some((headers, rows));
    }

    None
}

static PAGE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]page=(\d+)").expect("page param regex"));

/// Total pages advertised by pagination links.
///
/// The highest `page=N` parameter wins; a "Last" link is consulted the same
/// way. One page is assumed when no links match.
pub fn discover_total_pages(html: &str) -> usize {
    let document = Html::parse_document(html);
    let Ok(link_sel) = Selector::parse("a[href]") else {
        return 1;
    };

    let mut max_page = 1usize;
    for link in document.select(&link_sel) {
        let Some(href) = link.value().attr("href") else { continue };

        // Numbered links and the "Last" link both carry page=N; the max wins
        if let Some(cap) = PAGE_PARAM.captures(href) {
            if let Ok(page) = cap[1].parse::<usize>() {
                if page > max_page {
                    max_page = page;
                }
            }
        }
    }

    max_page
}
