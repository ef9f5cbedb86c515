//! Result field aliases
//!
//! Organiser JSON payloads name the same logical field a dozen ways. Each
//! logical field carries an ordered list of accepted source keys; extraction
//! walks the list and records which logical fields the payload actually
//! provided, feeding `ResultSource.fields_provided`.

use serde_json::Value;

/// Logical field -> ordered accepted source keys
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("position", &["pos", "position", "rank", "place", "overall_position"]),
    ("bib", &["bib", "bib_number", "bibno", "race_number", "start_number"]),
    ("name", &["full_name", "name", "athlete_name", "display_name"]),
    ("gender", &["gender", "sex"]),
    ("category", &["category", "cat", "age_group", "division"]),
    ("finish_time", &["finish_time", "finish", "time", "result_time", "official_time"]),
    ("gun_time", &["gun_time", "gross_time"]),
    ("chip_time", &["chip_time", "net_time"]),
    ("pace", &["pace", "min_per_km"]),
    ("gender_position", &["gender_position", "gender_rank", "sex_rank"]),
    ("category_position", &["category_position", "category_rank", "cat_rank"]),
    ("country", &["country", "nationality", "nation"]),
    ("club", &["club", "team"]),
    ("age", &["age"]),
    ("status", &["status"]),
    ("time_behind", &["time_behind", "behind", "gap"]),
];

/// JSON keys that may hold the result array when the payload top level is an
/// object rather than an array
pub const RESULT_ARRAY_KEYS: &[&str] = &["results", "data", "items", "athletes"];

/// Field values extracted from one source row
#[derive(Debug, Clone, Default)]
pub struct ExtractedFields {
    pub position: Option<i64>,
    pub bib: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub finish_time: Option<String>,
    pub gun_time: Option<String>,
    pub chip_time: Option<String>,
    pub pace: Option<String>,
    pub gender_position: Option<i64>,
    pub category_position: Option<i64>,
    pub country: Option<String>,
    pub club: Option<String>,
    pub age: Option<i64>,
    pub status: Option<String>,
    pub time_behind: Option<String>,
    /// Logical field names the source actually populated
    pub provided: Vec<String>,
}

/// Parse a value that must be a positive integer.
///
/// `-`, empty strings and non-positive numbers all become `None`.
pub fn parse_positive_int(value: &Value) -> Option<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "-" {
                return None;
            }
            trimmed.parse::<i64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| *n > 0)
}

/// Parse a value as a non-empty trimmed string
fn parse_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() || s == "-" {
        None
    } else {
        Some(s)
    }
}

/// Look a logical field up through its alias chain
fn lookup<'a>(obj: &'a serde_json::Map<String, Value>, logical: &str) -> Option<&'a Value> {
    let (_, aliases) = FIELD_ALIASES.iter().find(|(name, _)| *name == logical)?;
    aliases.iter().find_map(|key| obj.get(*key)).filter(|v| !v.is_null())
}

/// Map one JSON result row through the alias table
pub fn extract_result_fields(row: &Value) -> ExtractedFields {
    let mut fields = ExtractedFields::default();
    let Some(obj) = row.as_object() else {
        return fields;
    };

    for (logical, _) in FIELD_ALIASES {
        let Some(value) = lookup(obj, logical) else { continue };

        let populated = match *logical {
            "position" => {
                fields.position = parse_positive_int(value);
                fields.position.is_some()
            }
            "bib" => {
                fields.bib = parse_string(value);
                fields.bib.is_some()
            }
            "name" => {
                fields.name = parse_string(value);
                fields.name.is_some()
            }
            "gender" => {
                fields.gender = parse_string(value);
                fields.gender.is_some()
            }
            "category" => {
                fields.category = parse_string(value);
                fields.category.is_some()
            }
            "finish_time" => {
                fields.finish_time = parse_string(value);
                fields.finish_time.is_some()
            }
            "gun_time" => {
                fields.gun_time = parse_string(value);
                fields.gun_time.is_some()
            }
            "chip_time" => {
                fields.chip_time = parse_string(value);
                fields.chip_time.is_some()
            }
            "pace" => {
                fields.pace = parse_string(value);
                fields.pace.is_some()
            }
            "gender_position" => {
                fields.gender_position = parse_positive_int(value);
                fields.gender_position.is_some()
            }
            "category_position" => {
                fields.category_position = parse_positive_int(value);
                fields.category_position.is_some()
            }
            "country" => {
                fields.country = parse_string(value);
                fields.country.is_some()
            }
            "club" => {
                fields.club = parse_string(value);
                fields.club.is_some()
            }
            "age" => {
                fields.age = parse_positive_int(value);
                fields.age.is_some()
            }
            "status" => {
                fields.status = parse_string(value);
                fields.status.is_some()
            }
            "time_behind" => {
                fields.time_behind = parse_string(value);
                fields.time_behind.is_some()
            }
            _ => false,
        };

        if populated {
            fields.provided.push((*logical).to_string());
        }
    }

    fields
}

/// Find the result array in a payload: either the top level itself, or the
/// first matching well-known key of a top-level object
pub fn find_result_array(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(arr) => Some(arr),
        Value::Object(obj) => RESULT_ARRAY_KEYS
            .iter()
            .find_map(|key| obj.get(*key))
            .and_then(|v| v.as_array()),
        _ => None,
    }
}
