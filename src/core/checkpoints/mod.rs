//! Checkpoint Taxonomy
//!
//! Canonical vocabulary for timing checkpoints: the distance catalogue,
//! expected checkpoint lists per race type, checkpoint-name normalisation and
//! the split-time parser. Validation cutoffs live in [`validation`].

pub mod validation;

use crate::core::types::{CheckpointKind, RaceType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Named distances mapped to metres
pub const DISTANCE_CATALOGUE: &[(&str, u32)] = &[
    ("5K", 5_000),
    ("10K", 10_000),
    ("15K", 15_000),
    ("10 Mile", 16_093),
    ("Half Marathon", 21_097),
    ("Marathon", 42_195),
    ("Ultra 50K", 50_000),
    ("Ultra 100K", 100_000),
    // Standard-distance (olympic) triathlon segments
    ("Triathlon Swim", 1_500),
    ("Triathlon Bike", 40_000),
    ("Triathlon Run", 10_000),
    // Sprint duathlon segments
    ("Duathlon Run 1", 5_000),
    ("Duathlon Bike", 20_000),
    ("Duathlon Run 2", 2_500),
];

/// Look up a catalogue distance by name (case-insensitive)
pub fn catalogue_distance_meters(name: &str) -> Option<u32> {
    DISTANCE_CATALOGUE
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, m)| *m)
}

static KM_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*k(?:m)?$").expect("km marker regex")
});
static MILE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*mi(?:le)?s?$").expect("mile marker regex")
});
static TRANSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^t(?:ransition)?\s*([12])$").expect("transition regex"));

/// Normalise a checkpoint name into its canonical token.
///
/// "5 km" / "5k" become "5km", "13 miles" becomes "13mi", "transition 1" and
/// "t1" become "T1", discipline words map to their tokens and finish synonyms
/// collapse to "finish". Anything unrecognised is lowercased and kept.
pub fn normalize_checkpoint_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();

    if let Some(cap) = KM_MARKER.captures(&lower) {
        return format!("{}km", &cap[1]);
    }
    if let Some(cap) = MILE_MARKER.captures(&lower) {
        return format!("{}mi", &cap[1]);
    }
    if let Some(cap) = TRANSITION.captures(&lower) {
        return format!("T{}", &cap[1]);
    }

    match lower.as_str() {
        "swim" => "swim".to_string(),
        "bike" | "cycle" => "bike".to_string(),
        "run" => "run".to_string(),
        "finish" | "final" | "end" => "finish".to_string(),
        _ => lower,
    }
}

/// Classify a canonical checkpoint name
pub fn checkpoint_kind(normalized: &str) -> CheckpointKind {
    match normalized {
        "T1" | "T2" => CheckpointKind::Transition,
        "swim" | "bike" | "run" => CheckpointKind::Discipline,
        s if s.starts_with("run") || s.starts_with("leg") => CheckpointKind::Discipline,
        _ => CheckpointKind::Distance,
    }
}

/// Detect the race type from a free-form distance name
pub fn detect_race_type(distance_name: &str) -> RaceType {
    let lower = distance_name.to_lowercase();

    if lower.contains("triathlon") || lower.contains("ironman") || lower.contains("tri") {
        RaceType::Triathlon
    } else if lower.contains("duathlon") {
        RaceType::Duathlon
    } else if lower.contains("relay") || lower.contains("ekiden") {
        RaceType::Relay
    } else if lower.contains("ultra") || lower.contains("50k") || lower.contains("100k") {
        RaceType::Ultra
    } else {
        RaceType::Running
    }
}

/// Expected checkpoint list for a race type and distance.
///
/// Running and ultra courses carry 5km markers up to (but excluding) the full
/// distance plus "finish"; multisport courses carry their segment boundaries.
pub fn expected_checkpoints(race_type: RaceType, distance_meters: u32) -> Vec<String> {
    match race_type {
        RaceType::Running | RaceType::Ultra => {
            let mut names = Vec::new();
            let mut marker = 5_000u32;
            while marker < distance_meters {
                names.push(format!("{}km", marker / 1_000));
                marker += 5_000;
            }
            names.push("finish".to_string());
            names
        }
        RaceType::Triathlon => vec![
            "swim".to_string(),
            "T1".to_string(),
            "bike".to_string(),
            "T2".to_string(),
            "run".to_string(),
            "finish".to_string(),
        ],
        RaceType::Duathlon => vec![
            "run1".to_string(),
            "T1".to_string(),
            "bike".to_string(),
            "T2".to_string(),
            "run2".to_string(),
            "finish".to_string(),
        ],
        RaceType::Relay => {
            let mut names: Vec<String> = (1..=4).map(|n| format!("leg{}", n)).collect();
            names.push("finish".to_string());
            names
        }
    }
}

static KM_DISTANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*k(?:m)?\b").expect("km distance regex")
});
static MILE_DISTANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*mi(?:le)?s?\b").expect("mile distance regex")
});

/// Best-effort course length for a free-form distance name.
///
/// The catalogue wins; otherwise "10k" / "6 miles" style names are read
/// directly.
pub fn distance_meters_from_name(name: &str) -> Option<u32> {
    if let Some(meters) = catalogue_distance_meters(name) {
        return Some(meters);
    }

    let lower = name.to_lowercase();
    if lower.contains("half marathon") {
        return Some(21_097);
    }
    if lower.contains("marathon") {
        return Some(42_195);
    }

    if let Some(cap) = KM_DISTANCE.captures(&lower) {
        let km: f64 = cap[1].parse().ok()?;
        return Some((km * 1_000.0).round() as u32);
    }
    if let Some(cap) = MILE_DISTANCE.captures(&lower) {
        let miles: f64 = cap[1].parse().ok()?;
        return Some((miles * 1_609.344).round() as u32);
    }

    None
}

/// Parse a clock token into seconds.
///
/// Two components are MM:SS, three are HH:MM:SS. Any non-numeric component
/// invalidates the parse.
pub fn parse_time(raw: &str) -> Option<u32> {
    let parts: Vec<&str> = raw.trim().split(':').collect();

    let nums: Option<Vec<u32>> = parts.iter().map(|p| p.trim().parse::<u32>().ok()).collect();
    let nums = nums?;

    match nums.as_slice() {
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3_600 + m * 60 + s),
        _ => None,
    }
}

/// Render seconds as H:MM:SS (or MM:SS under an hour)
pub fn format_time(total_seconds: u32) -> String {
    let h = total_seconds / 3_600;
    let m = (total_seconds % 3_600) / 60;
    let s = total_seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_km_markers() {
        assert_eq!(normalize_checkpoint_name("5 km"), "5km");
        assert_eq!(normalize_checkpoint_name("5km"), "5km");
        assert_eq!(normalize_checkpoint_name("5k"), "5km");
        assert_eq!(normalize_checkpoint_name("21.1 km"), "21.1km");
    }

    #[test]
    fn test_normalize_mile_markers() {
        assert_eq!(normalize_checkpoint_name("13 miles"), "13mi");
        assert_eq!(normalize_checkpoint_name("13 mi"), "13mi");
        assert_eq!(normalize_checkpoint_name("1 mile"), "1mi");
    }

    #[test]
    fn test_normalize_transitions() {
        assert_eq!(normalize_checkpoint_name("transition 1"), "T1");
        assert_eq!(normalize_checkpoint_name("T1"), "T1");
        assert_eq!(normalize_checkpoint_name("t2"), "T2");
        assert_eq!(normalize_checkpoint_name("Transition 2"), "T2");
    }

    #[test]
    fn test_normalize_disciplines_and_finish() {
        assert_eq!(normalize_checkpoint_name("Swim"), "swim");
        assert_eq!(normalize_checkpoint_name("cycle"), "bike");
        assert_eq!(normalize_checkpoint_name("Run"), "run");
        assert_eq!(normalize_checkpoint_name("FINAL"), "finish");
        assert_eq!(normalize_checkpoint_name("end"), "finish");
        assert_eq!(normalize_checkpoint_name("Finish"), "finish");
    }

    #[test]
    fn test_normalize_unknown_passthrough() {
        assert_eq!(normalize_checkpoint_name("Summit Gate"), "summit gate");
    }

    #[test]
    fn test_checkpoint_kind() {
        assert_eq!(checkpoint_kind("5km"), CheckpointKind::Distance);
        assert_eq!(checkpoint_kind("T1"), CheckpointKind::Transition);
        assert_eq!(checkpoint_kind("swim"), CheckpointKind::Discipline);
        assert_eq!(checkpoint_kind("leg2"), CheckpointKind::Discipline);
    }

    #[test]
    fn test_detect_race_type() {
        assert_eq!(detect_race_type("Sprint Triathlon"), RaceType::Triathlon);
        assert_eq!(detect_race_type("Ironman 70.3"), RaceType::Triathlon);
        assert_eq!(detect_race_type("City Duathlon"), RaceType::Duathlon);
        assert_eq!(detect_race_type("Corporate Relay"), RaceType::Relay);
        assert_eq!(detect_race_type("Hill Ekiden"), RaceType::Relay);
        assert_eq!(detect_race_type("Ultra Trail 50k"), RaceType::Ultra);
        assert_eq!(detect_race_type("100k Night Run"), RaceType::Ultra);
        assert_eq!(detect_race_type("Half Marathon"), RaceType::Running);
    }

    #[test]
    fn test_expected_checkpoints_running() {
        assert_eq!(expected_checkpoints(RaceType::Running, 10_000), vec!["5km", "finish"]);
        assert_eq!(
            expected_checkpoints(RaceType::Running, 21_097),
            vec!["5km", "10km", "15km", "20km", "finish"]
        );
    }

    #[test]
    fn test_expected_checkpoints_multisport() {
        assert_eq!(
            expected_checkpoints(RaceType::Triathlon, 51_500),
            vec!["swim", "T1", "bike", "T2", "run", "finish"]
        );
        assert_eq!(
            expected_checkpoints(RaceType::Duathlon, 27_500),
            vec!["run1", "T1", "bike", "T2", "run2", "finish"]
        );
    }

    #[test]
    fn test_expected_checkpoints_relay() {
        let cps = expected_checkpoints(RaceType::Relay, 42_195);
        assert_eq!(cps, vec!["leg1", "leg2", "leg3", "leg4", "finish"]);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("25:30"), Some(25 * 60 + 30));
        assert_eq!(parse_time("1:45:12"), Some(3_600 + 45 * 60 + 12));
        assert_eq!(parse_time(" 2:05:00 "), Some(2 * 3_600 + 5 * 60));
        assert_eq!(parse_time("dnf"), None);
        assert_eq!(parse_time("1:xx:00"), None);
        assert_eq!(parse_time("90"), None);
        assert_eq!(parse_time(""), None);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(25 * 60 + 30), "25:30");
        assert_eq!(format_time(3_600 + 45 * 60 + 12), "1:45:12");
    }

    #[test]
    fn test_distance_meters_from_name() {
        assert_eq!(distance_meters_from_name("Half Marathon"), Some(21_097));
        assert_eq!(distance_meters_from_name("Marathon Relay"), Some(42_195));
        assert_eq!(distance_meters_from_name("10K"), Some(10_000));
        assert_eq!(distance_meters_from_name("City 6 mile classic"), Some(9_656));
        assert_eq!(distance_meters_from_name("21.1km"), Some(21_100));
        assert_eq!(distance_meters_from_name("Fun Run"), None);
    }

    #[test]
    fn test_catalogue_lookup() {
        assert_eq!(catalogue_distance_meters("Half Marathon"), Some(21_097));
        assert_eq!(catalogue_distance_meters("marathon"), Some(42_195));
        assert_eq!(catalogue_distance_meters("Vertical K"), None);
    }
}
