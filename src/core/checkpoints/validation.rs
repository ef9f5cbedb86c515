//! Checkpoint and finish-time validation
//!
//! Monotonicity of cumulative splits, plausibility cutoffs per distance and
//! the world-record floor. Record violations are warnings, never rejections —
//! organiser clocks produce stranger things than fast runners do.

use super::format_time;

/// Upper bound on a plausible finish, by course distance in metres
const FINISH_CUTOFFS: &[(u32, u32)] = &[
    (5_000, 2 * 3_600),
    (10_000, 3 * 3_600),
    (15_000, 4 * 3_600),
    (21_097, 5 * 3_600),
    (42_195, 9 * 3_600),
    (50_000, 12 * 3_600),
    (100_000, 32 * 3_600),
];

/// World records in seconds, (distance_meters, men, women)
const WORLD_RECORDS: &[(u32, u32, u32)] = &[
    (5_000, 755, 851),        // 12:35 / 14:11 (road bests rounded)
    (10_000, 1_571, 1_745),   // 26:11 / 29:05
    (21_097, 3_380, 3_762),   // 56:20 / 1:02:42
    (42_195, 7_235, 8_125),   // 2:00:35 / 2:15:25
    (50_000, 9_480, 11_041),  // 2:38:00 / 3:04:01
    (100_000, 22_161, 23_591),
];

/// Look up the cutoff for the closest catalogued distance at or above `meters`
fn cutoff_seconds(meters: u32) -> Option<u32> {
    FINISH_CUTOFFS
        .iter()
        .find(|(d, _)| *d >= meters)
        .or_else(|| FINISH_CUTOFFS.last())
        .map(|(_, cutoff)| *cutoff)
}

fn record_seconds(meters: u32, gender: Option<&str>) -> Option<u32> {
    let (_, men, women) = WORLD_RECORDS.iter().find(|(d, _, _)| *d >= meters)?;
    match gender {
        Some(g) if g.eq_ignore_ascii_case("f") || g.to_lowercase().starts_with("w") => Some(*women),
        _ => Some(*men),
    }
}

/// Check that cumulative times never decrease.
///
/// `times` must already be ordered by checkpoint order; missing cumulative
/// values are skipped. Returns the first offending index.
pub fn first_non_monotonic(times: &[Option<u32>]) -> Option<usize> {
    let mut prev: Option<u32> = None;
    for (idx, cumulative) in times.iter().enumerate() {
        let Some(t) = cumulative else { continue };
        if let Some(p) = prev {
            if *t < p {
                return Some(idx);
            }
        }
        prev = Some(*t);
    }
    None
}

pub fn cumulative_times_monotonic(times: &[Option<u32>]) -> bool {
    first_non_monotonic(times).is_none()
}

/// Warnings for an implausible finish time on a course of `distance_meters`.
///
/// Times above the distance cutoff or below the world record are flagged;
/// neither invalidates the result.
pub fn finish_time_warnings(
    distance_meters: u32,
    finish_seconds: u32,
    gender: Option<&str>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(cutoff) = cutoff_seconds(distance_meters) {
        if finish_seconds > cutoff {
            warnings.push(format!(
                "finish time {} exceeds the {} cutoff for {}m",
                format_time(finish_seconds),
                format_time(cutoff),
                distance_meters
            ));
        }
    }

    if let Some(record) = record_seconds(distance_meters, gender) {
        if finish_seconds < record {
            warnings.push(format!(
                "finish time {} is faster than the world record {} for {}m",
                format_time(finish_seconds),
                format_time(record),
                distance_meters
            ));
        }
    }

    warnings
}
