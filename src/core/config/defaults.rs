//! Default values for configuration fields

pub fn default_true() -> bool {
    true
}

pub fn default_storage_mode() -> String {
    "database".to_string()
}

pub fn default_tick_interval_secs() -> u64 {
    60
}

pub fn default_politeness_delay_ms() -> u64 {
    500
}
