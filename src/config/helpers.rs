// src/config/helpers.rs
// Helpers for overriding a loaded config with environment variables.

use std::env;

pub fn env_override(key: &str, current: &mut String) {
    if let Ok(v) = env::var(key) {
        *current = v;
    }
}

pub fn env_override_parsed<T: std::str::FromStr>(key: &str, current: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *current = parsed;
        }
    }
}
