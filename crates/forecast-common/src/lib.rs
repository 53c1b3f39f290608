//! Common types and utilities shared across the forecast store crates.

pub mod time;

pub use time::{
    date_range, duration_range, format_compact, format_date, format_lead, is_latest, parse_duration,
    parse_timestamp, resolve_latest, Frequency, TimeError, TimeResult,
};
