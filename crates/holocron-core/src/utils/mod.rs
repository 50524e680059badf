//! Utility functions for string formatting and manipulation.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{
    contains_ignore_case, display_or_unknown, format_date, short_resource_name, truncate,
};
