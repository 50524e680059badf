//! Data models for Star Wars API entities.
//!
//! This module contains:
//!
//! - `Character`, `CharacterPage`: paginated people records
//! - `Planet`: homeworld details for the character view
//! - `CharacterFilter`: client-side search and filter selections

pub mod character;
pub mod filter;

pub use character::{total_pages, Character, CharacterPage, Planet, PAGE_SIZE};
pub use filter::{unique_homeworlds, unique_species, CharacterFilter};
