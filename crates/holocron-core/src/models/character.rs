//! Character, planet and page models as returned by the Star Wars API.

use serde::{Deserialize, Serialize};

use crate::utils::{display_or_unknown, format_date, short_resource_name};

/// The API serves this many characters per page
pub const PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub mass: String,
    #[serde(default)]
    pub hair_color: String,
    #[serde(default)]
    pub skin_color: String,
    #[serde(default)]
    pub eye_color: String,
    #[serde(default)]
    pub birth_year: String,
    #[serde(default)]
    pub gender: String,
    /// URL of the character's homeworld; empty when unknown
    #[serde(default)]
    pub homeworld: String,
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub films: Vec<String>,
    /// RFC3339 timestamp of when the record was added to the catalogue
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub url: String,
}

impl Character {
    /// Numeric id from the trailing segment of the resource URL
    pub fn id(&self) -> Option<u32> {
        short_resource_name(&self.url).parse().ok()
    }

    pub fn has_homeworld(&self) -> bool {
        !self.homeworld.is_empty()
    }

    pub fn height_display(&self) -> String {
        match display_or_unknown(&self.height) {
            "Unknown" => "Unknown".to_string(),
            cm => format!("{} cm", cm),
        }
    }

    pub fn mass_display(&self) -> String {
        match display_or_unknown(&self.mass) {
            "Unknown" => "Unknown".to_string(),
            kg => format!("{} kg", kg),
        }
    }

    pub fn films_display(&self) -> String {
        format!("{} film(s)", self.films.len())
    }

    /// Date the record was added, as DD/MM/YYYY
    pub fn created_display(&self) -> String {
        format_date(&self.created)
    }
}

/// One page of `/people/` results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterPage {
    pub count: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Character>,
}

impl CharacterPage {
    pub fn total_pages(&self) -> u32 {
        total_pages(self.count)
    }
}

/// Number of pages needed for `count` records, never less than one
pub fn total_pages(count: u32) -> u32 {
    count.div_ceil(PAGE_SIZE).max(1)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub name: String,
    #[serde(default)]
    pub terrain: String,
    #[serde(default)]
    pub climate: String,
    #[serde(default)]
    pub population: String,
    #[serde(default)]
    pub diameter: String,
    #[serde(default)]
    pub url: String,
}

impl Planet {
    pub fn terrain_display(&self) -> &str {
        display_or_unknown(&self.terrain)
    }

    pub fn climate_display(&self) -> &str {
        display_or_unknown(&self.climate)
    }

    pub fn population_display(&self) -> &str {
        display_or_unknown(&self.population)
    }

    pub fn diameter_display(&self) -> String {
        format!("{} km", display_or_unknown(&self.diameter))
    }
}
