//! Client-side filtering over one page of characters.

use std::collections::BTreeSet;

use super::Character;
use crate::utils::contains_ignore_case;

/// Search and filter selections. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterFilter {
    pub search: String,
    /// Species resource URL
    pub species: Option<String>,
    /// Homeworld resource URL
    pub homeworld: Option<String>,
}

impl CharacterFilter {
    pub fn is_active(&self) -> bool {
        !self.search.is_empty() || self.species.is_some() || self.homeworld.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, character: &Character) -> bool {
        let matches_search = contains_ignore_case(&character.name, &self.search);
        let matches_species = self
            .species
            .as_ref()
            .map_or(true, |s| character.species.contains(s));
        let matches_homeworld = self
            .homeworld
            .as_ref()
            .map_or(true, |h| &character.homeworld == h);

        matches_search && matches_species && matches_homeworld
    }

    pub fn apply<'a>(&self, characters: &'a [Character]) -> Vec<&'a Character> {
        characters.iter().filter(|c| self.matches(c)).collect()
    }
}

/// Sorted distinct species URLs on a page
pub fn unique_species(characters: &[Character]) -> Vec<String> {
    characters
        .iter()
        .flat_map(|c| c.species.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct homeworld URLs on a page
pub fn unique_homeworlds(characters: &[Character]) -> Vec<String> {
    characters
        .iter()
        .filter(|c| c.has_homeworld())
        .map(|c| c.homeworld.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
