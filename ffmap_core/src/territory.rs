//! Maps Libra place-name ids onto territory ids of the primary data source.
//!
//! The two sources number places differently, so a Libra id is matched
//! through an ordered chain of strategies. Matching is first hit in source
//! iteration order.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::data::GameData;
use crate::diagnostics::{or_placeholder, Diagnostics};
use crate::schema::{Field, SchemaMapping, Sheet};

/// Minimum length for containment matches; shorter names match too much.
const MIN_CONTAINMENT_LEN: usize = 4;

/// Built-in table for city-states whose Libra names never line up.
const KNOWN_TERRITORIES: &[(&str, u32)] = &[
    ("limsa lominsa", 128),
    ("limsa lominsa upper decks", 128),
    ("limsa lominsa lower decks", 129),
    ("uldah", 130),
    ("uldah steps of nald", 130),
    ("uldah steps of thal", 131),
    ("gridania", 132),
    ("new gridania", 132),
    ("old gridania", 133),
];

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercases, drops a leading "the", parenthetical parts and punctuation,
/// and collapses whitespace.
pub fn normalize_place_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let without_article = lowered.strip_prefix("the ").unwrap_or(&lowered);
    let without_parens = PARENTHETICAL.replace_all(without_article, " ");
    let without_punctuation = PUNCTUATION.replace_all(&without_parens, "");
    WHITESPACE
        .replace_all(without_punctuation.trim(), " ")
        .into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerritoryCandidate {
    pub territory_id: u32,
    pub place_name_id: u32,
    pub zone_id: u32,
    pub region_id: u32,
    pub place_name: String,
    pub map_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStep {
    DirectId,
    ZoneOrRegion,
    ExactName,
    Containment,
    NormalizedName,
    KnownMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerritoryMatch {
    pub territory_id: u32,
    /// 0 when the territory carries no map.
    pub map_id: u32,
    pub step: MatchStep,
}

#[derive(Debug, Clone, Default)]
pub struct TerritoryMatcher {
    candidates: Vec<TerritoryCandidate>,
    known_names: HashMap<String, u32>,
    known_ids: HashMap<u32, u32>,
    cache: HashMap<u32, Option<TerritoryMatch>>,
}

impl TerritoryMatcher {
    pub fn new(candidates: Vec<TerritoryCandidate>) -> Self {
        let known_names = KNOWN_TERRITORIES
            .iter()
            .map(|&(name, id)| (name.to_string(), id))
            .collect();
        Self {
            candidates,
            known_names,
            known_ids: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Reads every TerritoryType row in source order.
    pub fn load(
        data: &dyn GameData,
        schema: &SchemaMapping,
        diagnostics: &dyn Diagnostics,
    ) -> Self {
        let mut names: HashMap<u32, String> = HashMap::new();
        let mut candidates = Vec::new();
        for territory_id in data.row_ids(Sheet::TerritoryType.name()) {
            let Some(row) = schema.row(data, Sheet::TerritoryType, territory_id) else {
                continue;
            };
            let place_name_id =
                or_placeholder(row.link_id(Field::TerritoryPlaceName), 0, diagnostics);
            let place_name = names
                .entry(place_name_id)
                .or_insert_with(|| read_place_name(data, schema, place_name_id, diagnostics))
                .clone();
            candidates.push(TerritoryCandidate {
                territory_id,
                place_name_id,
                zone_id: or_placeholder(row.link_id(Field::TerritoryZone), 0, diagnostics),
                region_id: or_placeholder(row.link_id(Field::TerritoryRegion), 0, diagnostics),
                place_name,
                map_id: or_placeholder(row.link_id(Field::TerritoryMap), 0, diagnostics),
            });
        }
        Self::new(candidates)
    }

    /// Adds normalized-name and Libra-id entries to the known-mapping step.
    pub fn extend_known<N, I>(&mut self, names: N, ids: I)
    where
        N: IntoIterator<Item = (String, u32)>,
        I: IntoIterator<Item = (u32, u32)>,
    {
        for (name, territory_id) in names {
            self.known_names.insert(normalize_place_name(&name), territory_id);
        }
        self.known_ids.extend(ids);
    }

    pub fn candidates(&self) -> &[TerritoryCandidate] {
        &self.candidates
    }

    pub fn candidate(&self, territory_id: u32) -> Option<&TerritoryCandidate> {
        self.candidates
            .iter()
            .find(|candidate| candidate.territory_id == territory_id)
    }

    /// Resolves a Libra place-name id. The first answer for an id is cached
    /// and returned unchanged on later calls.
    pub fn resolve(
        &mut self,
        libra_place_id: u32,
        libra_name: Option<&str>,
    ) -> Option<TerritoryMatch> {
        if let Some(cached) = self.cache.get(&libra_place_id) {
            return *cached;
        }
        let found = self.match_uncached(libra_place_id, libra_name);
        self.cache.insert(libra_place_id, found);
        found
    }

    fn match_uncached(
        &self,
        libra_place_id: u32,
        libra_name: Option<&str>,
    ) -> Option<TerritoryMatch> {
        if libra_place_id != 0 {
            let by_id = self
                .find(MatchStep::DirectId, |c| c.place_name_id == libra_place_id)
                .or_else(|| self.find(MatchStep::ZoneOrRegion, |c| c.zone_id == libra_place_id))
                .or_else(|| self.find(MatchStep::ZoneOrRegion, |c| c.region_id == libra_place_id));
            if by_id.is_some() {
                return by_id;
            }
        }

        let name = libra_name.map(str::trim).filter(|name| !name.is_empty());
        if let Some(name) = name {
            if let Some(found) = self.find(MatchStep::ExactName, |c| c.place_name == name) {
                return Some(found);
            }

            let lowered = name.to_lowercase();
            if lowered.len() >= MIN_CONTAINMENT_LEN {
                let contained = self.find(MatchStep::Containment, |c| {
                    let candidate = c.place_name.to_lowercase();
                    candidate.len() >= MIN_CONTAINMENT_LEN
                        && (candidate.contains(&lowered) || lowered.contains(&candidate))
                });
                if let Some(found) = contained {
                    return Some(found);
                }
            }

            let normalized = normalize_place_name(name);
            if !normalized.is_empty() {
                let found = self.find(MatchStep::NormalizedName, |c| {
                    normalize_place_name(&c.place_name) == normalized
                });
                if found.is_some() {
                    return found;
                }
                if let Some(&territory_id) = self.known_names.get(&normalized) {
                    return Some(self.known(territory_id));
                }
            }
        }

        self.known_ids
            .get(&libra_place_id)
            .map(|&territory_id| self.known(territory_id))
    }

    fn find(
        &self,
        step: MatchStep,
        predicate: impl Fn(&TerritoryCandidate) -> bool,
    ) -> Option<TerritoryMatch> {
        self.candidates
            .iter()
            .find(|candidate| predicate(candidate))
            .map(|candidate| TerritoryMatch {
                territory_id: candidate.territory_id,
                map_id: candidate.map_id,
                step,
            })
    }

    fn known(&self, territory_id: u32) -> TerritoryMatch {
        TerritoryMatch {
            territory_id,
            map_id: self
                .candidate(territory_id)
                .map(|candidate| candidate.map_id)
                .unwrap_or(0),
            step: MatchStep::KnownMapping,
        }
    }
}

pub(crate) fn read_place_name(
    data: &dyn GameData,
    schema: &SchemaMapping,
    place_name_id: u32,
    diagnostics: &dyn Diagnostics,
) -> String {
    if place_name_id == 0 {
        return String::new();
    }
    schema
        .row(data, Sheet::PlaceName, place_name_id)
        .map(|row| or_placeholder(row.string(Field::PlaceNameName), String::new(), diagnostics))
        .unwrap_or_default()
}
