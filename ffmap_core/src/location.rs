//! Best-effort quest and NPC locations.
//!
//! Libra is the authoritative coordinate source. The primary data source
//! only contributes the quest giver link and display names; territory
//! identity goes through [`TerritoryMatcher`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::coords::{libra_to_game, GameCoordinate};
use crate::data::GameData;
use crate::diagnostics::{or_placeholder, Diagnostics};
use crate::error::MapError;
use crate::libra::{LibraDatabase, LibraQuest};
use crate::markers::read_map_descriptor;
use crate::schema::{Field, SchemaMapping, Sheet};
use crate::territory::{read_place_name, TerritoryMatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationSource {
    Libra,
    Placeholder,
}

impl LocationSource {
    pub fn as_tag(self) -> &'static str {
        match self {
            LocationSource::Libra => "libra",
            LocationSource::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionStatus {
    Resolved,
    /// Coordinates exist but no territory or map could be identified.
    UnresolvedTerritory,
    NoCoordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub entity_id: u32,
    pub territory_id: u32,
    /// 0 unless `status` is `Resolved`.
    pub map_id: u32,
    pub map_x: f64,
    pub map_y: f64,
    pub map_z: f64,
    pub world_x: f32,
    pub world_y: f32,
    pub world_z: f32,
    pub object_id: u32,
    pub object_name: String,
    pub place_name: String,
    pub game: Option<GameCoordinate>,
    pub source: LocationSource,
    pub status: ResolutionStatus,
}

impl LocationRecord {
    /// Entry for an entity that should be listed without a map pin.
    pub fn placeholder(entity_id: u32) -> Self {
        Self {
            entity_id,
            territory_id: 0,
            map_id: 0,
            map_x: 0.0,
            map_y: 0.0,
            map_z: 0.0,
            world_x: 0.0,
            world_y: 0.0,
            world_z: 0.0,
            object_id: 0,
            object_name: String::new(),
            place_name: String::new(),
            game: None,
            source: LocationSource::Placeholder,
            status: ResolutionStatus::NoCoordinates,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ResolutionStatus::Resolved
    }

    pub fn source_tag(&self) -> &'static str {
        self.source.as_tag()
    }
}

pub struct LocationResolver {
    data: Arc<dyn GameData>,
    schema: Arc<SchemaMapping>,
    diagnostics: Arc<dyn Diagnostics>,
    libra: Option<LibraDatabase>,
    territories: Option<TerritoryMatcher>,
    known_names: Vec<(String, u32)>,
    known_ids: Vec<(u32, u32)>,
    quests: BTreeMap<u32, LocationRecord>,
    npcs: BTreeMap<u32, Option<LocationRecord>>,
    npc_names: HashMap<u32, String>,
}

impl LocationResolver {
    pub fn new(
        data: Arc<dyn GameData>,
        schema: Arc<SchemaMapping>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            data,
            schema,
            diagnostics,
            libra: None,
            territories: None,
            known_names: Vec::new(),
            known_ids: Vec::new(),
            quests: BTreeMap::new(),
            npcs: BTreeMap::new(),
            npc_names: HashMap::new(),
        }
    }

    pub fn with_libra(mut self, libra: LibraDatabase) -> Self {
        self.libra = Some(libra);
        self
    }

    /// Extra entries for the last step of the territory chain.
    pub fn with_known_territories<N, I>(mut self, names: N, ids: I) -> Self
    where
        N: IntoIterator<Item = (String, u32)>,
        I: IntoIterator<Item = (u32, u32)>,
    {
        self.known_names.extend(names);
        self.known_ids.extend(ids);
        if let Some(matcher) = self.territories.as_mut() {
            matcher.extend_known(self.known_names.clone(), self.known_ids.clone());
        }
        self
    }

    pub fn data(&self) -> &dyn GameData {
        self.data.as_ref()
    }

    pub fn schema(&self) -> &SchemaMapping {
        &self.schema
    }

    pub fn diagnostics(&self) -> &dyn Diagnostics {
        self.diagnostics.as_ref()
    }

    pub fn shared_diagnostics(&self) -> Arc<dyn Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    pub fn libra(&self) -> Option<&LibraDatabase> {
        self.libra.as_ref()
    }

    pub fn territories(&mut self) -> &mut TerritoryMatcher {
        let data = &self.data;
        let schema = &self.schema;
        let diagnostics = &self.diagnostics;
        let known_names = &self.known_names;
        let known_ids = &self.known_ids;
        self.territories.get_or_insert_with(|| {
            let mut matcher = TerritoryMatcher::load(data.as_ref(), schema, diagnostics.as_ref());
            matcher.extend_known(known_names.iter().cloned(), known_ids.iter().copied());
            matcher
        })
    }

    pub fn location(&self, quest_id: u32) -> Option<&LocationRecord> {
        self.quests.get(&quest_id)
    }

    pub fn npc_location(&self, npc_id: u32) -> Option<&LocationRecord> {
        self.npcs.get(&npc_id).and_then(Option::as_ref)
    }

    /// Every resolved quest and NPC location on `map_id`.
    pub fn locations_on_map(&self, map_id: u32) -> impl Iterator<Item = &LocationRecord> + '_ {
        self.quest_locations_on_map(map_id)
            .chain(self.npc_locations_on_map(map_id))
    }

    /// Resolved quest locations on `map_id`, in quest id order.
    pub fn quest_locations_on_map(
        &self,
        map_id: u32,
    ) -> impl Iterator<Item = &LocationRecord> + '_ {
        self.quests
            .values()
            .filter(move |record| record.is_resolved() && record.map_id == map_id)
    }

    pub fn npc_locations_on_map(&self, map_id: u32) -> impl Iterator<Item = &LocationRecord> + '_ {
        self.npcs
            .values()
            .flatten()
            .filter(move |record| record.is_resolved() && record.map_id == map_id)
    }

    /// Fills an empty place name after the fact. Returns whether it changed.
    pub fn enrich_place_name(&mut self, quest_id: u32, place_name: &str) -> bool {
        match self.quests.get_mut(&quest_id) {
            Some(record) if record.place_name.is_empty() && !place_name.is_empty() => {
                record.place_name = place_name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Always yields a record; entities without coordinates get a
    /// placeholder so lists can still show them.
    pub fn resolve_quest(&mut self, quest_id: u32) -> &LocationRecord {
        if !self.quests.contains_key(&quest_id) {
            let record = self.lookup_quest(quest_id);
            self.quests.insert(quest_id, record);
        }
        &self.quests[&quest_id]
    }

    /// Resolves every Quest row not seen yet. Returns how many are on a map.
    pub fn resolve_all_quests(&mut self) -> usize {
        let ids = self.data.row_ids(Sheet::Quest.name());
        ids.into_iter()
            .filter(|&id| self.resolve_quest(id).is_resolved())
            .count()
    }

    /// `None` when Libra has no coordinates for the NPC.
    pub fn resolve_npc(&mut self, npc_id: u32) -> Option<&LocationRecord> {
        if !self.data.is_available() {
            return None;
        }
        if !self.npcs.contains_key(&npc_id) {
            let record = self.lookup_npc(npc_id);
            self.npcs.insert(npc_id, record);
        }
        self.npc_location(npc_id)
    }

    /// Display name from the primary source, falling back to Libra.
    pub fn npc_name(&mut self, npc_id: u32) -> String {
        if let Some(name) = self.npc_names.get(&npc_id) {
            return name.clone();
        }
        let mut name = self
            .schema
            .row(self.data.as_ref(), Sheet::ENpcResident, npc_id)
            .map(|row| {
                or_placeholder(
                    row.string(Field::NpcSingular),
                    String::new(),
                    self.diagnostics.as_ref(),
                )
            })
            .unwrap_or_default();
        if name.is_empty() {
            if let Some(libra) = self.libra.as_ref() {
                name = libra.npc_name(npc_id).ok().flatten().unwrap_or_default();
            }
        }
        self.npc_names.insert(npc_id, name.clone());
        name
    }

    fn lookup_quest(&mut self, quest_id: u32) -> LocationRecord {
        if !self.data.is_available() {
            return LocationRecord::placeholder(quest_id);
        }

        let libra_quest = self.libra_quest(quest_id);
        let giver = self.primary_giver(quest_id).or_else(|| {
            libra_quest
                .as_ref()
                .map(|quest| quest.client)
                .filter(|&client| client != 0)
        });

        let mut record = match giver.and_then(|npc_id| self.resolve_npc(npc_id).cloned()) {
            Some(npc_record) => LocationRecord {
                entity_id: quest_id,
                ..npc_record
            },
            None => {
                self.diagnostics
                    .unresolved("quest", quest_id, "no giver coordinates");
                LocationRecord::placeholder(quest_id)
            }
        };

        if let Some(npc_id) = giver {
            record.object_id = npc_id;
            if record.object_name.is_empty() {
                record.object_name = self.npc_name(npc_id);
            }
        }

        let primary_place = self.quest_place_name(quest_id);
        if !primary_place.is_empty() {
            record.place_name = primary_place;
        } else if record.place_name.is_empty() {
            if let (Some(libra), Some(quest)) = (self.libra.as_ref(), libra_quest.as_ref()) {
                if quest.area != 0 {
                    record.place_name =
                        libra.place_name(quest.area).ok().flatten().unwrap_or_default();
                }
            }
        }
        record
    }

    fn lookup_npc(&mut self, npc_id: u32) -> Option<LocationRecord> {
        let libra = self.libra.clone()?;
        let coordinates = match libra.npc_coordinates(npc_id) {
            Ok(Some(coordinates)) => coordinates,
            Ok(None) => return None,
            Err(err) => {
                self.diagnostics.extraction_failed(&MapError::from(err));
                return None;
            }
        };
        let (place_id, (raw_x, raw_y)) = coordinates.first_point()?;
        let libra_place = libra.place_name(place_id).unwrap_or_else(|err| {
            self.diagnostics.extraction_failed(&MapError::from(err));
            None
        });

        let game = libra_to_game(raw_x, raw_y);
        let mut record = LocationRecord {
            object_id: npc_id,
            object_name: self.npc_name(npc_id),
            place_name: libra_place.clone().unwrap_or_default(),
            game: Some(game),
            source: LocationSource::Libra,
            status: ResolutionStatus::UnresolvedTerritory,
            ..LocationRecord::placeholder(npc_id)
        };

        let Some(found) = self.territories().resolve(place_id, libra_place.as_deref()) else {
            self.diagnostics.unresolved(
                "npc",
                npc_id,
                &format!("no territory matches Libra place {place_id}"),
            );
            return Some(record);
        };
        record.territory_id = found.territory_id;
        if found.map_id == 0 {
            self.diagnostics.unresolved(
                "npc",
                npc_id,
                &format!("territory {} has no map", found.territory_id),
            );
            return Some(record);
        }

        let transformer = read_map_descriptor(
            self.data.as_ref(),
            &self.schema,
            found.map_id,
            self.diagnostics.as_ref(),
        )
        .and_then(|descriptor| descriptor.transformer().map_err(MapError::from));
        let transformer = match transformer {
            Ok(transformer) => transformer,
            Err(err) => {
                self.diagnostics
                    .unresolved("npc", npc_id, &format!("map {}: {err}", found.map_id));
                return Some(record);
            }
        };

        let (map_x, map_y) = transformer.game_to_map(game);
        record.map_id = found.map_id;
        record.map_x = map_x;
        record.map_y = map_y;
        record.world_x = map_x as f32;
        record.world_z = map_y as f32;
        record.status = ResolutionStatus::Resolved;
        if record.place_name.is_empty() {
            if let Some(candidate) = self.territories().candidate(found.territory_id) {
                record.place_name = candidate.place_name.clone();
            }
        }
        Some(record)
    }

    fn libra_quest(&self, quest_id: u32) -> Option<LibraQuest> {
        let libra = self.libra.as_ref()?;
        match libra.quest(quest_id) {
            Ok(quest) => quest,
            Err(err) => {
                self.diagnostics.extraction_failed(&MapError::from(err));
                None
            }
        }
    }

    fn primary_giver(&self, quest_id: u32) -> Option<u32> {
        let row = self.schema.row(self.data.as_ref(), Sheet::Quest, quest_id)?;
        match row.link(Field::QuestIssuer) {
            Ok(Some(link)) if link.sheet == Sheet::ENpcResident.name() => Some(link.id),
            Ok(Some(link)) => {
                log::debug!("quest {quest_id} issuer links to {}#{}", link.sheet, link.id);
                None
            }
            Ok(None) => None,
            Err(err) => {
                self.diagnostics.extraction_failed(&err);
                None
            }
        }
    }

    fn quest_place_name(&self, quest_id: u32) -> String {
        let Some(row) = self.schema.row(self.data.as_ref(), Sheet::Quest, quest_id) else {
            return String::new();
        };
        let place_name_id = or_placeholder(
            row.link_id(Field::QuestPlaceName),
            0,
            self.diagnostics.as_ref(),
        );
        read_place_name(
            self.data.as_ref(),
            &self.schema,
            place_name_id,
            self.diagnostics.as_ref(),
        )
    }
}
