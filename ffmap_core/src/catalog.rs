//! Bulk loads over whole sheets, sorted once at the end.

use serde::Serialize;

use crate::coords::GameCoordinate;
use crate::data::GameData;
use crate::diagnostics::{or_placeholder, Diagnostics, LoadStats, LoadTally};
use crate::error::MapError;
use crate::location::{LocationResolver, ResolutionStatus};
use crate::schema::{Field, SchemaMapping, Sheet};
use crate::territory::read_place_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Id,
    /// Case-insensitive, ties broken by id.
    Name,
}

pub trait CatalogEntry {
    fn id(&self) -> u32;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog<T> {
    pub entries: Vec<T>,
    pub stats: LoadStats,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            stats: LoadStats::default(),
        }
    }
}

impl<T: CatalogEntry> Catalog<T> {
    fn sorted(mut entries: Vec<T>, order: SortOrder, stats: LoadStats) -> Self {
        match order {
            SortOrder::Id => entries.sort_by_key(|entry| entry.id()),
            SortOrder::Name => entries.sort_by(|a, b| {
                a.name()
                    .to_lowercase()
                    .cmp(&b.name().to_lowercase())
                    .then(a.id().cmp(&b.id()))
            }),
        }
        Self { entries, stats }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestEntry {
    pub id: u32,
    pub name: String,
    pub genre_id: u32,
    pub place_name: String,
    pub giver_id: u32,
    pub giver_name: String,
    pub map_id: u32,
    pub game: Option<GameCoordinate>,
    pub status: ResolutionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpcEntry {
    pub id: u32,
    pub name: String,
    pub title: String,
    pub territory_id: u32,
    pub map_id: u32,
    pub place_name: String,
    pub game: Option<GameCoordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FateEntry {
    pub id: u32,
    pub name: String,
    pub class_level: u32,
    pub icon_id: u32,
    pub level_id: u32,
    pub map_id: u32,
    pub territory_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerritoryEntry {
    pub id: u32,
    pub name: String,
    pub place_name: String,
    pub region: String,
    pub zone: String,
    pub map_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceContentEntry {
    pub id: u32,
    pub name: String,
    pub content_type: u32,
    pub territory_id: u32,
}

macro_rules! catalog_entry {
    ($($entry:ty),*) => {
        $(impl CatalogEntry for $entry {
            fn id(&self) -> u32 {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

catalog_entry!(QuestEntry, NpcEntry, FateEntry, TerritoryEntry, InstanceContentEntry);

/// Every named quest, with its giver location resolved through `locations`.
pub fn load_quests(locations: &mut LocationResolver, order: SortOrder) -> Catalog<QuestEntry> {
    if !locations.data().is_available() {
        return Catalog::default();
    }
    let diagnostics = locations.shared_diagnostics();
    let mut tally = LoadTally::new(diagnostics.as_ref());
    let ids = locations.data().row_ids(Sheet::Quest.name());
    let mut rows = Vec::with_capacity(ids.len());
    {
        let data = locations.data();
        let schema = locations.schema();
        for id in ids {
            let Some(row) = schema.row(data, Sheet::Quest, id) else {
                continue;
            };
            let name = match row.string(Field::QuestName) {
                Ok(name) => name,
                Err(err) => {
                    tally.entity_skipped("quest", id, &err);
                    continue;
                }
            };
            if name.is_empty() {
                continue;
            }
            let genre_id = or_placeholder(row.link_id(Field::QuestGenre), 0, &tally);
            rows.push((id, name, genre_id));
        }
    }

    let mut entries = Vec::with_capacity(rows.len());
    for (id, name, genre_id) in rows {
        tally.processed();
        let record = locations.resolve_quest(id).clone();
        if record.status != ResolutionStatus::Resolved {
            tally.count_unresolved();
        }
        let giver_name = if record.object_id != 0 {
            locations.npc_name(record.object_id)
        } else {
            String::new()
        };
        entries.push(QuestEntry {
            id,
            name,
            genre_id,
            place_name: record.place_name,
            giver_id: record.object_id,
            giver_name,
            map_id: record.map_id,
            game: record.game,
            status: record.status,
        });
    }
    let stats = tally.finish();
    log::debug!("loaded {} quests ({} unresolved)", entries.len(), stats.unresolved);
    Catalog::sorted(entries, order, stats)
}

/// Every named ENpcResident row. NPCs without Libra coordinates stay listed
/// with map 0.
pub fn load_npcs(locations: &mut LocationResolver, order: SortOrder) -> Catalog<NpcEntry> {
    if !locations.data().is_available() {
        return Catalog::default();
    }
    let diagnostics = locations.shared_diagnostics();
    let mut tally = LoadTally::new(diagnostics.as_ref());
    let ids = locations.data().row_ids(Sheet::ENpcResident.name());
    let mut entries = Vec::new();
    for id in ids {
        let name = locations.npc_name(id);
        if name.is_empty() {
            continue;
        }
        tally.processed();
        let title = locations
            .schema()
            .row(locations.data(), Sheet::ENpcResident, id)
            .map(|row| or_placeholder(row.string(Field::NpcTitle), String::new(), &tally))
            .unwrap_or_default();
        let mut entry = NpcEntry {
            id,
            name,
            title,
            territory_id: 0,
            map_id: 0,
            place_name: String::new(),
            game: None,
        };
        match locations.resolve_npc(id) {
            Some(record) => {
                if !record.is_resolved() {
                    tally.count_unresolved();
                }
                entry.territory_id = record.territory_id;
                entry.map_id = record.map_id;
                entry.place_name = record.place_name.clone();
                entry.game = record.game;
            }
            None => tally.count_unresolved(),
        }
        entries.push(entry);
    }
    Catalog::sorted(entries, order, tally.finish())
}

pub fn load_fates(
    data: &dyn GameData,
    schema: &SchemaMapping,
    diagnostics: &dyn Diagnostics,
    order: SortOrder,
) -> Catalog<FateEntry> {
    if !data.is_available() {
        return Catalog::default();
    }
    let mut tally = LoadTally::new(diagnostics);
    let mut entries = Vec::new();
    for id in data.row_ids(Sheet::Fate.name()) {
        let Some(row) = schema.row(data, Sheet::Fate, id) else {
            continue;
        };
        tally.processed();
        let fate = (|| -> Result<FateEntry, MapError> {
            let level_id = row.link_id(Field::FateLocation)?;
            let level = schema.row(data, Sheet::Level, level_id);
            Ok(FateEntry {
                id,
                name: row.string(Field::FateName)?,
                class_level: or_placeholder(row.uint(Field::FateClassLevel), 0, &tally),
                icon_id: or_placeholder(row.uint(Field::FateMapIcon), 0, &tally),
                level_id,
                map_id: level
                    .as_ref()
                    .map(|level| or_placeholder(level.link_id(Field::LevelMap), 0, &tally))
                    .unwrap_or(0),
                territory_id: level
                    .as_ref()
                    .map(|level| or_placeholder(level.link_id(Field::LevelTerritory), 0, &tally))
                    .unwrap_or(0),
            })
        })();
        match fate {
            Ok(fate) if fate.name.is_empty() => {}
            Ok(fate) => {
                if fate.map_id == 0 {
                    tally.count_unresolved();
                }
                entries.push(fate);
            }
            Err(err) => tally.entity_skipped("fate", id, &err),
        }
    }
    Catalog::sorted(entries, order, tally.finish())
}

pub fn load_territories(
    data: &dyn GameData,
    schema: &SchemaMapping,
    diagnostics: &dyn Diagnostics,
    order: SortOrder,
) -> Catalog<TerritoryEntry> {
    if !data.is_available() {
        return Catalog::default();
    }
    let mut tally = LoadTally::new(diagnostics);
    let mut entries = Vec::new();
    for id in data.row_ids(Sheet::TerritoryType.name()) {
        let Some(row) = schema.row(data, Sheet::TerritoryType, id) else {
            continue;
        };
        tally.processed();
        let place_name_of = |field: Field| {
            let place_id = or_placeholder(row.link_id(field), 0, &tally);
            read_place_name(data, schema, place_id, &tally)
        };
        let entry = TerritoryEntry {
            id,
            name: or_placeholder(row.string(Field::TerritoryName), String::new(), &tally),
            place_name: place_name_of(Field::TerritoryPlaceName),
            region: place_name_of(Field::TerritoryRegion),
            zone: place_name_of(Field::TerritoryZone),
            map_id: or_placeholder(row.link_id(Field::TerritoryMap), 0, &tally),
        };
        if entry.map_id == 0 {
            tally.count_unresolved();
        }
        entries.push(entry);
    }
    Catalog::sorted(entries, order, tally.finish())
}

pub fn load_instance_content(
    data: &dyn GameData,
    schema: &SchemaMapping,
    diagnostics: &dyn Diagnostics,
    order: SortOrder,
) -> Catalog<InstanceContentEntry> {
    if !data.is_available() {
        return Catalog::default();
    }
    let mut tally = LoadTally::new(diagnostics);
    let mut entries = Vec::new();
    for id in data.row_ids(Sheet::InstanceContent.name()) {
        let Some(row) = schema.row(data, Sheet::InstanceContent, id) else {
            continue;
        };
        tally.processed();
        match row.string(Field::InstanceName) {
            Ok(name) if name.is_empty() => {}
            Ok(name) => entries.push(InstanceContentEntry {
                id,
                name,
                content_type: or_placeholder(row.uint(Field::InstanceType), 0, &tally),
                territory_id: or_placeholder(row.link_id(Field::InstanceTerritory), 0, &tally),
            }),
            Err(err) => tally.entity_skipped("instance content", id, &err),
        }
    }
    Catalog::sorted(entries, order, tally.finish())
}

/// Runs one bulk load on the blocking pool and waits for it.
pub async fn offload<T, F>(work: F) -> Result<T, MapError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| MapError::Offload(err.to_string()))
}
