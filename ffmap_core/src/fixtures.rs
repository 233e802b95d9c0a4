//! Small Central Shroud data set shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::data::{Cell, MemoryGameData};
use crate::diagnostics::CountingDiagnostics;
use crate::libra::tests::{create_database, insert_npc, insert_place, insert_quest};
use crate::libra::LibraDatabase;
use crate::location::LocationResolver;
use crate::schema::{Field, SchemaMapping, Sheet};

pub(crate) const CENTRAL_SHROUD: u32 = 148;
pub(crate) const GRIDANIA: u32 = 132;
pub(crate) const SHROUD_MAP: u32 = 4;
pub(crate) const GRIDANIA_MAP: u32 = 2;
pub(crate) const MIOUNNE: u32 = 1000100;
pub(crate) const WANDERER: u32 = 1000200;
pub(crate) const OPENING_QUEST: u32 = 65000;

/// Row wide enough for every mapped field of `sheet`, with `values` filled in.
pub(crate) fn cells(sheet: Sheet, values: Vec<(Field, Cell)>) -> Vec<Cell> {
    let schema = SchemaMapping::current();
    let width = sheet_width(&schema, sheet);
    let mut row = vec![Cell::Empty; width];
    for (field, value) in values {
        row[schema.spec(field).index] = value;
    }
    row
}

fn sheet_width(schema: &SchemaMapping, sheet: Sheet) -> usize {
    FIELDS
        .iter()
        .filter(|field| field.sheet() == sheet)
        .map(|field| schema.spec(*field).index + 1)
        .max()
        .unwrap_or(1)
}

const FIELDS: &[Field] = &[
    Field::QuestName,
    Field::QuestGenre,
    Field::QuestPlaceName,
    Field::QuestIssuer,
    Field::NpcSingular,
    Field::NpcTitle,
    Field::LevelX,
    Field::LevelY,
    Field::LevelZ,
    Field::LevelMap,
    Field::LevelTerritory,
    Field::MapMarkerRange,
    Field::MapSizeFactor,
    Field::MapOffsetX,
    Field::MapOffsetY,
    Field::MapPlaceNameRegion,
    Field::MapPlaceName,
    Field::MapTerritory,
    Field::TerritoryName,
    Field::TerritoryBg,
    Field::TerritoryRegion,
    Field::TerritoryZone,
    Field::TerritoryPlaceName,
    Field::TerritoryMap,
    Field::PlaceNameName,
    Field::FateName,
    Field::FateClassLevel,
    Field::FateLocation,
    Field::FateMapIcon,
    Field::MarkerRange,
    Field::MarkerX,
    Field::MarkerY,
    Field::MarkerIcon,
    Field::MarkerPlaceName,
    Field::InstanceName,
    Field::InstanceType,
    Field::InstanceTerritory,
];

pub(crate) fn shroud_data() -> MemoryGameData {
    let mut data = MemoryGameData::new();

    for (id, name) in [(1001, "Central Shroud"), (1002, "Bentbranch Meadows"), (1003, "Gridania")] {
        data.insert_row(
            "PlaceName",
            id,
            cells(Sheet::PlaceName, vec![(Field::PlaceNameName, Cell::text(name))]),
        );
    }

    data.insert_row(
        "TerritoryType",
        CENTRAL_SHROUD,
        cells(
            Sheet::TerritoryType,
            vec![
                (Field::TerritoryName, Cell::text("f1f1")),
                (Field::TerritoryBg, Cell::text("ffxiv/fst_f1/fld/f1f1/level/f1f1")),
                (Field::TerritoryPlaceName, Cell::link("PlaceName", 1001)),
                (Field::TerritoryMap, Cell::link("Map", SHROUD_MAP)),
            ],
        ),
    );
    data.insert_row(
        "TerritoryType",
        GRIDANIA,
        cells(
            Sheet::TerritoryType,
            vec![
                (Field::TerritoryName, Cell::text("f1t1")),
                (Field::TerritoryPlaceName, Cell::link("PlaceName", 1003)),
                (Field::TerritoryMap, Cell::link("Map", GRIDANIA_MAP)),
            ],
        ),
    );

    data.insert_row(
        "Map",
        SHROUD_MAP,
        cells(
            Sheet::Map,
            vec![
                (Field::MapMarkerRange, Cell::UInt(4)),
                (Field::MapSizeFactor, Cell::UInt(100)),
                (Field::MapOffsetX, Cell::Int(0)),
                (Field::MapOffsetY, Cell::Int(0)),
                (Field::MapPlaceName, Cell::link("PlaceName", 1001)),
                (Field::MapTerritory, Cell::link("TerritoryType", CENTRAL_SHROUD)),
            ],
        ),
    );
    data.insert_row(
        "Map",
        GRIDANIA_MAP,
        cells(
            Sheet::Map,
            vec![
                (Field::MapSizeFactor, Cell::UInt(400)),
                (Field::MapTerritory, Cell::link("TerritoryType", GRIDANIA)),
            ],
        ),
    );

    data.insert_row(
        "Level",
        500,
        cells(
            Sheet::Level,
            vec![
                (Field::LevelX, Cell::Float(100.0)),
                (Field::LevelY, Cell::Float(5.0)),
                (Field::LevelZ, Cell::Float(-50.0)),
                (Field::LevelMap, Cell::link("Map", SHROUD_MAP)),
                (Field::LevelTerritory, Cell::link("TerritoryType", CENTRAL_SHROUD)),
            ],
        ),
    );
    data.insert_row(
        "Fate",
        7,
        cells(
            Sheet::Fate,
            vec![
                (Field::FateName, Cell::text("Surprise Visit")),
                (Field::FateClassLevel, Cell::UInt(5)),
                (Field::FateLocation, Cell::link("Level", 500)),
                (Field::FateMapIcon, Cell::UInt(60502)),
            ],
        ),
    );

    for (id, range, icon) in [(1, 4, 60441), (2, 4, 0), (3, 9, 60441)] {
        data.insert_row(
            "MapMarker",
            id,
            cells(
                Sheet::MapMarker,
                vec![
                    (Field::MarkerRange, Cell::UInt(range)),
                    (Field::MarkerX, Cell::Int(1024)),
                    (Field::MarkerY, Cell::Int(512)),
                    (Field::MarkerIcon, Cell::UInt(icon)),
                    (Field::MarkerPlaceName, Cell::link("PlaceName", 1002)),
                ],
            ),
        );
    }

    data.insert_row(
        "ENpcResident",
        MIOUNNE,
        cells(Sheet::ENpcResident, vec![(Field::NpcSingular, Cell::text("Miounne"))]),
    );
    data.insert_row(
        "ENpcResident",
        WANDERER,
        cells(Sheet::ENpcResident, vec![(Field::NpcSingular, Cell::text("Wanderer"))]),
    );
    data.insert_row(
        "Quest",
        OPENING_QUEST,
        cells(
            Sheet::Quest,
            vec![
                (Field::QuestName, Cell::text("Coming to Gridania")),
                (Field::QuestPlaceName, Cell::link("PlaceName", 1001)),
                (Field::QuestIssuer, Cell::link("ENpcResident", MIOUNNE)),
            ],
        ),
    );
    data
}

/// Libra database matching [`shroud_data`]. Miounne stands at 20.5/20.5,
/// the wanderer has a pin in a place no territory matches.
pub(crate) fn shroud_libra(dir: &TempDir) -> PathBuf {
    let path = create_database(dir);
    insert_place(&path, 1001, "Central Shroud");
    insert_place(&path, 9999, "Somewhere Else");
    insert_npc(
        &path,
        MIOUNNE,
        "Mother Miounne",
        Some(r#"{"coordinate": {"1001": [["205", "205"]]}}"#),
    );
    insert_npc(&path, WANDERER, "Wanderer", Some(r#"{"coordinate": {"9999": [[100, 100]]}}"#));
    insert_quest(&path, OPENING_QUEST, "Coming to Gridania", Some(MIOUNNE), 1001);
    insert_quest(&path, 65001, "Lost Wanderer", Some(WANDERER), 9999);
    path
}

pub(crate) fn resolver(
    data: MemoryGameData,
    libra: Option<&Path>,
) -> (LocationResolver, Arc<CountingDiagnostics>) {
    let diagnostics = Arc::new(CountingDiagnostics::default());
    let mut resolver = LocationResolver::new(
        Arc::new(data),
        Arc::new(SchemaMapping::current()),
        diagnostics.clone(),
    );
    if let Some(path) = libra {
        resolver = resolver.with_libra(LibraDatabase::open(path).unwrap());
    }
    (resolver, diagnostics)
}
