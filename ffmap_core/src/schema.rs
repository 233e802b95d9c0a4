//! Versioned mapping from semantic fields to positional sheet columns.
//!
//! Positional indices drift between game data versions, so every index the
//! kernel reads lives in one table that is checked against the provider
//! before any extraction starts.

use std::collections::HashMap;

use crate::data::{DataRowAccessor, GameData, LinkedRow};
use crate::error::{FieldError, MapError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    Quest,
    ENpcResident,
    Level,
    Map,
    TerritoryType,
    PlaceName,
    Fate,
    MapMarker,
    InstanceContent,
}

impl Sheet {
    pub const ALL: [Sheet; 9] = [
        Sheet::Quest,
        Sheet::ENpcResident,
        Sheet::Level,
        Sheet::Map,
        Sheet::TerritoryType,
        Sheet::PlaceName,
        Sheet::Fate,
        Sheet::MapMarker,
        Sheet::InstanceContent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Sheet::Quest => "Quest",
            Sheet::ENpcResident => "ENpcResident",
            Sheet::Level => "Level",
            Sheet::Map => "Map",
            Sheet::TerritoryType => "TerritoryType",
            Sheet::PlaceName => "PlaceName",
            Sheet::Fate => "Fate",
            Sheet::MapMarker => "MapMarker",
            Sheet::InstanceContent => "InstanceContent",
        }
    }

    /// Sheets without which no location can be resolved.
    pub fn required(self) -> bool {
        matches!(
            self,
            Sheet::Quest
                | Sheet::ENpcResident
                | Sheet::Map
                | Sheet::TerritoryType
                | Sheet::PlaceName
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    QuestName,
    QuestGenre,
    QuestPlaceName,
    QuestIssuer,
    NpcSingular,
    NpcTitle,
    LevelX,
    LevelY,
    LevelZ,
    LevelMap,
    LevelTerritory,
    MapMarkerRange,
    MapSizeFactor,
    MapOffsetX,
    MapOffsetY,
    MapPlaceNameRegion,
    MapPlaceName,
    MapTerritory,
    TerritoryName,
    TerritoryBg,
    TerritoryRegion,
    TerritoryZone,
    TerritoryPlaceName,
    TerritoryMap,
    PlaceNameName,
    FateName,
    FateClassLevel,
    FateLocation,
    FateMapIcon,
    MarkerRange,
    MarkerX,
    MarkerY,
    MarkerIcon,
    MarkerPlaceName,
    InstanceName,
    InstanceType,
    InstanceTerritory,
}

impl Field {
    pub fn sheet(self) -> Sheet {
        use Field::*;
        match self {
            QuestName | QuestGenre | QuestPlaceName | QuestIssuer => Sheet::Quest,
            NpcSingular | NpcTitle => Sheet::ENpcResident,
            LevelX | LevelY | LevelZ | LevelMap | LevelTerritory => Sheet::Level,
            MapMarkerRange | MapSizeFactor | MapOffsetX | MapOffsetY | MapPlaceNameRegion
            | MapPlaceName | MapTerritory => Sheet::Map,
            TerritoryName | TerritoryBg | TerritoryRegion | TerritoryZone | TerritoryPlaceName
            | TerritoryMap => Sheet::TerritoryType,
            PlaceNameName => Sheet::PlaceName,
            FateName | FateClassLevel | FateLocation | FateMapIcon => Sheet::Fate,
            MarkerRange | MarkerX | MarkerY | MarkerIcon | MarkerPlaceName => Sheet::MapMarker,
            InstanceName | InstanceType | InstanceTerritory => Sheet::InstanceContent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub index: usize,
    /// Expected column name, checked when the provider exposes names.
    pub column: Option<&'static str>,
}

pub const CURRENT_VERSION: &str = "7.0";

const CURRENT_LAYOUT: &[(Field, usize, &str)] = &[
    (Field::QuestName, 0, "Name"),
    (Field::QuestGenre, 2, "JournalGenre"),
    (Field::QuestPlaceName, 3, "PlaceName"),
    (Field::QuestIssuer, 37, "IssuerStart"),
    (Field::NpcSingular, 0, "Singular"),
    (Field::NpcTitle, 8, "Title"),
    (Field::LevelX, 0, "X"),
    (Field::LevelY, 1, "Y"),
    (Field::LevelZ, 2, "Z"),
    (Field::LevelMap, 7, "Map"),
    (Field::LevelTerritory, 9, "Territory"),
    (Field::MapMarkerRange, 5, "MapMarkerRange"),
    (Field::MapSizeFactor, 7, "SizeFactor"),
    (Field::MapOffsetX, 8, "Offset{X}"),
    (Field::MapOffsetY, 9, "Offset{Y}"),
    (Field::MapPlaceNameRegion, 10, "PlaceName{Region}"),
    (Field::MapPlaceName, 11, "PlaceName"),
    (Field::MapTerritory, 15, "TerritoryType"),
    (Field::TerritoryName, 0, "Name"),
    (Field::TerritoryBg, 1, "Bg"),
    (Field::TerritoryRegion, 3, "PlaceName{Region}"),
    (Field::TerritoryZone, 4, "PlaceName{Zone}"),
    (Field::TerritoryPlaceName, 5, "PlaceName"),
    (Field::TerritoryMap, 6, "Map"),
    (Field::PlaceNameName, 0, "Name"),
    (Field::FateName, 0, "Name"),
    (Field::FateClassLevel, 1, "ClassJobLevel"),
    (Field::FateLocation, 2, "Location"),
    (Field::FateMapIcon, 3, "MapIcon"),
    (Field::MarkerRange, 0, "MapMarkerRange"),
    (Field::MarkerX, 1, "X"),
    (Field::MarkerY, 2, "Y"),
    (Field::MarkerIcon, 3, "Icon"),
    (Field::MarkerPlaceName, 4, "PlaceName{Subtext}"),
    (Field::InstanceName, 0, "Name"),
    (Field::InstanceType, 1, "InstanceContentType"),
    (Field::InstanceTerritory, 2, "TerritoryType"),
];

#[derive(Debug, Clone)]
pub struct SchemaMapping {
    version: String,
    fields: HashMap<Field, FieldSpec>,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        Self::current()
    }
}

impl SchemaMapping {
    pub fn current() -> Self {
        let fields = CURRENT_LAYOUT
            .iter()
            .map(|&(field, index, column)| {
                (
                    field,
                    FieldSpec {
                        index,
                        column: Some(column),
                    },
                )
            })
            .collect();
        Self {
            version: CURRENT_VERSION.to_string(),
            fields,
        }
    }

    pub fn for_version(version: &str) -> Option<Self> {
        match version {
            CURRENT_VERSION | "current" => Some(Self::current()),
            _ => None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn spec(&self, field: Field) -> FieldSpec {
        self.fields.get(&field).copied().unwrap_or(FieldSpec {
            index: usize::MAX,
            column: None,
        })
    }

    /// Moves a field to another index; the expected column name is dropped.
    pub fn with_override(mut self, field: Field, index: usize) -> Self {
        self.fields.insert(field, FieldSpec { index, column: None });
        self
    }

    /// Checks every mapped index against the provider's sheets.
    pub fn validate(&self, data: &dyn GameData) -> Result<(), MapError> {
        for sheet in Sheet::ALL {
            let Some(count) = data.column_count(sheet.name()) else {
                if sheet.required() {
                    return Err(MapError::SchemaMismatch {
                        sheet: sheet.name().to_string(),
                        field: "*",
                        detail: "sheet missing from data source".to_string(),
                    });
                }
                log::debug!("optional sheet {} not present", sheet.name());
                continue;
            };

            let mut fields: Vec<_> = self
                .fields
                .iter()
                .filter(|(field, _)| field.sheet() == sheet)
                .collect();
            fields.sort_by_key(|(_, spec)| spec.index);

            for (field, spec) in fields {
                if spec.index >= count {
                    return Err(MapError::SchemaMismatch {
                        sheet: sheet.name().to_string(),
                        field: spec.column.unwrap_or("?"),
                        detail: format!(
                            "{field:?} expects column {} but the sheet has {count}",
                            spec.index
                        ),
                    });
                }
                let actual = data.column_name(sheet.name(), spec.index);
                if let (Some(expected), Some(actual)) = (spec.column, actual) {
                    if !actual.is_empty() && actual != expected {
                        return Err(MapError::SchemaMismatch {
                            sheet: sheet.name().to_string(),
                            field: expected,
                            detail: format!(
                                "column {} is named '{actual}' in schema {}",
                                spec.index, self.version
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn row<'a>(
        &'a self,
        data: &'a dyn GameData,
        sheet: Sheet,
        id: u32,
    ) -> Option<SheetRow<'a>> {
        let row = data.row(sheet.name(), id)?;
        Some(SheetRow {
            sheet,
            row,
            schema: self,
        })
    }
}

/// Row wrapper that reads by semantic field.
pub struct SheetRow<'a> {
    sheet: Sheet,
    row: Box<dyn DataRowAccessor + 'a>,
    schema: &'a SchemaMapping,
}

impl SheetRow<'_> {
    pub fn id(&self) -> u32 {
        self.row.row_id()
    }

    pub fn sheet(&self) -> Sheet {
        self.sheet
    }

    pub fn string(&self, field: Field) -> Result<String, MapError> {
        self.read(field, |row, index| row.get_string(index))
    }

    pub fn uint(&self, field: Field) -> Result<u32, MapError> {
        self.read(field, |row, index| row.get_uint(index))
    }

    pub fn int(&self, field: Field) -> Result<i32, MapError> {
        self.read(field, |row, index| row.get_int(index))
    }

    pub fn float(&self, field: Field) -> Result<f32, MapError> {
        self.read(field, |row, index| row.get_float(index))
    }

    pub fn link(&self, field: Field) -> Result<Option<LinkedRow>, MapError> {
        self.read(field, |row, index| row.get_linked_entity(index))
    }

    /// Id of a linked row, or 0 for an empty link.
    pub fn link_id(&self, field: Field) -> Result<u32, MapError> {
        Ok(self.link(field)?.map(|link| link.id).unwrap_or(0))
    }

    fn read<T>(
        &self,
        field: Field,
        getter: impl FnOnce(&dyn DataRowAccessor, usize) -> Result<T, FieldError>,
    ) -> Result<T, MapError> {
        debug_assert_eq!(field.sheet(), self.sheet, "{field:?} read from wrong sheet");
        let index = self.schema.spec(field).index;
        getter(self.row.as_ref(), index).map_err(|source| MapError::Extraction {
            sheet: self.sheet.name().to_string(),
            row: self.row.row_id(),
            source,
        })
    }
}
