//! Row-oriented game data provider seam.
//!
//! The kernel never inspects library row objects directly; providers expose
//! rows through [`DataRowAccessor`] and the positional indices come from
//! [`crate::schema::SchemaMapping`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, MapError};

/// Reference from one row to a row of another sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkedRow {
    pub sheet: String,
    pub id: u32,
}

pub trait DataRowAccessor {
    fn row_id(&self) -> u32;
    fn column_count(&self) -> usize;
    fn get_string(&self, index: usize) -> Result<String, FieldError>;
    fn get_uint(&self, index: usize) -> Result<u32, FieldError>;
    fn get_int(&self, index: usize) -> Result<i32, FieldError>;
    fn get_float(&self, index: usize) -> Result<f32, FieldError>;
    /// `Ok(None)` for an empty link (row 0 or a null cell).
    fn get_linked_entity(&self, index: usize) -> Result<Option<LinkedRow>, FieldError>;
}

pub trait GameData: Send + Sync {
    /// False while the underlying library is not initialized.
    fn is_available(&self) -> bool {
        true
    }
    /// Row ids in source iteration order.
    fn row_ids(&self, sheet: &str) -> Vec<u32>;
    fn row(&self, sheet: &str, id: u32) -> Option<Box<dyn DataRowAccessor + '_>>;
    fn column_count(&self, sheet: &str) -> Option<usize>;
    fn column_name(&self, sheet: &str, index: usize) -> Option<String>;
}

/// A single cell of an exported sheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Link(LinkedRow),
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Empty,
}

impl Cell {
    pub fn link(sheet: &str, id: u32) -> Self {
        Cell::Link(LinkedRow {
            sheet: sheet.to_string(),
            id,
        })
    }

    pub fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            Cell::Link(_) => "link",
            Cell::UInt(_) => "uint",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Bool(_) => "bool",
            Cell::Text(_) => "text",
            Cell::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedRow {
    pub id: u32,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportedSheet {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<ExportedRow>,
    #[serde(skip)]
    index: HashMap<u32, usize>,
}

impl ExportedSheet {
    fn reindex(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| (row.id, position))
            .collect();
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExportDocument {
    #[serde(default)]
    sheets: HashMap<String, ExportedSheet>,
}

/// In-memory provider backed by a JSON sheet export.
#[derive(Debug, Clone, Default)]
pub struct MemoryGameData {
    sheets: HashMap<String, ExportedSheet>,
    unavailable: bool,
}

impl MemoryGameData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider standing in for an uninitialized library.
    pub fn unavailable() -> Self {
        Self {
            sheets: HashMap::new(),
            unavailable: true,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, MapError> {
        let document: ExportDocument = serde_json::from_str(text)?;
        let mut sheets = document.sheets;
        for sheet in sheets.values_mut() {
            sheet.reindex();
        }
        Ok(Self {
            sheets,
            unavailable: false,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, MapError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn add_sheet<I, S>(&mut self, name: &str, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sheet = self.sheets.entry(name.to_string()).or_default();
        sheet.columns = columns.into_iter().map(Into::into).collect();
    }

    /// Inserts or replaces a row; the sheet is created on demand.
    pub fn insert_row(&mut self, sheet: &str, id: u32, cells: Vec<Cell>) {
        let sheet = self.sheets.entry(sheet.to_string()).or_default();
        match sheet.index.get(&id) {
            Some(&position) => sheet.rows[position].cells = cells,
            None => {
                sheet.index.insert(id, sheet.rows.len());
                sheet.rows.push(ExportedRow { id, cells });
            }
        }
    }
}

impl GameData for MemoryGameData {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn row_ids(&self, sheet: &str) -> Vec<u32> {
        self.sheets
            .get(sheet)
            .map(|sheet| sheet.rows.iter().map(|row| row.id).collect())
            .unwrap_or_default()
    }

    fn row(&self, sheet: &str, id: u32) -> Option<Box<dyn DataRowAccessor + '_>> {
        let sheet = self.sheets.get(sheet)?;
        let position = *sheet.index.get(&id)?;
        let row = &sheet.rows[position];
        Some(Box::new(MemoryRow {
            id: row.id,
            cells: &row.cells,
        }))
    }

    fn column_count(&self, sheet: &str) -> Option<usize> {
        let sheet = self.sheets.get(sheet)?;
        let widest = sheet.rows.iter().map(|row| row.cells.len()).max();
        Some(sheet.columns.len().max(widest.unwrap_or(0)))
    }

    fn column_name(&self, sheet: &str, index: usize) -> Option<String> {
        self.sheets.get(sheet)?.columns.get(index).cloned()
    }
}

struct MemoryRow<'a> {
    id: u32,
    cells: &'a [Cell],
}

impl MemoryRow<'_> {
    fn cell(&self, index: usize) -> Result<&Cell, FieldError> {
        self.cells.get(index).ok_or(FieldError::OutOfRange {
            index,
            count: self.cells.len(),
        })
    }

    fn wrong_type(index: usize, expected: &'static str, cell: &Cell) -> FieldError {
        FieldError::WrongType {
            index,
            expected,
            found: cell.kind(),
        }
    }
}

impl DataRowAccessor for MemoryRow<'_> {
    fn row_id(&self) -> u32 {
        self.id
    }

    fn column_count(&self) -> usize {
        self.cells.len()
    }

    fn get_string(&self, index: usize) -> Result<String, FieldError> {
        match self.cell(index)? {
            Cell::Text(value) => Ok(value.clone()),
            Cell::Empty => Ok(String::new()),
            other => Err(Self::wrong_type(index, "text", other)),
        }
    }

    fn get_uint(&self, index: usize) -> Result<u32, FieldError> {
        let cell = self.cell(index)?;
        match cell {
            Cell::UInt(value) => {
                u32::try_from(*value).map_err(|_| Self::wrong_type(index, "u32", cell))
            }
            Cell::Int(value) => {
                u32::try_from(*value).map_err(|_| Self::wrong_type(index, "u32", cell))
            }
            Cell::Bool(value) => Ok(u32::from(*value)),
            Cell::Link(link) => Ok(link.id),
            Cell::Empty => Ok(0),
            other => Err(Self::wrong_type(index, "u32", other)),
        }
    }

    fn get_int(&self, index: usize) -> Result<i32, FieldError> {
        let cell = self.cell(index)?;
        match cell {
            Cell::UInt(value) => {
                i32::try_from(*value).map_err(|_| Self::wrong_type(index, "i32", cell))
            }
            Cell::Int(value) => {
                i32::try_from(*value).map_err(|_| Self::wrong_type(index, "i32", cell))
            }
            Cell::Empty => Ok(0),
            other => Err(Self::wrong_type(index, "i32", other)),
        }
    }

    fn get_float(&self, index: usize) -> Result<f32, FieldError> {
        match self.cell(index)? {
            Cell::Float(value) => Ok(*value as f32),
            Cell::UInt(value) => Ok(*value as f32),
            Cell::Int(value) => Ok(*value as f32),
            Cell::Empty => Ok(0.0),
            other => Err(Self::wrong_type(index, "float", other)),
        }
    }

    fn get_linked_entity(&self, index: usize) -> Result<Option<LinkedRow>, FieldError> {
        match self.cell(index)? {
            Cell::Link(link) if link.id == 0 => Ok(None),
            Cell::Link(link) => Ok(Some(link.clone())),
            Cell::Empty | Cell::UInt(0) => Ok(None),
            other => Err(Self::wrong_type(index, "link", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_document_in_row_order() {
        let data = MemoryGameData::from_json_str(
            r#"{
                "sheets": {
                    "PlaceName": {
                        "columns": ["Name"],
                        "rows": [
                            { "id": 40, "cells": ["Central Shroud"] },
                            { "id": 2, "cells": ["Limsa Lominsa"] }
                        ]
                    },
                    "TerritoryType": {
                        "columns": ["Name", "PlaceName"],
                        "rows": [
                            { "id": 148, "cells": ["f1f1", { "sheet": "PlaceName", "id": 40 }] }
                        ]
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(data.row_ids("PlaceName"), vec![40, 2]);
        let row = data.row("PlaceName", 2).unwrap();
        assert_eq!(row.get_string(0).unwrap(), "Limsa Lominsa");

        let territory = data.row("TerritoryType", 148).unwrap();
        assert_eq!(
            territory.get_linked_entity(1).unwrap(),
            Some(LinkedRow {
                sheet: "PlaceName".to_string(),
                id: 40
            })
        );
        assert_eq!(territory.get_uint(1).unwrap(), 40);
        assert_eq!(data.column_name("TerritoryType", 1).as_deref(), Some("PlaceName"));
    }

    #[test]
    fn typed_getters_report_mismatches() {
        let mut data = MemoryGameData::new();
        data.insert_row(
            "Level",
            1,
            vec![Cell::Float(1.5), Cell::text("oops"), Cell::Empty, Cell::Int(-3)],
        );
        let row = data.row("Level", 1).unwrap();
        assert_eq!(row.get_float(0).unwrap(), 1.5);
        assert!(matches!(
            row.get_uint(1),
            Err(FieldError::WrongType { index: 1, .. })
        ));
        assert_eq!(row.get_linked_entity(2).unwrap(), None);
        assert_eq!(row.get_int(3).unwrap(), -3);
        assert!(row.get_uint(3).is_err());
        assert_eq!(
            row.get_string(9),
            Err(FieldError::OutOfRange { index: 9, count: 4 })
        );
    }

    #[test]
    fn insert_row_replaces_existing_ids() {
        let mut data = MemoryGameData::new();
        data.insert_row("Quest", 7, vec![Cell::text("first")]);
        data.insert_row("Quest", 7, vec![Cell::text("second")]);
        assert_eq!(data.row_ids("Quest"), vec![7]);
        assert_eq!(data.row("Quest", 7).unwrap().get_string(0).unwrap(), "second");
        assert!(data.is_available());
        assert!(!MemoryGameData::unavailable().is_available());
    }
}
