//! Read-only access to the Libra Eorzea side database.
//!
//! Every query opens its own read-only connection and drops it before
//! returning; nothing is pooled or shared between calls.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;

use crate::error::LibraError;

/// Probed in order when no explicit path is configured.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "app_data.sqlite",
    "data/app_data.sqlite",
    "libra/app_data.sqlite",
    "LibraEorzea/app_data.sqlite",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraQuest {
    pub key: u32,
    pub name: String,
    pub client: u32,
    pub genre: u32,
    pub class_level: u32,
    pub gil: u32,
    pub area: u32,
}

/// Coordinates recorded for one Libra place name.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraPlacement {
    pub place_name_id: u32,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpcCoordinates {
    pub npc_id: u32,
    pub placements: Vec<LibraPlacement>,
}

impl NpcCoordinates {
    /// First placement with at least one point, with that point.
    pub fn first_point(&self) -> Option<(u32, (f64, f64))> {
        self.placements.iter().find_map(|placement| {
            placement
                .points
                .first()
                .map(|point| (placement.place_name_id, *point))
        })
    }
}

#[derive(Debug, Clone)]
pub struct LibraDatabase {
    path: PathBuf,
}

impl LibraDatabase {
    /// Opens `path` after checking it answers a probe query.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LibraError> {
        let database = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = database.connect()?;
        conn.query_row("SELECT COUNT(*) FROM ENpcResident", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(database)
    }

    /// First candidate that exists and opens wins.
    pub fn discover<I, P>(candidates: I) -> Result<Self, LibraError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut probed = 0;
        for candidate in candidates {
            probed += 1;
            let candidate = candidate.as_ref();
            if !candidate.is_file() {
                continue;
            }
            match Self::open(candidate) {
                Ok(database) => {
                    log::info!("using Libra database at {}", candidate.display());
                    return Ok(database);
                }
                Err(err) => {
                    log::warn!("ignoring Libra candidate {}: {err}", candidate.display());
                }
            }
        }
        Err(LibraError::NotFound(probed))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, LibraError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// `Ok(None)` when the NPC is unknown or its blob has no `coordinate` key.
    pub fn npc_coordinates(&self, npc_id: u32) -> Result<Option<NpcCoordinates>, LibraError> {
        let conn = self.connect()?;
        let blob: Option<Option<String>> = conn
            .query_row(
                "SELECT data FROM ENpcResident WHERE Key = ?1",
                [npc_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(Some(blob)) = blob else {
            return Ok(None);
        };
        if blob.trim().is_empty() {
            return Ok(None);
        }
        let value: Value =
            serde_json::from_str(&blob).map_err(|source| LibraError::Blob { npc_id, source })?;
        Ok(parse_coordinates(npc_id, &value))
    }

    pub fn npc_name(&self, npc_id: u32) -> Result<Option<String>, LibraError> {
        self.single_text("SELECT SGL_en FROM ENpcResident WHERE Key = ?1", npc_id)
    }

    pub fn place_name(&self, key: u32) -> Result<Option<String>, LibraError> {
        self.single_text("SELECT SGL_en FROM PlaceName WHERE Key = ?1", key)
    }

    pub fn genre_name(&self, key: u32) -> Result<Option<String>, LibraError> {
        self.single_text("SELECT Name_en FROM JournalGenre WHERE Key = ?1", key)
    }

    pub fn quest(&self, quest_id: u32) -> Result<Option<LibraQuest>, LibraError> {
        let conn = self.connect()?;
        let quest = conn
            .query_row(
                "SELECT Key, Name_en, Client, Genre, ClassLevel, Gil, Area
                 FROM Quest WHERE Key = ?1",
                [quest_id],
                |row| {
                    Ok(LibraQuest {
                        key: row.get(0)?,
                        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        client: column_u32(row, 2)?,
                        genre: column_u32(row, 3)?,
                        class_level: column_u32(row, 4)?,
                        gil: column_u32(row, 5)?,
                        area: column_u32(row, 6)?,
                    })
                },
            )
            .optional()?;
        Ok(quest)
    }

    fn single_text(&self, sql: &str, key: u32) -> Result<Option<String>, LibraError> {
        let conn = self.connect()?;
        let value: Option<Option<String>> = conn
            .query_row(sql, [key], |row| row.get(0))
            .optional()?;
        Ok(value.flatten().filter(|text| !text.is_empty()))
    }
}

fn column_u32(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<u32> {
    let value: Option<i64> = row.get(index)?;
    Ok(value.and_then(|value| u32::try_from(value).ok()).unwrap_or(0))
}

fn parse_coordinates(npc_id: u32, value: &Value) -> Option<NpcCoordinates> {
    let table = value.get("coordinate")?.as_object()?;
    let mut placements = Vec::new();
    for (key, pairs) in table {
        let Ok(place_name_id) = key.trim().parse::<u32>() else {
            log::debug!("npc {npc_id}: ignoring non-numeric coordinate key '{key}'");
            continue;
        };
        let points: Vec<(f64, f64)> = pairs
            .as_array()
            .map(|pairs| pairs.iter().filter_map(parse_pair).collect())
            .unwrap_or_default();
        placements.push(LibraPlacement {
            place_name_id,
            points,
        });
    }
    if placements.iter().all(|placement| placement.points.is_empty()) {
        return None;
    }
    Some(NpcCoordinates {
        npc_id,
        placements,
    })
}

fn parse_pair(pair: &Value) -> Option<(f64, f64)> {
    let items = pair.as_array()?;
    let x = parse_number(items.first()?)?;
    let y = parse_number(items.get(1)?)?;
    Some((x, y))
}

fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        Value::Number(number) => number.as_f64()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
