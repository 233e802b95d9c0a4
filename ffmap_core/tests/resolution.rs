use std::path::{Path, PathBuf};
use std::sync::Arc;

use ffmap_core::{
    CoordinateTransformer, GameCoordinate, LogDiagnostics, MapSession, MarkerType, MemoryGameData,
    ResolutionStatus, ResolverConfig,
};
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use tempfile::TempDir;

const THANALAN_MAP: u32 = 20;

fn row(width: usize, cells: &[(usize, Value)]) -> Value {
    let mut row = vec![Value::Null; width];
    for (index, value) in cells {
        row[*index] = value.clone();
    }
    Value::Array(row)
}

fn link(sheet: &str, id: u32) -> Value {
    json!({ "sheet": sheet, "id": id })
}

/// Western and Eastern Thanalan drawn on one map, plus an orphan territory.
fn export() -> MemoryGameData {
    let document = json!({
        "sheets": {
            "PlaceName": {
                "columns": ["Name"],
                "rows": [
                    { "id": 40, "cells": ["Western Thanalan"] },
                    { "id": 41, "cells": ["Eastern Thanalan"] },
                    { "id": 42, "cells": ["The Gold Saucer (Interior)"] }
                ]
            },
            "TerritoryType": {
                "rows": [
                    { "id": 140, "cells": row(7, &[(0, json!("w1f1")), (5, link("PlaceName", 40)), (6, link("Map", THANALAN_MAP))]) },
                    { "id": 145, "cells": row(7, &[(0, json!("w1f3")), (5, link("PlaceName", 41)), (6, link("Map", THANALAN_MAP))]) },
                    { "id": 144, "cells": row(7, &[(0, json!("w1g1")), (5, link("PlaceName", 42))]) }
                ]
            },
            "Map": {
                "rows": [
                    { "id": THANALAN_MAP, "cells": row(16, &[(7, json!(200)), (8, json!(0)), (9, json!(0)), (15, link("TerritoryType", 140))]) }
                ]
            },
            "ENpcResident": {
                "rows": [
                    { "id": 1001, "cells": row(9, &[(0, json!("Momodi"))]) },
                    { "id": 1002, "cells": row(9, &[(0, json!("Eastern Scout"))]) },
                    { "id": 1003, "cells": row(9, &[(0, json!("Shopkeep"))]) },
                    { "id": 1004, "cells": row(9, &[(0, json!("Saucer Attendant"))]) },
                    { "id": 1005, "cells": row(9, &[(0, json!("Western Scout"))]) }
                ]
            },
            "Quest": {
                "rows": [
                    { "id": 66000, "cells": row(38, &[(0, json!("Close to Home")), (37, link("ENpcResident", 1001))]) },
                    { "id": 66001, "cells": row(38, &[(0, json!("Scouting East")), (37, link("ENpcResident", 1002))]) }
                ]
            }
        }
    });
    MemoryGameData::from_json_str(&document.to_string()).unwrap()
}

fn libra(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("app_data.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Quest (Key INTEGER PRIMARY KEY, Name_en TEXT, Client INTEGER,
                             Genre INTEGER, ClassLevel INTEGER, Gil INTEGER, Area INTEGER);
         CREATE TABLE ENpcResident (Key INTEGER PRIMARY KEY, SGL_en TEXT, Index_en TEXT, data TEXT);
         CREATE TABLE PlaceName (Key INTEGER PRIMARY KEY, SGL_en TEXT);
         CREATE TABLE JournalGenre (Key INTEGER PRIMARY KEY, Name_en TEXT);",
    )
    .unwrap();
    for (key, name) in [(40, "Western Thanalan"), (41, "Eastern Thanalan"), (77, "Unknown Isle")] {
        conn.execute("INSERT INTO PlaceName (Key, SGL_en) VALUES (?1, ?2)", params![key, name])
            .unwrap();
    }
    let npcs: [(u32, &str, Option<&str>); 5] = [
        (1001, "Momodi", Some(r#"{"coordinate": {"40": [["205", "205"]]}}"#)),
        (1002, "Eastern Scout", Some(r#"{"coordinate": {"41": [[120, 300]]}}"#)),
        (1003, "Shopkeep", Some(r#"{"shop": [3]}"#)),
        (1004, "Saucer Attendant", Some(r#"{"coordinate": {"77": [[50, 50]]}}"#)),
        (1005, "Western Scout", Some(r#"{"coordinate": {"40": [[100, 110]]}}"#)),
    ];
    for (key, name, data) in npcs {
        conn.execute(
            "INSERT INTO ENpcResident (Key, SGL_en, Index_en, data) VALUES (?1, ?2, ?2, ?3)",
            params![key, name, data],
        )
        .unwrap();
    }
    path
}

fn session(libra: &Path) -> MapSession {
    let config = ResolverConfig {
        libra_candidates: vec![libra.to_path_buf()],
        ..ResolverConfig::default()
    };
    MapSession::open(&config, Arc::new(export()), Arc::new(LogDiagnostics)).unwrap()
}

#[test]
fn libra_pair_lands_in_map_space() {
    let dir = TempDir::new().unwrap();
    let mut session = session(&libra(&dir));

    let record = session.npc(1001).cloned().unwrap();
    assert_eq!(record.status, ResolutionStatus::Resolved);
    assert_eq!(record.territory_id, 140);
    assert_eq!(record.map_id, THANALAN_MAP);
    assert_eq!(record.game, Some(GameCoordinate::new(20.5, 20.5)));

    let transformer = CoordinateTransformer::new(200.0, 0.0, 0.0).unwrap();
    let back = transformer.map_to_game(record.map_x, record.map_y);
    assert!((back.x - 20.5).abs() < 1e-6);
    assert!((back.y - 20.5).abs() < 1e-6);
    assert!((record.map_x - 19.5 * 2.0 / 41.0 * 2048.0).abs() < 1e-6);
}

#[test]
fn npc_without_coordinates_has_no_location() {
    let dir = TempDir::new().unwrap();
    let mut session = session(&libra(&dir));
    assert!(session.npc(1003).is_none());
}

#[test]
fn unmatched_place_resolves_to_map_zero() {
    let dir = TempDir::new().unwrap();
    let mut session = session(&libra(&dir));
    let record = session.npc(1004).cloned().unwrap();
    assert_eq!(record.map_id, 0);
    assert_eq!(record.territory_id, 0);
    assert_eq!(record.status, ResolutionStatus::UnresolvedTerritory);
}

#[test]
fn same_place_resolves_to_the_same_territory() {
    let dir = TempDir::new().unwrap();
    let mut session = session(&libra(&dir));
    let first = session.npc(1001).cloned().unwrap();
    let second = session.npc(1005).cloned().unwrap();
    assert_eq!(first.territory_id, second.territory_id);
    assert_eq!(first.map_id, second.map_id);
}

#[test]
fn territories_sharing_a_map_share_its_marker_list() {
    let dir = TempDir::new().unwrap();
    let mut session = session(&libra(&dir));
    assert_eq!(session.resolve_quests(), 2);
    assert_eq!(session.quest(66001).territory_id, 145);

    let markers = session.markers(THANALAN_MAP).unwrap();
    let quests: Vec<u32> = markers
        .iter()
        .filter(|marker| marker.marker_type == MarkerType::Quest)
        .map(|marker| marker.id)
        .collect();
    assert_eq!(quests, vec![66000, 66001]);

    let again = session.markers(THANALAN_MAP).unwrap();
    assert!(Arc::ptr_eq(&markers, &again));
}
