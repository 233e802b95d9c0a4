use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ffmap_core::catalog::{
    load_fates, load_instance_content, load_npcs, load_quests, load_territories,
};
use ffmap_core::{
    offload, CoordinateTransformer, GameCoordinate, GameData, LogDiagnostics, MapSession,
    MarkerRecord, MarkerType, MemoryGameData, RawCoordinate, ResolverConfig, SortOrder,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(author, version, about = "Map coordinates, locations and markers from exported game sheets", long_about = None)]
struct Args {
    /// Sheet export JSON; without it every lookup comes back empty
    #[arg(long, global = true)]
    sheets: Option<PathBuf>,

    /// Optional resolver config JSON (Libra candidates, game root, known territories)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Libra database to try before the configured candidates
    #[arg(long, global = true)]
    libra: Option<PathBuf>,

    /// Directory holding extracted bg/ layer files
    #[arg(long, global = true)]
    game_root: Option<PathBuf>,

    /// Write JSON here instead of stdout
    #[arg(long, global = true)]
    json_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Marker list of one map
    Markers {
        map_id: u32,
        /// Leave quest givers out of the list
        #[arg(long)]
        skip_quests: bool,
    },
    /// Location of a quest's giver
    Quest { quest_id: u32 },
    /// Location of an NPC
    Npc { npc_id: u32 },
    /// Convert a point between world, map, pixel and game space
    Convert {
        #[arg(long, default_value_t = 200)]
        size_factor: u16,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset_x: i16,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset_y: i16,
        #[arg(long, value_enum, default_value_t = Space::World)]
        from: Space,
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },
    /// Bulk listing of one entity kind
    Catalog {
        #[arg(value_enum)]
        kind: CatalogKind,
        #[arg(long, value_enum, default_value_t = SortKey::Id)]
        sort: SortKey,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Space {
    /// World x/z (same units as map space)
    World,
    Pixel,
    Game,
    /// Libra pair, tenths of a game unit
    Libra,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CatalogKind {
    Quests,
    Npcs,
    Fates,
    Territories,
    Instances,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortKey {
    Id,
    Name,
}

impl From<SortKey> for SortOrder {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Id => SortOrder::Id,
            SortKey::Name => SortOrder::Name,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct ConvertedPoint {
    game: GameCoordinate,
    map_x: f64,
    map_y: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::init();
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    if let Command::Convert {
        size_factor,
        offset_x,
        offset_y,
        from,
        x,
        y,
    } = args.command
    {
        let point = convert_point(size_factor, offset_x, offset_y, from, x, y)?;
        return write_json(args.json_out.as_deref(), &point);
    }

    let config = load_config(&args)?;
    let data = load_data(args.sheets.as_deref())?;
    let mut session = MapSession::open(&config, data, Arc::new(LogDiagnostics))
        .context("opening map session")?;

    match args.command {
        Command::Markers {
            map_id,
            skip_quests,
        } => {
            let markers = session.markers(map_id)?;
            log::info!("{} markers on map {map_id}", markers.len());
            if skip_quests {
                let rest: Vec<&MarkerRecord> = markers
                    .iter()
                    .filter(|marker| marker.marker_type != MarkerType::Quest)
                    .collect();
                return write_json(args.json_out.as_deref(), &rest);
            }
            write_json(args.json_out.as_deref(), markers.as_slice())
        }
        Command::Quest { quest_id } => {
            let record = session.quest(quest_id).clone();
            write_json(args.json_out.as_deref(), &record)
        }
        Command::Npc { npc_id } => {
            let record = session.npc(npc_id).cloned();
            if record.is_none() {
                log::warn!("npc {npc_id} has no recorded coordinates");
            }
            write_json(args.json_out.as_deref(), &record)
        }
        Command::Catalog { kind, sort } => {
            let order = SortOrder::from(sort);
            let json = offload(move || build_catalog(&mut session, kind, order)).await??;
            write_json(args.json_out.as_deref(), &json)
        }
        Command::Convert { .. } => Ok(()),
    }
}

fn load_config(args: &Args) -> Result<ResolverConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };
    if let Some(libra) = args.libra.clone() {
        config.libra_candidates.insert(0, libra);
    }
    if let Some(root) = args.game_root.clone() {
        config.game_root = Some(root);
    }
    Ok(config)
}

fn load_data(sheets: Option<&Path>) -> Result<Arc<dyn GameData>> {
    match sheets {
        Some(path) => {
            let data = MemoryGameData::from_json_file(path)
                .with_context(|| format!("loading sheet export {}", path.display()))?;
            Ok(Arc::new(data))
        }
        None => {
            log::warn!("no --sheets export given; results will be empty");
            Ok(Arc::new(MemoryGameData::unavailable()))
        }
    }
}

fn build_catalog(
    session: &mut MapSession,
    kind: CatalogKind,
    order: SortOrder,
) -> Result<serde_json::Value> {
    let locations = session.locations_mut();
    let value = match kind {
        CatalogKind::Quests => serde_json::to_value(load_quests(locations, order))?,
        CatalogKind::Npcs => serde_json::to_value(load_npcs(locations, order))?,
        CatalogKind::Fates => serde_json::to_value(load_fates(
            locations.data(),
            locations.schema(),
            locations.diagnostics(),
            order,
        ))?,
        CatalogKind::Territories => serde_json::to_value(load_territories(
            locations.data(),
            locations.schema(),
            locations.diagnostics(),
            order,
        ))?,
        CatalogKind::Instances => serde_json::to_value(load_instance_content(
            locations.data(),
            locations.schema(),
            locations.diagnostics(),
            order,
        ))?,
    };
    Ok(value)
}

fn convert_point(
    size_factor: u16,
    offset_x: i16,
    offset_y: i16,
    from: Space,
    x: f64,
    y: f64,
) -> Result<ConvertedPoint> {
    ensure!(x.is_finite() && y.is_finite(), "coordinates must be finite (got {x}, {y})");
    let transformer = CoordinateTransformer::new(
        f64::from(size_factor),
        f64::from(offset_x),
        f64::from(offset_y),
    )?;
    let game = match from {
        Space::World => transformer.world_to_game(RawCoordinate::new(x as f32, 0.0, y as f32)),
        Space::Pixel => transformer.pixel_to_game(x, y),
        Space::Game => GameCoordinate::new(x, y),
        Space::Libra => ffmap_core::libra_to_game(x, y),
    };
    let (map_x, map_y) = transformer.game_to_map(game);
    Ok(ConvertedPoint { game, map_x, map_y })
}

fn write_json<T: Serialize + ?Sized>(path: Option<&Path>, value: &T) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer_pretty(file, value)?;
            println!("[ffmap] wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_global_flags_after_the_subcommand() {
        let args = Args::try_parse_from([
            "ffmap",
            "catalog",
            "fates",
            "--sort",
            "name",
            "--sheets",
            "export.json",
        ])
        .unwrap();
        assert_eq!(args.sheets.as_deref(), Some(Path::new("export.json")));
        match args.command {
            Command::Catalog { kind, sort } => {
                assert_eq!(kind, CatalogKind::Fates);
                assert_eq!(sort, SortKey::Name);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn converts_world_origin_to_the_grid_corner() {
        let point = convert_point(200, 0, 0, Space::World, 0.0, 0.0).unwrap();
        assert_eq!(point.game, GameCoordinate::new(1.0, 1.0));

        let libra = convert_point(100, -448, 0, Space::Libra, 205.0, 205.0).unwrap();
        assert!((libra.game.x - 20.5).abs() < 1e-9);
        let back = convert_point(100, -448, 0, Space::World, libra.map_x, libra.map_y).unwrap();
        assert!((back.game.x - 20.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_a_zero_size_factor() {
        assert!(convert_point(0, 0, 0, Space::Game, 10.0, 10.0).is_err());
    }

    #[test]
    fn writes_json_to_the_requested_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("point.json");
        let point = convert_point(200, 0, 0, Space::Game, 21.5, 21.5).unwrap();
        write_json(Some(&path), &point).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["game"]["x"], 21.5);
    }

    #[test]
    fn flags_override_config_values() {
        let args = Args::try_parse_from([
            "ffmap",
            "--libra",
            "/tmp/libra.sqlite",
            "--game-root",
            "/data/game",
            "npc",
            "1000100",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.libra_candidates[0], PathBuf::from("/tmp/libra.sqlite"));
        assert_eq!(config.game_root, Some(PathBuf::from("/data/game")));
    }
}
