//! Map coordinates, quest/NPC locations and per-map marker lists.

pub mod catalog;
pub mod config;
pub mod coords;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod icons;
pub mod layers;
pub mod libra;
pub mod location;
pub mod markers;
pub mod schema;
pub mod session;
pub mod territory;

#[cfg(test)]
mod fixtures;

pub use catalog::{offload, Catalog, SortOrder};
pub use config::ResolverConfig;
pub use coords::{
    libra_to_game, CoordinateTransformer, GameCoordinate, MapDescriptor, RawCoordinate,
};
pub use data::{Cell, DataRowAccessor, GameData, LinkedRow, MemoryGameData};
pub use diagnostics::{CountingDiagnostics, Diagnostics, LoadStats, LogDiagnostics};
pub use error::{CoordinateError, FieldError, LibraError, MapError};
pub use icons::{classify_icon, MarkerType};
pub use layers::{GameDirectoryLayers, LayerSource};
pub use libra::LibraDatabase;
pub use location::{LocationRecord, LocationResolver, LocationSource, ResolutionStatus};
pub use markers::{MarkerCache, MarkerRecord};
pub use schema::{Field, SchemaMapping, Sheet};
pub use session::MapSession;
pub use territory::{TerritoryMatch, TerritoryMatcher};
