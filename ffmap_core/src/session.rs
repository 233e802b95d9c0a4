use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::data::GameData;
use crate::diagnostics::Diagnostics;
use crate::error::MapError;
use crate::layers::GameDirectoryLayers;
use crate::libra::LibraDatabase;
use crate::location::{LocationRecord, LocationResolver};
use crate::markers::{MarkerCache, MarkerRecord};
use crate::schema::SchemaMapping;

/// A resolver and marker cache wired from one configuration.
pub struct MapSession {
    locations: LocationResolver,
    markers: MarkerCache,
}

impl MapSession {
    /// Validates the schema against `data`, then discovers Libra and the
    /// layer directory. A missing Libra database is logged, not fatal.
    pub fn open(
        config: &ResolverConfig,
        data: Arc<dyn GameData>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, MapError> {
        let schema = SchemaMapping::for_version(&config.schema_version).ok_or_else(|| {
            MapError::Config(format!("unknown schema version '{}'", config.schema_version))
        })?;
        if data.is_available() {
            schema.validate(data.as_ref())?;
        } else {
            log::warn!("data source unavailable; every lookup will be empty");
        }
        let schema = Arc::new(schema);

        let mut locations = LocationResolver::new(data.clone(), schema.clone(), diagnostics.clone())
            .with_known_territories(
                config
                    .known_territories
                    .iter()
                    .map(|(name, id)| (name.clone(), *id)),
                config.known_place_ids.iter().map(|(place, id)| (*place, *id)),
            );
        match LibraDatabase::discover(config.candidate_paths()) {
            Ok(libra) => locations = locations.with_libra(libra),
            Err(err) => log::warn!("{err}; quest and NPC locations will be placeholders"),
        }

        let mut markers = MarkerCache::new(data, schema, diagnostics);
        if let Some(root) = config.game_root.as_ref() {
            log::info!("reading layer files from {}", root.display());
            markers = markers.with_layers(Arc::new(GameDirectoryLayers::new(root)));
        }

        Ok(Self { locations, markers })
    }

    pub fn locations(&self) -> &LocationResolver {
        &self.locations
    }

    pub fn locations_mut(&mut self) -> &mut LocationResolver {
        &mut self.locations
    }

    pub fn marker_cache(&mut self) -> &mut MarkerCache {
        &mut self.markers
    }

    /// Returns how many quests ended up on a map.
    pub fn resolve_quests(&mut self) -> usize {
        self.locations.resolve_all_quests()
    }

    pub fn quest(&mut self, quest_id: u32) -> &LocationRecord {
        self.locations.resolve_quest(quest_id)
    }

    pub fn npc(&mut self, npc_id: u32) -> Option<&LocationRecord> {
        self.locations.resolve_npc(npc_id)
    }

    pub fn markers(&mut self, map_id: u32) -> Result<Arc<Vec<MarkerRecord>>, MapError> {
        self.markers.get_markers(map_id, &mut self.locations)
    }
}
