use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::coords::{CoordinateTransformer, GameCoordinate, MapDescriptor, DEFAULT_SIZE_FACTOR};
use crate::data::GameData;
use crate::diagnostics::{or_placeholder, Diagnostics};
use crate::error::MapError;
use crate::icons::{classify_icon, icon_path, MarkerType};
use crate::layers::{layer_markers, level_file_path, LayerSource, PLANEVENT_FILE};
use crate::location::LocationResolver;
use crate::schema::{Field, SchemaMapping, Sheet};
use crate::territory::read_place_name;

/// Icon shown for quest givers.
pub const QUEST_ICON: u32 = 71221;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerRecord {
    pub id: u32,
    pub map_id: u32,
    /// Map-space position; `z` is height.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub place_name_id: u32,
    pub place_name: String,
    pub icon_id: u32,
    pub marker_type: MarkerType,
    pub is_visible: bool,
    pub icon_path: Option<String>,
}

impl MarkerRecord {
    /// Markers without an icon have nothing to draw and start hidden.
    pub fn new(id: u32, map_id: u32, marker_type: MarkerType, icon_id: u32) -> Self {
        Self {
            id,
            map_id,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            place_name_id: 0,
            place_name: String::new(),
            icon_id,
            marker_type,
            is_visible: icon_id != 0,
            icon_path: icon_path(icon_id),
        }
    }

    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    pub fn game_coordinate(&self, transformer: &CoordinateTransformer) -> GameCoordinate {
        transformer.map_to_game(self.x, self.y)
    }
}

/// Reads a Map row. Unreadable scale fields fall back to 200% and no offset.
pub fn read_map_descriptor(
    data: &dyn GameData,
    schema: &SchemaMapping,
    map_id: u32,
    diagnostics: &dyn Diagnostics,
) -> Result<MapDescriptor, MapError> {
    let row = schema
        .row(data, Sheet::Map, map_id)
        .ok_or(MapError::MapNotFound(map_id))?;
    let size_factor = or_placeholder(
        row.uint(Field::MapSizeFactor),
        u32::from(DEFAULT_SIZE_FACTOR),
        diagnostics,
    );
    let offset_x = or_placeholder(row.int(Field::MapOffsetX), 0, diagnostics);
    let offset_y = or_placeholder(row.int(Field::MapOffsetY), 0, diagnostics);
    Ok(MapDescriptor {
        map_id,
        territory_id: or_placeholder(row.link_id(Field::MapTerritory), 0, diagnostics),
        size_factor: u16::try_from(size_factor).unwrap_or(DEFAULT_SIZE_FACTOR),
        offset_x: clamp_i16(offset_x),
        offset_y: clamp_i16(offset_y),
        place_name_id: or_placeholder(row.link_id(Field::MapPlaceName), 0, diagnostics),
        marker_range: or_placeholder(row.uint(Field::MapMarkerRange), 0, diagnostics),
    })
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Per-map marker lists, built on first request and kept for the life of
/// the cache.
pub struct MarkerCache {
    data: Arc<dyn GameData>,
    schema: Arc<SchemaMapping>,
    diagnostics: Arc<dyn Diagnostics>,
    layers: Option<Arc<dyn LayerSource>>,
    entries: HashMap<u32, Arc<Vec<MarkerRecord>>>,
}

impl MarkerCache {
    pub fn new(
        data: Arc<dyn GameData>,
        schema: Arc<SchemaMapping>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            data,
            schema,
            diagnostics,
            layers: None,
            entries: HashMap::new(),
        }
    }

    pub fn with_layers(mut self, layers: Arc<dyn LayerSource>) -> Self {
        self.layers = Some(layers);
        self
    }

    pub fn cached(&self, map_id: u32) -> Option<Arc<Vec<MarkerRecord>>> {
        self.entries.get(&map_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops one map's list. Nothing calls this implicitly.
    pub fn invalidate(&mut self, map_id: u32) -> bool {
        self.entries.remove(&map_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Markers of `map_id`. Every quest is resolved before the first build,
    /// so the list never depends on what callers resolved earlier. A second
    /// call returns the same `Arc`.
    pub fn get_markers(
        &mut self,
        map_id: u32,
        locations: &mut LocationResolver,
    ) -> Result<Arc<Vec<MarkerRecord>>, MapError> {
        if let Some(cached) = self.entries.get(&map_id) {
            return Ok(Arc::clone(cached));
        }
        if !self.data.is_available() {
            return Ok(Arc::new(Vec::new()));
        }

        let descriptor = read_map_descriptor(
            self.data.as_ref(),
            &self.schema,
            map_id,
            self.diagnostics.as_ref(),
        )?;
        let transformer = descriptor.transformer()?;
        locations.resolve_all_quests();

        let mut list = MarkerList::default();
        self.collect_quests(&mut list, map_id, locations);
        self.collect_fates(&mut list, map_id);
        self.collect_layers(&mut list, &descriptor);
        self.collect_sheet_markers(&mut list, &descriptor, &transformer);

        log::debug!("built {} markers for map {map_id}", list.markers.len());
        let markers = Arc::new(list.markers);
        self.entries.insert(map_id, Arc::clone(&markers));
        Ok(markers)
    }

    fn collect_quests(&self, list: &mut MarkerList, map_id: u32, locations: &LocationResolver) {
        for location in locations.quest_locations_on_map(map_id) {
            let mut marker =
                MarkerRecord::new(location.entity_id, map_id, MarkerType::Quest, QUEST_ICON)
                    .at(location.map_x, location.map_y, location.map_z);
            marker.place_name = location.place_name.clone();
            list.push(marker);
        }
    }

    fn collect_fates(&self, list: &mut MarkerList, map_id: u32) {
        for fate_id in self.data.row_ids(Sheet::Fate.name()) {
            match self.fate_marker(fate_id, map_id) {
                Ok(Some(marker)) => list.push(marker),
                Ok(None) => {}
                Err(err) => self.diagnostics.entity_skipped("fate", fate_id, &err),
            }
        }
    }

    fn fate_marker(&self, fate_id: u32, map_id: u32) -> Result<Option<MarkerRecord>, MapError> {
        let data = self.data.as_ref();
        let diagnostics = self.diagnostics.as_ref();
        let Some(fate) = self.schema.row(data, Sheet::Fate, fate_id) else {
            return Ok(None);
        };
        let level_id = fate.link_id(Field::FateLocation)?;
        if level_id == 0 {
            return Ok(None);
        }
        let Some(level) = self.schema.row(data, Sheet::Level, level_id) else {
            return Ok(None);
        };
        if level.link_id(Field::LevelMap)? != map_id {
            return Ok(None);
        }
        let x = f64::from(level.float(Field::LevelX)?);
        let y = f64::from(level.float(Field::LevelY)?);
        let z = f64::from(level.float(Field::LevelZ)?);

        let icon_id = or_placeholder(fate.uint(Field::FateMapIcon), 0, diagnostics);
        let marker_type = match classify_icon(icon_id) {
            MarkerType::Generic => MarkerType::Fate,
            other => other,
        };
        let mut marker = MarkerRecord::new(fate_id, map_id, marker_type, icon_id).at(x, z, y);
        marker.place_name =
            or_placeholder(fate.string(Field::FateName), String::new(), diagnostics);
        Ok(Some(marker))
    }

    fn collect_layers(&self, list: &mut MarkerList, descriptor: &MapDescriptor) {
        let Some(source) = self.layers.as_ref() else {
            return;
        };
        if descriptor.territory_id == 0 {
            return;
        }
        let Some(territory) =
            self.schema
                .row(self.data.as_ref(), Sheet::TerritoryType, descriptor.territory_id)
        else {
            return;
        };
        let bg = or_placeholder(
            territory.string(Field::TerritoryBg),
            String::new(),
            self.diagnostics.as_ref(),
        );
        let Some(path) = level_file_path(&bg, PLANEVENT_FILE) else {
            log::debug!("territory {} has no level path in '{bg}'", descriptor.territory_id);
            return;
        };
        match source.load(&path) {
            Ok(lgb) => {
                for marker in layer_markers(&lgb, descriptor.map_id) {
                    list.push(marker);
                }
            }
            Err(err) => self.diagnostics.extraction_failed(&MapError::Layer {
                path,
                message: format!("{err:#}"),
            }),
        }
    }

    fn collect_sheet_markers(
        &self,
        list: &mut MarkerList,
        descriptor: &MapDescriptor,
        transformer: &CoordinateTransformer,
    ) {
        if descriptor.marker_range == 0 {
            return;
        }
        for row_id in self.data.row_ids(Sheet::MapMarker.name()) {
            match self.sheet_marker(row_id, descriptor, transformer) {
                Ok(Some(marker)) => list.push(marker),
                Ok(None) => {}
                Err(err) => self.diagnostics.entity_skipped("map marker", row_id, &err),
            }
        }
    }

    fn sheet_marker(
        &self,
        row_id: u32,
        descriptor: &MapDescriptor,
        transformer: &CoordinateTransformer,
    ) -> Result<Option<MarkerRecord>, MapError> {
        let data = self.data.as_ref();
        let Some(row) = self.schema.row(data, Sheet::MapMarker, row_id) else {
            return Ok(None);
        };
        if row.uint(Field::MarkerRange)? != descriptor.marker_range {
            return Ok(None);
        }
        let pixel_x = f64::from(row.int(Field::MarkerX)?);
        let pixel_y = f64::from(row.int(Field::MarkerY)?);
        let icon_id = or_placeholder(row.uint(Field::MarkerIcon), 0, self.diagnostics.as_ref());
        let place_name_id = or_placeholder(
            row.link_id(Field::MarkerPlaceName),
            0,
            self.diagnostics.as_ref(),
        );

        let (x, y) = transformer.game_to_map(transformer.pixel_to_game(pixel_x, pixel_y));
        let marker_type = classify_icon(icon_id);
        let mut marker =
            MarkerRecord::new(row_id, descriptor.map_id, marker_type, icon_id).at(x, y, 0.0);
        marker.place_name_id = place_name_id;
        marker.place_name =
            read_place_name(data, &self.schema, place_name_id, self.diagnostics.as_ref());
        Ok(Some(marker))
    }
}

/// Keeps the first marker per (type, id).
#[derive(Default)]
struct MarkerList {
    seen: HashSet<(MarkerType, u32)>,
    markers: Vec<MarkerRecord>,
}

impl MarkerList {
    fn push(&mut self, marker: MarkerRecord) {
        if self.seen.insert((marker.marker_type, marker.id)) {
            self.markers.push(marker);
        }
    }
}
