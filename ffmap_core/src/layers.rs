//! FATE and quest-battle pins read from a territory's layer group files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ffmap_formats::{LayerEntryType, LgbFile, LgbLayer};

use crate::icons::{MarkerType, FATE_ICON};
use crate::markers::MarkerRecord;

pub const PLANEVENT_FILE: &str = "planevent";
pub const FATE_LAYER_PREFIX: &str = "FATE_";
pub const QUEST_BATTLE_LAYER_PREFIX: &str = "QB_";

/// Loads layer group files by their path inside the game data tree.
pub trait LayerSource: Send + Sync {
    fn load(&self, relative_path: &str) -> Result<LgbFile>;
}

/// Reads LGB files extracted beneath a directory.
#[derive(Debug, Clone)]
pub struct GameDirectoryLayers {
    root: PathBuf,
}

impl GameDirectoryLayers {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LayerSource for GameDirectoryLayers {
    fn load(&self, relative_path: &str) -> Result<LgbFile> {
        let path = self.root.join(relative_path);
        LgbFile::open(&path).with_context(|| format!("loading layer file {}", path.display()))
    }
}

/// Maps a TerritoryType `Bg` value such as
/// `ffxiv/fst_f1/fld/f1f1/level/f1f1` to `bg/ffxiv/fst_f1/fld/f1f1/level/<file>.lgb`.
pub fn level_file_path(bg: &str, file: &str) -> Option<String> {
    let bg = bg.trim().trim_start_matches('/');
    let end = bg.find("/level/").or_else(|| bg.strip_suffix("/level").map(str::len))?;
    let base = &bg[..end];
    if base.is_empty() {
        return None;
    }
    Some(format!("bg/{base}/level/{file}.lgb"))
}

/// FATE_ and QB_ layer objects as map markers. Positions keep world units
/// with the horizontal plane on x/y.
pub fn layer_markers(lgb: &LgbFile, map_id: u32) -> Vec<MarkerRecord> {
    let mut markers = Vec::new();
    for layer in &lgb.layers {
        let (marker_type, icon_id) = if layer.name_starts_with(FATE_LAYER_PREFIX) {
            (MarkerType::Fate, FATE_ICON)
        } else if layer.name_starts_with(QUEST_BATTLE_LAYER_PREFIX) {
            (MarkerType::QuestBattle, 0)
        } else {
            continue;
        };
        collect_layer(layer, map_id, marker_type, icon_id, &mut markers);
    }
    markers
}

fn collect_layer(
    layer: &LgbLayer,
    map_id: u32,
    marker_type: MarkerType,
    icon_id: u32,
    markers: &mut Vec<MarkerRecord>,
) {
    for object in &layer.objects {
        let wanted = match marker_type {
            MarkerType::Fate => matches!(
                object.asset_type,
                LayerEntryType::EventRange | LayerEntryType::PopRange
            ),
            _ => matches!(
                object.asset_type,
                LayerEntryType::EventRange | LayerEntryType::PopRange | LayerEntryType::EventObject
            ),
        };
        if !wanted {
            continue;
        }
        let [tx, ty, tz] = object.transform.translation;
        let mut marker = MarkerRecord::new(object.instance_id, map_id, marker_type, icon_id).at(
            f64::from(tx),
            f64::from(tz),
            f64::from(ty),
        );
        marker.place_name = if object.name.is_empty() {
            layer.name.clone()
        } else {
            object.name.clone()
        };
        markers.push(marker);
    }
}
