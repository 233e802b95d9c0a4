//! Reader for LGB level layer files.
//!
//! Layout (little-endian):
//!
//! ```text
//! 0x00  "LGB1"  file_size:u32  chunk_count:u32
//! 0x0c  "LGP1"  chunk_size:u32
//! 0x14  group_id:i32  name_offset:i32  layers_offset:i32  layer_count:i32
//! ```
//!
//! Offsets in the layer group header are relative to 0x14. The layer table
//! holds one `i32` per layer, relative to the table start; each layer carries
//! its own instance object table, with offsets relative to that table.

use std::fs::File;
use std::io::{Cursor, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail, ensure};
use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::MmapOptions;
use serde::Serialize;
use walkdir::WalkDir;

const FILE_MAGIC: &[u8; 4] = b"LGB1";
const CHUNK_MAGIC: &[u8; 4] = b"LGP1";
const GROUP_BASE: usize = 0x14;
const GROUP_HEADER_SIZE: usize = 16;
const LAYER_HEADER_SIZE: usize = 24;
const OBJECT_HEADER_SIZE: usize = 48;

/// Asset type tag stored at the start of every instance object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LayerEntryType {
    Bg,
    PositionMarker,
    SharedGroup,
    EventNpc,
    BattleNpc,
    Aetheryte,
    Gathering,
    Treasure,
    PopRange,
    ExitRange,
    MapRange,
    EventObject,
    EventRange,
    QuestMarker,
    Other(i32),
}

impl LayerEntryType {
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => LayerEntryType::Bg,
            5 => LayerEntryType::PositionMarker,
            6 => LayerEntryType::SharedGroup,
            8 => LayerEntryType::EventNpc,
            9 => LayerEntryType::BattleNpc,
            12 => LayerEntryType::Aetheryte,
            14 => LayerEntryType::Gathering,
            16 => LayerEntryType::Treasure,
            40 => LayerEntryType::PopRange,
            41 => LayerEntryType::ExitRange,
            43 => LayerEntryType::MapRange,
            45 => LayerEntryType::EventObject,
            49 => LayerEntryType::EventRange,
            51 => LayerEntryType::QuestMarker,
            other => LayerEntryType::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            LayerEntryType::Bg => 1,
            LayerEntryType::PositionMarker => 5,
            LayerEntryType::SharedGroup => 6,
            LayerEntryType::EventNpc => 8,
            LayerEntryType::BattleNpc => 9,
            LayerEntryType::Aetheryte => 12,
            LayerEntryType::Gathering => 14,
            LayerEntryType::Treasure => 16,
            LayerEntryType::PopRange => 40,
            LayerEntryType::ExitRange => 41,
            LayerEntryType::MapRange => 43,
            LayerEntryType::EventObject => 45,
            LayerEntryType::EventRange => 49,
            LayerEntryType::QuestMarker => 51,
            LayerEntryType::Other(value) => value,
        }
    }

    /// Object kinds whose payload starts with a base row id.
    fn has_base_id(self) -> bool {
        matches!(
            self,
            LayerEntryType::EventNpc | LayerEntryType::BattleNpc | LayerEntryType::EventObject
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transformation {
    pub translation: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceObject {
    pub asset_type: LayerEntryType,
    pub instance_id: u32,
    pub name: String,
    pub transform: Transformation,
    pub base_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LgbLayer {
    pub layer_id: u32,
    pub name: String,
    pub festival_id: u16,
    pub objects: Vec<InstanceObject>,
}

impl LgbLayer {
    pub fn name_starts_with(&self, prefix: &str) -> bool {
        self.name
            .get(..prefix.len())
            .map(|head| head.eq_ignore_ascii_case(prefix))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LgbFile {
    pub group_id: i32,
    pub group_name: String,
    pub layers: Vec<LgbLayer>,
}

impl LgbFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening LGB file at {}", path.display()))?;
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .with_context(|| format!("memory-mapping LGB file {}", path.display()))?;
        Self::parse(&mmap).with_context(|| format!("parsing LGB file {}", path.display()))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= GROUP_BASE + GROUP_HEADER_SIZE,
            "LGB payload is too small to contain a header"
        );
        if &bytes[0..4] != FILE_MAGIC {
            bail!("LGB file missing LGB1 signature");
        }
        if &bytes[12..16] != CHUNK_MAGIC {
            bail!("LGB file missing LGP1 layer group chunk");
        }

        let mut cursor = Cursor::new(bytes);
        cursor.seek(SeekFrom::Start(4))?;
        let file_size = cursor.read_u32::<LittleEndian>()? as usize;
        ensure!(
            file_size <= bytes.len(),
            "LGB header declares {file_size} bytes but only {} are present",
            bytes.len()
        );

        cursor.seek(SeekFrom::Start(GROUP_BASE as u64))?;
        let group_id = cursor.read_i32::<LittleEndian>()?;
        let name_offset = cursor.read_i32::<LittleEndian>()?;
        let layers_offset = cursor.read_i32::<LittleEndian>()?;
        let layer_count = cursor.read_i32::<LittleEndian>()?;
        ensure!(layer_count >= 0, "negative layer count {layer_count}");

        let group_name = read_c_string(bytes, relative(GROUP_BASE, name_offset)?)
            .context("reading layer group name")?;

        let table_start = relative(GROUP_BASE, layers_offset)?;
        check_offset_table(bytes, table_start, layer_count as usize, "layer")?;
        let mut layers = Vec::with_capacity(layer_count as usize);
        for index in 0..layer_count as usize {
            let slot = table_start + index * 4;
            let layer_offset = read_i32_at(bytes, slot)
                .with_context(|| format!("reading offset of layer {index}"))?;
            let layer_start = relative(table_start, layer_offset)?;
            let layer = read_layer(bytes, layer_start)
                .with_context(|| format!("reading layer {index}"))?;
            layers.push(layer);
        }

        Ok(LgbFile {
            group_id,
            group_name,
            layers,
        })
    }

    pub fn layers_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a LgbLayer> {
        self.layers
            .iter()
            .filter(move |layer| layer.name_starts_with(prefix))
    }
}

fn read_layer(bytes: &[u8], start: usize) -> Result<LgbLayer> {
    ensure!(
        start + LAYER_HEADER_SIZE <= bytes.len(),
        "layer header at {start:#x} extends beyond file"
    );
    let mut cursor = Cursor::new(bytes);
    cursor.seek(SeekFrom::Start(start as u64))?;
    let layer_id = cursor.read_u32::<LittleEndian>()?;
    let name_offset = cursor.read_i32::<LittleEndian>()?;
    let objects_offset = cursor.read_i32::<LittleEndian>()?;
    let object_count = cursor.read_i32::<LittleEndian>()?;
    // tool-mode visibility, read-only, bush and ps3 flags
    cursor.seek(SeekFrom::Current(4))?;
    let festival_id = cursor.read_u16::<LittleEndian>()?;
    ensure!(object_count >= 0, "negative instance object count {object_count}");

    let name = read_c_string(bytes, relative(start, name_offset)?).context("reading layer name")?;

    let table_start = relative(start, objects_offset)?;
    check_offset_table(bytes, table_start, object_count as usize, "instance object")?;
    let mut objects = Vec::with_capacity(object_count as usize);
    for index in 0..object_count as usize {
        let object_offset = read_i32_at(bytes, table_start + index * 4)
            .with_context(|| format!("reading offset of instance object {index}"))?;
        let object_start = relative(table_start, object_offset)?;
        let object = read_instance_object(bytes, object_start)
            .with_context(|| format!("reading instance object {index} of layer '{name}'"))?;
        objects.push(object);
    }

    Ok(LgbLayer {
        layer_id,
        name,
        festival_id,
        objects,
    })
}

fn read_instance_object(bytes: &[u8], start: usize) -> Result<InstanceObject> {
    ensure!(
        start + OBJECT_HEADER_SIZE <= bytes.len(),
        "instance object at {start:#x} extends beyond file"
    );
    let mut cursor = Cursor::new(bytes);
    cursor.seek(SeekFrom::Start(start as u64))?;
    let asset_type = LayerEntryType::from_raw(cursor.read_i32::<LittleEndian>()?);
    let instance_id = cursor.read_u32::<LittleEndian>()?;
    let name_offset = cursor.read_i32::<LittleEndian>()?;
    let translation = read_vec3(&mut cursor)?;
    let rotation = read_vec3(&mut cursor)?;
    let scale = read_vec3(&mut cursor)?;

    let base_id = if asset_type.has_base_id() && start + OBJECT_HEADER_SIZE + 4 <= bytes.len() {
        Some(cursor.read_u32::<LittleEndian>()?)
    } else {
        None
    };

    let name = if name_offset == 0 {
        String::new()
    } else {
        read_c_string(bytes, relative(start, name_offset)?).context("reading object name")?
    };

    Ok(InstanceObject {
        asset_type,
        instance_id,
        name,
        transform: Transformation {
            translation,
            rotation,
            scale,
        },
        base_id,
    })
}

fn read_vec3(cursor: &mut Cursor<&[u8]>) -> Result<[f32; 3]> {
    Ok([
        cursor.read_f32::<LittleEndian>()?,
        cursor.read_f32::<LittleEndian>()?,
        cursor.read_f32::<LittleEndian>()?,
    ])
}

fn read_i32_at(bytes: &[u8], offset: usize) -> Result<i32> {
    let end = offset
        .checked_add(4)
        .ok_or_else(|| anyhow!("offset {offset:#x} overflows"))?;
    ensure!(end <= bytes.len(), "offset table entry at {offset:#x} extends beyond file");
    Ok(i32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]))
}

/// Counts come from the file, so the whole table must fit before anything is
/// allocated for it.
fn check_offset_table(bytes: &[u8], start: usize, count: usize, what: &str) -> Result<()> {
    let end = count
        .checked_mul(4)
        .and_then(|len| start.checked_add(len))
        .ok_or_else(|| anyhow!("{what} table of {count} entries overflows"))?;
    ensure!(
        end <= bytes.len(),
        "{what} table of {count} entries at {start:#x} extends beyond file"
    );
    Ok(())
}

fn relative(base: usize, offset: i32) -> Result<usize> {
    ensure!(offset >= 0, "negative relative offset {offset}");
    base.checked_add(offset as usize)
        .ok_or_else(|| anyhow!("relative offset {offset} overflows base {base:#x}"))
}

fn read_c_string(bytes: &[u8], offset: usize) -> Result<String> {
    if offset >= bytes.len() {
        bail!("string offset {offset:#x} beyond file length");
    }
    let end = bytes[offset..]
        .iter()
        .position(|&b| b == 0)
        .map(|len| offset + len)
        .unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[offset..end]).into_owned())
}

/// Collects every `.lgb` file beneath `root`, sorted by path.
pub fn find_level_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("lgb"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}
