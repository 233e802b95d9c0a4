pub mod lgb;

pub use lgb::{InstanceObject, LayerEntryType, LgbFile, LgbLayer, Transformation, find_level_files};
