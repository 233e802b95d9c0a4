use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerType {
    Generic,
    Quest,
    Fate,
    Aetheryte,
    Shop,
    Landmark,
    Entrance,
    Symbol,
    Custom,
    QuestBattle,
}

pub const AETHERYTE_ICON: u32 = 60441;
pub const FATE_ICON: u32 = 60093;
pub const CUSTOM_ICON_START: u32 = 62000;

/// Classifies a map icon id. Ranges are checked most specific first, so a
/// 60901 icon is an entrance even though it sits inside the symbol range.
pub fn classify_icon(icon_id: u32) -> MarkerType {
    match icon_id {
        AETHERYTE_ICON => MarkerType::Aetheryte,
        FATE_ICON | 60501..=60505 => MarkerType::Fate,
        60901..=60950 | 61001..=61050 => MarkerType::Entrance,
        id if id >= CUSTOM_ICON_START => MarkerType::Custom,
        60300..=60999 => MarkerType::Symbol,
        _ => MarkerType::Generic,
    }
}

/// Texture path of an icon inside the game's `ui/icon` tree.
pub fn icon_path(icon_id: u32) -> Option<String> {
    if icon_id == 0 {
        return None;
    }
    let folder = icon_id / 1000 * 1000;
    Some(format!("ui/icon/{folder:06}/{icon_id:06}.tex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_boundaries() {
        assert_eq!(classify_icon(60441), MarkerType::Aetheryte);
        assert_eq!(classify_icon(60093), MarkerType::Fate);
        assert_eq!(classify_icon(60501), MarkerType::Fate);
        assert_eq!(classify_icon(60505), MarkerType::Fate);
        assert_eq!(classify_icon(60506), MarkerType::Symbol);
        assert_eq!(classify_icon(60901), MarkerType::Entrance);
        assert_eq!(classify_icon(60950), MarkerType::Entrance);
        assert_eq!(classify_icon(60951), MarkerType::Symbol);
        assert_ne!(classify_icon(61000), MarkerType::Entrance);
        assert_eq!(classify_icon(61001), MarkerType::Entrance);
        assert_eq!(classify_icon(61050), MarkerType::Entrance);
        assert_eq!(classify_icon(61051), MarkerType::Generic);
        assert_eq!(classify_icon(62000), MarkerType::Custom);
        assert_eq!(classify_icon(60300), MarkerType::Symbol);
        assert_eq!(classify_icon(60299), MarkerType::Generic);
        assert_eq!(classify_icon(0), MarkerType::Generic);
    }

    #[test]
    fn icon_paths_use_thousand_folders() {
        assert_eq!(
            icon_path(60441).as_deref(),
            Some("ui/icon/060000/060441.tex")
        );
        assert_eq!(
            icon_path(71221).as_deref(),
            Some("ui/icon/071000/071221.tex")
        );
        assert_eq!(icon_path(0), None);
    }
}
