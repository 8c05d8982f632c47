use crate::engine::LevelDescriptor;

/// Index value meaning "let the engine pick".
pub const AUTO_LEVEL: i32 = -1;

/// One selectable rendition of the current manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLevel {
    pub bitrate: u64,
    pub width: u32,
    pub height: u32,
    pub name: String,
    /// Position in the engine's level list; only stable for one manifest.
    pub index: usize,
}

impl QualityLevel {
    pub fn from_descriptor(index: usize, level: &LevelDescriptor) -> Self {
        Self {
            bitrate: level.bitrate,
            width: level.width,
            height: level.height,
            name: level_name(level),
            index,
        }
    }
}

/// Display name for a level.
///
/// Preference order: the engine's name, `{height}p`, the bitrate in Mbps
/// rounded to a whole number with a `k` suffix (`2_500_000` becomes `3k`,
/// `800_000` becomes `1k`), and finally `{height}p` with a zero height.
pub fn level_name(level: &LevelDescriptor) -> String {
    if let Some(name) = level.name.as_deref().filter(|name| !name.trim().is_empty()) {
        return name.to_string();
    }
    if level.height > 0 {
        return format!("{}p", level.height);
    }
    if level.bitrate > 0 {
        let kbps = (level.bitrate as f64 / 1000.0).round();
        return format!("{}k", (kbps / 1000.0).round() as u64);
    }
    format!("{}p", level.height)
}

pub fn levels_from_descriptors(levels: &[LevelDescriptor]) -> Vec<QualityLevel> {
    levels
        .iter()
        .enumerate()
        .map(|(index, level)| QualityLevel::from_descriptor(index, level))
        .collect()
}

/// Current quality as seen by a session.
///
/// Unlike the plain `-1` convention this separates "no engine" from
/// "automatic selection".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualitySelection {
    Detached,
    Auto,
    Level(usize),
}

impl QualitySelection {
    pub fn from_engine_level(level: i32) -> Self {
        usize::try_from(level).map_or(QualitySelection::Auto, QualitySelection::Level)
    }

    /// Collapses back to the engine convention, where both `Detached` and
    /// `Auto` read as `-1`.
    pub fn as_level_index(self) -> i32 {
        match self {
            QualitySelection::Detached | QualitySelection::Auto => AUTO_LEVEL,
            QualitySelection::Level(index) => i32::try_from(index).unwrap_or(i32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn level(height: u32, bitrate: u64, name: Option<&str>) -> LevelDescriptor {
        LevelDescriptor {
            height,
            width: height * 16 / 9,
            bitrate,
            name: name.map(str::to_string),
        }
    }

    #[rstest]
    #[case(level(720, 0, None), "720p")]
    #[case(level(0, 2_500_000, None), "3k")]
    #[case(level(0, 0, None), "0p")]
    #[case(level(1080, 5_000_000, Some("Full HD")), "Full HD")]
    #[case(level(480, 1_000_000, Some("  ")), "480p")]
    #[case(level(0, 800_000, None), "1k")]
    fn derives_display_name(#[case] level: LevelDescriptor, #[case] expected: &str) {
        assert_eq!(level_name(&level), expected);
    }

    #[test]
    fn indexes_follow_engine_order() {
        let levels = levels_from_descriptors(&[
            level(360, 800_000, None),
            level(720, 2_500_000, Some("HD")),
        ]);
        assert_eq!(levels.len(), 2);
        assert_eq!((levels[0].index, levels[0].name.as_str()), (0, "360p"));
        assert_eq!((levels[1].index, levels[1].name.as_str()), (1, "HD"));
        assert_eq!(levels[1].bitrate, 2_500_000);
    }

    #[test]
    fn selection_round_trips_engine_convention() {
        assert_eq!(QualitySelection::from_engine_level(-1), QualitySelection::Auto);
        assert_eq!(QualitySelection::from_engine_level(2), QualitySelection::Level(2));
        assert_eq!(QualitySelection::Detached.as_level_index(), -1);
        assert_eq!(QualitySelection::Level(3).as_level_index(), 3);
    }
}
