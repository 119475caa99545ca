use std::{fs, path::Path};

use log::{debug, error, trace};
use rand::Rng;

use crate::{NotePosition, PersistedState, Result};

/// Default size of a freshly created note window.
pub const NOTE_WIDTH: f64 = 320.0;
pub const NOTE_HEIGHT: f64 = 200.0;

/// Places a new note somewhere in the on-screen band new notes appear in.
pub fn random_position() -> NotePosition {
    let mut rng = rand::thread_rng();
    NotePosition {
        x: 100.0 + rng.gen_range(0.0..=200.0),
        y: 100.0 + rng.gen_range(0.0..=200.0),
        width: NOTE_WIDTH,
        height: NOTE_HEIGHT,
    }
}

/// Helper method to load a full store snapshot from a file
pub fn load_state_from_file(path: &Path) -> Result<PersistedState> {
    debug!("Loading store snapshot from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open store file {}: {}", path.display(), e);
        e
    })?;

    let state: PersistedState = serde_json::from_str(&content)?;
    trace!(
        "Loaded snapshot with {} notes from {}",
        state.notes.len(),
        path.display()
    );
    Ok(state)
}

// Helper method for parsing tags
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Formats seconds as `MM:SS`.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_and_trimmed() {
        assert_eq!(
            parse_tags(Some(" work, ,home ,".into())),
            vec!["work".to_string(), "home".to_string()]
        );
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(25 * 60), "25:00");
        assert_eq!(format_clock(61), "01:01");
    }

    #[test]
    fn positions_stay_in_band() {
        for _ in 0..100 {
            let p = random_position();
            assert!((100.0..=300.0).contains(&p.x));
            assert!((100.0..=300.0).contains(&p.y));
            assert_eq!((p.width, p.height), (NOTE_WIDTH, NOTE_HEIGHT));
        }
    }
}
