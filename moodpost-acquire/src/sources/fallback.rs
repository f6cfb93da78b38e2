//! Static track list used after every tier came up short
//!
//! The built-in entries are royalty-free tracks with stable direct URLs.
//! `acquisition.static_tracks` in the config replaces them.

use crate::types::Candidate;
use moodpost_common::config::StaticTrack;

/// Provider id stamped on static-list candidates
pub const STATIC_PROVIDER_ID: &str = "static";

/// Built-in static list
pub fn builtin_static_tracks() -> Vec<StaticTrack> {
    [
        ("Kevin MacLeod", "Carefree", "https://incompetech.com/music/royalty-free/mp3-royaltyfree/Carefree.mp3"),
        ("Kevin MacLeod", "Wallpaper", "https://incompetech.com/music/royalty-free/mp3-royaltyfree/Wallpaper.mp3"),
        ("Kevin MacLeod", "Local Forecast - Elevator", "https://incompetech.com/music/royalty-free/mp3-royaltyfree/Local%20Forecast%20-%20Elevator.mp3"),
        ("Kevin MacLeod", "Airport Lounge", "https://incompetech.com/music/royalty-free/mp3-royaltyfree/Airport%20Lounge.mp3"),
    ]
    .into_iter()
    .map(|(artist, title, url)| StaticTrack {
        title: title.to_string(),
        artist: artist.to_string(),
        url: url.to_string(),
    })
    .collect()
}

/// Candidates for a static list, skipping entries without a URL
pub fn static_candidates(tracks: &[StaticTrack]) -> Vec<Candidate> {
    tracks
        .iter()
        .filter(|t| !t.url.trim().is_empty())
        .map(|t| Candidate::new(t.title.trim(), t.artist.trim(), t.url.trim(), STATIC_PROVIDER_ID))
        .collect()
}
