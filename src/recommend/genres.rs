//! Emotion to genre lookup table and the track denylist.
//!
//! Both tables are process-wide constants. Only the first genre of each row
//! is used when querying the catalog; the remaining entries are kept as data.

/// Genre used when an emotion label has no row in [`GENRE_TABLE`]
pub const FALLBACK_GENRES: &[&str] = &["pop"];

/// A row of the genre table
#[derive(Debug, Clone, Copy)]
pub struct GenreMapping {
    /// Emotion label as produced by the classifier
    pub emotion: &'static str,
    /// Ordered genres, most representative first
    pub genres: &'static [&'static str],
}

pub const GENRE_TABLE: &[GenreMapping] = &[
    GenreMapping {
        emotion: "joy",
        genres: &["pop", "dance", "happy", "upbeat", "party"],
    },
    GenreMapping {
        emotion: "sadness",
        genres: &["blues", "acoustic", "sad pop", "melancholy", "chill"],
    },
    GenreMapping {
        emotion: "anger",
        genres: &["rock", "metal", "punk", "grunge"],
    },
    GenreMapping {
        emotion: "fear",
        genres: &["ambient", "soundtrack", "horror", "darkwave"],
    },
    GenreMapping {
        emotion: "surprise",
        genres: &["upbeat", "pop", "indie", "funk"],
    },
    GenreMapping {
        emotion: "disgust",
        genres: &["industrial", "gothic", "metal"],
    },
    GenreMapping {
        emotion: "party",
        genres: &["electronic", "house", "dance", "techno", "party"],
    },
];

/// Substrings that exclude a track when found in its name or artist.
/// Matching is case-insensitive; entries are stored lowercase.
pub const DENYLIST: &[&str] = &[
    "bollywood",
    "hindi",
    "punjabi",
    "india",
    "indian",
    "desi",
    "stree",
    "anuv jain",
    "vishal mishra",
];

/// Genres mapped to an emotion label, falling back to [`FALLBACK_GENRES`].
///
/// The lookup is exact: `"Joy"` does not match the `"joy"` row.
pub fn genres_for(emotion: &str) -> &'static [&'static str] {
    GENRE_TABLE
        .iter()
        .find(|row| row.emotion == emotion)
        .map(|row| row.genres)
        .unwrap_or(FALLBACK_GENRES)
}

/// The genre actually queried for an emotion (first entry of its row)
pub fn primary_genre(emotion: &str) -> &'static str {
    genres_for(emotion).first().copied().unwrap_or("pop")
}

/// Whether `text` contains any denylist entry, ignoring case
pub fn is_denied(text: &str) -> bool {
    let lowered = text.to_lowercase();
    DENYLIST.iter().any(|keyword| lowered.contains(keyword))
}
