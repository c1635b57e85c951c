//! Parsing of model completions

use super::{PlaylistMeta, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};
use crate::text::truncate_chars;
use crate::types::{SongPair, TrackCandidate};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawSong {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
}

/// Models sometimes wrap the list in an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSongList {
    Bare(Vec<RawSong>),
    Wrapped { songs: Vec<RawSong> },
}

/// Strip a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the language tag line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Song suggestions from a completion
///
/// Accepts a JSON array of `{title, artist}` objects (optionally fenced or
/// wrapped in `{"songs": [...]}`). Anything else is read line by line as
/// `Title - Artist`. Entries with an empty title or artist are dropped.
pub fn parse_song_list(text: &str, count: usize) -> Vec<SongPair> {
    let body = strip_code_fence(text);

    let songs: Vec<SongPair> = match serde_json::from_str::<RawSongList>(body) {
        Ok(RawSongList::Bare(raw)) | Ok(RawSongList::Wrapped { songs: raw }) => raw
            .into_iter()
            .filter_map(|s| {
                SongPair::new(s.title.unwrap_or_default(), s.artist.unwrap_or_default()).cleaned()
            })
            .collect(),
        Err(_) => parse_song_lines(body),
    };

    songs.into_iter().take(count).collect()
}

fn parse_song_lines(text: &str) -> Vec<SongPair> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(['-', '•', '*', ' ']);
            let (title, artist) = line.split_once('-')?;
            let title = title.trim().trim_matches(['-', '•', ' ']);
            SongPair::new(title, artist.trim()).cleaned()
        })
        .collect()
}

/// Title and description from a metadata completion
///
/// First non-empty line is the title, second the description.
pub fn parse_playlist_meta(text: &str, emotion: &str) -> PlaylistMeta {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let title = lines
        .next()
        .map(clean_meta_line)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("{} playlist", emotion));
    let description = lines
        .next()
        .map(clean_meta_line)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| default_description(emotion));

    PlaylistMeta {
        title: truncate_chars(&title, TITLE_MAX_CHARS),
        description: truncate_chars(&description, DESCRIPTION_MAX_CHARS),
    }
}

/// Description used when the model gives none
pub fn default_description(emotion: &str) -> String {
    format!("Playlist generated for a '{}' mood.", emotion)
}

/// Drop "Title:" style labels and surrounding quotes/markdown
fn clean_meta_line(line: &str) -> String {
    let line = line.trim_matches(['*', '#', ' ']);
    let line = ["title:", "description:"]
        .iter()
        .find_map(|label| {
            line.get(..label.len())
                .filter(|head| head.eq_ignore_ascii_case(label))
                .map(|_| &line[label.len()..])
        })
        .unwrap_or(line);
    line.trim().trim_matches('"').trim().to_string()
}

/// Context block for contextual answers
pub fn format_context(context: &[TrackCandidate], limit: usize) -> String {
    context
        .iter()
        .take(limit)
        .filter_map(|t| {
            let title = t.title.trim();
            let artist = t.artist.trim();
            if title.is_empty() || artist.is_empty() {
                return None;
            }
            Some(format!(
                "- {} - {} [{}; v={:.2}, e={:.2}]",
                title,
                artist,
                t.mood.as_deref().unwrap_or("").trim(),
                t.valence,
                t.energy
            ))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
