//! Listening history from exported Spotify data
//!
//! Reads the JSON files of a "Download your data" export. Both the classic
//! account export (`StreamingHistory*.json`) and the extended streaming
//! history (`Streaming_History_Audio*.json`, `endsong*.json`) are understood.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::HistoryEntry;

const CLASSIC_PREFIX: &str = "StreamingHistory";
const EXTENDED_PREFIXES: [&str; 2] = ["Streaming_History_Audio", "endsong"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassicRecord {
    end_time: String,
    artist_name: String,
    track_name: String,
    ms_played: u64,
}

#[derive(Deserialize)]
struct ExtendedRecord {
    ts: String,
    ms_played: u64,
    master_metadata_album_artist_name: Option<String>,
    master_metadata_track_name: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ExportKind {
    Classic,
    Extended,
}

fn export_kind(file_name: &str) -> Option<ExportKind> {
    if !file_name.ends_with(".json") {
        return None;
    }
    if file_name.starts_with(CLASSIC_PREFIX) {
        Some(ExportKind::Classic)
    } else if EXTENDED_PREFIXES.iter().any(|p| file_name.starts_with(p)) {
        Some(ExportKind::Extended)
    } else {
        None
    }
}

/// Classic exports use "YYYY-MM-DD HH:MM" in UTC.
fn parse_classic_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_extended_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// A parsed export, held newest first.
pub struct ExportHistory {
    entries: Vec<(DateTime<Utc>, HistoryEntry)>,
}

impl ExportHistory {
    /// Read every recognised export file in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let read_dir = fs::read_dir(dir)
            .map_err(|e| Error::History(format!("cannot read {}: {e}", dir.display())))?;

        let mut files: Vec<(PathBuf, ExportKind)> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let kind = export_kind(name.to_str()?)?;
                Some((entry.path(), kind))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut entries = Vec::new();
        for (path, kind) in &files {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::History(format!("cannot read {}: {e}", path.display())))?;
            let parsed = match kind {
                ExportKind::Classic => Self::parse_classic(&content),
                ExportKind::Extended => Self::parse_extended(&content),
            }
            .map_err(|e| Error::History(format!("malformed export {}: {e}", path.display())))?;
            tracing::debug!(path = %path.display(), count = parsed.len(), "Read history export");
            entries.extend(parsed);
        }

        Ok(Self::from_entries(entries))
    }

    fn from_entries(mut entries: Vec<(DateTime<Utc>, HistoryEntry)>) -> Self {
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        tracing::info!(entries = entries.len(), "Listening history export loaded");
        Self { entries }
    }

    fn parse_classic(content: &str) -> serde_json::Result<Vec<(DateTime<Utc>, HistoryEntry)>> {
        let records: Vec<ClassicRecord> = serde_json::from_str(content)?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let played_at = parse_classic_time(&record.end_time)?;
                Some((
                    played_at,
                    HistoryEntry {
                        artist_name: record.artist_name,
                        track_name: record.track_name,
                        end_time: record.end_time,
                        ms_played: Some(record.ms_played),
                        album_art_url: None,
                    },
                ))
            })
            .collect())
    }

    fn parse_extended(content: &str) -> serde_json::Result<Vec<(DateTime<Utc>, HistoryEntry)>> {
        let records: Vec<ExtendedRecord> = serde_json::from_str(content)?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                // Podcast episodes and other non-track rows have no metadata.
                let artist_name = record.master_metadata_album_artist_name?;
                let track_name = record.master_metadata_track_name?;
                let played_at = parse_extended_time(&record.ts)?;
                Some((
                    played_at,
                    HistoryEntry {
                        artist_name,
                        track_name,
                        end_time: record.ts,
                        ms_played: Some(record.ms_played),
                        album_art_url: None,
                    },
                ))
            })
            .collect())
    }

    /// Up to `limit` entries, newest first, strictly older than `before_ms`
    /// (milliseconds since the Unix epoch) when given.
    pub fn recent(&self, before_ms: Option<i64>, limit: usize) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .filter(|(played_at, _)| before_ms.is_none_or(|ms| played_at.timestamp_millis() < ms))
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
