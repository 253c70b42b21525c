//! LRCLIB lookup client.
//!
//! Two endpoints: `/api/get` for an exact signature match and `/api/search`
//! for a free-text search. Both return records carrying optional synced and
//! plain lyrics; a record without either is useless and dropped.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::LookupError;
use crate::models::{LyricCandidate, Track};

pub const DEFAULT_API_URL: &str = "https://lrclib.net";
const USER_AGENT: &str = concat!("lrc-fetcher/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote lyric catalog.
pub trait LyricsLookup: Send + Sync {
    /// Look up one track by its exact signature. `Ok(None)` when the catalog
    /// has no such track.
    fn lookup_exact(
        &self,
        title: &str,
        artist: &str,
        album: Option<&str>,
        duration_secs: u32,
    ) -> Result<Option<LyricCandidate>, LookupError>;

    /// Free-text search; results in catalog order.
    fn lookup_fuzzy(&self, query: &str) -> Result<Vec<LyricCandidate>, LookupError>;
}

/// The broad query used when the exact lookup finds nothing usable.
pub fn fuzzy_query(track: &Track) -> String {
    format!("{} {}", track.artist.trim(), track.title.trim())
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LrclibRecord {
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub instrumental: bool,
    #[serde(default)]
    pub synced_lyrics: Option<String>,
    #[serde(default)]
    pub plain_lyrics: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.trim().is_empty())
}

impl LrclibRecord {
    /// Synced lyrics win over plain ones; instrumentals and empty records
    /// yield nothing.
    pub fn to_candidate(&self) -> Option<LyricCandidate> {
        if self.instrumental {
            return None;
        }
        let (is_synced, body) = match (non_empty(&self.synced_lyrics), non_empty(&self.plain_lyrics)) {
            (Some(synced), _) => (true, synced),
            (None, Some(plain)) => (false, plain),
            (None, None) => return None,
        };
        Some(LyricCandidate {
            title: self.track_name.clone(),
            artist: self.artist_name.clone(),
            album: self.album_name.clone().filter(|a| !a.is_empty()),
            duration_secs: self.duration.max(0.0).round() as u32,
            is_synced,
            body: body.to_string(),
        })
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct LrclibClient {
    http: Client,
    base_url: String,
}

impl LrclibClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

fn network(e: reqwest::Error) -> LookupError {
    if e.is_decode() {
        LookupError::Decode(e.to_string())
    } else {
        LookupError::Network(e.to_string())
    }
}

impl LyricsLookup for LrclibClient {
    fn lookup_exact(
        &self,
        title: &str,
        artist: &str,
        album: Option<&str>,
        duration_secs: u32,
    ) -> Result<Option<LyricCandidate>, LookupError> {
        let mut params: Vec<(&str, String)> = vec![
            ("track_name", title.to_string()),
            ("artist_name", artist.to_string()),
        ];
        if let Some(album) = album {
            params.push(("album_name", album.to_string()));
        }
        if duration_secs > 0 {
            params.push(("duration", duration_secs.to_string()));
        }

        debug!(title, artist, "exact lookup");
        let response = self
            .http
            .get(self.endpoint("get"))
            .query(&params)
            .send()
            .map_err(network)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LookupError::Service {
                status: status.as_u16(),
            });
        }

        let record: LrclibRecord = response.json().map_err(network)?;
        Ok(record.to_candidate())
    }

    fn lookup_fuzzy(&self, query: &str) -> Result<Vec<LyricCandidate>, LookupError> {
        debug!(query, "fuzzy search");
        let response = self
            .http
            .get(self.endpoint("search"))
            .query(&[("q", query)])
            .send()
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Service {
                status: status.as_u16(),
            });
        }

        let records: Vec<LrclibRecord> = response.json().map_err(network)?;
        Ok(records.iter().filter_map(LrclibRecord::to_candidate).collect())
    }
}
