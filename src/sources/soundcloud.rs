//! SoundCloud resolver backed by `yt-dlp`.
//!
//! Metadata comes from `yt-dlp -J`; playback streams are songbird
//! [`YoutubeDl`] inputs, probed once with `aux_metadata` so a dead locator is
//! reported as [`ResolveError::StreamUnavailable`] before it reaches the
//! voice driver.

use std::{future::Future, time::Duration};

use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use songbird::input::{Compose, Input, YoutubeDl};
use tracing::{debug, info, warn};
use url::Url;

use super::{ResolvedCollection, ResolvedTrack, TrackResolver};
use crate::error::ResolveError;

const YTDLP: &str = "yt-dlp";

const SOUNDCLOUD_HOSTS: [&str; 4] = [
    "soundcloud.com",
    "www.soundcloud.com",
    "m.soundcloud.com",
    "on.soundcloud.com",
];

/// Salida JSON de `yt-dlp -J`
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    url: Option<String>,
    #[serde(default)]
    entries: Vec<Option<YtDlpInfo>>,
}

impl YtDlpInfo {
    fn locator(&self) -> Option<&str> {
        self.webpage_url
            .as_deref()
            .or(self.original_url.as_deref())
            .or(self.url.as_deref())
    }

    fn into_track(self) -> Option<ResolvedTrack> {
        let locator = self.locator()?.to_string();
        let title = self.title.unwrap_or_else(|| locator.clone());
        Some(ResolvedTrack { locator, title })
    }
}

pub struct SoundCloudResolver {
    http: reqwest::Client,
    timeout: Duration,
    max_collection_size: usize,
}

impl SoundCloudResolver {
    pub fn new(timeout: Duration, max_collection_size: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
            max_collection_size,
        }
    }

    async fn with_timeout<T>(
        &self,
        future: impl Future<Output = Result<T, ResolveError>>,
    ) -> Result<T, ResolveError> {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| ResolveError::Timeout(self.timeout))?
    }

    /// Ejecuta yt-dlp y devuelve el JSON crudo
    async fn dump_json(&self, reference: &str, playlist: bool) -> Result<Vec<u8>, ResolveError> {
        let playlist_flag = if playlist { "--yes-playlist" } else { "--no-playlist" };
        debug!("🔍 yt-dlp -J {} {}", playlist_flag, reference);

        let output = Command::new(YTDLP)
            .args(["-J", "--no-warnings", playlist_flag, reference])
            .output()
            .await
            .map_err(|e| ResolveError::Resolution {
                reference: reference.to_string(),
                reason: format!("no se pudo ejecutar yt-dlp: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Resolution {
                reference: reference.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl TrackResolver for SoundCloudResolver {
    type Stream = Input;

    fn is_supported(&self, reference: &str) -> bool {
        match Url::parse(reference) {
            Ok(url) => {
                matches!(url.scheme(), "http" | "https")
                    && url
                        .host_str()
                        .is_some_and(|host| SOUNDCLOUD_HOSTS.contains(&host))
            }
            Err(_) => false,
        }
    }

    fn is_collection(&self, reference: &str) -> bool {
        reference.contains("/sets/")
    }

    async fn resolve_single(&self, reference: &str) -> Result<ResolvedTrack, ResolveError> {
        let json = self
            .with_timeout(self.dump_json(reference, false))
            .await?;
        parse_single(reference, &json)
    }

    async fn resolve_collection(
        &self,
        reference: &str,
    ) -> Result<ResolvedCollection, ResolveError> {
        let json = self.with_timeout(self.dump_json(reference, true)).await?;
        let mut collection = parse_collection(reference, &json)?;

        if collection.tracks.len() > self.max_collection_size {
            warn!(
                "✂️ Playlist {} recortada de {} a {} pistas",
                collection.title,
                collection.tracks.len(),
                self.max_collection_size
            );
            collection.tracks.truncate(self.max_collection_size);
        }

        info!(
            "📀 Playlist resuelta: {} ({} pistas)",
            collection.title,
            collection.tracks.len()
        );
        Ok(collection)
    }

    async fn open_stream(&self, locator: &str) -> Result<Input, ResolveError> {
        let mut source = YoutubeDl::new(self.http.clone(), locator.to_string());

        self.with_timeout(async {
            source
                .aux_metadata()
                .await
                .map_err(|e| ResolveError::StreamUnavailable {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                })
        })
        .await?;

        Ok(Input::from(source))
    }

    fn source_name(&self) -> &'static str {
        "soundcloud"
    }
}

fn parse_info(reference: &str, json: &[u8]) -> Result<YtDlpInfo, ResolveError> {
    serde_json::from_slice(json).map_err(|e| ResolveError::Resolution {
        reference: reference.to_string(),
        reason: format!("JSON inválido de yt-dlp: {}", e),
    })
}

fn parse_single(reference: &str, json: &[u8]) -> Result<ResolvedTrack, ResolveError> {
    let info = parse_info(reference, json)?;
    let title = info.title.clone();
    let locator = info.locator().unwrap_or(reference).to_string();

    Ok(ResolvedTrack {
        title: title.unwrap_or_else(|| locator.clone()),
        locator,
    })
}

fn parse_collection(reference: &str, json: &[u8]) -> Result<ResolvedCollection, ResolveError> {
    let info = parse_info(reference, json)?;
    let title = info.title.unwrap_or_else(|| reference.to_string());

    // Las entradas nulas son pistas no disponibles
    let tracks: Vec<ResolvedTrack> = info
        .entries
        .into_iter()
        .flatten()
        .filter_map(YtDlpInfo::into_track)
        .collect();

    if tracks.is_empty() {
        return Err(ResolveError::EmptyCollection(reference.to_string()));
    }

    Ok(ResolvedCollection { title, tracks })
}
