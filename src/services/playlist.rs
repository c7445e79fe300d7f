//! Playlist adapters.
//!
//! [`SpotifyPlaylistSync`] talks to the Spotify Web API with an access token
//! obtained elsewhere; token issuance and refresh are out of scope here.

use crate::error::{AotwError, Result};
use crate::services::traits::{PlaylistSync, TrackQuery};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

const SPOTIFY_API_BASE: &str = "https://api.spotify.com";

/// Search term appended to keep expanded reissues out of the results.
const EXCLUDED_VARIANT: &str = "-deluxe";

/// Spotify caps playlist writes at 100 items per request.
const MAX_ITEMS_PER_WRITE: usize = 100;

/// Build the album search string for a query.
pub fn album_search_query(query: &TrackQuery) -> String {
    format!("{} {} {EXCLUDED_VARIANT}", query.creator, query.title)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    albums: AlbumPage,
}

#[derive(Debug, Deserialize)]
struct AlbumPage {
    #[serde(default)]
    items: Vec<AlbumItem>,
}

#[derive(Debug, Deserialize)]
struct AlbumItem {
    id: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    uri: String,
}

/// Overwrites a playlist with the tracks of the best-matching album.
pub struct SpotifyPlaylistSync {
    access_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl SpotifyPlaylistSync {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: SPOTIFY_API_BASE.to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AotwError::Sync(format!("{what} request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AotwError::Sync(format!("{what} returned {status}: {text}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AotwError::Sync(format!("{what} response malformed: {e}")))
    }

    async fn find_album(&self, query: &TrackQuery) -> Result<AlbumItem> {
        let search = album_search_query(query);
        let request = self
            .client
            .get(format!("{}/v1/search", self.base_url))
            .query(&[("q", search.as_str()), ("type", "album"), ("limit", "1")]);
        let page: SearchResponse = self.get_json(request, "album search").await?;

        page.albums
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AotwError::NotFound(format!("no album matches {search:?}")))
    }

    async fn album_track_uris(&self, album_id: &str) -> Result<Vec<String>> {
        let mut uris = Vec::new();
        let mut next = Some(format!(
            "{}/v1/albums/{album_id}/tracks?limit=50",
            self.base_url
        ));

        while let Some(url) = next.take() {
            let page: TrackPage = self.get_json(self.client.get(url), "album tracks").await?;
            uris.extend(page.items.into_iter().map(|track| track.uri));
            next = page.next;
        }
        Ok(uris)
    }

    async fn write_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/v1/playlists/{playlist_id}/tracks", self.base_url);
        let mut chunks = uris.chunks(MAX_ITEMS_PER_WRITE);

        // PUT replaces the playlist contents; an empty list clears it.
        let empty: &[String] = &[];
        let first = chunks.next().unwrap_or(empty);
        self.send_items(self.client.put(&url), first).await?;
        for chunk in chunks {
            self.send_items(self.client.post(&url), chunk).await?;
        }
        Ok(())
    }

    async fn send_items(&self, request: reqwest::RequestBuilder, uris: &[String]) -> Result<()> {
        let response = request
            .bearer_auth(&self.access_token)
            .json(&json!({ "uris": uris }))
            .send()
            .await
            .map_err(|e| AotwError::Sync(format!("playlist update failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AotwError::Sync(format!(
                "playlist update returned {status}: {text}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PlaylistSync for SpotifyPlaylistSync {
    async fn replace_playlist(
        &self,
        playlist_id: &str,
        query: &TrackQuery,
    ) -> Result<Option<String>> {
        let album = self.find_album(query).await?;
        let uris = self.album_track_uris(&album.id).await?;
        if uris.is_empty() {
            return Err(AotwError::NotFound(format!("album {} has no tracks", album.id)));
        }

        self.write_items(playlist_id, &uris).await?;
        info!(
            "playlist {playlist_id} now holds {} tracks of {} by {}",
            uris.len(),
            query.title,
            query.creator
        );
        Ok(album.external_urls.spotify)
    }
}

/// Logs the playlist change without performing it.
#[derive(Debug, Default)]
pub struct DryRunPlaylistSync;

#[async_trait]
impl PlaylistSync for DryRunPlaylistSync {
    async fn replace_playlist(
        &self,
        playlist_id: &str,
        query: &TrackQuery,
    ) -> Result<Option<String>> {
        info!(
            "dry run: would replace playlist {playlist_id} with {:?}",
            album_search_query(query)
        );
        Ok(None)
    }
}
