//! High-level client for the catalog and the media pipeline.
//!
//! Every call goes through the rate limiter of its class. Gateway calls
//! additionally run under the session policy:
//!
//! 1. Get the current session, logging in when there is none
//! 2. Call the gateway with the session's form token
//! 3. On failure, discard the session and retry once with a new login,
//!    unless the failed attempt already ran on a brand new session
//!
//! A login failure is returned at once.

use std::fmt;

use url::Url;

use crate::{
    config::{Config, Endpoints},
    decrypt::{Decrypt, Key},
    error::{Error, Result},
    http,
    metadata,
    protocol::{
        api,
        gateway::{
            page::Song, search::Hit, AlbumPage, Method, PageAlbum, PagePlaylist, PageTrack,
            PlaylistPage, SearchKind, SearchMusic, SearchResults,
        },
        image::{ImageFormat, Picture, Size},
        media::Format,
    },
    ratelimit::{Class, RateLimiters},
    retry::{self, Policy},
    session::SessionManager,
    tags::{Cover, Tags},
    upstream::Upstream,
};

/// Failed gateway attempt and whether the policy may retry it.
struct Attempt {
    error: Error,
    retryable: bool,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

pub struct Client {
    upstream: Upstream,
    sessions: SessionManager,
    limiters: RateLimiters,
    bf_secret: Key,
    app_lang: String,
}

impl Client {
    /// Creates a client without logging in. The first gateway call or
    /// download logs in.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let http = http::Client::new(&config)?;
        let upstream = Upstream::new(http, config.endpoints);

        Ok(Self {
            sessions: SessionManager::new(upstream.clone(), config.credentials),
            upstream,
            limiters: RateLimiters::new(),
            bf_secret: config.bf_secret,
            app_lang: config.app_lang,
        })
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        self.upstream.endpoints()
    }

    async fn call_gateway<M: Method>(&self, params: &M) -> Result<M::Response> {
        // One permit covers the login and the retry.
        let _permit = self.limiters.acquire(Class::Gateway).await;

        let outcome = retry::retry(
            Policy::GATEWAY,
            M::METHOD,
            |_| async move {
                let (session, fresh) = match self.sessions.ensure_session().await {
                    Ok(current) => current,
                    Err(error) => {
                        return Err(Attempt {
                            error,
                            retryable: false,
                        })
                    }
                };

                match self
                    .upstream
                    .call_gateway(params, Some(session.api_token()))
                    .await
                {
                    Ok(response) => Ok(response),
                    Err(error) => {
                        self.sessions.invalidate(&session).await;
                        Err(Attempt {
                            error,
                            retryable: !fresh,
                        })
                    }
                }
            },
            |attempt| attempt.retryable,
        )
        .await;

        outcome.map_err(|attempt| attempt.error)
    }

    /// Gets the page of a track.
    ///
    /// When the track was replaced by another one, the page of the
    /// replacement is returned.
    ///
    /// # Errors
    ///
    /// Returns an error when either page cannot be fetched.
    pub async fn get_track_page(&self, id: u64) -> Result<Song> {
        let page = self.call_gateway(&PageTrack { id }).await?;
        match page.data.fallback {
            Some(fallback) if fallback.id != id => {
                debug!("track {id} falls back to {}", fallback.id);
                let page = self.call_gateway(&PageTrack { id: fallback.id }).await?;
                Ok(page.data)
            }
            _ => Ok(page.data),
        }
    }

    /// Gets an album with its track list.
    ///
    /// # Errors
    ///
    /// Returns an error when the page cannot be fetched.
    pub async fn get_album_page(&self, id: u64) -> Result<AlbumPage> {
        self.call_gateway(&PageAlbum::new(id, &self.app_lang)).await
    }

    /// Gets a playlist with all of its tracks.
    ///
    /// # Errors
    ///
    /// Returns an error when the page cannot be fetched.
    pub async fn get_playlist_page(&self, id: u64) -> Result<PlaylistPage> {
        self.call_gateway(&PagePlaylist::new(id, &self.app_lang)).await
    }

    /// Searches the catalog for records of `kind`, starting at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error when the search fails or its results cannot be
    /// decoded.
    pub async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        index: u64,
        limit: u64,
    ) -> Result<SearchResults<Hit>> {
        let results = self
            .call_gateway(&SearchMusic::new(query, kind, index, limit))
            .await?;
        results.decode(kind)
    }

    /// Gets the public API record of a track.
    ///
    /// # Errors
    ///
    /// Returns an error when the API reports one.
    pub async fn get_api_track(&self, id: u64) -> Result<api::Track> {
        let _permit = self.limiters.acquire(Class::Api).await;
        self.upstream.call_public_api(&format!("track/{id}")).await
    }

    /// Gets a track together with its album and its public API record.
    ///
    /// The album page and the API record are fetched concurrently once the
    /// track page is known. The first failure cancels the other fetch.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the fetches.
    pub async fn get_track_details(&self, id: u64) -> Result<TrackDetails> {
        let song = self.get_track_page(id).await?;
        let (album_page, api_track) = tokio::try_join!(
            self.get_album_page(song.album_id),
            self.get_api_track(song.id),
        )?;

        Ok(TrackDetails {
            song,
            album_page,
            api_track,
        })
    }

    /// Downloads and decrypts a whole track.
    ///
    /// # Errors
    ///
    /// Returns an error when no session can be established, when no URL is
    /// available in `format`, or when the transfer fails at any point.
    pub async fn download_track(
        &self,
        id: u64,
        track_token: &str,
        format: Format,
    ) -> Result<Vec<u8>> {
        let _permit = self.limiters.acquire(Class::Track).await;

        let (session, _) = self.sessions.ensure_session().await?;
        let url = self
            .upstream
            .resolve_track_url(track_token, format, session.license_token())
            .await?;
        debug!("resolved {format} source of track {id}");

        info!("downloading track {id} as {format}");
        let stream = self.upstream.open_stream(url).await?;
        Decrypt::new(&id.to_string(), Box::pin(stream), &self.bf_secret)
            .read_to_end()
            .await
    }

    /// Downloads an image from the CDN, retrying with a cooldown.
    ///
    /// # Errors
    ///
    /// Returns the failure of the last attempt.
    pub async fn download_image(&self, url: &Url) -> Result<Vec<u8>> {
        let _permit = self.limiters.acquire(Class::Image).await;

        retry::retry(
            Policy::IMAGE,
            url.as_str(),
            |_| self.upstream.fetch_cdn_image(url.clone()),
            |_| true,
        )
        .await
    }

    /// Downloads an album cover.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed MD5, or the download
    /// failure.
    pub async fn download_cover(
        &self,
        md5_hex: &str,
        size: Size,
        format: ImageFormat,
    ) -> Result<Cover> {
        let url = Picture::cover(md5_hex, size, format)?.url(&self.endpoints().images)?;
        let data = self.download_image(&url).await?;
        Ok(Cover { data, format })
    }

    /// Downloads a track with everything needed to tag it.
    ///
    /// After the track page, the album page, the public API record, the
    /// audio and the cover are fetched concurrently. The first failure
    /// cancels the others.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the fetches.
    pub async fn download_track_bundle(
        &self,
        id: u64,
        format: Format,
        cover: Option<(Size, ImageFormat)>,
    ) -> Result<Bundle> {
        let song = self.get_track_page(id).await?;

        let cover_fetch = async {
            match cover {
                Some((size, image_format)) => self
                    .download_cover(&song.album_picture, size, image_format)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };

        let (album_page, api_track, audio, cover) = tokio::try_join!(
            self.get_album_page(song.album_id),
            self.get_api_track(song.id),
            self.download_track(song.id, &song.track_token, format),
            cover_fetch,
        )?;

        Ok(Bundle {
            details: TrackDetails {
                song,
                album_page,
                api_track,
            },
            audio,
            cover,
            format,
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("upstream", &self.upstream)
            .field("limiters", &self.limiters)
            .field("app_lang", &self.app_lang)
            .finish_non_exhaustive()
    }
}

/// Records describing one track.
#[derive(Debug)]
pub struct TrackDetails {
    pub song: Song,
    pub album_page: AlbumPage,
    pub api_track: api::Track,
}

impl TrackDetails {
    /// Normalized metadata of the track.
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` when a release date is malformed.
    pub fn track(&self) -> Result<metadata::Track> {
        metadata::parse_track(&self.song, Some(&self.api_track))
    }

    /// Normalized metadata of the album.
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` when the album's numbering has gaps.
    pub fn album(&self) -> Result<metadata::Album> {
        metadata::parse_album(&self.album_page.data, Some(&self.album_page.songs.data))
    }

    /// Tags to embed into the audio.
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` when the records are inconsistent.
    pub fn tags(&self) -> Result<Tags> {
        Ok(Tags::new(&self.track()?, &self.album()?))
    }
}

/// A downloaded track and the records describing it.
#[derive(Debug)]
pub struct Bundle {
    pub details: TrackDetails,

    /// Decrypted audio in `format`.
    pub audio: Vec<u8>,
    pub cover: Option<Cover>,
    pub format: Format,
}

impl Bundle {
    /// Tags to embed into the audio.
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` when the records are inconsistent.
    pub fn tags(&self) -> Result<Tags> {
        self.details.tags()
    }
}
