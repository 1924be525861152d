//! Track, album and playlist pages.
//!
//! Pages wrap the record itself in `DATA` and, for albums and playlists,
//! the track list in `SONGS`:
//!
//! ```json
//! {
//!     "DATA": {"ALB_ID": "302127", "ALB_TITLE": "Discovery", ...},
//!     "SONGS": {"data": [{"SNG_ID": "3135556", ...}], "total": 14}
//! }
//! ```
//!
//! Only the fields that feed normalization are typed. Unknown song fields
//! are kept in [`Song::extra`], which is where the per-format file sizes
//! live.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use veil::Redact;

use super::{Contributors, Method};

/// Parameters of `deezer.pageTrack`.
#[serde_as]
#[derive(Copy, Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct PageTrack {
    #[serde(rename = "SNG_ID")]
    #[serde_as(as = "DisplayFromStr")]
    pub id: u64,
}

impl Method for PageTrack {
    const METHOD: &'static str = "deezer.pageTrack";
    type Response = TrackPage;
}

/// Parameters of `deezer.pageAlbum`.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct PageAlbum {
    #[serde(rename = "ALB_ID")]
    #[serde_as(as = "DisplayFromStr")]
    pub id: u64,
    pub lang: String,
    pub header: bool,
    pub tab: u32,
}

impl PageAlbum {
    #[must_use]
    pub fn new(id: u64, lang: &str) -> Self {
        Self {
            id,
            lang: lang.to_owned(),
            header: true,
            tab: 0,
        }
    }
}

impl Method for PageAlbum {
    const METHOD: &'static str = "deezer.pageAlbum";
    type Response = AlbumPage;
}

/// Parameters of `deezer.pagePlaylist`. Requests every track.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct PagePlaylist {
    #[serde(rename = "PLAYLIST_ID")]
    #[serde_as(as = "DisplayFromStr")]
    pub id: u64,
    pub lang: String,
    pub start: u64,
    /// `-1` for no limit.
    pub nb: i64,
    pub tags: bool,
}

impl PagePlaylist {
    #[must_use]
    pub fn new(id: u64, lang: &str) -> Self {
        Self {
            id,
            lang: lang.to_owned(),
            start: 0,
            nb: -1,
            tags: true,
        }
    }
}

impl Method for PagePlaylist {
    const METHOD: &'static str = "deezer.pagePlaylist";
    type Response = PlaylistPage;
}

#[derive(Clone, PartialEq, Deserialize, Serialize, Debug)]
pub struct TrackPage {
    #[serde(rename = "DATA")]
    pub data: Song,
}

#[derive(Clone, PartialEq, Deserialize, Serialize, Debug)]
pub struct AlbumPage {
    #[serde(rename = "DATA")]
    pub data: Album,

    #[serde(rename = "SONGS", default)]
    pub songs: Songs,
}

#[derive(Clone, PartialEq, Deserialize, Serialize, Debug)]
pub struct PlaylistPage {
    #[serde(rename = "DATA")]
    pub data: Playlist,

    #[serde(rename = "SONGS", default)]
    pub songs: Songs,
}

#[derive(Clone, Default, PartialEq, Deserialize, Serialize, Debug)]
pub struct Songs {
    #[serde(default)]
    pub data: Vec<Song>,

    #[serde(default)]
    pub total: Option<u64>,
}

/// Artist credit on a song or album.
#[serde_as]
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize, Debug, Hash)]
pub struct Artist {
    #[serde(rename = "ART_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(rename = "ART_NAME")]
    pub name: String,

    /// `0` for main artists, higher for featured ones.
    #[serde(rename = "ROLE_ID", default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub role_id: u32,

    #[serde(rename = "ARTISTS_SONGS_ORDER", default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub songs_order: u32,

    #[serde(rename = "ARTISTS_ALBUMS_ORDER", default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub albums_order: u32,
}

/// Alternative version to play when a song is unavailable.
#[serde_as]
#[derive(Copy, Clone, PartialEq, Eq, Deserialize, Serialize, Debug, Hash)]
pub struct Fallback {
    #[serde(rename = "SNG_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,
}

/// Preview or other auxiliary media of a song.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize, Debug, Hash)]
pub struct SongMedia {
    #[serde(rename = "TYPE", default)]
    pub typ: String,

    #[serde(rename = "HREF", default)]
    pub href: String,
}

/// Song record as found on track pages, album and playlist track lists and
/// track search results.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Serialize, Redact)]
pub struct Song {
    #[serde(rename = "SNG_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(rename = "SNG_TITLE")]
    pub title: String,

    #[serde(rename = "VERSION", default)]
    pub version: Option<String>,

    #[serde(rename = "ARTISTS", default)]
    pub artists: Vec<Artist>,

    #[serde(rename = "ALB_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub album_id: u64,

    #[serde(rename = "ALB_TITLE", default)]
    pub album_title: String,

    /// Cover MD5 as hex.
    #[serde(rename = "ALB_PICTURE", default)]
    pub album_picture: String,

    #[serde(rename = "DISK_NUMBER")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub disk_number: u32,

    #[serde(rename = "TRACK_NUMBER")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub track_number: u32,

    #[serde(rename = "ORIGINAL_RELEASE_DATE", default)]
    pub original_release_date: Option<String>,

    #[serde(rename = "PHYSICAL_RELEASE_DATE", default)]
    pub physical_release_date: Option<String>,

    #[serde(rename = "DIGITAL_RELEASE_DATE", default)]
    pub digital_release_date: Option<String>,

    /// Seconds.
    #[serde(rename = "DURATION")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub duration: u64,

    /// Sent as `[]` when there are none.
    #[serde(rename = "SNG_CONTRIBUTORS", default)]
    #[serde_as(as = "DefaultOnError")]
    pub contributors: Contributors,

    #[serde(rename = "COPYRIGHT", default)]
    pub copyright: Option<String>,

    #[serde(rename = "ISRC", default)]
    pub isrc: Option<String>,

    /// Sometimes an empty string.
    #[serde(rename = "EXPLICIT_LYRICS", default)]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub explicit_lyrics: Option<u8>,

    #[serde(rename = "MD5_ORIGIN", default)]
    pub md5_origin: String,

    #[serde(rename = "MEDIA_VERSION", default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub media_version: u32,

    /// Opaque credential for media URL resolution.
    #[serde(rename = "TRACK_TOKEN", default)]
    #[redact]
    pub track_token: String,

    #[serde(rename = "MEDIA", default)]
    pub media: Vec<SongMedia>,

    #[serde(rename = "FALLBACK", default)]
    #[serde_as(as = "DefaultOnError")]
    pub fallback: Option<Fallback>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Song {
    /// Available formats with their file size in bytes.
    ///
    /// Taken from the `FILESIZE_<FORMAT>` fields; formats of size zero are
    /// not available.
    #[must_use]
    pub fn file_sizes(&self) -> BTreeMap<String, u64> {
        self.extra
            .iter()
            .filter_map(|(key, value)| {
                let format = key.strip_prefix("FILESIZE_").filter(|f| !f.is_empty())?;
                let size = match value {
                    serde_json::Value::Number(n) => n.as_u64(),
                    serde_json::Value::String(s) => s.parse().ok(),
                    _ => None,
                }?;
                (size > 0).then(|| (format.to_owned(), size))
            })
            .collect()
    }

    /// URL of the preview clip, if any.
    #[must_use]
    pub fn preview_url(&self) -> Option<&str> {
        self.media
            .iter()
            .find(|media| media.typ == "preview")
            .map(|media| media.href.as_str())
    }
}

/// Album disclosure of explicit content.
#[serde_as]
#[derive(Copy, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Debug, Hash)]
pub struct ExplicitContent {
    #[serde(rename = "EXPLICIT_LYRICS_STATUS", default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub lyrics_status: u8,
}

/// Album record as found on album pages and album search results.
#[serde_as]
#[derive(Clone, Default, PartialEq, Deserialize, Serialize, Debug)]
pub struct Album {
    #[serde(rename = "ALB_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(rename = "ALB_TITLE")]
    pub title: String,

    #[serde(rename = "ARTISTS", default)]
    pub artists: Vec<Artist>,

    #[serde(rename = "NUMBER_TRACK", default)]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub number_track: Option<u32>,

    #[serde(rename = "ORIGINAL_RELEASE_DATE", default)]
    pub original_release_date: Option<String>,

    #[serde(rename = "PHYSICAL_RELEASE_DATE", default)]
    pub physical_release_date: Option<String>,

    #[serde(rename = "DIGITAL_RELEASE_DATE", default)]
    pub digital_release_date: Option<String>,

    #[serde(rename = "ALB_CONTRIBUTORS", default)]
    #[serde_as(as = "DefaultOnError")]
    pub contributors: Contributors,

    #[serde(rename = "LABEL_NAME", default)]
    pub label_name: Option<String>,

    #[serde(rename = "UPC", default)]
    pub upc: Option<String>,

    #[serde(rename = "EXPLICIT_ALBUM_CONTENT", default)]
    #[serde_as(as = "DefaultOnError")]
    pub explicit_content: ExplicitContent,

    #[serde(rename = "ALB_PICTURE", default)]
    pub picture: String,
}

/// Playlist record as found on playlist pages and playlist search results.
#[serde_as]
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize, Debug, Hash)]
pub struct Playlist {
    #[serde(rename = "PLAYLIST_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(rename = "TITLE")]
    pub title: String,

    #[serde(rename = "PARENT_USERNAME", default)]
    pub owner_name: String,

    #[serde(rename = "PARENT_USER_ID", default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub owner_id: u64,

    #[serde(rename = "NB_SONG", default)]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub song_count: Option<u32>,

    #[serde(rename = "DURATION", default)]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub duration: Option<u64>,

    /// `%Y-%m-%d %H:%M:%S`.
    #[serde(rename = "DATE_MOD", default)]
    pub date_mod: Option<String>,

    #[serde(rename = "PLAYLIST_PICTURE", default)]
    pub picture: String,

    #[serde(rename = "PICTURE_TYPE", default)]
    pub picture_type: String,
}
