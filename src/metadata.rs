//! Normalized track, album and playlist records.
//!
//! Upstream records use upper-case keys, stringly typed numbers and
//! placeholder dates. The records here are what the command line prints
//! and what tags are built from.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::{macros::format_description, Date, PrimitiveDateTime};

use crate::{
    error::{Error, Result},
    protocol::{
        api,
        gateway::{page, search::Hit, SearchResults},
    },
};

/// Release date placeholder for unknown dates.
const NO_DATE: &str = "0000-00-00";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub name: String,
    pub id: u64,
}

impl From<&page::Artist> for Artist {
    fn from(artist: &page::Artist) -> Self {
        Self {
            name: artist.name.clone(),
            id: artist.id,
        }
    }
}

/// Album a track belongs to, as far as the track record knows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AlbumRef {
    pub title: String,
    pub id: u64,
    pub picture_md5: String,
}

/// Upstream identifiers and file information of a track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackIds {
    pub id: u64,
    pub md5: String,
    pub media_version: u32,

    /// Available formats and their file size in bytes.
    pub formats: BTreeMap<String, u64>,

    pub preview_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Track {
    pub title: String,
    pub artists: Vec<Artist>,
    pub album: AlbumRef,
    pub disk_number: u32,
    pub track_number: u32,
    pub date: Option<Date>,
    pub duration_seconds: u64,
    pub composers: Vec<String>,
    pub copyright: Option<String>,
    pub isrc: Option<String>,
    pub explicit: Option<bool>,
    pub bpm: Option<f64>,
    pub deezer: TrackIds,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Album {
    pub title: String,
    pub artists: Vec<Artist>,
    pub disk_count: Option<u32>,
    pub track_count: Option<u32>,
    pub duration_seconds: Option<u64>,
    pub date: Option<Date>,
    pub composers: Vec<String>,
    pub publisher: Option<String>,
    pub ean: Option<String>,
    pub explicit: bool,
    pub id: u64,
    pub picture_md5: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub title: String,
    pub owner: Artist,
    pub track_count: Option<u32>,
    pub duration_seconds: Option<u64>,
    pub modified: Option<PrimitiveDateTime>,
    pub id: u64,
    pub picture_md5: String,
    pub picture_type: String,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|value| !value.is_empty()).cloned()
}

/// First known release date, ignoring the all-zero placeholder.
///
/// Only the first non-empty candidate is considered, even when it is the
/// placeholder.
fn release_date(candidates: [&Option<String>; 3]) -> Result<Option<Date>> {
    let date = candidates
        .into_iter()
        .find_map(|candidate| candidate.as_ref().filter(|date| !date.is_empty()));

    match date {
        Some(date) if date != NO_DATE => {
            let date = Date::parse(date, format_description!("[year]-[month]-[day]"))?;
            Ok(Some(date))
        }
        _ => Ok(None),
    }
}

/// Checks that `numbers` is exactly `1..=max` and returns `max`.
fn contiguous_count(numbers: &BTreeSet<u32>, what: &str) -> Result<u32> {
    let max = numbers
        .last()
        .copied()
        .ok_or_else(|| Error::data_loss(format!("album has no {what} numbers")))?;

    if numbers.iter().copied().ne(1..=max) {
        return Err(Error::data_loss(format!(
            "{what} numbers {numbers:?} are not contiguous from 1 to {max}"
        )));
    }

    Ok(max)
}

/// Normalizes a song record, with the tempo from the public API record when
/// available.
///
/// # Errors
///
/// Returns `DataLoss` when a release date is malformed.
pub fn parse_track(song: &page::Song, api_track: Option<&api::Track>) -> Result<Track> {
    let mut title = song.title.trim().to_owned();
    if let Some(version) = song.version.as_deref().map(str::trim) {
        if !version.is_empty() {
            title.push(' ');
            title.push_str(version);
        }
    }

    let mut artists: Vec<_> = song.artists.iter().collect();
    artists.sort_by_key(|artist| (artist.role_id, artist.songs_order));

    let bpm = api_track
        .map(|track| track.bpm)
        .filter(|bpm| *bpm != 0.0);

    Ok(Track {
        title,
        artists: artists.into_iter().map(Artist::from).collect(),
        album: AlbumRef {
            title: song.album_title.clone(),
            id: song.album_id,
            picture_md5: song.album_picture.clone(),
        },
        disk_number: song.disk_number,
        track_number: song.track_number,
        date: release_date([
            &song.original_release_date,
            &song.physical_release_date,
            &song.digital_release_date,
        ])?,
        duration_seconds: song.duration,
        composers: song.contributors.composer.clone(),
        copyright: non_empty(song.copyright.as_ref()),
        isrc: non_empty(song.isrc.as_ref()),
        explicit: song.explicit_lyrics.map(|explicit| explicit != 0),
        bpm,
        deezer: TrackIds {
            id: song.id,
            md5: song.md5_origin.clone(),
            media_version: song.media_version,
            formats: song.file_sizes(),
            preview_url: song.preview_url().map(ToOwned::to_owned),
        },
    })
}

/// Normalizes an album record.
///
/// With `songs`, disk and track counts and the total duration are derived
/// from the track list. Otherwise the advertised track count is used.
///
/// # Errors
///
/// Returns `DataLoss` when the disk or track numbers of `songs` are not
/// exactly `1..=max`, or when a release date is malformed.
pub fn parse_album(album: &page::Album, songs: Option<&[page::Song]>) -> Result<Album> {
    let mut artists: Vec<_> = album.artists.iter().collect();
    artists.sort_by_key(|artist| artist.albums_order);

    let (disk_count, track_count, duration_seconds) = match songs {
        Some(songs) => {
            let disks: BTreeSet<_> = songs.iter().map(|song| song.disk_number).collect();
            let tracks: BTreeSet<_> = songs.iter().map(|song| song.track_number).collect();
            (
                Some(contiguous_count(&disks, "disk")?),
                Some(contiguous_count(&tracks, "track")?),
                Some(songs.iter().map(|song| song.duration).sum::<u64>()),
            )
        }
        None => (None, album.number_track.filter(|count| *count > 0), None),
    };

    let ean = album
        .upc
        .as_deref()
        .filter(|upc| !upc.is_empty())
        .map(|upc| format!("0{upc}"));

    Ok(Album {
        title: album.title.clone(),
        artists: artists.into_iter().map(Artist::from).collect(),
        disk_count,
        track_count,
        duration_seconds,
        date: release_date([
            &album.original_release_date,
            &album.physical_release_date,
            &album.digital_release_date,
        ])?,
        composers: album.contributors.composer.clone(),
        publisher: non_empty(album.label_name.as_ref()),
        ean,
        explicit: matches!(album.explicit_content.lyrics_status, 1 | 4),
        id: album.id,
        picture_md5: album.picture.clone(),
    })
}

/// Normalizes a playlist record.
///
/// # Errors
///
/// Returns `DataLoss` when the modification date is malformed.
pub fn parse_playlist(playlist: &page::Playlist) -> Result<Playlist> {
    let modified = playlist
        .date_mod
        .as_deref()
        .filter(|date| !date.is_empty())
        .map(|date| {
            PrimitiveDateTime::parse(
                date,
                format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
            )
        })
        .transpose()?;

    Ok(Playlist {
        title: playlist.title.clone(),
        owner: Artist {
            name: playlist.owner_name.clone(),
            id: playlist.owner_id,
        },
        track_count: playlist.song_count.filter(|count| *count > 0),
        duration_seconds: playlist.duration.filter(|duration| *duration > 0),
        modified,
        id: playlist.id,
        picture_md5: playlist.picture.clone(),
        picture_type: playlist.picture_type.clone(),
    })
}

/// Normalized search hit of any kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Track(Track),
    Album(Album),
    Playlist(Playlist),
}

/// Normalizes one page of search results. Albums come without their track
/// list, so their counts are the advertised ones.
///
/// # Errors
///
/// Returns `DataLoss` when a date of any hit is malformed.
pub fn parse_search_results(results: &SearchResults<Hit>) -> Result<SearchResults<Record>> {
    let data = results
        .data
        .iter()
        .map(|hit| match hit {
            Hit::Track(song) => parse_track(song, None).map(Record::Track),
            Hit::Album(album) => parse_album(album, None).map(Record::Album),
            Hit::Playlist(playlist) => parse_playlist(playlist).map(Record::Playlist),
        })
        .collect::<Result<_>>()?;

    Ok(SearchResults {
        data,
        total: results.total,
        next: results.next,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;
    use crate::{error::ErrorKind, protocol::gateway::page::tests::SONG};

    fn song() -> page::Song {
        serde_json::from_str(SONG).unwrap()
    }

    fn numbered(disk: u32, track: u32) -> page::Song {
        let mut song = song();
        song.disk_number = disk;
        song.track_number = track;
        song
    }

    fn album() -> page::Album {
        serde_json::from_str(
            r#"{
                "ALB_ID": "302127",
                "ALB_TITLE": "Discovery",
                "ARTISTS": [
                    {"ART_ID": "2", "ART_NAME": "Second", "ARTISTS_ALBUMS_ORDER": "1"},
                    {"ART_ID": "27", "ART_NAME": "Daft Punk", "ARTISTS_ALBUMS_ORDER": "0"}
                ],
                "NUMBER_TRACK": "14",
                "DIGITAL_RELEASE_DATE": "2001-03-12",
                "ALB_CONTRIBUTORS": [],
                "LABEL_NAME": "Parlophone (France)",
                "UPC": "724384960650",
                "EXPLICIT_ALBUM_CONTENT": {"EXPLICIT_LYRICS_STATUS": "4"},
                "ALB_PICTURE": "2e018122cb56986277102d2041a592c8"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn normalizes_track() {
        let api_track = api::Track {
            id: 3_135_556,
            bpm: 123.4,
            ..api::Track::default()
        };
        let track = parse_track(&song(), Some(&api_track)).unwrap();

        assert_eq!(track.title, "Harder, Better, Faster, Stronger (Edit)");
        assert_eq!(track.artists[0].name, "Daft Punk");
        assert_eq!(track.album.id, 302_127);
        // The original release date is the placeholder; the physical one
        // is not consulted.
        assert_eq!(track.date, None);
        assert_eq!(track.explicit, Some(false));
        assert_eq!(track.bpm, Some(123.4));
        assert_eq!(track.deezer.media_version, 8);
        assert_eq!(track.deezer.formats.len(), 2);
    }

    #[test]
    fn zero_bpm_is_unknown() {
        let track = parse_track(&song(), Some(&api::Track::default())).unwrap();
        assert_eq!(track.bpm, None);
        let track = parse_track(&song(), None).unwrap();
        assert_eq!(track.bpm, None);
    }

    #[test]
    fn featured_artists_sort_after_main_artists() {
        let mut song = song();
        song.artists = serde_json::from_str(
            r#"[
                {"ART_ID": "3", "ART_NAME": "Featured", "ROLE_ID": "5", "ARTISTS_SONGS_ORDER": "0"},
                {"ART_ID": "2", "ART_NAME": "Second", "ROLE_ID": "0", "ARTISTS_SONGS_ORDER": "1"},
                {"ART_ID": "1", "ART_NAME": "First", "ROLE_ID": "0", "ARTISTS_SONGS_ORDER": "0"}
            ]"#,
        )
        .unwrap();

        let track = parse_track(&song, None).unwrap();
        let names: Vec<_> = track.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["First", "Second", "Featured"]);
    }

    #[test]
    fn parses_first_release_date() {
        let mut song = song();
        song.original_release_date = Some(String::new());
        let track = parse_track(&song, None).unwrap();
        assert_eq!(track.date, Some(date!(2001 - 03 - 07)));

        song.physical_release_date = Some("07/03/2001".to_owned());
        let err = parse_track(&song, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataLoss);
    }

    #[test]
    fn normalizes_album_with_tracks() {
        let songs = [numbered(1, 1), numbered(1, 2), numbered(2, 1)];
        let album = parse_album(&album(), Some(&songs)).unwrap();

        assert_eq!(album.artists[0].name, "Daft Punk");
        assert_eq!(album.disk_count, Some(2));
        assert_eq!(album.track_count, Some(2));
        assert_eq!(album.duration_seconds, Some(3 * 224));
        assert_eq!(album.date, Some(date!(2001 - 03 - 12)));
        assert!(album.composers.is_empty());
        assert_eq!(album.ean.as_deref(), Some("0724384960650"));
        assert!(album.explicit);
    }

    #[test]
    fn album_without_tracks_uses_advertised_count() {
        let album = parse_album(&album(), None).unwrap();
        assert_eq!(album.track_count, Some(14));
        assert_eq!(album.disk_count, None);
        assert_eq!(album.duration_seconds, None);
    }

    #[test]
    fn gaps_in_numbering_are_rejected() {
        let songs = [numbered(1, 1), numbered(1, 3)];
        let err = parse_album(&album(), Some(&songs)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataLoss);

        let songs = [numbered(2, 1)];
        assert!(parse_album(&album(), Some(&songs)).is_err());

        assert!(parse_album(&album(), Some(&[])).is_err());
    }

    #[test]
    fn normalizes_playlist() {
        let playlist: page::Playlist = serde_json::from_str(
            r#"{
                "PLAYLIST_ID": "908622995",
                "TITLE": "Electro",
                "PARENT_USERNAME": "curator",
                "PARENT_USER_ID": "5",
                "NB_SONG": 50,
                "DURATION": "12000",
                "DATE_MOD": "2024-05-01 18:30:00",
                "PLAYLIST_PICTURE": "abc",
                "PICTURE_TYPE": "playlist"
            }"#,
        )
        .unwrap();

        let playlist = parse_playlist(&playlist).unwrap();
        assert_eq!(playlist.owner.name, "curator");
        assert_eq!(playlist.track_count, Some(50));
        assert_eq!(playlist.duration_seconds, Some(12_000));
        assert_eq!(playlist.modified, Some(datetime!(2024-05-01 18:30:00)));
    }

    #[test]
    fn normalizes_search_hits_of_each_kind() {
        let results = SearchResults {
            data: vec![Hit::Track(song()), Hit::Album(album())],
            total: 40,
            next: 2,
        };

        let parsed = parse_search_results(&results).unwrap();
        assert_eq!((parsed.total, parsed.next), (40, 2));
        match &parsed.data[..] {
            [Record::Track(track), Record::Album(album)] => {
                assert_eq!(track, &parse_track(&song(), None).unwrap());
                assert_eq!(album.title, "Discovery");
                assert_eq!(album.duration_seconds, None);
            }
            other => panic!("unexpected records {other:?}"),
        }
    }
}
