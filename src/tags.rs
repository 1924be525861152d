//! Tag sets for downloaded tracks.
//!
//! [`Tags`] is built from normalized metadata and mapped onto the fields of
//! the target container:
//!
//! | Tag            | Vorbis comment (FLAC)      | ID3v2 frame (MP3)        |
//! |----------------|----------------------------|--------------------------|
//! | title          | `TITLE`                    | `TIT2`                   |
//! | artists        | `ARTIST`                   | `TPE1`                   |
//! | album title    | `ALBUM`                    | `TALB`                   |
//! | album artists  | `ALBUMARTIST`, `ALBUM ARTIST` | `TPE2`                |
//! | disk number    | `DISCNUMBER`, `DISCTOTAL`  | `TPOS` as `n/total`      |
//! | track number   | `TRACKNUMBER`, `TRACKTOTAL`| `TRCK` as `n/total`      |
//! | album date     | `DATE`                     | `TDRC`                   |
//! | composers      | `COMPOSER`                 | `TCOM`                   |
//! | copyright      | `COPYRIGHT`                | `TCOP`                   |
//! | publisher      | `PUBLISHER`                | `TPUB`                   |
//! | ISRC           | `ISRC`                     | `TSRC`                   |
//! | EAN            | `EAN`                      | `TXXX:EAN`               |
//! | explicit       | `ITUNESADVISORY`           | `TXXX:ITUNESADVISORY`    |
//! | BPM            | `BPM`                      | `TBPM`                   |
//!
//! Remaining tags, such as the upstream identifiers, become upper-case
//! custom fields (`TXXX` frames in ID3).
//!
//! [`ContainerWriter`] writes the fields and the front cover into FLAC and
//! MP3 files with `lofty`. [`embed`] accepts any other [`TagWriter`].

use std::io::{Cursor, Seek};

use lofty::{
    config::{ParseOptions, WriteOptions},
    file::AudioFile,
    flac::FlacFile,
    id3::v2::{
        AttachedPictureFrame, ExtendedTextFrame, Frame, FrameId, Id3v2Tag, TextInformationFrame,
    },
    mpeg::MpegFile,
    ogg::{OggPictureStorage, VorbisComments},
    picture::{MimeType, Picture, PictureInformation, PictureType},
    TextEncoding,
};
use serde::Serialize;
use time::{macros::format_description, Date};

use crate::{
    error::Result,
    metadata::{Album, Track},
    protocol::{
        image::ImageFormat,
        media::{Codec, Format},
    },
};

/// Tags of one track.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tags {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub disk_number: Option<u32>,
    pub track_number: Option<u32>,
    pub composers: Vec<String>,
    pub copyright: Option<String>,
    pub isrc: Option<String>,
    pub explicit: Option<bool>,
    pub bpm: Option<f64>,

    pub album_title: Option<String>,
    pub album_artists: Vec<String>,
    pub album_disk_count: Option<u32>,
    pub album_track_count: Option<u32>,
    pub album_date: Option<Date>,
    pub album_publisher: Option<String>,
    pub album_ean: Option<String>,

    /// Free-form tags in insertion order, with lower-case names.
    pub custom: Vec<(String, String)>,
}

/// One container field. `key` is a Vorbis comment name or an ID3v2 frame
/// id; `description` is only set for ID3 `TXXX` frames.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub values: Vec<String>,
}

impl Field {
    fn new(key: &str, values: Vec<String>) -> Self {
        Self {
            key: key.to_owned(),
            description: None,
            values,
        }
    }

    fn text(key: &str, value: impl ToString) -> Self {
        Self::new(key, vec![value.to_string()])
    }

    fn user_text(description: &str, value: impl ToString) -> Self {
        Self {
            key: "TXXX".to_owned(),
            description: Some(description.to_owned()),
            values: vec![value.to_string()],
        }
    }
}

fn names(artists: &[crate::metadata::Artist]) -> Vec<String> {
    artists.iter().map(|artist| artist.name.clone()).collect()
}

/// Formats a tempo with at most two decimals and no trailing zeros.
#[must_use]
pub fn format_bpm(bpm: f64) -> String {
    let formatted = format!("{bpm:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_owned()
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

impl Tags {
    /// Builds the tags of `track` on `album`.
    #[must_use]
    pub fn new(track: &Track, album: &Album) -> Self {
        let custom = vec![
            ("deezer_track_id".to_owned(), track.deezer.id.to_string()),
            ("deezer_track_md5".to_owned(), track.deezer.md5.clone()),
            (
                "deezer_track_media_version".to_owned(),
                track.deezer.media_version.to_string(),
            ),
            ("deezer_album_id".to_owned(), album.id.to_string()),
            (
                "deezer_album_picture_md5".to_owned(),
                album.picture_md5.clone(),
            ),
        ];

        Self {
            title: Some(track.title.clone()),
            artists: names(&track.artists),
            disk_number: Some(track.disk_number),
            track_number: Some(track.track_number),
            composers: track.composers.clone(),
            copyright: track.copyright.clone(),
            isrc: track.isrc.clone(),
            explicit: track.explicit,
            bpm: track.bpm,
            album_title: Some(album.title.clone()),
            album_artists: names(&album.artists),
            album_disk_count: album.disk_count,
            album_track_count: album.track_count,
            album_date: album.date,
            album_publisher: album.publisher.clone(),
            album_ean: album.ean.clone(),
            custom,
        }
    }

    /// Container fields for `codec`, in writing order.
    #[must_use]
    pub fn fields(&self, codec: Codec) -> Vec<Field> {
        match codec {
            Codec::Flac => self.vorbis_comments(),
            Codec::Mp3 => self.id3_frames(),
        }
    }

    fn vorbis_comments(&self) -> Vec<Field> {
        let mut fields = Vec::new();

        if let Some(title) = &self.title {
            fields.push(Field::text("TITLE", title));
        }
        if !self.artists.is_empty() {
            fields.push(Field::new("ARTIST", self.artists.clone()));
        }
        if let Some(album_title) = &self.album_title {
            fields.push(Field::text("ALBUM", album_title));
        }
        if !self.album_artists.is_empty() {
            fields.push(Field::new("ALBUMARTIST", self.album_artists.clone()));
            fields.push(Field::new("ALBUM ARTIST", self.album_artists.clone()));
        }
        if let Some(count) = self.album_disk_count {
            fields.push(Field::text("DISCTOTAL", count));
        }
        if let Some(count) = self.album_track_count {
            fields.push(Field::text("TRACKTOTAL", count));
        }
        if let Some(number) = self.disk_number {
            fields.push(Field::text("DISCNUMBER", number));
        }
        if let Some(number) = self.track_number {
            fields.push(Field::text("TRACKNUMBER", number));
        }
        if let Some(date) = self.album_date {
            fields.push(Field::text("DATE", format_date(date)));
        }
        if !self.composers.is_empty() {
            fields.push(Field::new("COMPOSER", self.composers.clone()));
        }
        if let Some(copyright) = &self.copyright {
            fields.push(Field::text("COPYRIGHT", copyright));
        }
        if let Some(publisher) = &self.album_publisher {
            fields.push(Field::text("PUBLISHER", publisher));
        }
        if let Some(isrc) = &self.isrc {
            fields.push(Field::text("ISRC", isrc));
        }
        if let Some(ean) = &self.album_ean {
            fields.push(Field::text("EAN", ean));
        }
        if let Some(explicit) = self.explicit {
            fields.push(Field::text("ITUNESADVISORY", u8::from(explicit)));
        }
        if let Some(bpm) = self.bpm {
            fields.push(Field::text("BPM", format_bpm(bpm)));
        }

        for (name, value) in &self.custom {
            fields.push(Field::text(&name.to_uppercase(), value));
        }

        fields
    }

    fn id3_frames(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        let mut unused_totals = Vec::new();

        if let Some(title) = &self.title {
            fields.push(Field::text("TIT2", title));
        }
        if !self.artists.is_empty() {
            fields.push(Field::new("TPE1", self.artists.clone()));
        }
        if let Some(album_title) = &self.album_title {
            fields.push(Field::text("TALB", album_title));
        }
        if !self.album_artists.is_empty() {
            fields.push(Field::new("TPE2", self.album_artists.clone()));
        }

        let numbered = [
            ("TPOS", self.disk_number, self.album_disk_count, "album_disk_count"),
            ("TRCK", self.track_number, self.album_track_count, "album_track_count"),
        ];
        for (frame, number, total, total_name) in numbered {
            match (number, total) {
                (Some(number), Some(total)) => {
                    fields.push(Field::text(frame, format!("{number}/{total}")));
                }
                (Some(number), None) => fields.push(Field::text(frame, number)),
                (None, Some(total)) => unused_totals.push((total_name, total)),
                (None, None) => {}
            }
        }

        if let Some(date) = self.album_date {
            fields.push(Field::text("TDRC", format_date(date)));
        }
        if !self.composers.is_empty() {
            fields.push(Field::new("TCOM", self.composers.clone()));
        }
        if let Some(copyright) = &self.copyright {
            fields.push(Field::text("TCOP", copyright));
        }
        if let Some(publisher) = &self.album_publisher {
            fields.push(Field::text("TPUB", publisher));
        }
        if let Some(isrc) = &self.isrc {
            fields.push(Field::text("TSRC", isrc));
        }
        if let Some(ean) = &self.album_ean {
            fields.push(Field::user_text("EAN", ean));
        }
        if let Some(explicit) = self.explicit {
            fields.push(Field::user_text("ITUNESADVISORY", u8::from(explicit)));
        }
        if let Some(bpm) = self.bpm {
            fields.push(Field::text("TBPM", format_bpm(bpm)));
        }

        for (name, total) in unused_totals {
            fields.push(Field::user_text(&name.to_uppercase(), total));
        }
        for (name, value) in &self.custom {
            fields.push(Field::user_text(&name.to_uppercase(), value));
        }

        fields
    }
}

/// Front cover to embed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cover {
    pub data: Vec<u8>,
    pub format: ImageFormat,
}

impl Cover {
    fn to_picture(&self) -> Picture {
        let mime = match self.format {
            ImageFormat::Jpg => MimeType::Jpeg,
            ImageFormat::Png => MimeType::Png,
        };
        Picture::new_unchecked(PictureType::CoverFront, Some(mime), None, self.data.clone())
    }
}

/// Audio tagging backend.
pub trait TagWriter {
    /// Rewrites `audio` with exactly `fields` and `cover` as its metadata.
    ///
    /// Existing tags and pictures must be removed first.
    fn write(
        &self,
        codec: Codec,
        audio: &[u8],
        fields: &[Field],
        cover: Option<&Cover>,
    ) -> Result<Vec<u8>>;
}

/// Embeds `tags` and `cover` into a track downloaded in `format`.
///
/// # Errors
///
/// Returns the writer's error, for example when `audio` is not a valid
/// container.
pub fn embed<W>(
    writer: &W,
    format: Format,
    audio: &[u8],
    tags: &Tags,
    cover: Option<&Cover>,
) -> Result<Vec<u8>>
where
    W: TagWriter + ?Sized,
{
    let codec = format.codec();
    let fields = tags.fields(codec);
    debug!("embedding {} {codec:?} fields", fields.len());
    writer.write(codec, audio, &fields, cover)
}

/// Tag writer for FLAC and MP3 files.
///
/// FLAC files get their Vorbis comments and picture blocks replaced. MP3
/// files get a new ID3v2.4 tag; multiple values of one frame are separated
/// by NUL as ID3v2.4 prescribes.
#[derive(Copy, Clone, Debug, Default)]
pub struct ContainerWriter;

impl ContainerWriter {
    fn parse_options() -> ParseOptions {
        ParseOptions::new().read_properties(false)
    }

    fn write_flac(
        file: &mut Cursor<Vec<u8>>,
        fields: &[Field],
        cover: Option<&Cover>,
    ) -> Result<()> {
        let mut flac = FlacFile::read_from(file, Self::parse_options())?;

        let mut comments = VorbisComments::default();
        for field in fields {
            for value in &field.values {
                comments.push(field.key.clone(), value.clone());
            }
        }
        flac.set_vorbis_comments(comments);

        let kinds: Vec<PictureType> = flac
            .pictures()
            .iter()
            .map(|(picture, _)| picture.pic_type())
            .collect();
        for kind in kinds {
            flac.remove_picture_type(kind);
        }

        if let Some(cover) = cover {
            let picture = cover.to_picture();
            let info = PictureInformation::from_picture(&picture).unwrap_or_default();
            flac.insert_picture(picture, Some(info))?;
        }

        file.rewind()?;
        flac.save_to(file, WriteOptions::default())?;
        Ok(())
    }

    fn write_mp3(
        file: &mut Cursor<Vec<u8>>,
        fields: &[Field],
        cover: Option<&Cover>,
    ) -> Result<()> {
        let mut mp3 = MpegFile::read_from(file, Self::parse_options())?;

        let mut tag = Id3v2Tag::default();
        for field in fields {
            let value = field.values.join("\0");
            let frame = match &field.description {
                Some(description) => Frame::UserText(ExtendedTextFrame::new(
                    TextEncoding::UTF8,
                    description.clone(),
                    value,
                )),
                None => Frame::Text(TextInformationFrame::new(
                    FrameId::new(field.key.clone())?,
                    TextEncoding::UTF8,
                    value,
                )),
            };
            tag.insert(frame);
        }

        if let Some(cover) = cover {
            tag.insert(Frame::Picture(AttachedPictureFrame::new(
                TextEncoding::UTF8,
                cover.to_picture(),
            )));
        }

        mp3.set_id3v2(tag);

        file.rewind()?;
        mp3.save_to(file, WriteOptions::default())?;
        Ok(())
    }
}

impl TagWriter for ContainerWriter {
    fn write(
        &self,
        codec: Codec,
        audio: &[u8],
        fields: &[Field],
        cover: Option<&Cover>,
    ) -> Result<Vec<u8>> {
        let mut file = Cursor::new(audio.to_vec());
        match codec {
            Codec::Flac => Self::write_flac(&mut file, fields, cover)?,
            Codec::Mp3 => Self::write_mp3(&mut file, fields, cover)?,
        }
        trace!("tagged {codec:?} file is {} bytes", file.get_ref().len());
        Ok(file.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lofty::tag::Accessor;
    use time::macros::date;

    use super::*;

    fn tags() -> Tags {
        Tags {
            title: Some("One More Time".to_owned()),
            artists: vec!["Daft Punk".to_owned()],
            disk_number: Some(1),
            track_number: Some(1),
            composers: vec!["Thomas Bangalter".to_owned()],
            explicit: Some(false),
            bpm: Some(122.5),
            album_title: Some("Discovery".to_owned()),
            album_artists: vec!["Daft Punk".to_owned()],
            album_disk_count: Some(1),
            album_track_count: Some(14),
            album_date: Some(date!(2001 - 03 - 12)),
            album_ean: Some("0724384960650".to_owned()),
            custom: vec![("deezer_track_id".to_owned(), "3135553".to_owned())],
            ..Tags::default()
        }
    }

    fn find<'a>(fields: &'a [Field], key: &str, description: Option<&str>) -> &'a Field {
        fields
            .iter()
            .find(|f| f.key == key && f.description.as_deref() == description)
            .unwrap_or_else(|| panic!("missing {key} {description:?}"))
    }

    #[test]
    fn formats_bpm_without_trailing_zeros() {
        assert_eq!(format_bpm(120.0), "120");
        assert_eq!(format_bpm(122.5), "122.5");
        assert_eq!(format_bpm(123.456), "123.46");
    }

    #[test]
    fn maps_vorbis_comments() {
        let fields = tags().fields(Codec::Flac);

        assert_eq!(find(&fields, "TITLE", None).values, ["One More Time"]);
        assert_eq!(find(&fields, "ALBUM ARTIST", None).values, ["Daft Punk"]);
        assert_eq!(find(&fields, "TRACKTOTAL", None).values, ["14"]);
        assert_eq!(find(&fields, "DATE", None).values, ["2001-03-12"]);
        assert_eq!(find(&fields, "ITUNESADVISORY", None).values, ["0"]);
        assert_eq!(find(&fields, "BPM", None).values, ["122.5"]);
        assert_eq!(find(&fields, "DEEZER_TRACK_ID", None).values, ["3135553"]);
        assert!(fields.iter().all(|f| f.description.is_none()));
    }

    #[test]
    fn maps_id3_frames() {
        let fields = tags().fields(Codec::Mp3);

        assert_eq!(find(&fields, "TIT2", None).values, ["One More Time"]);
        assert_eq!(find(&fields, "TPOS", None).values, ["1/1"]);
        assert_eq!(find(&fields, "TRCK", None).values, ["1/14"]);
        assert_eq!(find(&fields, "TDRC", None).values, ["2001-03-12"]);
        assert_eq!(find(&fields, "TXXX", Some("EAN")).values, ["0724384960650"]);
        assert_eq!(find(&fields, "TXXX", Some("ITUNESADVISORY")).values, ["0"]);
        assert_eq!(find(&fields, "TXXX", Some("DEEZER_TRACK_ID")).values, ["3135553"]);
    }

    #[test]
    fn totals_without_numbers_become_custom_frames() {
        let tags = Tags {
            track_number: None,
            ..tags()
        };
        let fields = tags.fields(Codec::Mp3);
        assert!(fields.iter().all(|f| f.key != "TRCK"));
        assert_eq!(find(&fields, "TXXX", Some("ALBUM_TRACK_COUNT")).values, ["14"]);
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Codec, usize, bool)>>,
    }

    impl TagWriter for Recorder {
        fn write(
            &self,
            codec: Codec,
            audio: &[u8],
            fields: &[Field],
            cover: Option<&Cover>,
        ) -> Result<Vec<u8>> {
            self.calls
                .lock()
                .unwrap()
                .push((codec, fields.len(), cover.is_some()));
            Ok(audio.to_vec())
        }
    }

    #[test]
    fn embed_picks_fields_by_format() {
        let recorder = Recorder::default();
        let cover = Cover {
            data: vec![0xff, 0xd8],
            format: ImageFormat::Jpg,
        };

        let output = embed(&recorder, Format::MP3_320, b"ID3", &tags(), Some(&cover)).unwrap();
        assert_eq!(output, b"ID3");

        embed(&recorder, Format::FLAC, b"fLaC", &tags(), None).unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls[0].0, Codec::Mp3);
        assert!(calls[0].2);
        assert_eq!(calls[1].0, Codec::Flac);
        assert_eq!(calls[1].1, tags().fields(Codec::Flac).len());
    }

    /// FLAC stream with only a STREAMINFO block and one frame header.
    fn flac_stream() -> Vec<u8> {
        let mut data = b"fLaC".to_vec();
        // Last metadata block, STREAMINFO, 34 bytes.
        data.extend([0x80, 0x00, 0x00, 0x22]);
        data.extend([0x10, 0x00, 0x10, 0x00]);
        data.extend([0; 6]);
        // 44.1 kHz, two channels, 16 bits, unknown sample count.
        data.extend([0x0a, 0xc4, 0x42, 0xf0, 0, 0, 0, 0]);
        data.extend([0; 16]);
        data.extend([0xff, 0xf8, 0x69, 0x08, 0, 0, 0, 0]);
        data
    }

    /// Four silent MPEG-1 Layer III frames at 128 kbit/s and 44.1 kHz.
    fn mp3_stream() -> Vec<u8> {
        let mut frame = vec![0; 417];
        frame[..4].copy_from_slice(&[0xff, 0xfb, 0x90, 0x00]);
        frame.repeat(4)
    }

    fn png() -> Cover {
        Cover {
            data: b"\x89PNG\r\n\x1a\n0000IHDR".to_vec(),
            format: ImageFormat::Png,
        }
    }

    fn read_flac(audio: Vec<u8>) -> FlacFile {
        FlacFile::read_from(&mut Cursor::new(audio), ContainerWriter::parse_options()).unwrap()
    }

    #[test]
    fn writes_vorbis_comments_and_cover_into_flac() {
        let tags = Tags {
            artists: vec!["Daft Punk".to_owned(), "Romanthony".to_owned()],
            ..tags()
        };
        let audio = embed(&ContainerWriter, Format::FLAC, &flac_stream(), &tags, Some(&png()))
            .unwrap();

        let flac = read_flac(audio);
        let comments = flac.vorbis_comments().unwrap();
        assert_eq!(comments.get("TITLE"), Some("One More Time"));
        assert_eq!(comments.get("TRACKTOTAL"), Some("14"));
        assert_eq!(comments.get("DEEZER_TRACK_ID"), Some("3135553"));
        assert_eq!(
            comments.get_all("ARTIST").collect::<Vec<_>>(),
            ["Daft Punk", "Romanthony"]
        );

        let pictures = flac.pictures();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].0.pic_type(), PictureType::CoverFront);
        assert_eq!(pictures[0].0.data(), png().data);
    }

    #[test]
    fn rewriting_flac_replaces_previous_tags() {
        let first = embed(&ContainerWriter, Format::FLAC, &flac_stream(), &tags(), Some(&png()))
            .unwrap();
        let tags = Tags {
            title: Some("Aerodynamic".to_owned()),
            ..tags()
        };
        let second = embed(&ContainerWriter, Format::FLAC, &first, &tags, None).unwrap();

        let flac = read_flac(second);
        let comments = flac.vorbis_comments().unwrap();
        assert_eq!(comments.get_all("TITLE").collect::<Vec<_>>(), ["Aerodynamic"]);
        assert!(flac.pictures().is_empty());
    }

    #[test]
    fn writes_id3_frames_and_cover_into_mp3() {
        let audio = embed(&ContainerWriter, Format::MP3_128, &mp3_stream(), &tags(), Some(&png()))
            .unwrap();
        assert!(audio.starts_with(b"ID3"));

        let mp3 =
            MpegFile::read_from(&mut Cursor::new(audio), ContainerWriter::parse_options()).unwrap();
        let tag = mp3.id3v2().unwrap();
        assert_eq!(tag.title().as_deref(), Some("One More Time"));
        assert_eq!(tag.get_text(&FrameId::new("TRCK").unwrap()), Some("1/14"));
        assert_eq!(tag.get_user_text("EAN"), Some("0724384960650"));
        assert_eq!(tag.get_user_text("DEEZER_TRACK_ID"), Some("3135553"));

        let picture = match tag.get(&FrameId::new("APIC").unwrap()) {
            Some(Frame::Picture(frame)) => &frame.picture,
            other => panic!("expected a picture frame, got {other:?}"),
        };
        assert_eq!(picture.pic_type(), PictureType::CoverFront);
        assert_eq!(picture.data(), png().data);
    }

    #[test]
    fn garbage_is_not_a_container() {
        let err = embed(&ContainerWriter, Format::FLAC, b"not audio", &tags(), None).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::DataLoss);
    }
}
