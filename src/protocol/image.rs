//! Image CDN URLs.
//!
//! Pictures are addressed by kind and MD5 with the rendition encoded in the
//! file name:
//!
//! ```text
//! {root}/{kind}/{md5}/{width}x{height}-{background}-{quality}-{fit}-0.{format}
//! ```
//!
//! `background` is an RGB hex triplet or `none`, `fit` is `0` or `1`.

use std::{fmt, str::FromStr};

use url::Url;

use crate::error::{Error, Result};

/// Picture category on the CDN.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    Cover,
    Artist,
    Playlist,
    User,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Cover => write!(f, "cover"),
            Self::Artist => write!(f, "artist"),
            Self::Playlist => write!(f, "playlist"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Encoded image format.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ImageFormat {
    #[default]
    Jpg,
    Png,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Jpg => write!(f, "jpg"),
            Self::Png => write!(f, "png"),
        }
    }
}

impl ImageFormat {
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            _ => Err(Error::invalid_argument(format!("unknown image format {s:?}"))),
        }
    }
}

/// Requested width and height in pixels.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Default for Size {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses `WIDTHxHEIGHT`.
impl FromStr for Size {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (width, height) = s
            .split_once('x')
            .ok_or_else(|| Error::invalid_argument(format!("size {s:?} is not WIDTHxHEIGHT")))?;
        Ok(Self {
            width: width.parse()?,
            height: height.parse()?,
        })
    }
}

/// One rendition of a CDN picture.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Picture {
    pub kind: Kind,
    pub md5: [u8; 16],
    pub size: Size,

    /// Fill color for transparent areas; `None` keeps transparency.
    pub background: Option<[u8; 3]>,

    /// Compression quality, 0 to 100.
    pub quality: u8,

    /// Whether to fit the picture into the requested box rather than crop.
    pub fit: bool,

    pub format: ImageFormat,
}

impl Picture {
    /// Album cover at full quality without background fill.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `md5_hex` is not 32 hex characters.
    pub fn cover(md5_hex: &str, size: Size, format: ImageFormat) -> Result<Self> {
        let mut md5 = [0; 16];
        hex::decode_to_slice(md5_hex, &mut md5)?;
        Ok(Self {
            kind: Kind::Cover,
            md5,
            size,
            background: None,
            quality: 100,
            fit: false,
            format,
        })
    }

    /// File name of this rendition, relative to the picture's directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        let background = self
            .background
            .map_or_else(|| "none".to_owned(), hex::encode);
        format!(
            "{}-{background}-{}-{}-0.{}",
            self.size,
            self.quality,
            u8::from(self.fit),
            self.format
        )
    }

    /// Absolute URL under the CDN image root.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be a base URL.
    pub fn url(&self, root: &Url) -> Result<Url> {
        let path = format!("{}/{}/{}", self.kind, hex::encode(self.md5), self.file_name());
        root.join(&path).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5: &str = "2e018122cb56986277102d2041a592c8";

    fn root() -> Url {
        Url::parse("https://e-cdns-images.dzcdn.net/images/").unwrap()
    }

    #[test]
    fn builds_cover_url() {
        let picture = Picture::cover(MD5, "500x500".parse().unwrap(), ImageFormat::Jpg).unwrap();
        assert_eq!(
            picture.url(&root()).unwrap().as_str(),
            "https://e-cdns-images.dzcdn.net/images/cover/2e018122cb56986277102d2041a592c8/500x500-none-100-0-0.jpg"
        );
    }

    #[test]
    fn encodes_background_and_fit() {
        let picture = Picture {
            kind: Kind::Artist,
            background: Some([0xff, 0xff, 0xff]),
            quality: 80,
            fit: true,
            format: ImageFormat::Png,
            ..Picture::cover(MD5, Size::default(), ImageFormat::Jpg).unwrap()
        };
        assert_eq!(picture.file_name(), "1000x1000-ffffff-80-1-0.png");
        assert!(picture.url(&root()).unwrap().path().starts_with("/images/artist/"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Picture::cover("not-hex", Size::default(), ImageFormat::Jpg).is_err());
        assert!("500".parse::<Size>().is_err());
        assert!("500xtall".parse::<Size>().is_err());
        assert!("gif".parse::<ImageFormat>().is_err());
    }
}
