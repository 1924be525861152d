//! Catalog search through `search.music`.
//!
//! Results come back paginated, with an offset for the next page when
//! there is one:
//!
//! ```json
//! {"data": [...], "count": 10, "total": 1234, "next": 10}
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::{
    error::{Error, Result},
    protocol,
};

use super::{
    page::{Album, Playlist, Song},
    Method,
};

/// Kind of record to search for.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchKind {
    #[default]
    Track,
    Album,
    Playlist,
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Track => write!(f, "track"),
            Self::Album => write!(f, "album"),
            Self::Playlist => write!(f, "playlist"),
        }
    }
}

impl FromStr for SearchKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "playlist" => Ok(Self::Playlist),
            _ => Err(Error::unimplemented(format!("searching for {s} is not supported"))),
        }
    }
}

/// Parameters of `search.music`.
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct SearchMusic {
    pub query: String,
    pub output: SearchKind,
    pub start: u64,
    pub nb: u64,
    pub filter: &'static str,
}

impl SearchMusic {
    #[must_use]
    pub fn new(query: &str, kind: SearchKind, start: u64, nb: u64) -> Self {
        Self {
            query: query.to_owned(),
            output: kind,
            start,
            nb,
            filter: "ALL",
        }
    }
}

impl Method for SearchMusic {
    const METHOD: &'static str = "search.music";
    /// Decoded per kind by the caller.
    type Response = SearchResults<serde_json::Value>;
}

/// One page of search results.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Serialize, Debug)]
pub struct SearchResults<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub total: u64,

    /// Offset of the next page; `0` when this is the last one.
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub next: u64,
}

/// Search result of any kind.
#[derive(Clone, PartialEq, Serialize, Debug)]
#[serde(untagged)]
pub enum Hit {
    Track(Song),
    Album(Album),
    Playlist(Playlist),
}

impl SearchResults<serde_json::Value> {
    /// Decodes the raw items as records of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` when an item is not shaped like `kind`.
    pub fn decode(self, kind: SearchKind) -> Result<SearchResults<Hit>> {
        let origin = SearchMusic::METHOD;
        let data = self
            .data
            .into_iter()
            .map(|item| match kind {
                SearchKind::Track => protocol::from_value(item, origin).map(Hit::Track),
                SearchKind::Album => protocol::from_value(item, origin).map(Hit::Album),
                SearchKind::Playlist => protocol::from_value(item, origin).map(Hit::Playlist),
            })
            .collect::<Result<_>>()?;

        Ok(SearchResults {
            data,
            total: self.total,
            next: self.next,
        })
    }
}
