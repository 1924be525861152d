//! Client library for the Deezer catalog and media pipeline.
//!
//! [`client::Client`] is the entry point: it logs in on demand, throttles
//! every upstream surface, retries gateway calls with a fresh session, and
//! downloads tracks as decrypted audio. [`tags`] embeds the metadata.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod client;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod http;
pub mod metadata;
pub mod protocol;
pub mod ratelimit;
pub mod retry;
pub mod session;
pub mod tags;
pub mod upstream;
