//! Track decryption for Deezer's protected media content.
//!
//! This module decrypts tracks while they stream in:
//! * Reads the source strictly in 2KB blocks
//! * Decrypts every third block with Blowfish CBC
//! * Yields each block as soon as it is complete
//!
//! # Encryption Format
//!
//! Deezer uses a striped encryption pattern:
//! * Content is divided into 2KB blocks
//! * Every third block is encrypted, starting with the first
//! * Encryption uses Blowfish in CBC mode with a fixed IV
//! * The cipher is reset for each block
//! * A trailing block shorter than 2KB is never encrypted
//!
//! The last rule is an exception to "every third block": a short final
//! block at an index divisible by three is still passed through as
//! received. Blowfish CBC without padding cannot apply to a partial block,
//! and the upstream serves that tail in the clear.
//!
//! # Security
//!
//! To comply with Deezer's Terms of Service:
//! * No decryption keys are included in this code
//! * Keys must be provided externally
//!
//! # Memory Management
//!
//! At most one block plus one network read is buffered. The whole track is
//! only held in memory if the caller collects the output.
//!
//! # Examples
//!
//! ```rust
//! use deezl::decrypt::{Decrypt, Key};
//!
//! let source = Box::pin(response.bytes_stream());
//! let mut decrypt = Decrypt::new("3117931", source, &bf_secret);
//! while let Some(block) = decrypt.next_chunk().await? {
//!     output.write_all(&block)?;
//! }
//! ```

use std::{ops::Deref, str::FromStr};

use blowfish::{cipher::BlockDecryptMut, cipher::KeyIvInit, Blowfish};
use cbc::cipher::block_padding::NoPadding;
use futures_util::{stream, Stream, StreamExt};
use md5::{Digest, Md5};

use crate::error::{Error, Result};

/// Length of decryption keys in bytes.
pub const KEY_LENGTH: usize = 16;

/// Raw key bytes.
pub type RawKey = [u8; KEY_LENGTH];

/// Validated decryption key.
///
/// Used both for the shared secret and for the per-track keys derived
/// from it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Key(RawKey);

impl Key {
    /// Calculates the track-specific decryption key.
    ///
    /// The key is derived using:
    /// 1. MD5 hash of the track ID, as 32 lowercase hex characters
    /// 2. XOR of the first and last 16 of those characters
    /// 3. XOR with the shared secret
    ///
    /// This is the upstream's scheme and must be reproduced as is.
    #[must_use]
    pub fn for_track_id(track_id: &str, salt: &Key) -> Key {
        let track_hash = format!("{:x}", Md5::digest(track_id));
        let track_hash = track_hash.as_bytes();

        let mut key = RawKey::default();
        for i in 0..KEY_LENGTH {
            key[i] = track_hash[i] ^ track_hash[i + KEY_LENGTH] ^ salt[i];
        }
        Key(key)
    }
}

impl FromStr for Key {
    type Err = Error;

    /// Parses a string into a decryption key.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfRange` if the string isn't exactly 16 bytes.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let len = s.len();
        if len != KEY_LENGTH {
            return Err(Error::out_of_range(format!(
                "key length is {len} but should be {KEY_LENGTH}",
            )));
        }

        let mut key = [0; KEY_LENGTH];
        key.copy_from_slice(s.as_bytes());

        Ok(Self(key))
    }
}

impl From<RawKey> for Key {
    fn from(key: RawKey) -> Self {
        Self(key)
    }
}

impl Deref for Key {
    type Target = RawKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Fixed IV for CBC decryption.
const CBC_BF_IV: &[u8; 8] = b"\x00\x01\x02\x03\x04\x05\x06\x07";

/// Size of each block in bytes (2KB).
pub const CBC_BLOCK_SIZE: usize = 2 * 1024;

/// Number of blocks in a stripe (3).
///
/// Every third block is encrypted.
const CBC_STRIPE_COUNT: u64 = 3;

/// Applies the stripe cipher to one block in place.
///
/// Blocks whose index is not a multiple of three are left untouched. An
/// eligible block is decrypted with a fresh CBC context; an eligible block
/// shorter than [`CBC_BLOCK_SIZE`] can only be the trailing block, which
/// the upstream leaves in the clear.
///
/// # Errors
///
/// Returns `Error::Internal` if the cipher cannot be initialized with the
/// key.
pub fn decrypt_block(key: &Key, block: u64, buffer: &mut [u8]) -> Result<()> {
    let is_encrypted = block % CBC_STRIPE_COUNT == 0;
    let is_full_block = buffer.len() == CBC_BLOCK_SIZE;

    if is_encrypted && is_full_block {
        // The state of the cipher is reset on each block.
        let cipher = cbc::Decryptor::<Blowfish>::new_from_slices(&**key, CBC_BF_IV)
            .map_err(|e| Error::internal(e.to_string()))?;

        // The buffer is a multiple of the cipher block size, so no padding
        // is necessary.
        cipher
            .decrypt_padded_mut::<NoPadding>(buffer)
            .map_err(|e| Error::internal(e.to_string()))?;
    }

    Ok(())
}

/// Streaming decryptor for a single track download.
///
/// Pulls bytes from `source` and yields decrypted 2KB blocks. The block
/// counter starts at zero for every new `Decrypt` and is never shared:
/// decoding the same track again requires a new read from the start.
pub struct Decrypt<S> {
    source: S,

    /// Track-specific decryption key.
    key: Key,

    /// Bytes received from `source`. Never holds more than one block plus
    /// one read.
    buffer: Vec<u8>,

    /// Offset of the first byte in `buffer` not yet yielded.
    start: usize,

    /// Index of the next block to yield.
    block: u64,

    /// Set when `source` ended or failed.
    exhausted: bool,
}

impl<S, B, E> Decrypt<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    /// Creates a new decryptor for the track with `track_id`.
    ///
    /// `salt` is the shared secret; the track-specific key is derived from
    /// it here and dropped with the decryptor.
    pub fn new(track_id: &str, source: S, salt: &Key) -> Self {
        Self {
            source,
            key: Key::for_track_id(track_id, salt),
            buffer: Vec::with_capacity(CBC_BLOCK_SIZE),
            start: 0,
            block: 0,
            exhausted: false,
        }
    }

    /// Returns the next decrypted block, or `None` at the end of the source.
    ///
    /// Every block is exactly [`CBC_BLOCK_SIZE`] bytes except the last,
    /// which holds whatever was received before the source ended.
    ///
    /// # Errors
    ///
    /// Returns the source's error if reading fails. The decryptor yields
    /// nothing afterwards.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pending() < CBC_BLOCK_SIZE && self.start > 0 {
            // Only a partial block is left, so compacting moves less than
            // one block.
            self.buffer.drain(..self.start);
            self.start = 0;
        }

        while !self.exhausted && self.pending() < CBC_BLOCK_SIZE {
            match self.source.next().await {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => {
                    self.exhausted = true;
                    self.buffer.clear();
                    self.start = 0;
                    return Err(e.into());
                }
                None => self.exhausted = true,
            }
        }

        let len = self.pending().min(CBC_BLOCK_SIZE);
        if len == 0 {
            return Ok(None);
        }

        let mut chunk = self.buffer[self.start..self.start + len].to_vec();
        self.start += len;

        decrypt_block(&self.key, self.block, &mut chunk)?;
        self.block += 1;

        Ok(Some(chunk))
    }

    fn pending(&self) -> usize {
        self.buffer.len() - self.start
    }

    /// Turns the decryptor into a stream of decrypted blocks.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u8>>> {
        stream::try_unfold(self, |mut decrypt| async move {
            let chunk = decrypt.next_chunk().await?;
            Ok::<_, Error>(chunk.map(|chunk| (chunk, decrypt)))
        })
    }

    /// Drains the source and returns the complete decrypted track.
    ///
    /// # Errors
    ///
    /// Returns the first error from the source. Partial output is dropped.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            output.extend_from_slice(&chunk);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use blowfish::cipher::BlockEncryptMut;

    use super::*;

    const SECRET: &str = "secret16bytes!!!";
    const TRACK_ID: &str = "3117931";

    fn salt() -> Key {
        SECRET.parse().unwrap()
    }

    fn plaintext(blocks: usize, tail: usize) -> Vec<u8> {
        (0..blocks * CBC_BLOCK_SIZE + tail)
            .map(|i| u8::try_from(i % 256).unwrap())
            .collect()
    }

    fn encrypt_block(key: &Key, block: &mut [u8]) {
        let len = block.len();
        cbc::Encryptor::<Blowfish>::new_from_slices(&**key, CBC_BF_IV)
            .unwrap()
            .encrypt_padded_mut::<NoPadding>(block, len)
            .unwrap();
    }

    /// Encrypts `plain` the way the upstream serves it.
    fn stripe_encrypt(key: &Key, plain: &[u8]) -> Vec<u8> {
        let mut data = plain.to_vec();
        for (i, block) in data.chunks_mut(CBC_BLOCK_SIZE).enumerate() {
            if i % 3 == 0 && block.len() == CBC_BLOCK_SIZE {
                encrypt_block(key, block);
            }
        }
        data
    }

    /// Splits `data` into irregular network reads.
    fn source(data: &[u8], read_size: usize) -> impl Stream<Item = Result<Vec<u8>>> + Unpin {
        let reads: Vec<Result<Vec<u8>>> = data.chunks(read_size).map(|c| Ok(c.to_vec())).collect();
        stream::iter(reads)
    }

    #[test]
    fn derives_known_key() {
        let key = Key::for_track_id(TRACK_ID, &salt());
        assert_eq!(hex::encode(*key), "776563263426603a302a216520767721");
    }

    #[test]
    fn key_derivation_is_deterministic() {
        let salt = salt();
        assert_eq!(
            Key::for_track_id("916424", &salt),
            Key::for_track_id("916424", &salt)
        );
        assert_ne!(
            Key::for_track_id("916424", &salt),
            Key::for_track_id("916425", &salt)
        );
    }

    #[test]
    fn rejects_keys_of_wrong_length() {
        assert!("12345".parse::<Key>().is_err());
        assert!("12345678901234567".parse::<Key>().is_err());
        assert!("1234567890123456".parse::<Key>().is_ok());
    }

    #[test]
    fn cipher_matches_reference_vector() {
        let key = Key::for_track_id(TRACK_ID, &salt());
        let mut block = plaintext(1, 0);
        encrypt_block(&key, &mut block);

        assert_eq!(hex::encode(&block[..16]), "5f381e43d09c05452f95448a5d8e8a88");
        assert_eq!(
            hex::encode(&block[CBC_BLOCK_SIZE - 8..]),
            "b7752320cd75ea3e"
        );

        decrypt_block(&key, 0, &mut block).unwrap();
        assert_eq!(block, plaintext(1, 0));
    }

    #[test]
    fn only_every_third_block_is_touched() {
        let key = Key::for_track_id(TRACK_ID, &salt());
        for index in 0..7 {
            let mut block = plaintext(1, 0);
            decrypt_block(&key, index, &mut block).unwrap();
            assert_eq!(block == plaintext(1, 0), index % 3 != 0, "block {index}");
        }
    }

    #[test]
    fn short_trailing_block_passes_through() {
        let key = Key::for_track_id(TRACK_ID, &salt());
        let mut block = plaintext(0, 100);
        decrypt_block(&key, 3, &mut block).unwrap();
        assert_eq!(block, plaintext(0, 100));
    }

    #[tokio::test]
    async fn decrypts_striped_stream() {
        let key = Key::for_track_id(TRACK_ID, &salt());
        let plain = plaintext(7, 313);
        let encrypted = stripe_encrypt(&key, &plain);

        let decrypt = Decrypt::new(TRACK_ID, source(&encrypted, 1000), &salt());
        assert_eq!(decrypt.read_to_end().await.unwrap(), plain);
    }

    #[tokio::test]
    async fn yields_fixed_size_blocks_with_short_tail() {
        let plain = plaintext(4, 10);
        let encrypted = stripe_encrypt(&Key::for_track_id(TRACK_ID, &salt()), &plain);

        let mut decrypt = Decrypt::new(TRACK_ID, source(&encrypted, 3000), &salt());
        let mut sizes = Vec::new();
        while let Some(chunk) = decrypt.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }
        assert_eq!(sizes, [CBC_BLOCK_SIZE; 4].into_iter().chain([10]).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn blocks_zero_and_three_round_trip() {
        let key = Key::for_track_id(TRACK_ID, &salt());
        let plain = plaintext(4, 0);
        let mut encrypted = plain.clone();
        encrypt_block(&key, &mut encrypted[..CBC_BLOCK_SIZE]);
        encrypt_block(&key, &mut encrypted[3 * CBC_BLOCK_SIZE..]);

        let chunks: Vec<Vec<u8>> = Decrypt::new(TRACK_ID, source(&encrypted, 4096), &salt())
            .into_stream()
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), plain);
    }

    #[tokio::test]
    async fn whole_track_in_one_read_is_not_reshuffled() {
        let key = Key::for_track_id(TRACK_ID, &salt());
        let plain = plaintext(6, 77);
        let encrypted = stripe_encrypt(&key, &plain);

        let mut decrypt = Decrypt::new(TRACK_ID, source(&encrypted, encrypted.len()), &salt());
        let mut output = Vec::new();
        for block in 1..=6 {
            output.extend(decrypt.next_chunk().await.unwrap().unwrap());
            assert_eq!(decrypt.buffer.len(), encrypted.len());
            assert_eq!(decrypt.start, block * CBC_BLOCK_SIZE);
        }

        let tail = decrypt.next_chunk().await.unwrap().unwrap();
        assert_eq!(tail.len(), 77);
        output.extend(tail);
        assert!(decrypt.next_chunk().await.unwrap().is_none());
        assert_eq!(output, plain);
    }

    #[tokio::test]
    async fn empty_source_yields_nothing() {
        let empty = stream::iter(Vec::<Result<Vec<u8>>>::new());
        let mut decrypt = Decrypt::new(TRACK_ID, empty, &salt());
        assert!(decrypt.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn source_error_is_propagated() {
        let reads = vec![
            Ok(vec![0; CBC_BLOCK_SIZE + 5]),
            Err(Error::data_loss("connection reset")),
        ];
        let mut decrypt = Decrypt::new(TRACK_ID, stream::iter(reads), &salt());

        assert_eq!(decrypt.next_chunk().await.unwrap().unwrap().len(), CBC_BLOCK_SIZE);
        assert!(decrypt.next_chunk().await.is_err());
        assert!(decrypt.next_chunk().await.unwrap().is_none());
    }
}
