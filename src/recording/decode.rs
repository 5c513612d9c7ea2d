//! Transport-level content-encoding handling

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use tracing::warn;

use crate::Result;

/// Decompress a response body according to its `content-encoding`
///
/// Unknown encodings are stored as-is; the recorder keeps the header either
/// way so replay still advertises it.
///
/// # Errors
///
/// Returns error if a declared gzip/deflate stream is corrupt
pub(crate) fn decompress(encoding: Option<&str>, body: Vec<u8>) -> Result<Vec<u8>> {
    if body.is_empty() {
        return Ok(body);
    }

    match encoding.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "identity") => Ok(body),
        Some("gzip" | "x-gzip") => {
            let mut decoded = Vec::new();
            GzDecoder::new(body.as_slice()).read_to_end(&mut decoded)?;
            Ok(decoded)
        }
        Some("deflate") => {
            // Servers disagree on whether deflate means zlib-wrapped or raw.
            let mut decoded = Vec::new();
            if ZlibDecoder::new(body.as_slice())
                .read_to_end(&mut decoded)
                .is_ok()
            {
                return Ok(decoded);
            }

            let mut decoded = Vec::new();
            DeflateDecoder::new(body.as_slice()).read_to_end(&mut decoded)?;
            Ok(decoded)
        }
        Some(other) => {
            warn!("unsupported content-encoding {other:?}, storing body as-is");
            Ok(body)
        }
    }
}
