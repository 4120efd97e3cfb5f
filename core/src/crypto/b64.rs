//! Base64 helpers shared by the wire codecs.
//!
//! Senders emit the standard alphabet with padding and no line breaks.
//! Peers are allowed to strip padding, so decoding restores it first.

use base64::engine::general_purpose::STANDARD;
use base64::{DecodeError, Engine as _};

/// Encode with the standard alphabet, padded, no line breaks.
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard-alphabet base64, accepting both padded and unpadded input.
pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    match input.len() % 4 {
        0 => STANDARD.decode(input),
        rem => {
            let mut padded = String::with_capacity(input.len() + 4 - rem);
            padded.push_str(input);
            for _ in 0..(4 - rem) {
                padded.push('=');
            }
            STANDARD.decode(padded)
        }
    }
}
