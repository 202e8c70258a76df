//! Best-effort repair of Japanese directory text that the store hands
//! back after a lossy round-trip through a legacy double-byte
//! encoding. There is no declared source encoding, so each candidate
//! is tried in a fixed order and the first one that produces
//! something readable wins.

use encoding_rs::{EncoderResult, Encoding};
use thiserror::Error;

// (name used in logs, WHATWG label understood by encoding_rs). The
// WHATWG Shift_JIS already covers the CP932 extensions, and
// `windows-31j` is only another label for it.
const CANDIDATES: [(&str, &str); 2] = [
    ("shift_jis", "shift_jis"),
    ("iso-2022-jp", "iso-2022-jp"),
];

const PLACEHOLDERS: [char; 2] = ['?', '\u{FFFD}'];

#[derive(Debug, Error)]
pub enum RecoveryFailed {
    #[error("no encoding registered for label {0}")]
    UnknownEncoding(&'static str),
    #[error("no candidate encoding produced readable text")]
    NoImprovement,
}

/// Normalize a text field. Absent or empty input comes back absent;
/// anything else comes back repaired or, failing that, untouched.
pub fn normalize(text: Option<&str>) -> Option<String> {
    let text = text.filter(|t| !t.is_empty())?;
    match recover(text) {
        Ok(repaired) => Some(repaired),
        Err(RecoveryFailed::NoImprovement) => Some(text.to_string()),
        Err(e) => {
            tracing::info!("Keeping original text after encoding repair failed: {}", e);
            Some(text.to_string())
        }
    }
}

/// Try every candidate encoding in priority order.
pub fn recover(text: &str) -> Result<String, RecoveryFailed> {
    for (name, label) in CANDIDATES {
        let encoding =
            Encoding::for_label(label.as_bytes()).ok_or(RecoveryFailed::UnknownEncoding(name))?;
        let bytes = encode_dropping_unmappable(encoding, text);
        let decoded = decode_dropping_malformed(encoding, &bytes);
        if is_readable(&decoded) {
            return Ok(decoded);
        }
    }
    Err(RecoveryFailed::NoImprovement)
}

fn encode_dropping_unmappable(encoding: &'static Encoding, text: &str) -> Vec<u8> {
    let mut encoder = encoding.new_encoder();
    let mut bytes = Vec::with_capacity(text.len() * 2);
    let mut buf = [0u8; 1024];
    let mut input = text;
    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(input, &mut buf, true);
        bytes.extend_from_slice(&buf[..written]);
        input = &input[read..];
        match result {
            EncoderResult::InputEmpty => break,
            // Unmappable characters are skipped; the encoder resumes after them.
            EncoderResult::OutputFull | EncoderResult::Unmappable(_) => continue,
        }
    }
    bytes
}

fn decode_dropping_malformed(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let (decoded, _) = encoding.decode_without_bom_handling(bytes);
    decoded.chars().filter(|c| *c != '\u{FFFD}').collect()
}

fn is_readable(text: &str) -> bool {
    !text.is_empty() && !text.chars().all(|c| PLACEHOLDERS.contains(&c))
}
