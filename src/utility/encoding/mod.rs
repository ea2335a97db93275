// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Text decoding for files written by converters and spreadsheet tools.
//!
//! ```text
//! BOM present?    --yes--> UTF-8 / UTF-16 LE / UTF-16 BE
//!      | no
//! valid UTF-8?    --yes--> UTF-8
//!      | no
//! NUL every odd byte? --yes--> UTF-16 LE
//!      | no
//! CP1252
//! ```
//!
//! Uses `encoding_rs`. Invalid sequences → U+FFFD.

use encoding_rs::{UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use std::borrow::Cow;
use std::path::Path;

/// How many leading bytes the UTF-16 heuristic looks at.
const SNIFF_LEN: usize = 512;

/// Source encoding of a text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// Windows-1252, the usual ANSI code page of converter hosts.
    Acp,
}

impl Encoding {
    fn to_encoding_rs(self) -> &'static encoding_rs::Encoding {
        match self {
            Self::Utf8 => UTF_8,
            Self::Utf16Le => UTF_16LE,
            Self::Utf16Be => UTF_16BE,
            Self::Acp => WINDOWS_1252,
        }
    }
}

/// Guesses the encoding of `bytes`.
#[must_use]
pub fn detect(bytes: &[u8]) -> Encoding {
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(bytes) {
        return if encoding == UTF_16LE {
            Encoding::Utf16Le
        } else if encoding == UTF_16BE {
            Encoding::Utf16Be
        } else {
            Encoding::Utf8
        };
    }

    if looks_like_utf16_le(bytes) {
        return Encoding::Utf16Le;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Encoding::Utf8;
    }
    Encoding::Acp
}

/// BOM-less UTF-16 LE ASCII text has a NUL in every odd position.
fn looks_like_utf16_le(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(SNIFF_LEN) & !1];
    !sample.is_empty() && sample.chunks_exact(2).all(|pair| pair[0] != 0 && pair[1] == 0)
}

/// Decodes `bytes` to UTF-8, stripping any BOM.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let encoding = detect(bytes).to_encoding_rs();
    let (text, _encoding, _had_errors) = encoding.decode(bytes);
    text
}

/// Reads a whole text file in whatever encoding it was written in.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be read.
pub fn read_text_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_text(&bytes).into_owned())
}
