//! Text encoding detection and transcoding
//!
//! Registry exports arrive as UTF-8 (with or without a byte-order mark) or in
//! one of the legacy Japanese encodings. Detection decodes a bounded prefix of
//! the file with each candidate in turn and commits to the first one that
//! decodes without error. Everything downstream works on UTF-8: input files
//! are wrapped in a [`DecodingReader`] and output files in an
//! [`EncodingWriter`].

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoding, EUC_JP, SHIFT_JIS, UTF_8};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Number of leading bytes decoded when guessing an encoding
pub const SNIFF_BYTES: usize = 4096;

/// Candidates tried by [`detect_encoding`], in order
pub const DEFAULT_CANDIDATES: [TextEncoding; 5] = [
    TextEncoding::Utf8Sig,
    TextEncoding::Utf8,
    TextEncoding::Cp932,
    TextEncoding::ShiftJis,
    TextEncoding::EucJp,
];

/// A text encoding understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TextEncoding {
    /// UTF-8; a leading byte-order mark is stripped on read and written on output
    #[serde(rename = "utf-8-sig")]
    Utf8Sig,
    #[serde(rename = "utf-8")]
    Utf8,
    /// Windows code page 932
    #[serde(rename = "cp932")]
    Cp932,
    #[serde(rename = "shift_jis")]
    ShiftJis,
    #[serde(rename = "euc_jp")]
    EucJp,
}

impl TextEncoding {
    /// Canonical label, as accepted on the command line
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Cp932 => "cp932",
            TextEncoding::ShiftJis => "shift_jis",
            TextEncoding::EucJp => "euc_jp",
        }
    }

    /// The WHATWG encoding backing this label.
    ///
    /// `cp932` and `shift_jis` share a decoder: the WHATWG Shift_JIS
    /// definition is the Windows-31J superset.
    pub fn encoding(self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8Sig | TextEncoding::Utf8 => UTF_8,
            TextEncoding::Cp932 | TextEncoding::ShiftJis => SHIFT_JIS,
            TextEncoding::EucJp => EUC_JP,
        }
    }

    pub fn is_utf8(self) -> bool {
        matches!(self, TextEncoding::Utf8Sig | TextEncoding::Utf8)
    }

    fn new_decoder(self) -> Decoder {
        match self {
            TextEncoding::Utf8Sig => UTF_8.new_decoder_with_bom_removal(),
            other => other.encoding().new_decoder_without_bom_handling(),
        }
    }

    /// Encode UTF-8 text into this encoding, including any byte-order mark.
    pub fn encode(self, text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() + 3);
        if self == TextEncoding::Utf8Sig {
            bytes.extend_from_slice(b"\xEF\xBB\xBF");
        }
        if self.is_utf8() {
            bytes.extend_from_slice(text.as_bytes());
        } else {
            let (encoded, _, _) = self.encoding().encode(text);
            bytes.extend_from_slice(&encoded);
        }
        bytes
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "utf_8_sig" | "utf8_sig" => Ok(TextEncoding::Utf8Sig),
            "utf_8" | "utf8" => Ok(TextEncoding::Utf8),
            "cp932" | "ms932" | "windows_31j" => Ok(TextEncoding::Cp932),
            "shift_jis" | "shiftjis" | "sjis" | "s_jis" => Ok(TextEncoding::ShiftJis),
            "euc_jp" | "eucjp" => Ok(TextEncoding::EucJp),
            _ => Err(PipelineError::UnknownEncoding(s.to_string())),
        }
    }
}

/// Input encoding as configured: detected per file, or fixed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncodingChoice {
    #[default]
    Auto,
    Explicit(TextEncoding),
}

impl EncodingChoice {
    /// Settle on a concrete encoding for `path`
    pub fn resolve(self, path: &Path) -> Result<TextEncoding, PipelineError> {
        match self {
            EncodingChoice::Auto => detect_encoding(path),
            EncodingChoice::Explicit(encoding) => Ok(encoding),
        }
    }
}

impl FromStr for EncodingChoice {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(EncodingChoice::Auto)
        } else {
            s.parse().map(EncodingChoice::Explicit)
        }
    }
}

/// Guess the encoding of `path` using [`DEFAULT_CANDIDATES`].
pub fn detect_encoding(path: &Path) -> Result<TextEncoding, PipelineError> {
    detect_encoding_with(path, &DEFAULT_CANDIDATES)
}

/// Guess the encoding of `path`, trying `candidates` in order.
///
/// Returns the first candidate that decodes the leading [`SNIFF_BYTES`]
/// without error, or UTF-8 when none does. A missing file is an error;
/// an undecodable one is not.
pub fn detect_encoding_with(
    path: &Path,
    candidates: &[TextEncoding],
) -> Result<TextEncoding, PipelineError> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PipelineError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => PipelineError::Io(e),
    })?;

    let mut sample = Vec::with_capacity(SNIFF_BYTES);
    (&mut file)
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut sample)?;
    let complete = sample.len() < SNIFF_BYTES;

    for &candidate in candidates {
        if decodes_cleanly(candidate, &sample, complete) {
            debug!(path = %path.display(), encoding = %candidate, "detected encoding");
            return Ok(candidate);
        }
    }

    debug!(path = %path.display(), "no candidate encoding matched, assuming utf-8");
    Ok(TextEncoding::Utf8)
}

/// Decode `sample` strictly. When the sample is a prefix of a longer file a
/// character cut off at the end is not counted as an error.
fn decodes_cleanly(encoding: TextEncoding, sample: &[u8], complete: bool) -> bool {
    let mut decoder = encoding.new_decoder();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(sample.len())
        .unwrap_or(sample.len() * 3 + 16);
    let mut out = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(sample, &mut out, complete);
    matches!(result, DecoderResult::InputEmpty)
}

const DECODE_BUFFER: usize = 8 * 1024;

/// A reader that decodes its input into UTF-8.
///
/// Malformed sequences are replaced with U+FFFD; the first replacement is
/// logged once per reader.
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    input: Box<[u8]>,
    in_pos: usize,
    in_len: usize,
    output: Box<[u8]>,
    out_pos: usize,
    out_len: usize,
    eof: bool,
    finished: bool,
    warned: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: TextEncoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder(),
            input: vec![0; DECODE_BUFFER].into_boxed_slice(),
            in_pos: 0,
            in_len: 0,
            output: vec![0; DECODE_BUFFER * 3].into_boxed_slice(),
            out_pos: 0,
            out_len: 0,
            eof: false,
            finished: false,
            warned: false,
        }
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.out_pos < self.out_len {
                let n = buf.len().min(self.out_len - self.out_pos);
                buf[..n].copy_from_slice(&self.output[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            if self.in_pos == self.in_len && !self.eof {
                let n = self.inner.read(&mut self.input)?;
                self.in_pos = 0;
                self.in_len = n;
                self.eof = n == 0;
            }

            let (result, read, written, replaced) = self.decoder.decode_to_utf8(
                &self.input[self.in_pos..self.in_len],
                &mut self.output,
                self.eof,
            );
            self.in_pos += read;
            self.out_pos = 0;
            self.out_len = written;

            if replaced && !self.warned {
                warn!("input contains byte sequences invalid in the chosen encoding; replaced with U+FFFD");
                self.warned = true;
            }
            if self.eof && result == CoderResult::InputEmpty {
                self.finished = true;
            }
        }
    }
}

/// A writer that accepts UTF-8 and writes the target encoding.
///
/// UTF-8 text may arrive split at arbitrary byte boundaries; an incomplete
/// trailing character is held back until the rest of it is written.
pub struct EncodingWriter<W: Write> {
    inner: W,
    encoding: TextEncoding,
    pending: Vec<u8>,
    started: bool,
}

impl<W: Write> EncodingWriter<W> {
    pub fn new(inner: W, encoding: TextEncoding) -> Self {
        Self {
            inner,
            encoding,
            pending: Vec::new(),
            started: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    fn write_bom(&mut self) -> io::Result<()> {
        if !self.started {
            self.started = true;
            if self.encoding == TextEncoding::Utf8Sig {
                self.inner.write_all(b"\xEF\xBB\xBF")?;
            }
        }
        Ok(())
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bom()?;
        if self.encoding.is_utf8() {
            self.inner.write_all(buf)?;
            return Ok(buf.len());
        }

        self.pending.extend_from_slice(buf);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };
        let text = std::str::from_utf8(&self.pending[..valid])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let (encoded, _, unmappable) = self.encoding.encoding().encode(text);
        if unmappable {
            warn!(encoding = %self.encoding, "characters not representable in output encoding were written as numeric references");
        }
        self.inner.write_all(&encoded)?;
        self.pending.drain(..valid);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
