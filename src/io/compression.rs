//! Transparent compression for text inputs and outputs.
//!
//! CSV sources and JSONL sinks are wrapped with a codec chosen from the file
//! name (`flights.csv.gz`, `out.jsonl.zst`). Readers fall back to magic-byte
//! sniffing when the extension says nothing. Parquet compression is separate:
//! it is a column-chunk codec configured through
//! [`ParquetWriteOptions`](crate::io::parquet::ParquetWriteOptions).
//!
//! Codecs are compiled in per feature:
//! - **Gzip** (`.gz`, `.gzip`): `compression-gzip`, via `flate2`
//! - **Zstd** (`.zst`, `.zstd`): `compression-zstd`, via `zstd`
//! - **Bzip2** (`.bz2`, `.bzip2`): `compression-bzip2`, via `bzip2`
//! - **Xz** (`.xz`): `compression-xz`, via `xz2`
//!
//! A path whose extension names a codec that is not compiled in is an error
//! rather than a silent pass-through.

use anyhow::{Context, Result, bail};
use std::fmt;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Stream compression codecs recognized on text files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextCodec {
    Gzip,
    Zstd,
    Bzip2,
    Xz,
}

impl TextCodec {
    pub const ALL: [TextCodec; 4] = [
        TextCodec::Gzip,
        TextCodec::Zstd,
        TextCodec::Bzip2,
        TextCodec::Xz,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TextCodec::Gzip => "gzip",
            TextCodec::Zstd => "zstd",
            TextCodec::Bzip2 => "bzip2",
            TextCodec::Xz => "xz",
        }
    }

    /// Lowercase extensions, leading dot included.
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            TextCodec::Gzip => &[".gz", ".gzip"],
            TextCodec::Zstd => &[".zst", ".zstd"],
            TextCodec::Bzip2 => &[".bz2", ".bzip2"],
            TextCodec::Xz => &[".xz"],
        }
    }

    #[must_use]
    pub fn magic_bytes(self) -> &'static [u8] {
        match self {
            TextCodec::Gzip => &[0x1f, 0x8b],
            TextCodec::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
            // "BZh": the bare "BZ" prefix is too easy to hit in plain CSV text
            TextCodec::Bzip2 => &[0x42, 0x5a, 0x68],
            TextCodec::Xz => &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00],
        }
    }

    /// Whether support for this codec was compiled in.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        match self {
            TextCodec::Gzip => cfg!(feature = "compression-gzip"),
            TextCodec::Zstd => cfg!(feature = "compression-zstd"),
            TextCodec::Bzip2 => cfg!(feature = "compression-bzip2"),
            TextCodec::Xz => cfg!(feature = "compression-xz"),
        }
    }

    /// Codec named by the file extension, case-insensitive.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
    }

    /// Enabled codec whose signature prefixes `head`.
    #[must_use]
    pub fn from_magic(head: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .filter(|codec| codec.is_enabled())
            .find(|codec| head.starts_with(codec.magic_bytes()))
    }

    /// Wrap `reader` with a decompressor.
    ///
    /// # Errors
    /// Fails if the codec is not compiled in or the decoder cannot start.
    pub fn wrap_reader(self, reader: Box<dyn Read>) -> Result<Box<dyn Read>> {
        match self {
            #[cfg(feature = "compression-gzip")]
            TextCodec::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "compression-zstd")]
            TextCodec::Zstd => Ok(Box::new(
                zstd::stream::read::Decoder::new(reader).context("start zstd decoder")?,
            )),
            #[cfg(feature = "compression-bzip2")]
            TextCodec::Bzip2 => Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader))),
            #[cfg(feature = "compression-xz")]
            TextCodec::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader))),
            #[allow(unreachable_patterns)]
            other => {
                drop(reader);
                bail!(
                    "{other} input requires the `compression-{}` feature",
                    other.name()
                )
            }
        }
    }

    /// Wrap `writer` with a compressor. The stream is complete only after
    /// [`TextWriter::finish`] returns `Ok`.
    ///
    /// # Errors
    /// Fails if the codec is not compiled in or the encoder cannot start.
    pub fn wrap_writer(self, writer: Box<dyn Write>) -> Result<TextWriter> {
        let inner = BufWriter::new(writer);
        match self {
            #[cfg(feature = "compression-gzip")]
            TextCodec::Gzip => Ok(TextWriter::Gzip(flate2::write::GzEncoder::new(
                inner,
                flate2::Compression::default(),
            ))),
            #[cfg(feature = "compression-zstd")]
            TextCodec::Zstd => Ok(TextWriter::Zstd(
                zstd::stream::write::Encoder::new(inner, 3).context("start zstd encoder")?,
            )),
            #[cfg(feature = "compression-bzip2")]
            TextCodec::Bzip2 => Ok(TextWriter::Bzip2(bzip2::write::BzEncoder::new(
                inner,
                bzip2::Compression::default(),
            ))),
            #[cfg(feature = "compression-xz")]
            TextCodec::Xz => Ok(TextWriter::Xz(xz2::write::XzEncoder::new(inner, 6))),
            #[allow(unreachable_patterns)]
            other => {
                drop(inner);
                bail!(
                    "{other} output requires the `compression-{}` feature",
                    other.name()
                )
            }
        }
    }
}

type Inner = BufWriter<Box<dyn Write>>;

/// Buffered text output, optionally compressed.
///
/// [`finish`](Self::finish) writes the encoder trailer and reports its errors.
/// A writer that is only dropped may leave a truncated stream.
pub enum TextWriter {
    Plain(Inner),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<Inner>),
    #[cfg(feature = "compression-zstd")]
    Zstd(zstd::stream::write::Encoder<'static, Inner>),
    #[cfg(feature = "compression-bzip2")]
    Bzip2(bzip2::write::BzEncoder<Inner>),
    #[cfg(feature = "compression-xz")]
    Xz(xz2::write::XzEncoder<Inner>),
}

impl TextWriter {
    /// Finalize the compressed stream and flush everything to the underlying writer.
    ///
    /// # Errors
    /// Returns the first I/O error from the encoder or the flush.
    pub fn finish(self) -> io::Result<()> {
        let mut inner = match self {
            TextWriter::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            TextWriter::Gzip(w) => w.finish()?,
            #[cfg(feature = "compression-zstd")]
            TextWriter::Zstd(w) => w.finish()?,
            #[cfg(feature = "compression-bzip2")]
            TextWriter::Bzip2(w) => w.finish()?,
            #[cfg(feature = "compression-xz")]
            TextWriter::Xz(w) => w.finish()?,
        };
        inner.flush()
    }

    fn as_dyn(&mut self) -> &mut dyn Write {
        match self {
            TextWriter::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            TextWriter::Gzip(w) => w,
            #[cfg(feature = "compression-zstd")]
            TextWriter::Zstd(w) => w,
            #[cfg(feature = "compression-bzip2")]
            TextWriter::Bzip2(w) => w,
            #[cfg(feature = "compression-xz")]
            TextWriter::Xz(w) => w,
        }
    }
}

impl Write for TextWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.as_dyn().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.as_dyn().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.as_dyn().flush()
    }
}

impl fmt::Display for TextCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wrap `reader` with decompression if the path or leading bytes call for it.
///
/// Detection order: extension of `path_hint`, then magic bytes, then none.
///
/// # Errors
/// Fails if the leading bytes cannot be read or the codec cannot start.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    if let Some(codec) = TextCodec::from_path(&path_hint) {
        return codec
            .wrap_reader(Box::new(reader))
            .with_context(|| format!("wrap reader with {codec} codec"));
    }

    let mut buf_reader = BufReader::new(reader);
    let head = buf_reader.fill_buf().context("peek leading bytes")?;
    if let Some(codec) = TextCodec::from_magic(head) {
        return codec
            .wrap_reader(Box::new(buf_reader))
            .with_context(|| format!("wrap reader with {codec} codec"));
    }
    Ok(Box::new(buf_reader))
}

/// Wrap `writer` with compression chosen from the extension of `path_hint`.
///
/// Output is buffered either way.
///
/// # Errors
/// Fails if the codec named by the extension cannot start.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<TextWriter> {
    if let Some(codec) = TextCodec::from_path(&path_hint) {
        return codec
            .wrap_writer(Box::new(writer))
            .with_context(|| format!("wrap writer with {codec} codec"));
    }
    Ok(TextWriter::Plain(BufWriter::new(Box::new(writer))))
}
