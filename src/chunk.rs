//! RIFF chunk headers and a forward-only chunk reader.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use tracing::trace;

use crate::Error;

/// Size of a chunk header: 4-byte tag plus 4-byte little-endian payload size.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// The chunk tags the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkTag {
    /// `VP8 `, a lossy bitstream.
    Vp8,
    /// `VP8L`, a lossless bitstream.
    Vp8l,
    /// `VP8X`, the extended header.
    Vp8x,
    /// `ANIM`, global animation parameters.
    Anim,
    /// `ANMF`, one animation frame.
    Anmf,
    /// `ALPH`, alpha plane for a lossy bitstream.
    Alph,
    /// Anything else (`ICCP`, `EXIF`, `XMP `, vendor chunks, garbage).
    Unknown([u8; 4]),
}

impl ChunkTag {
    pub fn from_fourcc(fourcc: [u8; 4]) -> Self {
        match &fourcc {
            b"VP8 " => ChunkTag::Vp8,
            b"VP8L" => ChunkTag::Vp8l,
            b"VP8X" => ChunkTag::Vp8x,
            b"ANIM" => ChunkTag::Anim,
            b"ANMF" => ChunkTag::Anmf,
            b"ALPH" => ChunkTag::Alph,
            _ => ChunkTag::Unknown(fourcc),
        }
    }

    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            ChunkTag::Vp8 => *b"VP8 ",
            ChunkTag::Vp8l => *b"VP8L",
            ChunkTag::Vp8x => *b"VP8X",
            ChunkTag::Anim => *b"ANIM",
            ChunkTag::Anmf => *b"ANMF",
            ChunkTag::Alph => *b"ALPH",
            ChunkTag::Unknown(fourcc) => *fourcc,
        }
    }
}

impl fmt::Display for ChunkTag {
    // Attacker-controlled tags end up in error messages; keep them printable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("'")?;
        for byte in self.fourcc() {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        f.write_str("'")
    }
}

/// A chunk whose payload lies entirely inside the scanned region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub tag: ChunkTag,
    /// Absolute offset of the chunk header in the original buffer.
    pub offset: usize,
    /// Payload without the padding byte.
    pub payload: &'a [u8],
}

impl Chunk<'_> {
    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> usize {
        self.offset + CHUNK_HEADER_SIZE
    }
}

/// Walks the chunks of a region, strictly forward.
///
/// Every successful step moves the cursor past at least one chunk header, so a
/// region of `n` bytes yields at most `n / 8` chunks. After the first error the
/// reader is exhausted.
#[derive(Debug, Clone)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ChunkReader<'a> {
    /// Reads chunks from `data`, reporting offsets relative to `base`.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    fn fail(&mut self, error: Error) -> Option<Result<Chunk<'a>, Error>> {
        self.pos = self.data.len();
        Some(Err(error))
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Chunk<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }

        let offset = self.base + self.pos;
        let remaining = &self.data[self.pos..];
        if remaining.len() < CHUNK_HEADER_SIZE {
            return self.fail(Error::TruncatedChunkHeader {
                offset,
                available: remaining.len(),
            });
        }

        let tag = ChunkTag::from_fourcc([remaining[0], remaining[1], remaining[2], remaining[3]]);
        let size = LittleEndian::read_u32(&remaining[4..CHUNK_HEADER_SIZE]);
        let available = remaining.len() - CHUNK_HEADER_SIZE;
        if u64::from(size) > available as u64 {
            return self.fail(Error::TruncatedChunk {
                tag,
                offset,
                size: u64::from(size),
                available: available as u64,
            });
        }

        let size = size as usize;
        let payload = &remaining[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + size];
        let padding = size & 1;
        if padding == 1 && size == available {
            trace!(%tag, offset, "padding byte missing at end of region");
        }
        self.pos += CHUNK_HEADER_SIZE + size + padding;

        Some(Ok(Chunk {
            tag,
            offset,
            payload,
        }))
    }
}
