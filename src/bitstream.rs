//! Fixed-layout headers carried inside WebP chunks.
//!
//! All multi-byte fields are little-endian. Each parser checks the payload
//! length before touching it, so none of them can read out of bounds.

use byteorder::{ByteOrder, LittleEndian};

use crate::{ChunkTag, Error, FeatureFlags, LoopCount};

/// Start code that follows the frame tag of a VP8 key frame.
pub const VP8_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

/// First byte of every VP8L bitstream.
pub const VP8L_SIGNATURE: u8 = 0x2f;

const VP8_HEADER_SIZE: usize = 10;
const VP8L_HEADER_SIZE: usize = 5;
const VP8X_PAYLOAD_SIZE: usize = 10;
const ANIM_PAYLOAD_SIZE: usize = 6;

/// Size of the fixed part of an `ANMF` payload, before the nested chunks.
pub const ANMF_HEADER_SIZE: usize = 16;

const VP8X_FLAG_ICC: u8 = 0b0010_0000;
const VP8X_FLAG_ALPHA: u8 = 0b0001_0000;
const VP8X_FLAG_EXIF: u8 = 0b0000_1000;
const VP8X_FLAG_XMP: u8 = 0b0000_0100;
const VP8X_FLAG_ANIMATION: u8 = 0b0000_0010;

/// Reads a 24-bit little-endian value. `bytes` must hold at least 3 bytes.
#[inline]
pub fn read_u24(bytes: &[u8]) -> u32 {
    LittleEndian::read_u24(bytes)
}

/// Extracts a `width`-bit field starting at bit `shift` of `bits`.
#[inline]
pub fn bit_field(bits: u32, shift: u32, width: u32) -> u32 {
    (bits >> shift) & ((1 << width) - 1)
}

/// Fails with [`Error::TruncatedPayload`] when `payload` is shorter than `need`.
fn require(tag: ChunkTag, payload: &[u8], need: usize) -> Result<(), Error> {
    if payload.len() < need {
        return Err(Error::TruncatedPayload {
            tag,
            size: payload.len(),
            need,
        });
    }
    Ok(())
}

/// Splits a 16-bit VP8 size field into its 14-bit dimension and 2-bit scale.
#[inline]
pub fn vp8_dimension(field: u16) -> (u32, u8) {
    (u32::from(field & 0x3fff), (field >> 14) as u8)
}

/// Header of a lossy key frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vp8Header {
    pub(crate) version: u8,
    pub(crate) show_frame: bool,
    pub first_partition_size: u32,
    pub width: u32,
    pub height: u32,
    pub(crate) horizontal_scale: u8,
    pub(crate) vertical_scale: u8,
}

impl Vp8Header {
    /// Parses the 3-byte frame tag, the start code and the size fields.
    ///
    /// Frame tag bits: 0 is the inverted key frame flag, 1..=3 the version,
    /// 4 the show flag, 5..=23 the first partition size.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        require(ChunkTag::Vp8, payload, VP8_HEADER_SIZE)?;

        let tag = read_u24(&payload[0..3]);
        if bit_field(tag, 0, 1) != 0 {
            return Err(Error::CorruptVp8("first frame is not a key frame".into()));
        }
        let version = bit_field(tag, 1, 3) as u8;
        if version > 3 {
            return Err(Error::CorruptVp8(format!("unsupported version {version}")));
        }
        let show_frame = bit_field(tag, 4, 1) == 1;
        let first_partition_size = bit_field(tag, 5, 19);
        require(
            ChunkTag::Vp8,
            payload,
            VP8_HEADER_SIZE + first_partition_size as usize,
        )?;

        if payload[3..6] != VP8_START_CODE {
            return Err(Error::CorruptVp8(format!(
                "bad start code {:02x?}",
                &payload[3..6]
            )));
        }

        let (width, horizontal_scale) = vp8_dimension(LittleEndian::read_u16(&payload[6..8]));
        let (height, vertical_scale) = vp8_dimension(LittleEndian::read_u16(&payload[8..10]));

        Ok(Self {
            version,
            show_frame,
            first_partition_size,
            width,
            height,
            horizontal_scale,
            vertical_scale,
        })
    }
}

/// Header of a lossless bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vp8lHeader {
    pub width: u32,
    pub height: u32,
    pub alpha_is_used: bool,
}

impl Vp8lHeader {
    /// Parses the signature byte and the packed 32-bit field that follows it:
    /// bits 0..14 width - 1, 14..28 height - 1, 28 alpha-is-used, 29..32 version.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        require(ChunkTag::Vp8l, payload, VP8L_HEADER_SIZE)?;
        if payload[0] != VP8L_SIGNATURE {
            return Err(Error::CorruptVp8l(format!(
                "bad signature 0x{:02x}",
                payload[0]
            )));
        }

        let bits = LittleEndian::read_u32(&payload[1..5]);
        let version = bit_field(bits, 29, 3);
        if version != 0 {
            return Err(Error::CorruptVp8l(format!("unsupported version {version}")));
        }

        Ok(Self {
            width: bit_field(bits, 0, 14) + 1,
            height: bit_field(bits, 14, 14) + 1,
            alpha_is_used: bit_field(bits, 28, 1) == 1,
        })
    }
}

/// Payload of the `VP8X` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vp8xHeader {
    pub features: FeatureFlags,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Vp8xHeader {
    /// Parses the flag byte, skips 3 reserved bytes, then reads the 24-bit
    /// canvas width - 1 and height - 1.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        require(ChunkTag::Vp8x, payload, VP8X_PAYLOAD_SIZE)?;

        let flags = payload[0];
        let features = FeatureFlags {
            icc_profile: flags & VP8X_FLAG_ICC != 0,
            alpha: flags & VP8X_FLAG_ALPHA != 0,
            exif: flags & VP8X_FLAG_EXIF != 0,
            xmp: flags & VP8X_FLAG_XMP != 0,
            animation: flags & VP8X_FLAG_ANIMATION != 0,
        };

        Ok(Self {
            features,
            canvas_width: read_u24(&payload[4..7]) + 1,
            canvas_height: read_u24(&payload[7..10]) + 1,
        })
    }
}

/// Payload of the `ANIM` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimParams {
    /// B, G, R, A.
    pub background_color: [u8; 4],
    pub loop_count: LoopCount,
}

impl AnimParams {
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        require(ChunkTag::Anim, payload, ANIM_PAYLOAD_SIZE)?;

        let background_color = [payload[0], payload[1], payload[2], payload[3]];
        let loop_count = match LittleEndian::read_u16(&payload[4..6]) {
            0 => LoopCount::Forever,
            n => LoopCount::Times(n),
        };

        Ok(Self {
            background_color,
            loop_count,
        })
    }
}

/// Fixed header at the start of an `ANMF` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u32,
    pub(crate) dispose_to_background: bool,
    pub(crate) blend: bool,
}

impl FrameHeader {
    /// Five 24-bit fields (x / 2, y / 2, width - 1, height - 1, duration) and a
    /// flag byte whose bit 1 disables blending and bit 0 disposes to background.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        require(ChunkTag::Anmf, payload, ANMF_HEADER_SIZE)?;

        let flags = payload[15];
        Ok(Self {
            x_offset: read_u24(&payload[0..3]) * 2,
            y_offset: read_u24(&payload[3..6]) * 2,
            width: read_u24(&payload[6..9]) + 1,
            height: read_u24(&payload[9..12]) + 1,
            duration_ms: read_u24(&payload[12..15]),
            dispose_to_background: flags & 0b01 != 0,
            blend: flags & 0b10 == 0,
        })
    }
}
