use crate::{
    BitstreamFormat, Error, ValidateOptions, ValidationResult, WebpInfo,
    bitstream::{ANMF_HEADER_SIZE, AnimParams, FrameHeader, Vp8Header, Vp8lHeader, Vp8xHeader},
    chunk::{Chunk, ChunkReader, ChunkTag},
};
use byteorder::{ByteOrder, LittleEndian};
use std::{io::Read, path::Path};
use tracing::{debug, trace};

/// Size of the `RIFF` + size + `WEBP` envelope.
pub const RIFF_HEADER_SIZE: usize = 12;

/// Validates `data` with default options and flattens the outcome.
pub fn validate(data: &[u8]) -> ValidationResult {
    validate_with_options(data, &ValidateOptions::default())
}

pub fn validate_with_options(data: &[u8], options: &ValidateOptions) -> ValidationResult {
    validate_webp_with_options(data, options).into()
}

/// Validates `data` with default options.
pub fn validate_webp(data: &[u8]) -> Result<WebpInfo, Error> {
    validate_webp_with_options(data, &ValidateOptions::default())
}

/// Walks the container in `data` and returns its metadata, or the first
/// structural error found.
pub fn validate_webp_with_options(
    data: &[u8],
    options: &ValidateOptions,
) -> Result<WebpInfo, Error> {
    let result = parse(data, options);
    match &result {
        Ok(info) => debug!(
            width = info.width,
            height = info.height,
            format = ?info.format,
            frames = info.num_frames,
            "webp accepted"
        ),
        Err(e) => debug!(kind = ?e.kind(), error = %e, "webp rejected"),
    }
    result
}

/// Reads a whole file and validates it.
pub fn validate_file(path: impl AsRef<Path>, options: &ValidateOptions) -> Result<WebpInfo, Error> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| Error::FileNotFound(format!("{}: {e}", path.display())))?;
    validate_from_reader(file, options)
}

pub fn validate_from_reader(
    reader: impl Read,
    options: &ValidateOptions,
) -> Result<WebpInfo, Error> {
    let mut data = Vec::new();
    let mut reader = std::io::BufReader::new(reader);
    reader
        .read_to_end(&mut data)
        .map_err(|e| Error::Io(e.to_string()))?;
    validate_webp_with_options(&data, options)
}

/// Checks the RIFF envelope and returns the region the chunks live in.
fn riff_payload(data: &[u8]) -> Result<&[u8], Error> {
    if data.len() < RIFF_HEADER_SIZE {
        return Err(Error::TruncatedHeader(format!(
            "{} bytes, need at least {RIFF_HEADER_SIZE}",
            data.len()
        )));
    }
    if &data[0..4] != b"RIFF" {
        return Err(Error::NotRiff);
    }
    if &data[8..12] != b"WEBP" {
        return Err(Error::NotWebp);
    }

    let file_size = u64::from(LittleEndian::read_u32(&data[4..8]));
    let riff_end = file_size + 8;
    if riff_end > data.len() as u64 {
        return Err(Error::TruncatedHeader(format!(
            "declared size {file_size} exceeds the {} bytes that follow",
            data.len() - 8
        )));
    }
    if riff_end < RIFF_HEADER_SIZE as u64 {
        return Err(Error::TruncatedHeader(format!(
            "declared size {file_size} is smaller than the WEBP tag"
        )));
    }
    if (riff_end as usize) < data.len() {
        trace!(trailing = data.len() - riff_end as usize, "ignoring bytes after RIFF payload");
    }

    Ok(&data[RIFF_HEADER_SIZE..riff_end as usize])
}

/// A decoded `VP8 ` or `VP8L` header.
#[derive(Debug, Clone, Copy)]
enum ImageHeader {
    Lossy(Vp8Header),
    Lossless(Vp8lHeader),
}

impl ImageHeader {
    fn parse(chunk: &Chunk<'_>) -> Result<Self, Error> {
        match chunk.tag {
            ChunkTag::Vp8 => {
                let header = Vp8Header::parse(chunk.payload)?;
                trace!(
                    version = header.version,
                    show_frame = header.show_frame,
                    partition = header.first_partition_size,
                    horizontal_scale = header.horizontal_scale,
                    vertical_scale = header.vertical_scale,
                    "vp8 key frame"
                );
                Ok(ImageHeader::Lossy(header))
            }
            ChunkTag::Vp8l => Vp8lHeader::parse(chunk.payload).map(ImageHeader::Lossless),
            tag => Err(Error::UnexpectedChunk {
                tag,
                reason: "not an image bitstream",
            }),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageHeader::Lossy(h) => (h.width, h.height),
            ImageHeader::Lossless(h) => (h.width, h.height),
        }
    }

    fn alpha_is_used(&self) -> bool {
        matches!(self, ImageHeader::Lossless(h) if h.alpha_is_used)
    }
}

fn check_dimensions(width: u32, height: u32, options: &ValidateOptions) -> Result<(), Error> {
    let max_width = options.width_limit();
    let max_height = options.height_limit();
    if width == 0 || height == 0 || width > max_width || height > max_height {
        return Err(Error::DimensionOutOfRange {
            width,
            height,
            max_width,
            max_height,
        });
    }
    Ok(())
}

/// What the chunk scan has learned so far.
#[derive(Debug, Default)]
struct ScanState {
    extended: Option<Vp8xHeader>,
    seen_alph: bool,
    anim: Option<AnimParams>,
    frames: u32,
    /// Set once any non-`Unknown` chunk has been visited.
    seen_known: bool,
}

impl ScanState {
    fn animated(&self) -> Option<Vp8xHeader> {
        self.extended.filter(|h| h.features.animation)
    }
}

fn parse(data: &[u8], options: &ValidateOptions) -> Result<WebpInfo, Error> {
    let payload = riff_payload(data)?;
    let mut state = ScanState::default();

    for chunk in ChunkReader::with_base(payload, RIFF_HEADER_SIZE) {
        let chunk = chunk?;
        debug!(tag = %chunk.tag, offset = chunk.offset, size = chunk.payload.len(), "chunk");

        match chunk.tag {
            ChunkTag::Vp8x => {
                if state.seen_known {
                    return Err(Error::UnexpectedChunk {
                        tag: chunk.tag,
                        reason: "VP8X must be the first chunk",
                    });
                }
                let header = Vp8xHeader::parse(chunk.payload)?;
                check_dimensions(header.canvas_width, header.canvas_height, options)?;
                state.extended = Some(header);
            }
            ChunkTag::Vp8 | ChunkTag::Vp8l => {
                if state.animated().is_some() {
                    return Err(Error::UnexpectedChunk {
                        tag: chunk.tag,
                        reason: "image data outside ANMF in an animated file",
                    });
                }
                let image = ImageHeader::parse(&chunk)?;
                return match state.extended {
                    Some(header) => finish_still(header, image, state.seen_alph, options),
                    None => finish_simple(image, state.seen_alph, options),
                };
            }
            ChunkTag::Alph => state.seen_alph = true,
            ChunkTag::Anim => {
                if state.animated().is_none() {
                    return Err(Error::UnexpectedChunk {
                        tag: chunk.tag,
                        reason: "animation flag not set",
                    });
                }
                if state.anim.is_some() {
                    return Err(Error::UnexpectedChunk {
                        tag: chunk.tag,
                        reason: "duplicate ANIM",
                    });
                }
                state.anim = Some(AnimParams::parse(chunk.payload)?);
            }
            ChunkTag::Anmf => {
                let Some(canvas) = state.animated() else {
                    return Err(Error::UnexpectedChunk {
                        tag: chunk.tag,
                        reason: "animation flag not set",
                    });
                };
                if state.anim.is_none() {
                    return Err(Error::UnexpectedChunk {
                        tag: chunk.tag,
                        reason: "ANMF before ANIM",
                    });
                }
                state.frames += 1;
                if let Some(limit) = options.max_frames {
                    if state.frames > limit {
                        return Err(Error::FrameLimitExceeded { limit });
                    }
                }
                state.seen_alph |= check_frame(&chunk, &canvas, state.frames)?;
            }
            ChunkTag::Unknown(_) => {
                trace!(tag = %chunk.tag, "skipping chunk");
                continue;
            }
        }
        state.seen_known = true;
    }

    match (state.animated(), state.anim) {
        (Some(header), Some(anim)) if state.frames > 0 => Ok(WebpInfo {
            width: header.canvas_width,
            height: header.canvas_height,
            has_alpha: header.features.alpha || state.seen_alph,
            is_animated: true,
            num_frames: state.frames,
            format: BitstreamFormat::Extended,
            features: header.features,
            loop_count: Some(anim.loop_count),
            background_color: Some(anim.background_color),
        }),
        (Some(_), _) => Err(Error::AnimatedWithoutFrames),
        (None, _) => Err(Error::MissingImageChunk { frame: None }),
    }
}

fn finish_simple(
    image: ImageHeader,
    seen_alph: bool,
    options: &ValidateOptions,
) -> Result<WebpInfo, Error> {
    let (width, height) = image.dimensions();
    check_dimensions(width, height, options)?;

    let format = match image {
        ImageHeader::Lossy(_) => BitstreamFormat::Lossy,
        ImageHeader::Lossless(_) => BitstreamFormat::Lossless,
    };

    Ok(WebpInfo {
        width,
        height,
        has_alpha: image.alpha_is_used() || seen_alph,
        is_animated: false,
        num_frames: 0,
        format,
        features: Default::default(),
        loop_count: None,
        background_color: None,
    })
}

fn finish_still(
    header: Vp8xHeader,
    image: ImageHeader,
    seen_alph: bool,
    options: &ValidateOptions,
) -> Result<WebpInfo, Error> {
    let (width, height) = image.dimensions();
    check_dimensions(width, height, options)?;
    if (width, height) != (header.canvas_width, header.canvas_height) {
        return Err(Error::CanvasMismatch {
            width,
            height,
            canvas_width: header.canvas_width,
            canvas_height: header.canvas_height,
        });
    }

    Ok(WebpInfo {
        width,
        height,
        has_alpha: header.features.alpha || seen_alph || image.alpha_is_used(),
        is_animated: false,
        num_frames: 0,
        format: BitstreamFormat::Extended,
        features: header.features,
        loop_count: None,
        background_color: None,
    })
}

/// Validates one `ANMF` chunk and its nested bitstream. Returns whether the
/// frame carries alpha.
fn check_frame(chunk: &Chunk<'_>, canvas: &Vp8xHeader, index: u32) -> Result<bool, Error> {
    let frame = FrameHeader::parse(chunk.payload)?;
    if frame.x_offset + frame.width > canvas.canvas_width
        || frame.y_offset + frame.height > canvas.canvas_height
    {
        return Err(Error::CorruptAnimation(format!(
            "frame {index} at ({}, {}) size {}x{} exceeds canvas {}x{}",
            frame.x_offset,
            frame.y_offset,
            frame.width,
            frame.height,
            canvas.canvas_width,
            canvas.canvas_height
        )));
    }
    trace!(
        index,
        x = frame.x_offset,
        y = frame.y_offset,
        width = frame.width,
        height = frame.height,
        duration_ms = frame.duration_ms,
        dispose_to_background = frame.dispose_to_background,
        blend = frame.blend,
        "frame"
    );

    let nested = ChunkReader::with_base(
        &chunk.payload[ANMF_HEADER_SIZE..],
        chunk.payload_offset() + ANMF_HEADER_SIZE,
    );
    let mut has_alpha = false;
    for sub in nested {
        let sub = sub?;
        match sub.tag {
            ChunkTag::Alph => has_alpha = true,
            ChunkTag::Vp8 | ChunkTag::Vp8l => {
                let image = ImageHeader::parse(&sub)?;
                let (width, height) = image.dimensions();
                if (width, height) != (frame.width, frame.height) {
                    return Err(Error::CorruptAnimation(format!(
                        "frame {index} bitstream is {width}x{height}, frame declares {}x{}",
                        frame.width, frame.height
                    )));
                }
                return Ok(has_alpha || image.alpha_is_used());
            }
            _ => trace!(tag = %sub.tag, index, "skipping frame sub-chunk"),
        }
    }

    Err(Error::MissingImageChunk { frame: Some(index) })
}
