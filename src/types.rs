use crate::chunk::ChunkTag;

/// Largest canvas width or height the WebP format can carry in a bitstream header.
pub const MAX_DIMENSION: u32 = 16384;

/// Broad category of a validation failure.
///
/// Callers that only need to branch on the failure class can match on this
/// instead of the full [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The envelope tags do not identify a RIFF/WebP file.
    Format,
    /// A declared size runs past the available bytes.
    Truncation,
    /// A bitstream or chunk payload header is corrupt.
    Bitstream,
    /// The chunks are individually well formed but do not fit together.
    Consistency,
    /// A dimension or count is outside the accepted range.
    Range,
    /// The input could not be loaded.
    Io,
    /// The caller passed an unusable argument across the C boundary.
    InvalidArgument,
}

/// Represents errors that can occur while validating a WebP container.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The first four bytes are not `RIFF`.
    #[error("not a WebP file: missing RIFF signature")]
    NotRiff,
    /// Bytes 8..12 are not `WEBP`.
    #[error("not a WebP file: missing WEBP signature")]
    NotWebp,
    /// The buffer is shorter than the RIFF header or its declared size.
    #[error("truncated RIFF header: {0}")]
    TruncatedHeader(String),
    /// Fewer than 8 bytes remain where a chunk header should start.
    #[error("truncated chunk header at offset {offset}: {available} of 8 bytes available")]
    TruncatedChunkHeader {
        /// Byte offset where the header would start.
        offset: usize,
        /// Bytes left in the region.
        available: usize,
    },
    /// A chunk payload runs past the end of the region that holds it.
    #[error("truncated {tag} chunk at offset {offset}: declared {size} bytes, {available} available")]
    TruncatedChunk {
        /// Tag of the offending chunk.
        tag: ChunkTag,
        /// Byte offset of the chunk header.
        offset: usize,
        /// Declared payload size.
        size: u64,
        /// Bytes actually available for the payload.
        available: u64,
    },
    /// The declared chunk size is too small for the header it must carry.
    #[error("truncated {tag} payload: {size} bytes, need {need}")]
    TruncatedPayload {
        tag: ChunkTag,
        /// Declared payload size.
        size: usize,
        /// Bytes the fixed header (and, for `VP8 `, the first partition) requires.
        need: usize,
    },
    /// The lossy bitstream header is malformed.
    #[error("corrupt VP8 bitstream header: {0}")]
    CorruptVp8(String),
    /// The lossless bitstream header is malformed.
    #[error("corrupt VP8L bitstream header: {0}")]
    CorruptVp8l(String),
    /// An `ANMF` frame does not fit its canvas or its bitstream.
    #[error("corrupt animation chunk: {0}")]
    CorruptAnimation(String),
    /// The animation flag is set but no frame chunk was found.
    #[error("animated flag set but no frames")]
    AnimatedWithoutFrames,
    /// No `VP8 `/`VP8L` chunk was found where one is required.
    #[error("missing image data chunk{}", frame_suffix(.frame))]
    MissingImageChunk {
        /// 1-based index of the animation frame, or `None` at the top level.
        frame: Option<u32>,
    },
    /// A chunk appeared where the container layout does not allow it.
    #[error("unexpected {tag} chunk: {reason}")]
    UnexpectedChunk {
        /// Tag of the misplaced chunk.
        tag: ChunkTag,
        /// Why it is not allowed here.
        reason: &'static str,
    },
    /// The bitstream dimensions disagree with the declared canvas.
    #[error("image {width}x{height} does not match canvas {canvas_width}x{canvas_height}")]
    CanvasMismatch {
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },
    /// Width or height is zero or above the accepted maximum.
    #[error("dimension out of range: {width}x{height} (allowed 1..={max_width} x 1..={max_height})")]
    DimensionOutOfRange {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    /// More animation frames than the configured limit.
    #[error("frame limit exceeded: more than {limit} frames")]
    FrameLimitExceeded {
        /// The configured limit.
        limit: u32,
    },
    /// The specified file could not be found.
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// An I/O error occurred while reading the input.
    #[error("I/O error: {0}")]
    Io(String),
    /// A required pointer argument was null.
    #[error("{0} pointer is null")]
    NullPointer(&'static str),
    /// A path handed across the C boundary could not be used.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl Error {
    /// Returns the failure category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotRiff | Error::NotWebp => ErrorKind::Format,
            Error::TruncatedHeader(_)
            | Error::TruncatedChunkHeader { .. }
            | Error::TruncatedChunk { .. }
            | Error::TruncatedPayload { .. } => ErrorKind::Truncation,
            Error::CorruptVp8(_)
            | Error::CorruptVp8l(_)
            | Error::CorruptAnimation(_) => ErrorKind::Bitstream,
            Error::AnimatedWithoutFrames
            | Error::MissingImageChunk { .. }
            | Error::UnexpectedChunk { .. }
            | Error::CanvasMismatch { .. } => ErrorKind::Consistency,
            Error::DimensionOutOfRange { .. } | Error::FrameLimitExceeded { .. } => {
                ErrorKind::Range
            }
            Error::FileNotFound(_) | Error::Io(_) => ErrorKind::Io,
            Error::NullPointer(_) | Error::InvalidPath(_) => ErrorKind::InvalidArgument,
        }
    }
}

fn frame_suffix(frame: &Option<u32>) -> String {
    frame.map_or_else(String::new, |index| format!(" in animation frame {index}"))
}

/// The bitstream layout a validated file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitstreamFormat {
    /// Simple file with a single `VP8 ` chunk.
    Lossy,
    /// Simple file with a single `VP8L` chunk.
    Lossless,
    /// File with a `VP8X` extended header.
    Extended,
}

/// Feature bits declared in the `VP8X` flag byte.
///
/// All fields are `false` for simple (non-extended) files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeatureFlags {
    /// An `ICCP` color profile chunk is declared.
    pub icc_profile: bool,
    /// Some image data carries alpha.
    pub alpha: bool,
    /// An `EXIF` metadata chunk is declared.
    pub exif: bool,
    /// An `XMP ` metadata chunk is declared.
    pub xmp: bool,
    /// The file is an animation.
    pub animation: bool,
}

/// How many times an animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopCount {
    /// Loop forever (stored as 0).
    Forever,
    /// Play the given number of times.
    Times(u16),
}

/// Metadata extracted from a structurally valid WebP file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebpInfo {
    /// Canvas width in pixels, in `1..=16384`.
    pub width: u32,
    /// Canvas height in pixels, in `1..=16384`.
    pub height: u32,
    /// An alpha channel is declared anywhere in the file.
    pub has_alpha: bool,
    /// The file is an animation.
    pub is_animated: bool,
    /// Number of `ANMF` frames; 0 for still images.
    pub num_frames: u32,
    /// Simple lossy, simple lossless or extended layout.
    pub format: BitstreamFormat,
    /// Decoded `VP8X` flags.
    pub features: FeatureFlags,
    /// Loop count from the `ANIM` chunk.
    pub loop_count: Option<LoopCount>,
    /// Background color from the `ANIM` chunk, in B, G, R, A order.
    pub background_color: Option<[u8; 4]>,
}

/// Flat validation outcome, mirroring the C ABI struct field for field.
///
/// `error` is `Some` exactly when `is_valid` is `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub is_animated: bool,
    pub num_frames: u32,
    pub error: Option<String>,
}

impl ValidationResult {
    /// Builds an invalid result carrying the error's message.
    pub fn invalid(error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

impl From<&WebpInfo> for ValidationResult {
    fn from(info: &WebpInfo) -> Self {
        Self {
            is_valid: true,
            width: info.width,
            height: info.height,
            has_alpha: info.has_alpha,
            is_animated: info.is_animated,
            num_frames: info.num_frames,
            error: None,
        }
    }
}

impl From<Result<WebpInfo, Error>> for ValidationResult {
    fn from(result: Result<WebpInfo, Error>) -> Self {
        match result {
            Ok(info) => Self::from(&info),
            Err(e) => Self::invalid(&e),
        }
    }
}

/// Options controlling validation limits.
///
/// The defaults accept everything the WebP format can represent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Maximum accepted canvas width. Values above 16384 are treated as 16384.
    /// Defaults to 16384.
    pub max_width: u32,

    /// Maximum accepted canvas height. Values above 16384 are treated as 16384.
    /// Defaults to 16384.
    pub max_height: u32,

    /// Optional cap on the number of animation frames.
    /// Defaults to `None` (no cap).
    pub max_frames: Option<u32>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
            max_frames: None,
        }
    }
}

impl ValidateOptions {
    pub(crate) fn width_limit(&self) -> u32 {
        self.max_width.min(MAX_DIMENSION)
    }

    pub(crate) fn height_limit(&self) -> u32 {
        self.max_height.min(MAX_DIMENSION)
    }
}
