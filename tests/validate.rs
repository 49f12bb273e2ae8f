use image::{ExtendedColorType, ImageEncoder, codecs::webp::WebPEncoder};
use std::fs;
use std::io::Cursor;
use webp_validator::{
    BitstreamFormat, ChunkReader, ChunkTag, Error, ErrorKind, FeatureFlags, LoopCount, MAX_DIMENSION,
    RIFF_HEADER_SIZE, ValidateOptions, WebpInfo, validate, validate_file, validate_from_reader,
    validate_webp,
};

fn riff(chunks: &[u8]) -> Vec<u8> {
    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(chunks.len() as u32 + 4).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(chunks);
    out
}

fn chunk(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = fourcc.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

// Key frame header with an 8-byte first partition; the partition bytes are filler.
fn vp8(width: u16, height: u16) -> Vec<u8> {
    let partition_size: u32 = 8;
    let tag = (partition_size << 5) | (1 << 4);
    let mut payload = tag.to_le_bytes()[..3].to_vec();
    payload.extend_from_slice(&[0x9d, 0x01, 0x2a]);
    payload.extend_from_slice(&width.to_le_bytes());
    payload.extend_from_slice(&height.to_le_bytes());
    payload.extend_from_slice(&[0xa5; 8]);
    chunk(b"VP8 ", &payload)
}

fn vp8l(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let bits = (width - 1) | ((height - 1) << 14) | (u32::from(alpha) << 28);
    let mut payload = vec![0x2f];
    payload.extend_from_slice(&bits.to_le_bytes());
    payload.extend_from_slice(&[0x11; 6]);
    chunk(b"VP8L", &payload)
}

fn vp8x(flags: u8, width: u32, height: u32) -> Vec<u8> {
    let mut payload = vec![flags, 0, 0, 0];
    payload.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    payload.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    chunk(b"VP8X", &payload)
}

fn anim(loop_count: u16) -> Vec<u8> {
    let mut payload = vec![0xff, 0xff, 0xff, 0xff];
    payload.extend_from_slice(&loop_count.to_le_bytes());
    chunk(b"ANIM", &payload)
}

fn anmf(width: u32, height: u32, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    for value in [0, 0, width - 1, height - 1, 100] {
        payload.extend_from_slice(&value.to_le_bytes()[..3]);
    }
    payload.push(0);
    payload.extend_from_slice(body);
    chunk(b"ANMF", &payload)
}

fn lossy_800x600() -> Vec<u8> {
    riff(&vp8(800, 600))
}

fn lossless_alpha() -> Vec<u8> {
    riff(&vp8l(64, 48, true))
}

fn extended_lossy_with_alpha() -> Vec<u8> {
    riff(&[vp8x(0x10, 320, 240), chunk(b"ALPH", &[0; 7]), vp8(320, 240), chunk(b"EXIF", b"Exif")].concat())
}

fn animated(frames: usize) -> Vec<u8> {
    let mut chunks = [vp8x(0x02, 100, 80), anim(0)].concat();
    for i in 0..frames {
        let body = if i % 2 == 0 {
            vp8(100, 80)
        } else {
            [chunk(b"ALPH", &[0; 3]), vp8(100, 80)].concat()
        };
        chunks.extend(anmf(100, 80, &body));
    }
    riff(&chunks)
}

fn fixtures() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("lossy", lossy_800x600()),
        ("lossless", lossless_alpha()),
        ("extended", extended_lossy_with_alpha()),
        ("animated", animated(5)),
    ]
}

fn assert_in_range(info: &WebpInfo) {
    assert!((1..=MAX_DIMENSION).contains(&info.width), "width {}", info.width);
    assert!((1..=MAX_DIMENSION).contains(&info.height), "height {}", info.height);
    if !info.is_animated {
        assert_eq!(info.num_frames, 0);
    }
}

#[test]
fn test_fixtures_are_valid() {
    for (name, data) in fixtures() {
        let result = validate_webp(&data);
        assert!(result.is_ok(), "{} should validate: {:?}", name, result.err());
        assert_in_range(&result.unwrap());
    }
}

#[test]
fn test_short_buffers() {
    let full = lossy_800x600();
    for len in 0..RIFF_HEADER_SIZE {
        let data = &full[..len];
        let result = validate(data);
        assert!(!result.is_valid);
        assert!(result.error.as_deref().unwrap().contains("truncated RIFF header"));
        assert_eq!(validate_webp(data).unwrap_err().kind(), ErrorKind::Truncation);
    }
}

#[test]
fn test_lossy_800x600() {
    let result = validate(&lossy_800x600());
    assert!(result.is_valid);
    assert_eq!((result.width, result.height), (800, 600));
    assert!(!result.has_alpha);
    assert!(!result.is_animated);
    assert_eq!(result.num_frames, 0);
    assert_eq!(result.error, None);

    let info = validate_webp(&lossy_800x600()).unwrap();
    assert_eq!(info.format, BitstreamFormat::Lossy);
    assert_eq!(info.features, FeatureFlags::default());
}

#[test]
fn test_lossless_alpha_bit() {
    let info = validate_webp(&lossless_alpha()).unwrap();
    assert_eq!(info.format, BitstreamFormat::Lossless);
    assert_eq!((info.width, info.height), (64, 48));
    assert!(info.has_alpha);

    let opaque = validate_webp(&riff(&vp8l(64, 48, false))).unwrap();
    assert!(!opaque.has_alpha);
}

#[test]
fn test_extended_still() {
    let info = validate_webp(&extended_lossy_with_alpha()).unwrap();
    assert_eq!(info.format, BitstreamFormat::Extended);
    assert_eq!((info.width, info.height), (320, 240));
    assert!(info.has_alpha);
    assert!(info.features.alpha);
    assert!(!info.is_animated);
    assert_eq!(info.num_frames, 0);
}

#[test]
fn test_animated_five_frames() {
    let result = validate(&animated(5));
    assert!(result.is_valid, "{:?}", result.error);
    assert!(result.is_animated);
    assert_eq!(result.num_frames, 5);
    assert_eq!((result.width, result.height), (100, 80));
    assert!(result.has_alpha);

    let info = validate_webp(&animated(5)).unwrap();
    assert_eq!(info.loop_count, Some(LoopCount::Forever));
    assert_eq!(info.background_color, Some([0xff; 4]));
}

#[test]
fn test_animated_without_frames() {
    let result = validate(&animated(0));
    assert!(!result.is_valid);
    assert_eq!(result.error.as_deref(), Some("animated flag set but no frames"));

    let no_anim = riff(&vp8x(0x02, 100, 80));
    assert_eq!(validate_webp(&no_anim), Err(Error::AnimatedWithoutFrames));
}

#[test]
fn test_top_level_image_in_animation() {
    let data = riff(&[vp8x(0x02, 100, 80), anim(1), vp8(100, 80)].concat());
    assert_eq!(validate_webp(&data).unwrap_err().kind(), ErrorKind::Consistency);
}

#[test]
fn test_missing_image_chunk() {
    let data = riff(&[vp8x(0, 10, 10), chunk(b"ICCP", &[0; 20])].concat());
    let result = validate(&data);
    assert!(!result.is_valid);
    assert_eq!(result.error.as_deref(), Some("missing image data chunk"));
}

#[test]
fn test_not_webp() {
    let mut wave = lossy_800x600();
    wave[8..12].copy_from_slice(b"WAVE");
    assert_eq!(validate_webp(&wave), Err(Error::NotWebp));

    let jpeg = [0xff, 0xd8, 0xff, 0xe0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1, 1, 0];
    let err = validate_webp(&jpeg).unwrap_err();
    assert_eq!(err, Error::NotRiff);
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_corrupt_bitstreams() {
    let mut data = lossy_800x600();
    data[RIFF_HEADER_SIZE + 8 + 3] = 0x00;
    assert!(matches!(validate_webp(&data), Err(Error::CorruptVp8(_))));

    let mut data = lossless_alpha();
    data[RIFF_HEADER_SIZE + 8] = 0x2e;
    assert!(matches!(validate_webp(&data), Err(Error::CorruptVp8l(_))));

    let mut data = lossy_800x600();
    data[RIFF_HEADER_SIZE + 8] |= 0x01;
    let err = validate_webp(&data).unwrap_err();
    assert!(matches!(err, Error::CorruptVp8(_)));
    assert_eq!(err.kind(), ErrorKind::Bitstream);
}

#[test]
fn test_short_fixed_headers_are_truncation() {
    let data = riff(&[chunk(b"VP8X", &[0; 6]), vp8(10, 10)].concat());
    assert_eq!(
        validate_webp(&data),
        Err(Error::TruncatedPayload {
            tag: ChunkTag::Vp8x,
            size: 6,
            need: 10,
        })
    );

    let data = riff(&[vp8x(0x02, 8, 8), chunk(b"ANIM", &[0; 4])].concat());
    assert_eq!(validate_webp(&data).unwrap_err().kind(), ErrorKind::Truncation);

    let data = riff(&[vp8x(0x02, 8, 8), anim(0), chunk(b"ANMF", &[0; 12])].concat());
    assert!(matches!(
        validate_webp(&data),
        Err(Error::TruncatedPayload { tag: ChunkTag::Anmf, size: 12, need: 16 })
    ));

    let data = riff(&chunk(b"VP8L", &[0x2f, 0, 0]));
    assert_eq!(validate_webp(&data).unwrap_err().kind(), ErrorKind::Truncation);
}

#[test]
fn test_shrunk_vp8_size_is_truncation() {
    // Size field of the `VP8 ` chunk, which declares 18 bytes.
    let field = RIFF_HEADER_SIZE + 4;
    for byte in 0..4 {
        for bit in 0..8 {
            let mut data = lossy_800x600();
            data[field + byte] ^= 1 << bit;
            let err = validate_webp(&data).unwrap_err();
            assert_eq!(
                err.kind(),
                ErrorKind::Truncation,
                "byte {} bit {}: {}",
                byte,
                bit,
                err
            );
        }
    }

    let mut data = lossy_800x600();
    data[RIFF_HEADER_SIZE + 4] = 12;
    assert_eq!(
        validate_webp(&data),
        Err(Error::TruncatedPayload {
            tag: ChunkTag::Vp8,
            size: 12,
            need: 18,
        })
    );
}

#[test]
fn test_dimension_range() {
    let zero_width = riff(&vp8(0, 10));
    assert!(matches!(
        validate_webp(&zero_width),
        Err(Error::DimensionOutOfRange { width: 0, height: 10, .. })
    ));

    let huge_canvas = riff(&[vp8x(0, 20000, 10), vp8(10, 10)].concat());
    assert_eq!(validate_webp(&huge_canvas).unwrap_err().kind(), ErrorKind::Range);

    let max = riff(&vp8l(MAX_DIMENSION, MAX_DIMENSION, false));
    let info = validate_webp(&max).unwrap();
    assert_eq!((info.width, info.height), (16384, 16384));
}

#[test]
fn test_idempotent() {
    for (_, data) in fixtures() {
        assert_eq!(validate(&data), validate(&data));
    }
    let broken = animated(3);
    assert_eq!(validate(&broken[..100]), validate(&broken[..100]));
}

#[test]
fn test_truncated_prefixes() {
    for (name, data) in fixtures() {
        for len in 0..data.len() {
            let err = validate_webp(&data[..len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Truncation, "{} cut at {}: {}", name, len, err);
        }
    }
}

#[test]
fn test_truncated_chunk_inside_riff() {
    let mut data = animated(2);
    let len = data.len();
    // Shrink the RIFF size so the last frame no longer fits.
    let riff_size = (len - 8 - 10) as u32;
    data[4..8].copy_from_slice(&riff_size.to_le_bytes());
    let err = validate_webp(&data).unwrap_err();
    assert!(matches!(err, Error::TruncatedChunk { tag: ChunkTag::Anmf, .. }), "{}", err);
}

/// Offsets of every chunk size field, including chunks nested in ANMF frames.
fn size_field_offsets(data: &[u8]) -> Vec<usize> {
    fn walk(region: &[u8], base: usize, out: &mut Vec<usize>) {
        for chunk in ChunkReader::with_base(region, base) {
            let chunk = chunk.unwrap();
            out.push(chunk.offset + 4);
            if chunk.tag == ChunkTag::Anmf {
                walk(&chunk.payload[16..], chunk.payload_offset() + 16, out);
            }
        }
    }

    let mut out = vec![4];
    walk(&data[RIFF_HEADER_SIZE..], RIFF_HEADER_SIZE, &mut out);
    out
}

#[test]
fn test_size_field_mutations() {
    for (name, data) in fixtures() {
        let offsets = size_field_offsets(&data);
        assert!(offsets.len() >= 2, "{}", name);

        for &field in &offsets {
            for byte in 0..4 {
                for mask in [0x01u8, 0x02, 0x10, 0x80, 0xff] {
                    let mut mutated = data.clone();
                    mutated[field + byte] ^= mask;

                    match validate_webp(&mutated) {
                        Ok(info) => assert_in_range(&info),
                        Err(e) => assert_eq!(
                            e.kind(),
                            ErrorKind::Truncation,
                            "{} field {} byte {} mask {:#04x}: {}",
                            name,
                            field,
                            byte,
                            mask,
                            e
                        ),
                    }
                }
            }
        }
    }
}

#[test]
fn test_every_single_byte_flip_is_handled() {
    for (_, data) in fixtures() {
        for i in 0..data.len() {
            let mut mutated = data.clone();
            mutated[i] ^= 0xff;
            let result = validate(&mutated);
            assert_eq!(result.is_valid, result.error.is_none());
            if result.is_valid {
                assert!((1..=16384).contains(&result.width));
                assert!((1..=16384).contains(&result.height));
            } else {
                assert!(!result.error.unwrap().is_empty());
            }
        }
    }
}

#[test]
fn test_real_lossless_file() {
    let (width, height) = (37u32, 23u32);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let alpha = if (x + y) % 3 == 0 { 0 } else { 255 };
            pixels.extend_from_slice(&[(x * 6) as u8, (y * 11) as u8, 128, alpha]);
        }
    }

    let mut encoded = Vec::new();
    WebPEncoder::new_lossless(&mut encoded)
        .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
        .expect("failed to encode test image");

    let info = validate_webp(&encoded).unwrap();
    assert_eq!((info.width, info.height), (width, height));
    assert!(info.has_alpha);
    assert!(!info.is_animated);
    assert_eq!(info.num_frames, 0);
}

#[test]
fn test_validate_from_reader_and_file() {
    let data = animated(2);
    let options = ValidateOptions::default();

    let info = validate_from_reader(Cursor::new(&data), &options).unwrap();
    assert_eq!(info.num_frames, 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anim.webp");
    fs::write(&path, &data).unwrap();
    assert_eq!(validate_file(&path, &options).unwrap(), info);

    let err = validate_file(dir.path().join("missing.webp"), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(matches!(err, Error::FileNotFound(_)));
}
