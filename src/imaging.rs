//! Image decoding and JPEG re-encoding shared by the attachment store and
//! the report generator.

use image::{ImageResult, codecs::jpeg::JpegEncoder};

/// A baseline RGB JPEG together with its pixel dimensions.
#[derive(Clone, Debug)]
pub struct EncodedJpeg {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode any format the `image` crate understands and re-encode it as an
/// 8-bit RGB JPEG at `quality` (1..=100). Alpha is discarded.
pub fn encode_jpeg(source: &[u8], quality: u8) -> ImageResult<EncodedJpeg> {
    let decoded = image::load_from_memory(source)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(&rgb)?;

    Ok(EncodedJpeg {
        bytes,
        width,
        height,
    })
}

/// Fully decode `source` to confirm it is a readable image, returning its
/// dimensions. Fails on corrupt data.
pub fn probe_dimensions(source: &[u8]) -> ImageResult<(u32, u32)> {
    let decoded = image::load_from_memory(source)?;
    Ok((decoded.width(), decoded.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_png;

    #[test]
    fn png_is_reencoded_as_jpeg_with_same_dimensions() {
        let encoded = encode_jpeg(&sample_png(200, 100), 80).unwrap();

        assert_eq!((encoded.width, encoded.height), (200, 100));
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(probe_dimensions(&encoded.bytes).unwrap(), (200, 100));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(encode_jpeg(b"definitely not an image", 80).is_err());
        assert!(probe_dimensions(b"\xFF\xD8 truncated").is_err());
    }
}
