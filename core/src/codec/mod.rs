//! Image decoding and encoding collaborators.

pub mod image;

pub use image::{DecodedImage, decode_primary, encode_jpeg, jpeg_quality};

use crate::types::SourceImage;

pub type Result<T> = crate::Result<T>;

/// Decode/encode capability consumed by the transform engine.
///
/// Implementations must be pure with respect to shared state: one call decodes or encodes one
/// image and nothing else.
pub trait ImageCodec {
    /// Decode raw source bytes into a straight-alpha RGBA8888 buffer.
    fn decode(&self, source: &SourceImage) -> Result<DecodedImage>;

    /// Lossy-encode an RGBA8888 buffer at `quality` in `(0, 1]`, where `1.0` is best.
    fn encode(&self, image: &DecodedImage, quality: f32) -> Result<Vec<u8>>;
}

/// Default codec: decodes anything the `image` crate understands and writes baseline JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn decode(&self, source: &SourceImage) -> Result<DecodedImage> {
        decode_primary(source)
    }

    fn encode(&self, image: &DecodedImage, quality: f32) -> Result<Vec<u8>> {
        encode_jpeg(image, quality)
    }
}

impl<C: ImageCodec + ?Sized> ImageCodec for &C {
    fn decode(&self, source: &SourceImage) -> Result<DecodedImage> {
        (**self).decode(source)
    }

    fn encode(&self, image: &DecodedImage, quality: f32) -> Result<Vec<u8>> {
        (**self).encode(image, quality)
    }
}
