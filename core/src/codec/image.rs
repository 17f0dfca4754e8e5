//! Image decoding primitives and the JPEG encoder.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, anyhow, ensure};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder as _, ImageFormat, ImageReader, RgbaImage,
};
use moxcms::{CmsError, ColorProfile, Layout, TransformOptions};
use tracing::warn;

use crate::types::{ImageDimensions, SourceImage};

use super::Result;

/// RGBA pixel buffer returned by the primary image decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub dimensions: ImageDimensions,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Returns the width of the decoded image in pixels.
    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Returns the height of the decoded image in pixels.
    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Returns a reference to the raw RGBA8888 pixel buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Decode the primary frame of a source image into an RGBA buffer.
///
/// The container format is sniffed from the magic bytes. Only when the content is not recognised
/// does the MIME type, then the file extension, decide. EXIF orientation is applied and
/// embedded ICC profiles are converted to sRGB, so the returned dimensions are the displayed ones.
pub fn decode_primary(source: &SourceImage) -> Result<DecodedImage> {
    let data = source.bytes();
    if data.is_empty() {
        return Err(anyhow!("empty image data for {:?}", source.name()));
    }

    let mut reader =
        ImageReader::new(Cursor::new(data)).with_guessed_format().context("guessing image format")?;
    if reader.format().is_none() {
        if let Some(format) = infer_format(source) {
            reader.set_format(format);
        }
    }

    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("constructing decoder for image {:?}", source.name()))?;

    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let icc_profile = decoder.icc_profile().unwrap_or(None);

    let mut image = DynamicImage::from_decoder(decoder)
        .with_context(|| format!("decoding image {:?}", source.name()))?;

    apply_orientation(&mut image, orientation);

    let mut rgba = image.into_rgba8();

    if let Some(profile) = icc_profile {
        if let Err(err) = convert_to_srgb_in_place(&mut rgba, &profile) {
            warn!(
                target: "codec::image",
                "failed to convert ICC profile for {:?}: {err}",
                source.name()
            );
        }
    }

    let dimensions = ImageDimensions { width: rgba.width(), height: rgba.height() };
    ensure!(!dimensions.is_empty(), "decoded image {:?} has zero dimensions", source.name());
    let pixels = rgba.into_raw();

    Ok(DecodedImage { dimensions, pixels })
}

/// Encode an RGBA frame as baseline JPEG. Alpha is dropped since JPEG has no alpha channel.
pub fn encode_jpeg(image: &DecodedImage, quality: f32) -> Result<Vec<u8>> {
    let ImageDimensions { width, height } = image.dimensions;
    ensure!(width > 0 && height > 0, "cannot encode an image with zero dimensions");

    let rgba = RgbaImage::from_raw(width, height, image.pixels().to_vec())
        .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;
    let rgb = DynamicImage::ImageRgba8(rgba).into_rgb8();

    let mut buffer = Vec::new();
    {
        let mut encoder =
            JpegEncoder::new_with_quality(Cursor::new(&mut buffer), jpeg_quality(quality));
        encoder
            .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            .with_context(|| format!("encoding {width}x{height} jpeg"))?;
    }

    Ok(buffer)
}

/// Map a `(0, 1]` encode quality onto the encoder's 1..=100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 100;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

fn infer_format(source: &SourceImage) -> Option<ImageFormat> {
    ImageFormat::from_mime_type(source.mime()).or_else(|| {
        Path::new(source.name())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .and_then(|ext| ImageFormat::from_extension(&ext))
    })
}

fn apply_orientation(image: &mut DynamicImage, orientation: Orientation) {
    if orientation != Orientation::NoTransforms {
        image.apply_orientation(orientation);
    }
}

fn convert_to_srgb_in_place(image: &mut RgbaImage, profile_bytes: &[u8]) -> Result<()> {
    let src_profile = ColorProfile::new_from_slice(profile_bytes)
        .map_err(|err| anyhow!("invalid ICC profile: {err}"))?;
    let dest_profile = ColorProfile::new_srgb();
    let (width, height) = image.dimensions();
    let raw = image.as_mut();

    match src_profile.create_transform_8bit(
        Layout::Rgba,
        &dest_profile,
        Layout::Rgba,
        TransformOptions::default(),
    ) {
        Ok(transform) => {
            let mut dst = vec![0u8; raw.len()];
            let raw_slice: &[u8] = &raw[..];
            transform
                .transform(raw_slice, &mut dst)
                .map_err(|err| anyhow!("icc transform failed: {err}"))?;
            raw.copy_from_slice(&dst);
            Ok(())
        }
        Err(CmsError::InvalidLayout) => {
            let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
            for px in raw.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
            }
            let mut dst_rgb = vec![0u8; rgb.len()];
            let transform = src_profile.create_transform_8bit(
                Layout::Rgb,
                &dest_profile,
                Layout::Rgb,
                TransformOptions::default(),
            )?;
            transform
                .transform(&rgb, &mut dst_rgb)
                .map_err(|err| anyhow!("icc transform failed: {err}"))?;
            for (rgba_px, rgb_px) in raw.chunks_exact_mut(4).zip(dst_rgb.chunks_exact(3)) {
                rgba_px[0..3].copy_from_slice(rgb_px);
            }
            Ok(())
        }
        Err(err) => Err(anyhow!("icc transform setup failed: {err}")),
    }
}
