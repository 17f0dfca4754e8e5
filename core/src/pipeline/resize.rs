//! High-quality image resampling built on top of `fast_image_resize`.

use anyhow::{anyhow, ensure};
use fast_image_resize as fir;
use serde::{Deserialize, Serialize};

use crate::codec::DecodedImage;
use crate::pipeline::geometry::SampleRect;
use crate::types::ImageDimensions;

use super::Result;

/// Filtering kernels supported by the resizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizeFilter {
    /// Fastest option, mostly useful for tests or diagnostic paths.
    Nearest,
    /// Box filter, behaves like area averaging when downscaling.
    Box,
    /// Bilinear interpolation.
    Bilinear,
    /// Hamming filter offering slightly sharper results than bilinear.
    Hamming,
    /// Catmull-Rom bicubic interpolation (aka Cubic Hermite spline).
    CatmullRom,
    /// Mitchell–Netravali bicubic interpolation.
    Mitchell,
    /// Lanczos3 filter (default) for high quality down/up scaling.
    #[default]
    Lanczos3,
}

impl From<ResizeFilter> for fir::ResizeAlg {
    fn from(value: ResizeFilter) -> Self {
        use fir::FilterType;
        match value {
            ResizeFilter::Nearest => fir::ResizeAlg::Nearest,
            ResizeFilter::Box => fir::ResizeAlg::Convolution(FilterType::Box),
            ResizeFilter::Bilinear => fir::ResizeAlg::Convolution(FilterType::Bilinear),
            ResizeFilter::Hamming => fir::ResizeAlg::Convolution(FilterType::Hamming),
            ResizeFilter::CatmullRom => fir::ResizeAlg::Convolution(FilterType::CatmullRom),
            ResizeFilter::Mitchell => fir::ResizeAlg::Convolution(FilterType::Mitchell),
            ResizeFilter::Lanczos3 => fir::ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// Settings passed to [`resize_rgba`].
#[derive(Debug, Clone, Copy)]
pub struct ResizeSettings {
    pub target: ImageDimensions,
    pub filter: ResizeFilter,
    /// Source region to sample; `None` samples the whole image.
    pub sample: Option<SampleRect>,
}

impl ResizeSettings {
    pub fn new(target: ImageDimensions) -> Self {
        Self { target, filter: ResizeFilter::default(), sample: None }
    }

    pub fn filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sample(mut self, sample: SampleRect) -> Self {
        self.sample = Some(sample);
        self
    }
}

/// Result of a resize operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizedImage {
    pub dimensions: ImageDimensions,
    pub pixels: Vec<u8>,
}

impl ResizedImage {
    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume and convert into a [`DecodedImage`].
    pub fn into_decoded(self) -> DecodedImage {
        DecodedImage { dimensions: self.dimensions, pixels: self.pixels }
    }
}

/// Resample an RGBA8888 frame, optionally from a sub-rectangle, into the target dimensions.
pub fn resize_rgba(source: &DecodedImage, settings: ResizeSettings) -> Result<ResizedImage> {
    let src_width = source.width();
    let src_height = source.height();
    ensure!(src_width > 0 && src_height > 0, "source image has zero dimensions");

    let dst_width = settings.target.width;
    let dst_height = settings.target.height;
    ensure!(dst_width > 0 && dst_height > 0, "target dimensions must be non-zero");

    let sample = settings
        .sample
        .map(|rect| rect.clamp_to(source.dimensions))
        .filter(|rect| !rect.is_full(source.dimensions));
    if let Some(rect) = sample {
        ensure!(rect.width > 0.0 && rect.height > 0.0, "sample rectangle is empty");
    }

    if sample.is_none() && src_width == dst_width && src_height == dst_height {
        return Ok(ResizedImage { dimensions: settings.target, pixels: source.pixels().to_vec() });
    }

    let src_pixels = source.pixels();
    ensure!(
        src_pixels.len() >= (src_width as usize * src_height as usize * 4),
        "source buffer is smaller than expected"
    );

    let src_view =
        fir::images::ImageRef::new(src_width, src_height, src_pixels, fir::PixelType::U8x4)
            .map_err(|err| anyhow!("failed to prepare source image: {err}"))?;

    let mut dst_image = fir::images::Image::new(dst_width, dst_height, fir::PixelType::U8x4);

    let mut options = fir::ResizeOptions::new().resize_alg(settings.filter.into()).use_alpha(true);
    if let Some(rect) = sample {
        options = options.crop(rect.x, rect.y, rect.width, rect.height);
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| anyhow!("fast image resize failed: {err}"))?;

    Ok(ResizedImage { dimensions: settings.target, pixels: dst_image.into_vec() })
}
