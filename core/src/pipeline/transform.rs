//! The transform engine: decode, resample according to a [`GeometryPlan`], re-encode.

use anyhow::anyhow;
use tracing::debug;

use crate::codec::{DecodedImage, ImageCodec, JpegCodec};
use crate::error::BatchError;
use crate::pipeline::geometry::{self, GeometryPlan, ModeSettings};
use crate::pipeline::resize::{ResizeFilter, ResizeSettings, resize_rgba};
use crate::types::{ImageDimensions, SourceImage};

/// Largest side a baseline JPEG can carry.
pub const MAX_OUTPUT_EDGE: u32 = 65_535;

/// Encoded output of a single transform.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub dimensions: ImageDimensions,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("dimensions", &self.dimensions)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Applies geometry plans to decoded images using a codec collaborator.
#[derive(Debug, Clone)]
pub struct TransformEngine<C = JpegCodec> {
    codec: C,
    filter: ResizeFilter,
}

impl Default for TransformEngine<JpegCodec> {
    fn default() -> Self {
        Self::new(JpegCodec)
    }
}

impl<C: ImageCodec> TransformEngine<C> {
    pub fn new(codec: C) -> Self {
        Self { codec, filter: ResizeFilter::default() }
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Decode a source image through the codec.
    pub fn decode(&self, source: &SourceImage) -> Result<DecodedImage, BatchError> {
        self.codec.decode(source).map_err(BatchError::CodecFailure)
    }

    /// Plan one decoded image under settings the caller has already validated.
    pub(crate) fn plan(
        &self,
        source: &SourceImage,
        decoded: &DecodedImage,
        settings: &ModeSettings,
    ) -> Result<GeometryPlan, BatchError> {
        let plan = geometry::plan_validated(decoded.dimensions, settings)?;
        debug!(
            target: "pipeline::transform",
            name = %source.name(),
            src_w = decoded.width(),
            src_h = decoded.height(),
            out_w = plan.output.width,
            out_h = plan.output.height,
            quality = plan.encode_quality,
            "planned transform"
        );
        Ok(plan)
    }

    /// Resample `decoded` into the plan's output box and encode it at the plan's quality.
    ///
    /// Plans the encoder can never write (a side above [`MAX_OUTPUT_EDGE`]) fail before any
    /// pixel buffer is allocated.
    pub fn render(
        &self,
        decoded: &DecodedImage,
        plan: &GeometryPlan,
    ) -> Result<EncodedImage, BatchError> {
        ensure_encodable(plan.output)?;

        let settings = ResizeSettings::new(plan.output).filter(self.filter).sample(plan.sample);
        let resized = resize_rgba(decoded, settings).map_err(BatchError::CodecFailure)?;

        let frame = resized.into_decoded();
        let bytes =
            self.codec.encode(&frame, plan.encode_quality).map_err(BatchError::CodecFailure)?;
        if bytes.is_empty() {
            return Err(BatchError::CodecFailure(anyhow!("encoder returned no data")));
        }

        Ok(EncodedImage { dimensions: plan.output, bytes })
    }

    /// Decode, plan and render one source image.
    pub fn transform(
        &self,
        source: &SourceImage,
        settings: &ModeSettings,
    ) -> Result<EncodedImage, BatchError> {
        geometry::validate(settings)?;
        let decoded = self.decode(source)?;
        let plan = self.plan(source, &decoded, settings)?;
        self.render(&decoded, &plan)
    }
}

fn ensure_encodable(output: ImageDimensions) -> Result<(), BatchError> {
    let ImageDimensions { width, height } = output;
    if width > MAX_OUTPUT_EDGE || height > MAX_OUTPUT_EDGE {
        return Err(BatchError::CodecFailure(anyhow!(
            "output {width}x{height} exceeds the {MAX_OUTPUT_EDGE}px jpeg limit"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| {
            BatchError::CodecFailure(anyhow!("output {width}x{height} does not fit in memory"))
        })?;
    Ok(())
}
