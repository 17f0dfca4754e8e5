//! Output geometry and encode quality for each transform mode.
//!
//! Everything here is pure: given the decoded source dimensions and the batch-wide
//! [`ModeSettings`], [`plan`] yields the output size, the source rectangle to sample from, and
//! the quality to hand to the encoder.

use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::types::ImageDimensions;

/// Quality used by every mode that changes geometry.
pub const DEFAULT_ENCODE_QUALITY: f32 = 0.92;

/// Quality used by [`ModeSettings::QualityOnly`] when none, or an unusable one, was supplied.
pub const DEFAULT_RECOMPRESS_QUALITY: f32 = 0.7;

/// Named print boxes in their canonical orientation, `(name, width, height)`.
pub const PRINT_SIZES: &[(&str, u32, u32)] = &[
    ("4x6", 1200, 800),
    ("5x7", 1500, 2100),
    ("8x10", 2400, 3000),
    ("8x12", 2400, 3600),
    ("10x12", 3000, 3600),
    ("11x14", 3300, 4200),
    ("12x18", 3600, 5400),
    ("16x20", 4800, 6000),
    ("20x24", 4800, 6000),
];

/// The sizing strategy applied to every image in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformMode {
    Percentage,
    FixedDimension,
    PrintCover,
    QualityOnly,
}

/// Mode parameters shared by the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ModeSettings {
    /// Scale both axes by `factor` (`0.5` halves the image). Enlargement is allowed.
    Percentage { factor: f64 },
    /// Scale so the longest edge equals `target_long_edge`, keeping the aspect ratio.
    FixedDimension { target_long_edge: u32 },
    /// Cover-crop to the named print box from [`PRINT_SIZES`].
    PrintCover { print_size: String },
    /// Keep the dimensions and only re-encode.
    QualityOnly {
        #[serde(default)]
        quality: Option<f32>,
    },
}

impl Default for ModeSettings {
    fn default() -> Self {
        Self::QualityOnly { quality: None }
    }
}

impl ModeSettings {
    /// Percentage mode from a whole-number percentage, e.g. `percent(50)`.
    pub fn percent(percent: u32) -> Self {
        Self::Percentage { factor: f64::from(percent) / 100.0 }
    }

    pub fn fixed(target_long_edge: u32) -> Self {
        Self::FixedDimension { target_long_edge }
    }

    pub fn print(print_size: impl Into<String>) -> Self {
        Self::PrintCover { print_size: print_size.into() }
    }

    pub fn quality(quality: f32) -> Self {
        Self::QualityOnly { quality: Some(quality) }
    }

    pub fn mode(&self) -> TransformMode {
        match self {
            Self::Percentage { .. } => TransformMode::Percentage,
            Self::FixedDimension { .. } => TransformMode::FixedDimension,
            Self::PrintCover { .. } => TransformMode::PrintCover,
            Self::QualityOnly { .. } => TransformMode::QualityOnly,
        }
    }
}

/// A print box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrintBox {
    pub width: u32,
    pub height: u32,
}

impl PrintBox {
    /// Resolve a named print size such as `"4x6"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        PRINT_SIZES
            .iter()
            .find(|(candidate, _, _)| candidate.eq_ignore_ascii_case(name))
            .map(|&(_, width, height)| Self { width, height })
    }

    /// Swap the box so its orientation matches the source. Square sources keep it as given.
    pub fn oriented_to(self, source: ImageDimensions) -> Self {
        let landscape_source = source.width > source.height;
        let portrait_source = source.width < source.height;
        if (landscape_source && self.width < self.height)
            || (portrait_source && self.width > self.height)
        {
            Self { width: self.height, height: self.width }
        } else {
            self
        }
    }
}

/// Rectangle in source pixel space, fractional so cover crops stay exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SampleRect {
    pub fn full(source: ImageDimensions) -> Self {
        Self { x: 0.0, y: 0.0, width: f64::from(source.width), height: f64::from(source.height) }
    }

    /// Keep the rectangle inside `[0, w] x [0, h]`.
    pub fn clamp_to(self, source: ImageDimensions) -> Self {
        let max_w = f64::from(source.width);
        let max_h = f64::from(source.height);
        let x = self.x.clamp(0.0, max_w);
        let y = self.y.clamp(0.0, max_h);
        Self { x, y, width: self.width.min(max_w - x), height: self.height.min(max_h - y) }
    }

    pub fn is_full(&self, source: ImageDimensions) -> bool {
        *self == Self::full(source)
    }
}

/// Cover-crop parameters, expressed in the scaled image's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverCrop {
    pub ratio: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Everything the transform engine needs to render one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryPlan {
    pub output: ImageDimensions,
    pub sample: SampleRect,
    pub encode_quality: f32,
    pub cover: Option<CoverCrop>,
}

impl GeometryPlan {
    fn scaled(source: ImageDimensions, output: ImageDimensions) -> Self {
        Self {
            output,
            sample: SampleRect::full(source),
            encode_quality: DEFAULT_ENCODE_QUALITY,
            cover: None,
        }
    }
}

/// Check the settings without a source image. Batches call this once up front.
pub fn validate(settings: &ModeSettings) -> Result<(), BatchError> {
    match settings {
        ModeSettings::Percentage { factor } => {
            if !factor.is_finite() || *factor <= 0.0 {
                return Err(BatchError::invalid(format!(
                    "percentage factor must be positive, got {factor}"
                )));
            }
        }
        ModeSettings::FixedDimension { target_long_edge } => {
            if *target_long_edge == 0 {
                return Err(BatchError::invalid("target long edge must be positive"));
            }
        }
        ModeSettings::PrintCover { print_size } => {
            if PrintBox::from_name(print_size).is_none() {
                return Err(BatchError::invalid(format!("unknown print size {print_size:?}")));
            }
        }
        ModeSettings::QualityOnly { .. } => {}
    }
    Ok(())
}

/// Compute the plan for one source image.
pub fn plan(source: ImageDimensions, settings: &ModeSettings) -> Result<GeometryPlan, BatchError> {
    validate(settings)?;
    plan_validated(source, settings)
}

/// [`plan`] for settings that already passed [`validate`], once per batch.
pub(crate) fn plan_validated(
    source: ImageDimensions,
    settings: &ModeSettings,
) -> Result<GeometryPlan, BatchError> {
    if source.is_empty() {
        return Err(BatchError::invalid(format!(
            "source dimensions must be positive, got {}x{}",
            source.width, source.height
        )));
    }

    let plan = match settings {
        ModeSettings::Percentage { factor } => {
            GeometryPlan::scaled(source, scale_dimensions(source, *factor))
        }
        ModeSettings::FixedDimension { target_long_edge } => {
            let scale = f64::from(*target_long_edge) / f64::from(source.longest_edge());
            GeometryPlan::scaled(source, scale_dimensions(source, scale))
        }
        ModeSettings::PrintCover { print_size } => {
            let print = PrintBox::from_name(print_size)
                .ok_or_else(|| BatchError::invalid(format!("unknown print size {print_size:?}")))?;
            cover_plan(source, print)
        }
        ModeSettings::QualityOnly { quality } => GeometryPlan {
            output: source,
            sample: SampleRect::full(source),
            encode_quality: recompress_quality(*quality),
            cover: None,
        },
    };

    Ok(plan)
}

/// Quality for quality-only mode; falls back to [`DEFAULT_RECOMPRESS_QUALITY`].
pub fn recompress_quality(quality: Option<f32>) -> f32 {
    match quality {
        Some(q) if q.is_finite() && q > 0.0 && q <= 1.0 => q,
        _ => DEFAULT_RECOMPRESS_QUALITY,
    }
}

fn cover_plan(source: ImageDimensions, print: PrintBox) -> GeometryPlan {
    let target = print.oriented_to(source);
    let (w, h) = (f64::from(source.width), f64::from(source.height));
    let (tw, th) = (f64::from(target.width), f64::from(target.height));

    let ratio = (tw / w).max(th / h);
    let offset_x = (w * ratio - tw) / 2.0;
    let offset_y = (h * ratio - th) / 2.0;

    let sample =
        SampleRect { x: offset_x / ratio, y: offset_y / ratio, width: tw / ratio, height: th / ratio }
            .clamp_to(source);

    GeometryPlan {
        output: ImageDimensions { width: target.width, height: target.height },
        sample,
        encode_quality: DEFAULT_ENCODE_QUALITY,
        cover: Some(CoverCrop { ratio, offset_x, offset_y }),
    }
}

fn scale_dimensions(source: ImageDimensions, scale: f64) -> ImageDimensions {
    ImageDimensions {
        width: round_dimension(f64::from(source.width) * scale),
        height: round_dimension(f64::from(source.height) * scale),
    }
}

// Half away from zero; inputs are positive so this is round-half-up.
fn round_dimension(value: f64) -> u32 {
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> ImageDimensions {
        ImageDimensions { width, height }
    }

    #[test]
    fn percentage_rounds_half_up() {
        let plan = plan(dims(333, 101), &ModeSettings::percent(50)).unwrap();
        assert_eq!(plan.output, dims(167, 51));
        assert_eq!(plan.encode_quality, DEFAULT_ENCODE_QUALITY);
        assert!(plan.sample.is_full(dims(333, 101)));
    }

    #[test]
    fn percentage_allows_enlargement() {
        let plan = plan(dims(10, 20), &ModeSettings::Percentage { factor: 2.5 }).unwrap();
        assert_eq!(plan.output, dims(25, 50));
    }

    #[test]
    fn percentage_never_collapses_to_zero() {
        let plan = plan(dims(10, 3), &ModeSettings::Percentage { factor: 0.01 }).unwrap();
        assert_eq!(plan.output, dims(1, 1));
    }

    #[test]
    fn percentage_rejects_non_positive_factor() {
        for factor in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let err = plan(dims(10, 10), &ModeSettings::Percentage { factor }).unwrap_err();
            assert!(matches!(err, BatchError::InvalidSettings(_)), "factor {factor}");
        }
    }

    #[test]
    fn fixed_dimension_scales_longest_edge() {
        let landscape = plan(dims(4000, 3000), &ModeSettings::fixed(1920)).unwrap();
        assert_eq!(landscape.output, dims(1920, 1440));

        let portrait = plan(dims(1000, 3000), &ModeSettings::fixed(1000)).unwrap();
        assert_eq!(portrait.output, dims(333, 1000));
    }

    #[test]
    fn fixed_dimension_rejects_zero_target() {
        let err = plan(dims(10, 10), &ModeSettings::fixed(0)).unwrap_err();
        assert!(matches!(err, BatchError::InvalidSettings(_)));
    }

    #[test]
    fn print_cover_matches_reference_example() {
        let plan = plan(dims(4000, 3000), &ModeSettings::print("4x6")).unwrap();
        assert_eq!(plan.output, dims(1200, 800));

        let cover = plan.cover.expect("cover crop");
        assert!((cover.ratio - 0.3).abs() < 1e-12);
        assert!(cover.offset_x.abs() < 1e-9);
        assert!((cover.offset_y - 50.0).abs() < 1e-9);

        assert!(plan.sample.x.abs() < 1e-9);
        assert!((plan.sample.y - 50.0 / 0.3).abs() < 1e-6);
        assert!((plan.sample.width - 4000.0).abs() < 1e-6);
        assert!((plan.sample.height - 800.0 / 0.3).abs() < 1e-6);
    }

    #[test]
    fn print_cover_swaps_box_for_portrait_sources() {
        let plan = plan(dims(3000, 4000), &ModeSettings::print("4x6")).unwrap();
        assert_eq!(plan.output, dims(800, 1200));

        let plan = super::plan(dims(4000, 3000), &ModeSettings::print("5x7")).unwrap();
        assert_eq!(plan.output, dims(2100, 1500));
    }

    #[test]
    fn print_cover_keeps_box_for_square_sources() {
        let plan = plan(dims(2000, 2000), &ModeSettings::print("8x10")).unwrap();
        assert_eq!(plan.output, dims(2400, 3000));
        let cover = plan.cover.unwrap();
        assert!((cover.ratio - 1.5).abs() < 1e-12);
        assert!((cover.offset_x - 300.0).abs() < 1e-9);
        assert!(cover.offset_y.abs() < 1e-9);
    }

    #[test]
    fn print_cover_rejects_unknown_size() {
        let err = plan(dims(10, 10), &ModeSettings::print("3x3")).unwrap_err();
        assert!(err.to_string().contains("3x3"));
    }

    #[test]
    fn quality_only_keeps_dimensions() {
        let plan = plan(dims(640, 480), &ModeSettings::quality(0.5)).unwrap();
        assert_eq!(plan.output, dims(640, 480));
        assert_eq!(plan.encode_quality, 0.5);
    }

    #[test]
    fn quality_only_defaults_unusable_values() {
        for quality in [None, Some(0.0), Some(f32::NAN), Some(1.5), Some(-0.2)] {
            let plan = plan(dims(4, 4), &ModeSettings::QualityOnly { quality }).unwrap();
            assert_eq!(plan.encode_quality, DEFAULT_RECOMPRESS_QUALITY, "{quality:?}");
        }
    }

    #[test]
    fn validated_plan_matches_checked_plan() {
        let settings = ModeSettings::print("8x12");
        validate(&settings).unwrap();
        assert_eq!(
            plan_validated(dims(900, 600), &settings).unwrap(),
            plan(dims(900, 600), &settings).unwrap()
        );

        let err = plan_validated(dims(0, 600), &settings).unwrap_err();
        assert!(matches!(err, BatchError::InvalidSettings(_)));
    }

    #[test]
    fn rejects_empty_source() {
        let err = plan(dims(0, 10), &ModeSettings::percent(50)).unwrap_err();
        assert!(matches!(err, BatchError::InvalidSettings(_)));
    }

    #[test]
    fn print_names_are_case_insensitive() {
        assert_eq!(PrintBox::from_name(" 8X10 "), Some(PrintBox { width: 2400, height: 3000 }));
        assert_eq!(PrintBox::from_name("poster"), None);
    }

    #[test]
    fn settings_deserialize_from_tagged_json() {
        let parsed: ModeSettings =
            serde_json::from_str(r#"{"mode":"printCover","printSize":"4x6"}"#).unwrap();
        assert_eq!(parsed, ModeSettings::print("4x6"));

        let parsed: ModeSettings =
            serde_json::from_str(r#"{"mode":"fixedDimension","targetLongEdge":1080}"#).unwrap();
        assert_eq!(parsed.mode(), TransformMode::FixedDimension);

        let parsed: ModeSettings = serde_json::from_str(r#"{"mode":"qualityOnly"}"#).unwrap();
        assert_eq!(parsed, ModeSettings::QualityOnly { quality: None });
    }
}
