//! Archive entry names for transformed images.

const RESIZE_SUFFIX: &str = "_resize";

/// Derive the archive entry name for an input file name.
///
/// Directory components are dropped, then the name is split on its last `.`:
/// `"vacation.photo.png"` becomes `"vacation.photo_resize.png"` and `"scan"` becomes
/// `"scan_resize"`. Names are not deduplicated, so two inputs sharing a base name map to the
/// same entry.
pub fn output_file_name(input: &str) -> String {
    let base = input.rsplit(|ch: char| ch == '/' || ch == '\\').next().unwrap_or(input);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => format!("{stem}{RESIZE_SUFFIX}.{ext}"),
        Some((stem, _)) => format!("{stem}{RESIZE_SUFFIX}"),
        None => format!("{base}{RESIZE_SUFFIX}"),
    }
}
