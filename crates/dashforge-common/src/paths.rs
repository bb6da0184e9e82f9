//! Detecting local media files by extension, used by the watcher and by
//! `addFile`/cache-index reconciliation.

use std::path::Path;

/// Extensions recognized as packagable local video assets.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "m4v", "avi", "ts"];

/// Check if a path has a video file extension.
///
/// ```
/// use std::path::Path;
/// use dashforge_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.mp4")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Strip a video extension and any directory components, yielding the asset
/// name the cache index keys assets by (`addFile`'s `basename - ext`).
pub fn asset_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
