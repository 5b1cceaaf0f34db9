//! Extension → media kind and MIME type

use std::path::Path;

/// Grande famille d'un média
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

fn normalized(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

pub fn media_kind(ext: &str) -> MediaKind {
    match normalized(ext).as_str() {
        "jpg" | "jpeg" | "png" | "heic" | "gif" | "webp" | "tiff" | "bmp" => MediaKind::Image,
        "mov" | "mp4" | "m4v" | "hevc" | "avi" | "mts" | "m2ts" | "webm" => MediaKind::Video,
        _ => MediaKind::Other,
    }
}

pub fn mime_type(ext: &str) -> &'static str {
    match normalized(ext).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "mov" => "video/quicktime",
        "mp4" | "m4v" => "video/mp4",
        "hevc" => "video/hevc",
        "avi" => "video/x-msvideo",
        "mts" | "m2ts" => "video/mp2t",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Type MIME d'un fichier d'après son extension
pub fn mime_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(mime_type)
        .unwrap_or("application/octet-stream")
}
