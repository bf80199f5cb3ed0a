//! Content type by file extension

use reelcache_client::VideoFormat;
use std::path::Path;

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    if let Some(format) = VideoFormat::from_extension(ext) {
        return format.base_mime();
    }
    match ext.to_ascii_lowercase().as_str() {
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        "vtt" => "text/vtt",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("clip.WEBM")), "video/webm");
        assert_eq!(content_type_for(Path::new("a/b/clip.ogv")), "video/ogg");
        assert_eq!(content_type_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("clip")), "application/octet-stream");
    }
}
