//! Image classification: background kinds and animation detection
//!
//! Background-image sniffing works on the resolved CSS value string; the
//! animation check scans raw image bytes for GIF frame-control signatures.
//! Both are counter-transform inputs: the style layer skips or re-inverts
//! elements based on the recorded kind.

use std::collections::HashSet;

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

// =============================================================================
// Background Image Kind
// =============================================================================

/// File family of an element's background image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BgImageKind {
    Png,
    Gif,
    Jpg,
    Svg,
    Webp,
    /// A url/data-image marker is present but no known family matched.
    Unknown,
}

impl BgImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BgImageKind::Png => "png",
            BgImageKind::Gif => "gif",
            BgImageKind::Jpg => "jpg",
            BgImageKind::Svg => "svg",
            BgImageKind::Webp => "webp",
            BgImageKind::Unknown => "unknown",
        }
    }
}

/// Sniff the family of a resolved `background-image` value. `None` means
/// no background image at all; the caller must then clear any previously
/// recorded kind.
pub fn bg_image_kind(value: &str) -> Option<BgImageKind> {
    if contains_any(value, &["data:image/png", ".png", ".PNG"]) {
        Some(BgImageKind::Png)
    } else if contains_any(value, &[".gif", ".GIF"]) {
        Some(BgImageKind::Gif)
    } else if contains_any(value, &["data:image/jpeg", ".jpg", ".JPG", ".jpeg", ".JPEG"]) {
        Some(BgImageKind::Jpg)
    } else if contains_any(value, &["data:image/svg", ".svg", ".SVG"]) {
        Some(BgImageKind::Svg)
    } else if contains_any(value, &["data:image/webp", ".webp"]) {
        Some(BgImageKind::Webp)
    } else if contains_any(value, &["url", "data:image"]) {
        Some(BgImageKind::Unknown)
    } else {
        None
    }
}

// =============================================================================
// Animated GIF Detection
// =============================================================================

/// Length of the frame-control signature scanned for below.
const FRAME_SIG_LEN: usize = 10;

#[inline]
fn is_frame_signature(window: &[u8]) -> bool {
    window[0] == 0x00
        && window[1] == 0x21
        && window[2] == 0xF9
        && window[3] == 0x04
        && window[8] == 0x00
        && (window[9] == 0x2C || window[9] == 0x21)
}

/// Scan raw image bytes for GIF frame-control blocks. Returns true as soon
/// as a second frame is found; a static image never produces two.
///
/// Matches are non-overlapping and the scan is a single incremental pass,
/// so arbitrarily large buffers cost no extra memory.
pub fn is_animated_gif(buffer: &[u8]) -> bool {
    let mut frames = 0usize;
    let mut i = 0usize;

    while i + FRAME_SIG_LEN <= buffer.len() {
        if is_frame_signature(&buffer[i..i + FRAME_SIG_LEN]) {
            frames += 1;
            if frames >= 2 {
                return true;
            }
            i += FRAME_SIG_LEN;
        } else {
            i += 1;
        }
    }

    false
}

// =============================================================================
// Resource Fetching
// =============================================================================

/// Fetch failure during animation detection. Never page-breaking; every
/// failure degrades to "not animated".
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("resource fetch failed: {0}")]
    Failed(String),
}

/// Async capability for fetching an image resource as raw bytes.
#[allow(async_fn_in_trait)]
pub trait ResourceFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Decide whether the resource behind `url` is an animated image.
///
/// Inline (data-URI) resources are classified false without inspection;
/// fetch failures classify false as the safe default.
pub async fn detect_animated<F: ResourceFetcher>(url: &str, fetcher: &F) -> bool {
    if url.len() >= 5 && url[..5].eq_ignore_ascii_case("data:") {
        return false;
    }

    match fetcher.fetch(url).await {
        Ok(buffer) => is_animated_gif(&buffer),
        Err(err) => {
            log::warn!("animation check failed for {url}: {err}");
            false
        }
    }
}

/// Tracks elements with a detection in flight so a second request for the
/// same element is suppressed rather than re-fetched.
#[derive(Debug, Default)]
pub struct PendingDetections {
    pending: HashSet<String>,
}

impl PendingDetections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a detection slot for `key`. False when one is already in
    /// flight.
    pub fn begin(&mut self, key: &str) -> bool {
        self.pending.insert(key.to_string())
    }

    pub fn finish(&mut self, key: &str) {
        self.pending.remove(key);
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: [u8; 10] = [0x00, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C];
    const FRAME_ALT_TERM: [u8; 10] = [0x00, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x21];
    const GIF_HEADER: [u8; 6] = [0x47, 0x49, 0x46, 0x38, 0x39, 0x61];

    #[test]
    fn test_bg_image_kind_families() {
        assert_eq!(bg_image_kind("url(\"image.png\")"), Some(BgImageKind::Png));
        assert_eq!(bg_image_kind("url(\"image.jpg\")"), Some(BgImageKind::Jpg));
        assert_eq!(bg_image_kind("url(\"spinner.GIF\")"), Some(BgImageKind::Gif));
        assert_eq!(
            bg_image_kind("url(\"data:image/svg+xml;base64,...\")"),
            Some(BgImageKind::Svg)
        );
        assert_eq!(bg_image_kind("url(\"photo.webp\")"), Some(BgImageKind::Webp));
        assert_eq!(bg_image_kind("url(\"unknown.xyz\")"), Some(BgImageKind::Unknown));
        assert_eq!(bg_image_kind("none"), None);
    }

    #[test]
    fn test_not_animated_for_short_or_foreign_data() {
        assert!(!is_animated_gif(&[0x00, 0x01, 0x02]));
        assert!(!is_animated_gif(&GIF_HEADER));
    }

    #[test]
    fn test_single_frame_is_static() {
        let mut buffer = GIF_HEADER.to_vec();
        buffer.extend_from_slice(&FRAME);
        assert!(!is_animated_gif(&buffer));
    }

    #[test]
    fn test_two_frames_is_animated() {
        let mut buffer = GIF_HEADER.to_vec();
        buffer.extend_from_slice(&FRAME);
        buffer.push(0x00); // dummy data between frames
        buffer.extend_from_slice(&FRAME);
        assert!(is_animated_gif(&buffer));
    }

    #[test]
    fn test_alternate_terminator_byte() {
        let mut buffer = GIF_HEADER.to_vec();
        buffer.extend_from_slice(&FRAME_ALT_TERM);
        buffer.extend_from_slice(&FRAME_ALT_TERM);
        assert!(is_animated_gif(&buffer));
    }

    #[test]
    fn test_matches_do_not_overlap() {
        // A signature whose tail could restart a match must not be counted
        // twice: 19 bytes can hold at most one non-overlapping signature.
        let mut buffer = FRAME.to_vec();
        buffer.extend_from_slice(&FRAME[..9]);
        assert!(!is_animated_gif(&buffer));
    }

    struct StaticFetcher(Vec<u8>);

    impl ResourceFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    impl ResourceFetcher for FailingFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::Failed(url.to_string()))
        }
    }

    #[tokio::test]
    async fn test_detect_animated_data_uri_is_false() {
        let mut animated = Vec::new();
        animated.extend_from_slice(&FRAME);
        animated.extend_from_slice(&FRAME);
        let fetcher = StaticFetcher(animated);
        assert!(!detect_animated("data:image/gif;base64,R0lGOD", &fetcher).await);
        assert!(detect_animated("http://example.com/a.gif", &fetcher).await);
    }

    #[tokio::test]
    async fn test_detect_animated_fetch_failure_is_false() {
        assert!(!detect_animated("http://example.com/a.gif", &FailingFetcher).await);
    }

    #[test]
    fn test_pending_detections_suppresses_duplicates() {
        let mut pending = PendingDetections::new();
        assert!(pending.begin("img-1"));
        assert!(!pending.begin("img-1"));
        assert!(pending.is_pending("img-1"));
        pending.finish("img-1");
        assert!(pending.begin("img-1"));
    }
}
