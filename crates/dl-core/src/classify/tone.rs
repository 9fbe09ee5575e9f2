//! Whole-page text tone classification
//!
//! Operates on a pure snapshot of the document: the host layer extracts
//! candidate text blocks (paragraph-like nodes and parents of explicit line
//! breaks) plus a document-order text-node walk, and this module decides
//! whether the page's dominant text color reads light or dark.

use super::color::{CachedResolver, ColorResolver};

/// Stop sampling once this much text has been bucketed. Arbitrarily chosen
/// good-enough threshold.
const SAMPLE_CAP: usize = 4096;

/// The paragraph pass must cover at least this share of the document's
/// text, otherwise the fallback walk replaces it.
const MIN_COVERAGE: f64 = 0.1;

/// Dominant text tone of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Light,
    Dark,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Light => "light",
            Tone::Dark => "dark",
        }
    }
}

/// One text-bearing node as observed in the rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Length of the node's text content.
    pub text_len: usize,
    /// Resolved text color string; empty when none was computed.
    pub color: String,
    /// False when `display: none` or not `visibility: visible`.
    pub visible: bool,
    /// Rendered box, in CSS pixels.
    pub width: f64,
    pub height: f64,
    /// Offset of the box top from the viewport top.
    pub top: f64,
    /// True for nodes inside a footer region.
    pub in_footer: bool,
}

/// Snapshot of everything the tone heuristic looks at.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// Paragraph-like candidates (plus parents of explicit line breaks).
    pub paragraphs: Vec<TextBlock>,
    /// Full document-order text-node walk, used as the fallback pass.
    pub text_nodes: Vec<TextBlock>,
    /// Total text length of the whole document.
    pub doc_text_len: usize,
    /// Viewport height; blocks scrolled below it are not sampled.
    pub viewport_height: f64,
}

fn tally<R: ColorResolver>(
    blocks: &[TextBlock],
    viewport_height: f64,
    skip_footer: bool,
    colors: &mut CachedResolver<R>,
) -> ([usize; 3], usize) {
    let mut buckets = [0usize; 3];
    let mut total = 0usize;

    for block in blocks {
        if block.color.is_empty() || !block.visible {
            continue;
        }
        if block.width * block.height <= 0.0 {
            continue;
        }
        if block.top > viewport_height {
            continue;
        }
        if skip_footer && block.in_footer {
            continue;
        }

        buckets[colors.valence(&block.color).bucket()] += block.text_len;
        total += block.text_len;
        if total > SAMPLE_CAP {
            break;
        }
    }

    (buckets, total)
}

/// Classify the page's dominant text tone, or `None` when no color family
/// holds a supermajority of the sampled text.
pub fn page_tone<R: ColorResolver>(
    snapshot: &PageSnapshot,
    colors: &mut CachedResolver<R>,
) -> Option<Tone> {
    let (mut buckets, total) =
        tally(&snapshot.paragraphs, snapshot.viewport_height, true, colors);

    // If the paragraph candidates covered too little of the page's text,
    // the document-order walk replaces (not augments) their buckets.
    if total <= SAMPLE_CAP && (total as f64) < snapshot.doc_text_len as f64 * MIN_COVERAGE {
        let (walk_buckets, _) =
            tally(&snapshot.text_nodes, snapshot.viewport_height, false, colors);
        buckets = walk_buckets;
    }

    let [dark, neutral, light] = buckets;
    if light > dark + neutral {
        Some(Tone::Light)
    } else if dark > light + neutral {
        Some(Tone::Dark)
    } else {
        None
    }
}

// =============================================================================
// prefers-color-scheme Declarations
// =============================================================================

/// One style rule's media condition list.
#[derive(Debug, Clone, Default)]
pub struct StyleRule {
    pub media: Vec<String>,
}

/// One style sheet as reachable from the document.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    /// False for cross-origin sheets whose rules cannot be read.
    pub readable: bool,
    /// Sheet-level media condition texts.
    pub media: Vec<String>,
    pub rules: Vec<StyleRule>,
}

/// True when any reachable style rule's media condition mentions
/// `prefers-color-scheme`. Unreadable sheets are skipped, not fatal.
pub fn declares_preferred_scheme(sheets: &[StyleSheet]) -> bool {
    for sheet in sheets {
        if !sheet.readable {
            continue;
        }
        if sheet.media.iter().any(|m| m.contains("prefers-color-scheme")) {
            return true;
        }
        for rule in &sheet.rules {
            if rule.media.iter().any(|m| m.contains("prefers-color-scheme")) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text_len: usize, color: &str) -> TextBlock {
        TextBlock {
            text_len,
            color: color.to_string(),
            visible: true,
            width: 100.0,
            height: 20.0,
            top: 0.0,
            in_footer: false,
        }
    }

    fn snapshot(paragraphs: Vec<TextBlock>) -> PageSnapshot {
        let doc_text_len = paragraphs.iter().map(|b| b.text_len).sum();
        PageSnapshot {
            paragraphs,
            text_nodes: Vec::new(),
            doc_text_len,
            viewport_height: 800.0,
        }
    }

    #[test]
    fn test_detects_light_text() {
        let snap = snapshot(vec![block(500, "white"), block(100, "black")]);
        let mut colors = CachedResolver::default();
        assert_eq!(page_tone(&snap, &mut colors), Some(Tone::Light));
    }

    #[test]
    fn test_detects_dark_text() {
        let snap = snapshot(vec![block(500, "black"), block(100, "white")]);
        let mut colors = CachedResolver::default();
        assert_eq!(page_tone(&snap, &mut colors), Some(Tone::Dark));
    }

    #[test]
    fn test_no_supermajority_is_none() {
        let snap = snapshot(vec![block(300, "black"), block(300, "white")]);
        let mut colors = CachedResolver::default();
        assert_eq!(page_tone(&snap, &mut colors), None);
    }

    #[test]
    fn test_skips_hidden_footer_and_offscreen_blocks() {
        let mut hidden = block(10_000, "black");
        hidden.visible = false;
        let mut footer = block(10_000, "black");
        footer.in_footer = true;
        let mut offscreen = block(10_000, "black");
        offscreen.top = 5_000.0;
        let mut flat = block(10_000, "black");
        flat.height = 0.0;

        let snap = PageSnapshot {
            paragraphs: vec![hidden, footer, offscreen, flat, block(200, "white")],
            text_nodes: Vec::new(),
            doc_text_len: 2_000,
            viewport_height: 800.0,
        };
        let mut colors = CachedResolver::default();
        assert_eq!(page_tone(&snap, &mut colors), Some(Tone::Light));
    }

    #[test]
    fn test_walk_replaces_sparse_paragraph_pass() {
        // Paragraphs see a sliver of dark text; the document walk shows the
        // page is overwhelmingly light.
        let snap = PageSnapshot {
            paragraphs: vec![block(50, "black")],
            text_nodes: vec![block(3000, "white"), block(100, "black")],
            doc_text_len: 10_000,
            viewport_height: 800.0,
        };
        let mut colors = CachedResolver::default();
        assert_eq!(page_tone(&snap, &mut colors), Some(Tone::Light));
    }

    #[test]
    fn test_ample_paragraph_pass_skips_walk() {
        // Above the cap, the walk never runs even though it disagrees.
        let snap = PageSnapshot {
            paragraphs: vec![block(5000, "black")],
            text_nodes: vec![block(9000, "white")],
            doc_text_len: 100_000,
            viewport_height: 800.0,
        };
        let mut colors = CachedResolver::default();
        assert_eq!(page_tone(&snap, &mut colors), Some(Tone::Dark));
    }

    #[test]
    fn test_declares_preferred_scheme() {
        let hit_sheet = StyleSheet {
            readable: true,
            media: vec!["(prefers-color-scheme: dark)".to_string()],
            rules: vec![],
        };
        assert!(declares_preferred_scheme(&[hit_sheet]));

        let hit_rule = StyleSheet {
            readable: true,
            media: vec![],
            rules: vec![StyleRule {
                media: vec!["(prefers-color-scheme: dark)".to_string()],
            }],
        };
        assert!(declares_preferred_scheme(&[hit_rule]));

        let cross_origin = StyleSheet {
            readable: false,
            media: vec!["(prefers-color-scheme: dark)".to_string()],
            rules: vec![],
        };
        assert!(!declares_preferred_scheme(&[cross_origin]));

        assert!(!declares_preferred_scheme(&[StyleSheet {
            readable: true,
            media: vec!["screen".to_string()],
            rules: vec![StyleRule::default()],
        }]));
    }
}
