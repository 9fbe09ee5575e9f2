//! Interactive scope selection over a concrete URL
//!
//! A [`UrlSelector`] decomposes one URL into an ordered row of pieces
//! (subdomain labels, the base domain, path segments) over which a user
//! picks a contiguous boundary: one `start` marker and an optional `end`
//! marker. The marked region converts to and from a [`Site`].
//!
//! Marker semantics: a piece is in scope once a `start` has been seen at or
//! before it and no `end` strictly before it; the piece carrying `end` is
//! still included. No `end` means the scope extends through the last piece.

use crate::scope::Site;
use crate::url::{extract_host, path_segments, split_host};

/// What a selector piece names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    Host,
    Path,
}

/// One selectable fragment of the URL row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub text: String,
    pub kind: PieceKind,
    pub start: bool,
    pub end: bool,
}

impl Piece {
    fn new(text: String, kind: PieceKind) -> Self {
        Self {
            text,
            kind,
            start: false,
            end: false,
        }
    }
}

/// A selection widget state derived from one concrete URL.
#[derive(Debug, Clone, Default)]
pub struct UrlSelector {
    /// Registrable domain, e.g. `example.com`.
    pub domain: String,
    /// Subdomain labels, most-general-first, excluding the base domain.
    pub subdomains: Vec<String>,
    /// Path segments, root to leaf.
    pub path_parts: Vec<String>,
    pieces: Vec<Piece>,
}

impl UrlSelector {
    /// Decompose a URL. Malformed URLs yield a neutral selector with no
    /// pieces, so the caller can still render a no-op widget.
    pub fn parse(url: &str) -> Self {
        let host = match extract_host(url) {
            Some(host) => host,
            None => return Self::default(),
        };
        let (domain, subdomains) = split_host(host);
        if domain.is_empty() {
            return Self::default();
        }
        let path_parts = path_segments(url);

        // Piece order is URL reading order: subdomains most-specific-first,
        // then the base domain, then path segments.
        let mut pieces = Vec::with_capacity(subdomains.len() + 1 + path_parts.len());
        for label in subdomains.iter().rev() {
            pieces.push(Piece::new(label.clone(), PieceKind::Host));
        }
        pieces.push(Piece::new(domain.clone(), PieceKind::Host));
        for segment in &path_parts {
            pieces.push(Piece::new(segment.clone(), PieceKind::Path));
        }

        // Whole-site scope by default: start on the base domain, no end.
        let domain_idx = subdomains.len();
        pieces[domain_idx].start = true;

        Self {
            domain,
            subdomains,
            path_parts,
            pieces,
        }
    }

    /// The ordered piece row. Pure projection, no mutation.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    fn start_index(&self) -> Option<usize> {
        self.pieces.iter().position(|piece| piece.start)
    }

    fn end_index(&self) -> Option<usize> {
        self.pieces.iter().position(|piece| piece.end)
    }

    /// Move the single `start` marker to piece `index`. Rejected (no state
    /// change) when the index is out of range or past the `end` marker.
    pub fn set_start(&mut self, index: usize) -> bool {
        if index >= self.pieces.len() {
            return false;
        }
        if let Some(end) = self.end_index() {
            if index > end {
                return false;
            }
        }
        for piece in &mut self.pieces {
            piece.start = false;
        }
        self.pieces[index].start = true;
        true
    }

    /// Toggle the `end` marker on piece `index`. Setting an `end` before
    /// the `start` marker is rejected.
    pub fn set_end(&mut self, index: usize) -> bool {
        if index >= self.pieces.len() {
            return false;
        }
        if self.pieces[index].end {
            self.pieces[index].end = false;
            return true;
        }
        match self.start_index() {
            Some(start) if index >= start => {
                for piece in &mut self.pieces {
                    piece.end = false;
                }
                self.pieces[index].end = true;
                true
            }
            _ => false,
        }
    }

    /// Reconstruct the `Site` the current markers describe.
    pub fn to_site(&self) -> Site {
        let mut selected = false;
        let mut host_labels: Vec<String> = Vec::new();
        let mut page_hierarchy: Vec<String> = Vec::new();

        for piece in &self.pieces {
            if piece.start {
                selected = true;
            }
            if selected {
                match piece.kind {
                    PieceKind::Host => host_labels.push(piece.text.clone()),
                    PieceKind::Path => page_hierarchy.push(piece.text.clone()),
                }
            }
            if piece.end {
                selected = false;
            }
        }

        // Pieces run most-specific-first through the host region; the
        // hierarchy wants broadest-first.
        host_labels.reverse();
        Site::new(host_labels, page_hierarchy)
    }

    /// Place markers so [`to_site`](Self::to_site) reproduces `site`.
    /// Fails silently (markers untouched) when the site's hierarchies
    /// cannot be matched against this selector's pieces.
    pub fn select_site(&mut self, site: &Site) -> bool {
        // The expected run over the piece row: host entries most-specific-
        // first, then path entries in order.
        let expected: Vec<(&str, PieceKind)> = site
            .domain_hierarchy
            .iter()
            .rev()
            .map(|label| (label.as_str(), PieceKind::Host))
            .chain(
                site.page_hierarchy
                    .iter()
                    .map(|segment| (segment.as_str(), PieceKind::Path)),
            )
            .collect();

        if expected.is_empty() || expected.len() > self.pieces.len() {
            return false;
        }

        let last_start = self.pieces.len() - expected.len();
        for first in 0..=last_start {
            let found = expected.iter().enumerate().all(|(offset, (text, kind))| {
                let piece = &self.pieces[first + offset];
                piece.kind == *kind && piece.text == *text
            });
            if !found {
                continue;
            }
            for piece in &mut self.pieces {
                piece.start = false;
                piece.end = false;
            }
            self.pieces[first].start = true;
            self.pieces[first + expected.len() - 1].end = true;
            return true;
        }

        false
    }
}
