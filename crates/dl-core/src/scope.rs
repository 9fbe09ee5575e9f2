//! Scope keys for site-specific settings
//!
//! A [`Site`] names the slice of the web a settings record applies to: a
//! host hierarchy (base domain outward through subdomains) and a path
//! hierarchy (root to leaf). The empty `Site` is the global default scope.
//!
//! Canonical key strings render the host most-specific-label-first (the way
//! users read hostnames) followed by `/`-prefixed path segments, e.g.
//! `sub.example.com/docs`. In memory both hierarchies are kept
//! broadest-first; only the key string reverses the host labels.

use std::fmt;

use crate::url::{extract_host, path_segments, split_host};

/// A settings scope: host hierarchy plus path hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Site {
    /// Host labels, broadest-first. The first entry is the registrable
    /// domain (`example.com`); later entries are single subdomain labels
    /// of increasing specificity.
    pub domain_hierarchy: Vec<String>,
    /// Path segments, root to leaf. Empty means "any path".
    pub page_hierarchy: Vec<String>,
}

impl Site {
    /// Build a `Site`, upholding the invariant that a path scope requires
    /// a host scope. A path-only input collapses to the global scope.
    pub fn new(domain_hierarchy: Vec<String>, page_hierarchy: Vec<String>) -> Self {
        if domain_hierarchy.is_empty() {
            return Self::default();
        }
        Self {
            domain_hierarchy,
            page_hierarchy,
        }
    }

    /// The full scope of a concrete URL: whole host hierarchy plus every
    /// path segment. Unresolvable URLs map to the global scope.
    pub fn from_url(url: &str) -> Self {
        let host = match extract_host(url) {
            Some(host) => host,
            None => return Self::default(),
        };
        let (domain, subdomains) = split_host(host);
        if domain.is_empty() {
            return Self::default();
        }

        let mut domain_hierarchy = Vec::with_capacity(1 + subdomains.len());
        domain_hierarchy.push(domain);
        domain_hierarchy.extend(subdomains);

        Self {
            domain_hierarchy,
            page_hierarchy: path_segments(url),
        }
    }

    /// The host-wide scope of a URL: whole host hierarchy, no path.
    pub fn host_of_url(url: &str) -> Self {
        let mut site = Self::from_url(url);
        site.page_hierarchy.clear();
        site
    }

    /// True for the global default scope.
    pub fn is_default(&self) -> bool {
        self.domain_hierarchy.is_empty() && self.page_hierarchy.is_empty()
    }

    /// Render the canonical key string. The empty string is the default
    /// scope.
    pub fn key(&self) -> String {
        let mut out = String::new();
        for label in self.domain_hierarchy.iter().skip(1).rev() {
            out.push_str(label);
            out.push('.');
        }
        if let Some(domain) = self.domain_hierarchy.first() {
            out.push_str(domain);
        }
        for segment in &self.page_hierarchy {
            out.push('/');
            out.push_str(segment);
        }
        out
    }

    /// Parse a canonical key string back into a `Site`. Malformed keys
    /// degrade to the global scope rather than failing.
    pub fn parse_key(key: &str) -> Self {
        let key = key.trim();
        if key.is_empty() {
            return Self::default();
        }

        let mut parts = key.split('/');
        let host = match parts.next() {
            Some(host) if !host.is_empty() => host,
            _ => return Self::default(),
        };

        let (domain, subdomains) = split_host(host);
        if domain.is_empty() {
            return Self::default();
        }

        let mut domain_hierarchy = Vec::with_capacity(1 + subdomains.len());
        domain_hierarchy.push(domain);
        domain_hierarchy.extend(subdomains);

        let page_hierarchy = parts
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
            .collect();

        Self::new(domain_hierarchy, page_hierarchy)
    }

    /// True if this scope covers `target`: both hierarchies must be
    /// prefixes of the target's, compared broadest-first.
    pub fn matches(&self, target: &Site) -> bool {
        is_prefix(&self.domain_hierarchy, &target.domain_hierarchy)
            && is_prefix(&self.page_hierarchy, &target.page_hierarchy)
    }

    /// Match weight: host labels count before path labels, so a longer
    /// host match always beats a longer path match.
    pub fn specificity(&self) -> (usize, usize) {
        (self.domain_hierarchy.len(), self.page_hierarchy.len())
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

fn is_prefix(prefix: &[String], full: &[String]) -> bool {
    prefix.len() <= full.len() && prefix.iter().zip(full.iter()).all(|(a, b)| a == b)
}
