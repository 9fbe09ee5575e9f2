//! Color valence classification
//!
//! A resolved color is classified dark, neutral, or light from a YIQ-style
//! luminance, with alpha transparency widening the neutral band: the gray
//! range covers the middle third (minus a margin) at full opacity and the
//! whole range at zero opacity.

use std::collections::HashMap;
use std::collections::VecDeque;

/// A resolved color, components in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }
}

/// Light/dark/neutral classification of one color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Valence {
    Dark = -1,
    Neutral = 0,
    Light = 1,
}

impl Valence {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// Bucket index for tallying: dark 0, neutral 1, light 2.
    pub(crate) fn bucket(self) -> usize {
        (self as i8 + 1) as usize
    }
}

const GRAY_MARGIN: f64 = 64.0;
const ALPHA_FACTOR: f64 = (255.0 + GRAY_MARGIN) / 255.0;

/// Classify raw components. Luminance is scaled to `255 * 3`; fully
/// transparent colors are always neutral.
pub fn valence_raw(r: u8, g: u8, b: u8, a: u8) -> Valence {
    let lum = (f64::from(r) * 229.0 + f64::from(g) * 449.0 + f64::from(b) * 87.0) / 255.0;
    let alpha_range = f64::from(a) * ALPHA_FACTOR;
    let gray_min = alpha_range;
    let gray_max = 255.0 * 3.0 - alpha_range;

    if lum < gray_min {
        Valence::Dark
    } else if lum > gray_max {
        Valence::Light
    } else {
        Valence::Neutral
    }
}

/// Classify a resolved color.
pub fn valence_of(color: Rgba) -> Valence {
    valence_raw(color.r, color.g, color.b, color.a)
}

// =============================================================================
// Color Resolution
// =============================================================================

/// Turns a CSS color string into resolved components. The host runtime can
/// supply a rendering-backed resolver; [`CssColorResolver`] is the built-in
/// parser.
pub trait ColorResolver {
    fn resolve(&self, color: &str) -> Rgba;
}

/// Built-in parser for the color forms computed styles actually produce:
/// hex, `rgb()`/`rgba()`, `transparent`, and a small named table.
/// Unparseable strings resolve to transparent black, which classifies
/// neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssColorResolver;

impl ColorResolver for CssColorResolver {
    fn resolve(&self, color: &str) -> Rgba {
        parse_css_color(color).unwrap_or(Rgba::TRANSPARENT)
    }
}

fn parse_css_color(color: &str) -> Option<Rgba> {
    let color = color.trim();
    if color.is_empty() {
        return None;
    }

    if let Some(hex) = color.strip_prefix('#') {
        return parse_hex(hex);
    }

    let lower = color.to_ascii_lowercase();
    if let Some(body) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
    {
        return parse_rgb_body(body.strip_suffix(')').unwrap_or(body));
    }

    named_color(&lower)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.is_ascii() {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 | 4 => {
            let r = nibble(0)?;
            let g = nibble(1)?;
            let b = nibble(2)?;
            let a = if hex.len() == 4 { nibble(3)? * 17 } else { 255 };
            Some(Rgba::new(r * 17, g * 17, b * 17, a))
        }
        6 | 8 => {
            let r = byte(0)?;
            let g = byte(2)?;
            let b = byte(4)?;
            let a = if hex.len() == 8 { byte(6)? } else { 255 };
            Some(Rgba::new(r, g, b, a))
        }
        _ => None,
    }
}

fn parse_rgb_body(body: &str) -> Option<Rgba> {
    let mut channels = [0u8; 3];
    let mut alpha = 255u8;
    let mut index = 0;

    for part in body.split(|c: char| c == ',' || c == '/' || c.is_whitespace()) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match index {
            0..=2 => channels[index] = parse_channel(part)?,
            3 => alpha = parse_alpha(part)?,
            _ => return None,
        }
        index += 1;
    }

    if index < 3 {
        return None;
    }
    Some(Rgba::new(channels[0], channels[1], channels[2], alpha))
}

fn parse_channel(part: &str) -> Option<u8> {
    if let Some(pct) = part.strip_suffix('%') {
        let value: f64 = pct.parse().ok()?;
        return Some((value.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8);
    }
    let value: f64 = part.parse().ok()?;
    Some(value.clamp(0.0, 255.0).round() as u8)
}

fn parse_alpha(part: &str) -> Option<u8> {
    if let Some(pct) = part.strip_suffix('%') {
        let value: f64 = pct.parse().ok()?;
        return Some((value.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8);
    }
    let value: f64 = part.parse().ok()?;
    Some((value.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn named_color(name: &str) -> Option<Rgba> {
    let (r, g, b, a) = match name {
        "transparent" => (0, 0, 0, 0),
        "black" => (0, 0, 0, 255),
        "white" => (255, 255, 255, 255),
        "red" => (255, 0, 0, 255),
        "lime" => (0, 255, 0, 255),
        "blue" => (0, 0, 255, 255),
        "green" => (0, 128, 0, 255),
        "gray" | "grey" => (128, 128, 128, 255),
        "silver" => (192, 192, 192, 255),
        "yellow" => (255, 255, 0, 255),
        "aqua" | "cyan" => (0, 255, 255, 255),
        "fuchsia" | "magenta" => (255, 0, 255, 255),
        "maroon" => (128, 0, 0, 255),
        "navy" => (0, 0, 128, 255),
        "olive" => (128, 128, 0, 255),
        "purple" => (128, 0, 128, 255),
        "teal" => (0, 128, 128, 255),
        "orange" => (255, 165, 0, 255),
        _ => return None,
    };
    Some(Rgba::new(r, g, b, a))
}

// =============================================================================
// Bounded Cache
// =============================================================================

const CACHE_CAP: usize = 1000;
const CACHE_EVICT: usize = 500;

/// Memoizing wrapper around a resolver, keyed by the exact color string.
///
/// Once the cache exceeds [`CACHE_CAP`] entries the oldest [`CACHE_EVICT`]
/// by insertion order are dropped. Intentionally not a true LRU; the
/// crude policy is cheap and the cache is not correctness-critical.
pub struct CachedResolver<R> {
    inner: R,
    entries: HashMap<String, Rgba>,
    order: VecDeque<String>,
}

impl<R: ColorResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn resolve(&mut self, color: &str) -> Rgba {
        if let Some(&cached) = self.entries.get(color) {
            return cached;
        }

        if self.entries.len() > CACHE_CAP {
            for _ in 0..CACHE_EVICT {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }

        let resolved = self.inner.resolve(color);
        self.entries.insert(color.to_string(), resolved);
        self.order.push_back(color.to_string());
        resolved
    }

    pub fn valence(&mut self, color: &str) -> Valence {
        valence_of(self.resolve(color))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for CachedResolver<CssColorResolver> {
    fn default() -> Self {
        Self::new(CssColorResolver)
    }
}
