//! Settings records: filters, modifiers, and the resolved message
//!
//! A site's record is a base [`Filter`] plus an independent set of
//! [`ModifierSet`] flags. Wire names are the strings used by the persisted
//! record, the legacy import format, and the style layer's attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Filter applied when no more specific rule overrides it.
pub const DEFAULT_FILTER: Filter = Filter::DelumineSmart;

/// Free-form global settings (e.g. `detect_animation` = `enabled`).
pub type GlobalSettings = BTreeMap<String, String>;

// =============================================================================
// Filters
// =============================================================================

/// Base visual transform for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// No transform.
    Normal,
    /// Dimming levels.
    Dim1,
    Dim2,
    Dim3,
    /// Invert, keeping photographic content upright.
    DelumineSmart,
    /// Invert, leaving all images untouched.
    DelumineNoimg,
    /// Invert everything, images included.
    DelumineAll,
}

impl Filter {
    /// The wire name used in persisted records and style attributes.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Filter::Normal => "normal",
            Filter::Dim1 => "dim1",
            Filter::Dim2 => "dim2",
            Filter::Dim3 => "dim3",
            Filter::DelumineSmart => "delumine-smart",
            Filter::DelumineNoimg => "delumine-noimg",
            Filter::DelumineAll => "delumine-all",
        }
    }

    /// Parse a wire name. Unknown names are `None`; callers pick their own
    /// fallback (baseline for persisted rows, `normal` for legacy schemes).
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(Filter::Normal),
            "dim1" => Some(Filter::Dim1),
            "dim2" => Some(Filter::Dim2),
            "dim3" => Some(Filter::Dim3),
            "delumine-smart" => Some(Filter::DelumineSmart),
            "delumine-noimg" => Some(Filter::DelumineNoimg),
            "delumine-all" => Some(Filter::DelumineAll),
            _ => None,
        }
    }

    /// True for the invert family (`delumine-*`), which is what the deep
    /// image heuristics apply to.
    pub fn is_invert(&self) -> bool {
        matches!(
            self,
            Filter::DelumineSmart | Filter::DelumineNoimg | Filter::DelumineAll
        )
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Filter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or(())
    }
}

// =============================================================================
// Modifiers
// =============================================================================

bitflags::bitflags! {
    /// Independently toggleable behavior flags layered on a filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierSet: u8 {
        /// Reduce contrast on top of the base filter.
        const LOW_CONTRAST = 1 << 0;
        /// Drop page backgrounds entirely.
        const KILL_BG = 1 << 1;
        /// Leave background images alone (disables CSS-image marking).
        const IGNORE_BG = 1 << 2;
        /// Detect already-dark pages and back off.
        const DYNAMIC = 1 << 3;
    }
}

const MODIFIER_NAMES: &[(ModifierSet, &str)] = &[
    (ModifierSet::LOW_CONTRAST, "low_contrast"),
    (ModifierSet::KILL_BG, "killbg"),
    (ModifierSet::IGNORE_BG, "ignorebg"),
    (ModifierSet::DYNAMIC, "dynamic"),
];

impl ModifierSet {
    /// Parse one wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        MODIFIER_NAMES
            .iter()
            .find(|(_, wire)| *wire == name)
            .map(|(flag, _)| *flag)
    }

    /// Parse a sequence of wire names, dropping unknowns.
    pub fn from_wire_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(Self::from_wire)
            .fold(Self::empty(), |acc, flag| acc | flag)
    }

    /// The wire names of every set flag, in declaration order.
    pub fn wire_names(&self) -> Vec<&'static str> {
        MODIFIER_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, wire)| *wire)
            .collect()
    }
}

// =============================================================================
// Records
// =============================================================================

/// The settings record stored per scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub filter: Filter,
    pub mods: ModifierSet,
}

impl SiteSettings {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            mods: ModifierSet::empty(),
        }
    }

    /// The fixed baseline used when no default record was ever stored.
    pub fn baseline() -> Self {
        Self::new(DEFAULT_FILTER)
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self::baseline()
    }
}

/// The message handed to the injection layer for one resolved URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSettings {
    pub enabled: bool,
    pub filter: String,
    pub modifiers: Vec<String>,
    pub settings: GlobalSettings,
}

impl ResolvedSettings {
    pub fn new(enabled: bool, record: &SiteSettings, settings: &GlobalSettings) -> Self {
        Self {
            enabled,
            filter: record.filter.wire_name().to_string(),
            modifiers: record
                .mods
                .wire_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            settings: settings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_wire_round_trip() {
        for filter in [
            Filter::Normal,
            Filter::Dim1,
            Filter::Dim2,
            Filter::Dim3,
            Filter::DelumineSmart,
            Filter::DelumineNoimg,
            Filter::DelumineAll,
        ] {
            assert_eq!(Filter::from_wire(filter.wire_name()), Some(filter));
        }
        assert_eq!(Filter::from_wire("delumine-no-invert"), None);
    }

    #[test]
    fn test_modifier_names() {
        let mods = ModifierSet::LOW_CONTRAST | ModifierSet::DYNAMIC;
        assert_eq!(mods.wire_names(), vec!["low_contrast", "dynamic"]);
        assert_eq!(
            ModifierSet::from_wire_names(["low_contrast", "dynamic", "bogus"]),
            mods
        );
    }

    #[test]
    fn test_resolved_message_shape() {
        let mut record = SiteSettings::new(Filter::DelumineSmart);
        record.mods |= ModifierSet::KILL_BG;
        let mut globals = GlobalSettings::new();
        globals.insert("detect_animation".to_string(), "enabled".to_string());

        let msg = ResolvedSettings::new(true, &record, &globals);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["filter"], "delumine-smart");
        assert_eq!(json["modifiers"][0], "killbg");
        assert_eq!(json["settings"]["detect_animation"], "enabled");
    }
}
