//! Legacy (v1) settings migration
//!
//! The v1 schema was flat: a string boolean, one global scheme, and two
//! JSON-*string* maps keyed by site. Both schema versions are explicit
//! types with a pure transform between them; nothing downstream ever
//! special-cases legacy fields.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::{Filter, ModifierSet};
use crate::store::{PersistedSettings, StoreError, SCHEMA_VERSION};

/// The v1 persisted shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacySettings {
    /// String boolean, `"true"` / `"false"`.
    #[serde(default)]
    pub enabled: Option<String>,
    /// Global scheme applied to sites without their own entry.
    #[serde(default)]
    pub scheme: Option<String>,
    /// JSON string: `{site: "delimiter-joined modifiers"}`.
    #[serde(default)]
    pub sitemodifiers: Option<String>,
    /// JSON string: `{site: schemeName}`.
    #[serde(default)]
    pub siteschemes: Option<String>,
}

fn parse_submap(raw: Option<&str>) -> Result<BTreeMap<String, String>, serde_json::Error> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw),
        _ => Ok(BTreeMap::new()),
    }
}

fn parse_legacy_modifiers(joined: &str) -> ModifierSet {
    ModifierSet::from_wire_names(
        joined
            .split([',', ' '])
            .map(str::trim)
            .filter(|token| !token.is_empty()),
    )
}

/// Transform a v1 record into the current schema.
///
/// The site set is the union of both legacy maps, so a site present in
/// only one of them is kept. Per-site gaps degrade to neutral defaults
/// (missing scheme falls back to the global legacy scheme, unknown scheme
/// names to `normal`, missing modifiers to none); a malformed sub-map
/// fails the whole transform.
pub fn migrate_v1_to_v2(legacy: &LegacySettings) -> Result<PersistedSettings, serde_json::Error> {
    let sitemodifiers = parse_submap(legacy.sitemodifiers.as_deref())?;
    let siteschemes = parse_submap(legacy.siteschemes.as_deref())?;

    let global_filter = legacy
        .scheme
        .as_deref()
        .map(|scheme| Filter::from_wire(scheme).unwrap_or(Filter::Normal))
        .unwrap_or(crate::settings::DEFAULT_FILTER);

    let mut sites: BTreeSet<&str> = BTreeSet::new();
    sites.extend(sitemodifiers.keys().map(String::as_str));
    sites.extend(siteschemes.keys().map(String::as_str));

    let rows = sites
        .into_iter()
        .map(|site| {
            let filter = match siteschemes.get(site) {
                Some(scheme) => Filter::from_wire(scheme).unwrap_or(Filter::Normal),
                None => global_filter,
            };
            let mods = sitemodifiers
                .get(site)
                .map(|joined| parse_legacy_modifiers(joined))
                .unwrap_or_else(ModifierSet::empty);

            let mut row = vec![site.to_string(), filter.wire_name().to_string()];
            row.extend(mods.wire_names().into_iter().map(str::to_string));
            row
        })
        .collect();

    Ok(PersistedSettings {
        version: Some(SCHEMA_VERSION),
        enabled: legacy.enabled.as_deref().map(|flag| flag == "true"),
        sites: Some(rows),
        settings: None,
    })
}

/// Parse a raw import payload into the current schema. Payloads already
/// carrying a `sites` array pass through; anything else is treated as a
/// legacy record (including ones wrapped in a `localStorage` object) and
/// migrated. Parse failures abort without producing a payload.
pub fn parse_import(json: &str) -> Result<PersistedSettings, StoreError> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Err(StoreError::EmptyImport);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    let value = match value.get("localStorage") {
        Some(inner) => inner.clone(),
        None => value,
    };

    if value.get("sites").is_some_and(Value::is_array) {
        Ok(serde_json::from_value(value)?)
    } else {
        let legacy: LegacySettings = serde_json::from_value(value)?;
        Ok(migrate_v1_to_v2(&legacy)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DEFAULT_FILTER;

    fn legacy() -> LegacySettings {
        LegacySettings {
            enabled: Some("true".to_string()),
            scheme: Some("delumine-smart".to_string()),
            sitemodifiers: Some(r#"{"a.com": "low_contrast"}"#.to_string()),
            siteschemes: Some(r#"{"a.com": "normal"}"#.to_string()),
        }
    }

    fn row_for<'a>(payload: &'a PersistedSettings, site: &str) -> &'a Vec<String> {
        payload
            .sites
            .as_ref()
            .unwrap()
            .iter()
            .find(|row| row[0] == site)
            .unwrap()
    }

    #[test]
    fn test_migrates_v1_record() {
        let payload = migrate_v1_to_v2(&legacy()).unwrap();
        assert_eq!(payload.enabled, Some(true));

        let row = row_for(&payload, "a.com");
        assert_eq!(row[1], "normal");
        assert!(row.contains(&"low_contrast".to_string()));
    }

    #[test]
    fn test_site_in_single_map_is_kept() {
        let legacy = LegacySettings {
            enabled: Some("false".to_string()),
            scheme: Some("dim1".to_string()),
            sitemodifiers: Some(r#"{"mods-only.com": "killbg,dynamic"}"#.to_string()),
            siteschemes: Some(r#"{"scheme-only.com": "delumine-all"}"#.to_string()),
        };
        let payload = migrate_v1_to_v2(&legacy).unwrap();
        assert_eq!(payload.enabled, Some(false));

        // Modifier-only site takes the global scheme.
        let mods_only = row_for(&payload, "mods-only.com");
        assert_eq!(mods_only[1], "dim1");
        assert_eq!(&mods_only[2..], &["killbg", "dynamic"]);

        // Scheme-only site has no modifiers.
        let scheme_only = row_for(&payload, "scheme-only.com");
        assert_eq!(scheme_only[1], "delumine-all");
        assert_eq!(scheme_only.len(), 2);
    }

    #[test]
    fn test_unknown_legacy_scheme_degrades_to_normal() {
        let legacy = LegacySettings {
            enabled: Some("true".to_string()),
            scheme: Some("delumine-smart".to_string()),
            sitemodifiers: None,
            siteschemes: Some(r#"{"a.com": "delumine-no-invert"}"#.to_string()),
        };
        let payload = migrate_v1_to_v2(&legacy).unwrap();
        assert_eq!(row_for(&payload, "a.com")[1], "normal");
    }

    #[test]
    fn test_malformed_submap_fails_transform() {
        let legacy = LegacySettings {
            sitemodifiers: Some("not json".to_string()),
            ..LegacySettings::default()
        };
        assert!(migrate_v1_to_v2(&legacy).is_err());
    }

    #[test]
    fn test_missing_fields_are_neutral() {
        let payload = migrate_v1_to_v2(&LegacySettings::default()).unwrap();
        assert_eq!(payload.enabled, None);
        assert_eq!(payload.sites.as_deref(), Some(&[][..]));
    }

    #[test]
    fn test_parse_import_v2_passthrough() {
        let payload =
            parse_import(r#"{"version": 2, "enabled": false, "sites": [["t.com", "dim1"]]}"#)
                .unwrap();
        assert_eq!(payload.enabled, Some(false));
        assert_eq!(row_for(&payload, "t.com")[1], "dim1");
    }

    #[test]
    fn test_parse_import_legacy_and_wrapped() {
        let bare = serde_json::to_string(&legacy()).unwrap();
        let payload = parse_import(&bare).unwrap();
        assert_eq!(row_for(&payload, "a.com")[1], "normal");

        let wrapped = format!(r#"{{"localStorage": {bare}}}"#);
        let payload = parse_import(&wrapped).unwrap();
        assert_eq!(row_for(&payload, "a.com")[1], "normal");
    }

    #[test]
    fn test_parse_import_rejects_garbage() {
        assert!(matches!(parse_import("  "), Err(StoreError::EmptyImport)));
        assert!(parse_import("INVALID").is_err());
    }

    #[test]
    fn test_global_scheme_default() {
        let legacy = LegacySettings {
            siteschemes: Some(r#"{"a.com": "dim2"}"#.to_string()),
            sitemodifiers: Some(r#"{"b.com": "low_contrast"}"#.to_string()),
            ..LegacySettings::default()
        };
        let payload = migrate_v1_to_v2(&legacy).unwrap();
        // No global scheme in the legacy record: sites without their own
        // scheme get the stock filter.
        assert_eq!(row_for(&payload, "b.com")[1], DEFAULT_FILTER.wire_name());
    }
}
