//! Scoped settings store
//!
//! Settings live in an ordered map from [`Site`] scope keys to
//! [`SiteSettings`] records, with one distinguished default record at the
//! empty scope plus a global enabled flag and free-form global settings.
//!
//! The pure collection logic lives in [`SiteTable`]; [`SettingsStore`]
//! wraps it with two async storage tiers, memoized hydration, and the
//! legacy-schema migration gate. Each execution context owns its own
//! mirror; cross-context changes arrive as invalidation notifications and
//! force a full re-hydration, never an incremental merge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::scope::Site;
use crate::settings::{
    Filter, GlobalSettings, ModifierSet, ResolvedSettings, SiteSettings, DEFAULT_FILTER,
};

/// Current persisted-schema version, recorded in the local tier once
/// migration from the flat v1 shape has run.
pub const SCHEMA_VERSION: u32 = 2;

const KEY_ENABLED: &str = "enabled";
const KEY_SITES: &str = "sites";
const KEY_SETTINGS: &str = "settings";
const KEY_MIGRATION: &str = "migrationComplete";
const KEY_INSTALLED_VERSION: &str = "installedVersion";

// =============================================================================
// Errors
// =============================================================================

/// Failure inside a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid settings payload: {0}")]
    BadPayload(#[from] serde_json::Error),
    #[error("no data provided")]
    EmptyImport,
}

// =============================================================================
// Storage Areas
// =============================================================================

/// Async key-value capability backing one persistence tier.
#[allow(async_fn_in_trait)]
pub trait StorageArea {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage area for tests and offline tooling.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: std::sync::Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageArea for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// Persisted Shape (v2)
// =============================================================================

/// The synchronized-tier record. Site rows are string tuples
/// `[siteKey, filter, ...modifiers]`; the empty key is the default scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<GlobalSettings>,
}

fn encode_row(site: &Site, record: &SiteSettings) -> Vec<String> {
    let mut row = Vec::with_capacity(2 + record.mods.wire_names().len());
    row.push(site.key());
    row.push(record.filter.wire_name().to_string());
    row.extend(record.mods.wire_names().into_iter().map(str::to_string));
    row
}

fn decode_row(row: &[String]) -> Option<(Site, SiteSettings)> {
    let key = row.first()?;
    let site = Site::parse_key(key);
    let filter = row
        .get(1)
        .and_then(|name| Filter::from_wire(name))
        .unwrap_or(DEFAULT_FILTER);
    let mods = ModifierSet::from_wire_names(row.iter().skip(2).map(String::as_str));
    Some((site, SiteSettings { filter, mods }))
}

// =============================================================================
// Site Table
// =============================================================================

/// The in-memory mirror of the persisted collection: ordered site records,
/// the default record, the enabled flag, and global settings.
///
/// Upserts re-append their entry, so iteration order doubles as recency;
/// resolution ties go to the most recently set record.
#[derive(Debug, Clone)]
pub struct SiteTable {
    enabled: bool,
    default_record: Option<SiteSettings>,
    entries: Vec<(Site, SiteSettings)>,
    globals: GlobalSettings,
}

impl Default for SiteTable {
    fn default() -> Self {
        Self {
            enabled: true,
            default_record: None,
            entries: Vec::new(),
            globals: GlobalSettings::new(),
        }
    }
}

impl SiteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a mirror from the three persisted values. Missing or
    /// foreign-typed fields degrade to the baseline, row by row.
    pub fn from_values(
        enabled: Option<&Value>,
        sites: Option<&Value>,
        settings: Option<&Value>,
    ) -> Self {
        let mut table = Self::new();

        if let Some(enabled) = enabled.and_then(Value::as_bool) {
            table.enabled = enabled;
        }

        if let Some(rows) = sites.and_then(Value::as_array) {
            let rows: Vec<Vec<String>> = rows
                .iter()
                .filter_map(|row| {
                    let row = row.as_array()?;
                    row.iter()
                        .map(|part| part.as_str().map(str::to_string))
                        .collect()
                })
                .collect();
            table.load_rows(&rows);
        }

        if let Some(map) = settings.and_then(Value::as_object) {
            for (key, value) in map {
                if let Some(value) = value.as_str() {
                    table.globals.insert(key.clone(), value.to_string());
                }
            }
        }

        table
    }

    pub fn from_persisted(payload: &PersistedSettings) -> Self {
        let mut table = Self::new();
        table.apply(payload);
        table
    }

    /// Overlay the fields present in a persisted payload.
    pub fn apply(&mut self, payload: &PersistedSettings) {
        if let Some(enabled) = payload.enabled {
            self.enabled = enabled;
        }
        if let Some(rows) = &payload.sites {
            self.load_rows(rows);
        }
        if let Some(settings) = &payload.settings {
            self.globals = settings.clone();
        }
    }

    fn load_rows(&mut self, rows: &[Vec<String>]) {
        self.default_record = None;
        self.entries.clear();
        for row in rows {
            let Some((site, record)) = decode_row(row) else {
                continue;
            };
            self.set(site, record);
        }
    }

    /// Encode the whole collection for persistence.
    pub fn to_persisted(&self) -> PersistedSettings {
        PersistedSettings {
            version: Some(SCHEMA_VERSION),
            enabled: Some(self.enabled),
            sites: Some(self.site_rows()),
            settings: Some(self.globals.clone()),
        }
    }

    fn site_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(1 + self.entries.len());
        if let Some(record) = &self.default_record {
            rows.push(encode_row(&Site::default(), record));
        }
        for (site, record) in &self.entries {
            rows.push(encode_row(site, record));
        }
        rows
    }

    /// The record applied when no more specific scope matches.
    pub fn default_record(&self) -> SiteSettings {
        self.default_record.clone().unwrap_or_else(SiteSettings::baseline)
    }

    /// Resolve a URL to the most specific matching record.
    pub fn resolve(&self, url: &str) -> SiteSettings {
        self.resolve_scope(&Site::from_url(url))
    }

    fn resolve_scope(&self, target: &Site) -> SiteSettings {
        let mut best: Option<(&SiteSettings, (usize, usize))> = None;
        for (site, record) in &self.entries {
            if !site.matches(target) {
                continue;
            }
            let specificity = site.specificity();
            // `>=` so the most recently set entry wins ties.
            if best.map_or(true, |(_, current)| specificity >= current) {
                best = Some((record, specificity));
            }
        }
        match best {
            Some((record, _)) => record.clone(),
            None => self.default_record(),
        }
    }

    pub fn get_exact(&self, site: &Site) -> Option<&SiteSettings> {
        if site.is_default() {
            return self.default_record.as_ref();
        }
        self.entries
            .iter()
            .find(|(stored, _)| stored == site)
            .map(|(_, record)| record)
    }

    /// Upsert, replacing an existing record for the exact key entirely.
    pub fn set(&mut self, site: Site, record: SiteSettings) {
        if site.is_default() {
            self.default_record = Some(record);
            return;
        }
        self.entries.retain(|(stored, _)| stored != &site);
        self.entries.push((site, record));
    }

    pub fn add_modifier(&mut self, site: Site, modifier: ModifierSet) {
        let mut record = self
            .get_exact(&site)
            .cloned()
            .unwrap_or_else(|| self.default_record());
        record.mods |= modifier;
        self.set(site, record);
    }

    pub fn remove_modifier(&mut self, site: Site, modifier: ModifierSet) {
        let mut record = self
            .get_exact(&site)
            .cloned()
            .unwrap_or_else(|| self.default_record());
        record.mods -= modifier;
        self.set(site, record);
    }

    /// Remove the exact key. Missing keys are a no-op.
    pub fn delete(&mut self, site: &Site) -> bool {
        if site.is_default() {
            let had = self.default_record.is_some();
            self.default_record = None;
            return had;
        }
        let before = self.entries.len();
        self.entries.retain(|(stored, _)| stored != site);
        self.entries.len() != before
    }

    /// Clear every non-default key. Default record, enabled flag, and
    /// global settings are untouched.
    pub fn reset_all(&mut self) {
        self.entries.clear();
    }

    /// True iff an exact record exists for `site` and differs from the
    /// default record.
    pub fn changed_from_default(&self, site: &Site) -> bool {
        if site.is_default() {
            return false;
        }
        match self.get_exact(site) {
            Some(record) => *record != self.default_record(),
            None => false,
        }
    }

    /// Cycle the host-wide filter for a URL: any non-normal filter turns
    /// off (`normal`); `normal` turns back to the default filter, or the
    /// stock filter when the default itself is `normal`.
    pub fn toggle_site(&mut self, url: &str) -> Filter {
        let default_filter = self.default_record().filter;
        let current = self.resolve(url).filter;
        let next = if current != Filter::Normal {
            Filter::Normal
        } else if default_filter != Filter::Normal {
            default_filter
        } else {
            DEFAULT_FILTER
        };

        let site = Site::host_of_url(url);
        if site.is_default() {
            // Unresolvable URL: nothing to key the override under.
            return next;
        }
        let mut record = self
            .get_exact(&site)
            .cloned()
            .unwrap_or_else(|| self.default_record());
        record.filter = next;
        self.set(site, record);
        next
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn globals(&self) -> &GlobalSettings {
        &self.globals
    }

    pub fn set_global(&mut self, key: &str, value: &str) {
        self.globals.insert(key.to_string(), value.to_string());
    }

    /// The message handed to the injection layer for one URL.
    pub fn resolved(&self, url: &str) -> ResolvedSettings {
        ResolvedSettings::new(self.enabled, &self.resolve(url), &self.globals)
    }
}

// =============================================================================
// Settings Store
// =============================================================================

struct CachedState {
    table: SiteTable,
    hydrated: bool,
}

/// The per-context settings store: a [`SiteTable`] mirror hydrated from
/// the synchronized tier, with migration bookkeeping in the local tier.
///
/// All reads operate on the mirror. Mutations are read-modify-write
/// against the mirror followed by a full-collection persisted write; the
/// last full write wins across contexts.
pub struct SettingsStore<S, L> {
    synced: S,
    local: L,
    state: Mutex<CachedState>,
}

impl<S: StorageArea, L: StorageArea> SettingsStore<S, L> {
    pub fn new(synced: S, local: L) -> Self {
        Self {
            synced,
            local,
            state: Mutex::new(CachedState {
                table: SiteTable::new(),
                hydrated: false,
            }),
        }
    }

    /// Lock the mirror, hydrating it first if needed. Concurrent callers
    /// queue on the lock and reuse the one hydrated mirror; the load runs
    /// once per invalidation, not once per caller.
    async fn state(&self) -> Result<MutexGuard<'_, CachedState>, StoreError> {
        let mut guard = self.state.lock().await;
        if !guard.hydrated {
            guard.table = self.load().await?;
            guard.hydrated = true;
        }
        Ok(guard)
    }

    async fn load(&self) -> Result<SiteTable, StoreError> {
        let enabled = self.synced.get(KEY_ENABLED).await?;
        let sites = self.synced.get(KEY_SITES).await?;
        let settings = self.synced.get(KEY_SETTINGS).await?;
        let table = SiteTable::from_values(enabled.as_ref(), sites.as_ref(), settings.as_ref());
        log::debug!(
            "hydrated settings mirror: enabled={}, {} site records",
            table.enabled(),
            table.entries.len()
        );
        Ok(table)
    }

    /// Force the next read to re-hydrate from storage.
    pub async fn invalidate(&self) {
        self.state.lock().await.hydrated = false;
    }

    /// Another execution context changed persisted state: drop the mirror
    /// wholesale. No incremental patching.
    pub async fn on_external_change(&self) {
        log::debug!("external settings change, discarding mirror");
        self.invalidate().await;
    }

    pub async fn hydrate(&self) -> Result<(), StoreError> {
        self.state().await.map(|_| ())
    }

    pub async fn resolve(&self, url: &str) -> Result<SiteSettings, StoreError> {
        Ok(self.state().await?.table.resolve(url))
    }

    pub async fn resolved_message(&self, url: &str) -> Result<ResolvedSettings, StoreError> {
        Ok(self.state().await?.table.resolved(url))
    }

    pub async fn set(&self, site: Site, record: SiteSettings) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        guard.table.set(site, record);
        self.persist_sites(&guard.table).await
    }

    pub async fn add_modifier(&self, site: Site, modifier: ModifierSet) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        guard.table.add_modifier(site, modifier);
        self.persist_sites(&guard.table).await
    }

    pub async fn remove_modifier(
        &self,
        site: Site,
        modifier: ModifierSet,
    ) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        guard.table.remove_modifier(site, modifier);
        self.persist_sites(&guard.table).await
    }

    pub async fn delete(&self, site: &Site) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        if guard.table.delete(site) {
            self.persist_sites(&guard.table).await?;
        }
        Ok(())
    }

    pub async fn reset_all(&self) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        guard.table.reset_all();
        self.persist_sites(&guard.table).await
    }

    pub async fn toggle_site(&self, url: &str) -> Result<Filter, StoreError> {
        let mut guard = self.state().await?;
        let next = guard.table.toggle_site(url);
        self.persist_sites(&guard.table).await?;
        Ok(next)
    }

    pub async fn changed_from_default(&self, site: &Site) -> Result<bool, StoreError> {
        Ok(self.state().await?.table.changed_from_default(site))
    }

    pub async fn enabled(&self) -> Result<bool, StoreError> {
        Ok(self.state().await?.table.enabled())
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        guard.table.set_enabled(enabled);
        self.synced.set(KEY_ENABLED, Value::Bool(enabled)).await?;
        Ok(())
    }

    pub async fn global_settings(&self) -> Result<GlobalSettings, StoreError> {
        Ok(self.state().await?.table.globals().clone())
    }

    pub async fn set_global_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        guard.table.set_global(key, value);
        let settings = serde_json::to_value(guard.table.globals())?;
        self.synced.set(KEY_SETTINGS, settings).await?;
        Ok(())
    }

    async fn persist_sites(&self, table: &SiteTable) -> Result<(), StoreError> {
        let rows = serde_json::to_value(table.site_rows())?;
        self.synced.set(KEY_SITES, rows).await?;
        Ok(())
    }

    async fn persist_all(&self, table: &SiteTable) -> Result<(), StoreError> {
        self.synced
            .set(KEY_ENABLED, Value::Bool(table.enabled()))
            .await?;
        let rows = serde_json::to_value(table.site_rows())?;
        self.synced.set(KEY_SITES, rows).await?;
        let settings = serde_json::to_value(table.globals())?;
        self.synced.set(KEY_SETTINGS, settings).await?;
        Ok(())
    }

    /// Overlay an imported or migrated payload and persist everything.
    pub async fn apply_persisted(&self, payload: &PersistedSettings) -> Result<(), StoreError> {
        let mut guard = self.state().await?;
        guard.table.apply(payload);
        self.persist_all(&guard.table).await
    }

    /// Import a raw settings payload: current-schema payloads apply
    /// directly, legacy payloads are migrated first. A payload that fails
    /// to parse aborts without touching the store.
    pub async fn import_json(&self, json: &str) -> Result<(), StoreError> {
        let payload = crate::migrate::parse_import(json)?;
        self.apply_persisted(&payload).await
    }

    /// Run the v1 → v2 migration once per installation, gated on the
    /// local-tier version marker. Reruns are no-ops.
    pub async fn migrate_from_legacy(
        &self,
        legacy: &crate::migrate::LegacySettings,
    ) -> Result<bool, StoreError> {
        if self.migration_complete().await? {
            log::debug!("migration marker at v{SCHEMA_VERSION}, skipping");
            return Ok(false);
        }
        let payload = crate::migrate::migrate_v1_to_v2(legacy)?;
        self.apply_persisted(&payload).await?;
        self.local
            .set(KEY_MIGRATION, Value::from(SCHEMA_VERSION))
            .await?;
        log::debug!("migrated legacy settings to v{SCHEMA_VERSION}");
        Ok(true)
    }

    async fn migration_complete(&self) -> Result<bool, StoreError> {
        Ok(match self.local.get(KEY_MIGRATION).await? {
            Some(marker) => marker.as_u64().unwrap_or(0) >= u64::from(SCHEMA_VERSION),
            None => false,
        })
    }

    pub async fn record_installed_version(&self, version: &str) -> Result<(), StoreError> {
        self.local
            .set(KEY_INSTALLED_VERSION, Value::from(version))
            .await?;
        Ok(())
    }

    pub async fn installed_version(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .local
            .get(KEY_INSTALLED_VERSION)
            .await?
            .and_then(|value| value.as_str().map(str::to_string)))
    }
}
