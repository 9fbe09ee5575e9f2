//! Delumen Core Library
//!
//! This crate provides the core engine for the Delumen per-page visual
//! transform: a hierarchical URL-scope model, the scoped settings store
//! that resolves URLs to the most specific matching rule, and the content
//! classification heuristics that tune the transform per element.
//!
//! # Architecture
//!
//! The scope model produces [`Site`] keys; the store maps them to settings
//! records across two async storage tiers and hands the injection layer a
//! resolved message per URL. The classification heuristics are pure
//! functions over colors, document snapshots, and raw image bytes. Host
//! plumbing (messaging, script injection, DOM observation, rendering) is
//! deliberately outside this crate.
//!
//! # Modules
//!
//! - `url`: URL decomposition without allocations on the hot path
//! - `scope`: `Site` scope keys and their canonical strings
//! - `selector`: the interactive scope-boundary builder
//! - `settings`: filters, modifier flags, and the resolved message
//! - `store`: the scoped settings store and its persistence tiers
//! - `migrate`: legacy v1 schema migration
//! - `classify`: color valence, page tone, and image heuristics

pub mod classify;
pub mod migrate;
pub mod scope;
pub mod selector;
pub mod settings;
pub mod store;
pub mod url;

// Re-export commonly used types
pub use classify::{BgImageKind, CachedResolver, PageSnapshot, Tone, Valence};
pub use migrate::{migrate_v1_to_v2, LegacySettings};
pub use scope::Site;
pub use selector::UrlSelector;
pub use settings::{Filter, GlobalSettings, ModifierSet, ResolvedSettings, SiteSettings};
pub use store::{MemoryStorage, SettingsStore, SiteTable, StorageArea, StoreError};
