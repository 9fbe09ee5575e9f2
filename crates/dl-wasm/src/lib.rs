//! WebAssembly bindings for the Delumen engine
//!
//! The extension's JS layer owns storage I/O and messaging; it hands the
//! persisted settings record to `init` (again after every storage change)
//! and calls the query functions below per tab and per element.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;

use dl_core::classify::{bg_image_kind, is_animated_gif, CachedResolver, CssColorResolver};
use dl_core::migrate::parse_import;
use dl_core::scope::Site;
use dl_core::settings::ResolvedSettings;
use dl_core::store::{PersistedSettings, SiteTable};
use dl_core::url::is_disallowed_url;

thread_local! {
    static TABLE: RefCell<Option<SiteTable>> = RefCell::new(None);
    static COLORS: RefCell<CachedResolver<CssColorResolver>> =
        RefCell::new(CachedResolver::default());
}

/// Load (or reload) the settings table from a persisted v2 JSON record.
/// Call again whenever the JS layer observes a storage change; the table
/// is rebuilt wholesale, never patched.
#[wasm_bindgen]
pub fn init(settings_json: &str) -> Result<(), JsValue> {
    let payload: PersistedSettings = serde_json::from_str(settings_json)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse settings: {}", e)))?;

    TABLE.with(|table| {
        *table.borrow_mut() = Some(SiteTable::from_persisted(&payload));
    });
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    TABLE.with(|table| table.borrow().is_some())
}

/// Resolve the settings message for one URL. Before `init`, yields the
/// baseline message rather than failing the caller.
#[wasm_bindgen]
pub fn resolve_settings(url: &str) -> JsValue {
    let message = TABLE.with(|table| match table.borrow().as_ref() {
        Some(table) => table.resolved(url),
        None => {
            web_sys::console::warn_1(&JsValue::from_str(
                "delumen: resolve before init, using baseline settings",
            ));
            SiteTable::new().resolved(url)
        }
    });
    resolved_to_js(&message)
}

/// Canonical scope key of a URL's full selection.
#[wasm_bindgen]
pub fn site_key(url: &str) -> String {
    Site::from_url(url).key()
}

/// Canonical scope key of a URL's whole host.
#[wasm_bindgen]
pub fn host_key(url: &str) -> String {
    Site::host_of_url(url).key()
}

/// True for browser-internal URLs the extension must not touch.
#[wasm_bindgen]
pub fn url_disallowed(url: &str) -> bool {
    is_disallowed_url(url)
}

/// Classify a CSS color string: -1 dark, 0 neutral, 1 light.
#[wasm_bindgen]
pub fn color_valence(color: &str) -> i8 {
    COLORS.with(|colors| colors.borrow_mut().valence(color).as_i8())
}

/// Sniff the family of a resolved `background-image` value, or `None`
/// when there is no background image.
#[wasm_bindgen]
pub fn background_image_kind(value: &str) -> Option<String> {
    bg_image_kind(value).map(|kind| kind.as_str().to_string())
}

/// Scan raw image bytes for a second GIF frame.
#[wasm_bindgen]
pub fn is_animated_image(bytes: &[u8]) -> bool {
    is_animated_gif(bytes)
}

/// Migrate a legacy (or mixed) settings export to the current schema,
/// returned as JSON for the JS layer to persist.
#[wasm_bindgen]
pub fn migrate_settings(json: &str) -> Result<String, JsValue> {
    let payload = parse_import(json)
        .map_err(|e| JsValue::from_str(&format!("Failed to migrate settings: {}", e)))?;
    serde_json::to_string(&payload)
        .map_err(|e| JsValue::from_str(&format!("Failed to encode settings: {}", e)))
}

fn resolved_to_js(message: &ResolvedSettings) -> JsValue {
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &result,
        &"enabled".into(),
        &JsValue::from(message.enabled),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"filter".into(),
        &JsValue::from_str(&message.filter),
    );

    let modifiers = js_sys::Array::new();
    for modifier in &message.modifiers {
        modifiers.push(&JsValue::from_str(modifier));
    }
    let _ = js_sys::Reflect::set(&result, &"modifiers".into(), &modifiers);

    let settings = js_sys::Object::new();
    for (key, value) in &message.settings {
        let _ = js_sys::Reflect::set(
            &settings,
            &JsValue::from_str(key),
            &JsValue::from_str(value),
        );
    }
    let _ = js_sys::Reflect::set(&result, &"settings".into(), &settings);

    result.into()
}
