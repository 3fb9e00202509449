//! Key/value store for passing data between scenario steps
//!
//! A step that produces something later steps need (the generated username
//! from `add_user`, for instance) records it here, and the scenario resolves
//! `${key}` placeholders against it before calling the next page object.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::{E2eError, E2eResult};

/// Key under which `AdminPage::add_user` records the username it generated.
pub const LAST_CREATED_USERNAME: &str = "lastCreatedUsername";

static GLOBAL: Lazy<TestData> = Lazy::new(TestData::new);

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is valid"));

/// Shared test data
///
/// Clones are handles to the same map. The runner builds a fresh instance per
/// scenario attempt; [`TestData::global`] exists for code that wants a single
/// process-wide store.
#[derive(Debug, Clone, Default)]
pub struct TestData {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl TestData {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance, created on first access
    pub fn global() -> &'static TestData {
        &GLOBAL
    }

    /// Insert or overwrite a value
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.write().insert(key.into(), value.into());
    }

    /// Get a stored value, `None` if the key was never set
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Get a stored value rendered as a string
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get_value(key).map(|v| render(&v))
    }

    /// Remove every entry
    pub fn clear_all(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Replace every `${key}` in `template` with the stored value
    pub fn interpolate(&self, template: &str) -> E2eResult<String> {
        let map = self.inner.read();
        let mut missing = None;

        let out = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            match map.get(key) {
                Some(v) => render(v),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(key) => Err(E2eError::MissingTestData(key)),
            None => Ok(out.into_owned()),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
