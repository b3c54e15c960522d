//! `--args` parsing
//!
//! Generated CI definitions pass every option through one string of
//! semicolon-separated `key[=value]` pairs, e.g. `app=core;version=1.2.0`.

use std::collections::BTreeMap;

/// Parsed `--args` string (keys lowercased, repeated keys last-wins)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgMap {
  values: BTreeMap<String, Option<String>>,
}

impl ArgMap {
  pub fn parse(raw: &str) -> Self {
    let values = raw
      .split(';')
      .map(str::trim)
      .filter(|segment| !segment.is_empty())
      .filter_map(|segment| match segment.split_once('=') {
        Some((key, value)) => {
          let key = key.trim();
          (!key.is_empty()).then(|| (key.to_lowercase(), Some(value.trim().to_string())))
        }
        None => Some((segment.to_lowercase(), None)),
      })
      .collect();
    Self { values }
  }

  /// Value of `key=value`, `None` for bare keys and missing keys
  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).and_then(|v| v.as_deref()).filter(|v| !v.is_empty())
  }

  /// Whether the key appears at all (bare or with a value)
  pub fn has(&self, key: &str) -> bool {
    self.values.contains_key(key)
  }

  /// Comma-separated list value (`app=core,web`)
  pub fn list(&self, key: &str) -> Vec<String> {
    self
      .get(key)
      .map(|v| {
        v.split(',')
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .map(String::from)
          .collect()
      })
      .unwrap_or_default()
  }
}
