//! Reference Resolution
//!
//! Materializes `$include` directives and externally sourced resources
//! (`uri`) so that compilation sees a single self-contained model tree.
//! Runs to completion before anything is compiled; any failure aborts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::{Map, Value};

use crate::config::ResolverConfig;
use crate::error::{Result, SchemaError};

const INCLUDE_KEY: &str = "$include";

/// Where a document was loaded from; relative references resolve against it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    File(PathBuf),
    Remote(Url),
}

impl Location {
    fn is_remote_reference(reference: &str) -> bool {
        let lower = reference.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// Resolve a reference relative to this document
    pub fn join(&self, reference: &str) -> Result<Location> {
        if Self::is_remote_reference(reference) {
            return Url::parse(reference)
                .map(Location::Remote)
                .map_err(|e| SchemaError::RemoteFetch {
                    uri: reference.to_string(),
                    reason: e.to_string(),
                });
        }
        match self {
            Location::File(path) => {
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::File(base.join(reference)))
            }
            Location::Remote(url) => url
                .join(reference)
                .map(Location::Remote)
                .map_err(|e| SchemaError::RemoteFetch {
                    uri: reference.to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Resolves includes and resource URIs, caching every fetched document
pub struct ReferenceResolver {
    allow_remote: bool,
    timeout: Duration,
    cache: HashMap<Location, Value>,
    /// Documents currently being resolved (cycle detection)
    in_progress: Vec<Location>,
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl ReferenceResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            allow_remote: config.allow_remote,
            timeout: Duration::from_secs(config.timeout_secs),
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Load a model file and resolve everything it references
    pub fn load_model(&mut self, path: &Path) -> Result<Value> {
        let location = Location::File(path.to_path_buf());
        let document = self.fetch(&location)?;
        tracing::debug!("Resolving references in {}", location);
        self.resolve_document(document, &location)
    }

    /// Resolve includes, then substitute resource bodies sourced by `uri`
    pub fn resolve_document(&mut self, document: Value, location: &Location) -> Result<Value> {
        let document = self.resolve_includes(document, location)?;
        self.resolve_resource_uris(document, location)
    }

    fn resolve_includes(&mut self, node: Value, location: &Location) -> Result<Value> {
        match node {
            Value::Object(map) => {
                let mut map = if map.contains_key(INCLUDE_KEY) {
                    self.expand_include(map, location)?
                } else {
                    map
                };
                for value in map.values_mut() {
                    let taken = value.take();
                    *value = self.resolve_includes(taken, location)?;
                }
                Ok(Value::Object(map))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.resolve_includes(item, location))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    /// Replace an `$include` directive by the keys of the included object.
    fn expand_include(&mut self, map: Map<String, Value>, location: &Location) -> Result<Map<String, Value>> {
        let reference = match map.get(INCLUDE_KEY) {
            Some(Value::String(reference)) => reference.clone(),
            _ => {
                return Err(SchemaError::ReferenceUnreadable {
                    path: location.to_string(),
                    reason: format!("{} must be a string", INCLUDE_KEY),
                })
            }
        };

        let included = match self.load_reference(&reference, location)? {
            Value::Object(included) => included,
            _ => return Err(SchemaError::IncludeNotObject { reference }),
        };

        let mut merged: Map<String, Value> = map
            .into_iter()
            .filter(|(key, _)| key != INCLUDE_KEY)
            .collect();
        for (key, value) in included {
            merged.insert(key, value);
        }
        Ok(merged)
    }

    fn resolve_resource_uris(&mut self, mut document: Value, location: &Location) -> Result<Value> {
        let Some(groups) = document.get_mut("groups").and_then(Value::as_object_mut) else {
            return Ok(document);
        };
        for group in groups.values_mut() {
            let Some(resources) = group.get_mut("resources").and_then(Value::as_object_mut) else {
                continue;
            };
            for (name, resource) in resources.iter_mut() {
                let Some(uri) = resource.get("uri").and_then(Value::as_str).map(str::to_string) else {
                    continue;
                };
                tracing::debug!("Loading resource '{}' from {}", name, uri);
                let body = self.load_reference(&uri, location)?;
                if !body.is_object() {
                    return Err(SchemaError::IncludeNotObject { reference: uri });
                }
                *resource = body;
            }
        }
        Ok(document)
    }

    /// Load `<path>[#<pointer>]` relative to `base`, fully resolved
    fn load_reference(&mut self, reference: &str, base: &Location) -> Result<Value> {
        let (target, pointer) = match reference.split_once('#') {
            Some((target, pointer)) => (target, pointer),
            None => (reference, ""),
        };
        let location = base.join(target)?;

        if self.in_progress.contains(&location) {
            return Err(SchemaError::ReferenceUnreadable {
                path: location.to_string(),
                reason: "circular include".to_string(),
            });
        }

        let document = self.fetch(&location)?;
        self.in_progress.push(location.clone());
        let resolved = self.resolve_includes(document, &location);
        self.in_progress.pop();
        let resolved = resolved?;

        select_pointer(resolved, pointer, reference)
    }

    /// Read and parse a document, from cache when possible
    fn fetch(&mut self, location: &Location) -> Result<Value> {
        if let Some(cached) = self.cache.get(location) {
            return Ok(cached.clone());
        }

        let content = match location {
            Location::File(path) => {
                if !path.is_file() {
                    return Err(SchemaError::ReferenceNotFound {
                        path: path.display().to_string(),
                    });
                }
                fs::read_to_string(path).map_err(|e| SchemaError::ReferenceUnreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            Location::Remote(url) => self.fetch_remote(url)?,
        };

        let document: Value =
            serde_json::from_str(&content).map_err(|e| SchemaError::ReferenceUnreadable {
                path: location.to_string(),
                reason: e.to_string(),
            })?;
        self.cache.insert(location.clone(), document.clone());
        Ok(document)
    }

    fn fetch_remote(&self, url: &Url) -> Result<String> {
        if !self.allow_remote {
            return Err(SchemaError::RemoteDisabled { uri: url.to_string() });
        }
        tracing::debug!("Fetching {}", url);
        let remote_error = |e: reqwest::Error| SchemaError::RemoteFetch {
            uri: url.to_string(),
            reason: e.to_string(),
        };
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(remote_error)?;
        client
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(remote_error)
    }
}

/// Navigate to a sub-document with an RFC 6901 pointer; empty selects all.
pub fn select_pointer(document: Value, pointer: &str, reference: &str) -> Result<Value> {
    if pointer.is_empty() {
        return Ok(document);
    }
    let pointer = if pointer.starts_with('/') {
        pointer.to_string()
    } else {
        format!("/{}", pointer)
    };
    document
        .pointer(&pointer)
        .cloned()
        .ok_or_else(|| SchemaError::InvalidPointer {
            reference: reference.to_string(),
            pointer,
        })
}
