//! # OpenAPI Schema Validation
//!
//! Validates compiled manifests against the Kubernetes OpenAPI schema set
//! for a target version.
//!
//! The `swagger.json` for a version is downloaded once into a user-scoped
//! cache directory and reused across runs; a cache file that fails to
//! parse (for example, a partial write by a racing process) is
//! re-downloaded once. Within a process the parsed document lives behind
//! scoped single-initialisation on the [`Validator`] instance, so
//! concurrent walkers share one parse.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::debug;
use serde_json::Value as JsonValue;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::mergepatch;

/// Probe URL for the current stable Kubernetes version.
pub const STABLE_VERSION_URL: &str = "https://dl.k8s.io/release/stable.txt";

/// Canonical raw-content URL of the schema set for a version.
pub fn swagger_url(version: &str) -> String {
    format!(
        "https://raw.githubusercontent.com/kubernetes/kubernetes/{}/api/openapi-spec/swagger.json",
        version
    )
}

/// User-scoped cache directory for a version's schema set.
pub fn schema_cache_dir(version: &str) -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| Error::Filesystem {
        path: "~".to_string(),
        message: "cannot determine home directory".to_string(),
    })?;
    Ok(home.join(".kubevendor").join(version).join("openapi-spec"))
}

/// Fetch the current stable Kubernetes version from the release channel.
pub fn fetch_stable_version() -> Result<String> {
    let body = ureq::get(STABLE_VERSION_URL)
        .call()
        .map_err(|e| Error::Network {
            url: STABLE_VERSION_URL.to_string(),
            message: e.to_string(),
        })?
        .into_string()
        .map_err(|e| Error::Network {
            url: STABLE_VERSION_URL.to_string(),
            message: e.to_string(),
        })?;
    Ok(body.trim().to_string())
}

/// The parsed schema set for one Kubernetes version: the definitions table
/// plus an index from group/version/kind to definition name.
pub struct SchemaSet {
    definitions: serde_json::Map<String, JsonValue>,
    gvk_index: HashMap<(String, String, String), String>,
}

impl SchemaSet {
    /// Build from a parsed `swagger.json` document.
    pub fn from_document(doc: JsonValue, version: &str) -> Result<Self> {
        let definitions = doc
            .get("definitions")
            .and_then(JsonValue::as_object)
            .cloned()
            .ok_or_else(|| Error::Schema {
                version: version.to_string(),
                message: "document has no definitions table".to_string(),
            })?;

        let mut gvk_index = HashMap::new();
        for (name, definition) in &definitions {
            let Some(gvks) = definition
                .get("x-kubernetes-group-version-kind")
                .and_then(JsonValue::as_array)
            else {
                continue;
            };
            for gvk in gvks {
                let group = gvk.get("group").and_then(JsonValue::as_str).unwrap_or("");
                let ver = gvk.get("version").and_then(JsonValue::as_str).unwrap_or("");
                let kind = gvk.get("kind").and_then(JsonValue::as_str).unwrap_or("");
                gvk_index.insert(
                    (group.to_string(), ver.to_string(), kind.to_string()),
                    name.clone(),
                );
            }
        }

        Ok(SchemaSet {
            definitions,
            gvk_index,
        })
    }

    fn definition_for(&self, api_version: &str, kind: &str) -> Option<&JsonValue> {
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        let name = self.gvk_index.get(&(
            group.to_string(),
            version.to_string(),
            kind.to_string(),
        ))?;
        self.definitions.get(name)
    }

    fn resolve<'a>(&'a self, schema: &'a JsonValue) -> &'a JsonValue {
        if let Some(reference) = schema.get("$ref").and_then(JsonValue::as_str) {
            if let Some(name) = reference.strip_prefix("#/definitions/") {
                if let Some(resolved) = self.definitions.get(name) {
                    return resolved;
                }
            }
        }
        schema
    }

    /// Structural check of `value` against `schema`. `at` names the field
    /// path for error messages.
    fn check(&self, value: &JsonValue, schema: &JsonValue, at: &str) -> std::result::Result<(), String> {
        let schema = self.resolve(schema);

        // Optional fields may be explicitly null.
        if value.is_null() {
            return Ok(());
        }

        // int-or-string fields accept either representation.
        if schema
            .get("x-kubernetes-int-or-string")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
            || schema.get("format").and_then(JsonValue::as_str) == Some("int-or-string")
        {
            return if value.is_string() || value.is_number() {
                Ok(())
            } else {
                Err(format!("{}: expected integer or string", at))
            };
        }

        let declared_type = schema.get("type").and_then(JsonValue::as_str);
        match declared_type {
            Some("object") => self.check_object(value, schema, at),
            None if schema.get("properties").is_some() => self.check_object(value, schema, at),
            Some("array") => {
                let Some(items) = value.as_array() else {
                    return Err(format!("{}: expected array", at));
                };
                let item_schema = schema.get("items").unwrap_or(&JsonValue::Null);
                if item_schema.is_null() {
                    return Ok(());
                }
                for (i, item) in items.iter().enumerate() {
                    self.check(item, item_schema, &format!("{}[{}]", at, i))?;
                }
                Ok(())
            }
            Some("string") => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(format!("{}: expected string", at))
                }
            }
            Some("integer") => {
                if value.as_i64().is_some() || value.as_u64().is_some() {
                    Ok(())
                } else {
                    Err(format!("{}: expected integer", at))
                }
            }
            Some("number") => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(format!("{}: expected number", at))
                }
            }
            Some("boolean") => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("{}: expected boolean", at))
                }
            }
            // Untyped definitions accept anything.
            _ => Ok(()),
        }
    }

    fn check_object(
        &self,
        value: &JsonValue,
        schema: &JsonValue,
        at: &str,
    ) -> std::result::Result<(), String> {
        let Some(map) = value.as_object() else {
            return Err(format!("{}: expected object", at));
        };

        let properties = schema.get("properties").and_then(JsonValue::as_object);
        let additional = schema.get("additionalProperties");

        if let Some(required) = schema.get("required").and_then(JsonValue::as_array) {
            for field in required.iter().filter_map(JsonValue::as_str) {
                if !map.contains_key(field) {
                    return Err(format!("{}: missing required field \"{}\"", at, field));
                }
            }
        }

        for (key, child) in map {
            let child_at = if at.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", at, key)
            };
            match properties.and_then(|p| p.get(key)) {
                Some(child_schema) => self.check(child, child_schema, &child_at)?,
                None => match additional {
                    Some(extra_schema) if extra_schema.is_object() => {
                        self.check(child, extra_schema, &child_at)?
                    }
                    Some(_) => {}
                    None => {
                        // A closed object: fields outside the schema are
                        // rejected, unless the schema is entirely untyped.
                        if properties.is_some() {
                            return Err(format!("unknown field \"{}\"", child_at));
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// Validates a tree of compiled manifests against a version's schema set.
pub struct Validator {
    version: String,
    schema: OnceLock<SchemaSet>,
}

impl Validator {
    /// Build a validator for an explicit version, or for the current
    /// stable version when none is given (probed once per process).
    pub fn new(version: Option<String>) -> Result<Self> {
        let version = match version {
            Some(version) => version,
            None => {
                let stable = fetch_stable_version()?;
                debug!("stable Kubernetes version: {}", stable);
                stable
            }
        };
        Ok(Validator {
            version,
            schema: OnceLock::new(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The parsed schema set, loaded and parsed once per process.
    fn schema(&self) -> Result<&SchemaSet> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }
        let doc = load_or_download(&self.version)?;
        let set = SchemaSet::from_document(doc, &self.version)?;
        Ok(self.schema.get_or_init(|| set))
    }

    /// Validate a single YAML file.
    pub fn validate_file(&self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
        let doc: serde_yaml::Value =
            serde_yaml::from_str(&raw).map_err(|e| Error::Validation {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let json = mergepatch::yaml_to_json(&doc).map_err(|e| Error::Validation {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.validate_value(&json).map_err(|message| Error::Validation {
            path: path.display().to_string(),
            message,
        })
    }

    /// Validate one parsed document. Returns the failure message on error.
    pub fn validate_value(&self, doc: &JsonValue) -> std::result::Result<(), String> {
        let schema = self.schema().map_err(|e| e.to_string())?;

        let api_version = doc
            .get("apiVersion")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| "document has no apiVersion".to_string())?;
        let kind = doc
            .get("kind")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| "document has no kind".to_string())?;

        let definition = schema.definition_for(api_version, kind).ok_or_else(|| {
            format!(
                "no schema for {} {} in Kubernetes {}",
                api_version, kind, self.version
            )
        })?;

        schema.check(doc, definition, "")
    }

    /// Walk `outlook_root` lexicographically, validating every file.
    ///
    /// `on_valid` runs after each successful file; the first failure
    /// aborts the walk.
    pub fn validate_tree(
        &self,
        outlook_root: &Path,
        mut on_valid: impl FnMut(&Path),
    ) -> Result<usize> {
        let mut checked = 0;
        for entry in WalkDir::new(outlook_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            self.validate_file(entry.path())?;
            on_valid(entry.path());
            checked += 1;
        }
        Ok(checked)
    }
}

/// Load the cached `swagger.json` for `version`, downloading it on a miss
/// and re-downloading once when the cached copy does not parse.
fn load_or_download(version: &str) -> Result<JsonValue> {
    let dir = schema_cache_dir(version)?;
    let path = dir.join("swagger.json");

    if path.is_file() {
        let raw = fs::read_to_string(&path).map_err(|e| Error::fs(&path, e))?;
        match serde_json::from_str(&raw) {
            Ok(doc) => return Ok(doc),
            Err(e) => {
                // A partially-written cache from a racing process; replace
                // it.
                debug!("cached schema at {} unreadable ({}), re-downloading", path.display(), e);
            }
        }
    }

    let body = download_swagger(version)?;
    let doc: JsonValue = serde_json::from_str(&body).map_err(|e| Error::Schema {
        version: version.to_string(),
        message: format!("downloaded schema does not parse: {}", e),
    })?;
    persist_cache(&dir, &path, &body)?;
    Ok(doc)
}

fn download_swagger(version: &str) -> Result<String> {
    let url = swagger_url(version);
    debug!("downloading schema set from {}", url);
    ureq::get(&url)
        .call()
        .map_err(|e| Error::Network {
            url: url.clone(),
            message: e.to_string(),
        })?
        .into_string()
        .map_err(|e| Error::Network {
            url,
            message: e.to_string(),
        })
}

fn persist_cache(dir: &Path, path: &Path, body: &str) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::fs(dir, e))?;
    fs::write(path, body).map_err(|e| Error::fs(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::fs(dir, e))?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))
            .map_err(|e| Error::fs(path, e))?;
    }
    Ok(())
}
