//! Patch algebra for YAML manifests.
//!
//! The on-disk patch format is always a YAML-encoded JSON Merge Patch
//! (RFC 7396): object fields replace or augment the source, `null` deletes
//! a key, arrays are replaced wholesale. Patches are applied by converting
//! both documents YAML→JSON, merging, and converting back.
//!
//! The edit workflow additionally *generates* patches in three flavours:
//! merge (RFC 7396), json (RFC 6902), and strategic (Kubernetes-style,
//! lists of named objects merged by `name`).

use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};

/// Convert a YAML value to JSON. Mapping keys must be scalars; booleans
/// and numbers are stringified the way Kubernetes tooling expects.
pub fn yaml_to_json(value: &YamlValue) -> Result<JsonValue> {
    Ok(match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                let f = n.as_f64().unwrap_or_default();
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| Error::Merge {
                        path: String::new(),
                        message: format!("number {} has no JSON representation", f),
                    })?
            }
        }
        YamlValue::String(s) => JsonValue::String(s.clone()),
        YamlValue::Sequence(seq) => {
            JsonValue::Array(seq.iter().map(yaml_to_json).collect::<Result<_>>()?)
        }
        YamlValue::Mapping(map) => {
            let mut out = Map::new();
            for (key, val) in map {
                let key = yaml_key_to_string(key)?;
                out.insert(key, yaml_to_json(val)?);
            }
            JsonValue::Object(out)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value)?,
    })
}

fn yaml_key_to_string(key: &YamlValue) -> Result<String> {
    match key {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        other => Err(Error::Merge {
            path: String::new(),
            message: format!("unsupported mapping key: {:?}", other),
        }),
    }
}

/// Convert a JSON value back to YAML. Total: every JSON document is
/// representable.
pub fn json_to_yaml(value: &JsonValue) -> YamlValue {
    match value {
        JsonValue::Null => YamlValue::Null,
        JsonValue::Bool(b) => YamlValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                YamlValue::from(i)
            } else if let Some(u) = n.as_u64() {
                YamlValue::from(u)
            } else {
                YamlValue::from(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => YamlValue::String(s.clone()),
        JsonValue::Array(arr) => YamlValue::Sequence(arr.iter().map(json_to_yaml).collect()),
        JsonValue::Object(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (key, val) in map {
                out.insert(YamlValue::String(key.clone()), json_to_yaml(val));
            }
            YamlValue::Mapping(out)
        }
    }
}

/// Apply an RFC 7396 JSON Merge Patch to `target` in place.
pub fn apply_merge_patch(target: &mut JsonValue, patch: &JsonValue) {
    match patch {
        JsonValue::Object(patch_map) => {
            if !target.is_object() {
                *target = JsonValue::Object(Map::new());
            }
            let target_map = target.as_object_mut().unwrap();
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    target_map.remove(key);
                } else {
                    let entry = target_map.entry(key.clone()).or_insert(JsonValue::Null);
                    apply_merge_patch(entry, patch_value);
                }
            }
        }
        // Scalars and arrays replace the target wholesale.
        _ => *target = patch.clone(),
    }
}

/// Apply a YAML-encoded merge patch to a YAML source document.
pub fn apply_to_yaml(source: &YamlValue, patch: &YamlValue) -> Result<YamlValue> {
    let mut target = yaml_to_json(source)?;
    let patch = yaml_to_json(patch)?;
    apply_merge_patch(&mut target, &patch);
    Ok(json_to_yaml(&target))
}

/// Compute the RFC 7396 merge patch turning `original` into `edited`.
///
/// Round-trip property: `apply_merge_patch(original, diff)` equals
/// `edited` for any pair of documents whose edited form contains no
/// explicit nulls.
pub fn diff_merge_patch(original: &JsonValue, edited: &JsonValue) -> JsonValue {
    match (original, edited) {
        (JsonValue::Object(orig_map), JsonValue::Object(edit_map)) => {
            let mut patch = Map::new();
            for key in orig_map.keys() {
                if !edit_map.contains_key(key) {
                    patch.insert(key.clone(), JsonValue::Null);
                }
            }
            for (key, edit_value) in edit_map {
                match orig_map.get(key) {
                    Some(orig_value) if orig_value == edit_value => {}
                    Some(orig_value) if orig_value.is_object() && edit_value.is_object() => {
                        patch.insert(key.clone(), diff_merge_patch(orig_value, edit_value));
                    }
                    _ => {
                        patch.insert(key.clone(), edit_value.clone());
                    }
                }
            }
            JsonValue::Object(patch)
        }
        _ => edited.clone(),
    }
}

/// Compute an RFC 6902 JSON Patch (array of operations) turning
/// `original` into `edited`. Arrays that differ are replaced in one
/// operation.
pub fn diff_json_patch(original: &JsonValue, edited: &JsonValue) -> JsonValue {
    let mut ops = Vec::new();
    diff_json_patch_inner(original, edited, "", &mut ops);
    JsonValue::Array(ops)
}

fn diff_json_patch_inner(
    original: &JsonValue,
    edited: &JsonValue,
    pointer: &str,
    ops: &mut Vec<JsonValue>,
) {
    if original == edited {
        return;
    }
    match (original, edited) {
        (JsonValue::Object(orig_map), JsonValue::Object(edit_map)) => {
            for key in orig_map.keys() {
                if !edit_map.contains_key(key) {
                    ops.push(serde_json::json!({
                        "op": "remove",
                        "path": format!("{}/{}", pointer, escape_pointer(key)),
                    }));
                }
            }
            for (key, edit_value) in edit_map {
                let child = format!("{}/{}", pointer, escape_pointer(key));
                match orig_map.get(key) {
                    Some(orig_value) => {
                        diff_json_patch_inner(orig_value, edit_value, &child, ops)
                    }
                    None => ops.push(serde_json::json!({
                        "op": "add",
                        "path": child,
                        "value": edit_value,
                    })),
                }
            }
        }
        _ => {
            // An empty pointer addresses the whole document.
            ops.push(serde_json::json!({
                "op": "replace",
                "path": pointer,
                "value": edited,
            }));
        }
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Compute a two-way strategic merge patch turning `original` into
/// `edited`.
///
/// Object fields follow merge-patch semantics. Sequences whose elements
/// are all mappings carrying a `name` field merge by name: changed items
/// carry their name plus the changed fields, removed items carry a
/// `$patch: delete` directive. Any other sequence is replaced wholesale.
pub fn diff_strategic_patch(original: &JsonValue, edited: &JsonValue) -> JsonValue {
    match (original, edited) {
        (JsonValue::Object(orig_map), JsonValue::Object(edit_map)) => {
            let mut patch = Map::new();
            for key in orig_map.keys() {
                if !edit_map.contains_key(key) {
                    patch.insert(key.clone(), JsonValue::Null);
                }
            }
            for (key, edit_value) in edit_map {
                match orig_map.get(key) {
                    Some(orig_value) if orig_value == edit_value => {}
                    Some(orig_value) => {
                        patch.insert(key.clone(), diff_strategic_value(orig_value, edit_value));
                    }
                    None => {
                        patch.insert(key.clone(), edit_value.clone());
                    }
                }
            }
            JsonValue::Object(patch)
        }
        _ => edited.clone(),
    }
}

fn diff_strategic_value(original: &JsonValue, edited: &JsonValue) -> JsonValue {
    match (original, edited) {
        (JsonValue::Object(_), JsonValue::Object(_)) => diff_strategic_patch(original, edited),
        (JsonValue::Array(orig_items), JsonValue::Array(edit_items))
            if is_named_list(orig_items) && is_named_list(edit_items) =>
        {
            let mut patch_items = Vec::new();
            for edit_item in edit_items {
                let name = item_name(edit_item);
                match orig_items.iter().find(|o| item_name(o) == name) {
                    Some(orig_item) if orig_item == edit_item => {}
                    Some(orig_item) => {
                        let mut item_patch = diff_strategic_patch(orig_item, edit_item);
                        if let Some(map) = item_patch.as_object_mut() {
                            map.insert("name".to_string(), JsonValue::String(name.to_string()));
                        }
                        patch_items.push(item_patch);
                    }
                    None => patch_items.push(edit_item.clone()),
                }
            }
            for orig_item in orig_items {
                let name = item_name(orig_item);
                if !edit_items.iter().any(|e| item_name(e) == name) {
                    patch_items.push(serde_json::json!({
                        "name": name,
                        "$patch": "delete",
                    }));
                }
            }
            JsonValue::Array(patch_items)
        }
        _ => edited.clone(),
    }
}

fn is_named_list(items: &[JsonValue]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|i| i.is_object() && i.get("name").map(JsonValue::is_string).unwrap_or(false))
}

fn item_name(item: &JsonValue) -> &str {
    item.get("name").and_then(JsonValue::as_str).unwrap_or("")
}
