//! Rewrites the copied runtime configuration for the server build.
//!
//! The copied `deno.json` still points at the development import map and may
//! use a development JSX transform. The patch normalizes a truthy
//! `compilerOptions.jsx` to `"react-jsx"` and always repoints `importMap` at
//! the server-specific import map. Every other field is left untouched.

use serde_json::{Map, Value};

use crate::file::{VirtualFile, normalize_logical};
use crate::source::Sources;
use crate::{Error, Result};

pub const CANONICAL_JSX: &str = "react-jsx";

/// Designated config artifact and the values written into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPatch {
    path: String,
    jsx: String,
    import_map: String,
}

impl ConfigPatch {
    pub fn new(path: &str, import_map: impl Into<String>) -> Self {
        Self {
            path: normalize_logical(path),
            jsx: CANONICAL_JSX.to_string(),
            import_map: import_map.into(),
        }
    }

    /// Logical path of the config artifact.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn import_map(&self) -> &str {
        &self.import_map
    }

    /// Patch the artifact in `sources`, if it is present.
    ///
    /// Returns `false` when there was nothing to patch.
    pub async fn apply(&self, sources: &mut Sources) -> Result<bool> {
        let Some(file) = sources.get_mut(&self.path) else {
            tracing::debug!(path = %self.path, "no config to patch");
            return Ok(false);
        };
        if file.is_removed() {
            return Ok(false);
        }
        self.apply_to(file).await?;
        Ok(true)
    }

    /// Patch a single file in place.
    pub async fn apply_to(&self, file: &mut VirtualFile) -> Result<()> {
        let value: Value = file.read_as_json().await?;
        let patched = self.patch_value(value).map_err(|message| Error::ConfigParse {
            path: file.absolute_path(),
            message,
        })?;
        file.write_json(&patched, true).await
    }

    /// The pure transform behind [`apply`](Self::apply).
    pub fn patch_value(&self, value: Value) -> std::result::Result<Value, String> {
        let Value::Object(mut config) = value else {
            return Err("expected a JSON object at the top level".to_string());
        };

        if let Some(Value::Object(compiler_options)) = config.get_mut("compilerOptions") {
            let jsx_set = compiler_options.get("jsx").is_some_and(is_truthy);
            if jsx_set {
                compiler_options.insert("jsx".to_string(), Value::String(self.jsx.clone()));
            }
        }

        config.insert(
            "importMap".to_string(),
            Value::String(self.import_map.clone()),
        );

        Ok(Value::Object(sort_keys(config)))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// serde_json keeps insertion order only with `preserve_order`; sorting
/// explicitly keeps the output stable either way.
fn sort_keys(map: Map<String, Value>) -> Map<String, Value> {
    let mut entries: Vec<(String, Value)> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(inner) => Value::Object(sort_keys(inner)),
                other => other,
            };
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn patch() -> ConfigPatch {
        ConfigPatch::new("./deno.json", "./importMap.server.json")
    }

    #[test]
    fn test_truthy_jsx_is_normalized() {
        let patched = patch()
            .patch_value(json!({
                "compilerOptions": { "jsx": "react-jsxdev", "strict": true },
                "importMap": "./importMap.json",
                "tasks": { "start": "deno run server.tsx" }
            }))
            .unwrap();

        assert_eq!(
            patched,
            json!({
                "compilerOptions": { "jsx": "react-jsx", "strict": true },
                "importMap": "./importMap.server.json",
                "tasks": { "start": "deno run server.tsx" }
            })
        );
    }

    #[test]
    fn test_falsy_jsx_is_kept() {
        for jsx in [json!(""), json!(false), json!(null), json!(0)] {
            let patched = patch()
                .patch_value(json!({ "compilerOptions": { "jsx": jsx.clone() } }))
                .unwrap();
            assert_eq!(patched["compilerOptions"]["jsx"], jsx);
            assert_eq!(patched["importMap"], "./importMap.server.json");
        }
    }

    #[test]
    fn test_import_map_always_set() {
        let patched = patch().patch_value(json!({})).unwrap();
        assert_eq!(patched, json!({ "importMap": "./importMap.server.json" }));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(patch().patch_value(json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_skipped() {
        let mut sources = Sources::new();
        assert!(!patch().apply(&mut sources).await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_is_byte_stable() {
        let temp = TempDir::new().unwrap();
        let mut sources = Sources::new();
        sources.insert(VirtualFile::new(
            "./deno.json",
            temp.path(),
            r#"{"tasks":{"b":"2","a":"1"},"compilerOptions":{"jsx":"react-jsxdev"},"importMap":"./importMap.json"}"#,
        ));

        assert!(patch().apply(&mut sources).await.unwrap());
        let first = std::fs::read_to_string(temp.path().join("deno.json")).unwrap();

        patch().apply(&mut sources).await.unwrap();
        let second = std::fs::read_to_string(temp.path().join("deno.json")).unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("{\n  \"compilerOptions\""));
        assert!(first.ends_with("}\n"));
    }

    #[tokio::test]
    async fn test_invalid_json_fails() {
        let temp = TempDir::new().unwrap();
        let mut sources = Sources::new();
        sources.insert(VirtualFile::new("./deno.json", temp.path(), "{ nope"));
        let err = patch().apply(&mut sources).await.unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}
