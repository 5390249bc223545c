use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// One input field as declared by a tool. Presentation metadata only: the
/// runtime never validates payloads against it. Keys the runtime does not
/// model (`options`, `typeOptions`, ...) are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An alternative input schema for tools that expose several operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub input_schema: Vec<FieldDescriptor>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declarations extracted from a tool without running it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    #[serde(default, alias = "inputSchema", alias = "INPUT_SCHEMA")]
    pub input_schema: Vec<FieldDescriptor>,
    #[serde(default, alias = "requires", alias = "REQUIRES")]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "MODES", skip_serializing_if = "Option::is_none")]
    pub modes: Option<BTreeMap<String, Mode>>,
}

impl ToolManifest {
    /// Reject specifiers the package manager could misread. A specifier is
    /// passed verbatim as one argv element, so it must not look like a flag.
    pub fn validate(&self) -> Result<(), String> {
        for spec in &self.dependencies {
            if spec.is_empty() {
                return Err("dependency specifier must not be empty".to_string());
            }
            if spec.starts_with('-') {
                return Err(format!("dependency specifier '{spec}' must not start with '-'"));
            }
            if spec.chars().any(char::is_whitespace) {
                return Err(format!("dependency specifier '{spec}' must not contain whitespace"));
            }
        }
        Ok(())
    }
}

/// Outcome of extracting a tool's declarations. Never a mix of both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Extraction {
    Loaded(ToolManifest),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub entry_point: PathBuf,
    #[serde(flatten)]
    pub extraction: Extraction,
}

impl ToolDescriptor {
    pub fn loaded(name: impl Into<String>, entry_point: impl Into<PathBuf>, manifest: ToolManifest) -> Self {
        Self {
            name: name.into(),
            entry_point: entry_point.into(),
            extraction: Extraction::Loaded(manifest),
        }
    }

    pub fn failed(name: impl Into<String>, entry_point: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_point: entry_point.into(),
            extraction: Extraction::Failed {
                error: error.into(),
            },
        }
    }

    pub fn manifest(&self) -> Option<&ToolManifest> {
        match &self.extraction {
            Extraction::Loaded(m) => Some(m),
            Extraction::Failed { .. } => None,
        }
    }

    pub fn load_error(&self) -> Option<&str> {
        match &self.extraction {
            Extraction::Loaded(_) => None,
            Extraction::Failed { error } => Some(error),
        }
    }

    /// Declared dependencies; empty for failed descriptors.
    pub fn dependencies(&self) -> &[String] {
        self.manifest().map(|m| m.dependencies.as_slice()).unwrap_or_default()
    }

    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }
}

/// Result of one discovery pass. Replaced wholesale by the next pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ToolSnapshot {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolSnapshot {
    pub(crate) fn insert(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    /// Every discovered name, loaded or failed. This is the set orphan
    /// reclamation compares against: a tool that fails to load is still
    /// present and keeps its sandbox and storage.
    pub fn names(&self) -> HashSet<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.iter().filter(|d| d.load_error().is_some())
    }
}

impl FromIterator<ToolDescriptor> for ToolSnapshot {
    fn from_iter<I: IntoIterator<Item = ToolDescriptor>>(iter: I) -> Self {
        let mut snapshot = Self::default();
        for d in iter {
            snapshot.insert(d);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manifest_accepts_original_declaration_names() {
        let manifest: ToolManifest = serde_json::from_value(json!({
            "INPUT_SCHEMA": [
                { "name": "file_path", "displayName": "Media File Path", "type": "string", "required": true }
            ],
            "REQUIRES": ["ffmpeg-python==0.2.0"]
        }))
        .unwrap();
        assert_eq!(manifest.dependencies, vec!["ffmpeg-python==0.2.0"]);
        assert_eq!(manifest.input_schema[0].display_name.as_deref(), Some("Media File Path"));
        assert!(manifest.input_schema[0].required);
    }

    #[test]
    fn unknown_field_keys_survive_a_round_trip() {
        let field = json!({
            "name": "format",
            "type": "options",
            "options": [{ "name": "Seconds", "value": "seconds" }],
            "default": "seconds"
        });
        let parsed: FieldDescriptor = serde_json::from_value(field.clone()).unwrap();
        assert_eq!(parsed.kind.as_deref(), Some("options"));
        assert!(parsed.extra.contains_key("options"));
        let mut back = serde_json::to_value(&parsed).unwrap();
        back.as_object_mut().unwrap().remove("required");
        assert_eq!(back, field);
    }

    #[test]
    fn validate_rejects_flag_like_and_blank_specifiers() {
        let bad = |dep: &str| ToolManifest {
            dependencies: vec!["numpy".into(), dep.into()],
            ..Default::default()
        };
        assert!(bad("--index-url=http://mirror").validate().is_err());
        assert!(bad("").validate().is_err());
        assert!(bad("numpy pandas").validate().is_err());
        assert!(bad("requests==2.31.0").validate().is_ok());
    }

    #[test]
    fn snapshot_serializes_loaded_and_failed_entries() {
        let snapshot: ToolSnapshot = vec![
            ToolDescriptor::loaded(
                "get_duration",
                "/t/get_duration.py",
                ToolManifest {
                    dependencies: vec!["ffmpeg-python==0.2.0".into()],
                    ..Default::default()
                },
            ),
            ToolDescriptor::failed("broken", "/t/broken.py", "SyntaxError: invalid syntax"),
        ]
        .into_iter()
        .collect();

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            json!({
                "broken": { "error": "SyntaxError: invalid syntax" },
                "get_duration": { "input_schema": [], "dependencies": ["ffmpeg-python==0.2.0"] }
            })
        );
    }

    #[test]
    fn failed_descriptor_has_no_dependencies() {
        let d = ToolDescriptor::failed("broken", "/t/broken.py", "boom");
        assert!(d.manifest().is_none());
        assert!(d.dependencies().is_empty());
        assert_eq!(d.load_error(), Some("boom"));
    }
}
