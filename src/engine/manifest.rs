//! Model metadata files: the `model3.json` manifest, the `cdi3.json` display
//! info it points at, and `exp3.json` expressions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{EngineError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelManifest {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub file_references: FileReferences,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileReferences {
    #[serde(default)]
    pub display_info: Option<String>,
    #[serde(default)]
    pub expressions: Vec<ExpressionRef>,
    #[serde(default)]
    pub motions: BTreeMap<String, Vec<MotionRef>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionRef {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MotionRef {
    pub file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayInfo {
    #[serde(default)]
    pub parameters: Vec<DisplayParameter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayParameter {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionFile {
    #[serde(default)]
    pub parameters: Vec<ExpressionParameter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionParameter {
    pub id: String,
    pub value: f32,
    #[serde(default)]
    pub blend: ParameterBlend,
}

/// How an expression value combines with the parameter's base value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ParameterBlend {
    #[default]
    Add,
    Multiply,
    Overwrite,
}

impl ParameterBlend {
    pub fn apply(self, base: f32, value: f32) -> f32 {
        match self {
            ParameterBlend::Add => base + value,
            ParameterBlend::Multiply => base * value,
            ParameterBlend::Overwrite => value,
        }
    }
}

impl ModelManifest {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Directory the manifest's relative file references resolve against
    pub fn base_dir(path: &Path) -> PathBuf {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| EngineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let manifest: ModelManifest = serde_json::from_str(
            r#"{
                "Version": 3,
                "FileReferences": {
                    "Moc": "Mao.moc3",
                    "DisplayInfo": "Mao.cdi3.json",
                    "Expressions": [
                        {"Name": "normal", "File": "expressions/normal.exp3.json"}
                    ],
                    "Motions": {
                        "Idle": [{"File": "motions/idle_01.motion3.json"}],
                        "TapBody": [{"File": "motions/tap_01.motion3.json"}, {"File": "motions/tap_02.motion3.json"}]
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.version, 3);
        let refs = &manifest.file_references;
        assert_eq!(refs.display_info.as_deref(), Some("Mao.cdi3.json"));
        assert_eq!(refs.expressions[0].name, "normal");
        assert_eq!(refs.motions["TapBody"].len(), 2);
    }

    #[test]
    fn test_parse_expression_blends() {
        let exp: ExpressionFile = serde_json::from_str(
            r#"{
                "Type": "Live2D Expression",
                "Parameters": [
                    {"Id": "ParamMouthForm", "Value": 1.0},
                    {"Id": "ParamEyeLOpen", "Value": 0.5, "Blend": "Multiply"},
                    {"Id": "ParamCheek", "Value": 1.0, "Blend": "Overwrite"}
                ]
            }"#,
        )
        .unwrap();

        let blends: Vec<ParameterBlend> = exp.parameters.iter().map(|p| p.blend).collect();
        assert_eq!(
            blends,
            [
                ParameterBlend::Add,
                ParameterBlend::Multiply,
                ParameterBlend::Overwrite
            ]
        );
        assert_eq!(ParameterBlend::Multiply.apply(0.8, 0.5), 0.4);
    }

    #[test]
    fn test_read_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.model3.json");
        std::fs::write(&path, "{ not json").unwrap();
        match ModelManifest::load(&path) {
            Err(EngineError::Json { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Json error, got {:?}", other),
        }
    }
}
