use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::error::{InferenceError, ModelLoadError};

use super::baseline::MeanPoolModel;
use super::batch::{BatchOutput, GraphBatch};
use super::{InputShape, Mode};

/// A learned model over padded graph batches.
///
/// Implementations must not let padded rows influence real outputs; the
/// engine relies on this when it compares batched and single-graph runs.
pub trait Model: Send + Sync {
    /// Display name used in logs and reports.
    fn name(&self) -> &str;

    fn mode(&self) -> Mode;

    fn input_shape(&self) -> InputShape;

    /// Number of output classes, when known before the first forward pass.
    fn num_classes(&self) -> Option<usize>;

    /// Runs the model on `batch`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] when the forward pass fails.
    fn forward(&self, batch: &GraphBatch) -> Result<BatchOutput, InferenceError>;
}

/// JSON model description, tagged by `backend`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case", deny_unknown_fields)]
pub enum ModelManifest {
    /// Linear baseline with inline weights.
    MeanPool {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        mode: Option<Mode>,
        #[serde(default)]
        input: Option<InputShape>,
        /// `K` rows of `2 C` weights.
        weights: Vec<Vec<f32>>,
        bias: Vec<f32>,
    },
    /// ONNX graph stored next to the manifest.
    Onnx {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        mode: Option<Mode>,
        #[serde(default)]
        input: Option<InputShape>,
        /// Path of the `.onnx` file, relative to the manifest.
        path: PathBuf,
        #[serde(default)]
        num_classes: Option<usize>,
    },
}

/// Loads the model at `path`.
///
/// `.json` files are read as a [`ModelManifest`]; `.onnx` files are loaded
/// with the default input contract. `mode` applies when the file does not
/// name one.
///
/// # Errors
///
/// Returns [`ModelLoadError`] when the file cannot be read or describes an
/// invalid model, or names the ONNX backend without the `onnx` feature.
pub fn load_model(path: &Path, mode: Mode) -> Result<Arc<dyn Model>, ModelLoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let model: Arc<dyn Model> = match extension.as_deref() {
        Some("json") => {
            let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let manifest: ModelManifest = serde_json::from_str(&text)?;
            from_manifest(manifest, path, mode)?
        }
        Some("onnx") => onnx_model(path, file_stem(path), mode, InputShape::default(), None)?,
        _ => return Err(ModelLoadError::UnknownFormat(path.to_path_buf())),
    };
    info!(
        model = model.name(),
        mode = %model.mode(),
        path = %path.display(),
        "loaded model"
    );
    Ok(model)
}

fn from_manifest(manifest: ModelManifest, path: &Path, requested: Mode) -> Result<Arc<dyn Model>, ModelLoadError> {
    match manifest {
        ModelManifest::MeanPool {
            name,
            mode,
            input,
            weights,
            bias,
        } => {
            let model = MeanPoolModel::from_rows(
                name.unwrap_or_else(|| file_stem(path)),
                mode.unwrap_or(requested),
                input.unwrap_or_default(),
                &weights,
                bias,
            )?;
            Ok(Arc::new(model))
        }
        ModelManifest::Onnx {
            name,
            mode,
            input,
            path: onnx_path,
            num_classes,
        } => {
            let resolved = path
                .parent()
                .map_or_else(|| onnx_path.clone(), |dir| dir.join(&onnx_path));
            onnx_model(
                &resolved,
                name.unwrap_or_else(|| file_stem(path)),
                mode.unwrap_or(requested),
                input.unwrap_or_default(),
                num_classes,
            )
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(feature = "onnx")]
fn onnx_model(
    path: &Path,
    name: String,
    mode: Mode,
    input: InputShape,
    num_classes: Option<usize>,
) -> Result<Arc<dyn Model>, ModelLoadError> {
    Ok(Arc::new(super::onnx::OnnxModel::load(path, name, mode, input, num_classes)?))
}

#[cfg(not(feature = "onnx"))]
fn onnx_model(
    _path: &Path,
    _name: String,
    _mode: Mode,
    _input: InputShape,
    _num_classes: Option<usize>,
) -> Result<Arc<dyn Model>, ModelLoadError> {
    Err(ModelLoadError::OnnxDisabled)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "backend": "mean_pool",
        "name": "planar-vs-curved",
        "mode": "segmentation",
        "input": { "face_grid": [4, 4, 7], "edge_grid": [4, 6] },
        "weights": [
            [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0]
        ],
        "bias": [0.5, 0]
    }"#;

    #[test]
    fn loads_mean_pool_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        std::fs::write(&path, MANIFEST).unwrap();
        let model = load_model(&path, Mode::Classification).unwrap();
        assert_eq!(model.name(), "planar-vs-curved");
        assert_eq!(model.mode(), Mode::Segmentation);
        assert_eq!(model.num_classes(), Some(2));
        assert_eq!(model.input_shape().face_grid, [4, 4, 7]);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = load_model(Path::new("weights.pt"), Mode::Segmentation).err().unwrap();
        assert!(matches!(err, ModelLoadError::UnknownFormat(_)));
    }

    #[test]
    fn rejects_wrong_weight_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"backend": "mean_pool", "weights": [[1, 2, 3]], "bias": [0]}"#,
        )
        .unwrap();
        let err = load_model(&path, Mode::Segmentation).err().unwrap();
        assert!(matches!(err, ModelLoadError::InvalidWeights(_)));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn onnx_needs_feature() {
        let err = load_model(Path::new("uvnet.onnx"), Mode::Segmentation).err().unwrap();
        assert!(matches!(err, ModelLoadError::OnnxDisabled));
    }
}
