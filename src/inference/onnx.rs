use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::{session::Session, value::Value};
use tracing::info;

use crate::error::{InferenceError, ModelLoadError};

use super::batch::{BatchOutput, GraphBatch};
use super::model::Model;
use super::{InputShape, Mode};

/// UV-Net graph exported to ONNX.
///
/// The graph takes five inputs in this order: node features
/// `(B, N, C, U, V)`, node mask `(B, N)`, edge features `(B, E, C, U)`,
/// edge index `(B, E, 2)` as `i64`, edge mask `(B, E)`. Masks are passed as
/// `f32` ones and zeros. The first output holds the logits.
pub struct OnnxModel {
    name: String,
    mode: Mode,
    input: InputShape,
    num_classes: Option<usize>,
    session: Mutex<Session>,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// # Errors
    ///
    /// Returns [`ModelLoadError::Onnx`] when the runtime cannot load the file.
    pub fn load(
        path: &Path,
        name: String,
        mode: Mode,
        input: InputShape,
        num_classes: Option<usize>,
    ) -> Result<Self, ModelLoadError> {
        if !path.is_file() {
            return Err(ModelLoadError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "model file not found"),
            });
        }
        let threads = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| ModelLoadError::Onnx(e.to_string()))?;
        info!(model = %name, path = %path.display(), threads, "ONNX session ready");
        Ok(Self {
            name,
            mode,
            input,
            num_classes,
            session: Mutex::new(session),
        })
    }
}

fn forward_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Forward(e.to_string())
}

impl Model for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn input_shape(&self) -> InputShape {
        self.input
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    fn forward(&self, batch: &GraphBatch) -> Result<BatchOutput, InferenceError> {
        let as_f32 = |m: &ndarray::Array2<bool>| m.mapv(|x| if x { 1.0_f32 } else { 0.0 });
        let node_features = Value::from_array(batch.node_features.clone()).map_err(forward_error)?;
        let node_mask = Value::from_array(as_f32(&batch.node_mask)).map_err(forward_error)?;
        let edge_features = Value::from_array(batch.edge_features.clone()).map_err(forward_error)?;
        let edge_index = Value::from_array(batch.edge_index.clone()).map_err(forward_error)?;
        let edge_mask = Value::from_array(as_f32(&batch.edge_mask)).map_err(forward_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Forward("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![node_features, node_mask, edge_features, edge_index, edge_mask])
            .map_err(forward_error)?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(forward_error)?;
        let dims: Vec<usize> = shape
            .iter()
            .map(|&d| usize::try_from(d).unwrap_or(0))
            .collect();
        let logits = ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec()).map_err(forward_error)?;
        Ok(BatchOutput::new(logits))
    }
}
