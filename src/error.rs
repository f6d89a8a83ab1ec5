use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::inference::Mode;

/// Top-level error type for brepgraph.
#[derive(Debug, Error)]
pub enum BrepGraphError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Load(#[from] GeometryLoadError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    ModelMismatch(#[from] ModelMismatchError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    UnknownLabel(#[from] UnknownLabelError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Label(#[from] LabelFileError),

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Errors related to geometric computations.
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors related to the topology store and solid assembly.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),
}

/// Errors raised while reading a STEP file into a [`crate::topology::Solid`].
#[derive(Debug, Error)]
pub enum GeometryLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not an ISO-10303-21 file: {0}")]
    NotStep(String),

    #[error("truncated STEP file: {0}")]
    Truncated(String),

    #[error("syntax error near entity #{id}: {message}")]
    Syntax { id: u32, message: String },

    #[error("entity #{0} is defined more than once")]
    DuplicateEntity(u32),

    #[error("entity #{referenced_by} references missing entity #{id}")]
    MissingEntity { id: u32, referenced_by: u32 },

    #[error("entity #{id} is {found}, expected {expected}")]
    UnexpectedEntity {
        id: u32,
        expected: &'static str,
        found: String,
    },

    #[error("invalid attribute on #{id} ({entity}): {message}")]
    InvalidAttribute {
        id: u32,
        entity: String,
        message: String,
    },

    #[error("model contains no faces")]
    NoFaces,

    #[error("loader worker terminated unexpectedly")]
    WorkerPanicked,

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// A face whose surface could not be sampled. Recovered locally by
/// excluding the face from the graph.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum SamplingError {
    #[error("face {face}: unsupported surface {reason}")]
    UnsupportedSurface { face: usize, reason: String },

    #[error("face {face}: parametric domain is unbounded")]
    Unbounded { face: usize },

    #[error("face {face}: degenerate surface ({reason})")]
    Degenerate { face: usize, reason: String },
}

impl SamplingError {
    /// Identifier of the face the error belongs to.
    #[must_use]
    pub fn face(&self) -> usize {
        match self {
            Self::UnsupportedSurface { face, .. }
            | Self::Unbounded { face }
            | Self::Degenerate { face, .. } => *face,
        }
    }
}

/// Errors raised by the graph builder.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("all {faces} faces were excluded, graph has no nodes")]
    NoNodes { faces: usize },

    #[error("face {face} grid has shape {found:?}, expected {expected:?}")]
    FeatureShape {
        face: usize,
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("edge {edge} grid has shape {found:?}, expected {expected:?}")]
    EdgeShape {
        edge: usize,
        expected: [usize; 2],
        found: [usize; 2],
    },

    #[error("feature tensors were sampled for {found} faces, solid has {expected}")]
    FaceCount { expected: usize, found: usize },
}

/// The graph or the requested mode does not fit the loaded model.
#[derive(Debug, Error)]
pub enum ModelMismatchError {
    #[error("model performs {found}, pipeline requested {expected}")]
    Mode { expected: Mode, found: Mode },

    #[error("face grid shape {found:?} does not match model input {expected:?}")]
    FaceGrid {
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("edge grid shape {found:?} does not match model input {expected:?}")]
    EdgeGrid {
        expected: [usize; 2],
        found: [usize; 2],
    },
}

/// Runtime failure of a model forward pass.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("forward pass failed: {0}")]
    Forward(String),

    #[error("model output has shape {found:?}, expected {expected:?}")]
    OutputShape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("model output contains non-finite values")]
    NonFinite,

    #[error("inference worker terminated unexpectedly")]
    WorkerPanicked,
}

/// The model produced a label id that the label table does not know.
#[derive(Debug, Error)]
#[error("label id {label_id} is not in the label table ({known} labels known)")]
pub struct UnknownLabelError {
    pub label_id: usize,
    pub known: usize,
}

/// A bounded stage exceeded its time limit.
#[derive(Debug, Error)]
#[error("{stage} stage timed out after {limit:?}")]
pub struct TimeoutError {
    pub stage: Stage,
    pub limit: Duration,
}

/// Errors raised while reading a label file.
#[derive(Debug, Error)]
pub enum LabelFileError {
    #[error("cannot read label file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("label file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid label id {0:?}")]
    InvalidId(String),

    #[error("invalid color for label {id}: {message}")]
    InvalidColor { id: usize, message: String },

    #[error("unrecognized label file layout: {0}")]
    Layout(String),

    #[error("label table is empty")]
    Empty,
}

/// Errors raised while loading a model.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("cannot read model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid model weights: {0}")]
    InvalidWeights(String),

    #[error("model file {0} has an unrecognized extension")]
    UnknownFormat(PathBuf),

    #[error("ONNX models require the `onnx` feature")]
    OnnxDisabled,

    #[error("ONNX runtime error: {0}")]
    Onnx(String),
}

/// Errors raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while writing result reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline stage a per-file failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Sample,
    Build,
    Infer,
    Map,
}

impl Stage {
    /// Lower-case stage name used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Sample => "sample",
            Self::Build => "build",
            Self::Infer => "infer",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure attributed to one input file and one stage.
#[derive(Debug, Error)]
#[error("{}: {stage} failed: {source}", path.display())]
pub struct FileError {
    pub path: PathBuf,
    pub stage: Stage,
    #[source]
    pub source: BrepGraphError,
}

impl FileError {
    /// Wraps `source` with the file and stage it belongs to.
    pub fn new(path: impl Into<PathBuf>, stage: Stage, source: impl Into<BrepGraphError>) -> Self {
        Self {
            path: path.into(),
            stage,
            source: source.into(),
        }
    }
}

/// Convenience type alias for results using [`BrepGraphError`].
pub type Result<T> = std::result::Result<T, BrepGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_error_names_path_and_stage() {
        let err = FileError::new("parts/a.step", Stage::Load, GeometryLoadError::NoFaces);
        let text = err.to_string();
        assert!(text.contains("parts/a.step"));
        assert!(text.contains("load failed"));
        assert!(text.contains("no faces"));
    }

    #[test]
    fn sampling_error_reports_face() {
        let err = SamplingError::Unbounded { face: 4 };
        assert_eq!(err.face(), 4);
        let wrapped: BrepGraphError = err.into();
        assert!(matches!(wrapped, BrepGraphError::Sampling(_)));
    }

    #[test]
    fn timeout_display() {
        let err = TimeoutError {
            stage: Stage::Infer,
            limit: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "infer stage timed out after 250ms");
    }
}
