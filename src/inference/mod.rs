//! Batched model inference over face graphs.
//!
//! A [`Model`] consumes padded [`GraphBatch`]es and produces logits. The
//! [`InferenceEngine`] validates graphs against the model contract, packs
//! them into batches, bounds each forward pass in time, isolates failing
//! graphs, and slices padded outputs back into one [`RawOutput`] per graph.

mod baseline;
mod batch;
mod engine;
mod model;
#[cfg(feature = "onnx")]
mod onnx;

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

pub use baseline::MeanPoolModel;
pub use batch::{BatchOutput, GraphBatch};
pub use engine::{EngineConfig, InferenceEngine};
pub use model::{load_model, Model, ModelManifest};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

/// What a model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One label per face.
    Segmentation,
    /// One label per solid.
    Classification,
}

impl Mode {
    /// Lower-case mode name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Segmentation => "segmentation",
            Self::Classification => "classification",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "seg" | "segmentation" => Ok(Self::Segmentation),
            "cls" | "classification" => Ok(Self::Classification),
            other => Err(format!("unknown mode {other:?}, expected seg or cls")),
        }
    }
}

/// Grid shapes a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    /// `[U, V, C]` of each face grid.
    pub face_grid: [usize; 3],
    /// `[U, C]` of each edge grid.
    pub edge_grid: [usize; 2],
}

impl Default for InputShape {
    /// The UV-Net contract: 10 x 10 face grids with 7 channels and 10-point
    /// edge grids with 6 channels.
    fn default() -> Self {
        Self {
            face_grid: [10, 10, 7],
            edge_grid: [10, 6],
        }
    }
}

/// Model logits for one graph with padding removed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// `(N, K)`: one row per graph node, in node order.
    Segmentation(Array2<f32>),
    /// `(K,)`: one vector for the whole graph.
    Classification(Array1<f32>),
}

impl RawOutput {
    /// Mode the output was produced for.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::Segmentation(_) => Mode::Segmentation,
            Self::Classification(_) => Mode::Classification,
        }
    }

    /// Number of classes `K`.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        match self {
            Self::Segmentation(rows) => rows.ncols(),
            Self::Classification(v) => v.len(),
        }
    }
}
