use ndarray::{s, Array1, Array2, Array3, ArrayView3, Axis};

use crate::error::{InferenceError, ModelLoadError};
use crate::features::MASK_CHANNEL;

use super::batch::{BatchOutput, GraphBatch};
use super::model::Model;
use super::{InputShape, Mode};

/// Linear model over pooled face grids.
///
/// Each node is summarized by the per-channel mean of its grid (restricted
/// to cells inside the trimming loops when a mask channel is present) and
/// by the mean summary of its neighbours. A single linear layer maps the
/// `2 C` concatenation to `K` logits. Classification averages the node
/// vectors of a graph before the linear layer.
#[derive(Debug, Clone)]
pub struct MeanPoolModel {
    name: String,
    mode: Mode,
    input: InputShape,
    /// `(K, 2 C)`.
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl MeanPoolModel {
    /// # Errors
    ///
    /// Returns [`ModelLoadError::InvalidWeights`] when `weights` is not
    /// `(K, 2 C)` for the channel count of `input` or `bias` is not `K` long.
    pub fn new(
        name: impl Into<String>,
        mode: Mode,
        input: InputShape,
        weights: Array2<f32>,
        bias: Array1<f32>,
    ) -> Result<Self, ModelLoadError> {
        let width = 2 * input.face_grid[2];
        if weights.nrows() == 0 {
            return Err(ModelLoadError::InvalidWeights("no output classes".into()));
        }
        if weights.ncols() != width {
            return Err(ModelLoadError::InvalidWeights(format!(
                "weight rows have {} columns, expected {width}",
                weights.ncols()
            )));
        }
        if bias.len() != weights.nrows() {
            return Err(ModelLoadError::InvalidWeights(format!(
                "bias has {} entries for {} classes",
                bias.len(),
                weights.nrows()
            )));
        }
        if weights.iter().chain(bias.iter()).any(|w| !w.is_finite()) {
            return Err(ModelLoadError::InvalidWeights("non-finite weight".into()));
        }
        Ok(Self {
            name: name.into(),
            mode,
            input,
            weights,
            bias,
        })
    }

    /// Builds the model from row-major weight rows as found in a manifest.
    ///
    /// # Errors
    ///
    /// Same as [`MeanPoolModel::new`], plus ragged rows.
    pub fn from_rows(
        name: impl Into<String>,
        mode: Mode,
        input: InputShape,
        rows: &[Vec<f32>],
        bias: Vec<f32>,
    ) -> Result<Self, ModelLoadError> {
        let k = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return Err(ModelLoadError::InvalidWeights("ragged weight rows".into()));
        }
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let weights = Array2::from_shape_vec((k, width), flat)
            .map_err(|e| ModelLoadError::InvalidWeights(e.to_string()))?;
        Self::new(name, mode, input, weights, Array1::from(bias))
    }

    fn classes(&self) -> usize {
        self.weights.nrows()
    }

    /// `(N, 2 C)` node descriptors of batch entry `i`, real nodes only.
    fn descriptors(&self, batch: &GraphBatch, i: usize) -> Array2<f32> {
        let n = batch.num_nodes(i);
        let c = self.input.face_grid[2];
        let mut own = Array2::<f32>::zeros((n, c));
        for node in 0..n {
            let grid = batch.node_features.slice(s![i, node, .., .., ..]);
            own.row_mut(node).assign(&pool(grid));
        }

        let mut sum = Array2::<f32>::zeros((n, c));
        let mut degree = vec![0_u32; n];
        for e in 0..batch.num_edges(i) {
            let a = usize::try_from(batch.edge_index[[i, e, 0]]).unwrap_or(usize::MAX);
            let b = usize::try_from(batch.edge_index[[i, e, 1]]).unwrap_or(usize::MAX);
            if a >= n || b >= n {
                continue;
            }
            let (ra, rb) = (own.row(a).to_owned(), own.row(b).to_owned());
            sum.row_mut(a).scaled_add(1.0, &rb);
            sum.row_mut(b).scaled_add(1.0, &ra);
            degree[a] += 1;
            degree[b] += 1;
        }
        for (node, &d) in degree.iter().enumerate() {
            if d > 0 {
                #[allow(clippy::cast_precision_loss)]
                let inv = 1.0 / d as f32;
                sum.row_mut(node).mapv_inplace(|x| x * inv);
            }
        }

        ndarray::concatenate(Axis(1), &[own.view(), sum.view()])
            .unwrap_or_else(|_| Array2::zeros((n, 2 * c)))
    }

    fn linear(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weights.t()) + &self.bias
    }
}

/// Per-channel mean of a `(C, U, V)` grid over the cells inside the mask.
fn pool(grid: ArrayView3<'_, f32>) -> Array1<f32> {
    let c = grid.len_of(Axis(0));
    let mask = (c > MASK_CHANNEL).then(|| grid.index_axis(Axis(0), MASK_CHANNEL));
    let inside = mask.map_or(0, |m| m.iter().filter(|&&x| x > 0.5).count());
    let mut out = Array1::<f32>::zeros(c);
    for (ch, plane) in grid.axis_iter(Axis(0)).enumerate() {
        out[ch] = match mask {
            Some(m) if inside > 0 => {
                let total: f32 = plane
                    .iter()
                    .zip(m.iter())
                    .filter(|(_, &w)| w > 0.5)
                    .map(|(x, _)| *x)
                    .sum();
                #[allow(clippy::cast_precision_loss)]
                let mean = total / inside as f32;
                mean
            }
            _ => plane.mean().unwrap_or(0.0),
        };
    }
    out
}

impl Model for MeanPoolModel {
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
        Some(self.classes())
    }

    fn forward(&self, batch: &GraphBatch) -> Result<BatchOutput, InferenceError> {
        let channels = batch.node_features.len_of(Axis(2));
        if channels != self.input.face_grid[2] {
            return Err(InferenceError::Forward(format!(
                "batch has {channels} face channels, model expects {}",
                self.input.face_grid[2]
            )));
        }
        let b = batch.batch_size();
        let k = self.classes();
        let logits = match self.mode {
            Mode::Segmentation => {
                let n_max = batch.max_nodes();
                let mut out = Array3::<f32>::zeros((b, n_max, k));
                for i in 0..b {
                    let n = batch.num_nodes(i);
                    let rows = self.linear(&self.descriptors(batch, i));
                    out.slice_mut(s![i, ..n, ..]).assign(&rows);
                }
                out.into_dyn()
            }
            Mode::Classification => {
                let mut out = Array2::<f32>::zeros((b, k));
                for i in 0..b {
                    let x = self.descriptors(batch, i);
                    let Some(mean) = x.mean_axis(Axis(0)) else {
                        continue;
                    };
                    let row = self.linear(&mean.insert_axis(Axis(0)));
                    out.row_mut(i).assign(&row.row(0));
                }
                out.into_dyn()
            }
        };
        Ok(BatchOutput::new(logits))
    }
}
