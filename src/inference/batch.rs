use ndarray::{s, Array2, Array3, Array4, Array5, ArrayD, Axis};

use crate::graph::FaceGraph;

/// Several graphs padded to a common node and edge count.
///
/// Grids are stored channels first. Padding rows are zero and their mask
/// entries are `false`; edge index rows of padding point at node 0.
#[derive(Debug, Clone)]
pub struct GraphBatch {
    /// `(B, N, C, U, V)` face grids.
    pub node_features: Array5<f32>,
    /// `(B, N)`: `true` for real nodes.
    pub node_mask: Array2<bool>,
    /// `(B, E, C, U)` edge grids.
    pub edge_features: Array4<f32>,
    /// `(B, E, 2)` node pairs of each undirected edge.
    pub edge_index: Array3<i64>,
    /// `(B, E)`: `true` for real edges.
    pub edge_mask: Array2<bool>,
    num_nodes: Vec<usize>,
    num_edges: Vec<usize>,
}

impl GraphBatch {
    /// Packs `graphs`, which must share face and edge grid shapes.
    #[must_use]
    pub fn pack(graphs: &[&FaceGraph]) -> Self {
        let b = graphs.len();
        let n_max = graphs.iter().map(|g| g.num_nodes()).max().unwrap_or(0);
        let e_max = graphs.iter().map(|g| g.num_edges()).max().unwrap_or(0);
        let [u, v, c] = graphs.first().map_or([0, 0, 0], |g| g.face_shape());
        let [eu, ec] = graphs.first().map_or([0, 0], |g| g.edge_shape());

        let mut node_features = Array5::<f32>::zeros((b, n_max, c, u, v));
        let mut node_mask = Array2::from_elem((b, n_max), false);
        let mut edge_features = Array4::<f32>::zeros((b, e_max.max(1), ec, eu));
        let mut edge_index = Array3::<i64>::zeros((b, e_max.max(1), 2));
        let mut edge_mask = Array2::from_elem((b, e_max.max(1)), false);

        for (i, g) in graphs.iter().enumerate() {
            let n = g.num_nodes();
            // (N, U, V, C) -> (N, C, U, V)
            let nodes = g.node_features().view().permuted_axes([0, 3, 1, 2]);
            node_features.slice_mut(s![i, ..n, .., .., ..]).assign(&nodes);
            node_mask.slice_mut(s![i, ..n]).fill(true);

            let e = g.num_edges();
            let edges = g.edge_features().view().permuted_axes([0, 2, 1]);
            edge_features.slice_mut(s![i, ..e, .., ..]).assign(&edges);
            for (k, &[a, bb]) in g.adjacency().iter().enumerate() {
                edge_index[[i, k, 0]] = i64::try_from(a).unwrap_or(i64::MAX);
                edge_index[[i, k, 1]] = i64::try_from(bb).unwrap_or(i64::MAX);
            }
            edge_mask.slice_mut(s![i, ..e]).fill(true);
        }

        Self {
            node_features,
            node_mask,
            edge_features,
            edge_index,
            edge_mask,
            num_nodes: graphs.iter().map(|g| g.num_nodes()).collect(),
            num_edges: graphs.iter().map(|g| g.num_edges()).collect(),
        }
    }

    /// Number of graphs in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.num_nodes.len()
    }

    /// Padded node count `N`.
    #[must_use]
    pub fn max_nodes(&self) -> usize {
        self.node_mask.len_of(Axis(1))
    }

    /// Padded edge count `E`, at least 1 so that every tensor is non-empty.
    #[must_use]
    pub fn max_edges(&self) -> usize {
        self.edge_mask.len_of(Axis(1))
    }

    /// Real node count of graph `i`.
    #[must_use]
    pub fn num_nodes(&self, i: usize) -> usize {
        self.num_nodes.get(i).copied().unwrap_or(0)
    }

    /// Real edge count of graph `i`.
    #[must_use]
    pub fn num_edges(&self, i: usize) -> usize {
        self.num_edges.get(i).copied().unwrap_or(0)
    }
}

/// Logits for a whole batch: `(B, N, K)` for segmentation, `(B, K)` for
/// classification.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutput {
    pub logits: ArrayD<f32>,
}

impl BatchOutput {
    /// Wraps the logits returned by a forward pass.
    #[must_use]
    pub fn new(logits: ArrayD<f32>) -> Self {
        Self { logits }
    }
}
