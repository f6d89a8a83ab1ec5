//! Face-adjacency graph with UV-grid node and edge features.
//!
//! Nodes are the sampled faces of a solid in traversal order. Two nodes are
//! joined when their faces share at least one boundary edge; the pair is
//! stored once with the lower node first and every pair is read as a
//! bidirectional edge.

mod builder;

use ndarray::{Array3, Array4, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;
use crate::geometry::surface::SurfaceKind;

pub use builder::GraphBuilder;

/// How the grids of several edges shared by one face pair are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Element-wise arithmetic mean.
    #[default]
    Mean,
}

/// Graph construction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    pub aggregation: Aggregation,
    /// Centre the masked face points at the origin and scale them into
    /// `[-1, 1]`.
    pub center_and_scale: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            aggregation: Aggregation::Mean,
            center_and_scale: true,
        }
    }
}

/// Transform applied to positions by `center_and_scale`:
/// `p' = (p - center) * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalization {
    pub center: [f64; 3],
    pub scale: f64,
}

/// Face-adjacency graph of one solid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceGraph {
    num_faces: usize,
    node_faces: Vec<usize>,
    #[serde(skip)]
    face_nodes: Vec<Option<usize>>,
    node_kinds: Vec<SurfaceKind>,
    node_features: Array4<f32>,
    adjacency: Vec<[usize; 2]>,
    edge_features: Array3<f32>,
    edge_multiplicity: Vec<usize>,
    excluded: Vec<SamplingError>,
    normalization: Option<Normalization>,
}

impl FaceGraph {
    /// Faces of the source solid, excluded ones included.
    #[must_use]
    pub fn num_faces(&self) -> usize {
        self.num_faces
    }

    /// Number of nodes, one per sampled face.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.node_faces.len()
    }

    /// Number of undirected adjacencies.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.adjacency.len()
    }

    /// Face identifier of every node, in node order.
    #[must_use]
    pub fn node_faces(&self) -> &[usize] {
        &self.node_faces
    }

    /// Face identifier of `node`.
    #[must_use]
    pub fn face_of(&self, node: usize) -> Option<usize> {
        self.node_faces.get(node).copied()
    }

    /// Node of `face`; `None` for excluded or unknown faces.
    #[must_use]
    pub fn node_of(&self, face: usize) -> Option<usize> {
        self.face_nodes.get(face).copied().flatten()
    }

    /// Surface kind of every node, in node order.
    #[must_use]
    pub fn node_kinds(&self) -> &[SurfaceKind] {
        &self.node_kinds
    }

    /// `(N, U, V, C)` face grids.
    #[must_use]
    pub fn node_features(&self) -> &Array4<f32> {
        &self.node_features
    }

    /// `(U, V, C)` grid of one node.
    #[must_use]
    pub fn node_grid(&self, node: usize) -> ArrayView3<'_, f32> {
        self.node_features.index_axis(ndarray::Axis(0), node)
    }

    /// Undirected node pairs `(a, b)`, `a < b`, sorted.
    #[must_use]
    pub fn adjacency(&self) -> &[[usize; 2]] {
        &self.adjacency
    }

    /// Adjacencies as face identifier pairs.
    pub fn face_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .map(|&[a, b]| (self.node_faces[a], self.node_faces[b]))
    }

    /// `(E, U, C)` edge grids, one per adjacency.
    #[must_use]
    pub fn edge_features(&self) -> &Array3<f32> {
        &self.edge_features
    }

    /// `(U, C)` grid of one adjacency.
    #[must_use]
    pub fn edge_grid(&self, edge: usize) -> ArrayView2<'_, f32> {
        self.edge_features.index_axis(ndarray::Axis(0), edge)
    }

    /// Number of shared boundary edges behind each adjacency.
    #[must_use]
    pub fn edge_multiplicity(&self) -> &[usize] {
        &self.edge_multiplicity
    }

    /// Neighbours of `node` in ascending order.
    #[must_use]
    pub fn neighbours(&self, node: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .adjacency
            .iter()
            .filter_map(|&[a, b]| {
                if a == node {
                    Some(b)
                } else if b == node {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Faces left out of the graph and why.
    #[must_use]
    pub fn excluded(&self) -> &[SamplingError] {
        &self.excluded
    }

    /// Transform applied by `center_and_scale`, if enabled.
    #[must_use]
    pub fn normalization(&self) -> Option<&Normalization> {
        self.normalization.as_ref()
    }

    /// `[U, V, C]` of every node grid.
    #[must_use]
    pub fn face_shape(&self) -> [usize; 3] {
        let s = self.node_features.shape();
        [s[1], s[2], s[3]]
    }

    /// `[U, C]` of every edge grid.
    #[must_use]
    pub fn edge_shape(&self) -> [usize; 2] {
        let s = self.edge_features.shape();
        [s[1], s[2]]
    }

    /// Byte encoding of the whole graph. Equal graphs encode to equal
    /// bytes; the encoding is little-endian and independent of platform.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            64 + 4 * (self.node_features.len() + self.edge_features.len()),
        );
        out.extend_from_slice(b"FGRAPH1\0");
        let mut put = |v: usize| out.extend_from_slice(&(v as u64).to_le_bytes());
        put(self.num_faces);
        put(self.num_nodes());
        put(self.num_edges());
        for d in self.face_shape() {
            put(d);
        }
        for d in self.edge_shape() {
            put(d);
        }
        for &f in &self.node_faces {
            put(f);
        }
        for &[a, b] in &self.adjacency {
            put(a);
            put(b);
        }
        for &m in &self.edge_multiplicity {
            put(m);
        }
        for e in &self.excluded {
            put(e.face());
        }
        out.extend(self.node_kinds.iter().map(|k| k.code()));
        for v in &self.node_features {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.edge_features {
            out.extend_from_slice(&v.to_le_bytes());
        }
        if let Some(n) = &self.normalization {
            for c in n.center {
                out.extend_from_slice(&c.to_le_bytes());
            }
            out.extend_from_slice(&n.scale.to_le_bytes());
        }
        out
    }
}
