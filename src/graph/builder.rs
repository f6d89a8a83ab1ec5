use std::collections::BTreeMap;

use ndarray::{s, Array2, Array3, Array4, Axis};
use tracing::debug;

use crate::error::GraphError;
use crate::features::{FeatureTensors, MASK_CHANNEL};
use crate::geometry::surface::SurfaceKind;
use crate::topology::{Edge, Solid};

use super::{Aggregation, FaceGraph, GraphConfig, Normalization};

/// Builds [`FaceGraph`]s from a solid and its sampled features.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: GraphConfig,
}

impl GraphBuilder {
    /// Creates a builder with `config`.
    #[must_use]
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Aggregation and normalization settings.
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Builds the face-adjacency graph of `solid`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoNodes`] when every face was excluded, and a
    /// shape error when grids disagree with the sampled shape.
    pub fn build(&self, solid: &Solid, features: &FeatureTensors) -> Result<FaceGraph, GraphError> {
        let num_faces = solid.num_faces();
        if features.num_faces() != num_faces {
            return Err(GraphError::FaceCount {
                expected: num_faces,
                found: features.num_faces(),
            });
        }
        let face_shape = features.face_shape();
        let edge_shape = features.edge_shape();

        let mut node_faces = Vec::new();
        let mut face_nodes = vec![None; num_faces];
        for (face, slot) in face_nodes.iter_mut().enumerate() {
            let Some(samples) = features.face(face) else {
                continue;
            };
            let found = shape3(samples.grid.shape());
            if found != face_shape {
                return Err(GraphError::FeatureShape {
                    face,
                    expected: face_shape,
                    found,
                });
            }
            *slot = Some(node_faces.len());
            node_faces.push(face);
        }
        if node_faces.is_empty() {
            return Err(GraphError::NoNodes { faces: num_faces });
        }

        let [u, v, c] = face_shape;
        let mut node_features = Array4::<f32>::zeros((node_faces.len(), u, v, c));
        let mut node_kinds = Vec::with_capacity(node_faces.len());
        for (node, &face) in node_faces.iter().enumerate() {
            if let Some(samples) = features.face(face) {
                node_features.index_axis_mut(Axis(0), node).assign(&samples.grid);
            }
            node_kinds.push(solid.face(face).map_or(SurfaceKind::Unsupported, |f| f.kind()));
        }

        // (a, b) -> (sum of oriented grids, count), kept sorted by pair.
        let mut pairs: BTreeMap<(usize, usize), (Array2<f64>, usize)> = BTreeMap::new();
        for edge in solid.edges() {
            let nodes: Vec<(usize, usize)> = edge
                .faces()
                .iter()
                .filter_map(|&f| face_nodes[f].map(|n| (n, f)))
                .collect();
            if nodes.len() < 2 {
                continue;
            }
            let grid = features.edge(edge.index()).ok_or(GraphError::EdgeShape {
                edge: edge.index(),
                expected: edge_shape,
                found: [0, 0],
            })?;
            let found = [grid.nrows(), grid.ncols()];
            if found != edge_shape {
                return Err(GraphError::EdgeShape {
                    edge: edge.index(),
                    expected: edge_shape,
                    found,
                });
            }
            for (i, &first) in nodes.iter().enumerate() {
                for &second in &nodes[i + 1..] {
                    let ((lo, lo_face), (hi, _)) = if first.0 < second.0 {
                        (first, second)
                    } else {
                        (second, first)
                    };
                    let oriented = oriented_grid(grid, traverses_forward(solid, edge, lo_face));
                    let entry = pairs
                        .entry((lo, hi))
                        .or_insert_with(|| (Array2::zeros(oriented.raw_dim()), 0));
                    entry.0 += &oriented;
                    entry.1 += 1;
                }
            }
        }

        let [eu, ec] = edge_shape;
        let mut edge_features = Array3::<f32>::zeros((pairs.len(), eu, ec));
        let mut adjacency = Vec::with_capacity(pairs.len());
        let mut edge_multiplicity = Vec::with_capacity(pairs.len());
        for (k, ((a, b), (sum, count))) in pairs.into_iter().enumerate() {
            let mean = match self.config.aggregation {
                #[allow(clippy::cast_precision_loss)]
                Aggregation::Mean => sum / count as f64,
            };
            #[allow(clippy::cast_possible_truncation)]
            edge_features
                .index_axis_mut(Axis(0), k)
                .assign(&mean.mapv(|x| x as f32));
            adjacency.push([a, b]);
            edge_multiplicity.push(count);
        }

        let normalization = if self.config.center_and_scale {
            center_and_scale(&mut node_features, &mut edge_features)
        } else {
            None
        };

        debug!(
            nodes = node_faces.len(),
            edges = adjacency.len(),
            excluded = features.excluded().len(),
            "built face graph"
        );
        Ok(FaceGraph {
            num_faces,
            node_faces,
            face_nodes,
            node_kinds,
            node_features,
            adjacency,
            edge_features,
            edge_multiplicity,
            excluded: features.excluded().to_vec(),
            normalization,
        })
    }
}

fn shape3(shape: &[usize]) -> [usize; 3] {
    match shape {
        [a, b, c] => [*a, *b, *c],
        _ => [0, 0, 0],
    }
}

/// Whether `face` runs along `edge` from its start to its end vertex.
/// The first use wins when the face uses the edge twice.
fn traverses_forward(solid: &Solid, edge: Edge<'_>, face: usize) -> bool {
    solid
        .face(face)
        .and_then(|f| f.loops().iter().flatten().find(|u| u.edge == edge.index()))
        .is_none_or(|u| u.forward)
}

/// Edge grid in `f64`, reversed with negated tangents when the face
/// traverses the edge backwards.
fn oriented_grid(grid: &Array2<f32>, forward: bool) -> Array2<f64> {
    let mut out = grid.mapv(f64::from);
    if !forward {
        out.invert_axis(Axis(0));
        out.slice_mut(s![.., 3..6]).mapv_inplace(|t| -t);
    }
    out
}

/// Centres masked face points at the origin and scales them by
/// `2 / max extent`; edge positions get the same transform. Falls back to
/// all points when no point is masked in.
fn center_and_scale(nodes: &mut Array4<f32>, edges: &mut Array3<f32>) -> Option<Normalization> {
    let (min, max) = position_bounds(nodes, true).or_else(|| position_bounds(nodes, false))?;
    let center = [0, 1, 2].map(|d| 0.5 * (min[d] + max[d]));
    let extent = (0..3).map(|d| max[d] - min[d]).fold(0.0, f64::max);
    let scale = if extent > 0.0 { 2.0 / extent } else { 1.0 };

    #[allow(clippy::cast_possible_truncation)]
    let apply = |x: f32, d: usize| ((f64::from(x) - center[d]) * scale) as f32;
    for mut cell in nodes.lanes_mut(Axis(3)) {
        for d in 0..3 {
            cell[d] = apply(cell[d], d);
        }
    }
    for mut row in edges.lanes_mut(Axis(2)) {
        for d in 0..3 {
            row[d] = apply(row[d], d);
        }
    }
    Some(Normalization { center, scale })
}

fn position_bounds(nodes: &Array4<f32>, only_masked: bool) -> Option<([f64; 3], [f64; 3])> {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for cell in nodes.lanes(Axis(3)) {
        if only_masked && cell[MASK_CHANNEL] < 0.5 {
            continue;
        }
        for d in 0..3 {
            let x = f64::from(cell[d]);
            min[d] = min[d].min(x);
            max[d] = max[d].max(x);
        }
    }
    min[0].is_finite().then_some((min, max))
}
