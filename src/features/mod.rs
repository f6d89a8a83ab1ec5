//! UV-grid feature sampling.
//!
//! Every face is sampled on a regular `U x V` grid over its parametric
//! bounds and every edge on a `U`-point grid along its curve. Faces that
//! cannot be sampled are excluded and their reason recorded; edges fall
//! back to their chord.

mod curvature;
mod edge;
mod face;

use ndarray::{Array2, Array3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SamplingError;
use crate::topology::{Face, Solid};

pub use curvature::principal_curvatures;

/// Face channels without curvature: `x y z nx ny nz mask`.
pub const FACE_CHANNELS: usize = 7;
/// Face channels with curvature: adds `k1 k2`.
pub const FACE_CHANNELS_WITH_CURVATURE: usize = 9;
/// Edge channels: `x y z tx ty tz`.
pub const EDGE_CHANNELS: usize = 6;
/// Index of the trimming mask channel in a face grid.
pub const MASK_CHANNEL: usize = 6;

/// Sampling densities and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    pub face_u_samples: usize,
    pub face_v_samples: usize,
    pub edge_samples: usize,
    /// Adds principal curvature channels to face grids.
    pub curvature: bool,
    /// Samples faces on the rayon pool.
    pub parallel: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            face_u_samples: 10,
            face_v_samples: 10,
            edge_samples: 10,
            curvature: false,
            parallel: true,
        }
    }
}

impl SamplerConfig {
    /// Number of channels in each face grid.
    #[must_use]
    pub fn face_channels(&self) -> usize {
        if self.curvature {
            FACE_CHANNELS_WITH_CURVATURE
        } else {
            FACE_CHANNELS
        }
    }

    /// Shape `[U, V, C]` of each face grid.
    #[must_use]
    pub fn face_shape(&self) -> [usize; 3] {
        [self.face_u_samples, self.face_v_samples, self.face_channels()]
    }

    /// Shape `[U, C]` of each edge grid.
    #[must_use]
    pub fn edge_shape(&self) -> [usize; 2] {
        [self.edge_samples, EDGE_CHANNELS]
    }
}

/// Parametric box a face grid spans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UvBox {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

/// Grid and bookkeeping for one sampled face.
#[derive(Debug, Clone)]
pub struct FaceSamples {
    /// `(U, V, C)` grid.
    pub grid: Array3<f32>,
    pub uv_bounds: UvBox,
    /// Grid points inside the trimmed face (mask = 1).
    pub inside: usize,
    /// Grid points that failed to evaluate and copy a neighbour.
    pub repaired: usize,
}

/// Sampled features of one solid, indexed by face and edge identifier.
#[derive(Debug, Clone)]
pub struct FeatureTensors {
    pub(crate) faces: Vec<Option<FaceSamples>>,
    pub(crate) edges: Vec<Array2<f32>>,
    pub(crate) excluded: Vec<SamplingError>,
    pub(crate) edge_fallbacks: Vec<usize>,
    pub(crate) face_shape: [usize; 3],
    pub(crate) edge_shape: [usize; 2],
}

impl FeatureTensors {
    /// Number of faces of the sampled solid, excluded ones included.
    #[must_use]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Samples of face `index`; `None` for excluded faces.
    #[must_use]
    pub fn face(&self, index: usize) -> Option<&FaceSamples> {
        self.faces.get(index).and_then(Option::as_ref)
    }

    /// `(U, C)` grid of edge `index`.
    #[must_use]
    pub fn edge(&self, index: usize) -> Option<&Array2<f32>> {
        self.edges.get(index)
    }

    /// Faces that could not be sampled, in face order.
    #[must_use]
    pub fn excluded(&self) -> &[SamplingError] {
        &self.excluded
    }

    /// Whether face `index` was excluded.
    #[must_use]
    pub fn is_excluded(&self, index: usize) -> bool {
        matches!(self.faces.get(index), Some(None))
    }

    /// Edges sampled as straight chords.
    #[must_use]
    pub fn edge_fallbacks(&self) -> &[usize] {
        &self.edge_fallbacks
    }

    /// Shape `[U, V, C]` of every face grid.
    #[must_use]
    pub fn face_shape(&self) -> [usize; 3] {
        self.face_shape
    }

    /// Shape `[U, C]` of every edge grid.
    #[must_use]
    pub fn edge_shape(&self) -> [usize; 2] {
        self.edge_shape
    }
}

/// Samples UV-grid features from a [`Solid`].
#[derive(Debug, Clone, Default)]
pub struct FeatureSampler {
    config: SamplerConfig,
}

impl FeatureSampler {
    /// Creates a sampler with `config`.
    #[must_use]
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Sampling densities and options.
    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Samples every face and edge of `solid`.
    ///
    /// Never fails as a whole: faces that cannot be sampled are listed in
    /// [`FeatureTensors::excluded`] and edges that cannot be evaluated are
    /// listed in [`FeatureTensors::edge_fallbacks`].
    #[must_use]
    pub fn sample(&self, solid: &Solid) -> FeatureTensors {
        let faces: Vec<Face<'_>> = solid.faces().collect();
        let sample = |face: &Face<'_>| face::sample_face(*face, &self.config);
        let results: Vec<Result<FaceSamples, SamplingError>> = if self.config.parallel {
            faces.par_iter().map(sample).collect()
        } else {
            faces.iter().map(sample).collect()
        };

        let mut face_samples = Vec::with_capacity(results.len());
        let mut excluded = Vec::new();
        for result in results {
            match result {
                Ok(samples) => face_samples.push(Some(samples)),
                Err(err) => {
                    warn!(face = err.face(), error = %err, "excluding face");
                    excluded.push(err);
                    face_samples.push(None);
                }
            }
        }

        let mut edges = Vec::with_capacity(solid.num_edges());
        let mut edge_fallbacks = Vec::new();
        for e in solid.edges() {
            let (grid, fallback) = edge::sample_edge(e, self.config.edge_samples);
            if fallback {
                warn!(edge = e.index(), source_id = e.source_id(), "edge sampled as chord");
                edge_fallbacks.push(e.index());
            }
            edges.push(grid);
        }

        debug!(
            faces = face_samples.len(),
            excluded = excluded.len(),
            edges = edges.len(),
            chord_edges = edge_fallbacks.len(),
            "sampled features"
        );
        FeatureTensors {
            faces: face_samples,
            edges,
            excluded,
            edge_fallbacks,
            face_shape: self.config.face_shape(),
            edge_shape: self.config.edge_shape(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::step::parse_step;
    use crate::step::tests::{CUBE, CUBE_WITH_UNSUPPORTED, HOLED_CYLINDER, HOLED_PLATE, SPLIT_TUBE};
    use crate::topology::solid::tests::two_squares;

    #[test]
    fn cube_faces_are_fully_inside() {
        let solid = parse_step(CUBE).unwrap();
        let tensors = FeatureSampler::default().sample(&solid);
        assert!(tensors.excluded().is_empty());
        for i in 0..6 {
            let f = tensors.face(i).unwrap();
            assert_eq!(f.grid.shape(), &[10, 10, 7]);
            assert_eq!(f.inside, 100);
            assert_eq!(f.repaired, 0);
        }
        assert_eq!(tensors.edge(0).unwrap().shape(), &[10, 6]);
        assert!(tensors.edge_fallbacks().is_empty());
    }

    #[test]
    fn normals_point_out_of_cube() {
        let solid = parse_step(CUBE).unwrap();
        let tensors = FeatureSampler::default().sample(&solid);
        for i in 0..6 {
            let g = &tensors.face(i).unwrap().grid;
            let (px, py, pz) = (g[[4, 4, 0]] - 5.0, g[[4, 4, 1]] - 5.0, g[[4, 4, 2]] - 5.0);
            let dot = px * g[[4, 4, 3]] + py * g[[4, 4, 4]] + pz * g[[4, 4, 5]];
            assert!(dot > 0.0, "face {i} normal points inward");
        }
    }

    #[test]
    fn unsupported_face_is_excluded_not_dropped() {
        let solid = parse_step(CUBE_WITH_UNSUPPORTED).unwrap();
        let tensors = FeatureSampler::default().sample(&solid);
        assert_eq!(tensors.num_faces(), 6);
        assert_eq!(tensors.excluded().len(), 1);
        let face = tensors.excluded()[0].face();
        assert!(tensors.is_excluded(face));
        assert!(matches!(
            tensors.excluded()[0],
            SamplingError::UnsupportedSurface { .. }
        ));
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let solid = parse_step(SPLIT_TUBE).unwrap();
        let par = FeatureSampler::default().sample(&solid);
        let seq = FeatureSampler::new(SamplerConfig {
            parallel: false,
            ..SamplerConfig::default()
        })
        .sample(&solid);
        for i in 0..solid.num_faces() {
            assert_eq!(par.face(i).unwrap().grid, seq.face(i).unwrap().grid);
        }
    }

    #[test]
    fn half_tube_bounds_cover_half_turn() {
        let solid = parse_step(SPLIT_TUBE).unwrap();
        let tensors = FeatureSampler::default().sample(&solid);
        for i in 0..2 {
            let b = tensors.face(i).unwrap().uv_bounds;
            assert!((b.u_max - b.u_min - std::f64::consts::PI).abs() < 1e-6);
            assert!((b.v_max - b.v_min - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn curvature_adds_channels() {
        let solid = two_squares();
        let config = SamplerConfig {
            curvature: true,
            face_u_samples: 4,
            face_v_samples: 3,
            edge_samples: 5,
            ..SamplerConfig::default()
        };
        let tensors = FeatureSampler::new(config).sample(&solid);
        assert_eq!(tensors.face_shape(), [4, 3, 9]);
        assert_eq!(tensors.face(0).unwrap().grid.shape(), &[4, 3, 9]);
        assert_eq!(tensors.edge_shape(), [5, 6]);
        assert!(tensors.face(1).unwrap().grid[[1, 1, 7]].abs() < 1e-6);
    }

    fn mask_of(samples: &FaceSamples) -> Vec<(usize, usize)> {
        let (nu, nv, _) = samples.grid.dim();
        (0..nu)
            .flat_map(|i| (0..nv).map(move |j| (i, j)))
            .filter(|&(i, j)| samples.grid[[i, j, MASK_CHANNEL]] < 0.5)
            .collect()
    }

    #[test]
    fn plate_hole_is_masked_out() {
        let solid = parse_step(HOLED_PLATE).unwrap();
        assert_eq!(solid.face(0).unwrap().loops().len(), 2);
        let tensors = FeatureSampler::default().sample(&solid);
        let plate = tensors.face(0).unwrap();
        let b = plate.uv_bounds;
        for (found, expected) in [(b.u_min, 0.0), (b.u_max, 10.0), (b.v_min, 0.0), (b.v_max, 10.0)] {
            assert!((found - expected).abs() < 1e-9);
        }
        // grid lines at 40/9 and 50/9 fall inside the 4..6 hole
        assert_eq!(mask_of(plate), vec![(4, 4), (4, 5), (5, 4), (5, 5)]);
        assert_eq!(plate.inside, 96);
    }

    #[test]
    fn hole_away_from_seam_keeps_full_turn() {
        let solid = parse_step(HOLED_CYLINDER).unwrap();
        let tensors = FeatureSampler::default().sample(&solid);
        let wall = tensors.face(0).unwrap();
        let b = wall.uv_bounds;
        assert!(b.u_min.abs() < 1e-9);
        assert!((b.u_max - std::f64::consts::TAU).abs() < 1e-9);
        assert!(b.v_min.abs() < 1e-9 && (b.v_max - 10.0).abs() < 1e-9);
        // only u = 14 pi / 9 lies in the 1.4 pi..1.6 pi window
        assert_eq!(mask_of(wall), vec![(7, 4), (7, 5)]);
        assert_eq!(wall.inside, 98);
        let g = &wall.grid;
        let radius = (g[[2, 5, 0]].powi(2) + g[[2, 5, 1]].powi(2)).sqrt();
        assert!((radius - 5.0).abs() < 1e-4);
    }
}
