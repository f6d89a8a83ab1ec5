use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{s, Axis, Ix2, Ix3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BrepGraphError, InferenceError, ModelMismatchError, Stage, TimeoutError};
use crate::graph::FaceGraph;
use crate::timeout::{run_bounded, WorkerError};

use super::batch::{BatchOutput, GraphBatch};
use super::model::Model;
use super::{Mode, RawOutput};

/// Batching and time limits of the inference engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest number of graphs packed into one forward pass.
    pub max_batch_size: usize,
    /// Limit on each forward pass, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 8,
            timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Forward pass limit as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Runs a [`Model`] over face graphs.
#[derive(Debug, Clone, Default)]
pub struct InferenceEngine {
    config: EngineConfig,
}

/// Why a whole forward pass produced nothing usable.
enum ChunkError {
    Timeout(TimeoutError),
    Inference(InferenceError),
}

impl InferenceEngine {
    /// Creates an engine with `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Batching and time limits.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Checks that `graph` fits the input contract of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelMismatchError`] when a grid shape differs.
    pub fn check(model: &dyn Model, graph: &FaceGraph) -> Result<(), ModelMismatchError> {
        let shape = model.input_shape();
        if graph.face_shape() != shape.face_grid {
            return Err(ModelMismatchError::FaceGrid {
                expected: shape.face_grid,
                found: graph.face_shape(),
            });
        }
        if graph.edge_shape() != shape.edge_grid {
            return Err(ModelMismatchError::EdgeGrid {
                expected: shape.edge_grid,
                found: graph.edge_shape(),
            });
        }
        Ok(())
    }

    /// Runs `model` over `graphs` and returns one result per graph, in
    /// input order.
    ///
    /// Graphs that do not fit the model fail on their own without reaching
    /// it. When a multi-graph forward pass fails, its graphs are re-run one
    /// at a time so only the offending graph reports the failure. A timed-out
    /// pass is not retried.
    pub fn infer(
        &self,
        graphs: &[&FaceGraph],
        model: &Arc<dyn Model>,
        mode: Mode,
    ) -> Vec<Result<RawOutput, BrepGraphError>> {
        if model.mode() != mode {
            return graphs
                .iter()
                .map(|_| {
                    Err(ModelMismatchError::Mode {
                        expected: mode,
                        found: model.mode(),
                    }
                    .into())
                })
                .collect();
        }

        let mut results: Vec<Option<Result<RawOutput, BrepGraphError>>> =
            graphs.iter().map(|_| None).collect();
        let mut valid = Vec::with_capacity(graphs.len());
        for (i, graph) in graphs.iter().enumerate() {
            match Self::check(model.as_ref(), graph) {
                Ok(()) => valid.push(i),
                Err(e) => results[i] = Some(Err(e.into())),
            }
        }

        for chunk in valid.chunks(self.config.max_batch_size.max(1)) {
            let members: Vec<&FaceGraph> = chunk.iter().map(|&i| graphs[i]).collect();
            let outcomes = match self.run_chunk(model, &members) {
                Ok(outcomes) => outcomes,
                Err(ChunkError::Timeout(t)) => {
                    warn!(model = model.name(), graphs = chunk.len(), "forward pass timed out");
                    members
                        .iter()
                        .map(|_| {
                            Err(TimeoutError {
                                stage: t.stage,
                                limit: t.limit,
                            }
                            .into())
                        })
                        .collect()
                }
                Err(ChunkError::Inference(e)) if members.len() > 1 => {
                    warn!(
                        model = model.name(),
                        graphs = chunk.len(),
                        error = %e,
                        "batched forward pass failed, retrying graphs one at a time"
                    );
                    members.iter().map(|g| self.run_single(model, g)).collect()
                }
                Err(ChunkError::Inference(e)) => vec![Err(e.into())],
            };
            for (&i, outcome) in chunk.iter().zip(outcomes) {
                results[i] = Some(outcome);
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(InferenceError::WorkerPanicked.into())))
            .collect()
    }

    /// Runs `model` over one graph.
    ///
    /// # Errors
    ///
    /// Any error [`InferenceEngine::infer`] reports for a single graph.
    pub fn infer_one(
        &self,
        graph: &FaceGraph,
        model: &Arc<dyn Model>,
        mode: Mode,
    ) -> Result<RawOutput, BrepGraphError> {
        self.infer(&[graph], model, mode)
            .pop()
            .unwrap_or_else(|| Err(InferenceError::WorkerPanicked.into()))
    }

    fn run_single(&self, model: &Arc<dyn Model>, graph: &FaceGraph) -> Result<RawOutput, BrepGraphError> {
        match self.run_chunk(model, &[graph]) {
            Ok(mut outcomes) => outcomes
                .pop()
                .unwrap_or_else(|| Err(InferenceError::WorkerPanicked.into())),
            Err(ChunkError::Timeout(t)) => Err(t.into()),
            Err(ChunkError::Inference(e)) => Err(e.into()),
        }
    }

    fn run_chunk(
        &self,
        model: &Arc<dyn Model>,
        graphs: &[&FaceGraph],
    ) -> Result<Vec<Result<RawOutput, BrepGraphError>>, ChunkError> {
        let started = Instant::now();
        let batch = GraphBatch::pack(graphs);
        let nodes: Vec<usize> = (0..batch.batch_size()).map(|i| batch.num_nodes(i)).collect();
        let n_max = batch.max_nodes();

        let worker = Arc::clone(model);
        let output = match run_bounded(Stage::Infer, self.config.timeout(), move || worker.forward(&batch)) {
            Ok(result) => result.map_err(ChunkError::Inference)?,
            Err(WorkerError::Timeout(t)) => return Err(ChunkError::Timeout(t)),
            Err(WorkerError::Disconnected) => {
                return Err(ChunkError::Inference(InferenceError::WorkerPanicked))
            }
        };

        let outcomes = split(output, model.mode(), model.num_classes(), &nodes, n_max)
            .map_err(ChunkError::Inference)?;
        debug!(
            model = model.name(),
            graphs = graphs.len(),
            max_nodes = n_max,
            elapsed_ms = started.elapsed().as_millis(),
            "forward pass"
        );
        Ok(outcomes)
    }
}

/// Checks the shape of a batch output and slices out each graph's rows.
fn split(
    output: BatchOutput,
    mode: Mode,
    classes: Option<usize>,
    nodes: &[usize],
    n_max: usize,
) -> Result<Vec<Result<RawOutput, BrepGraphError>>, InferenceError> {
    let b = nodes.len();
    let found = output.logits.shape().to_vec();
    let k = classes.unwrap_or_else(|| found.last().copied().unwrap_or(0));
    let expected = match mode {
        Mode::Segmentation => vec![b, n_max, k],
        Mode::Classification => vec![b, k],
    };
    if found != expected || k == 0 {
        return Err(InferenceError::OutputShape { expected, found });
    }

    let per_graph = match mode {
        Mode::Segmentation => {
            let logits = output
                .logits
                .into_dimensionality::<Ix3>()
                .map_err(|e| InferenceError::Forward(e.to_string()))?;
            nodes
                .iter()
                .enumerate()
                .map(|(i, &n)| RawOutput::Segmentation(logits.slice(s![i, ..n, ..]).to_owned()))
                .collect::<Vec<_>>()
        }
        Mode::Classification => {
            let logits = output
                .logits
                .into_dimensionality::<Ix2>()
                .map_err(|e| InferenceError::Forward(e.to_string()))?;
            logits
                .axis_iter(Axis(0))
                .map(|row| RawOutput::Classification(row.to_owned()))
                .collect()
        }
    };

    Ok(per_graph
        .into_iter()
        .map(|raw| {
            if is_finite(&raw) {
                Ok(raw)
            } else {
                Err(InferenceError::NonFinite.into())
            }
        })
        .collect())
}

fn is_finite(raw: &RawOutput) -> bool {
    match raw {
        RawOutput::Segmentation(rows) => rows.iter().all(|x| x.is_finite()),
        RawOutput::Classification(v) => v.iter().all(|x| x.is_finite()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use approx::assert_relative_eq;
    use ndarray::{Array2, ArrayD, IxDyn};

    use super::*;
    use crate::features::{FeatureSampler, SamplerConfig};
    use crate::graph::GraphBuilder;
    use crate::inference::{InputShape, MeanPoolModel};
    use crate::step::parse_step;
    use crate::step::tests::{CUBE, SINGLE_FACE, SPLIT_TUBE};

    fn graph_with(text: &str, config: SamplerConfig) -> FaceGraph {
        let solid = parse_step(text).unwrap();
        let features = FeatureSampler::new(config).sample(&solid);
        GraphBuilder::default().build(&solid, &features).unwrap()
    }

    fn graph(text: &str) -> FaceGraph {
        graph_with(text, SamplerConfig::default())
    }

    fn linear(mode: Mode) -> Arc<dyn Model> {
        let mut weights = Array2::<f32>::zeros((3, 14));
        for (j, w) in weights.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let v = ((j * 7) % 11) as f32 * 0.05 - 0.25;
            *w = v;
        }
        Arc::new(
            MeanPoolModel::new("linear", mode, InputShape::default(), weights, ndarray::array![0.0, 0.1, 0.2])
                .unwrap(),
        )
    }

    /// Fails every batch containing a graph with exactly one node.
    struct RejectsSingletons {
        inner: Arc<dyn Model>,
        calls: AtomicUsize,
    }

    impl Model for RejectsSingletons {
        fn name(&self) -> &str {
            "rejects-singletons"
        }
        fn mode(&self) -> Mode {
            self.inner.mode()
        }
        fn input_shape(&self) -> InputShape {
            self.inner.input_shape()
        }
        fn num_classes(&self) -> Option<usize> {
            self.inner.num_classes()
        }
        fn forward(&self, batch: &GraphBatch) -> Result<BatchOutput, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if (0..batch.batch_size()).any(|i| batch.num_nodes(i) == 1) {
                return Err(InferenceError::Forward("singleton graph".into()));
            }
            self.inner.forward(batch)
        }
    }

    struct Slow;

    impl Model for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn mode(&self) -> Mode {
            Mode::Classification
        }
        fn input_shape(&self) -> InputShape {
            InputShape::default()
        }
        fn num_classes(&self) -> Option<usize> {
            Some(2)
        }
        fn forward(&self, batch: &GraphBatch) -> Result<BatchOutput, InferenceError> {
            thread::sleep(Duration::from_millis(400));
            Ok(BatchOutput::new(ArrayD::zeros(IxDyn(&[batch.batch_size(), 2]))))
        }
    }

    struct WrongShape;

    impl Model for WrongShape {
        fn name(&self) -> &str {
            "wrong-shape"
        }
        fn mode(&self) -> Mode {
            Mode::Segmentation
        }
        fn input_shape(&self) -> InputShape {
            InputShape::default()
        }
        fn num_classes(&self) -> Option<usize> {
            Some(4)
        }
        fn forward(&self, batch: &GraphBatch) -> Result<BatchOutput, InferenceError> {
            Ok(BatchOutput::new(ArrayD::from_elem(IxDyn(&[batch.batch_size(), 4]), f32::NAN)))
        }
    }

    #[test]
    fn batched_matches_single_graph_runs() {
        let cube = graph(CUBE);
        let face = graph(SINGLE_FACE);
        let tube = graph(SPLIT_TUBE);
        let model = linear(Mode::Segmentation);
        let engine = InferenceEngine::default();

        let batched = engine.infer(&[&cube, &face, &tube], &model, Mode::Segmentation);
        for (g, together) in [&cube, &face, &tube].into_iter().zip(batched) {
            let RawOutput::Segmentation(together) = together.unwrap() else {
                panic!("expected segmentation output");
            };
            let RawOutput::Segmentation(alone) = engine.infer_one(g, &model, Mode::Segmentation).unwrap()
            else {
                panic!("expected segmentation output");
            };
            assert_eq!(together.dim(), (g.num_nodes(), 3));
            for (a, b) in together.iter().zip(alone.iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn classification_yields_one_vector_per_graph() {
        let cube = graph(CUBE);
        let face = graph(SINGLE_FACE);
        let out = InferenceEngine::default().infer(&[&cube, &face], &linear(Mode::Classification), Mode::Classification);
        assert_eq!(out.len(), 2);
        for r in out {
            assert_eq!(r.unwrap().num_classes(), 3);
        }
    }

    #[test]
    fn failing_graph_is_isolated() {
        let cube = graph(CUBE);
        let face = graph(SINGLE_FACE);
        let tube = graph(SPLIT_TUBE);
        let model = Arc::new(RejectsSingletons {
            inner: linear(Mode::Segmentation),
            calls: AtomicUsize::new(0),
        });
        let dynamic: Arc<dyn Model> = model.clone();
        let out = InferenceEngine::default().infer(&[&cube, &face, &tube], &dynamic, Mode::Segmentation);
        assert!(out[0].is_ok());
        assert!(matches!(
            out[1],
            Err(BrepGraphError::Inference(InferenceError::Forward(_)))
        ));
        assert!(out[2].is_ok());
        // one batched attempt, then one per graph
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn mode_mismatch_fails_every_graph() {
        let cube = graph(CUBE);
        let face = graph(SINGLE_FACE);
        let out = InferenceEngine::default().infer(&[&cube, &face], &linear(Mode::Classification), Mode::Segmentation);
        assert!(out.iter().all(|r| matches!(
            r,
            Err(BrepGraphError::ModelMismatch(ModelMismatchError::Mode { .. }))
        )));
    }

    #[test]
    fn shape_mismatch_never_reaches_model() {
        let coarse = graph_with(
            CUBE,
            SamplerConfig {
                face_u_samples: 5,
                face_v_samples: 5,
                ..SamplerConfig::default()
            },
        );
        let cube = graph(CUBE);
        let model = Arc::new(RejectsSingletons {
            inner: linear(Mode::Segmentation),
            calls: AtomicUsize::new(0),
        });
        let dynamic: Arc<dyn Model> = model.clone();
        let out = InferenceEngine::default().infer(&[&coarse, &cube], &dynamic, Mode::Segmentation);
        assert!(matches!(
            out[0],
            Err(BrepGraphError::ModelMismatch(ModelMismatchError::FaceGrid {
                found: [5, 5, 7],
                ..
            }))
        ));
        assert!(out[1].is_ok());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batches_respect_max_size() {
        let cube = graph(CUBE);
        let model = Arc::new(RejectsSingletons {
            inner: linear(Mode::Segmentation),
            calls: AtomicUsize::new(0),
        });
        let dynamic: Arc<dyn Model> = model.clone();
        let engine = InferenceEngine::new(EngineConfig {
            max_batch_size: 2,
            timeout_ms: None,
        });
        let out = engine.infer(&[&cube, &cube, &cube, &cube, &cube], &dynamic, Mode::Segmentation);
        assert!(out.iter().all(Result::is_ok));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn slow_forward_times_out_per_graph() {
        let cube = graph(CUBE);
        let face = graph(SINGLE_FACE);
        let model: Arc<dyn Model> = Arc::new(Slow);
        let engine = InferenceEngine::new(EngineConfig {
            max_batch_size: 8,
            timeout_ms: Some(30),
        });
        let out = engine.infer(&[&cube, &face], &model, Mode::Classification);
        assert_eq!(out.len(), 2);
        for r in out {
            let Err(BrepGraphError::Timeout(t)) = r else {
                panic!("expected timeout");
            };
            assert_eq!(t.stage, Stage::Infer);
        }
    }

    #[test]
    fn malformed_output_is_rejected() {
        let cube = graph(CUBE);
        let model: Arc<dyn Model> = Arc::new(WrongShape);
        let err = InferenceEngine::default()
            .infer_one(&cube, &model, Mode::Segmentation)
            .unwrap_err();
        let BrepGraphError::Inference(InferenceError::OutputShape { expected, found }) = err else {
            panic!("expected output shape error, got {err:?}");
        };
        assert_eq!(expected, vec![1, 6, 4]);
        assert_eq!(found, vec![1, 4]);
    }
}
