//! File-level orchestration: load, sample, build, infer and map.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{FileError, GraphError, ModelMismatchError, Stage};
use crate::features::FeatureSampler;
use crate::graph::{FaceGraph, GraphBuilder};
use crate::inference::{InferenceEngine, Mode, Model};
use crate::labels::LabelTable;
use crate::mapping::{InferenceResult, ResultMapper};
use crate::step::GeometryLoader;

/// Shared flag that stops a [`BatchRun`] before its next file.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops every batch holding a clone of this token before its next file.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`CancellationToken::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs every stage for one model, label table and mode.
///
/// The model and labels are shared handles; cloning a pipeline is cheap.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    loader: GeometryLoader,
    sampler: FeatureSampler,
    builder: GraphBuilder,
    engine: InferenceEngine,
    model: Arc<dyn Model>,
    labels: Arc<LabelTable>,
    mode: Mode,
}

impl Pipeline {
    /// # Errors
    ///
    /// Returns [`ModelMismatchError::Mode`] when `model` does not perform
    /// `mode`.
    pub fn new(
        config: PipelineConfig,
        model: Arc<dyn Model>,
        labels: Arc<LabelTable>,
        mode: Mode,
    ) -> Result<Self, ModelMismatchError> {
        if model.mode() != mode {
            return Err(ModelMismatchError::Mode {
                expected: mode,
                found: model.mode(),
            });
        }
        Ok(Self {
            loader: config.loader.loader(),
            sampler: FeatureSampler::new(config.sampler.clone()),
            builder: GraphBuilder::new(config.graph.clone()),
            engine: InferenceEngine::new(config.inference.clone()),
            config,
            model,
            labels,
            mode,
        })
    }

    /// Configuration the stages were built from.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Model run by the inference stage.
    #[must_use]
    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Labels predictions are mapped through.
    #[must_use]
    pub fn labels(&self) -> &Arc<LabelTable> {
        &self.labels
    }

    /// Whether files are segmented or classified.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Loads `path` and builds its face graph.
    ///
    /// # Errors
    ///
    /// Returns a [`FileError`] for the load, sample or build stage.
    pub fn graph(&self, path: &Path) -> Result<FaceGraph, FileError> {
        graph_for(&self.loader, &self.sampler, &self.builder, path)
    }

    /// Runs every stage on one file.
    ///
    /// # Errors
    ///
    /// Returns a [`FileError`] naming the file and the failing stage.
    pub fn run_file(&self, path: &Path) -> Result<InferenceResult, FileError> {
        let started = Instant::now();
        let graph = self.graph(path)?;

        let raw = self
            .engine
            .infer_one(&graph, &self.model, self.mode)
            .map_err(|e| FileError::new(path, Stage::Infer, e))?;
        let result = ResultMapper::map(&raw, &graph, &self.labels, self.mode)
            .map_err(|e| FileError::new(path, Stage::Map, e))?;

        info!(
            path = %path.display(),
            mode = %self.mode,
            nodes = graph.num_nodes(),
            excluded = graph.excluded().len(),
            elapsed_ms = started.elapsed().as_millis(),
            "processed file"
        );
        Ok(result)
    }

    /// Processes `paths` lazily, one file per iteration step.
    #[must_use]
    pub fn run_batch(&self, paths: Vec<PathBuf>) -> BatchRun {
        self.run_batch_with(paths, CancellationToken::new())
    }

    /// Like [`Pipeline::run_batch`], stopping once `token` is cancelled.
    #[must_use]
    pub fn run_batch_with(&self, paths: Vec<PathBuf>, token: CancellationToken) -> BatchRun {
        info!(files = paths.len(), model = self.model.name(), "starting batch");
        BatchRun {
            pipeline: self.clone(),
            paths: paths.into_iter(),
            token,
            cancelled: false,
            failed: 0,
        }
    }
}

/// Load, sample and build without a model, for inspection.
///
/// # Errors
///
/// Returns a [`FileError`] for the load, sample or build stage.
pub fn build_graph(config: &PipelineConfig, path: &Path) -> Result<FaceGraph, FileError> {
    graph_for(
        &config.loader.loader(),
        &FeatureSampler::new(config.sampler.clone()),
        &GraphBuilder::new(config.graph.clone()),
        path,
    )
}

fn graph_for(
    loader: &GeometryLoader,
    sampler: &FeatureSampler,
    builder: &GraphBuilder,
    path: &Path,
) -> Result<FaceGraph, FileError> {
    let solid = loader
        .load(path)
        .map_err(|e| FileError::new(path, Stage::Load, e))?;

    let features = sampler.sample(&solid);
    if features.excluded().len() == features.num_faces() {
        return Err(FileError::new(
            path,
            Stage::Sample,
            GraphError::NoNodes {
                faces: features.num_faces(),
            },
        ));
    }

    let graph = builder
        .build(&solid, &features)
        .map_err(|e| FileError::new(path, Stage::Build, e))?;
    debug!(
        path = %path.display(),
        nodes = graph.num_nodes(),
        edges = graph.num_edges(),
        "built graph"
    );
    Ok(graph)
}

/// Outcome for one input file.
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub outcome: Result<InferenceResult, FileError>,
}

/// Lazy iterator over the files of a batch, in input order.
///
/// A failing file yields an error item and the batch continues. Once the
/// token is cancelled the iterator ends before the next file.
pub struct BatchRun {
    pipeline: Pipeline,
    paths: std::vec::IntoIter<PathBuf>,
    token: CancellationToken,
    cancelled: bool,
    failed: usize,
}

impl BatchRun {
    /// Whether the run stopped on cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Token that cancels this run.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Files that failed so far.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl Iterator for BatchRun {
    type Item = BatchItem;

    fn next(&mut self) -> Option<BatchItem> {
        if self.cancelled {
            return None;
        }
        if self.token.is_cancelled() {
            self.cancelled = true;
            info!(remaining = self.paths.len(), "batch cancelled");
            return None;
        }
        let path = self.paths.next()?;
        let outcome = self.pipeline.run_file(&path);
        if let Err(e) = &outcome {
            self.failed += 1;
            warn!(path = %path.display(), stage = %e.stage, error = %e.source, "file failed");
        }
        Some(BatchItem { path, outcome })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.cancelled {
            (0, Some(0))
        } else {
            (0, Some(self.paths.len()))
        }
    }
}

/// Processes `paths` with the default configuration.
///
/// # Errors
///
/// Returns [`ModelMismatchError::Mode`] when `model` does not perform `mode`.
pub fn run_batch(
    paths: Vec<PathBuf>,
    model: Arc<dyn Model>,
    labels: Arc<LabelTable>,
    mode: Mode,
) -> Result<BatchRun, ModelMismatchError> {
    Ok(Pipeline::new(PipelineConfig::default(), model, labels, mode)?.run_batch(paths))
}

/// STEP files (`.step`/`.stp`, any case) below `dir`, sorted.
///
/// # Errors
///
/// Returns [`glob::PatternError`] when `dir` cannot form a search pattern.
pub fn discover_step_files(dir: &Path) -> Result<Vec<PathBuf>, glob::PatternError> {
    let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                None
            }
        })
        .filter(|p| p.is_file() && is_step(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_step(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("step") || e.eq_ignore_ascii_case("stp"))
}
