//! STEP B-rep solids to UV-Net style face-adjacency graphs, with batched
//! inference and mapping of predictions back onto faces.
//!
//! The stages, leaf first:
//!
//! 1. [`step`] reads a STEP file into a [`topology::Solid`].
//! 2. [`features`] samples UV grids on faces and point grids on edges.
//! 3. [`graph`] joins faces that share edges into a [`graph::FaceGraph`].
//! 4. [`inference`] runs a [`inference::Model`] over padded graph batches.
//! 5. [`mapping`] turns logits into labelled per-face or per-solid results.
//! 6. [`pipeline`] sequences the stages per file and over batches of files.

pub mod config;
pub mod error;
pub mod features;
pub mod geometry;
pub mod graph;
pub mod inference;
pub mod labels;
pub mod mapping;
pub mod math;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod step;
mod timeout;
pub mod topology;

pub use error::{BrepGraphError, FileError, Result, Stage};
pub use pipeline::{discover_step_files, run_batch, BatchItem, BatchRun, CancellationToken, Pipeline};
