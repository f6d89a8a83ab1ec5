//! Result exports: `.seg` label lists, JSON reports and text statistics.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::error::ReportError;
use crate::inference::Mode;
use crate::labels::LabelTable;
use crate::mapping::{ClassificationResult, InferenceResult, SegmentationResult};
use crate::pipeline::BatchItem;

/// One label id per face and line; `-1` marks faces without result.
#[must_use]
pub fn seg_lines(result: &SegmentationResult) -> String {
    let mut out = String::with_capacity(result.num_faces() * 3);
    for id in result.label_ids() {
        match id {
            Some(id) => {
                let _ = writeln!(out, "{id}");
            }
            None => out.push_str("-1\n"),
        }
    }
    out
}

/// Writes [`seg_lines`] to `path`.
///
/// # Errors
///
/// Returns [`ReportError::Io`] when the file cannot be written.
pub fn write_seg(path: &Path, result: &SegmentationResult) -> Result<(), ReportError> {
    write_text(path, &seg_lines(result))
}

/// Writes `value` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ReportError`] when serialization or writing fails.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportError> {
    let text = serde_json::to_string_pretty(value)?;
    write_text(path, &text)
}

fn write_text(path: &Path, text: &str) -> Result<(), ReportError> {
    std::fs::write(path, text).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Faces carrying one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub name: String,
    pub count: usize,
}

/// JSON summary of a segmentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationReport {
    pub model: String,
    pub step_file: String,
    pub total_faces: usize,
    pub labeled_faces: usize,
    /// Face count per label id; labels without faces are listed with 0.
    pub label_distribution: BTreeMap<usize, LabelCount>,
    /// Label id of every face, `null` where there is no result.
    pub face_labels: Vec<Option<usize>>,
    pub label_names: BTreeMap<usize, String>,
    pub label_colors: BTreeMap<usize, [u8; 3]>,
}

impl SegmentationReport {
    /// Summarizes `result` for `step_file`.
    #[must_use]
    pub fn new(model: &str, step_file: &str, result: &SegmentationResult, labels: &LabelTable) -> Self {
        let histogram = result.histogram();
        Self {
            model: model.to_string(),
            step_file: step_file.to_string(),
            total_faces: result.num_faces(),
            labeled_faces: result.num_labeled(),
            label_distribution: labels
                .iter()
                .map(|(id, l)| {
                    let count = histogram.get(&id).copied().unwrap_or(0);
                    (id, LabelCount { name: l.name.clone(), count })
                })
                .collect(),
            face_labels: result.label_ids(),
            label_names: labels.iter().map(|(id, l)| (id, l.name.clone())).collect(),
            label_colors: labels.iter().map(|(id, l)| (id, l.color)).collect(),
        }
    }
}

/// JSON summary of a classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub model: String,
    pub step_file: String,
    pub label_id: usize,
    pub label_name: String,
    pub confidence: f32,
    /// Probability per label name, in label id order.
    pub probabilities: Vec<(String, f32)>,
}

impl ClassificationReport {
    /// Summarizes `result` for `step_file`.
    #[must_use]
    pub fn new(model: &str, step_file: &str, result: &ClassificationResult, labels: &LabelTable) -> Self {
        let probabilities = result
            .probabilities
            .iter()
            .enumerate()
            .map(|(id, &p)| {
                let name = labels
                    .get(id)
                    .map_or_else(|| format!("class_{id}"), |l| l.name.clone());
                (name, p)
            })
            .collect();
        Self {
            model: model.to_string(),
            step_file: step_file.to_string(),
            label_id: result.prediction.label_id,
            label_name: result.prediction.name.clone(),
            confidence: result.prediction.confidence,
            probabilities,
        }
    }
}

/// Plain-text segmentation statistics: face totals and the share of each
/// label that occurs.
#[must_use]
pub fn statistics_text(model: &str, step_file: &str, result: &SegmentationResult, labels: &LabelTable) -> String {
    let total = result.num_faces();
    let mut out = String::new();
    let _ = writeln!(out, "Segmentation report");
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(out, "Model: {model}");
    let _ = writeln!(out, "STEP file: {step_file}");
    let _ = writeln!(out, "Total faces: {total}");
    let without = total - result.num_labeled();
    if without > 0 {
        let _ = writeln!(out, "Faces without result: {without}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Label distribution:");
    for (id, count) in result.histogram() {
        let name = labels.get(id).map_or("?", |l| l.name.as_str());
        #[allow(clippy::cast_precision_loss)]
        let percent = count as f64 / total.max(1) as f64 * 100.0;
        let _ = writeln!(out, "{name}: {count} ({percent:.1}%)");
    }
    out
}

/// One file of a batch summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Classified(ClassificationReport),
    Segmented {
        step_file: String,
        seg_file: String,
        total_faces: usize,
        labeled_faces: usize,
    },
    Failed {
        step_file: String,
        stage: String,
        error: String,
    },
}

impl BatchEntry {
    /// Whether the file produced no output.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Writes the per-file outputs of a batch into one directory and collects
/// a summary entry per file.
///
/// A file whose output cannot be written is recorded as failed at the
/// `report` stage; later files are still written.
#[derive(Debug)]
pub struct BatchReport<'l> {
    output: PathBuf,
    model: String,
    labels: &'l LabelTable,
    entries: Vec<BatchEntry>,
}

impl<'l> BatchReport<'l> {
    /// Starts an empty report writing into `output`.
    #[must_use]
    pub fn new(output: &Path, model: &str, labels: &'l LabelTable) -> Self {
        Self {
            output: output.to_path_buf(),
            model: model.to_string(),
            labels,
            entries: Vec::new(),
        }
    }

    /// Writes the outputs of one batch item and records its entry.
    pub fn record(&mut self, item: BatchItem) {
        let step_file = display_name(&item.path);
        let entry = match item.outcome {
            Ok(InferenceResult::Segmentation(seg)) => {
                let stem = item
                    .path
                    .file_stem()
                    .map_or_else(|| step_file.clone(), |s| s.to_string_lossy().into_owned());
                let seg_file = format!("{stem}.seg");
                match write_seg(&self.output.join(&seg_file), &seg) {
                    Ok(()) => BatchEntry::Segmented {
                        step_file,
                        seg_file,
                        total_faces: seg.num_faces(),
                        labeled_faces: seg.num_labeled(),
                    },
                    Err(e) => {
                        warn!(file = %step_file, error = %e, "cannot write segmentation");
                        BatchEntry::Failed {
                            step_file,
                            stage: "report".into(),
                            error: e.to_string(),
                        }
                    }
                }
            }
            Ok(InferenceResult::Classification(cls)) => {
                BatchEntry::Classified(ClassificationReport::new(&self.model, &step_file, &cls, self.labels))
            }
            Err(e) => BatchEntry::Failed {
                step_file,
                stage: e.stage.to_string(),
                error: e.source.to_string(),
            },
        };
        self.entries.push(entry);
    }

    /// Entries in the order files were recorded.
    #[must_use]
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Number of files recorded as failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failed()).count()
    }

    /// Writes the summary as `classification.json` or `segmentation.json`
    /// and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the summary cannot be written.
    pub fn write_summary(&self, mode: Mode) -> Result<PathBuf, ReportError> {
        let path = self.output.join(format!("{}.json", mode.as_str()));
        write_json(&path, &self.entries)?;
        Ok(path)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
