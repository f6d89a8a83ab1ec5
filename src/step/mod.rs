//! STEP (ISO 10303-21) reader producing a [`Solid`].
//!
//! Loading runs in three passes: the scanner splits the `DATA` section into
//! statements, the tokenizer turns each statement into an [`Entity`]
//! (in parallel), and the loader walks the topology from the chosen root,
//! decoding geometry on demand.

mod decode;
mod entity;
mod loader;
mod scanner;
mod tokenizer;

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{GeometryLoadError, Result, Stage};
use crate::timeout::{run_bounded, WorkerError};
use crate::topology::Solid;

pub use decode::Decoder;
pub use entity::{Args, EntityTable};
pub use tokenizer::{parse_statement, Entity, Part, Token};

/// Reads STEP files into solids.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryLoader {
    timeout: Option<Duration>,
}

impl GeometryLoader {
    /// Creates a loader without a time limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each load by `limit`.
    #[must_use]
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// The configured time limit, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Loads the solid stored in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryLoadError`] when the file cannot be read or parsed
    /// into at least one face, and a `TimeoutError` for the load stage when
    /// the configured limit elapses.
    pub fn load(&self, path: &Path) -> Result<Solid> {
        let started = Instant::now();
        let owned = path.to_path_buf();
        let solid = match run_bounded(Stage::Load, self.timeout, move || read_solid(owned)) {
            Ok(result) => result?,
            Err(WorkerError::Timeout(t)) => return Err(t.into()),
            Err(WorkerError::Disconnected) => return Err(GeometryLoadError::WorkerPanicked.into()),
        };
        info!(
            path = %path.display(),
            faces = solid.num_faces(),
            edges = solid.num_edges(),
            elapsed_ms = started.elapsed().as_millis(),
            "loaded solid"
        );
        Ok(solid)
    }
}

/// Reads and parses a file. Bytes that are not UTF-8 (Latin-1 names from
/// older exporters) are replaced; strings never feed geometry.
fn read_solid(path: PathBuf) -> std::result::Result<Solid, GeometryLoadError> {
    let bytes = std::fs::read(&path).map_err(|source| GeometryLoadError::Io {
        path: path.clone(),
        source,
    })?;
    let content = String::from_utf8_lossy(&bytes);
    if matches!(content, Cow::Owned(_)) {
        debug!(path = %path.display(), "file is not valid UTF-8, decoding lossily");
    }
    Ok(parse_step(&content)?.with_source(path))
}

/// Parses STEP text held in memory.
///
/// # Errors
///
/// Returns [`GeometryLoadError`] for any structural or syntax problem, or
/// when the file contains no faces.
pub fn parse_step(content: &str) -> std::result::Result<Solid, GeometryLoadError> {
    let statements = scanner::data_statements(content)?;
    let table = EntityTable::parse(&statements)?;
    debug!(entities = table.len(), "tokenized data section");
    loader::build_solid(&table)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::error::BrepGraphError;
    use crate::geometry::surface::SurfaceKind;

    pub(crate) const CUBE: &str = include_str!("../../testdata/cube.step");
    pub(crate) const CUBE_ROTATED: &str = include_str!("../../testdata/cube_rotated.step");
    pub(crate) const SINGLE_FACE: &str = include_str!("../../testdata/single_face.step");
    pub(crate) const SPLIT_TUBE: &str = include_str!("../../testdata/split_tube.step");
    pub(crate) const CUBE_WITH_UNSUPPORTED: &str = include_str!("../../testdata/cube_with_unsupported.step");
    pub(crate) const HOLED_PLATE: &str = include_str!("../../testdata/holed_plate.step");
    pub(crate) const HOLED_CYLINDER: &str = include_str!("../../testdata/holed_cylinder.step");

    #[test]
    fn cube_has_six_planar_faces() {
        let solid = parse_step(CUBE).unwrap();
        assert_eq!(solid.num_faces(), 6);
        assert_eq!(solid.num_edges(), 12);
        assert_eq!(solid.num_vertices(), 8);
        assert!(solid.faces().all(|f| f.kind() == SurfaceKind::Plane));
        assert!(solid.edges().all(|e| e.faces().len() == 2));
    }

    #[test]
    fn cube_faces_follow_shell_order() {
        let solid = parse_step(CUBE_ROTATED).unwrap();
        let original = parse_step(CUBE).unwrap();
        let ids: Vec<u32> = solid.faces().map(|f| f.source_id()).collect();
        let original_ids: Vec<u32> = original.faces().map(|f| f.source_id()).collect();
        assert_eq!(solid.num_faces(), 6);
        assert_ne!(ids, original_ids);
    }

    #[test]
    fn reload_gives_identical_ordering() {
        let a = parse_step(CUBE).unwrap();
        let b = parse_step(CUBE).unwrap();
        let ea: Vec<u32> = a.edges().map(|e| e.source_id()).collect();
        let eb: Vec<u32> = b.edges().map(|e| e.source_id()).collect();
        assert_eq!(ea, eb);
    }

    #[test]
    fn single_face_shell() {
        let solid = parse_step(SINGLE_FACE).unwrap();
        assert_eq!(solid.num_faces(), 1);
        assert!(solid.edges().all(|e| e.faces().len() == 1));
    }

    #[test]
    fn split_tube_shares_two_edges() {
        let solid = parse_step(SPLIT_TUBE).unwrap();
        assert_eq!(solid.num_faces(), 2);
        assert!(solid.faces().all(|f| f.kind() == SurfaceKind::Cylinder));
        let shared = solid.edges().filter(|e| e.faces() == [0, 1]).count();
        assert_eq!(shared, 2);
    }

    #[test]
    fn unsupported_surface_keeps_face() {
        let solid = parse_step(CUBE_WITH_UNSUPPORTED).unwrap();
        assert_eq!(solid.num_faces(), 6);
        let unsupported = solid
            .faces()
            .filter(|f| f.kind() == SurfaceKind::Unsupported)
            .count();
        assert_eq!(unsupported, 1);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let cut = &CUBE[..CUBE.len() / 2];
        assert!(matches!(parse_step(cut), Err(GeometryLoadError::Truncated(_))));
    }

    #[test]
    fn missing_reference_is_rejected() {
        let broken = CUBE.replacen("#1=", "#99999=", 1);
        let err = parse_step(&broken).unwrap_err();
        assert!(matches!(err, GeometryLoadError::MissingEntity { id: 1, .. }), "{err}");
    }

    #[test]
    fn file_without_faces_is_rejected() {
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n#1=CARTESIAN_POINT('',(0.,0.,0.));\nENDSEC;\nEND-ISO-10303-21;\n";
        assert!(matches!(parse_step(text), Err(GeometryLoadError::NoFaces)));
    }

    #[test]
    fn load_reads_from_disk_and_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.step");
        std::fs::write(&path, CUBE).unwrap();
        let solid = GeometryLoader::new()
            .with_timeout(Duration::from_secs(30))
            .load(&path)
            .unwrap();
        assert_eq!(solid.source(), Some(path.as_path()));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = GeometryLoader::new()
            .load(Path::new("/nonexistent/part.step"))
            .unwrap_err();
        assert!(matches!(err, BrepGraphError::Load(GeometryLoadError::Io { .. })));
    }

    #[test]
    fn latin1_names_do_not_stop_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.step");
        let mut bytes = CUBE.replace("DATA;\n", "DATA;\n#9000=PRODUCT('CAFE','Caf\u{1}','',(#1));\n").into_bytes();
        let marker = bytes.iter().position(|&b| b == 1).unwrap();
        bytes[marker] = 0xE9;
        std::fs::write(&path, &bytes).unwrap();
        let solid = GeometryLoader::new().load(&path).unwrap();
        assert_eq!(solid.num_faces(), 6);
    }

    #[test]
    fn loose_shells_are_all_kept() {
        let text = SINGLE_FACE.replace(
            "#38=SHELL_BASED_SURFACE_MODEL('',(#37));\n",
            "#39=ADVANCED_FACE('',(#30),#35,.F.);\n#40=OPEN_SHELL('',(#39));\n",
        );
        let solid = parse_step(&text).unwrap();
        assert_eq!(solid.num_faces(), 2);
        assert!(solid.face(0).unwrap().same_sense());
        assert!(!solid.face(1).unwrap().same_sense());
        assert_eq!(solid.num_edges(), 4);
    }
}
