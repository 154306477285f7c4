//! End-to-end dataset construction.
//!
//! Per mesh: load -> reserve id -> encode -> write fragment + pointer ->
//! fold bounds -> label. Manifests are written only after every mesh is on disk,
//! with the top-level `info` last.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;

use crate::codec;
use crate::error::{Error, Result};
use crate::extent::{Extent, ExtentCalculator, ExtentMode};
use crate::manifest::{
    build_fragment_pointer, build_mesh_info, build_segment_properties, build_top_level,
    fragment_file_name, pointer_file_name, INFO_FILE, MESH_DIR, SEGMENT_PROPERTIES_DIR,
};
use crate::mesh::Mesh;
use crate::registry::{IdRegistry, SegmentId};

/// Produces decoded geometry for a source path.
///
/// Return [`Error::MissingInputFile`] for a source that does not exist; the
/// build skips it. Any other error aborts the build.
pub trait MeshLoader: Sync {
    fn load(&self, path: &Path) -> Result<Mesh>;
}

impl<F> MeshLoader for F
where
    F: Fn(&Path) -> Result<Mesh> + Sync,
{
    fn load(&self, path: &Path) -> Result<Mesh> {
        self(path)
    }
}

/// One object to put into the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntry {
    pub source: PathBuf,
    /// Use this id instead of the next auto-assigned one.
    pub id: Option<SegmentId>,
    pub label: Option<String>,
}

impl MeshEntry {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            id: None,
            label: None,
        }
    }

    pub fn with_id(mut self, id: SegmentId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Dataset root directory.
    pub root: PathBuf,
    pub extent: ExtentMode,
    /// First auto-assigned segment id.
    pub initial_id: SegmentId,
    /// Encode and write meshes on the rayon pool. Ids stay unique but are no
    /// longer assigned in input order.
    pub parallel: bool,
    /// Read every fragment back and decode it after writing.
    pub verify_fragments: bool,
}

impl BuildConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extent: ExtentMode::Derived,
            initial_id: 1,
            parallel: false,
            verify_fragments: false,
        }
    }

    pub fn mesh_dir(&self) -> PathBuf {
        self.root.join(MESH_DIR)
    }

    pub fn segment_properties_dir(&self) -> PathBuf {
        self.root.join(SEGMENT_PROPERTIES_DIR)
    }

    pub fn info_path(&self) -> PathBuf {
        self.root.join(INFO_FILE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildState {
    Idle,
    ScanningMeshes { done: usize, total: usize },
    Finalizing,
    Complete,
    Failed(String),
}

impl BuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Complete | BuildState::Failed(_))
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Segment ids written, in input order.
    pub segments: Vec<SegmentId>,
    /// Sources that did not exist and were left out.
    pub skipped: Vec<PathBuf>,
    pub extent: Extent,
    /// Number of rows in the segment-properties table.
    pub labels: usize,
}

enum Outcome {
    Written(SegmentId),
    Skipped(PathBuf),
}

/// Drives one build into [`BuildConfig::root`]. A builder is single-use.
pub struct DatasetBuilder {
    config: BuildConfig,
    registry: Mutex<IdRegistry>,
    extent: Mutex<ExtentCalculator>,
    state: Mutex<BuildState>,
    done: AtomicUsize,
}

impl DatasetBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            registry: Mutex::new(IdRegistry::new(config.initial_id)),
            extent: Mutex::new(ExtentCalculator::new(config.extent)),
            state: Mutex::new(BuildState::Idle),
            done: AtomicUsize::new(0),
            config,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn state(&self) -> BuildState {
        self.state.lock().clone()
    }

    fn set_state(&self, state: BuildState) {
        debug!("Build state -> {:?}", state);
        *self.state.lock() = state;
    }

    /// Build the dataset from `entries`. On failure no top-level `info` exists.
    pub fn build<L: MeshLoader>(&self, entries: &[MeshEntry], loader: &L) -> Result<BuildReport> {
        {
            let mut state = self.state.lock();
            if *state != BuildState::Idle {
                return Err(Error::InvalidDataset(
                    "dataset builder has already been run".into(),
                ));
            }

            *state = BuildState::ScanningMeshes {
                done: 0,
                total: entries.len(),
            };
            debug!("Build state -> {:?}", *state);
        }

        match self.run(entries, loader) {
            Ok(report) => {
                self.set_state(BuildState::Complete);
                Ok(report)
            }
            Err(err) => {
                warn!("Build failed: {err}");
                self.set_state(BuildState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn run<L: MeshLoader>(&self, entries: &[MeshEntry], loader: &L) -> Result<BuildReport> {
        let total = entries.len();
        self.prepare_root()?;

        info!(
            "Processing {} meshes into {}",
            total,
            self.config.root.display()
        );

        let outcomes: Vec<Outcome> = if self.config.parallel {
            entries
                .par_iter()
                .map(|entry| self.process_entry(entry, loader, total))
                .collect::<Result<Vec<_>>>()?
        } else {
            entries
                .iter()
                .map(|entry| self.process_entry(entry, loader, total))
                .collect::<Result<Vec<_>>>()?
        };

        let mut segments = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Written(id) => segments.push(id),
                Outcome::Skipped(path) => skipped.push(path),
            }
        }

        self.set_state(BuildState::Finalizing);
        let (extent, labels) = self.finalize()?;

        info!(
            "OK {} ({} segments, {} skipped, resolution {:?}, size {:?})",
            self.config.root.display(),
            segments.len(),
            skipped.len(),
            extent.resolution,
            extent.volume_size
        );

        Ok(BuildReport {
            segments,
            skipped,
            extent,
            labels,
        })
    }

    /// Create the mesh directory and drop any manifest left over from an earlier build.
    fn prepare_root(&self) -> Result<()> {
        let mesh_dir = self.config.mesh_dir();
        fs::create_dir_all(&mesh_dir).map_err(|e| Error::io(&mesh_dir, e))?;

        let info_path = self.config.info_path();
        if info_path.exists() {
            debug!("Removing stale manifest {}", info_path.display());
            fs::remove_file(&info_path).map_err(|e| Error::io(&info_path, e))?;
        }

        Ok(())
    }

    fn process_entry<L: MeshLoader>(
        &self,
        entry: &MeshEntry,
        loader: &L,
        total: usize,
    ) -> Result<Outcome> {
        debug!("Loading {}", entry.source.display());

        let mesh = match loader.load(&entry.source) {
            Ok(mesh) => mesh,
            Err(err) if err.is_recoverable() => {
                warn!("{err}. Skipping.");
                return Ok(Outcome::Skipped(entry.source.clone()));
            }
            Err(err) => return Err(err),
        };

        let id = self.registry.lock().reserve(entry.id)?;
        let bytes = codec::encode(&mesh)?;

        let mesh_dir = self.config.mesh_dir();
        let fragment_path = mesh_dir.join(fragment_file_name(id));
        fs::write(&fragment_path, &bytes).map_err(|e| Error::io(&fragment_path, e))?;
        write_json(
            &mesh_dir.join(pointer_file_name(id)),
            &build_fragment_pointer(id),
        )?;

        if self.config.verify_fragments {
            verify_fragment(&fragment_path, &mesh)?;
        }

        self.extent.lock().update(&mesh)?;

        if let Some(label) = &entry.label {
            self.registry.lock().label(id, label.clone())?;
        }

        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.advance(done, total);

        info!(
            "OK {} -> {} ({} verts, {} faces)",
            entry.source.display(),
            fragment_path.display(),
            mesh.vertex_count(),
            mesh.face_count()
        );

        Ok(Outcome::Written(id))
    }

    /// Workers finish out of order; progress only ever moves forward.
    fn advance(&self, done: usize, total: usize) {
        let mut state = self.state.lock();
        if let BuildState::ScanningMeshes { done: current, .. } = &mut *state {
            if done > *current {
                *current = done;
                debug!("Build state -> {:?}", BuildState::ScanningMeshes { done, total });
            }
        }
    }

    fn finalize(&self) -> Result<(Extent, usize)> {
        let (extent, meshes) = {
            let mut calc = self.extent.lock();
            (calc.finalize()?, calc.meshes_seen())
        };

        if meshes == 0 {
            return Err(Error::InvalidDataset("no meshes were processed".into()));
        }

        if !extent.is_usable() {
            return Err(Error::InvalidDataset(format!(
                "resolution {:?} has a non-positive component",
                extent.resolution
            )));
        }

        let labels = self.registry.lock().snapshot();
        let has_labels = !labels.is_empty();

        write_json(&self.config.mesh_dir().join(INFO_FILE), &build_mesh_info())?;

        if has_labels {
            let dir = self.config.segment_properties_dir();
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            write_json(&dir.join(INFO_FILE), &build_segment_properties(&labels))?;
        }

        // Last: its presence marks the dataset as complete.
        write_json(
            &self.config.info_path(),
            &build_top_level(&extent, has_labels),
        )?;

        Ok((extent, labels.len()))
    }
}

fn write_json<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let bytes = serde_json::to_vec(doc)?;
    fs::write(path, bytes).map_err(|e| Error::io(path, e))
}

fn verify_fragment(path: &Path, mesh: &Mesh) -> Result<()> {
    let decoded = codec::read_fragment(path)?;

    if decoded.vertex_count() != mesh.vertex_count() || decoded.face_count() != mesh.face_count()
    {
        return Err(Error::MalformedFragment(format!(
            "{} decodes to {} verts / {} faces, expected {} / {}",
            path.display(),
            decoded.vertex_count(),
            decoded.face_count(),
            mesh.vertex_count(),
            mesh.face_count()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(_: &Path) -> Result<Mesh> {
        Ok(Mesh::new(
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, 1.0]],
            vec![[0, 1, 2]],
        ))
    }

    #[test]
    fn new_builder_is_idle() {
        let builder = DatasetBuilder::new(BuildConfig::new("unused"));
        assert_eq!(builder.state(), BuildState::Idle);
    }

    #[test]
    fn successful_build_ends_complete() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DatasetBuilder::new(BuildConfig::new(dir.path()));

        builder
            .build(&[MeshEntry::new("a.obj")], &triangle)
            .unwrap();

        assert_eq!(builder.state(), BuildState::Complete);
        assert!(builder.state().is_terminal());
    }

    #[test]
    fn builder_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DatasetBuilder::new(BuildConfig::new(dir.path()));
        builder.build(&[MeshEntry::new("a.obj")], &triangle).unwrap();

        assert!(matches!(
            builder.build(&[MeshEntry::new("b.obj")], &triangle),
            Err(Error::InvalidDataset(_))
        ));
    }

    #[test]
    fn concurrent_builds_run_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DatasetBuilder::new(BuildConfig::new(dir.path()));
        let entries = [MeshEntry::new("a.obj")];

        let results: Vec<Result<BuildReport>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| builder.build(&entries, &triangle)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(builder.state(), BuildState::Complete);
    }

    #[test]
    fn parallel_progress_never_goes_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BuildConfig::new(dir.path());
        config.parallel = true;
        let builder = DatasetBuilder::new(config);

        let seen = Mutex::new(Vec::new());
        let observing = |path: &Path| -> Result<Mesh> {
            if let BuildState::ScanningMeshes { done, total } = builder.state() {
                seen.lock().push((std::thread::current().id(), done, total));
            }
            triangle(path)
        };

        let entries: Vec<_> = (0..64).map(|i| MeshEntry::new(format!("{i}.obj"))).collect();
        builder.build(&entries, &observing).unwrap();

        let seen = seen.into_inner();
        assert!(!seen.is_empty());
        for (i, (thread, done, total)) in seen.iter().enumerate() {
            assert_eq!(*total, 64);
            assert!(*done < 64);
            // Later observations on the same worker never see a smaller count.
            for (other, later, _) in &seen[i + 1..] {
                if other == thread {
                    assert!(later >= done, "progress went from {done} to {later}");
                }
            }
        }
    }

    #[test]
    fn failure_is_absorbing() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DatasetBuilder::new(BuildConfig::new(dir.path()));
        let broken = |_: &Path| -> Result<Mesh> {
            Ok(Mesh::new(vec![[1.0; 3]], vec![[0, 0, 1]]))
        };

        let err = builder.build(&[MeshEntry::new("a.obj")], &broken).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
        assert!(matches!(builder.state(), BuildState::Failed(_)));
    }

    #[test]
    fn flat_dataset_is_rejected_in_derived_mode() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DatasetBuilder::new(BuildConfig::new(dir.path()));
        let flat = |_: &Path| -> Result<Mesh> {
            Ok(Mesh::new(
                vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                vec![[0, 1, 2]],
            ))
        };

        assert!(matches!(
            builder.build(&[MeshEntry::new("flat.obj")], &flat),
            Err(Error::InvalidDataset(_))
        ));
        assert!(!dir.path().join("info").exists());
    }

    #[test]
    fn verify_accepts_written_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BuildConfig::new(dir.path());
        config.verify_fragments = true;

        let report = DatasetBuilder::new(config)
            .build(&[MeshEntry::new("a.obj")], &triangle)
            .unwrap();
        assert_eq!(report.segments, vec![1]);
    }
}
