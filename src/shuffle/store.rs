//! Content-addressed storage for extracted segments.
//!
//! A segment's file name is its identity token, so a finished file is proof the
//! segment exists. Extraction writes to a `.part` file and renames it on
//! success; an interrupted run therefore never leaves a file that looks done.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use rayon::prelude::*;

use super::config::Workspace;
use super::error::ShuffleError;
use super::planner::PlannedSegment;
use super::segment::{SegmentCatalog, SegmentHandle, SegmentId, SegmentKind};
use super::transcode::Transcoder;

pub trait SegmentStore {
    /// Return the stored segment, extracting it first if it is missing.
    fn ensure_extracted(&self, id: SegmentId, kind: SegmentKind)
    -> Result<SegmentHandle, ShuffleError>;
}

pub struct DirectorySegmentStore<'a, T: Transcoder> {
    source: PathBuf,
    workspace: &'a Workspace,
    extension: String,
    transcoder: &'a T,
}

impl<'a, T: Transcoder> DirectorySegmentStore<'a, T> {
    pub fn new(
        source: impl Into<PathBuf>,
        workspace: &'a Workspace,
        extension: impl Into<String>,
        transcoder: &'a T,
    ) -> Self {
        Self {
            source: source.into(),
            workspace,
            extension: extension.into(),
            transcoder,
        }
    }

    pub fn segment_path(&self, id: &SegmentId, kind: SegmentKind) -> PathBuf {
        self.workspace
            .segment_dir(kind)
            .join(format!("{}.{}", id.token(), self.extension))
    }

    fn partial_path(&self, id: &SegmentId, kind: SegmentKind) -> PathBuf {
        self.workspace
            .segment_dir(kind)
            .join(format!("{}.part.{}", id.token(), self.extension))
    }

    /// Delete interrupted `.part` files and anything in the segment directories
    /// that is not named `<token>.<ext>`. Returns how many files were removed.
    pub fn remove_stale(&self) -> Result<usize, ShuffleError> {
        let suffix = format!(".{}", self.extension);
        let mut removed = 0;

        for kind in [SegmentKind::Dialogue, SegmentKind::Gap] {
            for entry in fs::read_dir(self.workspace.segment_dir(kind))? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }

                let name = entry.file_name();
                let recognised = name
                    .to_str()
                    .and_then(|name| name.strip_suffix(&suffix))
                    .and_then(SegmentId::parse_token)
                    .is_some();
                if !recognised {
                    fs::remove_file(entry.path())?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    fn extract(&self, id: SegmentId, kind: SegmentKind, target: &Path) -> Result<(), ShuffleError> {
        let failure = |message: String| ShuffleError::SegmentExtractionFailure { id, message };
        let partial = self.partial_path(&id, kind);

        if partial.exists() {
            fs::remove_file(&partial).map_err(|err| {
                failure(format!("cannot remove stale {}: {err}", partial.display()))
            })?;
        }

        self.transcoder
            .extract(&self.source, &id, &partial)
            .map_err(|err| failure(format!("{err:#}")))?;

        fs::rename(&partial, target)
            .map_err(|err| failure(format!("cannot finalize {}: {err}", target.display())))
    }

    fn ensure_with_retry(
        &self,
        id: SegmentId,
        kind: SegmentKind,
    ) -> Result<SegmentHandle, ShuffleError> {
        match self.ensure_extracted(id, kind) {
            Err(err) if err.is_retryable() => self.ensure_extracted(id, kind),
            result => result,
        }
    }

    /// Extract every planned segment on a pool of `jobs` workers.
    pub fn extract_all(
        &self,
        segments: &[PlannedSegment],
        jobs: usize,
        progress: Option<&ProgressBar>,
    ) -> Result<SegmentCatalog, ShuffleError> {
        let work = || -> Vec<Result<SegmentHandle, ShuffleError>> {
            segments
                .par_iter()
                .map(|segment| {
                    let result = self.ensure_with_retry(segment.id, segment.kind);
                    if let Some(pb) = progress {
                        pb.inc(1);
                    }
                    result
                })
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(_) => work(),
        };

        let mut catalog = SegmentCatalog::new();
        for result in results {
            catalog.insert(result?);
        }
        Ok(catalog)
    }
}

impl<T: Transcoder> SegmentStore for DirectorySegmentStore<'_, T> {
    fn ensure_extracted(
        &self,
        id: SegmentId,
        kind: SegmentKind,
    ) -> Result<SegmentHandle, ShuffleError> {
        let path = self.segment_path(&id, kind);
        if !path.exists() {
            self.extract(id, kind, &path)?;
        }
        Ok(SegmentHandle { id, kind, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::testing::FakeTranscoder;
    use crate::shuffle::time::Timestamp;

    fn id(offset: u64, duration: u64) -> SegmentId {
        SegmentId::new(Timestamp::from_secs(offset), Timestamp::from_secs(duration))
    }

    fn dialogue(ids: &[SegmentId]) -> Vec<PlannedSegment> {
        ids.iter()
            .map(|&id| PlannedSegment {
                id,
                kind: SegmentKind::Dialogue,
            })
            .collect()
    }

    #[test]
    fn extraction_happens_once_per_identity() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::at(dir.path()).unwrap();
        let transcoder = FakeTranscoder::new();
        let store = DirectorySegmentStore::new("video.mp4", &workspace, "mp3", &transcoder);

        let first = store.ensure_extracted(id(2, 3), SegmentKind::Dialogue).unwrap();
        let second = store.ensure_extracted(id(2, 3), SegmentKind::Dialogue).unwrap();

        assert_eq!(first, second);
        assert_eq!(transcoder.extraction_count(), 1);
        assert!(first.path.ends_with("clips/2.00d3.00.mp3"));
        assert_eq!(fs::read_to_string(&first.path).unwrap(), "2.00d3.00");
    }

    #[test]
    fn stale_partial_file_is_redone() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::at(dir.path()).unwrap();
        let transcoder = FakeTranscoder::new();
        let store = DirectorySegmentStore::new("video.mp4", &workspace, "mp3", &transcoder);

        let partial = workspace.segment_dir(SegmentKind::Gap).join("0.00d2.00.part.mp3");
        fs::write(&partial, "half written").unwrap();

        let handle = store.ensure_extracted(id(0, 2), SegmentKind::Gap).unwrap();
        assert_eq!(transcoder.extraction_count(), 1);
        assert!(!partial.exists());
        assert_eq!(fs::read_to_string(handle.path).unwrap(), "0.00d2.00");
    }

    #[test]
    fn parallel_extraction_builds_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::at(dir.path()).unwrap();
        let transcoder = FakeTranscoder::new();
        let store = DirectorySegmentStore::new("video.mp4", &workspace, "mp3", &transcoder);
        let segments = dialogue(&(0..20).map(|i| id(i * 2, 1)).collect::<Vec<_>>());

        let catalog = store.extract_all(&segments, 4, None).unwrap();
        assert_eq!(catalog.len(), 20);
        assert_eq!(transcoder.extraction_count(), 20);

        // a second pass finds everything already on disk
        store.extract_all(&segments, 4, None).unwrap();
        assert_eq!(transcoder.extraction_count(), 20);
    }

    #[test]
    fn mixed_kinds_land_in_their_directories() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::at(dir.path()).unwrap();
        let transcoder = FakeTranscoder::new();
        let store = DirectorySegmentStore::new("video.mp4", &workspace, "mp3", &transcoder);
        let segments = [
            PlannedSegment {
                id: id(0, 1),
                kind: SegmentKind::Gap,
            },
            PlannedSegment {
                id: id(1, 2),
                kind: SegmentKind::Dialogue,
            },
        ];

        let catalog = store.extract_all(&segments, 2, None).unwrap();
        let gap_path = catalog.path(&id(0, 1)).unwrap();
        assert!(gap_path.starts_with(workspace.segment_dir(SegmentKind::Gap)));
        assert_eq!(catalog.get(&id(1, 2)).unwrap().kind, SegmentKind::Dialogue);
    }

    #[test]
    fn stale_and_foreign_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::at(dir.path()).unwrap();
        let transcoder = FakeTranscoder::new();
        let store = DirectorySegmentStore::new("video.mp4", &workspace, "mp3", &transcoder);

        let kept = store.ensure_extracted(id(2, 3), SegmentKind::Dialogue).unwrap();
        let clips = workspace.segment_dir(SegmentKind::Dialogue);
        let gaps = workspace.segment_dir(SegmentKind::Gap);
        fs::write(clips.join("2.00d3.00.part.mp3"), "half").unwrap();
        fs::write(clips.join("notes.txt"), "mine").unwrap();
        fs::write(gaps.join("0.00d2.00.wav"), "old codec").unwrap();

        assert_eq!(store.remove_stale().unwrap(), 3);
        assert!(kept.path.exists());
        assert_eq!(fs::read_dir(&clips).unwrap().count(), 1);
        assert_eq!(fs::read_dir(&gaps).unwrap().count(), 0);
        assert_eq!(store.remove_stale().unwrap(), 0);
    }

    #[test]
    fn failures_are_retried_once_then_reported() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::at(dir.path()).unwrap();
        let transcoder = FakeTranscoder::new();
        transcoder.fail_on(id(4, 1));
        let store = DirectorySegmentStore::new("video.mp4", &workspace, "mp3", &transcoder);

        let err = store
            .extract_all(&dialogue(&[id(0, 1), id(4, 1)]), 2, None)
            .unwrap_err();
        match err {
            ShuffleError::SegmentExtractionFailure { id: failed, .. } => {
                assert_eq!(failed, id(4, 1))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transcoder.extraction_count(), 3);
        assert!(store.segment_path(&id(0, 1), SegmentKind::Dialogue).exists());
    }
}
