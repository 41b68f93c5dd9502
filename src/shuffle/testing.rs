//! In-memory transcoder for tests: "media" files are text files naming what
//! they contain, so tests can check what ended up where.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};

use super::segment::SegmentId;
use super::time::Timestamp;
use super::transcode::Transcoder;

#[derive(Default)]
pub struct FakeTranscoder {
    pub extractions: AtomicUsize,
    pub trims: AtomicUsize,
    pub duration: Option<Timestamp>,
    failing: Mutex<HashSet<SegmentId>>,
    pub concats: Mutex<Vec<Vec<PathBuf>>>,
    pub muxes: Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(duration: Timestamp) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn fail_on(&self, id: SegmentId) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn extraction_count(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

impl Transcoder for FakeTranscoder {
    fn extract(&self, _source: &Path, id: &SegmentId, output: &Path) -> Result<()> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(id) {
            bail!("simulated failure for {}", id.token());
        }
        if output.exists() {
            bail!("refusing to overwrite {}", output.display());
        }
        fs::write(output, id.token())?;
        Ok(())
    }

    fn trim(&self, input: &Path, start: Timestamp, end: Timestamp, output: &Path) -> Result<()> {
        self.trims.fetch_add(1, Ordering::SeqCst);
        let source = fs::read_to_string(input)?;
        fs::write(output, format!("{source}[{start}-{end}]"))?;
        Ok(())
    }

    fn concat(&self, inputs: &[PathBuf], _list_file: &Path, output: &Path) -> Result<()> {
        let mut joined = Vec::new();
        for input in inputs {
            joined.push(fs::read_to_string(input)?);
        }
        fs::write(output, joined.join("+"))?;
        self.concats.lock().unwrap().push(inputs.to_vec());
        Ok(())
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        fs::copy(audio, output)?;
        self.muxes.lock().unwrap().push((
            video.to_path_buf(),
            audio.to_path_buf(),
            output.to_path_buf(),
        ));
        Ok(())
    }

    fn probe_duration(&self, path: &Path) -> Result<Timestamp> {
        match self.duration {
            Some(duration) => Ok(duration),
            None => bail!("no duration for {}", path.display()),
        }
    }
}
