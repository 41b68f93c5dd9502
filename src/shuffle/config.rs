use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::paths;

use super::segment::SegmentKind;
use super::shuffler::ChunkShuffler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// ffmpeg audio encoder used for extracted and trimmed segments
    pub codec: String,
    /// Encoder quality passed as `-q:a`
    pub quality: u8,
    /// Container extension for segment files
    pub extension: String,
}

impl AudioSettings {
    /// Directory-safe name for these encoder settings. Segments encoded with
    /// different settings never share a workspace.
    pub fn profile_key(&self) -> String {
        let raw = format!("{}-q{}-{}", self.codec, self.quality, self.extension);
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: "libmp3lame".to_string(),
            quality: 2,
            extension: "mp3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleConfig {
    /// Chance (0-1, exclusive) that a shuffled run continues with the next clip
    pub continue_chance: f64,
    /// Extraction worker count; defaults to the available parallelism
    pub jobs: Option<usize>,
    pub audio: AudioSettings,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            continue_chance: ChunkShuffler::DEFAULT_CONTINUE_CHANCE,
            jobs: None,
            audio: AudioSettings::default(),
        }
    }
}

impl ShuffleConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(config_path()?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save_to_path(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading shuffle config from {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents).context("parsing shuffle config")?;
        config.sanitize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("creating shuffle config directory {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("serializing shuffle config")?;
        fs::write(path, toml)
            .with_context(|| format!("writing shuffle config to {}", path.display()))?;
        Ok(())
    }

    fn sanitize(&mut self) {
        if ChunkShuffler::new(self.continue_chance).is_err() {
            self.continue_chance = ChunkShuffler::DEFAULT_CONTINUE_CHANCE;
        }
        if self.jobs == Some(0) {
            self.jobs = None;
        }
        if self.audio.codec.trim().is_empty() || self.audio.extension.trim().is_empty() {
            self.audio = AudioSettings::default();
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(default_jobs)
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn config_path() -> Result<PathBuf> {
    Ok(paths::config_dir()?.join("config.toml"))
}

/// Per-video working directory holding every intermediate file.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Workspace under the data directory, keyed by the video's content hash
    /// and the audio encoder settings.
    pub fn for_video(video_hash: &str, audio: &AudioSettings) -> Result<Self> {
        Self::at(paths::data_dir()?.join(video_hash).join(audio.profile_key()))
    }

    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let workspace = Self { root: root.into() };
        workspace.ensure_directories()?;
        Ok(workspace)
    }

    fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.segment_dir(SegmentKind::Dialogue),
            self.segment_dir(SegmentKind::Gap),
            self.components_dir(),
            self.shuffled_dir(),
        ] {
            fs::create_dir_all(&dir).with_context(|| {
                format!("Failed to create workspace directory {}", dir.display())
            })?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn segment_dir(&self, kind: SegmentKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Trimmed sub-ranges waiting to be joined into pieces.
    pub fn components_dir(&self) -> PathBuf {
        self.root.join("components")
    }

    pub fn shuffled_dir(&self) -> PathBuf {
        self.root.join("shuffled")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn audio_path(&self, extension: &str) -> PathBuf {
        self.root.join(format!("audio.{extension}"))
    }
}
