use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::time::Timestamp;

/// Identity and storage key of an extracted slice of the source timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId {
    pub offset: Timestamp,
    pub duration: Timestamp,
}

impl SegmentId {
    pub fn new(offset: Timestamp, duration: Timestamp) -> Self {
        Self { offset, duration }
    }

    pub fn end(&self) -> Timestamp {
        self.offset + self.duration
    }

    /// File-safe key such as `12.50d3.25`.
    pub fn token(&self) -> String {
        format!("{}d{}", self.offset, self.duration)
    }

    /// Recognise a token produced by [`SegmentId::token`].
    pub fn parse_token(token: &str) -> Option<Self> {
        let (offset, duration) = token.split_once('d')?;
        Some(Self {
            offset: offset.parse().ok()?,
            duration: duration.parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Dialogue,
    Gap,
}

impl SegmentKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            SegmentKind::Dialogue => "clips",
            SegmentKind::Gap => "gaps",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHandle {
    pub id: SegmentId,
    pub kind: SegmentKind,
    pub path: PathBuf,
}

/// Lookup table from segment identity to where its bytes live.
#[derive(Debug, Clone, Default)]
pub struct SegmentCatalog {
    segments: BTreeMap<SegmentId, SegmentHandle>,
}

impl SegmentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: SegmentHandle) {
        self.segments.insert(handle.id, handle);
    }

    pub fn get(&self, id: &SegmentId) -> Option<&SegmentHandle> {
        self.segments.get(id)
    }

    pub fn path(&self, id: &SegmentId) -> Result<&Path> {
        self.get(id)
            .map(|handle| handle.path.as_path())
            .with_context(|| format!("Segment {} is not in the catalog", id.token()))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn extend(&mut self, other: SegmentCatalog) {
        self.segments.extend(other.segments);
    }

    pub fn handles(&self) -> impl Iterator<Item = &SegmentHandle> {
        self.segments.values()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let handles: Vec<&SegmentHandle> = self.handles().collect();
        let json = serde_json::to_string_pretty(&handles).context("serializing segment catalog")?;
        fs::write(path, json)
            .with_context(|| format!("writing segment catalog to {}", path.display()))?;
        Ok(())
    }

    /// Read a saved catalog. Handles whose file has since disappeared are
    /// dropped; a missing catalog file loads as empty.
    pub fn load(path: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        if !path.exists() {
            return Ok(catalog);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading segment catalog from {}", path.display()))?;
        let handles: Vec<SegmentHandle> =
            serde_json::from_str(&contents).context("parsing segment catalog")?;
        for handle in handles.into_iter().filter(|handle| handle.path.exists()) {
            catalog.insert(handle);
        }
        Ok(catalog)
    }
}
