use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde::Serialize;

use super::config::Workspace;
use super::error::ShuffleError;
use super::reassemble::OutputPiece;
use super::segment::{SegmentCatalog, SegmentId};
use super::time::Timestamp;
use super::transcode::Transcoder;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntrySource {
    Piece(OutputPiece),
    Gap(SegmentId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub start: Timestamp,
    pub source: EntrySource,
}

impl TimelineEntry {
    pub fn duration(&self) -> Timestamp {
        match &self.source {
            EntrySource::Piece(piece) => piece.interval.duration(),
            EntrySource::Gap(id) => id.duration,
        }
    }

    pub fn end(&self) -> Timestamp {
        match &self.source {
            EntrySource::Piece(piece) => piece.interval.end,
            EntrySource::Gap(id) => id.end(),
        }
    }
}

/// Interleave dialogue pieces and gaps by their position on the original
/// timeline.
pub fn compose(
    dialogue: Vec<OutputPiece>,
    gaps: &[SegmentId],
) -> Result<Vec<TimelineEntry>, ShuffleError> {
    if let Some(piece) = dialogue
        .iter()
        .find(|piece| piece.duration() != piece.interval.duration())
    {
        return Err(ShuffleError::ComposeFailure(format!(
            "piece at {} holds {}s of dialogue but its slot is {}s",
            piece.interval.start,
            piece.duration(),
            piece.interval.duration()
        )));
    }

    let mut entries: Vec<TimelineEntry> = dialogue
        .into_iter()
        .map(|piece| TimelineEntry {
            start: piece.interval.start,
            source: EntrySource::Piece(piece),
        })
        .chain(gaps.iter().map(|gap| TimelineEntry {
            start: gap.offset,
            source: EntrySource::Gap(*gap),
        }))
        .collect();
    entries.sort_by_key(|entry| entry.start);

    for pair in entries.windows(2) {
        if pair[1].start <= pair[0].start || pair[0].end() > pair[1].start {
            return Err(ShuffleError::ComposeFailure(format!(
                "entries at {} and {} overlap",
                pair[0].start, pair[1].start
            )));
        }
    }

    Ok(entries)
}

/// `out.mp4` -> `out.part.mp4`
pub fn partial_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}.part.{}", ext.to_string_lossy()),
        None => format!("{stem}.part"),
    };
    output.with_file_name(name)
}

/// Turns a composed timeline into files through a [`Transcoder`].
pub struct TimelineRenderer<'a, T: Transcoder> {
    transcoder: &'a T,
    workspace: &'a Workspace,
    catalog: &'a SegmentCatalog,
    extension: &'a str,
}

impl<'a, T: Transcoder> TimelineRenderer<'a, T> {
    pub fn new(
        transcoder: &'a T,
        workspace: &'a Workspace,
        catalog: &'a SegmentCatalog,
        extension: &'a str,
    ) -> Self {
        Self {
            transcoder,
            workspace,
            catalog,
            extension,
        }
    }

    /// Sub-ranges are content addressed like segments and reused when present.
    fn render_component(
        &self,
        segment: &SegmentId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<PathBuf> {
        let dir = self.workspace.components_dir();
        let name = format!("{}_{}-{}", segment.token(), start, end);
        let target = dir.join(format!("{name}.{}", self.extension));
        if target.exists() {
            return Ok(target);
        }

        let partial = dir.join(format!("{name}.part.{}", self.extension));
        self.transcoder
            .trim(self.catalog.path(segment)?, start, end, &partial)?;
        fs::rename(&partial, &target)
            .with_context(|| format!("Failed to finalize component {}", target.display()))?;
        Ok(target)
    }

    /// Audio file for one output piece. A piece made of a single whole segment
    /// reuses that segment's file.
    pub fn render_piece(&self, piece: &OutputPiece) -> Result<PathBuf> {
        if let Some(segment) = piece.single_whole_segment() {
            return Ok(self.catalog.path(&segment)?.to_path_buf());
        }

        let mut inputs = Vec::with_capacity(piece.slices.len());
        for slice in &piece.slices {
            let input = match slice.trim {
                None => self.catalog.path(&slice.segment)?.to_path_buf(),
                Some((start, end)) => self.render_component(&slice.segment, start, end)?,
            };
            inputs.push(input);
        }

        let token = piece.output_id().token();
        let list_file = self.workspace.components_dir().join(format!("{token}.txt"));
        let output = self
            .workspace
            .shuffled_dir()
            .join(format!("{token}.{}", self.extension));
        self.transcoder
            .concat(&inputs, &list_file, &output)
            .with_context(|| format!("Failed to join piece {token}"))?;
        Ok(output)
    }

    /// Render every entry, join them into one audio track and mux it against
    /// `video`. `output` only appears once the mux has fully succeeded.
    pub fn render_timeline(
        &self,
        entries: &[TimelineEntry],
        video: &Path,
        output: &Path,
        progress: Option<&ProgressBar>,
    ) -> Result<(), ShuffleError> {
        self.render_inner(entries, video, output, progress)
            .map_err(|err| ShuffleError::ComposeFailure(format!("{err:#}")))
    }

    fn render_inner(
        &self,
        entries: &[TimelineEntry],
        video: &Path,
        output: &Path,
        progress: Option<&ProgressBar>,
    ) -> Result<()> {
        let mut inputs = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = match &entry.source {
                EntrySource::Piece(piece) => self.render_piece(piece)?,
                EntrySource::Gap(id) => self.catalog.path(id)?.to_path_buf(),
            };
            inputs.push(path);
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        let audio = self.workspace.audio_path(self.extension);
        let list_file = self.workspace.root().join("timeline.txt");
        self.transcoder
            .concat(&inputs, &list_file, &audio)
            .context("Failed to join the shuffled audio track")?;

        let partial = partial_output_path(output);
        self.transcoder
            .mux(video, &audio, &partial)
            .context("Failed to mux shuffled audio with the video")?;
        fs::rename(&partial, output)
            .with_context(|| format!("Failed to move finished video to {}", output.display()))?;
        Ok(())
    }
}
