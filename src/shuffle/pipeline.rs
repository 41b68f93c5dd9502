use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::common::progress::{create_counter, create_spinner};
use crate::ui::prelude::{Level, OutputFormat, emit, get_output_format};

use super::cli::{ConvertArgs, PlanArgs, RunArgs, ShuffleArgs};
use super::compose::{EntrySource, TimelineEntry, TimelineRenderer, compose};
use super::config::{ShuffleConfig, Workspace};
use super::error::ShuffleError;
use super::intervals::{Interval, check_intervals, load_intervals, total_duration, validate};
use super::planner::SegmentPlan;
use super::reassemble::{OutputPiece, reassemble};
use super::segment::{SegmentCatalog, SegmentId};
use super::shuffler::ChunkShuffler;
use super::srt::parse_srt;
use super::store::DirectorySegmentStore;
use super::time::Timestamp;
use super::transcode::{FfmpegTranscoder, Transcoder, ensure_ffmpeg_available};
use super::utils::{canonicalize_existing, compute_file_hash};

/// Shuffle settings after merging the config file with command line flags.
#[derive(Debug, Clone, Copy)]
pub struct ShuffleSettings {
    pub shuffler: ChunkShuffler,
    pub seed: u64,
}

impl ShuffleSettings {
    pub fn resolve(args: &ShuffleArgs, config: &ShuffleConfig) -> Result<Self, ShuffleError> {
        let shuffler = match (args.jump_chance, args.continue_chance) {
            (Some(jump_chance), _) => ChunkShuffler::from_jump_chance(jump_chance)?,
            (None, chance) => ChunkShuffler::new(chance.unwrap_or(config.continue_chance))?,
        };
        let seed = args.seed.unwrap_or_else(rand::random);
        Ok(Self { shuffler, seed })
    }
}

/// The shuffled dialogue, ready to be rendered.
#[derive(Debug, Clone, Serialize)]
pub struct ShufflePlan {
    pub timeline_length: Timestamp,
    pub seed: u64,
    pub continue_chance: f64,
    pub dialogue: Vec<SegmentId>,
    pub gaps: Vec<SegmentId>,
    pub permutation: Vec<SegmentId>,
    pub pieces: Vec<OutputPiece>,
}

impl ShufflePlan {
    /// Shuffle `plan.dialogue` and re-slice it onto `intervals`.
    pub fn build(
        intervals: &[Interval],
        plan: &SegmentPlan,
        settings: ShuffleSettings,
    ) -> Result<Self, ShuffleError> {
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let permutation = settings.shuffler.shuffle(&plan.dialogue, &mut rng);
        let pieces = reassemble(intervals, &permutation)?;

        Ok(Self {
            timeline_length: plan.timeline_length,
            seed: settings.seed,
            continue_chance: settings.shuffler.continue_chance(),
            dialogue: plan.dialogue.clone(),
            gaps: plan.gaps.clone(),
            permutation,
            pieces,
        })
    }

    pub fn timeline(&self) -> Result<Vec<TimelineEntry>, ShuffleError> {
        compose(self.pieces.clone(), &self.gaps)
    }

    pub fn trimmed_slice_count(&self) -> usize {
        self.pieces
            .iter()
            .flat_map(|piece| &piece.slices)
            .filter(|slice| !slice.is_whole())
            .count()
    }
}

fn load_checked_intervals(path: &Path, timeline_length: Timestamp) -> Result<Vec<Interval>> {
    let intervals = load_intervals(path)?;
    check_intervals(&intervals, Some(timeline_length))
        .with_context(|| format!("Intervals in {} are not usable", path.display()))?;
    Ok(intervals)
}

fn parse_timeline_length(value: &str) -> Result<Timestamp> {
    value
        .parse::<Timestamp>()
        .with_context(|| format!("Invalid timeline length '{value}'"))
}

pub fn handle_plan(args: PlanArgs, config: &ShuffleConfig) -> Result<()> {
    let timeline_length = parse_timeline_length(&args.timeline_length)?;
    let intervals = load_checked_intervals(&args.shuffle.intervals, timeline_length)?;
    let settings = ShuffleSettings::resolve(&args.shuffle, config)?;

    let segments = SegmentPlan::new(&intervals, timeline_length);
    let plan = ShufflePlan::build(&intervals, &segments, settings)?;
    let timeline = plan.timeline()?;

    if get_output_format() == OutputFormat::Json {
        emit(
            Level::Success,
            "shuffle.plan",
            &format!("Planned {} dialogue pieces", plan.pieces.len()),
            Some(serde_json::to_value(&plan).context("serializing shuffle plan")?),
        );
        return Ok(());
    }

    emit(
        Level::Info,
        "shuffle.plan.summary",
        &format!(
            "{} dialogue intervals ({}s), {} gaps, seed {}, continue chance {} \
             (~{:.1} clips per run)",
            intervals.len(),
            total_duration(&intervals),
            plan.gaps.len(),
            plan.seed,
            plan.continue_chance,
            settings.shuffler.expected_run_length()
        ),
        None,
    );
    for entry in &timeline {
        emit(Level::Info, "shuffle.plan.entry", &describe_entry(entry), None);
    }
    Ok(())
}

fn describe_entry(entry: &TimelineEntry) -> String {
    let at = entry.start.to_string();
    match &entry.source {
        EntrySource::Gap(_) => format!("{at:>9}  gap       {}s", entry.duration()),
        EntrySource::Piece(piece) => {
            let slices: Vec<String> = piece
                .slices
                .iter()
                .map(|slice| match slice.trim {
                    None => slice.segment.token(),
                    Some((start, end)) => format!("{}[{}-{}]", slice.segment.token(), start, end),
                })
                .collect();
            format!(
                "{at:>9}  dialogue  {}s <- {}",
                entry.duration(),
                slices.join(" + ")
            )
        }
    }
}

#[derive(Serialize)]
struct RunManifest<'a> {
    video: &'a Path,
    video_hash: Option<&'a str>,
    output: &'a Path,
    updated_at: String,
    intervals: &'a [Interval],
    plan: &'a ShufflePlan,
}

fn write_manifest(workspace: &Workspace, manifest: &RunManifest<'_>) -> Result<()> {
    let path = workspace.manifest_path();
    let json = serde_json::to_string_pretty(manifest).context("serializing run manifest")?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write run manifest to {}", path.display()))
}

fn resolve_output_path(args: &RunArgs, video_path: &Path) -> Result<PathBuf> {
    let output = match &args.out_file {
        Some(path) => path.clone(),
        None => {
            let name = video_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .context("Video path has no file name")?;
            video_path.with_file_name(format!("(SHUFFLED) {name}"))
        }
    };

    if output == video_path {
        return Err(anyhow!(
            "Output path {} would overwrite the source video",
            output.display()
        ));
    }

    // with --force the old file stays until the finished render is renamed over it
    if output.exists() && !args.force {
        anyhow::bail!(
            "Output file {} already exists. Use --force to overwrite.",
            output.display()
        );
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    Ok(output)
}

pub fn handle_run(args: RunArgs, config: &ShuffleConfig) -> Result<()> {
    ensure_ffmpeg_available()?;
    let transcoder = FfmpegTranscoder::new(config.audio.clone(), args.verbose);
    run_with(&args, config, &transcoder)
}

/// Full pipeline against any [`Transcoder`].
pub fn run_with<T: Transcoder>(
    args: &RunArgs,
    config: &ShuffleConfig,
    transcoder: &T,
) -> Result<()> {
    let video_path = canonicalize_existing(&args.video)?;
    let output_path = resolve_output_path(args, &video_path)?;

    let timeline_length = match &args.timeline_length {
        Some(value) => parse_timeline_length(value)?,
        None => transcoder.probe_duration(&video_path)?,
    };
    let intervals = load_checked_intervals(&args.shuffle.intervals, timeline_length)?;
    let settings = ShuffleSettings::resolve(&args.shuffle, config)?;

    let (workspace, video_hash) = match &args.workspace {
        Some(dir) => (Workspace::at(dir)?, None),
        None => {
            let pb = create_spinner(format!("Hashing {}", video_path.display()));
            let hash = compute_file_hash(&video_path);
            pb.finish_and_clear();
            let hash = hash?;
            (Workspace::for_video(&hash, &config.audio)?, Some(hash))
        }
    };
    emit(
        Level::Debug,
        "shuffle.run.workspace",
        &format!("Using workspace {}", workspace.root().display()),
        None,
    );

    let segments = SegmentPlan::new(&intervals, timeline_length);
    let store = DirectorySegmentStore::new(
        &video_path,
        &workspace,
        config.audio.extension.as_str(),
        transcoder,
    );
    let jobs = args.jobs.filter(|&jobs| jobs > 0).unwrap_or_else(|| config.jobs());

    let removed = store.remove_stale()?;
    if removed > 0 {
        emit(
            Level::Debug,
            "shuffle.extract.stale",
            &format!("Removed {removed} stale files from the workspace"),
            None,
        );
    }

    let mut catalog = match SegmentCatalog::load(&workspace.catalog_path()) {
        Ok(catalog) => catalog,
        Err(err) => {
            emit(
                Level::Warn,
                "shuffle.extract.catalog_unreadable",
                &format!("Ignoring unreadable segment catalog: {err:#}"),
                None,
            );
            SegmentCatalog::new()
        }
    };

    let pb = create_counter(segments.segment_count(), "extracting");
    let extracted = store.extract_all(&segments.cover(), jobs, Some(&pb));
    pb.finish_and_clear();
    catalog.extend(extracted?);
    catalog.save(&workspace.catalog_path())?;
    emit(
        Level::Debug,
        "shuffle.extract.catalog",
        &format!(
            "Catalog holds {} segments at {}",
            catalog.len(),
            workspace.catalog_path().display()
        ),
        None,
    );
    emit(
        Level::Success,
        "shuffle.extract.done",
        &format!(
            "Extracted {} dialogue and {} gap segments",
            segments.dialogue.len(),
            segments.gaps.len()
        ),
        None,
    );

    emit(
        Level::Debug,
        "shuffle.run.seed",
        &format!("Shuffling with seed {}", settings.seed),
        None,
    );
    let plan = ShufflePlan::build(&intervals, &segments, settings)?;
    write_manifest(
        &workspace,
        &RunManifest {
            video: &video_path,
            video_hash: video_hash.as_deref(),
            output: &output_path,
            updated_at: chrono::Utc::now().to_rfc3339(),
            intervals: &intervals,
            plan: &plan,
        },
    )?;

    let timeline = plan.timeline()?;
    let renderer = TimelineRenderer::new(
        transcoder,
        &workspace,
        &catalog,
        config.audio.extension.as_str(),
    );
    let pb = create_counter(timeline.len(), "rendering");
    let rendered = renderer.render_timeline(&timeline, &video_path, &output_path, Some(&pb));
    pb.finish_and_clear();
    rendered?;

    emit(
        Level::Success,
        "shuffle.run.done",
        &format!(
            "Wrote shuffled video to {} ({} pieces, {} re-encoded cuts, seed {})",
            output_path.display(),
            plan.pieces.len(),
            plan.trimmed_slice_count(),
            plan.seed
        ),
        Some(serde_json::json!({
            "output": output_path,
            "seed": plan.seed,
            "workspace": workspace.root(),
        })),
    );
    Ok(())
}

pub fn handle_convert(args: ConvertArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.subtitles)
        .with_context(|| format!("Failed to read subtitles {}", args.subtitles.display()))?;
    let cues = parse_srt(&contents)?;
    for cue in &cues {
        emit(
            Level::Debug,
            "shuffle.convert.cue",
            &format!("{} --> {}  {}", cue.start, cue.end, cue.text),
            None,
        );
    }
    let intervals: Vec<Interval> = cues
        .iter()
        .map(|cue| Interval::new(cue.start, cue.end))
        .collect();

    let output = args
        .out_file
        .clone()
        .unwrap_or_else(|| args.subtitles.with_extension("json"));
    if output.exists() && !args.force {
        anyhow::bail!(
            "Timestamps file {} already exists. Use --force to overwrite.",
            output.display()
        );
    }

    let json = serde_json::to_string(&intervals).context("serializing timestamps")?;
    fs::write(&output, json)
        .with_context(|| format!("Failed to write timestamps to {}", output.display()))?;

    let valid = validate(&intervals, None);
    if !valid && let Err(err) = check_intervals(&intervals, None) {
        emit(
            Level::Warn,
            "shuffle.convert.invalid",
            &format!("Converted subtitles will not shuffle as-is: {err}"),
            None,
        );
    }
    emit(
        Level::Success,
        "shuffle.convert.success",
        &format!("Wrote {} intervals to {}", intervals.len(), output.display()),
        Some(serde_json::json!({
            "output": output,
            "intervals": intervals.len(),
            "valid": valid,
        })),
    );
    Ok(())
}
