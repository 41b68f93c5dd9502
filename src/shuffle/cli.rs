use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum ShuffleCommands {
    /// Shuffle the dialogue of a video and write the result next to it
    Run(RunArgs),
    /// Show how the dialogue would be shuffled without touching any media
    Plan(PlanArgs),
    /// Convert an SRT subtitle file into a JSON timestamps file
    Convert(ConvertArgs),
}

/// Options shared by every command that shuffles
#[derive(Args, Debug, Clone)]
pub struct ShuffleArgs {
    /// Dialogue intervals: SRT subtitles or a JSON array of [start, end] pairs
    #[arg(short = 'i', long = "intervals", value_hint = ValueHint::FilePath)]
    pub intervals: PathBuf,

    /// Chance (0-1, exclusive) that a run of dialogue continues with the next clip
    #[arg(long, value_name = "CHANCE")]
    pub continue_chance: Option<f64>,

    /// Chance (0-1, exclusive) of jumping to a new random run after each clip
    #[arg(long, value_name = "CHANCE", conflicts_with = "continue_chance")]
    pub jump_chance: Option<f64>,

    /// Seed for the shuffle; a random one is picked and reported when omitted
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Source video file
    #[arg(value_hint = ValueHint::FilePath)]
    pub video: PathBuf,

    #[command(flatten)]
    pub shuffle: ShuffleArgs,

    /// Optional output path; defaults to "(SHUFFLED) <videoname>" next to the video
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(long)]
    pub force: bool,

    /// Number of parallel extraction workers
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Timeline length in seconds; probed with ffprobe when omitted
    #[arg(long, value_name = "SECONDS")]
    pub timeline_length: Option<String>,

    /// Directory for intermediate segments; defaults to a per-video cache.
    /// Segments here are reused as-is, so clear it after changing audio settings
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub workspace: Option<PathBuf>,

    /// Show raw ffmpeg output
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub shuffle: ShuffleArgs,

    /// Timeline length in seconds
    #[arg(short = 'l', long, value_name = "SECONDS")]
    pub timeline_length: String,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Subtitle file to convert
    #[arg(value_hint = ValueHint::FilePath)]
    pub subtitles: PathBuf,

    /// Optional output path; defaults to the subtitle path with a .json extension
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Overwrite an existing timestamps file
    #[arg(long)]
    pub force: bool,
}
