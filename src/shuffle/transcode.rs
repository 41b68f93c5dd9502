use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};

use super::config::AudioSettings;
use super::segment::SegmentId;
use super::time::Timestamp;

/// Everything the pipeline needs from an audio/video engine.
pub trait Transcoder: Sync {
    /// Cut `[offset, offset + duration)` of the source audio into `output`.
    fn extract(&self, source: &Path, id: &SegmentId, output: &Path) -> Result<()>;

    /// Re-encode `[start, end)` of an extracted segment.
    fn trim(&self, input: &Path, start: Timestamp, end: Timestamp, output: &Path) -> Result<()>;

    /// Join audio files back to back without re-encoding.
    fn concat(&self, inputs: &[PathBuf], list_file: &Path, output: &Path) -> Result<()>;

    /// Replace the audio of `video`, copying the video stream untouched.
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    fn probe_duration(&self, path: &Path) -> Result<Timestamp>;
}

pub trait FfmpegRunner: Sync {
    fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFfmpegRunner;

#[derive(Debug, Clone, Default)]
pub struct FfmpegRunOptions {
    pub total_duration: Option<f64>,
    pub verbose: bool,
}

impl FfmpegRunOptions {
    pub fn new(total_duration: Option<f64>, verbose: bool) -> Self {
        Self {
            total_duration,
            verbose,
        }
    }
}

impl FfmpegRunner for SystemFfmpegRunner {
    fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()> {
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| "Failed to spawn ffmpeg")?;

        let stderr = child
            .stderr
            .take()
            .context("ffmpeg stderr was not captured")?;

        let pb = match options.total_duration {
            Some(duration) => Some(duration_progress_bar(duration)?),
            None => None,
        };

        let mut last_line = String::new();
        let mut error_lines: Vec<String> = Vec::new();
        let result = read_ffmpeg_stderr(
            stderr,
            options.verbose,
            &pb,
            &mut last_line,
            &mut error_lines,
        );

        let status = child.wait().context("Failed to wait for ffmpeg")?;
        result?;

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        if !status.success() {
            let error_msg = if !error_lines.is_empty() {
                error_lines.join("\n")
            } else {
                last_line
            };
            bail!(
                "ffmpeg exited with status {:?}: {}",
                status.code(),
                error_msg.trim()
            );
        }

        Ok(())
    }
}

fn duration_progress_bar(duration: f64) -> Result<ProgressBar> {
    let pb = ProgressBar::new((duration * 1000.0) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] ({eta}) {msg}")
            .context("invalid progress bar template")?
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message("muxing".to_string());
    Ok(pb)
}

fn read_ffmpeg_stderr<R: Read>(
    mut stderr: R,
    verbose: bool,
    pb: &Option<ProgressBar>,
    last_line: &mut String,
    error_lines: &mut Vec<String>,
) -> Result<()> {
    let mut buffer = [0u8; 4096];
    let mut accumulated = String::new();

    loop {
        let bytes_read = stderr
            .read(&mut buffer)
            .context("Failed to read ffmpeg stderr")?;
        if bytes_read == 0 {
            break;
        }

        accumulated.push_str(&String::from_utf8_lossy(&buffer[..bytes_read]));

        while let Some(pos) = accumulated.find(['\r', '\n']) {
            let line = accumulated[..pos].to_string();
            accumulated.drain(..=pos);

            if line.is_empty() {
                continue;
            }

            if verbose {
                eprintln!("{}", line);
            }

            if line.to_ascii_lowercase().contains("error") {
                error_lines.push(line.clone());
            }

            if let Some(pb) = pb
                && let Some(progress) = parse_ffmpeg_progress(&line)
            {
                pb.set_position((progress * 1000.0) as u64);
            }

            *last_line = line;
        }
    }

    Ok(())
}

fn parse_ffmpeg_progress(line: &str) -> Option<f64> {
    let time_start = line.find("time=")?;
    let time_str = &line[time_start + 5..];
    let time_end = time_str.find(' ')?;
    parse_time_to_seconds(&time_str[..time_end])
}

fn parse_time_to_seconds(time_str: &str) -> Option<f64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Quote a path for an ffmpeg concat list.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

pub fn write_concat_list(inputs: &[PathBuf], list_file: &Path) -> Result<()> {
    let mut contents = String::new();
    for input in inputs {
        let absolute = if input.is_absolute() {
            input.clone()
        } else {
            std::env::current_dir()
                .context("Failed to resolve current directory")?
                .join(input)
        };
        contents.push_str(&format!("file '{}'\n", escape_concat_path(&absolute)));
    }
    fs::write(list_file, contents)
        .with_context(|| format!("Failed to write concat list {}", list_file.display()))
}

/// [`Transcoder`] backed by the `ffmpeg` and `ffprobe` executables.
pub struct FfmpegTranscoder<R: FfmpegRunner = SystemFfmpegRunner> {
    runner: R,
    audio: AudioSettings,
    verbose: bool,
}

impl FfmpegTranscoder<SystemFfmpegRunner> {
    pub fn new(audio: AudioSettings, verbose: bool) -> Self {
        Self::with_runner(SystemFfmpegRunner, audio, verbose)
    }
}

pub fn ensure_ffmpeg_available() -> Result<()> {
    for program in ["ffmpeg", "ffprobe"] {
        which::which(program)
            .with_context(|| format!("`{program}` was not found on PATH; install ffmpeg"))?;
    }
    Ok(())
}

impl<R: FfmpegRunner> FfmpegTranscoder<R> {
    pub fn with_runner(runner: R, audio: AudioSettings, verbose: bool) -> Self {
        Self {
            runner,
            audio,
            verbose,
        }
    }

    fn encode_args(&self) -> [String; 4] {
        [
            "-c:a".to_string(),
            self.audio.codec.clone(),
            "-q:a".to_string(),
            self.audio.quality.to_string(),
        ]
    }

    fn run(&self, args: Vec<String>, total_duration: Option<f64>) -> Result<()> {
        self.runner
            .run(&args, FfmpegRunOptions::new(total_duration, self.verbose))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl<R: FfmpegRunner> Transcoder for FfmpegTranscoder<R> {
    fn extract(&self, source: &Path, id: &SegmentId, output: &Path) -> Result<()> {
        let mut args = strings(&["-hide_banner", "-nostdin", "-n", "-ss"]);
        args.push(id.offset.to_string());
        args.push("-i".to_string());
        args.push(path_arg(source));
        args.push("-t".to_string());
        args.push(id.duration.to_string());
        args.extend(strings(&["-vn", "-map", "0:a:0"]));
        args.extend(self.encode_args());
        args.push(path_arg(output));
        self.run(args, None)
    }

    fn trim(&self, input: &Path, start: Timestamp, end: Timestamp, output: &Path) -> Result<()> {
        let mut args = strings(&["-hide_banner", "-nostdin", "-y", "-i"]);
        args.push(path_arg(input));
        args.push("-ss".to_string());
        args.push(start.to_string());
        args.push("-to".to_string());
        args.push(end.to_string());
        args.extend(self.encode_args());
        args.push(path_arg(output));
        self.run(args, None)
    }

    fn concat(&self, inputs: &[PathBuf], list_file: &Path, output: &Path) -> Result<()> {
        write_concat_list(inputs, list_file)?;
        let mut args = strings(&["-hide_banner", "-nostdin", "-y"]);
        args.extend(strings(&["-f", "concat", "-safe", "0", "-i"]));
        args.push(path_arg(list_file));
        args.extend(strings(&["-c:a", "copy"]));
        args.push(path_arg(output));
        self.run(args, None)
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let total = self.probe_duration(video).ok().map(Timestamp::as_secs_f64);
        let mut args = strings(&["-hide_banner", "-nostdin", "-y", "-i"]);
        args.push(path_arg(video));
        args.push("-i".to_string());
        args.push(path_arg(audio));
        args.extend(strings(&[
            "-map", "0:v", "-map", "1:a", "-c:v", "copy", "-c:a", "copy",
        ]));
        args.push(path_arg(output));
        self.run(args, total)
    }

    fn probe_duration(&self, path: &Path) -> Result<Timestamp> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .with_context(|| format!("Failed to run ffprobe for {}", path.display()))?;

        if !output.status.success() {
            bail!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let duration_str = String::from_utf8_lossy(&output.stdout);
        let duration: Timestamp = duration_str
            .trim()
            .parse()
            .context("Failed to parse ffprobe duration")?;
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FfmpegRunner for RecordingRunner {
        fn run(&self, args: &[String], _options: FfmpegRunOptions) -> Result<()> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(())
        }
    }

    fn transcoder() -> FfmpegTranscoder<RecordingRunner> {
        FfmpegTranscoder::with_runner(RecordingRunner::default(), AudioSettings::default(), false)
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let idx = args.iter().position(|arg| arg == flag).unwrap();
        &args[idx + 1]
    }

    #[test]
    fn extract_seeks_before_input_and_never_overwrites() {
        let transcoder = transcoder();
        let id = SegmentId::new(Timestamp::from_centis(162), Timestamp::from_centis(78));
        transcoder
            .extract(Path::new("in.mp4"), &id, Path::new("out.part.mp3"))
            .unwrap();

        let calls = transcoder.runner.calls.lock().unwrap();
        let args = &calls[0];
        assert!(args.contains(&"-n".to_string()));
        assert_eq!(value_after(args, "-ss"), "1.62");
        assert_eq!(value_after(args, "-t"), "0.78");
        let ss = args.iter().position(|arg| arg == "-ss").unwrap();
        let input = args.iter().position(|arg| arg == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(args.last().unwrap(), "out.part.mp3");
    }

    #[test]
    fn mux_copies_video_stream() {
        let transcoder = transcoder();
        transcoder
            .mux(Path::new("v.mp4"), Path::new("a.mp3"), Path::new("o.mp4"))
            .unwrap();

        let calls = transcoder.runner.calls.lock().unwrap();
        let args = &calls[0];
        assert_eq!(value_after(args, "-c:v"), "copy");
        assert_eq!(value_after(args, "-c:a"), "copy");
        assert!(!args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn concat_reads_the_list_with_the_demuxer_and_copies_audio() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("concat.txt");
        let transcoder = transcoder();
        transcoder
            .concat(&[dir.path().join("a.mp3")], &list, Path::new("joined.mp3"))
            .unwrap();

        let calls = transcoder.runner.calls.lock().unwrap();
        let args = &calls[0];
        assert_eq!(value_after(args, "-f"), "concat");
        assert_eq!(value_after(args, "-safe"), "0");
        assert_eq!(value_after(args, "-i"), path_arg(&list));
        assert_eq!(value_after(args, "-c:a"), "copy");
        assert_eq!(args.last().unwrap(), "joined.mp3");
        assert!(list.exists());
    }

    #[test]
    fn concat_list_quotes_paths() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("concat.txt");
        let inputs = vec![dir.path().join("it's.mp3"), dir.path().join("b.mp3")];
        write_concat_list(&inputs, &list).unwrap();

        let contents = fs::read_to_string(&list).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("it'\\''s.mp3'"));
    }

    #[test]
    fn parses_progress_time() {
        let line = "size=  1024kB time=00:01:02.50 bitrate= 128.0kbits/s speed=10x";
        assert_eq!(parse_ffmpeg_progress(line), Some(62.5));
        assert_eq!(parse_ffmpeg_progress("no time here"), None);
    }
}
