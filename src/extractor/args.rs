//! Construction of extractor command lines.

use std::path::{Path, PathBuf};

use crate::jobs::{JobOptions, Mode, SubtitleLanguage};

/// Suffix for quarantine artifacts, inserted between the job id and the
/// extension chosen by the extractor.
pub const TEMP_SUFFIX: &str = ".temp";

/// Name of the optional credentials file looked up in the working directory.
pub const COOKIES_FILE: &str = "cookies.txt";

/// Map a quality tag to the extractor's format selector.
pub fn quality_selector(quality: Option<&str>) -> String {
    let height = match quality {
        Some("2160p") => Some(2160),
        Some("1440p") => Some(1440),
        Some("1080p") => Some(1080),
        Some("720p") => Some(720),
        Some("480p") => Some(480),
        Some("360p") => Some(360),
        _ => None,
    };
    match height {
        Some(h) => format!(
            "bestvideo[height<={}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]",
            h
        ),
        None => "best[ext=mp4]".to_string(),
    }
}

/// The `-o` output template confining the extractor to quarantine names.
pub fn temp_output_template(output_dir: &Path, job_id: &str) -> String {
    output_dir
        .join(format!("{}{}.%(ext)s", job_id, TEMP_SUFFIX))
        .display()
        .to_string()
}

/// Look for a credentials file in the process working directory.
pub fn cookies_file() -> Option<PathBuf> {
    let path = PathBuf::from(COOKIES_FILE);
    path.exists().then_some(path)
}

/// Build the full argument vector for a download run.
pub fn build_download_args(options: &JobOptions, output_dir: &Path) -> Vec<String> {
    let mut args = Vec::new();

    match options.mode {
        Mode::Video => {
            args.push("-f".to_string());
            args.push(quality_selector(options.quality.as_deref()));
            args.push("--remux-video=mp4".to_string());
        }
        Mode::Audio => {
            let format = options
                .audio_format
                .map(|f| f.as_str())
                .unwrap_or("mp3");
            args.push("-x".to_string());
            args.push(format!("--audio-format={}", format));
            args.push("--audio-quality=0".to_string());
        }
    }

    args.push("-o".to_string());
    args.push(temp_output_template(output_dir, &options.job_id));
    args.push("--no-warnings".to_string());
    args.push("--newline".to_string());

    if options.mode == Mode::Video && options.subtitles.download {
        args.push("--embed-subs".to_string());
        if options.subtitles.language == SubtitleLanguage::En {
            args.push("--sub-langs".to_string());
            args.push("en.*".to_string());
        }
    }

    if let Some(cookies) = cookies_file() {
        args.push("--cookies".to_string());
        args.push(cookies.display().to_string());
    }

    args.push(options.url.clone());
    args
}

/// Arguments for the pre-flight size probe (`--skip-download -j`).
pub fn build_size_probe_args(
    url: &str,
    mode: Mode,
    quality: Option<&str>,
    playlist_items: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "--skip-download".to_string(),
        "-j".to_string(),
        "--ignore-errors".to_string(),
        "--no-warnings".to_string(),
    ];

    // Audio downloads carry no explicit selector; the probe matches.
    if mode == Mode::Video {
        args.push("-f".to_string());
        args.push(quality_selector(quality));
    }

    if let Some(items) = playlist_items {
        args.push("--playlist-items".to_string());
        args.push(items.to_string());
    }

    args.push(url.to_string());
    args
}

/// Arguments for a single-item metadata fetch.
pub fn build_metadata_args(url: &str) -> Vec<String> {
    vec![
        "-j".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{AudioFormat, SubtitleOptions};

    fn base_options(mode: Mode) -> JobOptions {
        JobOptions {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            video_id: "abc".to_string(),
            job_id: "job-1".to_string(),
            output_folder: PathBuf::from("/downloads"),
            mode,
            quality: None,
            audio_format: None,
            estimated_bytes: 0,
            resolved_filename: None,
            subtitles: SubtitleOptions::default(),
            per_channel_folder: false,
            channel: None,
        }
    }

    #[test]
    fn quality_selectors() {
        assert_eq!(
            quality_selector(Some("1080p")),
            "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]"
        );
        assert_eq!(
            quality_selector(Some("480p")),
            "bestvideo[height<=480][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]"
        );
        assert_eq!(quality_selector(Some("highest")), "best[ext=mp4]");
        assert_eq!(quality_selector(None), "best[ext=mp4]");
    }

    #[test]
    fn video_args_order() {
        let mut options = base_options(Mode::Video);
        options.quality = Some("1080p".to_string());

        let args = build_download_args(&options, Path::new("/downloads"));
        assert_eq!(args[0], "-f");
        assert_eq!(
            args[1],
            "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]"
        );
        assert_eq!(args[2], "--remux-video=mp4");
        assert_eq!(args[3], "-o");
        assert_eq!(args[4], "/downloads/job-1.temp.%(ext)s");
        assert_eq!(args[5], "--no-warnings");
        assert_eq!(args[6], "--newline");
        assert_eq!(args.last().unwrap(), &options.url);
    }

    #[test]
    fn audio_args_include_extraction_flags() {
        let mut options = base_options(Mode::Audio);
        options.audio_format = Some(AudioFormat::Opus);

        let args = build_download_args(&options, Path::new("/downloads"));
        assert_eq!(args[0], "-x");
        assert_eq!(args[1], "--audio-format=opus");
        assert_eq!(args[2], "--audio-quality=0");
        assert!(!args.contains(&"--remux-video=mp4".to_string()));
    }

    #[test]
    fn subtitle_flags_only_in_video_mode() {
        let mut options = base_options(Mode::Video);
        options.subtitles = SubtitleOptions {
            download: true,
            language: SubtitleLanguage::En,
        };
        let args = build_download_args(&options, Path::new("/downloads"));
        let embed = args.iter().position(|a| a == "--embed-subs").unwrap();
        assert_eq!(args[embed + 1], "--sub-langs");
        assert_eq!(args[embed + 2], "en.*");

        let mut audio = base_options(Mode::Audio);
        audio.subtitles = options.subtitles;
        let args = build_download_args(&audio, Path::new("/downloads"));
        assert!(!args.contains(&"--embed-subs".to_string()));
    }

    #[test]
    fn size_probe_has_selector_only_for_video() {
        let args = build_size_probe_args("https://x", Mode::Video, Some("720p"), None);
        assert!(args.contains(&"--skip-download".to_string()));
        assert!(args.contains(&"-f".to_string()));

        let args = build_size_probe_args("https://x", Mode::Audio, None, Some("1,3-5"));
        assert!(!args.contains(&"-f".to_string()));
        let idx = args.iter().position(|a| a == "--playlist-items").unwrap();
        assert_eq!(args[idx + 1], "1,3-5");
    }
}
