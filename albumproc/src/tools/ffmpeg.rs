//! ffmpeg-backed transcoder (lossless → MP3 CBR)

use super::process::run_with_timeout;
use super::{ToolError, Transcoder};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transcoder invoking the system `ffmpeg` binary
pub struct FfmpegTranscoder {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    /// Argument list for one transcode
    ///
    /// Only the first audio stream is encoded; artwork is carried over by the
    /// tag transfer step instead of as a video stream. That step also rewrites
    /// the whole ID3v2 tag, so no tag version is requested here.
    pub fn build_args(input: &Path, output: &Path, bitrate_kbps: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-y",
            "-i",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(input.as_os_str().to_owned());
        for arg in [
            "-map",
            "0:a:0",
            "-c:a",
            "libmp3lame",
            "-b:a",
        ] {
            args.push(OsString::from(arg));
        }
        args.push(OsString::from(format!("{}k", bitrate_kbps)));
        for arg in ["-map_metadata", "0", "-f", "mp3"] {
            args.push(OsString::from(arg));
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path, bitrate_kbps: u32) -> Result<(), ToolError> {
        let args = Self::build_args(input, output, bitrate_kbps);
        run_with_timeout(&self.binary, &args, self.timeout)?;

        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(ToolError::Output(format!(
                "ffmpeg produced no output for {}",
                input.display()
            )));
        }
        Ok(())
    }
}
