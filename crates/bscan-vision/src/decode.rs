//! Frame pipeline: encoded video bytes to a bounded grayscale frame stream.
//!
//! FFmpeg does the container/codec work and hands us 8-bit grayscale rawvideo
//! on stdout. The output geometry is computed host-side before spawning so
//! the pipe can be sliced into exact frame-sized chunks, and the frame budget
//! is enforced both with `-frames:v` and on the read side.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use image::imageops::{self, FilterType};
use image::GrayImage;
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use crate::config::BlinkConfig;
use crate::error::{VisionError, VisionResult};
use crate::probe::probe_video;

/// Compute the decoded frame geometry for a source video.
///
/// Frames wider than `max_width` are scaled down to `max_width`, preserving
/// aspect ratio; narrower frames pass through untouched.
pub fn output_geometry(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// Produce the half-resolution copy used for face localization.
///
/// Detection runs on this copy; detected boxes are scaled back 2x so
/// landmark extraction keeps full-resolution precision.
pub fn detection_copy(frame: &GrayImage) -> GrayImage {
    let w = (frame.width() / 2).max(1);
    let h = (frame.height() / 2).max(1);
    imageops::resize(frame, w, h, FilterType::Triangle)
}

/// Stage encoded video bytes into a temp file FFmpeg can open.
pub fn stage_input(video: &[u8]) -> VisionResult<NamedTempFile> {
    let mut staged = NamedTempFile::new()?;
    staged.write_all(video)?;
    staged.flush()?;
    Ok(staged)
}

/// A budget-capped stream of grayscale frames from one video.
pub struct FrameStream {
    child: Child,
    stdout: ChildStdout,
    /// Decoded frame width after the max-width cap
    width: u32,
    /// Decoded frame height after the max-width cap
    height: u32,
    frames_read: u64,
    max_frames: u64,
}

impl FrameStream {
    /// Decoded frame dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frames handed out so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, or `None` once the stream ends or the budget
    /// is exhausted.
    pub async fn next_frame(&mut self) -> VisionResult<Option<GrayImage>> {
        if self.frames_read >= self.max_frames {
            debug!(frames = self.frames_read, "Frame budget reached, stopping");
            let _ = self.child.start_kill();
            return Ok(None);
        }

        let frame_bytes = self.width as usize * self.height as usize;
        let mut buf = vec![0u8; frame_bytes];

        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of stream; a trailing partial frame is discarded.
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let frame = GrayImage::from_raw(self.width, self.height, buf).ok_or_else(|| {
            VisionError::invalid_video(format!(
                "rawvideo chunk does not fit {}x{} frame",
                self.width, self.height
            ))
        })?;

        self.frames_read += 1;
        Ok(Some(frame))
    }
}

/// Open a bounded grayscale frame stream for a video file.
///
/// Probes the container first; the scale filter and the raw pipe geometry
/// are derived from the probe so both sides agree on frame size.
pub async fn open_frames(path: impl AsRef<Path>, config: &BlinkConfig) -> VisionResult<FrameStream> {
    let path = path.as_ref();

    which::which("ffmpeg").map_err(|_| VisionError::FfmpegNotFound)?;

    let probe = probe_video(path).await?;
    let (width, height) = output_geometry(probe.width, probe.height, config.max_frame_width);

    debug!(
        src_width = probe.width,
        src_height = probe.height,
        width,
        height,
        fps = probe.fps,
        max_frames = config.max_frames,
        "Opening frame stream"
    );

    let filter = format!("scale={}:{},format=gray", width, height);
    let path_arg = path.to_string_lossy().to_string();
    let frames_arg = config.max_frames.to_string();

    let mut child = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-i",
            path_arg.as_str(),
            "-frames:v",
            frames_arg.as_str(),
            "-vf",
            filter.as_str(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "gray",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take().ok_or_else(|| {
        warn!("FFmpeg spawned without a stdout pipe");
        VisionError::ffmpeg_failed("stdout not captured", None, None)
    })?;

    Ok(FrameStream {
        child,
        stdout,
        width,
        height,
        frames_read: 0,
        max_frames: config.max_frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_geometry_caps_wide_frames() {
        assert_eq!(output_geometry(1920, 1080, 640), (640, 360));
        assert_eq!(output_geometry(1280, 720, 640), (640, 360));
    }

    #[test]
    fn test_output_geometry_passes_narrow_frames() {
        assert_eq!(output_geometry(640, 480, 640), (640, 480));
        assert_eq!(output_geometry(320, 240, 640), (320, 240));
    }

    #[test]
    fn test_output_geometry_never_zero_height() {
        assert_eq!(output_geometry(10_000, 1, 640), (640, 1));
    }

    #[test]
    fn test_detection_copy_halves_dimensions() {
        let frame = GrayImage::from_pixel(640, 360, image::Luma([128u8]));
        let small = detection_copy(&frame);
        assert_eq!(small.dimensions(), (320, 180));
    }

    #[test]
    fn test_stage_input_writes_bytes() {
        let staged = stage_input(b"not a real video").unwrap();
        let on_disk = std::fs::read(staged.path()).unwrap();
        assert_eq!(on_disk, b"not a real video");
    }
}
