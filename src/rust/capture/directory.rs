use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::info;

use super::{CaptureDevice, CaptureError, Frame, StreamRequest, VideoStream};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Replays a folder of still images as a looping video-only stream.
///
/// Files are played in name order. The folder is listed again on every
/// `open`, so frames dropped in between sessions are picked up.
#[derive(Debug, Clone)]
pub struct DirectoryDevice {
    dir: PathBuf,
    fps: f32,
}

impl DirectoryDevice {
    pub const DEFAULT_FPS: f32 = 15.0;

    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            fps: Self::DEFAULT_FPS,
        }
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    fn list_frames(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            CaptureError::Unavailable(format!("Cannot open {:?}: {}", self.dir, e))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl CaptureDevice for DirectoryDevice {
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, CaptureError> {
        if request.audio {
            return Err(CaptureError::Unavailable("Audio capture is not supported".into()));
        }
        if !request.video {
            return Err(CaptureError::Unavailable("Stream request has no video track".into()));
        }
        if !(self.fps > 0.0) {
            return Err(CaptureError::Unavailable(format!("Invalid frame rate {}", self.fps)));
        }
        let paths = self.list_frames()?;
        if paths.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "No image frames found in {:?}",
                self.dir
            )));
        }
        info!("Replaying {} frames from {:?} at {} fps", paths.len(), self.dir, self.fps);
        Ok(Box::new(DirectoryStream {
            paths,
            cursor: 0,
            next_id: 0,
            interval: Duration::from_secs_f32(1.0 / self.fps),
            opened_at: Instant::now(),
        }))
    }
}

struct DirectoryStream {
    paths: Vec<PathBuf>,
    cursor: usize,
    next_id: u64,
    interval: Duration,
    opened_at: Instant,
}

impl VideoStream for DirectoryStream {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.next_id > 0 {
            thread::sleep(self.interval);
        }
        let path = &self.paths[self.cursor];
        self.cursor = (self.cursor + 1) % self.paths.len();

        let image = image::open(path)?.to_rgb8();
        let frame = Frame {
            id: self.next_id,
            timestamp: self.opened_at.elapsed().as_secs_f64(),
            width: image.width(),
            height: image.height(),
            rgb: image.into_raw(),
        };
        self.next_id += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_missing_directory_is_unavailable() {
        let device = DirectoryDevice::new("/nonexistent/handsign-frames");
        let result = device.open(&StreamRequest::video_only());
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
    }

    #[test]
    fn test_empty_directory_is_unavailable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("notes.txt"), "not a frame")?;
        let result = DirectoryDevice::new(dir.path()).open(&StreamRequest::video_only());
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
        Ok(())
    }

    #[test]
    fn test_audio_request_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let request = StreamRequest {
            video: true,
            audio: true,
        };
        let result = DirectoryDevice::new(dir.path()).open(&request);
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
        Ok(())
    }

    #[test]
    fn test_replays_in_name_order_and_loops() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        RgbImage::from_pixel(2, 2, Rgb([10, 10, 10])).save(dir.path().join("b.png"))?;
        RgbImage::from_pixel(2, 2, Rgb([200, 200, 200])).save(dir.path().join("a.png"))?;

        let mut stream = DirectoryDevice::new(dir.path())
            .with_fps(1000.0)
            .open(&StreamRequest::video_only())?;
        let first = stream.next_frame()?.expect("frame");
        let second = stream.next_frame()?.expect("frame");
        let third = stream.next_frame()?.expect("frame");

        assert!(first.is_well_formed());
        assert_eq!(first.rgb[0], 200);
        assert_eq!(second.rgb[0], 10);
        assert_eq!(third.rgb[0], 200);
        assert_eq!(third.id, 2);
        Ok(())
    }
}
