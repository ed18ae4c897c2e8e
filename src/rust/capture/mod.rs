//! Video capture: frames, devices and the live capture session.

mod directory;
mod session;

use std::io;

use thiserror::Error;

pub use directory::DirectoryDevice;
pub use session::CaptureSession;

/// One decoded video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: u64,
    /// Capture timestamp in seconds since the stream was opened.
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixels, row-major, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

impl Frame {
    /// Returns true when the pixel buffer matches the stated dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgb.len() == self.width as usize * self.height as usize * 3
    }
}

/// What the caller asks a device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub video: bool,
    pub audio: bool,
}

impl StreamRequest {
    pub fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self::video_only()
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The environment denied or could not provide a stream.
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
    #[error("Frame read failed: {0}")]
    Read(String),
    #[error("Capture was cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
}

/// A source of video streams: a webcam, a replayed folder, a test pattern.
pub trait CaptureDevice: Send + Sync + 'static {
    /// Opens a stream. May block while the environment asks for permission.
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, CaptureError>;
}

/// An open video stream.
pub trait VideoStream: Send + 'static {
    /// Blocks until the next frame is available. `Ok(None)` marks the end of
    /// the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shape_check() {
        let frame = Frame {
            id: 0,
            timestamp: 0.0,
            width: 2,
            height: 2,
            rgb: vec![0; 12],
        };
        assert!(frame.is_well_formed());
        let truncated = Frame {
            rgb: vec![0; 11],
            ..frame
        };
        assert!(!truncated.is_well_formed());
    }

    #[test]
    fn test_default_request_is_video_only() {
        let request = StreamRequest::default();
        assert!(request.video);
        assert!(!request.audio);
    }
}
