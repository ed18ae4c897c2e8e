use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};
use tokio::sync::watch;

use super::{CaptureDevice, CaptureError, Frame, StreamRequest, VideoStream};
use crate::CancelToken;

type FrameSlot = Option<Arc<Frame>>;

/// A live camera stream feeding a single-slot frame buffer.
///
/// A background thread keeps overwriting the slot with the newest frame.
/// Readers always get the most recent frame available, which may already be
/// stale by the time they use it.
#[derive(Debug)]
pub struct CaptureSession {
    frames: watch::Receiver<FrameSlot>,
    live: Arc<AtomicBool>,
    stop: CancelToken,
}

impl CaptureSession {
    /// Opens a video-only stream on `device` and resolves once the first
    /// frame can be read.
    ///
    /// # Errors
    /// - `Unavailable` if the device refuses the stream or it ends before
    ///   delivering a frame
    /// - `Cancelled` if `cancel` fires while waiting
    pub async fn acquire(
        device: Arc<dyn CaptureDevice>,
        cancel: CancelToken,
    ) -> Result<Self, CaptureError> {
        let request = StreamRequest::video_only();
        info!("Requesting video stream");

        let open = tokio::task::spawn_blocking(move || device.open(&request));
        let stream = tokio::select! {
            opened = open => opened
                .map_err(|e| CaptureError::Unavailable(format!("Device task failed: {}", e)))??,
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled),
        };

        let (tx, mut rx) = watch::channel::<FrameSlot>(None);
        let live = Arc::new(AtomicBool::new(true));
        let stop = CancelToken::new();
        spawn_pump(stream, tx, Arc::clone(&live), stop.clone())?;

        let got_frame = tokio::select! {
            got_frame = first_frame(&mut rx) => got_frame,
            _ = cancel.cancelled() => {
                stop.cancel();
                return Err(CaptureError::Cancelled);
            }
        };
        if !got_frame {
            return Err(CaptureError::Unavailable(
                "Stream ended before the first frame".into(),
            ));
        }

        info!("Video stream is live");
        Ok(Self {
            frames: rx,
            live,
            stop,
        })
    }

    /// The most recent frame.
    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.frames.borrow().clone()
    }

    /// A receiver that is notified on every new frame.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.frames.clone()
    }

    /// Whether the device is still delivering frames.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Stops the background reader. The last frame stays readable.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// False when the pump exits before publishing anything.
async fn first_frame(rx: &mut watch::Receiver<FrameSlot>) -> bool {
    rx.wait_for(|slot| slot.is_some()).await.is_ok()
}

fn spawn_pump(
    mut stream: Box<dyn VideoStream>,
    tx: watch::Sender<FrameSlot>,
    live: Arc<AtomicBool>,
    stop: CancelToken,
) -> Result<(), CaptureError> {
    thread::Builder::new()
        .name("handsign-capture".into())
        .spawn(move || {
            while !stop.is_cancelled() {
                match stream.next_frame() {
                    Ok(Some(frame)) => {
                        let id = frame.id;
                        if tx.send(Some(Arc::new(frame))).is_err() {
                            debug!("No frame readers left, closing stream");
                            break;
                        }
                        debug!("Captured frame {}", id);
                    }
                    Ok(None) => {
                        info!("Video stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!("Video stream failed: {}", e);
                        break;
                    }
                }
            }
            live.store(false, Ordering::Release);
        })?;
    Ok(())
}
