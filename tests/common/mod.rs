#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use handsign::{
    CaptureDevice, CaptureError, Embedding, ExtractionError, FeatureExtractor, Frame, GestureSession,
    KnnClassifier, LabelSet, SessionConfig, StreamRequest, VideoStream,
};

pub const SCENES: usize = 4;

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// A camera whose every pixel shows the current scene number.
#[derive(Clone, Default)]
pub struct SceneDevice {
    pub scene: Arc<AtomicU8>,
}

impl SceneDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, scene: u8) {
        self.scene.store(scene, Ordering::SeqCst);
    }
}

struct SceneStream {
    scene: Arc<AtomicU8>,
    next_id: u64,
}

impl CaptureDevice for SceneDevice {
    fn open(&self, _request: &StreamRequest) -> Result<Box<dyn VideoStream>, CaptureError> {
        Ok(Box::new(SceneStream {
            scene: Arc::clone(&self.scene),
            next_id: 0,
        }))
    }
}

impl VideoStream for SceneStream {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.next_id > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        let scene = self.scene.load(Ordering::SeqCst);
        self.next_id += 1;
        Ok(Some(Frame {
            id: self.next_id,
            timestamp: self.next_id as f64 / 1000.0,
            width: 2,
            height: 2,
            rgb: vec![scene; 12],
        }))
    }
}

/// A camera the environment refuses to hand out.
pub struct DeniedDevice;

impl CaptureDevice for DeniedDevice {
    fn open(&self, _request: &StreamRequest) -> Result<Box<dyn VideoStream>, CaptureError> {
        Err(CaptureError::Unavailable("permission denied".into()))
    }
}

/// Maps a scene frame to the one-hot embedding of its scene number.
#[derive(Clone, Default)]
pub struct SceneExtractor {
    pub calls: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

impl FeatureExtractor for SceneExtractor {
    fn extract(&self, frame: &Frame) -> Result<Embedding, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExtractionError::ModelError("inference failed".into()));
        }
        let scene = frame.rgb.first().copied().unwrap_or(0) as usize % SCENES;
        let mut embedding = Embedding::zeros(SCENES);
        embedding[scene] = 1.0;
        Ok(embedding)
    }

    fn embedding_size(&self) -> Option<usize> {
        Some(SCENES)
    }
}

pub type TestSession = GestureSession<SceneExtractor, KnnClassifier>;

pub fn two_gestures() -> LabelSet {
    LabelSet::from_pairs([("none", ""), ("thumbs_up", "👍")]).expect("valid labels")
}

pub fn fast_config(samples: usize) -> SessionConfig {
    SessionConfig::default()
        .with_samples_per_label(samples)
        .with_sample_interval(Duration::from_millis(2))
        .with_prediction_interval(Duration::from_millis(20))
}

pub fn classifier(labels: &LabelSet) -> KnnClassifier {
    KnnClassifier::builder()
        .with_labels(labels.clone())
        .with_k(1)
        .build()
        .expect("valid classifier")
}

/// A session that has finished setup against a `SceneDevice`.
pub async fn ready_session(
    labels: LabelSet,
    config: SessionConfig,
) -> (Arc<TestSession>, SceneDevice, SceneExtractor) {
    init_logging();
    let session = Arc::new(GestureSession::new(labels.clone(), config).expect("valid session config"));
    let device = SceneDevice::new();
    let extractor = SceneExtractor::default();
    let loaded = extractor.clone();
    session
        .setup(Arc::new(device.clone()), move || Ok(loaded), classifier(&labels))
        .await
        .expect("setup succeeds");
    (session, device, extractor)
}

/// Switches the scene and waits until the session sees it.
pub fn show(session: &TestSession, device: &SceneDevice, scene: u8) {
    device.set(scene);
    for _ in 0..1000 {
        let current = session.current_frame().and_then(|f| f.rgb.first().copied());
        if current == Some(scene) {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("scene {} never reached the session", scene);
}
