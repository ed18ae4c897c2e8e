use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use handsign::{
    AppConfig, BuiltinModel, DirectoryDevice, DisplayState, GestureSession, KnnClassifier, Mode,
    ModelManager, OnnxFeatureExtractor, PredictionHandle,
};
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

type Session = GestureSession<OnnxFeatureExtractor, KnnClassifier>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to handsign.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force a fresh download of the model files
    #[arg(short, long)]
    fresh: bool,

    /// Folder of images to replay as the camera feed
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Samples collected per training run
    #[arg(long)]
    samples: Option<usize>,
}

async fn ensure_model_downloaded(fresh: bool) -> anyhow::Result<()> {
    let manager = ModelManager::new_default()?;
    let model = BuiltinModel::MobileNetV2;

    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(model)?;
    }
    manager.ensure_model_downloaded(model).await?;
    Ok(())
}

fn render(state: &DisplayState) {
    if state.show_title {
        match &state.mode {
            Mode::SettingUp => println!("We are setting up camera"),
            Mode::Ready => {
                println!("You can train the data");
                let trained: Vec<&str> = state.trained.iter().map(|l| l.as_str()).collect();
                println!("Trained: [{}]", trained.join(", "));
            }
            Mode::Training(label) => {
                let percent = state.progress.as_ref().map(|p| p.percent()).unwrap_or(0);
                println!("Training {}: {}%", label, percent);
            }
            Mode::Predicting => {}
        }
    } else if state.icon.visible {
        let label = state.icon.label.as_ref().map(|l| l.as_str()).unwrap_or("");
        println!("{} {} ({:.0}%)", state.icon.icon, label, state.icon.confidence * 100.0);
    }
    if let Some(err) = &state.last_error {
        println!("Error: {}", err);
    }
}

fn spawn_renderer(session: &Session) {
    let mut states = session.subscribe();
    tokio::spawn(async move {
        let mut last_mode = None;
        loop {
            let state = states.borrow_and_update().clone();
            if state.mode == Mode::Predicting && last_mode.as_ref() != Some(&Mode::Predicting) {
                println!("Start Prediction");
            }
            last_mode = Some(state.mode.clone());
            render(&state);
            if states.changed().await.is_err() {
                break;
            }
        }
    });
}

fn print_status(session: &Session) {
    let trained: Vec<String> = session.trained_labels().iter().map(|l| l.to_string()).collect();
    println!("Mode: {}", session.mode());
    println!("Trained {}/{}: [{}]", trained.len(), session.labels().len(), trained.join(", "));
    println!("Examples: {}", session.example_count());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = AppConfig::load_or_default(args.config.as_deref()).context("Failed to load config")?;
    let labels = config.label_set()?;
    let mut session_config = config.session_config();
    if let Some(samples) = args.samples {
        session_config = session_config.with_samples_per_label(samples);
    }
    let frames_dir = args.frames.unwrap_or_else(|| config.capture.frames_dir.clone());

    info!("=== Starting Hand Sign Demo ===");
    ensure_model_downloaded(args.fresh).await?;

    let session: Arc<Session> = Arc::new(GestureSession::new(labels.clone(), session_config)?);
    spawn_renderer(&session);

    let classifier = KnnClassifier::builder()
        .with_k(config.classifier.k)
        .with_labels(labels)
        .build()?;
    let runtime = config.runtime_config();
    let device = Arc::new(DirectoryDevice::new(&frames_dir).with_fps(config.capture.fps));
    session
        .setup(
            device,
            move || OnnxFeatureExtractor::with_model(BuiltinModel::MobileNetV2, &runtime),
            classifier,
        )
        .await
        .with_context(|| format!("Setup failed using frames from {:?}", frames_dir))?;

    println!("Commands: train <label> | start | status | quit");
    let mut prediction: Option<PredictionHandle> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("train"), Some(label)) => {
                let session = Arc::clone(&session);
                let label = label.to_string();
                tokio::spawn(async move {
                    if let Err(e) = session.train(label.as_str()).await {
                        error!("Training '{}' failed: {}", label, e);
                    }
                });
            }
            (Some("start"), None) => match session.run_prediction() {
                Ok(handle) => prediction = Some(handle),
                Err(e) => println!("Cannot start prediction: {}", e),
            },
            (Some("status"), None) => print_status(&session),
            (Some("quit"), None) => break,
            (None, _) => {}
            _ => println!("Unknown command: {}", line.trim()),
        }
    }

    if let Some(handle) = prediction {
        handle.stop().await;
    }
    session.shutdown();
    info!("=== Hand Sign Demo Finished ===");
    Ok(())
}
