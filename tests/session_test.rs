mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{classifier, fast_config, ready_session, show, two_gestures, SceneDevice, SceneExtractor, TestSession};
use handsign::{
    ConfigError, ExtractionError, GestureSession, IncrementalClassifier, Label, LabelSet, Mode, SessionError,
    SessionEvent, TrainingProgress,
};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event arrives in time")
        .expect("event channel open")
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

async fn wait_for_mode(session: &TestSession, wanted: &Mode) {
    for _ in 0..1000 {
        if &session.mode() == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("session never reached {}", wanted);
}

#[tokio::test]
async fn test_setup_reaches_ready() -> Result<(), Box<dyn std::error::Error>> {
    let (session, _device, _extractor) = ready_session(two_gestures(), fast_config(2)).await;

    assert_eq!(session.mode(), Mode::Ready);
    assert!(session.models_ready());
    assert!(session.current_frame().is_some());
    assert_eq!(session.example_count(), 0);

    let state = session.display_state();
    assert_eq!(state.mode, Mode::Ready);
    assert!(state.show_title);
    assert!(state.trained.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_camera_failure_keeps_setting_up() -> Result<(), Box<dyn std::error::Error>> {
    let labels = two_gestures();
    let session: TestSession = GestureSession::new(labels.clone(), fast_config(2))?;
    let loaded = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&loaded);
    let result = session
        .setup(
            Arc::new(common::DeniedDevice),
            move || {
                flag.store(true, Ordering::SeqCst);
                Ok(SceneExtractor::default())
            },
            classifier(&labels),
        )
        .await;
    assert!(matches!(result, Err(SessionError::CameraUnavailable(_))));
    assert_eq!(session.mode(), Mode::SettingUp);
    assert!(!session.models_ready());
    assert!(!loaded.load(Ordering::SeqCst));
    assert!(session.display_state().last_error.is_some());

    // Training stays unavailable until setup succeeds.
    let err = assert_err!(session.train("none").await);
    assert!(matches!(err, SessionError::InvalidMode { .. }));

    // Setup can be retried once a camera shows up.
    assert_ok!(
        session
            .setup(
                Arc::new(SceneDevice::new()),
                || Ok(SceneExtractor::default()),
                classifier(&labels),
            )
            .await
    );
    assert_eq!(session.mode(), Mode::Ready);
    Ok(())
}

#[tokio::test]
async fn test_extractor_load_failure_keeps_setting_up() {
    let labels = two_gestures();
    let session: TestSession =
        GestureSession::new(labels.clone(), fast_config(2)).expect("valid session config");
    let result = session
        .setup(
            Arc::new(SceneDevice::new()),
            || Err(ExtractionError::BuildError("missing model".into())),
            classifier(&labels),
        )
        .await;
    assert!(matches!(result, Err(SessionError::ExtractionFailure(_))));
    assert_eq!(session.mode(), Mode::SettingUp);
    assert!(!session.models_ready());
}

#[tokio::test]
async fn test_setup_runs_once() {
    let labels = two_gestures();
    let (session, _device, _extractor) = ready_session(labels.clone(), fast_config(2)).await;
    let result = session
        .setup(
            Arc::new(SceneDevice::new()),
            || Ok(SceneExtractor::default()),
            classifier(&labels),
        )
        .await;
    assert!(matches!(result, Err(SessionError::InvalidMode { .. })));
    assert_eq!(session.mode(), Mode::Ready);
}

#[tokio::test]
async fn test_setup_rejects_pretrained_classifier() -> Result<(), Box<dyn std::error::Error>> {
    let labels = two_gestures();
    let mut pretrained = classifier(&labels);
    pretrained.add_example(ndarray::array![1.0, 0.0, 0.0, 0.0], &Label::from("none"))?;

    let session: TestSession = GestureSession::new(labels, fast_config(2))?;
    let result = session
        .setup(Arc::new(SceneDevice::new()), || Ok(SceneExtractor::default()), pretrained)
        .await;
    assert!(matches!(result, Err(SessionError::Classifier(_))));
    assert_eq!(session.mode(), Mode::SettingUp);
    Ok(())
}

#[tokio::test]
async fn test_zero_samples_per_label_rejected() {
    let result: Result<TestSession, _> = GestureSession::new(two_gestures(), fast_config(0));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn test_setup_rejects_classifier_missing_a_gesture() -> Result<(), Box<dyn std::error::Error>> {
    let session: TestSession = GestureSession::new(two_gestures(), fast_config(2))?;
    let other = LabelSet::from_pairs([("none", ""), ("ok", "👌")])?;

    let result = session
        .setup(Arc::new(SceneDevice::new()), || Ok(SceneExtractor::default()), classifier(&other))
        .await;
    assert!(matches!(result, Err(SessionError::Classifier(_))));
    assert_eq!(session.mode(), Mode::SettingUp);
    assert!(!session.models_ready());

    // A matching classifier still gets through.
    assert_ok!(
        session
            .setup(
                Arc::new(SceneDevice::new()),
                || Ok(SceneExtractor::default()),
                classifier(&two_gestures()),
            )
            .await
    );
    assert_eq!(session.mode(), Mode::Ready);
    Ok(())
}

#[tokio::test]
async fn test_progress_reported_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let (session, device, _extractor) = ready_session(two_gestures(), fast_config(3)).await;
    show(&session, &device, 0);
    let mut events = session.events();

    let completion = session.train("none").await?;
    assert_eq!(completion.label, Label::from("none"));
    assert_eq!(completion.trained_count, 1);
    assert_eq!(completion.total, 2);
    assert!(!completion.entered_predicting);

    let none = Label::from("none");
    let progress = |completed| {
        SessionEvent::Progress(TrainingProgress {
            label: none.clone(),
            completed,
            total: 3,
        })
    };
    assert_eq!(
        drain(&mut events),
        vec![
            SessionEvent::ModeChanged(Mode::Training(none.clone())),
            progress(1),
            progress(2),
            progress(3),
            SessionEvent::LabelTrained {
                label: none.clone(),
                trained: 1,
                total: 2,
            },
            SessionEvent::ModeChanged(Mode::Ready),
        ]
    );

    let state = session.display_state();
    assert_eq!(state.trained, vec![none]);
    assert_eq!(state.progress.map(|p| p.percent()), Some(100));
    Ok(())
}

#[tokio::test]
async fn test_unknown_label_rejected() {
    let (session, _device, extractor) = ready_session(two_gestures(), fast_config(2)).await;
    let err = assert_err!(session.train("wave").await);
    assert_eq!(err, SessionError::UnknownLabel(Label::from("wave")));
    assert_eq!(session.mode(), Mode::Ready);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retraining_accumulates_examples() -> Result<(), Box<dyn std::error::Error>> {
    let (session, device, _extractor) = ready_session(two_gestures(), fast_config(3)).await;
    show(&session, &device, 0);

    session.train("none").await?;
    let again = session.train("none").await?;

    assert_eq!(again.trained_count, 1);
    assert_eq!(session.example_count(), 6);
    assert_eq!(session.trained_labels(), vec![Label::from("none")]);
    assert_eq!(session.mode(), Mode::Ready);
    Ok(())
}

#[tokio::test]
async fn test_training_failure_returns_to_ready() -> Result<(), Box<dyn std::error::Error>> {
    let (session, device, extractor) = ready_session(two_gestures(), fast_config(2)).await;
    show(&session, &device, 0);
    let mut events = session.events();

    extractor.fail.store(true, Ordering::SeqCst);
    let err = assert_err!(session.train("none").await);
    assert!(matches!(err, SessionError::ExtractionFailure(ExtractionError::ModelError(_))));
    assert_eq!(session.mode(), Mode::Ready);
    assert!(session.trained_labels().is_empty());
    assert_eq!(session.example_count(), 0);
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, SessionEvent::Error(SessionError::ExtractionFailure(_)))));

    extractor.fail.store(false, Ordering::SeqCst);
    session.train("none").await?;
    assert_eq!(session.trained_labels(), vec![Label::from("none")]);
    assert!(session.display_state().last_error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_training_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (session, device, _extractor) = ready_session(two_gestures(), fast_config(50)).await;
    show(&session, &device, 0);

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.train("none").await })
    };
    wait_for_mode(&session, &Mode::Training(Label::from("none"))).await;

    let err = assert_err!(session.train("thumbs_up").await);
    assert!(matches!(err, SessionError::InvalidMode { .. }));
    assert_eq!(session.mode(), Mode::Training(Label::from("none")));

    let completion = first.await??;
    assert_eq!(completion.label, Label::from("none"));
    assert_eq!(session.example_count(), 50);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_cancels_training() -> Result<(), Box<dyn std::error::Error>> {
    let config = fast_config(5).with_sample_interval(Duration::from_secs(60));
    let (session, device, _extractor) = ready_session(two_gestures(), config).await;
    show(&session, &device, 0);

    let training = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.train("none").await })
    };
    wait_for_mode(&session, &Mode::Training(Label::from("none"))).await;
    session.shutdown();

    let result = timeout(Duration::from_secs(5), training).await??;
    assert_eq!(result, Err(SessionError::Cancelled));
    assert_eq!(session.mode(), Mode::Ready);
    assert!(session.trained_labels().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_prediction_requires_every_gesture() -> Result<(), Box<dyn std::error::Error>> {
    let (session, device, _extractor) = ready_session(two_gestures(), fast_config(2)).await;
    assert!(matches!(session.run_prediction(), Err(SessionError::InvalidMode { .. })));

    show(&session, &device, 0);
    session.train("none").await?;
    assert!(matches!(session.run_prediction(), Err(SessionError::InvalidMode { .. })));
    assert_eq!(session.mode(), Mode::Ready);
    Ok(())
}

#[tokio::test]
async fn test_end_to_end_prediction() -> Result<(), Box<dyn std::error::Error>> {
    let (session, device, _extractor) = ready_session(two_gestures(), fast_config(2)).await;

    show(&session, &device, 0);
    assert!(!session.train("none").await?.entered_predicting);
    show(&session, &device, 1);
    let last = session.train("thumbs_up").await?;
    assert!(last.entered_predicting);
    assert_eq!(session.mode(), Mode::Predicting);
    assert!(!session.display_state().show_title);

    // Predicting is terminal.
    let err = assert_err!(session.train("none").await);
    assert!(matches!(err, SessionError::InvalidMode { .. }));

    let mut events = session.events();
    let handle = session.run_prediction()?;

    let mut shown: Option<u64> = None;
    let mut seen_thumbs_up = false;
    let mut seen_none = false;
    for _ in 0..200 {
        match next_event(&mut events).await {
            SessionEvent::Prediction {
                label,
                icon,
                generation,
                confidence,
            } => {
                assert!(shown.is_none(), "icon shown before the previous one was hidden");
                assert!(confidence > 0.0);
                assert_eq!(icon, two_gestures().icon(&label));
                shown = Some(generation);
                if label == Label::from("thumbs_up") && !seen_thumbs_up {
                    seen_thumbs_up = true;
                    show(&session, &device, 0);
                } else if label == Label::from("none") && seen_thumbs_up {
                    assert_eq!(icon, "");
                    seen_none = true;
                }
            }
            SessionEvent::IconHidden { generation } => {
                assert_eq!(shown, Some(generation));
                shown = None;
                if seen_none {
                    break;
                }
            }
            SessionEvent::Error(e) => panic!("prediction failed: {}", e),
            _ => {}
        }
    }
    assert!(seen_thumbs_up && seen_none);

    handle.stop().await;
    assert!(!session.display_state().icon.visible);
    assert_eq!(session.mode(), Mode::Predicting);
    Ok(())
}

#[tokio::test]
async fn test_single_prediction_loop() -> Result<(), Box<dyn std::error::Error>> {
    let labels = LabelSet::from_pairs([("none", "")])?;
    let (session, device, _extractor) = ready_session(labels, fast_config(1)).await;
    show(&session, &device, 0);
    session.train("none").await?;

    let handle = session.run_prediction()?;
    assert_eq!(session.run_prediction().err(), Some(SessionError::PredictionAlreadyRunning));
    handle.stop().await;

    let restarted = session.run_prediction()?;
    assert!(!restarted.is_finished());
    restarted.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_stops_prediction() -> Result<(), Box<dyn std::error::Error>> {
    let labels = LabelSet::from_pairs([("none", "")])?;
    let (session, device, _extractor) = ready_session(labels, fast_config(1)).await;
    show(&session, &device, 0);
    session.train("none").await?;

    let handle = session.run_prediction()?;
    session.shutdown();
    for _ in 0..1000 {
        if handle.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(handle.is_finished());
    Ok(())
}
