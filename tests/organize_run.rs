// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use async_trait::async_trait;
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::tempdir;

use imgsort::allocator::LabelTransform;
use imgsort::classifiers::{Classifier, ClassifierRegistry, DecodedImage, ImageDecoder};
use imgsort::error::{ClassificationError, DecodeError};
use imgsort::error_log::{FileErrorLog, NullErrorLog};
use imgsort::organizer::{OrganizerState, RunStatistics};
use imgsort::reporter::{RunReporter, SilentReporter};
use imgsort::{CancellationToken, ImgsortError, Organizer, RunConfig, RunOutcome};

/// Decodes anything except files whose content is `corrupt`
struct StubDecoder;

impl ImageDecoder for StubDecoder {
    fn open(&self, path: &Path) -> Result<DecodedImage, DecodeError> {
        let bytes = fs::read(path).map_err(|e| DecodeError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if bytes == b"corrupt" {
            return Err(DecodeError {
                path: path.to_path_buf(),
                reason: "not an image".to_string(),
            });
        }
        Ok(DecodedImage::new(path, DynamicImage::new_rgb8(4, 4)))
    }
}

/// Always answers the same label, or always fails
struct Always {
    id: &'static str,
    label: Option<&'static str>,
}

#[async_trait]
impl Classifier for Always {
    fn id(&self) -> &str {
        self.id
    }

    async fn classify(&self, _image: &DecodedImage) -> Result<String, ClassificationError> {
        // Give other futures on the task a chance to run
        tokio::task::yield_now().await;
        self.label
            .map(String::from)
            .ok_or_else(|| ClassificationError::new(self.id, "offline"))
    }
}

/// Labels `Cat` when the file name mentions a cat, `Dog` otherwise
struct ByName;

#[async_trait]
impl Classifier for ByName {
    fn id(&self) -> &str {
        "by-name"
    }

    async fn classify(&self, image: &DecodedImage) -> Result<String, ClassificationError> {
        Ok(if image.file_name().contains("cat") { "Cat" } else { "Dog" }.to_string())
    }
}

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<(usize, usize)>>,
    previews: Mutex<Vec<(String, f64)>>,
    completed: AtomicBool,
    cancelled: AtomicBool,
    no_images: AtomicBool,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RunReporter for Recorder {
    fn on_progress(&self, done: usize, total: usize) {
        self.progress.lock().unwrap().push((done, total));
        if let Some((after, token)) = &self.cancel_after {
            if done == *after {
                token.cancel();
            }
        }
    }

    fn on_preview(&self, _image: &DecodedImage, label: &str, confidence: f64) {
        self.previews.lock().unwrap().push((label.to_string(), confidence));
    }

    fn on_run_complete(&self, _stats: &RunStatistics, _destination_root: &Path) {
        self.completed.store(true, Ordering::SeqCst);
    }

    fn on_run_cancelled(&self, _stats: &RunStatistics) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn on_no_images_found(&self) {
        self.no_images.store(true, Ordering::SeqCst);
    }
}

fn organizer(labels: &[Option<&'static str>]) -> Organizer {
    let mut registry = ClassifierRegistry::new();
    for (i, label) in labels.iter().enumerate() {
        let id: &'static str = ["c1", "c2", "c3", "c4"][i];
        registry.register(Box::new(Always { id, label: *label }));
    }
    Organizer::new(registry, Box::new(StubDecoder), Box::new(NullErrorLog))
}

fn run_config(source: &Path, dest: &Path) -> RunConfig {
    RunConfig {
        source_folder: source.to_path_buf(),
        destination_root: dest.to_path_buf(),
        extensions: ["jpg", "jpeg", "png", "gif", "bmp"].into_iter().map(String::from).collect(),
        label_transform: LabelTransform::TitleCase,
    }
}

fn write_images(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"pixels").unwrap();
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_three_dogs_end_to_end() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["a.jpg", "b.jpg", "c.jpg"]);

    let organizer = organizer(&[Some("Dog")]);
    let recorder = Recorder::default();
    let outcome = organizer.run(&run_config(&source, &dest), &recorder).await.unwrap();

    let stats = outcome.stats();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.categories.len(), 1);
    assert_eq!(stats.categories["Dog"], 3);
    assert!(matches!(outcome, RunOutcome::Completed { ref destination_root, .. } if destination_root == &dest));

    assert_eq!(file_names(&dest.join("Dog")), vec!["Dog_1.jpg", "Dog_2.jpg", "Dog_3.jpg"]);
    assert!(file_names(&source).is_empty());

    let mut numbers: Vec<u64> = outcome.files().iter().map(|f| f.sequence_number).collect();
    numbers.sort();
    assert_eq!(numbers, vec![1, 2, 3]);

    assert!(recorder.completed.load(Ordering::SeqCst));
    assert_eq!(*recorder.progress.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    assert!(recorder.previews.lock().unwrap().iter().all(|(l, c)| l == "Dog" && *c == 1.0));
    assert_eq!(organizer.state(), OrganizerState::Idle);
}

#[tokio::test]
async fn test_extensions_are_preserved() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["shot.PNG"]);

    let outcome = organizer(&[Some("tabby_cat")])
        .run(&run_config(&source, &dest), &SilentReporter)
        .await
        .unwrap();

    assert_eq!(file_names(&dest.join("Tabby Cat")), vec!["Tabby Cat_1.PNG"]);
    assert_eq!(outcome.stats().categories["Tabby Cat"], 1);
}

#[tokio::test]
async fn test_cancel_after_third_file() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    let names: Vec<String> = (1..=10).map(|i| format!("img{:02}.jpg", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    write_images(&source, &refs);

    let organizer = organizer(&[Some("Cat")]);
    let recorder = Recorder {
        cancel_after: Some((3, organizer.cancellation_token())),
        ..Recorder::default()
    };
    let outcome = organizer.run(&run_config(&source, &dest), &recorder).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
    assert!(outcome.stats().processed <= 3);
    assert_eq!(outcome.stats().processed, 3);
    assert!(recorder.cancelled.load(Ordering::SeqCst));
    assert!(!recorder.completed.load(Ordering::SeqCst));

    // Already-moved files stay moved; the rest never left the source
    assert_eq!(file_names(&dest.join("Cat")).len(), 3);
    assert_eq!(file_names(&source).len(), 7);
    assert_eq!(organizer.state(), OrganizerState::Idle);
}

#[tokio::test]
async fn test_no_images_found() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["notes.txt", "movie.mp4"]);

    let recorder = Recorder::default();
    let outcome = organizer(&[Some("Cat")])
        .run(&run_config(&source, &dest), &recorder)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::NoImagesFound);
    assert_eq!(outcome.stats().processed, 0);
    assert!(recorder.no_images.load(Ordering::SeqCst));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_numbering_continues_from_previous_run() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&dest.join("Cat"), &["Cat_1.jpg", "Cat_2.jpg"]);
    write_images(&source, &["new.jpg"]);

    let outcome = organizer(&[Some("cat")])
        .run(&run_config(&source, &dest), &SilentReporter)
        .await
        .unwrap();

    assert_eq!(outcome.files()[0].destination_path, dest.join("Cat").join("Cat_3.jpg"));
    assert_eq!(outcome.files()[0].sequence_number, 3);
    assert_eq!(file_names(&dest.join("Cat")), vec!["Cat_1.jpg", "Cat_2.jpg", "Cat_3.jpg"]);
}

#[tokio::test]
async fn test_decode_failure_is_counted_and_logged() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["a.jpg", "c.jpg"]);
    fs::write(source.join("b.jpg"), b"corrupt").unwrap();

    let log_path = tmp.path().join("error_log.txt");
    let mut registry = ClassifierRegistry::new();
    registry.register(Box::new(Always { id: "c1", label: Some("Dog") }));
    let organizer = Organizer::new(
        registry,
        Box::new(StubDecoder),
        Box::new(FileErrorLog::new(log_path.clone())),
    );

    let outcome = organizer.run(&run_config(&source, &dest), &SilentReporter).await.unwrap();
    let stats = outcome.stats();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.errors, 1);
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    assert_eq!(file_names(&source), vec!["b.jpg"]);
    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("Error processing b.jpg"));
}

#[tokio::test]
async fn test_failed_move_is_counted_and_run_continues() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["a_dog.jpg", "b_cat.jpg", "c_dog.jpg"]);
    // A regular file where the Cat folder should go
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("Cat"), b"in the way").unwrap();

    let log_path = tmp.path().join("error_log.txt");
    let mut registry = ClassifierRegistry::new();
    registry.register(Box::new(ByName));
    let organizer = Organizer::new(
        registry,
        Box::new(StubDecoder),
        Box::new(FileErrorLog::new(log_path.clone())),
    );

    let recorder = Recorder::default();
    let outcome = organizer.run(&run_config(&source, &dest), &recorder).await.unwrap();
    let stats = outcome.stats();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert!(recorder.completed.load(Ordering::SeqCst));
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.categories.get("Cat"), None);
    assert_eq!(stats.categories["Dog"], 2);

    assert_eq!(file_names(&source), vec!["b_cat.jpg"]);
    assert_eq!(fs::read(source.join("b_cat.jpg")).unwrap(), b"pixels");
    assert_eq!(fs::read(dest.join("Cat")).unwrap(), b"in the way");
    assert_eq!(file_names(&dest.join("Dog")), vec!["Dog_1.jpg", "Dog_2.jpg"]);

    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("Error processing b_cat.jpg"));
}

#[tokio::test]
async fn test_single_failed_move_completes_with_nothing_processed() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["a.jpg"]);
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("Cat"), b"in the way").unwrap();

    let recorder = Recorder::default();
    let outcome = organizer(&[Some("cat")])
        .run(&run_config(&source, &dest), &recorder)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(outcome.stats().processed, 0);
    assert_eq!(outcome.stats().errors, 1);
    assert!(outcome.files().is_empty());
    assert!(recorder.progress.lock().unwrap().is_empty());
    assert_eq!(file_names(&source), vec!["a.jpg"]);
}

#[tokio::test]
async fn test_all_classifiers_failing_goes_to_uncategorized() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["a.gif"]);

    let recorder = Recorder::default();
    let outcome = organizer(&[None, None])
        .run(&run_config(&source, &dest), &recorder)
        .await
        .unwrap();

    assert_eq!(outcome.stats().processed, 1);
    assert_eq!(outcome.stats().errors, 0);
    assert_eq!(file_names(&dest.join("Uncategorized")), vec!["Uncategorized_1.gif"]);
    assert_eq!(*recorder.previews.lock().unwrap(), vec![("Uncategorized".to_string(), 0.0)]);
}

#[tokio::test]
async fn test_tie_goes_to_first_classifier() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["a.jpg"]);

    let recorder = Recorder::default();
    organizer(&[None, Some("bird"), Some("plane")])
        .run(&run_config(&source, &dest), &recorder)
        .await
        .unwrap();

    assert!(dest.join("Bird").join("Bird_1.jpg").is_file());
    assert_eq!(*recorder.previews.lock().unwrap(), vec![("bird".to_string(), 0.5)]);
}

#[tokio::test]
async fn test_missing_source_is_setup_error() {
    let tmp = tempdir().unwrap();
    let source: PathBuf = tmp.path().join("does-not-exist");
    let dest = tmp.path().join("sorted");

    let err = organizer(&[Some("Cat")])
        .run(&run_config(&source, &dest), &SilentReporter)
        .await
        .unwrap_err();
    assert!(matches!(err, ImgsortError::Setup(_)));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_uncreatable_destination_is_setup_error() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    write_images(&source, &["a.jpg"]);
    // A regular file where the destination folder should go
    let dest = tmp.path().join("blocked");
    fs::write(&dest, b"file").unwrap();

    let err = organizer(&[Some("Cat")])
        .run(&run_config(&source, &dest), &SilentReporter)
        .await
        .unwrap_err();
    assert!(matches!(err, ImgsortError::Setup(_)));
    assert_eq!(file_names(&source), vec!["a.jpg"]);
}

#[tokio::test]
async fn test_second_start_while_running_is_rejected() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("photos");
    let dest = tmp.path().join("sorted");
    write_images(&source, &["a.jpg", "b.jpg"]);

    let organizer = organizer(&[Some("Cat")]);
    let config = run_config(&source, &dest);
    let (first, second) = tokio::join!(
        organizer.run(&config, &SilentReporter),
        organizer.run(&config, &SilentReporter),
    );

    assert_eq!(first.unwrap().stats().processed, 2);
    assert!(matches!(second, Err(ImgsortError::AlreadyRunning)));
    assert_eq!(organizer.state(), OrganizerState::Idle);

    // Idle again: a fresh run over the now-empty source finds nothing
    let outcome = organizer.run(&config, &SilentReporter).await.unwrap();
    assert_eq!(outcome, RunOutcome::NoImagesFound);
}
