//! Video in, timeline entries out.

use super::audio::AudioInput;
use super::backend::{RecognizedSegment, SpeechRecognizer};
use crate::error::{Error, Result};
use crate::media::MediaToolkit;
use crate::timeline::NewEntry;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct TranscriptionAdapter {
    media: Arc<dyn MediaToolkit>,
    recognizer: Arc<dyn SpeechRecognizer>,
    scratch_root: PathBuf,
}

impl TranscriptionAdapter {
    pub fn new(
        media: Arc<dyn MediaToolkit>,
        recognizer: Arc<dyn SpeechRecognizer>,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            media,
            recognizer,
            scratch_root,
        }
    }

    /// Extract the audio of `video`, run the recognizer once and map its
    /// segments to entries. Scratch audio is removed on every path.
    pub async fn transcribe(&self, video: &Path, language: &str) -> Result<Vec<NewEntry>> {
        let scratch = tempfile::Builder::new()
            .prefix("transcribe-")
            .tempdir_in(&self.scratch_root)?;
        let wav = scratch.path().join("audio.wav");

        let media = self.media.clone();
        let (video_path, wav_path) = (video.to_path_buf(), wav.clone());
        tokio::task::spawn_blocking(move || media.extract_audio(&video_path, &wav_path))
            .await
            .map_err(|e| Error::Media(format!("audio extraction task failed: {}", e)))??;
        let audio = AudioInput::open(&wav)?;

        info!(
            "[transcribe] {} on {:.1}s of audio ({})",
            self.recognizer.name(),
            audio.duration(),
            language
        );
        let segments = self
            .recognizer
            .transcribe(&audio, language)
            .await
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;
        Ok(segments_to_entries(segments, language))
    }
}

/// One entry per segment, in recognizer order. Text is trimmed but never
/// dropped, and the log-probability is kept as reported.
pub fn segments_to_entries(segments: Vec<RecognizedSegment>, language: &str) -> Vec<NewEntry> {
    segments
        .into_iter()
        .map(|s| NewEntry {
            start_time: s.start,
            end_time: s.end,
            text: s.text.trim().to_string(),
            language: language.to_string(),
            confidence: s.avg_logprob,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::transcription::BackendError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns canned segments, or fails, and counts calls.
    pub struct FakeRecognizer {
        pub segments: Vec<RecognizedSegment>,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeRecognizer {
        pub fn returning(segments: Vec<RecognizedSegment>) -> Self {
            Self {
                segments,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::returning(Vec::new())
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for FakeRecognizer {
        fn id(&self) -> &'static str {
            "fake"
        }

        fn name(&self) -> &'static str {
            "Fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn transcribe(
            &self,
            audio: &AudioInput,
            _language: &str,
        ) -> std::result::Result<Vec<RecognizedSegment>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(audio.path().exists());
            if self.fail {
                return Err(BackendError::Process("model crashed".into()));
            }
            Ok(self.segments.clone())
        }
    }

    pub fn segment(start: f64, end: f64, text: &str, avg_logprob: Option<f64>) -> RecognizedSegment {
        RecognizedSegment {
            start,
            end,
            text: text.to_string(),
            avg_logprob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{segment, FakeRecognizer};
    use super::*;
    use crate::media::testing::FakeMedia;
    use std::sync::atomic::Ordering;

    fn scratch_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn maps_segments_one_to_one() {
        let entries = segments_to_entries(
            vec![
                segment(0.0, 2.0, " Hello ", Some(-0.25)),
                segment(2.0, 3.0, "   ", None),
            ],
            "fr",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Hello");
        assert_eq!(entries[0].confidence, Some(-0.25));
        assert_eq!(entries[0].language, "fr");
        assert_eq!(entries[1].text, "");
        assert_eq!(entries[1].confidence, None);
    }

    #[tokio::test]
    async fn runs_recognizer_once_and_cleans_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = Arc::new(FakeRecognizer::returning(vec![segment(0.0, 1.0, "Hi", None)]));
        let adapter = TranscriptionAdapter::new(
            Arc::new(FakeMedia::default()),
            recognizer.clone(),
            dir.path().to_path_buf(),
        );
        let entries = adapter.transcribe(Path::new("video.mp4"), "en").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
        assert!(scratch_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn recognizer_failure_is_transcription_failed() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = TranscriptionAdapter::new(
            Arc::new(FakeMedia::default()),
            Arc::new(FakeRecognizer::failing()),
            dir.path().to_path_buf(),
        );
        let err = adapter.transcribe(Path::new("video.mp4"), "en").await.unwrap_err();
        assert!(matches!(err, Error::TranscriptionFailed(_)));
        assert!(scratch_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn extraction_failure_skips_recognizer() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = Arc::new(FakeRecognizer::returning(Vec::new()));
        let media = FakeMedia {
            fail_extract: true,
            ..FakeMedia::default()
        };
        let adapter = TranscriptionAdapter::new(Arc::new(media), recognizer.clone(), dir.path().to_path_buf());
        let err = adapter.transcribe(Path::new("video.mp4"), "en").await.unwrap_err();
        assert!(matches!(err, Error::Media(_)));
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
        assert!(scratch_is_empty(dir.path()));
    }
}
