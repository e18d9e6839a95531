//! Dictation as a text source.
//!
//! A [`DictationSource`] yields recognised fragments until the utterance is
//! complete. Interim fragments are provisional and replaced by whatever comes
//! next; final fragments are kept. The journal only ever sees the finished
//! transcript.

use std::io::BufRead;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub is_final: bool,
}

impl Fragment {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Recognition failures, named after the browser speech-recognition error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DictationError {
    #[error("microphone permission denied")]
    NotAllowed,
    #[error("speech service not allowed")]
    ServiceNotAllowed,
    #[error("audio capture failed")]
    AudioCapture,
    #[error("network error during recognition")]
    Network,
    #[error("no speech detected")]
    NoSpeech,
    #[error("recognition aborted")]
    Aborted,
    #[error("recognition error: {0}")]
    Other(String),
}

impl DictationError {
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" => DictationError::NotAllowed,
            "service-not-allowed" => DictationError::ServiceNotAllowed,
            "audio-capture" => DictationError::AudioCapture,
            "network" => DictationError::Network,
            "no-speech" => DictationError::NoSpeech,
            "aborted" => DictationError::Aborted,
            other => DictationError::Other(other.to_string()),
        }
    }

    /// The caller should offer typed input instead.
    pub fn suggests_text_input(&self) -> bool {
        matches!(
            self,
            DictationError::NotAllowed
                | DictationError::ServiceNotAllowed
                | DictationError::AudioCapture
                | DictationError::Network
        )
    }

    /// Retrying dictation will not help until permissions change.
    pub fn disables_dictation(&self) -> bool {
        matches!(self, DictationError::NotAllowed | DictationError::ServiceNotAllowed)
    }
}

/// A finite, restartable stream of recognised fragments.
pub trait DictationSource {
    /// Next fragment, or `None` once the utterance is complete.
    fn next_fragment(&mut self) -> Option<Result<Fragment, DictationError>>;

    /// Begin a new utterance.
    fn restart(&mut self) -> Result<(), DictationError>;
}

/// Running transcript: committed final text plus the latest interim guess.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    committed: Vec<String>,
    pending: Option<String>,
}

impl Transcript {
    pub fn push(&mut self, fragment: Fragment) {
        let text = fragment.text.trim();
        if fragment.is_final {
            self.pending = None;
            if !text.is_empty() {
                self.committed.push(text.to_string());
            }
        } else {
            self.pending = (!text.is_empty()).then(|| text.to_string());
        }
    }

    /// Current best transcript, including any interim text.
    pub fn text(&self) -> String {
        self.committed
            .iter()
            .map(String::as_str)
            .chain(self.pending.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Drain `source` into a transcript. An error mid-utterance discards the partial text.
pub fn capture_utterance(source: &mut dyn DictationSource) -> Result<String, DictationError> {
    let mut transcript = Transcript::default();
    while let Some(fragment) = source.next_fragment() {
        transcript.push(fragment?);
    }
    Ok(transcript.text())
}

/// Dictation fed from a line stream: each non-blank line is a final fragment and
/// a blank line (or end of input) completes the utterance.
pub struct LineDictation<R> {
    reader: R,
    finished: bool,
}

impl<R: BufRead> LineDictation<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            finished: false,
        }
    }
}

impl<R: BufRead> DictationSource for LineDictation<R> {
    fn next_fragment(&mut self) -> Option<Result<Fragment, DictationError>> {
        if self.finished {
            return None;
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(_) if line.trim().is_empty() => {
                self.finished = true;
                None
            }
            Ok(_) => Some(Ok(Fragment::final_text(line.trim_end()))),
            Err(e) => {
                self.finished = true;
                Some(Err(DictationError::Other(e.to_string())))
            }
        }
    }

    fn restart(&mut self) -> Result<(), DictationError> {
        self.finished = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    struct Scripted {
        fragments: VecDeque<Result<Fragment, DictationError>>,
    }

    impl DictationSource for Scripted {
        fn next_fragment(&mut self) -> Option<Result<Fragment, DictationError>> {
            self.fragments.pop_front()
        }

        fn restart(&mut self) -> Result<(), DictationError> {
            Ok(())
        }
    }

    #[test]
    fn test_interim_is_replaced_by_final() {
        let mut transcript = Transcript::default();
        transcript.push(Fragment::interim("had a hard"));
        assert_eq!(transcript.text(), "had a hard");

        transcript.push(Fragment::final_text("Had a hard conversation"));
        transcript.push(Fragment::interim("with a"));
        assert_eq!(transcript.text(), "Had a hard conversation with a");

        transcript.push(Fragment::final_text("with a friend"));
        assert_eq!(transcript.text(), "Had a hard conversation with a friend");
    }

    #[test]
    fn test_capture_keeps_trailing_interim() {
        let mut source = Scripted {
            fragments: VecDeque::from(vec![
                Ok(Fragment::final_text("Read a book")),
                Ok(Fragment::interim("on stoicism")),
            ]),
        };
        assert_eq!(capture_utterance(&mut source).unwrap(), "Read a book on stoicism");
    }

    #[test]
    fn test_capture_propagates_errors() {
        let mut source = Scripted {
            fragments: VecDeque::from(vec![
                Ok(Fragment::final_text("partial")),
                Err(DictationError::from_code("network")),
            ]),
        };
        let err = capture_utterance(&mut source).unwrap_err();
        assert_eq!(err, DictationError::Network);
        assert!(err.suggests_text_input());
        assert!(!err.disables_dictation());
    }

    #[test]
    fn test_error_classification() {
        assert!(DictationError::from_code("not-allowed").disables_dictation());
        assert!(DictationError::from_code("service-not-allowed").suggests_text_input());
        assert!(!DictationError::from_code("no-speech").suggests_text_input());
        assert_eq!(
            DictationError::from_code("bad-grammar"),
            DictationError::Other("bad-grammar".to_string())
        );
    }

    #[test]
    fn test_line_dictation_stops_at_blank_line() {
        let input = Cursor::new("first thought\nsecond part\n\nnext utterance\n");
        let mut source = LineDictation::new(input);

        assert_eq!(capture_utterance(&mut source).unwrap(), "first thought second part");
        assert!(source.next_fragment().is_none());

        source.restart().unwrap();
        assert_eq!(capture_utterance(&mut source).unwrap(), "next utterance");
    }
}
