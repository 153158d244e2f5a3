//! Voice input
//!
//! [`VoiceInput`] toggles an optional dictation capability on and off and feeds
//! recognized fragments into the draft. The capability is picked once at
//! startup by [`detect`]: an external speech-to-text command when one is
//! configured and installed, otherwise a stub that is never available.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::draft::Draft;
use crate::error::{ChatError, Result};

/// Events produced by a dictation session, tagged with the session they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationEvent {
    Fragment { session: u64, text: String },
    Ended { session: u64 },
}

/// A host speech-to-text facility.
pub trait Dictation: Send {
    fn name(&self) -> String;

    fn is_available(&self) -> bool;

    /// Begin capturing. Fragments and the final `Ended` go to `sink`.
    fn start(&mut self, session: u64, sink: mpsc::UnboundedSender<DictationEvent>) -> Result<()>;

    fn stop(&mut self);
}

/// Used when no dictation facility exists. Never available, never does anything.
#[derive(Debug, Default)]
pub struct NoDictation;

impl Dictation for NoDictation {
    fn name(&self) -> String {
        "none".to_string()
    }

    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self, _session: u64, _sink: mpsc::UnboundedSender<DictationEvent>) -> Result<()> {
        Err(ChatError::CapabilityUnavailable("Dictation".to_string()))
    }

    fn stop(&mut self) {}
}

/// Runs an external speech-to-text program and treats each stdout line as a fragment.
/// The program exiting on its own (silence timeout, end of input) ends the session.
#[derive(Debug)]
pub struct CommandDictation {
    program: PathBuf,
    args: Vec<String>,
    task: Option<JoinHandle<()>>,
}

impl CommandDictation {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            task: None,
        }
    }

    /// Parse `"whisper-stream --model base"` and resolve the program on `PATH`.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        let resolved = which::which(program).ok()?;
        Some(Self::new(resolved, parts.map(str::to_string).collect()))
    }
}

impl Dictation for CommandDictation {
    fn name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self, session: u64, sink: mpsc::UnboundedSender<DictationEvent>) -> Result<()> {
        self.stop();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChatError::Dictation(format!("failed to start {}: {}", self.program.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChatError::Dictation("dictation command has no stdout".to_string()))?;

        tracing::info!(session, program = %self.program.display(), "dictation started");

        self.task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let text = line.trim();
                        if text.is_empty() {
                            continue;
                        }
                        let event = DictationEvent::Fragment {
                            session,
                            text: text.to_string(),
                        };
                        if sink.send(event).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(session, error = %e, "dictation output unreadable");
                        break;
                    }
                }
            }
            let _ = child.wait().await;
            let _ = sink.send(DictationEvent::Ended { session });
        }));

        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the task drops the child, which kills it
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CommandDictation {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pick the dictation capability for this run.
pub fn detect(command: Option<&str>) -> Box<dyn Dictation> {
    match command.map(str::trim).filter(|c| !c.is_empty()) {
        Some(command) => match CommandDictation::from_command_line(command) {
            Some(dictation) => {
                tracing::info!(program = %dictation.program.display(), "dictation available");
                Box::new(dictation)
            }
            None => {
                tracing::warn!(command, "dictation command not found, voice input disabled");
                Box::new(NoDictation)
            }
        },
        None => Box::new(NoDictation),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    Listening,
}

pub struct VoiceInput {
    capability: Box<dyn Dictation>,
    state: ListenState,
    session: u64,
    sink: mpsc::UnboundedSender<DictationEvent>,
}

impl VoiceInput {
    pub fn new(capability: Box<dyn Dictation>, sink: mpsc::UnboundedSender<DictationEvent>) -> Self {
        Self {
            capability,
            state: ListenState::Idle,
            session: 0,
            sink,
        }
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == ListenState::Listening
    }

    pub fn is_available(&self) -> bool {
        self.capability.is_available()
    }

    pub fn capability_name(&self) -> String {
        self.capability.name()
    }

    /// Idle -> Listening or Listening -> Idle.
    pub fn toggle(&mut self) -> Result<ListenState> {
        match self.state {
            ListenState::Listening => {
                self.stop();
                Ok(self.state)
            }
            ListenState::Idle => {
                if !self.capability.is_available() {
                    return Err(ChatError::CapabilityUnavailable("Dictation".to_string()));
                }
                self.session += 1;
                self.capability.start(self.session, self.sink.clone())?;
                self.state = ListenState::Listening;
                tracing::debug!(session = self.session, "voice input: Idle -> Listening");
                Ok(self.state)
            }
        }
    }

    pub fn stop(&mut self) {
        if self.state == ListenState::Listening {
            self.capability.stop();
            self.state = ListenState::Idle;
            tracing::debug!(session = self.session, "voice input: Listening -> Idle");
        }
    }

    /// Apply a capability event. Returns true when the draft changed.
    ///
    /// Events from an earlier session, or arriving after a stop, are dropped.
    pub fn handle_event(&mut self, event: DictationEvent, draft: &mut Draft) -> bool {
        match event {
            DictationEvent::Fragment { session, text } => {
                if !self.is_listening() || session != self.session {
                    tracing::debug!(session, "dropping late dictation fragment");
                    return false;
                }
                let needs_space = !draft.text().is_empty()
                    && !draft.text().ends_with(char::is_whitespace)
                    && !text.starts_with(char::is_whitespace);
                if needs_space {
                    draft.append(" ");
                }
                draft.append(&text);
                true
            }
            DictationEvent::Ended { session } => {
                if self.is_listening() && session == self.session {
                    self.state = ListenState::Idle;
                    tracing::debug!(session, "voice input ended by capability");
                }
                false
            }
        }
    }
}

impl Drop for VoiceInput {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        starts: Vec<u64>,
        stops: usize,
    }

    struct FakeDictation(Arc<Mutex<Calls>>);

    impl Dictation for FakeDictation {
        fn name(&self) -> String {
            "fake".to_string()
        }

        fn is_available(&self) -> bool {
            true
        }

        fn start(&mut self, session: u64, _sink: mpsc::UnboundedSender<DictationEvent>) -> Result<()> {
            self.0.lock().unwrap().starts.push(session);
            Ok(())
        }

        fn stop(&mut self) {
            self.0.lock().unwrap().stops += 1;
        }
    }

    fn fake_voice() -> (VoiceInput, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let (tx, _rx) = mpsc::unbounded_channel();
        (VoiceInput::new(Box::new(FakeDictation(Arc::clone(&calls))), tx), calls)
    }

    fn fragment(session: u64, text: &str) -> DictationEvent {
        DictationEvent::Fragment {
            session,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_toggle_twice_returns_to_idle() {
        let (mut voice, calls) = fake_voice();

        assert_eq!(voice.toggle().unwrap(), ListenState::Listening);
        assert_eq!(voice.toggle().unwrap(), ListenState::Idle);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.starts, vec![1]);
        assert_eq!(calls.stops, 1);
    }

    #[test]
    fn test_unavailable_capability_stays_idle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut voice = VoiceInput::new(Box::new(NoDictation), tx);

        assert!(!voice.is_available());
        assert!(matches!(voice.toggle(), Err(ChatError::CapabilityUnavailable(_))));
        assert_eq!(voice.state(), ListenState::Idle);
    }

    #[test]
    fn test_fragments_append_to_draft() {
        let (mut voice, _) = fake_voice();
        let mut draft = Draft::new();
        draft.set("Tell me");
        voice.toggle().unwrap();

        assert!(voice.handle_event(fragment(1, "about refunds"), &mut draft));
        assert!(voice.handle_event(fragment(1, " please"), &mut draft));
        assert_eq!(draft.text(), "Tell me about refunds please");
    }

    #[test]
    fn test_capability_end_returns_to_idle() {
        let (mut voice, _) = fake_voice();
        let mut draft = Draft::new();
        voice.toggle().unwrap();

        voice.handle_event(DictationEvent::Ended { session: 1 }, &mut draft);
        assert_eq!(voice.state(), ListenState::Idle);
    }

    #[test]
    fn test_late_events_are_dropped() {
        let (mut voice, calls) = fake_voice();
        let mut draft = Draft::new();

        voice.toggle().unwrap();
        voice.toggle().unwrap();
        assert!(!voice.handle_event(fragment(1, "too late"), &mut draft));
        assert_eq!(draft.text(), "");

        // An old session's end must not stop the new one
        voice.toggle().unwrap();
        voice.handle_event(DictationEvent::Ended { session: 1 }, &mut draft);
        assert!(voice.is_listening());
        assert!(!voice.handle_event(fragment(1, "stale"), &mut draft));
        assert!(voice.handle_event(fragment(2, "fresh"), &mut draft));
        assert_eq!(draft.text(), "fresh");
        assert_eq!(calls.lock().unwrap().starts, vec![1, 2]);
    }

    #[test]
    fn test_detect_without_command_is_stub() {
        assert!(!detect(None).is_available());
        assert!(!detect(Some("   ")).is_available());
        assert!(!detect(Some("definitely-not-a-real-dictation-binary")).is_available());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_dictation_streams_lines() {
        let mut dictation = CommandDictation::from_command_line("printf hello\\n\\nworld\\n").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dictation.start(7, tx).unwrap();

        assert_eq!(rx.recv().await.unwrap(), fragment(7, "hello"));
        assert_eq!(rx.recv().await.unwrap(), fragment(7, "world"));
        assert_eq!(rx.recv().await.unwrap(), DictationEvent::Ended { session: 7 });
    }
}
