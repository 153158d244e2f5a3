use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::{self, ReplyBackend};
use crate::config::Config;
use crate::conversation::{Conversation, ReplyOutcome};
use crate::documents::DocumentLibrary;
use crate::draft::Draft;
use crate::error::ChatError;
use crate::voice::{self, Dictation, DictationEvent, ListenState, VoiceInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Thread,
    Input,
}

const LISTENING_NOTICE: &str = "Listening...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A dismissable message shown above the input bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub sidebar_open: bool,
    pub dark_mode: bool,

    // Conversation and input
    pub conversation: Conversation,
    pub voice: VoiceInput,

    // Thread view
    pub thread_scroll: u16,
    pub thread_height: u16, // inner height, updated during render
    pub thread_lines: u16,  // wrapped line count, measured during render
    pub follow_tail: bool,  // keep the newest line in view

    // Sidebar
    pub documents: DocumentLibrary,
    pub document_state: ListState,
    pub show_upload_prompt: bool,
    pub upload_input: Draft,

    pub notifications: Vec<Notification>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub thread_area: Option<Rect>,
    pub input_area: Option<Rect>,
}

impl App {
    pub fn new(
        config: &Config,
        replies: mpsc::UnboundedSender<ReplyOutcome>,
        dictation_events: mpsc::UnboundedSender<DictationEvent>,
    ) -> Self {
        let backend = backend::from_config(config);
        let dictation = voice::detect(config.dictation_command.as_deref());
        Self::with_parts(config, backend, dictation, replies, dictation_events)
    }

    pub fn with_parts(
        config: &Config,
        backend: Arc<dyn ReplyBackend>,
        dictation: Box<dyn Dictation>,
        replies: mpsc::UnboundedSender<ReplyOutcome>,
        dictation_events: mpsc::UnboundedSender<DictationEvent>,
    ) -> Self {
        let documents = DocumentLibrary::seeded();
        let mut document_state = ListState::default();
        if !documents.is_empty() {
            document_state.select(Some(0));
        }

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            sidebar_open: config.sidebar_open,
            dark_mode: config.dark_mode,

            conversation: Conversation::new(backend, config.reply_timeout(), replies),
            voice: VoiceInput::new(dictation, dictation_events),

            thread_scroll: 0,
            thread_height: 0,
            thread_lines: 0,
            follow_tail: true,

            documents,
            document_state,
            show_upload_prompt: false,
            upload_input: Draft::new(),

            notifications: Vec::new(),

            animation_frame: 0,

            sidebar_area: None,
            thread_area: None,
            input_area: None,
        }
    }

    // Conversation

    pub fn submit(&mut self) {
        match self.conversation.submit_draft() {
            Ok(true) => self.scroll_thread_to_bottom(),
            Ok(false) => {}
            // Send is unavailable while waiting; nothing to report
            Err(ChatError::ReplyPending) => {}
            Err(e) => self.notify_error(&e),
        }
    }

    pub fn apply_reply(&mut self, outcome: ReplyOutcome) {
        match self.conversation.apply_reply(outcome) {
            Ok(true) => self.scroll_thread_to_bottom(),
            Ok(false) => {}
            Err(e) => self.notify_error(&e),
        }
    }

    /// Esc while waiting: stop waiting for the reply.
    pub fn cancel_reply(&mut self) -> bool {
        let cancelled = self.conversation.cancel_pending();
        if cancelled {
            self.notify(NoticeLevel::Info, "Reply cancelled");
        }
        cancelled
    }

    pub fn new_conversation(&mut self) {
        self.conversation.clear();
        self.thread_scroll = 0;
        self.follow_tail = true;
        self.notifications.clear();
    }

    // Voice

    pub fn toggle_voice(&mut self) {
        match self.voice.toggle() {
            Ok(ListenState::Listening) => self.notify(NoticeLevel::Info, LISTENING_NOTICE),
            Ok(ListenState::Idle) => self.dismiss_listening_notice(),
            Err(e) => self.notify_error(&e),
        }
    }

    pub fn apply_dictation(&mut self, event: DictationEvent) {
        let was_listening = self.voice.is_listening();
        self.voice.handle_event(event, &mut self.conversation.draft);
        if was_listening && !self.voice.is_listening() {
            self.dismiss_listening_notice();
        }
    }

    // Chrome

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
        if !self.sidebar_open && self.focus == FocusPane::Sidebar {
            self.focus = FocusPane::Thread;
        }
    }

    pub fn toggle_theme(&mut self) {
        self.dark_mode = !self.dark_mode;
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Sidebar => FocusPane::Thread,
            FocusPane::Thread => FocusPane::Input,
            FocusPane::Input if self.sidebar_open => FocusPane::Sidebar,
            FocusPane::Input => FocusPane::Thread,
        };
    }

    // Documents

    pub fn open_upload_prompt(&mut self) {
        self.sidebar_open = true;
        self.show_upload_prompt = true;
        self.upload_input.clear();
    }

    pub fn close_upload_prompt(&mut self) {
        self.show_upload_prompt = false;
        self.upload_input.clear();
    }

    pub fn confirm_upload(&mut self) {
        let raw = self.upload_input.take();
        self.show_upload_prompt = false;

        let path = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        if path.is_empty() {
            return;
        }

        match self.documents.upload(Path::new(path)) {
            Ok(doc) => {
                let message = format!("Uploaded {}", doc.name);
                self.document_state.select(Some(self.documents.len() - 1));
                self.notify(NoticeLevel::Info, message);
            }
            Err(e) => self.notify_error(&e),
        }
    }

    pub fn document_nav_down(&mut self) {
        let len = self.documents.len();
        if len > 0 {
            let i = self.document_state.selected().unwrap_or(0);
            self.document_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn document_nav_up(&mut self) {
        let i = self.document_state.selected().unwrap_or(0);
        self.document_state.select(Some(i.saturating_sub(1)));
    }

    // Notifications

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        // Only the latest info notice matters
        if level == NoticeLevel::Info {
            self.notifications.retain(|n| n.level != NoticeLevel::Info);
        }
        self.notifications.push(Notification { level, message });
    }

    pub fn notify_error(&mut self, error: &ChatError) {
        let level = if error.is_user_facing_failure() {
            NoticeLevel::Error
        } else {
            NoticeLevel::Info
        };
        self.notify(level, error.to_string());
    }

    pub fn current_notification(&self) -> Option<&Notification> {
        self.notifications.last()
    }

    pub fn dismiss_notification(&mut self) -> bool {
        self.notifications.pop().is_some()
    }

    fn dismiss_listening_notice(&mut self) {
        self.notifications
            .retain(|n| !(n.level == NoticeLevel::Info && n.message == LISTENING_NOTICE));
    }

    // Lifecycle

    pub fn quit(&mut self) {
        self.conversation.cancel_pending();
        self.voice.stop();
        self.should_quit = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_thread_down(&mut self, lines: u16) {
        let max = self.max_thread_scroll();
        self.thread_scroll = self.thread_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.thread_scroll >= max;
    }

    pub fn scroll_thread_up(&mut self, lines: u16) {
        self.thread_scroll = self.thread_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_thread_to_top(&mut self) {
        self.thread_scroll = 0;
        self.follow_tail = false;
    }

    /// Keep the newest message (or "Thinking...") in view. The exact offset is
    /// settled on the next render, once the wrapped height is known.
    pub fn scroll_thread_to_bottom(&mut self) {
        self.follow_tail = true;
        self.thread_scroll = self.max_thread_scroll();
    }

    /// Record the thread's wrapped line count and visible height from the renderer
    pub fn set_thread_metrics(&mut self, total_lines: u16, visible_height: u16) {
        self.thread_lines = total_lines;
        self.thread_height = visible_height;

        let max = self.max_thread_scroll();
        self.thread_scroll = if self.follow_tail { max } else { self.thread_scroll.min(max) };
    }

    fn max_thread_scroll(&self) -> u16 {
        self.thread_lines.saturating_sub(self.thread_height)
    }
}
