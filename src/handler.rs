use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::draft::Draft;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.quit();
                return;
            }
            KeyCode::Char('b') => {
                app.toggle_sidebar();
                return;
            }
            KeyCode::Char('v') => {
                app.toggle_voice();
                return;
            }
            _ => {}
        }
    }

    if app.show_upload_prompt {
        handle_upload_prompt(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),

        KeyCode::Char('i') | KeyCode::Enter => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Tab => app.cycle_focus(),

        KeyCode::Char('b') => app.toggle_sidebar(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('v') => app.toggle_voice(),
        KeyCode::Char('u') => app.open_upload_prompt(),
        KeyCode::Char('n') => app.new_conversation(),
        KeyCode::Char('x') => {
            app.dismiss_notification();
        }

        // Esc peels back one layer: notice first, then the pending reply
        KeyCode::Esc => {
            if !app.dismiss_notification() {
                app.cancel_reply();
            }
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sidebar => app.document_nav_down(),
            _ => app.scroll_thread_down(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sidebar => app.document_nav_up(),
            _ => app.scroll_thread_up(1),
        },
        KeyCode::PageDown => app.scroll_thread_down(app.thread_height.max(2) / 2),
        KeyCode::PageUp => app.scroll_thread_up(app.thread_height.max(2) / 2),
        KeyCode::Char('g') => app.scroll_thread_to_top(),
        KeyCode::Char('G') => app.scroll_thread_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
            app.conversation.draft.insert_char('\n');
        }
        KeyCode::Enter => app.submit(),
        _ => edit_text(&mut app.conversation.draft, key),
    }
}

fn handle_upload_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_upload_prompt(),
        KeyCode::Enter => app.confirm_upload(),
        _ => edit_text(&mut app.upload_input, key),
    }
}

/// Cursor movement and character editing shared by the input bar and the upload prompt
fn edit_text(text: &mut Draft, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => text.backspace(),
        KeyCode::Delete => text.delete(),
        KeyCode::Left => text.move_left(),
        KeyCode::Right => text.move_right(),
        KeyCode::Home => text.move_home(),
        KeyCode::End => text.move_end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => text.insert_char(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    let target = if app.show_upload_prompt {
        &mut app.upload_input
    } else if app.input_mode == InputMode::Editing {
        &mut app.conversation.draft
    } else {
        return;
    };

    for c in text.chars().filter(|c| *c != '\r') {
        target.insert_char(c);
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_sidebar = app.sidebar_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_thread = app.thread_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_input = app.input_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_sidebar {
                app.document_nav_down();
            } else if in_thread {
                app.scroll_thread_down(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_sidebar {
                app.document_nav_up();
            } else if in_thread {
                app.scroll_thread_up(3);
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if in_input {
                app.focus = FocusPane::Input;
                app.input_mode = InputMode::Editing;
            } else if in_thread {
                app.focus = FocusPane::Thread;
                app.input_mode = InputMode::Normal;
            } else if in_sidebar {
                if app.sidebar_open {
                    app.focus = FocusPane::Sidebar;
                    app.input_mode = InputMode::Normal;
                } else {
                    // Collapsed sidebar acts as the expand button
                    app.toggle_sidebar();
                }
            }
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::config::Config;
    use crate::conversation::ReplyOutcome;
    use crate::voice::NoDictation;
    use crossterm::event::KeyEventState;
    use crossterm::event::KeyEventKind;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c)));
        }
    }

    fn test_app() -> (App, mpsc::UnboundedReceiver<ReplyOutcome>) {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (dictation_tx, _) = mpsc::unbounded_channel();
        let app = App::with_parts(
            &Config::default(),
            Arc::new(SimulatedBackend::new(Duration::from_millis(1000))),
            Box::new(NoDictation),
            reply_tx,
            dictation_tx,
        );
        (app, reply_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_and_send() {
        let (mut app, mut rx) = test_app();
        type_text(&mut app, "hi there");
        handle_event(&mut app, key(KeyCode::Enter));

        assert_eq!(app.conversation.messages().len(), 1);
        assert_eq!(app.conversation.messages()[0].content, "hi there");
        assert_eq!(app.conversation.draft.text(), "");

        // Enter while waiting does nothing
        type_text(&mut app, "again");
        handle_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.conversation.messages().len(), 1);
        assert_eq!(app.conversation.draft.text(), "again");

        app.apply_reply(rx.recv().await.unwrap());
        assert_eq!(app.conversation.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_enter_is_ignored() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "   ");
        handle_event(&mut app, key(KeyCode::Enter));
        assert!(app.conversation.messages().is_empty());
        assert!(!app.conversation.is_pending());
    }

    #[tokio::test]
    async fn test_escape_cancels_pending_reply() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "hello");
        handle_event(&mut app, key(KeyCode::Enter));

        handle_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.conversation.is_pending());

        handle_event(&mut app, key(KeyCode::Esc));
        assert!(!app.conversation.is_pending());
    }

    #[test]
    fn test_upload_prompt_keys() {
        let (mut app, _rx) = test_app();
        handle_event(&mut app, key(KeyCode::Esc));
        handle_event(&mut app, key(KeyCode::Char('u')));
        assert!(app.show_upload_prompt);

        handle_event(&mut app, AppEvent::Paste("/docs/guide.pdf".to_string()));
        handle_event(&mut app, key(KeyCode::Enter));
        assert!(!app.show_upload_prompt);
        assert_eq!(app.documents.documents().last().unwrap().name, "guide.pdf");
    }

    #[test]
    fn test_global_shortcuts() {
        let (mut app, _rx) = test_app();
        assert!(app.sidebar_open);
        handle_event(&mut app, ctrl('b'));
        assert!(!app.sidebar_open);

        handle_event(&mut app, ctrl('c'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_theme_toggle_in_normal_mode_only() {
        let (mut app, _rx) = test_app();
        handle_event(&mut app, key(KeyCode::Char('t')));
        assert!(!app.dark_mode);
        assert_eq!(app.conversation.draft.text(), "t");

        handle_event(&mut app, key(KeyCode::Esc));
        handle_event(&mut app, key(KeyCode::Char('t')));
        assert!(app.dark_mode);
    }

    #[test]
    fn test_click_collapsed_sidebar_expands() {
        let (mut app, _rx) = test_app();
        app.sidebar_open = false;
        app.sidebar_area = Some(Rect::new(0, 1, 6, 20));

        handle_event(
            &mut app,
            AppEvent::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column: 2,
                row: 5,
                modifiers: KeyModifiers::NONE,
            }),
        );
        assert!(app.sidebar_open);
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 3, 3);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(4, 4, rect));
        assert!(!point_in_rect(5, 4, rect));
    }
}
