use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use crate::app::{App, FocusPane, InputMode, NoticeLevel};
use crate::state::ChatRole;

pub const TITLE: &str = "Guided Operations";
const WELCOME_HEADING: &str = "Welcome to Guided Operations !";
const WELCOME_BODY: &str = "Speak the solution into existence. Elevate your workflow with guided operations \
where intelligent, real-time assistance transforms challenges into streamlined success.";

const SIDEBAR_WIDTH: u16 = 30;
const SIDEBAR_COLLAPSED_WIDTH: u16 = 6;

/// Palette for one of the two themes
#[derive(Debug, Clone, Copy)]
struct Theme {
    bg: Color,
    fg: Color,
    muted: Color,
    accent: Color,
    bar_bg: Color,
    user: Color,
    assistant: Color,
    error: Color,
}

impl Theme {
    fn for_mode(dark: bool) -> Self {
        if dark {
            Self {
                bg: Color::Black,
                fg: Color::Gray,
                muted: Color::DarkGray,
                accent: Color::LightBlue,
                bar_bg: Color::DarkGray,
                user: Color::Cyan,
                assistant: Color::Yellow,
                error: Color::LightRed,
            }
        } else {
            Self {
                bg: Color::Reset,
                fg: Color::Reset,
                muted: Color::DarkGray,
                accent: Color::Blue,
                bar_bg: Color::Gray,
                user: Color::Blue,
                assistant: Color::Magenta,
                error: Color::Red,
            }
        }
    }

    fn border(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.accent } else { self.muted })
    }
}

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        match after_open.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after_open[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after_open[end + 2..];
            }
            // No closing marker (or empty pair): keep the text literal
            _ => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let theme = Theme::for_mode(app.dark_mode);

    frame.render_widget(Block::default().style(Style::default().bg(theme.bg).fg(theme.fg)), area);

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &theme, frame, header_area);

    let sidebar_width = if app.sidebar_open { SIDEBAR_WIDTH } else { SIDEBAR_COLLAPSED_WIDTH };
    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Length(sidebar_width),
        Constraint::Min(0),
    ])
    .areas(body_area);

    app.sidebar_area = Some(sidebar_area);
    render_sidebar(app, &theme, frame, sidebar_area);
    render_main(app, &theme, frame, main_area);

    render_footer(app, &theme, frame, footer_area);

    if app.show_upload_prompt {
        render_upload_prompt(app, &theme, frame, area);
    }
}

fn render_header(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let theme_hint = if app.dark_mode { "dark" } else { "light" };
    let title = Line::from(vec![
        Span::styled(format!(" {} ", TITLE), Style::default().fg(theme.accent).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(theme.muted),
        ),
        Span::styled(
            format!("[{}] [{}]", app.conversation.backend_name(), theme_hint),
            Style::default().fg(theme.muted),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(theme.bar_bg));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar;

    if !app.sidebar_open {
        let block = Block::default()
            .borders(Borders::RIGHT)
            .border_style(theme.border(false));
        let expand = Paragraph::new(vec![Line::default(), Line::from("  ≡")])
            .style(Style::default().fg(theme.fg))
            .block(block);
        frame.render_widget(expand, area);
        return;
    }

    let [upload_area, list_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let upload = Paragraph::new(Line::from(vec![
        Span::styled(" u ", Style::default().bg(theme.accent).fg(Color::White)),
        Span::raw(" Upload PDF"),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(theme.border(false)));
    frame.render_widget(upload, upload_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border(focused))
        .title(format!(" Your PDFs ({}) ", app.documents.len()));

    let items: Vec<ListItem> = app
        .documents
        .documents()
        .iter()
        .map(|doc| ListItem::new(format!(" {} ", doc.name)))
        .collect();

    let list = List::new(items)
        .block(block)
        .style(Style::default().fg(theme.fg))
        .highlight_style(if focused {
            Style::default().bg(theme.accent).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        })
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.document_state);
}

fn render_main(app: &mut App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let welcome_height = if app.conversation.messages().is_empty() && !app.conversation.is_pending() {
        5
    } else {
        0
    };
    let notice_height = if app.current_notification().is_some() { 1 } else { 0 };

    let [welcome_area, thread_area, notice_area, input_area] = Layout::vertical([
        Constraint::Length(welcome_height),
        Constraint::Min(0),
        Constraint::Length(notice_height),
        Constraint::Length(3),
    ])
    .areas(area);

    app.thread_area = Some(thread_area);
    app.input_area = Some(input_area);

    if welcome_height > 0 {
        render_welcome(theme, frame, welcome_area);
    }
    render_thread(app, theme, frame, thread_area);
    if notice_height > 0 {
        render_notification(app, theme, frame, notice_area);
    }
    render_input(app, theme, frame, input_area);
}

fn render_welcome(theme: &Theme, frame: &mut Frame, area: Rect) {
    let card = Paragraph::new(Text::from(vec![
        Line::from(Span::styled(WELCOME_HEADING, Style::default().fg(theme.fg).bold())),
        Line::from(Span::styled(WELCOME_BODY, Style::default().fg(theme.muted))),
    ]))
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).border_style(theme.border(false)));

    frame.render_widget(card, area);
}

fn render_thread(app: &mut App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border(app.focus == FocusPane::Thread))
        .title(" Conversation ");

    let pending = app.conversation.is_pending();

    let text = if app.conversation.messages().is_empty() && !pending {
        Text::from(Span::styled("Ask a question...", Style::default().fg(theme.muted)))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.conversation.messages() {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(theme.user).add_modifier(Modifier::BOLD),
                    )));
                    lines.extend(msg.content.lines().map(|l| Line::from(l.to_string())));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(theme.assistant).add_modifier(Modifier::BOLD),
                    )));
                    lines.extend(msg.content.lines().map(parse_markdown_line));
                }
            }
            lines.push(Line::default());
        }

        if pending {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(theme.assistant).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    // Measure with the same wrapping the paragraph renders with (inner size, minus borders)
    let inner_width = area.width.saturating_sub(2);
    let total_lines = Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(inner_width);
    app.set_thread_metrics(
        u16::try_from(total_lines).unwrap_or(u16::MAX),
        area.height.saturating_sub(2),
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(theme.fg))
        .wrap(Wrap { trim: false })
        .scroll((app.thread_scroll, 0));

    frame.render_widget(paragraph, area);

    if app.thread_height > 0 && total_lines > app.thread_height as usize {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(app.thread_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_notification(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let Some(notice) = app.current_notification() else {
        return;
    };

    let (label, color) = match notice.level {
        NoticeLevel::Info => (" info ", theme.accent),
        NoticeLevel::Error => (" error ", theme.error),
    };

    let line = Line::from(vec![
        Span::styled(label, Style::default().bg(color).fg(Color::White).bold()),
        Span::raw(" "),
        Span::styled(notice.message.clone(), Style::default().fg(color)),
        Span::styled("  (x to dismiss)", Style::default().fg(theme.muted)),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && !app.show_upload_prompt;
    let focused = app.focus == FocusPane::Input || editing;

    let mic = if app.voice.is_listening() {
        " ● rec "
    } else if app.voice.is_available() {
        " mic "
    } else {
        ""
    };
    let send = if app.conversation.can_send() { " send " } else { "" };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { theme.assistant } else { theme.muted }))
        .title(" Ask a question ")
        .title(
            Line::from(vec![
                Span::styled(mic, Style::default().fg(theme.error)),
                Span::styled(send, Style::default().fg(theme.accent)),
            ])
            .right_aligned(),
        );

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let draft = &app.conversation.draft;
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = draft.cursor();

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = draft
        .text()
        .chars()
        .map(|c| if c == '\n' { '⏎' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(theme.user))
        .block(block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = if app.show_upload_prompt {
        vec![("Enter", "upload"), ("Esc", "cancel")]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                ("Enter", "send"),
                ("^V", "voice"),
                ("^B", "sidebar"),
                ("Esc", "stop typing"),
            ],
            InputMode::Normal => {
                let mut pairs = vec![("i", "type"), ("Tab", "focus"), ("j/k", "scroll")];
                if app.conversation.is_pending() {
                    pairs.push(("Esc", "cancel reply"));
                }
                pairs.extend([
                    ("u", "upload"),
                    ("v", "voice"),
                    ("b", "sidebar"),
                    ("t", "theme"),
                    ("n", "new"),
                    ("q", "quit"),
                ]);
                pairs
            }
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black).fg(theme.fg));
    frame.render_widget(footer, area);
}

fn render_upload_prompt(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 5;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.assistant))
        .title(" Upload PDF ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Path to a .pdf file. Enter to upload, Esc to cancel.")
        .style(Style::default().fg(theme.muted));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    if inner.height < 3 {
        return;
    }
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);

    let width = input_area.width as usize;
    let cursor = app.upload_input.cursor();
    let offset = if width > 0 && cursor >= width { cursor - width + 1 } else { 0 };
    let visible: String = app.upload_input.text().chars().skip(offset).take(width).collect();

    frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.user)), input_area);
    frame.set_cursor_position((input_area.x + (cursor - offset) as u16, input_area.y));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::config::Config;
    use crate::voice::NoDictation;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (reply_tx, _) = mpsc::unbounded_channel();
        let (dictation_tx, _) = mpsc::unbounded_channel();
        App::with_parts(
            &Config::default(),
            Arc::new(SimulatedBackend::new(Duration::from_secs(1))),
            Box::new(NoDictation),
            reply_tx,
            dictation_tx,
        )
    }

    fn draw(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("a **b");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "a **b");
    }

    #[test]
    fn test_initial_screen() {
        let mut app = test_app();
        let screen = draw(&mut app, 100, 30);

        assert!(screen.contains(TITLE));
        assert!(screen.contains("Welcome to Guided Operations"));
        assert!(screen.contains("Documentation.pdf"));
        assert!(screen.contains("User Guide.pdf"));
        assert!(app.thread_area.is_some());
    }

    #[test]
    fn test_collapsed_sidebar_hides_documents() {
        let mut app = test_app();
        app.toggle_sidebar();
        let screen = draw(&mut app, 100, 30);
        assert!(!screen.contains("Documentation.pdf"));
        assert_eq!(app.sidebar_area.unwrap().width, SIDEBAR_COLLAPSED_WIDTH);
    }

    #[tokio::test]
    async fn test_pending_shows_thinking() {
        let mut app = test_app();
        app.conversation.draft.set("What is the refund policy?");
        app.submit();

        let screen = draw(&mut app, 100, 30);
        assert!(screen.contains("You:"));
        assert!(screen.contains("What is the refund policy?"));
        assert!(screen.contains("Thinking."));
        assert!(!screen.contains("Welcome to Guided Operations"));
    }

    #[test]
    fn test_notification_and_upload_prompt() {
        let mut app = test_app();
        app.notify(NoticeLevel::Error, "cannot upload notes.txt");
        app.open_upload_prompt();

        let screen = draw(&mut app, 100, 30);
        assert!(screen.contains("cannot upload notes.txt"));
        assert!(screen.contains("Upload PDF"));
        assert!(screen.contains("Enter to upload"));
    }

    #[test]
    fn test_tiny_terminal_does_not_panic() {
        let mut app = test_app();
        app.open_upload_prompt();
        draw(&mut app, 10, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_reply_scrolls_to_last_word() {
        let reply = format!("{}ENDMARK", "abcdefghijklm ".repeat(60));
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let (dictation_tx, _) = mpsc::unbounded_channel();
        let mut app = App::with_parts(
            &Config::default(),
            Arc::new(SimulatedBackend::with_reply(Duration::from_millis(10), reply)),
            Box::new(NoDictation),
            reply_tx,
            dictation_tx,
        );

        app.conversation.draft.set("Tell me everything");
        app.submit();
        app.apply_reply(reply_rx.recv().await.unwrap());

        let screen = draw(&mut app, 80, 24);
        assert!(screen.contains("ENDMARK"), "{screen}");

        app.scroll_thread_up(1000);
        let screen = draw(&mut app, 80, 24);
        assert!(!screen.contains("ENDMARK"));

        app.scroll_thread_down(1000);
        let screen = draw(&mut app, 80, 24);
        assert!(screen.contains("ENDMARK"), "{screen}");
    }
}
