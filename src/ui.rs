use ratatui::{
    prelude::*,
    style::Style,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::config::{ENV_API_BASE, ENV_BACKEND_URL};
use crate::editor::{EditorDraft, Field};
use crate::state::{AppState, Mode};
use crate::toast::ToastKind;

const COLOR_SAND: Color = Color::Rgb(0xEB, 0xDB, 0xB2);
const COLOR_OLIVE: Color = Color::Rgb(0x98, 0x97, 0x1A);
const COLOR_MOSS: Color = Color::Rgb(0x67, 0x67, 0x1C);
const COLOR_RUST: Color = Color::Rgb(0xCC, 0x24, 0x1D);
const COLOR_AMBER: Color = Color::Rgb(0xD7, 0x99, 0x21);
const TOAST_WIDTH: u16 = 42;
const TOAST_HEIGHT: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    List,
    Editor,
}

pub struct NotesView<'a> {
    pub state: &'a AppState,
    pub draft: &'a EditorDraft,
    pub focus: Pane,
    pub api_base: &'a str,
    pub delete_overlay: Option<String>,
    pub quit_overlay: bool,
    pub status: String,
}

#[derive(Clone, Copy)]
struct OverlayTheme {
    border: Color,
    title: Color,
    text: Color,
    bg: Color,
}

fn themed_overlay(title: &str) -> OverlayTheme {
    match title {
        "Confirm delete" => OverlayTheme {
            border: Color::Rgb(0xB3, 0x88, 0x45),
            title: Color::Rgb(0xF0, 0xD8, 0xA8),
            text: COLOR_SAND,
            bg: Color::Rgb(0x2A, 0x1C, 0x11),
        },
        "Confirm quit" => OverlayTheme {
            border: Color::Rgb(0xA7, 0xA2, 0x36),
            title: Color::Rgb(0xE6, 0xD8, 0xB2),
            text: COLOR_SAND,
            bg: Color::Rgb(0x25, 0x24, 0x13),
        },
        _ => OverlayTheme {
            border: COLOR_MOSS,
            title: COLOR_SAND,
            text: COLOR_SAND,
            bg: Color::Rgb(0x1E, 0x20, 0x12),
        },
    }
}

fn centered_overlay_area(frame_size: Rect, lines: &[String]) -> Rect {
    let widest = lines.iter().map(|s| s.chars().count()).max().unwrap_or(0);
    let maxw = u16::try_from(widest).unwrap_or(u16::MAX).saturating_add(4);
    let maxh = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    Rect::new(
        (frame_size.width.saturating_sub(maxw)) / 2,
        (frame_size.height.saturating_sub(maxh)) / 2,
        maxw.min(frame_size.width),
        maxh.min(frame_size.height),
    )
}

fn render_overlay(f: &mut Frame<'_>, lines: &[String], title: &str) {
    let area = centered_overlay_area(f.size(), lines);
    let theme = themed_overlay(title);
    let paragraph = Paragraph::new(
        lines
            .iter()
            .map(|l| Line::from(l.as_str()))
            .collect::<Vec<Line>>(),
    )
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                title,
                Style::default()
                    .fg(theme.title)
                    .add_modifier(Modifier::BOLD),
            ))
            .border_style(
                Style::default()
                    .fg(theme.border)
                    .add_modifier(Modifier::BOLD),
            )
            .style(Style::default().bg(theme.bg)),
    );
    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

/// Advisory shown while the last network-classified operation failed.
pub fn reachability_message(api_base: &str) -> String {
    let base = if api_base.is_empty() {
        "(same origin)"
    } else {
        api_base
    };
    format!(
        "Backend not reachable. This client expects a backend API at {base}/notes. \
         Start the backend service or set {ENV_API_BASE} (or {ENV_BACKEND_URL})."
    )
}

pub fn note_preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        "—".to_string()
    } else {
        trimmed.lines().next().unwrap_or_default().to_string()
    }
}

pub fn draw_notes(f: &mut Frame<'_>, view: &NotesView) {
    let state = view.state;
    let mut constraints = Vec::new();
    if !state.reachable {
        constraints.push(Constraint::Length(3));
    }
    if state.error_banner.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(1));
    constraints.push(Constraint::Length(3));
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.size());

    let mut row = 0;
    if !state.reachable {
        let banner = Paragraph::new(reachability_message(view.api_base))
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(COLOR_AMBER))
            .block(Block::default().borders(Borders::ALL).title("Warning"));
        f.render_widget(banner, layout[row]);
        row += 1;
    }
    if let Some(message) = &state.error_banner {
        let banner = Paragraph::new(message.as_str())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(COLOR_RUST).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL).title("Error"));
        f.render_widget(banner, layout[row]);
        row += 1;
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(layout[row]);

    draw_list(f, body[0], view);
    draw_editor(f, body[1], view);

    let footer = Paragraph::new(view.status.clone()).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, layout[row + 1]);

    draw_toasts(f, state);

    if let Some(msg) = &view.delete_overlay {
        let text = vec![msg.clone(), "".to_string(), "[y] Yes   [n] No".to_string()];
        render_overlay(f, &text, "Confirm delete");
    }

    if view.quit_overlay {
        let text = vec!["Quit?".to_string(), "".to_string(), "[y] Yes   [n] No".to_string()];
        render_overlay(f, &text, "Confirm quit");
    }
}

fn pane_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(COLOR_OLIVE).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn draw_list(f: &mut Frame<'_>, area: Rect, view: &NotesView) {
    let state = view.state;
    let block = Block::default()
        .title(format!("Notes ({} total)", state.notes.len()))
        .borders(Borders::ALL)
        .border_style(pane_border(view.focus == Pane::List));

    if state.is_loading && !state.has_loaded {
        let loading = Paragraph::new("Loading notes…").block(block);
        f.render_widget(loading, area);
        return;
    }
    if state.notes.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(Span::styled(
                "No notes yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Create your first note to get started."),
        ])
        .wrap(Wrap { trim: true })
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = state
        .notes
        .iter()
        .map(|n| {
            ListItem::new(vec![
                Line::from(Span::styled(
                    n.display_title().to_string(),
                    Style::default().fg(COLOR_SAND),
                )),
                Line::from(Span::styled(
                    note_preview(&n.content),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(state.selected_index());
    let list = List::new(items)
        .block(block)
        .highlight_symbol("▶ ")
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Rgb(40, 40, 40))
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_editor(f: &mut Frame<'_>, area: Rect, view: &NotesView) {
    let state = view.state;
    let focused = view.focus == Pane::Editor;
    let mode = state.editor_mode();

    if mode == Mode::Empty {
        let card = Paragraph::new(vec![
            Line::from(Span::styled(
                "Select a note",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Choose a note from the list, or create a new one."),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title("Editor")
                .borders(Borders::ALL)
                .border_style(pane_border(focused)),
        );
        f.render_widget(card, area);
        return;
    }

    let (heading, subtitle) = match (mode, state.selected_note()) {
        (Mode::Edit, Some(note)) => ("Edit note", format!("Editing note #{}", note.id)),
        _ => ("New note", "Draft a new note.".to_string()),
    };

    let outer = Block::default()
        .title(heading)
        .borders(Borders::ALL)
        .border_style(pane_border(focused));
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(inner);

    let save_label = if state.is_saving() { "Saving…" } else { "Ctrl+S Save" };
    let save_style = if view.draft.can_save() && !state.is_saving() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let header = Paragraph::new(vec![
        Line::from(subtitle),
        Line::from(vec![
            Span::styled(save_label, save_style),
            Span::raw("   Esc Cancel   Ctrl+E $EDITOR"),
        ]),
    ]);
    f.render_widget(header, rows[0]);

    let field_style = |field: Field| {
        if focused && view.draft.focus == field {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let title = Paragraph::new(view.draft.title.as_str()).block(
        Block::default()
            .title("Title")
            .borders(Borders::ALL)
            .border_style(field_style(Field::Title)),
    );
    f.render_widget(title, rows[1]);

    let content = Paragraph::new(view.draft.content.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Content")
                .borders(Borders::ALL)
                .border_style(field_style(Field::Content)),
        );
    f.render_widget(content, rows[2]);
}

fn draw_toasts(f: &mut Frame<'_>, state: &AppState) {
    let size = f.size();
    let width = TOAST_WIDTH.min(size.width);
    let x = size.width.saturating_sub(width + 1);
    for (idx, toast) in state.toasts.iter().enumerate() {
        let y = 1 + idx as u16 * TOAST_HEIGHT;
        if y + TOAST_HEIGHT > size.height {
            break;
        }
        let area = Rect::new(x, y, width, TOAST_HEIGHT);
        let color = match toast.kind {
            ToastKind::Success => Color::Green,
            ToastKind::Error => COLOR_RUST,
        };
        let widget = Paragraph::new(toast.message.as_str())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(COLOR_SAND).bg(Color::Rgb(0x1E, 0x20, 0x12)))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(
                        toast.title.as_str(),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ))
                    .border_style(Style::default().fg(color)),
            );
        f.render_widget(Clear, area);
        f.render_widget(widget, area);
    }
}
