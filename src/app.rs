use std::io::Stdout;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};

use crate::client::HttpNotesClient;
use crate::config::{default_log_path, load_config, resolve_api_base, ApiBase};
use crate::dispatch::Dispatcher;
use crate::editor::{edit_in_external_editor, EditorAction, EditorDraft};
use crate::logging;
use crate::models::NoteId;
use crate::state::{AppState, Completion, Mode, Request};
use crate::ui::{draw_notes, NotesView, Pane};

const TICK: Duration = Duration::from_millis(100);
const STATUS_MESSAGE_SECS: u64 = 2;
const LIST_NAV_HINT: &str =
    "↑/↓ select | Enter edit | n new | d delete | r refresh | x dismiss | Esc quit";
const EDITOR_NAV_HINT: &str =
    "Tab switch field | Ctrl+S save | Ctrl+E $EDITOR | Shift+Tab list | Esc cancel";

type Tui = Terminal<CrosstermBackend<Stdout>>;

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    api_base: Option<String>,
    log_file: Option<PathBuf>,
    show_version: bool,
    show_help: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => parsed.show_version = true,
            "--help" | "-h" => parsed.show_help = true,
            "--api-base" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--api-base requires a URL"))?;
                parsed.api_base = Some(value);
            }
            "--log-file" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--log-file requires a path"))?;
                parsed.log_file = Some(PathBuf::from(value));
            }
            other => return Err(anyhow!("Unknown argument: {other}")),
        }
    }
    Ok(parsed)
}

pub fn run() -> Result<()> {
    let bin_name = executable_name();
    let args = parse_args(std::env::args().skip(1))?;
    if args.show_version {
        println!("{bin_name} v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.show_help {
        print_usage(&bin_name);
        return Ok(());
    }

    let cfg = load_config()?;
    let log_path = match args.log_file.clone().or_else(|| cfg.log_file.clone()) {
        Some(path) => path,
        None => default_log_path()?,
    };
    logging::init(&log_path)?;

    let api_base = resolve_api_base(args.api_base.as_deref(), |key| std::env::var(key).ok(), &cfg);
    info!(
        api_base = api_base.effective(),
        log = %log_path.display(),
        "starting notes client"
    );

    let client = HttpNotesClient::new(api_base.effective());
    let (dispatcher, completions) = Dispatcher::new(Arc::new(client));

    let result = run_tui_notes(&dispatcher, &completions, &api_base);
    if let Err(e) = &result {
        error!(error = %e, "notes client exited with an error");
    }
    result
}

struct Screen {
    state: AppState,
    draft: EditorDraft,
    focus: Pane,
    delete_target: Option<NoteId>,
    delete_overlay: Option<String>,
    quit_overlay: bool,
    status: Option<(String, Instant)>,
}

impl Screen {
    fn new() -> Self {
        Self {
            state: AppState::new(),
            draft: EditorDraft::default(),
            focus: Pane::List,
            delete_target: None,
            delete_overlay: None,
            quit_overlay: false,
            status: None,
        }
    }

    fn flash(&mut self, message: impl Into<String>) {
        self.status = Some((
            message.into(),
            Instant::now() + Duration::from_secs(STATUS_MESSAGE_SECS),
        ));
    }

    fn status_line(&self) -> String {
        match &self.status {
            Some((message, _)) => message.clone(),
            None if self.focus == Pane::Editor => EDITOR_NAV_HINT.to_string(),
            None => LIST_NAV_HINT.to_string(),
        }
    }

    fn tick(&mut self, completions: &Receiver<Completion>) {
        let now = Instant::now();
        while let Ok(completion) = completions.try_recv() {
            self.state.apply(completion, now);
        }
        self.state.toasts.expire(now);
        if matches!(&self.status, Some((_, until)) if now >= *until) {
            self.status = None;
        }
        if self.state.editor_mode() == Mode::Empty {
            self.focus = Pane::List;
        }
        self.draft.sync(
            self.state.editor_mode(),
            self.state.selected_note(),
            self.state.last_reconciled(),
        );
    }

    fn dismiss_toast(&mut self) {
        let first = self.state.toasts.iter().next().map(|t| t.id.clone());
        if let Some(id) = first {
            self.state.toasts.remove(&id);
        }
    }
}

fn run_tui_notes(
    dispatcher: &Dispatcher,
    completions: &Receiver<Completion>,
    api_base: &ApiBase,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut screen = Screen::new();
    dispatcher.submit(screen.state.begin_load());
    dispatcher.submit(Request::Probe);

    let result = (|| -> Result<()> {
        loop {
            screen.tick(completions);

            terminal.draw(|f| {
                let view = NotesView {
                    state: &screen.state,
                    draft: &screen.draft,
                    focus: screen.focus,
                    api_base: api_base.configured(),
                    delete_overlay: screen.delete_overlay.clone(),
                    quit_overlay: screen.quit_overlay,
                    status: screen.status_line(),
                };
                draw_notes(f, &view);
            })?;

            if !event::poll(TICK)? {
                continue;
            }
            let key = match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => key,
                _ => continue,
            };

            if screen.quit_overlay {
                match key.code {
                    KeyCode::Char('y') => break,
                    KeyCode::Char('n') | KeyCode::Esc => screen.quit_overlay = false,
                    _ => {}
                }
                continue;
            }
            if screen.delete_overlay.is_some() {
                handle_delete_confirm(&mut screen, key.code, dispatcher);
                continue;
            }
            match screen.focus {
                Pane::List => handle_list_key(&mut screen, key, dispatcher),
                Pane::Editor => handle_editor_key(&mut screen, key, dispatcher, &mut terminal)?,
            }
        }
        Ok(())
    })();

    teardown_terminal(&mut terminal);
    result
}

fn handle_delete_confirm(screen: &mut Screen, code: KeyCode, dispatcher: &Dispatcher) {
    match code {
        KeyCode::Char('y') => {
            if let Some(id) = screen.delete_target.take() {
                if let Some(request) = screen.state.begin_delete(&id) {
                    dispatcher.submit(request);
                    screen.flash("Deleting note…");
                }
            }
            screen.delete_overlay = None;
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            screen.delete_overlay = None;
            screen.delete_target = None;
            screen.flash("Delete cancelled");
        }
        _ => {}
    }
}

fn handle_list_key(screen: &mut Screen, key: KeyEvent, dispatcher: &Dispatcher) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => screen.quit_overlay = true,
        KeyCode::Up => screen.state.select_offset(-1),
        KeyCode::Down => screen.state.select_offset(1),
        KeyCode::Enter | KeyCode::Right | KeyCode::Tab => {
            if screen.state.editor_mode() != Mode::Empty {
                screen.focus = Pane::Editor;
            }
        }
        KeyCode::Char('n') => {
            screen.state.create_new();
            screen.focus = Pane::Editor;
        }
        KeyCode::Char('x') => screen.dismiss_toast(),
        KeyCode::Char('r') => {
            dispatcher.submit(screen.state.begin_load());
            screen.flash("Refreshing notes…");
        }
        KeyCode::Char('d') => {
            if let Some(note) = screen.state.selected_note() {
                screen.delete_overlay = Some(format!("Delete note: {}?", note.display_title()));
                screen.delete_target = Some(note.id.clone());
            }
        }
        _ => {}
    }
}

fn handle_editor_key(
    screen: &mut Screen,
    key: KeyEvent,
    dispatcher: &Dispatcher,
    terminal: &mut Tui,
) -> Result<()> {
    match screen.draft.handle_key(key) {
        EditorAction::None => {}
        EditorAction::Save => {
            if screen.state.is_saving() {
                screen.flash("Still saving…");
            } else if !screen.draft.can_save() {
                screen.flash("Nothing to save");
            } else if let Some(request) = screen.state.begin_save(&screen.draft.as_draft()) {
                dispatcher.submit(request);
            }
        }
        EditorAction::Cancel => {
            screen.state.cancel();
            screen.focus = Pane::List;
        }
        EditorAction::Leave => screen.focus = Pane::List,
        EditorAction::OpenExternal => {
            let edited = with_terminal_suspended(terminal, || {
                edit_in_external_editor(&screen.draft.content)
            })?;
            match edited {
                Ok(Some(content)) => screen.draft.content = content,
                Ok(None) => screen.flash("Editor cancelled"),
                Err(e) => screen.flash(format!("{e}")),
            }
        }
    }
    Ok(())
}

/// Hands the terminal to a child process for the duration of `f`.
fn with_terminal_suspended<T>(terminal: &mut Tui, f: impl FnOnce() -> T) -> Result<T> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();

    let out = f();

    execute!(terminal.backend_mut(), EnterAlternateScreen, Hide).ok();
    enable_raw_mode().ok();
    terminal.clear()?;
    Ok(out)
}

fn teardown_terminal(terminal: &mut Tui) {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();
    terminal.show_cursor().ok();
}

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} [OPTIONS]");
    eprintln!("      --api-base <URL>    Notes API base URL (default: $NOTEDECK_API_BASE, $NOTEDECK_BACKEND_URL, config file)");
    eprintln!("      --log-file <PATH>   Write logs here instead of the default data directory");
    eprintln!("  -h, --help              Show this help");
    eprintln!("  -V, --version           Show version and exit");
}

fn executable_name() -> String {
    let fallback = "notedeck".to_string();
    let arg0 = match std::env::args().next() {
        Some(v) => v,
        None => return fallback,
    };
    let path = Path::new(&arg0);
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => fallback,
    }
}
