use std::collections::HashSet;
use std::time::Instant;

use tracing::{info, warn};

use crate::client::ApiError;
use crate::models::{sort_notes, Note, NoteDraft, NoteId};
use crate::toast::{Toast, ToastQueue};

pub const IN_FLIGHT_MESSAGE: &str = "A change to this note is still in flight.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Empty,
    Create,
    Edit,
}

/// What must be undone if the store rejects a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    Create,
    Update { snapshot: Option<Note> },
    Delete { snapshot: Vec<Note>, was_selected: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    /// `None` only for creates.
    pub target: Option<NoteId>,
    pub kind: MutationKind,
}

/// Work for the store, carrying whatever is needed to finish the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Load,
    Probe,
    Save { pending: PendingMutation, draft: NoteDraft },
    Delete { pending: PendingMutation },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Loaded(Result<Vec<Note>, ApiError>),
    Probed(bool),
    Saved(PendingMutation, Result<Note, ApiError>),
    Deleted(PendingMutation, Result<(), ApiError>),
}

/// The latest update the store confirmed. `replaced` is the local value its
/// answer overwrote, so the editor can tell whether the form still holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub seq: u64,
    pub id: NoteId,
    pub replaced: NoteDraft,
}

#[derive(Debug)]
pub struct AppState {
    pub notes: Vec<Note>,
    pub selected_id: Option<NoteId>,
    pub mode: Mode,
    pub is_loading: bool,
    pub has_loaded: bool,
    pub error_banner: Option<String>,
    pub reachable: bool,
    pub toasts: ToastQueue,
    saves_in_flight: usize,
    in_flight: HashSet<NoteId>,
    reconciled: Option<Reconciled>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            selected_id: None,
            mode: Mode::Empty,
            is_loading: false,
            has_loaded: false,
            error_banner: None,
            reachable: true,
            toasts: ToastQueue::default(),
            saves_in_flight: 0,
            in_flight: HashSet::new(),
            reconciled: None,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_saving(&self) -> bool {
        self.saves_in_flight > 0
    }

    pub fn last_reconciled(&self) -> Option<&Reconciled> {
        self.reconciled.as_ref()
    }

    pub fn selected_note(&self) -> Option<&Note> {
        let id = self.selected_id.as_ref()?;
        self.notes.iter().find(|n| &n.id == id)
    }

    pub fn selected_index(&self) -> Option<usize> {
        let id = self.selected_id.as_ref()?;
        self.notes.iter().position(|n| &n.id == id)
    }

    /// Mode as the editor should render it: an edit whose note vanished shows
    /// the empty card.
    pub fn editor_mode(&self) -> Mode {
        match self.mode {
            Mode::Create => Mode::Create,
            _ if self.selected_note().is_some() => Mode::Edit,
            _ => Mode::Empty,
        }
    }

    pub fn begin_load(&mut self) -> Request {
        self.is_loading = true;
        self.error_banner = None;
        Request::Load
    }

    pub fn create_new(&mut self) {
        self.selected_id = None;
        self.mode = Mode::Create;
        self.error_banner = None;
    }

    pub fn select(&mut self, id: NoteId) {
        self.selected_id = Some(id);
        self.mode = Mode::Edit;
        self.error_banner = None;
    }

    /// Moves the selection up or down the list, clamped to its ends.
    pub fn select_offset(&mut self, delta: isize) {
        if self.notes.is_empty() {
            return;
        }
        let last = self.notes.len() - 1;
        let next = match self.selected_index() {
            Some(idx) => idx.saturating_add_signed(delta).min(last),
            None => 0,
        };
        let id = self.notes[next].id.clone();
        self.select(id);
    }

    pub fn cancel(&mut self) {
        if self.selected_id.is_some() {
            self.mode = Mode::Edit;
        } else if let Some(first) = self.notes.first() {
            self.selected_id = Some(first.id.clone());
            self.mode = Mode::Edit;
        } else {
            self.mode = Mode::Empty;
        }
    }

    /// Starts a save of the editor's draft. Returns `None` when nothing may be
    /// sent: a blank draft, or a note that already has a change in flight.
    pub fn begin_save(&mut self, draft: &NoteDraft) -> Option<Request> {
        if draft.is_blank() {
            return None;
        }
        self.error_banner = None;
        let trimmed = draft.trimmed();

        let target = match (&self.mode, &self.selected_id) {
            (Mode::Edit, Some(id)) => Some(id.clone()),
            _ => None,
        };

        let pending = match target {
            Some(id) => {
                if self.in_flight.contains(&id) {
                    self.error_banner = Some(IN_FLIGHT_MESSAGE.to_string());
                    return None;
                }
                let snapshot = self.notes.iter().find(|n| n.id == id).cloned();
                if let Some(local) = self.notes.iter_mut().find(|n| n.id == id) {
                    local.title = trimmed.title.clone();
                    local.content = trimmed.content.clone();
                }
                self.in_flight.insert(id.clone());
                PendingMutation {
                    target: Some(id),
                    kind: MutationKind::Update { snapshot },
                }
            }
            None => PendingMutation {
                target: None,
                kind: MutationKind::Create,
            },
        };

        self.saves_in_flight += 1;
        Some(Request::Save {
            pending,
            draft: trimmed,
        })
    }

    /// Optimistically removes a note. Returns `None` if the note is unknown or
    /// already has a change in flight.
    pub fn begin_delete(&mut self, id: &NoteId) -> Option<Request> {
        self.error_banner = None;
        if self.in_flight.contains(id) {
            self.error_banner = Some(IN_FLIGHT_MESSAGE.to_string());
            return None;
        }
        if !self.notes.iter().any(|n| &n.id == id) {
            return None;
        }

        let snapshot = self.notes.clone();
        let was_selected = self.selected_id.as_ref() == Some(id);

        self.notes.retain(|n| &n.id != id);
        if was_selected {
            self.move_selection_to_first();
        }

        self.in_flight.insert(id.clone());
        Some(Request::Delete {
            pending: PendingMutation {
                target: Some(id.clone()),
                kind: MutationKind::Delete {
                    snapshot,
                    was_selected,
                },
            },
        })
    }

    pub fn apply(&mut self, completion: Completion, now: Instant) {
        match completion {
            Completion::Loaded(result) => self.finish_load(result),
            Completion::Probed(ok) => self.reachable = ok,
            Completion::Saved(pending, result) => self.finish_save(pending, result, now),
            Completion::Deleted(pending, result) => self.finish_delete(pending, result, now),
        }
    }

    fn finish_load(&mut self, result: Result<Vec<Note>, ApiError>) {
        match result {
            Ok(notes) => {
                self.notes = sort_notes(notes);
                info!(count = self.notes.len(), "notes loaded");
                if self.selected_note().is_none() {
                    self.move_selection_to_first();
                }
                self.reachable = true;
                self.has_loaded = true;
            }
            Err(e) => {
                warn!(error = %e, "loading notes failed");
                self.record_failure(&e);
            }
        }
        self.is_loading = false;
    }

    fn finish_save(&mut self, pending: PendingMutation, result: Result<Note, ApiError>, now: Instant) {
        self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
        if let Some(id) = &pending.target {
            self.in_flight.remove(id);
        }

        match (pending.kind, result) {
            (MutationKind::Update { .. }, Ok(updated)) => {
                if let Some(target) = &pending.target {
                    if let Some(local) = self.notes.iter_mut().find(|n| &n.id == target) {
                        let replaced = NoteDraft::new(&local.title, &local.content);
                        *local = updated;
                        let seq = self.reconciled.as_ref().map_or(0, |r| r.seq) + 1;
                        self.reconciled = Some(Reconciled {
                            seq,
                            id: target.clone(),
                            replaced,
                        });
                    }
                }
                info!(id = ?pending.target, "note updated");
                self.reachable = true;
                self.toasts
                    .push(Toast::success("Saved", "Note updated successfully."), now);
            }
            (MutationKind::Create, Ok(created)) => {
                info!(id = %created.id, "note created");
                self.selected_id = Some(created.id.clone());
                self.mode = Mode::Edit;
                self.notes.insert(0, created);
                self.reachable = true;
                self.toasts
                    .push(Toast::success("Created", "Note created successfully."), now);
            }
            (kind, Err(e)) => {
                warn!(id = ?pending.target, error = %e, "saving note failed");
                if let MutationKind::Update {
                    snapshot: Some(previous),
                } = kind
                {
                    if let Some(local) = self.notes.iter_mut().find(|n| n.id == previous.id) {
                        *local = previous;
                    }
                }
                self.record_failure(&e);
                self.toasts.push(Toast::error("Error", &e.to_string()), now);
            }
            (MutationKind::Delete { .. }, Ok(_)) => {}
        }
    }

    fn finish_delete(&mut self, pending: PendingMutation, result: Result<(), ApiError>, now: Instant) {
        if let Some(id) = &pending.target {
            self.in_flight.remove(id);
        }

        match result {
            Ok(()) => {
                info!(id = ?pending.target, "note deleted");
                self.reachable = true;
                self.toasts.push(Toast::success("Deleted", "Note deleted."), now);
            }
            Err(e) => {
                warn!(id = ?pending.target, error = %e, "deleting note failed");
                if let MutationKind::Delete {
                    snapshot,
                    was_selected,
                } = pending.kind
                {
                    self.notes = snapshot;
                    if was_selected {
                        self.selected_id = pending.target;
                        self.mode = Mode::Edit;
                    }
                }
                self.record_failure(&e);
                self.toasts.push(Toast::error("Error", &e.to_string()), now);
            }
        }
    }

    fn record_failure(&mut self, error: &ApiError) {
        self.reachable = !error.is_network();
        self.error_banner = Some(error.to_string());
    }

    fn move_selection_to_first(&mut self) {
        match self.notes.first() {
            Some(first) => {
                self.selected_id = Some(first.id.clone());
                self.mode = Mode::Edit;
            }
            None => {
                self.selected_id = None;
                self.mode = Mode::Empty;
            }
        }
    }
}
