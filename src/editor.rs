use std::fs;
use std::io::Write;
use std::process::Command;

use anyhow::{anyhow, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tempfile::NamedTempFile;

use crate::models::{Note, NoteDraft, NoteId};
use crate::state::{Mode, Reconciled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    Title,
    Content,
}

/// What a key press in the editor asks the app to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    None,
    Save,
    Cancel,
    OpenExternal,
    Leave,
}

/// Form fields owned by the editor pane. Rollbacks never touch this.
#[derive(Debug, Default)]
pub struct EditorDraft {
    pub title: String,
    pub content: String,
    pub focus: Field,
    seeded_for: Option<(Mode, Option<NoteId>)>,
    seeded_from: Option<Note>,
    seen_reconcile: u64,
}

impl EditorDraft {
    pub fn can_save(&self) -> bool {
        !self.as_draft().is_blank()
    }

    pub fn as_draft(&self) -> NoteDraft {
        NoteDraft::new(&self.title, &self.content)
    }

    /// Re-seeds the fields when the editor switches target, when the store
    /// confirmed the text the form still holds, or when the note under edit
    /// changed underneath an untouched form.
    pub fn sync(&mut self, mode: Mode, note: Option<&Note>, reconciled: Option<&Reconciled>) {
        let confirmed = match reconciled {
            Some(r) if r.seq != self.seen_reconcile => {
                self.seen_reconcile = r.seq;
                note.is_some_and(|n| n.id == r.id) && self.as_draft().trimmed() == r.replaced
            }
            _ => false,
        };
        let key = (mode, note.map(|n| n.id.clone()));
        let retarget = self.seeded_for.as_ref() != Some(&key);
        let untouched = self
            .seeded_from
            .as_ref()
            .map(|n| n.title == self.title && n.content == self.content)
            .unwrap_or(false);
        let source_changed = note != self.seeded_from.as_ref();

        if retarget || confirmed || (untouched && source_changed) {
            self.title = note.map(|n| n.title.clone()).unwrap_or_default();
            self.content = note.map(|n| n.content.clone()).unwrap_or_default();
            if retarget {
                self.focus = Field::Title;
            }
            self.seeded_for = Some(key);
            self.seeded_from = note.cloned();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> EditorAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => EditorAction::Save,
            KeyCode::Char('e') if ctrl => EditorAction::OpenExternal,
            KeyCode::Esc => EditorAction::Cancel,
            KeyCode::BackTab => EditorAction::Leave,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Field::Title => Field::Content,
                    Field::Content => Field::Title,
                };
                EditorAction::None
            }
            KeyCode::Enter => {
                match self.focus {
                    Field::Title => self.focus = Field::Content,
                    Field::Content => self.content.push('\n'),
                }
                EditorAction::None
            }
            KeyCode::Backspace => {
                self.focused_mut().pop();
                EditorAction::None
            }
            KeyCode::Char(c) if !ctrl => {
                self.focused_mut().push(c);
                EditorAction::None
            }
            _ => EditorAction::None,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Title => &mut self.title,
            Field::Content => &mut self.content,
        }
    }
}

/// Round-trips the content through `$EDITOR`. `Ok(None)` when the editor
/// exits unsuccessfully. The caller owns the terminal mode switch.
pub fn edit_in_external_editor(content: &str) -> Result<Option<String>> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = Command::new(&editor)
        .arg(file.path())
        .status()
        .map_err(|e| anyhow!("Failed to launch editor '{editor}': {e}"))?;
    if !status.success() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(file.path())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(draft: &mut EditorDraft, code: KeyCode) -> EditorAction {
        draft.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(draft: &mut EditorDraft, text: &str) {
        for c in text.chars() {
            press(draft, KeyCode::Char(c));
        }
    }

    #[test]
    fn typing_fills_focused_field() {
        let mut draft = EditorDraft::default();
        type_text(&mut draft, "Plan");
        press(&mut draft, KeyCode::Enter);
        type_text(&mut draft, "one");
        press(&mut draft, KeyCode::Enter);
        type_text(&mut draft, "twoo");
        press(&mut draft, KeyCode::Backspace);
        assert_eq!(draft.title, "Plan");
        assert_eq!(draft.content, "one\ntwo");
    }

    #[test]
    fn save_is_disabled_for_whitespace_only() {
        let mut draft = EditorDraft::default();
        type_text(&mut draft, "   ");
        assert!(!draft.can_save());
        press(&mut draft, KeyCode::Tab);
        type_text(&mut draft, "x");
        assert!(draft.can_save());
    }

    #[test]
    fn control_keys_map_to_actions() {
        let mut draft = EditorDraft::default();
        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(draft.handle_key(ctrl_s), EditorAction::Save);
        assert_eq!(press(&mut draft, KeyCode::Esc), EditorAction::Cancel);
        assert_eq!(draft.title, "");
    }

    #[test]
    fn sync_reseeds_only_on_retarget_or_untouched_change() {
        let mut draft = EditorDraft::default();
        let note = Note::new("1", "A", "a");
        draft.sync(Mode::Edit, Some(&note), None);
        assert_eq!(draft.title, "A");

        // Server normalized the note while the form was untouched.
        let normalized = Note::new("1", "A!", "a");
        draft.sync(Mode::Edit, Some(&normalized), None);
        assert_eq!(draft.title, "A!");

        // Typed text survives a rollback of the list data.
        type_text(&mut draft, "?");
        draft.sync(Mode::Edit, Some(&note), None);
        assert_eq!(draft.title, "A!?");

        draft.sync(Mode::Create, None, None);
        assert_eq!(draft.title, "");
        assert_eq!(draft.content, "");
    }

    #[test]
    fn confirmed_save_reseeds_unless_typing_continued() {
        let mut draft = EditorDraft::default();
        draft.sync(Mode::Edit, Some(&Note::new("1", "A", "a")), None);
        draft.title = "  B ".into();

        let confirmed = Reconciled {
            seq: 1,
            id: NoteId::new("1"),
            replaced: NoteDraft::new("B", "a"),
        };
        let server = Note::new("1", "B (server)", "a");
        draft.sync(Mode::Edit, Some(&server), Some(&confirmed));
        assert_eq!(draft.title, "B (server)");

        // A later reload reaches the untouched form.
        draft.sync(Mode::Edit, Some(&Note::new("1", "C", "z")), Some(&confirmed));
        assert_eq!(draft.title, "C");
        assert_eq!(draft.content, "z");

        // Text typed after the save went out is kept.
        draft.title = "C more".into();
        let again = Reconciled {
            seq: 2,
            id: NoteId::new("1"),
            replaced: NoteDraft::new("C", "z"),
        };
        draft.sync(Mode::Edit, Some(&Note::new("1", "C!", "z")), Some(&again));
        assert_eq!(draft.title, "C more");
    }
}
