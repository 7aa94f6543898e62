use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::client::{check_reachable, NotesApi};
use crate::state::{Completion, MutationKind, Request};

/// Runs one request against the store, blocking the calling thread.
pub fn execute(api: &dyn NotesApi, request: Request) -> Completion {
    match request {
        Request::Load => Completion::Loaded(api.list()),
        Request::Probe => Completion::Probed(check_reachable(api)),
        Request::Save { pending, draft } => {
            let result = match (&pending.kind, &pending.target) {
                (MutationKind::Update { .. }, Some(id)) => api.update(id, &draft),
                _ => api.create(&draft),
            };
            Completion::Saved(pending, result)
        }
        Request::Delete { pending } => {
            let result = match &pending.target {
                Some(id) => api.delete(id),
                None => Ok(()),
            };
            Completion::Deleted(pending, result)
        }
    }
}

/// Moves store calls off the UI thread; results come back on the receiver.
pub struct Dispatcher {
    api: Arc<dyn NotesApi>,
    tx: Sender<Completion>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn NotesApi>) -> (Self, Receiver<Completion>) {
        let (tx, rx) = mpsc::channel();
        (Self { api, tx }, rx)
    }

    pub fn submit(&self, request: Request) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let completion = execute(api.as_ref(), request);
            if tx.send(completion).is_err() {
                debug!("completion dropped; event loop has exited");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::client::ApiError;
    use crate::models::{Note, NoteDraft, NoteId};
    use crate::state::{AppState, Mode};

    #[derive(Default)]
    struct FakeApi {
        notes: Vec<Note>,
        fail_writes: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn write_result<T>(&self, ok: T) -> Result<T, ApiError> {
            if self.fail_writes {
                Err(ApiError::Application {
                    status: 409,
                    message: "conflict".into(),
                })
            } else {
                Ok(ok)
            }
        }
    }

    impl NotesApi for FakeApi {
        fn list(&self) -> Result<Vec<Note>, ApiError> {
            self.record("list".into());
            Ok(self.notes.clone())
        }

        fn create(&self, draft: &NoteDraft) -> Result<Note, ApiError> {
            self.record(format!("create {}", draft.title));
            self.write_result(Note::new("100", &draft.title, &draft.content))
        }

        fn update(&self, id: &NoteId, draft: &NoteDraft) -> Result<Note, ApiError> {
            self.record(format!("update {id} {}", draft.title));
            self.write_result(Note::new(id.as_str(), &draft.title, &draft.content))
        }

        fn delete(&self, id: &NoteId) -> Result<(), ApiError> {
            self.record(format!("delete {id}"));
            self.write_result(())
        }
    }

    #[test]
    fn save_routes_to_update_or_create() {
        let api = FakeApi {
            notes: vec![Note::new("1", "A", "")],
            ..FakeApi::default()
        };
        let mut state = AppState::new();
        let load = state.begin_load();
        state.apply(execute(&api, load), Instant::now());

        let update = state.begin_save(&NoteDraft::new("A2", "")).unwrap();
        state.apply(execute(&api, update), Instant::now());

        state.create_new();
        let create = state.begin_save(&NoteDraft::new("B", "")).unwrap();
        state.apply(execute(&api, create), Instant::now());

        assert_eq!(api.calls(), vec!["list", "update 1 A2", "create B"]);
        assert_eq!(state.selected_id, Some(NoteId::new("100")));
        assert_eq!(state.notes.len(), 2);
    }

    #[test]
    fn rejected_delete_restores_through_the_full_path() {
        let api = FakeApi {
            fail_writes: true,
            ..FakeApi::default()
        };
        let mut state = AppState::new();
        state.notes = vec![Note::new("1", "", ""), Note::new("2", "", "")];
        state.select(NoteId::new("1"));

        let request = state.begin_delete(&NoteId::new("1")).unwrap();
        state.apply(execute(&api, request), Instant::now());

        assert_eq!(api.calls(), vec!["delete 1"]);
        assert_eq!(state.notes.len(), 2);
        assert_eq!(state.selected_id, Some(NoteId::new("1")));
        assert_eq!(state.mode, Mode::Edit);
        assert_eq!(state.error_banner.as_deref(), Some("conflict"));
    }

    #[test]
    fn dispatcher_delivers_completions_from_worker_threads() {
        let api = Arc::new(FakeApi {
            notes: vec![Note::new("1", "A", "")],
            ..FakeApi::default()
        });
        let (dispatcher, rx) = Dispatcher::new(api);
        dispatcher.submit(Request::Probe);
        dispatcher.submit(Request::Load);

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        assert!(seen.contains(&Completion::Probed(true)));
        assert!(seen.contains(&Completion::Loaded(Ok(vec![Note::new("1", "A", "")]))));
    }
}
