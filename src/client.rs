use std::io;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Note, NoteDraft, NoteId};

pub const NETWORK_ADVISORY: &str = "Backend API is not reachable. Check that the backend service is running and the API base URL is correct.";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const JSON: &str = "application/json";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never got a response.
    #[error("{}", NETWORK_ADVISORY)]
    Network,

    /// The store answered with a non-success status.
    #[error("{message}")]
    Application { status: u16, message: String },

    #[error("Request was cancelled.")]
    Cancelled,

    /// Success status, but the body was not a usable note.
    #[error("Unexpected response from the notes API: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network)
    }
}

/// Operations the notes store exposes. The state machine only sees this seam.
pub trait NotesApi: Send + Sync {
    fn list(&self) -> Result<Vec<Note>, ApiError>;
    fn create(&self, draft: &NoteDraft) -> Result<Note, ApiError>;
    fn update(&self, id: &NoteId, draft: &NoteDraft) -> Result<Note, ApiError>;
    fn delete(&self, id: &NoteId) -> Result<(), ApiError>;
}

/// Best-effort probe: a `list()` reduced to reachable or not.
pub fn check_reachable<A: NotesApi + ?Sized>(api: &A) -> bool {
    api.list().is_ok()
}

pub struct HttpNotesClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpNotesClient {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/notes", self.base_url)
    }

    fn item_url(&self, id: &NoteId) -> String {
        format!("{}/notes/{}", self.base_url, urlencoding::encode(id.as_str()))
    }

    fn request(&self, method: &str, url: &str, body: Option<&NoteDraft>) -> Result<Body, ApiError> {
        debug!(%method, %url, "notes request");
        let req = self.agent.request(method, url).set("Accept", JSON);
        let sent = match body {
            Some(draft) => {
                let payload = serde_json::to_string(draft)
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                req.set("Content-Type", JSON).send_string(&payload)
            }
            None => req.call(),
        };

        match sent {
            Ok(response) => Ok(read_body(response)),
            Err(ureq::Error::Status(status, response)) => {
                let message = error_message(status, &read_body(response));
                warn!(%method, %url, status, %message, "notes request rejected");
                Err(ApiError::Application { status, message })
            }
            Err(ureq::Error::Transport(transport)) => {
                if is_interrupted(&transport) {
                    warn!(%method, %url, "notes request cancelled");
                    return Err(ApiError::Cancelled);
                }
                warn!(%method, %url, error = %transport, "notes request failed in transport");
                Err(ApiError::Network)
            }
        }
    }
}

impl NotesApi for HttpNotesClient {
    fn list(&self) -> Result<Vec<Note>, ApiError> {
        match self.request("GET", &self.collection_url(), None)? {
            Body::Json(Value::Array(items)) => Ok(items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<Note>(item) {
                    Ok(note) => Some(note),
                    Err(e) => {
                        warn!(error = %e, "skipping undecodable note in list response");
                        None
                    }
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn create(&self, draft: &NoteDraft) -> Result<Note, ApiError> {
        let body = self.request("POST", &self.collection_url(), Some(draft))?;
        body.into_note()
    }

    fn update(&self, id: &NoteId, draft: &NoteDraft) -> Result<Note, ApiError> {
        let body = self.request("PUT", &self.item_url(id), Some(draft))?;
        body.into_note()
    }

    fn delete(&self, id: &NoteId) -> Result<(), ApiError> {
        self.request("DELETE", &self.item_url(id), None).map(|_| ())
    }
}

#[derive(Debug, PartialEq)]
enum Body {
    Empty,
    Json(Value),
    Text(String),
}

impl Body {
    fn into_note(self) -> Result<Note, ApiError> {
        match self {
            Body::Json(value) => {
                serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
            }
            Body::Empty => Err(ApiError::Decode("empty body".into())),
            Body::Text(_) => Err(ApiError::Decode("body is not JSON".into())),
        }
    }
}

fn read_body(response: ureq::Response) -> Body {
    if response.status() == 204 {
        return Body::Empty;
    }
    let is_json = response
        .header("Content-Type")
        .map(|ct| ct.contains(JSON))
        .unwrap_or(false);
    let text = match response.into_string() {
        Ok(text) => text,
        Err(_) => return Body::Empty,
    };
    if is_json {
        match serde_json::from_str(&text) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Empty,
        }
    } else {
        Body::Text(text)
    }
}

fn error_message(status: u16, body: &Body) -> String {
    let structured = match body {
        Body::Json(Value::Object(map)) => ["detail", "message"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| match v {
                Value::Null | Value::Bool(false) => None,
                Value::String(s) if s.is_empty() => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }),
        Body::Json(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Body::Text(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    };
    structured.unwrap_or_else(|| format!("Request failed with status {status}."))
}

fn is_interrupted(transport: &ureq::Transport) -> bool {
    std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(|e| e.kind() == io::ErrorKind::Interrupted)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    /// Serves exactly one canned response and hands back the raw request.
    fn serve_once(status_line: &str, headers: &[&str], body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let mut response = format!("HTTP/1.1 {status_line}\r\nConnection: close\r\n");
        for h in headers {
            response.push_str(h);
            response.push_str("\r\n");
        }
        response.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            let _ = tx.send(request);
        });
        (base, rx)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    #[test]
    fn list_decodes_notes_and_sends_accept_header() {
        let (base, rx) = serve_once(
            "200 OK",
            &["Content-Type: application/json; charset=utf-8"],
            r#"[{"id":1,"title":"A","content":"a"},{"id":2,"title":"B","content":""}]"#,
        );
        let client = HttpNotesClient::new(&base);
        let notes = client.list().unwrap();
        assert_eq!(notes, vec![Note::new("1", "A", "a"), Note::new("2", "B", "")]);

        let request = rx.recv().unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /notes http/1.1"));
        assert!(request.contains("accept: application/json"));
        assert!(!request.contains("content-type:"));
    }

    #[test]
    fn list_coerces_non_array_body_to_empty() {
        let (base, _rx) = serve_once(
            "200 OK",
            &["Content-Type: application/json"],
            r#"{"notes":[]}"#,
        );
        assert!(HttpNotesClient::new(&base).list().unwrap().is_empty());
    }

    #[test]
    fn list_skips_items_that_are_not_notes() {
        let (base, _rx) = serve_once(
            "200 OK",
            &["Content-Type: application/json"],
            r#"[{"title":"no id"},{"id":"x","title":"ok","content":""}]"#,
        );
        let notes = HttpNotesClient::new(&base).list().unwrap();
        assert_eq!(notes, vec![Note::new("x", "ok", "")]);
    }

    #[test]
    fn update_escapes_id_and_sends_json_body() {
        let (base, rx) = serve_once(
            "200 OK",
            &["Content-Type: application/json"],
            r#"{"id":"a b/c","title":"T","content":"C"}"#,
        );
        let client = HttpNotesClient::new(&format!("{base}/"));
        let note = client
            .update(&NoteId::new("a b/c"), &NoteDraft::new("T", "C"))
            .unwrap();
        assert_eq!(note.title, "T");

        let request = rx.recv().unwrap();
        assert!(request.starts_with("PUT /notes/a%20b%2Fc HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"title":"T","content":"C"}"#));
    }

    #[test]
    fn delete_tolerates_no_content() {
        let (base, rx) = serve_once("204 No Content", &["Content-Type: application/json"], "");
        HttpNotesClient::new(&base).delete(&NoteId::new("7")).unwrap();
        assert!(rx.recv().unwrap().starts_with("DELETE /notes/7 HTTP/1.1"));
    }

    #[test]
    fn application_error_prefers_detail_field() {
        let (base, _rx) = serve_once(
            "404 Not Found",
            &["Content-Type: application/json"],
            r#"{"detail":"Note not found"}"#,
        );
        let err = HttpNotesClient::new(&base).delete(&NoteId::new("9")).unwrap_err();
        assert_eq!(
            err,
            ApiError::Application { status: 404, message: "Note not found".into() }
        );
        assert!(!err.is_network());
    }

    #[test]
    fn application_error_falls_back_to_text_then_status() {
        let (base, _rx) = serve_once("500 Internal Server Error", &["Content-Type: text/plain"], "boom");
        let err = HttpNotesClient::new(&base).list().unwrap_err();
        assert_eq!(err.to_string(), "boom");

        let (base, _rx) = serve_once("503 Service Unavailable", &[], "");
        let err = HttpNotesClient::new(&base).list().unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status 503.");
    }

    #[test]
    fn create_with_unusable_body_is_a_decode_error() {
        let (base, _rx) = serve_once("201 Created", &["Content-Type: text/plain"], "created");
        let err = HttpNotesClient::new(&base)
            .create(&NoteDraft::new("X", ""))
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(!err.is_network());
    }

    #[test]
    fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = HttpNotesClient::new(&base);
        let err = client.list().unwrap_err();
        assert!(err.is_network());
        assert_eq!(err.to_string(), NETWORK_ADVISORY);
        assert!(!check_reachable(&client));
    }

    #[test]
    fn message_extraction_rules() {
        let detail_list = Body::Json(serde_json::json!({"detail": [{"msg": "bad"}]}));
        assert_eq!(error_message(422, &detail_list), r#"[{"msg":"bad"}]"#);

        let message = Body::Json(serde_json::json!({"detail": null, "message": "nope"}));
        assert_eq!(error_message(400, &message), "nope");

        let other = Body::Json(serde_json::json!({"error": "x"}));
        assert_eq!(error_message(418, &other), "Request failed with status 418.");
        assert_eq!(error_message(500, &Body::Empty), "Request failed with status 500.");
    }
}
