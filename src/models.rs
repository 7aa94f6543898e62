use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier assigned by the remote store. Servers send either JSON strings
/// or numbers; both are kept in their textual form.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl<'de> Deserialize<'de> for NoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => NoteId(s),
            RawId::Number(n) => NoteId(n.to_string()),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

impl Note {
    pub fn new(id: impl Into<NoteId>, title: &str, content: &str) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }
}

/// Request body for create and update.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    pub fn trimmed(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            content: self.content.trim().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Newest-first when every id is a digit string, otherwise the order received.
pub fn sort_notes(notes: Vec<Note>) -> Vec<Note> {
    if !notes.iter().all(|n| n.id.is_numeric()) {
        return notes;
    }
    let mut sorted = notes;
    sorted.sort_by(|a, b| compare_digit_ids(b.id.as_str(), a.id.as_str()));
    sorted
}

// Numeric comparison on digit strings of any length.
fn compare_digit_ids(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(notes: &[Note]) -> Vec<&str> {
        notes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn numeric_ids_sort_newest_first() {
        let notes = vec![
            Note::new("2", "b", ""),
            Note::new("10", "j", ""),
            Note::new("1", "a", ""),
            Note::new("007", "g", ""),
        ];
        assert_eq!(ids(&sort_notes(notes)), vec!["10", "007", "2", "1"]);
    }

    #[test]
    fn ids_longer_than_u64_still_order_numerically() {
        let notes = vec![
            Note::new("99999999999999999999", "", ""),
            Note::new("100000000000000000000", "", ""),
        ];
        assert_eq!(
            ids(&sort_notes(notes)),
            vec!["100000000000000000000", "99999999999999999999"]
        );
    }

    #[test]
    fn any_non_numeric_id_keeps_received_order() {
        let notes = vec![
            Note::new("1", "", ""),
            Note::new("abc", "", ""),
            Note::new("3", "", ""),
        ];
        assert_eq!(ids(&sort_notes(notes)), vec!["1", "abc", "3"]);
    }

    #[test]
    fn empty_id_is_not_numeric() {
        assert!(!NoteId::new("").is_numeric());
        assert!(!NoteId::new("-1").is_numeric());
        assert!(NoteId::new("0042").is_numeric());
    }

    #[test]
    fn decodes_numeric_and_string_ids() {
        let raw = r#"[{"id":3,"title":"X","content":""},{"id":"a-b","title":null}]"#;
        let notes: Vec<Note> = serde_json::from_str(raw).unwrap();
        assert_eq!(notes[0].id, NoteId::new("3"));
        assert_eq!(notes[1].id, NoteId::new("a-b"));
        assert_eq!(notes[1].title, "");
        assert_eq!(notes[1].content, "");
    }

    #[test]
    fn draft_trims_and_detects_blank() {
        let draft = NoteDraft::new("  hi ", "\n");
        assert_eq!(draft.trimmed(), NoteDraft::new("hi", ""));
        assert!(!draft.is_blank());
        assert!(NoteDraft::new(" ", "\t").is_blank());
    }
}
