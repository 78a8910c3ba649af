use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::key::{CompoundKey, SiteId};
use crate::error::{HaystackError, Result};

/// Document identifier (the 32-bit primary id of its storage key)
pub type DocumentId = u32;

/// Kind of post
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostType {
    #[default]
    Question,
    Answer,
}

/// A stored post. Never mutated in place: an update is a full re-insert.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub site_id: SiteId,
    pub id: DocumentId,
    pub post_type: PostType,

    pub title: String,
    /// Raw HTML body
    pub body: String,
    /// Plain-text body used for indexing
    pub cleaned_body: String,
    pub tags: Vec<String>,

    pub parent_id: Option<u32>,
    pub accepted_answer_id: Option<u32>,
    pub owner_user_id: Option<u32>,
    pub last_editor_user_id: Option<u32>,

    pub score: i32,
    pub view_count: u32,
    pub answer_count: u32,
    pub comment_count: u32,

    pub creation_date: String,
    pub last_edit_date: String,
    pub last_activity_date: String,
    pub content_license: String,
}

impl Document {
    /// Create a question with the given id, title and plain body
    pub fn question(site_id: SiteId, id: DocumentId, title: &str, body: &str) -> Self {
        Self {
            site_id,
            id,
            post_type: PostType::Question,
            title: title.to_string(),
            cleaned_body: body.to_string(),
            ..Default::default()
        }
    }

    pub fn with_score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_question(&self) -> bool {
        self.post_type == PostType::Question
    }

    pub fn key(&self) -> CompoundKey {
        CompoundKey::post(self.site_id, self.id)
    }

    /// Plain-text body: the cleaned body, or the raw body with markup removed.
    pub fn plain_body(&self) -> String {
        if !self.cleaned_body.trim().is_empty() {
            return self.cleaned_body.clone();
        }
        strip_html(&self.body)
    }

    /// Boundary validation for documents added at runtime
    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(HaystackError::invalid(
                "document id is required and must be positive",
            ));
        }
        if self.title.trim().is_empty() && self.plain_body().trim().is_empty() {
            return Err(HaystackError::invalid(
                "at least one of title or body must be non-empty",
            ));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

fn tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"))
}

/// Remove markup and decode the handful of entities the dumps contain.
pub fn strip_html(html: &str) -> String {
    let text = tag_regex().replace_all(html, " ");
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_roundtrip() {
        let doc = Document::question(1, 7, "Install guide", "steps")
            .with_score(3)
            .with_tags(["ubuntu", "apt"]);
        let back = Document::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let err = Document::from_bytes(&[0xFF, 0x01]).unwrap_err();
        assert!(matches!(err, HaystackError::Serialization(_)));
    }

    #[test]
    fn test_plain_body_falls_back_to_html() {
        let mut doc = Document::question(1, 1, "t", "");
        doc.body = "<p>Run <code>apt&nbsp;update</code> &amp; reboot</p>".to_string();
        let plain = doc.plain_body();
        assert!(plain.contains("Run"));
        assert!(plain.contains("apt update"));
        assert!(plain.contains("& reboot"));
        assert!(!plain.contains('<'));
    }

    #[test]
    fn test_validate() {
        assert!(Document::question(1, 0, "title", "").validate().is_err());
        assert!(Document::question(1, 1, "  ", "").validate().is_err());
        assert!(Document::question(1, 1, "title", "").validate().is_ok());
        assert!(Document::question(1, 1, "", "body").validate().is_ok());
    }

    #[test]
    fn test_json_uses_defaults() {
        let doc: Document = serde_json::from_str(r#"{"id": 3, "title": "hello"}"#).unwrap();
        assert_eq!(doc.id, 3);
        assert!(doc.is_question());
        assert!(doc.tags.is_empty());
        assert_eq!(doc.parent_id, None);
    }
}
