//! Demo record type used by the `demo` and `schema` commands

use chrono::{DateTime, Utc};
use modelstore::{
    Affinity, ColumnCodec, FieldDef, FieldValue, Model, ModelBase, SemanticType, TypeDescriptor,
};
use rusqlite::Row;
use rusqlite::types::{Value, ValueRef};

/// Semantic tag of the comma-separated tag list
pub const TAGS: SemanticType = SemanticType::Other("tags");

#[derive(Debug, Default, Clone)]
pub struct Note {
    pub base: ModelBase,
    pub title: String,
    pub pinned: bool,
    pub priority: i32,
    pub words: i64,
    pub score: f32,
    pub weight: f64,
    pub due: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub attachments: Vec<String>,
    pub draft: String,
}

impl Note {
    pub fn new(title: &str, priority: i32) -> Self {
        Self {
            title: title.to_string(),
            priority,
            words: title.split_whitespace().count() as i64,
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.base.id,
            "title": self.title,
            "pinned": self.pinned,
            "priority": self.priority,
            "words": self.words,
            "score": self.score,
            "weight": self.weight,
            "due": self.due.map(|d| d.to_rfc3339()),
            "tags": self.tags,
            "attachments": self.attachments,
            "created_at": self.base.created_at,
            "modified_at": self.base.modified_at,
            "schema_version": self.base.schema_version,
        })
    }
}

impl Model for Note {
    fn descriptor() -> TypeDescriptor<Self> {
        TypeDescriptor::new("modelstore::demo::Note")
            .field(FieldDef::new("title", |n: &Note| n.title.clone(), |n, v| n.title = v))
            .field(FieldDef::new("pinned", |n: &Note| n.pinned, |n, v| n.pinned = v))
            .field(FieldDef::new("priority", |n: &Note| n.priority, |n, v| n.priority = v))
            .field(FieldDef::new("words", |n: &Note| n.words, |n, v| n.words = v))
            .field(FieldDef::new("score", |n: &Note| n.score, |n, v| n.score = v))
            .field(FieldDef::new("weight", |n: &Note| n.weight, |n, v| n.weight = v))
            .field(FieldDef::new("due", |n: &Note| n.due, |n, v| n.due = v))
            .field(FieldDef::raw(
                "tags",
                TAGS,
                |n: &Note| FieldValue::Text(n.tags.join(",")),
                |n: &mut Note, v| match v {
                    FieldValue::Text(joined) => {
                        n.tags = joined
                            .split(',')
                            .filter(|t| !t.is_empty())
                            .map(str::to_string)
                            .collect();
                        Ok(())
                    }
                    other => Err(modelstore::Error::Codec(format!(
                        "tags expects text, got {}",
                        other.semantic_type()
                    ))),
                },
            ))
            .field(FieldDef::opaque("attachments", "Vec<String>"))
            .field(FieldDef::new("draft", |n: &Note| n.draft.clone(), |n, v| n.draft = v).ignore())
            .extends(ModelBase::descriptor(), |n| &n.base, |n| &mut n.base)
    }

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }
}

/// Stores a tag list as one comma-separated TEXT column
pub struct TagsCodec;

impl ColumnCodec for TagsCodec {
    fn semantic_type(&self) -> SemanticType {
        TAGS
    }

    fn affinity(&self) -> Affinity {
        Affinity::Text
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        match row.get_ref(position)? {
            ValueRef::Null => Ok(FieldValue::Text(String::new())),
            _ => Ok(FieldValue::Text(row.get(position)?)),
        }
    }

    fn encode(&self, value: &FieldValue) -> modelstore::Result<Value> {
        match value {
            FieldValue::Text(joined) => Ok(Value::Text(joined.clone())),
            other => Err(modelstore::Error::Codec(format!(
                "tags codec cannot encode a {} value",
                other.semantic_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use modelstore::{Database, RecordStore};
    use std::sync::Arc;

    fn store(with_tags: bool) -> RecordStore {
        let mut builder = RecordStore::builder(Arc::new(Database::in_memory(2))).table_prefix("demo_");
        if with_tags {
            builder = builder.codec(Arc::new(TagsCodec));
        }
        builder.register::<Note>().build().unwrap()
    }

    fn sample() -> Note {
        let mut note = Note::new("Quarterly planning notes", 2);
        note.pinned = true;
        note.score = 4.5;
        note.weight = 12.75;
        note.due = Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap());
        note.tags = vec!["work".to_string(), "q3".to_string()];
        note.attachments = vec!["agenda.pdf".to_string()];
        note.draft = "unsaved scratch".to_string();
        note
    }

    #[test]
    fn test_note_round_trips_through_tags_codec() {
        let store = store(true);
        let mut note = sample();
        let id = store.save(&mut note).unwrap();

        let loaded: Note = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.base, note.base);
        assert_eq!(loaded.title, "Quarterly planning notes");
        assert!(loaded.pinned);
        assert_eq!(loaded.priority, 2);
        assert_eq!(loaded.words, 3);
        assert_eq!(loaded.score, 4.5);
        assert_eq!(loaded.weight, 12.75);
        assert_eq!(loaded.due, note.due);
        assert_eq!(loaded.tags, vec!["work", "q3"]);
        assert!(loaded.attachments.is_empty());
        assert!(loaded.draft.is_empty());
    }

    #[test]
    fn test_empty_tag_list_reads_back_empty() {
        let store = store(true);
        let mut note = Note::new("untagged", 1);
        let id = store.save(&mut note).unwrap();

        let loaded: Note = store.get(id).unwrap().unwrap();
        assert!(loaded.tags.is_empty());
    }

    #[test]
    fn test_tags_column_needs_the_codec() {
        let with = store(true).create_statement::<Note>().unwrap();
        assert!(with.contains("tags TEXT"));
        assert!(!with.contains("attachments"));
        assert!(!with.contains("draft"));

        let without = store(false);
        assert!(!without.create_statement::<Note>().unwrap().contains("tags"));
        let id = without.save(&mut sample()).unwrap();
        let loaded: Note = without.get(id).unwrap().unwrap();
        assert!(loaded.tags.is_empty());
        assert_eq!(loaded.title, "Quarterly planning notes");
    }
}
