#[cfg(test)]
mod tests;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{IdCounter, IngestionRecord};

/// Raw shape of one embeddings file as produced upstream
///
/// Text fields are kept as raw JSON values because the upstream format is not
/// consistent about them; see [`TextField`].
#[derive(Debug, Default, Deserialize)]
pub struct RawSourceFile {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub question: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub question_text: Option<Value>,
    #[serde(default)]
    pub reply: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub reply_text: Option<Value>,
    #[serde(default)]
    pub content: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub content_text: Option<Value>,
}

/// The three vector/text pairs a source file may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Question,
    Reply,
    Content,
}

impl Channel {
    /// Channels in emission order
    pub const ALL: [Self; 3] = [Self::Question, Self::Reply, Self::Content];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Reply => "reply",
            Self::Content => "content",
        }
    }
}

/// Text attached to a channel, resolved once before per-index iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextField {
    /// One entry per vector; missing or non-string entries resolve to ""
    Sequence(Vec<Option<String>>),
    /// The same text applies to every vector of the channel
    Single(String),
    /// No usable text, the channel is skipped
    Absent,
}

impl TextField {
    /// Classify a raw JSON text value
    #[inline]
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(text)) if text.is_empty() => Self::Absent,
            Some(Value::String(text)) => Self::Single(text),
            Some(Value::Array(items)) => Self::Sequence(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(text) => Some(text),
                        _ => None,
                    })
                    .collect(),
            ),
            // Any other value still marks the channel as present, with no text
            Some(_) => Self::Sequence(Vec::new()),
        }
    }

    /// Text for the vector at `index`
    #[inline]
    pub fn text_at(&self, index: usize) -> &str {
        match self {
            Self::Sequence(items) => items.get(index).and_then(Option::as_deref).unwrap_or(""),
            Self::Single(text) => text,
            Self::Absent => "",
        }
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl RawSourceFile {
    /// Move the vectors and classified text of `channel` out of the file
    fn take_channel(&mut self, channel: Channel) -> (Option<Vec<Vec<f32>>>, TextField) {
        let (vectors, text) = match channel {
            Channel::Question => (self.question.take(), self.question_text.take()),
            Channel::Reply => (self.reply.take(), self.reply_text.take()),
            Channel::Content => (self.content.take(), self.content_text.take()),
        };
        (vectors, TextField::from_value(text))
    }

    fn take_title(&mut self) -> String {
        match self.title.take() {
            Some(Value::String(title)) => title,
            _ => String::new(),
        }
    }
}

/// Convert one parsed source file into ingestion records
///
/// Every emitted record advances `ids` exactly once, so ids stay unique across
/// all files normalized with the same counter.
#[inline]
pub fn normalize(
    mut raw: RawSourceFile,
    source_tag: &str,
    ids: &mut IdCounter,
) -> Vec<IngestionRecord> {
    let title = raw.take_title();
    let mut records = Vec::new();

    for channel in Channel::ALL {
        let (vectors, text) = raw.take_channel(channel);
        let Some(vectors) = vectors else {
            continue;
        };
        if text.is_absent() {
            debug!(
                "Skipping {} channel without text ({} vectors)",
                channel.as_str(),
                vectors.len()
            );
            continue;
        }

        records.reserve(vectors.len());
        for (index, vector) in vectors.into_iter().enumerate() {
            records.push(IngestionRecord {
                id: ids.next_id(source_tag),
                title: title.clone(),
                vector,
                text: text.text_at(index).to_string(),
            });
        }
    }

    records
}

/// Parse and normalize the contents of one source file
#[inline]
pub fn normalize_str(
    contents: &str,
    source_tag: &str,
    ids: &mut IdCounter,
) -> Result<Vec<IngestionRecord>, serde_json::Error> {
    let raw: RawSourceFile = serde_json::from_str(contents)?;
    Ok(normalize(raw, source_tag, ids))
}
