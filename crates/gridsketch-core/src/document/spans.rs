//! Byte ranges of entity records inside the document text.

use serde::Deserialize;
use serde_json::value::RawValue;
use std::ops::Range;

#[derive(Deserialize)]
struct Outline<'a> {
    #[serde(borrow)]
    entities: Vec<&'a RawValue>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

/// Where each entity record (`{` through the matching `}`) sits in a text.
///
/// Built from a real parse, so it does not depend on formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    spans: Vec<(String, Range<usize>)>,
}

impl SourceMap {
    /// Index the entity records of `text`. Returns `None` if the text is not a
    /// document with an `entities` array.
    pub fn build(text: &str) -> Option<Self> {
        let outline: Outline<'_> = serde_json::from_str(text).ok()?;
        let base = text.as_ptr() as usize;
        let spans = outline
            .entities
            .iter()
            .filter_map(|raw| {
                let record = raw.get();
                let id = serde_json::from_str::<IdOnly>(record).ok()?.id;
                let start = record.as_ptr() as usize - base;
                Some((id, start..start + record.len()))
            })
            .collect();
        Some(Self { spans })
    }

    /// Range of the first record with this id.
    pub fn span_of(&self, id: &str) -> Option<Range<usize>> {
        self.spans
            .iter()
            .find(|(entity_id, _)| entity_id == id)
            .map(|(_, range)| range.clone())
    }

    /// 0-based line of the record's opening brace, for scrolling.
    pub fn line_of(&self, text: &str, id: &str) -> Option<usize> {
        let span = self.span_of(id)?;
        text.get(..span.start).map(|prefix| prefix.matches('\n').count())
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
