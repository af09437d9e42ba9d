use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribution state of a recalled post.
///
/// Transitions are driven only through [`SourceState::apply`]; the table there
/// is the whole state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceState {
    #[default]
    Unset,
    Candidate,
    Source,
    NotSource,
}

/// Inputs to the attribution state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// The post passed the platform eligibility rule.
    Eligible,
    /// The post is the chronologically first eligible member of its event group.
    Elect,
    /// The group scan is over.
    Finalize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid source-state transition: {from:?} on {event:?}")]
pub struct InvalidTransition {
    pub from: SourceState,
    pub event: SourceEvent,
}

impl SourceState {
    pub fn apply(self, event: SourceEvent) -> Result<SourceState, InvalidTransition> {
        use SourceEvent::*;
        use SourceState::*;
        match (self, event) {
            (Unset, Eligible) => Ok(Candidate),
            (Candidate, Elect) => Ok(Source),
            (Unset, Finalize) => Ok(NotSource),
            (Candidate, Finalize) | (Source, Finalize) | (NotSource, Finalize) => Ok(self),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub fn is_source(self) -> bool {
        self == SourceState::Source
    }
}

/// One recalled post, scored and attributed within a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub event_id: String,
    pub platform: String,
    pub author_id: String,
    /// Publish time as stored in the index (`YYYY-MM-DD HH:MM:SS`), which
    /// orders chronologically under string comparison.
    pub timestamp: String,
    pub content: String,
    pub is_original_post: bool,
    pub is_reshare: bool,
    pub similarity: f64,
    pub source_state: SourceState,

    // Display-only fields carried through from the index.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub is_rumor: Option<bool>,
    #[serde(default)]
    pub retext: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl Candidate {
    /// Minimal constructor used when only the attribution-relevant fields matter.
    pub fn new(
        id: impl Into<String>,
        event_id: impl Into<String>,
        platform: impl Into<String>,
        timestamp: impl Into<String>,
        is_original_post: bool,
        is_reshare: bool,
    ) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            platform: platform.into(),
            author_id: String::new(),
            timestamp: timestamp.into(),
            content: String::new(),
            is_original_post,
            is_reshare,
            similarity: 0.0,
            source_state: SourceState::Unset,
            title: None,
            author_name: None,
            is_rumor: None,
            retext: None,
            image_urls: Vec::new(),
        }
    }

    pub fn is_source(&self) -> bool {
        self.source_state.is_source()
    }
}
