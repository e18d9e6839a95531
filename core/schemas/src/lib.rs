use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ID Types
// ============================================================================

/// Store-assigned identifier of an influence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfluenceId(pub i64);

/// Store-assigned identifier of a link between two influences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub i64);

impl fmt::Display for InfluenceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Influence & Link Schema
// ============================================================================

/// A single journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Influence {
    pub id: InfluenceId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A directed relationship: `source_id` leads to `target_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluenceLink {
    pub id: LinkId,
    pub source_id: InfluenceId,
    pub target_id: InfluenceId,
}

impl InfluenceLink {
    /// True when `id` is either endpoint.
    pub fn touches(&self, id: InfluenceId) -> bool {
        self.source_id == id || self.target_id == id
    }

    /// The endpoint opposite to `id`, or `None` if the link does not touch it.
    pub fn other_end(&self, id: InfluenceId) -> Option<InfluenceId> {
        if self.source_id == id {
            Some(self.target_id)
        } else if self.target_id == id {
            Some(self.source_id)
        } else {
            None
        }
    }
}

// ============================================================================
// Reflection Schema
// ============================================================================

/// Outcome of a reflection request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Reflection {
    /// Text produced by the completion service, unmodified.
    Generated(String),
    /// A valid zero-result condition with guidance for the user.
    EmptyState(String),
    /// A generic, non-technical failure message.
    Failed(String),
}

impl Reflection {
    pub fn text(&self) -> &str {
        match self {
            Reflection::Generated(text)
            | Reflection::EmptyState(text)
            | Reflection::Failed(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Reflection::Failed(_))
    }
}

// ============================================================================
// Views
// ============================================================================

/// Content of the influence at the other end of a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInfluence {
    pub link_id: LinkId,
    pub influence_id: InfluenceId,
    pub content: String,
}

/// An influence with the contents it leads to and comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub influence: Influence,
    pub leads_to: Vec<LinkedInfluence>,
    pub from: Vec<LinkedInfluence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: InfluenceId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: InfluenceId,
    pub target: InfluenceId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluenceGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphEdge>,
}

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInfluenceRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    pub source_id: InfluenceId,
    pub target_id: InfluenceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
