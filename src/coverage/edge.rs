//! Edge classification for the coverage graph

use serde::{Deserialize, Serialize};

use crate::ir::InstId;

/// Instruction-level control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub src: InstId,
    pub dst: InstId,
}

impl Edge {
    pub fn new(src: InstId, dst: InstId) -> Self {
        Self { src, dst }
    }
}

/// How an edge came to be known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Next instruction within a block
    Sequential,
    /// Terminator to the first instruction of a successor block
    Branch,
    /// Call instruction to callee entry, discovered from a trace
    Call,
    /// Transfer into an exception handler, discovered from a trace
    Exception,
}

impl EdgeKind {
    /// Color for DOT visualization
    pub fn dot_color(&self) -> &'static str {
        match self {
            EdgeKind::Sequential => "black",
            EdgeKind::Branch => "blue",
            EdgeKind::Call => "gray",
            EdgeKind::Exception => "purple",
        }
    }

    /// Label for DOT visualization
    pub fn dot_label(&self) -> &'static str {
        match self {
            EdgeKind::Sequential => "",
            EdgeKind::Branch => "br",
            EdgeKind::Call => "call",
            EdgeKind::Exception => "unwind",
        }
    }
}

/// Weight stored on explicit edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeInfo {
    pub kind: EdgeKind,
    /// Counts toward coverage and scheduling decisions
    pub registered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_labels() {
        assert_eq!(EdgeKind::Sequential.dot_label(), "");
        assert_eq!(EdgeKind::Exception.dot_label(), "unwind");
        assert_eq!(EdgeKind::Call.dot_color(), "gray");
    }
}
