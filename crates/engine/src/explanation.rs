//! Derivation traces for `explain`.
//!
//! During a traced evaluation every expression node appends a child to
//! an arena; values are recorded first-write-wins, so short-circuited
//! re-visits cannot overwrite the value that actually decided the
//! outcome. The arena is materialized into an owned tree once the
//! evaluation finishes.

use serde::Serialize;

pub(crate) type NodeId = usize;

#[derive(Debug, Default)]
struct NodeData {
    fact: Option<String>,
    expression: Option<String>,
    value: Option<serde_json::Value>,
    operands: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub(crate) struct ExplanationBuilder {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

impl ExplanationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a trace rooted at the named act.
    pub fn root(&mut self, act: &str) -> NodeId {
        let id = self.push(NodeData {
            fact: Some(act.to_string()),
            ..NodeData::default()
        });
        self.root = Some(id);
        id
    }

    /// Append a child under `parent`. `fact` is set for fact
    /// references, `expression` for operator nodes.
    pub fn child(
        &mut self,
        parent: Option<NodeId>,
        fact: Option<&str>,
        expression: Option<&str>,
    ) -> NodeId {
        let id = self.push(NodeData {
            fact: fact.map(str::to_string),
            expression: expression.map(str::to_string),
            ..NodeData::default()
        });
        if let Some(parent) = parent {
            self.nodes[parent].operands.push(id);
        }
        id
    }

    /// Record the node's value. The first recorded value wins.
    pub fn record_value(&mut self, id: NodeId, value: serde_json::Value) {
        let node = &mut self.nodes[id];
        if node.value.is_none() {
            node.value = Some(value);
        }
    }

    pub fn materialize_root(&self) -> Option<Explanation> {
        self.root.map(|id| self.materialize(id))
    }

    fn materialize(&self, id: NodeId) -> Explanation {
        let node = &self.nodes[id];
        Explanation {
            fact: node.fact.clone(),
            expression: node.expression.clone(),
            value: node.value.clone(),
            operands: node.operands.iter().map(|&c| self.materialize(c)).collect(),
        }
    }

    fn push(&mut self, node: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }
}

/// One node of a derivation tree: which fact or operator was
/// evaluated, what it came out to (`null` for unknown, absent if the
/// node was never finished), and the sub-derivations it consulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<Explanation>,
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_recorded_value_wins() {
        let mut builder = ExplanationBuilder::new();
        let root = builder.root("<<sell>>");
        builder.record_value(root, serde_json::json!(false));
        builder.record_value(root, serde_json::json!(true));
        let tree = builder.materialize_root().unwrap();
        assert_eq!(tree.value, Some(serde_json::json!(false)));
    }

    #[test]
    fn children_nest_under_their_parent() {
        let mut builder = ExplanationBuilder::new();
        let root = builder.root("<<sell>>");
        let and = builder.child(Some(root), None, Some("AND"));
        let fact = builder.child(Some(and), Some("[price]"), None);
        builder.record_value(fact, serde_json::json!(5));
        let tree = builder.materialize_root().unwrap();
        assert_eq!(tree.operands.len(), 1);
        assert_eq!(tree.operands[0].expression.as_deref(), Some("AND"));
        assert_eq!(tree.operands[0].operands[0].fact.as_deref(), Some("[price]"));
        assert_eq!(tree.operands[0].operands[0].value, Some(serde_json::json!(5)));
    }
}
