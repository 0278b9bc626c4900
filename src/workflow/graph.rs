use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Action kinds a node may carry (spec §3). `None` on `Node::action_type`
/// means the node is a no-op — distinct from an unrecognised string, which
/// is a programming error and fails closed (spec §4.2 tie-breaks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ProfileVisit,
    LikePost,
    CommentPost,
    SendConnectionRequest,
    SendFollowup,
    WithdrawRequest,
    SendInmail,
}

impl ActionType {
    /// Exhaustive string parse (spec §9 design notes: compile-time
    /// exhaustive switch to prevent silent drops on a new action type).
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "profile_visit" => Ok(Self::ProfileVisit),
            "like_post" => Ok(Self::LikePost),
            "comment_post" => Ok(Self::CommentPost),
            "send_connection_request" => Ok(Self::SendConnectionRequest),
            "send_followup" => Ok(Self::SendFollowup),
            "withdraw_request" => Ok(Self::WithdrawRequest),
            "send_inmail" => Ok(Self::SendInmail),
            other => Err(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileVisit => "profile_visit",
            Self::LikePost => "like_post",
            Self::CommentPost => "comment_post",
            Self::SendConnectionRequest => "send_connection_request",
            Self::SendFollowup => "send_followup",
            Self::WithdrawRequest => "withdraw_request",
            Self::SendInmail => "send_inmail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeClass {
    Action,
    AddStep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub class: NodeClass,
    /// Raw action-type string; `None` is a no-op, `Some` is validated via
    /// [`ActionType::parse`] at execution time, not at parse time, so a
    /// node with an unrecognised type still loads (and then fails closed).
    pub action_type: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    S,
    M,
    H,
    D,
    W,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgeDelay {
    pub delay: i64,
    pub unit: DelayUnit,
}

impl EdgeDelay {
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        let factor = match self.unit {
            DelayUnit::S => 1_000,
            DelayUnit::M => 60_000,
            DelayUnit::H => 3_600_000,
            DelayUnit::D => 86_400_000,
            DelayUnit::W => 604_800_000,
        };
        self.delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default)]
    pub is_conditional_path: bool,
    #[serde(default)]
    pub is_positive: bool,
    pub delay_data: Option<EdgeDelay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub data: EdgeData,
}

impl Edge {
    /// Delay the walker must honour before enqueueing `target` once this
    /// edge is followed (spec §4.2 step 5).
    #[must_use]
    pub fn delay_ms(&self) -> i64 {
        self.data.delay_data.map_or(0, |d| d.as_millis())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// The executable subgraph: action nodes only, plus edges whose endpoints
/// are both action nodes (spec §4.2 initialization), with precomputed
/// in-degrees and adjacency.
pub struct RestrictedGraph {
    pub nodes: HashMap<String, Node>,
    pub outgoing: HashMap<String, Vec<Edge>>,
    pub in_degree: HashMap<String, u32>,
}

impl RestrictedGraph {
    #[must_use]
    pub fn build(def: &WorkflowDefinition) -> Self {
        let action_ids: HashSet<&str> = def
            .nodes
            .iter()
            .filter(|n| n.class == NodeClass::Action)
            .map(|n| n.id.as_str())
            .collect();

        let nodes: HashMap<String, Node> = def
            .nodes
            .iter()
            .filter(|n| action_ids.contains(n.id.as_str()))
            .map(|n| (n.id.clone(), n.clone()))
            .collect();

        let mut outgoing: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut in_degree: HashMap<String, u32> = nodes.keys().map(|id| (id.clone(), 0)).collect();

        for edge in &def.edges {
            if !action_ids.contains(edge.source.as_str()) || !action_ids.contains(edge.target.as_str()) {
                continue;
            }
            outgoing.entry(edge.source.clone()).or_default().push(edge.clone());
            *in_degree.entry(edge.target.clone()).or_insert(0) += 1;
        }

        Self { nodes, outgoing, in_degree }
    }

    /// All zero-indegree node ids, in a stable (insertion) order, seeding
    /// the walker's FIFO queue (spec §4.2 initialization).
    #[must_use]
    pub fn seed_queue(&self) -> VecDeque<String> {
        let mut ids: Vec<&String> = self.nodes.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter(|id| self.in_degree.get(*id).copied().unwrap_or(0) == 0)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn outgoing_edges(&self, id: &str) -> &[Edge] {
        self.outgoing.get(id).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action_node(id: &str, action_type: Option<&str>) -> Node {
        Node {
            id: id.to_owned(),
            class: NodeClass::Action,
            action_type: action_type.map(str::to_owned),
            config: serde_json::Value::Null,
        }
    }

    fn unconditional_edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_owned(),
            source: source.to_owned(),
            target: target.to_owned(),
            data: EdgeData { is_conditional_path: false, is_positive: false, delay_data: None },
        }
    }

    #[test]
    fn add_step_nodes_are_excluded_from_execution() {
        let def = WorkflowDefinition {
            nodes: vec![
                action_node("a", Some("profile_visit")),
                Node {
                    id: "layout1".into(),
                    class: NodeClass::AddStep,
                    action_type: None,
                    config: serde_json::Value::Null,
                },
            ],
            edges: vec![unconditional_edge("e1", "a", "layout1")],
        };
        let graph = RestrictedGraph::build(&def);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.outgoing_edges("a").is_empty());
    }

    #[test]
    fn seed_queue_contains_only_zero_indegree_nodes() {
        let def = WorkflowDefinition {
            nodes: vec![
                action_node("a", Some("profile_visit")),
                action_node("b", Some("like_post")),
                action_node("c", Some("comment_post")),
            ],
            edges: vec![unconditional_edge("e1", "a", "b"), unconditional_edge("e2", "a", "c")],
        };
        let graph = RestrictedGraph::build(&def);
        let seeded = graph.seed_queue();
        assert_eq!(seeded, VecDeque::from([String::from("a")]));
        assert_eq!(graph.in_degree["b"], 1);
        assert_eq!(graph.in_degree["c"], 1);
    }

    #[test]
    fn action_type_parse_rejects_unknown() {
        assert!(ActionType::parse("teleport").is_err());
        assert_eq!(ActionType::parse("like_post").unwrap(), ActionType::LikePost);
    }

    #[test]
    fn edge_delay_converts_units_to_millis() {
        let edge = EdgeDelay { delay: 2, unit: DelayUnit::H };
        assert_eq!(edge.as_millis(), 2 * 3_600_000);
        let edge = EdgeDelay { delay: 1, unit: DelayUnit::W };
        assert_eq!(edge.as_millis(), 604_800_000);
    }

    #[test]
    fn empty_dag_has_no_nodes_and_empty_seed_queue() {
        let def = WorkflowDefinition { nodes: vec![], edges: vec![] };
        let graph = RestrictedGraph::build(&def);
        assert!(graph.seed_queue().is_empty());
    }
}
