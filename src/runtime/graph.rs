/// Petgraph representation of a workflow's steps
///
/// Builds a directed graph from steps and connections and answers the two
/// traversal questions the engine asks: the main-flow order from the trigger
/// steps, and the "no" branch of a failed condition.

use crate::error::WorkflowError;
use crate::workflow::types::{BranchHandle, Step, StepType, Workflow};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct StepGraph {
    /// Edge weight is the branch handle of the connection
    graph: DiGraph<Step, Option<BranchHandle>>,
    index_by_id: HashMap<String, NodeIndex>,
    /// Trigger steps in declaration order
    triggers: Vec<NodeIndex>,
}

impl StepGraph {
    /// Build the graph, rejecting duplicate step ids and dangling connections
    ///
    /// Cycles are allowed here; [`StepGraph::validate`] is the save-time check.
    pub fn build(workflow: &Workflow) -> Result<Self, WorkflowError> {
        let mut graph = DiGraph::new();
        let mut index_by_id = HashMap::new();
        let mut triggers = Vec::new();

        for step in &workflow.steps {
            if index_by_id.contains_key(&step.id) {
                return Err(WorkflowError::Invalid(format!("duplicate step id '{}'", step.id)));
            }
            let index = graph.add_node(step.clone());
            index_by_id.insert(step.id.clone(), index);
            if step.step_type == StepType::Trigger {
                triggers.push(index);
            }
        }

        for connection in &workflow.connections {
            let from = index_by_id.get(&connection.from).ok_or_else(|| {
                WorkflowError::Invalid(format!("connection references unknown step '{}'", connection.from))
            })?;
            let to = index_by_id.get(&connection.to).ok_or_else(|| {
                WorkflowError::Invalid(format!("connection references unknown step '{}'", connection.to))
            })?;
            graph.add_edge(*from, *to, connection.handle);
        }

        tracing::debug!(
            "🏗️ Built step graph for '{}': {} steps, {} connections, {} triggers",
            workflow.id,
            graph.node_count(),
            graph.edge_count(),
            triggers.len()
        );

        Ok(Self {
            graph,
            index_by_id,
            triggers,
        })
    }

    /// Save-time checks: at least one trigger and no cycles
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.triggers.is_empty() {
            return Err(WorkflowError::Invalid(
                "workflow must have at least one trigger step".to_string(),
            ));
        }
        if is_cyclic_directed(&self.graph) {
            return Err(WorkflowError::Invalid("workflow connections contain a cycle".to_string()));
        }
        Ok(())
    }

    pub fn step(&self, index: NodeIndex) -> &Step {
        &self.graph[index]
    }

    pub fn index_of(&self, step_id: &str) -> Option<NodeIndex> {
        self.index_by_id.get(step_id).copied()
    }

    pub fn triggers(&self) -> &[NodeIndex] {
        &self.triggers
    }

    /// DFS from every trigger over non-"no" edges, each step at most once
    pub fn main_flow(&self) -> Vec<NodeIndex> {
        let mut visited = HashSet::new();
        self.walk(&self.triggers, &mut visited)
    }

    /// DFS over the "no" edges leaving `condition`, skipping steps in `visited`
    pub fn no_branch(&self, condition: NodeIndex, visited: &mut HashSet<NodeIndex>) -> Vec<NodeIndex> {
        let starts: Vec<NodeIndex> = self
            .ordered_edges(condition)
            .into_iter()
            .filter(|(handle, _)| *handle == Some(BranchHandle::No))
            .map(|(_, target)| target)
            .collect();

        self.walk(&starts, visited)
    }

    /// Preorder DFS following connections in declaration order
    fn walk(&self, starts: &[NodeIndex], visited: &mut HashSet<NodeIndex>) -> Vec<NodeIndex> {
        let mut order = Vec::new();

        for &start in starts {
            let mut stack = vec![start];
            while let Some(index) = stack.pop() {
                if !visited.insert(index) {
                    continue;
                }
                order.push(index);

                let next: Vec<NodeIndex> = self
                    .ordered_edges(index)
                    .into_iter()
                    .filter(|(handle, _)| *handle != Some(BranchHandle::No))
                    .map(|(_, target)| target)
                    .collect();
                stack.extend(next.into_iter().rev());
            }
        }

        order
    }

    /// Outgoing edges in the order their connections were declared
    fn ordered_edges(&self, index: NodeIndex) -> Vec<(Option<BranchHandle>, NodeIndex)> {
        let mut edges: Vec<_> = self
            .graph
            .edges(index)
            .map(|edge| (edge.id().index(), *edge.weight(), edge.target()))
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges.into_iter().map(|(_, handle, target)| (handle, target)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::Connection;
    use chrono::Utc;
    use serde_json::json;

    fn workflow(steps: Vec<Step>, connections: Vec<Connection>) -> Workflow {
        Workflow {
            id: "wf".to_string(),
            name: "test".to_string(),
            description: None,
            company_id: None,
            steps,
            connections,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn step(id: &str, step_type: StepType) -> Step {
        Step::new(id, step_type, json!({}))
    }

    fn ids(graph: &StepGraph, order: &[NodeIndex]) -> Vec<String> {
        order.iter().map(|&i| graph.step(i).id.clone()).collect()
    }

    #[test]
    fn linear_chain_runs_in_chain_order() {
        let wf = workflow(
            vec![
                step("a3", StepType::Action),
                step("t", StepType::Trigger),
                step("a1", StepType::Action),
                step("a2", StepType::Action),
            ],
            vec![Connection::new("t", "a1"), Connection::new("a1", "a2"), Connection::new("a2", "a3")],
        );
        let graph = StepGraph::build(&wf).unwrap();
        assert_eq!(ids(&graph, &graph.main_flow()), vec!["t", "a1", "a2", "a3"]);
    }

    #[test]
    fn diamond_runs_shared_descendant_once() {
        let wf = workflow(
            vec![
                step("t", StepType::Trigger),
                step("b", StepType::Action),
                step("c", StepType::Action),
                step("d", StepType::Action),
            ],
            vec![
                Connection::new("t", "b"),
                Connection::new("t", "c"),
                Connection::new("b", "d"),
                Connection::new("c", "d"),
            ],
        );
        let graph = StepGraph::build(&wf).unwrap();
        assert_eq!(ids(&graph, &graph.main_flow()), vec!["t", "b", "d", "c"]);
    }

    #[test]
    fn cycle_terminates_but_fails_validation() {
        let wf = workflow(
            vec![step("t", StepType::Trigger), step("a", StepType::Action), step("b", StepType::Action)],
            vec![Connection::new("t", "a"), Connection::new("a", "b"), Connection::new("b", "a")],
        );
        let graph = StepGraph::build(&wf).unwrap();
        assert_eq!(ids(&graph, &graph.main_flow()), vec!["t", "a", "b"]);
        assert!(matches!(graph.validate(), Err(WorkflowError::Invalid(_))));
    }

    #[test]
    fn no_edges_are_excluded_from_main_flow() {
        let wf = workflow(
            vec![
                step("t", StepType::Trigger),
                step("c", StepType::Condition),
                step("yes", StepType::Action),
                step("no", StepType::Action),
                step("no_next", StepType::Action),
            ],
            vec![
                Connection::new("t", "c"),
                Connection::branch("c", "yes", BranchHandle::Yes),
                Connection::branch("c", "no", BranchHandle::No),
                Connection::new("no", "no_next"),
            ],
        );
        let graph = StepGraph::build(&wf).unwrap();
        assert_eq!(ids(&graph, &graph.main_flow()), vec!["t", "c", "yes"]);

        let condition = graph.index_of("c").unwrap();
        let mut visited = HashSet::new();
        assert_eq!(ids(&graph, &graph.no_branch(condition, &mut visited)), vec!["no", "no_next"]);
    }

    #[test]
    fn build_rejects_dangling_connections_and_duplicate_ids() {
        let dangling = workflow(vec![step("t", StepType::Trigger)], vec![Connection::new("t", "ghost")]);
        assert!(matches!(StepGraph::build(&dangling), Err(WorkflowError::Invalid(_))));

        let duplicate = workflow(vec![step("t", StepType::Trigger), step("t", StepType::Action)], vec![]);
        assert!(matches!(StepGraph::build(&duplicate), Err(WorkflowError::Invalid(_))));
    }

    #[test]
    fn validate_requires_a_trigger() {
        let wf = workflow(vec![step("a", StepType::Action)], vec![]);
        let graph = StepGraph::build(&wf).unwrap();
        assert!(matches!(graph.validate(), Err(WorkflowError::Invalid(_))));
    }
}
