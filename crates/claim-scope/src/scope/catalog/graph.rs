use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::{CatalogError, LineItemRule, RuleEdges, RuleId};

/// Rejects catalogs whose auto-add or replacement relations loop back on themselves.
pub(super) fn reject_cycles(rules: &[LineItemRule], edges: &[RuleEdges]) -> Result<(), CatalogError> {
    check_relation(rules, edges, "auto-add", |rule_edges| &rule_edges.auto_adds)?;
    check_relation(rules, edges, "replacement", |rule_edges| &rule_edges.replaces)
}

fn check_relation(
    rules: &[LineItemRule],
    edges: &[RuleEdges],
    relation: &'static str,
    targets: impl Fn(&RuleEdges) -> &Vec<RuleId>,
) -> Result<(), CatalogError> {
    let graph = build_relation_graph(edges, targets);
    toposort(&graph, None).map(|_| ()).map_err(|cycle| {
        let id = graph[cycle.node_id()];
        CatalogError::Cycle {
            relation,
            code: rules[id.0].code.clone(),
        }
    })
}

/// Builds a petgraph DiGraph with one node per rule, in arena order.
fn build_relation_graph(
    edges: &[RuleEdges],
    targets: impl Fn(&RuleEdges) -> &Vec<RuleId>,
) -> DiGraph<RuleId, ()> {
    let mut graph = DiGraph::with_capacity(edges.len(), edges.len());
    let nodes: Vec<NodeIndex> = (0..edges.len())
        .map(|position| graph.add_node(RuleId(position)))
        .collect();

    for (position, rule_edges) in edges.iter().enumerate() {
        for target in targets(rule_edges) {
            graph.add_edge(nodes[position], nodes[target.0], ());
        }
    }

    graph
}
