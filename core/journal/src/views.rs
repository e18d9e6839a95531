use moodring_schemas::{
    GraphEdge, GraphNode, Influence, InfluenceGraph, InfluenceId, InfluenceLink, LinkedInfluence,
    TimelineEntry,
};
use std::collections::HashMap;

/// Pair each influence with what it leads to and where it comes from.
/// Links whose far end is missing are left out.
pub fn timeline(influences: &[Influence], links: &[InfluenceLink]) -> Vec<TimelineEntry> {
    let by_id: HashMap<InfluenceId, &Influence> = influences.iter().map(|i| (i.id, i)).collect();

    let linked = |link: &InfluenceLink, other: InfluenceId| {
        by_id.get(&other).map(|i| LinkedInfluence {
            link_id: link.id,
            influence_id: i.id,
            content: i.content.clone(),
        })
    };

    influences
        .iter()
        .map(|influence| TimelineEntry {
            influence: influence.clone(),
            leads_to: links
                .iter()
                .filter(|l| l.source_id == influence.id)
                .filter_map(|l| linked(l, l.target_id))
                .collect(),
            from: links
                .iter()
                .filter(|l| l.target_id == influence.id)
                .filter_map(|l| linked(l, l.source_id))
                .collect(),
        })
        .collect()
}

/// Node/edge form for graph rendering. Edges with a missing endpoint are dropped.
pub fn build_graph(influences: &[Influence], links: &[InfluenceLink]) -> InfluenceGraph {
    let nodes: Vec<GraphNode> = influences
        .iter()
        .map(|i| GraphNode {
            id: i.id,
            name: i.content.clone(),
        })
        .collect();

    let known = |id: InfluenceId| nodes.iter().any(|n| n.id == id);
    let links = links
        .iter()
        .filter(|l| known(l.source_id) && known(l.target_id))
        .map(|l| GraphEdge {
            source: l.source_id,
            target: l.target_id,
        })
        .collect();

    InfluenceGraph { nodes, links }
}
