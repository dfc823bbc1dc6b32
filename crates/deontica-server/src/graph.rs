//! Dependency graph of stored clauses, in the node/edge shape the UI lays out
//!
//! Clauses link to the actor they bind and the article that defines them.
//! A clause whose condition mentions another clause's actor depends on it
//! (`condition`); failing that, mentioning its object also counts
//! (`requires`). Matching is case-insensitive substring matching.

use deontica_domain::Clause;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

const TEXT_PREVIEW_CHARS: usize = 100;

/// Node position; the UI computes the real layout
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Position {
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
}

/// A graph node
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    /// Node id
    pub id: String,
    /// `clause`, `actor` or `article`
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Node payload for the UI
    pub data: Value,
    /// Placeholder position
    pub position: Position,
}

/// A graph edge
#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    /// Edge id
    pub id: String,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// `actor_edge`, `article_edge` or `dependency`
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `binds`, `defines`, `condition` or `requires`
    pub label: &'static str,
}

/// Graph counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    /// Clause nodes
    pub total_clauses: usize,
    /// Distinct actors
    pub total_actors: usize,
    /// Distinct articles
    pub total_articles: usize,
    /// All edges
    pub total_edges: usize,
}

/// Graph payload returned by the API
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    /// Clause nodes first, then actor nodes, then article nodes
    pub nodes: Vec<GraphNode>,
    /// All edges
    pub edges: Vec<GraphEdge>,
    /// Counts
    pub stats: GraphStats,
}

/// Build the dependency graph of the given clauses
pub fn build_graph(clauses: &[Clause]) -> Graph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut actor_nodes: Vec<GraphNode> = Vec::new();
    let mut actor_ids: HashMap<String, String> = HashMap::new();
    let mut article_nodes: Vec<GraphNode> = Vec::new();

    for clause in clauses {
        let clause_id = clause.clause_id.to_string();
        let actor = clause.display_actor();
        let article = clause.article_id.as_deref().filter(|a| !a.is_empty());

        nodes.push(GraphNode {
            id: clause_id.clone(),
            kind: "clause",
            data: json!({
                "label": format!(
                    "{}: {}",
                    article.unwrap_or("Unknown"),
                    clause.actor.as_deref().unwrap_or("Unknown")
                ),
                "modality": clause.modality.map(|m| m.as_str()).unwrap_or("UNKNOWN"),
                "actor": actor,
                "object": clause.object.as_deref().unwrap_or(""),
                "article_id": article,
                "condition": clause.condition,
                "formula": clause.deontic_formula().unwrap_or(""),
                "text": preview(&clause.text),
            }),
            position: Position::default(),
        });

        if let Some(actor) = actor {
            let actor_node_id = actor_ids
                .entry(actor.to_string())
                .or_insert_with(|| {
                    let id = format!("actor_{}", actor_nodes.len());
                    actor_nodes.push(GraphNode {
                        id: id.clone(),
                        kind: "actor",
                        data: json!({"label": actor, "type": "actor"}),
                        position: Position::default(),
                    });
                    id
                })
                .clone();
            edges.push(GraphEdge {
                id: format!("edge_{}_to_actor_{}", clause_id, actor),
                source: clause_id.clone(),
                target: actor_node_id,
                kind: "actor_edge",
                label: "binds",
            });
        }

        if let Some(article) = article {
            let article_node_id = format!("article_{}", article);
            if !article_nodes.iter().any(|n| n.id == article_node_id) {
                article_nodes.push(GraphNode {
                    id: article_node_id.clone(),
                    kind: "article",
                    data: json!({"label": format!("Article {}", article), "article_id": article}),
                    position: Position::default(),
                });
            }
            edges.push(GraphEdge {
                id: format!("edge_article_{}_to_{}", article, clause_id),
                source: article_node_id,
                target: clause_id.clone(),
                kind: "article_edge",
                label: "defines",
            });
        }
    }

    let total_actors = actor_nodes.len();
    let total_articles = article_nodes.len();
    nodes.extend(actor_nodes);
    nodes.extend(article_nodes);

    edges.extend(dependency_edges(clauses));

    Graph {
        stats: GraphStats {
            total_clauses: clauses.len(),
            total_actors,
            total_articles,
            total_edges: edges.len(),
        },
        nodes,
        edges,
    }
}

fn dependency_edges(clauses: &[Clause]) -> Vec<GraphEdge> {
    let mut edges = Vec::new();

    for (i, dependent) in clauses.iter().enumerate() {
        let Some(condition) = dependent.condition.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        let condition = condition.to_lowercase();
        let dependent_id = dependent.clause_id.to_string();

        for (j, other) in clauses.iter().enumerate() {
            if i == j {
                continue;
            }
            let other_id = other.clause_id.to_string();
            let actor = other.display_actor().map(str::to_lowercase);
            let object = other
                .object
                .as_deref()
                .filter(|o| !o.is_empty())
                .map(str::to_lowercase);

            if actor.is_some_and(|a| condition.contains(&a)) {
                edges.push(GraphEdge {
                    id: format!("dep_{}_on_{}", dependent_id, other_id),
                    source: other_id,
                    target: dependent_id.clone(),
                    kind: "dependency",
                    label: "condition",
                });
            } else if object.is_some_and(|o| condition.contains(&o)) {
                edges.push(GraphEdge {
                    id: format!("dep_{}_on_{}_obj", dependent_id, other_id),
                    source: other_id,
                    target: dependent_id.clone(),
                    kind: "dependency",
                    label: "requires",
                });
            }
        }
    }
    edges
}

fn preview(text: &str) -> String {
    if text.chars().count() > TEXT_PREVIEW_CHARS {
        let mut short: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
        short.push_str("...");
        short
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deontica_domain::Modality;

    fn clause(text: &str, article: &str, actor: &str, object: &str) -> Clause {
        let mut c = Clause::new(text).with_article(Some(article.to_string()));
        c.modality = Some(Modality::Obligation);
        c.actor = Some(actor.to_string());
        c.object = Some(object.to_string());
        c
    }

    #[test]
    fn test_empty_graph() {
        let graph = build_graph(&[]);
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.stats.total_clauses, 0);
    }

    #[test]
    fn test_actor_and_article_nodes_are_shared() {
        let a = clause("Providers shall keep logs.", "Art 12", "provider", "logs");
        let b = clause("Providers shall register.", "Art 49", "provider", "registration");
        let c = clause("Logs shall be automatic.", "Art 12", "high-risk AI system", "logging");

        let graph = build_graph(&[a.clone(), b, c]);

        assert_eq!(graph.stats.total_clauses, 3);
        assert_eq!(graph.stats.total_actors, 2);
        assert_eq!(graph.stats.total_articles, 2);
        assert_eq!(graph.nodes.len(), 7);
        assert_eq!(graph.nodes[3].id, "actor_0");
        assert_eq!(graph.nodes[4].id, "actor_1");
        assert_eq!(graph.nodes[5].id, "article_Art 12");

        let binds = graph.edges.iter().filter(|e| e.label == "binds").count();
        let defines = graph.edges.iter().filter(|e| e.label == "defines").count();
        assert_eq!((binds, defines), (3, 3));
        assert_eq!(graph.stats.total_edges, 6);

        let first = &graph.nodes[0];
        assert_eq!(first.data["label"], "Art 12: provider");
        assert_eq!(first.data["modality"], "OBLIGATION");
        assert_eq!(first.id, a.clause_id.to_string());
    }

    #[test]
    fn test_dependency_edges() {
        let provider = clause("Providers shall keep logs.", "Art 19", "Provider", "logs");
        let mut deployer = clause("Deployers shall monitor.", "Art 26", "deployer", "operation");
        deployer.condition = Some("where the PROVIDER has supplied instructions".to_string());
        let mut importer = clause("Importers shall verify.", "Art 23", "importer", "conformity");
        importer.condition = Some("once the logs are available".to_string());

        let graph = build_graph(&[provider.clone(), deployer.clone(), importer.clone()]);
        let deps: Vec<&GraphEdge> = graph.edges.iter().filter(|e| e.kind == "dependency").collect();

        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].label, "condition");
        assert_eq!(deps[0].source, provider.clause_id.to_string());
        assert_eq!(deps[0].target, deployer.clause_id.to_string());
        assert_eq!(deps[1].label, "requires");
        assert_eq!(deps[1].target, importer.clause_id.to_string());
        assert!(deps[1].id.ends_with("_obj"));
    }

    #[test]
    fn test_missing_fields_and_long_text() {
        let mut bare = Clause::new("x".repeat(150));
        bare.modality = None;
        let graph = build_graph(&[bare]);

        let data = &graph.nodes[0].data;
        assert_eq!(data["label"], "Unknown: Unknown");
        assert_eq!(data["modality"], "UNKNOWN");
        assert_eq!(data["formula"], "");
        assert_eq!(data["text"].as_str().unwrap().chars().count(), 103);
        assert!(graph.edges.is_empty());
    }
}
