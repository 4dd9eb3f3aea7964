//! External file formats (§6): graphs.txt, paths.txt and
//! union_greedy.txt. rules.txt and C.txt are read as plain UTF-8 text
//! and handed to [`crate::rules::parse_rules`]/[`crate::rules::parse_roots`]
//! directly — no extra framing beyond the grammar they already define.

use crate::derivation::ProofGraph;
use crate::value::DerivationNode;

/// Serializes one proof DAG as a `graphs.txt` block:
/// `graph = {\n  'node': ['succ1', 'succ2'],\n...}\n\n`.
pub fn write_graph_block(graph: &ProofGraph) -> String {
    let mut out = String::from("graph = {\n");
    let mut nodes: Vec<&DerivationNode> = graph.keys().collect();
    nodes.sort();
    for node in nodes {
        let successors = &graph[node];
        let succ_str = successors
            .iter()
            .map(|s| format!("'{}'", s.to_node_string()))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("  '{}': [{}],\n", node.to_node_string(), succ_str));
    }
    out.push_str("}\n\n");
    out
}

/// Serializes every proof DAG produced for a run into `graphs.txt`'s
/// concatenated-block form.
pub fn write_graphs(graphs: &[ProofGraph]) -> String {
    graphs.iter().map(write_graph_block).collect()
}

/// Parses `graphs.txt` back into its proof DAGs.
pub fn read_graphs(text: &str) -> Vec<ProofGraph> {
    let node_line = regex::Regex::new(r"^\s*'((?:[^'\\]|\\.)*)'\s*:\s*\[(.*)\]\s*,?\s*$").unwrap();
    let quoted = regex::Regex::new(r"'((?:[^'\\]|\\.)*)'").unwrap();

    let mut graphs = Vec::new();
    let mut current: Option<ProofGraph> = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed == "graph = {" {
            current = Some(ProofGraph::new());
            continue;
        }
        if trimmed == "}" {
            if let Some(g) = current.take() {
                graphs.push(g);
            }
            continue;
        }
        if let Some(g) = current.as_mut() {
            if let Some(caps) = node_line.captures(trimmed) {
                let node_str = unescape_single_quotes(&caps[1]);
                let Some(node) = DerivationNode::parse(&node_str) else { continue };
                let successors = quoted
                    .captures_iter(&caps[2])
                    .filter_map(|c| DerivationNode::parse(&unescape_single_quotes(&c[1])))
                    .collect::<Vec<_>>();
                g.insert(node, successors);
            }
        }
    }
    graphs
}

fn unescape_single_quotes(s: &str) -> String {
    s.replace("\\'", "'").replace("\\\\", "\\")
}

/// Serializes one proof group (a list of paths, each a list of node
/// strings) in `paths.txt`'s literal nested-list form.
fn write_path_group(group: &[Vec<DerivationNode>]) -> String {
    let paths = group
        .iter()
        .map(|path| {
            let nodes = path
                .iter()
                .map(|n| format!("'{}'", n.to_node_string()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{nodes}]")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{paths}]")
}

/// Serializes the full list of groups produced by C6 into `paths.txt`.
pub fn write_paths(groups: &[Vec<Vec<DerivationNode>>]) -> String {
    let rendered = groups.iter().map(|g| write_path_group(g)).collect::<Vec<_>>().join(",\n ");
    format!("[{rendered}]\n")
}

/// Serializes a hitting set into `union_greedy.txt`'s literal list form.
pub fn write_union_greedy(nodes: &[DerivationNode]) -> String {
    let rendered = nodes
        .iter()
        .map(|n| format!("'{}'", n.to_node_string()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{rendered}]\n")
}

/// A minimal recursive-descent parser for the Python-literal-list shape
/// shared by paths.txt and union_greedy.txt: nested `[...]` of
/// single-quoted strings separated by commas.
enum ListLiteral {
    Str(String),
    List(Vec<ListLiteral>),
}

fn parse_list_literal(text: &str) -> Option<ListLiteral> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut pos = 0;
    let value = parse_value(&chars, &mut pos)?;
    Some(value)
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn parse_value(chars: &[char], pos: &mut usize) -> Option<ListLiteral> {
    skip_ws(chars, pos);
    match chars.get(*pos) {
        Some('[') => {
            *pos += 1;
            let mut items = Vec::new();
            loop {
                skip_ws(chars, pos);
                if chars.get(*pos) == Some(&']') {
                    *pos += 1;
                    break;
                }
                items.push(parse_value(chars, pos)?);
                skip_ws(chars, pos);
                match chars.get(*pos) {
                    Some(',') => {
                        *pos += 1;
                    }
                    Some(']') => {
                        *pos += 1;
                        break;
                    }
                    _ => return None,
                }
            }
            Some(ListLiteral::List(items))
        }
        Some('\'') => {
            *pos += 1;
            let mut s = String::new();
            while let Some(&c) = chars.get(*pos) {
                if c == '\\' {
                    if let Some(&next) = chars.get(*pos + 1) {
                        s.push(next);
                        *pos += 2;
                        continue;
                    }
                }
                if c == '\'' {
                    *pos += 1;
                    break;
                }
                s.push(c);
                *pos += 1;
            }
            Some(ListLiteral::Str(s))
        }
        _ => None,
    }
}

/// Parses `union_greedy.txt` into its flat list of nodes.
pub fn read_union_greedy(text: &str) -> Vec<DerivationNode> {
    match parse_list_literal(text) {
        Some(ListLiteral::List(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                ListLiteral::Str(s) => DerivationNode::parse(&s),
                ListLiteral::List(_) => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Parses `paths.txt` into its list of groups of paths of nodes.
pub fn read_paths(text: &str) -> Vec<Vec<Vec<DerivationNode>>> {
    let to_nodes = |items: Vec<ListLiteral>| -> Vec<DerivationNode> {
        items
            .into_iter()
            .filter_map(|item| match item {
                ListLiteral::Str(s) => DerivationNode::parse(&s),
                ListLiteral::List(_) => None,
            })
            .collect()
    };
    match parse_list_literal(text) {
        Some(ListLiteral::List(groups)) => groups
            .into_iter()
            .map(|group| match group {
                ListLiteral::List(paths) => paths
                    .into_iter()
                    .map(|path| match path {
                        ListLiteral::List(nodes) => to_nodes(nodes),
                        ListLiteral::Str(_) => Vec::new(),
                    })
                    .collect(),
                ListLiteral::Str(_) => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(r: &str, k: &str, c: &str) -> DerivationNode {
        DerivationNode::new(r, k, c)
    }

    #[test]
    fn graph_block_round_trips() {
        let root = node("Illness", "Lukas", "HIV_Positive");
        let a = node("Treatment", "Lukas", "TreatA");
        let mut graph = ProofGraph::new();
        graph.insert(a, vec![root.clone()]);
        graph.insert(root, vec![]);

        let text = write_graphs(&[graph]);
        let parsed = read_graphs(&text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].len(), 2);
    }

    #[test]
    fn union_greedy_round_trips() {
        let nodes = vec![node("Treatment", "Lukas", "TreatA"), node("Illness", "Klara", "Influenza")];
        let text = write_union_greedy(&nodes);
        let parsed = read_union_greedy(&text);
        assert_eq!(parsed, nodes);
    }

    #[test]
    fn paths_round_trip() {
        let groups = vec![vec![vec![node("Treatment", "Lukas", "TreatA")]]];
        let text = write_paths(&groups);
        let parsed = read_paths(&text);
        assert_eq!(parsed, groups);
    }
}
