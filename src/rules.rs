//! Rule Loader (C2)
//!
//! Parses the two text inputs of a run: `rules.txt` (tuple-generating
//! dependencies) and `C.txt` (sensitive roots). Grammar per §6:
//!
//! ```text
//! rule := body "->" atom
//! body := atom { ("∧" | "AND") atom }
//! atom := IDENT "(" "n" "," "'" CONST "'" ")"
//! root := IDENT "[" "'" CONST "'" "]"
//! ```
//!
//! Comments begin with `#`; blank lines are skipped. A malformed line is
//! logged and dropped — no fatal failure, per §7.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use thiserror::Error;

/// One body or head atom: `Relation(n, 'constant')`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub relation: String,
    pub constant: String,
}

/// A tuple-generating dependency: `body[0] ∧ … ∧ body[k] -> head`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub body: Vec<Atom>,
    pub head: Atom,
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule graph is cyclic: edge {from} -> {to} closes a cycle")]
    CyclicRuleGraph { from: String, to: String },
}

fn atom_regex() -> Regex {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\(n,\s*'([^']*)'\)$").unwrap()
}

fn root_regex() -> Regex {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\['([^']*)'\]$").unwrap()
}

/// Strips a trailing `# …` comment, honouring the fact that `#` never
/// appears inside a constant (constants exclude apostrophes, not `#`;
/// in practice this is a simple trailing-comment cut since the grammar
/// has no other use for `#`).
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_atom(text: &str, known_relations: &HashSet<String>) -> Option<Atom> {
    let caps = atom_regex().captures(text.trim())?;
    let relation = caps[1].to_string();
    let constant = caps[2].to_string();
    if !known_relations.contains(&relation) {
        tracing::warn!(relation = %relation, "rule atom references unknown relation, skipping");
        return None;
    }
    Some(Atom { relation, constant })
}

/// Parses `rules.txt`. Malformed or unresolvable lines are skipped with a
/// warning; parsing never fails.
pub fn parse_rules(text: &str, known_relations: &HashSet<String>) -> Vec<Rule> {
    let mut rules = Vec::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let Some((body_text, head_text)) = line.split_once("->") else {
            tracing::warn!(line = lineno + 1, "rule line has no '->', skipping");
            continue;
        };
        let body_atoms_text: Vec<&str> = body_text
            .split(|c| c == '∧')
            .flat_map(|s| split_and(s))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if body_atoms_text.is_empty() || body_atoms_text.len() > 4 {
            tracing::warn!(line = lineno + 1, count = body_atoms_text.len(), "rule body size out of [1,4], skipping");
            continue;
        }
        let mut body = Vec::with_capacity(body_atoms_text.len());
        let mut ok = true;
        for atom_text in &body_atoms_text {
            match parse_atom(atom_text, known_relations) {
                Some(atom) => body.push(atom),
                None => {
                    tracing::warn!(line = lineno + 1, atom = %atom_text, "malformed or unknown body atom, skipping rule");
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }
        let Some(head) = parse_atom(head_text.trim(), known_relations) else {
            tracing::warn!(line = lineno + 1, "malformed or unknown head atom, skipping rule");
            continue;
        };
        rules.push(Rule { body, head });
    }
    rules
}

/// Splits a segment on the literal `AND` connective (word-bounded so it
/// never matches inside a constant or identifier).
fn split_and(segment: &str) -> Vec<&str> {
    let and_re = Regex::new(r"\bAND\b").unwrap();
    and_re.split(segment).collect()
}

/// Parses `C.txt` into an ordered, deduplicated list of sensitive roots.
pub fn parse_roots(text: &str, known_relations: &HashSet<String>) -> Vec<Atom> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = root_regex().captures(line) else {
            tracing::warn!(line = lineno + 1, "malformed root line, skipping");
            continue;
        };
        let relation = caps[1].to_string();
        let constant = caps[2].to_string();
        if !known_relations.contains(&relation) {
            tracing::warn!(relation = %relation, line = lineno + 1, "root references unknown relation, skipping");
            continue;
        }
        let atom = Atom { relation, constant };
        if seen.insert(atom.clone()) {
            roots.push(atom);
        }
    }
    roots
}

/// Indexes rules by head `(relation, constant) -> [bodies]`, the shape
/// C5 needs for backward expansion.
pub fn index_by_head(rules: &[Rule]) -> HashMap<(String, String), Vec<Vec<Atom>>> {
    let mut index: HashMap<(String, String), Vec<Vec<Atom>>> = HashMap::new();
    for rule in rules {
        index
            .entry((rule.head.relation.clone(), rule.head.constant.clone()))
            .or_default()
            .push(rule.body.clone());
    }
    index
}

/// Sanity-checks I.3: the (body-relation → head-relation) edge graph
/// induced by `rules` must be a DAG. The core *assumes* this holds (an
/// external generator is responsible for guaranteeing it) — this is a
/// best-effort check run on load, not a hard gate, so that a
/// self-referential rule (handled safely by C5's visited set) does not
/// abort an otherwise-valid run.
pub fn assert_acyclic(rules: &[Rule]) -> Result<(), RuleError> {
    let mut edges: HashMap<String, HashSet<String>> = HashMap::new();
    for rule in rules {
        for atom in &rule.body {
            edges
                .entry(atom.relation.clone())
                .or_default()
                .insert(rule.head.relation.clone());
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<String, Mark> = HashMap::new();

    fn visit(
        node: &str,
        edges: &HashMap<String, HashSet<String>>,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Result<(), RuleError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(RuleError::CyclicRuleGraph {
                    from: stack.last().cloned().unwrap_or_default(),
                    to: node.to_string(),
                })
            }
            None => {}
        }
        marks.insert(node.to_string(), Mark::Visiting);
        stack.push(node.to_string());
        if let Some(successors) = edges.get(node) {
            for next in successors {
                visit(next, edges, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(node.to_string(), Mark::Done);
        Ok(())
    }

    let mut stack = Vec::new();
    let nodes: Vec<String> = edges.keys().cloned().collect();
    for node in nodes {
        visit(&node, &edges, &mut marks, &mut stack)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relations() -> HashSet<String> {
        ["Illness", "Treatment"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_conjunctive_body_with_unicode_and() {
        let rules = parse_rules(
            "Treatment(n, 'TreatA') ∧ Treatment(n, 'TreatB') -> Illness(n, 'HIV_Positive')",
            &relations(),
        );
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].body.len(), 2);
        assert_eq!(rules[0].head.constant, "HIV_Positive");
    }

    #[test]
    fn parses_conjunctive_body_with_literal_and() {
        let rules = parse_rules(
            "Treatment(n, 'TreatA') AND Treatment(n, 'TreatB') -> Illness(n, 'HIV_Positive')",
            &relations(),
        );
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].body.len(), 2);
    }

    #[test]
    fn skips_comment_and_blank_lines() {
        let rules = parse_rules("# a comment\n\nIllness(n,'HIV_Positive') -> Illness(n,'Aids')", &relations());
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn skips_rule_referencing_unknown_relation() {
        let rules = parse_rules("Bogus(n,'x') -> Illness(n,'Aids')", &relations());
        assert!(rules.is_empty());
    }

    #[test]
    fn parses_roots_and_deduplicates() {
        let roots = parse_roots("Illness['HIV_Positive']\nIllness['HIV_Positive']\n", &relations());
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn detects_cyclic_rule_graph() {
        let rules = vec![Rule {
            body: vec![Atom { relation: "Illness".to_string(), constant: "x".to_string() }],
            head: Atom { relation: "Illness".to_string(), constant: "x".to_string() },
        }];
        assert!(assert_acyclic(&rules).is_err());
    }

    #[test]
    fn accepts_acyclic_rule_graph() {
        let rules = vec![Rule {
            body: vec![Atom { relation: "Treatment".to_string(), constant: "TreatA".to_string() }],
            head: Atom { relation: "Illness".to_string(), constant: "HIV_Positive".to_string() },
        }];
        assert!(assert_acyclic(&rules).is_ok());
    }
}
