//! Value types and derivation-node identity.
//!
//! Rows are modelled as tagged tuples over a small enum of value types
//! rather than a generic/duck-typed map, matching the fixed patient
//! schema: every column is either free text or an integer (only
//! `Patient.Age` is integer-typed in the reference schema).

use std::fmt;

/// An atomic column value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Text(String),
    Int(i64),
}

impl Value {
    pub fn as_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Int(i) => i.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// A fully-qualified fact identity: "tuple `relation(subject, constant)` exists".
///
/// This is the typed replacement for the `R:k:c` colon-joined strings used
/// by the on-disk graph/path formats (§9 design notes); those strings are
/// produced and parsed only at the serialization boundary (see [`crate::serialize`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DerivationNode {
    pub relation: String,
    pub subject: String,
    pub constant: String,
}

impl DerivationNode {
    pub fn new(relation: impl Into<String>, subject: impl Into<String>, constant: impl Into<String>) -> Self {
        DerivationNode {
            relation: relation.into(),
            subject: subject.into(),
            constant: constant.into(),
        }
    }

    /// Canonical `relation:subject:constant` form used in graphs.txt, paths.txt
    /// and union_greedy.txt. Colons within a field are escaped as `\:` so the
    /// round trip through [`DerivationNode::parse`] is exact.
    pub fn to_node_string(&self) -> String {
        format!(
            "{}:{}:{}",
            escape(&self.relation),
            escape(&self.subject),
            escape(&self.constant)
        )
    }

    /// Parses a `relation:subject:constant` node string back into its parts.
    pub fn parse(s: &str) -> Option<DerivationNode> {
        let parts = split_escaped(s);
        if parts.len() != 3 {
            return None;
        }
        Some(DerivationNode {
            relation: parts[0].clone(),
            subject: parts[1].clone(),
            constant: parts[2].clone(),
        })
    }
}

impl fmt::Display for DerivationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_node_string())
    }
}

fn escape(field: &str) -> String {
    field.replace('\\', "\\\\").replace(':', "\\:")
}

fn split_escaped(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(&next) = chars.peek() {
                    current.push(next);
                    chars.next();
                }
            }
            ':' => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_round_trips_through_its_string_form() {
        let node = DerivationNode::new("Illness", "Lukas", "HIV_Positive");
        let s = node.to_node_string();
        assert_eq!(s, "Illness:Lukas:HIV_Positive");
        assert_eq!(DerivationNode::parse(&s).unwrap(), node);
    }

    #[test]
    fn node_escapes_embedded_colons() {
        let node = DerivationNode::new("R", "a:b", "c");
        let s = node.to_node_string();
        assert_eq!(DerivationNode::parse(&s).unwrap(), node);
    }
}
