//! Reference consolidation: merges per-node citation maps into one global map.
//!
//! Walks answered search nodes in insertion order. Each node's local citation numbers
//! are renumbered to the next unused global numbers (order of first `[[n]]` appearance
//! in the text, then uncited map entries ascending), its markers are rewritten, and its
//! text is appended under a `## <query>` heading. Pure: the same snapshot always yields
//! the same output.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::graph::{GraphSnapshot, Node};

/// Global citation number -> URL.
pub type ReferenceMap = BTreeMap<u32, String>;

static CITATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(\d+)\]\]").expect("citation marker pattern"));

/// A node left out of the consolidated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
    pub node_id: String,
    pub reason: String,
}

/// Output of [`consolidate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consolidated {
    /// Node sections joined by blank lines.
    pub text: String,
    pub references: ReferenceMap,
    /// Node ids that contributed a section, in order.
    pub nodes: Vec<String>,
    pub skipped: Vec<SkippedNode>,
}

/// Consolidates all answered search nodes of `snapshot`.
pub fn consolidate(snapshot: &GraphSnapshot) -> Consolidated {
    let mut out = Consolidated::default();
    let mut sections = Vec::new();
    let mut next_number: u32 = 1;

    for node in snapshot.answered_nodes() {
        match renumber_node(node, next_number) {
            Ok(section) => {
                next_number += section.assigned;
                out.references.extend(section.references);
                sections.push(format!("## {}\n\n{}", node.content, section.text));
                out.nodes.push(node.id.clone());
            }
            Err(reason) => {
                tracing::warn!(node_id = %node.id, %reason, "node skipped during consolidation");
                out.skipped.push(SkippedNode {
                    node_id: node.id.clone(),
                    reason,
                });
            }
        }
    }

    out.text = sections.join("\n\n");
    tracing::debug!(
        nodes = out.nodes.len(),
        urls = out.references.len(),
        skipped = out.skipped.len(),
        "references consolidated"
    );
    out
}

struct NodeSection {
    text: String,
    references: ReferenceMap,
    /// Global numbers consumed by this node.
    assigned: u32,
}

fn renumber_node(node: &Node, first: u32) -> Result<NodeSection, String> {
    let answer = node.result.as_ref().ok_or("no answer")?;
    if answer.text.trim().is_empty() {
        return Err("empty answer text".to_string());
    }
    if let Some((n, _)) = answer.citations.iter().find(|(_, url)| url.trim().is_empty()) {
        return Err(format!("citation {} has no url", n));
    }

    // Local order: first appearance in the text, then uncited map keys.
    let mut order: Vec<u32> = Vec::new();
    for caps in CITATION_MARKER.captures_iter(&answer.text) {
        // Numbers too large for u32 stay as literal text.
        if let Ok(n) = caps[1].parse::<u32>() {
            if !order.contains(&n) {
                order.push(n);
            }
        }
    }
    for n in answer.citations.keys() {
        if !order.contains(n) {
            order.push(*n);
        }
    }

    let mapping: HashMap<u32, u32> = order
        .iter()
        .enumerate()
        .map(|(idx, local)| (*local, first + idx as u32))
        .collect();

    let mut references = ReferenceMap::new();
    for local in &order {
        match answer.citations.get(local) {
            Some(url) => {
                references.insert(mapping[local], url.clone());
            }
            None => {
                tracing::warn!(node_id = %node.id, citation = local, "citation marker without url");
            }
        }
    }

    let text = CITATION_MARKER
        .replace_all(&answer.text, |caps: &Captures| {
            match caps[1].parse::<u32>().ok().and_then(|n| mapping.get(&n)) {
                Some(global) => format!("[[{}]]", global),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    Ok(NodeSection {
        text,
        references,
        assigned: order.len() as u32,
    })
}
