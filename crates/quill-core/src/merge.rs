//! Tree Merger: fold a new partial tree into an accumulated one.

use std::collections::HashMap;

use crate::tree::ArtifactNode;

/// Merge `incoming` over `base` without mutating either.
///
/// Names absent from `base` are appended in incoming order. Two folders with
/// the same name merge their children recursively; any other collision is
/// resolved by the incoming node replacing the existing one in place.
pub fn merge_trees(base: &[ArtifactNode], incoming: &[ArtifactNode]) -> Vec<ArtifactNode> {
    if base.is_empty() {
        return incoming.to_vec();
    }
    if incoming.is_empty() {
        return base.to_vec();
    }

    let mut merged = base.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, node)| (node.name().to_string(), i))
        .collect();

    for node in incoming {
        match index.get(node.name()).copied() {
            None => {
                index.insert(node.name().to_string(), merged.len());
                merged.push(node.clone());
            }
            Some(i) => {
                let replacement = match (&merged[i], node) {
                    (
                        ArtifactNode::Folder { name, children: old },
                        ArtifactNode::Folder { children: new, .. },
                    ) => ArtifactNode::Folder {
                        name: name.clone(),
                        children: merge_trees(old, new),
                    },
                    _ => node.clone(),
                };
                merged[i] = replacement;
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(name: &str, text: &str) -> ArtifactNode {
        ArtifactNode::file("md", name, text)
    }

    #[test]
    fn empty_sides_are_identity() {
        let t = vec![f("a.md", "1"), ArtifactNode::folder("d", vec![f("b.md", "2")])];
        assert_eq!(merge_trees(&t, &[]), t);
        assert_eq!(merge_trees(&[], &t), t);
    }

    #[test]
    fn later_merges_win_and_untouched_names_survive() {
        let t = vec![f("keep.md", "t"), f("x.md", "t")];
        let a = vec![f("x.md", "a"), f("only-a.md", "a")];
        let b = vec![f("x.md", "b")];
        let out = merge_trees(&merge_trees(&t, &a), &b);
        assert_eq!(out, vec![f("keep.md", "t"), f("x.md", "b"), f("only-a.md", "a")]);
    }

    #[test]
    fn folders_union_their_children() {
        let base = vec![ArtifactNode::folder("src", vec![f("a.ts", "a")])];
        let incoming = vec![ArtifactNode::folder("src", vec![f("b.ts", "b"), f("a.ts", "a2")])];
        let out = merge_trees(&base, &incoming);
        assert_eq!(
            out,
            vec![ArtifactNode::folder("src", vec![f("a.ts", "a2"), f("b.ts", "b")])]
        );
    }

    #[test]
    fn kind_mismatch_replaces_wholesale() {
        let base = vec![ArtifactNode::folder("docs", vec![f("a.md", "a")])];
        let incoming = vec![f("docs", "flat")];
        assert_eq!(merge_trees(&base, &incoming), incoming);
    }

    #[test]
    fn inputs_are_not_mutated() {
        let base = vec![f("x.md", "old")];
        let incoming = vec![f("x.md", "new")];
        let _ = merge_trees(&base, &incoming);
        assert_eq!(base[0].text(), Some("old"));
    }
}
