use crate::market::categories::CategoryNode;
use serde::Serialize;

/// Two-level selection recovered from the single stored category id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCategory {
    pub category_id: String,
    pub subcategory_id: String,
}

impl ResolvedCategory {
    fn new(category_id: impl Into<String>, subcategory_id: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            subcategory_id: subcategory_id.into(),
        }
    }
}

/// Map a flat stored category id back onto the two-level tree.
///
/// A top-level match wins without inspecting its children. On a subcategory
/// match BOTH fields carry the stored id: the persisted convention stores the
/// leaf id and mirrors it, and the edit flow re-derives the display hierarchy
/// from `subcategory_id` alone. Unknown ids degrade to "top-level, no
/// subcategory" rather than erroring.
pub fn resolve(tree: &[CategoryNode], stored_id: &str) -> ResolvedCategory {
    if stored_id.is_empty() {
        return ResolvedCategory::new("", "");
    }

    for top in tree {
        if top.id == stored_id {
            return ResolvedCategory::new(stored_id, "");
        }
    }

    for top in tree {
        for sub in &top.categories {
            if sub.id == stored_id {
                return ResolvedCategory::new(stored_id, stored_id);
            }
        }
    }

    ResolvedCategory::new(stored_id, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::categories::SubcategoryNode;

    fn sample_tree() -> Vec<CategoryNode> {
        vec![
            CategoryNode {
                id: "A".into(),
                name: "Alpha".into(),
                slug: "alpha".into(),
                categories: vec![
                    SubcategoryNode {
                        id: "A1".into(),
                        name: "Alpha One".into(),
                        slug: "alpha-one".into(),
                    },
                    SubcategoryNode {
                        id: "A2".into(),
                        name: "Alpha Two".into(),
                        slug: "alpha-two".into(),
                    },
                ],
            },
            CategoryNode {
                id: "B".into(),
                name: "Beta".into(),
                slug: "beta".into(),
                categories: vec![SubcategoryNode {
                    id: "B1".into(),
                    name: "Beta One".into(),
                    slug: "beta-one".into(),
                }],
            },
        ]
    }

    #[test]
    fn empty_id_resolves_to_nothing() {
        let tree = sample_tree();
        assert_eq!(resolve(&tree, ""), ResolvedCategory::new("", ""));
    }

    #[test]
    fn top_level_match_has_no_subcategory() {
        let tree = sample_tree();
        assert_eq!(resolve(&tree, "A"), ResolvedCategory::new("A", ""));
    }

    #[test]
    fn leaf_match_mirrors_the_stored_id_into_both_fields() {
        let tree = sample_tree();
        assert_eq!(resolve(&tree, "A1"), ResolvedCategory::new("A1", "A1"));
        assert_eq!(resolve(&tree, "B1"), ResolvedCategory::new("B1", "B1"));
    }

    #[test]
    fn top_level_match_wins_over_child_scan() {
        // "B" is both a top-level id and could shadow a hypothetical child;
        // the top-level pass returns before any child is inspected.
        let mut tree = sample_tree();
        tree[0].categories.push(SubcategoryNode {
            id: "B".into(),
            name: "Shadowed".into(),
            slug: "shadowed".into(),
        });
        assert_eq!(resolve(&tree, "B"), ResolvedCategory::new("B", ""));
    }

    #[test]
    fn unknown_id_degrades_to_top_level() {
        let tree = sample_tree();
        assert_eq!(
            resolve(&tree, "nope"),
            ResolvedCategory::new("nope", "")
        );
    }

    #[test]
    fn empty_tree_is_total() {
        assert_eq!(resolve(&[], "X"), ResolvedCategory::new("X", ""));
    }
}
