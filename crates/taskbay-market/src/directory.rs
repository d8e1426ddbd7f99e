//! Category collaborator boundary.
//!
//! The platform's category tree lives outside the core; the market only
//! asks two questions of it.

use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    /// Does a top-level category with this id exist?
    async fn category_exists(&self, category: &str) -> bool;

    /// Is `subcategory` a child of `category`?
    async fn is_child_of(&self, subcategory: &str, category: &str) -> bool;
}

/// Fixed category tree seeded at startup. Stands in for the platform's
/// category service in the node and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCategoryDirectory {
    children: HashMap<String, Vec<String>>,
}

impl StaticCategoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(category, [subcategories])` pairs.
    pub fn from_tree<I, S>(tree: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let children = tree
            .into_iter()
            .map(|(cat, subs)| (cat.into(), subs.into_iter().map(Into::into).collect()))
            .collect();
        Self { children }
    }
}

#[async_trait]
impl CategoryDirectory for StaticCategoryDirectory {
    async fn category_exists(&self, category: &str) -> bool {
        self.children.contains_key(category)
    }

    async fn is_child_of(&self, subcategory: &str, category: &str) -> bool {
        self.children
            .get(category)
            .map(|subs| subs.iter().any(|s| s == subcategory))
            .unwrap_or(false)
    }
}
