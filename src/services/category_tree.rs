//! Arena view of the category forest.
//!
//! Nodes are owned by a map keyed by id; child lists are id vectors looked up by parent
//! id, so the structure never holds references between nodes.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::entities::category;

/// Nested snapshot used for the `/categories/tree` response.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: category::Model,
    pub children: Vec<CategoryNode>,
}

#[derive(Debug, Default, Clone)]
pub struct CategoryTree {
    nodes: HashMap<Uuid, category::Model>,
    children: HashMap<Option<Uuid>, Vec<Uuid>>,
}

impl CategoryTree {
    /// A category whose parent is missing from `categories` is treated as a root.
    pub fn build(categories: Vec<category::Model>) -> Self {
        let nodes: HashMap<Uuid, category::Model> =
            categories.into_iter().map(|c| (c.id, c)).collect();

        let mut children: HashMap<Option<Uuid>, Vec<Uuid>> = HashMap::new();
        for node in nodes.values() {
            let parent = node.parent_id.filter(|p| nodes.contains_key(p));
            children.entry(parent).or_default().push(node.id);
        }
        for ids in children.values_mut() {
            ids.sort_by(|a, b| {
                let (a, b) = (&nodes[a], &nodes[b]);
                a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name))
            });
        }

        Self { nodes, children }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&category::Model> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    fn child_ids(&self, parent: Option<Uuid>) -> &[Uuid] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roots(&self) -> Vec<&category::Model> {
        self.child_ids(None).iter().map(|id| &self.nodes[id]).collect()
    }

    pub fn children_of(&self, id: Uuid) -> Vec<&category::Model> {
        self.child_ids(Some(id))
            .iter()
            .map(|id| &self.nodes[id])
            .collect()
    }

    /// Every node below `id`, parents before children. `id` itself is excluded.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<Uuid> = self.child_ids(Some(id)).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.child_ids(Some(next)).iter().rev().copied());
        }
        out
    }

    /// The subtree rooted at `id` with children before their parent, ending with `id`.
    pub fn post_order(&self, id: Uuid) -> Vec<Uuid> {
        let mut order = self.descendants(id);
        order.reverse();
        order.push(id);
        order
    }

    /// True when `candidate` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, candidate: Uuid, ancestor: Uuid) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.nodes.get(&candidate).and_then(|c| c.parent_id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = self.nodes.get(&parent).and_then(|c| c.parent_id);
        }
        false
    }

    pub fn to_nested(&self) -> Vec<CategoryNode> {
        self.child_ids(None)
            .iter()
            .map(|id| self.nest(*id))
            .collect()
    }

    fn nest(&self, id: Uuid) -> CategoryNode {
        CategoryNode {
            category: self.nodes[&id].clone(),
            children: self
                .child_ids(Some(id))
                .iter()
                .map(|child| self.nest(*child))
                .collect(),
        }
    }
}
