//! Process-wide mapping from node-tag to node, the single source of truth
//! the supervisor and the status dump read from.

use crate::natural_sort::natural_key;
use crate::node::Node;
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe registry of every node currently known to the fleet. All
/// mutations (`add`/`remove`) happen on the supervisor; node execution
/// contexts mutate their own `Node` value directly and publish it back with
/// `update`.
#[derive(Default)]
pub struct Registry {
    nodes: RwLock<HashMap<String, Node>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, node: Node) {
        self.nodes.write().unwrap().insert(node.tag.clone(), node);
    }

    pub fn remove(&self, tag: &str) -> Option<Node> {
        self.nodes.write().unwrap().remove(tag)
    }

    pub fn get(&self, tag: &str) -> Option<Node> {
        self.nodes.read().unwrap().get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.nodes.read().unwrap().contains_key(tag)
    }

    pub fn update(&self, node: Node) {
        self.nodes.write().unwrap().insert(node.tag.clone(), node);
    }

    /// All tags currently tracked, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.nodes.read().unwrap().keys().cloned().collect()
    }

    /// A snapshot of every node, sorted by natural-ordered tag. This is the
    /// only iteration order guarantee the registry offers; it exists purely
    /// for stable presentation in the status dump.
    pub fn values(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.read().unwrap().values().cloned().collect();
        nodes.sort_by(|a, b| natural_key(&a.tag).cmp(&natural_key(&b.tag)));
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{default_now, Now};

    fn node(tag: &str) -> Node {
        let now = default_now();
        Node::empty(tag, &now)
    }

    #[test]
    fn values_are_naturally_sorted() {
        let registry = Registry::new();
        registry.add(node("miner_10"));
        registry.add(node("miner_2"));
        registry.add(node("miner_1"));

        let tags: Vec<String> = registry.values().into_iter().map(|n| n.tag).collect();
        assert_eq!(tags, vec!["miner_1", "miner_2", "miner_10"]);
    }

    #[test]
    fn remove_drops_the_node() {
        let registry = Registry::new();
        registry.add(node("miner_1"));
        assert!(registry.contains("miner_1"));
        registry.remove("miner_1");
        assert!(!registry.contains("miner_1"));
    }

    #[test]
    fn update_replaces_existing_entry() {
        let registry = Registry::new();
        let mut n = node("miner_1");
        registry.add(n.clone());
        n.task_uptime_seconds = 42;
        registry.update(n);
        assert_eq!(registry.get("miner_1").unwrap().task_uptime_seconds, 42);
    }
}
