//! Thread-safe backend node storage.
//!
//! The node set is immutable once published; a full sync builds a new set
//! and swaps it in, so readers see either the old pool or the new one.

use std::sync::Arc;

use parking_lot::RwLock;

/// A socket.io backend node as reported by the cluster controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendNode {
    pub uri: String,
    pub connected: bool,
}

impl BackendNode {
    pub fn new(uri: impl Into<String>, connected: bool) -> Self {
        Self {
            uri: uri.into(),
            connected,
        }
    }
}

/// Published node set, sorted by URI with duplicates collapsed.
#[derive(Debug, Default)]
struct NodeSet {
    nodes: Vec<BackendNode>,
    version: u64,
}

impl NodeSet {
    fn build(mut nodes: Vec<BackendNode>, version: u64) -> Self {
        // Stable sort keeps input order among equal URIs; the last one wins.
        nodes.sort_by(|a, b| a.uri.cmp(&b.uri));
        let mut deduped: Vec<BackendNode> = Vec::with_capacity(nodes.len());
        for node in nodes {
            match deduped.last_mut() {
                Some(last) if last.uri == node.uri => *last = node,
                _ => deduped.push(node),
            }
        }
        Self {
            nodes: deduped,
            version,
        }
    }
}

/// Thread-safe storage for backend nodes.
///
/// Liveness is owned by the controller that pushes updates; the routing
/// engine only reads snapshots.
pub struct NodeStore {
    current: RwLock<Arc<NodeSet>>,
}

impl NodeStore {
    /// Creates a new empty node store.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(NodeSet::default())),
        }
    }

    /// Creates a store seeded with the given nodes at version 0.
    pub fn with_nodes(nodes: Vec<BackendNode>) -> Self {
        Self {
            current: RwLock::new(Arc::new(NodeSet::build(nodes, 0))),
        }
    }

    fn snapshot(&self) -> Arc<NodeSet> {
        Arc::clone(&self.current.read())
    }

    /// Replaces all nodes with a full sync.
    ///
    /// Returns the applied version.
    pub fn update_nodes(&self, nodes: Vec<BackendNode>, version: u64) -> u64 {
        let next = Arc::new(NodeSet::build(nodes, version));
        *self.current.write() = next;
        version
    }

    /// Sets the connected flag of a known node.
    ///
    /// Returns `false` if the node is unknown.
    pub fn set_connected(&self, uri: &str, connected: bool) -> bool {
        let mut current = self.current.write();
        let Ok(idx) = current.nodes.binary_search_by(|n| n.uri.as_str().cmp(uri)) else {
            return false;
        };
        if current.nodes[idx].connected != connected {
            let mut nodes = current.nodes.clone();
            nodes[idx].connected = connected;
            *current = Arc::new(NodeSet {
                nodes,
                version: current.version,
            });
        }
        true
    }

    /// Returns a snapshot of all nodes, sorted by URI.
    pub fn nodes(&self) -> Vec<BackendNode> {
        self.snapshot().nodes.clone()
    }

    /// Returns the number of nodes currently marked connected.
    pub fn connected_count(&self) -> u32 {
        self.snapshot().nodes.iter().filter(|n| n.connected).count() as u32
    }

    /// Returns the total number of nodes.
    pub fn node_count(&self) -> u32 {
        self.snapshot().nodes.len() as u32
    }

    /// Returns the current configuration version.
    pub fn version(&self) -> u64 {
        self.snapshot().version
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_empty() {
        let store = NodeStore::new();
        assert_eq!(store.version(), 0);
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.connected_count(), 0);
        assert!(store.nodes().is_empty());
    }

    #[test]
    fn test_with_nodes_seeds_store() {
        let store = NodeStore::with_nodes(vec![
            BackendNode::new("http://a:3000", true),
            BackendNode::new("http://b:3000", false),
        ]);
        assert_eq!(store.version(), 0);
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.connected_count(), 1);
    }

    #[test]
    fn test_update_nodes_replaces_old() {
        let store = NodeStore::new();
        store.update_nodes(
            vec![
                BackendNode::new("http://a:3000", true),
                BackendNode::new("http://b:3000", true),
            ],
            1,
        );
        assert_eq!(store.node_count(), 2);

        let applied = store.update_nodes(vec![BackendNode::new("http://c:3000", true)], 2);

        assert_eq!(applied, 2);
        assert_eq!(store.version(), 2);
        let nodes = store.nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].uri, "http://c:3000");
    }

    #[test]
    fn test_nodes_sorted_by_uri() {
        let store = NodeStore::with_nodes(vec![
            BackendNode::new("http://c:3000", true),
            BackendNode::new("http://a:3000", true),
            BackendNode::new("http://b:3000", true),
        ]);
        let uris: Vec<String> = store.nodes().into_iter().map(|n| n.uri).collect();
        assert_eq!(uris, vec!["http://a:3000", "http://b:3000", "http://c:3000"]);
    }

    #[test]
    fn test_set_connected_known_node() {
        let store = NodeStore::with_nodes(vec![BackendNode::new("http://a:3000", true)]);

        assert!(store.set_connected("http://a:3000", false));
        assert_eq!(store.connected_count(), 0);

        assert!(store.set_connected("http://a:3000", true));
        assert_eq!(store.connected_count(), 1);
    }

    #[test]
    fn test_set_connected_unknown_node() {
        let store = NodeStore::new();
        assert!(!store.set_connected("http://missing:3000", true));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(NodeStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.update_nodes(
                    vec![BackendNode::new(format!("http://node{}:3000", i), true)],
                    i as u64,
                );
            }));
        }

        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let _ = store.nodes();
                let _ = store.connected_count();
                let _ = store.set_connected("http://node0:3000", false);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_duplicate_uri_last_wins() {
        let store = NodeStore::with_nodes(vec![
            BackendNode::new("http://a:3000", false),
            BackendNode::new("http://a:3000", true),
        ]);
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.connected_count(), 1);
    }

    #[test]
    fn test_resync_never_exposes_partial_pool() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;
        use std::thread;

        let pool = || {
            vec![
                BackendNode::new("http://a:3000", true),
                BackendNode::new("http://b:3000", true),
            ]
        };
        let store = Arc::new(NodeStore::with_nodes(pool()));
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut version = 1;
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    store.update_nodes(pool(), version);
                    version += 1;
                }
            })
        };

        for _ in 0..50_000 {
            let nodes = store.nodes();
            assert_eq!(nodes.len(), 2);
            assert!(nodes.iter().all(|n| n.connected));
            assert!(store.set_connected("http://a:3000", true));
        }

        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        writer.join().unwrap();
    }

    #[test]
    fn test_flag_swap_is_atomic() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(NodeStore::with_nodes(vec![
            BackendNode::new("http://a:3000", true),
            BackendNode::new("http://b:3000", false),
        ]));
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut flip = false;
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    store.update_nodes(
                        vec![
                            BackendNode::new("http://a:3000", flip),
                            BackendNode::new("http://b:3000", !flip),
                        ],
                        1,
                    );
                    flip = !flip;
                }
            })
        };

        for _ in 0..50_000 {
            let connected = store.nodes().iter().filter(|n| n.connected).count();
            assert_eq!(connected, 1);
        }

        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        writer.join().unwrap();
    }

    #[test]
    fn test_default_impl() {
        let store = NodeStore::default();
        assert_eq!(store.version(), 0);
        assert_eq!(store.node_count(), 0);
    }
}
