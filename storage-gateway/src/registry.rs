//! Node registry and the new-node admission protocol, §4.D. Grounded on
//! `original_source/storageGateway/services/nodeService.go`: a UUID-keyed
//! map plus an insertion-ordered vector for round-robin indexing, a mutex
//! serializing structural mutation, and `SyncNode`'s
//! pick-random-then-`GetStoredFiles`/`SyncStoredFiles` admission flow.
//! `roundRobin.go`'s atomic counter is kept as-is (`AtomicU32`, wrapping
//! `fetch_add`).

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use dfs_types::{Error, models::Node};
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Syncing,
    Active,
    Draining,
    Removed,
}

struct Inner {
    nodes: Vec<Node>,
}

/// Live storage-node set. Mutations are serialized by `inner`'s mutex; gRPC
/// I/O during admission happens with the lock released, on a snapshot.
pub struct NodeRegistry {
    inner: Mutex<Inner>,
    next: AtomicU32,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry {
            inner: Mutex::new(Inner { nodes: Vec::new() }),
            next: AtomicU32::new(0),
        }
    }

    pub fn snapshot(&self) -> Vec<Node> {
        self.inner.lock().unwrap().nodes.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, uuid: Uuid) -> bool {
        self.inner.lock().unwrap().nodes.iter().any(|n| n.uuid == uuid)
    }

    fn insert(&self, node: Node) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.nodes.iter().any(|n| n.uuid == node.uuid) {
            return false;
        }
        inner.nodes.push(node);
        true
    }

    /// Swap-remove by uuid, mirroring `nodeService.go`'s `deleteNode`.
    pub fn remove(&self, uuid: Uuid) {
        debug!(node = %uuid, state = ?describe_transition(false), "node leaving registry");
        let mut inner = self.inner.lock().unwrap();
        if let Some(idx) = inner.nodes.iter().position(|n| n.uuid == uuid) {
            inner.nodes.swap_remove(idx);
        }
        debug!(node = %uuid, state = ?NodeState::Removed, "node removed from registry");
    }

    /// Picks `vector[(next++) mod len]`. Fails fast with
    /// [`Error::InternalInvariant`]-free `NotFound` when the fleet is empty
    /// (`NoNodesAvailable`, §4.D).
    pub fn pick_round_robin(&self) -> Result<Node, Error> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Err(Error::Conflict("no storage nodes available".into()));
        }
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let idx = (n as usize) % snapshot.len();
        Ok(snapshot[idx].clone())
    }

    /// Runs the admission protocol for `new_node`, using `sync` to fetch a
    /// snapshot from an existing node and push it onto the newcomer.
    /// Returns `true` once `new_node` is inserted and routable.
    pub async fn admit<F, Fut>(&self, new_node: Node, sync: F) -> bool
    where
        F: FnOnce(Node, Node) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        if self.contains(new_node.uuid) {
            return false;
        }

        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            let joined = self.insert(new_node.clone());
            debug!(node = %new_node.uuid, state = ?NodeState::Active, "first node admitted without sync");
            return joined;
        }

        debug!(node = %new_node.uuid, state = ?describe_transition(true), "syncing new node before admission");
        let idx = rand::thread_rng().gen_range(0..snapshot.len());
        let existing = snapshot[idx].clone();

        if sync(existing, new_node.clone()).await {
            let joined = self.insert(new_node.clone());
            debug!(node = %new_node.uuid, state = ?NodeState::Active, "node admitted");
            joined
        } else {
            debug!(node = %new_node.uuid, "node sync failed, admission rejected");
            false
        }
    }
}

/// Node state from the gateway's perspective, §4.D:
/// `Unknown -> Syncing -> Active -> Draining -> Removed`. The registry only
/// ever holds `Active` nodes; `Syncing` and `Draining` are the transient
/// states `admit`/`remove` log on their way through, without persisting them.
pub fn describe_transition(joining: bool) -> NodeState {
    if joining { NodeState::Syncing } else { NodeState::Draining }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> Node {
        Node {
            uuid: Uuid::from_u128(n as u128),
            ip_address: format!("10.0.0.{n}"),
            port: 8081,
            grpc_port: 9081,
        }
    }

    #[test]
    fn round_robin_is_fair_over_n_times_k() {
        let registry = NodeRegistry::new();
        for i in 1..=3 {
            registry.insert(node(i));
        }

        let mut counts = std::collections::HashMap::new();
        for _ in 0..300 {
            let picked = registry.pick_round_robin().unwrap();
            *counts.entry(picked.uuid).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            assert_eq!(*count, 100);
        }
    }

    #[test]
    fn empty_registry_fails_fast() {
        let registry = NodeRegistry::new();
        assert!(registry.pick_round_robin().is_err());
    }

    #[tokio::test]
    async fn first_node_joins_without_sync() {
        let registry = NodeRegistry::new();
        let joined = registry
            .admit(node(1), |_existing, _new| async { panic!("should not sync") })
            .await;
        assert!(joined);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn second_node_is_rejected_on_sync_failure() {
        let registry = NodeRegistry::new();
        registry.insert(node(1));

        let joined = registry.admit(node(2), |_existing, _new| async { false }).await;
        assert!(!joined);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn second_node_joins_on_sync_success() {
        let registry = NodeRegistry::new();
        registry.insert(node(1));

        let joined = registry.admit(node(2), |_existing, _new| async { true }).await;
        assert!(joined);
        assert_eq!(registry.len(), 2);
    }
}
