// src/storage/memory.rs
use dashmap::DashMap;
use std::net::Ipv4Addr;

use crate::models::server::GameServer;
use crate::utils::unix_now;

pub type ServerKey = (Ipv4Addr, u16);

// Shared between the query path (readers) and the heartbeat listener
// (writer). Records are cloned out under their shard lock, so a snapshot
// never observes a half-written record.
pub struct ServerRegistry {
    servers: DashMap<ServerKey, GameServer>,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self {
            servers: DashMap::new(),
        }
    }

    // Refresh or create a record from a heartbeat report. Validation state
    // and the resolved database id survive refreshes, and last_refreshed
    // never moves backwards.
    pub fn upsert(&self, mut server: GameServer) {
        let key = server.key();
        if let Some(mut existing) = self.servers.get_mut(&key) {
            server.is_validated = existing.is_validated;
            server.database_id = existing.database_id;
            server.last_refreshed = server.last_refreshed.max(existing.last_refreshed);
            *existing = server;
        } else {
            self.servers.insert(key, server);
        }
    }

    pub fn mark_validated(&self, key: &ServerKey) -> Option<GameServer> {
        self.servers.get_mut(key).map(|mut entry| {
            entry.is_validated = true;
            entry.clone()
        })
    }

    pub fn get(&self, key: &ServerKey) -> Option<GameServer> {
        self.servers.get(key).map(|entry| entry.clone())
    }

    // Only validated servers are visible to queries.
    pub fn snapshot(&self) -> Vec<GameServer> {
        self.servers
            .iter()
            .filter(|entry| entry.value().is_validated)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn remove(&self, key: &ServerKey) -> Option<GameServer> {
        self.servers.remove(key).map(|(_, server)| server)
    }

    pub fn evict_stale(&self, older_than_secs: u64) -> Vec<GameServer> {
        let now = unix_now();
        let mut evicted = Vec::new();
        self.servers.retain(|_, server| {
            let stale = now.saturating_sub(server.last_refreshed) >= older_than_secs;
            if stale {
                evicted.push(server.clone());
            }
            !stale
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported(ip: [u8; 4], hostname: &str) -> GameServer {
        let mut s = GameServer::new(Ipv4Addr::from(ip), 29900);
        s.hostname = hostname.to_string();
        s
    }

    #[test]
    fn snapshot_hides_unvalidated_servers() {
        let registry = ServerRegistry::new();
        registry.upsert(reported([1, 2, 3, 4], "alpha"));
        registry.upsert(reported([5, 6, 7, 8], "beta"));
        assert!(registry.snapshot().is_empty());

        registry.mark_validated(&(Ipv4Addr::new(1, 2, 3, 4), 29900));
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].hostname, "alpha");
    }

    #[test]
    fn upsert_preserves_validation_and_database_id() {
        let registry = ServerRegistry::new();
        let key = (Ipv4Addr::new(1, 2, 3, 4), 29900);

        let mut first = reported([1, 2, 3, 4], "alpha");
        first.database_id = 42;
        registry.upsert(first);
        registry.mark_validated(&key);

        // A later heartbeat for the same server must not reset liveness.
        registry.upsert(reported([1, 2, 3, 4], "alpha renamed"));
        let server = registry.get(&key).unwrap();
        assert!(server.is_validated);
        assert_eq!(server.database_id, 42);
        assert_eq!(server.hostname, "alpha renamed");
    }

    #[test]
    fn last_refreshed_is_monotonic() {
        let registry = ServerRegistry::new();
        let key = (Ipv4Addr::new(1, 2, 3, 4), 29900);

        let mut fresh = reported([1, 2, 3, 4], "alpha");
        fresh.last_refreshed = 2_000;
        registry.upsert(fresh);

        let mut stale_report = reported([1, 2, 3, 4], "alpha");
        stale_report.last_refreshed = 1_000;
        registry.upsert(stale_report);

        assert_eq!(registry.get(&key).unwrap().last_refreshed, 2_000);
    }

    #[test]
    fn evict_stale_returns_the_evicted_records() {
        let registry = ServerRegistry::new();
        let mut old = reported([1, 2, 3, 4], "old");
        old.last_refreshed = unix_now() - 600;
        registry.upsert(old);
        registry.upsert(reported([5, 6, 7, 8], "fresh"));

        let evicted = registry.evict_stale(300);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].hostname, "old");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_returns_the_record() {
        let registry = ServerRegistry::new();
        registry.upsert(reported([1, 2, 3, 4], "alpha"));
        let key = (Ipv4Addr::new(1, 2, 3, 4), 29900);
        assert_eq!(registry.remove(&key).unwrap().hostname, "alpha");
        assert!(registry.is_empty());
        assert!(registry.remove(&key).is_none());
    }
}
