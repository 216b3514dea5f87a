//! Dual-indexed connection table.
//!
//! Mirrors the reverse-lookup shape of a device registry keyed two ways at
//! once: every client is reachable by its own id, and by the user it
//! belongs to, and the two tables are kept in lockstep by construction
//! rather than by runtime assertion.

use std::{
    collections::{HashMap, HashSet},
    time::Instant,
};

use uuid::Uuid;

use crate::client::{ClientInfo, ConnectedClient};

#[derive(Default)]
pub struct HubState {
    by_user: HashMap<Uuid, HashSet<Uuid>>,
    by_client: HashMap<Uuid, ConnectedClient>,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_count(&self, user_id: Uuid) -> usize {
        self.by_user.get(&user_id).map_or(0, HashSet::len)
    }

    pub fn insert(&mut self, client: ConnectedClient) {
        self.by_user
            .entry(client.user_id)
            .or_default()
            .insert(client.client_id);
        self.by_client.insert(client.client_id, client);
    }

    /// Removes a client from both indices. Idempotent: removing an unknown
    /// client id is a no-op that returns `None`.
    pub fn remove(&mut self, client_id: Uuid) -> Option<ConnectedClient> {
        let client = self.by_client.remove(&client_id)?;
        if let Some(set) = self.by_user.get_mut(&client.user_id) {
            set.remove(&client_id);
            if set.is_empty() {
                self.by_user.remove(&client.user_id);
            }
        }
        Some(client)
    }

    pub fn get(&self, client_id: Uuid) -> Option<&ConnectedClient> {
        self.by_client.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: Uuid) -> Option<&mut ConnectedClient> {
        self.by_client.get_mut(&client_id)
    }

    pub fn clients_for_user(&self, user_id: Uuid) -> Vec<Uuid> {
        self.by_user
            .get(&user_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_user_online(&self, user_id: Uuid) -> bool {
        self.by_user.get(&user_id).is_some_and(|s| !s.is_empty())
    }

    pub fn online_users(&self) -> Vec<Uuid> {
        self.by_user.keys().copied().collect()
    }

    pub fn all_client_ids(&self) -> Vec<Uuid> {
        self.by_client.keys().copied().collect()
    }

    pub fn stale_clients(&self, stale_after: std::time::Duration, now: Instant) -> Vec<Uuid> {
        self.by_client
            .values()
            .filter(|c| now.duration_since(c.last_pong) > stale_after)
            .map(|c| c.client_id)
            .collect()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            total_clients: self.by_client.len(),
            total_users: self.by_user.len(),
        }
    }

    pub fn client_info(&self, client_id: Uuid) -> Option<ClientInfo> {
        self.by_client.get(&client_id).map(ClientInfo::from)
    }

    #[cfg(test)]
    pub fn invariant_holds(&self) -> bool {
        for (client_id, client) in &self.by_client {
            match self.by_user.get(&client.user_id) {
                Some(set) if set.contains(client_id) => {},
                _ => return false,
            }
        }
        for (user_id, clients) in &self.by_user {
            for client_id in clients {
                match self.by_client.get(client_id) {
                    Some(c) if c.user_id == *user_id => {},
                    _ => return false,
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub total_clients: usize,
    pub total_users: usize,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client(user_id: Uuid, device_id: &str) -> ConnectedClient {
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let now = Instant::now();
        ConnectedClient {
            client_id: Uuid::new_v4(),
            user_id,
            device_id: device_id.to_string(),
            platform: "ios".to_string(),
            connected_at: now,
            last_pong: now,
            metadata: serde_json::json!({}),
            tx,
        }
    }

    #[test]
    fn insert_and_remove_preserve_the_dual_index_invariant() {
        let mut state = HubState::new();
        let user = Uuid::new_v4();
        let c1 = client(user, "a");
        let c2 = client(user, "b");
        let id1 = c1.client_id;
        state.insert(c1);
        state.insert(c2);
        assert!(state.invariant_holds());
        assert_eq!(state.device_count(user), 2);

        state.remove(id1);
        assert!(state.invariant_holds());
        assert_eq!(state.device_count(user), 1);

        // Removing the last device for a user drops the user's entry entirely.
        let remaining = state.clients_for_user(user)[0];
        state.remove(remaining);
        assert!(state.invariant_holds());
        assert!(!state.is_user_online(user));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut state = HubState::new();
        let user = Uuid::new_v4();
        let c = client(user, "a");
        let id = c.client_id;
        state.insert(c);
        assert!(state.remove(id).is_some());
        assert!(state.remove(id).is_none());
    }

    #[test]
    fn stale_clients_are_found_by_pong_age() {
        let mut state = HubState::new();
        let user = Uuid::new_v4();
        let mut c = client(user, "a");
        c.last_pong = Instant::now() - Duration::from_secs(91);
        let id = c.client_id;
        state.insert(c);

        let stale = state.stale_clients(Duration::from_secs(90), Instant::now());
        assert_eq!(stale, vec![id]);
    }
}
