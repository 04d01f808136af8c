//! The datacenter registry: per-cluster endpoint rotation, auth key
//! storage and the server salt set.
//!
//! A datacenter keeps four independent address lists, split by traffic
//! class (generic vs download) and IP version, each with its own rotation
//! cursor. The cursors survive restarts through a [`CursorStore`];
//! everything else is session state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keel_crypto::AUTH_KEY_LEN;
use keel_transport::{Connection, ConnectivityOracle, Connector, EndpointProvider, TrafficClass};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::salt::ServerSalt;

/// Fallback port rotation table. A `-1` slot means "use the port recorded
/// on the address itself".
const PORT_TABLE: [i32; 11] = [-1, 443, 5222, 443, 443, 443, 443, 80, 443, 443, 443];

/// The port tried first and jumped back to after repeated failures on the
/// alternates.
pub const PREFERRED_PORT: u16 = 443;

const CURSOR_RECORD_VERSION: u32 = 1;

/// A single server endpoint. A zero port defers entirely to the port
/// table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// IP address or hostname
    pub address: String,
    /// Recorded per-address port, or zero
    pub port: u16,
}

#[derive(Debug, Default)]
struct AddressList {
    endpoints: Vec<Endpoint>,
    address_cursor: usize,
    port_cursor: usize,
}

/// Persisted rotation cursors, bincode-encoded and keyed by datacenter id.
#[derive(Debug, Serialize, Deserialize)]
struct CursorRecord {
    version: u32,
    cursors: [(u32, u32); 4],
}

/// Persistence for rotation cursors. Loads happen synchronously when a
/// datacenter is constructed; saves are scheduled off the protocol path.
pub trait CursorStore: Send + Sync + 'static {
    /// Load the serialized cursor record for `datacenter_id`, if any.
    fn load(&self, datacenter_id: i32) -> Option<Vec<u8>>;
    /// Store the serialized cursor record for `datacenter_id`.
    fn save(&self, datacenter_id: i32, record: &[u8]);
}

/// In-memory [`CursorStore`].
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    entries: Mutex<HashMap<i32, Vec<u8>>>,
}

impl MemoryCursorStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self, datacenter_id: i32) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&datacenter_id)
            .cloned()
    }

    fn save(&self, datacenter_id: i32, record: &[u8]) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(datacenter_id, record.to_vec());
    }
}

struct Inner {
    lists: [AddressList; 4],
    override_port: Option<u16>,
    authorized: bool,
    auth_key: Option<Zeroizing<[u8; AUTH_KEY_LEN]>>,
    auth_key_id: i64,
    salts: Vec<ServerSalt>,
}

/// One remote cluster: its endpoints, its auth key, its salts, and the
/// per-class connections riding on them.
pub struct Datacenter {
    id: i32,
    store: Arc<dyn CursorStore>,
    inner: Mutex<Inner>,
    connections: Mutex<HashMap<TrafficClass, Connection>>,
}

fn list_index(class: TrafficClass, ipv6: bool) -> usize {
    let download = matches!(class, TrafficClass::Download);
    (usize::from(download) << 1) | usize::from(ipv6)
}

impl Datacenter {
    /// Create a datacenter, synchronously loading any persisted rotation
    /// cursors for its id.
    #[must_use]
    pub fn new(id: i32, store: Arc<dyn CursorStore>) -> Arc<Self> {
        let mut lists: [AddressList; 4] = Default::default();
        if let Some(bytes) = store.load(id) {
            match bincode::deserialize::<CursorRecord>(&bytes) {
                Ok(record) if record.version == CURSOR_RECORD_VERSION => {
                    for (list, (addr, port)) in lists.iter_mut().zip(record.cursors) {
                        list.address_cursor = addr as usize;
                        list.port_cursor = port as usize;
                    }
                }
                Ok(_) | Err(_) => {
                    warn!(datacenter = id, "discarding unreadable cursor record");
                }
            }
        }
        Arc::new(Self {
            id,
            store,
            inner: Mutex::new(Inner {
                lists,
                override_port: None,
                authorized: false,
                auth_key: None,
                auth_key_id: 0,
                salts: Vec::new(),
            }),
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// The datacenter id.
    #[must_use]
    pub fn id(&self) -> i32 {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an endpoint to one class list, deduplicating by address.
    pub fn add_address(&self, address: &str, port: u16, class: TrafficClass, ipv6: bool) {
        let mut inner = self.lock();
        let list = &mut inner.lists[list_index(class, ipv6)];
        if list.endpoints.iter().any(|e| e.address == address) {
            return;
        }
        list.endpoints.push(Endpoint {
            address: address.to_string(),
            port,
        });
    }

    /// Replace a whole class list (configuration updates). Cursors for
    /// that list reset to the front.
    pub fn replace_addresses(&self, endpoints: Vec<Endpoint>, class: TrafficClass, ipv6: bool) {
        let mut inner = self.lock();
        let list = &mut inner.lists[list_index(class, ipv6)];
        list.endpoints = endpoints;
        list.address_cursor = 0;
        list.port_cursor = 0;
        drop(inner);
        self.persist_cursors();
    }

    /// Force every connection to one port regardless of the rotation
    /// table. `None` restores normal rotation.
    pub fn set_override_port(&self, port: Option<u16>) {
        self.lock().override_port = port;
    }

    /// Store a freshly derived auth key, marking the datacenter
    /// authorized.
    pub fn set_auth_key(&self, key: [u8; AUTH_KEY_LEN], key_id: i64) {
        let mut inner = self.lock();
        inner.auth_key = Some(Zeroizing::new(key));
        inner.auth_key_id = key_id;
        inner.authorized = true;
    }

    /// Copy of the auth key, if one is established.
    #[must_use]
    pub fn auth_key(&self) -> Option<[u8; AUTH_KEY_LEN]> {
        self.lock().auth_key.as_deref().copied()
    }

    /// The auth key id, zero when no key is established.
    #[must_use]
    pub fn auth_key_id(&self) -> i64 {
        self.lock().auth_key_id
    }

    /// Whether a handshake has completed for this datacenter.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.lock().authorized
    }

    /// Drop the auth key, its id, the authorized flag and every salt
    /// (logout or key compromise).
    pub fn clear_auth(&self) {
        let mut inner = self.lock();
        inner.auth_key = None;
        inner.auth_key_id = 0;
        inner.authorized = false;
        inner.salts.clear();
    }

    /// Select the salt with the most remaining validity at `now`, purging
    /// expired and forever-invalid salts on the way. Returns zero when
    /// nothing is valid; callers treat that as "ask the server again",
    /// not as an error.
    pub fn select_salt(&self, now: i32) -> i64 {
        let mut inner = self.lock();
        inner
            .salts
            .retain(|s| s.valid_until >= now && !s.is_forever_invalid());
        let best = inner
            .salts
            .iter()
            .filter(|s| s.is_valid_at(now))
            .max_by_key(|s| s.remaining_at(now));
        match best {
            Some(salt) => salt.value,
            None => {
                debug!(datacenter = self.id, "no valid server salt");
                0
            }
        }
    }

    /// Merge server-provided salts: keep the ones not already present by
    /// value and not already expired at `now`, then re-sort by window
    /// start.
    pub fn merge_salts(&self, now: i32, incoming: &[ServerSalt]) {
        let mut inner = self.lock();
        for salt in incoming {
            if salt.valid_until <= now {
                continue;
            }
            if inner.salts.iter().any(|s| s.value == salt.value) {
                continue;
            }
            inner.salts.push(*salt);
        }
        inner.salts.sort_by_key(|s| s.valid_since);
    }

    /// Insert one salt, deduplicating by value.
    pub fn add_salt(&self, salt: ServerSalt) {
        let mut inner = self.lock();
        if inner.salts.iter().any(|s| s.value == salt.value) {
            return;
        }
        inner.salts.push(salt);
        inner.salts.sort_by_key(|s| s.valid_since);
    }

    /// Whether a salt with this value is present.
    #[must_use]
    pub fn contains_salt(&self, value: i64) -> bool {
        self.lock().salts.iter().any(|s| s.value == value)
    }

    /// Drop every salt, keeping the auth key.
    pub fn clear_server_salts(&self) {
        self.lock().salts.clear();
    }

    /// Number of stored salts (diagnostics).
    #[must_use]
    pub fn salt_count(&self) -> usize {
        self.lock().salts.len()
    }

    /// The connection serving one traffic class, created lazily on first
    /// access. Repeated calls for the same class hand out clones of the
    /// same underlying connection; it starts idle until someone calls
    /// [`Connection::connect`] on it.
    ///
    /// Must be called from within a tokio runtime (creation spawns the
    /// connection's actor task).
    pub fn connection(
        self: &Arc<Self>,
        class: TrafficClass,
        ipv6: bool,
        connectivity: &Arc<dyn ConnectivityOracle>,
        connector: &Arc<dyn Connector>,
    ) -> Connection {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .entry(class)
            .or_insert_with(|| {
                debug!(datacenter = self.id, ?class, "creating connection");
                Connection::new(
                    class,
                    ipv6,
                    Arc::clone(self) as Arc<dyn EndpointProvider>,
                    Arc::clone(connectivity),
                    Arc::clone(connector),
                )
            })
            .clone()
    }

    /// Suspend every connection created for this datacenter (network
    /// loss, background transition).
    pub fn suspend_all(&self) {
        let connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for connection in connections.values() {
            connection.suspend();
        }
    }

    fn persist_cursors(&self) {
        let record = {
            let inner = self.lock();
            CursorRecord {
                version: CURSOR_RECORD_VERSION,
                cursors: [0, 1, 2, 3].map(|i| {
                    let list = &inner.lists[i];
                    (list.address_cursor as u32, list.port_cursor as u32)
                }),
            }
        };
        let Ok(bytes) = bincode::serialize(&record) else {
            return;
        };
        let store = Arc::clone(&self.store);
        let id = self.id;
        // Stores stay off the protocol path when a runtime is around;
        // otherwise (construction-time correction, tests) write inline.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || store.save(id, &bytes));
            }
            Err(_) => store.save(id, &bytes),
        }
    }
}

impl EndpointProvider for Datacenter {
    fn current_endpoint(&self, class: TrafficClass, ipv6: bool) -> Option<(String, u16)> {
        let mut corrected = false;
        let result = {
            let mut inner = self.lock();
            let override_port = inner.override_port;
            let list = &mut inner.lists[list_index(class, ipv6)];
            if list.endpoints.is_empty() {
                return None;
            }
            if list.address_cursor >= list.endpoints.len() {
                // The list shrank underneath a persisted cursor
                list.address_cursor = 0;
                list.port_cursor = 0;
                corrected = true;
            }
            let endpoint = &list.endpoints[list.address_cursor];
            let port = override_port.unwrap_or_else(|| {
                match PORT_TABLE[list.port_cursor % PORT_TABLE.len()] {
                    -1 if endpoint.port != 0 => endpoint.port,
                    -1 => PREFERRED_PORT,
                    entry => entry as u16,
                }
            });
            (endpoint.address.clone(), port)
        };
        if corrected {
            self.persist_cursors();
        }
        Some(result)
    }

    fn advance(&self, class: TrafficClass, ipv6: bool) {
        {
            let mut inner = self.lock();
            let list = &mut inner.lists[list_index(class, ipv6)];
            if list.endpoints.is_empty() {
                return;
            }
            list.port_cursor += 1;
            if list.port_cursor >= PORT_TABLE.len() {
                list.port_cursor = 0;
                list.address_cursor += 1;
                if list.address_cursor >= list.endpoints.len() {
                    list.address_cursor = 0;
                }
            }
            debug!(
                datacenter = self.id,
                ?class,
                ipv6,
                address_cursor = list.address_cursor,
                port_cursor = list.port_cursor,
                "rotated endpoint cursor"
            );
        }
        self.persist_cursors();
    }

    fn persist_active(&self) {
        self.persist_cursors();
    }

    fn switch_to_preferred_port(&self) {
        {
            let mut inner = self.lock();
            for list in &mut inner.lists {
                if let Some(pos) = list
                    .endpoints
                    .iter()
                    .position(|e| e.port == PREFERRED_PORT)
                {
                    list.address_cursor = pos;
                    list.port_cursor = 0;
                }
            }
        }
        debug!(datacenter = self.id, "cursors moved to preferred port");
        self.persist_cursors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_transport::{AlwaysReachable, BoxedSocket, ConnectionState};
    use std::time::Duration;

    fn datacenter_with_addresses(addresses: &[(&str, u16)]) -> Arc<Datacenter> {
        let dc = Datacenter::new(2, Arc::new(MemoryCursorStore::new()));
        for (address, port) in addresses {
            dc.add_address(address, *port, TrafficClass::Generic, false);
        }
        dc
    }

    #[test]
    fn test_rotation_returns_to_start_after_full_cycle() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 443), ("10.0.0.2", 80)]);
        let start = dc.current_endpoint(TrafficClass::Generic, false);
        for _ in 0..PORT_TABLE.len() * 2 {
            dc.advance(TrafficClass::Generic, false);
        }
        assert_eq!(dc.current_endpoint(TrafficClass::Generic, false), start);
    }

    #[test]
    fn test_port_exhaustion_moves_to_next_address() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 443), ("10.0.0.2", 80)]);
        for _ in 0..PORT_TABLE.len() {
            dc.advance(TrafficClass::Generic, false);
        }
        let (address, _) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(address, "10.0.0.2");
    }

    #[test]
    fn test_port_table_slot_zero_uses_recorded_port() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 8443)]);
        let (_, port) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(port, 8443);
        // Slot 1 of the table is 443
        dc.advance(TrafficClass::Generic, false);
        let (_, port) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(port, 443);
    }

    #[test]
    fn test_zero_recorded_port_falls_back_to_preferred() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 0)]);
        let (_, port) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(port, PREFERRED_PORT);
    }

    #[test]
    fn test_override_port_always_wins() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 8443)]);
        dc.set_override_port(Some(9000));
        for _ in 0..3 {
            let (_, port) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
            assert_eq!(port, 9000);
            dc.advance(TrafficClass::Generic, false);
        }
    }

    #[test]
    fn test_class_lists_rotate_independently() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 443)]);
        dc.add_address("10.1.0.1", 443, TrafficClass::Download, false);
        dc.advance(TrafficClass::Generic, false);
        let (_, generic_port) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        let (_, download_port) = dc.current_endpoint(TrafficClass::Download, false).unwrap();
        assert_eq!(generic_port, 443); // slot 1 after one advance
        assert_eq!(download_port, 443); // slot 0, recorded port
        assert_eq!(
            dc.current_endpoint(TrafficClass::Download, false).unwrap().0,
            "10.1.0.1"
        );
    }

    #[test]
    fn test_upload_and_push_share_the_generic_list() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 443)]);
        assert!(dc.current_endpoint(TrafficClass::Upload, false).is_some());
        assert!(dc.current_endpoint(TrafficClass::Push, false).is_some());
        assert!(dc.current_endpoint(TrafficClass::Download, false).is_none());
    }

    #[test]
    fn test_out_of_bounds_cursor_resets_and_persists() {
        let store = Arc::new(MemoryCursorStore::new());
        let dc = Datacenter::new(2, store.clone());
        dc.add_address("10.0.0.1", 443, TrafficClass::Generic, false);
        dc.add_address("10.0.0.2", 443, TrafficClass::Generic, false);
        // Walk onto the second address, then shrink the list
        for _ in 0..PORT_TABLE.len() {
            dc.advance(TrafficClass::Generic, false);
        }
        dc.replace_addresses(
            vec![Endpoint {
                address: "10.0.0.9".into(),
                port: 443,
            }],
            TrafficClass::Generic,
            false,
        );
        let (address, _) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(address, "10.0.0.9");

        // A rebuilt datacenter sees the reset cursor, not the stale one
        let rebuilt = Datacenter::new(2, store);
        rebuilt.add_address("10.0.0.9", 443, TrafficClass::Generic, false);
        let (address, _) = rebuilt
            .current_endpoint(TrafficClass::Generic, false)
            .unwrap();
        assert_eq!(address, "10.0.0.9");
    }

    #[test]
    fn test_cursor_persistence_round_trip() {
        let store = Arc::new(MemoryCursorStore::new());
        {
            let dc = Datacenter::new(5, store.clone());
            dc.add_address("10.0.0.1", 443, TrafficClass::Generic, false);
            dc.advance(TrafficClass::Generic, false);
            dc.advance(TrafficClass::Generic, false);
        }
        let dc = Datacenter::new(5, store);
        dc.add_address("10.0.0.1", 443, TrafficClass::Generic, false);
        // Slot 2 of the port table is 5222
        let (_, port) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(port, 5222);
    }

    #[test]
    fn test_switch_to_preferred_port() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 80), ("10.0.0.2", 443)]);
        dc.advance(TrafficClass::Generic, false);
        dc.switch_to_preferred_port();
        let (address, port) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(address, "10.0.0.2");
        assert_eq!(port, 443);
    }

    #[test]
    fn test_add_address_deduplicates() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 443)]);
        dc.add_address("10.0.0.1", 80, TrafficClass::Generic, false);
        for _ in 0..PORT_TABLE.len() {
            dc.advance(TrafficClass::Generic, false);
        }
        // Wrapped straight back: the duplicate was not appended
        let (address, _) = dc.current_endpoint(TrafficClass::Generic, false).unwrap();
        assert_eq!(address, "10.0.0.1");
    }

    #[test]
    fn test_salt_selection_prefers_longest_remaining() {
        let dc = datacenter_with_addresses(&[]);
        dc.add_salt(ServerSalt {
            valid_since: 0,
            valid_until: 100,
            value: 1,
        });
        dc.add_salt(ServerSalt {
            valid_since: 50,
            valid_until: 200,
            value: 2,
        });
        assert_eq!(dc.select_salt(80), 2);
        // Both still stored: neither was expired at t=80
        assert_eq!(dc.salt_count(), 2);
        // At t=150 the first salt is expired and gets purged
        assert_eq!(dc.select_salt(150), 2);
        assert_eq!(dc.salt_count(), 1);
    }

    #[test]
    fn test_salt_selection_purges_forever_invalid() {
        let dc = datacenter_with_addresses(&[]);
        dc.add_salt(ServerSalt {
            valid_since: 0,
            valid_until: i32::MAX,
            value: 13,
        });
        assert_eq!(dc.select_salt(10), 0);
        assert_eq!(dc.salt_count(), 0);
    }

    #[test]
    fn test_select_salt_returns_zero_when_none_valid() {
        let dc = datacenter_with_addresses(&[]);
        dc.add_salt(ServerSalt {
            valid_since: 100,
            valid_until: 200,
            value: 5,
        });
        assert_eq!(dc.select_salt(50), 0);
        // Not yet valid is not the same as expired: the salt stays
        assert!(dc.contains_salt(5));
    }

    #[test]
    fn test_merge_salts_dedupes_and_sorts() {
        let dc = datacenter_with_addresses(&[]);
        dc.add_salt(ServerSalt {
            valid_since: 50,
            valid_until: 300,
            value: 1,
        });
        dc.merge_salts(
            100,
            &[
                ServerSalt {
                    valid_since: 10,
                    valid_until: 400,
                    value: 2,
                },
                // Duplicate value, ignored
                ServerSalt {
                    valid_since: 60,
                    valid_until: 500,
                    value: 1,
                },
                // Already expired at the merge time, ignored
                ServerSalt {
                    valid_since: 0,
                    valid_until: 90,
                    value: 3,
                },
            ],
        );
        assert_eq!(dc.salt_count(), 2);
        assert!(dc.contains_salt(1));
        assert!(dc.contains_salt(2));
        // Sorted by window start: the merged salt now selects first on
        // longest remaining validity
        assert_eq!(dc.select_salt(100), 2);
    }

    struct PendingConnector;

    #[async_trait::async_trait]
    impl Connector for PendingConnector {
        async fn connect(&self, _address: &str, _port: u16) -> std::io::Result<BoxedSocket> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_accessor_shares_one_actor_per_class() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 443)]);
        let connectivity: Arc<dyn ConnectivityOracle> = Arc::new(AlwaysReachable);
        let connector: Arc<dyn Connector> = Arc::new(PendingConnector);

        let generic = dc.connection(TrafficClass::Generic, false, &connectivity, &connector);
        assert_eq!(generic.state(), ConnectionState::Idle);
        generic.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Same class hands back a handle to the same actor
        let again = dc.connection(TrafficClass::Generic, false, &connectivity, &connector);
        assert_eq!(again.state(), ConnectionState::Connecting);

        // Other classes get their own idle connection
        let download = dc.connection(TrafficClass::Download, false, &connectivity, &connector);
        assert_eq!(download.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_all_sweeps_every_connection() {
        let dc = datacenter_with_addresses(&[("10.0.0.1", 443)]);
        dc.add_address("10.1.0.1", 443, TrafficClass::Download, false);
        let connectivity: Arc<dyn ConnectivityOracle> = Arc::new(AlwaysReachable);
        let connector: Arc<dyn Connector> = Arc::new(PendingConnector);

        let generic = dc.connection(TrafficClass::Generic, false, &connectivity, &connector);
        let download = dc.connection(TrafficClass::Download, false, &connectivity, &connector);
        generic.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        dc.suspend_all();
        // The generic actor only sees the suspend once its in-flight
        // connect attempt times out
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(generic.state(), ConnectionState::Suspended);
        assert_eq!(download.state(), ConnectionState::Suspended);
    }

    #[test]
    fn test_clear_auth_drops_key_and_salts() {
        let dc = datacenter_with_addresses(&[]);
        dc.set_auth_key([7u8; AUTH_KEY_LEN], 1234);
        dc.add_salt(ServerSalt {
            valid_since: 0,
            valid_until: 100,
            value: 5,
        });
        assert!(dc.is_authorized());
        assert_eq!(dc.auth_key_id(), 1234);

        dc.clear_auth();
        assert!(!dc.is_authorized());
        assert_eq!(dc.auth_key_id(), 0);
        assert!(dc.auth_key().is_none());
        assert_eq!(dc.salt_count(), 0);
    }
}
