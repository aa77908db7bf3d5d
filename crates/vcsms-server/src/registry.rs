//! Client directory and per-client outbox registry.
//!
//! Grounded on `vcsms/server.py`'s `_client_outboxes`/`_client_sockets`
//! maps and its `db.user_login`/`user_logout`/`user_known`/`user_get`
//! persistence calls. The directory is a trait (spec treats client-key
//! persistence as an external collaborator); this crate ships only the
//! in-memory implementation the original's in-process `Server_DB` would
//! have been, not a real on-disk store.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use vcsms_core::FramedSocket;
use vcsms_crypto::keys::PublicKey;

/// Stores the public key on record for each client ID, independent of
/// whether that client currently has a live session. `logout` only clears
/// the live-session bit; `known`/`get` keep answering for a client that
/// has merely gone offline, since `GetKey` must too (spec §4.5/S4).
pub trait ClientDirectory: Send + Sync {
    /// Record `client_id` as logged in with `public_key`. Returns `false`
    /// if `client_id` is already on record under a *different* public key
    /// (an `IDCollision`); re-logging in with the same key succeeds.
    fn login(&self, client_id: &str, public_key: &PublicKey) -> bool;
    fn logout(&self, client_id: &str);
    fn known(&self, client_id: &str) -> bool;
    fn get(&self, client_id: &str) -> Option<PublicKey>;
}

/// A client's recorded public key and whether it currently has a live
/// session. The key, once seen, is kept on logout: `GetKey` must keep
/// answering `KeyFound` for a client that has merely gone offline.
struct ClientRecord {
    key: PublicKey,
    online: bool,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientDirectory for InMemoryDirectory {
    fn login(&self, client_id: &str, public_key: &PublicKey) -> bool {
        let mut clients = self.clients.lock().unwrap();
        match clients.get_mut(client_id) {
            Some(record) if record.key != *public_key => false,
            Some(record) => {
                record.online = true;
                true
            }
            None => {
                clients.insert(
                    client_id.to_string(),
                    ClientRecord { key: public_key.clone(), online: true },
                );
                true
            }
        }
    }

    fn logout(&self, client_id: &str) {
        if let Some(record) = self.clients.lock().unwrap().get_mut(client_id) {
            record.online = false;
        }
    }

    fn known(&self, client_id: &str) -> bool {
        self.clients.lock().unwrap().contains_key(client_id)
    }

    fn get(&self, client_id: &str) -> Option<PublicKey> {
        self.clients.lock().unwrap().get(client_id).map(|record| record.key.clone())
    }
}

/// An item in a client's outbox: either a message to deliver, or the
/// sentinel that wakes a blocked out-worker so it can exit without polling
/// `connected` (see spec §5/§9).
pub enum OutboxItem {
    Message(String),
    Shutdown,
}

struct Outbox {
    sender: mpsc::Sender<OutboxItem>,
    receiver: Mutex<mpsc::Receiver<OutboxItem>>,
}

/// The server's live routing state: one persistent outbox per client ID
/// (messages queue here even while the client is offline) and the
/// currently-connected socket, if any.
#[derive(Default)]
pub struct ClientRegistry {
    outboxes: Mutex<HashMap<String, Arc<Outbox>>>,
    sockets: Mutex<HashMap<String, Arc<FramedSocket>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn outbox_for(&self, client_id: &str) -> Arc<Outbox> {
        let mut outboxes = self.outboxes.lock().unwrap();
        Arc::clone(outboxes.entry(client_id.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel();
            Arc::new(Outbox {
                sender,
                receiver: Mutex::new(receiver),
            })
        }))
    }

    /// Queue `message` for `client_id`, creating its outbox if this is the
    /// first time anything has been sent to it.
    pub fn send(&self, client_id: &str, message: String) {
        let outbox = self.outbox_for(client_id);
        if outbox.sender.send(OutboxItem::Message(message)).is_err() {
            tracing::warn!(client_id, "outbox channel unexpectedly closed");
        }
    }

    /// Block until the next queued item for `client_id` arrives. Intended
    /// to be called from exactly one out-worker thread at a time per
    /// client (enforced by locking the outbox's receiver).
    pub fn recv_blocking(&self, client_id: &str) -> Option<OutboxItem> {
        let outbox = self.outbox_for(client_id);
        let receiver = outbox.receiver.lock().unwrap();
        receiver.recv().ok()
    }

    /// Wake a blocked out-worker for `client_id` so it can exit cleanly.
    pub fn shutdown_outbox(&self, client_id: &str) {
        if let Some(outbox) = self.outboxes.lock().unwrap().get(client_id) {
            let _ = outbox.sender.send(OutboxItem::Shutdown);
        }
    }

    pub fn attach_socket(&self, client_id: &str, socket: Arc<FramedSocket>) {
        self.sockets.lock().unwrap().insert(client_id.to_string(), socket);
    }

    pub fn detach_socket(&self, client_id: &str) {
        self.sockets.lock().unwrap().remove(client_id);
    }

    pub fn socket_for(&self, client_id: &str) -> Option<Arc<FramedSocket>> {
        self.sockets.lock().unwrap().get(client_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcsms_crypto::keys::generate_keypair;

    #[test]
    fn login_rejects_colliding_key() {
        let directory = InMemoryDirectory::new();
        let (key_a, _) = generate_keypair(256).unwrap();
        let (key_b, _) = generate_keypair(256).unwrap();
        assert!(directory.login("client-1", &key_a));
        assert!(!directory.login("client-1", &key_b));
        assert!(directory.login("client-1", &key_a));
    }

    #[test]
    fn logout_keeps_the_key_on_record() {
        let directory = InMemoryDirectory::new();
        let (key, _) = generate_keypair(256).unwrap();
        directory.login("client-1", &key);
        assert!(directory.known("client-1"));
        directory.logout("client-1");
        assert!(directory.known("client-1"));
        assert_eq!(directory.get("client-1"), Some(key));
    }

    #[test]
    fn outbox_buffers_while_offline_and_delivers_in_order() {
        let registry = ClientRegistry::new();
        registry.send("client-1", "first".into());
        registry.send("client-1", "second".into());

        match registry.recv_blocking("client-1") {
            Some(OutboxItem::Message(m)) => assert_eq!(m, "first"),
            _ => panic!("expected first message"),
        }
        match registry.recv_blocking("client-1") {
            Some(OutboxItem::Message(m)) => assert_eq!(m, "second"),
            _ => panic!("expected second message"),
        }
    }

    #[test]
    fn shutdown_wakes_blocked_receiver() {
        let registry = Arc::new(ClientRegistry::new());
        let waiter = Arc::clone(&registry);
        let handle = std::thread::spawn(move || waiter.recv_blocking("client-1"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        registry.shutdown_outbox("client-1");
        assert!(matches!(handle.join().unwrap(), Some(OutboxItem::Shutdown)));
    }
}
