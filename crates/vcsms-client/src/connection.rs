//! The client-side mirror of the server's connection handling.
//!
//! Grounded directly on `vcsms/server_connection.py`'s `ServerConnection`:
//! an in-queue and out-queue pair, a send lock so [`ServerConnection::close`]
//! can drain pending sends before tearing down the socket, and background
//! in/out threads started once `connect` completes the handshake.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use vcsms_core::handshake::client_handshake;
use vcsms_core::FramedSocket;
use vcsms_crypto::aes256::{self, SessionKey};
use vcsms_crypto::dhke::GROUP14_2048;
use vcsms_crypto::keys::{PrivateKey, PublicKey};

use crate::error::ConnectionError;

enum ConnItem {
    Data(Vec<u8>),
    Shutdown,
}

struct Queue {
    items: Mutex<VecDeque<ConnItem>>,
    cond: Condvar,
}

impl Queue {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }

    fn push(&self, item: ConnItem) {
        let mut items = self.items.lock().unwrap();
        items.push_back(item);
        self.cond.notify_one();
    }

    fn pop(&self) -> ConnItem {
        let mut items = self.items.lock().unwrap();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self.cond.wait(items).unwrap();
        }
    }

    fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

/// An authenticated, encrypted connection to a relay speaking the VCSMS
/// handshake protocol.
pub struct ServerConnection {
    socket: Arc<FramedSocket>,
    in_queue: Arc<Queue>,
    out_queue: Arc<Queue>,
    send_lock: Mutex<()>,
}

impl ServerConnection {
    /// Dial `ip:port`, verify its public key fingerprints to `fingerprint`,
    /// and complete the signed-DH handshake using `identity`/`public_key`.
    pub fn connect(
        ip: &str,
        port: u16,
        fingerprint: &str,
        identity: &PrivateKey,
        public_key: &PublicKey,
    ) -> Result<Self, ConnectionError> {
        let socket = Arc::new(FramedSocket::connect((ip, port))?);
        let session_key = client_handshake(&socket, fingerprint, identity, public_key, &GROUP14_2048)?;

        let in_queue = Arc::new(Queue::new());
        let out_queue = Arc::new(Queue::new());

        let in_socket = Arc::clone(&socket);
        let in_key = session_key.clone();
        let in_q = Arc::clone(&in_queue);
        let in_out_q = Arc::clone(&out_queue);
        thread::spawn(move || in_thread(in_socket, in_key, in_q, in_out_q));

        let out_socket = Arc::clone(&socket);
        let out_key = session_key;
        let out_q = Arc::clone(&out_queue);
        thread::spawn(move || out_thread(out_socket, out_key, out_q));

        Ok(Self {
            socket,
            in_queue,
            out_queue,
            send_lock: Mutex::new(()),
        })
    }

    pub fn connected(&self) -> bool {
        self.socket.connected()
    }

    /// Whether there is a received message waiting in the in-queue.
    pub fn new_message(&self) -> bool {
        !self.in_queue.is_empty()
    }

    /// Queue `data` to be encrypted and sent to the server.
    pub fn send(&self, data: &[u8]) -> Result<(), ConnectionError> {
        if !self.socket.connected() {
            return Err(ConnectionError::NotConnected);
        }
        self.out_queue.push(ConnItem::Data(data.to_vec()));
        Ok(())
    }

    /// Block until a message from the server is available.
    pub fn recv(&self) -> Result<Vec<u8>, ConnectionError> {
        if !self.socket.connected() && self.in_queue.is_empty() {
            return Err(ConnectionError::NotConnected);
        }
        match self.in_queue.pop() {
            ConnItem::Data(data) => Ok(data),
            ConnItem::Shutdown => Err(ConnectionError::NotConnected),
        }
    }

    /// Wait for all queued sends to drain, then close the socket. Mirrors
    /// `ServerConnection.close` in the original: acquiring `send_lock`
    /// guarantees no send is mid-flight when the socket goes down.
    pub fn close(&self) {
        if !self.socket.connected() {
            return;
        }
        loop {
            if self.out_queue.is_empty() {
                let _guard = self.send_lock.lock().unwrap();
                self.socket.close();
                self.out_queue.push(ConnItem::Shutdown);
                self.in_queue.push(ConnItem::Shutdown);
                return;
            }
            thread::yield_now();
        }
    }
}

fn in_thread(socket: Arc<FramedSocket>, key: SessionKey, in_queue: Arc<Queue>, out_queue: Arc<Queue>) {
    loop {
        let frame = match socket.recv() {
            Ok(frame) => frame,
            Err(_) => {
                in_queue.push(ConnItem::Shutdown);
                return;
            }
        };
        let frame = match std::str::from_utf8(&frame) {
            Ok(s) => s,
            Err(_) => {
                out_queue.push(ConnItem::Data(b"0:CiphertextMalformed".to_vec()));
                continue;
            }
        };
        let Some((iv_hex, ct_hex)) = frame.split_once(':') else {
            out_queue.push(ConnItem::Data(b"0:CiphertextMalformed".to_vec()));
            continue;
        };
        let Ok(iv) = hex::decode(iv_hex) else {
            out_queue.push(ConnItem::Data(b"0:InvalidIV".to_vec()));
            continue;
        };
        let Ok(ciphertext) = hex::decode(ct_hex) else {
            out_queue.push(ConnItem::Data(b"0:CiphertextMalformed".to_vec()));
            continue;
        };
        match aes256::decrypt(&iv, &ciphertext, &key) {
            Ok(message) => in_queue.push(ConnItem::Data(message)),
            Err(_) => out_queue.push(ConnItem::Data(b"0:MessageDecryptionFailure".to_vec())),
        }
    }
}

fn out_thread(socket: Arc<FramedSocket>, key: SessionKey, out_queue: Arc<Queue>) {
    loop {
        match out_queue.pop() {
            ConnItem::Data(message) => {
                let (iv, ciphertext) = aes256::encrypt(&message, &key);
                let frame = format!("{}:{}", hex::encode(iv), hex::encode(ciphertext));
                if socket.send(frame.as_bytes()).is_err() {
                    return;
                }
            }
            ConnItem::Shutdown => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use vcsms_core::handshake::server_handshake;
    use vcsms_crypto::keys::{fingerprint, generate_keypair};

    #[test]
    fn connect_send_recv_close() {
        let (server_pub, server_priv) = generate_keypair(256).unwrap();
        let (client_pub, client_priv) = generate_keypair(256).unwrap();
        let client_fp = fingerprint(&client_pub);
        let server_fp = fingerprint(&server_pub);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let port = addr.port();

        let server_thread = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let socket = FramedSocket::from_stream(stream);
            let (id, key) =
                server_handshake(&socket, &server_priv, &server_pub, &GROUP14_2048, |id, _| id == client_fp).unwrap();
            (socket, id, key)
        });

        let conn = ServerConnection::connect("127.0.0.1", port, &server_fp, &client_priv, &client_pub).unwrap();
        let (server_socket, _id, server_key) = server_thread.join().unwrap();

        let (iv, ct) = aes256::encrypt(b"hello client", &server_key);
        server_socket
            .send(format!("{}:{}", hex::encode(iv), hex::encode(ct)).as_bytes())
            .unwrap();
        assert_eq!(conn.recv().unwrap(), b"hello client");

        conn.send(b"hello server").unwrap();
        let frame = server_socket.recv().unwrap();
        let frame = std::str::from_utf8(&frame).unwrap();
        let (iv_hex, ct_hex) = frame.split_once(':').unwrap();
        let plaintext = aes256::decrypt(&hex::decode(iv_hex).unwrap(), &hex::decode(ct_hex).unwrap(), &server_key).unwrap();
        assert_eq!(plaintext, b"hello server");

        conn.close();
        assert!(!conn.connected());
    }
}
