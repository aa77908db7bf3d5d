//! The server's accept loop: one handshake thread per inbound connection,
//! handing off to an in-worker/out-worker pair once authenticated.
//!
//! Grounded on `vcsms/server.py::run`'s `threading.Thread(target=self._handshake, ...)`
//! spawn-per-connection loop.

use std::net::{TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use vcsms_core::handshake::server_handshake;
use vcsms_core::FramedSocket;
use vcsms_crypto::dhke::GROUP14_2048;
use vcsms_crypto::keys::{PrivateKey, PublicKey};

use crate::registry::{ClientDirectory, ClientRegistry};
use crate::router::{in_worker, out_worker, Session};

/// Everything the listener needs to authenticate and route connections.
pub struct Server {
    pub identity: PrivateKey,
    pub public_key: PublicKey,
    pub registry: Arc<ClientRegistry>,
    pub directory: Arc<dyn ClientDirectory>,
}

impl Server {
    pub fn new(identity: PrivateKey, public_key: PublicKey, directory: Arc<dyn ClientDirectory>) -> Self {
        Self {
            identity,
            public_key,
            registry: Arc::new(ClientRegistry::new()),
            directory,
        }
    }

    /// Bind `addr` and serve connections until the listener errors. Each
    /// accepted connection is handed a dedicated thread to avoid blocking
    /// the accept loop on a slow or hostile handshake.
    pub fn run(self: Arc<Self>, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(%err, "failed to accept connection");
                    continue;
                }
            };
            let server = Arc::clone(&self);
            thread::spawn(move || server.handle_connection(stream));
        }
        Ok(())
    }

    fn handle_connection(&self, stream: std::net::TcpStream) {
        let peer = stream.peer_addr().ok();
        let socket = Arc::new(FramedSocket::from_stream(stream));
        let directory = Arc::clone(&self.directory);
        let result = server_handshake(&socket, &self.identity, &self.public_key, &GROUP14_2048, |id, key| {
            directory.login(id, key)
        });

        let (client_id, session_key) = match result {
            Ok(pair) => pair,
            Err(err) => {
                tracing::info!(?peer, %err, "handshake failed");
                return;
            }
        };
        tracing::info!(?peer, client_id = %client_id, "client authenticated");

        self.registry.attach_socket(&client_id, Arc::clone(&socket));
        let session = Session {
            client_id: client_id.clone(),
            socket: Arc::clone(&socket),
            session_key,
        };

        let out_registry = Arc::clone(&self.registry);
        let out_session = Session {
            client_id: client_id.clone(),
            socket: Arc::clone(&socket),
            session_key: session.session_key.clone(),
        };
        let out_handle = thread::spawn(move || out_worker(&out_session, &out_registry));

        in_worker(&session, &self.registry, self.directory.as_ref());

        self.registry.detach_socket(&client_id);
        self.registry.shutdown_outbox(&client_id);
        self.directory.logout(&client_id);
        let _ = out_handle.join();
    }
}
