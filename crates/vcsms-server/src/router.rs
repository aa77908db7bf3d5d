//! Per-connection in-worker / out-worker threads and the server's built-in
//! message handlers.
//!
//! Grounded on `vcsms/server.py`'s `_in_thread`, `_out_thread`,
//! `_handler_get_key`, `_handler_quit`, and `_handler_default`. The
//! previously-unregistered `_handler_unknown` is wired here as
//! `UnknownMessageType`, resolving the open question noted in spec §9.

use std::sync::Arc;

use vcsms_core::message::{server_incoming_schema, server_outgoing_schema, ParseError, Value};
use vcsms_core::FramedSocket;
use vcsms_crypto::aes256::{self, SessionKey};

use crate::registry::{ClientDirectory, ClientRegistry, OutboxItem};

/// Everything a connection's worker pair needs once the handshake has
/// completed and the peer is authenticated as `client_id`.
pub struct Session {
    pub client_id: String,
    pub socket: Arc<FramedSocket>,
    pub session_key: SessionKey,
}

fn reply_to_sender(registry: &ClientRegistry, sender: &str, type_name: &str, fields: &[Value]) {
    let schema = server_outgoing_schema();
    match schema.construct("0", type_name, fields) {
        Ok(line) => registry.send(sender, line),
        Err(err) => tracing::error!(%type_name, %err, "failed to construct server reply"),
    }
}

fn handle_get_key(
    registry: &ClientRegistry,
    directory: &dyn ClientDirectory,
    sender: &str,
    fields: &[Value],
) {
    let (Some(request_index), Some(target_id)) = (fields.first().and_then(Value::as_int), fields.get(1).and_then(Value::as_text))
    else {
        reply_to_sender(registry, sender, "MessageMalformed", &[]);
        return;
    };
    match directory.get(target_id) {
        Some(key) => reply_to_sender(
            registry,
            sender,
            "KeyFound",
            &[
                Value::Int(request_index.clone()),
                Value::Int(key.exponent.clone()),
                Value::Int(key.modulus.clone()),
            ],
        ),
        None => reply_to_sender(registry, sender, "KeyNotFound", &[Value::Int(request_index.clone())]),
    }
}

fn handle_quit(registry: &ClientRegistry, directory: &dyn ClientDirectory, sender: &str) {
    if let Some(socket) = registry.socket_for(sender) {
        socket.close();
    }
    registry.detach_socket(sender);
    registry.shutdown_outbox(sender);
    directory.logout(sender);
}

/// Decrypt, parse, and dispatch one connection's inbound frames until the
/// socket dies. Messages addressed to anyone other than the server ("0")
/// are relayed into that recipient's outbox with the sender substituted in,
/// never in plaintext.
pub fn in_worker(
    session: &Session,
    registry: &ClientRegistry,
    directory: &dyn ClientDirectory,
) {
    let incoming = server_incoming_schema();
    loop {
        let frame = match session.socket.recv() {
            Ok(frame) => frame,
            Err(_) => {
                tracing::info!(client_id = %session.client_id, "connection closed");
                break;
            }
        };
        let frame = match std::str::from_utf8(&frame) {
            Ok(s) => s,
            Err(_) => {
                reply_to_sender(registry, &session.client_id, "CiphertextMalformed", &[]);
                continue;
            }
        };
        let Some((iv_hex, ct_hex)) = frame.split_once(':') else {
            reply_to_sender(registry, &session.client_id, "CiphertextMalformed", &[]);
            continue;
        };
        let Ok(iv) = hex::decode(iv_hex) else {
            reply_to_sender(registry, &session.client_id, "InvalidIV", &[]);
            continue;
        };
        let Ok(ciphertext) = hex::decode(ct_hex) else {
            reply_to_sender(registry, &session.client_id, "CiphertextMalformed", &[]);
            continue;
        };
        let plaintext = match aes256::decrypt(&iv, &ciphertext, &session.session_key) {
            Ok(p) => p,
            Err(_) => {
                reply_to_sender(registry, &session.client_id, "MessageDecryptionFailure", &[]);
                continue;
            }
        };
        let Ok(plaintext) = String::from_utf8(plaintext) else {
            reply_to_sender(registry, &session.client_id, "MessageMalformed", &[]);
            continue;
        };

        let Some((recipient, rest)) = plaintext.split_once(':') else {
            reply_to_sender(registry, &session.client_id, "MessageMalformed", &[]);
            continue;
        };

        if recipient != "0" {
            // Relay: the recipient sees the sender in the field the
            // message arrived addressed by, exactly mirroring the
            // original's field-reuse for inbound vs. outbound framing.
            let relayed = format!("{}:{}", session.client_id, rest);
            registry.send(recipient, relayed);
            continue;
        }

        match incoming.parse(&plaintext) {
            Ok(parsed) => match parsed.type_name.as_str() {
                "GetKey" => handle_get_key(registry, directory, &session.client_id, &parsed.fields),
                "Quit" => handle_quit(registry, directory, &session.client_id),
                _ => tracing::debug!(
                    client_id = %session.client_id,
                    type_name = %parsed.type_name,
                    "no handler registered for message type, ignoring"
                ),
            },
            Err(ParseError::UnknownType(type_name)) => {
                reply_to_sender(
                    registry,
                    &session.client_id,
                    "UnknownMessageType",
                    &[Value::Text(type_name)],
                );
            }
            Err(_) => reply_to_sender(registry, &session.client_id, "MessageMalformed", &[]),
        }
    }
}

/// Drain `client_id`'s outbox, encrypting and framing each message onto the
/// socket, until the outbox yields the shutdown sentinel or the socket
/// dies.
pub fn out_worker(session: &Session, registry: &ClientRegistry) {
    loop {
        match registry.recv_blocking(&session.client_id) {
            Some(OutboxItem::Message(message)) => {
                let (iv, ciphertext) = aes256::encrypt(message.as_bytes(), &session.session_key);
                let frame = format!("{}:{}", hex::encode(iv), hex::encode(ciphertext));
                if let Err(err) = session.socket.send(frame.as_bytes()) {
                    tracing::info!(client_id = %session.client_id, %err, "out-worker send failed, stopping");
                    break;
                }
            }
            Some(OutboxItem::Shutdown) | None => break,
        }
    }
}
