//! The authenticated signed-Diffie-Hellman handshake, both directions.
//!
//! Grounded directly on `vcsms/server.py::_handshake` (server side) and
//! `vcsms/server_connection.py::_handshake` (client side, the dual). Each
//! failure mode sends the matching literal abort token before returning an
//! error, exactly as the source does; nothing here raises an exception to
//! unwind the thread — callers get a `Result` and decide how to log it.

use num_bigint::BigUint;
use rand::RngCore;
use vcsms_crypto::dhke::{self, Group};
use vcsms_crypto::keys::{self, PrivateKey, PublicKey};
use vcsms_crypto::{aes256, aes256::SessionKey, signing};

use crate::error::HandshakeError;

const CHALLENGE_LEN: usize = 32;

fn send_token(socket: &crate::framed_socket::FramedSocket, token: &str) {
    let _ = socket.send(token.as_bytes());
}

fn frame_encrypted(iv: &[u8], ciphertext: &[u8]) -> String {
    format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
}

fn parse_frame(line: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let (iv, ct) = line.split_once(':')?;
    Some((hex::decode(iv).ok()?, hex::decode(ct).ok()?))
}

fn parse_hex_pair(line: &str) -> Option<(BigUint, BigUint)> {
    let (a, b) = line.split_once(':')?;
    Some((
        BigUint::parse_bytes(a.as_bytes(), 16)?,
        BigUint::parse_bytes(b.as_bytes(), 16)?,
    ))
}

fn recv_str(socket: &crate::framed_socket::FramedSocket) -> Result<String, HandshakeError> {
    let raw = socket.recv()?;
    String::from_utf8(raw).map_err(|_| HandshakeError::MalformedIdentity)
}

/// Run the server side of the handshake to completion.
///
/// `try_login` is consulted once the peer's identity and signed DH public
/// value have both checked out; it should return `false` exactly when the
/// fingerprint is already logged in under a different public key (the
/// `IDCollision` case), letting `vcsms-core` stay independent of how the
/// server stores its client directory.
pub fn server_handshake<F>(
    socket: &crate::framed_socket::FramedSocket,
    identity: &PrivateKey,
    public_key: &PublicKey,
    dh_group: &Group,
    mut try_login: F,
) -> Result<(String, SessionKey), HandshakeError>
where
    F: FnMut(&str, &PublicKey) -> bool,
{
    let (e, n) = public_key.to_hex_pair();
    socket.send(format!("{e}:{n}").as_bytes())?;

    let identity_line = recv_str(socket)?;
    let mut parts = identity_line.splitn(3, ':');
    let (client_id, client_exp, client_mod) = match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(exp), Some(modulus)) => (id, exp, modulus),
        _ => {
            send_token(socket, "MalformedIdentity");
            return Err(HandshakeError::MalformedIdentity);
        }
    };
    let client_public = match PublicKey::from_hex_pair(client_exp, client_mod) {
        Ok(key) => key,
        Err(_) => {
            send_token(socket, "MalformedIdentity");
            return Err(HandshakeError::MalformedIdentity);
        }
    };
    if keys::fingerprint(&client_public) != client_id {
        send_token(socket, "PubKeyIdMismatch");
        return Err(HandshakeError::PubKeyIdMismatch);
    }

    let dh_priv = dhke::generate_private(dh_group);
    let (dh_pub, dh_sig) = signing::gen_signed_dh(&dh_priv, identity, dh_group);
    socket.send(format!("{}:{}", dh_pub.to_str_radix(16), hex::encode(&dh_sig)).as_bytes())?;

    let client_dh_line = recv_str(socket)?;
    let (client_dh_pub, sig_bytes) = match client_dh_line.split_once(':') {
        Some((pub_hex, sig_hex)) => {
            let pub_val = BigUint::parse_bytes(pub_hex.as_bytes(), 16);
            let sig = hex::decode(sig_hex).ok();
            match (pub_val, sig) {
                (Some(p), Some(s)) => (p, s),
                _ => {
                    send_token(socket, "MalformedDiffieHellman");
                    return Err(HandshakeError::MalformedDiffieHellman);
                }
            }
        }
        None => {
            send_token(socket, "MalformedDiffieHellman");
            return Err(HandshakeError::MalformedDiffieHellman);
        }
    };
    if !signing::verify_signed_dh(&client_dh_pub, &sig_bytes, &client_public) {
        send_token(socket, "BadSignature");
        return Err(HandshakeError::BadSignature);
    }

    let shared = dhke::shared_secret(dh_group, &dh_priv, &client_dh_pub);
    let session_key = SessionKey::from_shared_secret(&shared.to_bytes_be());

    if !try_login(client_id, &client_public) {
        send_token(socket, "IDCollision");
        return Err(HandshakeError::IdCollision);
    }

    let mut challenge = [0u8; CHALLENGE_LEN];
    rand::thread_rng().fill_bytes(&mut challenge);
    let (iv, ciphertext) = aes256::encrypt(&challenge, &session_key);
    socket.send(frame_encrypted(&iv, &ciphertext).as_bytes())?;

    let response_line = recv_str(socket)?;
    let response_bytes = hex::decode(response_line.trim()).unwrap_or_default();
    if vcsms_common::constant_time_eq(&response_bytes, &challenge) {
        send_token(socket, "OK");
        Ok((client_id.to_string(), session_key))
    } else {
        send_token(socket, "Incorrect");
        Err(HandshakeError::Incorrect)
    }
}

/// Run the client side of the handshake to completion against a relay
/// whose public key is expected to fingerprint to `server_fingerprint`.
pub fn client_handshake(
    socket: &crate::framed_socket::FramedSocket,
    server_fingerprint: &str,
    identity: &PrivateKey,
    public_key: &PublicKey,
    dh_group: &Group,
) -> Result<SessionKey, HandshakeError> {
    let identity_line = recv_str(socket)?;
    let (server_exp, server_mod) = match parse_hex_pair(&identity_line) {
        Some(pair) => pair,
        None => {
            send_token(socket, "MalformedIdentity");
            return Err(HandshakeError::MalformedIdentity);
        }
    };
    let server_public = PublicKey {
        exponent: server_exp,
        modulus: server_mod,
    };
    if keys::fingerprint(&server_public) != server_fingerprint {
        send_token(socket, "PubKeyFpMismatch");
        return Err(HandshakeError::PubKeyFpMismatch);
    }

    let own_id = keys::fingerprint(public_key);
    let (own_exp, own_mod) = public_key.to_hex_pair();
    socket.send(format!("{own_id}:{own_exp}:{own_mod}").as_bytes())?;

    let dh_priv = dhke::generate_private(dh_group);
    let (dh_pub, dh_sig) = signing::gen_signed_dh(&dh_priv, identity, dh_group);

    let server_auth_line = recv_str(socket)?;
    match server_auth_line.as_str() {
        "MalformedIdentity" => return Err(HandshakeError::MalformedIdentity),
        "PubKeyIdMismatch" => return Err(HandshakeError::PubKeyIdMismatch),
        _ => {}
    }
    let (server_dh_pub, server_dh_sig) = match server_auth_line.split_once(':') {
        Some((pub_hex, sig_hex)) => {
            let pub_val = BigUint::parse_bytes(pub_hex.as_bytes(), 16);
            let sig = hex::decode(sig_hex).ok();
            match (pub_val, sig) {
                (Some(p), Some(s)) => (p, s),
                _ => {
                    send_token(socket, "MalformedDiffieHellman");
                    return Err(HandshakeError::MalformedDiffieHellman);
                }
            }
        }
        None => {
            send_token(socket, "MalformedDiffieHellman");
            return Err(HandshakeError::MalformedDiffieHellman);
        }
    };
    if !signing::verify_signed_dh(&server_dh_pub, &server_dh_sig, &server_public) {
        send_token(socket, "BadSignature");
        return Err(HandshakeError::BadSignature);
    }

    socket.send(format!("{}:{}", dh_pub.to_str_radix(16), hex::encode(&dh_sig)).as_bytes())?;
    let shared = dhke::shared_secret(dh_group, &dh_priv, &server_dh_pub);
    let session_key = SessionKey::from_shared_secret(&shared.to_bytes_be());

    let confirmation_line = recv_str(socket)?;
    match confirmation_line.as_str() {
        "MalformedDiffieHellman" => return Err(HandshakeError::MalformedDiffieHellman),
        "BadSignature" => return Err(HandshakeError::BadSignature),
        "IDCollision" => return Err(HandshakeError::IdCollision),
        _ => {}
    }
    let (iv, ciphertext) = match parse_frame(&confirmation_line) {
        Some(pair) => pair,
        None => {
            send_token(socket, "MalformedChallenge");
            return Err(HandshakeError::MalformedChallenge);
        }
    };
    let plaintext = match aes256::decrypt(&iv, &ciphertext, &session_key) {
        Ok(p) => p,
        Err(_) => {
            send_token(socket, "CouldNotDecrypt");
            return Err(HandshakeError::CouldNotDecrypt);
        }
    };
    socket.send(hex::encode(plaintext).as_bytes())?;

    let response = recv_str(socket)?;
    match response.as_str() {
        "OK" => Ok(session_key),
        "MalformedResponse" => Err(HandshakeError::MalformedResponse),
        _ => Err(HandshakeError::Incorrect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framed_socket::FramedSocket;
    use std::net::TcpListener;
    use std::thread;
    use vcsms_crypto::dhke::GROUP14_2048;
    use vcsms_crypto::keys::generate_keypair;

    #[test]
    fn full_handshake_agrees_on_session_key() {
        let (server_pub, server_priv) = generate_keypair(256).unwrap();
        let (client_pub, client_priv) = generate_keypair(256).unwrap();
        let client_fp = keys::fingerprint(&client_pub);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_pub_clone = server_pub.clone();
        let server_priv_clone = server_priv.clone();
        let server_thread = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let socket = FramedSocket::from_stream(stream);
            server_handshake(&socket, &server_priv_clone, &server_pub_clone, &GROUP14_2048, |id, _key| {
                id == client_fp
            })
        });

        let client_socket = FramedSocket::connect(addr).unwrap();
        let server_fp = keys::fingerprint(&server_pub);
        let client_result = client_handshake(
            &client_socket,
            &server_fp,
            &client_priv,
            &client_pub,
            &GROUP14_2048,
        );

        let (logged_in_id, server_session_key) = server_thread.join().unwrap().unwrap();
        let client_session_key = client_result.unwrap();
        assert_eq!(logged_in_id, keys::fingerprint(&client_pub));

        // Both sides should agree well enough to decrypt each other's traffic.
        let (iv, ct) = aes256::encrypt(b"ping", &server_session_key);
        let pt = aes256::decrypt(&iv, &ct, &client_session_key).unwrap();
        assert_eq!(pt, b"ping");
    }

    #[test]
    fn fingerprint_mismatch_aborts_client_side() {
        let (server_pub, server_priv) = generate_keypair(256).unwrap();
        let (client_pub, client_priv) = generate_keypair(256).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let socket = FramedSocket::from_stream(stream);
            server_handshake(&socket, &server_priv, &server_pub, &GROUP14_2048, |_, _| true)
        });

        let client_socket = FramedSocket::connect(addr).unwrap();
        let wrong_fp = "0".repeat(64);
        let result = client_handshake(&client_socket, &wrong_fp, &client_priv, &client_pub, &GROUP14_2048);
        assert_eq!(result.unwrap_err(), HandshakeError::PubKeyFpMismatch);
        let _ = server_thread.join();
    }
}
