use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vcsms_core::handshake::client_handshake;
use vcsms_core::FramedSocket;
use vcsms_crypto::aes256;
use vcsms_crypto::dhke::GROUP14_2048;
use vcsms_crypto::keys::{fingerprint, generate_keypair, PublicKey, PrivateKey};
use vcsms_server::{InMemoryDirectory, Server};

fn connect_client(
    port: u16,
    server_fp: &str,
    public: &PublicKey,
    private: &PrivateKey,
) -> (FramedSocket, aes256::SessionKey, String) {
    let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let socket = FramedSocket::from_stream(stream);
    let key = client_handshake(&socket, server_fp, private, public, &GROUP14_2048).unwrap();
    (socket, key, fingerprint(public))
}

#[test]
fn two_clients_relay_a_message_through_the_server() {
    let (server_pub, server_priv) = generate_keypair(256).unwrap();
    let server_fp = fingerprint(&server_pub);
    let directory = Arc::new(InMemoryDirectory::new());
    let server = Arc::new(Server::new(server_priv, server_pub, directory));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let run_server = Arc::clone(&server);
    thread::spawn(move || {
        run_server.run(("127.0.0.1", port)).unwrap();
    });
    thread::sleep(Duration::from_millis(50));

    let (alice_pub, alice_priv) = generate_keypair(256).unwrap();
    let (bob_pub, bob_priv) = generate_keypair(256).unwrap();

    let (alice_socket, alice_key, alice_id) = connect_client(port, &server_fp, &alice_pub, &alice_priv);
    let (bob_socket, bob_key, bob_id) = connect_client(port, &server_fp, &bob_pub, &bob_priv);

    let payload = format!("{bob_id}:Greeting:hello bob");
    let (iv, ct) = aes256::encrypt(payload.as_bytes(), &alice_key);
    alice_socket
        .send(format!("{}:{}", hex::encode(iv), hex::encode(ct)).as_bytes())
        .unwrap();

    let frame = bob_socket.recv().unwrap();
    let frame = std::str::from_utf8(&frame).unwrap();
    let (iv_hex, ct_hex) = frame.split_once(':').unwrap();
    let plaintext = aes256::decrypt(&hex::decode(iv_hex).unwrap(), &hex::decode(ct_hex).unwrap(), &bob_key).unwrap();
    let plaintext = String::from_utf8(plaintext).unwrap();

    assert_eq!(plaintext, format!("{alice_id}:Greeting:hello bob"));
}
