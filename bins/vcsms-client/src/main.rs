//! A minimal VCSMS client binary: connects to a relay, optionally looks up
//! another client's public key, and otherwise prints whatever the relay
//! delivers.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use num_bigint::BigUint;

use vcsms_client::ServerConnection;
use vcsms_common::ServerIdentity;
use vcsms_core::message::{server_incoming_schema, server_outgoing_schema, Value};
use vcsms_crypto::keys::{self, PrivateKey, PublicKey};

#[derive(Parser, Debug)]
#[command(name = "vcsms-client", about = "A VCSMS client")]
struct Args {
    /// Path to the relay's identity file (ip/port/fingerprint JSON).
    #[arg(long)]
    server_identity: PathBuf,

    /// Path to this client's RSA public key file.
    #[arg(long, default_value = "client.pub")]
    public_key: PathBuf,

    /// Path to this client's RSA private key file.
    #[arg(long, default_value = "client.priv")]
    private_key: PathBuf,

    /// Modulus bit length to use when generating a keypair that doesn't
    /// exist yet.
    #[arg(long, default_value_t = 2048)]
    key_bits: u64,

    /// Look up another client's public key by fingerprint, print the
    /// result, and exit instead of idling.
    #[arg(long)]
    get_key: Option<String>,

    /// Log level to use when RUST_LOG isn't set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_or_generate_keys(
    public: &PathBuf,
    private: &PathBuf,
    bits: u64,
) -> anyhow::Result<(PublicKey, PrivateKey)> {
    if public.exists() && private.exists() {
        let pub_key = keys::load_public(public).context("loading public key")?;
        let priv_key = keys::load_private(private).context("loading private key")?;
        Ok((pub_key, priv_key))
    } else {
        tracing::info!("no keypair found at the configured paths, generating a new one");
        let (pub_key, priv_key) = keys::generate_keypair(bits).context("generating keypair")?;
        keys::save_public(&pub_key, public).context("saving public key")?;
        keys::save_private(&priv_key, private).context("saving private key")?;
        Ok((pub_key, priv_key))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    vcsms_common::init_tracing_with_default(&args.log_level);

    let (public_key, private_key) =
        load_or_generate_keys(&args.public_key, &args.private_key, args.key_bits)?;
    let identity =
        ServerIdentity::load(&args.server_identity).context("loading server identity")?;

    let conn = ServerConnection::connect(
        &identity.ip,
        identity.port,
        &identity.fingerprint,
        &private_key,
        &public_key,
    )
    .context("connecting to relay")?;
    tracing::info!(fingerprint = %identity.fingerprint, "connected to relay");

    if let Some(target) = args.get_key {
        let request = server_incoming_schema()
            .construct("0", "GetKey", &[Value::Int(BigUint::from(1u32)), Value::Text(target.clone())])
            .context("constructing GetKey request")?;
        conn.send(request.as_bytes())?;

        let response = conn.recv().context("waiting for GetKey response")?;
        let response = String::from_utf8(response).context("relay sent non-utf8 response")?;
        let parsed = server_outgoing_schema()
            .parse(&response)
            .context("parsing GetKey response")?;
        match parsed.type_name.as_str() {
            "KeyFound" => {
                let exponent = parsed.fields[1].as_int().context("malformed KeyFound exponent")?;
                let modulus = parsed.fields[2].as_int().context("malformed KeyFound modulus")?;
                println!("{target} exponent={exponent:x} modulus={modulus:x}");
            }
            "KeyNotFound" => println!("{target} is not known to this relay"),
            other => println!("unexpected reply type: {other}"),
        }
        conn.close();
        return Ok(());
    }

    while conn.connected() {
        match conn.recv() {
            Ok(message) => println!("{}", String::from_utf8_lossy(&message)),
            Err(_) => break,
        }
    }
    Ok(())
}
