//! The VCSMS relay server binary: loads or generates a keypair, binds a
//! listener, and routes authenticated clients until killed.
//!
//! Grounded on `wavry-relay/src/main.rs`'s `clap::Parser` argument style
//! and startup sequence (tracing init, then bind-and-serve).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use vcsms_common::ServerIdentity;
use vcsms_crypto::keys::{self, PrivateKey, PublicKey};
use vcsms_server::{InMemoryDirectory, Server};

#[derive(Parser, Debug)]
#[command(name = "vcsms-server", about = "A VCSMS relay server")]
struct Args {
    /// Address to listen on, e.g. 0.0.0.0:6000
    #[arg(long, default_value = "0.0.0.0:6000")]
    listen: String,

    /// Path to the server's RSA public key file (hex exponent:modulus).
    #[arg(long, default_value = "server.pub")]
    public_key: PathBuf,

    /// Path to the server's RSA private key file (hex exponent:modulus).
    #[arg(long, default_value = "server.priv")]
    private_key: PathBuf,

    /// Modulus bit length to use when generating a keypair that doesn't
    /// exist yet.
    #[arg(long, default_value_t = 2048)]
    key_bits: u64,

    /// Where to write the server's identity (ip/port/fingerprint) once
    /// loaded, so operators can hand it to clients out of band.
    #[arg(long)]
    identity_out: Option<PathBuf>,

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

fn split_listen_addr(addr: &str) -> anyhow::Result<(&str, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .context("listen address must be of the form host:port")?;
    let port: u16 = port.parse().context("invalid port in listen address")?;
    Ok((host, port))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    vcsms_common::init_tracing_with_default(&args.log_level);

    let (public_key, private_key) =
        load_or_generate_keys(&args.public_key, &args.private_key, args.key_bits)?;
    let fingerprint = keys::fingerprint(&public_key);
    tracing::info!(%fingerprint, "server identity ready");

    if let Some(path) = &args.identity_out {
        let (ip, port) = split_listen_addr(&args.listen)?;
        let identity = ServerIdentity::new(ip, port, fingerprint.clone());
        identity.save(path).context("writing identity file")?;
    }

    let directory = Arc::new(InMemoryDirectory::new());
    let server = Arc::new(Server::new(private_key, public_key, directory));
    server.run(args.listen.as_str()).context("server loop exited")
}
