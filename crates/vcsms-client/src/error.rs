/// Errors surfaced to an application using [`crate::connection::ServerConnection`].
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("not connected to the server")]
    NotConnected,
    #[error("network error: {0}")]
    Network(#[from] vcsms_core::FramingError),
    #[error("handshake aborted: {0}")]
    Handshake(#[from] vcsms_core::HandshakeError),
}
