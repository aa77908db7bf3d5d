pub mod error;
pub mod framed_socket;
pub mod handshake;
pub mod message;

pub use error::{FramingError, HandshakeError, ParseError};
pub use framed_socket::FramedSocket;
pub use message::{MessageSchema, ParsedMessage, Value};
