/// Errors raised by the framed socket's background reader and writer.
#[derive(thiserror::Error, Debug)]
pub enum FramingError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("socket is closed")]
    Closed,
}

/// Errors raised constructing or parsing a typed colon-delimited message.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("wrong number of fields for {type_name}: expected {expected}, got {got}")]
    Arity {
        type_name: String,
        expected: usize,
        got: usize,
    },
}

/// Errors raised while driving the handshake state machine. Each terminal
/// variant carries the wire token sent to, or received from, the peer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("MalformedIdentity")]
    MalformedIdentity,
    #[error("PubKeyIdMismatch")]
    PubKeyIdMismatch,
    #[error("PubKeyFpMismatch")]
    PubKeyFpMismatch,
    #[error("MalformedDiffieHellman")]
    MalformedDiffieHellman,
    #[error("BadSignature")]
    BadSignature,
    #[error("IDCollision")]
    IdCollision,
    #[error("MalformedChallenge")]
    MalformedChallenge,
    #[error("CouldNotDecrypt")]
    CouldNotDecrypt,
    #[error("MalformedResponse")]
    MalformedResponse,
    #[error("Incorrect")]
    Incorrect,
    #[error("peer closed the connection during the handshake")]
    PeerClosed,
}

impl HandshakeError {
    /// The literal ASCII token this failure sends over the wire, if any.
    /// `PeerClosed` has no token of its own: it's what we observe, not what
    /// we send.
    pub fn token(&self) -> Option<&'static str> {
        use HandshakeError::*;
        Some(match self {
            MalformedIdentity => "MalformedIdentity",
            PubKeyIdMismatch => "PubKeyIdMismatch",
            PubKeyFpMismatch => "PubKeyFpMismatch",
            MalformedDiffieHellman => "MalformedDiffieHellman",
            BadSignature => "BadSignature",
            IdCollision => "IDCollision",
            MalformedChallenge => "MalformedChallenge",
            CouldNotDecrypt => "CouldNotDecrypt",
            MalformedResponse => "MalformedResponse",
            Incorrect => "Incorrect",
            PeerClosed => return None,
        })
    }
}

impl From<FramingError> for HandshakeError {
    fn from(_: FramingError) -> Self {
        HandshakeError::PeerClosed
    }
}
