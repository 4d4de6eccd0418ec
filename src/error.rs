use thiserror::Error;

/// Unified ADB error type
#[derive(Error, Debug)]
pub enum AdbError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// ADB server not connected
    #[error("ADB server not connected")]
    ServerNotConnected,

    /// ADB response error
    #[error("ADB response error: {0}")]
    ResponseError(String),

    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// UTF-8 decode error
    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Device info parse error
    #[error("Failed to parse device info: {0}")]
    DeviceInfoParseError(String),

    /// Hex parse error
    #[error("Hex parse error: {0}")]
    HexParseError(#[from] std::num::ParseIntError),

    /// Unknown response status
    #[error("Unknown response status: {0}")]
    UnknownResponseStatus(String),

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Protocol error
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The daemon (or a sync/bridge peer) replied FAIL with a textual reason.
    #[error("Failure: '{0}'")]
    Fail(String),

    /// The underlying stream closed with `missing` more bytes still expected.
    #[error("Premature end of stream, needed {missing} more bytes")]
    PrematureEof { missing: usize },

    /// A reply did not match any tag the caller was prepared to handle.
    #[error("Unexpected '{got}', was expecting {expected}")]
    UnexpectedData { got: String, expected: String },

    /// Bridge: an incoming packet's checksum did not match its payload.
    #[error("Checksum mismatch on bridge packet")]
    ChecksumError,

    /// Bridge: an incoming packet's magic did not match `command ^ 0xFFFFFFFF`.
    #[error("Magic value mismatch on bridge packet")]
    MagicError,

    /// Bridge: the ADB authentication handshake failed.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Bridge: a stream packet arrived before authentication completed.
    #[error("Unauthorized access")]
    UnauthorizedError,

    /// An Android public-key blob or framebuffer header was structurally invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// RSA key error surfaced from the `rsa` crate.
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    /// Base64 decode error surfaced while parsing an Android public key.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// ADB result type alias
pub type AdbResult<T> = Result<T, AdbError>;
