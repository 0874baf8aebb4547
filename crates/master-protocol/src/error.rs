use thiserror::Error;

/// Errors raised while decoding or encoding frames and the values inside them.
///
/// A [`CodecError`] surfacing out of [`crate::frame::FrameDecoder`] is always
/// fatal to the connection it came from (spec's "bad frame" disposition);
/// errors raised while decoding a packet body are a matter for the caller.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bad frame signature: expected 0x55, got {0:#04x}")]
    BadSignature(u8),

    #[error("frame declares body length {declared} but {available} bytes remain")]
    BadLength { declared: usize, available: usize },

    #[error("string length mismatch: header said {declared}, UTF-8 slice was {actual} bytes")]
    StringLength { declared: usize, actual: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("unexpected end of buffer while decoding {what}")]
    Eof { what: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
