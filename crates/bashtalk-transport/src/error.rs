/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed (including lines that are not valid UTF-8).
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer sent more than the line limit without a newline.
    #[error("inbound line exceeds {0} bytes")]
    LineTooLong(usize),

    /// A line contained an embedded newline and cannot be framed.
    #[error("line contains an embedded newline")]
    InvalidLine,
}
