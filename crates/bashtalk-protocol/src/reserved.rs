//! Reserved lines with protocol-level meaning.
//!
//! Clients match these byte for byte, so they must never change.

/// Sent to a connection refused because the server is full.
pub const MAX_CLIENTS_REACHED: &str = "Maximum number of clients reached.";

/// Asks a new connection for its username.
pub const USERNAME_PROMPT: &str = "Please enter a valid username: ";

/// The username was accepted; the session is now active.
pub const USERNAME_APPROVED: &str = "Username approved. Welcome.";

/// The username was empty, malformed or already taken.
pub const USERNAME_REJECTED: &str = "Username already online. Please try again.";

/// Terminates the history replay sent after a successful join.
pub const END_OF_HISTORY: &str = "-- End of Message History --";

/// Tells a client it has been banned; the client disconnects itself.
pub const BANNED: &str = "banned";

/// Broadcast once when the server stops.
pub const SHUTDOWN: &str = "shutdown";
