//! Time-bounded server salts.

use serde::{Deserialize, Serialize};

/// A server salt: a 64-bit value the server accepts only inside its
/// validity window. Salts are mixed into per-message encryption after the
/// handshake; the registry keeps a rolling set of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSalt {
    /// Start of the validity window, unix seconds
    pub valid_since: i32,
    /// End of the validity window, unix seconds (exclusive)
    pub valid_until: i32,
    /// The salt value itself
    pub value: i64,
}

impl ServerSalt {
    /// Whether the salt is usable at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: i32) -> bool {
        self.valid_since <= now && now < self.valid_until
    }

    /// Seconds of validity left at `now` (zero if already expired).
    #[must_use]
    pub fn remaining_at(&self, now: i32) -> i32 {
        (self.valid_until - now).max(0)
    }

    /// The sentinel a server uses to explicitly invalidate a salt: a
    /// window that claims to span all of time.
    #[must_use]
    pub fn is_forever_invalid(&self) -> bool {
        self.valid_since == 0 && self.valid_until == i32::MAX
    }
}
