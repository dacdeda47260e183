//! Identity token claims.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims carried by a hub identity token.
///
/// `sub` is the username. It is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}
