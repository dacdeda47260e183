//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] so every crate in the workspace wraps credentials
//! the same way. The hub keeps its identity-token signing secret in a
//! [`SecretString`]; any struct deriving `Debug` around it prints a redacted
//! placeholder, and reading the value requires an explicit
//! [`ExposeSecret::expose_secret`] call at the point of use.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SigningKey {
//!     kid: String,
//!     secret: SecretString,
//! }
//!
//! let key = SigningKey {
//!     kid: "hub-1".to_string(),
//!     secret: SecretString::from("not-for-logs"),
//! };
//!
//! assert!(!format!("{key:?}").contains("not-for-logs"));
//! assert_eq!(key.secret.expose_secret(), "not-for-logs");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
