//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for credentials such as the
//! notification transport API key. `SecretString` implements `Debug` with
//! redaction, so structs deriving `Debug` stay safe to log, and the value is
//! zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct PublisherSettings {
//!     api_url: String,
//!     api_key: SecretString,
//! }
//!
//! let settings = PublisherSettings {
//!     api_url: "http://centrifugo:8000".to_string(),
//!     api_key: SecretString::from("api-key"),
//! };
//!
//! assert!(!format!("{settings:?}").contains("api-key"));
//! assert_eq!(settings.api_key.expose_secret(), "api-key");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
