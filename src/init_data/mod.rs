//! Chat-platform init data: the signed query string a mini-app client attaches
//! to every request.
//!
//! [`codec`] turns the string into an untrusted record; [`verify`] decides whether
//! the platform actually signed it.

pub mod codec;
pub mod verify;

pub use codec::{parse, AuthContext, IdentityField, ParsedIdentity, ParsedInitData};
pub use verify::{verify_signature, InitDataVerifier};
