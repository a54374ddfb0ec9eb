//! Credential handling: unverified payload decoding, strict claim schemas and
//! fixed-key persistence. Token material is kept behind `SecretString` once it
//! leaves storage and must never be logged.

pub mod claims;
pub mod codec;
pub mod store;

pub use claims::{CredentialClaims, VerificationClaims, ROLE_ADMIN, ROLE_MEMBER};
pub use codec::{decode, decode_payload, DecodeError};
pub use store::TokenStore;
