pub mod verifier;

pub use verifier::{AuthClient, IdentityVerifier};
