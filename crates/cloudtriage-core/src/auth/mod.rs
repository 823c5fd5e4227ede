//! Management-plane credentials
//!
//! `TokenCache` hands out a bearer token, acquiring a new one from its
//! `CredentialProvider` only when none is held or the held one is within
//! `DEFAULT_EXPIRY_SKEW` of expiring.

mod traits;
mod token;
mod credentials;
mod cache;

pub use traits::{CredentialProvider, AuthError, AuthResult};
pub use token::{AccessToken, Clock, SystemClock, ManualClock, DEFAULT_EXPIRY_SKEW};
pub use credentials::{
    StaticCredential, ClientSecretCredential, CliCredential, ChainedCredential,
    default_credential,
};
pub use cache::TokenCache;
