pub mod storage;
pub mod store;
pub mod token;

pub use storage::CredentialStorage;
pub use store::{SessionSnapshot, SessionStore};
pub use token::{decode_role, decode_claims, TokenClaims};
