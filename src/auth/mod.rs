//! Admin authentication: Argon2id password verification, JWT session
//! tokens, and server-side session records that make logout take
//! effect immediately.

pub mod crypto;
pub mod errors;
pub mod jwt;
pub mod session;

pub use errors::{AuthError, AuthResult};
pub use jwt::{JwtConfig, SessionClaims, TokenSigner};
pub use session::{Session, SessionService};
