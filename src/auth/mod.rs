//! Authentication for Inkpress
//!
//! Stateless JWT bearer identity shared by both transports, plus argon2
//! password storage for accounts.
//!
//! ## Model
//!
//! - **Accounts**: email + argon2-hashed password, created through the
//!   GraphQL surface.
//! - **Tokens**: HS256 JWTs with subject = user id and a bounded TTL,
//!   issued on signup and login.
//! - **Requests**: HTTP carries the token per request in the
//!   `Authorization` header; WebSocket connections present it once as
//!   `accessToken` in the `connection_init` payload and keep the resolved
//!   identity for the connection's lifetime.

pub mod identity;
pub mod password;
pub mod token;

pub use identity::{Identity, RequestAuth};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use token::TokenManager;
