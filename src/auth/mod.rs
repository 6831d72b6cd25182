//! Token signing, password hashing, cookies, and request extractors.

pub mod claims;
pub mod cookies;
pub mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::{AuthUser, ClientIp};
pub use jwt::JwtKeys;
