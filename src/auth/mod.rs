//! Authentication and authorization module
//!
//! JWT bearer tokens identify editors; `access` turns the token's claims into
//! the set of governments, plans and updates the caller may see.

pub mod access;
mod jwt;
mod middleware;
mod password;

pub use access::{PlanScope, Viewer};
pub use jwt::{create_tokens, decode_token, refresh_tokens, Claims, TokenPair, TokenType};
pub use middleware::require_staff;
pub use password::{check_password_strength, hash_password, verify_password};
