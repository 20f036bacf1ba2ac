//! Sessions: token signing, password hashing, validation and the request middleware.

pub mod middleware;
pub mod password;
pub mod token;
pub mod validator;

pub use middleware::{parse_authorization, require, require_self_or_staff, session_middleware, Actor};
pub use password::{hash_password, verify_password};
pub use token::{SessionClaims, TokenError, TokenSigner};
pub use validator::{is_listed, SessionRejection, SessionValidator, ValidatedSession};
