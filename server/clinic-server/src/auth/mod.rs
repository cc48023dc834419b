//! Authentication and role based access control

pub mod password;
pub mod roles;
pub mod tokens;
pub mod users;

pub use password::{hash_password, verify_password};
pub use roles::{doctor_scope, effective_permissions, Role};
pub use tokens::{Claims, IssuedToken, TokenError, TokenService, TokenSubject};
pub use users::{UserProfile, UserRecord};
