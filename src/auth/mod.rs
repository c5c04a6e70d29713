//! Authentication, credentials and the permission gate

pub mod jwt;
pub mod limiter;
pub mod middleware;
pub mod models;
pub mod password;

pub use jwt::{Claims, TokenIssuer};
pub use limiter::LoginLimiter;
pub use middleware::{ClientIp, CurrentAdmin};
pub use models::{Admin, Permission, Role, RoleKind, RoleTemplate};
pub use password::PasswordHasher;
