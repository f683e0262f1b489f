pub mod bootstrap;
mod deadline;
mod error;
pub mod gate;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod refresh;
pub mod roles;
pub mod session;
pub mod store;
pub mod sweeper;
mod types;

pub use bootstrap::{AuthComponents, build_components};
pub use error::{AuthError, AuthResult, StoreError};
pub use gate::{AccessGate, bearer_token};
pub use jwt::{JwtSettings, JwtSigner, TokenSigner};
pub use password::{Argon2Hasher, PasswordHasher};
pub use roles::{ADMIN_ROLE, AuthorizationResolver};
pub use session::{SessionManager, SessionSettings};
pub use types::{
    Claims, CustomClaims, IssuedToken, RESERVED_CLAIMS, RefreshTokenRecord, RoleAssignment,
    RoleId, RoleRecord, SessionTokens, UserId, UserRecord, UserRoleRecord,
};
