mod token;
mod user;

pub use token::{AuthToken, Caster, AUTH_TOKEN_COOKIE};
pub use user::{Rights, User};
