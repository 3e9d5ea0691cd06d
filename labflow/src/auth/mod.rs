//! Authentication.
//!
//! Accounts are email + password. A successful register or login issues an HS256 session token
//! which the client presents either as an HttpOnly cookie or as `Authorization: Bearer <token>`.
//! Sessions are stateless: the token carries the user id and expiry, nothing is stored server
//! side, and logout simply clears the cookie.
//!
//! # Modules
//!
//! - [`current_user`]: The [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`password`]: Argon2id hashing and verification
//! - [`session`]: Session token creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use labflow::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.email)
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod session;
