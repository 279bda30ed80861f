//! Well-known role name constants.
//!
//! These must match the seed data in `20260301000001_create_roles_and_users.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_AGENT: &str = "agent";
pub const ROLE_CLIENT: &str = "client";
