//! Authgate - Authentication Token Service
//!
//! Issues, validates, rotates and revokes access/refresh token cookies for
//! an HTTP service. Refresh tokens are single-use: every exchange atomically
//! consumes the presented grant, and presenting one twice revokes every live
//! session of its owner.

pub mod core;
