//! Router Module Index
//!
//! Routing is split by access level. Protection for the authenticated group is applied
//! as a route layer in `create_router`, and each protected handler also takes the
//! `AuthUser` extractor.

/// Routes reachable without a token: health, registration, login.
pub mod public;

/// Routes behind the authorization guard: every post operation.
pub mod authenticated;
