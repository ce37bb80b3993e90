//! Adapters for services this one depends on but does not own.
//!
//! Routes and middleware only see the traits; the HTTP or token details stay
//! behind them, so tests can swap in fixed implementations.

pub mod errors;
pub mod identity;

pub use errors::AuthError;
pub use identity::{
    AuthServiceResolver, FixedIdentityResolver, IdentityResolver, JwtIdentityResolver,
};
