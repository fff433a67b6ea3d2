//! Security subsystem: the request gate.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (fixed window per client, /api/ /login /register only)
//!     → session.rs (bearer header or sb-*-auth-token cookie → auth provider)
//!     → access_control.rs (protected prefixes, admin / instructor rules)
//!     → gate.rs combines the three into Pass / Redirect / RateLimited
//! ```
//!
//! Rate limiting runs first so abusive clients never trigger auth lookups.
//! Lookup failures leave the request unauthenticated, so protected pages
//! redirect to the login page.

pub mod access_control;
pub mod gate;
pub mod rate_limit;
pub mod session;

pub use access_control::{AccessDecision, AccessPolicy, Caller, Identity, Profile, Role, Session};
pub use gate::{GateOutcome, RequestGate};
pub use rate_limit::{FixedWindowLimiter, LimitSettings, RateDecision};
pub use session::{AuthError, IdentityProvider};
