//! Hosted database and auth provider client.
//!
//! # Endpoints
//! ```text
//! {url}/rest/v1/competitions    list / get / insert / patch / delete
//! {url}/rest/v1/registrations   duplicate probe / insert / list / review
//! {url}/rest/v1/profiles        role lookup for the gate
//! {url}/auth/v1/user            access token → user
//! ```
//!
//! Every request carries the project key as `apikey`. The bearer token is
//! the caller's access token when one is known, so the database's row-level
//! security sees the real user; otherwise it is the anon key.

pub mod auth;
pub mod client;

pub use client::SupabaseClient;
