//! Domain logic for wayfarer: trip parameters, prompt construction, the
//! DashScope client, and the response normalizer that turns raw model text
//! into a validated travel plan.
//!
//! This crate is pure apart from the upstream HTTP client in
//! [`upstream`]; persistence lives in `wayfarer-db` and the HTTP API in
//! `wayfarer-cli`.

pub mod normalize;
pub mod plan;
pub mod prompt;
pub mod token;
pub mod trip;
pub mod upstream;
