//! Identity provider client.
//!
//! [`IdentityApi`] is the capability seam; [`DemoIdentityClient`] answers
//! every call with deterministic simulated data.

pub mod api;
pub mod demo;
pub mod token;

pub use api::{
    ApiStats, BulkCreateResult, CreatedUser, IdentityApi, TimeSavings, UserLookup,
    AUTOMATED_MINUTES_PER_USER, MANUAL_MINUTES_PER_USER,
};
pub use demo::{DemoIdentityClient, SimulatedFaults, DEMO_ACCESS_TOKEN};
pub use token::AccessToken;
