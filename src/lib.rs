//! NextStep: data access for a campus job board.
//!
//! Callers talk to [`api::JobBoardApi`]; [`api::connect`] picks the in-memory
//! mock backend or the REST client from [`config::Config`].

pub mod api;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fixture;
pub mod http;
pub mod mock;
pub mod models;
pub mod normalize;
pub mod query;
pub mod session;
pub mod status;
pub mod store;

pub use api::{ApiResponse, JobBoardApi, connect};
pub use config::{Backend, Config};
pub use error::{ApiError, Result};
