//! Transport-agnostic control API.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      API Stack                           │
//! │                                                          │
//! │  ┌───────────┐   ┌──────────┐   ┌──────────────────────┐ │
//! │  │ HTTP route│──▶│  Auth +  │──▶│  Engine (dispatcher) │ │
//! │  │ (adapter) │   │  limiter │   │  → ControlHandle     │ │
//! │  └───────────┘   └──────────┘   └──────────┬───────────┘ │
//! │                                            ▼             │
//! │                                   ┌──────────────────┐   │
//! │                                   │ Codec (JSON)     │   │
//! │                                   └──────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod codec;
pub mod engine;

pub use auth::ApiKey;
pub use engine::{ApiError, ApiRequest, ApiResponse, ControlApi};
