//! Data models for Audio Conform.
//!
//! This module contains the request/response shapes shared by the core
//! pipeline and the HTTP layer:
//! - Output format enum
//! - Conform request with validation
//! - Conform result and its wire response

mod enums;
mod request;
mod result;

pub use enums::OutputFormat;
pub use request::{ConformRequest, RequestLimits, MAX_TARGET_DURATION_MS};
pub use result::{ConformResponse, ConformResult, ResponseMeta, PIPELINE_TAG};
