//! Request and Response models for the inspection API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{FetchRequestBody, InvalidateRequest, PreloadRequest, SetRequest};
pub use responses::{
    ClearResponse, DeleteResponse, ErrorResponse, ExistsResponse, FetchStatsResponse,
    GetResponse, HealthResponse, ImportResponse, InvalidateResponse, PreloadResponse,
    QueueStatus, SetResponse,
};
