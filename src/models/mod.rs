//! Request and Response models for the cache gate API
//!
//! DTOs for HTTP bodies, plus the typed salon records served by the
//! memoized endpoints.

pub mod requests;
pub mod responses;
pub mod salon;

// Re-export commonly used types
pub use requests::{validate_segment, InvalidateQuery, PutCacheRequest};
pub use responses::{
    GetCacheResponse, HealthResponse, InvalidateResponse, PutCacheResponse, RootResponse,
    WarmResponse,
};
pub use salon::{Appointment, SalonSettings, ServiceOffering};
