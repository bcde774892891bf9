//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from the handlers:
//! path normalization, cache validators, content types, ranges and responses.

pub mod cache;
pub mod mime;
pub mod path;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, ByteRange, RangeOutcome};
pub use response::{
    build_304_response, build_400_response, build_404_response, build_405_response,
    build_416_response, build_empty_response, build_options_response, build_redirect_response,
};
