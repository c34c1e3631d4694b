//! Operation descriptors: one request/response pair per API.

pub mod api_versions;
pub mod delete_topics;

pub use api_versions::{ApiVersionRange, ApiVersionsRequest, ApiVersionsResponse};
pub use delete_topics::{DeletableTopicResult, DeleteTopicsRequest, DeleteTopicsResponse};
