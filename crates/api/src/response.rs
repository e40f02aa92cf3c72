//! Shared response envelope.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope for resource endpoints.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
