use crate::types::DbId;

/// Request-scoped caller identity, passed explicitly to every engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// The authenticated account.
    pub account_id: DbId,
    /// Value of the `x-request-id` header, when present.
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(account_id: DbId) -> Self {
        Self {
            account_id,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
