//! `ErrorCtx`: the context passed alongside a `SubflowError` to `sendError`
//! (§6).

/// Where an error reported to `MessageSystem::send_error` originated.
#[derive(Debug, Clone)]
pub struct ErrorCtx {
    pub subsystem: String,
    pub path: Option<String>,
    pub correlation_id: Option<String>,
}

impl ErrorCtx {
    pub fn new(subsystem: impl Into<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            path: None,
            correlation_id: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
