use chardiff_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using DetectError
pub type Result<T> = std::result::Result<T, DetectError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, log assertions, and responses returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input
    InvalidInput,
    InvalidContext,
    InvalidConfig,
    MalformedState,

    // Detection
    DetectorFailed,
    DetectorPanicked,
    AlreadyExists,
    NotFound,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidContext => "ERR_INVALID_CONTEXT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::MalformedState => "ERR_MALFORMED_STATE",
            ExErrorKind::DetectorFailed => "ERR_DETECTOR_FAILED",
            ExErrorKind::DetectorPanicked => "ERR_DETECTOR_PANICKED",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries classification fields for programmatic handling and enough
/// context (operation, detector, field path, run id) to debug a failed run.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    detector: Option<String>,
    field_path: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            detector: None,
            field_path: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the name of the detector that raised the error
    pub fn with_detector(mut self, detector: impl Into<String>) -> Self {
        self.detector = Some(detector.into());
        self
    }

    /// Add the field path being processed
    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    /// Add detection run id context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add trace id context
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn detector(&self) -> Option<&str> {
        self.detector.as_deref()
    }

    pub fn field_path(&self) -> Option<&str> {
        self.field_path.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(detector) = &self.detector {
            write!(f, " (detector: {})", detector)?;
        }
        if let Some(path) = &self.field_path {
            write!(f, " (field_path: {})", path)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " (run_id: {})", request_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for detection and configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    // ===== State shape =====
    /// A subtree exists but has a JSON type the detector cannot read
    #[error("Malformed subtree at {path}: expected {expected}, found {found}")]
    MalformedSubtree {
        path: String,
        expected: String,
        found: String,
    },

    // ===== Detector execution =====
    /// A detector reported a failure of its own
    #[error("Detector {detector} failed: {reason}")]
    DetectorFailed { detector: String, reason: String },

    /// A detector panicked while scanning its subtree
    #[error("Detector {detector} panicked: {reason}")]
    DetectorPanicked { detector: String, reason: String },

    // ===== Registry =====
    /// A detector with the same name is already registered
    #[error("Detector already registered: {name}")]
    DuplicateDetector { name: String },

    /// No detector with this name is registered
    #[error("Detector not found: {name}")]
    DetectorNotFound { name: String },

    // ===== Context / configuration =====
    /// The detection context cannot be used for a run
    #[error("Invalid detection context: {reason}")]
    InvalidContext { reason: String },

    /// A rule table or threshold is unusable
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A configuration document could not be parsed
    #[error("Failed to parse configuration: {reason}")]
    ConfigParse { reason: String },

    /// A configuration file could not be read
    #[error("I/O error reading {path}: {reason}")]
    Io { path: String, reason: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl From<DetectError> for ExError {
    fn from(err: DetectError) -> Self {
        let message = err.to_string();
        match err {
            DetectError::MalformedSubtree { path, .. } => ExError::new(ExErrorKind::MalformedState)
                .with_field_path(path)
                .with_message(message),
            DetectError::DetectorFailed { detector, .. } => {
                ExError::new(ExErrorKind::DetectorFailed)
                    .with_detector(detector)
                    .with_message(message)
            }
            DetectError::DetectorPanicked { detector, .. } => {
                ExError::new(ExErrorKind::DetectorPanicked)
                    .with_detector(detector)
                    .with_message(message)
            }
            DetectError::DuplicateDetector { name } => ExError::new(ExErrorKind::AlreadyExists)
                .with_detector(name)
                .with_message(message),
            DetectError::DetectorNotFound { name } => ExError::new(ExErrorKind::NotFound)
                .with_detector(name)
                .with_message(message),
            DetectError::InvalidContext { .. } => {
                ExError::new(ExErrorKind::InvalidContext).with_message(message)
            }
            DetectError::InvalidConfig { .. } | DetectError::ConfigParse { .. } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(message)
            }
            DetectError::Io { .. } => ExError::new(ExErrorKind::Io).with_message(message),
            DetectError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for DetectError {
    fn from(err: serde_json::Error) -> Self {
        DetectError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DetectError {
    fn from(err: toml::de::Error) -> Self {
        DetectError::ConfigParse {
            reason: err.to_string(),
        }
    }
}
