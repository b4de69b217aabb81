use thiserror::Error;

/// Every way a generation call can reject its input.
///
/// All variants describe caller mistakes; nothing here is transient and
/// nothing is retried or replaced with a default.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FractalError {
    #[error("invalid level {level}: {reason}")]
    InvalidLevel { level: i64, reason: &'static str },

    #[error("degenerate segment from ({x0}, {y0}) to ({x1}, {y1})")]
    DegenerateSegment { x0: f64, y0: f64, x1: f64, y1: f64 },

    #[error("malformed replacement rule: {0}")]
    MalformedRule(String),

    #[error("invalid affine map set: {0}")]
    InvalidConfiguration(String),

    #[error("warmup ({warmup}) exceeds total iterations ({total_iterations})")]
    IterationBounds { total_iterations: usize, warmup: usize },

    #[error("unknown replacement rule: {0}")]
    UnknownRule(String),

    #[error("unknown IFS preset: {0}")]
    UnknownPreset(String),
}

pub type Result<T> = std::result::Result<T, FractalError>;
