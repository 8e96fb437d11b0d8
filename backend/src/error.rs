use thiserror::Error;

/// Failures that abort a single shift assignment run.
///
/// Candidate-level problems (ineligibility, a failed insert for one user) are
/// not errors: they are traced and the pipeline moves on.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("shift not found: {0}")]
    ShiftNotFound(i32),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<diesel::r2d2::PoolError> for AssignError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AssignError::Pool(err.to_string())
    }
}

pub type AssignResult<T> = Result<T, AssignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AssignError::ShiftNotFound(42);
        assert_eq!(err.to_string(), "shift not found: 42");
    }

    #[test]
    fn test_diesel_error_converts() {
        let err: AssignError = diesel::result::Error::NotFound.into();
        assert!(matches!(err, AssignError::Database(_)));
        assert!(err.to_string().starts_with("database error"));
    }
}
