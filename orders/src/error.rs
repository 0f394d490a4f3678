use thiserror::Error;

/// Failures of the order store.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl OrderError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::NotFound(_) => "not_found",
            OrderError::PreconditionFailed(_) => "precondition_failed",
            OrderError::Store(_) => "store",
            OrderError::Corrupt(_) => "corrupt",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;

/// Outcome reported to the caller of `OrderService`.
///
/// Mutations never reveal whether an order is missing, owned by someone else,
/// or past `Pending`: all three surface as `CannotPerform`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(String),

    #[error("order not found")]
    NotFound,

    #[error("cannot perform operation on this order")]
    CannotPerform,

    #[error("internal error")]
    Internal,
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_facing_messages_carry_no_detail() {
        assert_eq!(
            ServiceError::CannotPerform.to_string(),
            "cannot perform operation on this order"
        );
        assert_eq!(ServiceError::Internal.to_string(), "internal error");
        let invalid = ServiceError::Invalid("quantity must be at least 1".into());
        assert_eq!(invalid.to_string(), "quantity must be at least 1");
    }

    #[test]
    fn store_errors_convert() {
        let err: OrderError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), "store");
    }
}
