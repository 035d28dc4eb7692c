use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use risk_engine::ANOMALY_REASON;
use thiserror::Error;
use tracing::error;
use transfer_ledger::LedgerError;
use transfer_models::RejectionBody;

/// Every way a request can be turned away. Each variant maps to one HTTP status and one
/// machine-readable `status` string in the response body.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Transaction blocked: Recipient has enabled protection against unusually large incoming transfers")]
    AnomalyBlocked,

    #[error("Transaction blocked due to high risk")]
    RiskBlocked { risk_score: f64 },

    #[error("Transaction is pending review")]
    PendingReview { risk_score: f64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransferError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InsufficientFunds => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AnomalyBlocked | Self::RiskBlocked { .. } => StatusCode::FORBIDDEN,
            Self::PendingReview { .. } => StatusCode::ACCEPTED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::AnomalyBlocked | Self::RiskBlocked { .. } => "BLOCKED",
            Self::PendingReview { .. } => "PENDING_REVIEW",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn body(&self) -> RejectionBody {
        let (risk_score, reason) = match self {
            Self::RiskBlocked { risk_score } | Self::PendingReview { risk_score } => {
                (Some(*risk_score), None)
            }
            Self::AnomalyBlocked => (None, Some(ANOMALY_REASON.to_string())),
            _ => (None, None),
        };
        let error = match self {
            // Storage details stay in the logs.
            Self::Internal(_) => "Transfer failed".to_string(),
            other => other.to_string(),
        };
        RejectionBody {
            error,
            status: self.status().to_string(),
            risk_score,
            reason,
        }
    }
}

impl From<LedgerError> for TransferError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { entity, .. } => Self::NotFound(format!("{entity} not found")),
            LedgerError::InsufficientFunds { .. } => Self::InsufficientFunds,
            LedgerError::SelfTransfer => Self::Validation(err.to_string()),
            LedgerError::InvalidAmount(reason) => {
                Self::Validation(format!("Invalid amount: {reason}"))
            }
            LedgerError::Database(_) | LedgerError::CorruptRow(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!("request failed: {detail}");
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn statuses_map_to_http_codes() {
        let cases = [
            (TransferError::Validation("x".into()), 400, "VALIDATION_ERROR"),
            (TransferError::Unauthorized, 401, "UNAUTHORIZED"),
            (TransferError::NotFound("Recipient not found".into()), 404, "NOT_FOUND"),
            (TransferError::InsufficientFunds, 400, "INSUFFICIENT_FUNDS"),
            (TransferError::AnomalyBlocked, 403, "BLOCKED"),
            (TransferError::RiskBlocked { risk_score: 90.0 }, 403, "BLOCKED"),
            (TransferError::PendingReview { risk_score: 55.0 }, 202, "PENDING_REVIEW"),
            (TransferError::Internal("disk".into()), 500, "INTERNAL_ERROR"),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.status_code().as_u16(), code, "{err:?}");
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn bodies_carry_score_or_reason() {
        let held = TransferError::PendingReview { risk_score: 55.0 }.body();
        assert_eq!(held.risk_score, Some(55.0));
        assert!(held.reason.is_none());

        let guarded = TransferError::AnomalyBlocked.body();
        assert_eq!(guarded.reason.as_deref(), Some(ANOMALY_REASON));
        assert!(guarded.risk_score.is_none());

        let internal = TransferError::Internal("database is locked".into()).body();
        assert_eq!(internal.error, "Transfer failed");
    }

    #[test]
    fn ledger_errors_are_classified() {
        let err: TransferError = LedgerError::InsufficientFunds {
            required: dec!(10),
            available: dec!(5),
        }
        .into();
        assert!(matches!(err, TransferError::InsufficientFunds));

        let err: TransferError = LedgerError::not_found("Account", "a-1").into();
        assert!(matches!(err, TransferError::NotFound(ref msg) if msg == "Account not found"));

        let err: TransferError = LedgerError::SelfTransfer.into();
        assert!(matches!(err, TransferError::Validation(_)));

        let err: TransferError = LedgerError::CorruptRow("bad".into()).into();
        assert!(matches!(err, TransferError::Internal(_)));
    }
}
