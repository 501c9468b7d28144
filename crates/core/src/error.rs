//! Command-rejection model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, RejectionReason>;

/// Why a command against the payment core was refused.
///
/// Every guard failure maps 1:1 to one of these variants, so callers (and
/// audit logs) can tell *why* an action was refused without re-deriving the
/// guard. All variants are recoverable, user-facing outcomes; nothing here is
/// fatal to the process. Persistence and transport failures belong to the
/// owning collaborators and never appear in this taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Invoice fields may only change while the invoice is draft or rejected.
    #[error("invoice is not editable in its current status")]
    NotEditable,

    /// The acting user already approved this invoice.
    #[error("user has already acted on this invoice")]
    AlreadyActed,

    /// The contractor's tax data is insufficient for payment.
    #[error("contractor is not tax compliant")]
    TaxNoncompliant,

    /// Not enough prior explicit approvals to offer payment.
    #[error("invoice has insufficient approvals")]
    InsufficientApprovals,

    /// The command requires a pending invoice.
    #[error("invoice is not pending")]
    NotPending,

    /// The contractor's equity election is already locked for this billing
    /// year at a different percentage.
    #[error("equity election is locked for this billing year")]
    ElectionLocked,

    /// Structural validation of the invoice data failed.
    #[error("invalid invoice data: {0}")]
    InvalidInvoiceData(String),
}

impl RejectionReason {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidInvoiceData(msg.into())
    }
}
