use serde::{Deserialize, Serialize};
use thiserror::Error;

use crewpay_core::{CompanyId, UserId};

/// Feature flags for a company.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyFeatures {
    /// Whether contractors may elect an equity/cash split on invoices.
    pub equity_compensation: bool,
}

impl Default for CompanyFeatures {
    fn default() -> Self {
        Self {
            equity_compensation: true,
        }
    }
}

/// Configuration failure building a [`CompanyContext`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompanyContextError {
    #[error("required_invoice_approvals must be at least 1 (got {0})")]
    ThresholdTooLow(u32),
}

/// Company context for one evaluation: who is acting, under which company,
/// with which approval threshold.
///
/// This is immutable for the duration of a call; evaluators read the
/// threshold fresh from the context each time they are invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyContext {
    company_id: CompanyId,
    required_invoice_approvals: u32,
    current_user_id: UserId,
    features: CompanyFeatures,
}

impl CompanyContext {
    /// Build a context, enforcing the `required_invoice_approvals >= 1`
    /// invariant at the configuration boundary.
    pub fn new(
        company_id: CompanyId,
        required_invoice_approvals: u32,
        current_user_id: UserId,
        features: CompanyFeatures,
    ) -> Result<Self, CompanyContextError> {
        if required_invoice_approvals < 1 {
            return Err(CompanyContextError::ThresholdTooLow(
                required_invoice_approvals,
            ));
        }
        Ok(Self {
            company_id,
            required_invoice_approvals,
            current_user_id,
            features,
        })
    }

    /// Context with the default threshold of one approval.
    pub fn with_default_threshold(company_id: CompanyId, current_user_id: UserId) -> Self {
        Self {
            company_id,
            required_invoice_approvals: 1,
            current_user_id,
            features: CompanyFeatures::default(),
        }
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn required_invoice_approvals(&self) -> u32 {
        self.required_invoice_approvals
    }

    pub fn current_user_id(&self) -> UserId {
        self.current_user_id
    }

    pub fn features(&self) -> CompanyFeatures {
        self.features
    }
}
