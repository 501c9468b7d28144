use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crewpay_core::{ContractorId, DomainResult, RejectionReason};

/// A contractor's locked equity/cash split for one billing year.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityElection {
    /// Equity share of compensation, 0–100.
    pub percentage: u8,
    pub locked_at: DateTime<Utc>,
}

/// Election records keyed by `(contractor, billing_year)`.
///
/// The book is an in-memory snapshot: the host loads the relevant records,
/// lets the core perform the single conditional write, and durably persists
/// the result. All other operations are reads.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionBook {
    elections: HashMap<(ContractorId, i32), EquityElection>,
}

impl ElectionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `percentage` for `(contractor_id, billing_year)`.
    ///
    /// - no record: creates one with `locked_at = now`
    /// - record with the same percentage: no-op (idempotent)
    /// - record with a different percentage: `ElectionLocked`
    pub fn lock(
        &mut self,
        contractor_id: ContractorId,
        billing_year: i32,
        percentage: u8,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        match self.elections.get(&(contractor_id, billing_year)) {
            None => {
                self.elections.insert(
                    (contractor_id, billing_year),
                    EquityElection {
                        percentage,
                        locked_at: now,
                    },
                );
                Ok(())
            }
            Some(existing) if existing.percentage == percentage => Ok(()),
            Some(_) => Err(RejectionReason::ElectionLocked),
        }
    }

    pub fn election(&self, contractor_id: ContractorId, billing_year: i32) -> Option<&EquityElection> {
        self.elections.get(&(contractor_id, billing_year))
    }

    pub fn is_locked(&self, contractor_id: ContractorId, billing_year: i32) -> bool {
        self.elections.contains_key(&(contractor_id, billing_year))
    }

    pub fn len(&self) -> usize {
        self.elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elections.is_empty()
    }
}
