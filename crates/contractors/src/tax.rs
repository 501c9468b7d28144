//! Tax-compliance gate.
//!
//! Compliance rules are expected to grow (jurisdiction-specific checks,
//! expiring forms) without touching approval or payment logic, so the gate is
//! a trait with one predicate rather than an inlined field read.

use crate::profile::ContractorRef;

/// Answers whether a contractor's tax data is sufficient to be paid.
///
/// Implementations must be pure: no IO, no panics, no side effects.
pub trait TaxComplianceGate {
    fn is_tax_compliant(&self, contractor: &ContractorRef) -> bool;
}

/// Baseline gate: compliant iff tax data is on file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaxInfoGate;

impl TaxComplianceGate for TaxInfoGate {
    fn is_tax_compliant(&self, contractor: &ContractorRef) -> bool {
        contractor.has_tax_info
    }
}
