//! Approval and payability policy.
//!
//! Pure queries consulted before any state change; this module never mutates
//! state. Both queries are total over well-formed input and never fail —
//! malformed input (e.g. a zero threshold) is a caller contract violation
//! ruled out by [`CompanyContext`]'s constructor.
//!
//! [`CompanyContext`]: crewpay_company::CompanyContext

use serde::{Deserialize, Serialize};

use crewpay_company::CompanyContext;
use crewpay_contractors::TaxComplianceGate;
use crewpay_core::UserId;

use crate::invoice::Invoice;

/// Which actions a list/detail view should offer for an invoice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAvailability {
    pub can_approve: bool,
    pub can_pay: bool,
}

/// Computes actionability and payability of an invoice for an acting user.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalPolicy<G> {
    gate: G,
}

impl<G: TaxComplianceGate> ApprovalPolicy<G> {
    pub fn new(gate: G) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// True iff the invoice is pending and the acting user has not already
    /// approved it. An approver who already approved may not act again.
    pub fn can_act(&self, invoice: &Invoice, acting_user: UserId) -> bool {
        invoice.status() == crate::invoice::InvoiceStatus::Pending
            && !invoice.has_approved(acting_user)
    }

    /// True iff the invoice is in a payable status, the contractor is tax
    /// compliant, and enough prior explicit approvals are recorded. The payer
    /// counts as the final implicit approval, so `required - 1` prior
    /// approvals suffice.
    pub fn can_pay(&self, invoice: &Invoice, ctx: &CompanyContext) -> bool {
        let Some(contractor) = invoice.contractor() else {
            return false;
        };
        invoice.is_payable_status()
            && self.gate.is_tax_compliant(&contractor)
            && invoice.meets_prior_approval_threshold(ctx.required_invoice_approvals())
    }

    /// Combined decision used by list/detail views to render action buttons.
    pub fn evaluate_action(
        &self,
        invoice: &Invoice,
        acting_user: UserId,
        ctx: &CompanyContext,
    ) -> ActionAvailability {
        ActionAvailability {
            can_approve: self.can_act(invoice, acting_user),
            can_pay: self.can_pay(invoice, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crewpay_company::CompanyFeatures;
    use crewpay_contractors::{ContractorRef, TaxInfoGate};
    use crewpay_core::{Aggregate, AggregateId, CompanyId, ContractorId};

    use crate::invoice::{
        ApproveInvoice, DraftInvoice, InvoiceCommand, InvoiceId, InvoiceLine, InvoiceStatus,
        SubmitInvoice,
    };

    fn context(required: u32) -> CompanyContext {
        CompanyContext::new(
            CompanyId::new(),
            required,
            UserId::new(),
            CompanyFeatures::default(),
        )
        .unwrap()
    }

    fn pending_invoice(has_tax_info: bool) -> Invoice {
        let company_id = CompanyId::new();
        let invoice_id = InvoiceId::new(AggregateId::new());
        let mut invoice = Invoice::empty(invoice_id);

        let events = invoice
            .handle(&InvoiceCommand::DraftInvoice(DraftInvoice {
                company_id,
                invoice_id,
                contractor: ContractorRef {
                    contractor_id: ContractorId::new(),
                    has_tax_info,
                },
                lines: vec![InvoiceLine {
                    line_no: 1,
                    description: "Consulting".to_string(),
                    quantity: 1,
                    unit_rate: 50_000,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);

        let events = invoice
            .handle(&InvoiceCommand::SubmitInvoice(SubmitInvoice {
                company_id,
                invoice_id,
                equity_percentage: None,
                submitted_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);
        invoice
    }

    fn approve(invoice: &mut Invoice, approver_id: UserId, required: u32) {
        let events = invoice
            .handle(&InvoiceCommand::ApproveInvoice(ApproveInvoice {
                company_id: invoice.company_id().unwrap(),
                invoice_id: invoice.id_typed(),
                approver_id,
                required_approvals: required,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);
    }

    #[test]
    fn can_act_is_false_outside_pending() {
        let policy = ApprovalPolicy::new(TaxInfoGate);
        let user = UserId::new();

        let draft = Invoice::empty(InvoiceId::new(AggregateId::new()));
        assert!(!policy.can_act(&draft, user));

        let mut approved = pending_invoice(true);
        approve(&mut approved, UserId::new(), 1);
        assert_eq!(approved.status(), InvoiceStatus::Approved);
        assert!(!policy.can_act(&approved, user));
    }

    #[test]
    fn can_act_is_false_for_a_user_who_already_approved() {
        let policy = ApprovalPolicy::new(TaxInfoGate);
        let approver = UserId::new();
        let mut invoice = pending_invoice(true);

        assert!(policy.can_act(&invoice, approver));
        approve(&mut invoice, approver, 3);
        assert!(!policy.can_act(&invoice, approver));
        // A different user may still act.
        assert!(policy.can_act(&invoice, UserId::new()));
    }

    #[test]
    fn can_pay_is_false_without_tax_info_regardless_of_approvals() {
        let policy = ApprovalPolicy::new(TaxInfoGate);
        let ctx = context(1);
        let mut invoice = pending_invoice(false);
        approve(&mut invoice, UserId::new(), 5);
        approve(&mut invoice, UserId::new(), 5);

        assert!(!policy.can_pay(&invoice, &ctx));
    }

    #[test]
    fn fresh_submission_is_payable_with_threshold_one() {
        let policy = ApprovalPolicy::new(TaxInfoGate);
        let invoice = pending_invoice(true);
        assert!(invoice.approvals().is_empty());

        assert!(policy.can_pay(&invoice, &context(1)));
    }

    #[test]
    fn threshold_three_needs_two_prior_approvals() {
        let policy = ApprovalPolicy::new(TaxInfoGate);
        let ctx = context(3);
        let mut invoice = pending_invoice(true);

        assert!(!policy.can_pay(&invoice, &ctx));
        approve(&mut invoice, UserId::new(), 3);
        assert!(!policy.can_pay(&invoice, &ctx));
        approve(&mut invoice, UserId::new(), 3);
        assert!(policy.can_pay(&invoice, &ctx));
    }

    #[test]
    fn payability_survives_the_status_flip_to_approved() {
        let policy = ApprovalPolicy::new(TaxInfoGate);
        let ctx = context(3);
        let mut invoice = pending_invoice(true);

        approve(&mut invoice, UserId::new(), 3);
        approve(&mut invoice, UserId::new(), 3);
        approve(&mut invoice, UserId::new(), 3);
        assert_eq!(invoice.status(), InvoiceStatus::Approved);

        assert!(policy.can_pay(&invoice, &ctx));
    }

    #[test]
    fn evaluate_action_combines_both_queries() {
        let policy = ApprovalPolicy::new(TaxInfoGate);
        let ctx = context(2);
        let approver = UserId::new();
        let mut invoice = pending_invoice(true);

        let fresh = policy.evaluate_action(&invoice, approver, &ctx);
        assert!(fresh.can_approve);
        assert!(!fresh.can_pay);

        approve(&mut invoice, approver, 2);
        let after = policy.evaluate_action(&invoice, approver, &ctx);
        assert!(!after.can_approve);
        assert!(after.can_pay);
    }
}
