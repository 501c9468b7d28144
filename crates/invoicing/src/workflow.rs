//! Invoice command workflow.
//!
//! Single entry point for state-changing invoice commands: checks transition
//! legality on the aggregate, consults the tax-compliance gate for payment
//! and the equity-election lock for submission, then applies the resulting
//! events to the supplied snapshot. The host durably persists the outcome.
//!
//! Concurrency: every call is a synchronous computation over the snapshots
//! passed in. Serializing concurrent commands on the same invoice id is the
//! owning storage layer's job; batch items across *different* invoice ids
//! share no state.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crewpay_company::CompanyContext;
use crewpay_contractors::TaxComplianceGate;
use crewpay_core::{Aggregate, DomainResult, RejectionReason};
use crewpay_equity::ElectionBook;

use crate::invoice::{
    ApproveInvoice, Invoice, InvoiceCommand, InvoiceId, InvoiceStatus, PayInvoice, RejectInvoice,
    SubmitInvoice,
};
use crate::policy::ApprovalPolicy;

/// A state-changing action against one invoice. The acting user and the
/// approval threshold come from the [`CompanyContext`] at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceAction {
    Submit { equity_percentage: Option<u8> },
    Approve,
    Pay,
    Reject,
}

/// Batch command surface: disjoint id sets for approve and pay.
///
/// Each id is evaluated independently against its own snapshot; partial
/// success is expected and there is no cross-invoice transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub approve_ids: Vec<InvoiceId>,
    pub pay_ids: Vec<InvoiceId>,
}

/// Applies invoice commands against caller-supplied snapshots.
#[derive(Debug, Clone)]
pub struct InvoiceWorkflow<G> {
    policy: ApprovalPolicy<G>,
    elections: ElectionBook,
}

impl<G: TaxComplianceGate> InvoiceWorkflow<G> {
    pub fn new(gate: G) -> Self {
        Self {
            policy: ApprovalPolicy::new(gate),
            elections: ElectionBook::new(),
        }
    }

    /// Workflow over election records the host already loaded.
    pub fn with_elections(gate: G, elections: ElectionBook) -> Self {
        Self {
            policy: ApprovalPolicy::new(gate),
            elections,
        }
    }

    pub fn policy(&self) -> &ApprovalPolicy<G> {
        &self.policy
    }

    pub fn elections(&self) -> &ElectionBook {
        &self.elections
    }

    /// Apply one action to one invoice snapshot.
    ///
    /// On success the snapshot reflects the new state and the new status is
    /// returned; on rejection the snapshot (and the election book) are left
    /// untouched.
    pub fn apply_command(
        &mut self,
        invoice: &mut Invoice,
        action: &InvoiceAction,
        ctx: &CompanyContext,
        now: DateTime<Utc>,
    ) -> DomainResult<InvoiceStatus> {
        let result = self.dispatch(invoice, action, ctx, now);
        match &result {
            Ok(status) => info!(
                invoice_id = %invoice.id_typed(),
                company_id = %ctx.company_id(),
                status = ?status,
                "invoice command applied"
            ),
            Err(reason) => debug!(
                invoice_id = %invoice.id_typed(),
                company_id = %ctx.company_id(),
                %reason,
                "invoice command rejected"
            ),
        }
        result
    }

    /// Evaluate a batch of approve/pay actions, one outcome per invoice id.
    ///
    /// Ids the caller supplied no snapshot for are omitted from the outcome
    /// map: a missing row is a storage-layer failure, surfaced by the host
    /// unchanged rather than renamed into a domain rejection.
    pub fn apply_batch(
        &mut self,
        invoices: &mut BTreeMap<InvoiceId, Invoice>,
        request: &BatchRequest,
        ctx: &CompanyContext,
        now: DateTime<Utc>,
    ) -> BTreeMap<InvoiceId, DomainResult<InvoiceStatus>> {
        let mut outcomes = BTreeMap::new();

        for (ids, action) in [
            (&request.approve_ids, InvoiceAction::Approve),
            (&request.pay_ids, InvoiceAction::Pay),
        ] {
            for id in ids {
                if let Some(invoice) = invoices.get_mut(id) {
                    outcomes.insert(*id, self.apply_command(invoice, &action, ctx, now));
                }
            }
        }

        info!(
            company_id = %ctx.company_id(),
            requested = request.approve_ids.len() + request.pay_ids.len(),
            applied = outcomes.values().filter(|r| r.is_ok()).count(),
            rejected = outcomes.values().filter(|r| r.is_err()).count(),
            "invoice batch evaluated"
        );
        outcomes
    }

    fn dispatch(
        &mut self,
        invoice: &mut Invoice,
        action: &InvoiceAction,
        ctx: &CompanyContext,
        now: DateTime<Utc>,
    ) -> DomainResult<InvoiceStatus> {
        let events = match action {
            InvoiceAction::Submit { equity_percentage } => {
                if equity_percentage.is_some() && !ctx.features().equity_compensation {
                    return Err(RejectionReason::invalid_data(
                        "equity compensation is not enabled for this company",
                    ));
                }

                let events = invoice.handle(&InvoiceCommand::SubmitInvoice(SubmitInvoice {
                    company_id: ctx.company_id(),
                    invoice_id: invoice.id_typed(),
                    equity_percentage: *equity_percentage,
                    submitted_at: now,
                }))?;

                // The election lock is the one cross-aggregate write; it must
                // hold before the submission becomes visible.
                if let (Some(pct), Some(contractor)) = (*equity_percentage, invoice.contractor()) {
                    self.elections
                        .lock(contractor.contractor_id, now.year(), pct, now)?;
                }
                events
            }
            InvoiceAction::Approve => {
                invoice.handle(&InvoiceCommand::ApproveInvoice(ApproveInvoice {
                    company_id: ctx.company_id(),
                    invoice_id: invoice.id_typed(),
                    approver_id: ctx.current_user_id(),
                    required_approvals: ctx.required_invoice_approvals(),
                    occurred_at: now,
                }))?
            }
            InvoiceAction::Pay => {
                let tax_compliant = invoice
                    .contractor()
                    .is_some_and(|c| self.policy.gate().is_tax_compliant(&c));

                invoice.handle(&InvoiceCommand::PayInvoice(PayInvoice {
                    company_id: ctx.company_id(),
                    invoice_id: invoice.id_typed(),
                    paid_by: ctx.current_user_id(),
                    required_approvals: ctx.required_invoice_approvals(),
                    tax_compliant,
                    occurred_at: now,
                }))?
            }
            InvoiceAction::Reject => {
                invoice.handle(&InvoiceCommand::RejectInvoice(RejectInvoice {
                    company_id: ctx.company_id(),
                    invoice_id: invoice.id_typed(),
                    rejected_by: ctx.current_user_id(),
                    occurred_at: now,
                }))?
            }
        };

        for event in &events {
            invoice.apply(event);
        }
        Ok(invoice.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewpay_company::CompanyFeatures;
    use crewpay_contractors::{ContractorRef, TaxInfoGate};
    use crewpay_core::{AggregateId, CompanyId, ContractorId, UserId};

    use crate::invoice::{DraftInvoice, InvoiceLine};

    fn context(company_id: CompanyId, required: u32, user: UserId) -> CompanyContext {
        CompanyContext::new(company_id, required, user, CompanyFeatures::default()).unwrap()
    }

    fn draft(company_id: CompanyId, contractor: ContractorRef) -> Invoice {
        let invoice_id = InvoiceId::new(AggregateId::new());
        let mut invoice = Invoice::empty(invoice_id);
        let events = invoice
            .handle(&InvoiceCommand::DraftInvoice(DraftInvoice {
                company_id,
                invoice_id,
                contractor,
                lines: vec![InvoiceLine {
                    line_no: 1,
                    description: "Platform work".to_string(),
                    quantity: 10,
                    unit_rate: 20_000,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);
        invoice
    }

    fn compliant_contractor() -> ContractorRef {
        ContractorRef {
            contractor_id: ContractorId::new(),
            has_tax_info: true,
        }
    }

    #[test]
    fn submit_approve_pay_happy_path() {
        let company_id = CompanyId::new();
        let mut workflow = InvoiceWorkflow::new(TaxInfoGate);
        let mut invoice = draft(company_id, compliant_contractor());
        let now = Utc::now();

        let contractor_ctx = context(company_id, 2, UserId::new());
        let status = workflow
            .apply_command(
                &mut invoice,
                &InvoiceAction::Submit {
                    equity_percentage: Some(20),
                },
                &contractor_ctx,
                now,
            )
            .unwrap();
        assert_eq!(status, InvoiceStatus::Pending);

        let approver_ctx = context(company_id, 2, UserId::new());
        let status = workflow
            .apply_command(&mut invoice, &InvoiceAction::Approve, &approver_ctx, now)
            .unwrap();
        assert_eq!(status, InvoiceStatus::Pending);

        let payer_ctx = context(company_id, 2, UserId::new());
        let status = workflow
            .apply_command(&mut invoice, &InvoiceAction::Pay, &payer_ctx, now)
            .unwrap();
        assert_eq!(status, InvoiceStatus::Paid);

        // The election locked at submit time.
        let contractor_id = invoice.contractor().unwrap().contractor_id;
        let election = workflow.elections().election(contractor_id, now.year()).unwrap();
        assert_eq!(election.percentage, 20);
    }

    #[test]
    fn second_submission_with_a_different_split_is_locked_out() {
        let company_id = CompanyId::new();
        let mut workflow = InvoiceWorkflow::new(TaxInfoGate);
        let contractor = compliant_contractor();
        let ctx = context(company_id, 1, UserId::new());
        let now = Utc::now();

        let mut first = draft(company_id, contractor);
        workflow
            .apply_command(
                &mut first,
                &InvoiceAction::Submit {
                    equity_percentage: Some(20),
                },
                &ctx,
                now,
            )
            .unwrap();

        // Different split for the same contractor and year: locked.
        let mut second = draft(company_id, contractor);
        let err = workflow
            .apply_command(
                &mut second,
                &InvoiceAction::Submit {
                    equity_percentage: Some(30),
                },
                &ctx,
                now,
            )
            .unwrap_err();
        assert_eq!(err, RejectionReason::ElectionLocked);
        // The rejected invoice stays editable.
        assert_eq!(second.status(), InvoiceStatus::Draft);

        // The same split again is an idempotent lock: submit succeeds.
        let status = workflow
            .apply_command(
                &mut second,
                &InvoiceAction::Submit {
                    equity_percentage: Some(20),
                },
                &ctx,
                now,
            )
            .unwrap();
        assert_eq!(status, InvoiceStatus::Pending);
    }

    #[test]
    fn equity_split_requires_the_feature_flag() {
        let company_id = CompanyId::new();
        let mut workflow = InvoiceWorkflow::new(TaxInfoGate);
        let mut invoice = draft(company_id, compliant_contractor());

        let ctx = CompanyContext::new(
            company_id,
            1,
            UserId::new(),
            CompanyFeatures {
                equity_compensation: false,
            },
        )
        .unwrap();

        let err = workflow
            .apply_command(
                &mut invoice,
                &InvoiceAction::Submit {
                    equity_percentage: Some(10),
                },
                &ctx,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RejectionReason::InvalidInvoiceData(_)));

        // A pure cash submission is unaffected.
        workflow
            .apply_command(
                &mut invoice,
                &InvoiceAction::Submit {
                    equity_percentage: None,
                },
                &ctx,
                Utc::now(),
            )
            .unwrap();
    }

    #[test]
    fn payer_may_not_be_a_prior_approver_twice() {
        let company_id = CompanyId::new();
        let mut workflow = InvoiceWorkflow::new(TaxInfoGate);
        let mut invoice = draft(company_id, compliant_contractor());
        let admin = UserId::new();
        let ctx = context(company_id, 3, admin);
        let now = Utc::now();

        workflow
            .apply_command(
                &mut invoice,
                &InvoiceAction::Submit {
                    equity_percentage: None,
                },
                &ctx,
                now,
            )
            .unwrap();
        workflow
            .apply_command(&mut invoice, &InvoiceAction::Approve, &ctx, now)
            .unwrap();

        // Same admin approving again is rejected, not silently ignored.
        let err = workflow
            .apply_command(&mut invoice, &InvoiceAction::Approve, &ctx, now)
            .unwrap_err();
        assert_eq!(err, RejectionReason::AlreadyActed);
    }

    #[test]
    fn batch_reports_per_id_outcomes() {
        let company_id = CompanyId::new();
        let mut workflow = InvoiceWorkflow::new(TaxInfoGate);
        let admin = UserId::new();
        let ctx = context(company_id, 1, admin);
        let now = Utc::now();

        // payable: pending, compliant contractor
        let mut payable = draft(company_id, compliant_contractor());
        workflow
            .apply_command(
                &mut payable,
                &InvoiceAction::Submit {
                    equity_percentage: None,
                },
                &ctx,
                now,
            )
            .unwrap();

        // noncompliant: pending but no tax info
        let mut noncompliant = draft(
            company_id,
            ContractorRef {
                contractor_id: ContractorId::new(),
                has_tax_info: false,
            },
        );
        workflow
            .apply_command(
                &mut noncompliant,
                &InvoiceAction::Submit {
                    equity_percentage: None,
                },
                &ctx,
                now,
            )
            .unwrap();

        // still_draft: never submitted
        let still_draft = draft(company_id, compliant_contractor());

        let payable_id = payable.id_typed();
        let noncompliant_id = noncompliant.id_typed();
        let draft_id = still_draft.id_typed();

        let mut invoices: BTreeMap<InvoiceId, Invoice> = BTreeMap::new();
        invoices.insert(payable_id, payable);
        invoices.insert(noncompliant_id, noncompliant);
        invoices.insert(draft_id, still_draft);

        let request = BatchRequest {
            approve_ids: vec![draft_id],
            pay_ids: vec![payable_id, noncompliant_id],
        };
        let outcomes = workflow.apply_batch(&mut invoices, &request, &ctx, now);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[&payable_id], Ok(InvoiceStatus::Paid));
        assert_eq!(
            outcomes[&noncompliant_id],
            Err(RejectionReason::TaxNoncompliant)
        );
        assert_eq!(outcomes[&draft_id], Err(RejectionReason::NotPending));

        // Partial success: the paid invoice transitioned, the others did not.
        assert_eq!(invoices[&payable_id].status(), InvoiceStatus::Paid);
        assert_eq!(invoices[&noncompliant_id].status(), InvoiceStatus::Pending);
        assert_eq!(invoices[&draft_id].status(), InvoiceStatus::Draft);
    }

    #[test]
    fn batch_skips_ids_without_snapshots() {
        let company_id = CompanyId::new();
        let mut workflow = InvoiceWorkflow::new(TaxInfoGate);
        let ctx = context(company_id, 1, UserId::new());

        let mut invoices: BTreeMap<InvoiceId, Invoice> = BTreeMap::new();
        let request = BatchRequest {
            approve_ids: vec![InvoiceId::new(AggregateId::new())],
            pay_ids: vec![],
        };

        let outcomes = workflow.apply_batch(&mut invoices, &request, &ctx, Utc::now());
        assert!(outcomes.is_empty());
    }
}
