use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crewpay_contractors::ContractorRef;
use crewpay_core::{Aggregate, AggregateId, AggregateRoot, CompanyId, RejectionReason, UserId};
use crewpay_events::Event;

/// Invoice identifier (company-scoped via `company_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle.
///
/// `Draft` and `Rejected` are the only editable states; `Paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Paid,
}

/// One recorded endorsement toward the required-approval threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approver_id: UserId,
    pub approved_at: DateTime<Utc>,
}

/// Line of billable work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub description: String,
    pub quantity: i64,
    /// Rate in smallest currency unit (e.g., cents).
    pub unit_rate: u64,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    company_id: Option<CompanyId>,
    contractor: Option<ContractorRef>,
    status: InvoiceStatus,
    lines: Vec<InvoiceLine>,
    approvals: Vec<Approval>,
    equity_percentage: Option<u8>,
    billing_year: Option<i32>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            company_id: None,
            contractor: None,
            status: InvoiceStatus::Draft,
            lines: Vec::new(),
            approvals: Vec::new(),
            equity_percentage: None,
            billing_year: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn contractor(&self) -> Option<ContractorRef> {
        self.contractor
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    /// Ordered, append-only once pending. Approver ids are unique.
    pub fn approvals(&self) -> &[Approval] {
        &self.approvals
    }

    pub fn equity_percentage(&self) -> Option<u8> {
        self.equity_percentage
    }

    /// Billing year derived from the submission date; absent until submitted.
    pub fn billing_year(&self) -> Option<i32> {
        self.billing_year
    }

    pub fn total_amount(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| (l.quantity.max(0) as u64).saturating_mul(l.unit_rate))
            .fold(0u64, u64::saturating_add)
    }

    /// Invariant: fields may only be mutated while draft or rejected.
    pub fn is_editable(&self) -> bool {
        matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Rejected)
    }

    /// Payment stays legal after the final explicit approval flips the
    /// status to `Approved`; only `approve` is pending-only.
    pub fn is_payable_status(&self) -> bool {
        matches!(self.status, InvoiceStatus::Pending | InvoiceStatus::Approved)
    }

    pub fn has_approved(&self, user_id: UserId) -> bool {
        self.approvals.iter().any(|a| a.approver_id == user_id)
    }

    /// Whether enough *prior* explicit approvals are recorded for payment.
    ///
    /// The act of paying counts as the final, implicit approval by the paying
    /// administrator, so only `required - 1` prior approvals are needed. With
    /// the default threshold of 1 a freshly submitted invoice qualifies.
    pub fn meets_prior_approval_threshold(&self, required: u32) -> bool {
        (self.approvals.len() as u64) + 1 >= u64::from(required)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DraftInvoice — create the invoice in `Draft`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftInvoice {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub contractor: ContractorRef,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateInvoice — replace line items while editable.
///
/// Edits are lenient; structural validation happens at submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitInvoice — move a draft or rejected invoice to `Pending`.
///
/// The equity percentage is chosen at submission time; the billing year is
/// derived from `submitted_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitInvoice {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub equity_percentage: Option<u8>,
    pub submitted_at: DateTime<Utc>,
}

/// Command: ApproveInvoice.
///
/// `required_approvals` is snapshotted from the company context by the
/// caller so the threshold that decided the transition is recorded with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveInvoice {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub approver_id: UserId,
    pub required_approvals: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PayInvoice (administrator action, batchable).
///
/// `tax_compliant` carries the tax-compliance gate's verdict, resolved at
/// the workflow boundary where the gate lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayInvoice {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub paid_by: UserId,
    pub required_approvals: u32,
    pub tax_compliant: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectInvoice {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    DraftInvoice(DraftInvoice),
    UpdateInvoice(UpdateInvoice),
    SubmitInvoice(SubmitInvoice),
    ApproveInvoice(ApproveInvoice),
    PayInvoice(PayInvoice),
    RejectInvoice(RejectInvoice),
}

/// Event: InvoiceDrafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDrafted {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub contractor: ContractorRef,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUpdated {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSubmitted {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub equity_percentage: Option<u8>,
    pub billing_year: i32,
    pub total_amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceApproved {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub approver_id: UserId,
    pub required_approvals: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub paid_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRejected {
    pub company_id: CompanyId,
    pub invoice_id: InvoiceId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceDrafted(InvoiceDrafted),
    InvoiceUpdated(InvoiceUpdated),
    InvoiceSubmitted(InvoiceSubmitted),
    InvoiceApproved(InvoiceApproved),
    InvoicePaid(InvoicePaid),
    InvoiceRejected(InvoiceRejected),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceDrafted(_) => "invoicing.invoice.drafted",
            InvoiceEvent::InvoiceUpdated(_) => "invoicing.invoice.updated",
            InvoiceEvent::InvoiceSubmitted(_) => "invoicing.invoice.submitted",
            InvoiceEvent::InvoiceApproved(_) => "invoicing.invoice.approved",
            InvoiceEvent::InvoicePaid(_) => "invoicing.invoice.paid",
            InvoiceEvent::InvoiceRejected(_) => "invoicing.invoice.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceDrafted(e) => e.occurred_at,
            InvoiceEvent::InvoiceUpdated(e) => e.occurred_at,
            InvoiceEvent::InvoiceSubmitted(e) => e.occurred_at,
            InvoiceEvent::InvoiceApproved(e) => e.occurred_at,
            InvoiceEvent::InvoicePaid(e) => e.occurred_at,
            InvoiceEvent::InvoiceRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = RejectionReason;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceDrafted(e) => {
                self.id = e.invoice_id;
                self.company_id = Some(e.company_id);
                self.contractor = Some(e.contractor);
                self.lines = e.lines.clone();
                self.approvals.clear();
                self.status = InvoiceStatus::Draft;
                self.created = true;
            }
            InvoiceEvent::InvoiceUpdated(e) => {
                self.lines = e.lines.clone();
            }
            InvoiceEvent::InvoiceSubmitted(e) => {
                self.status = InvoiceStatus::Pending;
                self.equity_percentage = e.equity_percentage;
                self.billing_year = Some(e.billing_year);
                // Resubmission restarts the approvals sequence.
                self.approvals.clear();
            }
            InvoiceEvent::InvoiceApproved(e) => {
                self.approvals.push(Approval {
                    approver_id: e.approver_id,
                    approved_at: e.occurred_at,
                });
                if (self.approvals.len() as u64) >= u64::from(e.required_approvals) {
                    self.status = InvoiceStatus::Approved;
                }
            }
            InvoiceEvent::InvoicePaid(_) => {
                self.status = InvoiceStatus::Paid;
            }
            InvoiceEvent::InvoiceRejected(_) => {
                // Approvals are retained for audit; submit discards them.
                self.status = InvoiceStatus::Rejected;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::DraftInvoice(cmd) => self.handle_draft(cmd),
            InvoiceCommand::UpdateInvoice(cmd) => self.handle_update(cmd),
            InvoiceCommand::SubmitInvoice(cmd) => self.handle_submit(cmd),
            InvoiceCommand::ApproveInvoice(cmd) => self.handle_approve(cmd),
            InvoiceCommand::PayInvoice(cmd) => self.handle_pay(cmd),
            InvoiceCommand::RejectInvoice(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Invoice {
    fn ensure_company(&self, company_id: CompanyId) -> Result<(), RejectionReason> {
        if !self.created {
            return Ok(());
        }
        if self.company_id != Some(company_id) {
            return Err(RejectionReason::invalid_data("company mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), RejectionReason> {
        if self.id != invoice_id {
            return Err(RejectionReason::invalid_data("invoice_id mismatch"));
        }
        Ok(())
    }

    /// Structural validation applied at submit time: at least one line, every
    /// line positive, total positive and within range.
    fn validate_for_submission(&self) -> Result<u64, RejectionReason> {
        if self.lines.is_empty() {
            return Err(RejectionReason::invalid_data(
                "cannot submit invoice without line items",
            ));
        }

        let mut total: u64 = 0;
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(RejectionReason::invalid_data(
                    "invoice line quantity must be positive",
                ));
            }
            if line.unit_rate == 0 {
                return Err(RejectionReason::invalid_data(
                    "invoice line unit_rate must be positive",
                ));
            }
            let line_total = (line.quantity as u128)
                .checked_mul(line.unit_rate as u128)
                .and_then(|t| u64::try_from(t).ok())
                .ok_or_else(|| RejectionReason::invalid_data("invoice line amount overflow"))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| RejectionReason::invalid_data("invoice total overflow"))?;
        }

        if total == 0 {
            return Err(RejectionReason::invalid_data(
                "invoice amount must be positive",
            ));
        }
        Ok(total)
    }

    fn handle_draft(&self, cmd: &DraftInvoice) -> Result<Vec<InvoiceEvent>, RejectionReason> {
        if self.created {
            return Err(RejectionReason::invalid_data("invoice already exists"));
        }

        Ok(vec![InvoiceEvent::InvoiceDrafted(InvoiceDrafted {
            company_id: cmd.company_id,
            invoice_id: cmd.invoice_id,
            contractor: cmd.contractor,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateInvoice) -> Result<Vec<InvoiceEvent>, RejectionReason> {
        if !self.created {
            return Err(RejectionReason::NotEditable);
        }
        self.ensure_company(cmd.company_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if !self.is_editable() {
            return Err(RejectionReason::NotEditable);
        }

        Ok(vec![InvoiceEvent::InvoiceUpdated(InvoiceUpdated {
            company_id: cmd.company_id,
            invoice_id: cmd.invoice_id,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitInvoice) -> Result<Vec<InvoiceEvent>, RejectionReason> {
        if !self.created {
            return Err(RejectionReason::NotEditable);
        }
        self.ensure_company(cmd.company_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if !self.is_editable() {
            return Err(RejectionReason::NotEditable);
        }

        let total = self.validate_for_submission()?;

        if let Some(pct) = cmd.equity_percentage {
            if pct > 100 {
                return Err(RejectionReason::invalid_data(
                    "equity percentage must be between 0 and 100",
                ));
            }
        }

        Ok(vec![InvoiceEvent::InvoiceSubmitted(InvoiceSubmitted {
            company_id: cmd.company_id,
            invoice_id: cmd.invoice_id,
            equity_percentage: cmd.equity_percentage,
            billing_year: cmd.submitted_at.year(),
            total_amount: total,
            occurred_at: cmd.submitted_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveInvoice) -> Result<Vec<InvoiceEvent>, RejectionReason> {
        if !self.created || self.status != InvoiceStatus::Pending {
            return Err(RejectionReason::NotPending);
        }
        self.ensure_company(cmd.company_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        // Duplicate approval is an explicit rejection, never a silent no-op.
        if self.has_approved(cmd.approver_id) {
            return Err(RejectionReason::AlreadyActed);
        }

        Ok(vec![InvoiceEvent::InvoiceApproved(InvoiceApproved {
            company_id: cmd.company_id,
            invoice_id: cmd.invoice_id,
            approver_id: cmd.approver_id,
            required_approvals: cmd.required_approvals,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pay(&self, cmd: &PayInvoice) -> Result<Vec<InvoiceEvent>, RejectionReason> {
        if !self.created || !self.is_payable_status() {
            return Err(RejectionReason::NotPending);
        }
        self.ensure_company(cmd.company_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if !cmd.tax_compliant {
            return Err(RejectionReason::TaxNoncompliant);
        }

        if !self.meets_prior_approval_threshold(cmd.required_approvals) {
            return Err(RejectionReason::InsufficientApprovals);
        }

        Ok(vec![InvoiceEvent::InvoicePaid(InvoicePaid {
            company_id: cmd.company_id,
            invoice_id: cmd.invoice_id,
            paid_by: cmd.paid_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectInvoice) -> Result<Vec<InvoiceEvent>, RejectionReason> {
        if !self.created || self.status != InvoiceStatus::Pending {
            return Err(RejectionReason::NotPending);
        }
        self.ensure_company(cmd.company_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        Ok(vec![InvoiceEvent::InvoiceRejected(InvoiceRejected {
            company_id: cmd.company_id,
            invoice_id: cmd.invoice_id,
            rejected_by: cmd.rejected_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
