//! Approval chain and status table behaviour, exercised without a database

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use los_server::approval::{
    Approval, ApprovalStatus, ApprovalWorkflow, ApproverRole, NewApproval, WorkflowError,
};
use los_server::loan::{LoanApplication, LoanStatus};

fn draft(amount: Decimal) -> LoanApplication {
    LoanApplication {
        id: 42,
        application_no: "APP-123456-0A1B2C3D".to_string(),
        customer_id: 1,
        product_id: 1,
        branch_id: Some(3),
        loan_amount: amount,
        tenure_month: 24,
        interest_rate: dec!(12.5),
        processing_fee: dec!(50.00),
        status_code: LoanStatus::Draft,
        created_at: Utc::now(),
    }
}

/// Stands in for the INSERT ... RETURNING the service performs
struct Store {
    next_id: i64,
}

impl Store {
    fn new() -> Self {
        Self { next_id: 100 }
    }

    fn persist(&mut self, workflow: &mut ApprovalWorkflow, new: NewApproval) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        workflow
            .attach(Approval {
                id,
                loan_application_id: new.loan_application_id,
                approval_level: new.approval_level,
                approver_role: new.approver_role,
                status: ApprovalStatus::Pending,
                remarks: Some(new.remarks),
                created_at: Utc::now() + Duration::milliseconds(id),
                created_by: new.created_by,
                approved_at: None,
                approved_by: None,
            })
            .unwrap();
        id
    }
}

fn submitted(amount: Decimal, store: &mut Store) -> (ApprovalWorkflow, i64) {
    let mut workflow = ApprovalWorkflow::new(draft(amount), vec![]);
    let opened = workflow.submit("officer1").unwrap().opened.unwrap();
    let id = store.persist(&mut workflow, opened);
    (workflow, id)
}

fn assert_chain_invariants(workflow: &ApprovalWorkflow) {
    let pending = workflow.approvals().iter().filter(|a| a.is_pending()).count();
    assert!(pending <= 1, "{} pending approvals", pending);

    let mut by_creation: Vec<&Approval> = workflow.approvals().iter().collect();
    by_creation.sort_by_key(|a| a.created_at);
    for pair in by_creation.windows(2) {
        assert!(pair[0].approval_level < pair[1].approval_level);
    }
}

// ============================================================================
// Escalation
// ============================================================================

#[test]
fn test_150k_escalates_to_level_three_then_approves() {
    let mut store = Store::new();
    let (mut workflow, level1) = submitted(dec!(150000), &mut store);
    assert_eq!(workflow.application().status_code, LoanStatus::Submitted);

    let t1 = workflow.approve(level1, "officer1", None, Utc::now()).unwrap();
    let opened = t1.opened.unwrap();
    assert_eq!(opened.approval_level, 2);
    assert_eq!(opened.approver_role, ApproverRole::BranchManager);
    assert_eq!(opened.remarks, "Awaiting level 2 approval");
    assert_eq!(t1.application_status, LoanStatus::UnderReview);
    let level2 = store.persist(&mut workflow, opened);
    assert_chain_invariants(&workflow);

    let t2 = workflow.approve(level2, "manager1", Some("verified"), Utc::now()).unwrap();
    let opened = t2.opened.unwrap();
    assert_eq!(opened.approval_level, 3);
    assert_eq!(opened.approver_role, ApproverRole::RegionalDirector);
    assert_eq!(t2.application_status, LoanStatus::UnderReview);
    let level3 = store.persist(&mut workflow, opened);
    assert_chain_invariants(&workflow);

    let t3 = workflow.approve(level3, "director1", None, Utc::now()).unwrap();
    assert!(t3.opened.is_none());
    assert_eq!(t3.application_status, LoanStatus::Approved);
    assert_eq!(workflow.application().status_code, LoanStatus::Approved);

    assert_eq!(workflow.approvals().len(), 3);
    assert!(workflow
        .approvals()
        .iter()
        .all(|a| a.status == ApprovalStatus::Approved));
    assert_chain_invariants(&workflow);
}

#[test]
fn test_large_loan_reaches_chief_credit_officer() {
    let mut store = Store::new();
    let (mut workflow, mut current) = submitted(dec!(250000), &mut store);

    for expected in [ApproverRole::BranchManager, ApproverRole::RegionalDirector, ApproverRole::ChiefCreditOfficer] {
        let opened = workflow
            .approve(current, "approver", None, Utc::now())
            .unwrap()
            .opened
            .unwrap();
        assert_eq!(opened.approver_role, expected);
        current = store.persist(&mut workflow, opened);
    }

    let last = workflow.approve(current, "cco", None, Utc::now()).unwrap();
    assert!(last.opened.is_none());
    assert_eq!(last.application_status, LoanStatus::Approved);
    assert_eq!(workflow.approvals().len(), 4);
}

#[test]
fn test_threshold_amount_does_not_escalate() {
    let mut store = Store::new();
    let (mut workflow, level1) = submitted(dec!(10000), &mut store);

    let transition = workflow.approve(level1, "officer1", None, Utc::now()).unwrap();
    assert!(transition.opened.is_none());
    assert_eq!(transition.application_status, LoanStatus::Approved);
}

// ============================================================================
// Rejection and information requests
// ============================================================================

#[test]
fn test_rejection_terminates_chain() {
    let mut store = Store::new();
    let (mut workflow, level1) = submitted(dec!(80000), &mut store);
    let opened = workflow
        .approve(level1, "officer1", None, Utc::now())
        .unwrap()
        .opened
        .unwrap();
    let level2 = store.persist(&mut workflow, opened);

    let transition = workflow
        .reject(level2, "manager1", "insufficient income", Utc::now())
        .unwrap();
    let decided = transition.decided.unwrap();
    assert_eq!(decided.status, ApprovalStatus::Rejected);
    assert_eq!(decided.remarks.as_deref(), Some("Rejected: insufficient income"));
    assert_eq!(decided.approved_by.as_deref(), Some("manager1"));
    assert!(transition.opened.is_none());
    assert_eq!(transition.application_status, LoanStatus::Rejected);

    // nothing left to decide, and no way to reopen the chain
    assert!(workflow.pending().is_none());
    assert!(matches!(
        workflow.approve(level2, "manager1", None, Utc::now()),
        Err(WorkflowError::NotPending { .. })
    ));
    assert!(matches!(
        workflow.submit("officer1"),
        Err(WorkflowError::InvalidApplicationState { .. })
    ));
    assert_eq!(workflow.current().unwrap().id, level2);
    assert_chain_invariants(&workflow);
}

#[test]
fn test_more_info_parks_application() {
    let mut store = Store::new();
    let (mut workflow, level1) = submitted(dec!(20000), &mut store);

    let transition = workflow
        .request_more_info(level1, "officer1", "latest payslips", Utc::now())
        .unwrap();
    assert_eq!(transition.application_status, LoanStatus::RequiresMoreInfo);
    assert!(transition.opened.is_none());
    assert!(workflow.pending().is_none());
}

#[test]
fn test_history_keeps_insertion_order() {
    let mut store = Store::new();
    let (mut workflow, level1) = submitted(dec!(60000), &mut store);
    let opened = workflow
        .approve(level1, "officer1", None, Utc::now())
        .unwrap()
        .opened
        .unwrap();
    store.persist(&mut workflow, opened);

    let (_, approvals) = workflow.clone().into_parts();
    let rebuilt = ApprovalWorkflow::new(draft(dec!(60000)), approvals.into_iter().rev().collect());
    let levels: Vec<i32> = rebuilt.approvals().iter().map(|a| a.approval_level).collect();
    assert_eq!(levels, vec![1, 2]);
    assert_eq!(rebuilt.current().unwrap().approval_level, 2);
}

// ============================================================================
// Status table
// ============================================================================

#[test]
fn test_no_transition_returns_to_draft() {
    for from in LoanStatus::ALL {
        assert!(
            !from.can_transition_to(LoanStatus::Draft),
            "{:?} must not lead back to DRAFT",
            from
        );
    }
}

#[test]
fn test_draft_to_approved_is_illegal() {
    assert!(LoanStatus::Draft.ensure_transition(LoanStatus::Approved).is_err());
}

#[test]
fn test_every_state_reaches_a_terminal_state() {
    for start in LoanStatus::ALL {
        let mut frontier = vec![start];
        let mut seen = vec![start];
        let mut reaches_terminal = start.is_terminal();

        while let Some(state) = frontier.pop() {
            for next in state.allowed_next() {
                if next.is_terminal() {
                    reaches_terminal = true;
                }
                if !seen.contains(next) {
                    seen.push(*next);
                    frontier.push(*next);
                }
            }
        }

        assert!(reaches_terminal, "{:?} cannot terminate", start);
    }
}
