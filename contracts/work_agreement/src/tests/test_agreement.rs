#![cfg(test)]

use soroban_sdk::{
    testutils::{Address as _, Ledger},
    token::{Client as TokenClient, StellarAssetClient},
    vec, Address, BytesN, Env, String,
};

use super::mocks::{
    MockCompliance, MockComplianceClient, MockDao, MockGrievance, MockGrievanceClient,
    MockOracle, MockOracleClient, MockReputation, MockReputationClient,
};
use crate::collaborators::{ComplianceCheck, GrievanceStatus, OracleKind};
use crate::errors::AgreementError;
use crate::storage::{
    AgreementStatus, AgreementTerms, Collaborators, PaymentState, PaymentType,
};
use crate::{WorkAgreementContract, WorkAgreementContractClient};
use arbitration::{ArbitrationContract, ArbitrationContractClient};
use escrow_ledger::{EscrowLedgerContract, EscrowLedgerContractClient, EscrowStatus};

const ONE_DAY: u64 = 86_400;
const INTERVAL: u64 = 7 * ONE_DAY;
const VOTING_PERIOD: u64 = 3 * ONE_DAY;
const RELEASE_TIMEOUT: u64 = 90 * ONE_DAY;
const DISPUTE_WINDOW: u64 = 90 * ONE_DAY;
const YEAR: u64 = 365 * ONE_DAY;

fn env() -> Env {
    let e = Env::default();
    e.mock_all_auths();
    e
}

fn advance(env: &Env, seconds: u64) {
    env.ledger().with_mut(|li| li.timestamp += seconds);
}

fn proof(env: &Env, byte: u8) -> BytesN<32> {
    BytesN::from_array(env, &[byte; 32])
}

struct Setup<'a> {
    agreement: WorkAgreementContractClient<'a>,
    escrow: EscrowLedgerContractClient<'a>,
    arbitration: ArbitrationContractClient<'a>,
    oracle: MockOracleClient<'a>,
    compliance: MockComplianceClient<'a>,
    reputation: MockReputationClient<'a>,
    grievance: MockGrievanceClient<'a>,
    token: Address,
    worker: Address,
    employer: Address,
    worker_rep: Address,
    employer_rep: Address,
    voters: [Address; 3],
}

fn setup(env: &Env) -> Setup<'_> {
    let token_admin = Address::generate(env);
    let token = env
        .register_stellar_asset_contract_v2(token_admin)
        .address();

    let arb_id = env.register(ArbitrationContract, ());
    let arbitration = ArbitrationContractClient::new(env, &arb_id);
    let arb_admin = Address::generate(env);
    arbitration.initialize(&arb_admin, &3, &VOTING_PERIOD);
    let voters = [
        Address::generate(env),
        Address::generate(env),
        Address::generate(env),
    ];
    for voter in voters.iter() {
        arbitration.add_arbitrator(&arb_admin, voter);
    }

    let escrow_id = env.register(EscrowLedgerContract, ());
    let escrow = EscrowLedgerContractClient::new(env, &escrow_id);
    escrow.initialize(
        &Address::generate(env),
        &token,
        &arb_id,
        &RELEASE_TIMEOUT,
        &DISPUTE_WINDOW,
    );

    let oracle_id = env.register(MockOracle, ());
    let compliance_id = env.register(MockCompliance, ());
    let reputation_id = env.register(MockReputation, ());
    let grievance_id = env.register(MockGrievance, ());
    let dao_id = env.register(MockDao, ());

    let agr_id = env.register(WorkAgreementContract, ());
    let agreement = WorkAgreementContractClient::new(env, &agr_id);
    agreement.initialize(
        &Address::generate(env),
        &Collaborators {
            escrow: escrow_id,
            arbitration: arb_id,
            compliance: compliance_id.clone(),
            reputation: reputation_id.clone(),
            grievance: grievance_id.clone(),
            dao: dao_id,
        },
        &VOTING_PERIOD,
    );

    let worker = Address::generate(env);
    let employer = Address::generate(env);
    StellarAssetClient::new(env, &token).mint(&employer, &1_000_000);

    Setup {
        agreement,
        escrow,
        arbitration,
        oracle: MockOracleClient::new(env, &oracle_id),
        compliance: MockComplianceClient::new(env, &compliance_id),
        reputation: MockReputationClient::new(env, &reputation_id),
        grievance: MockGrievanceClient::new(env, &grievance_id),
        token,
        worker,
        employer,
        worker_rep: Address::generate(env),
        employer_rep: Address::generate(env),
        voters,
    }
}

fn balance(env: &Env, token: &Address, who: &Address) -> i128 {
    TokenClient::new(env, token).balance(who)
}

fn terms(env: &Env, s: &Setup, payment_type: PaymentType, deposit: i128) -> AgreementTerms {
    AgreementTerms {
        worker: s.worker.clone(),
        worker_dao: None,
        employer_dao: None,
        worker_fallback: Some(s.worker_rep.clone()),
        employer_fallback: Some(s.employer_rep.clone()),
        deadline: env.ledger().timestamp() + YEAR,
        payment_type,
        oracle_kind: OracleKind::Image,
        oracle: Some(s.oracle.address.clone()),
        secondary_oracle: None,
        require_both: false,
        interval: INTERVAL,
        base_rate: 2,
        min_payment: 1,
        max_payment: 1_000_000,
        required_checks: vec![env],
        max_weekly_hours: 60,
        initial_deposit: deposit,
    }
}

fn piece_rate_agreement(env: &Env, s: &Setup, deposit: i128) -> u64 {
    s.agreement
        .create_agreement(&s.employer, &terms(env, s, PaymentType::PieceRate, deposit))
}

#[test]
fn create_agreement_escrows_deposit_and_draws_panel() {
    let env = env();
    let s = setup(&env);

    let id = piece_rate_agreement(&env, &s, 1_000);
    assert_eq!(id, 0);
    assert_eq!(balance(&env, &s.token, &s.employer), 999_000);

    let escrows = s.agreement.get_payment_escrows(&id, &0);
    assert_eq!(escrows.len(), 1);
    let escrow_id = escrows.get_unchecked(0);
    assert_eq!(s.escrow.get_balance(&escrow_id), 1_000);
    assert_eq!(s.escrow.get_status(&escrow_id), EscrowStatus::Held);

    let state = s.agreement.get_state(&id);
    assert_eq!(state.status, AgreementStatus::Active);
    assert!(state.is_active);

    let stakeholders = s.agreement.get_stakeholders(&id);
    assert_eq!(stakeholders.arbitrators.len(), 3);
    assert_eq!(stakeholders.arbitrators.get_unchecked(0), s.worker_rep);
    assert_eq!(stakeholders.arbitrators.get_unchecked(1), s.employer_rep);

    assert_eq!(
        s.agreement.get_payment_state(&id, &0),
        PaymentState::Pending
    );
}

#[test]
fn create_agreement_rejects_bad_terms() {
    let env = env();
    let s = setup(&env);

    let mut zero = terms(&env, &s, PaymentType::PieceRate, 0);
    assert_eq!(
        s.agreement.try_create_agreement(&s.employer, &zero),
        Err(Ok(AgreementError::ZeroInitialDeposit))
    );
    zero.initial_deposit = 100;
    zero.deadline = env.ledger().timestamp();
    assert_eq!(
        s.agreement.try_create_agreement(&s.employer, &zero),
        Err(Ok(AgreementError::InvalidDeadline))
    );
    zero.deadline = env.ledger().timestamp() + YEAR;
    zero.min_payment = 50;
    zero.max_payment = 10;
    assert_eq!(
        s.agreement.try_create_agreement(&s.employer, &zero),
        Err(Ok(AgreementError::InvalidPaymentBounds))
    );
}

#[test]
fn create_agreement_without_arbitrator_source_fails() {
    let env = env();
    let s = setup(&env);

    let mut t = terms(&env, &s, PaymentType::PieceRate, 1_000);
    t.worker_fallback = None;
    // no side DAO, no fallback, platform DAO pool empty
    assert_eq!(
        s.agreement.try_create_agreement(&s.employer, &t),
        Err(Ok(AgreementError::NoArbitratorSource))
    );
}

#[test]
fn record_work_accumulates_verified_units() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    s.agreement
        .record_work(&s.worker, &id, &200, &proof(&env, 1), &None);
    let metrics = s.agreement.get_metrics(&id);
    assert_eq!(metrics.units_completed, 200);
    assert_eq!(metrics.units_paid, 0);
}

#[test]
fn record_work_rejects_failed_verification() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    s.oracle.set_result(&false, &0);
    assert_eq!(
        s.agreement
            .try_record_work(&s.worker, &id, &200, &proof(&env, 1), &None),
        Err(Ok(AgreementError::VerificationFailed))
    );
    assert_eq!(s.agreement.get_metrics(&id).units_completed, 0);
}

#[test]
fn record_work_rejects_outsider_and_past_deadline() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    let outsider = Address::generate(&env);
    assert_eq!(
        s.agreement
            .try_record_work(&outsider, &id, &10, &proof(&env, 1), &None),
        Err(Ok(AgreementError::NotParticipant))
    );

    advance(&env, YEAR + 1);
    assert_eq!(
        s.agreement
            .try_record_work(&s.worker, &id, &10, &proof(&env, 1), &None),
        Err(Ok(AgreementError::DeadlinePassed))
    );
}

#[test]
fn piece_rate_cycle_pays_and_carries_leftover_escrow() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    s.agreement
        .record_work(&s.worker, &id, &100, &proof(&env, 1), &None);
    advance(&env, INTERVAL);
    // due now; recording more work runs the whole pipeline
    s.agreement
        .record_work(&s.worker, &id, &100, &proof(&env, 2), &None);

    assert_eq!(balance(&env, &s.token, &s.worker), 400);
    let escrow_id = s.agreement.get_payment_escrows(&id, &0).get_unchecked(0);
    assert_eq!(s.escrow.get_balance(&escrow_id), 600);

    let config = s.agreement.get_payment_config(&id);
    assert_eq!(config.total_paid, 400);
    let metrics = s.agreement.get_metrics(&id);
    assert_eq!(metrics.units_paid, 200);

    assert_eq!(
        s.agreement.get_payment_state(&id, &0),
        PaymentState::Completed
    );
    assert_eq!(s.agreement.current_payment_number(&id), 1);
    // leftover keeps funding cycle 1 under the same escrow record
    let carried = s.agreement.get_payment_escrows(&id, &1);
    assert_eq!(carried.len(), 1);
    assert_eq!(carried.get_unchecked(0), escrow_id);
    assert_eq!(
        s.agreement.get_payment_state(&id, &1),
        PaymentState::Pending
    );
}

#[test]
fn process_payment_before_due_fails() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    s.agreement
        .record_work(&s.worker, &id, &100, &proof(&env, 1), &None);
    assert_eq!(
        s.agreement.try_process_payment(&s.worker, &id),
        Err(Ok(AgreementError::PaymentNotDue))
    );
}

#[test]
fn pipeline_stages_checkpoint_independently() {
    let env = env();
    let s = setup(&env);
    // underfunded: due will be 400 against a 300 deposit
    let id = piece_rate_agreement(&env, &s, 300);

    s.agreement
        .record_work(&s.worker, &id, &200, &proof(&env, 1), &None);
    advance(&env, INTERVAL);

    s.agreement.verify_payment_compliance(&s.worker, &id);
    assert_eq!(
        s.agreement.get_payment_state(&id, &0),
        PaymentState::ComplianceVerified
    );
    assert_eq!(s.agreement.verify_payment_calculation(&s.worker, &id), 400);
    assert_eq!(
        s.agreement.get_payment_state(&id, &0),
        PaymentState::CalculationVerified
    );

    assert_eq!(
        s.agreement.try_check_escrow(&s.worker, &id),
        Err(Ok(AgreementError::EscrowInsufficient))
    );
    // the failed gate does not disturb the persisted checkpoint
    assert_eq!(
        s.agreement.get_payment_state(&id, &0),
        PaymentState::CalculationVerified
    );

    // stages refuse to run out of order
    assert_eq!(
        s.agreement.try_verify_payment_compliance(&s.worker, &id),
        Err(Ok(AgreementError::PipelineStageOutOfOrder))
    );
    assert_eq!(
        s.agreement.try_complete_payment(&s.worker, &id),
        Err(Ok(AgreementError::PipelineStageOutOfOrder))
    );
}

/// Work recorded after the due amount is fixed must not be swallowed by the
/// release: the watermark advances only by the work the payout covers, and
/// the interim work pays out in the following cycle.
#[test]
fn work_after_calculation_stays_payable_next_cycle() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    s.agreement
        .record_work(&s.worker, &id, &200, &proof(&env, 1), &None);
    advance(&env, INTERVAL);
    s.agreement.verify_payment_compliance(&s.worker, &id);
    assert_eq!(s.agreement.verify_payment_calculation(&s.worker, &id), 400);

    // more work lands between the calculation gate and the release; recording
    // it resumes the pipeline and pays out the 400 already calculated
    s.agreement
        .record_work(&s.worker, &id, &100, &proof(&env, 2), &None);
    assert_eq!(balance(&env, &s.token, &s.worker), 400);

    let metrics = s.agreement.get_metrics(&id);
    assert_eq!(metrics.units_completed, 300);
    assert_eq!(metrics.units_paid, 200);

    advance(&env, INTERVAL);
    assert_eq!(s.agreement.process_payment(&s.worker, &id), 200);
    assert_eq!(balance(&env, &s.token, &s.worker), 600);
    assert_eq!(s.agreement.get_metrics(&id).units_paid, 300);
}

#[test]
fn compliance_failure_names_the_failing_check() {
    let env = env();
    let s = setup(&env);
    let mut t = terms(&env, &s, PaymentType::PieceRate, 1_000);
    t.required_checks = vec![&env, ComplianceCheck::Certification, ComplianceCheck::Insurance];
    let id = s.agreement.create_agreement(&s.employer, &t);

    s.agreement
        .record_work(&s.worker, &id, &100, &proof(&env, 1), &None);
    advance(&env, INTERVAL);

    s.compliance.fail_check(&ComplianceCheck::Certification);
    assert_eq!(
        s.agreement.try_process_payment(&s.worker, &id),
        Err(Ok(AgreementError::CertificationMissing))
    );
}

#[test]
fn weekly_hours_violation_blocks_payment() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    s.agreement
        .record_work(&s.worker, &id, &100, &proof(&env, 1), &None);
    advance(&env, INTERVAL);

    s.compliance.set_hours(&50, &20);
    assert_eq!(
        s.agreement.try_process_payment(&s.worker, &id),
        Err(Ok(AgreementError::WorkingHoursViolation))
    );
    s.compliance.set_hours(&40, &10);
    assert_eq!(s.agreement.process_payment(&s.worker, &id), 200);
}

#[test]
fn payment_below_minimum_is_rejected() {
    let env = env();
    let s = setup(&env);
    let mut t = terms(&env, &s, PaymentType::PieceRate, 1_000);
    t.min_payment = 500;
    let id = s.agreement.create_agreement(&s.employer, &t);

    s.agreement
        .record_work(&s.worker, &id, &100, &proof(&env, 1), &None);
    advance(&env, INTERVAL);
    assert_eq!(
        s.agreement.try_process_payment(&s.worker, &id),
        Err(Ok(AgreementError::BelowMinimumPayment))
    );
}

#[test]
fn manual_work_requires_employer_confirmation() {
    let env = env();
    let s = setup(&env);
    let mut t = terms(&env, &s, PaymentType::TimeBased, 1_000);
    t.oracle_kind = OracleKind::Manual;
    t.oracle = None;
    let id = s.agreement.create_agreement(&s.employer, &t);

    s.agreement
        .record_work(&s.worker, &id, &40, &proof(&env, 1), &None);
    let metrics = s.agreement.get_metrics(&id);
    assert_eq!(metrics.pending_manual, 40);
    assert_eq!(metrics.hours_worked, 0);

    assert_eq!(
        s.agreement.try_confirm_work(&s.worker, &id),
        Err(Ok(AgreementError::NotEmployer))
    );
    assert_eq!(s.agreement.confirm_work(&s.employer, &id), 40);
    let metrics = s.agreement.get_metrics(&id);
    assert_eq!(metrics.pending_manual, 0);
    assert_eq!(metrics.hours_worked, 40);

    assert_eq!(
        s.agreement.try_confirm_work(&s.employer, &id),
        Err(Ok(AgreementError::NothingToConfirm))
    );
}

#[test]
fn custom_policy_requires_both_oracles() {
    let env = env();
    let s = setup(&env);
    let second_oracle = env.register(MockOracle, ());
    let mut t = terms(&env, &s, PaymentType::Custom, 1_000);
    t.secondary_oracle = Some(second_oracle.clone());
    t.require_both = true;
    let id = s.agreement.create_agreement(&s.employer, &t);

    // a single confirmation is not enough
    assert_eq!(
        s.agreement
            .try_record_work(&s.worker, &id, &50, &proof(&env, 1), &None),
        Err(Ok(AgreementError::VerificationFailed))
    );

    s.agreement
        .record_work(&s.worker, &id, &50, &proof(&env, 1), &Some(proof(&env, 2)));
    assert_eq!(s.agreement.get_metrics(&id).units_completed, 50);

    // the secondary oracle dissenting blocks the claim
    MockOracleClient::new(&env, &second_oracle).set_result(&false, &0);
    assert_eq!(
        s.agreement
            .try_record_work(&s.worker, &id, &50, &proof(&env, 3), &Some(proof(&env, 4))),
        Err(Ok(AgreementError::VerificationFailed))
    );
}

#[test]
fn milestone_agreement_pays_completed_milestones() {
    let env = env();
    let s = setup(&env);
    let id = s
        .agreement
        .create_agreement(&s.employer, &terms(&env, &s, PaymentType::MilestoneBased, 1_000));

    // milestone policies do not accrue unit work
    assert_eq!(
        s.agreement
            .try_record_work(&s.worker, &id, &10, &proof(&env, 1), &None),
        Err(Ok(AgreementError::MilestoneNotFound))
    );

    assert_eq!(
        s.agreement.try_add_milestone(
            &s.worker,
            &id,
            &String::from_str(&env, "frame the shed"),
            &500,
            &OracleKind::Image,
            &Some(s.oracle.address.clone()),
        ),
        Err(Ok(AgreementError::NotEmployer))
    );
    let index = s.agreement.add_milestone(
        &s.employer,
        &id,
        &String::from_str(&env, "frame the shed"),
        &500,
        &OracleKind::Image,
        &Some(s.oracle.address.clone()),
    );
    assert_eq!(index, 0);

    s.agreement
        .complete_milestone(&s.worker, &id, &0, &proof(&env, 9));
    assert_eq!(
        s.agreement
            .try_complete_milestone(&s.worker, &id, &0, &proof(&env, 9)),
        Err(Ok(AgreementError::MilestoneAlreadyCompleted))
    );

    advance(&env, INTERVAL);
    assert_eq!(s.agreement.process_payment(&s.worker, &id), 500);
    assert_eq!(balance(&env, &s.token, &s.worker), 500);
    let milestones = s.agreement.get_milestones(&id);
    assert!(milestones.get_unchecked(0).paid);
}

#[test]
fn raise_dispute_locks_escrow_and_blocks_payment() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);
    s.agreement
        .record_work(&s.worker, &id, &200, &proof(&env, 1), &None);

    let dispute_id = s.agreement.raise_dispute(&s.worker, &id, &0);
    let escrow_id = s.agreement.get_payment_escrows(&id, &0).get_unchecked(0);
    assert_eq!(s.escrow.get_status(&escrow_id), EscrowStatus::Disputed);

    let dispute = s.agreement.get_dispute_state(&id);
    assert!(dispute.is_active);
    assert_eq!(dispute.active_dispute_id, Some(dispute_id));
    assert_eq!(dispute.disputed_payment, Some(0));

    assert_eq!(
        s.agreement.try_raise_dispute(&s.employer, &id, &0),
        Err(Ok(AgreementError::DisputeAlreadyActive))
    );

    advance(&env, INTERVAL);
    assert_eq!(
        s.agreement.try_process_payment(&s.worker, &id),
        Err(Ok(AgreementError::DisputeStillActive))
    );
    assert_eq!(
        s.agreement.try_complete_contract(&s.employer, &id),
        Err(Ok(AgreementError::DisputeStillActive))
    );
}

#[test]
fn dispute_resolution_splits_escrow_and_updates_reputation() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);
    let dispute_id = s.agreement.raise_dispute(&s.worker, &id, &0);

    assert_eq!(
        s.agreement.try_handle_dispute_resolution(&id),
        Err(Ok(AgreementError::DisputeNotResolved))
    );

    s.arbitration.submit_vote(&s.voters[0], &dispute_id, &80);
    s.arbitration.submit_vote(&s.voters[1], &dispute_id, &60);
    s.arbitration.submit_vote(&s.voters[2], &dispute_id, &40);

    let employer_before = balance(&env, &s.token, &s.employer);
    assert_eq!(s.agreement.handle_dispute_resolution(&id), 60);

    assert_eq!(balance(&env, &s.token, &s.worker), 600);
    assert_eq!(balance(&env, &s.token, &s.employer), employer_before + 400);
    assert_eq!(s.reputation.last_outcome(&s.worker), Some(true));
    assert_eq!(s.reputation.last_outcome(&s.employer), Some(false));

    let dispute = s.agreement.get_dispute_state(&id);
    assert!(!dispute.is_active);
    assert_eq!(dispute.active_dispute_id, None);
    // the cycle settles through the split, never through a release
    assert_eq!(
        s.agreement.get_payment_state(&id, &0),
        PaymentState::Settled
    );
    assert_eq!(s.agreement.current_payment_number(&id), 1);
}

/// An appeal on the arbitration side becomes visible on the agreement: the
/// dispute stays open, `appeal_active` mirrors the engine, and settlement
/// waits for the re-vote.
#[test]
fn appeal_status_mirrors_into_dispute_state() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);
    let dispute_id = s.agreement.raise_dispute(&s.worker, &id, &0);

    s.arbitration.submit_vote(&s.voters[0], &dispute_id, &80);
    s.arbitration.submit_vote(&s.voters[1], &dispute_id, &60);
    s.arbitration.submit_vote(&s.voters[2], &dispute_id, &40);

    s.arbitration.appeal_dispute(&s.employer, &dispute_id);
    assert!(s.agreement.sync_dispute(&id));
    assert!(s.agreement.get_dispute_state(&id).appeal_active);
    assert_eq!(
        s.agreement.try_handle_dispute_resolution(&id),
        Err(Ok(AgreementError::DisputeNotResolved))
    );

    // the re-vote resolves the appeal round and settlement proceeds
    s.arbitration.submit_vote(&s.voters[0], &dispute_id, &50);
    s.arbitration.submit_vote(&s.voters[1], &dispute_id, &50);
    s.arbitration.submit_vote(&s.voters[2], &dispute_id, &50);
    assert!(!s.agreement.sync_dispute(&id));
    assert_eq!(s.agreement.handle_dispute_resolution(&id), 50);
    assert!(!s.agreement.get_dispute_state(&id).appeal_active);
}

#[test]
fn deposit_for_payment_funds_next_cycle() {
    let env = env();
    let s = setup(&env);
    // deposit exactly the first cycle's due so nothing carries over
    let id = piece_rate_agreement(&env, &s, 400);
    s.agreement
        .record_work(&s.worker, &id, &200, &proof(&env, 1), &None);
    advance(&env, INTERVAL);
    assert_eq!(s.agreement.process_payment(&s.worker, &id), 400);
    assert_eq!(s.agreement.current_payment_number(&id), 1);
    assert_eq!(
        s.agreement.try_get_payment_escrows(&id, &1),
        Err(Ok(AgreementError::UnknownPaymentNumber))
    );

    s.agreement.deposit_for_payment(&s.employer, &id, &500);
    assert_eq!(
        s.agreement.get_payment_state(&id, &1),
        PaymentState::Pending
    );
    // further deposits append to the same cycle's escrow set
    s.agreement.deposit_for_payment(&s.employer, &id, &500);
    assert_eq!(s.agreement.get_payment_escrows(&id, &1).len(), 2);
}

/// An underfunded cycle is remediable: the employer tops it up and the same
/// cycle's payment goes through without waiting out the interval.
#[test]
fn top_up_remediates_underfunded_cycle() {
    let env = env();
    let s = setup(&env);
    // due will be 400 against a 300 deposit
    let id = piece_rate_agreement(&env, &s, 300);
    s.agreement
        .record_work(&s.worker, &id, &200, &proof(&env, 1), &None);
    advance(&env, INTERVAL);

    assert_eq!(
        s.agreement.try_process_payment(&s.worker, &id),
        Err(Ok(AgreementError::EscrowInsufficient))
    );

    s.agreement.deposit_for_payment(&s.employer, &id, &100);
    assert_eq!(s.agreement.get_payment_escrows(&id, &0).len(), 2);
    assert_eq!(s.agreement.process_payment(&s.worker, &id), 400);
    assert_eq!(balance(&env, &s.token, &s.worker), 400);
    assert_eq!(s.agreement.current_payment_number(&id), 1);
}

#[test]
fn job_verification_paths() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    // oracle path
    s.agreement.create_job(
        &s.employer,
        &id,
        &String::from_str(&env, "harvest row 12"),
        &Some(s.oracle.address.clone()),
        &false,
    );
    s.oracle.set_result(&false, &0);
    assert_eq!(
        s.agreement.try_verify_job(&s.worker, &id, &proof(&env, 3)),
        Err(Ok(AgreementError::VerificationFailed))
    );
    assert!(!s.agreement.get_job(&id).verified);

    s.oracle.set_result(&true, &0);
    s.agreement.verify_job(&s.worker, &id, &proof(&env, 3));
    assert!(s.agreement.get_job(&id).verified);
    assert!(s.agreement.get_state(&id).quality_verified);

    // manual path must be explicitly selected and employer confirmed
    let id2 = piece_rate_agreement(&env, &s, 1_000);
    assert_eq!(
        s.agreement.try_create_job(
            &s.employer,
            &id2,
            &String::from_str(&env, "sort crates"),
            &None,
            &false,
        ),
        Err(Ok(AgreementError::ManualPathNotSelected))
    );
    s.agreement.create_job(
        &s.employer,
        &id2,
        &String::from_str(&env, "sort crates"),
        &None,
        &true,
    );
    assert_eq!(
        s.agreement.try_verify_job(&s.worker, &id2, &proof(&env, 4)),
        Err(Ok(AgreementError::NotEmployer))
    );
    s.agreement.verify_job(&s.employer, &id2, &proof(&env, 4));
    assert!(s.agreement.get_job(&id2).verified);
}

#[test]
fn terminal_transitions_keep_records() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    assert_eq!(
        s.agreement.try_complete_contract(&s.worker, &id),
        Err(Ok(AgreementError::NotEmployer))
    );
    s.agreement.complete_contract(&s.employer, &id);
    let state = s.agreement.get_state(&id);
    assert_eq!(state.status, AgreementStatus::Completed);
    assert!(!state.is_active);
    assert!(state.work_completed);
    assert!(state.completion_time.is_some());
    assert_eq!(s.reputation.update_count(), 2);

    assert_eq!(
        s.agreement.try_complete_contract(&s.employer, &id),
        Err(Ok(AgreementError::AgreementNotActive))
    );

    let id2 = piece_rate_agreement(&env, &s, 1_000);
    s.agreement.terminate_contract(&s.worker, &id2);
    let state = s.agreement.get_state(&id2);
    assert_eq!(state.status, AgreementStatus::Terminated);
    assert!(!state.is_active);
}

#[test]
fn grievances_pass_through_with_role_gates() {
    let env = env();
    let s = setup(&env);
    let id = piece_rate_agreement(&env, &s, 1_000);

    assert_eq!(
        s.agreement.try_file_grievance(
            &s.employer,
            &id,
            &String::from_str(&env, "safety"),
            &String::from_str(&env, "no shade at the weigh station"),
            &proof(&env, 7),
        ),
        Err(Ok(AgreementError::NotWorker))
    );
    let grievance_id = s.agreement.file_grievance(
        &s.worker,
        &id,
        &String::from_str(&env, "safety"),
        &String::from_str(&env, "no shade at the weigh station"),
        &proof(&env, 7),
    );
    assert_eq!(grievance_id, 0);
    assert_eq!(
        s.grievance.get_status(&grievance_id),
        Some(GrievanceStatus::Pending)
    );

    assert_eq!(
        s.agreement.try_update_grievance_status(
            &s.worker,
            &id,
            &grievance_id,
            &GrievanceStatus::InMediation,
        ),
        Err(Ok(AgreementError::NotArbitrator))
    );
    // fallback representatives sit on the designated panel
    s.agreement.update_grievance_status(
        &s.worker_rep,
        &id,
        &grievance_id,
        &GrievanceStatus::InMediation,
    );
    assert_eq!(
        s.grievance.get_status(&grievance_id),
        Some(GrievanceStatus::InMediation)
    );
}
