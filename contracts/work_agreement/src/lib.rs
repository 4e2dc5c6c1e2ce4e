#![no_std]

//! Work agreement orchestrator.
//!
//! Holds the per-agreement state machine (parties, job, payment policy,
//! dispute lifecycle) and coordinates the escrow ledger, arbitration engine,
//! oracles, and the compliance / reputation / grievance / DAO collaborators
//! through the narrow clients in [`collaborators`]. Funds never rest in this
//! contract; every token movement happens inside the escrow ledger.

#[cfg(test)]
extern crate std;

pub mod collaborators;
pub mod errors;
pub mod events;
pub mod payment;
pub mod storage;

#[cfg(test)]
mod tests;

use soroban_sdk::{
    contract, contractimpl, Address, Bytes, BytesN, Env, String, Vec,
};

use collaborators::{
    ArbitrationEngineClient, ComplianceCheck, ComplianceClient, DaoClient, DaoSide, EntityType,
    EscrowClient, EscrowStatus, GrievanceClient, GrievanceStatus, OracleClient, OracleKind,
    ReputationClient,
};
use errors::AgreementError;
use events::{
    emit_agreement_closed, emit_agreement_created, emit_cycle_funded, emit_dispute_raised,
    emit_dispute_settled, emit_grievance_filed, emit_payment_completed, emit_payment_stage,
    emit_work_recorded, AgreementClosedEvent, AgreementCreatedEvent, CycleFundedEvent,
    DisputeRaisedEvent, DisputeSettledEvent, GrievanceFiledEvent, PaymentCompletedEvent,
    PaymentStageEvent, WorkRecordedEvent, JOB_CREATED_EVENT, JOB_VERIFIED_EVENT,
    MILESTONE_ADDED_EVENT, MILESTONE_DONE_EVENT, WORK_CONFIRMED_EVENT,
};
use storage::{
    AgreementStatus, AgreementTerms, Collaborators, ContractState, DisputeState, Job, Milestone,
    PaymentConfig, PaymentState, Stakeholders, StorageKey, WorkMetrics,
};

const WEEK_SECONDS: u64 = 7 * 24 * 3600;

//-----------------------------------------------------------------------------
// Contract
//-----------------------------------------------------------------------------

#[contract]
pub struct WorkAgreementContract;

#[contractimpl]
impl WorkAgreementContract {
    //-------------------------------------------------------------------------
    // Initialization
    //-------------------------------------------------------------------------

    pub fn initialize(
        env: Env,
        admin: Address,
        collaborators: Collaborators,
        dispute_voting_period: u64,
    ) -> Result<(), AgreementError> {
        admin.require_auth();

        let storage = env.storage().persistent();
        if storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(AgreementError::AlreadyInitialized);
        }

        storage.set(&StorageKey::Admin, &admin);
        storage.set(&StorageKey::Collaborators, &collaborators);
        storage.set(&StorageKey::DisputeVotingPeriod, &dispute_voting_period);
        storage.set(&StorageKey::NextAgreementId, &0u64);
        storage.set(&StorageKey::Initialized, &true);
        Ok(())
    }

    //-------------------------------------------------------------------------
    // Agreement lifecycle
    //-------------------------------------------------------------------------

    /// Forms a new agreement: validates the terms, draws the three designated
    /// arbitrators, escrows the employer's initial deposit under a fresh
    /// payment identifier, and activates the agreement.
    pub fn create_agreement(
        env: Env,
        employer: Address,
        terms: AgreementTerms,
    ) -> Result<u64, AgreementError> {
        employer.require_auth();

        let storage = env.storage().persistent();
        if !storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(AgreementError::NotInitialized);
        }

        let now = env.ledger().timestamp();
        if terms.initial_deposit <= 0 {
            return Err(AgreementError::ZeroInitialDeposit);
        }
        if terms.deadline <= now {
            return Err(AgreementError::InvalidDeadline);
        }
        if terms.min_payment < 0 || terms.max_payment < terms.min_payment {
            return Err(AgreementError::InvalidPaymentBounds);
        }
        if terms.base_rate <= 0 {
            return Err(AgreementError::InvalidAmount);
        }

        let collaborators: Collaborators = storage
            .get(&StorageKey::Collaborators)
            .ok_or(AgreementError::NotInitialized)?;

        let arbitrators = select_arbitrators(&env, &collaborators, &terms)?;

        let agreement_id: u64 = storage.get(&StorageKey::NextAgreementId).unwrap_or(0);
        storage.set(&StorageKey::NextAgreementId, &(agreement_id + 1));

        let stakeholders = Stakeholders {
            worker: terms.worker.clone(),
            employer: employer.clone(),
            worker_dao: terms.worker_dao.clone(),
            employer_dao: terms.employer_dao.clone(),
            worker_fallback: terms.worker_fallback.clone(),
            employer_fallback: terms.employer_fallback.clone(),
            arbitrators,
        };
        let state = ContractState {
            status: AgreementStatus::Active,
            is_active: true,
            work_completed: false,
            quality_verified: false,
            start_time: now,
            completion_time: None,
            deadline: terms.deadline,
        };
        let config = PaymentConfig {
            payment_type: terms.payment_type,
            oracle_kind: terms.oracle_kind,
            oracle: terms.oracle.clone(),
            secondary_oracle: terms.secondary_oracle.clone(),
            require_both: terms.require_both,
            interval: terms.interval,
            base_rate: terms.base_rate,
            min_payment: terms.min_payment,
            max_payment: terms.max_payment,
            next_payment_due: now + terms.interval,
            total_paid: 0,
        };
        let metrics = WorkMetrics {
            units_completed: 0,
            units_paid: 0,
            hours_worked: 0,
            hours_paid: 0,
            pending_manual: 0,
        };
        let dispute = DisputeState {
            is_active: false,
            appeal_active: false,
            active_dispute_id: None,
            dispute_deadline: 0,
            disputed_payment: None,
        };

        // Cycle 0 is funded by the formation deposit.
        let escrow_id = derive_payment_id(&env, agreement_id, 0, 0);
        EscrowClient::new(&env, &collaborators.escrow).deposit(
            &employer,
            &terms.worker,
            &env.current_contract_address(),
            &escrow_id,
            &terms.initial_deposit,
        );

        storage.set(&StorageKey::Stakeholders(agreement_id), &stakeholders);
        storage.set(&StorageKey::State(agreement_id), &state);
        storage.set(&StorageKey::PaymentConfig(agreement_id), &config);
        storage.set(&StorageKey::Metrics(agreement_id), &metrics);
        storage.set(&StorageKey::Dispute(agreement_id), &dispute);
        storage.set(
            &StorageKey::Milestones(agreement_id),
            &Vec::<Milestone>::new(&env),
        );
        storage.set(
            &StorageKey::RequiredChecks(agreement_id),
            &terms.required_checks,
        );
        storage.set(
            &StorageKey::MaxWeeklyHours(agreement_id),
            &terms.max_weekly_hours,
        );
        storage.set(&StorageKey::PaymentSeq(agreement_id), &0u64);
        let mut escrows = Vec::<BytesN<32>>::new(&env);
        escrows.push_back(escrow_id);
        storage.set(&StorageKey::PaymentEscrows(agreement_id, 0), &escrows);
        storage.set(
            &StorageKey::PaymentState(agreement_id, 0),
            &PaymentState::Pending,
        );

        emit_agreement_created(
            &env,
            AgreementCreatedEvent {
                agreement_id,
                worker: terms.worker,
                employer,
                initial_deposit: terms.initial_deposit,
                deadline: terms.deadline,
            },
        );
        emit_cycle_funded(
            &env,
            CycleFundedEvent {
                agreement_id,
                payment_number: 0,
                amount: terms.initial_deposit,
            },
        );
        Ok(agreement_id)
    }

    /// Marks all obligations met. Employer only; blocked while a dispute is
    /// open. The record stays stored for auditability.
    pub fn complete_contract(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_employer(&stakeholders, &caller)?;
        let mut state = load_state(&env, agreement_id)?;
        if !state.is_active {
            return Err(AgreementError::AgreementNotActive);
        }
        let dispute = load_dispute(&env, agreement_id)?;
        if dispute.is_active {
            return Err(AgreementError::DisputeStillActive);
        }

        let now = env.ledger().timestamp();
        state.status = AgreementStatus::Completed;
        state.is_active = false;
        state.work_completed = true;
        state.completion_time = Some(now);
        storage.set(&StorageKey::State(agreement_id), &state);

        let collaborators = load_collaborators(&env)?;
        let reputation = ReputationClient::new(&env, &collaborators.reputation);
        let proof = derive_payment_id(&env, agreement_id, u64::MAX, 0);
        reputation.update_score(
            &stakeholders.worker,
            &EntityType::Worker,
            &collaborators::ScoreFactor::ContractCompletion,
            &100u32,
            &proof,
        );
        reputation.update_score(
            &stakeholders.employer,
            &EntityType::Employer,
            &collaborators::ScoreFactor::ContractCompletion,
            &100u32,
            &proof,
        );

        emit_agreement_closed(
            &env,
            AgreementClosedEvent {
                agreement_id,
                completed: true,
                timestamp: now,
            },
        );
        Ok(())
    }

    /// Ends the agreement early. Either party; blocked while a dispute is
    /// open. Escrowed funds stay in the ledger under its own refund and
    /// timeout rules.
    pub fn terminate_contract(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        let mut state = load_state(&env, agreement_id)?;
        if !state.is_active {
            return Err(AgreementError::AgreementNotActive);
        }
        let dispute = load_dispute(&env, agreement_id)?;
        if dispute.is_active {
            return Err(AgreementError::DisputeStillActive);
        }

        let now = env.ledger().timestamp();
        state.status = AgreementStatus::Terminated;
        state.is_active = false;
        state.completion_time = Some(now);
        storage.set(&StorageKey::State(agreement_id), &state);

        emit_agreement_closed(
            &env,
            AgreementClosedEvent {
                agreement_id,
                completed: false,
                timestamp: now,
            },
        );
        Ok(())
    }

    //-------------------------------------------------------------------------
    // Job
    //-------------------------------------------------------------------------

    /// Attaches the unit of work to the agreement. The employer either names
    /// an oracle or explicitly selects the manual-confirmation path.
    pub fn create_job(
        env: Env,
        caller: Address,
        agreement_id: u64,
        description: String,
        oracle: Option<Address>,
        manual_confirmation: bool,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_employer(&stakeholders, &caller)?;
        let state = load_state(&env, agreement_id)?;
        if !state.is_active {
            return Err(AgreementError::AgreementNotActive);
        }
        if !manual_confirmation && oracle.is_none() {
            return Err(AgreementError::ManualPathNotSelected);
        }

        let job = Job {
            description,
            oracle,
            manual_confirmation,
            verified: false,
        };
        env.storage()
            .persistent()
            .set(&StorageKey::Job(agreement_id), &job);
        env.events()
            .publish((JOB_CREATED_EVENT, agreement_id), manual_confirmation);
        Ok(())
    }

    /// Verifies the attached job. Oracle path: the proof must verify, a
    /// failed verification aborts and never silently marks the job complete.
    /// Manual path: the employer confirms directly.
    pub fn verify_job(
        env: Env,
        caller: Address,
        agreement_id: u64,
        proof: BytesN<32>,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        let mut job: Job = storage
            .get(&StorageKey::Job(agreement_id))
            .ok_or(AgreementError::JobNotFound)?;

        if job.manual_confirmation {
            require_employer(&stakeholders, &caller)?;
        } else {
            require_participant(&stakeholders, &caller)?;
            let oracle = job
                .oracle
                .as_ref()
                .ok_or(AgreementError::ManualPathNotSelected)?;
            let result = OracleClient::new(&env, oracle).verify(&proof);
            if !result.verified {
                return Err(AgreementError::VerificationFailed);
            }
        }

        job.verified = true;
        storage.set(&StorageKey::Job(agreement_id), &job);

        let mut state = load_state(&env, agreement_id)?;
        state.quality_verified = true;
        storage.set(&StorageKey::State(agreement_id), &state);

        env.events().publish((JOB_VERIFIED_EVENT, agreement_id), ());
        Ok(())
    }

    //-------------------------------------------------------------------------
    // Work and milestones
    //-------------------------------------------------------------------------

    /// Records verified work under the agreement's payment policy. When the
    /// payment interval has elapsed and the cycle is funded, the full payment
    /// pipeline runs within the same invocation.
    pub fn record_work(
        env: Env,
        caller: Address,
        agreement_id: u64,
        amount: i128,
        proof: BytesN<32>,
        secondary_proof: Option<BytesN<32>>,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        let state = load_state(&env, agreement_id)?;
        if !state.is_active {
            return Err(AgreementError::AgreementNotActive);
        }
        let now = env.ledger().timestamp();
        if now > state.deadline {
            return Err(AgreementError::DeadlinePassed);
        }

        let config = load_config(&env, agreement_id)?;
        let mut metrics = load_metrics(&env, agreement_id)?;
        payment::record_work(&env, &config, &mut metrics, amount, proof, secondary_proof)?;
        storage.set(&StorageKey::Metrics(agreement_id), &metrics);

        emit_work_recorded(
            &env,
            WorkRecordedEvent {
                agreement_id,
                worker: stakeholders.worker.clone(),
                amount,
                timestamp: now,
            },
        );

        if now >= config.next_payment_due {
            let seq: u64 = storage
                .get(&StorageKey::PaymentSeq(agreement_id))
                .unwrap_or(0);
            let funded = storage
                .get::<_, Vec<BytesN<32>>>(&StorageKey::PaymentEscrows(agreement_id, seq))
                .map(|escrows| !escrows.is_empty())
                .unwrap_or(false);
            if funded {
                run_pipeline(&env, agreement_id)?;
            }
        }
        Ok(())
    }

    /// Employer confirmation of manually recorded work.
    pub fn confirm_work(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<i128, AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_employer(&stakeholders, &caller)?;
        let config = load_config(&env, agreement_id)?;
        if config.oracle_kind != OracleKind::Manual {
            return Err(AgreementError::ManualPathNotSelected);
        }

        let mut metrics = load_metrics(&env, agreement_id)?;
        let confirmed = payment::confirm_manual_work(&config, &mut metrics)?;
        storage.set(&StorageKey::Metrics(agreement_id), &metrics);

        env.events()
            .publish((WORK_CONFIRMED_EVENT, agreement_id), confirmed);
        Ok(confirmed)
    }

    /// Appends a milestone carrying its own oracle kind and amount.
    pub fn add_milestone(
        env: Env,
        caller: Address,
        agreement_id: u64,
        description: String,
        amount: i128,
        oracle_kind: OracleKind,
        oracle: Option<Address>,
    ) -> Result<u32, AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_employer(&stakeholders, &caller)?;
        let state = load_state(&env, agreement_id)?;
        if !state.is_active {
            return Err(AgreementError::AgreementNotActive);
        }
        if amount <= 0 {
            return Err(AgreementError::InvalidAmount);
        }
        if oracle_kind != OracleKind::Manual && oracle.is_none() {
            return Err(AgreementError::ManualPathNotSelected);
        }

        let mut milestones = load_milestones(&env, agreement_id)?;
        let index = milestones.len();
        milestones.push_back(Milestone {
            description,
            amount,
            oracle_kind,
            oracle,
            completed: false,
            paid: false,
        });
        storage.set(&StorageKey::Milestones(agreement_id), &milestones);

        env.events()
            .publish((MILESTONE_ADDED_EVENT, agreement_id), index);
        Ok(index)
    }

    /// Verifies and completes one milestone. Manual-kind milestones require
    /// the employer; oracle-kind milestones accept either participant with a
    /// verifying proof.
    pub fn complete_milestone(
        env: Env,
        caller: Address,
        agreement_id: u64,
        index: u32,
        proof: BytesN<32>,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        let state = load_state(&env, agreement_id)?;
        if !state.is_active {
            return Err(AgreementError::AgreementNotActive);
        }
        let mut milestones = load_milestones(&env, agreement_id)?;
        let milestone = milestones
            .get(index)
            .ok_or(AgreementError::MilestoneNotFound)?;
        if milestone.oracle_kind == OracleKind::Manual {
            require_employer(&stakeholders, &caller)?;
        } else {
            require_participant(&stakeholders, &caller)?;
        }

        payment::complete_milestone(&env, &mut milestones, index, proof)?;
        storage.set(&StorageKey::Milestones(agreement_id), &milestones);

        env.events()
            .publish((MILESTONE_DONE_EVENT, agreement_id), index);
        Ok(())
    }

    //-------------------------------------------------------------------------
    // Payment pipeline
    //-------------------------------------------------------------------------

    /// Escrows funds for the current cycle under a fresh identifier. Each
    /// deposit appends to the cycle's escrow set, so an underfunded cycle can
    /// be topped up and the pipeline retried without waiting out the cycle.
    pub fn deposit_for_payment(
        env: Env,
        caller: Address,
        agreement_id: u64,
        amount: i128,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_employer(&stakeholders, &caller)?;
        let state = load_state(&env, agreement_id)?;
        if !state.is_active {
            return Err(AgreementError::AgreementNotActive);
        }
        if amount <= 0 {
            return Err(AgreementError::InvalidAmount);
        }

        let seq: u64 = storage
            .get(&StorageKey::PaymentSeq(agreement_id))
            .unwrap_or(0);
        let mut escrows: Vec<BytesN<32>> = storage
            .get(&StorageKey::PaymentEscrows(agreement_id, seq))
            .unwrap_or(Vec::new(&env));

        let collaborators = load_collaborators(&env)?;
        let escrow_id = derive_payment_id(&env, agreement_id, seq, escrows.len() as u64);
        EscrowClient::new(&env, &collaborators.escrow).deposit(
            &caller,
            &stakeholders.worker,
            &env.current_contract_address(),
            &escrow_id,
            &amount,
        );
        escrows.push_back(escrow_id);
        storage.set(&StorageKey::PaymentEscrows(agreement_id, seq), &escrows);
        // A top-up must not rewind a cycle already past its first stage.
        if storage
            .get::<_, PaymentState>(&StorageKey::PaymentState(agreement_id, seq))
            .is_none()
        {
            storage.set(
                &StorageKey::PaymentState(agreement_id, seq),
                &PaymentState::Pending,
            );
        }

        emit_cycle_funded(
            &env,
            CycleFundedEvent {
                agreement_id,
                payment_number: seq,
                amount,
            },
        );
        Ok(())
    }

    /// Pipeline stage 1: working-hours limit plus the agreement's required
    /// compliance checks. Failure names the failing check so the same cycle
    /// can be remediated and retried.
    pub fn verify_payment_compliance(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<(), AgreementError> {
        caller.require_auth();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        let seq = current_seq(&env, agreement_id)?;
        expect_stage(&env, agreement_id, seq, PaymentState::Pending)?;
        stage_compliance(&env, agreement_id, seq)
    }

    /// Pipeline stage 2: computes and persists the due amount.
    pub fn verify_payment_calculation(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<i128, AgreementError> {
        caller.require_auth();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        let seq = current_seq(&env, agreement_id)?;
        expect_stage(&env, agreement_id, seq, PaymentState::ComplianceVerified)?;
        stage_calculation(&env, agreement_id, seq)
    }

    /// Pipeline stage 3: the cycle's escrow must be held with sufficient
    /// balance.
    pub fn check_escrow(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<(), AgreementError> {
        caller.require_auth();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        let seq = current_seq(&env, agreement_id)?;
        expect_stage(&env, agreement_id, seq, PaymentState::CalculationVerified)?;
        stage_escrow(&env, agreement_id, seq)
    }

    /// Pipeline stage 4: releases the due amount to the worker and advances
    /// the payment sequence.
    pub fn complete_payment(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<i128, AgreementError> {
        caller.require_auth();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        let seq = current_seq(&env, agreement_id)?;
        expect_stage(&env, agreement_id, seq, PaymentState::EscrowChecked)?;
        stage_release(&env, agreement_id, seq)
    }

    /// Runs every remaining stage of the current cycle in one atomic
    /// invocation; any stage failure aborts the whole call with that stage's
    /// error.
    pub fn process_payment(
        env: Env,
        caller: Address,
        agreement_id: u64,
    ) -> Result<i128, AgreementError> {
        caller.require_auth();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        run_pipeline(&env, agreement_id)
    }

    //-------------------------------------------------------------------------
    // Disputes
    //-------------------------------------------------------------------------

    /// Opens a dispute over one payment cycle: files it with the arbitration
    /// engine and locks the cycle's escrow in the same invocation, so the
    /// lock can never exist without a matching case.
    pub fn raise_dispute(
        env: Env,
        caller: Address,
        agreement_id: u64,
        payment_number: u64,
    ) -> Result<u64, AgreementError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_participant(&stakeholders, &caller)?;
        let mut dispute = load_dispute(&env, agreement_id)?;
        if dispute.is_active {
            return Err(AgreementError::DisputeAlreadyActive);
        }
        let escrows: Vec<BytesN<32>> = storage
            .get(&StorageKey::PaymentEscrows(agreement_id, payment_number))
            .ok_or(AgreementError::UnknownPaymentNumber)?;

        let collaborators = load_collaborators(&env)?;
        let escrow = EscrowClient::new(&env, &collaborators.escrow);
        let mut amount: i128 = 0;
        for id in escrows.iter() {
            amount += escrow.get_balance(&id);
        }
        if amount <= 0 {
            return Err(AgreementError::InvalidAmount);
        }

        let respondent = if caller == stakeholders.worker {
            stakeholders.employer.clone()
        } else {
            stakeholders.worker.clone()
        };
        let dispute_id = ArbitrationEngineClient::new(&env, &collaborators.arbitration)
            .create_dispute(
                &env.current_contract_address(),
                &caller,
                &respondent,
                &amount,
            );
        // One arbitration case covers the cycle; every funded record locks.
        for id in escrows.iter() {
            if escrow.get_balance(&id) > 0 {
                escrow.dispute_payment(&env.current_contract_address(), &id, &dispute_id);
            }
        }

        let voting_period: u64 = storage.get(&StorageKey::DisputeVotingPeriod).unwrap_or(0);
        dispute.is_active = true;
        dispute.appeal_active = false;
        dispute.active_dispute_id = Some(dispute_id);
        dispute.dispute_deadline = env.ledger().timestamp() + voting_period;
        dispute.disputed_payment = Some(payment_number);
        storage.set(&StorageKey::Dispute(agreement_id), &dispute);

        emit_dispute_raised(
            &env,
            DisputeRaisedEvent {
                agreement_id,
                payment_number,
                dispute_id,
                initiator: caller,
                amount,
            },
        );
        Ok(dispute_id)
    }

    /// Settles an arbitrated dispute: pushes the outcome into both parties'
    /// reputation, splits the locked escrow per the resolution, and clears
    /// the dispute state. Callable by anyone once arbitration completes.
    pub fn handle_dispute_resolution(
        env: Env,
        agreement_id: u64,
    ) -> Result<u32, AgreementError> {
        let storage = env.storage().persistent();
        let stakeholders = load_stakeholders(&env, agreement_id)?;
        let mut dispute = load_dispute(&env, agreement_id)?;
        if !dispute.is_active {
            return Err(AgreementError::NoActiveDispute);
        }
        let dispute_id = dispute
            .active_dispute_id
            .ok_or(AgreementError::NoActiveDispute)?;
        let payment_number = dispute
            .disputed_payment
            .ok_or(AgreementError::NoActiveDispute)?;

        let collaborators = load_collaborators(&env)?;
        let (complete, resolution) =
            ArbitrationEngineClient::new(&env, &collaborators.arbitration)
                .get_resolution(&dispute_id);
        if !complete {
            return Err(AgreementError::DisputeNotResolved);
        }

        let worker_won = resolution >= 50;
        let reputation = ReputationClient::new(&env, &collaborators.reputation);
        reputation.handle_dispute_outcome(&stakeholders.worker, &EntityType::Worker, &worker_won);
        reputation.handle_dispute_outcome(
            &stakeholders.employer,
            &EntityType::Employer,
            &!worker_won,
        );

        let escrows: Vec<BytesN<32>> = storage
            .get(&StorageKey::PaymentEscrows(agreement_id, payment_number))
            .ok_or(AgreementError::UnknownPaymentNumber)?;
        let escrow = EscrowClient::new(&env, &collaborators.escrow);
        for id in escrows.iter() {
            if escrow.get_status(&id) == EscrowStatus::Disputed {
                escrow.emergency_release(&id);
            }
        }

        dispute.is_active = false;
        dispute.appeal_active = false;
        dispute.active_dispute_id = None;
        dispute.dispute_deadline = 0;
        dispute.disputed_payment = None;
        storage.set(&StorageKey::Dispute(agreement_id), &dispute);

        // The split consumed the cycle's escrow in full; the cycle settles
        // without passing through a release.
        set_payment_stage(&env, agreement_id, payment_number, PaymentState::Settled);
        let seq: u64 = storage
            .get(&StorageKey::PaymentSeq(agreement_id))
            .unwrap_or(0);
        if seq == payment_number {
            storage.set(&StorageKey::PaymentSeq(agreement_id), &(seq + 1));
        }

        emit_dispute_settled(
            &env,
            DisputeSettledEvent {
                agreement_id,
                dispute_id,
                resolution,
                worker_won,
            },
        );
        Ok(resolution)
    }

    /// Mirrors the arbitration engine's appeal status into the agreement's
    /// dispute state, so an appealed resolution is visible here while the
    /// re-vote runs. Callable by anyone while a dispute is open.
    pub fn sync_dispute(env: Env, agreement_id: u64) -> Result<bool, AgreementError> {
        let storage = env.storage().persistent();
        let mut dispute = load_dispute(&env, agreement_id)?;
        if !dispute.is_active {
            return Err(AgreementError::NoActiveDispute);
        }
        let dispute_id = dispute
            .active_dispute_id
            .ok_or(AgreementError::NoActiveDispute)?;

        let collaborators = load_collaborators(&env)?;
        let appeal_open = ArbitrationEngineClient::new(&env, &collaborators.arbitration)
            .appeal_open(&dispute_id);
        dispute.appeal_active = appeal_open;
        storage.set(&StorageKey::Dispute(agreement_id), &dispute);
        Ok(appeal_open)
    }

    //-------------------------------------------------------------------------
    // Grievances
    //-------------------------------------------------------------------------

    /// Files a grievance with the grievance collaborator. Worker only.
    pub fn file_grievance(
        env: Env,
        caller: Address,
        agreement_id: u64,
        category: String,
        details: String,
        salt: BytesN<32>,
    ) -> Result<u64, AgreementError> {
        caller.require_auth();

        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_worker(&stakeholders, &caller)?;
        let collaborators = load_collaborators(&env)?;
        let grievance_id = GrievanceClient::new(&env, &collaborators.grievance)
            .file_grievance(&caller, &category, &details, &salt);

        emit_grievance_filed(
            &env,
            GrievanceFiledEvent {
                agreement_id,
                grievance_id,
                worker: caller,
            },
        );
        Ok(grievance_id)
    }

    /// Moves a grievance through its lifecycle. Restricted to the
    /// agreement's designated arbitrators.
    pub fn update_grievance_status(
        env: Env,
        caller: Address,
        agreement_id: u64,
        grievance_id: u64,
        status: GrievanceStatus,
    ) -> Result<(), AgreementError> {
        caller.require_auth();

        let stakeholders = load_stakeholders(&env, agreement_id)?;
        require_arbitrator(&stakeholders, &caller)?;
        let collaborators = load_collaborators(&env)?;
        GrievanceClient::new(&env, &collaborators.grievance).update_grievance_status(
            &grievance_id,
            &status,
            &caller,
        );
        Ok(())
    }

    //-------------------------------------------------------------------------
    // Read-only
    //-------------------------------------------------------------------------

    pub fn get_state(env: Env, agreement_id: u64) -> Result<ContractState, AgreementError> {
        load_state(&env, agreement_id)
    }

    pub fn get_stakeholders(env: Env, agreement_id: u64) -> Result<Stakeholders, AgreementError> {
        load_stakeholders(&env, agreement_id)
    }

    pub fn get_payment_config(
        env: Env,
        agreement_id: u64,
    ) -> Result<PaymentConfig, AgreementError> {
        load_config(&env, agreement_id)
    }

    pub fn get_metrics(env: Env, agreement_id: u64) -> Result<WorkMetrics, AgreementError> {
        load_metrics(&env, agreement_id)
    }

    pub fn get_milestones(env: Env, agreement_id: u64) -> Result<Vec<Milestone>, AgreementError> {
        load_milestones(&env, agreement_id)
    }

    pub fn get_dispute_state(env: Env, agreement_id: u64) -> Result<DisputeState, AgreementError> {
        load_dispute(&env, agreement_id)
    }

    pub fn get_job(env: Env, agreement_id: u64) -> Result<Job, AgreementError> {
        env.storage()
            .persistent()
            .get(&StorageKey::Job(agreement_id))
            .ok_or(AgreementError::JobNotFound)
    }

    pub fn current_payment_number(env: Env, agreement_id: u64) -> Result<u64, AgreementError> {
        current_seq(&env, agreement_id)
    }

    pub fn get_payment_state(
        env: Env,
        agreement_id: u64,
        payment_number: u64,
    ) -> Result<PaymentState, AgreementError> {
        env.storage()
            .persistent()
            .get(&StorageKey::PaymentState(agreement_id, payment_number))
            .ok_or(AgreementError::UnknownPaymentNumber)
    }

    pub fn get_payment_escrows(
        env: Env,
        agreement_id: u64,
        payment_number: u64,
    ) -> Result<Vec<BytesN<32>>, AgreementError> {
        load_payment_escrows(&env, agreement_id, payment_number)
    }
}

//-----------------------------------------------------------------------------
// Pipeline stages
//-----------------------------------------------------------------------------

fn run_pipeline(env: &Env, agreement_id: u64) -> Result<i128, AgreementError> {
    let seq = current_seq(env, agreement_id)?;
    loop {
        let state = payment_stage(env, agreement_id, seq)?;
        match state {
            PaymentState::Pending => stage_compliance(env, agreement_id, seq)?,
            PaymentState::ComplianceVerified => {
                stage_calculation(env, agreement_id, seq)?;
            }
            PaymentState::CalculationVerified => stage_escrow(env, agreement_id, seq)?,
            PaymentState::EscrowChecked => return stage_release(env, agreement_id, seq),
            PaymentState::Completed | PaymentState::Settled => {
                return Err(AgreementError::PipelineStageOutOfOrder)
            }
        }
    }
}

fn stage_compliance(env: &Env, agreement_id: u64, seq: u64) -> Result<(), AgreementError> {
    let storage = env.storage().persistent();
    let dispute = load_dispute(env, agreement_id)?;
    if dispute.is_active {
        return Err(AgreementError::DisputeStillActive);
    }
    let config = load_config(env, agreement_id)?;
    let now = env.ledger().timestamp();
    if now < config.next_payment_due {
        return Err(AgreementError::PaymentNotDue);
    }

    let stakeholders = load_stakeholders(env, agreement_id)?;
    let collaborators = load_collaborators(env)?;
    let compliance = ComplianceClient::new(env, &collaborators.compliance);

    let max_weekly_hours: u32 = storage
        .get(&StorageKey::MaxWeeklyHours(agreement_id))
        .unwrap_or(0);
    if max_weekly_hours > 0 {
        let week_start = now - (now % WEEK_SECONDS);
        let (regular, overtime) = compliance.check_working_hours(&stakeholders.worker, &week_start);
        if regular + overtime > max_weekly_hours {
            return Err(AgreementError::WorkingHoursViolation);
        }
    }

    let required: Vec<ComplianceCheck> = storage
        .get(&StorageKey::RequiredChecks(agreement_id))
        .unwrap_or(Vec::new(env));
    for check in required.iter() {
        let subject = match check {
            ComplianceCheck::MinimumWage | ComplianceCheck::Insurance => &stakeholders.employer,
            _ => &stakeholders.worker,
        };
        let passed = match check {
            ComplianceCheck::Insurance => compliance.is_insurance_valid(subject),
            _ => compliance.verify_compliance(subject, &check),
        };
        if !passed {
            return Err(match check {
                ComplianceCheck::WorkingHours => AgreementError::WorkingHoursViolation,
                ComplianceCheck::MinimumWage => AgreementError::MinimumWageViolation,
                ComplianceCheck::RestPeriods => AgreementError::RestPeriodViolation,
                ComplianceCheck::Certification => AgreementError::CertificationMissing,
                ComplianceCheck::Insurance => AgreementError::InsuranceInvalid,
            });
        }
    }

    set_payment_stage(env, agreement_id, seq, PaymentState::ComplianceVerified);
    Ok(())
}

fn stage_calculation(env: &Env, agreement_id: u64, seq: u64) -> Result<i128, AgreementError> {
    let storage = env.storage().persistent();
    // The cycle must be funded before a payment can be calculated against it.
    load_payment_escrows(env, agreement_id, seq)?;

    let config = load_config(env, agreement_id)?;
    let metrics = load_metrics(env, agreement_id)?;
    let milestones = load_milestones(env, agreement_id)?;
    let due = payment::calculate_payment_due(&config, &metrics, &milestones)?;
    if due <= 0 {
        return Err(AgreementError::PaymentCalculationZero);
    }

    storage.set(&StorageKey::PaymentDue(agreement_id, seq), &due);
    set_payment_stage(env, agreement_id, seq, PaymentState::CalculationVerified);
    Ok(due)
}

fn stage_escrow(env: &Env, agreement_id: u64, seq: u64) -> Result<(), AgreementError> {
    let storage = env.storage().persistent();
    let escrows = load_payment_escrows(env, agreement_id, seq)?;
    let due: i128 = storage
        .get(&StorageKey::PaymentDue(agreement_id, seq))
        .ok_or(AgreementError::PipelineStageOutOfOrder)?;

    let collaborators = load_collaborators(env)?;
    let escrow = EscrowClient::new(env, &collaborators.escrow);
    let mut held = false;
    let mut available: i128 = 0;
    for id in escrows.iter() {
        if escrow.get_status(&id) == EscrowStatus::Held {
            held = true;
            available += escrow.get_balance(&id);
        }
    }
    if !held {
        return Err(AgreementError::EscrowNotHeld);
    }
    if available < due {
        return Err(AgreementError::EscrowInsufficient);
    }

    set_payment_stage(env, agreement_id, seq, PaymentState::EscrowChecked);
    Ok(())
}

fn stage_release(env: &Env, agreement_id: u64, seq: u64) -> Result<i128, AgreementError> {
    let storage = env.storage().persistent();
    let dispute = load_dispute(env, agreement_id)?;
    if dispute.is_active {
        return Err(AgreementError::DisputeStillActive);
    }
    let escrows = load_payment_escrows(env, agreement_id, seq)?;
    let due: i128 = storage
        .get(&StorageKey::PaymentDue(agreement_id, seq))
        .ok_or(AgreementError::PipelineStageOutOfOrder)?;

    let stakeholders = load_stakeholders(env, agreement_id)?;
    let collaborators = load_collaborators(env)?;
    let escrow = EscrowClient::new(env, &collaborators.escrow);
    let mut remaining = due;
    for id in escrows.iter() {
        if remaining == 0 {
            break;
        }
        if escrow.get_status(&id) != EscrowStatus::Held {
            continue;
        }
        let slice = remaining.min(escrow.get_balance(&id));
        if slice > 0 {
            escrow.release(&env.current_contract_address(), &id, &stakeholders.worker, &slice);
            remaining -= slice;
        }
    }
    if remaining > 0 {
        // Funds drained between the escrow check and the release; the error
        // reverts every partial release above.
        return Err(AgreementError::EscrowInsufficient);
    }

    let mut config = load_config(env, agreement_id)?;
    let mut metrics = load_metrics(env, agreement_id)?;
    let mut milestones = load_milestones(env, agreement_id)?;
    let disbursement = payment::mark_paid(env, &mut config, &mut metrics, &mut milestones, due);
    storage.set(&StorageKey::PaymentConfig(agreement_id), &config);
    storage.set(&StorageKey::Metrics(agreement_id), &metrics);
    storage.set(&StorageKey::Milestones(agreement_id), &milestones);

    storage.remove(&StorageKey::PaymentDue(agreement_id, seq));
    set_payment_stage(env, agreement_id, seq, PaymentState::Completed);

    let next_seq = seq + 1;
    storage.set(&StorageKey::PaymentSeq(agreement_id), &next_seq);
    // Leftover escrow keeps funding the next cycle under the same records.
    let mut carried = Vec::<BytesN<32>>::new(env);
    for id in escrows.iter() {
        if escrow.get_status(&id) == EscrowStatus::Held && escrow.get_balance(&id) > 0 {
            carried.push_back(id);
        }
    }
    if !carried.is_empty() {
        storage.set(&StorageKey::PaymentEscrows(agreement_id, next_seq), &carried);
        storage.set(
            &StorageKey::PaymentState(agreement_id, next_seq),
            &PaymentState::Pending,
        );
    }

    emit_payment_completed(
        env,
        PaymentCompletedEvent {
            agreement_id,
            payment_number: seq,
            amount: disbursement.amount,
            total_paid: config.total_paid,
        },
    );
    Ok(disbursement.amount)
}

//-----------------------------------------------------------------------------
// Helpers
//-----------------------------------------------------------------------------

fn derive_payment_id(env: &Env, agreement_id: u64, seq: u64, salt: u64) -> BytesN<32> {
    let mut data = Bytes::new(env);
    data.extend_from_array(&agreement_id.to_be_bytes());
    data.extend_from_array(&seq.to_be_bytes());
    data.extend_from_array(&salt.to_be_bytes());
    data.extend_from_array(&env.ledger().timestamp().to_be_bytes());
    env.crypto().sha256(&data).to_bytes()
}

/// Draws the three designated arbitrators: one from each side's pool, the
/// third from both pools combined. A side's pool is its DAO roster, its
/// fallback representative, or the platform DAO's roster for that side.
fn select_arbitrators(
    env: &Env,
    collaborators: &Collaborators,
    terms: &AgreementTerms,
) -> Result<Vec<Address>, AgreementError> {
    let worker_pool = side_pool(
        env,
        collaborators,
        &terms.worker_dao,
        &terms.worker_fallback,
        DaoSide::Worker,
    )?;
    let employer_pool = side_pool(
        env,
        collaborators,
        &terms.employer_dao,
        &terms.employer_fallback,
        DaoSide::Employer,
    )?;

    let mut combined = worker_pool.clone();
    for member in employer_pool.iter() {
        combined.push_back(member);
    }

    let mut arbitrators = Vec::new(env);
    arbitrators.push_back(draw(env, &worker_pool)?);
    arbitrators.push_back(draw(env, &employer_pool)?);
    arbitrators.push_back(draw(env, &combined)?);
    Ok(arbitrators)
}

fn side_pool(
    env: &Env,
    collaborators: &Collaborators,
    dao: &Option<Address>,
    fallback: &Option<Address>,
    side: DaoSide,
) -> Result<Vec<Address>, AgreementError> {
    if let Some(dao) = dao {
        let pool = DaoClient::new(env, dao).get_arbitrator_pool(&side);
        if !pool.is_empty() {
            return Ok(pool);
        }
    }
    if let Some(representative) = fallback {
        let mut pool = Vec::new(env);
        pool.push_back(representative.clone());
        return Ok(pool);
    }
    let pool = DaoClient::new(env, &collaborators.dao).get_arbitrator_pool(&side);
    if pool.is_empty() {
        return Err(AgreementError::NoArbitratorSource);
    }
    Ok(pool)
}

// Platform PRNG; not safe against an adversarial validator, acceptable for
// panel selection among vetted pools.
fn draw(env: &Env, pool: &Vec<Address>) -> Result<Address, AgreementError> {
    let index: u64 = env.prng().gen_range(0..pool.len() as u64);
    pool.get(index as u32)
        .ok_or(AgreementError::NoArbitratorSource)
}

fn current_seq(env: &Env, agreement_id: u64) -> Result<u64, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::PaymentSeq(agreement_id))
        .ok_or(AgreementError::AgreementNotFound)
}

fn payment_stage(env: &Env, agreement_id: u64, seq: u64) -> Result<PaymentState, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::PaymentState(agreement_id, seq))
        .ok_or(AgreementError::UnknownPaymentNumber)
}

fn expect_stage(
    env: &Env,
    agreement_id: u64,
    seq: u64,
    expected: PaymentState,
) -> Result<(), AgreementError> {
    if payment_stage(env, agreement_id, seq)? != expected {
        return Err(AgreementError::PipelineStageOutOfOrder);
    }
    Ok(())
}

fn set_payment_stage(env: &Env, agreement_id: u64, seq: u64, state: PaymentState) {
    env.storage()
        .persistent()
        .set(&StorageKey::PaymentState(agreement_id, seq), &state);
    emit_payment_stage(
        env,
        PaymentStageEvent {
            agreement_id,
            payment_number: seq,
            state,
        },
    );
}

fn load_payment_escrows(
    env: &Env,
    agreement_id: u64,
    seq: u64,
) -> Result<Vec<BytesN<32>>, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::PaymentEscrows(agreement_id, seq))
        .ok_or(AgreementError::UnknownPaymentNumber)
}

fn load_stakeholders(env: &Env, agreement_id: u64) -> Result<Stakeholders, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::Stakeholders(agreement_id))
        .ok_or(AgreementError::AgreementNotFound)
}

fn load_state(env: &Env, agreement_id: u64) -> Result<ContractState, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::State(agreement_id))
        .ok_or(AgreementError::AgreementNotFound)
}

fn load_config(env: &Env, agreement_id: u64) -> Result<PaymentConfig, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::PaymentConfig(agreement_id))
        .ok_or(AgreementError::AgreementNotFound)
}

fn load_metrics(env: &Env, agreement_id: u64) -> Result<WorkMetrics, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::Metrics(agreement_id))
        .ok_or(AgreementError::AgreementNotFound)
}

fn load_milestones(env: &Env, agreement_id: u64) -> Result<Vec<Milestone>, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::Milestones(agreement_id))
        .ok_or(AgreementError::AgreementNotFound)
}

fn load_dispute(env: &Env, agreement_id: u64) -> Result<DisputeState, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::Dispute(agreement_id))
        .ok_or(AgreementError::AgreementNotFound)
}

fn load_collaborators(env: &Env) -> Result<Collaborators, AgreementError> {
    env.storage()
        .persistent()
        .get(&StorageKey::Collaborators)
        .ok_or(AgreementError::NotInitialized)
}

fn require_worker(stakeholders: &Stakeholders, caller: &Address) -> Result<(), AgreementError> {
    if *caller != stakeholders.worker {
        return Err(AgreementError::NotWorker);
    }
    Ok(())
}

fn require_employer(stakeholders: &Stakeholders, caller: &Address) -> Result<(), AgreementError> {
    if *caller != stakeholders.employer {
        return Err(AgreementError::NotEmployer);
    }
    Ok(())
}

fn require_participant(
    stakeholders: &Stakeholders,
    caller: &Address,
) -> Result<(), AgreementError> {
    if *caller != stakeholders.worker && *caller != stakeholders.employer {
        return Err(AgreementError::NotParticipant);
    }
    Ok(())
}

fn require_arbitrator(stakeholders: &Stakeholders, caller: &Address) -> Result<(), AgreementError> {
    if !stakeholders.arbitrators.contains(caller) {
        return Err(AgreementError::NotArbitrator);
    }
    Ok(())
}
