//-----------------------------------------------------------------------------
// Events
//-----------------------------------------------------------------------------

use soroban_sdk::{contracttype, symbol_short, Address, Env, Symbol};

use crate::storage::PaymentState;

/// Event emitted when an agreement is formed
pub const AGREEMENT_CREATED_EVENT: Symbol = symbol_short!("agr_crt");

/// Event emitted when an agreement reaches a terminal state
pub const AGREEMENT_CLOSED_EVENT: Symbol = symbol_short!("agr_cls");

pub const JOB_CREATED_EVENT: Symbol = symbol_short!("job_crt");
pub const JOB_VERIFIED_EVENT: Symbol = symbol_short!("job_ver");

pub const WORK_RECORDED_EVENT: Symbol = symbol_short!("work_rec");
pub const WORK_CONFIRMED_EVENT: Symbol = symbol_short!("work_cnf");

pub const MILESTONE_ADDED_EVENT: Symbol = symbol_short!("mls_add");
pub const MILESTONE_DONE_EVENT: Symbol = symbol_short!("mls_done");

/// Payment pipeline stage checkpoints
pub const PAYMENT_STAGE_EVENT: Symbol = symbol_short!("pay_stg");
pub const PAYMENT_DONE_EVENT: Symbol = symbol_short!("pay_done");
pub const CYCLE_FUNDED_EVENT: Symbol = symbol_short!("cyc_fund");

pub const DISPUTE_RAISED_EVENT: Symbol = symbol_short!("dsp_rais");
pub const DISPUTE_SETTLED_EVENT: Symbol = symbol_short!("dsp_setl");

pub const GRIEVANCE_FILED_EVENT: Symbol = symbol_short!("grv_file");

#[contracttype]
#[derive(Clone, Debug)]
pub struct AgreementCreatedEvent {
    pub agreement_id: u64,
    pub worker: Address,
    pub employer: Address,
    pub initial_deposit: i128,
    pub deadline: u64,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct AgreementClosedEvent {
    pub agreement_id: u64,
    pub completed: bool,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct WorkRecordedEvent {
    pub agreement_id: u64,
    pub worker: Address,
    pub amount: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct PaymentStageEvent {
    pub agreement_id: u64,
    pub payment_number: u64,
    pub state: PaymentState,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct PaymentCompletedEvent {
    pub agreement_id: u64,
    pub payment_number: u64,
    pub amount: i128,
    pub total_paid: i128,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct CycleFundedEvent {
    pub agreement_id: u64,
    pub payment_number: u64,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct DisputeRaisedEvent {
    pub agreement_id: u64,
    pub payment_number: u64,
    pub dispute_id: u64,
    pub initiator: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct DisputeSettledEvent {
    pub agreement_id: u64,
    pub dispute_id: u64,
    pub resolution: u32,
    pub worker_won: bool,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct GrievanceFiledEvent {
    pub agreement_id: u64,
    pub grievance_id: u64,
    pub worker: Address,
}

pub fn emit_agreement_created(env: &Env, event: AgreementCreatedEvent) {
    env.events()
        .publish((AGREEMENT_CREATED_EVENT, event.agreement_id), event);
}

pub fn emit_agreement_closed(env: &Env, event: AgreementClosedEvent) {
    env.events()
        .publish((AGREEMENT_CLOSED_EVENT, event.agreement_id), event);
}

pub fn emit_work_recorded(env: &Env, event: WorkRecordedEvent) {
    env.events()
        .publish((WORK_RECORDED_EVENT, event.agreement_id), event);
}

pub fn emit_payment_stage(env: &Env, event: PaymentStageEvent) {
    env.events()
        .publish((PAYMENT_STAGE_EVENT, event.agreement_id), event);
}

pub fn emit_payment_completed(env: &Env, event: PaymentCompletedEvent) {
    env.events()
        .publish((PAYMENT_DONE_EVENT, event.agreement_id), event);
}

pub fn emit_cycle_funded(env: &Env, event: CycleFundedEvent) {
    env.events()
        .publish((CYCLE_FUNDED_EVENT, event.agreement_id), event);
}

pub fn emit_dispute_raised(env: &Env, event: DisputeRaisedEvent) {
    env.events()
        .publish((DISPUTE_RAISED_EVENT, event.agreement_id), event);
}

pub fn emit_dispute_settled(env: &Env, event: DisputeSettledEvent) {
    env.events()
        .publish((DISPUTE_SETTLED_EVENT, event.agreement_id), event);
}

pub fn emit_grievance_filed(env: &Env, event: GrievanceFiledEvent) {
    env.events()
        .publish((GRIEVANCE_FILED_EVENT, event.agreement_id), event);
}
