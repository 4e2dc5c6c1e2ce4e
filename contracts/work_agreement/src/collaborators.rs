//! Narrow client interfaces to the platform's external collaborators.
//!
//! Each collaborator is addressed by `Address` and consumed through a
//! `#[contractclient]` trait, so this crate never depends on collaborator
//! implementations. The type shapes mirror the collaborators' own
//! `#[contracttype]` definitions field for field.

use soroban_sdk::{contractclient, contracttype, Address, Bytes, BytesN, Env, String, Vec};

/// Proof-format tags understood across the platform. Mirrors the
/// verification oracle's own kind enum.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OracleKind {
    Location,
    Weight,
    Image,
    TimeClock,
    /// Employer confirmation instead of a third-party feed
    Manual,
}

/// Uniform verification outcome; mirrors the oracle contract's result type.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationResult {
    pub verified: bool,
    pub quantity: i128,
    pub data: Bytes,
}

/// Escrow record status; mirrors the escrow ledger's status enum.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EscrowStatus {
    Empty,
    Held,
    Released,
    Disputed,
    Refunded,
}

/// Compliance checks the compliance collaborator can evaluate.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComplianceCheck {
    WorkingHours,
    MinimumWage,
    RestPeriods,
    Certification,
    Insurance,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityType {
    Worker,
    Employer,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScoreFactor {
    ContractCompletion,
    DisputeOutcome,
    Grievance,
}

/// Grievance lifecycle states, owned by the grievance collaborator.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrievanceStatus {
    Pending,
    InMediation,
    ResolvedSatisfactory,
    ResolvedUnsatisfactory,
    EscalatedToAuthority,
}

/// Which side's arbitrator pool to fetch from the DAO collaborator.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DaoSide {
    Worker,
    Employer,
}

#[contractclient(name = "OracleClient")]
pub trait WorkOracle {
    fn verify(env: Env, proof_key: BytesN<32>) -> VerificationResult;
    fn oracle_kind(env: Env) -> OracleKind;
    fn cost_per_verification(env: Env) -> i128;
}

#[contractclient(name = "ComplianceClient")]
pub trait Compliance {
    fn verify_compliance(env: Env, subject: Address, check: ComplianceCheck) -> bool;
    fn is_insurance_valid(env: Env, subject: Address) -> bool;
    /// Returns (regular_hours, overtime_hours) for the week starting at
    /// `week_start`.
    fn check_working_hours(env: Env, subject: Address, week_start: u64) -> (u32, u32);
}

#[contractclient(name = "ReputationClient")]
pub trait Reputation {
    fn update_score(
        env: Env,
        entity: Address,
        entity_type: EntityType,
        factor: ScoreFactor,
        score: u32,
        proof: BytesN<32>,
    );
    fn handle_dispute_outcome(env: Env, entity: Address, entity_type: EntityType, won: bool);
    fn get_score(env: Env, entity: Address, entity_type: EntityType) -> u32;
}

#[contractclient(name = "GrievanceClient")]
pub trait Grievance {
    fn file_grievance(
        env: Env,
        worker: Address,
        category: String,
        details: String,
        salt: BytesN<32>,
    ) -> u64;
    fn update_grievance_status(env: Env, id: u64, status: GrievanceStatus, updater: Address);
}

#[contractclient(name = "DaoClient")]
pub trait LaborDao {
    fn get_arbitrator_pool(env: Env, side: DaoSide) -> Vec<Address>;
}

#[contractclient(name = "EscrowClient")]
pub trait EscrowLedger {
    fn deposit(
        env: Env,
        depositor: Address,
        beneficiary: Address,
        manager: Address,
        id: BytesN<32>,
        amount: i128,
    );
    fn release(env: Env, caller: Address, id: BytesN<32>, recipient: Address, amount: i128);
    fn dispute_payment(env: Env, caller: Address, id: BytesN<32>, dispute_id: u64);
    fn emergency_release(env: Env, id: BytesN<32>);
    fn get_balance(env: Env, id: BytesN<32>) -> i128;
    fn get_status(env: Env, id: BytesN<32>) -> EscrowStatus;
}

#[contractclient(name = "ArbitrationEngineClient")]
pub trait ArbitrationEngine {
    fn create_dispute(
        env: Env,
        creator: Address,
        initiator: Address,
        respondent: Address,
        amount: i128,
    ) -> u64;
    fn get_resolution(env: Env, dispute_id: u64) -> (bool, u32);
    fn appeal_open(env: Env, dispute_id: u64) -> bool;
}
