use soroban_sdk::{contracttype, Address, String, Vec};

use crate::collaborators::{ComplianceCheck, OracleKind};

/// Coarse lifecycle states for a work agreement
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AgreementStatus {
    /// Work may be recorded and payments processed
    Active,
    /// Terminal: all obligations met
    Completed,
    /// Terminal: ended early
    Terminated,
}

/// Forward-only lifecycle of one payment cycle. A sequence number's state
/// advances through these in order and never skips or regresses. `Settled`
/// is the terminal marker for a cycle whose escrow was consumed by a dispute
/// split instead of a release.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PaymentState {
    Pending,
    ComplianceVerified,
    CalculationVerified,
    EscrowChecked,
    Completed,
    Settled,
}

/// The strategy family: selected once at formation, never re-dispatched by
/// ad hoc tag comparison at call sites
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PaymentType {
    PieceRate,
    TimeBased,
    MilestoneBased,
    Custom,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct Stakeholders {
    pub worker: Address,
    pub employer: Address,
    pub worker_dao: Option<Address>,
    pub employer_dao: Option<Address>,
    /// Used for arbitrator selection when the matching DAO body is absent
    pub worker_fallback: Option<Address>,
    pub employer_fallback: Option<Address>,
    /// The three designated arbitrators drawn at formation
    pub arbitrators: Vec<Address>,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct ContractState {
    pub status: AgreementStatus,
    pub is_active: bool,
    pub work_completed: bool,
    pub quality_verified: bool,
    pub start_time: u64,
    pub completion_time: Option<u64>,
    pub deadline: u64,
}

/// The current unit of work and how it gets verified
#[contracttype]
#[derive(Clone, Debug)]
pub struct Job {
    pub description: String,
    pub oracle: Option<Address>,
    /// Explicitly selected employer-confirmation path instead of an oracle
    pub manual_confirmation: bool,
    pub verified: bool,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct DisputeState {
    pub is_active: bool,
    /// Mirrored from the arbitration engine by `sync_dispute`
    pub appeal_active: bool,
    pub active_dispute_id: Option<u64>,
    pub dispute_deadline: u64,
    pub disputed_payment: Option<u64>,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub payment_type: PaymentType,
    pub oracle_kind: OracleKind,
    pub oracle: Option<Address>,
    /// Custom policy only: second confirmation source
    pub secondary_oracle: Option<Address>,
    /// Custom policy only: require both oracles to confirm independently
    pub require_both: bool,
    /// Payment interval in seconds
    pub interval: u64,
    pub base_rate: i128,
    pub min_payment: i128,
    pub max_payment: i128,
    pub next_payment_due: u64,
    pub total_paid: i128,
}

/// Accumulated work since formation, with consumed-watermark counters so an
/// already-paid unit or hour is never counted twice
#[contracttype]
#[derive(Clone, Debug)]
pub struct WorkMetrics {
    pub units_completed: i128,
    pub units_paid: i128,
    pub hours_worked: i128,
    pub hours_paid: i128,
    /// Manually recorded work awaiting employer confirmation
    pub pending_manual: i128,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct Milestone {
    pub description: String,
    pub amount: i128,
    /// Milestone verification dispatches on this kind, not the agreement's
    pub oracle_kind: OracleKind,
    pub oracle: Option<Address>,
    pub completed: bool,
    pub paid: bool,
}

/// External collaborator addresses, resolved at initialization
#[contracttype]
#[derive(Clone, Debug)]
pub struct Collaborators {
    pub escrow: Address,
    pub arbitration: Address,
    pub compliance: Address,
    pub reputation: Address,
    pub grievance: Address,
    pub dao: Address,
}

/// Formation parameters for a new agreement
#[contracttype]
#[derive(Clone, Debug)]
pub struct AgreementTerms {
    pub worker: Address,
    pub worker_dao: Option<Address>,
    pub employer_dao: Option<Address>,
    pub worker_fallback: Option<Address>,
    pub employer_fallback: Option<Address>,
    pub deadline: u64,
    pub payment_type: PaymentType,
    pub oracle_kind: OracleKind,
    pub oracle: Option<Address>,
    pub secondary_oracle: Option<Address>,
    pub require_both: bool,
    pub interval: u64,
    pub base_rate: i128,
    pub min_payment: i128,
    pub max_payment: i128,
    pub required_checks: Vec<ComplianceCheck>,
    pub max_weekly_hours: u32,
    pub initial_deposit: i128,
}

/// Storage keys
#[contracttype]
#[derive(Clone)]
pub enum StorageKey {
    Admin,
    Initialized,
    Collaborators,
    /// Voting window mirrored from the arbitration engine's configuration
    DisputeVotingPeriod,
    NextAgreementId,
    Stakeholders(u64),
    State(u64),
    Job(u64),
    Dispute(u64),
    PaymentConfig(u64),
    Metrics(u64),
    Milestones(u64),
    RequiredChecks(u64),
    MaxWeeklyHours(u64),
    /// Current payment sequence number per agreement
    PaymentSeq(u64),
    /// Escrow identifiers funding a (agreement, sequence number) cycle, in
    /// deposit order; top-up deposits append
    PaymentEscrows(u64, u64),
    /// Pipeline checkpoint per (agreement, sequence number)
    PaymentState(u64, u64),
    /// Due amount computed at the calculation gate, consumed at release
    PaymentDue(u64, u64),
}
