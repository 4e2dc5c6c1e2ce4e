use soroban_sdk::contracterror;

/// Error codes grouped in bands by kind: authorization (1-9), validation
/// (20-29), state (30-49), compliance (50-59), escrow/payment (60-69),
/// dispute (70-79). Events carry the diagnostic context (payment number,
/// failing check, dispute id) that the unit codes cannot.
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum AgreementError {
    /// Contract already initialized
    AlreadyInitialized = 1,
    /// Contract not initialized
    NotInitialized = 2,
    /// Caller is not the agreement's worker
    NotWorker = 3,
    /// Caller is not the agreement's employer
    NotEmployer = 4,
    /// Caller is neither worker nor employer
    NotParticipant = 5,
    /// Caller is not one of the three designated arbitrators
    NotArbitrator = 6,

    /// Amount must be positive
    InvalidAmount = 20,
    /// Deadline must be in the future
    InvalidDeadline = 21,
    /// No escrow identifier exists for this payment number
    UnknownPaymentNumber = 22,
    /// min/max payment bounds are inconsistent
    InvalidPaymentBounds = 23,
    /// Formation requires a nonzero employer deposit
    ZeroInitialDeposit = 24,
    /// Milestone index out of range
    MilestoneNotFound = 25,
    /// No arbitrator pool and no fallback representative for a side
    NoArbitratorSource = 26,

    /// No agreement stored under this id
    AgreementNotFound = 30,
    /// Agreement is not active
    AgreementNotActive = 31,
    /// Work already marked completed
    WorkAlreadyCompleted = 32,
    /// No job attached to the agreement
    JobNotFound = 33,
    /// Oracle-backed verification did not confirm the claim
    VerificationFailed = 34,
    /// The manual-confirmation path was not selected for this job
    ManualPathNotSelected = 35,
    /// Nothing awaits employer confirmation
    NothingToConfirm = 36,
    /// Milestone already completed
    MilestoneAlreadyCompleted = 37,
    /// Next payment is not due yet
    PaymentNotDue = 38,
    /// Pipeline stage invoked out of order for this payment number
    PipelineStageOutOfOrder = 39,
    /// Agreement deadline has passed
    DeadlinePassed = 41,

    /// Working-hours compliance check failed
    WorkingHoursViolation = 50,
    /// Minimum-wage compliance check failed
    MinimumWageViolation = 51,
    /// Rest-period compliance check failed
    RestPeriodViolation = 52,
    /// Certification compliance check failed
    CertificationMissing = 53,
    /// Employer insurance is not valid
    InsuranceInvalid = 54,

    /// Escrow record for this cycle is not in the Held state
    EscrowNotHeld = 60,
    /// Escrow balance does not cover the due amount
    EscrowInsufficient = 61,
    /// Calculated payment is zero
    PaymentCalculationZero = 62,
    /// Calculated payment falls below the configured minimum
    BelowMinimumPayment = 63,
    /// Calculated payment exceeds the configured maximum
    AboveMaximumPayment = 64,

    /// A dispute is already active on this agreement
    DisputeAlreadyActive = 70,
    /// No dispute is active on this agreement
    NoActiveDispute = 71,
    /// Arbitration has not completed a resolution yet
    DisputeNotResolved = 72,
    /// The agreement cannot close while a dispute is active
    DisputeStillActive = 73,
}
