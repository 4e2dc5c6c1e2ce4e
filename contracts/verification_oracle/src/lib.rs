#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Bytes, BytesN,
    Env, Symbol,
};

/// VerificationOracle Contract normalizing heterogeneous work proofs.
///
/// Each deployed instance adapts exactly one proof format (location, weight,
/// image, or time-clock) into the uniform `VerificationResult` shape that
/// work agreements consume. Registered operators push attestations under an
/// opaque proof key; `verify` reads and normalizes them without branching on
/// adapter internals anywhere else.
#[contract]
pub struct VerificationOracleContract;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum OracleError {
    /// Contract already initialized
    AlreadyInitialized = 1,
    /// Contract not initialized
    NotInitialized = 2,
    /// Caller is not a registered operator
    UnauthorizedOperator = 3,
    /// Caller is not the admin
    UnauthorizedAdmin = 4,
    /// No attestation stored under the proof key
    ProofNotFound = 10,
    /// An attestation already exists under the proof key
    ProofAlreadySubmitted = 11,
    /// Attestation variant does not match this adapter's kind
    ProofKindMismatch = 12,
    /// Attestation payload fails basic shape checks
    MalformedProof = 20,
}

/// The closed set of adapter kinds.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OracleKind {
    Location,
    Weight,
    Image,
    TimeClock,
    /// Employer confirmation instead of a third-party feed. Agreements with
    /// this kind never call `verify`; the kind exists so payment configs can
    /// name it.
    Manual,
}

/// Coordinates in micro-degrees, as reported by the field device.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocationProof {
    pub lat_micro: i64,
    pub lon_micro: i64,
}

/// Scale reading against the quantity the worker claimed.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WeightProof {
    pub measured_units: i128,
    pub claimed_units: i128,
}

/// Content hash of the submitted photo against the expected reference hash.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageProof {
    pub content_hash: BytesN<32>,
    pub expected_hash: BytesN<32>,
}

/// Punch-clock pair; elapsed time is normalized to whole hours.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeClockProof {
    pub clock_in: u64,
    pub clock_out: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Proof {
    Location(LocationProof),
    Weight(WeightProof),
    Image(ImageProof),
    TimeClock(TimeClockProof),
}

/// Uniform verification outcome consumed by work agreements.
///
/// `quantity` is 0 when the adapter has no quantitative opinion (location,
/// image); otherwise it is the quantity the adapter can vouch for (weighed
/// units, clocked hours).
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationResult {
    pub verified: bool,
    pub quantity: i128,
    pub data: Bytes,
}

/// Rectangular geofence for the location adapter, in micro-degrees.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SiteBounds {
    pub min_lat_micro: i64,
    pub max_lat_micro: i64,
    pub min_lon_micro: i64,
    pub max_lon_micro: i64,
}

#[contracttype]
#[derive(Clone)]
pub enum StorageKey {
    Admin,
    Kind,
    CostPerVerification,
    Operator(Address),
    Attestation(BytesN<32>),
    SiteBounds,
    /// Allowed deviation between measured and claimed units, in basis points
    WeightToleranceBps,
    Initialized,
}

pub const ATTESTED_EVENT: Symbol = symbol_short!("attested");
pub const OPERATOR_EVENT: Symbol = symbol_short!("operator");

#[contracttype]
#[derive(Clone, Debug)]
pub struct AttestationSubmittedEvent {
    pub proof_key: BytesN<32>,
    pub operator: Address,
    pub timestamp: u64,
}

const DEFAULT_WEIGHT_TOLERANCE_BPS: i128 = 500;

#[contractimpl]
impl VerificationOracleContract {
    /// Initializes the adapter with its kind and per-verification fee.
    pub fn initialize(
        env: Env,
        admin: Address,
        kind: OracleKind,
        cost_per_verification: i128,
    ) -> Result<(), OracleError> {
        admin.require_auth();

        let storage = env.storage().persistent();
        if storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(OracleError::AlreadyInitialized);
        }

        storage.set(&StorageKey::Admin, &admin);
        storage.set(&StorageKey::Kind, &kind);
        storage.set(&StorageKey::CostPerVerification, &cost_per_verification);
        storage.set(&StorageKey::WeightToleranceBps, &DEFAULT_WEIGHT_TOLERANCE_BPS);
        storage.set(&StorageKey::Initialized, &true);
        Ok(())
    }

    /// Registers an operator allowed to submit attestations.
    ///
    /// # Access Control
    /// Admin only.
    pub fn add_operator(env: Env, caller: Address, operator: Address) -> Result<(), OracleError> {
        Self::require_admin(&env, &caller)?;
        env.storage()
            .persistent()
            .set(&StorageKey::Operator(operator.clone()), &true);
        env.events()
            .publish((OPERATOR_EVENT, symbol_short!("added")), operator);
        Ok(())
    }

    /// Removes an operator.
    ///
    /// # Access Control
    /// Admin only.
    pub fn remove_operator(
        env: Env,
        caller: Address,
        operator: Address,
    ) -> Result<(), OracleError> {
        Self::require_admin(&env, &caller)?;
        env.storage()
            .persistent()
            .remove(&StorageKey::Operator(operator.clone()));
        env.events()
            .publish((OPERATOR_EVENT, symbol_short!("removed")), operator);
        Ok(())
    }

    /// Configures the geofence used by the location adapter.
    ///
    /// # Access Control
    /// Admin only.
    pub fn set_site_bounds(
        env: Env,
        caller: Address,
        bounds: SiteBounds,
    ) -> Result<(), OracleError> {
        Self::require_admin(&env, &caller)?;
        if bounds.min_lat_micro > bounds.max_lat_micro
            || bounds.min_lon_micro > bounds.max_lon_micro
        {
            return Err(OracleError::MalformedProof);
        }
        env.storage().persistent().set(&StorageKey::SiteBounds, &bounds);
        Ok(())
    }

    /// Configures the weight tolerance in basis points.
    ///
    /// # Access Control
    /// Admin only.
    pub fn set_weight_tolerance(
        env: Env,
        caller: Address,
        tolerance_bps: i128,
    ) -> Result<(), OracleError> {
        Self::require_admin(&env, &caller)?;
        env.storage()
            .persistent()
            .set(&StorageKey::WeightToleranceBps, &tolerance_bps);
        Ok(())
    }

    /// Stores an attestation under `proof_key`.
    ///
    /// The proof variant must match this adapter's kind and the key must be
    /// fresh; attestations are write-once so a verified proof can never be
    /// swapped out after the fact.
    ///
    /// # Access Control
    /// Registered operators only.
    pub fn submit_attestation(
        env: Env,
        operator: Address,
        proof_key: BytesN<32>,
        proof: Proof,
    ) -> Result<(), OracleError> {
        operator.require_auth();

        let storage = env.storage().persistent();
        if !storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(OracleError::NotInitialized);
        }
        if !storage
            .get(&StorageKey::Operator(operator.clone()))
            .unwrap_or(false)
        {
            return Err(OracleError::UnauthorizedOperator);
        }
        if storage
            .get::<_, Proof>(&StorageKey::Attestation(proof_key.clone()))
            .is_some()
        {
            return Err(OracleError::ProofAlreadySubmitted);
        }

        let kind: OracleKind = storage
            .get(&StorageKey::Kind)
            .ok_or(OracleError::NotInitialized)?;
        let matches = matches!(
            (&kind, &proof),
            (OracleKind::Location, Proof::Location(_))
                | (OracleKind::Weight, Proof::Weight(_))
                | (OracleKind::Image, Proof::Image(_))
                | (OracleKind::TimeClock, Proof::TimeClock(_))
        );
        if !matches {
            return Err(OracleError::ProofKindMismatch);
        }

        storage.set(&StorageKey::Attestation(proof_key.clone()), &proof);

        env.events().publish(
            (ATTESTED_EVENT, proof_key.clone()),
            AttestationSubmittedEvent {
                proof_key,
                operator,
                timestamp: env.ledger().timestamp(),
            },
        );
        Ok(())
    }

    /// Normalizes the attestation under `proof_key` into a uniform result.
    pub fn verify(env: Env, proof_key: BytesN<32>) -> Result<VerificationResult, OracleError> {
        let proof: Proof = env
            .storage()
            .persistent()
            .get(&StorageKey::Attestation(proof_key))
            .ok_or(OracleError::ProofNotFound)?;

        let result = match proof {
            Proof::Location(p) => Self::verify_location(&env, &p)?,
            Proof::Weight(p) => Self::verify_weight(&env, &p),
            Proof::Image(p) => VerificationResult {
                verified: p.content_hash == p.expected_hash,
                quantity: 0,
                data: Bytes::new(&env),
            },
            Proof::TimeClock(p) => Self::verify_time_clock(&env, &p)?,
        };
        Ok(result)
    }

    pub fn oracle_kind(env: Env) -> Result<OracleKind, OracleError> {
        env.storage()
            .persistent()
            .get(&StorageKey::Kind)
            .ok_or(OracleError::NotInitialized)
    }

    pub fn cost_per_verification(env: Env) -> Result<i128, OracleError> {
        env.storage()
            .persistent()
            .get(&StorageKey::CostPerVerification)
            .ok_or(OracleError::NotInitialized)
    }

    pub fn is_operator(env: Env, operator: Address) -> bool {
        env.storage()
            .persistent()
            .get(&StorageKey::Operator(operator))
            .unwrap_or(false)
    }

    // ---- internal ----

    fn require_admin(env: &Env, caller: &Address) -> Result<(), OracleError> {
        caller.require_auth();
        let admin: Address = env
            .storage()
            .persistent()
            .get(&StorageKey::Admin)
            .ok_or(OracleError::NotInitialized)?;
        if caller != &admin {
            return Err(OracleError::UnauthorizedAdmin);
        }
        Ok(())
    }

    fn verify_location(env: &Env, p: &LocationProof) -> Result<VerificationResult, OracleError> {
        let bounds: SiteBounds = env
            .storage()
            .persistent()
            .get(&StorageKey::SiteBounds)
            .ok_or(OracleError::MalformedProof)?;
        let inside = p.lat_micro >= bounds.min_lat_micro
            && p.lat_micro <= bounds.max_lat_micro
            && p.lon_micro >= bounds.min_lon_micro
            && p.lon_micro <= bounds.max_lon_micro;
        Ok(VerificationResult {
            verified: inside,
            quantity: 0,
            data: Bytes::new(env),
        })
    }

    fn verify_weight(env: &Env, p: &WeightProof) -> VerificationResult {
        let tolerance_bps: i128 = env
            .storage()
            .persistent()
            .get(&StorageKey::WeightToleranceBps)
            .unwrap_or(DEFAULT_WEIGHT_TOLERANCE_BPS);
        let deviation = if p.measured_units >= p.claimed_units {
            p.measured_units - p.claimed_units
        } else {
            p.claimed_units - p.measured_units
        };
        // claimed == 0 verifies only when measured == 0
        let within = if p.claimed_units == 0 {
            p.measured_units == 0
        } else {
            deviation * 10_000 <= p.claimed_units * tolerance_bps
        };
        VerificationResult {
            verified: within,
            quantity: p.measured_units,
            data: Bytes::new(env),
        }
    }

    fn verify_time_clock(env: &Env, p: &TimeClockProof) -> Result<VerificationResult, OracleError> {
        if p.clock_out <= p.clock_in {
            return Err(OracleError::MalformedProof);
        }
        let hours = ((p.clock_out - p.clock_in) / 3600) as i128;
        Ok(VerificationResult {
            verified: hours > 0,
            quantity: hours,
            data: Bytes::new(env),
        })
    }
}
