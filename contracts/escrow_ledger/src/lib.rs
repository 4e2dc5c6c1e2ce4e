#![no_std]

#[cfg(test)]
extern crate std;

use soroban_sdk::{
    contract, contractclient, contracterror, contractimpl, contracttype, symbol_short, Address,
    BytesN, Env, Map, Symbol,
};

/// EscrowLedger Contract holding and releasing funds per payment identifier.
///
/// Each deposit creates an independent record keyed by an opaque 32-byte
/// identifier; identifiers are single-use. Funds leave a record through an
/// approved release, a timeout release, a manager release, a refund, or — for
/// disputed records — an arbitration-backed emergency release. A disputed
/// record is frozen for every other path.
///
/// # Security Model
///
/// - Identifier reuse is rejected, so a record's held amount only decreases
///   after the first deposit
/// - Release requires depositor approval, an elapsed release timeout, or the
///   record's registered manager contract; outside the manager path only a
///   record party may call and only the beneficiary may receive
/// - A failed token transfer traps the invocation, so balances never show a
///   release that did not move funds
/// - All state changes emit events for auditability
#[contract]
pub struct EscrowLedgerContract;

/// Narrow view of the arbitration engine, resolved by address at
/// emergency-release time.
#[contractclient(name = "ArbitrationClient")]
pub trait ArbitrationResolution {
    fn get_resolution(env: Env, dispute_id: u64) -> (bool, u32);
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum EscrowError {
    /// Contract already initialized
    AlreadyInitialized = 1,
    /// Contract not initialized
    NotInitialized = 2,
    /// Caller may not move funds for this record
    UnauthorizedRelease = 3,
    /// Caller is not the record's depositor
    NotDepositor = 4,
    /// Caller is not a party to this record
    NotRecordParty = 5,
    /// Amount must be positive
    InvalidAmount = 20,
    /// No record stored under this identifier
    RecordNotFound = 30,
    /// Identifier already carries a deposit
    IdentifierReused = 31,
    /// Record is not in the Held state
    NotHeld = 32,
    /// Record is frozen by an active dispute
    RecordDisputed = 33,
    /// Record is not disputed
    NotDisputed = 34,
    /// Requested amount exceeds the held balance
    InsufficientBalance = 40,
    /// Release timeout has not elapsed
    TimeoutNotReached = 41,
    /// Dispute window has closed
    DisputeWindowClosed = 42,
    /// An approved release already occurred; refund is off the table
    ReleaseOccurred = 43,
    /// Arbitration has not completed a resolution for this record
    DisputeNotResolved = 50,
    /// Disputed record carries no arbitration dispute id
    DisputeNotLinked = 51,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EscrowStatus {
    Empty,
    Held,
    Released,
    Disputed,
    Refunded,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct EscrowRecord {
    /// Currently held balance; only decreases after the deposit
    pub amount: i128,
    pub depositor: Address,
    pub beneficiary: Address,
    /// Contract allowed to release without depositor approval
    pub manager: Address,
    pub deposit_time: u64,
    pub status: EscrowStatus,
    pub is_disputed: bool,
    pub dispute_id: Option<u64>,
    pub total_deposited: i128,
    pub total_released: i128,
    pub total_refunded: i128,
}

#[contracttype]
#[derive(Clone)]
pub enum StorageKey {
    Admin,
    Token,
    Arbitration,
    ReleaseTimeout,
    DisputeWindow,
    Initialized,
    Record(BytesN<32>),
    /// Per-approver approval set for a record
    Approvals(BytesN<32>),
}

pub const DEPOSIT_EVENT: Symbol = symbol_short!("deposit");
pub const RELEASE_EVENT: Symbol = symbol_short!("release");
pub const DISPUTE_EVENT: Symbol = symbol_short!("disputed");
pub const REFUND_EVENT: Symbol = symbol_short!("refund");
pub const EMERGENCY_EVENT: Symbol = symbol_short!("emergency");
pub const APPROVAL_EVENT: Symbol = symbol_short!("approval");

#[contracttype]
#[derive(Clone, Debug)]
pub struct DepositEvent {
    pub id: BytesN<32>,
    pub depositor: Address,
    pub beneficiary: Address,
    pub amount: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct ReleaseEvent {
    pub id: BytesN<32>,
    pub recipient: Address,
    pub amount: i128,
    pub remaining: i128,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct DisputedEvent {
    pub id: BytesN<32>,
    pub dispute_id: u64,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct RefundEvent {
    pub id: BytesN<32>,
    pub depositor: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct EmergencyReleaseEvent {
    pub id: BytesN<32>,
    pub dispute_id: u64,
    pub resolution: u32,
    pub beneficiary_amount: i128,
    pub depositor_amount: i128,
}

#[contractimpl]
impl EscrowLedgerContract {
    /// Initializes the ledger with its token, arbitration engine, and timing
    /// windows.
    pub fn initialize(
        env: Env,
        admin: Address,
        token: Address,
        arbitration: Address,
        release_timeout: u64,
        dispute_window: u64,
    ) -> Result<(), EscrowError> {
        admin.require_auth();

        let storage = env.storage().persistent();
        if storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(EscrowError::AlreadyInitialized);
        }

        storage.set(&StorageKey::Admin, &admin);
        storage.set(&StorageKey::Token, &token);
        storage.set(&StorageKey::Arbitration, &arbitration);
        storage.set(&StorageKey::ReleaseTimeout, &release_timeout);
        storage.set(&StorageKey::DisputeWindow, &dispute_window);
        storage.set(&StorageKey::Initialized, &true);
        Ok(())
    }

    /// Deposits funds under a fresh identifier.
    ///
    /// # Arguments
    /// * `depositor` - Funding party (must authenticate)
    /// * `beneficiary` - Counterparty receiving released funds
    /// * `manager` - Contract allowed to release without depositor approval
    /// * `id` - Opaque single-use payment identifier
    /// * `amount` - Deposit amount; must be positive
    pub fn deposit(
        env: Env,
        depositor: Address,
        beneficiary: Address,
        manager: Address,
        id: BytesN<32>,
        amount: i128,
    ) -> Result<(), EscrowError> {
        depositor.require_auth();

        let storage = env.storage().persistent();
        if !storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(EscrowError::NotInitialized);
        }
        if amount <= 0 {
            return Err(EscrowError::InvalidAmount);
        }
        if storage
            .get::<_, EscrowRecord>(&StorageKey::Record(id.clone()))
            .is_some()
        {
            return Err(EscrowError::IdentifierReused);
        }

        let token: Address = storage
            .get(&StorageKey::Token)
            .ok_or(EscrowError::NotInitialized)?;
        soroban_sdk::token::Client::new(&env, &token).transfer(
            &depositor,
            &env.current_contract_address(),
            &amount,
        );

        let now = env.ledger().timestamp();
        let record = EscrowRecord {
            amount,
            depositor: depositor.clone(),
            beneficiary: beneficiary.clone(),
            manager,
            deposit_time: now,
            status: EscrowStatus::Held,
            is_disputed: false,
            dispute_id: None,
            total_deposited: amount,
            total_released: 0,
            total_refunded: 0,
        };
        storage.set(&StorageKey::Record(id.clone()), &record);
        storage.set(&StorageKey::Approvals(id.clone()), &Map::<Address, bool>::new(&env));

        env.events().publish(
            (DEPOSIT_EVENT, id.clone()),
            DepositEvent {
                id,
                depositor,
                beneficiary,
                amount,
                timestamp: now,
            },
        );
        Ok(())
    }

    /// Sets the caller's approval flag on a record. A release authorized by
    /// approval specifically requires the depositor's flag.
    pub fn approve_release(env: Env, approver: Address, id: BytesN<32>) -> Result<(), EscrowError> {
        approver.require_auth();

        let storage = env.storage().persistent();
        storage
            .get::<_, EscrowRecord>(&StorageKey::Record(id.clone()))
            .ok_or(EscrowError::RecordNotFound)?;

        let mut approvals: Map<Address, bool> = storage
            .get(&StorageKey::Approvals(id.clone()))
            .unwrap_or(Map::new(&env));
        approvals.set(approver.clone(), true);
        storage.set(&StorageKey::Approvals(id.clone()), &approvals);

        env.events().publish((APPROVAL_EVENT, id), approver);
        Ok(())
    }

    /// Releases part or all of a held balance.
    ///
    /// The record's manager contract may release to any recipient. The other
    /// two paths are party-bound: a record party (depositor or beneficiary)
    /// may release to the beneficiary once the depositor approved or the
    /// release timeout elapsed (anti-griefing: funds can never be stuck
    /// forever). Disputed records are frozen.
    pub fn release(
        env: Env,
        caller: Address,
        id: BytesN<32>,
        recipient: Address,
        amount: i128,
    ) -> Result<(), EscrowError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let mut record: EscrowRecord = storage
            .get(&StorageKey::Record(id.clone()))
            .ok_or(EscrowError::RecordNotFound)?;
        if record.is_disputed {
            return Err(EscrowError::RecordDisputed);
        }
        if record.status != EscrowStatus::Held {
            return Err(EscrowError::NotHeld);
        }
        if amount <= 0 {
            return Err(EscrowError::InvalidAmount);
        }
        if amount > record.amount {
            return Err(EscrowError::InsufficientBalance);
        }

        if caller != record.manager {
            if caller != record.depositor && caller != record.beneficiary {
                return Err(EscrowError::NotRecordParty);
            }
            if recipient != record.beneficiary {
                return Err(EscrowError::UnauthorizedRelease);
            }
            let approvals: Map<Address, bool> = storage
                .get(&StorageKey::Approvals(id.clone()))
                .unwrap_or(Map::new(&env));
            let approved = approvals.get(record.depositor.clone()).unwrap_or(false);
            let timeout: u64 = storage
                .get(&StorageKey::ReleaseTimeout)
                .ok_or(EscrowError::NotInitialized)?;
            let timed_out = env.ledger().timestamp() >= record.deposit_time + timeout;
            if !approved && !timed_out {
                return Err(EscrowError::UnauthorizedRelease);
            }
        }

        let token: Address = storage
            .get(&StorageKey::Token)
            .ok_or(EscrowError::NotInitialized)?;
        soroban_sdk::token::Client::new(&env, &token).transfer(
            &env.current_contract_address(),
            &recipient,
            &amount,
        );

        record.amount -= amount;
        record.total_released += amount;
        if record.amount == 0 {
            record.status = EscrowStatus::Released;
        }
        storage.set(&StorageKey::Record(id.clone()), &record);

        env.events().publish(
            (RELEASE_EVENT, id.clone()),
            ReleaseEvent {
                id,
                recipient,
                amount,
                remaining: record.amount,
            },
        );
        Ok(())
    }

    /// Flags a record disputed and links it to an arbitration case, freezing
    /// every release path until `emergency_release`.
    ///
    /// Only allowed within the dispute window after the deposit, and only by
    /// a party to the record (depositor, beneficiary, or manager).
    pub fn dispute_payment(
        env: Env,
        caller: Address,
        id: BytesN<32>,
        dispute_id: u64,
    ) -> Result<(), EscrowError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let mut record: EscrowRecord = storage
            .get(&StorageKey::Record(id.clone()))
            .ok_or(EscrowError::RecordNotFound)?;
        if caller != record.depositor && caller != record.beneficiary && caller != record.manager {
            return Err(EscrowError::NotRecordParty);
        }
        if record.status != EscrowStatus::Held {
            return Err(EscrowError::NotHeld);
        }

        let window: u64 = storage
            .get(&StorageKey::DisputeWindow)
            .ok_or(EscrowError::NotInitialized)?;
        if env.ledger().timestamp() > record.deposit_time + window {
            return Err(EscrowError::DisputeWindowClosed);
        }

        record.is_disputed = true;
        record.status = EscrowStatus::Disputed;
        record.dispute_id = Some(dispute_id);
        storage.set(&StorageKey::Record(id.clone()), &record);

        env.events()
            .publish((DISPUTE_EVENT, id.clone()), DisputedEvent { id, dispute_id });
        Ok(())
    }

    /// Refunds the remaining balance to the depositor.
    ///
    /// Depositor only, after the release timeout, and only when no approved
    /// release has occurred.
    pub fn refund(env: Env, caller: Address, id: BytesN<32>) -> Result<(), EscrowError> {
        caller.require_auth();

        let storage = env.storage().persistent();
        let mut record: EscrowRecord = storage
            .get(&StorageKey::Record(id.clone()))
            .ok_or(EscrowError::RecordNotFound)?;
        if caller != record.depositor {
            return Err(EscrowError::NotDepositor);
        }
        if record.is_disputed {
            return Err(EscrowError::RecordDisputed);
        }
        if record.status != EscrowStatus::Held {
            return Err(EscrowError::NotHeld);
        }

        let timeout: u64 = storage
            .get(&StorageKey::ReleaseTimeout)
            .ok_or(EscrowError::NotInitialized)?;
        if env.ledger().timestamp() < record.deposit_time + timeout {
            return Err(EscrowError::TimeoutNotReached);
        }
        if record.total_released > 0 {
            return Err(EscrowError::ReleaseOccurred);
        }
        let approvals: Map<Address, bool> = storage
            .get(&StorageKey::Approvals(id.clone()))
            .unwrap_or(Map::new(&env));
        if approvals.get(record.depositor.clone()).unwrap_or(false) {
            return Err(EscrowError::ReleaseOccurred);
        }

        let amount = record.amount;
        let token: Address = storage
            .get(&StorageKey::Token)
            .ok_or(EscrowError::NotInitialized)?;
        soroban_sdk::token::Client::new(&env, &token).transfer(
            &env.current_contract_address(),
            &record.depositor,
            &amount,
        );

        record.amount = 0;
        record.total_refunded += amount;
        record.status = EscrowStatus::Refunded;
        storage.set(&StorageKey::Record(id.clone()), &record);

        env.events().publish(
            (REFUND_EVENT, id.clone()),
            RefundEvent {
                id,
                depositor: record.depositor,
                amount,
            },
        );
        Ok(())
    }

    /// The sole exit from the Disputed state: splits the held balance per
    /// the arbitration engine's completed resolution (0-100 = beneficiary
    /// share) and marks the record Released. Callable by anyone once the
    /// resolution is complete.
    pub fn emergency_release(env: Env, id: BytesN<32>) -> Result<(), EscrowError> {
        let storage = env.storage().persistent();
        let mut record: EscrowRecord = storage
            .get(&StorageKey::Record(id.clone()))
            .ok_or(EscrowError::RecordNotFound)?;
        if !record.is_disputed {
            return Err(EscrowError::NotDisputed);
        }
        let dispute_id = record.dispute_id.ok_or(EscrowError::DisputeNotLinked)?;

        let arbitration: Address = storage
            .get(&StorageKey::Arbitration)
            .ok_or(EscrowError::NotInitialized)?;
        let (complete, resolution) =
            ArbitrationClient::new(&env, &arbitration).get_resolution(&dispute_id);
        if !complete {
            return Err(EscrowError::DisputeNotResolved);
        }

        let balance = record.amount;
        let beneficiary_amount = balance * resolution as i128 / 100;
        let depositor_amount = balance - beneficiary_amount;

        let token: Address = storage
            .get(&StorageKey::Token)
            .ok_or(EscrowError::NotInitialized)?;
        let token_client = soroban_sdk::token::Client::new(&env, &token);
        if beneficiary_amount > 0 {
            token_client.transfer(
                &env.current_contract_address(),
                &record.beneficiary,
                &beneficiary_amount,
            );
        }
        if depositor_amount > 0 {
            token_client.transfer(
                &env.current_contract_address(),
                &record.depositor,
                &depositor_amount,
            );
        }

        record.amount = 0;
        record.total_released += beneficiary_amount;
        record.total_refunded += depositor_amount;
        record.is_disputed = false;
        record.status = EscrowStatus::Released;
        storage.set(&StorageKey::Record(id.clone()), &record);

        env.events().publish(
            (EMERGENCY_EVENT, id.clone()),
            EmergencyReleaseEvent {
                id,
                dispute_id,
                resolution,
                beneficiary_amount,
                depositor_amount,
            },
        );
        Ok(())
    }

    // ---- read-only ----

    pub fn get_record(env: Env, id: BytesN<32>) -> Option<EscrowRecord> {
        env.storage().persistent().get(&StorageKey::Record(id))
    }

    pub fn get_balance(env: Env, id: BytesN<32>) -> i128 {
        env.storage()
            .persistent()
            .get::<_, EscrowRecord>(&StorageKey::Record(id))
            .map(|r| r.amount)
            .unwrap_or(0)
    }

    pub fn get_status(env: Env, id: BytesN<32>) -> EscrowStatus {
        env.storage()
            .persistent()
            .get::<_, EscrowRecord>(&StorageKey::Record(id))
            .map(|r| r.status)
            .unwrap_or(EscrowStatus::Empty)
    }
}
