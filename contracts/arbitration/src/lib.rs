#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Env, Map, Symbol,
    Vec,
};

/// Arbitration Contract collecting weighted votes over disputed payments.
///
/// Disputes are keyed by a monotonically increasing counter, so two disputes
/// between the same parties for the same amount in the same ledger can never
/// collide. Every active arbitrator may cast one vote per dispute on a 0-100
/// scale (the beneficiary's share of the contested funds); resolution fires
/// automatically at quorum or on demand after the voting deadline.
#[contract]
pub struct ArbitrationContract;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ArbitrationError {
    /// Contract already initialized
    AlreadyInitialized = 1,
    /// Contract not initialized
    NotInitialized = 2,
    /// Caller is not the admin
    UnauthorizedAdmin = 3,
    /// Caller is not an active arbitrator
    NotArbitrator = 4,
    /// Caller is neither initiator nor respondent
    NotDisputeParty = 5,
    /// Vote outside the 0-100 scale
    InvalidVote = 20,
    /// Contested amount must be positive
    InvalidAmount = 21,
    /// No dispute stored under this id
    DisputeNotFound = 30,
    /// An open dispute between these parties for this amount already exists
    DisputeAlreadyExists = 31,
    /// Arbitrator already voted on this dispute
    AlreadyVoted = 32,
    /// Voting deadline has passed
    VotingClosed = 33,
    /// Neither quorum nor the deadline has been reached
    VotingStillOpen = 34,
    /// Resolution requires at least one cast vote
    NoVotesCast = 35,
    /// Dispute is not in the Resolved state
    NotResolved = 36,
    /// A dispute may be appealed at most once
    AlreadyAppealed = 37,
    /// Dispute is not accepting votes
    NotVoting = 38,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisputeStatus {
    Pending,
    Voting,
    Resolved,
    Appealed,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct Dispute {
    pub id: u64,
    pub initiator: Address,
    pub respondent: Address,
    pub amount: i128,
    pub status: DisputeStatus,
    pub vote_count: u32,
    pub created_at: u64,
    pub voting_deadline: u64,
    pub resolved_at: Option<u64>,
    /// Beneficiary share 0-100, meaningful once status is Resolved
    pub resolution: u32,
    pub appealed: bool,
}

/// Derived, read-only performance counters per arbitrator.
#[contracttype]
#[derive(Clone, Debug, Default)]
pub struct ArbitratorStats {
    pub cases_handled: u64,
    pub total_resolution_time: u64,
    pub appeals_against: u64,
}

#[contracttype]
#[derive(Clone)]
pub enum StorageKey {
    Admin,
    Initialized,
    /// Minimum cast votes that trigger automatic resolution
    MinVotes,
    /// Voting window in seconds
    VotingPeriod,
    NextDisputeId,
    Dispute(u64),
    /// Cast votes per dispute: arbitrator -> 0..=100
    Votes(u64),
    /// Live arbitrator roster
    Roster,
    IsArbitrator(Address),
    Stats(Address),
    /// Duplicate-open-dispute guard: (initiator, respondent, amount) -> id
    OpenDispute(Address, Address, i128),
}

pub const DISPUTE_EVENT: Symbol = symbol_short!("dispute");
pub const VOTE_EVENT: Symbol = symbol_short!("vote");
pub const RESOLVED_EVENT: Symbol = symbol_short!("resolved");
pub const APPEALED_EVENT: Symbol = symbol_short!("appealed");
pub const ROSTER_EVENT: Symbol = symbol_short!("roster");

#[contracttype]
#[derive(Clone, Debug)]
pub struct DisputeCreatedEvent {
    pub dispute_id: u64,
    pub initiator: Address,
    pub respondent: Address,
    pub amount: i128,
    pub voting_deadline: u64,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct VoteCastEvent {
    pub dispute_id: u64,
    pub arbitrator: Address,
    pub vote: u32,
    pub vote_count: u32,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct DisputeResolvedEvent {
    pub dispute_id: u64,
    pub resolution: u32,
    pub votes_counted: u32,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct DisputeAppealedEvent {
    pub dispute_id: u64,
    pub appellant: Address,
    pub new_voting_deadline: u64,
}

#[contractimpl]
impl ArbitrationContract {
    /// Initializes the engine with its quorum and voting window.
    pub fn initialize(
        env: Env,
        admin: Address,
        min_votes: u32,
        voting_period: u64,
    ) -> Result<(), ArbitrationError> {
        admin.require_auth();

        let storage = env.storage().persistent();
        if storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(ArbitrationError::AlreadyInitialized);
        }

        storage.set(&StorageKey::Admin, &admin);
        storage.set(&StorageKey::MinVotes, &min_votes);
        storage.set(&StorageKey::VotingPeriod, &voting_period);
        storage.set(&StorageKey::NextDisputeId, &0u64);
        storage.set(&StorageKey::Roster, &Vec::<Address>::new(&env));
        storage.set(&StorageKey::Initialized, &true);
        Ok(())
    }

    /// Adds an arbitrator to the active roster.
    ///
    /// # Access Control
    /// Admin only.
    pub fn add_arbitrator(
        env: Env,
        caller: Address,
        arbitrator: Address,
    ) -> Result<(), ArbitrationError> {
        Self::require_admin(&env, &caller)?;

        let storage = env.storage().persistent();
        if storage
            .get(&StorageKey::IsArbitrator(arbitrator.clone()))
            .unwrap_or(false)
        {
            return Ok(());
        }
        let mut roster: Vec<Address> = storage
            .get(&StorageKey::Roster)
            .unwrap_or(Vec::new(&env));
        roster.push_back(arbitrator.clone());
        storage.set(&StorageKey::Roster, &roster);
        storage.set(&StorageKey::IsArbitrator(arbitrator.clone()), &true);

        env.events()
            .publish((ROSTER_EVENT, symbol_short!("added")), arbitrator);
        Ok(())
    }

    /// Removes an arbitrator from the active roster. Votes already cast by a
    /// removed arbitrator stop counting at resolution time.
    ///
    /// # Access Control
    /// Admin only.
    pub fn remove_arbitrator(
        env: Env,
        caller: Address,
        arbitrator: Address,
    ) -> Result<(), ArbitrationError> {
        Self::require_admin(&env, &caller)?;

        let storage = env.storage().persistent();
        let roster: Vec<Address> = storage
            .get(&StorageKey::Roster)
            .unwrap_or(Vec::new(&env));
        let mut updated = Vec::new(&env);
        for member in roster.iter() {
            if member != arbitrator {
                updated.push_back(member);
            }
        }
        storage.set(&StorageKey::Roster, &updated);
        storage.set(&StorageKey::IsArbitrator(arbitrator.clone()), &false);

        env.events()
            .publish((ROSTER_EVENT, symbol_short!("removed")), arbitrator);
        Ok(())
    }

    /// Opens a dispute and starts its voting window.
    ///
    /// # Arguments
    /// * `creator` - The caller opening the case, typically a work agreement
    ///   contract (must authenticate)
    /// * `initiator` / `respondent` - The disputing parties
    /// * `amount` - The contested amount
    ///
    /// # Returns
    /// The new dispute id.
    pub fn create_dispute(
        env: Env,
        creator: Address,
        initiator: Address,
        respondent: Address,
        amount: i128,
    ) -> Result<u64, ArbitrationError> {
        creator.require_auth();

        let storage = env.storage().persistent();
        if !storage.get(&StorageKey::Initialized).unwrap_or(false) {
            return Err(ArbitrationError::NotInitialized);
        }
        if amount <= 0 {
            return Err(ArbitrationError::InvalidAmount);
        }

        let guard_key =
            StorageKey::OpenDispute(initiator.clone(), respondent.clone(), amount);
        if storage.get::<_, u64>(&guard_key).is_some() {
            return Err(ArbitrationError::DisputeAlreadyExists);
        }

        let dispute_id: u64 = storage.get(&StorageKey::NextDisputeId).unwrap_or(0);
        storage.set(&StorageKey::NextDisputeId, &(dispute_id + 1));

        let voting_period: u64 = storage
            .get(&StorageKey::VotingPeriod)
            .ok_or(ArbitrationError::NotInitialized)?;
        let now = env.ledger().timestamp();
        let dispute = Dispute {
            id: dispute_id,
            initiator: initiator.clone(),
            respondent: respondent.clone(),
            amount,
            status: DisputeStatus::Voting,
            vote_count: 0,
            created_at: now,
            voting_deadline: now + voting_period,
            resolved_at: None,
            resolution: 0,
            appealed: false,
        };
        storage.set(&StorageKey::Dispute(dispute_id), &dispute);
        storage.set(&StorageKey::Votes(dispute_id), &Map::<Address, u32>::new(&env));
        storage.set(&guard_key, &dispute_id);

        env.events().publish(
            (DISPUTE_EVENT, dispute_id),
            DisputeCreatedEvent {
                dispute_id,
                initiator,
                respondent,
                amount,
                voting_deadline: dispute.voting_deadline,
            },
        );
        Ok(dispute_id)
    }

    /// Casts a vote on an open dispute.
    ///
    /// The vote is the share (0-100) of the contested funds that should go
    /// to the dispute's beneficiary side. One vote per arbitrator per
    /// dispute; reaching quorum resolves the dispute in the same call.
    ///
    /// # Access Control
    /// Active arbitrators only.
    pub fn submit_vote(
        env: Env,
        arbitrator: Address,
        dispute_id: u64,
        vote: u32,
    ) -> Result<(), ArbitrationError> {
        arbitrator.require_auth();

        let storage = env.storage().persistent();
        if !storage
            .get(&StorageKey::IsArbitrator(arbitrator.clone()))
            .unwrap_or(false)
        {
            return Err(ArbitrationError::NotArbitrator);
        }
        if vote > 100 {
            return Err(ArbitrationError::InvalidVote);
        }

        let mut dispute: Dispute = storage
            .get(&StorageKey::Dispute(dispute_id))
            .ok_or(ArbitrationError::DisputeNotFound)?;
        if !Self::accepts_votes(dispute.status) {
            return Err(ArbitrationError::NotVoting);
        }
        if env.ledger().timestamp() > dispute.voting_deadline {
            return Err(ArbitrationError::VotingClosed);
        }

        let mut votes: Map<Address, u32> = storage
            .get(&StorageKey::Votes(dispute_id))
            .unwrap_or(Map::new(&env));
        if votes.contains_key(arbitrator.clone()) {
            return Err(ArbitrationError::AlreadyVoted);
        }
        votes.set(arbitrator.clone(), vote);
        dispute.vote_count += 1;
        storage.set(&StorageKey::Votes(dispute_id), &votes);
        storage.set(&StorageKey::Dispute(dispute_id), &dispute);

        // Handling a case counts toward the arbitrator's record whatever the
        // eventual outcome.
        let mut stats = Self::stats(&env, &arbitrator);
        stats.cases_handled += 1;
        storage.set(&StorageKey::Stats(arbitrator.clone()), &stats);

        env.events().publish(
            (VOTE_EVENT, dispute_id),
            VoteCastEvent {
                dispute_id,
                arbitrator,
                vote,
                vote_count: dispute.vote_count,
            },
        );

        let min_votes: u32 = storage
            .get(&StorageKey::MinVotes)
            .ok_or(ArbitrationError::NotInitialized)?;
        if dispute.vote_count >= min_votes {
            Self::finalize(&env, dispute_id)?;
        }
        Ok(())
    }

    /// Resolves a dispute once quorum was reached or the deadline elapsed.
    ///
    /// Callable by anyone. Fewer votes than quorum still resolve after the
    /// deadline, as long as at least one vote was cast.
    pub fn resolve_dispute(env: Env, dispute_id: u64) -> Result<u32, ArbitrationError> {
        let storage = env.storage().persistent();
        let dispute: Dispute = storage
            .get(&StorageKey::Dispute(dispute_id))
            .ok_or(ArbitrationError::DisputeNotFound)?;
        if !Self::accepts_votes(dispute.status) {
            return Err(ArbitrationError::NotVoting);
        }

        let min_votes: u32 = storage
            .get(&StorageKey::MinVotes)
            .ok_or(ArbitrationError::NotInitialized)?;
        let deadline_passed = env.ledger().timestamp() >= dispute.voting_deadline;
        if dispute.vote_count < min_votes && !deadline_passed {
            return Err(ArbitrationError::VotingStillOpen);
        }

        Self::finalize(&env, dispute_id)
    }

    /// Appeals a resolved dispute.
    ///
    /// Only an original party, only once per dispute. Every arbitrator who
    /// voted in the appealed round is penalized uniformly, regardless of how
    /// they voted. The dispute then re-enters one fresh voting round.
    ///
    /// # Access Control
    /// Dispute initiator or respondent only.
    pub fn appeal_dispute(
        env: Env,
        party: Address,
        dispute_id: u64,
    ) -> Result<(), ArbitrationError> {
        party.require_auth();

        let storage = env.storage().persistent();
        let mut dispute: Dispute = storage
            .get(&StorageKey::Dispute(dispute_id))
            .ok_or(ArbitrationError::DisputeNotFound)?;
        if party != dispute.initiator && party != dispute.respondent {
            return Err(ArbitrationError::NotDisputeParty);
        }
        if dispute.status != DisputeStatus::Resolved {
            return Err(ArbitrationError::NotResolved);
        }
        if dispute.appealed {
            return Err(ArbitrationError::AlreadyAppealed);
        }

        let votes: Map<Address, u32> = storage
            .get(&StorageKey::Votes(dispute_id))
            .unwrap_or(Map::new(&env));
        for (voter, _) in votes.iter() {
            let mut stats = Self::stats(&env, &voter);
            stats.appeals_against += 1;
            storage.set(&StorageKey::Stats(voter), &stats);
        }

        let voting_period: u64 = storage
            .get(&StorageKey::VotingPeriod)
            .ok_or(ArbitrationError::NotInitialized)?;
        dispute.appealed = true;
        dispute.status = DisputeStatus::Appealed;
        dispute.vote_count = 0;
        dispute.resolution = 0;
        dispute.resolved_at = None;
        dispute.voting_deadline = env.ledger().timestamp() + voting_period;
        storage.set(&StorageKey::Dispute(dispute_id), &dispute);
        storage.set(&StorageKey::Votes(dispute_id), &Map::<Address, u32>::new(&env));
        // the dispute is open again until the re-vote resolves
        storage.set(
            &StorageKey::OpenDispute(
                dispute.initiator.clone(),
                dispute.respondent.clone(),
                dispute.amount,
            ),
            &dispute_id,
        );

        env.events().publish(
            (APPEALED_EVENT, dispute_id),
            DisputeAppealedEvent {
                dispute_id,
                appellant: party,
                new_voting_deadline: dispute.voting_deadline,
            },
        );
        Ok(())
    }

    /// Returns whether the dispute has a completed resolution and the
    /// beneficiary share (0-100). Consumed by escrow emergency releases.
    pub fn get_resolution(env: Env, dispute_id: u64) -> Result<(bool, u32), ArbitrationError> {
        let dispute: Dispute = env
            .storage()
            .persistent()
            .get(&StorageKey::Dispute(dispute_id))
            .ok_or(ArbitrationError::DisputeNotFound)?;
        Ok((dispute.status == DisputeStatus::Resolved, dispute.resolution))
    }

    /// True while the dispute sits in its post-appeal voting round.
    pub fn appeal_open(env: Env, dispute_id: u64) -> Result<bool, ArbitrationError> {
        let dispute: Dispute = env
            .storage()
            .persistent()
            .get(&StorageKey::Dispute(dispute_id))
            .ok_or(ArbitrationError::DisputeNotFound)?;
        Ok(dispute.status == DisputeStatus::Appealed)
    }

    pub fn get_dispute(env: Env, dispute_id: u64) -> Result<Dispute, ArbitrationError> {
        env.storage()
            .persistent()
            .get(&StorageKey::Dispute(dispute_id))
            .ok_or(ArbitrationError::DisputeNotFound)
    }

    pub fn get_arbitrators(env: Env) -> Vec<Address> {
        env.storage()
            .persistent()
            .get(&StorageKey::Roster)
            .unwrap_or(Vec::new(&env))
    }

    pub fn get_arbitrator_stats(env: Env, arbitrator: Address) -> ArbitratorStats {
        Self::stats(&env, &arbitrator)
    }

    /// Average seconds from dispute creation to resolution across all cases
    /// the arbitrator voted in; 0 with no cases.
    pub fn average_resolution_time(env: Env, arbitrator: Address) -> u64 {
        let stats = Self::stats(&env, &arbitrator);
        if stats.cases_handled == 0 {
            0
        } else {
            stats.total_resolution_time / stats.cases_handled
        }
    }

    /// Appeals filed against the arbitrator's cases, per hundred cases.
    pub fn appeal_rate(env: Env, arbitrator: Address) -> u64 {
        let stats = Self::stats(&env, &arbitrator);
        if stats.cases_handled == 0 {
            0
        } else {
            stats.appeals_against * 100 / stats.cases_handled
        }
    }

    // ---- internal ----

    fn require_admin(env: &Env, caller: &Address) -> Result<(), ArbitrationError> {
        caller.require_auth();
        let admin: Address = env
            .storage()
            .persistent()
            .get(&StorageKey::Admin)
            .ok_or(ArbitrationError::NotInitialized)?;
        if caller != &admin {
            return Err(ArbitrationError::UnauthorizedAdmin);
        }
        Ok(())
    }

    /// A dispute collects votes while in its first round (Voting) or its
    /// post-appeal round (Appealed).
    fn accepts_votes(status: DisputeStatus) -> bool {
        matches!(status, DisputeStatus::Voting | DisputeStatus::Appealed)
    }

    fn stats(env: &Env, arbitrator: &Address) -> ArbitratorStats {
        env.storage()
            .persistent()
            .get(&StorageKey::Stats(arbitrator.clone()))
            .unwrap_or(ArbitratorStats {
                cases_handled: 0,
                total_resolution_time: 0,
                appeals_against: 0,
            })
    }

    /// Computes the equal-weight mean over votes cast by arbitrators still on
    /// the active roster, then marks the dispute resolved.
    fn finalize(env: &Env, dispute_id: u64) -> Result<u32, ArbitrationError> {
        let storage = env.storage().persistent();
        let mut dispute: Dispute = storage
            .get(&StorageKey::Dispute(dispute_id))
            .ok_or(ArbitrationError::DisputeNotFound)?;
        let votes: Map<Address, u32> = storage
            .get(&StorageKey::Votes(dispute_id))
            .unwrap_or(Map::new(env));
        let roster: Vec<Address> = storage
            .get(&StorageKey::Roster)
            .unwrap_or(Vec::new(env));

        let mut sum: u64 = 0;
        let mut counted: u32 = 0;
        for member in roster.iter() {
            if let Some(vote) = votes.get(member.clone()) {
                sum += vote as u64;
                counted += 1;
            }
        }
        if counted == 0 {
            return Err(ArbitrationError::NoVotesCast);
        }
        let resolution = (sum / counted as u64) as u32;

        let now = env.ledger().timestamp();
        let case_duration = now - dispute.created_at;
        dispute.status = DisputeStatus::Resolved;
        dispute.resolution = resolution;
        dispute.resolved_at = Some(now);
        storage.set(&StorageKey::Dispute(dispute_id), &dispute);
        storage.remove(&StorageKey::OpenDispute(
            dispute.initiator.clone(),
            dispute.respondent.clone(),
            dispute.amount,
        ));

        for member in roster.iter() {
            if votes.contains_key(member.clone()) {
                let mut stats = Self::stats(env, &member);
                stats.total_resolution_time += case_duration;
                storage.set(&StorageKey::Stats(member), &stats);
            }
        }

        env.events().publish(
            (RESOLVED_EVENT, dispute_id),
            DisputeResolvedEvent {
                dispute_id,
                resolution,
                votes_counted: counted,
            },
        );
        Ok(resolution)
    }
}
