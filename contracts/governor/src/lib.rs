//! Concord - Governor (Soroban)
//! Token-weighted proposals, voting and timelocked execution on Stellar.
//!
//! A proposal is a batch of calls plus a description. Its id is the hash of
//! `(calls, hash(description))`, so `queue`, `execute` and `cancel` take the
//! calls again and re-derive the id; a batch that differs in any byte is a
//! different (unknown) proposal.
//!
//! Voting weight is read from the votes token at the proposal snapshot
//! (`vote_start - 1`). Successful proposals are scheduled in the timelock
//! with this contract as proposer and executed through it.
//!
//! Events:
//! - ("proposal", "created"): [id, proposer, calls, description, vote_start: u32, vote_end: u32]
//! - ("gov", "voted"): [id, voter, support: VoteType, weight: i128, reason: String]
//! - ("proposal", "queued"): [id, operation_id, eta: u64]
//! - ("proposal", "executed"): [id]
//! - ("proposal", "cancelled"): [id, caller]
//! - ("proposal", "expired"): [id]
//! - ("gov", <setting>): [previous, new]

#![no_std]
use concord_common::{
    access::AccessError,
    content_hash,
    interface::{TimelockClient, VotesClient},
    Call, OperationState,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, BytesN, Env,
    String, Vec,
};

// ============================================================
// Data Types
// ============================================================

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum VoteType {
    Against = 0,
    For = 1,
    Abstain = 2,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ProposalState {
    Pending = 0,
    Active = 1,
    Canceled = 2,
    Defeated = 3,
    Succeeded = 4,
    Queued = 5,
    Expired = 6,
    Executed = 7,
}

/// Voting rules. Windows are in ledgers except `execution_grace`, which is
/// in seconds after the timelock eta; once it lapses anyone may `expire` a
/// queued proposal. A zero `queue_window` or `execution_grace` disables that
/// expiry.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GovernorSettings {
    pub voting_delay: u32,
    pub voting_period: u32,
    pub proposal_threshold: i128,
    pub quorum_numerator: u32,
    pub queue_window: u32,
    pub execution_grace: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalCore {
    pub proposer: Address,
    pub vote_start: u32,
    pub vote_end: u32,
    pub quorum_numerator: u32,
    pub against_votes: i128,
    pub for_votes: i128,
    pub abstain_votes: i128,
    pub operation_id: Option<BytesN<32>>,
    pub eta: u64,
    pub canceled: bool,
    pub executed: bool,
    pub expired: bool,
}

impl ProposalCore {
    pub fn snapshot(&self) -> u32 {
        self.vote_start - 1
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VoteReceipt {
    pub support: VoteType,
    pub weight: i128,
}

// ============================================================
// Storage Keys
// ============================================================

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    PendingAdmin,
    Token,
    Timelock,
    Settings,
    Proposal(BytesN<32>),
    Receipt(BytesN<32>, Address),
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum GovernorError {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    Unauthorized = 3,
    InvalidSettings = 4,
    EmptyProposal = 5,
    InvalidCall = 6,
    InsufficientProposerVotes = 7,
    DuplicateProposal = 8,
    UnknownProposal = 9,
    ProposalNotActive = 10,
    AlreadyVoted = 11,
    NotSucceeded = 12,
    NotQueued = 13,
    NotReady = 14,
    NotCancellable = 15,
    DispatchFailed = 16,
    Overflow = 17,
    GraceNotLapsed = 18,
}

impl From<AccessError> for GovernorError {
    fn from(_: AccessError) -> Self {
        GovernorError::Unauthorized
    }
}

// ============================================================
// Contract
// ============================================================

const INSTANCE_LIFETIME_THRESHOLD: u32 = 17_280;
const INSTANCE_BUMP_AMOUNT: u32 = 86_400;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = 34_560;
const PERSISTENT_BUMP_AMOUNT: u32 = 259_200;

/// Quorum numerators are percentages of the past total supply.
pub const QUORUM_DENOMINATOR: u32 = 100;

#[contract]
pub struct GovernorContract;

#[contractimpl]
impl GovernorContract {
    /// Initialize the governor
    pub fn initialize(
        env: Env,
        admin: Address,
        token: Address,
        timelock: Address,
        settings: GovernorSettings,
    ) -> Result<(), GovernorError> {
        extend_instance(&env);
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(GovernorError::AlreadyInitialized);
        }
        admin.require_auth();
        check_settings(&settings)?;

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Token, &token);
        env.storage().instance().set(&DataKey::Timelock, &timelock);
        env.storage().instance().set(&DataKey::Settings, &settings);
        Ok(())
    }

    // ============================================================
    // Proposal Lifecycle
    // ============================================================

    /// Create a proposal. Needs `proposal_threshold` votes as of the
    /// previous ledger.
    pub fn propose(
        env: Env,
        proposer: Address,
        calls: Vec<Call>,
        description: String,
    ) -> Result<BytesN<32>, GovernorError> {
        extend_instance(&env);
        proposer.require_auth();

        if calls.is_empty() {
            return Err(GovernorError::EmptyProposal);
        }
        if calls.iter().any(|call| !call.is_valid()) {
            return Err(GovernorError::InvalidCall);
        }

        let settings = load_settings(&env)?;
        let current = env.ledger().sequence();
        if settings.proposal_threshold > 0 {
            let at = current
                .checked_sub(1)
                .ok_or(GovernorError::InsufficientProposerVotes)?;
            let votes = votes_client(&env)?.get_past_votes(&proposer, &at);
            if votes < settings.proposal_threshold {
                return Err(GovernorError::InsufficientProposerVotes);
            }
        }

        let description_hash = content_hash(&env, description.clone());
        let id = proposal_id(&env, &calls, &description_hash);
        let key = DataKey::Proposal(id.clone());
        if env.storage().persistent().has(&key) {
            return Err(GovernorError::DuplicateProposal);
        }

        let vote_start = current
            .checked_add(settings.voting_delay)
            .and_then(|l| l.checked_add(1))
            .ok_or(GovernorError::Overflow)?;
        let vote_end = vote_start
            .checked_add(settings.voting_period)
            .ok_or(GovernorError::Overflow)?;

        let proposal = ProposalCore {
            proposer: proposer.clone(),
            vote_start,
            vote_end,
            quorum_numerator: settings.quorum_numerator,
            against_votes: 0,
            for_votes: 0,
            abstain_votes: 0,
            operation_id: None,
            eta: 0,
            canceled: false,
            executed: false,
            expired: false,
        };
        save_proposal(&env, &id, &proposal);

        env.events().publish(
            (symbol_short!("proposal"), symbol_short!("created")),
            (id.clone(), proposer, calls, description, vote_start, vote_end),
        );
        Ok(id)
    }

    pub fn cast_vote(
        env: Env,
        voter: Address,
        proposal_id: BytesN<32>,
        support: VoteType,
    ) -> Result<i128, GovernorError> {
        let reason = String::from_str(&env, "");
        Self::cast_vote_with_reason(env, voter, proposal_id, support, reason)
    }

    /// Record `voter`'s weight at the snapshot. Returns the weight counted,
    /// which may be zero.
    pub fn cast_vote_with_reason(
        env: Env,
        voter: Address,
        proposal_id: BytesN<32>,
        support: VoteType,
        reason: String,
    ) -> Result<i128, GovernorError> {
        extend_instance(&env);
        voter.require_auth();

        let mut proposal = load_proposal(&env, &proposal_id)?;
        if proposal_state(&env, &proposal)? != ProposalState::Active {
            return Err(GovernorError::ProposalNotActive);
        }

        let receipt_key = DataKey::Receipt(proposal_id.clone(), voter.clone());
        if env.storage().persistent().has(&receipt_key) {
            return Err(GovernorError::AlreadyVoted);
        }

        let weight = votes_client(&env)?.get_past_votes(&voter, &proposal.snapshot());
        let tally = match support {
            VoteType::Against => &mut proposal.against_votes,
            VoteType::For => &mut proposal.for_votes,
            VoteType::Abstain => &mut proposal.abstain_votes,
        };
        *tally = tally.checked_add(weight).ok_or(GovernorError::Overflow)?;
        save_proposal(&env, &proposal_id, &proposal);

        env.storage()
            .persistent()
            .set(&receipt_key, &VoteReceipt { support, weight });
        env.storage().persistent().extend_ttl(
            &receipt_key,
            PERSISTENT_LIFETIME_THRESHOLD,
            PERSISTENT_BUMP_AMOUNT,
        );

        env.events().publish(
            (symbol_short!("gov"), symbol_short!("voted")),
            (proposal_id, voter, support, weight, reason),
        );
        Ok(weight)
    }

    /// Schedule a succeeded proposal in the timelock. Anyone may queue.
    pub fn queue(
        env: Env,
        calls: Vec<Call>,
        description_hash: BytesN<32>,
    ) -> Result<BytesN<32>, GovernorError> {
        extend_instance(&env);
        let id = proposal_id(&env, &calls, &description_hash);
        let mut proposal = load_proposal(&env, &id)?;
        if proposal_state(&env, &proposal)? != ProposalState::Succeeded {
            return Err(GovernorError::NotSucceeded);
        }

        let timelock = timelock_client(&env)?;
        let delay = timelock.get_min_delay();
        let eta = env
            .ledger()
            .timestamp()
            .checked_add(delay)
            .ok_or(GovernorError::Overflow)?;
        let operation_id = timelock.schedule_batch(
            &env.current_contract_address(),
            &calls,
            &None,
            &timelock_salt(&env, &description_hash),
            &delay,
        );

        proposal.operation_id = Some(operation_id.clone());
        proposal.eta = eta;
        save_proposal(&env, &id, &proposal);

        env.events().publish(
            (symbol_short!("proposal"), symbol_short!("queued")),
            (id.clone(), operation_id, eta),
        );
        Ok(id)
    }

    /// Execute a queued proposal through the timelock once its operation is
    /// ready. Anyone may execute.
    pub fn execute(
        env: Env,
        calls: Vec<Call>,
        description_hash: BytesN<32>,
    ) -> Result<BytesN<32>, GovernorError> {
        extend_instance(&env);
        let id = proposal_id(&env, &calls, &description_hash);
        let mut proposal = load_proposal(&env, &id)?;
        if proposal_state(&env, &proposal)? != ProposalState::Queued {
            return Err(GovernorError::NotQueued);
        }

        let timelock = timelock_client(&env)?;
        let operation_id = proposal
            .operation_id
            .clone()
            .ok_or(GovernorError::NotQueued)?;
        if timelock.get_operation_state(&operation_id) != OperationState::Ready {
            return Err(GovernorError::NotReady);
        }

        proposal.executed = true;
        save_proposal(&env, &id, &proposal);

        let dispatched = timelock.try_execute_batch(
            &env.current_contract_address(),
            &calls,
            &None,
            &timelock_salt(&env, &description_hash),
        );
        if !matches!(dispatched, Ok(Ok(()))) {
            return Err(GovernorError::DispatchFailed);
        }

        env.events().publish(
            (symbol_short!("proposal"), symbol_short!("executed")),
            id.clone(),
        );
        Ok(id)
    }

    /// The proposer may cancel while Pending or Active; the admin also while
    /// Succeeded or Queued. Cancelling a queued proposal cancels its
    /// timelock operation too.
    pub fn cancel(
        env: Env,
        caller: Address,
        calls: Vec<Call>,
        description_hash: BytesN<32>,
    ) -> Result<BytesN<32>, GovernorError> {
        extend_instance(&env);
        caller.require_auth();

        let id = proposal_id(&env, &calls, &description_hash);
        let mut proposal = load_proposal(&env, &id)?;
        let state = proposal_state(&env, &proposal)?;

        let is_admin = caller == load_admin(&env)?;
        if !is_admin && caller != proposal.proposer {
            return Err(GovernorError::Unauthorized);
        }
        let cancellable = match state {
            ProposalState::Pending | ProposalState::Active => true,
            ProposalState::Succeeded | ProposalState::Queued => is_admin,
            _ => false,
        };
        if !cancellable {
            return Err(GovernorError::NotCancellable);
        }

        proposal.canceled = true;
        save_proposal(&env, &id, &proposal);

        if state == ProposalState::Queued {
            if let Some(operation_id) = &proposal.operation_id {
                timelock_client(&env)?.cancel(&env.current_contract_address(), operation_id);
            }
        }

        env.events().publish(
            (symbol_short!("proposal"), symbol_short!("cancelled")),
            (id.clone(), caller),
        );
        Ok(id)
    }

    /// Anyone may expire a queued proposal once `execution_grace` seconds
    /// have passed since its eta. The timelock operation is cancelled with
    /// it, so it can no longer run through either contract.
    pub fn expire(
        env: Env,
        calls: Vec<Call>,
        description_hash: BytesN<32>,
    ) -> Result<BytesN<32>, GovernorError> {
        extend_instance(&env);

        let id = proposal_id(&env, &calls, &description_hash);
        let mut proposal = load_proposal(&env, &id)?;
        if proposal_state(&env, &proposal)? != ProposalState::Queued {
            return Err(GovernorError::NotQueued);
        }

        let grace = load_settings(&env)?.execution_grace;
        if grace == 0 || env.ledger().timestamp() < proposal.eta.saturating_add(grace) {
            return Err(GovernorError::GraceNotLapsed);
        }

        proposal.expired = true;
        save_proposal(&env, &id, &proposal);

        if let Some(operation_id) = &proposal.operation_id {
            timelock_client(&env)?.cancel(&env.current_contract_address(), operation_id);
        }

        env.events()
            .publish((symbol_short!("proposal"), symbol_short!("expired")), id.clone());
        Ok(id)
    }

    // ============================================================
    // Settings (timelock only)
    // ============================================================

    pub fn set_voting_delay(env: Env, voting_delay: u32) -> Result<(), GovernorError> {
        update_settings(&env, symbol_short!("delay"), |s| {
            let previous = s.voting_delay;
            s.voting_delay = voting_delay;
            (previous as i128, voting_delay as i128)
        })
    }

    pub fn set_voting_period(env: Env, voting_period: u32) -> Result<(), GovernorError> {
        update_settings(&env, symbol_short!("period"), |s| {
            let previous = s.voting_period;
            s.voting_period = voting_period;
            (previous as i128, voting_period as i128)
        })
    }

    pub fn set_proposal_threshold(env: Env, threshold: i128) -> Result<(), GovernorError> {
        update_settings(&env, symbol_short!("threshold"), |s| {
            let previous = s.proposal_threshold;
            s.proposal_threshold = threshold;
            (previous, threshold)
        })
    }

    /// Affects proposals created from now on.
    pub fn update_quorum_numerator(env: Env, numerator: u32) -> Result<(), GovernorError> {
        update_settings(&env, symbol_short!("quorum"), |s| {
            let previous = s.quorum_numerator;
            s.quorum_numerator = numerator;
            (previous as i128, numerator as i128)
        })
    }

    pub fn set_queue_window(env: Env, queue_window: u32) -> Result<(), GovernorError> {
        update_settings(&env, symbol_short!("q_window"), |s| {
            let previous = s.queue_window;
            s.queue_window = queue_window;
            (previous as i128, queue_window as i128)
        })
    }

    pub fn set_execution_grace(env: Env, grace: u64) -> Result<(), GovernorError> {
        update_settings(&env, symbol_short!("grace"), |s| {
            let previous = s.execution_grace;
            s.execution_grace = grace;
            (previous as i128, grace as i128)
        })
    }

    // ============================================================
    // Admin
    // ============================================================

    pub fn propose_admin(
        env: Env,
        current_admin: Address,
        new_admin: Address,
    ) -> Result<(), GovernorError> {
        extend_instance(&env);
        concord_common::admin::propose_admin(
            &env,
            &DataKey::Admin,
            &DataKey::PendingAdmin,
            current_admin,
            new_admin,
        )?;
        Ok(())
    }

    pub fn accept_admin(env: Env, new_admin: Address) -> Result<(), GovernorError> {
        extend_instance(&env);
        concord_common::admin::accept_admin(&env, &DataKey::Admin, &DataKey::PendingAdmin, new_admin)?;
        Ok(())
    }

    // ============================================================
    // Read-Only Functions
    // ============================================================

    pub fn state(env: Env, proposal_id: BytesN<32>) -> Result<ProposalState, GovernorError> {
        let proposal = load_proposal(&env, &proposal_id)?;
        proposal_state(&env, &proposal)
    }

    pub fn get_proposal(env: Env, proposal_id: BytesN<32>) -> Option<ProposalCore> {
        env.storage()
            .persistent()
            .get(&DataKey::Proposal(proposal_id))
    }

    pub fn proposal_snapshot(env: Env, proposal_id: BytesN<32>) -> Result<u32, GovernorError> {
        Ok(load_proposal(&env, &proposal_id)?.snapshot())
    }

    /// First ledger at which voting is closed.
    pub fn proposal_deadline(env: Env, proposal_id: BytesN<32>) -> Result<u32, GovernorError> {
        Ok(load_proposal(&env, &proposal_id)?.vote_end)
    }

    pub fn proposal_proposer(env: Env, proposal_id: BytesN<32>) -> Result<Address, GovernorError> {
        Ok(load_proposal(&env, &proposal_id)?.proposer)
    }

    /// Timestamp at which the queued operation becomes ready, 0 if not queued.
    pub fn proposal_eta(env: Env, proposal_id: BytesN<32>) -> Result<u64, GovernorError> {
        Ok(load_proposal(&env, &proposal_id)?.eta)
    }

    /// `(against, for, abstain)`
    pub fn proposal_votes(
        env: Env,
        proposal_id: BytesN<32>,
    ) -> Result<(i128, i128, i128), GovernorError> {
        let p = load_proposal(&env, &proposal_id)?;
        Ok((p.against_votes, p.for_votes, p.abstain_votes))
    }

    pub fn has_voted(env: Env, proposal_id: BytesN<32>, account: Address) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Receipt(proposal_id, account))
    }

    pub fn get_receipt(env: Env, proposal_id: BytesN<32>, account: Address) -> Option<VoteReceipt> {
        env.storage()
            .persistent()
            .get(&DataKey::Receipt(proposal_id, account))
    }

    /// Votes needed at `ledger` under the current quorum numerator.
    pub fn quorum(env: Env, ledger: u32) -> Result<i128, GovernorError> {
        let settings = load_settings(&env)?;
        quorum_at(&env, ledger, settings.quorum_numerator)
    }

    pub fn get_votes(env: Env, account: Address, ledger: u32) -> Result<i128, GovernorError> {
        Ok(votes_client(&env)?.get_past_votes(&account, &ledger))
    }

    pub fn settings(env: Env) -> Result<GovernorSettings, GovernorError> {
        load_settings(&env)
    }

    pub fn voting_delay(env: Env) -> Result<u32, GovernorError> {
        Ok(load_settings(&env)?.voting_delay)
    }

    pub fn voting_period(env: Env) -> Result<u32, GovernorError> {
        Ok(load_settings(&env)?.voting_period)
    }

    pub fn proposal_threshold(env: Env) -> Result<i128, GovernorError> {
        Ok(load_settings(&env)?.proposal_threshold)
    }

    pub fn quorum_numerator(env: Env) -> Result<u32, GovernorError> {
        Ok(load_settings(&env)?.quorum_numerator)
    }

    pub fn token(env: Env) -> Result<Address, GovernorError> {
        load_address(&env, &DataKey::Token)
    }

    pub fn timelock(env: Env) -> Result<Address, GovernorError> {
        load_address(&env, &DataKey::Timelock)
    }

    pub fn admin(env: Env) -> Result<Address, GovernorError> {
        load_admin(&env)
    }

    pub fn hash_description(env: Env, description: String) -> BytesN<32> {
        content_hash(&env, description)
    }

    pub fn hash_proposal(env: Env, calls: Vec<Call>, description_hash: BytesN<32>) -> BytesN<32> {
        proposal_id(&env, &calls, &description_hash)
    }
}

// ============================================================
// Internal Helpers
// ============================================================

fn extend_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

fn load_address(env: &Env, key: &DataKey) -> Result<Address, GovernorError> {
    env.storage()
        .instance()
        .get(key)
        .ok_or(GovernorError::NotInitialized)
}

fn load_admin(env: &Env) -> Result<Address, GovernorError> {
    load_address(env, &DataKey::Admin)
}

fn load_settings(env: &Env) -> Result<GovernorSettings, GovernorError> {
    env.storage()
        .instance()
        .get(&DataKey::Settings)
        .ok_or(GovernorError::NotInitialized)
}

fn votes_client(env: &Env) -> Result<VotesClient<'_>, GovernorError> {
    Ok(VotesClient::new(env, &load_address(env, &DataKey::Token)?))
}

fn timelock_client(env: &Env) -> Result<TimelockClient<'_>, GovernorError> {
    Ok(TimelockClient::new(
        env,
        &load_address(env, &DataKey::Timelock)?,
    ))
}

fn check_settings(settings: &GovernorSettings) -> Result<(), GovernorError> {
    if settings.voting_period == 0
        || settings.quorum_numerator > QUORUM_DENOMINATOR
        || settings.proposal_threshold < 0
    {
        return Err(GovernorError::InvalidSettings);
    }
    Ok(())
}

/// Apply a settings change authorized by the timelock and publish
/// `("gov", topic)` with the previous and new values.
fn update_settings<F>(env: &Env, topic: soroban_sdk::Symbol, change: F) -> Result<(), GovernorError>
where
    F: FnOnce(&mut GovernorSettings) -> (i128, i128),
{
    extend_instance(env);
    load_address(env, &DataKey::Timelock)?.require_auth();

    let mut settings = load_settings(env)?;
    let (previous, new) = change(&mut settings);
    check_settings(&settings)?;
    env.storage().instance().set(&DataKey::Settings, &settings);

    env.events()
        .publish((symbol_short!("gov"), topic), (previous, new));
    Ok(())
}

fn proposal_id(env: &Env, calls: &Vec<Call>, description_hash: &BytesN<32>) -> BytesN<32> {
    content_hash(env, (calls.clone(), description_hash.clone()))
}

/// Salt of a proposal's timelock operation, scoped to this governor.
fn timelock_salt(env: &Env, description_hash: &BytesN<32>) -> BytesN<32> {
    content_hash(
        env,
        (env.current_contract_address(), description_hash.clone()),
    )
}

fn load_proposal(env: &Env, id: &BytesN<32>) -> Result<ProposalCore, GovernorError> {
    let key = DataKey::Proposal(id.clone());
    let proposal = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(GovernorError::UnknownProposal)?;
    env.storage().persistent().extend_ttl(
        &key,
        PERSISTENT_LIFETIME_THRESHOLD,
        PERSISTENT_BUMP_AMOUNT,
    );
    Ok(proposal)
}

fn save_proposal(env: &Env, id: &BytesN<32>, proposal: &ProposalCore) {
    let key = DataKey::Proposal(id.clone());
    env.storage().persistent().set(&key, proposal);
    env.storage().persistent().extend_ttl(
        &key,
        PERSISTENT_LIFETIME_THRESHOLD,
        PERSISTENT_BUMP_AMOUNT,
    );
}

fn quorum_at(env: &Env, ledger: u32, numerator: u32) -> Result<i128, GovernorError> {
    let supply = votes_client(env)?.get_past_total_supply(&ledger);
    supply
        .checked_mul(numerator as i128)
        .map(|v| v / QUORUM_DENOMINATOR as i128)
        .ok_or(GovernorError::Overflow)
}

fn vote_passed(env: &Env, proposal: &ProposalCore) -> Result<bool, GovernorError> {
    let quorum = quorum_at(env, proposal.snapshot(), proposal.quorum_numerator)?;
    let participation = proposal
        .for_votes
        .checked_add(proposal.abstain_votes)
        .ok_or(GovernorError::Overflow)?;
    Ok(participation >= quorum && proposal.for_votes > proposal.against_votes)
}

fn proposal_state(env: &Env, proposal: &ProposalCore) -> Result<ProposalState, GovernorError> {
    if proposal.executed {
        return Ok(ProposalState::Executed);
    }
    if proposal.canceled {
        return Ok(ProposalState::Canceled);
    }
    if proposal.expired {
        return Ok(ProposalState::Expired);
    }

    let now = env.ledger().sequence();
    if now < proposal.vote_start {
        return Ok(ProposalState::Pending);
    }
    if now < proposal.vote_end {
        return Ok(ProposalState::Active);
    }
    if !vote_passed(env, proposal)? {
        return Ok(ProposalState::Defeated);
    }

    let settings = load_settings(env)?;
    let Some(operation_id) = &proposal.operation_id else {
        let expired = settings.queue_window > 0
            && now >= proposal.vote_end.saturating_add(settings.queue_window);
        return Ok(if expired {
            ProposalState::Expired
        } else {
            ProposalState::Succeeded
        });
    };

    // The operation may have been run or dropped directly in the timelock.
    match timelock_client(env)?.get_operation_state(operation_id) {
        OperationState::Done => Ok(ProposalState::Executed),
        OperationState::Unset => Ok(ProposalState::Canceled),
        OperationState::Waiting | OperationState::Ready => Ok(ProposalState::Queued),
    }
}
