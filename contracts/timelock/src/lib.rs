//! Concord - Timelock (Soroban)
//! Delayed, role-gated execution of governance calls on Stellar.
//!
//! Operations are content-addressed: their id is the hash of the calls,
//! the predecessor and a salt, so the exact calls that were scheduled are
//! the only ones that can later be executed under that id.
//!
//! Roles (see `concord_common::access`): proposers schedule, executors
//! execute (open to everyone once granted to the sentinel), cancellers
//! cancel, admins manage roles and the minimum delay.
//!
//! Events:
//! - ("timelock", "scheduled"): [id, index: u32, call: Call, predecessor, delay: u64]
//! - ("timelock", "executed"): [id, index: u32, call: Call]
//! - ("timelock", "cancelled"): [id]
//! - ("timelock", "min_delay"): [previous: u64, new: u64]

#![no_std]
use concord_common::{
    access::{self, AccessError, Role},
    content_hash, Call, OperationState,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, Address, BytesN,
    Env, Val, Vec,
};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum TimelockError {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    Unauthorized = 3,
    InsufficientDelay = 4,
    AlreadyScheduled = 5,
    NotReady = 6,
    OperationDone = 7,
    PredecessorNotDone = 8,
    NotCancellable = 9,
    DispatchFailed = 10,
    InvalidCall = 11,
    EmptyBatch = 12,
    Overflow = 13,
}

impl From<AccessError> for TimelockError {
    fn from(_: AccessError) -> Self {
        TimelockError::Unauthorized
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Operation {
    pub scheduled_at: u64,
    pub ready_at: u64,
    pub done: bool,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    MinDelay,
    NativeToken,
    Operation(BytesN<32>),
}

const INSTANCE_LIFETIME_THRESHOLD: u32 = 17_280;
const INSTANCE_BUMP_AMOUNT: u32 = 86_400;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = 120_960;
const PERSISTENT_BUMP_AMOUNT: u32 = 1_051_200;

#[contract]
pub struct TimelockContract;

#[contractimpl]
impl TimelockContract {
    /// Set up roles and the minimum delay. Proposers are also made
    /// cancellers. `native_token` pays out call values; without it only
    /// zero-value calls can be executed.
    pub fn initialize(
        env: Env,
        admin: Address,
        min_delay: u64,
        proposers: Vec<Address>,
        executors: Vec<Address>,
        native_token: Option<Address>,
    ) -> Result<(), TimelockError> {
        extend_instance(&env);
        if env.storage().instance().has(&DataKey::MinDelay) {
            return Err(TimelockError::AlreadyInitialized);
        }
        admin.require_auth();

        let this = env.current_contract_address();
        access::grant(&env, Role::Admin, &admin, &this);
        for proposer in proposers.iter() {
            access::grant(&env, Role::Proposer, &proposer, &this);
            access::grant(&env, Role::Canceller, &proposer, &this);
        }
        for executor in executors.iter() {
            access::grant(&env, Role::Executor, &executor, &this);
        }

        env.storage().instance().set(&DataKey::MinDelay, &min_delay);
        if let Some(native_token) = native_token {
            env.storage()
                .instance()
                .set(&DataKey::NativeToken, &native_token);
        }

        env.events().publish(
            (symbol_short!("timelock"), symbol_short!("min_delay")),
            (0u64, min_delay),
        );
        Ok(())
    }

    // ============================================================
    // Scheduling
    // ============================================================

    pub fn schedule(
        env: Env,
        proposer: Address,
        call: Call,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
        delay: u64,
    ) -> Result<BytesN<32>, TimelockError> {
        extend_instance(&env);
        proposer.require_auth();
        access::require_role(&env, Role::Proposer, &proposer)?;
        if !call.is_valid() {
            return Err(TimelockError::InvalidCall);
        }

        let id = hash_single(&env, &call, &predecessor, &salt);
        schedule_operation(&env, &id, delay)?;

        env.events().publish(
            (symbol_short!("timelock"), symbol_short!("scheduled")),
            (id.clone(), 0u32, call, predecessor, delay),
        );
        Ok(id)
    }

    pub fn schedule_batch(
        env: Env,
        proposer: Address,
        calls: Vec<Call>,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
        delay: u64,
    ) -> Result<BytesN<32>, TimelockError> {
        extend_instance(&env);
        proposer.require_auth();
        access::require_role(&env, Role::Proposer, &proposer)?;
        check_batch(&calls)?;

        let id = hash_batch(&env, &calls, &predecessor, &salt);
        schedule_operation(&env, &id, delay)?;

        for (index, call) in calls.iter().enumerate() {
            env.events().publish(
                (symbol_short!("timelock"), symbol_short!("scheduled")),
                (id.clone(), index as u32, call, predecessor.clone(), delay),
            );
        }
        Ok(id)
    }

    // ============================================================
    // Execution
    // ============================================================

    /// Run a ready operation. The operation is marked done before its call
    /// is dispatched; if the call fails the whole invocation fails and the
    /// operation stays ready.
    pub fn execute(
        env: Env,
        executor: Address,
        call: Call,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
    ) -> Result<(), TimelockError> {
        extend_instance(&env);
        executor.require_auth();
        access::require_role_or_open(&env, Role::Executor, &executor)?;

        let id = hash_single(&env, &call, &predecessor, &salt);
        mark_done(&env, &id, &predecessor)?;
        dispatch(&env, &call)?;

        env.events().publish(
            (symbol_short!("timelock"), symbol_short!("executed")),
            (id, 0u32, call),
        );
        Ok(())
    }

    /// Run every call of a ready batch in order; any failure fails them all.
    pub fn execute_batch(
        env: Env,
        executor: Address,
        calls: Vec<Call>,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
    ) -> Result<(), TimelockError> {
        extend_instance(&env);
        executor.require_auth();
        access::require_role_or_open(&env, Role::Executor, &executor)?;
        check_batch(&calls)?;

        let id = hash_batch(&env, &calls, &predecessor, &salt);
        mark_done(&env, &id, &predecessor)?;
        for (index, call) in calls.iter().enumerate() {
            dispatch(&env, &call)?;
            env.events().publish(
                (symbol_short!("timelock"), symbol_short!("executed")),
                (id.clone(), index as u32, call),
            );
        }
        Ok(())
    }

    /// Drop a waiting or ready operation.
    pub fn cancel(env: Env, canceller: Address, id: BytesN<32>) -> Result<(), TimelockError> {
        extend_instance(&env);
        canceller.require_auth();
        access::require_role(&env, Role::Canceller, &canceller)?;

        match operation_state(&env, &id) {
            OperationState::Waiting | OperationState::Ready => {}
            _ => return Err(TimelockError::NotCancellable),
        }
        env.storage()
            .persistent()
            .remove(&DataKey::Operation(id.clone()));

        env.events()
            .publish((symbol_short!("timelock"), symbol_short!("cancelled")), id);
        Ok(())
    }

    pub fn update_delay(env: Env, caller: Address, new_delay: u64) -> Result<(), TimelockError> {
        extend_instance(&env);
        caller.require_auth();
        access::require_role(&env, Role::Admin, &caller)?;

        let previous = min_delay(&env)?;
        env.storage().instance().set(&DataKey::MinDelay, &new_delay);
        env.events().publish(
            (symbol_short!("timelock"), symbol_short!("min_delay")),
            (previous, new_delay),
        );
        Ok(())
    }

    // ============================================================
    // Roles
    // ============================================================

    /// Whether `account` may act in `role`. Once the executor role is
    /// open, every account holds it.
    pub fn has_role(env: Env, role: Role, account: Address) -> bool {
        extend_instance(&env);
        match role {
            Role::Executor => access::require_role_or_open(&env, role, &account).is_ok(),
            _ => access::has_role(&env, role, &account),
        }
    }

    pub fn get_role_admin(env: Env, role: Role) -> Role {
        extend_instance(&env);
        access::role_admin(&env, role)
    }

    pub fn grant_role(
        env: Env,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<(), TimelockError> {
        extend_instance(&env);
        access::grant_role(&env, &caller, role, &account)?;
        Ok(())
    }

    pub fn revoke_role(
        env: Env,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<(), TimelockError> {
        extend_instance(&env);
        access::revoke_role(&env, &caller, role, &account)?;
        Ok(())
    }

    pub fn renounce_role(env: Env, account: Address, role: Role) {
        extend_instance(&env);
        access::renounce_role(&env, &account, role);
    }

    /// The address that opens a role to every caller when granted it.
    pub fn open_role_account(env: Env) -> Address {
        access::anyone(&env)
    }

    // ============================================================
    // Read-Only Functions
    // ============================================================

    pub fn get_min_delay(env: Env) -> Result<u64, TimelockError> {
        extend_instance(&env);
        min_delay(&env)
    }

    pub fn hash_operation(
        env: Env,
        call: Call,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
    ) -> BytesN<32> {
        hash_single(&env, &call, &predecessor, &salt)
    }

    pub fn hash_operation_batch(
        env: Env,
        calls: Vec<Call>,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
    ) -> BytesN<32> {
        hash_batch(&env, &calls, &predecessor, &salt)
    }

    pub fn get_operation(env: Env, id: BytesN<32>) -> Option<Operation> {
        extend_instance(&env);
        read_operation(&env, &id)
    }

    pub fn get_operation_state(env: Env, id: BytesN<32>) -> OperationState {
        extend_instance(&env);
        operation_state(&env, &id)
    }

    /// Ready timestamp of the operation, 0 when it is not scheduled.
    pub fn get_timestamp(env: Env, id: BytesN<32>) -> u64 {
        extend_instance(&env);
        read_operation(&env, &id).map(|op| op.ready_at).unwrap_or(0)
    }

    pub fn is_operation(env: Env, id: BytesN<32>) -> bool {
        operation_state(&env, &id) != OperationState::Unset
    }

    pub fn is_operation_pending(env: Env, id: BytesN<32>) -> bool {
        matches!(
            operation_state(&env, &id),
            OperationState::Waiting | OperationState::Ready
        )
    }

    pub fn is_operation_ready(env: Env, id: BytesN<32>) -> bool {
        operation_state(&env, &id) == OperationState::Ready
    }

    pub fn is_operation_done(env: Env, id: BytesN<32>) -> bool {
        operation_state(&env, &id) == OperationState::Done
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

fn min_delay(env: &Env) -> Result<u64, TimelockError> {
    env.storage()
        .instance()
        .get(&DataKey::MinDelay)
        .ok_or(TimelockError::NotInitialized)
}

fn hash_single(
    env: &Env,
    call: &Call,
    predecessor: &Option<BytesN<32>>,
    salt: &BytesN<32>,
) -> BytesN<32> {
    content_hash(env, (call.clone(), predecessor.clone(), salt.clone()))
}

fn hash_batch(
    env: &Env,
    calls: &Vec<Call>,
    predecessor: &Option<BytesN<32>>,
    salt: &BytesN<32>,
) -> BytesN<32> {
    content_hash(env, (calls.clone(), predecessor.clone(), salt.clone()))
}

fn check_batch(calls: &Vec<Call>) -> Result<(), TimelockError> {
    if calls.is_empty() {
        return Err(TimelockError::EmptyBatch);
    }
    if calls.iter().any(|call| !call.is_valid()) {
        return Err(TimelockError::InvalidCall);
    }
    Ok(())
}

fn read_operation(env: &Env, id: &BytesN<32>) -> Option<Operation> {
    env.storage()
        .persistent()
        .get(&DataKey::Operation(id.clone()))
}

fn write_operation(env: &Env, id: &BytesN<32>, operation: &Operation) {
    let key = DataKey::Operation(id.clone());
    env.storage().persistent().set(&key, operation);
    env.storage().persistent().extend_ttl(
        &key,
        PERSISTENT_LIFETIME_THRESHOLD,
        PERSISTENT_BUMP_AMOUNT,
    );
}

fn operation_state(env: &Env, id: &BytesN<32>) -> OperationState {
    match read_operation(env, id) {
        None => OperationState::Unset,
        Some(op) if op.done => OperationState::Done,
        Some(op) if op.ready_at > env.ledger().timestamp() => OperationState::Waiting,
        Some(_) => OperationState::Ready,
    }
}

fn schedule_operation(env: &Env, id: &BytesN<32>, delay: u64) -> Result<(), TimelockError> {
    if delay < min_delay(env)? {
        return Err(TimelockError::InsufficientDelay);
    }
    if read_operation(env, id).is_some() {
        return Err(TimelockError::AlreadyScheduled);
    }

    let now = env.ledger().timestamp();
    let ready_at = now.checked_add(delay).ok_or(TimelockError::Overflow)?;
    write_operation(
        env,
        id,
        &Operation {
            scheduled_at: now,
            ready_at,
            done: false,
        },
    );
    Ok(())
}

/// Check that `id` may run now and flag it done.
fn mark_done(
    env: &Env,
    id: &BytesN<32>,
    predecessor: &Option<BytesN<32>>,
) -> Result<(), TimelockError> {
    match operation_state(env, id) {
        OperationState::Ready => {}
        OperationState::Done => return Err(TimelockError::OperationDone),
        OperationState::Unset | OperationState::Waiting => return Err(TimelockError::NotReady),
    }
    if let Some(predecessor) = predecessor {
        if operation_state(env, predecessor) != OperationState::Done {
            return Err(TimelockError::PredecessorNotDone);
        }
    }

    let mut operation = read_operation(env, id).ok_or(TimelockError::NotReady)?;
    operation.done = true;
    write_operation(env, id, &operation);
    Ok(())
}

fn dispatch(env: &Env, call: &Call) -> Result<(), TimelockError> {
    if call.value > 0 {
        let native: Address = env
            .storage()
            .instance()
            .get(&DataKey::NativeToken)
            .ok_or(TimelockError::DispatchFailed)?;
        let paid = token::Client::new(env, &native).try_transfer(
            &env.current_contract_address(),
            &call.target,
            &call.value,
        );
        if !matches!(paid, Ok(Ok(()))) {
            return Err(TimelockError::DispatchFailed);
        }
    }

    match env.try_invoke_contract::<Val, TimelockError>(
        &call.target,
        &call.function,
        call.args.clone(),
    ) {
        Ok(Ok(_)) => Ok(()),
        _ => Err(TimelockError::DispatchFailed),
    }
}
