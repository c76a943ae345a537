//! Concord - Votes Token (Soroban / SEP-41 compatible)
//! Governance token whose holders delegate checkpointed voting power.
//!
//! Balances confer no votes by themselves: an account must delegate (to
//! itself or someone else) before its tokens count. Every balance change
//! moves voting power between the delegates of the two sides and records a
//! checkpoint at the current ledger, so past power can be queried for any
//! finished ledger.
//!
//! Events:
//! - ("transfer",): [from: Address, to: Address, amount: i128]
//! - ("mint",): [to: Address, amount: i128]
//! - ("burn",): [from: Address, amount: i128]
//! - ("approve",): [owner: Address, spender: Address, amount: i128, expiration_ledger: u32]
//! - ("delegate", delegator): [previous: Option<Address>, new: Option<Address>]
//! - ("votes", delegate): [previous: i128, new: i128]

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Env, String,
};

mod checkpoints;

pub use checkpoints::Checkpoint;
use checkpoints::Trace;

// ============================================================
// Errors
// ============================================================

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum TokenError {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    InsufficientBalance = 5,
    InsufficientAllowance = 6,
    InvalidExpiration = 7,
    MaxSupplyExceeded = 8,
    FutureLookup = 9,
    Overflow = 10,
}

impl From<concord_common::AccessError> for TokenError {
    fn from(err: concord_common::AccessError) -> Self {
        match err {
            concord_common::AccessError::NotInitialized => TokenError::NotInitialized,
            _ => TokenError::Unauthorized,
        }
    }
}

// ============================================================
// Data Types
// ============================================================

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

#[contracttype]
#[derive(Clone)]
pub struct AllowanceValue {
    pub amount: i128,
    pub expiration_ledger: u32,
}

// ============================================================
// Storage Keys
// ============================================================

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    PendingAdmin,
    TotalSupply,
    MaxSupply,
    Metadata,
    Balance(Address),
    Allowance(Address, Address),
    Delegate(Address),
    Checkpoint(Address, u32),
    NumCheckpoints(Address),
    SupplyCheckpoint(u32),
    NumSupplyCheckpoints,
}

// ============================================================
// Contract
// ============================================================

const INSTANCE_LIFETIME_THRESHOLD: u32 = 17_280;
const INSTANCE_BUMP_AMOUNT: u32 = 86_400;
pub(crate) const PERSISTENT_LIFETIME_THRESHOLD: u32 = 34_560;
pub(crate) const PERSISTENT_BUMP_AMOUNT: u32 = 259_200;

#[contract]
pub struct VotesTokenContract;

#[contractimpl]
impl VotesTokenContract {
    /// Initialize the token. `max_supply` caps everything `mint` can ever
    /// create.
    pub fn initialize(
        env: Env,
        admin: Address,
        metadata: TokenMetadata,
        max_supply: i128,
    ) -> Result<(), TokenError> {
        extend_instance(&env);
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(TokenError::AlreadyInitialized);
        }
        admin.require_auth();
        if max_supply <= 0 {
            return Err(TokenError::InvalidAmount);
        }

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::TotalSupply, &0i128);
        env.storage().instance().set(&DataKey::MaxSupply, &max_supply);
        env.storage().instance().set(&DataKey::Metadata, &metadata);
        Ok(())
    }

    pub fn name(env: Env) -> Result<String, TokenError> {
        Ok(metadata(&env)?.name)
    }

    pub fn symbol(env: Env) -> Result<String, TokenError> {
        Ok(metadata(&env)?.symbol)
    }

    pub fn decimals(env: Env) -> Result<u32, TokenError> {
        Ok(metadata(&env)?.decimals)
    }

    pub fn balance(env: Env, id: Address) -> i128 {
        extend_instance(&env);
        read_balance(&env, &id)
    }

    pub fn total_supply(env: Env) -> i128 {
        extend_instance(&env);
        read_total_supply(&env)
    }

    pub fn max_supply(env: Env) -> i128 {
        extend_instance(&env);
        env.storage()
            .instance()
            .get(&DataKey::MaxSupply)
            .unwrap_or(0)
    }

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) -> Result<(), TokenError> {
        extend_instance(&env);
        from.require_auth();
        check_amount(amount)?;

        update(&env, Some(&from), Some(&to), amount)?;
        env.events()
            .publish((symbol_short!("transfer"),), (from, to, amount));
        Ok(())
    }

    pub fn transfer_from(
        env: Env,
        spender: Address,
        from: Address,
        to: Address,
        amount: i128,
    ) -> Result<(), TokenError> {
        extend_instance(&env);
        spender.require_auth();
        check_amount(amount)?;

        spend_allowance(&env, &from, &spender, amount)?;
        update(&env, Some(&from), Some(&to), amount)?;
        env.events()
            .publish((symbol_short!("transfer"),), (from, to, amount));
        Ok(())
    }

    pub fn approve(
        env: Env,
        from: Address,
        spender: Address,
        amount: i128,
        expiration_ledger: u32,
    ) -> Result<(), TokenError> {
        extend_instance(&env);
        from.require_auth();
        if amount < 0 {
            return Err(TokenError::InvalidAmount);
        }
        if amount > 0 && expiration_ledger < env.ledger().sequence() {
            return Err(TokenError::InvalidExpiration);
        }

        let key = DataKey::Allowance(from.clone(), spender.clone());
        let allowance = AllowanceValue {
            amount,
            expiration_ledger,
        };
        env.storage().temporary().set(&key, &allowance);
        if amount > 0 {
            let live_for = expiration_ledger - env.ledger().sequence();
            env.storage().temporary().extend_ttl(&key, live_for, live_for);
        }

        env.events().publish(
            (symbol_short!("approve"),),
            (from, spender, amount, expiration_ledger),
        );
        Ok(())
    }

    pub fn allowance(env: Env, from: Address, spender: Address) -> i128 {
        extend_instance(&env);
        read_allowance(&env, &from, &spender).amount
    }

    /// Mint new tokens (admin only)
    pub fn mint(env: Env, admin: Address, to: Address, amount: i128) -> Result<(), TokenError> {
        extend_instance(&env);
        admin.require_auth();
        let stored_admin: Address = env
            .storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(TokenError::NotInitialized)?;
        if admin != stored_admin {
            return Err(TokenError::Unauthorized);
        }
        check_amount(amount)?;

        update(&env, None, Some(&to), amount)?;
        env.events().publish((symbol_short!("mint"),), (to, amount));
        Ok(())
    }

    pub fn burn(env: Env, from: Address, amount: i128) -> Result<(), TokenError> {
        extend_instance(&env);
        from.require_auth();
        check_amount(amount)?;

        update(&env, Some(&from), None, amount)?;
        env.events().publish((symbol_short!("burn"),), (from, amount));
        Ok(())
    }

    pub fn burn_from(
        env: Env,
        spender: Address,
        from: Address,
        amount: i128,
    ) -> Result<(), TokenError> {
        extend_instance(&env);
        spender.require_auth();
        check_amount(amount)?;

        spend_allowance(&env, &from, &spender, amount)?;
        update(&env, Some(&from), None, amount)?;
        env.events().publish((symbol_short!("burn"),), (from, amount));
        Ok(())
    }

    // ============================================================
    // Delegation & Voting Power
    // ============================================================

    /// Point the delegator's whole balance at `delegatee`. Delegating to
    /// oneself is how a holder activates their own votes.
    pub fn delegate(env: Env, delegator: Address, delegatee: Address) -> Result<(), TokenError> {
        extend_instance(&env);
        delegator.require_auth();
        set_delegate(&env, &delegator, Some(delegatee))
    }

    /// Withdraw delegated power; the balance stops counting anywhere.
    pub fn revoke_delegation(env: Env, delegator: Address) -> Result<(), TokenError> {
        extend_instance(&env);
        delegator.require_auth();
        set_delegate(&env, &delegator, None)
    }

    pub fn delegates(env: Env, account: Address) -> Option<Address> {
        extend_instance(&env);
        read_delegate(&env, &account)
    }

    /// The clock governance snapshots are taken against.
    pub fn clock(env: Env) -> u32 {
        extend_instance(&env);
        env.ledger().sequence()
    }

    pub fn get_votes(env: Env, account: Address) -> i128 {
        extend_instance(&env);
        Trace::Delegate(account).latest(&env)
    }

    /// Voting power of `account` at the end of `ledger`. Only finished
    /// ledgers can be queried.
    pub fn get_past_votes(env: Env, account: Address, ledger: u32) -> Result<i128, TokenError> {
        extend_instance(&env);
        check_past(&env, ledger)?;
        Ok(Trace::Delegate(account).upper_lookup(&env, ledger))
    }

    pub fn get_past_total_supply(env: Env, ledger: u32) -> Result<i128, TokenError> {
        extend_instance(&env);
        check_past(&env, ledger)?;
        Ok(Trace::TotalSupply.upper_lookup(&env, ledger))
    }

    pub fn num_checkpoints(env: Env, account: Address) -> u32 {
        extend_instance(&env);
        Trace::Delegate(account).len(&env)
    }

    pub fn checkpoint_at(env: Env, account: Address, pos: u32) -> Option<Checkpoint> {
        extend_instance(&env);
        Trace::Delegate(account).at(&env, pos)
    }

    // ============================================================
    // Admin
    // ============================================================

    pub fn propose_admin(env: Env, current_admin: Address, new_admin: Address) -> Result<(), TokenError> {
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

    pub fn accept_admin(env: Env, new_admin: Address) -> Result<(), TokenError> {
        extend_instance(&env);
        concord_common::admin::accept_admin(&env, &DataKey::Admin, &DataKey::PendingAdmin, new_admin)?;
        Ok(())
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

fn check_amount(amount: i128) -> Result<(), TokenError> {
    if amount <= 0 {
        return Err(TokenError::InvalidAmount);
    }
    Ok(())
}

fn check_past(env: &Env, ledger: u32) -> Result<(), TokenError> {
    if ledger >= env.ledger().sequence() {
        return Err(TokenError::FutureLookup);
    }
    Ok(())
}

fn metadata(env: &Env) -> Result<TokenMetadata, TokenError> {
    extend_instance(env);
    env.storage()
        .instance()
        .get(&DataKey::Metadata)
        .ok_or(TokenError::NotInitialized)
}

fn read_balance(env: &Env, id: &Address) -> i128 {
    let key = DataKey::Balance(id.clone());
    match env.storage().persistent().get(&key) {
        Some(balance) => {
            env.storage().persistent().extend_ttl(
                &key,
                PERSISTENT_LIFETIME_THRESHOLD,
                PERSISTENT_BUMP_AMOUNT,
            );
            balance
        }
        None => 0,
    }
}

fn write_balance(env: &Env, id: &Address, balance: i128) {
    let key = DataKey::Balance(id.clone());
    env.storage().persistent().set(&key, &balance);
    env.storage().persistent().extend_ttl(
        &key,
        PERSISTENT_LIFETIME_THRESHOLD,
        PERSISTENT_BUMP_AMOUNT,
    );
}

fn read_total_supply(env: &Env) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::TotalSupply)
        .unwrap_or(0)
}

fn read_allowance(env: &Env, from: &Address, spender: &Address) -> AllowanceValue {
    let key = DataKey::Allowance(from.clone(), spender.clone());
    match env.storage().temporary().get::<DataKey, AllowanceValue>(&key) {
        Some(allowance) if allowance.expiration_ledger >= env.ledger().sequence() => allowance,
        Some(allowance) => AllowanceValue {
            amount: 0,
            expiration_ledger: allowance.expiration_ledger,
        },
        None => AllowanceValue {
            amount: 0,
            expiration_ledger: 0,
        },
    }
}

fn spend_allowance(
    env: &Env,
    from: &Address,
    spender: &Address,
    amount: i128,
) -> Result<(), TokenError> {
    let allowance = read_allowance(env, from, spender);
    if allowance.amount < amount {
        return Err(TokenError::InsufficientAllowance);
    }
    let key = DataKey::Allowance(from.clone(), spender.clone());
    env.storage().temporary().set(
        &key,
        &AllowanceValue {
            amount: allowance.amount - amount,
            expiration_ledger: allowance.expiration_ledger,
        },
    );
    Ok(())
}

fn read_delegate(env: &Env, account: &Address) -> Option<Address> {
    env.storage()
        .persistent()
        .get(&DataKey::Delegate(account.clone()))
}

/// Move `amount` between balances. `None` on the sending side mints, on the
/// receiving side burns. Voting power follows the tokens.
fn update(
    env: &Env,
    from: Option<&Address>,
    to: Option<&Address>,
    amount: i128,
) -> Result<(), TokenError> {
    match from {
        Some(from) => {
            let balance = read_balance(env, from);
            if balance < amount {
                return Err(TokenError::InsufficientBalance);
            }
            write_balance(env, from, balance - amount);
        }
        None => {
            let max_supply: i128 = env
                .storage()
                .instance()
                .get(&DataKey::MaxSupply)
                .ok_or(TokenError::NotInitialized)?;
            let supply = read_total_supply(env)
                .checked_add(amount)
                .ok_or(TokenError::Overflow)?;
            if supply > max_supply {
                return Err(TokenError::MaxSupplyExceeded);
            }
            env.storage().instance().set(&DataKey::TotalSupply, &supply);
            Trace::TotalSupply.push(env, supply);
        }
    }

    match to {
        Some(to) => {
            let balance = read_balance(env, to)
                .checked_add(amount)
                .ok_or(TokenError::Overflow)?;
            write_balance(env, to, balance);
        }
        None => {
            let supply = read_total_supply(env) - amount;
            env.storage().instance().set(&DataKey::TotalSupply, &supply);
            Trace::TotalSupply.push(env, supply);
        }
    }

    move_voting_power(
        env,
        from.and_then(|a| read_delegate(env, a)),
        to.and_then(|a| read_delegate(env, a)),
        amount,
    )
}

fn set_delegate(env: &Env, delegator: &Address, delegatee: Option<Address>) -> Result<(), TokenError> {
    let previous = read_delegate(env, delegator);
    let key = DataKey::Delegate(delegator.clone());
    match &delegatee {
        Some(delegatee) => {
            env.storage().persistent().set(&key, delegatee);
            env.storage().persistent().extend_ttl(
                &key,
                PERSISTENT_LIFETIME_THRESHOLD,
                PERSISTENT_BUMP_AMOUNT,
            );
        }
        None => env.storage().persistent().remove(&key),
    }

    env.events().publish(
        (symbol_short!("delegate"), delegator.clone()),
        (previous.clone(), delegatee.clone()),
    );

    move_voting_power(env, previous, delegatee, read_balance(env, delegator))
}

fn move_voting_power(
    env: &Env,
    from: Option<Address>,
    to: Option<Address>,
    amount: i128,
) -> Result<(), TokenError> {
    if from == to || amount == 0 {
        return Ok(());
    }

    if let Some(from) = from {
        let trace = Trace::Delegate(from.clone());
        let previous = trace.latest(env);
        let votes = previous.checked_sub(amount).ok_or(TokenError::Overflow)?;
        trace.push(env, votes);
        env.events()
            .publish((symbol_short!("votes"), from), (previous, votes));
    }

    if let Some(to) = to {
        let trace = Trace::Delegate(to.clone());
        let previous = trace.latest(env);
        let votes = previous.checked_add(amount).ok_or(TokenError::Overflow)?;
        trace.push(env, votes);
        env.events()
            .publish((symbol_short!("votes"), to), (previous, votes));
    }

    Ok(())
}

mod test;
