#![cfg(test)]
use super::*;
use soroban_sdk::{
    testutils::{
        storage::{Instance as _, Persistent as _},
        Address as _, Ledger,
    },
    Address, Env, String,
};

const MAX_SUPPLY: i128 = 1_000_000;

fn metadata(env: &Env) -> TokenMetadata {
    TokenMetadata {
        name: String::from_str(env, "Concord Governance"),
        symbol: String::from_str(env, "CGT"),
        decimals: 7,
    }
}

fn setup(env: &Env) -> (VotesTokenContractClient<'_>, Address) {
    env.ledger().with_mut(|li| li.sequence_number = 100);
    let admin = Address::generate(env);
    let id = env.register_contract(None, VotesTokenContract);
    let c = VotesTokenContractClient::new(env, &id);
    c.initialize(&admin, &metadata(env), &MAX_SUPPLY);
    (c, admin)
}

fn advance(env: &Env, ledgers: u32) {
    env.ledger().with_mut(|li| li.sequence_number += ledgers);
}

// ─── initialize ──────────────────────────────────────────────────────────────

#[test]
fn test_initialize() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, _) = setup(&env);
    assert_eq!(c.total_supply(), 0);
    assert_eq!(c.max_supply(), MAX_SUPPLY);
    assert_eq!(c.decimals(), 7);
    assert_eq!(c.symbol(), String::from_str(&env, "CGT"));
}

#[test]
fn test_initialize_twice() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    assert_eq!(
        c.try_initialize(&admin, &metadata(&env), &MAX_SUPPLY),
        Err(Ok(TokenError::AlreadyInitialized))
    );
}

#[test]
#[should_panic]
fn test_initialize_non_admin_fails() {
    let env = Env::default();
    let id = env.register_contract(None, VotesTokenContract);
    let c = VotesTokenContractClient::new(&env, &id);
    c.initialize(&Address::generate(&env), &metadata(&env), &MAX_SUPPLY);
}

// ─── supply ──────────────────────────────────────────────────────────────────

#[test]
fn test_mint() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let user = Address::generate(&env);
    c.mint(&admin, &user, &1_000i128);
    assert_eq!(c.balance(&user), 1_000);
    assert_eq!(c.total_supply(), 1_000);
}

#[test]
fn test_mint_unauthorized() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, _) = setup(&env);
    let stranger = Address::generate(&env);
    assert_eq!(
        c.try_mint(&stranger, &stranger, &1_000i128),
        Err(Ok(TokenError::Unauthorized))
    );
}

#[test]
fn test_mint_capped_by_max_supply() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let user = Address::generate(&env);
    c.mint(&admin, &user, &MAX_SUPPLY);
    assert_eq!(
        c.try_mint(&admin, &user, &1i128),
        Err(Ok(TokenError::MaxSupplyExceeded))
    );
    assert_eq!(c.total_supply(), MAX_SUPPLY);
}

#[test]
fn test_burn_lowers_past_supply() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let user = Address::generate(&env);
    c.mint(&admin, &user, &1_000i128);
    advance(&env, 1);
    c.burn(&user, &300i128);
    advance(&env, 1);

    assert_eq!(c.balance(&user), 700);
    assert_eq!(c.total_supply(), 700);
    assert_eq!(c.get_past_total_supply(&100), 1_000);
    assert_eq!(c.get_past_total_supply(&101), 700);
    assert_eq!(c.get_past_total_supply(&99), 0);
}

// ─── transfers ───────────────────────────────────────────────────────────────

#[test]
fn test_transfer() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let from = Address::generate(&env);
    let to = Address::generate(&env);
    c.mint(&admin, &from, &1_000i128);
    c.transfer(&from, &to, &400i128);
    assert_eq!(c.balance(&from), 600);
    assert_eq!(c.balance(&to), 400);
}

#[test]
fn test_transfer_exceeding_balance_fails() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let from = Address::generate(&env);
    let to = Address::generate(&env);
    c.mint(&admin, &from, &10i128);
    assert_eq!(
        c.try_transfer(&from, &to, &11i128),
        Err(Ok(TokenError::InsufficientBalance))
    );
    assert_eq!(c.balance(&from), 10);
    assert_eq!(c.balance(&to), 0);
}

#[test]
fn test_transfer_from_spends_allowance() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let owner = Address::generate(&env);
    let spender = Address::generate(&env);
    let to = Address::generate(&env);
    c.mint(&admin, &owner, &1_000i128);
    c.approve(&owner, &spender, &500i128, &1_000u32);
    assert_eq!(c.allowance(&owner, &spender), 500);

    c.transfer_from(&spender, &owner, &to, &200i128);
    assert_eq!(c.allowance(&owner, &spender), 300);
    assert_eq!(c.balance(&to), 200);
    assert_eq!(
        c.try_transfer_from(&spender, &owner, &to, &301i128),
        Err(Ok(TokenError::InsufficientAllowance))
    );
}

#[test]
fn test_expired_allowance_is_zero() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let owner = Address::generate(&env);
    let spender = Address::generate(&env);
    c.mint(&admin, &owner, &1_000i128);
    c.approve(&owner, &spender, &500i128, &105u32);
    advance(&env, 6);
    assert_eq!(c.allowance(&owner, &spender), 0);
}

// ─── voting power ────────────────────────────────────────────────────────────

#[test]
fn test_balance_without_delegation_has_no_votes() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let user = Address::generate(&env);
    c.mint(&admin, &user, &1_000i128);
    assert_eq!(c.get_votes(&user), 0);
    assert_eq!(c.delegates(&user), None);
}

#[test]
fn test_self_delegation_activates_votes() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let user = Address::generate(&env);
    c.mint(&admin, &user, &1_000i128);
    c.delegate(&user, &user);
    assert_eq!(c.get_votes(&user), 1_000);
    assert_eq!(c.delegates(&user), Some(user.clone()));
    assert_eq!(c.num_checkpoints(&user), 1);
}

#[test]
fn test_past_votes_follow_transfers() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let owner = Address::generate(&env);
    let addr1 = Address::generate(&env);

    c.mint(&admin, &owner, &1_000_000i128);
    c.delegate(&owner, &owner);
    let before_transfer = env.ledger().sequence();
    advance(&env, 1);

    c.transfer(&owner, &addr1, &1_000i128);
    c.delegate(&addr1, &addr1);
    let after_transfer = env.ledger().sequence();
    advance(&env, 1);

    assert_eq!(c.get_past_votes(&addr1, &before_transfer), 0);
    assert_eq!(c.get_past_votes(&addr1, &after_transfer), 1_000);
    assert_eq!(c.get_past_votes(&owner, &before_transfer), 1_000_000);
    assert_eq!(c.get_past_votes(&owner, &after_transfer), 999_000);
}

#[test]
fn test_transfer_between_undelegated_holders_moves_no_votes() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let owner = Address::generate(&env);
    let addr1 = Address::generate(&env);
    c.mint(&admin, &owner, &1_000i128);
    c.delegate(&owner, &owner);
    c.transfer(&owner, &addr1, &400i128);

    assert_eq!(c.get_votes(&owner), 600);
    assert_eq!(c.get_votes(&addr1), 0);
}

#[test]
fn test_future_lookup_rejected() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let user = Address::generate(&env);
    c.mint(&admin, &user, &1_000i128);
    c.delegate(&user, &user);

    let now = env.ledger().sequence();
    assert_eq!(
        c.try_get_past_votes(&user, &now),
        Err(Ok(TokenError::FutureLookup))
    );
    assert_eq!(
        c.try_get_past_total_supply(&(now + 10)),
        Err(Ok(TokenError::FutureLookup))
    );
}

#[test]
fn test_one_checkpoint_per_ledger() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let owner = Address::generate(&env);
    let other = Address::generate(&env);
    c.mint(&admin, &owner, &1_000i128);
    c.delegate(&owner, &owner);
    c.transfer(&owner, &other, &100i128);
    c.transfer(&owner, &other, &100i128);
    assert_eq!(c.num_checkpoints(&owner), 1);
    assert_eq!(c.checkpoint_at(&owner, &0).unwrap().votes, 800);

    advance(&env, 1);
    c.transfer(&owner, &other, &100i128);
    assert_eq!(c.num_checkpoints(&owner), 2);
    let last = c.checkpoint_at(&owner, &1).unwrap();
    assert_eq!(last.ledger, 101);
    assert_eq!(last.votes, 700);
}

#[test]
fn test_redelegation_moves_full_balance() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let holder = Address::generate(&env);
    let first = Address::generate(&env);
    let second = Address::generate(&env);
    c.mint(&admin, &holder, &500i128);

    c.delegate(&holder, &first);
    assert_eq!(c.get_votes(&first), 500);
    assert_eq!(c.get_votes(&holder), 0);

    advance(&env, 1);
    c.delegate(&holder, &second);
    assert_eq!(c.get_votes(&first), 0);
    assert_eq!(c.get_votes(&second), 500);

    advance(&env, 1);
    assert_eq!(c.get_past_votes(&first, &100), 500);
    assert_eq!(c.get_past_votes(&first, &101), 0);
    assert_eq!(c.get_past_votes(&second, &101), 500);
}

#[test]
fn test_revoke_delegation() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let delegator = Address::generate(&env);
    let delegate = Address::generate(&env);
    c.mint(&admin, &delegator, &1_000i128);
    c.delegate(&delegator, &delegate);
    c.revoke_delegation(&delegator);
    assert!(c.delegates(&delegator).is_none());
    assert_eq!(c.get_votes(&delegate), 0);
    assert_eq!(c.get_votes(&delegator), 0);
}

#[test]
fn test_lookup_over_long_history() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let holder = Address::generate(&env);
    c.delegate(&holder, &holder);

    // one mint of 10 every other ledger: ledgers 100, 102, ..., 138
    for _ in 0..20 {
        c.mint(&admin, &holder, &10i128);
        advance(&env, 2);
    }

    assert_eq!(c.num_checkpoints(&holder), 20);
    assert_eq!(c.get_past_votes(&holder, &99), 0);
    assert_eq!(c.get_past_votes(&holder, &100), 10);
    assert_eq!(c.get_past_votes(&holder, &101), 10);
    assert_eq!(c.get_past_votes(&holder, &117), 90);
    assert_eq!(c.get_past_votes(&holder, &118), 100);
    assert_eq!(c.get_past_votes(&holder, &139), 200);
}

// ─── admin handover ──────────────────────────────────────────────────────────

#[test]
fn test_admin_handover() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let next = Address::generate(&env);
    let user = Address::generate(&env);

    c.propose_admin(&admin, &next);
    c.accept_admin(&next);
    c.mint(&next, &user, &5i128);
    assert_eq!(
        c.try_mint(&admin, &user, &5i128),
        Err(Ok(TokenError::Unauthorized))
    );
}

// ─── storage lifetime ────────────────────────────────────────────────────────

fn instance_ttl(env: &Env, c: &VotesTokenContractClient) -> u32 {
    env.as_contract(&c.address, || env.storage().instance().get_ttl())
}

fn persistent_ttl(env: &Env, c: &VotesTokenContractClient, key: &DataKey) -> u32 {
    env.as_contract(&c.address, || env.storage().persistent().get_ttl(key))
}

#[test]
fn test_clock_extends_instance() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, _) = setup(&env);

    let ttl = instance_ttl(&env, &c);
    advance(&env, ttl - 1_000);
    assert!(instance_ttl(&env, &c) < INSTANCE_LIFETIME_THRESHOLD);

    assert_eq!(c.clock(), env.ledger().sequence());
    assert_eq!(instance_ttl(&env, &c), INSTANCE_BUMP_AMOUNT);
}

#[test]
fn test_vote_lookup_extends_idle_history() {
    let env = Env::default();
    env.mock_all_auths();
    let (c, admin) = setup(&env);
    let holder = Address::generate(&env);
    c.mint(&admin, &holder, &1_000i128);
    c.delegate(&holder, &holder);
    let delegated_at = env.ledger().sequence();

    let entry = DataKey::Checkpoint(holder.clone(), 0);
    let count = DataKey::NumCheckpoints(holder.clone());
    while persistent_ttl(&env, &c, &entry) >= PERSISTENT_LIFETIME_THRESHOLD {
        advance(&env, 10_000);
        c.clock();
    }
    assert!(persistent_ttl(&env, &c, &count) < PERSISTENT_LIFETIME_THRESHOLD);

    assert_eq!(c.get_past_votes(&holder, &delegated_at), 1_000);
    assert_eq!(persistent_ttl(&env, &c, &entry), PERSISTENT_BUMP_AMOUNT);
    assert_eq!(persistent_ttl(&env, &c, &count), PERSISTENT_BUMP_AMOUNT);
}
