//! Typed clients the governor uses to reach the votes token and the
//! timelock without linking their contract code.

use soroban_sdk::{contractclient, Address, BytesN, Env, Vec};

use crate::call::{Call, OperationState};

#[contractclient(name = "VotesClient")]
pub trait Votes {
    fn clock(env: Env) -> u32;
    fn get_votes(env: Env, account: Address) -> i128;
    fn get_past_votes(env: Env, account: Address, ledger: u32) -> i128;
    fn get_past_total_supply(env: Env, ledger: u32) -> i128;
}

#[contractclient(name = "TimelockClient")]
pub trait Timelock {
    fn get_min_delay(env: Env) -> u64;

    fn hash_operation_batch(
        env: Env,
        calls: Vec<Call>,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
    ) -> BytesN<32>;

    fn schedule_batch(
        env: Env,
        proposer: Address,
        calls: Vec<Call>,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
        delay: u64,
    ) -> BytesN<32>;

    fn execute_batch(
        env: Env,
        executor: Address,
        calls: Vec<Call>,
        predecessor: Option<BytesN<32>>,
        salt: BytesN<32>,
    );

    fn cancel(env: Env, canceller: Address, id: BytesN<32>);

    fn get_operation_state(env: Env, id: BytesN<32>) -> OperationState;
}
