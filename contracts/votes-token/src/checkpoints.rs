use soroban_sdk::{contracttype, Address, Env, TryFromVal, Val};

use crate::{DataKey, PERSISTENT_BUMP_AMOUNT, PERSISTENT_LIFETIME_THRESHOLD};

/// Voting power recorded at the end of a ledger.
#[contracttype]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checkpoint {
    pub ledger: u32,
    pub votes: i128,
}

/// An append-only history of checkpoints, ordered by ledger, stored one
/// entry per key so a lookup only touches O(log n) entries.
pub(crate) enum Trace {
    Delegate(Address),
    TotalSupply,
}

impl Trace {
    fn len_key(&self) -> DataKey {
        match self {
            Trace::Delegate(account) => DataKey::NumCheckpoints(account.clone()),
            Trace::TotalSupply => DataKey::NumSupplyCheckpoints,
        }
    }

    fn entry_key(&self, pos: u32) -> DataKey {
        match self {
            Trace::Delegate(account) => DataKey::Checkpoint(account.clone(), pos),
            Trace::TotalSupply => DataKey::SupplyCheckpoint(pos),
        }
    }

    pub fn len(&self, env: &Env) -> u32 {
        read_bumped(env, &self.len_key()).unwrap_or(0)
    }

    pub fn at(&self, env: &Env, pos: u32) -> Option<Checkpoint> {
        read_bumped(env, &self.entry_key(pos))
    }

    fn entry(&self, env: &Env, pos: u32) -> Checkpoint {
        self.at(env, pos).unwrap_or_default()
    }

    /// Current value, 0 when nothing was ever recorded.
    pub fn latest(&self, env: &Env) -> i128 {
        match self.len(env) {
            0 => 0,
            len => self.entry(env, len - 1).votes,
        }
    }

    /// Record `votes` at the current ledger. A second write within the same
    /// ledger replaces the last entry instead of appending.
    pub fn push(&self, env: &Env, votes: i128) {
        let ledger = env.ledger().sequence();
        let len = self.len(env);
        let checkpoint = Checkpoint { ledger, votes };

        if len > 0 && self.entry(env, len - 1).ledger == ledger {
            self.write(env, len - 1, &checkpoint);
            return;
        }

        self.write(env, len, &checkpoint);
        let len_key = self.len_key();
        env.storage().persistent().set(&len_key, &(len + 1));
        env.storage().persistent().extend_ttl(
            &len_key,
            PERSISTENT_LIFETIME_THRESHOLD,
            PERSISTENT_BUMP_AMOUNT,
        );
    }

    /// Value of the last checkpoint with `checkpoint.ledger <= ledger`.
    pub fn upper_lookup(&self, env: &Env, ledger: u32) -> i128 {
        let len = self.len(env);
        if len == 0 {
            return 0;
        }

        // Recent snapshots are the common case.
        let last = self.entry(env, len - 1);
        if last.ledger <= ledger {
            return last.votes;
        }

        let mut low = 0u32;
        let mut high = len - 1;
        while low < high {
            let mid = low + (high - low) / 2;
            if self.entry(env, mid).ledger > ledger {
                high = mid;
            } else {
                low = mid + 1;
            }
        }

        if high == 0 {
            0
        } else {
            self.entry(env, high - 1).votes
        }
    }

    fn write(&self, env: &Env, pos: u32, checkpoint: &Checkpoint) {
        let key = self.entry_key(pos);
        env.storage().persistent().set(&key, checkpoint);
        env.storage().persistent().extend_ttl(
            &key,
            PERSISTENT_LIFETIME_THRESHOLD,
            PERSISTENT_BUMP_AMOUNT,
        );
    }
}

/// Read a persistent entry and extend its TTL when present.
fn read_bumped<V>(env: &Env, key: &DataKey) -> Option<V>
where
    V: TryFromVal<Env, Val>,
{
    let value = env.storage().persistent().get(key);
    if value.is_some() {
        env.storage().persistent().extend_ttl(
            key,
            PERSISTENT_LIFETIME_THRESHOLD,
            PERSISTENT_BUMP_AMOUNT,
        );
    }
    value
}
