//! Role registry stored inside the host contract.
//!
//! Every role has an admin role (by default [`Role::Admin`], which also
//! administers itself). Only holders of a role's admin role may grant or
//! revoke it. Granting or revoking is idempotent: a no-op change succeeds
//! and publishes nothing.
//!
//! Events:
//! - ("role", "granted"): [role: Role, account: Address, sender: Address]
//! - ("role", "revoked"): [role: Role, account: Address, sender: Address]
//! - ("role", "admin"): [role: Role, previous: Role, new: Role]

use soroban_sdk::{contracttype, symbol_short, Address, Env, String};

/// The all-zero Stellar account. Granting a role to it opens that role to
/// every caller for checks made with [`require_role_or_open`].
pub const ANYONE: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

const PERSISTENT_LIFETIME_THRESHOLD: u32 = 120_960;
const PERSISTENT_BUMP_AMOUNT: u32 = 1_051_200;

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Admin,
    Proposer,
    Executor,
    Canceller,
}

#[contracttype]
#[derive(Clone)]
pub enum AccessKey {
    Member(Role, Address),
    RoleAdmin(Role),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessError {
    MissingRole,
    NotAdmin,
    NoPendingAdmin,
    NotInitialized,
}

/// The open-role sentinel address.
pub fn anyone(env: &Env) -> Address {
    Address::from_string(&String::from_str(env, ANYONE))
}

pub fn has_role(env: &Env, role: Role, account: &Address) -> bool {
    let key = AccessKey::Member(role, account.clone());
    let storage = env.storage().persistent();
    if storage.has(&key) {
        storage.extend_ttl(&key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
        true
    } else {
        false
    }
}

/// Whether `role` has been opened to everyone through the sentinel.
pub fn is_open(env: &Env, role: Role) -> bool {
    has_role(env, role, &anyone(env))
}

pub fn require_role(env: &Env, role: Role, account: &Address) -> Result<(), AccessError> {
    if has_role(env, role, account) {
        Ok(())
    } else {
        Err(AccessError::MissingRole)
    }
}

/// Like [`require_role`] but also passes when the role is open.
pub fn require_role_or_open(env: &Env, role: Role, account: &Address) -> Result<(), AccessError> {
    if is_open(env, role) {
        return Ok(());
    }
    require_role(env, role, account)
}

pub fn role_admin(env: &Env, role: Role) -> Role {
    env.storage()
        .instance()
        .get(&AccessKey::RoleAdmin(role))
        .unwrap_or(Role::Admin)
}

pub fn set_role_admin(env: &Env, role: Role, admin_role: Role) {
    let previous = role_admin(env, role);
    env.storage()
        .instance()
        .set(&AccessKey::RoleAdmin(role), &admin_role);
    env.events().publish(
        (symbol_short!("role"), symbol_short!("admin")),
        (role, previous, admin_role),
    );
}

/// Grant `role` to `account` on behalf of `caller`, who must hold the
/// role's admin role. Returns whether membership changed.
pub fn grant_role(
    env: &Env,
    caller: &Address,
    role: Role,
    account: &Address,
) -> Result<bool, AccessError> {
    caller.require_auth();
    require_role(env, role_admin(env, role), caller)?;
    Ok(grant(env, role, account, caller))
}

/// Revoke `role` from `account` on behalf of `caller`, who must hold the
/// role's admin role. Returns whether membership changed.
pub fn revoke_role(
    env: &Env,
    caller: &Address,
    role: Role,
    account: &Address,
) -> Result<bool, AccessError> {
    caller.require_auth();
    require_role(env, role_admin(env, role), caller)?;
    Ok(revoke(env, role, account, caller))
}

/// Drop one of the caller's own roles.
pub fn renounce_role(env: &Env, account: &Address, role: Role) -> bool {
    account.require_auth();
    revoke(env, role, account, account)
}

/// Unchecked grant, for initialization.
pub fn grant(env: &Env, role: Role, account: &Address, sender: &Address) -> bool {
    if has_role(env, role, account) {
        return false;
    }
    let key = AccessKey::Member(role, account.clone());
    env.storage().persistent().set(&key, &true);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);

    env.events().publish(
        (symbol_short!("role"), symbol_short!("granted")),
        (role, account.clone(), sender.clone()),
    );
    true
}

fn revoke(env: &Env, role: Role, account: &Address, sender: &Address) -> bool {
    if !has_role(env, role, account) {
        return false;
    }
    env.storage()
        .persistent()
        .remove(&AccessKey::Member(role, account.clone()));

    env.events().publish(
        (symbol_short!("role"), symbol_short!("revoked")),
        (role, account.clone(), sender.clone()),
    );
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{contract, contracterror, contractimpl, testutils::Address as _, Env};

    #[contracterror]
    #[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
    #[repr(u32)]
    pub enum HostError {
        MissingRole = 1,
    }

    impl From<AccessError> for HostError {
        fn from(_: AccessError) -> Self {
            HostError::MissingRole
        }
    }

    #[contract]
    pub struct Host;

    #[contractimpl]
    impl Host {
        pub fn init(env: Env, admin: Address) {
            grant(&env, Role::Admin, &admin, &env.current_contract_address());
        }

        pub fn grant(env: Env, caller: Address, role: Role, account: Address) -> Result<bool, HostError> {
            Ok(grant_role(&env, &caller, role, &account)?)
        }

        pub fn revoke(env: Env, caller: Address, role: Role, account: Address) -> Result<bool, HostError> {
            Ok(revoke_role(&env, &caller, role, &account)?)
        }

        pub fn renounce(env: Env, account: Address, role: Role) -> bool {
            renounce_role(&env, &account, role)
        }

        pub fn has(env: Env, role: Role, account: Address) -> bool {
            has_role(&env, role, &account)
        }

        pub fn allowed(env: Env, role: Role, account: Address) -> bool {
            require_role_or_open(&env, role, &account).is_ok()
        }

        pub fn set_admin(env: Env, role: Role, admin_role: Role) {
            set_role_admin(&env, role, admin_role);
        }

        pub fn admin_of(env: Env, role: Role) -> Role {
            role_admin(&env, role)
        }

        pub fn sentinel(env: Env) -> Address {
            anyone(&env)
        }
    }

    fn setup(env: &Env) -> (HostClient<'_>, Address) {
        let id = env.register_contract(None, Host);
        let client = HostClient::new(env, &id);
        let admin = Address::generate(env);
        client.init(&admin);
        (client, admin)
    }

    #[test]
    fn test_admin_grants_and_revokes() {
        let env = Env::default();
        env.mock_all_auths();
        let (c, admin) = setup(&env);
        let member = Address::generate(&env);

        assert!(c.grant(&admin, &Role::Proposer, &member));
        assert!(c.has(&Role::Proposer, &member));
        assert!(c.revoke(&admin, &Role::Proposer, &member));
        assert!(!c.has(&Role::Proposer, &member));
    }

    #[test]
    fn test_grant_is_idempotent() {
        let env = Env::default();
        env.mock_all_auths();
        let (c, admin) = setup(&env);
        let member = Address::generate(&env);

        assert!(c.grant(&admin, &Role::Executor, &member));
        assert!(!c.grant(&admin, &Role::Executor, &member));
        assert!(!c.revoke(&admin, &Role::Canceller, &member));
    }

    #[test]
    fn test_non_admin_cannot_grant() {
        let env = Env::default();
        env.mock_all_auths();
        let (c, _) = setup(&env);
        let stranger = Address::generate(&env);

        assert_eq!(
            c.try_grant(&stranger, &Role::Proposer, &stranger),
            Err(Ok(HostError::MissingRole))
        );
        assert!(!c.has(&Role::Proposer, &stranger));
    }

    #[test]
    fn test_admin_role_administers_itself() {
        let env = Env::default();
        env.mock_all_auths();
        let (c, admin) = setup(&env);
        let successor = Address::generate(&env);

        assert!(c.grant(&admin, &Role::Admin, &successor));
        assert!(c.revoke(&successor, &Role::Admin, &admin));
        assert_eq!(
            c.try_grant(&admin, &Role::Proposer, &admin),
            Err(Ok(HostError::MissingRole))
        );
    }

    #[test]
    fn test_open_role_through_sentinel() {
        let env = Env::default();
        env.mock_all_auths();
        let (c, admin) = setup(&env);
        let stranger = Address::generate(&env);

        assert!(!c.allowed(&Role::Executor, &stranger));
        c.grant(&admin, &Role::Executor, &c.sentinel());
        assert!(c.allowed(&Role::Executor, &stranger));
        // strict checks ignore the sentinel
        assert!(!c.has(&Role::Executor, &stranger));
        assert!(!c.allowed(&Role::Proposer, &stranger));
    }

    #[test]
    fn test_custom_role_admin() {
        let env = Env::default();
        env.mock_all_auths();
        let (c, admin) = setup(&env);
        let proposer = Address::generate(&env);
        let canceller = Address::generate(&env);

        c.grant(&admin, &Role::Proposer, &proposer);
        c.set_admin(&Role::Canceller, &Role::Proposer);
        assert_eq!(c.admin_of(&Role::Canceller), Role::Proposer);
        assert!(c.grant(&proposer, &Role::Canceller, &canceller));
    }

    #[test]
    fn test_renounce_role() {
        let env = Env::default();
        env.mock_all_auths();
        let (c, admin) = setup(&env);

        assert!(c.renounce(&admin, &Role::Admin));
        assert!(!c.has(&Role::Admin, &admin));
        assert!(!c.renounce(&admin, &Role::Admin));
    }

    #[test]
    #[should_panic]
    fn test_grant_requires_caller_auth() {
        let env = Env::default();
        let id = env.register_contract(None, Host);
        let c = HostClient::new(&env, &id);
        let admin = Address::generate(&env);
        c.init(&admin);
        c.grant(&admin, &Role::Proposer, &Address::generate(&env));
    }
}
