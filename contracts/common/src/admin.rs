use soroban_sdk::{symbol_short, Address, Env, IntoVal, TryFromVal, Val};

use crate::access::AccessError;

/// Start handing the single admin seat to `new_admin`. The handover only
/// completes once `new_admin` calls [`accept_admin`].
pub fn propose_admin<K>(
    env: &Env,
    admin_key: &K,
    pending_key: &K,
    current_admin: Address,
    new_admin: Address,
) -> Result<(), AccessError>
where
    K: IntoVal<Env, Val> + TryFromVal<Env, Val> + Clone,
{
    current_admin.require_auth();
    let stored: Address = env
        .storage()
        .instance()
        .get(admin_key)
        .ok_or(AccessError::NotInitialized)?;
    if current_admin != stored {
        return Err(AccessError::NotAdmin);
    }
    env.storage().instance().set(pending_key, &new_admin);

    env.events().publish(
        (symbol_short!("admin"), symbol_short!("proposed")),
        (current_admin, new_admin),
    );
    Ok(())
}

pub fn accept_admin<K>(
    env: &Env,
    admin_key: &K,
    pending_key: &K,
    new_admin: Address,
) -> Result<(), AccessError>
where
    K: IntoVal<Env, Val> + TryFromVal<Env, Val> + Clone,
{
    new_admin.require_auth();
    let pending: Address = env
        .storage()
        .instance()
        .get(pending_key)
        .ok_or(AccessError::NoPendingAdmin)?;
    if new_admin != pending {
        return Err(AccessError::NotAdmin);
    }
    env.storage().instance().set(admin_key, &new_admin);
    env.storage().instance().remove(pending_key);

    env.events().publish(
        (symbol_short!("admin"), symbol_short!("accepted")),
        new_admin,
    );
    Ok(())
}
