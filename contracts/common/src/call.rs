use soroban_sdk::{contracttype, xdr::ToXdr, Address, BytesN, Env, IntoVal, Symbol, Val, Vec};

/// One contract invocation carried by a proposal or a timelock operation.
/// `value` is paid to `target` in the timelock's native token before the
/// call is made.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Call {
    pub target: Address,
    pub value: i128,
    pub function: Symbol,
    pub args: Vec<Val>,
}

impl Call {
    pub fn new(target: Address, function: Symbol, args: Vec<Val>) -> Self {
        Call {
            target,
            value: 0,
            function,
            args,
        }
    }

    pub fn with_value(mut self, value: i128) -> Self {
        self.value = value;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.value >= 0
    }
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum OperationState {
    Unset = 0,
    Waiting = 1,
    Ready = 2,
    Done = 3,
}

/// keccak256 over the XDR encoding of `value`. XDR keeps vectors and
/// tuples in order, so equal argument lists always hash equally.
pub fn content_hash<T>(env: &Env, value: T) -> BytesN<32>
where
    T: IntoVal<Env, Val>,
{
    let encoded = value.to_xdr(env);
    env.crypto().keccak256(&encoded).into()
}
