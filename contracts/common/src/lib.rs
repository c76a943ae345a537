//! Concord - Common
//! Building blocks shared by the governance contracts: the role registry the
//! timelock embeds, two-step admin handover, the `Call` record proposals and
//! operations are built from, and typed clients between contracts.

#![no_std]

pub mod access;
pub mod admin;
pub mod call;
pub mod interface;

pub use access::{AccessError, Role};
pub use call::{content_hash, Call, OperationState};
