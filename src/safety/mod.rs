//! Safety layer for Ferrule.
//!
//! Two pieces of process-lifetime state stand between the model and the
//! local machine:
//!
//! - [`MutationGuard`]: in-place substitutions require an identical preview.
//! - [`PermissionGate`]: shell commands require operator approval unless the
//!   binary was marked "always allow".
//!
//! Both are owned by the agent loop and handed to tools by `&mut` reference.

pub mod guard;
pub mod permission;

pub use guard::{Applied, MutationGuard, OperationKey, Preview};
pub use permission::{
    leading_binary, Operator, PermissionGate, ScriptedOperator, TerminalOperator, Verdict,
};
