pub mod acl_manager;
pub mod acl_rule;
pub mod auth_request;
mod authorize_item;
pub mod bitfield;
/// Object types, rights, operations and the collaborator traits
pub mod common;
pub mod config;
pub mod errors;
pub mod pool_object_auth;
pub mod trace;
pub mod vm_actions;

pub use crate::acl_manager::{AclManager, AuthResult, ReverseSearch};
pub use crate::acl_rule::{AclRule, AclRuleRecord};
pub use crate::auth_request::{AuthItem, AuthRequest, AuthTarget};
pub use crate::common::{MemoryStore, ObjectType, Operation, PermissionsProvider, Right, RuleStore};
pub use crate::config::AclConfig;
pub use crate::errors::{AclError, Result};
pub use crate::pool_object_auth::{LockLevel, PoolObjectAuth};
pub use crate::trace::{TraceInfo, TraceMode};
pub use crate::vm_actions::{VmAction, VmActions};
