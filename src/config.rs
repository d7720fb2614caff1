use crate::errors::{AclError, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_VM_ADMIN_OPERATIONS: &str = "migrate, delete, recover, retry, deploy, resched, backup";

pub const DEFAULT_VM_MANAGE_OPERATIONS: &str = "undeploy, hold, release, stop, suspend, resume, reboot, poweroff, disk-attach, nic-attach, \
     disk-snapshot, terminate, disk-resize, snapshot, updateconf, rename, resize, update, disk-saveas, sched-action, sg-attach, pci-attach";

/// Настройки движка авторизации
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclConfig {
    /// Zone this engine runs in
    pub zone_id: i32,
    pub superuser_uid: i32,
    pub superuser_gid: i32,
    /// Zone is part of a federation, rules must respect the federated objects restriction
    pub federation: bool,

    pub vm_admin_operations: String,
    pub vm_manage_operations: String,
    pub vm_use_operations: String,
}

impl Default for AclConfig {
    fn default() -> Self {
        AclConfig {
            zone_id: 0,
            superuser_uid: 0,
            superuser_gid: 0,
            federation: false,
            vm_admin_operations: DEFAULT_VM_ADMIN_OPERATIONS.to_string(),
            vm_manage_operations: DEFAULT_VM_MANAGE_OPERATIONS.to_string(),
            vm_use_operations: String::new(),
        }
    }
}

impl AclConfig {
    pub fn from_toml_str(src: &str) -> Result<AclConfig> {
        let config: AclConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<AclConfig> {
        let src = std::fs::read_to_string(path)?;
        AclConfig::from_toml_str(&src)
    }

    fn validate(&self) -> Result<()> {
        if self.zone_id < 0 {
            return Err(AclError::Config(format!("zone_id must not be negative, got {}", self.zone_id)));
        }
        Ok(())
    }
}
