use crate::common::Operation;
use crate::config::AclConfig;
use crate::errors::{AclError, Result};
use std::fmt;
use std::marker::PhantomData;

/// Битовое множество на 64 значения перечисления
pub struct ActionSet<T> {
    bits: u64,
    _marker: PhantomData<T>,
}

impl<T: Copy + Into<u8>> ActionSet<T> {
    pub fn new() -> Self {
        ActionSet { bits: 0, _marker: PhantomData }
    }

    pub fn set(&mut self, action: T) {
        self.bits |= Self::mask(action);
    }

    pub fn clear(&mut self, action: T) {
        self.bits &= !Self::mask(action);
    }

    pub fn is_set(&self, action: T) -> bool {
        self.bits & Self::mask(action) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    fn mask(action: T) -> u64 {
        1u64 << (action.into() & 63)
    }
}

impl<T: Copy + Into<u8>> Default for ActionSet<T> {
    fn default() -> Self {
        ActionSet::new()
    }
}

impl<T> Clone for ActionSet<T> {
    fn clone(&self) -> Self {
        ActionSet { bits: self.bits, _marker: PhantomData }
    }
}

impl<T> fmt::Debug for ActionSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ActionSet({:#x})", self.bits)
    }
}

/// Действия над виртуальной машиной
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VmAction {
    None = 0,
    Migrate = 1,
    LiveMigrate = 2,
    Shutdown = 3,
    ShutdownHard = 4,
    Undeploy = 5,
    UndeployHard = 6,
    Hold = 7,
    Release = 8,
    Stop = 9,
    Suspend = 10,
    Resume = 11,
    Boot = 12,
    Delete = 13,
    DeleteRecreate = 14,
    Reboot = 15,
    RebootHard = 16,
    Resched = 17,
    Unresched = 18,
    Poweroff = 19,
    PoweroffHard = 20,
    DiskAttach = 21,
    DiskDetach = 22,
    NicAttach = 23,
    NicDetach = 24,
    DiskSnapshotCreate = 25,
    DiskSnapshotDelete = 26,
    Terminate = 27,
    TerminateHard = 28,
    DiskResize = 29,
    Deploy = 30,
    Chown = 31,
    Chmod = 32,
    Updateconf = 33,
    Rename = 34,
    Resize = 35,
    Update = 36,
    SnapshotCreate = 37,
    SnapshotDelete = 38,
    SnapshotRevert = 39,
    DiskSaveas = 40,
    DiskSnapshotRevert = 41,
    Recover = 42,
    Retry = 43,
    Monitor = 44,
    DiskSnapshotRename = 45,
    AliasAttach = 46,
    AliasDetach = 47,
    Poll = 48,
    Restore = 49,
    Backup = 50,
    NicUpdate = 51,
    BackupCancel = 52,
    SchedAdd = 53,
    SchedUpdate = 54,
    SchedDelete = 55,
    SgAttach = 56,
    SgDetach = 57,
    PciAttach = 58,
    PciDetach = 59,
}

pub static VM_ACTIONS: [(VmAction, &str); 60] = [
    (VmAction::None, "none"),
    (VmAction::Migrate, "migrate"),
    (VmAction::LiveMigrate, "live-migrate"),
    (VmAction::Shutdown, "shutdown"),
    (VmAction::ShutdownHard, "shutdown-hard"),
    (VmAction::Undeploy, "undeploy"),
    (VmAction::UndeployHard, "undeploy-hard"),
    (VmAction::Hold, "hold"),
    (VmAction::Release, "release"),
    (VmAction::Stop, "stop"),
    (VmAction::Suspend, "suspend"),
    (VmAction::Resume, "resume"),
    (VmAction::Boot, "boot"),
    (VmAction::Delete, "delete"),
    (VmAction::DeleteRecreate, "delete-recreate"),
    (VmAction::Reboot, "reboot"),
    (VmAction::RebootHard, "reboot-hard"),
    (VmAction::Resched, "resched"),
    (VmAction::Unresched, "unresched"),
    (VmAction::Poweroff, "poweroff"),
    (VmAction::PoweroffHard, "poweroff-hard"),
    (VmAction::DiskAttach, "disk-attach"),
    (VmAction::DiskDetach, "disk-detach"),
    (VmAction::NicAttach, "nic-attach"),
    (VmAction::NicDetach, "nic-detach"),
    (VmAction::DiskSnapshotCreate, "disk-snapshot-create"),
    (VmAction::DiskSnapshotDelete, "disk-snapshot-delete"),
    (VmAction::Terminate, "terminate"),
    (VmAction::TerminateHard, "terminate-hard"),
    (VmAction::DiskResize, "disk-resize"),
    (VmAction::Deploy, "deploy"),
    (VmAction::Chown, "chown"),
    (VmAction::Chmod, "chmod"),
    (VmAction::Updateconf, "updateconf"),
    (VmAction::Rename, "rename"),
    (VmAction::Resize, "resize"),
    (VmAction::Update, "update"),
    (VmAction::SnapshotCreate, "snapshot-create"),
    (VmAction::SnapshotDelete, "snapshot-delete"),
    (VmAction::SnapshotRevert, "snapshot-revert"),
    (VmAction::DiskSaveas, "disk-saveas"),
    (VmAction::DiskSnapshotRevert, "disk-snapshot-revert"),
    (VmAction::Recover, "recover"),
    (VmAction::Retry, "retry"),
    (VmAction::Monitor, "monitor"),
    (VmAction::DiskSnapshotRename, "disk-snapshot-rename"),
    (VmAction::AliasAttach, "alias-attach"),
    (VmAction::AliasDetach, "alias-detach"),
    (VmAction::Poll, "poll"),
    (VmAction::Restore, "restore"),
    (VmAction::Backup, "backup"),
    (VmAction::NicUpdate, "nic-update"),
    (VmAction::BackupCancel, "backup-cancel"),
    (VmAction::SchedAdd, "sched-add"),
    (VmAction::SchedUpdate, "sched-update"),
    (VmAction::SchedDelete, "sched-delete"),
    (VmAction::SgAttach, "sg-attach"),
    (VmAction::SgDetach, "sg-detach"),
    (VmAction::PciAttach, "pci-attach"),
    (VmAction::PciDetach, "pci-detach"),
];

impl VmAction {
    pub fn name(self) -> &'static str {
        VM_ACTIONS.iter().find(|(a, _)| *a == self).map(|(_, n)| *n).unwrap_or("none")
    }

    pub fn from_name(name: &str) -> Option<VmAction> {
        VM_ACTIONS.iter().find(|(_, n)| *n == name).map(|(a, _)| *a)
    }
}

impl From<VmAction> for u8 {
    fn from(action: VmAction) -> u8 {
        action as u8
    }
}

impl fmt::Display for VmAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration names standing for several actions at once
fn expand_group(name: &str) -> Option<&'static [VmAction]> {
    use VmAction as A;

    let actions: &'static [VmAction] = match name {
        "disk-snapshot" => &[A::DiskSnapshotCreate, A::DiskSnapshotDelete, A::DiskSnapshotRevert, A::DiskSnapshotRename],
        "snapshot" => &[A::SnapshotCreate, A::SnapshotDelete, A::SnapshotRevert],
        "disk-attach" => &[A::DiskAttach, A::DiskDetach],
        "nic-attach" => &[A::NicAttach, A::NicDetach, A::NicUpdate, A::AliasAttach, A::AliasDetach],
        "sg-attach" => &[A::SgAttach, A::SgDetach],
        "pci-attach" => &[A::PciAttach, A::PciDetach],
        "sched-action" => &[A::SchedAdd, A::SchedUpdate, A::SchedDelete],
        "terminate" => &[A::Terminate, A::TerminateHard],
        "undeploy" => &[A::Undeploy, A::UndeployHard],
        "reboot" => &[A::Reboot, A::RebootHard],
        "poweroff" => &[A::Poweroff, A::PoweroffHard],
        "backup" => &[A::Backup, A::BackupCancel],
        "migrate" => &[A::Migrate, A::LiveMigrate],
        _ => return None,
    };

    Some(actions)
}

/// Уровень прав, требуемый для каждого действия над ВМ
#[derive(Debug, Clone, Default)]
pub struct VmActions {
    use_actions: ActionSet<VmAction>,
    manage_actions: ActionSet<VmAction>,
    admin_actions: ActionSet<VmAction>,
}

impl VmActions {
    pub fn new() -> Self {
        VmActions::default()
    }

    pub fn from_config(config: &AclConfig) -> Result<Self> {
        let mut actions = VmActions::new();
        actions.set_auth_ops(&config.vm_admin_operations, &config.vm_manage_operations, &config.vm_use_operations)?;
        Ok(actions)
    }

    /// Re-parses the three comma separated lists. On error the previous sets are kept.
    pub fn set_auth_ops(&mut self, admin: &str, manage: &str, use_ops: &str) -> Result<()> {
        let admin_actions = parse_actions(admin)?;
        let manage_actions = parse_actions(manage)?;
        let use_actions = parse_actions(use_ops)?;

        self.admin_actions = admin_actions;
        self.manage_actions = manage_actions;
        self.use_actions = use_actions;

        Ok(())
    }

    /// Unconfigured actions require USE
    pub fn get_auth_op(&self, action: VmAction) -> Operation {
        if self.admin_actions.is_set(action) {
            Operation::Admin
        } else if self.manage_actions.is_set(action) {
            Operation::Manage
        } else {
            Operation::Use
        }
    }

    pub fn admin_actions(&self) -> &ActionSet<VmAction> {
        &self.admin_actions
    }

    pub fn manage_actions(&self) -> &ActionSet<VmAction> {
        &self.manage_actions
    }

    pub fn use_actions(&self) -> &ActionSet<VmAction> {
        &self.use_actions
    }
}

fn parse_actions(src: &str) -> Result<ActionSet<VmAction>> {
    let mut set = ActionSet::new();

    for name in src.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
        if let Some(group) = expand_group(&name) {
            for action in group {
                set.set(*action);
            }
            continue;
        }

        match VmAction::from_name(&name) {
            Some(action) => set.set(action),
            None => return Err(AclError::Parse(format!("unknown VM operation: {}", name))),
        }
    }

    Ok(set)
}
