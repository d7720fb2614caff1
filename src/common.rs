use crate::errors::Result;
use crate::pool_object_auth::PoolObjectAuth;
use crate::AclRule;
use core::fmt;

/// Типы объектов, на которые могут выдаваться права.
/// Каждый тип занимает отдельный бит старшей половины поля resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u64)]
pub enum ObjectType {
    Vm = 0x0000_0010_0000_0000,
    Host = 0x0000_0020_0000_0000,
    Net = 0x0000_0040_0000_0000,
    Image = 0x0000_0080_0000_0000,
    User = 0x0000_0100_0000_0000,
    Template = 0x0000_0200_0000_0000,
    Group = 0x0000_0400_0000_0000,
    Datastore = 0x0000_1000_0000_0000,
    Cluster = 0x0000_2000_0000_0000,
    Document = 0x0000_4000_0000_0000,
    Zone = 0x0000_8000_0000_0000,
    SecGroup = 0x0001_0000_0000_0000,
    Vdc = 0x0002_0000_0000_0000,
    VRouter = 0x0004_0000_0000_0000,
    Marketplace = 0x0008_0000_0000_0000,
    MarketplaceApp = 0x0010_0000_0000_0000,
    VmGroup = 0x0020_0000_0000_0000,
    VnTemplate = 0x0040_0000_0000_0000,
    BackupJob = 0x0100_0000_0000_0000,
}

/// Ordered name table; rendering walks it front to back and parsing searches it.
pub static OBJECT_TYPES: [(ObjectType, &str); 19] = [
    (ObjectType::Vm, "VM"),
    (ObjectType::Host, "HOST"),
    (ObjectType::Net, "NET"),
    (ObjectType::Image, "IMAGE"),
    (ObjectType::User, "USER"),
    (ObjectType::Template, "TEMPLATE"),
    (ObjectType::Group, "GROUP"),
    (ObjectType::Datastore, "DATASTORE"),
    (ObjectType::Cluster, "CLUSTER"),
    (ObjectType::Document, "DOCUMENT"),
    (ObjectType::Zone, "ZONE"),
    (ObjectType::SecGroup, "SECGROUP"),
    (ObjectType::Vdc, "VDC"),
    (ObjectType::VRouter, "VROUTER"),
    (ObjectType::Marketplace, "MARKETPLACE"),
    (ObjectType::MarketplaceApp, "MARKETPLACEAPP"),
    (ObjectType::VmGroup, "VMGROUP"),
    (ObjectType::VnTemplate, "VNTEMPLATE"),
    (ObjectType::BackupJob, "BACKUPJOB"),
];

impl ObjectType {
    pub fn bit(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        OBJECT_TYPES.iter().find(|(t, _)| *t == self).map(|(_, n)| *n).unwrap_or("")
    }

    pub fn from_name(name: &str) -> Option<ObjectType> {
        OBJECT_TYPES.iter().find(|(_, n)| n.eq_ignore_ascii_case(name)).map(|(t, _)| *t)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Битовые поля для прав
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum Right {
    /// Использование
    Use = 0x1,

    /// Управление
    Manage = 0x2,

    /// Администрирование
    Admin = 0x4,

    /// Создание
    Create = 0x8,
}

pub static RIGHTS: [(Right, &str); 4] = [(Right::Use, "USE"), (Right::Manage, "MANAGE"), (Right::Admin, "ADMIN"), (Right::Create, "CREATE")];

pub const RIGHTS_MASK: u64 = 0xF;

impl Right {
    pub fn bit(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        RIGHTS.iter().find(|(r, _)| *r == self).map(|(_, n)| *n).unwrap_or("")
    }

    pub fn from_name(name: &str) -> Option<Right> {
        RIGHTS.iter().find(|(_, n)| n.eq_ignore_ascii_case(name)).map(|(r, _)| *r)
    }
}

/// Requested operation. The `*NoLck` variants carry the same rule-engine right
/// plus a flag telling the lock layer to skip lock enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum Operation {
    Use = 0x1,
    Manage = 0x2,
    Admin = 0x4,
    Create = 0x8,
    UseNoLck = 0x11,
    ManageNoLck = 0x12,
    AdminNoLck = 0x14,
    CreateNoLck = 0x18,
}

pub const NO_LOCK_FLAG: u64 = 0x10;

impl Operation {
    /// Right required from the rules, lock modifier stripped
    pub fn right(self) -> Right {
        match self {
            Operation::Use | Operation::UseNoLck => Right::Use,
            Operation::Manage | Operation::ManageNoLck => Right::Manage,
            Operation::Admin | Operation::AdminNoLck => Right::Admin,
            Operation::Create | Operation::CreateNoLck => Right::Create,
        }
    }

    pub fn bypasses_lock(self) -> bool {
        self as u64 & NO_LOCK_FLAG != 0
    }

    pub fn name(self) -> &'static str {
        self.right().name()
    }
}

impl From<Right> for Operation {
    fn from(right: Right) -> Self {
        match right {
            Right::Use => Operation::Use,
            Right::Manage => Operation::Manage,
            Right::Admin => Operation::Admin,
            Right::Create => Operation::Create,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persistence collaborator for the rule table. The manager serializes all
/// mutating calls under its write lock.
pub trait RuleStore {
    fn insert(&mut self, rule: &AclRule) -> Result<()>;
    fn delete(&mut self, oid: i32) -> Result<()>;
    fn load(&mut self) -> Result<Vec<AclRule>>;
}

/// Domain-object collaborator: resolves the permission snapshot of a live object.
pub trait PermissionsProvider {
    fn get_permissions(&self, obj_type: ObjectType, oid: i32) -> Option<PoolObjectAuth>;
}

/// Rule store without persistence, used when rules live only in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub rules: Vec<AclRule>,
}

impl RuleStore for MemoryStore {
    fn insert(&mut self, rule: &AclRule) -> Result<()> {
        self.rules.push(rule.clone());
        Ok(())
    }

    fn delete(&mut self, oid: i32) -> Result<()> {
        self.rules.retain(|r| r.oid() != oid);
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<AclRule>> {
        Ok(self.rules.clone())
    }
}

pub(crate) fn rights_to_pretty_string(src: u64) -> String {
    let mut res = String::new();

    for (right, name) in RIGHTS.iter() {
        if src & right.bit() != 0 {
            if !res.is_empty() {
                res.push('+');
            }
            res.push_str(name);
        }
    }

    res
}

pub(crate) fn types_to_pretty_string(src: u64) -> String {
    let mut res = String::new();

    for (t, name) in OBJECT_TYPES.iter() {
        if src & t.bit() != 0 {
            if !res.is_empty() {
                res.push('+');
            }
            res.push_str(name);
        }
    }

    res
}
