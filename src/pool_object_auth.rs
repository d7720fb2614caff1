use crate::bitfield::{encode_id, ALL_ID, GROUP_ID, INDIVIDUAL_ID};
use crate::common::{ObjectType, Operation, Right};
use crate::AclRule;
use std::collections::BTreeSet;

/// Уровень блокировки объекта
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LockLevel {
    #[default]
    None = 0,
    Use = 1,
    Manage = 2,
    Admin = 3,
}

impl LockLevel {
    fn of(right: Right) -> Option<LockLevel> {
        match right {
            Right::Use => Some(LockLevel::Use),
            Right::Manage => Some(LockLevel::Manage),
            Right::Admin => Some(LockLevel::Admin),
            Right::Create => None,
        }
    }
}

/// Снимок прав конкретного объекта: владелец, группа и unix-подобные биты.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolObjectAuth {
    /// -1 for an object that does not exist yet
    pub oid: i32,
    pub obj_type: ObjectType,
    pub uid: i32,
    pub gid: i32,
    /// Clusters the object belongs to
    pub cids: BTreeSet<i32>,

    pub owner_u: u8,
    pub owner_m: u8,
    pub owner_a: u8,

    pub group_u: u8,
    pub group_m: u8,
    pub group_a: u8,

    pub other_u: u8,
    pub other_m: u8,
    pub other_a: u8,

    pub disable_all_acl: bool,
    pub disable_cluster_acl: bool,
    pub disable_group_acl: bool,

    pub locked: LockLevel,
}

impl PoolObjectAuth {
    pub fn new(obj_type: ObjectType, oid: i32, uid: i32, gid: i32) -> Self {
        PoolObjectAuth {
            oid,
            obj_type,
            uid,
            gid,
            cids: BTreeSet::new(),
            owner_u: 0,
            owner_m: 0,
            owner_a: 0,
            group_u: 0,
            group_m: 0,
            group_a: 0,
            other_u: 0,
            other_m: 0,
            other_a: 0,
            disable_all_acl: false,
            disable_cluster_acl: false,
            disable_group_acl: false,
            locked: LockLevel::None,
        }
    }

    /// Permission bits as three digits (owner, group, other) like `chmod 640`,
    /// each digit packs use=4, manage=2, admin=1.
    pub fn with_umask_digits(mut self, owner: u8, group: u8, other: u8) -> Self {
        let split = |d: u8| ((d >> 2) & 1, (d >> 1) & 1, d & 1);
        (self.owner_u, self.owner_m, self.owner_a) = split(owner);
        (self.group_u, self.group_m, self.group_a) = split(group);
        (self.other_u, self.other_m, self.other_a) = split(other);
        self
    }

    pub fn with_clusters(mut self, cids: impl IntoIterator<Item = i32>) -> Self {
        self.cids.extend(cids);
        self
    }

    /// Object being created: identity is the owner-to-be, there is no oid
    pub fn for_create(obj_type: ObjectType, uid: i32, gid: i32) -> Self {
        PoolObjectAuth::new(obj_type, -1, uid, gid)
    }

    /// Three synthetic rules (owner, group, other) equivalent to the permission
    /// bits. Their oid is 0 and their zone is 0, they are never stored.
    pub fn get_acl_rules(&self) -> (AclRule, AclRule, AclRule) {
        let resource = self.obj_type.bit() | INDIVIDUAL_ID | encode_id(self.oid);

        let owner_rule = AclRule::new(0, INDIVIDUAL_ID | encode_id(self.uid), resource, rights_of(self.owner_u, self.owner_m, self.owner_a), 0);
        let group_rule = AclRule::new(0, GROUP_ID | encode_id(self.gid), resource, rights_of(self.group_u, self.group_m, self.group_a), 0);
        let other_rule = AclRule::new(0, ALL_ID, resource, rights_of(self.other_u, self.other_m, self.other_a), 0);

        (owner_rule, group_rule, other_rule)
    }

    /// Lock check, independent of any rule grant. `_NO_LCK` operations pass.
    pub fn lock_forbids(&self, op: Operation) -> bool {
        if self.locked == LockLevel::None || op.bypasses_lock() {
            return false;
        }

        match LockLevel::of(op.right()) {
            Some(level) => level >= self.locked,
            None => false,
        }
    }

    /// "TYPE [oid]" or just "TYPE" for objects not created yet
    pub fn describe(&self) -> String {
        if self.oid >= 0 {
            format!("{} [{}]", self.obj_type, self.oid)
        } else {
            self.obj_type.to_string()
        }
    }
}

fn rights_of(u: u8, m: u8, a: u8) -> u64 {
    let mut rights = 0;

    if u == 1 {
        rights |= Right::Use.bit();
    }

    if m == 1 {
        rights |= Right::Manage.bit();
    }

    if a == 1 {
        rights |= Right::Admin.bit();
    }

    rights
}
