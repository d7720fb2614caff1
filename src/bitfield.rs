//! Encoding of the 64-bit compound rule fields.
//!
//! Every field keeps a selector (and for `resource` the object type mask) in
//! the high half and an id in the low half. Raw values are what the store and
//! the serialized record carry; the typed selectors below are decoded from
//! them at the boundary. Building a raw value never fails, validation is left
//! to `AclRule::malformed`.

use crate::common::{ObjectType, Right, OBJECT_TYPES, RIGHTS, RIGHTS_MASK};

pub const INDIVIDUAL_ID: u64 = 0x0000_0001_0000_0000;
pub const GROUP_ID: u64 = 0x0000_0002_0000_0000;
pub const ALL_ID: u64 = 0x0000_0004_0000_0000;
pub const CLUSTER_ID: u64 = 0x0000_0008_0000_0000;

pub const ID_MASK: u64 = 0x0000_0000_FFFF_FFFF;
pub const CODE_MASK: u64 = 0xFFFF_FFFF_0000_0000;
pub const SELECTOR_MASK: u64 = INDIVIDUAL_ID | GROUP_ID | ALL_ID | CLUSTER_ID;
pub const TYPE_AREA_MASK: u64 = 0xFFFF_FFF0_0000_0000;

/// Union of every defined object type bit
pub const VALID_TYPES_MASK: u64 = ObjectType::Vm as u64
    | ObjectType::Host as u64
    | ObjectType::Net as u64
    | ObjectType::Image as u64
    | ObjectType::User as u64
    | ObjectType::Template as u64
    | ObjectType::Group as u64
    | ObjectType::Datastore as u64
    | ObjectType::Cluster as u64
    | ObjectType::Document as u64
    | ObjectType::Zone as u64
    | ObjectType::SecGroup as u64
    | ObjectType::Vdc as u64
    | ObjectType::VRouter as u64
    | ObjectType::Marketplace as u64
    | ObjectType::MarketplaceApp as u64
    | ObjectType::VmGroup as u64
    | ObjectType::VnTemplate as u64
    | ObjectType::BackupJob as u64;

/// Types that may be scoped with the cluster selector
pub const CLUSTER_TYPES_MASK: u64 = ObjectType::Datastore as u64 | ObjectType::Host as u64 | ObjectType::Net as u64;

/// Types that cannot be selected by owning group
pub const NO_GROUP_TYPES_MASK: u64 =
    ObjectType::Host as u64 | ObjectType::Group as u64 | ObjectType::Cluster as u64 | ObjectType::Zone as u64 | ObjectType::Vdc as u64;

/// Federated types, the only ones an individual rule may grant across all zones
pub const FEDERATED_TYPES_MASK: u64 = ObjectType::User as u64 | ObjectType::Group as u64 | ObjectType::Zone as u64;

/// Low 32 bits as a signed id
pub fn id_of(v: u64) -> i32 {
    (v & ID_MASK) as u32 as i32
}

/// Selector and type bits only
pub fn code_of(v: u64) -> u64 {
    v & CODE_MASK
}

pub fn encode_id(id: i32) -> u64 {
    id as u32 as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserSelector {
    Individual(i32),
    Group(i32),
    All,
}

impl UserSelector {
    pub fn encode(self) -> u64 {
        match self {
            UserSelector::Individual(id) => INDIVIDUAL_ID | encode_id(id),
            UserSelector::Group(id) => GROUP_ID | encode_id(id),
            UserSelector::All => ALL_ID,
        }
    }

    /// `None` when the raw value does not hold exactly one legal selector
    pub fn decode(v: u64) -> Option<UserSelector> {
        match code_of(v) {
            INDIVIDUAL_ID => Some(UserSelector::Individual(id_of(v))),
            GROUP_ID => Some(UserSelector::Group(id_of(v))),
            ALL_ID if id_of(v) == 0 => Some(UserSelector::All),
            _ => None,
        }
    }

    pub fn matches(self, uid: i32, gids: &std::collections::BTreeSet<i32>) -> bool {
        match self {
            UserSelector::Individual(id) => id == uid,
            UserSelector::Group(id) => gids.contains(&id),
            UserSelector::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceSelector {
    Individual(i32),
    Group(i32),
    Cluster(i32),
    All,
}

impl ResourceSelector {
    pub fn encode(self) -> u64 {
        match self {
            ResourceSelector::Individual(id) => INDIVIDUAL_ID | encode_id(id),
            ResourceSelector::Group(id) => GROUP_ID | encode_id(id),
            ResourceSelector::Cluster(id) => CLUSTER_ID | encode_id(id),
            ResourceSelector::All => ALL_ID,
        }
    }

    /// Decodes the selector part of a resource value, type bits are ignored
    pub fn decode(v: u64) -> Option<ResourceSelector> {
        match v & SELECTOR_MASK {
            INDIVIDUAL_ID => Some(ResourceSelector::Individual(id_of(v))),
            GROUP_ID => Some(ResourceSelector::Group(id_of(v))),
            CLUSTER_ID => Some(ResourceSelector::Cluster(id_of(v))),
            ALL_ID if id_of(v) == 0 => Some(ResourceSelector::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneSelector {
    Individual(i32),
    All,
}

impl ZoneSelector {
    pub fn encode(self) -> u64 {
        match self {
            ZoneSelector::Individual(id) => INDIVIDUAL_ID | encode_id(id),
            ZoneSelector::All => ALL_ID,
        }
    }

    pub fn decode(v: u64) -> Option<ZoneSelector> {
        match code_of(v) {
            INDIVIDUAL_ID => Some(ZoneSelector::Individual(id_of(v))),
            ALL_ID if id_of(v) == 0 => Some(ZoneSelector::All),
            _ => None,
        }
    }

    pub fn matches(self, zone_id: i32) -> bool {
        match self {
            ZoneSelector::Individual(id) => id == zone_id,
            ZoneSelector::All => true,
        }
    }
}

/// Set of object types, stored as their OR'd bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceTypes(u64);

impl ResourceTypes {
    pub fn empty() -> Self {
        ResourceTypes(0)
    }

    pub fn from_bits(bits: u64) -> Self {
        ResourceTypes(bits & VALID_TYPES_MASK)
    }

    pub fn with(mut self, t: ObjectType) -> Self {
        self.0 |= t.bit();
        self
    }

    pub fn insert(&mut self, t: ObjectType) {
        self.0 |= t.bit();
    }

    pub fn contains(self, t: ObjectType) -> bool {
        self.0 & t.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    /// Types in declaration order
    pub fn iter(self) -> impl Iterator<Item = ObjectType> {
        OBJECT_TYPES.iter().map(|(t, _)| *t).filter(move |t| self.contains(*t))
    }
}

impl FromIterator<ObjectType> for ResourceTypes {
    fn from_iter<I: IntoIterator<Item = ObjectType>>(iter: I) -> Self {
        iter.into_iter().fold(ResourceTypes::empty(), |acc, t| acc.with(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rights(u64);

impl Rights {
    pub fn empty() -> Self {
        Rights(0)
    }

    pub fn from_bits(bits: u64) -> Self {
        Rights(bits & RIGHTS_MASK)
    }

    pub fn with(mut self, r: Right) -> Self {
        self.0 |= r.bit();
        self
    }

    pub fn insert(&mut self, r: Right) {
        self.0 |= r.bit();
    }

    pub fn contains(self, r: Right) -> bool {
        self.0 & r.bit() != 0
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = Right> {
        RIGHTS.iter().map(|(r, _)| *r).filter(move |r| self.contains(*r))
    }
}

impl FromIterator<Right> for Rights {
    fn from_iter<I: IntoIterator<Item = Right>>(iter: I) -> Self {
        iter.into_iter().fold(Rights::empty(), |acc, r| acc.with(r))
    }
}

/// Full resource value: type mask plus selector
pub fn encode_resource(types: ResourceTypes, selector: ResourceSelector) -> u64 {
    types.bits() | selector.encode()
}
