use crate::bitfield::*;
use crate::common::{rights_to_pretty_string, types_to_pretty_string, ObjectType, Right, RIGHTS_MASK};
use crate::errors::{AclError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Правило доступа: кому (user), на что (resource), какие права (rights), в какой зоне (zone).
///
/// Construction never validates. A rule read from the store or parsed from
/// text must pass [`AclRule::malformed`] before it is trusted for matching.
#[derive(Clone, Default)]
pub struct AclRule {
    oid: i32,
    user: u64,
    resource: u64,
    rights: u64,
    zone: u64,
    str: String,
}

/// At-rest form of a rule, compound fields in hexadecimal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct AclRuleRecord {
    pub id: i32,
    pub user: String,
    pub resource: String,
    pub rights: String,
    pub zone: String,
    #[serde(default)]
    pub string: String,
}

impl AclRule {
    pub fn new(oid: i32, user: u64, resource: u64, rights: u64, zone: u64) -> Self {
        let mut rule = AclRule::default();
        rule.set(oid, user, resource, rights, zone);
        rule
    }

    /// Builds the raw fields from typed parts
    pub fn from_parts(oid: i32, user: UserSelector, types: ResourceTypes, resource: ResourceSelector, rights: Rights, zone: ZoneSelector) -> Self {
        AclRule::new(oid, user.encode(), encode_resource(types, resource), rights.bits(), zone.encode())
    }

    pub fn set(&mut self, oid: i32, user: u64, resource: u64, rights: u64, zone: u64) {
        self.oid = oid;
        self.user = user;
        self.resource = resource;
        self.rights = rights;
        self.zone = zone;

        self.build_str();
    }

    pub fn oid(&self) -> i32 {
        self.oid
    }

    pub(crate) fn set_oid(&mut self, oid: i32) {
        self.oid = oid;
    }

    pub fn user(&self) -> u64 {
        self.user
    }

    pub fn resource(&self) -> u64 {
        self.resource
    }

    pub fn rights(&self) -> u64 {
        self.rights
    }

    pub fn zone(&self) -> u64 {
        self.zone
    }

    pub fn user_id(&self) -> i32 {
        id_of(self.user)
    }

    pub fn user_code(&self) -> u64 {
        code_of(self.user)
    }

    pub fn resource_id(&self) -> i32 {
        id_of(self.resource)
    }

    pub fn resource_code(&self) -> u64 {
        code_of(self.resource)
    }

    pub fn zone_id(&self) -> i32 {
        id_of(self.zone)
    }

    pub fn user_selector(&self) -> Option<UserSelector> {
        UserSelector::decode(self.user)
    }

    pub fn resource_selector(&self) -> Option<ResourceSelector> {
        ResourceSelector::decode(self.resource)
    }

    pub fn resource_types(&self) -> ResourceTypes {
        ResourceTypes::from_bits(self.resource)
    }

    pub fn zone_selector(&self) -> Option<ZoneSelector> {
        ZoneSelector::decode(self.zone)
    }

    pub fn has_right(&self, right: Right) -> bool {
        self.rights & right.bit() != 0
    }

    /// Cached canonical rendering
    pub fn to_str(&self) -> &str {
        &self.str
    }

    /// Checks every invariant of the four fields. All violations are collected,
    /// the returned message joins them with "; ".
    pub fn malformed(&self) -> Option<String> {
        self.check(false)
    }

    /// Same as `malformed`, plus the federated objects restriction: an
    /// individual object in the ALL zone must be a USER, GROUP or ZONE.
    pub fn malformed_in_federation(&self) -> Option<String> {
        self.check(true)
    }

    fn check(&self, federation: bool) -> Option<String> {
        let mut errors: Vec<String> = Vec::new();
        let mut fail = |msg: &str| errors.push(msg.to_owned());

        // user
        if self.user & INDIVIDUAL_ID != 0 && self.user & GROUP_ID != 0 {
            fail("[user] INDIVIDUAL (#) and GROUP (@) bits are exclusive");
        }

        if self.user & INDIVIDUAL_ID != 0 && self.user & ALL_ID != 0 {
            fail("[user] INDIVIDUAL (#) and ALL (*) bits are exclusive");
        }

        if self.user & GROUP_ID != 0 && self.user & ALL_ID != 0 {
            fail("[user] GROUP (@) and ALL (*) bits are exclusive");
        }

        if self.user & (INDIVIDUAL_ID | GROUP_ID | ALL_ID) == 0 {
            fail("[user] is missing one of the INDIVIDUAL, GROUP or ALL bits");
        }

        if self.user_code() & !(INDIVIDUAL_ID | GROUP_ID | ALL_ID) != 0 {
            fail("[user] contains bits other than INDIVIDUAL, GROUP or ALL");
        }

        if self.user_id() < 0 {
            fail("[user] ID cannot be negative");
        }

        if self.user & ALL_ID != 0 && self.user_id() != 0 {
            fail("when using the ALL bit, [user] ID must be 0");
        }

        // resource
        let selectors = [(INDIVIDUAL_ID, "INDIVIDUAL (#)"), (GROUP_ID, "GROUP (@)"), (CLUSTER_ID, "CLUSTER (%)"), (ALL_ID, "ALL (*)")];

        for (i, (a, a_name)) in selectors.iter().enumerate() {
            for (b, b_name) in selectors.iter().skip(i + 1) {
                if self.resource & a != 0 && self.resource & b != 0 {
                    fail(&format!("[resource] {} and {} bits are exclusive", a_name, b_name));
                }
            }
        }

        let types = self.resource & TYPE_AREA_MASK;

        if self.resource & SELECTOR_MASK == 0 {
            fail("[resource] is missing one of the INDIVIDUAL, GROUP, CLUSTER or ALL bits");
        }

        if self.resource_id() < 0 {
            fail("[resource] ID cannot be negative");
        }

        if self.resource & ALL_ID != 0 && self.resource_id() != 0 {
            fail("when using the ALL bit, [resource] ID must be 0");
        }

        if types == 0 {
            fail("[resource] type is missing");
        }

        if types & !VALID_TYPES_MASK != 0 {
            fail("wrong [resource] type");
        }

        if self.resource & CLUSTER_ID != 0 && types & !CLUSTER_TYPES_MASK != 0 {
            fail("[resource] CLUSTER (%) selector can only be used for DATASTORE, HOST and NET types");
        }

        if self.resource & GROUP_ID != 0 && types & NO_GROUP_TYPES_MASK != 0 {
            fail("[resource] GROUP (@) selector cannot be used for HOST, GROUP, CLUSTER, ZONE or VDC types");
        }

        // rights
        if self.rights == 0 {
            fail("wrong [rights], it cannot be 0");
        }

        if self.rights > RIGHTS_MASK {
            fail("wrong [rights], it cannot be bigger than 0xF");
        }

        // zone
        if self.zone & INDIVIDUAL_ID != 0 && self.zone & ALL_ID != 0 {
            fail("[zone] INDIVIDUAL (#) and ALL (*) bits are exclusive");
        }

        if self.zone & GROUP_ID != 0 {
            fail("[zone] GROUP (@) bit is not supported");
        }

        if self.zone & CLUSTER_ID != 0 {
            fail("[zone] CLUSTER (%) bit is not supported");
        }

        if code_of(self.zone) & !SELECTOR_MASK != 0 {
            fail("[zone] contains bits other than INDIVIDUAL or ALL");
        }

        if self.zone & (INDIVIDUAL_ID | ALL_ID) == 0 {
            fail("[zone] is missing one of the INDIVIDUAL or ALL bits");
        }

        if self.zone_id() < 0 {
            fail("[zone] ID cannot be negative");
        }

        if self.zone & ALL_ID != 0 && self.zone_id() != 0 {
            fail("when using the ALL bit, [zone] ID must be 0");
        }

        if federation && self.zone & ALL_ID != 0 && self.resource & INDIVIDUAL_ID != 0 && types & !FEDERATED_TYPES_MASK != 0 {
            fail("[resource] INDIVIDUAL (#) objects can only be granted for ALL (*) zones when they are USER, GROUP or ZONE");
        }

        if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed().is_some()
    }

    fn build_str(&mut self) {
        let mut s = String::new();

        if self.user & GROUP_ID != 0 {
            s.push_str(&format!("@{}", self.user_id()));
        } else if self.user & INDIVIDUAL_ID != 0 {
            s.push_str(&format!("#{}", self.user_id()));
        } else if self.user & ALL_ID != 0 {
            s.push('*');
        } else {
            s.push_str("??");
        }

        s.push(' ');
        s.push_str(&types_to_pretty_string(self.resource));
        s.push('/');

        if self.resource & GROUP_ID != 0 {
            s.push_str(&format!("@{}", self.resource_id()));
        } else if self.resource & INDIVIDUAL_ID != 0 {
            s.push_str(&format!("#{}", self.resource_id()));
        } else if self.resource & ALL_ID != 0 {
            s.push('*');
        } else if self.resource & CLUSTER_ID != 0 {
            s.push_str(&format!("%{}", self.resource_id()));
        } else {
            s.push_str("??");
        }

        s.push(' ');
        s.push_str(&rights_to_pretty_string(self.rights));
        s.push(' ');

        if self.zone & INDIVIDUAL_ID != 0 {
            s.push_str(&format!("#{}", self.zone_id()));
        } else if self.zone & ALL_ID != 0 {
            s.push('*');
        } else {
            s.push_str("??");
        }

        self.str = s;
    }

    pub fn to_record(&self) -> AclRuleRecord {
        AclRuleRecord {
            id: self.oid,
            user: format!("{:x}", self.user),
            resource: format!("{:x}", self.resource),
            rights: format!("{:x}", self.rights),
            zone: format!("{:x}", self.zone),
            string: self.str.clone(),
        }
    }

    /// The stored STRING is not trusted, the rendering is rebuilt from the numeric fields
    pub fn from_record(record: &AclRuleRecord) -> Result<AclRule> {
        Ok(AclRule::new(
            record.id,
            parse_hex("USER", &record.user)?,
            parse_hex("RESOURCE", &record.resource)?,
            parse_hex("RIGHTS", &record.rights)?,
            parse_hex("ZONE", &record.zone)?,
        ))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn from_json(src: &str) -> Result<AclRule> {
        let record: AclRuleRecord = serde_json::from_str(src)?;
        AclRule::from_record(&record)
    }

    /// Parses `<user> <types>/<selector> <rights> [<zone>]`. A missing zone
    /// token resolves to `default_zone`. The result is not validated.
    pub fn parse(text: &str, default_zone: ZoneSelector) -> Result<AclRule> {
        let tokens: Vec<&str> = text.split_whitespace().collect();

        if tokens.len() != 3 && tokens.len() != 4 {
            return Err(AclError::Parse(format!("rule '{}' must have 3 or 4 components, found {}", text, tokens.len())));
        }

        let user = parse_selector("user", tokens[0], &['#', '@', '*'])?;

        let (types_str, selector_str) = tokens[1]
            .split_once('/')
            .ok_or_else(|| AclError::Parse(format!("resource '{}' must have the form TYPE[+TYPE...]/SELECTOR", tokens[1])))?;

        let mut types = ResourceTypes::empty();
        for name in types_str.split('+') {
            let t = ObjectType::from_name(name).ok_or_else(|| AclError::Parse(format!("unknown object type '{}'", name)))?;
            types.insert(t);
        }

        let resource = types.bits() | parse_selector("resource", selector_str, &['#', '@', '%', '*'])?;

        let mut rights = Rights::empty();
        for name in tokens[2].split('+') {
            let r = Right::from_name(name).ok_or_else(|| AclError::Parse(format!("unknown right '{}'", name)))?;
            rights.insert(r);
        }

        let zone = match tokens.get(3) {
            Some(z) => parse_selector("zone", z, &['#', '@', '*'])?,
            None => default_zone.encode(),
        };

        Ok(AclRule::new(0, user, resource, rights.bits(), zone))
    }
}

fn parse_hex(field: &str, src: &str) -> Result<u64> {
    u64::from_str_radix(src.trim(), 16).map_err(|e| AclError::Parse(format!("{} '{}' is not a hexadecimal value: {}", field, src, e)))
}

fn parse_selector(field: &str, token: &str, allowed: &[char]) -> Result<u64> {
    let mut chars = token.chars();
    let prefix = chars.next().ok_or_else(|| AclError::Parse(format!("empty {} selector", field)))?;

    if !allowed.contains(&prefix) {
        return Err(AclError::Parse(format!("'{}' is not a valid {} selector", token, field)));
    }

    if prefix == '*' {
        if token.len() != 1 {
            return Err(AclError::Parse(format!("'{}' is not a valid {} selector", token, field)));
        }
        return Ok(ALL_ID);
    }

    let id: i32 = chars.as_str().parse().map_err(|_| AclError::Parse(format!("'{}' has no numeric {} id", token, field)))?;

    let selector = match prefix {
        '#' => INDIVIDUAL_ID,
        '@' => GROUP_ID,
        _ => CLUSTER_ID,
    };

    Ok(selector | encode_id(id))
}

impl FromStr for AclRule {
    type Err = AclError;

    /// All four components are required
    fn from_str(s: &str) -> Result<Self> {
        if s.split_whitespace().count() != 4 {
            return Err(AclError::Parse(format!("rule '{}' must have 4 components", s)));
        }
        AclRule::parse(s, ZoneSelector::All)
    }
}

impl PartialEq for AclRule {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user && self.resource == other.resource && self.rights == other.rights && self.zone == other.zone
    }
}

impl Eq for AclRule {}

impl fmt::Display for AclRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.str)
    }
}

impl fmt::Debug for AclRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.oid, self.str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_rule() -> AclRule {
        AclRule::new(1, GROUP_ID | 8, ObjectType::Vm.bit() | INDIVIDUAL_ID | 100, 0x3, ALL_ID)
    }

    fn malformed_msg(rule: &AclRule) -> String {
        rule.malformed().expect("rule should be malformed")
    }

    #[test]
    fn test_default_rule_is_empty() {
        let rule = AclRule::default();
        assert_eq!(rule.oid(), 0);
        assert_eq!(rule.user(), 0);
        assert_eq!(rule.to_str(), "");
        assert!(rule.is_malformed());
    }

    #[test]
    fn test_build_str() {
        let rule = valid_rule();
        assert_eq!(rule.to_str(), "@8 VM/#100 USE+MANAGE *");

        let rule = AclRule::new(
            0,
            INDIVIDUAL_ID | 5,
            ObjectType::Host.bit() | ObjectType::Vm.bit() | GROUP_ID | 12,
            0x3,
            INDIVIDUAL_ID | 0,
        );
        assert_eq!(rule.to_str(), "#5 VM+HOST/@12 USE+MANAGE #0");

        let rule = AclRule::new(0, ALL_ID, ObjectType::Datastore.bit() | CLUSTER_ID | 100, 0x8, INDIVIDUAL_ID | 3);
        assert_eq!(rule.to_str(), "* DATASTORE/%100 CREATE #3");
    }

    #[test]
    fn test_build_str_unknown_selectors() {
        let rule = AclRule::new(0, 0, ObjectType::Vm.bit(), 0x1, 0);
        assert_eq!(rule.to_str(), "?? VM/?? USE ??");
    }

    #[test]
    fn test_set_twice_is_stable() {
        let mut rule = AclRule::default();
        rule.set(3, GROUP_ID | 1, ObjectType::Image.bit() | ALL_ID, 0x1, ALL_ID);
        let first = rule.to_str().to_string();
        rule.set(3, GROUP_ID | 1, ObjectType::Image.bit() | ALL_ID, 0x1, ALL_ID);
        assert_eq!(rule.to_str(), first);
    }

    #[test]
    fn test_equality_ignores_oid() {
        let a = valid_rule();
        let mut b = valid_rule();
        b.set_oid(77);
        assert_eq!(a, b);

        let c = AclRule::new(1, GROUP_ID | 9, a.resource(), a.rights(), a.zone());
        assert_ne!(a, c);
    }

    #[test]
    fn test_valid_rule_is_not_malformed() {
        assert_eq!(valid_rule().malformed(), None);
    }

    #[test]
    fn test_user_selector_pairs_are_exclusive() {
        let pairs = [(INDIVIDUAL_ID | GROUP_ID, "INDIVIDUAL (#) and GROUP (@)"), (INDIVIDUAL_ID | ALL_ID, "INDIVIDUAL (#) and ALL (*)"), (GROUP_ID | ALL_ID, "GROUP (@) and ALL (*)")];

        for (bits, clause) in pairs.iter() {
            let rule = AclRule::new(0, *bits, ObjectType::Vm.bit() | ALL_ID, 0x1, ALL_ID);
            let msg = malformed_msg(&rule);
            assert!(msg.contains(&format!("[user] {} bits are exclusive", clause)), "{}", msg);
        }
    }

    #[test]
    fn test_malformed_accumulates_all_errors() {
        let rule = AclRule::new(0, 0, 0, 0, 0);
        let msg = malformed_msg(&rule);
        assert!(msg.contains("[user] is missing one of the INDIVIDUAL, GROUP or ALL bits"));
        assert!(msg.contains("[resource] is missing one of the INDIVIDUAL, GROUP, CLUSTER or ALL bits"));
        assert!(msg.contains("[resource] type is missing"));
        assert!(msg.contains("wrong [rights], it cannot be 0"));
        assert!(msg.contains("[zone] is missing one of the INDIVIDUAL or ALL bits"));
        assert_eq!(msg.matches("; ").count(), 4);
    }

    #[test]
    fn test_negative_and_nonzero_all_ids() {
        let rule = AclRule::new(0, INDIVIDUAL_ID | encode_id(-3), ObjectType::Vm.bit() | ALL_ID | 4, 0x1, ALL_ID | 2);
        let msg = malformed_msg(&rule);
        assert!(msg.contains("[user] ID cannot be negative"));
        assert!(msg.contains("when using the ALL bit, [resource] ID must be 0"));
        assert!(msg.contains("when using the ALL bit, [zone] ID must be 0"));
    }

    #[test]
    fn test_rights_bounds() {
        let rule = AclRule::new(0, ALL_ID, ObjectType::Vm.bit() | ALL_ID, 0x10, ALL_ID);
        assert!(malformed_msg(&rule).contains("wrong [rights], it cannot be bigger than 0xF"));
    }

    #[test]
    fn test_resource_selectors_are_exclusive() {
        let rule = AclRule::new(0, ALL_ID, ObjectType::Host.bit() | CLUSTER_ID | INDIVIDUAL_ID | 1, 0x1, INDIVIDUAL_ID);
        assert!(malformed_msg(&rule).contains("[resource] INDIVIDUAL (#) and CLUSTER (%) bits are exclusive"));
    }

    #[test]
    fn test_reserved_type_bits() {
        let rule = AclRule::new(0, ALL_ID, ObjectType::Vm.bit() | 0x0000_0800_0000_0000 | ALL_ID, 0x1, INDIVIDUAL_ID);
        assert!(malformed_msg(&rule).contains("wrong [resource] type"));
    }

    #[test]
    fn test_cluster_selector_restriction() {
        let ok = AclRule::new(0, ALL_ID, ObjectType::Datastore.bit() | CLUSTER_ID | 100, 0x1, INDIVIDUAL_ID);
        assert_eq!(ok.malformed(), None);

        let ok = AclRule::new(
            0,
            ALL_ID,
            ObjectType::Datastore.bit() | ObjectType::Host.bit() | ObjectType::Net.bit() | CLUSTER_ID | 100,
            0x1,
            INDIVIDUAL_ID,
        );
        assert_eq!(ok.malformed(), None);

        for (t, _) in crate::common::OBJECT_TYPES.iter() {
            if CLUSTER_TYPES_MASK & t.bit() != 0 {
                continue;
            }
            let bad = AclRule::new(0, ALL_ID, ObjectType::Datastore.bit() | t.bit() | CLUSTER_ID | 100, 0x1, INDIVIDUAL_ID);
            assert!(malformed_msg(&bad).contains("CLUSTER (%) selector can only be used"));
        }
    }

    #[test]
    fn test_group_selector_restriction() {
        for t in [ObjectType::Host, ObjectType::Group, ObjectType::Cluster, ObjectType::Zone, ObjectType::Vdc] {
            let bad = AclRule::new(0, ALL_ID, t.bit() | GROUP_ID | 1, 0x1, INDIVIDUAL_ID);
            assert!(malformed_msg(&bad).contains("GROUP (@) selector cannot be used"));
        }

        let ok = AclRule::new(0, ALL_ID, ObjectType::Image.bit() | GROUP_ID | 1, 0x1, INDIVIDUAL_ID);
        assert_eq!(ok.malformed(), None);
    }

    #[test]
    fn test_zone_group_bit_is_malformed() {
        let rule = AclRule::new(0, ALL_ID, ObjectType::Vm.bit() | ALL_ID, 0x1, GROUP_ID | 1);
        let msg = malformed_msg(&rule);
        assert!(msg.contains("[zone] GROUP (@) bit is not supported"));
        assert!(msg.contains("[zone] is missing one of the INDIVIDUAL or ALL bits"));
    }

    #[test]
    fn test_each_clause_alone() {
        let vm_all = ObjectType::Vm.bit() | ALL_ID;

        let cases = [
            (AclRule::new(0, INDIVIDUAL_ID | CLUSTER_ID | 1, vm_all, 0x1, ALL_ID), "[user] contains bits other than INDIVIDUAL, GROUP or ALL"),
            (AclRule::new(0, ALL_ID, ObjectType::Vm.bit() | INDIVIDUAL_ID | encode_id(-1), 0x1, INDIVIDUAL_ID), "[resource] ID cannot be negative"),
            (AclRule::new(0, ALL_ID, ObjectType::Image.bit() | GROUP_ID | ALL_ID, 0x1, ALL_ID), "[resource] GROUP (@) and ALL (*) bits are exclusive"),
            (AclRule::new(0, ALL_ID, ObjectType::Net.bit() | GROUP_ID | CLUSTER_ID | 1, 0x1, ALL_ID), "[resource] GROUP (@) and CLUSTER (%) bits are exclusive"),
            (AclRule::new(0, ALL_ID, vm_all, 0x1, INDIVIDUAL_ID | encode_id(-2)), "[zone] ID cannot be negative"),
            (AclRule::new(0, ALL_ID, vm_all, 0x1, INDIVIDUAL_ID | CLUSTER_ID), "[zone] CLUSTER (%) bit is not supported"),
            (AclRule::new(0, ALL_ID, vm_all, 0x1, INDIVIDUAL_ID | ALL_ID), "[zone] INDIVIDUAL (#) and ALL (*) bits are exclusive"),
            (AclRule::new(0, ALL_ID, vm_all, 0x1, ALL_ID | ObjectType::Vm.bit()), "[zone] contains bits other than INDIVIDUAL or ALL"),
        ];

        for (rule, clause) in cases.iter() {
            assert_eq!(rule.malformed().as_deref(), Some(*clause), "{:?}", rule);
        }
    }

    #[test]
    fn test_zone_type_bits_are_not_hidden() {
        let stray = AclRule::new(0, GROUP_ID | 8, ObjectType::Vm.bit() | ALL_ID, 0x1, ALL_ID | ObjectType::Vm.bit());
        let clean = AclRule::new(0, GROUP_ID | 8, ObjectType::Vm.bit() | ALL_ID, 0x1, ALL_ID);

        assert!(stray.is_malformed());
        assert_eq!(stray.zone_selector(), None);
        assert_eq!(clean.malformed(), None);
    }

    #[test]
    fn test_federated_objects_exception() {
        for t in [ObjectType::User, ObjectType::Group, ObjectType::Zone] {
            let rule = AclRule::new(0, ALL_ID, t.bit() | INDIVIDUAL_ID | 3, 0x1, ALL_ID);
            assert_eq!(rule.malformed_in_federation(), None, "{}", t);
        }

        let rule = AclRule::new(0, ALL_ID, ObjectType::Vm.bit() | INDIVIDUAL_ID | 3, 0x1, ALL_ID);
        assert_eq!(rule.malformed(), None);
        let msg = rule.malformed_in_federation().unwrap();
        assert!(msg.contains("only be granted for ALL (*) zones"));

        // a local zone lifts the restriction
        let rule = AclRule::new(0, ALL_ID, ObjectType::Vm.bit() | INDIVIDUAL_ID | 3, 0x1, INDIVIDUAL_ID);
        assert_eq!(rule.malformed_in_federation(), None);

        let mixed = AclRule::new(0, ALL_ID, ObjectType::User.bit() | ObjectType::Image.bit() | INDIVIDUAL_ID | 3, 0x1, ALL_ID);
        assert!(mixed.malformed_in_federation().is_some());
    }

    #[test]
    fn test_every_legal_selector_combination() {
        let users = [UserSelector::Individual(1), UserSelector::Group(2), UserSelector::All];
        let resources = [
            (ResourceTypes::empty().with(ObjectType::User), ResourceSelector::Individual(3)),
            (ResourceTypes::empty().with(ObjectType::Image), ResourceSelector::Group(4)),
            (ResourceTypes::empty().with(ObjectType::Net), ResourceSelector::Cluster(5)),
            (ResourceTypes::empty().with(ObjectType::Vm), ResourceSelector::All),
        ];
        let zones = [ZoneSelector::Individual(0), ZoneSelector::All];

        for user in users.iter() {
            for (types, resource) in resources.iter() {
                for zone in zones.iter() {
                    let rule = AclRule::from_parts(0, *user, *types, *resource, Rights::empty().with(Right::Use), *zone);
                    assert_eq!(rule.malformed(), None, "{}", rule);
                }
            }
        }
    }

    #[test]
    fn test_record_round_trip() {
        let rule = valid_rule();
        let record = rule.to_record();
        assert_eq!(record.user, "200000008");
        assert_eq!(record.resource, "1100000064");
        assert_eq!(record.rights, "3");
        assert_eq!(record.zone, "400000000");

        let back = AclRule::from_record(&record).unwrap();
        assert_eq!(back, rule);
        assert_eq!(back.oid(), rule.oid());
        assert_eq!(back.to_str(), rule.to_str());
    }

    #[test]
    fn test_from_record_ignores_stored_string() {
        let mut record = valid_rule().to_record();
        record.string = "stale text".to_string();
        let rule = AclRule::from_record(&record).unwrap();
        assert_eq!(rule.to_str(), "@8 VM/#100 USE+MANAGE *");
    }

    #[test]
    fn test_from_record_bad_hex() {
        let mut record = valid_rule().to_record();
        record.rights = "zz".to_string();
        assert!(matches!(AclRule::from_record(&record), Err(AclError::Parse(_))));
    }

    #[test]
    fn test_json_record_field_names() {
        let json = valid_rule().to_json().unwrap();
        assert!(json.contains("\"ID\":1"));
        assert!(json.contains("\"STRING\":\"@8 VM/#100 USE+MANAGE *\""));

        let back = AclRule::from_json(&json).unwrap();
        assert_eq!(back, valid_rule());
    }

    #[test]
    fn test_parse_rule_text() {
        let rule: AclRule = "@8 VM/#100 USE+MANAGE *".parse().unwrap();
        assert_eq!(rule.user(), GROUP_ID | 8);
        assert_eq!(rule.resource(), ObjectType::Vm.bit() | INDIVIDUAL_ID | 100);
        assert_eq!(rule.rights(), 0x3);
        assert_eq!(rule.zone(), ALL_ID);
        assert_eq!(rule.malformed(), None);
        assert_eq!(rule.to_str(), "@8 VM/#100 USE+MANAGE *");
    }

    #[test]
    fn test_parse_normalizes_order() {
        let rule: AclRule = "#5 HOST+VM/@12 MANAGE+USE #0".parse().unwrap();
        assert_eq!(rule.to_str(), "#5 VM+HOST/@12 USE+MANAGE #0");
        // GROUP selector on HOST
        assert!(rule.is_malformed());
    }

    #[test]
    fn test_parse_default_zone() {
        let rule = AclRule::parse("* NET/%3 USE", ZoneSelector::Individual(7)).unwrap();
        assert_eq!(rule.zone(), INDIVIDUAL_ID | 7);
        assert_eq!(rule.to_str(), "* NET/%3 USE #7");
        assert!("* NET/%3 USE".parse::<AclRule>().is_err());
    }

    #[test]
    fn test_parse_errors() {
        for text in ["", "#1 VM/#1", "#1 VM#1 USE *", "#1 FOO/#1 USE *", "#1 VM/#1 READ *", "!1 VM/#1 USE *", "#x VM/#1 USE *", "#1 VM/%a USE *", "*1 VM/* USE *", "#1 VM/* USE %1"] {
            assert!(matches!(AclRule::parse(text, ZoneSelector::All), Err(AclError::Parse(_))), "{}", text);
        }
    }

    #[test]
    fn test_parse_keeps_malformed_zone_for_validation() {
        let rule = AclRule::parse("* VM/* USE @1", ZoneSelector::All).unwrap();
        assert!(malformed_msg(&rule).contains("[zone] GROUP (@) bit is not supported"));
    }

    #[test]
    fn test_typed_accessors() {
        let rule = valid_rule();
        assert_eq!(rule.user_selector(), Some(UserSelector::Group(8)));
        assert_eq!(rule.resource_selector(), Some(ResourceSelector::Individual(100)));
        assert!(rule.resource_types().contains(ObjectType::Vm));
        assert_eq!(rule.zone_selector(), Some(ZoneSelector::All));
        assert!(rule.has_right(Right::Manage));
        assert!(!rule.has_right(Right::Admin));
        assert_eq!(rule.resource_code(), ObjectType::Vm.bit() | INDIVIDUAL_ID);
        assert_eq!(rule.user_code(), GROUP_ID);
    }
}
