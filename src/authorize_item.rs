use crate::acl_manager::RuleIndex;
use crate::bitfield::{encode_id, ResourceSelector, ALL_ID, GROUP_ID, INDIVIDUAL_ID};
use crate::common::{Operation, Right};
use crate::pool_object_auth::PoolObjectAuth;
use crate::trace::{RuleSource, TraceInfo};
use crate::AclRule;
use std::collections::BTreeSet;

/// Контекст проверки одного субъекта
pub(crate) struct AzContext<'a> {
    pub uid: i32,
    pub gids: &'a BTreeSet<i32>,
    pub zone_id: i32,
    pub core_authorize: bool,
}

impl<'a> AzContext<'a> {
    /// Keys of the per-user rule index that can apply to this principal
    pub fn principal_keys(&self) -> Vec<u64> {
        let mut keys = Vec::with_capacity(self.gids.len() + 2);
        keys.push(ALL_ID);
        keys.push(INDIVIDUAL_ID | encode_id(self.uid));
        keys.extend(self.gids.iter().map(|g| GROUP_ID | encode_id(*g)));
        keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemDecision {
    Granted,
    Denied,
    Locked,
}

/// Does the resource part of `rule` select the object in `perms`
pub(crate) fn resource_matches(rule: &AclRule, perms: &PoolObjectAuth) -> bool {
    if !rule.resource_types().contains(perms.obj_type) {
        return false;
    }

    match rule.resource_selector() {
        Some(ResourceSelector::Individual(oid)) => perms.oid >= 0 && oid == perms.oid,
        Some(ResourceSelector::Group(gid)) => !perms.disable_group_acl && perms.gid >= 0 && gid == perms.gid,
        Some(ResourceSelector::Cluster(cid)) => !perms.disable_cluster_acl && perms.cids.contains(&cid),
        Some(ResourceSelector::All) => !perms.disable_all_acl,
        None => false,
    }
}

/// Stored rule check: right, zone and resource. The principal was already
/// selected through the index key.
fn explicit_rule_grants(azc: &AzContext, rule: &AclRule, perms: &PoolObjectAuth, right: Right) -> bool {
    rule.has_right(right) && rule.zone_selector().map_or(false, |z| z.matches(azc.zone_id)) && resource_matches(rule, perms)
}

/// Synthetic rules carry no zone and match in every zone
fn synthetic_rule_grants(azc: &AzContext, rule: &AclRule, perms: &PoolObjectAuth, right: Right) -> bool {
    rule.has_right(right) && rule.user_selector().map_or(false, |u| u.matches(azc.uid, azc.gids)) && resource_matches(rule, perms)
}

/// Evaluates one operation on one object: owner fast path, stored rules,
/// then the synthetic owner/group/other rules. Any single grant is enough.
/// The lock state is checked only after a grant.
pub(crate) fn authorize_object(azc: &AzContext, index: &RuleIndex, perms: &PoolObjectAuth, op: Operation, trace: &mut TraceInfo) -> ItemDecision {
    let right = op.right();
    let (owner_rule, group_rule, other_rule) = perms.get_acl_rules();

    let mut is_authorized = false;

    if azc.core_authorize && perms.uid == azc.uid && synthetic_rule_grants(azc, &owner_rule, perms, right) {
        trace.add_rule(RuleSource::Owner, owner_rule.to_str(), owner_rule.rights());
        is_authorized = true;
    }

    if !is_authorized || trace.is_enabled() {
        'keys: for key in azc.principal_keys() {
            for rule in index.candidates(key) {
                if explicit_rule_grants(azc, rule, perms, right) {
                    trace.add_rule(RuleSource::Explicit, rule.to_str(), rule.rights());
                    is_authorized = true;

                    if !trace.is_enabled() {
                        break 'keys;
                    }
                }
            }
        }
    }

    if !is_authorized || trace.is_enabled() {
        for (source, rule) in [(RuleSource::Owner, &owner_rule), (RuleSource::Group, &group_rule), (RuleSource::Other, &other_rule)] {
            if synthetic_rule_grants(azc, rule, perms, right) {
                trace.add_rule(source, rule.to_str(), rule.rights());
                is_authorized = true;

                if !trace.is_enabled() {
                    break;
                }
            }
        }
    }

    if !is_authorized {
        return ItemDecision::Denied;
    }

    if perms.lock_forbids(op) {
        trace.add_info(&format!("{} is locked", perms.describe()));
        return ItemDecision::Locked;
    }

    ItemDecision::Granted
}
