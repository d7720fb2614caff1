use crate::acl_rule::AclRule;
use crate::auth_request::{AuthRequest, AuthTarget};
use crate::authorize_item::{authorize_object, AzContext, ItemDecision};
use crate::bitfield::{encode_id, ResourceSelector, ZoneSelector, CLUSTER_ID, GROUP_ID, INDIVIDUAL_ID};
use crate::common::{ObjectType, Operation, PermissionsProvider, RuleStore};
use crate::config::AclConfig;
use crate::errors::{AclError, Result};
use crate::pool_object_auth::PoolObjectAuth;
use crate::trace::{TraceInfo, TraceMode};
use crate::vm_actions::{VmAction, VmActions};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, error, info, warn};

/// In-memory mirror of the rule table, indexed by oid and by the raw user field
#[derive(Debug, Default)]
pub(crate) struct RuleIndex {
    rules: BTreeMap<i32, AclRule>,
    by_user: HashMap<u64, BTreeSet<i32>>,
}

impl RuleIndex {
    pub fn insert(&mut self, rule: AclRule) {
        self.by_user.entry(rule.user()).or_default().insert(rule.oid());
        self.rules.insert(rule.oid(), rule);
    }

    pub fn remove(&mut self, oid: i32) -> Option<AclRule> {
        let rule = self.rules.remove(&oid)?;

        if let Some(oids) = self.by_user.get_mut(&rule.user()) {
            oids.remove(&oid);
            if oids.is_empty() {
                self.by_user.remove(&rule.user());
            }
        }

        Some(rule)
    }

    pub fn get(&self, oid: i32) -> Option<&AclRule> {
        self.rules.get(&oid)
    }

    /// Rules whose user field is exactly `user_key`, in oid order
    pub fn candidates(&self, user_key: u64) -> impl Iterator<Item = &AclRule> + '_ {
        self.by_user.get(&user_key).into_iter().flatten().filter_map(move |oid| self.rules.get(oid))
    }

    pub fn find_duplicate(&self, rule: &AclRule) -> Option<&AclRule> {
        self.candidates(rule.user()).find(|r| *r == rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AclRule> + '_ {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    fn clear(&mut self) {
        self.rules.clear();
        self.by_user.clear();
    }
}

struct AclState<S> {
    store: S,
    index: RuleIndex,
    last_oid: i32,
}

/// Итог авторизации запроса
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub granted: bool,
    /// Empty when granted, otherwise one sentence per failing item
    pub message: String,
}

/// Objects of one type a principal may act on, for pool listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseSearch {
    pub all: bool,
    pub oids: Vec<i32>,
    pub gids: Vec<i32>,
    pub cids: Vec<i32>,
}

/// Менеджер правил: хранит таблицу правил и отвечает на запросы авторизации.
///
/// Mutations are serialized by the write lock, evaluations share the read lock
/// and always see a consistent rule set.
pub struct AclManager<S: RuleStore> {
    config: AclConfig,
    vm_actions: VmActions,
    state: RwLock<AclState<S>>,
}

impl<S: RuleStore> AclManager<S> {
    pub fn new(store: S, config: AclConfig) -> Result<Self> {
        let vm_actions = VmActions::from_config(&config)?;

        let manager = AclManager {
            config,
            vm_actions,
            state: RwLock::new(AclState {
                store,
                index: RuleIndex::default(),
                last_oid: -1,
            }),
        };
        manager.reload()?;

        Ok(manager)
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    pub fn zone_id(&self) -> i32 {
        self.config.zone_id
    }

    /// Rebuilds the in-memory mirror from the store. Malformed stored rules are skipped.
    pub fn reload(&self) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let rules = state.store.load().map_err(|e| {
            error!("failed to load ACL rules: {}", e);
            e
        })?;

        state.index.clear();
        for rule in rules {
            // oids of skipped rules are still taken in the store
            state.last_oid = state.last_oid.max(rule.oid());

            if let Some(reason) = self.check_rule(&rule) {
                warn!("skip stored ACL rule {}: {}", rule.oid(), reason);
                continue;
            }
            state.index.insert(rule);
        }

        info!("loaded {} ACL rules", state.index.len());
        Ok(())
    }

    fn check_rule(&self, rule: &AclRule) -> Option<String> {
        if self.config.federation {
            rule.malformed_in_federation()
        } else {
            rule.malformed()
        }
    }

    /// Validates, persists and indexes a new rule, returns its oid
    pub fn add_rule(&self, user: u64, resource: u64, rights: u64, zone: u64) -> Result<i32> {
        let mut rule = AclRule::new(-1, user, resource, rights, zone);

        if let Some(reason) = self.check_rule(&rule) {
            warn!("rejected malformed ACL rule {}: {}", rule, reason);
            return Err(AclError::Malformed(reason));
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(existing) = state.index.find_duplicate(&rule) {
            warn!("rejected ACL rule {}, same as rule {}", rule, existing.oid());
            return Err(AclError::AlreadyExists(format!("{} (rule {})", rule, existing.oid())));
        }

        let oid = match state.last_oid.checked_add(1) {
            Some(oid) => oid,
            None => {
                error!("no ACL rule oid left after {}", state.last_oid);
                return Err(AclError::Store(format!("rule oid space exhausted at {}", state.last_oid)));
            },
        };
        rule.set_oid(oid);

        if let Err(e) = state.store.insert(&rule) {
            error!("failed to store ACL rule {}: {}", rule, e);
            return Err(e);
        }

        state.last_oid = oid;
        info!("added ACL rule {}: {}", oid, rule);
        state.index.insert(rule);

        Ok(oid)
    }

    /// Adds a rule from its text form; a missing zone token means the local zone
    pub fn add_rule_str(&self, text: &str) -> Result<i32> {
        let rule = AclRule::parse(text, ZoneSelector::Individual(self.config.zone_id))?;
        self.add_rule(rule.user(), rule.resource(), rule.rights(), rule.zone())
    }

    pub fn del_rule(&self, oid: i32) -> Result<()> {
        let mut guard = self.state.write();
        Self::delete_locked(&mut guard, oid)
    }

    fn delete_locked(state: &mut AclState<S>, oid: i32) -> Result<()> {
        if state.index.get(oid).is_none() {
            return Err(AclError::NotFound(oid));
        }

        if let Err(e) = state.store.delete(oid) {
            error!("failed to delete ACL rule {}: {}", oid, e);
            return Err(e);
        }

        if let Some(rule) = state.index.remove(oid) {
            info!("deleted ACL rule {}: {}", oid, rule);
        }

        Ok(())
    }

    /// Deletes every rule selected by `pred`, returns how many were removed
    fn del_matching(&self, pred: impl Fn(&AclRule) -> bool) -> Result<usize> {
        let mut guard = self.state.write();

        let oids: Vec<i32> = guard.index.iter().filter(|&r| pred(r)).map(AclRule::oid).collect();
        for oid in oids.iter() {
            Self::delete_locked(&mut guard, *oid)?;
        }

        Ok(oids.len())
    }

    /// Rules granted to the user and rules over the user object itself
    pub fn del_uid_rules(&self, uid: i32) -> Result<usize> {
        let user = INDIVIDUAL_ID | encode_id(uid);
        let resource = ObjectType::User.bit() | INDIVIDUAL_ID | encode_id(uid);
        self.del_matching(|r| r.user() == user || r.resource() == resource)
    }

    /// Rules granted to the group, rules over the group's objects and over the group itself
    pub fn del_gid_rules(&self, gid: i32) -> Result<usize> {
        let user = GROUP_ID | encode_id(gid);
        let resource = ObjectType::Group.bit() | INDIVIDUAL_ID | encode_id(gid);
        self.del_matching(|r| r.user() == user || (r.resource_code() & GROUP_ID != 0 && r.resource_id() == gid) || r.resource() == resource)
    }

    pub fn del_cid_rules(&self, cid: i32) -> Result<usize> {
        let resource = ObjectType::Cluster.bit() | INDIVIDUAL_ID | encode_id(cid);
        self.del_matching(|r| (r.resource_code() & CLUSTER_ID != 0 && r.resource_id() == cid) || r.resource() == resource)
    }

    pub fn del_zid_rules(&self, zid: i32) -> Result<usize> {
        let zone = INDIVIDUAL_ID | encode_id(zid);
        let resource = ObjectType::Zone.bit() | INDIVIDUAL_ID | encode_id(zid);
        self.del_matching(|r| r.zone() == zone || r.resource() == resource)
    }

    /// Rules naming exactly this object, used when the object is dropped
    pub fn del_resource_rules(&self, oid: i32, obj_type: ObjectType) -> Result<usize> {
        let resource = obj_type.bit() | INDIVIDUAL_ID | encode_id(oid);
        self.del_matching(|r| r.resource() == resource)
    }

    pub fn get_rule(&self, oid: i32) -> Option<AclRule> {
        self.state.read().index.get(oid).cloned()
    }

    /// All rules in oid order
    pub fn get_rules(&self) -> Vec<AclRule> {
        self.state.read().index.iter().cloned().collect()
    }

    /// Listing payload: JSON array of rule records
    pub fn dump_json(&self) -> Result<String> {
        let records: Vec<_> = self.state.read().index.iter().map(AclRule::to_record).collect();
        Ok(serde_json::to_string(&records)?)
    }

    pub fn is_superuser(&self, uid: i32, gids: &BTreeSet<i32>) -> bool {
        uid == self.config.superuser_uid || gids.contains(&self.config.superuser_gid)
    }

    /// Evaluates every item of the request. Deferred items stay unresolved.
    pub fn authorize(&self, req: &mut AuthRequest) -> AuthResult {
        let mut trace = TraceInfo::new(TraceMode::Disabled);
        self.evaluate(req, None, &mut trace)
    }

    pub fn authorize_with(&self, req: &mut AuthRequest, objects: &dyn PermissionsProvider) -> AuthResult {
        let mut trace = TraceInfo::new(TraceMode::Disabled);
        self.evaluate(req, Some(objects), &mut trace)
    }

    /// Same as `authorize_with` and also returns the decision tree
    pub fn trace(&self, req: &mut AuthRequest, objects: Option<&dyn PermissionsProvider>) -> (AuthResult, TraceInfo) {
        let gids: Vec<i32> = req.gids().iter().copied().collect();
        let mut trace = TraceInfo::new(TraceMode::Detailed).with_details(req.uid(), &gids);
        let result = self.evaluate(req, objects, &mut trace);
        (result, trace)
    }

    fn evaluate(&self, req: &mut AuthRequest, objects: Option<&dyn PermissionsProvider>, trace: &mut TraceInfo) -> AuthResult {
        let uid = req.uid();
        let gids = req.gids().clone();
        let superuser = self.is_superuser(uid, &gids);

        let azc = AzContext {
            uid,
            gids: &gids,
            zone_id: self.config.zone_id,
            core_authorize: req.core_authorize(),
        };

        // провайдер вызывается до блокировки, он может сам обращаться к менеджеру
        let resolved: Vec<Option<PoolObjectAuth>> = req
            .items()
            .iter()
            .map(|item| match &item.target {
                AuthTarget::Object { .. } => None,
                AuthTarget::Deferred { obj_type, oid } => objects.and_then(|o| o.get_permissions(*obj_type, *oid)),
            })
            .collect();

        let state = self.state.read();
        let mut failures = Vec::new();

        for (item, resolved) in req.items_mut().iter_mut().zip(resolved.iter()) {
            let op = item.op;

            let perms: Option<&PoolObjectAuth> = match &item.target {
                AuthTarget::Object { perms, .. } => Some(perms),
                AuthTarget::Deferred { .. } => resolved.as_ref(),
            };

            let failure = match perms {
                None => {
                    let oid = match &item.target {
                        AuthTarget::Deferred { oid, .. } => *oid,
                        AuthTarget::Object { perms, .. } => perms.oid,
                    };
                    let msg = format!("Error getting {} [{}].", item.obj_type(), oid);
                    trace.add_info(&msg);
                    Some(msg)
                },
                Some(perms) => {
                    let mut details = BTreeMap::new();
                    details.insert("operation".to_string(), op.to_string());
                    details.insert("object".to_string(), perms.describe());
                    trace.start_step("item", details);

                    let decision = if superuser {
                        trace.add_info("superuser");
                        if perms.lock_forbids(op) {
                            ItemDecision::Locked
                        } else {
                            ItemDecision::Granted
                        }
                    } else {
                        authorize_object(&azc, &state.index, perms, op, trace)
                    };

                    let failure = match decision {
                        ItemDecision::Granted => None,
                        ItemDecision::Denied => Some(format!("Not authorized to perform {} {}.", op, perms.describe())),
                        ItemDecision::Locked => Some(format!("{} is locked, {} not allowed.", perms.describe(), op)),
                    };

                    trace.add_info(failure.as_deref().unwrap_or("granted"));
                    trace.end_step();
                    failure
                },
            };

            item.granted = Some(failure.is_none());

            if let Some(msg) = failure {
                debug!("uid {}: {}", uid, msg);
                failures.push(msg);
            }
        }

        let granted = failures.is_empty();
        let message = failures.join(" ");

        req.set_message(message.clone());
        let self_authorize = req.core_authorize() && granted;
        req.set_self_authorize(self_authorize);

        AuthResult { granted, message }
    }

    /// Filter of the objects of `obj_type` on which the principal may perform `op`
    pub fn reverse_search(&self, uid: i32, gids: &BTreeSet<i32>, obj_type: ObjectType, op: Operation) -> ReverseSearch {
        let mut result = ReverseSearch::default();

        if self.is_superuser(uid, gids) {
            result.all = true;
            return result;
        }

        let azc = AzContext {
            uid,
            gids,
            zone_id: self.config.zone_id,
            core_authorize: true,
        };

        let mut oids = BTreeSet::new();
        let mut group_ids = BTreeSet::new();
        let mut cids = BTreeSet::new();

        let state = self.state.read();
        for key in azc.principal_keys() {
            for rule in state.index.candidates(key) {
                let zone_ok = rule.zone_selector().map_or(false, |z| z.matches(azc.zone_id));
                if !zone_ok || !rule.has_right(op.right()) || !rule.resource_types().contains(obj_type) {
                    continue;
                }

                match rule.resource_selector() {
                    Some(ResourceSelector::All) => result.all = true,
                    Some(ResourceSelector::Individual(oid)) => {
                        oids.insert(oid);
                    },
                    Some(ResourceSelector::Group(gid)) => {
                        group_ids.insert(gid);
                    },
                    Some(ResourceSelector::Cluster(cid)) => {
                        cids.insert(cid);
                    },
                    None => {},
                }
            }
        }

        result.oids = oids.into_iter().collect();
        result.gids = group_ids.into_iter().collect();
        result.cids = cids.into_iter().collect();
        result
    }

    pub fn vm_actions(&self) -> &VmActions {
        &self.vm_actions
    }

    /// Operation required for a VM action under the configured action sets
    pub fn vm_auth_op(&self, action: VmAction) -> Operation {
        self.vm_actions.get_auth_op(action)
    }
}
