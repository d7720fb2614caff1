use acl_authorization::{AclConfig, AclError, AclManager, AclRule, ObjectType, PermissionsProvider, PoolObjectAuth, Result, RuleStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Persisted side of the mock store, shared with the test through `MockStore::clone`
#[derive(Default)]
pub struct StoredRules {
    pub rules: Vec<AclRule>,
    pub error_mode: bool,
}

/// Mock RuleStore implementation for testing
#[derive(Clone, Default)]
pub struct MockStore {
    pub inner: Arc<Mutex<StoredRules>>,
}

impl MockStore {
    pub fn new() -> Self {
        MockStore::default()
    }

    /// Store prefilled with rules given in text form, oids assigned from 0
    #[allow(dead_code)]
    pub fn with_rules(rules: &[&str]) -> Self {
        let store = MockStore::new();
        {
            let mut inner = store.inner.lock();
            for (oid, text) in rules.iter().enumerate() {
                let rule: AclRule = text.parse().unwrap();
                inner.rules.push(AclRule::new(oid as i32, rule.user(), rule.resource(), rule.rights(), rule.zone()));
            }
        }
        store
    }

    #[allow(dead_code)]
    pub fn set_error_mode(&self, on: bool) {
        self.inner.lock().error_mode = on;
    }

    #[allow(dead_code)]
    pub fn stored_oids(&self) -> Vec<i32> {
        self.inner.lock().rules.iter().map(AclRule::oid).collect()
    }
}

impl RuleStore for MockStore {
    fn insert(&mut self, rule: &AclRule) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.error_mode {
            return Err(AclError::Store("mock store error".to_string()));
        }
        inner.rules.push(rule.clone());
        Ok(())
    }

    fn delete(&mut self, oid: i32) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.error_mode {
            return Err(AclError::Store("mock store error".to_string()));
        }
        inner.rules.retain(|r| r.oid() != oid);
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<AclRule>> {
        let inner = self.inner.lock();
        if inner.error_mode {
            return Err(AclError::Store("mock store error".to_string()));
        }
        Ok(inner.rules.clone())
    }
}

/// Mock PermissionsProvider: live objects by type and oid
#[derive(Default)]
pub struct MockObjects {
    pub objects: HashMap<(ObjectType, i32), PoolObjectAuth>,
}

impl MockObjects {
    pub fn new() -> Self {
        MockObjects::default()
    }

    #[allow(dead_code)]
    pub fn add(&mut self, perms: PoolObjectAuth) {
        self.objects.insert((perms.obj_type, perms.oid), perms);
    }
}

impl PermissionsProvider for MockObjects {
    fn get_permissions(&self, obj_type: ObjectType, oid: i32) -> Option<PoolObjectAuth> {
        self.objects.get(&(obj_type, oid)).cloned()
    }
}

/// Manager over a mock store with the default configuration (superuser uid 0, gid 0)
#[allow(dead_code)]
pub fn manager_with(rules: &[&str]) -> AclManager<MockStore> {
    AclManager::new(MockStore::with_rules(rules), AclConfig::default()).unwrap()
}
