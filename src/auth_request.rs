use crate::common::{ObjectType, Operation};
use crate::pool_object_auth::PoolObjectAuth;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Объект проверки в запросе
#[derive(Debug, Clone)]
pub enum AuthTarget {
    /// Permissions already resolved by the caller; `template` is set for objects being created
    Object { perms: PoolObjectAuth, template: Option<String> },
    /// Resolved at evaluation time through a `PermissionsProvider`
    Deferred { obj_type: ObjectType, oid: i32 },
}

#[derive(Debug, Clone)]
pub struct AuthItem {
    pub op: Operation,
    pub target: AuthTarget,
    pub(crate) granted: Option<bool>,
}

impl AuthItem {
    pub fn obj_type(&self) -> ObjectType {
        match &self.target {
            AuthTarget::Object { perms, .. } => perms.obj_type,
            AuthTarget::Deferred { obj_type, .. } => *obj_type,
        }
    }

    pub fn granted(&self) -> Option<bool> {
        self.granted
    }

    /// `<TYPE>:<oid | base64(template)>:<OP>:<owner-uid>:<1|0|->`
    pub fn to_wire(&self) -> String {
        let (id, owner) = match &self.target {
            AuthTarget::Object { perms, template: Some(t) } => (STANDARD.encode(t), perms.uid),
            AuthTarget::Object { perms, template: None } => (perms.oid.to_string(), perms.uid),
            AuthTarget::Deferred { oid, .. } => (oid.to_string(), -1),
        };

        let result = match self.granted {
            Some(true) => "1",
            Some(false) => "0",
            None => "-",
        };

        format!("{}:{}:{}:{}:{}", self.obj_type(), id, self.op, owner, result)
    }
}

/// Запрос на аутентификацию и авторизацию одного субъекта.
/// Builds once per call, fills with `add_auth`, is evaluated once by the manager.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    uid: i32,
    gids: BTreeSet<i32>,
    items: Vec<AuthItem>,

    pub username: String,
    pub password: String,
    pub session: String,
    pub driver: String,

    self_authorize: bool,
    message: String,
}

impl AuthRequest {
    pub fn new(uid: i32, gids: impl IntoIterator<Item = i32>) -> Self {
        AuthRequest {
            uid,
            gids: gids.into_iter().collect(),
            items: Vec::new(),
            username: String::new(),
            password: String::new(),
            session: String::new(),
            driver: String::new(),
            self_authorize: true,
            message: String::new(),
        }
    }

    pub fn add_authenticate(&mut self, driver: &str, username: &str, password: &str, session: &str) {
        self.driver = driver.to_string();
        self.username = username.to_string();
        self.password = password.to_string();
        self.session = session.to_string();
    }

    pub fn add_auth(&mut self, op: Operation, perms: &PoolObjectAuth) {
        self.push(op, AuthTarget::Object { perms: perms.clone(), template: None });
    }

    pub fn add_auth_with_template(&mut self, op: Operation, perms: &PoolObjectAuth, template: &str) {
        let template = if template.is_empty() { None } else { Some(template.to_string()) };
        self.push(op, AuthTarget::Object { perms: perms.clone(), template });
    }

    /// Creation of a new object owned by `uid`/`gid`
    pub fn add_create_auth(&mut self, uid: i32, gid: i32, obj_type: ObjectType, template: &str) {
        let perms = PoolObjectAuth::for_create(obj_type, uid, gid);
        self.add_auth_with_template(Operation::Create, &perms, template);
    }

    pub fn add_auth_deferred(&mut self, op: Operation, obj_type: ObjectType, oid: i32) {
        self.push(op, AuthTarget::Deferred { obj_type, oid });
    }

    fn push(&mut self, op: Operation, target: AuthTarget) {
        self.items.push(AuthItem { op, target, granted: None });
    }

    pub fn uid(&self) -> i32 {
        self.uid
    }

    pub fn gids(&self) -> &BTreeSet<i32> {
        &self.gids
    }

    pub fn items(&self) -> &[AuthItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [AuthItem] {
        &mut self.items
    }

    /// Items in wire form joined by a single space, empty if none were added
    pub fn get_auths(&self) -> String {
        self.items.iter().map(AuthItem::to_wire).collect::<Vec<_>>().join(" ")
    }

    pub fn core_authorize(&self) -> bool {
        self.self_authorize
    }

    /// Used by an external driver path to turn off the core shortcut
    pub fn set_self_authorize(&mut self, value: bool) {
        self.self_authorize = value;
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn set_message(&mut self, message: String) {
        self.message = message;
    }

    /// Stored password must be the SHA-256 digest of the session secret.
    /// SHA-1 digests are still accepted through the legacy check.
    pub fn core_authenticate(&self) -> bool {
        hex::encode(Sha256::digest(self.session.as_bytes())) == self.password || self.is_legacy_session_token_valid()
    }

    /// Compatibility with passwords hashed before the SHA-256 migration
    pub fn is_legacy_session_token_valid(&self) -> bool {
        hex::encode(Sha1::digest(self.session.as_bytes())) == self.password
    }
}
