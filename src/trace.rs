use crate::common::rights_to_pretty_string;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Откуда взялось проверяемое правило
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    Explicit,
    Owner,
    Group,
    Other,
}

impl RuleSource {
    fn as_str(self) -> &'static str {
        match self {
            RuleSource::Explicit => "explicit",
            RuleSource::Owner => "owner",
            RuleSource::Group => "group",
            RuleSource::Other => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub enum TraceNode {
    Step {
        name: String,
        details: BTreeMap<String, String>,
        children: Vec<TraceNode>,
        granted_rights: u64,
    },
    Rule {
        source: RuleSource,
        rule: String,
        rights: u64,
    },
    Info(String),
}

pub struct TraceInfo {
    root: Option<TraceNode>,
    current_path: Vec<usize>,
    mode: TraceMode,
    uid: Option<i32>,
    gids: Option<Vec<i32>>,
    started_at: DateTime<Utc>,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum TraceMode {
    Disabled,
    Enabled,
    Detailed,
}

impl TraceInfo {
    pub fn new(mode: TraceMode) -> Self {
        let root = match mode {
            TraceMode::Disabled => None,
            _ => Some(TraceNode::Step {
                name: "authorize".to_string(),
                details: BTreeMap::new(),
                children: Vec::new(),
                granted_rights: 0,
            }),
        };

        TraceInfo {
            root,
            current_path: Vec::new(),
            mode,
            uid: None,
            gids: None,
            started_at: Utc::now(),
        }
    }

    pub fn mode(&self) -> TraceMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != TraceMode::Disabled
    }

    pub fn with_details(mut self, uid: i32, gids: &[i32]) -> Self {
        if self.mode != TraceMode::Disabled {
            self.uid = Some(uid);
            self.gids = Some(gids.to_vec());
        }
        self
    }

    pub fn start_step(&mut self, name: &str, details: BTreeMap<String, String>) {
        if self.mode == TraceMode::Disabled {
            return;
        }
        let new_step = TraceNode::Step {
            name: name.to_string(),
            details,
            children: Vec::new(),
            granted_rights: 0,
        };
        self.add_node(new_step);
        let new_index = self.get_current_children_len() - 1;
        self.current_path.push(new_index);
    }

    pub fn end_step(&mut self) {
        if self.mode == TraceMode::Disabled {
            return;
        }
        if !self.current_path.is_empty() {
            let rights = self.get_current_rights();
            self.current_path.pop();
            self.update_step_rights(rights);
        }
    }

    pub fn update_step_rights(&mut self, new_rights: u64) {
        if self.mode == TraceMode::Disabled {
            return;
        }
        if let Some(TraceNode::Step { granted_rights, .. }) = self.get_current_node_mut() {
            *granted_rights |= new_rights;
        }
    }

    /// Records a rule that matched the principal and the object.
    /// Only the detailed mode keeps rules granting nothing.
    pub fn add_rule(&mut self, source: RuleSource, rule: &str, rights: u64) {
        if self.mode == TraceMode::Disabled || (rights == 0 && self.mode != TraceMode::Detailed) {
            return;
        }
        self.add_node(TraceNode::Rule {
            source,
            rule: rule.to_string(),
            rights,
        });
        self.update_step_rights(rights);
    }

    pub fn add_info(&mut self, info: &str) {
        if self.mode == TraceMode::Disabled {
            return;
        }
        self.add_node(TraceNode::Info(info.to_string()));
    }

    fn add_node(&mut self, node: TraceNode) {
        if let Some(TraceNode::Step { children, .. }) = self.get_current_node_mut() {
            children.push(node);
        }
    }

    fn get_current_rights(&self) -> u64 {
        match self.get_current_node() {
            Some(TraceNode::Step { granted_rights, .. }) => *granted_rights,
            _ => 0,
        }
    }

    fn get_current_node(&self) -> Option<&TraceNode> {
        self.root.as_ref().and_then(|root| {
            let mut current = root;
            for &index in &self.current_path {
                if let TraceNode::Step { children, .. } = current {
                    current = children.get(index)?;
                } else {
                    return None;
                }
            }
            Some(current)
        })
    }

    fn get_current_node_mut(&mut self) -> Option<&mut TraceNode> {
        self.root.as_mut().and_then(|root| {
            let mut current = root;
            for &index in &self.current_path {
                if let TraceNode::Step { children, .. } = current {
                    current = children.get_mut(index)?;
                } else {
                    return None;
                }
            }
            Some(current)
        })
    }

    fn get_current_children_len(&self) -> usize {
        match self.get_current_node() {
            Some(TraceNode::Step { children, .. }) => children.len(),
            _ => 0,
        }
    }

    pub fn root(&self) -> Option<&TraceNode> {
        self.root.as_ref()
    }

    pub fn finalize(self) -> Option<String> {
        match self.mode {
            TraceMode::Disabled => None,
            _ => Some(self.to_json_string()),
        }
    }

    fn to_json_string(&self) -> String {
        let json_value = json!({
            "uid": self.uid,
            "gids": self.gids,
            "started_at": self.started_at.to_rfc3339(),
            "trace": self.root.as_ref().map(node_to_json)
        });
        serde_json::to_string_pretty(&json_value).unwrap_or_default()
    }
}

fn node_to_json(node: &TraceNode) -> Value {
    match node {
        TraceNode::Step { name, details, children, granted_rights } => {
            json!({
                "type": "step",
                "name": name,
                "details": details,
                "granted_rights": rights_to_pretty_string(*granted_rights),
                "children": children.iter().map(node_to_json).collect::<Vec<_>>()
            })
        },
        TraceNode::Rule { source, rule, rights } => {
            json!({
                "type": "rule",
                "source": source.as_str(),
                "rule": rule,
                "rights": rights_to_pretty_string(*rights)
            })
        },
        TraceNode::Info(info) => {
            json!({
                "type": "info",
                "message": info
            })
        },
    }
}
