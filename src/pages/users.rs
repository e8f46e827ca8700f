use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::http::action::{Action, ActionError, ActionOutcome};
use crate::http::request::RequestContext;
use crate::render::{RenderError, ViewNode};
use crate::routing::{Layout, Page};

/// In-memory user names by ID.
#[derive(Debug, Default)]
pub struct UserDirectory {
    names: RwLock<BTreeMap<u64, String>>,
}

impl UserDirectory {
    pub fn with_samples() -> Self {
        let names = [(1, "Ada Lovelace"), (2, "Alan Turing"), (3, "Grace Hopper")]
            .into_iter()
            .map(|(id, name)| (id, name.to_string()))
            .collect();
        Self {
            names: RwLock::new(names),
        }
    }

    pub fn name(&self, id: u64) -> Option<String> {
        self.names
            .read()
            .expect("user directory lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn rename(&self, id: u64, name: String) -> bool {
        let mut names = self.names.write().expect("user directory lock poisoned");
        match names.get_mut(&id) {
            Some(current) => {
                *current = name;
                true
            }
            None => false,
        }
    }
}

pub struct UsersLayout;

impl Layout for UsersLayout {
    fn wrap(&self, _req: &RequestContext, children: ViewNode) -> ViewNode {
        ViewNode::element("section")
            .attr("class", "users")
            .child(children)
    }
}

/// Profile page; its server data is looked up in the directory.
pub struct UserPage {
    directory: Arc<UserDirectory>,
}

impl UserPage {
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Page for UserPage {
    async fn server_data(&self, req: &RequestContext) -> Result<Option<Value>, RenderError> {
        let Some(id) = req.param("id").and_then(|id| id.parse::<u64>().ok()) else {
            return Ok(None);
        };
        Ok(self
            .directory
            .name(id)
            .map(|name| json!({ "id": id, "name": name })))
    }

    async fn render(&self, req: &RequestContext, data: Option<Value>) -> Result<ViewNode, RenderError> {
        let id = req.param("id").unwrap_or_default();
        let name = data
            .as_ref()
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown user");

        Ok(ViewNode::element("article").children([
            ViewNode::element("h1").child(ViewNode::text(name)),
            ViewNode::element("p").child(ViewNode::text(format!("User #{}", id))),
        ]))
    }
}

/// `{"id": <integer>, "name": <non-empty string>}`
pub struct RenameUser {
    directory: Arc<UserDirectory>,
}

impl RenameUser {
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Action for RenameUser {
    async fn run(&self, _req: &RequestContext, input: Value) -> Result<ActionOutcome, ActionError> {
        let id = input
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ActionError::Invalid("id must be an integer".to_string()))?;
        let name = input
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ActionError::Invalid("name must be a non-empty string".to_string()))?;

        if !self.directory.rename(id, name.to_string()) {
            return Err(ActionError::Invalid(format!("unknown user {}", id)));
        }
        Ok(ActionOutcome::new(json!({ "id": id, "name": name }))
            .invalidating(format!("/users/{}", id)))
    }
}
