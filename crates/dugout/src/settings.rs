// Typed accessors over the key-value settings table.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::db::Database;

const PORTAL_KEY: &str = "open_draft_portal_to_managers";
const MASTER_PASSWORD_KEY: &str = "master_password";

/// League-wide switches shared by the draft engine and the transport.
#[derive(Clone)]
pub struct Settings {
    db: Arc<Database>,
}

impl Settings {
    pub fn new(db: Arc<Database>) -> Self {
        Settings { db }
    }

    /// Whether managers can see the draft portal. Closed unless set.
    pub fn is_portal_open(&self) -> Result<bool> {
        Ok(self
            .db
            .load_setting(PORTAL_KEY)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    pub fn set_portal_open(&self, open: bool) -> Result<()> {
        self.db.save_setting(PORTAL_KEY, &Value::Bool(open))
    }

    /// Password required on the operator endpoint, if one is set.
    pub fn master_password(&self) -> Result<Option<String>> {
        Ok(self
            .db
            .load_setting(MASTER_PASSWORD_KEY)?
            .and_then(|v| v.as_str().map(str::to_owned))
            .filter(|p| !p.is_empty()))
    }

    /// Set or clear the master password. An empty string clears it.
    pub fn set_master_password(&self, password: Option<&str>) -> Result<()> {
        match password.filter(|p| !p.is_empty()) {
            Some(p) => self
                .db
                .save_setting(MASTER_PASSWORD_KEY, &Value::String(p.to_owned())),
            None => self.db.delete_setting(MASTER_PASSWORD_KEY),
        }
    }
}
