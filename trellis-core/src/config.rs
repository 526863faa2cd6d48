//! Runtime Configuration
//!
//! A small set of process-wide knobs that shape the nodes the renderers
//! create. The configuration lives in a global registry so that compiled
//! component code never has to thread it through call sites.
//!
//! ```rust,ignore
//! use trellis_core::Config;
//!
//! Config::from_json(r#"{ "suspense_tag": "x-suspense" }"#)?.install();
//! ```

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings consulted by Suspense boundaries and lazy loaders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tag of the element a Suspense boundary renders into.
    pub suspense_tag: String,

    /// Comment text substituted for children that suspended.
    pub suspense_placeholder: String,

    /// Comment text of the placeholder a lazy component renders while loading.
    pub lazy_placeholder: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suspense_tag: "trellis-suspense".to_string(),
            suspense_placeholder: "suspense".to_string(),
            lazy_placeholder: "lazy".to_string(),
        }
    }
}

static CONFIG: OnceLock<RwLock<Arc<Config>>> = OnceLock::new();

fn get_config() -> &'static RwLock<Arc<Config>> {
    CONFIG.get_or_init(|| RwLock::new(Arc::new(Config::default())))
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replace the process-wide configuration.
    pub fn install(self) {
        tracing::debug!(config = ?self, "installing configuration");
        *get_config().write() = Arc::new(self);
    }

    /// The configuration currently in effect.
    pub fn current() -> Arc<Config> {
        Arc::clone(&get_config().read())
    }
}
