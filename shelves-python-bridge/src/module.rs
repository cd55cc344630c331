//! Location and identity of the external module

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where to find the module and how to construct its API object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSpec {
    /// Directory appended to the interpreter's module search path
    pub search_path: PathBuf,
    /// Module to import
    pub module: String,
    /// API class inside the module
    pub class: String,
    /// The single boolean passed to the class constructor
    pub debug: bool,
}

impl Default for ModuleSpec {
    fn default() -> Self {
        Self {
            search_path: PathBuf::from("."),
            module: "shelves_api".to_string(),
            class: "ShelvesAPI".to_string(),
            debug: false,
        }
    }
}

impl ModuleSpec {
    /// `module.Class`, for log messages
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.class)
    }
}
