//! Loader arguments: watcher arguments plus the bindings passed into the module.

use serde::{Deserialize, Serialize};
use weir_graph::ModuleArguments;

use crate::watch::FileArguments;

/// Arguments of a [`ModuleLoader`](crate::ModuleLoader).
///
/// The watcher's own arguments are flattened at the top level, so a
/// file-backed module reads as:
///
/// ```yaml
/// filename: modules/scrape.yml
/// detector: poll
/// poll_frequency: 30s
/// arguments:
///   target: localhost:9090
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderArguments<A> {
    #[serde(flatten)]
    pub watch: A,

    /// Arguments to pass into the module.
    #[serde(default)]
    pub arguments: ModuleArguments,
}

/// Arguments of a file-backed module.
pub type ModuleFileArguments = LoaderArguments<FileArguments>;

impl<A> LoaderArguments<A> {
    pub fn new(watch: A) -> Self {
        Self {
            watch,
            arguments: ModuleArguments::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }
}

impl ModuleFileArguments {
    /// Decode from YAML. Watcher defaults apply to any field left out.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
