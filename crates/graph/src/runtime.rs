use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::error::GraphError;

/// Argument bindings passed from a loader into a nested module. Opaque to the loader.
pub type ModuleArguments = BTreeMap<String, serde_yaml::Value>;

/// A nested component graph that can be (re)built from raw content.
///
/// Loaders call [`load_content`](GraphRuntime::load_content) every time their
/// source changes; a rejected load must leave the previously loaded graph in place.
#[async_trait]
pub trait GraphRuntime: Send + Sync {
    /// Build or update the graph from `content`, binding `arguments`.
    fn load_content(&self, arguments: &ModuleArguments, content: &str) -> Result<(), GraphError>;

    /// Drive the graph until `shutdown` is cancelled.
    async fn run(&self, shutdown: CancellationToken);

    /// HTTP routes exposed by the graph.
    fn handler(&self) -> Router;
}

/// Blanket implementation so `Arc<dyn GraphRuntime>` can be used directly.
#[async_trait]
impl<T: GraphRuntime + ?Sized> GraphRuntime for Arc<T> {
    fn load_content(&self, arguments: &ModuleArguments, content: &str) -> Result<(), GraphError> {
        (**self).load_content(arguments, content)
    }

    async fn run(&self, shutdown: CancellationToken) {
        (**self).run(shutdown).await
    }

    fn handler(&self) -> Router {
        (**self).handler()
    }
}
