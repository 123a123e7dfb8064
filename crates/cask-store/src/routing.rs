use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, BlobStream};

type KeyMatcher = Box<dyn Fn(&str) -> bool + Send + Sync>;
type KeyRewriter = Box<dyn Fn(&str) -> String + Send + Sync>;

/// One routing rule: a key matcher, an optional key rewriter, and the target
/// store that handles matching keys.
pub struct RouteBranch {
    matcher: KeyMatcher,
    rewriter: Option<KeyRewriter>,
    target: Arc<dyn BlobStore>,
}

impl RouteBranch {
    /// Create a branch from an arbitrary matcher. The key is passed to the
    /// target unchanged unless [`with_rewriter`] is called.
    ///
    /// [`with_rewriter`]: RouteBranch::with_rewriter
    pub fn new(
        matcher: impl Fn(&str) -> bool + Send + Sync + 'static,
        target: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            matcher: Box::new(matcher),
            rewriter: None,
            target,
        }
    }

    /// Branch matching keys that start with `prefix`, delegating the key
    /// unchanged.
    pub fn prefix(prefix: impl Into<String>, target: Arc<dyn BlobStore>) -> Self {
        let prefix = prefix.into();
        Self::new(move |key| key.starts_with(&prefix), target)
    }

    /// Branch matching keys that start with `prefix` and stripping it before
    /// delegating (e.g. `file://data/x` routed as `data/x`).
    pub fn strip_prefix(prefix: impl Into<String>, target: Arc<dyn BlobStore>) -> Self {
        let prefix = prefix.into();
        let match_prefix = prefix.clone();
        Self::new(move |key| key.starts_with(&match_prefix), target).with_rewriter(move |key| {
            key.strip_prefix(&prefix).unwrap_or(key).to_string()
        })
    }

    /// Rewrite matching keys before handing them to the target.
    pub fn with_rewriter(mut self, rewriter: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.rewriter = Some(Box::new(rewriter));
        self
    }

    fn rewrite(&self, key: &str) -> String {
        match &self.rewriter {
            Some(rewrite) => rewrite(key),
            None => key.to_string(),
        }
    }
}

/// Routing decorator: one `BlobStore` facade over many backends, selected by
/// key shape.
///
/// Branches are evaluated in declaration order and the first match wins --
/// an explicit, documented tie-break rather than "most specific wins". Keys
/// matching no branch go to the default store unrewritten; with no default
/// configured they fail with [`StoreError::NoRoute`], which is a caller
/// configuration error, not a transient condition.
///
/// Routing only decides *which* store handles a call: the chosen target's
/// own errors propagate untouched.
pub struct RoutingStore {
    branches: Vec<RouteBranch>,
    default: Option<Arc<dyn BlobStore>>,
}

impl RoutingStore {
    /// Create a router from an ordered branch list and an optional default
    /// store.
    pub fn new(branches: Vec<RouteBranch>, default: Option<Arc<dyn BlobStore>>) -> Self {
        Self { branches, default }
    }

    /// Pick the handling store and the (possibly rewritten) key.
    fn resolve(&self, key: &str) -> StoreResult<(&dyn BlobStore, String)> {
        for branch in &self.branches {
            if (branch.matcher)(key) {
                return Ok((branch.target.as_ref(), branch.rewrite(key)));
            }
        }
        match &self.default {
            Some(store) => Ok((store.as_ref(), key.to_string())),
            None => Err(StoreError::NoRoute(key.to_string())),
        }
    }
}

#[async_trait]
impl BlobStore for RoutingStore {
    /// Union of every branch target's keys and the default's, deduplicated.
    ///
    /// A source whose `list_all` fails is skipped, not fatal: one broken
    /// backend must not hide the keys of the others.
    async fn list_all(&self) -> StoreResult<Vec<String>> {
        let mut keys = BTreeSet::new();
        let sources = self
            .branches
            .iter()
            .map(|b| &b.target)
            .chain(self.default.iter());
        for (i, source) in sources.enumerate() {
            match source.list_all().await {
                Ok(source_keys) => keys.extend(source_keys),
                Err(e) => {
                    tracing::warn!(source = i, error = %e, "skipping failing source in routed list");
                }
            }
        }
        Ok(keys.into_iter().collect())
    }

    async fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        let (target, key) = self.resolve(key)?;
        target.read(&key).await
    }

    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let (target, key) = self.resolve(key)?;
        target.write(&key, data).await
    }

    async fn read_stream(&self, key: &str) -> StoreResult<BlobStream> {
        let (target, key) = self.resolve(key)?;
        target.read_stream(&key).await
    }

    async fn write_stream(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StoreResult<()> {
        let (target, key) = self.resolve(key)?;
        target.write_stream(&key, reader).await
    }
}

impl std::fmt::Debug for RoutingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingStore")
            .field("branch_count", &self.branches.len())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}
