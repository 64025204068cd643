//! Loop construction configuration (§4.7, ambient).
//!
//! A builder rather than environment-variable sniffing: every field has a
//! documented default, so `LoopConfig::default()` (equivalently,
//! `Loop::new()`) is a complete, zero-configuration happy path.

/// Configuration accepted by [`crate::Loop::with_config`].
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub(crate) initial_pool_size: Option<usize>,
    pub(crate) eager_default_pool: bool,
    pub(crate) span_prefix: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            initial_pool_size: None,
            eager_default_pool: false,
            span_prefix: None,
        }
    }
}

impl LoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hint for how many default-pool worker threads to provision once
    /// the pool is required. `None` (the default) means "pick a size from
    /// available parallelism the first time a `Work` item is started".
    pub fn initial_pool_size(mut self, size: usize) -> Self {
        self.initial_pool_size = Some(size);
        self
    }

    /// Whether to provision the default thread pool immediately, during
    /// [`crate::Loop::new`]/[`crate::Loop::with_config`], rather than
    /// lazily on the first `Work` item. Default `false`: most loops never
    /// use the pool, so provisioning it eagerly would spawn threads no one
    /// asked for.
    pub fn eager_default_pool(mut self, eager: bool) -> Self {
        self.eager_default_pool = eager;
        self
    }

    /// An optional prefix applied to this loop's tracing spans, so a
    /// process running more than one loop can tell their logs apart.
    /// Default `None`: spans are unprefixed.
    pub fn span_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.span_prefix = Some(prefix.into());
        self
    }
}
