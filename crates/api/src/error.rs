//! Pubsync error types.

use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The core pubsync error type, used across all crates of the workspace.
///
/// The type implements `Clone` so whole `Result`s can be shared between
/// tasks and stored in handler state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PsError {
    /// A sync prefix could not be registered with the transport.
    ///
    /// This is fatal for the engine instance that hit it.
    #[error("prefix registration failed: {ctx}")]
    Registration {
        /// Any context associated with this error.
        ctx: Arc<str>,
    },

    /// A wire decode failure: malformed TLV, bad IBLT component,
    /// wrong content tag. These are soft errors, logged and dropped.
    #[error("decode failed: {ctx}")]
    Decode {
        /// Any context associated with this error.
        ctx: Arc<str>,
    },

    /// Generic pubsync internal error.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

impl PsError {
    /// Construct a registration error.
    pub fn registration<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Registration {
            ctx: ctx.to_string().into_boxed_str().into(),
        }
    }

    /// Construct a wire-decode error.
    pub fn decode<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Decode {
            ctx: ctx.to_string().into_boxed_str().into(),
        }
    }

    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }
}

/// The core pubsync result type.
pub type PsResult<T> = Result<T, PsError>;
