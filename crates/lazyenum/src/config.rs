//! Generator backend selection and coroutine stack configuration.

use std::cell::Cell;
use std::sync::OnceLock;

/// Which generator an enumerator uses to pull values from its source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeneratorBackend {
    /// Use the source's fast adapter when it offers one, else a coroutine.
    #[default]
    Auto,
    /// Always run the traversal inside a coroutine.
    Coroutine,
}

impl GeneratorBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Coroutine => "coroutine",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "coroutine" => Some(Self::Coroutine),
            _ => None,
        }
    }
}

// Per-thread so parallel tests cannot observe each other's override.
thread_local! {
    static BACKEND_OVERRIDE: Cell<Option<GeneratorBackend>> = const { Cell::new(None) };
}

fn backend_override() -> Option<GeneratorBackend> {
    BACKEND_OVERRIDE.with(Cell::get)
}

/// Run `f` with every generator built on this thread forced onto `backend`.
#[cfg(test)]
pub(crate) fn with_backend<T>(backend: GeneratorBackend, f: impl FnOnce() -> T) -> T {
    let prev = BACKEND_OVERRIDE.with(|o| o.replace(Some(backend)));
    let out = f();
    BACKEND_OVERRIDE.with(|o| o.set(prev));
    out
}

/// Configuration applied when an enumerator first builds its generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Coroutine stack size in bytes. `None` uses the corosensei default.
    pub stack_size: Option<usize>,
    pub backend: GeneratorBackend,
}

impl GeneratorConfig {
    pub const STACK_SIZE_VAR: &'static str = "LAZYENUM_STACK_SIZE";
    pub const BACKEND_VAR: &'static str = "LAZYENUM_GENERATOR_BACKEND";

    /// Smallest stack we accept; traversals nest user code on this stack.
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Read the configuration from `LAZYENUM_STACK_SIZE` and
    /// `LAZYENUM_GENERATOR_BACKEND`. Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        let stack_size = std::env::var(Self::STACK_SIZE_VAR)
            .ok()
            .and_then(|raw| match raw.trim().parse::<usize>() {
                Ok(size) => Some(size.max(Self::MIN_STACK_SIZE)),
                Err(_) => {
                    tracing::warn!(%raw, "ignoring unparseable {}", Self::STACK_SIZE_VAR);
                    None
                }
            });
        let backend = std::env::var(Self::BACKEND_VAR)
            .ok()
            .and_then(|raw| {
                let parsed = GeneratorBackend::parse(&raw);
                if parsed.is_none() {
                    tracing::warn!(%raw, "ignoring unknown {}", Self::BACKEND_VAR);
                }
                parsed
            })
            .unwrap_or_default();
        Self {
            stack_size,
            backend,
        }
    }

    /// The configuration new enumerators start with: [`from_env`] read once
    /// per process.
    ///
    /// [`from_env`]: Self::from_env
    pub fn process_default() -> Self {
        static PROCESS_DEFAULT: OnceLock<GeneratorConfig> = OnceLock::new();
        *PROCESS_DEFAULT.get_or_init(Self::from_env)
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size.max(Self::MIN_STACK_SIZE));
        self
    }

    pub fn with_backend(mut self, backend: GeneratorBackend) -> Self {
        self.backend = backend;
        self
    }

    /// The backend in effect, honouring a test override.
    pub(crate) fn effective_backend(&self) -> GeneratorBackend {
        backend_override().unwrap_or(self.backend)
    }
}
