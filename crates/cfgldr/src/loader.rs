use std::path::Path;

use cfgldr_section::{PlainMap, Section};
use cfgldr_verify::{EvalValue, PredicateError, PredicateRegistry, verify};
use tracing::debug;

use crate::error::Result;

/// Entry point for loading configuration files.
///
/// A loader owns the predicates available to schema value rules, starting
/// from the built-in `re`, `fail` and `cond`.
///
/// ```rust,no_run
/// use cfgldr::{EvalValue, Loader};
///
/// let loader = Loader::new().with_predicate("nonempty", |val, _| {
///     Ok(EvalValue::Bool(val.as_str().is_some_and(|s| !s.is_empty())))
/// });
/// let config = loader.load("app.conf", Some("app.schema".as_ref()))?;
/// # Ok::<(), cfgldr::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Loader {
    registry: PredicateRegistry,
}

impl Loader {
    pub fn new() -> Self {
        Loader {
            registry: PredicateRegistry::new(),
        }
    }

    /// A loader whose value rules may call the predicates of `registry`.
    pub fn with_registry(registry: PredicateRegistry) -> Self {
        Loader { registry }
    }

    /// Register a predicate for schema value rules, replacing any predicate
    /// of the same name, built-ins included.
    pub fn with_predicate<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&EvalValue, &[EvalValue]) -> std::result::Result<EvalValue, PredicateError>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(name, predicate);
        self
    }

    pub fn registry(&self) -> &PredicateRegistry {
        &self.registry
    }

    /// Parse a configuration file without verifying it.
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<Section> {
        Ok(cfgldr_parser::parse(path)?)
    }

    /// Parse a configuration file and verify it against the schema file.
    pub fn parse_with_schema(
        &self,
        path: impl AsRef<Path>,
        schema_path: impl AsRef<Path>,
    ) -> Result<Section> {
        let path = path.as_ref();
        let schema_path = schema_path.as_ref();

        let config = cfgldr_parser::parse(path)?;
        let schema = cfgldr_parser::parse_schema(schema_path)?;
        verify(&config, path, &schema, schema_path, &self.registry)?;
        debug!(
            file = %path.display(),
            schema = %schema_path.display(),
            "configuration verified"
        );
        Ok(config)
    }

    /// Parse, verify when `schema_path` is given, and flatten the result.
    pub fn load(&self, path: impl AsRef<Path>, schema_path: Option<&Path>) -> Result<PlainMap> {
        let config = match schema_path {
            Some(schema_path) => self.parse_with_schema(path, schema_path)?,
            None => self.parse(path)?,
        };
        Ok(config.to_plain_mapping())
    }
}
