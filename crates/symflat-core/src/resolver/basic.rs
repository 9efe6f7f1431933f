//! Source database: the modules conversion reads from.

use std::collections::BTreeMap;

use tracing::{info, warn};

use super::fast::FastModule;
use crate::error::{SymflatError, SymflatResult};
use crate::module::SymbolModule;
use crate::parser::parse_text_to_module;

/// One module held by a [`SourceDatabase`].
#[derive(Debug, Clone)]
pub enum StoredModule
{
    /// Parsed, map-based module; serialized on conversion.
    Basic(SymbolModule),
    /// Already flat; conversion copies its buffer.
    Fast(FastModule),
}

impl StoredModule
{
    /// Module name.
    pub fn name(&self) -> &str
    {
        match self {
            StoredModule::Basic(module) => module.name(),
            StoredModule::Fast(module) => module.name(),
        }
    }

    /// Whether the module was marked corrupt when parsed.
    pub fn is_corrupt(&self) -> bool
    {
        match self {
            StoredModule::Basic(module) => module.is_corrupt,
            StoredModule::Fast(module) => module.is_corrupt(),
        }
    }
}

impl From<SymbolModule> for StoredModule
{
    fn from(module: SymbolModule) -> Self
    {
        StoredModule::Basic(module)
    }
}

impl From<FastModule> for StoredModule
{
    fn from(module: FastModule) -> Self
    {
        StoredModule::Fast(module)
    }
}

/// Modules keyed by id, iterated in id order.
///
/// Conversion only borrows the database, so the same modules can be
/// converted any number of times and into any number of consumers.
#[derive(Debug, Default, Clone)]
pub struct SourceDatabase
{
    modules: BTreeMap<String, StoredModule>,
}

impl SourceDatabase
{
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Parse Breakpad-format text and store the result under `module_id`.
    ///
    /// ## Errors
    ///
    /// - [`SymflatError::InvalidArgument`] if `module_id` is already loaded
    /// - [`SymflatError::ParseFailure`] if the text is not a symbol file
    pub fn load_module_from_text(&mut self, module_id: &str, text: &str) -> SymflatResult<()>
    {
        if self.modules.contains_key(module_id) {
            warn!(module = module_id, "symbols for module already loaded");
            return Err(SymflatError::InvalidArgument(format!("module {module_id} is already loaded")));
        }

        let module = parse_text_to_module(module_id, text)?;
        if module.is_corrupt {
            warn!(module = module_id, "module loaded with corrupt records");
        }
        info!(module = module_id, functions = module.functions.len(), "loaded symbols");
        self.modules.insert(module_id.to_string(), StoredModule::Basic(module));
        Ok(())
    }

    /// Store a module, returning the one it replaces.
    pub fn insert(&mut self, module_id: impl Into<String>, module: impl Into<StoredModule>) -> Option<StoredModule>
    {
        self.modules.insert(module_id.into(), module.into())
    }

    /// Module by id.
    pub fn get(&self, module_id: &str) -> Option<&StoredModule>
    {
        self.modules.get(module_id)
    }

    /// Remove a module by id.
    pub fn remove(&mut self, module_id: &str) -> Option<StoredModule>
    {
        self.modules.remove(module_id)
    }

    /// Modules in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoredModule)>
    {
        self.modules.iter().map(|(id, module)| (id.as_str(), module))
    }

    pub(crate) fn modules(&self) -> &BTreeMap<String, StoredModule>
    {
        &self.modules
    }

    /// Number of modules.
    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_load_module_from_text()
    {
        let mut database = SourceDatabase::new();
        database.load_module_from_text("app", "FUNC 1000 10 0 main\n").unwrap();
        assert_eq!(database.len(), 1);

        let stored = database.get("app").unwrap();
        assert_eq!(stored.name(), "app");
        assert!(!stored.is_corrupt());
        assert!(matches!(stored, StoredModule::Basic(module) if module.functions.len() == 1));
    }

    #[test]
    fn test_duplicate_load_is_rejected()
    {
        let mut database = SourceDatabase::new();
        database.load_module_from_text("app", "").unwrap();
        let err = database.load_module_from_text("app", "FUNC 1000 10 0 main\n").unwrap_err();
        assert!(matches!(err, SymflatError::InvalidArgument(_)));
    }

    #[test]
    fn test_iter_is_ordered_by_id()
    {
        let mut database = SourceDatabase::new();
        database.insert("b", SymbolModule::new("b"));
        database.insert("a", SymbolModule::new("a"));
        let ids: Vec<&str> = database.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(database.remove("a").is_some());
        assert!(database.get("a").is_none());
    }
}
