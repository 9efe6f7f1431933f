//! Collection of flat modules, fed by the serializer.

use std::collections::HashMap;

use tracing::{info, warn};

use super::FastModule;
use crate::serializer::{CodeModuleDescriptor, ModuleLoader};
use crate::types::SourceLineInfo;

/// Flat-buffer consumer: holds loaded [`FastModule`]s keyed by module id.
///
/// ## Thread Safety
///
/// Not synchronized. Batch conversion registers modules from the calling
/// thread only, so no locking is needed there.
#[derive(Debug, Default)]
pub struct FastResolver
{
    modules: HashMap<String, FastModule>,
}

impl FastResolver
{
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Whether a module with this id is loaded.
    pub fn has_module(&self, module_id: &str) -> bool
    {
        self.modules.contains_key(module_id)
    }

    /// Loaded module by id.
    pub fn module(&self, module_id: &str) -> Option<&FastModule>
    {
        self.modules.get(module_id)
    }

    /// Drop a loaded module, returning it.
    pub fn unload(&mut self, module_id: &str) -> Option<FastModule>
    {
        self.modules.remove(module_id)
    }

    /// Resolve an address inside one module.
    pub fn lookup(&self, module_id: &str, address: u64) -> Option<SourceLineInfo>
    {
        self.modules.get(module_id)?.lookup_address(address)
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    /// Whether no module is loaded.
    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }
}

impl ModuleLoader for FastResolver
{
    fn load_from_buffer(&mut self, descriptor: &CodeModuleDescriptor, buffer: Vec<u8>) -> bool
    {
        let module_id = descriptor.id();
        if self.modules.contains_key(module_id) {
            warn!(module = module_id, "symbols for module already loaded");
            return false;
        }

        match FastModule::load(module_id, buffer) {
            Ok(module) => {
                info!(module = module_id, size = module.as_bytes().len(), "loaded module");
                self.modules.insert(module_id.to_string(), module);
                true
            }
            Err(err) => {
                warn!(module = module_id, %err, "rejecting serialized module");
                false
            }
        }
    }
}
