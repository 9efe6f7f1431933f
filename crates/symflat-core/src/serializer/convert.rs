//! Whole-database conversion from a source database into a flat consumer.

use rayon::prelude::*;
use tracing::{info, warn};

use super::ModuleSerializer;
use crate::error::{SymflatError, SymflatResult};
use crate::resolver::{SourceDatabase, StoredModule};

/// Minimal description of a code module handed to a consumer with its buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeModuleDescriptor
{
    pub base_address: u64,
    pub size: u64,
    /// Module id; consumers key loaded modules by this field.
    pub code_file: String,
    pub code_identifier: String,
    pub debug_file: String,
    pub debug_identifier: String,
    pub version: String,
}

impl CodeModuleDescriptor
{
    /// Descriptor carrying only a module id; every auxiliary field is empty.
    pub fn from_id(module_id: impl Into<String>) -> Self
    {
        Self {
            code_file: module_id.into(),
            ..Self::default()
        }
    }

    /// Module id.
    pub fn id(&self) -> &str
    {
        &self.code_file
    }
}

/// A consumer able to take ownership of a serialized module buffer.
pub trait ModuleLoader
{
    /// Load `buffer` as the module described by `descriptor`.
    ///
    /// Returns `false` when the consumer declines the buffer (malformed,
    /// duplicate id, ...).
    fn load_from_buffer(&mut self, descriptor: &CodeModuleDescriptor, buffer: Vec<u8>) -> bool;
}

/// Result of converting one module.
#[derive(Debug)]
pub struct ModuleConversion
{
    pub module_id: String,
    /// Size of the buffer handed to the consumer, or why there was none.
    pub outcome: SymflatResult<usize>,
}

impl ModuleConversion
{
    /// Whether the module reached the consumer.
    pub fn is_success(&self) -> bool
    {
        self.outcome.is_ok()
    }
}

/// Per-module results of a batch conversion, in source database order.
#[derive(Debug, Default)]
pub struct ConversionReport
{
    conversions: Vec<ModuleConversion>,
}

impl ConversionReport
{
    fn push(&mut self, module_id: &str, outcome: SymflatResult<usize>)
    {
        self.conversions.push(ModuleConversion {
            module_id: module_id.to_string(),
            outcome,
        });
    }

    /// Every result, in conversion order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleConversion>
    {
        self.conversions.iter()
    }

    /// Result for one module id.
    pub fn get(&self, module_id: &str) -> Option<&ModuleConversion>
    {
        self.conversions.iter().find(|conversion| conversion.module_id == module_id)
    }

    /// Number of modules that reached the consumer.
    pub fn succeeded(&self) -> usize
    {
        self.conversions.iter().filter(|conversion| conversion.is_success()).count()
    }

    /// Number of modules that did not.
    pub fn failed(&self) -> usize
    {
        self.conversions.len() - self.succeeded()
    }

    /// Number of modules attempted.
    pub fn len(&self) -> usize
    {
        self.conversions.len()
    }

    /// Whether nothing was attempted.
    pub fn is_empty(&self) -> bool
    {
        self.conversions.is_empty()
    }
}

impl ModuleSerializer
{
    /// Convert one module of `source` and load it into `consumer`.
    ///
    /// Neither database is touched when the id is unknown.
    ///
    /// ## Returns
    ///
    /// The size of the buffer the consumer accepted.
    ///
    /// ## Errors
    ///
    /// - [`SymflatError::NotFound`] if `module_id` is not in `source`
    /// - [`SymflatError::AllocationFailure`] / [`SymflatError::SizeWriteMismatch`]
    ///   from serialization
    /// - [`SymflatError::LoadRejected`] if the consumer declines the buffer
    pub fn convert_one(
        &self,
        module_id: &str,
        source: &SourceDatabase,
        consumer: &mut impl ModuleLoader,
    ) -> SymflatResult<usize>
    {
        let stored = source
            .get(module_id)
            .ok_or_else(|| SymflatError::NotFound(module_id.to_string()))?;
        let buffer = self.prepare(module_id, stored)?;
        register(module_id, buffer, consumer)
    }

    /// Convert every module of `source`, one after another.
    ///
    /// A failing module is recorded in the report and the batch continues.
    pub fn convert_all(&self, source: &SourceDatabase, consumer: &mut impl ModuleLoader) -> ConversionReport
    {
        let mut report = ConversionReport::default();
        for (module_id, stored) in source.iter() {
            let outcome = self
                .prepare(module_id, stored)
                .and_then(|buffer| register(module_id, buffer, consumer));
            report.push(module_id, outcome);
        }
        log_report(&report);
        report
    }

    /// Like [`Self::convert_all`], but serializes modules in parallel.
    ///
    /// Only serialization fans out; buffers are handed to `consumer` one at a
    /// time on the calling thread, in source database order, so the consumer
    /// needs no synchronization. Results match [`Self::convert_all`].
    pub fn convert_all_parallel(&self, source: &SourceDatabase, consumer: &mut impl ModuleLoader) -> ConversionReport
    {
        let prepared: Vec<(&str, SymflatResult<Vec<u8>>)> = source
            .modules()
            .par_iter()
            .map(|(module_id, stored)| (module_id.as_str(), self.prepare(module_id, stored)))
            .collect();

        let mut report = ConversionReport::default();
        for (module_id, buffer) in prepared {
            let outcome = buffer.and_then(|buffer| register(module_id, buffer, consumer));
            report.push(module_id, outcome);
        }
        log_report(&report);
        report
    }

    /// Produce the buffer for one stored module.
    fn prepare(&self, module_id: &str, stored: &StoredModule) -> SymflatResult<Vec<u8>>
    {
        info!("Converting symbol {module_id}");
        let buffer = match stored {
            StoredModule::Basic(module) => self.serialize(module),
            StoredModule::Fast(module) => {
                let bytes = module.as_bytes();
                self.allocator.allocate(bytes.len()).map(|mut buffer| {
                    buffer.extend_from_slice(bytes);
                    buffer
                })
            }
        };
        match &buffer {
            Ok(bytes) => info!(module = module_id, size = bytes.len(), "Serialized symbol size"),
            Err(err) => warn!(module = module_id, %err, "Serialization failed for module"),
        }
        buffer
    }
}

fn register(module_id: &str, buffer: Vec<u8>, consumer: &mut impl ModuleLoader) -> SymflatResult<usize>
{
    let size = buffer.len();
    let descriptor = CodeModuleDescriptor::from_id(module_id);
    if consumer.load_from_buffer(&descriptor, buffer) {
        Ok(size)
    } else {
        warn!(module = module_id, size, "consumer rejected serialized module");
        Err(SymflatError::LoadRejected(module_id.to_string()))
    }
}

fn log_report(report: &ConversionReport)
{
    info!(
        modules = report.len(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        "module conversion finished"
    );
}
