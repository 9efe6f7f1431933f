//! # Symbol Module
//!
//! The mutable, map-based representation of one binary's debug metadata, as
//! produced by the text parser and consumed (read-only) by the serializer.
//!
//! A [`SymbolModule`] holds:
//! - source file names keyed by file id
//! - functions keyed by address range, each owning its line table and its
//!   tree of inlined call regions
//! - public symbols keyed by address
//! - one stack frame info table per [`StackInfoKind`]
//! - call frame information rules (initial rules by range, deltas by address)
//! - inline origins keyed by origin id

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

mod contained_range_map;
mod range_map;

pub use contained_range_map::{ContainedRange, ContainedRangeMap};
pub use range_map::{RangeEntry, RangeMap};

use crate::error::SymflatError;

/// Memory address inside a module.
pub type MemAddr = u64;

/// A line record: a run of machine code attributed to one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line
{
    pub address: MemAddr,
    pub size: MemAddr,
    /// Id into [`SymbolModule::files`].
    pub source_file_id: i32,
    pub line: i32,
}

/// An inlined call region inside a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inline
{
    /// Older symbol files do not record the call site file.
    pub has_call_site_file_id: bool,
    /// 0 for calls inlined directly into the function, 1 for calls inlined
    /// into those, and so on.
    pub nest_level: i32,
    pub call_site_line: i32,
    pub call_site_file_id: i32,
    /// Id into [`SymbolModule::inline_origins`].
    pub origin_id: i32,
    /// Every `(address, size)` range this inlined call occupies.
    pub ranges: Vec<(MemAddr, MemAddr)>,
}

/// The function an inlined call region originates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineOrigin
{
    pub has_file_id: bool,
    pub source_file_id: i32,
    pub name: String,
}

/// A function record with its line table and inline tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function
{
    pub name: String,
    pub address: MemAddr,
    pub size: MemAddr,
    pub parameter_size: u32,
    /// Set when identical code folding merged several functions at this address.
    pub is_multiple: bool,
    pub lines: RangeMap<Line>,
    pub inlines: ContainedRangeMap<Inline>,
}

impl Function
{
    /// Create a function with empty line and inline tables.
    pub fn new(name: impl Into<String>, address: MemAddr, size: MemAddr, parameter_size: u32, is_multiple: bool) -> Self
    {
        Self {
            name: name.into(),
            address,
            size,
            parameter_size,
            is_multiple,
            lines: RangeMap::new(),
            inlines: ContainedRangeMap::new(),
        }
    }
}

/// A public (exported) symbol: a name bound to an address, without extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSymbol
{
    pub name: String,
    pub address: MemAddr,
    pub parameter_size: u32,
    pub is_multiple: bool,
}

/// Kinds of Windows stack frame info, one table per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StackInfoKind
{
    Fpo,
    Trap,
    Tss,
    Standard,
    FrameData,
}

impl StackInfoKind
{
    /// Number of kinds; also the number of stack info sections in a buffer.
    pub const COUNT: usize = 5;

    /// All kinds, in serialization order.
    pub const ALL: [StackInfoKind; Self::COUNT] = [
        StackInfoKind::Fpo,
        StackInfoKind::Trap,
        StackInfoKind::Tss,
        StackInfoKind::Standard,
        StackInfoKind::FrameData,
    ];

    /// Position of this kind in [`SymbolModule::stack_info`].
    pub const fn index(self) -> usize
    {
        self as usize
    }

    /// Kind for the numeric type field of a `STACK WIN` record.
    pub fn from_index(index: usize) -> Option<Self>
    {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for StackInfoKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            StackInfoKind::Fpo => "fpo",
            StackInfoKind::Trap => "trap",
            StackInfoKind::Tss => "tss",
            StackInfoKind::Standard => "standard",
            StackInfoKind::FrameData => "frame_data",
        };
        write!(f, "{label}")
    }
}

impl FromStr for StackInfoKind
{
    type Err = SymflatError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "fpo" | "0" => Ok(StackInfoKind::Fpo),
            "trap" | "1" => Ok(StackInfoKind::Trap),
            "tss" | "2" => Ok(StackInfoKind::Tss),
            "standard" | "3" => Ok(StackInfoKind::Standard),
            "frame_data" | "framedata" | "4" => Ok(StackInfoKind::FrameData),
            _ => Err(SymflatError::InvalidArgument(format!("unknown stack info kind: {s}"))),
        }
    }
}

/// Windows stack frame info (`STACK WIN` record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrameInfo
{
    pub kind: StackInfoKind,
    pub prolog_size: u32,
    pub epilog_size: u32,
    pub parameter_size: u32,
    pub saved_register_size: u32,
    pub local_size: u32,
    pub max_stack_size: u32,
    /// Only meaningful when `program_string` is empty.
    pub allocates_base_pointer: bool,
    pub program_string: String,
}

/// All debug metadata for one binary.
///
/// Exclusively owned by the caller; the serializer only ever borrows it
/// immutably, so one module can be converted any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolModule
{
    name: String,
    pub is_corrupt: bool,
    pub files: BTreeMap<i32, String>,
    pub functions: RangeMap<Function>,
    pub public_symbols: BTreeMap<MemAddr, PublicSymbol>,
    pub stack_info: [RangeMap<StackFrameInfo>; StackInfoKind::COUNT],
    pub cfi_initial_rules: RangeMap<String>,
    pub cfi_delta_rules: BTreeMap<MemAddr, String>,
    pub inline_origins: BTreeMap<i32, InlineOrigin>,
}

impl SymbolModule
{
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self
    {
        Self {
            name: name.into(),
            is_corrupt: false,
            files: BTreeMap::new(),
            functions: RangeMap::new(),
            public_symbols: BTreeMap::new(),
            stack_info: Default::default(),
            cfi_initial_rules: RangeMap::new(),
            cfi_delta_rules: BTreeMap::new(),
            inline_origins: BTreeMap::new(),
        }
    }

    /// Module name (debug file name or id).
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Rename the module. Names are not part of the serialized buffer.
    pub fn set_name(&mut self, name: impl Into<String>)
    {
        self.name = name.into();
    }

    /// Stack frame info table for one kind.
    pub fn stack_info(&self, kind: StackInfoKind) -> &RangeMap<StackFrameInfo>
    {
        &self.stack_info[kind.index()]
    }

    /// Whether the module carries no symbol data at all.
    pub fn is_empty(&self) -> bool
    {
        self.files.is_empty()
            && self.functions.is_empty()
            && self.public_symbols.is_empty()
            && self.stack_info.iter().all(RangeMap::is_empty)
            && self.cfi_initial_rules.is_empty()
            && self.cfi_delta_rules.is_empty()
            && self.inline_origins.is_empty()
    }
}
