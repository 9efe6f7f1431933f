//! Symbol and source location types returned by address lookups.

use std::fmt;

/// Programming language associated with a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// Rust symbol (detected via mangling or namespace patterns).
    Rust,
    /// C++ symbol (Itanium mangling or a demangled signature).
    Cpp,
    /// C symbol or unmangled global.
    C,
    /// Unknown or mixed language.
    Unknown,
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::C => "c",
            SymbolLanguage::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// A function name with demangling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName
{
    raw: String,
    demangled: Option<String>,
    language: SymbolLanguage,
}

impl SymbolName
{
    /// Construct from the name stored in the symbol file.
    pub fn new(raw: String, demangled: Option<String>, language: SymbolLanguage) -> Self
    {
        Self {
            raw,
            demangled,
            language,
        }
    }

    /// Name exactly as stored in the symbol file.
    pub fn raw(&self) -> &str
    {
        &self.raw
    }

    /// Demangled name if the stored name was mangled.
    pub fn demangled(&self) -> Option<&str>
    {
        self.demangled.as_deref()
    }

    /// Preferred presentation (demangled, falling back to raw).
    pub fn display_name(&self) -> &str
    {
        self.demangled.as_deref().unwrap_or(&self.raw)
    }

    /// Language classification for the symbol.
    pub fn language(&self) -> SymbolLanguage
    {
        self.language
    }
}

impl fmt::Display for SymbolName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.display_name())
    }
}

/// A source file and line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Path as recorded in the symbol file.
    pub file: String,
    pub line: i32,
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One inlined call covering the looked-up address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFrame
{
    /// Name of the inlined function, from its inline origin.
    pub name: SymbolName,
    pub origin_id: i32,
    pub nest_level: i32,
    /// Where the inlined function was called from. The file is unknown for
    /// older symbol files that do not record it.
    pub call_site: Option<SourceLocation>,
    pub call_site_line: i32,
}

/// Everything an address lookup resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLineInfo
{
    /// The looked-up address, relative to the module.
    pub address: u64,
    pub function: SymbolName,
    /// Start of the function, or the public symbol address.
    pub function_base: u64,
    /// Zero when resolved through a public symbol.
    pub function_size: u64,
    pub parameter_size: u32,
    pub is_multiple: bool,
    /// Source file and line, when a line record covers the address.
    pub location: Option<SourceLocation>,
    /// Start of the covering line record.
    pub line_base: Option<u64>,
    /// Inlined calls covering the address, outermost first.
    pub inline_frames: Vec<InlineFrame>,
    /// Set when no function covered the address and the nearest preceding
    /// public symbol was used instead.
    pub from_public_symbol: bool,
}

/// Call frame information rules in effect at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfiRules
{
    /// Base of the covering `STACK CFI INIT` range.
    pub base: u64,
    /// Rules in effect at `base`.
    pub initial: String,
    /// Changes at addresses in `base..=address`, in address order.
    pub deltas: Vec<(u64, String)>,
}
