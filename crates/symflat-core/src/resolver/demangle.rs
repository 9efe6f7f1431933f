//! Symbol name classification.
//!
//! Breakpad symbol files usually carry names the dumper already demangled
//! (`foo::bar(int)`), but Rust v0 and legacy names, and the occasional raw
//! Itanium name, still show up. This module demangles what it can and
//! classifies the language of every name.
//!
//! - **Rust**: `_R...` (v0), or `_ZN...` that `rustc-demangle` accepts
//! - **C++**: other `_Z...` names, or demangled signatures containing `::` or `(`
//! - **C**: plain identifiers

use rustc_demangle::try_demangle;

use crate::types::{SymbolLanguage, SymbolName};

/// Create a `SymbolName` from a name stored in a symbol file.
///
/// ## Parameters
///
/// - `raw`: The name exactly as stored
///
/// ## Returns
///
/// A `SymbolName` with the demangled form (when `raw` was mangled) and the
/// detected language.
pub(crate) fn make_symbol_name(raw: &str) -> SymbolName
{
    if let Ok(demangled) = try_demangle(raw) {
        // `{:#}` drops the trailing hash of legacy Rust names.
        return SymbolName::new(raw.to_string(), Some(format!("{demangled:#}")), SymbolLanguage::Rust);
    }

    let language = if raw.starts_with("_Z") || raw.contains("::") || raw.contains('(') {
        SymbolLanguage::Cpp
    } else if !raw.is_empty() && raw.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_') {
        SymbolLanguage::C
    } else {
        SymbolLanguage::Unknown
    };
    SymbolName::new(raw.to_string(), None, language)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_rust_legacy_name_is_demangled()
    {
        let name = make_symbol_name("_ZN4core3fmt5write17h0123456789abcdefE");
        assert_eq!(name.language(), SymbolLanguage::Rust);
        assert_eq!(name.display_name(), "core::fmt::write");
    }

    #[test]
    fn test_demangled_cpp_signature()
    {
        let name = make_symbol_name("std::vector<int>::push_back(int const&)");
        assert_eq!(name.language(), SymbolLanguage::Cpp);
        assert_eq!(name.demangled(), None);
    }

    #[test]
    fn test_plain_c_name()
    {
        assert_eq!(make_symbol_name("main").language(), SymbolLanguage::C);
        assert_eq!(make_symbol_name("").language(), SymbolLanguage::Unknown);
    }
}
