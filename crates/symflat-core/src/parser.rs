//! # Symbol File Parser
//!
//! Builds a [`SymbolModule`] from Breakpad text-format symbol data.
//!
//! ## Record types
//!
//! ```text
//! MODULE <os> <cpu> <id> <name>
//! INFO <anything>
//! FILE <id> <name>
//! FUNC [m] <address> <size> <parameter_size> <name>
//! <address> <size> <line> <file_id>                       (line record)
//! INLINE_ORIGIN <origin_id> [<file_id>] <name>
//! INLINE <nest_level> <call_site_line> [<call_site_file_id>] <origin_id> (<address> <size>)+
//! PUBLIC [m] <address> <parameter_size> <name>
//! STACK WIN <type> <rva> <code_size> <prolog> <epilog> <params> <saved_regs> <locals> <max_stack> <has_program> <program|allocates_bp>
//! STACK CFI INIT <address> <size> <rules>
//! STACK CFI <address> <rules>
//! ```
//!
//! Addresses, sizes and stack info fields are hexadecimal; ids and line
//! numbers are decimal. Line and inline records belong to the most recent
//! `FUNC`.
//!
//! ## Error policy
//!
//! A record that cannot be understood is skipped and the module is marked
//! corrupt; parsing continues with the next line. Only input that is not a
//! symbol file at all fails the parse: an embedded NUL byte or a malformed
//! `MODULE` header.

use tracing::{debug, warn};

use crate::error::{SymflatError, SymflatResult};
use crate::module::{Function, Inline, InlineOrigin, Line, PublicSymbol, StackFrameInfo, StackInfoKind, SymbolModule};

type RecordResult = Result<(), &'static str>;

/// Parse Breakpad-format text into a new module called `name`.
///
/// ## Parameters
///
/// - `name`: Name given to the module (typically the module id)
/// - `text`: Complete symbol file contents
///
/// ## Errors
///
/// Returns [`SymflatError::ParseFailure`] with a 1-based line number when the
/// text contains a NUL byte or its `MODULE` header is malformed. Malformed
/// records elsewhere only set [`SymbolModule::is_corrupt`].
///
/// ## Example
///
/// ```rust
/// use symflat_core::parser::parse_text_to_module;
///
/// let module = parse_text_to_module("app", "FILE 1 a.cc\nFUNC 1000 10 0 foo\n1000 5 10 1\n").unwrap();
/// assert_eq!(module.functions.retrieve(0x1002).unwrap().name, "foo");
/// assert!(!module.is_corrupt);
/// ```
pub fn parse_text_to_module(name: &str, text: &str) -> SymflatResult<SymbolModule>
{
    if let Some(offset) = text.find('\0') {
        let line = text[..offset].matches('\n').count() + 1;
        return Err(SymflatError::ParseFailure {
            line,
            reason: "embedded NUL byte".to_string(),
        });
    }

    let mut parser = SymbolFileParser::new(name);
    for (index, raw) in text.lines().enumerate() {
        parser.parse_line(index + 1, raw)?;
    }
    let module = parser.finish();

    debug!(
        module = module.name(),
        files = module.files.len(),
        functions = module.functions.len(),
        public_symbols = module.public_symbols.len(),
        corrupt = module.is_corrupt,
        "parsed symbol file"
    );
    Ok(module)
}

/// A `FUNC` whose line and inline records are still arriving.
struct PendingFunction
{
    line: usize,
    function: Function,
    inlines: Vec<Inline>,
}

struct SymbolFileParser
{
    module: SymbolModule,
    current: Option<PendingFunction>,
}

impl SymbolFileParser
{
    fn new(name: &str) -> Self
    {
        Self {
            module: SymbolModule::new(name),
            current: None,
        }
    }

    fn parse_line(&mut self, line: usize, raw: &str) -> SymflatResult<()>
    {
        let record = raw.trim();
        if record.is_empty() {
            return Ok(());
        }

        let (keyword, rest) = split_keyword(record);
        let result = match keyword {
            "MODULE" => return parse_module_header(line, rest),
            "INFO" => Ok(()),
            "FILE" => self.parse_file(rest),
            "FUNC" => self.parse_function(line, rest),
            "PUBLIC" => self.parse_public(rest),
            "STACK" => self.parse_stack(rest),
            "INLINE_ORIGIN" => self.parse_inline_origin(rest),
            "INLINE" => self.parse_inline(rest),
            _ => self.parse_line_record(record),
        };

        if let Err(reason) = result {
            warn!(module = self.module.name(), line, reason, "skipping malformed symbol record");
            self.module.is_corrupt = true;
        }
        Ok(())
    }

    fn parse_file(&mut self, rest: &str) -> RecordResult
    {
        let fields = split_fields(rest, 2).ok_or("FILE record needs an id and a name")?;
        let id = parse_id(fields[0])?;
        self.module.files.insert(id, fields[1].to_string());
        Ok(())
    }

    fn parse_function(&mut self, line: usize, rest: &str) -> RecordResult
    {
        self.flush_function();

        let (is_multiple, rest) = take_multiple_marker(rest);
        let fields = split_fields(rest, 4).ok_or("FUNC record needs address, size, parameter size and name")?;
        let address = parse_hex(fields[0])?;
        let size = parse_hex(fields[1])?;
        let parameter_size = parse_hex_u32(fields[2])?;

        self.current = Some(PendingFunction {
            line,
            function: Function::new(fields[3], address, size, parameter_size, is_multiple),
            inlines: Vec::new(),
        });
        Ok(())
    }

    fn parse_line_record(&mut self, record: &str) -> RecordResult
    {
        let fields = split_fields(record, 4).ok_or("unknown record type")?;
        let address = parse_hex(fields[0]).map_err(|_| "unknown record type")?;
        let size = parse_hex(fields[1])?;
        let line = parse_id(fields[2])?;
        let source_file_id = parse_id(fields[3])?;

        let current = self.current.as_mut().ok_or("line record before any FUNC")?;
        let record = Line {
            address,
            size,
            source_file_id,
            line,
        };
        if current.function.lines.store_range(address, size, record) {
            Ok(())
        } else {
            Err("line record is empty or overlaps another line")
        }
    }

    fn parse_public(&mut self, rest: &str) -> RecordResult
    {
        let (is_multiple, rest) = take_multiple_marker(rest);
        let fields = split_fields(rest, 3).ok_or("PUBLIC record needs address, parameter size and name")?;
        let address = parse_hex(fields[0])?;
        let parameter_size = parse_hex_u32(fields[1])?;

        // Some toolchains emit publics at address 0; they are accepted but
        // would collide with each other, so they are not stored.
        if address == 0 {
            debug!(name = fields[2], "ignoring public symbol at address 0");
            return Ok(());
        }

        self.module.public_symbols.entry(address).or_insert_with(|| PublicSymbol {
            name: fields[2].to_string(),
            address,
            parameter_size,
            is_multiple,
        });
        Ok(())
    }

    fn parse_stack(&mut self, rest: &str) -> RecordResult
    {
        let (kind, rest) = split_keyword(rest);
        match kind {
            "WIN" => self.parse_stack_win(rest),
            "CFI" => self.parse_stack_cfi(rest),
            _ => Err("unknown STACK record type"),
        }
    }

    fn parse_stack_win(&mut self, rest: &str) -> RecordResult
    {
        let fields = split_fields(rest, 11).ok_or("STACK WIN record is truncated")?;
        let raw_kind = parse_hex(fields[0])?;
        let kind = usize::try_from(raw_kind)
            .ok()
            .and_then(StackInfoKind::from_index)
            .ok_or("unknown STACK WIN type")?;
        let rva = parse_hex(fields[1])?;
        let code_size = parse_hex(fields[2])?;
        let has_program_string = parse_hex(fields[9])? != 0;

        let (program_string, allocates_base_pointer) = if has_program_string {
            (fields[10].to_string(), false)
        } else {
            (String::new(), parse_hex(fields[10])? != 0)
        };

        let info = StackFrameInfo {
            kind,
            prolog_size: parse_hex_u32(fields[3])?,
            epilog_size: parse_hex_u32(fields[4])?,
            parameter_size: parse_hex_u32(fields[5])?,
            saved_register_size: parse_hex_u32(fields[6])?,
            local_size: parse_hex_u32(fields[7])?,
            max_stack_size: parse_hex_u32(fields[8])?,
            allocates_base_pointer,
            program_string,
        };

        if self.module.stack_info[kind.index()].store_range(rva, code_size, info) {
            Ok(())
        } else {
            Err("STACK WIN range is empty or overlaps another")
        }
    }

    fn parse_stack_cfi(&mut self, rest: &str) -> RecordResult
    {
        let (first, after) = split_keyword(rest);
        if first == "INIT" {
            let fields = split_fields(after, 3).ok_or("STACK CFI INIT record needs address, size and rules")?;
            let address = parse_hex(fields[0])?;
            let size = parse_hex(fields[1])?;
            if self.module.cfi_initial_rules.store_range(address, size, fields[2].to_string()) {
                Ok(())
            } else {
                Err("STACK CFI INIT range is empty or overlaps another")
            }
        } else {
            let fields = split_fields(rest, 2).ok_or("STACK CFI record needs address and rules")?;
            let address = parse_hex(fields[0])?;
            self.module.cfi_delta_rules.insert(address, fields[1].to_string());
            Ok(())
        }
    }

    fn parse_inline_origin(&mut self, rest: &str) -> RecordResult
    {
        let fields = split_fields(rest, 2).ok_or("INLINE_ORIGIN record needs an id and a name")?;
        let origin_id = parse_id(fields[0])?;

        // Older files carry a file id between the origin id and the name.
        let origin = match split_fields(fields[1], 2) {
            Some(old) if old[0].bytes().all(|byte| byte.is_ascii_digit()) => InlineOrigin {
                has_file_id: true,
                source_file_id: parse_id(old[0])?,
                name: old[1].to_string(),
            },
            _ => InlineOrigin {
                has_file_id: false,
                source_file_id: -1,
                name: fields[1].to_string(),
            },
        };
        self.module.inline_origins.insert(origin_id, origin);
        Ok(())
    }

    fn parse_inline(&mut self, rest: &str) -> RecordResult
    {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        // Current format has four leading fields, older files three; both
        // are followed by (address, size) pairs.
        let has_call_site_file_id = tokens.len() % 2 == 0;
        let leading = if has_call_site_file_id { 4 } else { 3 };
        if tokens.len() < leading + 2 {
            return Err("INLINE record needs at least one address range");
        }

        let nest_level = parse_id(tokens[0])?;
        let call_site_line = parse_id(tokens[1])?;
        let (call_site_file_id, origin_id) = if has_call_site_file_id {
            (parse_id(tokens[2])?, parse_id(tokens[3])?)
        } else {
            (-1, parse_id(tokens[2])?)
        };

        let ranges = tokens[leading..]
            .chunks_exact(2)
            .map(|pair| Ok((parse_hex(pair[0])?, parse_hex(pair[1])?)))
            .collect::<Result<Vec<_>, &'static str>>()?;

        let current = self.current.as_mut().ok_or("INLINE record before any FUNC")?;
        current.inlines.push(Inline {
            has_call_site_file_id,
            nest_level,
            call_site_line,
            call_site_file_id,
            origin_id,
            ranges,
        });
        Ok(())
    }

    /// Move the pending function, with its inline tree, into the module.
    fn flush_function(&mut self)
    {
        let Some(PendingFunction {
            line,
            mut function,
            mut inlines,
        }) = self.current.take()
        else {
            return;
        };

        // Outer calls must be in the tree before the calls inlined into them.
        inlines.sort_by_key(|inline| inline.nest_level);
        for inline in inlines {
            for &(address, size) in &inline.ranges {
                if !function.inlines.store_range(address, size, inline.clone(), true) {
                    warn!(function = function.name.as_str(), address, size, "inline range does not nest");
                    self.module.is_corrupt = true;
                }
            }
        }

        let (address, size) = (function.address, function.size);
        if !self.module.functions.store_range(address, size, function) {
            warn!(module = self.module.name(), line, address, size, "FUNC range is empty or overlaps another");
            self.module.is_corrupt = true;
        }
    }

    fn finish(mut self) -> SymbolModule
    {
        self.flush_function();
        self.module
    }
}

fn parse_module_header(line: usize, rest: &str) -> SymflatResult<()>
{
    match split_fields(rest, 4) {
        Some(fields) => {
            debug!(os = fields[0], cpu = fields[1], id = fields[2], name = fields[3], "MODULE header");
            Ok(())
        }
        None => Err(SymflatError::ParseFailure {
            line,
            reason: "MODULE header needs os, cpu, id and name".to_string(),
        }),
    }
}

/// Split off the first whitespace-delimited token.
fn split_keyword(text: &str) -> (&str, &str)
{
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim_start()),
        None => (text, ""),
    }
}

/// Split `text` into exactly `count` fields. The last field is the rest of
/// the text (names may contain spaces) and must not be empty.
fn split_fields(text: &str, count: usize) -> Option<Vec<&str>>
{
    let mut fields = Vec::with_capacity(count);
    let mut rest = text.trim_start();
    while fields.len() + 1 < count {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    let last = rest.trim_end();
    if last.is_empty() {
        return None;
    }
    fields.push(last);
    Some(fields)
}

/// Strip an optional `m` (multiple) marker.
fn take_multiple_marker(text: &str) -> (bool, &str)
{
    let (first, rest) = split_keyword(text);
    if first == "m" {
        (true, rest)
    } else {
        (false, text)
    }
}

fn parse_hex(token: &str) -> Result<u64, &'static str>
{
    u64::from_str_radix(token, 16).map_err(|_| "invalid hexadecimal number")
}

fn parse_hex_u32(token: &str) -> Result<u32, &'static str>
{
    u32::from_str_radix(token, 16).map_err(|_| "invalid hexadecimal number")
}

fn parse_id(token: &str) -> Result<i32, &'static str>
{
    match token.parse::<i32>() {
        Ok(value) if value >= 0 => Ok(value),
        _ => Err("invalid decimal number"),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_split_fields_keeps_spaces_in_last_field()
    {
        assert_eq!(
            split_fields("1000 10 0 foo(int, char)", 4).unwrap(),
            vec!["1000", "10", "0", "foo(int, char)"]
        );
        assert!(split_fields("1000 10", 4).is_none());
        assert!(split_fields("1000 10 0 ", 4).is_none());
    }

    #[test]
    fn test_multiple_marker()
    {
        assert_eq!(take_multiple_marker("m 1000 4 main"), (true, "1000 4 main"));
        assert_eq!(take_multiple_marker("1000 4 main"), (false, "1000 4 main"));
        assert_eq!(take_multiple_marker("1000 4 m"), (false, "1000 4 m"));
    }

    #[test]
    fn test_function_with_lines()
    {
        let module = parse_text_to_module(
            "app",
            "MODULE Linux x86_64 000000000000000000000000000000000 app\n\
             FILE 1 a.cc\n\
             FUNC m 1000 10 8 foo\n\
             1000 5 10 1\n\
             1005 b 11 1\n",
        )
        .unwrap();

        assert!(!module.is_corrupt);
        let foo = module.functions.retrieve(0x100f).unwrap();
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.parameter_size, 8);
        assert!(foo.is_multiple);
        assert_eq!(foo.lines.len(), 2);
        assert_eq!(foo.lines.retrieve(0x1006).unwrap().line, 11);
        assert_eq!(module.files.get(&1).map(String::as_str), Some("a.cc"));
    }

    #[test]
    fn test_line_before_function_marks_corrupt()
    {
        let module = parse_text_to_module("app", "1000 5 10 1\nFUNC 2000 10 0 bar\n").unwrap();
        assert!(module.is_corrupt);
        assert!(module.functions.retrieve(0x2000).is_some());
    }

    #[test]
    fn test_overlapping_functions_mark_corrupt()
    {
        let module = parse_text_to_module("app", "FUNC 1000 10 0 a\nFUNC 1008 10 0 b\n").unwrap();
        assert!(module.is_corrupt);
        assert_eq!(module.functions.len(), 1);
    }

    #[test]
    fn test_public_symbols()
    {
        let module = parse_text_to_module("app", "PUBLIC 4000 0 _start\nPUBLIC m 5000 4 dup\nPUBLIC 0 0 ignored\n").unwrap();
        assert!(!module.is_corrupt);
        assert_eq!(module.public_symbols.len(), 2);
        assert!(module.public_symbols[&0x5000].is_multiple);
        assert_eq!(module.public_symbols[&0x4000].name, "_start");
    }

    #[test]
    fn test_stack_records()
    {
        let module = parse_text_to_module(
            "app",
            "STACK WIN 4 1000 20 4 0 8 0 10 0 1 $T0 .raSearch = $eip $T0 ^ =\n\
             STACK WIN 0 3000 10 1 0 0 0 0 0 0 1\n\
             STACK CFI INIT 1000 20 .cfa: $rsp 8 + .ra: .cfa -8 + ^\n\
             STACK CFI 1004 .cfa: $rsp 16 +\n",
        )
        .unwrap();

        assert!(!module.is_corrupt);
        let frame_data = module.stack_info(StackInfoKind::FrameData).retrieve(0x1010).unwrap();
        assert_eq!(frame_data.program_string, "$T0 .raSearch = $eip $T0 ^ =");
        assert_eq!(frame_data.local_size, 0x10);
        let fpo = module.stack_info(StackInfoKind::Fpo).retrieve(0x3000).unwrap();
        assert!(fpo.allocates_base_pointer);
        assert!(fpo.program_string.is_empty());
        assert_eq!(
            module.cfi_initial_rules.retrieve(0x101f).map(String::as_str),
            Some(".cfa: $rsp 8 + .ra: .cfa -8 + ^")
        );
        assert_eq!(module.cfi_delta_rules[&0x1004], ".cfa: $rsp 16 +");
    }

    #[test]
    fn test_inline_tree_is_built_by_nest_level()
    {
        let module = parse_text_to_module(
            "app",
            "INLINE_ORIGIN 0 outer\n\
             INLINE_ORIGIN 1 7 inner\n\
             FUNC 1000 100 0 f\n\
             INLINE 1 30 1 1 1020 8\n\
             INLINE 0 12 1 0 1010 40 1080 10\n",
        )
        .unwrap();

        assert!(!module.is_corrupt);
        let origin = &module.inline_origins[&1];
        assert!(origin.has_file_id);
        assert_eq!(origin.source_file_id, 7);
        assert_eq!(origin.name, "inner");
        assert!(!module.inline_origins[&0].has_file_id);

        let f = module.functions.retrieve(0x1000).unwrap();
        assert_eq!(f.inlines.depth(), 2);
        let chain = f.inlines.retrieve_all(0x1024);
        assert_eq!(chain.iter().map(|inline| inline.origin_id).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(f.inlines.retrieve(0x1085).map(|inline| inline.origin_id), Some(0));
    }

    #[test]
    fn test_old_inline_format_has_no_call_site_file()
    {
        let module = parse_text_to_module("app", "FUNC 1000 100 0 f\nINLINE 0 12 3 1010 40\n").unwrap();
        let inline = module.functions.retrieve(0x1010).unwrap().inlines.retrieve(0x1010).unwrap();
        assert!(!inline.has_call_site_file_id);
        assert_eq!(inline.origin_id, 3);
    }

    #[test]
    fn test_unknown_record_marks_corrupt()
    {
        let module = parse_text_to_module("app", "FILE 1 a.cc\nBOGUS record\n").unwrap();
        assert!(module.is_corrupt);
        assert_eq!(module.files.len(), 1);
    }

    #[test]
    fn test_nul_byte_fails_with_line_number()
    {
        let err = parse_text_to_module("app", "FILE 1 a.cc\nFILE 2 b\0.cc\n").unwrap_err();
        assert!(matches!(err, SymflatError::ParseFailure { line: 2, .. }));
    }

    #[test]
    fn test_malformed_module_header_fails()
    {
        let err = parse_text_to_module("app", "MODULE Linux x86_64\n").unwrap_err();
        assert!(matches!(err, SymflatError::ParseFailure { line: 1, .. }));
    }

    #[test]
    fn test_empty_text_gives_empty_module()
    {
        let module = parse_text_to_module("app", "").unwrap();
        assert!(module.is_empty());
        assert!(!module.is_corrupt);
    }
}
