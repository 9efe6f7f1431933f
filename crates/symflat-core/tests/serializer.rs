//! End-to-end tests: serialize modules, load them back, and query them

use symflat_core::module::{Function, Inline, InlineOrigin, Line, PublicSymbol, SymbolModule};
use symflat_core::prelude::*;
use symflat_core::serializer::{LimitedAllocator, MIN_BUFFER_SIZE, PAYLOAD_OFFSET};

fn scenario_module() -> SymbolModule
{
    let mut module = SymbolModule::new("app.pdb");
    module.files.insert(1, "a.cc".to_string());

    let mut foo = Function::new("foo", 0x1000, 0x10, 0, false);
    foo.lines.store_range(
        0x1000,
        0x5,
        Line {
            address: 0x1000,
            size: 0x5,
            source_file_id: 1,
            line: 10,
        },
    );
    module.functions.store_range(0x1000, 0x10, foo);
    module
}

fn nested_inline_module() -> SymbolModule
{
    let mut module = SymbolModule::new("inlines");
    module.files.insert(1, "main.cc".to_string());
    module.files.insert(2, "util.h".to_string());
    for (id, name) in [(0, "outer_helper"), (1, "inner_helper")] {
        module.inline_origins.insert(
            id,
            InlineOrigin {
                has_file_id: false,
                source_file_id: 0,
                name: name.to_string(),
            },
        );
    }

    let mut main = Function::new("main", 0x2000, 0x100, 0, false);
    let outer = Inline {
        has_call_site_file_id: true,
        nest_level: 0,
        call_site_line: 30,
        call_site_file_id: 1,
        origin_id: 0,
        ranges: vec![(0x2010, 0x40)],
    };
    let inner = Inline {
        has_call_site_file_id: true,
        nest_level: 1,
        call_site_line: 5,
        call_site_file_id: 2,
        origin_id: 1,
        ranges: vec![(0x2020, 0x8)],
    };
    assert!(main.inlines.store_range(0x2010, 0x40, outer, true));
    assert!(main.inlines.store_range(0x2020, 0x8, inner, true));
    main.lines.store_range(
        0x2000,
        0x100,
        Line {
            address: 0x2000,
            size: 0x100,
            source_file_id: 1,
            line: 25,
        },
    );
    module.functions.store_range(0x2000, 0x100, main);
    module
}

#[test]
fn test_empty_module_is_header_and_empty_sections()
{
    let serializer = ModuleSerializer::new();
    let module = SymbolModule::new("empty");

    let sizes = serializer.compute_size(&module);
    let buffer = serializer.serialize(&module).unwrap();

    assert_eq!(buffer.len(), sizes.total());
    // Eleven sections, each an empty container with a four byte count.
    assert_eq!(buffer.len(), MIN_BUFFER_SIZE + 11 * 4);
    assert_eq!(buffer[0], 0);
    assert_eq!(buffer.last(), Some(&0));
}

#[test]
fn test_header_matches_section_sizes()
{
    let serializer = ModuleSerializer::new();
    let module = scenario_module();
    let sizes = serializer.compute_size(&module);
    let buffer = serializer.serialize(&module).unwrap();

    let header = BufferHeader::parse(&buffer).unwrap();
    assert!(!header.is_corrupt);
    assert_eq!(header.sizes, sizes);
    assert_eq!(PAYLOAD_OFFSET + sizes.payload_size() + 1, buffer.len());

    // Every section but files and functions is an empty container.
    let files = sizes.get(Section::Files);
    let functions = sizes.get(Section::Functions);
    assert_eq!(files, 4 + 4 + 4 + "a.cc".len());
    assert_eq!(sizes.total(), 1 + 88 + files + functions + 9 * 4 + 1);
}

#[test]
fn test_lookup_scenario()
{
    let buffer = ModuleSerializer::new().serialize(&scenario_module()).unwrap();
    let module = FastModule::load("app.pdb", buffer).unwrap();

    let info = module.lookup_address(0x1002).unwrap();
    assert_eq!(info.function.raw(), "foo");
    assert_eq!(info.function_base, 0x1000);
    assert!(!info.from_public_symbol);
    let location = info.location.unwrap();
    assert_eq!(location.file, "a.cc");
    assert_eq!(location.line, 10);

    // Inside foo but past its only line.
    let past_line = module.lookup_address(0x1008).unwrap();
    assert_eq!(past_line.function.raw(), "foo");
    assert!(past_line.location.is_none());

    assert!(module.lookup_address(0x1010).is_none());
    assert!(module.lookup_address(0xfff).is_none());
}

#[test]
fn test_public_symbol_fallback()
{
    let mut module = scenario_module();
    module.public_symbols.insert(
        0x4000,
        PublicSymbol {
            name: "exported".to_string(),
            address: 0x4000,
            parameter_size: 4,
            is_multiple: false,
        },
    );
    let buffer = ModuleSerializer::new().serialize(&module).unwrap();
    let fast = FastModule::load("app.pdb", buffer).unwrap();

    let info = fast.lookup_address(0x4020).unwrap();
    assert!(info.from_public_symbol);
    assert_eq!(info.function.raw(), "exported");
    assert_eq!(info.parameter_size, 4);
}

#[test]
fn test_nested_inlines_round_trip()
{
    let original = nested_inline_module();
    assert_eq!(original.functions.retrieve(0x2000).unwrap().inlines.depth(), 2);

    let buffer = ModuleSerializer::new().serialize(&original).unwrap();
    let fast = FastModule::load("inlines", buffer).unwrap();
    assert_eq!(fast.to_module().unwrap(), original);

    let info = fast.lookup_address(0x2024).unwrap();
    let names: Vec<&str> = info.inline_frames.iter().map(|frame| frame.name.raw()).collect();
    assert_eq!(names, vec!["outer_helper", "inner_helper"]);
    let call_site = info.inline_frames[1].call_site.as_ref().unwrap();
    assert_eq!(call_site.file, "util.h");
    assert_eq!(call_site.line, 5);

    let shallow = fast.lookup_address(0x2040).unwrap();
    assert_eq!(shallow.inline_frames.len(), 1);
}

#[test]
fn test_corrupt_flag_survives()
{
    let mut module = scenario_module();
    module.is_corrupt = true;
    let buffer = ModuleSerializer::new().serialize(&module).unwrap();
    assert_eq!(buffer[0], 1);
    assert!(FastModule::load("app.pdb", buffer).unwrap().is_corrupt());
}

#[test]
fn test_stale_sizes_are_rejected()
{
    let serializer = ModuleSerializer::new();
    let stale = serializer.compute_size(&SymbolModule::new("empty"));

    let mut dest = Vec::new();
    let result = serializer.write(&scenario_module(), &stale, &mut dest);
    assert!(matches!(result, Err(SymflatError::SizeWriteMismatch { .. })));
}

#[test]
fn test_allocation_failure()
{
    let serializer = ModuleSerializer::with_allocator(LimitedAllocator::new(MIN_BUFFER_SIZE));
    let result = serializer.serialize(&scenario_module());
    assert!(matches!(result, Err(SymflatError::AllocationFailure { .. })));
}

#[test]
fn test_serialize_from_text_matches_parsed_module()
{
    let text = "\
MODULE Linux x86_64 000000000000000000000000000000000 app
FILE 1 a.cc
FUNC 1000 10 0 foo
1000 10 10 1
";
    let serializer = ModuleSerializer::new();
    let from_text = serializer.serialize_from_text(text).unwrap();

    let module = FastModule::load("app", from_text).unwrap();
    let info = module.lookup_address(0x1002).unwrap();
    assert_eq!(info.function.raw(), "foo");
    assert_eq!(info.location.unwrap().line, 10);
}

#[test]
fn test_serialize_from_text_parse_failure()
{
    let result = ModuleSerializer::new().serialize_from_text("MODULE Linux x86_64 ID app\nFILE 1 a\0.cc\n");
    assert!(matches!(result, Err(SymflatError::ParseFailure { line: 2, .. })));
}

#[test]
fn test_convert_into_fast_resolver()
{
    let mut source = SourceDatabase::new();
    source.insert("app.pdb", scenario_module());
    source.insert("inlines", nested_inline_module());

    let serializer = ModuleSerializer::new();
    let mut resolver = FastResolver::new();

    let report = serializer.convert_all(&source, &mut resolver);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);
    assert!(resolver.has_module("app.pdb"));

    let missing = serializer.convert_one("missing", &source, &mut resolver);
    assert!(matches!(missing, Err(SymflatError::NotFound(_))));

    // A second load of an already loaded module is declined by the consumer.
    let again = serializer.convert_one("app.pdb", &source, &mut resolver);
    assert!(matches!(again, Err(SymflatError::LoadRejected(_))));
}

#[test]
fn test_deep_inline_chain_loads_and_resolves()
{
    let depth = 100_000u64;
    let center = 0x80_0000u64;
    let mut function = Function::new("deep", center - depth, 2 * depth + 1, 0, false);
    for level in 0..depth {
        let inline = Inline {
            has_call_site_file_id: false,
            nest_level: 0,
            call_site_line: 0,
            call_site_file_id: 0,
            origin_id: 0,
            ranges: vec![(center - level, 1 + 2 * level)],
        };
        assert!(function.inlines.store_range(center - level, 1 + 2 * level, inline, false));
    }
    let mut module = SymbolModule::new("deep");
    module.functions.store_range(function.address, function.size, function);

    let serializer = ModuleSerializer::new();
    let buffer = serializer.serialize(&module).unwrap();
    assert_eq!(buffer.len(), serializer.compute_size(&module).total());

    let mut resolver = FastResolver::new();
    assert!(resolver.load_from_buffer(&CodeModuleDescriptor::from_id("deep"), buffer));

    let info = resolver.lookup("deep", center).unwrap();
    assert_eq!(info.function.raw(), "deep");
    assert_eq!(info.inline_frames.len(), depth as usize);
    assert!(resolver.lookup("deep", center - depth).unwrap().inline_frames.is_empty());
}
