use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Parser, Subcommand};
use symflat_core::prelude::*;
use symflat_core::serializer::LimitedAllocator;
use symflat_utils::{info, init_logging_with, LogLevel, LoggingConfig};

/// Convert text symbol files into flat buffers and query them.
#[derive(Parser, Debug)]
#[command(name = "symflat")]
#[command(version)]
#[command(about = "Convert text symbol files into flat, load-and-query symbol buffers", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Largest buffer the serializer may allocate, in bytes
    /// (default: SYMFLAT_MAX_BUFFER_SIZE, or unbounded)
    #[arg(long, global = true)]
    max_buffer_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Serialize a text symbol file into a flat buffer file
    Serialize
    {
        /// Breakpad text-format symbol file
        symbol_file: PathBuf,
        /// Where to write the buffer
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert several symbol files and report per-module results
    Convert
    {
        /// Breakpad text-format symbol files; each file stem is its module id
        #[arg(required = true)]
        symbol_files: Vec<PathBuf>,
        /// Serialize modules on all cores
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Print the corruption flag and section sizes of a buffer
    Inspect
    {
        /// Serialized buffer file
        buffer: PathBuf,
    },
    /// Resolve one address in a buffer
    Lookup
    {
        /// Serialized buffer file
        buffer: PathBuf,
        /// Module-relative address (hex format: 0x1000, or decimal)
        address: String,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main()
{
    let cli = Cli::parse();

    let logging = match LoggingConfig::from_env() {
        Ok(config) => config.with_level(cli.log_level),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };
    let _guard = match init_logging_with(&logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> CliResult<()>
{
    let serializer = build_serializer(cli.max_buffer_size)?;

    match cli.command {
        Commands::Serialize { symbol_file, output } => {
            info!("Serializing {}", symbol_file.display());
            let text = fs::read_to_string(&symbol_file)?;
            let module = parse_text_to_module(&module_id(&symbol_file), &text)?;
            if module.is_corrupt {
                eprintln!("Warning: {} contains malformed records", symbol_file.display());
            }
            let buffer = serializer.serialize(&module)?;
            fs::write(&output, &buffer)?;
            println!("Wrote {} bytes to {}", buffer.len(), output.display());
            Ok(())
        }
        Commands::Convert { symbol_files, parallel } => {
            let mut source = SourceDatabase::new();
            for path in &symbol_files {
                let text = fs::read_to_string(path)?;
                source.load_module_from_text(&module_id(path), &text)?;
            }

            let mut consumer = FastResolver::new();
            let report = if parallel {
                serializer.convert_all_parallel(&source, &mut consumer)
            } else {
                serializer.convert_all(&source, &mut consumer)
            };

            for conversion in report.iter() {
                match &conversion.outcome {
                    Ok(size) => println!("  {:<32} ok      {size} bytes", conversion.module_id),
                    Err(e) => println!("  {:<32} failed  {e}", conversion.module_id),
                }
            }
            println!("{} converted, {} failed", report.succeeded(), report.failed());
            if report.failed() > 0 {
                return Err(format!("{} module(s) failed to convert", report.failed()).into());
            }
            Ok(())
        }
        Commands::Inspect { buffer } => {
            let bytes = fs::read(&buffer)?;
            let header = BufferHeader::parse(&bytes)?;
            println!("{}: {} bytes", buffer.display(), bytes.len());
            println!("  Corrupt: {}", header.is_corrupt);
            for (section, size) in header.sizes.iter() {
                println!("  {:<24} {size:>10}", section.name());
            }
            Ok(())
        }
        Commands::Lookup { buffer, address } => {
            let address = parse_address(&address)?;
            let module = FastModule::load(module_id(&buffer), fs::read(&buffer)?)?;
            match module.lookup_address(address) {
                Some(line_info) => print_line_info(&line_info),
                None => println!("{address:#x}: no symbol"),
            }
            if let Some(rules) = module.cfi_rules(address) {
                println!("  CFI: {}", rules.initial);
                for (delta_address, delta) in &rules.deltas {
                    println!("    {delta_address:#x}: {delta}");
                }
            }
            Ok(())
        }
    }
}

fn build_serializer(max_buffer_size: Option<usize>) -> CliResult<ModuleSerializer>
{
    Ok(match max_buffer_size {
        Some(limit) => ModuleSerializer::with_allocator(LimitedAllocator::new(limit)),
        None => ModuleSerializer::with_config(SerializerConfig::from_env()?),
    })
}

/// Module id for a file: its stem, or the whole path if it has none.
fn module_id(path: &Path) -> String
{
    path.file_stem()
        .map_or_else(|| path.to_string_lossy(), |stem| stem.to_string_lossy())
        .into_owned()
}

fn parse_address(raw: &str) -> CliResult<u64>
{
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address {raw:?}: {e}").into())
}

fn print_line_info(info: &SourceLineInfo)
{
    let offset = info.address - info.function_base;
    println!("{:#x}: {} + {offset:#x}", info.address, info.function);
    if info.from_public_symbol {
        println!("  (public symbol)");
    } else {
        println!("  Function: {:#x} size {:#x}", info.function_base, info.function_size);
    }
    if let Some(location) = &info.location {
        println!("  Source: {location}");
    }
    for frame in info.inline_frames.iter().rev() {
        match &frame.call_site {
            Some(call_site) => println!("  Inlined: {} (called from {call_site})", frame.name),
            None => println!("  Inlined: {} (called from line {})", frame.name, frame.call_site_line),
        }
    }
}
