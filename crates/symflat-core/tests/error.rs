//! Tests for error handling

use symflat_core::error::{SymflatError, SymflatResult};

#[test]
fn test_allocation_failure_display()
{
    let error = SymflatError::AllocationFailure { size: 4096 };
    let message = format!("{}", error);
    assert!(message.contains("4096"));
    assert!(message.contains("allocate"));
}

#[test]
fn test_not_found_display()
{
    let error = SymflatError::NotFound("libfoo.so".to_string());
    let message = format!("{}", error);
    assert!(message.contains("not found"));
    assert!(message.contains("libfoo.so"));
}

#[test]
fn test_parse_failure_display()
{
    let error = SymflatError::ParseFailure {
        line: 7,
        reason: "embedded NUL byte".to_string(),
    };
    let message = format!("{}", error);
    assert!(message.contains("line 7"));
    assert!(message.contains("NUL"));
}

#[test]
fn test_size_write_mismatch_display()
{
    let error = SymflatError::SizeWriteMismatch {
        section: "functions",
        expected: 10,
        written: 12,
    };
    let message = format!("{}", error);
    assert!(message.contains("functions"));
    assert!(message.contains("10"));
    assert!(message.contains("12"));
}

#[test]
fn test_io_error_conversion()
{
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.sym");
    let error: SymflatError = io_error.into();
    assert!(matches!(error, SymflatError::Io(_)));
    assert!(format!("{}", error).contains("missing.sym"));
}

#[test]
fn test_error_kinds_are_distinct()
{
    let errors = [
        SymflatError::AllocationFailure { size: 1 },
        SymflatError::NotFound(String::new()),
        SymflatError::LoadRejected(String::new()),
        SymflatError::ParseFailure {
            line: 1,
            reason: String::new(),
        },
        SymflatError::SizeWriteMismatch {
            section: "module",
            expected: 0,
            written: 1,
        },
        SymflatError::Malformed {
            offset: 0,
            reason: String::new(),
        },
        SymflatError::InvalidArgument(String::new()),
    ];
    let mut kinds: Vec<&str> = errors.iter().map(SymflatError::kind).collect();
    kinds.sort_unstable();
    kinds.dedup();
    assert_eq!(kinds.len(), errors.len());
}

#[test]
fn test_result_type()
{
    // Test that Result type is properly aliased
    let _result: SymflatResult<()> = Ok(());
    let _error_result: SymflatResult<()> = Err(SymflatError::NotFound("app".to_string()));
}
