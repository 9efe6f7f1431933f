//! # Resolvers
//!
//! Both ends of a conversion:
//!
//! - [`SourceDatabase`]: parsed modules (and already-flat ones) to convert
//! - [`FastResolver`]: the consumer that loads serialized buffers and answers
//!   address lookups from them
//!
//! ## Usage
//!
//! ```rust
//! use symflat_core::resolver::{FastResolver, SourceDatabase};
//! use symflat_core::serializer::ModuleSerializer;
//!
//! let mut source = SourceDatabase::new();
//! source.load_module_from_text("app", "FILE 1 a.cc\nFUNC 1000 10 0 foo\n1000 5 10 1\n").unwrap();
//!
//! let mut consumer = FastResolver::new();
//! ModuleSerializer::new().convert_one("app", &source, &mut consumer).unwrap();
//!
//! let info = consumer.lookup("app", 0x1002).unwrap();
//! assert_eq!(info.function.display_name(), "foo");
//! assert_eq!(info.location.unwrap().line, 10);
//! ```

mod basic;
pub(crate) mod demangle;
pub mod fast;

pub use basic::{SourceDatabase, StoredModule};
pub use fast::{FastModule, FastResolver};
