//! # Flat-Buffer Consumer
//!
//! Loads serialized modules without re-parsing them. A [`FastModule`] keeps
//! the buffer as is and indexes each section once; a [`FastResolver`] holds
//! many of them and is the [`ModuleLoader`](crate::serializer::ModuleLoader)
//! the serializer hands buffers to.

mod module;
mod resolver;
mod static_map;
mod static_range_map;

pub use module::FastModule;
pub use resolver::FastResolver;
pub use static_map::StaticMap;
pub use static_range_map::StaticRangeMap;
