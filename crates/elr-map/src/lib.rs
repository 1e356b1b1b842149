//! Mapper registry for derived element values.
//!
//! A mapper computes one element's value from the values of other elements
//! in the same row. Schemas reference mappers by name together with an
//! ordered argument list:
//!
//! ```ignore
//! use elr_map::MapperRegistry;
//!
//! let registry = MapperRegistry::with_builtins();
//! registry.validate(&schema)?;
//! let mapper = registry.get("concat", "patient_name")?;
//! ```

mod builtin;
mod error;
mod mapper;
mod registry;

pub use builtin::{
    CoalesceMapper, ConcatMapper, IfNotPresentMapper, IfPresentMapper, IfThenElseMapper,
    LookupMapper, MiddleInitialMapper, SplitByCommaMapper, SplitMapper, StripNonNumericMapper,
    StripNumericMapper, StripPhoneFormattingMapper, TimestampMapper, TrimBlanksMapper, UseMapper,
};
pub use error::{MapperError, Result};
pub use mapper::{ElementValue, Mapper, value_of};
pub use registry::MapperRegistry;
