//! # Domain Models
//!
//! Pure types shared by the loader, the validator and the machine runtime, with
//! minimal dependencies (`serde`, `bitflags`). No I/O, no parsing, no validation
//! logic: only data and small accessors.

pub mod config;
pub mod passes;
pub mod spec;
pub mod value;

pub use config::{MachineConfig, Section, Settings};
pub use passes::ValidationPasses;
pub use spec::{DefaultValue, FieldSpec, Scope, ValueType};
pub use value::ConfigValue;
