//! Tool contract, argument schemas, and the schema validator.
//!
//! # Main types
//!
//! - [`Tool`]: Trait implemented by every invocable capability.
//! - [`ToolDescriptor`]: Name, version, category and schema of a tool.
//! - [`ToolSchema`] / [`ParameterSchema`]: Recursive argument schema.
//! - [`ToolRegistry`]: Named collection with validated invocation.

/// Tool registry and validated invocation.
pub mod registry;
/// Argument schema types.
pub mod schema;
/// The tool trait.
pub mod tool;
/// Schema validator.
pub mod validator;

pub use registry::{invoke, ToolRegistry};
pub use schema::{ParameterSchema, ReturnSchema, ToolSchema};
pub use tool::{Tool, ToolDescriptor};
pub use validator::{check_schema, validate, validate_args};
