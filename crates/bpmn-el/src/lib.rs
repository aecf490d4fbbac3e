//! Expression language for the BPMN workflow model.
//!
//! Two small compilers live here, both used while a workflow graph is
//! transformed into its executable form:
//!
//! - [`jsonpath`]: compiles variable paths such as `$.order.items[0]`
//!   into token sequences.
//! - [`condition`]: compiles sequence flow conditions such as
//!   `$.totalPrice > 100 && $.approved == true`.
//!
//! Neither compiler fails its caller. A query or condition that does not
//! parse is still returned, carrying the error reason, so that model
//! validation can report it with the offending expression attached.
//!
//! Both compilers sit behind narrow traits ([`CompileJsonPath`],
//! [`CompileCondition`]) so the transformation pipeline can be driven
//! with test doubles.

#![deny(unsafe_code)]

pub mod condition;
pub mod jsonpath;

pub use condition::{
    CompileCondition, CompiledJsonCondition, ComparisonOperator, Condition, JsonConditionCompiler,
    Operand,
};
pub use jsonpath::{
    CompileJsonPath, JsonPathError, JsonPathQuery, JsonPathQueryCompiler, PathToken, JSON_ROOT_PATH,
};
