//! Typed BPMN workflow graph for the executable subset.
//!
//! A [`WorkflowDefinition`] owns one or more [`Workflow`]s (BPMN
//! processes). Each workflow owns its flow elements — start and end
//! events, service tasks, exclusive gateways and the sequence flows
//! connecting them — in a single arena, addressed by index.
//!
//! # Key concepts
//!
//! - **Flow element**: any node or edge of the process graph, a tagged
//!   variant of [`FlowElement`].
//! - **Sequence flow**: a directed edge between two flow nodes. Its
//!   `source_node`/`target_node` back-references are arena indices and
//!   stay unresolved until the graph is transformed.
//! - **Aspect** ([`BpmnAspect`]): the engine-level classification that
//!   determines what happens when a token arrives at a node.
//! - **Extension metadata**: task definition, task headers and variable
//!   mappings carried by service tasks.
//! - **Diagnostics**: validation produces an ordered
//!   [`ValidationResult`]; a model is invalid once it contains at least
//!   one error.
//!
//! # Design principles
//!
//! 1. The graph is built fully before it is transformed; transformation
//!    only fills derived fields (index maps, back-references, compiled
//!    expressions, encoded headers).
//! 2. Back-references are indices, never owning pointers, so the tree
//!    stays acyclic.
//! 3. Validation is pure: it reads the model and accumulates
//!    diagnostics, it never mutates or fails.

#![deny(unsafe_code)]

mod definition;
mod diagnostics;
mod element;
mod errors;
mod metadata;

pub use definition::*;
pub use diagnostics::*;
pub use element::*;
pub use errors::*;
pub use metadata::*;
