//! Capability-based assembly of a shared container from chunk modules, and a
//! dataflow runner that executes node graphs against it.

pub mod assemble;
pub mod builtin;
pub mod chunk;
pub mod container;
pub mod error;
pub mod graph;
pub mod operation;
pub mod runner;

pub type Result<T> = anyhow::Result<T>;

pub use assemble::{AssembleOptions, assemble, assemble_descriptors, assemble_shared};
pub use chunk::{BuildCatalog, ModuleDescriptor};
pub use container::Container;
pub use graph::{Edge, Graph, Node};
pub use operation::{Message, Operation, Tool};
pub use runner::{Runner, compile};
