//! StackFlow Core
//!
//! Declarative resource graph builder with idempotent naming and output
//! extraction, plus the loader that turns `stack.kdl` files into graphs.
//!
//! ```text
//! stack.kdl ──► template ──► parser ──► GraphBuilder ──► ResourceGraph
//!                                        add / reference      (topological,
//!                                        output / grant        fingerprinted)
//! ```
//!
//! The builder never performs I/O. Handing a [`ResourceGraph`] to a
//! provisioning engine is the job of `stackflow-cloud`.

pub mod builder;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod template;

pub use builder::{BuilderState, GraphBuilder};
pub use discovery::{DiscoveredFiles, discover_files, find_project_root};
pub use error::{FlowError, GraphError, Result};
pub use loader::{LoadedStack, load_project, load_project_from_root, load_stack_file};
pub use model::*;
pub use parser::{parse_stack_file, parse_stack_string};
pub use template::{TemplateProcessor, Variables, extract_variables};
