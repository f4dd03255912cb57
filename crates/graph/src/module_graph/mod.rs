//! YAML-backed [`GraphRuntime`](crate::GraphRuntime) for nested modules.
//!
//! Module content is a YAML document with a list of blocks:
//!
//! ```yaml
//! blocks:
//!   - name: argument
//!     label: target
//!   - name: declare
//!     label: scrape
//!     body: { interval: 30s }
//! ```
//!
//! Loading is all-or-nothing: content is parsed and validated against the
//! supplied arguments first, and only a fully valid document replaces the
//! current graph.

mod core;
mod handler;
mod source;


pub use self::core::ModuleGraph;
