//! # hcldag - staged evaluation of block configurations
//!
//! `hcldag` loads HCL documents made of typed blocks, connects the blocks by the references between
//! them and evaluates them in dependency order.
//!
//! ## Introduction for developers
//!
//! ### Blocks
//!
//! Every root block of a document is an instance of a registered kind ([registry::BlockRegistry]).
//! A kind is identified by its block type and, for most kinds, a type label:
//!
//! ```hcl
//! data "dummy" "foo" {        # block type `data`, type label `dummy`, name `foo`
//!   tags = { env = var.env }
//! }
//!
//! variable "env" {            # no type label, referenced as `var.env`
//!   default = "dev"
//! }
//!
//! locals {                    # every attribute becomes a `local` block
//!   prefix = "${var.env}-"
//! }
//! ```
//!
//! An instance is addressed by its reference keyword followed by its labels (`data.dummy.foo`,
//! `var.env`, `local.prefix`). Blocks repeated with `for_each` get one instance per element,
//! addressed with the element key (`data.dummy.foo["a"]`).
//!
//! ### Loading
//!
//! [hcl_documents::HclDocuments] keeps every parsed document with its path and text, so errors can
//! point to a line and column. Root blocks are turned into unevaluated [raw_block::RawBlock]s.
//! Nothing is evaluated yet.
//!
//! ### The graph
//!
//! All expressions of a block are walked ([visit::VisitTraversals]) for traversals rooted at a
//! known reference keyword. Each such reference becomes an edge from the referenced block to the
//! referencing one ([dag::Dag]). Cycles are rejected while the edges are added.
//!
//! ### Evaluation
//!
//! Evaluation happens in stages, each one a walk over the graph that only visits a block once all
//! blocks it references are ready:
//!
//! 1. pre-plan: variables and locals are resolved, `for_each` collections that only depend on those
//!    are expanded
//! 2. plan: every block is decoded ([decode]) against its [schema::BlockSchema] and planned
//! 3. apply (optional): blocks that can be applied are visited parents first
//!
//! The values of all ready blocks form the [eval::EvalContext] expressions are evaluated in.
//!
//! ### Output
//!
//! The evaluated configuration is read back through typed accessors
//! ([config::Configuration::blocks]) or as one [hcl::Value]
//! ([config::Configuration::evaluation_value]) which in turn can be serialized via [serde].
//!
pub mod block;
pub mod blocks;
pub mod config;
pub mod dag;
pub mod decode;
pub mod error;
pub mod eval;
pub mod functions;
pub mod hcl_documents;
pub mod raw_block;
pub mod registry;
mod runner;
pub mod schema;
pub mod source;
pub mod types;
mod util;
pub mod value;
pub mod variables;
pub mod visit;
