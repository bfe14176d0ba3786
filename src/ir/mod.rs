//! The mutable analysis IR.
//!
//! A [`Method`] owns its [`Block`]s, and each block owns its [`Node`]s. Edges between blocks
//! and references to nodes are plain ids ([`BlockId`], [`NodeId`], [`NodeRef`]), so the IR
//! has no shared mutable aliasing: "which block holds this node" is a query
//! ([`Method::locate`]), not a back pointer.
//!
//! Passes operate on the IR through the [`Visitor`] trait, which supports replacing nodes
//! while they are being visited.

mod block;
mod method;
mod node;
mod visitor;

pub use block::{Block, BlockId};
pub use method::{Method, NodeRef};
pub use node::{Node, NodeId, NodeKind, PhiNode, StackName};
pub use visitor::{walk_block, walk_method, Visitor};
