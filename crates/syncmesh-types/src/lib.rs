//! Core types for syncmesh.
//!
//! This crate provides the foundational identifier and permission types
//! shared by every layer of the syncmesh architecture.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Foundation Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  syncmesh-types   : ID types, permissions, ErrorCode ◄── HERE│
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Core Layer                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  syncmesh-process : process framework (steps, composites)   │
//! │  syncmesh-dht     : protected entry client, overlay         │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  syncmesh-files   : profile, steps, factory, file manager   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identifier Design
//!
//! All identifiers are UUID-based for:
//!
//! - **Network compatibility**: Safe to transmit across processes/machines
//! - **Stability**: A process component keeps its identity across every
//!   state transition
//! - **Serialization**: First-class serde support
//!
//! # Example
//!
//! ```
//! use syncmesh_types::{ProcessId, UserId};
//!
//! // Each process component instance gets a unique identity
//! let p1 = ProcessId::new();
//! let p2 = ProcessId::new();
//! assert_ne!(p1, p2);
//!
//! // Users are identified by name, deterministically
//! let alice1 = UserId::from_name("alice");
//! let alice2 = UserId::from_name("alice");
//! assert_eq!(alice1, alice2);
//! ```

mod error;
mod id;
mod permission;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{ProcessId, UserId};
pub use permission::{PermissionType, UserPermission};
