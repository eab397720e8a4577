//! Feature modules - Each feature follows Hexagonal Architecture
//!
//! Each feature contains:
//! - domain/     - Pure data model
//! - ports/      - Interface definitions (traits)
//! - application/ - Use cases
//! - infrastructure/ - Algorithms and data structures

pub mod points_to;
