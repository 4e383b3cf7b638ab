//! # respval-core: Foundational Types for Response Validation
//!
//! This crate is the leaf of the respval workspace. It defines the data that
//! every validation path produces and the helpers that report on it, without
//! knowing anything about schema dialects.
//!
//! ## Key Design Principles
//!
//! 1. **Validation failures are data.** A failed check is a
//!    [`ValidationErrorDetail`], never a panic or an `Err` that escapes to the
//!    caller. Only setup failures use error types, and those are converted into
//!    details at the orchestration boundary.
//!
//! 2. **Reporting cannot fail.** [`safe_stringify`] turns any serializable
//!    value into a bounded display string and never panics, including on
//!    cyclic `Rc` graphs and values whose `Serialize` impl errors.
//!
//! 3. **One format enum.** [`SchemaFormat`] names every schema dialect the
//!    engine routes on; an exhaustive `match` is required everywhere it is
//!    consumed.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `respval-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod detail;
pub mod display;
pub mod error;

pub use config::ValidatorConfig;
pub use detail::{SchemaFormat, ValidationErrorDetail, INPUT_PATH, ROOT_PATH, SCHEMA_PATH};
pub use display::{
    safe_stringify, truncate_display, CIRCULAR_MARKER, MAX_DISPLAY_LEN,
    UNSERIALIZABLE_PLACEHOLDER,
};
pub use error::ConfigError;
