//! JSON Pointer paths for schema evaluation.
//!
//! Evaluation results report two kinds of location: where in the instance a
//! frame was evaluated, and which path through the schema led there. Both are
//! RFC 6901 JSON Pointers, so they share one type, [`JsonPointer`].
//!
//! ```
//! use schema_pointer::JsonPointer;
//! use serde_json::json;
//!
//! let pointer: JsonPointer = "/next/v".parse().unwrap();
//! let doc = json!({"next": {"v": 2}});
//! assert_eq!(pointer.resolve(&doc), Some(&json!(2)));
//! assert_eq!(pointer.to_string(), "/next/v");
//! ```

mod error;
mod pointer;

pub use error::{PointerError, PointerResult};
pub use pointer::{JsonPointer, PathSegment};
