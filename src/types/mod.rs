//! IEC 60870-5-102 type definitions.
//!
//! Core protocol types:
//!
//! - `TypeId` - message type identification (C_AC_NA_2, etc.)
//! - `Cause` / `CauseField` - transmission cause
//! - `ControlField`, `FixedFrame`, `VariableFrame`, `Frame` - wire frames
//! - `TimeA` / `TimeB` - bit-packed time labels
//! - record structs for decoded payloads

mod cause;
mod frame;
mod records;
mod time;
mod type_id;

pub use cause::*;
pub use frame::*;
pub use records::*;
pub use time::*;
pub use type_id::*;
