//! haptic-core library entry point.
//!
//! Shared protocol engine and domain types for the haptic web gateway.
//! This crate is deliberately free of direct I/O: the receiver protocol is
//! implemented against the [`protocol::DeviceLink`] trait, so the gateway can
//! plug in a real USB HID transport while tests drive the same code with
//! scripted byte exchanges.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                  |
//! |------------|-----------------------------------------------------------|
//! | `protocol` | HID++ frame codec and the two receiver queries            |
//! | `catalog`  | Ordered, immutable waveform catalog with stable indices   |
//! | `status`   | Device status snapshots and protocol query result types   |

/// Waveform catalog: names, descriptions, and stable wire indices.
pub mod catalog;

/// HID++ frame building/parsing and receiver queries.
pub mod protocol;

/// Device status snapshots and query results.
pub mod status;
