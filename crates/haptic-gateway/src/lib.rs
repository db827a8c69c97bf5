//! haptic-gateway library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the gateway do?
//!
//! It is a small secure control plane between a web client and a host
//! application that can fire feedback patterns on a wireless peripheral:
//!
//! 1. On load it provisions its own short-lived TLS identity: a
//!    password-protected archive is fetched from a fixed URL, cached on disk,
//!    and refreshed at most once a day.
//! 2. A device detector polls on a timer, combining USB HID enumeration,
//!    receiver protocol queries, and a platform Bluetooth fallback into one
//!    cached connectivity snapshot.
//! 3. A TLS-terminating server on loopback serves a JSON API (status,
//!    catalog, device diagnostics, trigger-by-name) and a binary WebSocket
//!    channel where a single byte triggers a pattern by catalog index.

/// Application layer: request routing and the gateway lifecycle facade.
pub mod application;

/// Domain layer: configuration, certificate state, typed API responses.
pub mod domain;

/// Infrastructure layer: certificates, HID transport, detector, server.
pub mod infrastructure;
