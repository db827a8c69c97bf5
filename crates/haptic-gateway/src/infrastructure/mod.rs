//! Infrastructure layer: OS and network adapters.
//!
//! | Module     | Contents                                                 |
//! |------------|----------------------------------------------------------|
//! | `certs`    | TLS identity lifecycle: cache, fetch, extract, classify  |
//! | `hid`      | USB HID enumeration and receiver links (hidapi)          |
//! | `detector` | Polling orchestrator with the platform Bluetooth probe   |
//! | `server`   | TLS-terminating HTTP + WebSocket control server          |

pub mod certs;
pub mod detector;
pub mod hid;
pub mod server;
