//! Device module
//!
//! - Device controller: I/O start/stop, format ownership, configuration
//!   change protocol ([`controller`])
//! - Real-time I/O handler ([`io`])
//! - Input and output streams ([`stream`])
//! - Custom property pass-through ([`property`])
//! - Serial work queue with the zero-timestamp timer ([`queue`])
//! - User client command surface ([`client`])

pub mod client;
pub mod controller;
pub mod io;
pub mod property;
pub mod queue;
pub mod stream;
