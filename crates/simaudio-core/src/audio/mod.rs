//! Audio processing module
//!
//! This module contains the real-time signal path and its timing:
//! - Stream format description ([`format`])
//! - Index-addressed I/O ring buffers ([`ring`])
//! - Phase-continuous tone generation ([`tone`])
//! - Data-source selector and input gain ([`controls`])
//! - Per-cycle tone/loopback routing ([`router`])
//! - Zero-timestamp clock and host clocks ([`clock`])
//! - Dominant frequency estimation ([`analyzer`])

pub mod analyzer;
pub mod clock;
pub mod controls;
pub mod format;
pub mod ring;
pub mod router;
pub mod tone;
