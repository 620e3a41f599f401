// SPDX-License-Identifier: GPL-3.0-only

//! Blocking hand-off primitives for the capture pipeline
//!
//! The pipeline stages run on plain OS threads and exchange frame ownership
//! through [`Channel`], a FIFO mailbox whose blocking `pop` is built on
//! [`Gate`], a counting gate over a mutex and condition variable.

pub mod channel;
pub mod gate;

pub use channel::Channel;
pub use gate::Gate;
