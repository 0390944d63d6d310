// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for the node startup controller and its peers.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod controller;
mod frame;
mod manager;
mod nsm;

pub use controller::{ControllerReply, ControllerRequest};
pub use frame::{call, decode, encode, read_frame, read_message, write_frame, write_message};
pub use frame::{ProtocolError, MAX_FRAME_LEN};
pub use manager::{ManagerEvent, ManagerReply, ManagerRequest};
pub use nsm::{NsmReply, NsmRequest};
