// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]
#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod codec;
mod error;
mod frame;
pub mod receive;
mod session;
pub mod transport;

pub use error::*;
pub use frame::*;
pub use session::*;
