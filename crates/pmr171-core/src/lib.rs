//! # PMR-171 Core Library
//!
//! Bridges hamlib's NET rigctl text protocol to the binary serial protocol
//! of the Guohe PMR-171 transceiver.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame encoding and validation (preamble, length, CRC-16)
//! - The mode name/identifier table
//! - A device channel that serializes frame exchanges between sessions
//! - A tokio rigctl server with one task per client
//! - JSON bridge configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pmr171_core::protocol::{ChannelConfig, DeviceChannel};
//! use pmr171_core::rigctl::RigctlServer;
//!
//! let channel = Arc::new(DeviceChannel::open("/dev/ttyUSB0", 115200, ChannelConfig::default())?);
//! let server = RigctlServer::bind("127.0.0.1:4532".parse()?, channel).await?;
//! server.run().await;
//! ```

pub mod config;
pub mod protocol;
pub mod rigctl;
