//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 嵌入式 UDP/IP 协议栈
//!
//! 以太网之上的最小协议栈：ARP、IPv4 (分片与重组)、ICMP 回显、
//! UDP 套接字和 DHCP 客户端。所有状态保存在固定大小的表和缓冲区中，
//! 由周期任务 [`Stack::poll`] 驱动。

#![cfg_attr(not(test), no_std)]

extern crate log;

pub mod config;
pub mod errno;
pub mod net;

pub use errno::Errno;
pub use net::Stack;
pub use net::device::{NetDevice, MemDevice};
