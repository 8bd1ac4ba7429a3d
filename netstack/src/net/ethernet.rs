//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 以太网层
//!
//! 以太网帧头部的编码与解析
//! 参考: include/uapi/linux/if_ether.h, include/linux/etherdevice.h

use crate::net::proto::EthProtocol;

/// 以太网头部长度
pub const ETH_HLEN: usize = 14;

/// 以太网最小帧长度 (不含 FCS)
pub const ETH_ZLEN: usize = 60;

/// 以太网最大载荷长度
pub const ETH_DATA_LEN: usize = 1500;

/// 以太网最大帧长度 (不含 FCS)
pub const ETH_FRAME_LEN: usize = 1514;

/// 以太网地址长度 (MAC 地址)
pub const ETH_ALEN: usize = 6;

/// 广播 MAC 地址
pub const ETH_BROADCAST: [u8; ETH_ALEN] = [0xFF; ETH_ALEN];

/// 全零 MAC 地址
pub const ETH_ZERO: [u8; ETH_ALEN] = [0x00; ETH_ALEN];

/// 以太网帧头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHdr {
    /// 目标 MAC 地址
    pub h_dest: [u8; ETH_ALEN],
    /// 源 MAC 地址
    pub h_source: [u8; ETH_ALEN],
    /// 协议类型 (主机字节序)
    pub h_proto: u16,
}

impl EthHdr {
    /// 创建以太网头部
    pub fn new(dest: [u8; ETH_ALEN], source: [u8; ETH_ALEN], proto: EthProtocol) -> Self {
        Self {
            h_dest: dest,
            h_source: source,
            h_proto: proto.to_u16(),
        }
    }

    /// 从字节切片解析以太网头部
    ///
    /// 长度不足 ETH_HLEN 时返回 None
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ETH_HLEN {
            return None;
        }

        let mut h_dest = [0u8; ETH_ALEN];
        let mut h_source = [0u8; ETH_ALEN];
        h_dest.copy_from_slice(&data[0..6]);
        h_source.copy_from_slice(&data[6..12]);

        Some(Self {
            h_dest,
            h_source,
            h_proto: u16::from_be_bytes([data[12], data[13]]),
        })
    }

    /// 将头部写入缓冲区开头
    ///
    /// # 返回
    /// 写入的字节数，缓冲区不足时返回 None
    pub fn write(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.len() < ETH_HLEN {
            return None;
        }

        buf[0..6].copy_from_slice(&self.h_dest);
        buf[6..12].copy_from_slice(&self.h_source);
        buf[12..14].copy_from_slice(&self.h_proto.to_be_bytes());
        Some(ETH_HLEN)
    }

    /// 获取协议类型，未知类型返回 None
    pub fn protocol(&self) -> Option<EthProtocol> {
        EthProtocol::from_u16(self.h_proto)
    }

    /// 检查是否为广播帧
    pub fn is_broadcast(&self) -> bool {
        eth_is_broadcast_addr(&self.h_dest)
    }

    /// 检查是否为本机帧 (目标 MAC 为本机或广播/多播)
    pub fn is_for_us(&self, our_mac: &[u8; ETH_ALEN]) -> bool {
        self.h_dest == *our_mac || eth_is_multicast_addr(&self.h_dest)
    }
}

/// MAC 地址格式化输出 (`xx:xx:xx:xx:xx:xx`)
pub struct MacFmt<'a>(pub &'a [u8; ETH_ALEN]);

impl core::fmt::Display for MacFmt<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let m = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", m[0], m[1], m[2], m[3], m[4], m[5])
    }
}

/// 检查以太网地址是否为有效单播地址 (非零、非多播)
pub fn eth_is_valid_unicast_addr(addr: &[u8; ETH_ALEN]) -> bool {
    !eth_is_zero_addr(addr) && !eth_is_multicast_addr(addr)
}

/// 检查以太网地址是否为多播地址 (广播地址也是多播地址)
pub fn eth_is_multicast_addr(addr: &[u8; ETH_ALEN]) -> bool {
    addr[0] & 0x01 != 0
}

/// 检查以太网地址是否为广播地址
pub fn eth_is_broadcast_addr(addr: &[u8; ETH_ALEN]) -> bool {
    addr == &ETH_BROADCAST
}

/// 检查以太网地址是否全零
pub fn eth_is_zero_addr(addr: &[u8; ETH_ALEN]) -> bool {
    addr == &ETH_ZERO
}
