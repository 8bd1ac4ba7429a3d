//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 协议号定义
//!
//! 以太网帧类型 (EtherType) 与 IPv4 协议号
//! 参考: include/uapi/linux/if_ether.h, include/uapi/linux/in.h

/// 以太网协议类型
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum EthProtocol {
    /// IPv4
    ETH_P_IP = 0x0800,
    /// ARP
    ETH_P_ARP = 0x0806,
}

impl EthProtocol {
    /// 从 u16 转换，未知类型返回 None
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            0x0800 => Some(EthProtocol::ETH_P_IP),
            0x0806 => Some(EthProtocol::ETH_P_ARP),
            _ => None,
        }
    }

    /// 转换为 u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// IP 协议类型
///
/// 只列出协议栈能够识别的协议。TCP 可以发送和识别，但接收时直接丢弃。
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum IpProtocol {
    /// ICMP
    IPPROTO_ICMP = 1,
    /// TCP
    IPPROTO_TCP = 6,
    /// UDP
    IPPROTO_UDP = 17,
}

impl IpProtocol {
    /// 从 u8 转换
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            1 => Some(IpProtocol::IPPROTO_ICMP),
            6 => Some(IpProtocol::IPPROTO_TCP),
            17 => Some(IpProtocol::IPPROTO_UDP),
            _ => None,
        }
    }

    /// 转换为 u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}
