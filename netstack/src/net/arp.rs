//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! ARP 协议
//!
//! IPv4 地址到以太网地址的解析，以及本机地址表的维护
//! 参考: net/ipv4/arp.c, include/uapi/linux/if_arp.h

use log::{debug, warn};
#[cfg(feature = "debug_log")]
use log::trace;

use crate::config::{ARP_CACHE_SIZE, ARP_LOCAL_IP_TABLE_SIZE};
use crate::net::device::NetDevice;
use crate::net::ethernet::{MacFmt, ETH_ALEN, ETH_BROADCAST, ETH_ZERO};
use crate::net::ipv4::route::RouterInfo;
use crate::net::ipv4::{IpAddrFmt, INADDR_ANY, INADDR_BROADCAST};
use crate::net::proto::EthProtocol;

/// IPv4 地址长度
pub const ARP_PLEN: u8 = 4;

/// ARP 硬件类型
///
/// 对应 Linux 的 ARPHRD_* (include/uapi/linux/if_arp.h)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ArpHrd {
    /// 以太网
    ARPHRD_ETHER = 1,
}

/// ARP 协议类型
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ArpPro {
    /// IPv4
    ARPPROTO_IP = 0x0800,
}

/// ARP 操作类型
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ArpOp {
    /// ARP 请求
    ARPOP_REQUEST = 1,
    /// ARP 响应
    ARPOP_REPLY = 2,
}

impl ArpOp {
    /// 从 u16 转换
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            1 => Some(ArpOp::ARPOP_REQUEST),
            2 => Some(ArpOp::ARPOP_REPLY),
            _ => None,
        }
    }
}

/// ARP 报文 (以太网 + IPv4)
///
/// 对应 Linux 的 arphdr 加上以太网/IPv4 地址部分，
/// 地址字段均为主机字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    /// 硬件类型
    pub ar_hrd: u16,
    /// 协议类型
    pub ar_pro: u16,
    /// 硬件地址长度
    pub ar_hln: u8,
    /// 协议地址长度
    pub ar_pln: u8,
    /// 操作类型
    pub ar_op: u16,
    /// 发送方硬件地址 (MAC)
    pub ar_sha: [u8; ETH_ALEN],
    /// 发送方协议地址 (IP)
    pub ar_sip: u32,
    /// 目标硬件地址 (MAC)
    pub ar_tha: [u8; ETH_ALEN],
    /// 目标协议地址 (IP)
    pub ar_tip: u32,
}

impl ArpPacket {
    /// ARP 报文总长度 (以太网 + IPv4)
    pub const LEN: usize = 28;

    fn new(op: ArpOp, sha: [u8; ETH_ALEN], sip: u32, tha: [u8; ETH_ALEN], tip: u32) -> Self {
        Self {
            ar_hrd: ArpHrd::ARPHRD_ETHER as u16,
            ar_pro: ArpPro::ARPPROTO_IP as u16,
            ar_hln: ETH_ALEN as u8,
            ar_pln: ARP_PLEN,
            ar_op: op as u16,
            ar_sha: sha,
            ar_sip: sip,
            ar_tha: tha,
            ar_tip: tip,
        }
    }

    /// 构造 ARP 请求 (目标硬件地址为空)
    pub fn request(sender_mac: [u8; ETH_ALEN], sender_ip: u32, target_ip: u32) -> Self {
        Self::new(ArpOp::ARPOP_REQUEST, sender_mac, sender_ip, ETH_ZERO, target_ip)
    }

    /// 构造 ARP 响应
    pub fn reply(sender_mac: [u8; ETH_ALEN], sender_ip: u32, target_mac: [u8; ETH_ALEN], target_ip: u32) -> Self {
        Self::new(ArpOp::ARPOP_REPLY, sender_mac, sender_ip, target_mac, target_ip)
    }

    /// 从字节切片解析 ARP 报文
    ///
    /// 只检查长度，字段合法性由 [`ArpPacket::is_valid`] 检查
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::LEN {
            return None;
        }

        let be16 = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
        let be32 = |i: usize| u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

        let mut ar_sha = [0u8; ETH_ALEN];
        let mut ar_tha = [0u8; ETH_ALEN];
        ar_sha.copy_from_slice(&data[8..14]);
        ar_tha.copy_from_slice(&data[18..24]);

        Some(Self {
            ar_hrd: be16(0),
            ar_pro: be16(2),
            ar_hln: data[4],
            ar_pln: data[5],
            ar_op: be16(6),
            ar_sha,
            ar_sip: be32(14),
            ar_tha,
            ar_tip: be32(24),
        })
    }

    /// 编码为网络字节序
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..2].copy_from_slice(&self.ar_hrd.to_be_bytes());
        buf[2..4].copy_from_slice(&self.ar_pro.to_be_bytes());
        buf[4] = self.ar_hln;
        buf[5] = self.ar_pln;
        buf[6..8].copy_from_slice(&self.ar_op.to_be_bytes());
        buf[8..14].copy_from_slice(&self.ar_sha);
        buf[14..18].copy_from_slice(&self.ar_sip.to_be_bytes());
        buf[18..24].copy_from_slice(&self.ar_tha);
        buf[24..28].copy_from_slice(&self.ar_tip.to_be_bytes());
        buf
    }

    /// 检查是否为以太网 + IPv4 的 ARP 报文
    pub fn is_valid(&self) -> bool {
        self.ar_hrd == ArpHrd::ARPHRD_ETHER as u16
            && self.ar_pro == ArpPro::ARPPROTO_IP as u16
            && self.ar_hln == ETH_ALEN as u8
            && self.ar_pln == ARP_PLEN
    }

    /// 获取操作类型
    pub fn op(&self) -> Option<ArpOp> {
        ArpOp::from_u16(self.ar_op)
    }
}

/// ARP 缓存条目
///
/// IP 地址与以太网地址表下标的对应关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArpEntry {
    ip: u32,
    eth_idx: usize,
}

/// ARP 表
///
/// 包含三部分：
/// - 本地 IP 地址表 (ARP_LOCAL_IP_TABLE_SIZE 项)
/// - IP 到以太网地址下标的映射表和以太网地址表 (各 ARP_CACHE_SIZE 项)
/// - 默认网关信息
///
/// 表满时新条目覆盖第 0 项。条目不会老化。
pub struct ArpTable {
    local_ips: [Option<u32>; ARP_LOCAL_IP_TABLE_SIZE],
    entries: [Option<ArpEntry>; ARP_CACHE_SIZE],
    eth_addrs: [Option<[u8; ETH_ALEN]>; ARP_CACHE_SIZE],
    router: RouterInfo,
}

impl ArpTable {
    /// 创建空表
    pub const fn new() -> Self {
        Self {
            local_ips: [None; ARP_LOCAL_IP_TABLE_SIZE],
            entries: [None; ARP_CACHE_SIZE],
            eth_addrs: [None; ARP_CACHE_SIZE],
            router: RouterInfo::new(0, 0),
        }
    }

    /// 添加本地 IP 地址
    ///
    /// # 说明
    /// 已存在时不做任何事；表满时覆盖第 0 项。0.0.0.0 不会被记录。
    pub fn set_local_ip(&mut self, ip: u32) {
        if ip == INADDR_ANY || self.is_local_ip(ip) {
            return;
        }

        match self.local_ips.iter().position(|slot| slot.is_none()) {
            Some(i) => self.local_ips[i] = Some(ip),
            None => {
                warn!("arp: local address table full, {} replaces slot 0", IpAddrFmt(ip));
                self.local_ips[0] = Some(ip);
            }
        }
    }

    /// 检查是否为本地 IP 地址
    pub fn is_local_ip(&self, ip: u32) -> bool {
        self.local_ips.iter().any(|slot| *slot == Some(ip))
    }

    /// 设置默认网关
    pub fn set_router_info(&mut self, gateway: u32, mask: u32) {
        self.router = RouterInfo::new(gateway, mask);
        debug!("arp: router {} mask {}", IpAddrFmt(gateway), IpAddrFmt(mask));
    }

    /// 获取默认网关
    pub fn router_info(&self) -> RouterInfo {
        self.router
    }

    /// 查找 ARP 缓存
    ///
    /// # 返回
    /// 缓存的 MAC 地址，未找到时返回 None
    pub fn lookup(&self, ip: u32) -> Option<[u8; ETH_ALEN]> {
        self.entries
            .iter()
            .flatten()
            .find(|entry| entry.ip == ip)
            .and_then(|entry| self.eth_addrs[entry.eth_idx])
    }

    /// 添加或更新 ARP 缓存
    ///
    /// # 参数
    /// - `ip`: IP 地址
    /// - `mac`: MAC 地址
    ///
    /// # 说明
    /// 已存在的 IP 直接更新；表满时覆盖第 0 项
    pub fn update(&mut self, ip: u32, mac: [u8; ETH_ALEN]) {
        if ip == INADDR_ANY || ip == INADDR_BROADCAST {
            return;
        }

        // 先摘下旧条目，旧 MAC 的槽位无人引用时可以被复用
        let existing = self.entries
            .iter()
            .position(|entry| matches!(entry, Some(e) if e.ip == ip));
        if let Some(i) = existing {
            self.entries[i] = None;
        }

        let eth_idx = self.eth_slot(&mac);
        self.eth_addrs[eth_idx] = Some(mac);

        let slot = existing
            .or_else(|| self.entries.iter().position(|entry| entry.is_none()))
            .unwrap_or_else(|| {
                warn!("arp: cache full, {} replaces slot 0", IpAddrFmt(ip));
                0
            });

        self.entries[slot] = Some(ArpEntry { ip, eth_idx });
    }

    /// 为 MAC 地址选择以太网地址表槽位
    ///
    /// 依次选择：相同地址、空槽位、无人引用的槽位、第 0 项。
    /// 覆盖第 0 项时，原来指向它的 IP 条目一并失效。
    fn eth_slot(&mut self, mac: &[u8; ETH_ALEN]) -> usize {
        if let Some(i) = self.eth_addrs.iter().position(|slot| slot.as_ref() == Some(mac)) {
            return i;
        }
        if let Some(i) = self.eth_addrs.iter().position(|slot| slot.is_none()) {
            return i;
        }

        let orphan = (0..ARP_CACHE_SIZE)
            .find(|&i| !self.entries.iter().flatten().any(|entry| entry.eth_idx == i));
        if let Some(i) = orphan {
            return i;
        }

        for entry in self.entries.iter_mut() {
            if matches!(entry, Some(e) if e.eth_idx == 0) {
                *entry = None;
            }
        }
        0
    }

    /// 解析下一跳的以太网地址
    ///
    /// # 参数
    /// - `src`: 本机源地址 (用作 ARP 请求的发送方地址)
    /// - `dst`: 目标地址
    /// - `dev`: 网络设备
    ///
    /// # 返回
    /// 找到时返回 MAC 地址。未找到时广播 ARP 请求并返回 None，
    /// 调用者需要在后续周期重试。
    ///
    /// # 说明
    /// 受限广播地址直接映射到以太网广播地址。
    /// 子网外的目标解析网关的地址。
    pub fn resolve<D: NetDevice>(&mut self, src: u32, dst: u32, dev: &mut D) -> Option<[u8; ETH_ALEN]> {
        if dst == INADDR_BROADCAST {
            return Some(ETH_BROADCAST);
        }

        let target = self.router.next_hop(dst);
        if let Some(mac) = self.lookup(target) {
            return Some(mac);
        }

        debug!("arp: who-has {} tell {}", IpAddrFmt(target), IpAddrFmt(src));
        let request = ArpPacket::request(dev.mac_addr(), src, target);
        if let Err(e) = dev.send_frame(&ETH_BROADCAST, EthProtocol::ETH_P_ARP, &request.to_bytes()) {
            warn!("arp: request for {} not sent: {:?}", IpAddrFmt(target), e);
        }
        None
    }

    /// 处理接收到的 ARP 报文
    ///
    /// # 参数
    /// - `data`: ARP 报文 (不含以太网头部)
    /// - `dev`: 网络设备，用于发送响应
    ///
    /// # 说明
    /// 请求和响应都会学习发送方的地址映射；
    /// 请求的目标是本机地址时回复 ARP 响应。其它报文直接丢弃。
    pub fn rcv<D: NetDevice>(&mut self, data: &[u8], dev: &mut D) {
        let Some(pkt) = ArpPacket::parse(data).filter(|pkt| pkt.is_valid()) else {
            #[cfg(feature = "debug_log")]
            trace!("arp: malformed packet dropped");
            return;
        };

        match pkt.op() {
            Some(ArpOp::ARPOP_REQUEST) => {
                self.update(pkt.ar_sip, pkt.ar_sha);

                if self.is_local_ip(pkt.ar_tip) {
                    let our_mac = dev.mac_addr();
                    debug!("arp: {} is-at {} (to {})", IpAddrFmt(pkt.ar_tip), MacFmt(&our_mac), IpAddrFmt(pkt.ar_sip));
                    let reply = ArpPacket::reply(our_mac, pkt.ar_tip, pkt.ar_sha, pkt.ar_sip);
                    if let Err(e) = dev.send_frame(&pkt.ar_sha, EthProtocol::ETH_P_ARP, &reply.to_bytes()) {
                        warn!("arp: reply to {} not sent: {:?}", IpAddrFmt(pkt.ar_sip), e);
                    }
                }
            }
            Some(ArpOp::ARPOP_REPLY) => {
                debug!("arp: {} is-at {}", IpAddrFmt(pkt.ar_sip), MacFmt(&pkt.ar_sha));
                self.update(pkt.ar_sip, pkt.ar_sha);
            }
            None => {
                #[cfg(feature = "debug_log")]
                trace!("arp: unknown op {} dropped", pkt.ar_op);
            }
        }
    }

    /// ARP 周期任务
    ///
    /// 缓存老化尚未实现，条目一旦学习到就一直有效
    pub fn periodic(&mut self) {}
}

impl Default for ArpTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::device::MemDevice;
    use crate::net::ethernet::{EthHdr, ETH_FRAME_LEN, ETH_HLEN};

    const OUR_MAC: [u8; ETH_ALEN] = [0x00, 0x04, 0xA3, 0x00, 0x00, 0x01];
    const OUR_IP: u32 = 0xC0A80164; // 192.168.1.100
    const PEER_MAC: [u8; ETH_ALEN] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
    const PEER_IP: u32 = 0xC0A80101; // 192.168.1.1

    fn mac(n: u8) -> [u8; ETH_ALEN] {
        [0x02, 0x00, 0x00, 0x00, 0x00, n]
    }

    fn take_arp(dev: &mut MemDevice) -> Option<(EthHdr, ArpPacket)> {
        let mut buf = [0u8; ETH_FRAME_LEN];
        let len = dev.take_tx(&mut buf)?;
        let hdr = EthHdr::parse(&buf[..len])?;
        let pkt = ArpPacket::parse(&buf[ETH_HLEN..len])?;
        Some((hdr, pkt))
    }

    #[test]
    fn test_arp_packet_layout() {
        let pkt = ArpPacket::request(OUR_MAC, OUR_IP, PEER_IP);
        let bytes = pkt.to_bytes();
        assert_eq!(
            bytes,
            [
                0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01,
                0x00, 0x04, 0xA3, 0x00, 0x00, 0x01, 0xC0, 0xA8, 0x01, 0x64,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0xA8, 0x01, 0x01,
            ]
        );
        let parsed = ArpPacket::parse(&bytes).unwrap();
        assert_eq!(parsed, pkt);
        assert!(parsed.is_valid());
        assert_eq!(parsed.op(), Some(ArpOp::ARPOP_REQUEST));
    }

    #[test]
    fn test_arp_packet_invalid() {
        assert!(ArpPacket::parse(&[0u8; ArpPacket::LEN - 1]).is_none());

        let mut bytes = ArpPacket::reply(OUR_MAC, OUR_IP, PEER_MAC, PEER_IP).to_bytes();
        bytes[1] = 6; // 非以太网硬件类型
        assert!(!ArpPacket::parse(&bytes).unwrap().is_valid());
    }

    #[test]
    fn test_local_ip_table() {
        let mut arp = ArpTable::new();
        arp.set_local_ip(OUR_IP);
        arp.set_local_ip(OUR_IP);
        assert!(arp.is_local_ip(OUR_IP));
        assert!(!arp.is_local_ip(PEER_IP));

        // 0.0.0.0 不记录
        arp.set_local_ip(INADDR_ANY);
        assert!(!arp.is_local_ip(INADDR_ANY));

        for i in 1..ARP_LOCAL_IP_TABLE_SIZE as u32 {
            arp.set_local_ip(0x0A000000 + i);
        }
        // 表满，覆盖第 0 项
        arp.set_local_ip(0x0A0000FF);
        assert!(arp.is_local_ip(0x0A0000FF));
        assert!(!arp.is_local_ip(OUR_IP));
        assert!(arp.is_local_ip(0x0A000001));
    }

    #[test]
    fn test_arp_cache_lookup() {
        let mut arp = ArpTable::new();
        let mut dev = MemDevice::new(OUR_MAC);

        arp.update(PEER_IP, PEER_MAC);
        assert_eq!(arp.lookup(PEER_IP), Some(PEER_MAC));

        // 同一子网内的解析命中缓存，不发送 ARP 请求
        assert_eq!(arp.resolve(PEER_IP, PEER_IP, &mut dev), Some(PEER_MAC));
        assert_eq!(dev.tx_len(), 0);

        // 更新已有条目
        arp.update(PEER_IP, mac(9));
        assert_eq!(arp.lookup(PEER_IP), Some(mac(9)));
    }

    #[test]
    fn test_arp_cache_shared_mac() {
        let mut arp = ArpTable::new();
        arp.update(0x0A000001, PEER_MAC);
        arp.update(0x0A000002, PEER_MAC);
        assert_eq!(arp.lookup(0x0A000001), Some(PEER_MAC));
        assert_eq!(arp.lookup(0x0A000002), Some(PEER_MAC));
        assert_eq!(arp.eth_addrs.iter().flatten().count(), 1);
    }

    #[test]
    fn test_arp_cache_overwrite_slot_zero() {
        let mut arp = ArpTable::new();
        for i in 0..ARP_CACHE_SIZE as u8 {
            arp.update(0x0A000000 + i as u32, mac(i));
        }
        for i in 0..ARP_CACHE_SIZE as u8 {
            assert_eq!(arp.lookup(0x0A000000 + i as u32), Some(mac(i)));
        }

        // 第 9 个条目覆盖第 0 项
        arp.update(0x0A0000FF, mac(0xFF));
        assert_eq!(arp.lookup(0x0A0000FF), Some(mac(0xFF)));
        assert_eq!(arp.lookup(0x0A000000), None);
        assert_eq!(arp.entries[0].map(|e| e.ip), Some(0x0A0000FF));
        for i in 1..ARP_CACHE_SIZE as u8 {
            assert_eq!(arp.lookup(0x0A000000 + i as u32), Some(mac(i)));
        }
    }

    #[test]
    fn test_arp_cache_reuses_orphan_slot() {
        let mut arp = ArpTable::new();
        for i in 0..ARP_CACHE_SIZE as u8 {
            arp.update(0x0A000000 + i as u32, mac(i));
        }
        // 地址 3 换了 MAC，旧的以太网槽位不再被引用，可以复用
        arp.update(0x0A000003, mac(0x33));
        assert_eq!(arp.lookup(0x0A000003), Some(mac(0x33)));
        for i in (0..ARP_CACHE_SIZE as u8).filter(|&i| i != 3) {
            assert_eq!(arp.lookup(0x0A000000 + i as u32), Some(mac(i)));
        }
    }

    #[test]
    fn test_resolve_miss_sends_request() {
        let mut arp = ArpTable::new();
        let mut dev = MemDevice::new(OUR_MAC);

        assert_eq!(arp.resolve(OUR_IP, PEER_IP, &mut dev), None);
        let (hdr, pkt) = take_arp(&mut dev).unwrap();
        assert!(hdr.is_broadcast());
        assert_eq!(hdr.protocol(), Some(EthProtocol::ETH_P_ARP));
        assert_eq!(pkt.op(), Some(ArpOp::ARPOP_REQUEST));
        assert_eq!(pkt.ar_sha, OUR_MAC);
        assert_eq!(pkt.ar_sip, OUR_IP);
        assert_eq!(pkt.ar_tha, ETH_ZERO);
        assert_eq!(pkt.ar_tip, PEER_IP);
    }

    #[test]
    fn test_resolve_broadcast() {
        let mut arp = ArpTable::new();
        let mut dev = MemDevice::new(OUR_MAC);
        arp.set_router_info(PEER_IP, 0xFFFFFF00);

        assert_eq!(arp.resolve(INADDR_ANY, INADDR_BROADCAST, &mut dev), Some(ETH_BROADCAST));
        assert_eq!(dev.tx_len(), 0);
    }

    #[test]
    fn test_resolve_off_subnet_uses_router() {
        let mut arp = ArpTable::new();
        let mut dev = MemDevice::new(OUR_MAC);
        arp.set_router_info(PEER_IP, 0xFFFFFF00);

        // 网关未知时请求网关的地址
        assert_eq!(arp.resolve(OUR_IP, 0x08080808, &mut dev), None);
        let (_, pkt) = take_arp(&mut dev).unwrap();
        assert_eq!(pkt.ar_tip, PEER_IP);

        arp.update(PEER_IP, PEER_MAC);
        assert_eq!(arp.resolve(OUR_IP, 0x08080808, &mut dev), Some(PEER_MAC));
    }

    #[test]
    fn test_rcv_request_for_us() {
        let mut arp = ArpTable::new();
        let mut dev = MemDevice::new(OUR_MAC);
        arp.set_local_ip(OUR_IP);

        let request = ArpPacket::request(PEER_MAC, PEER_IP, OUR_IP);
        arp.rcv(&request.to_bytes(), &mut dev);

        assert_eq!(arp.lookup(PEER_IP), Some(PEER_MAC));
        let (hdr, reply) = take_arp(&mut dev).unwrap();
        assert_eq!(hdr.h_dest, PEER_MAC);
        assert_eq!(reply.op(), Some(ArpOp::ARPOP_REPLY));
        assert_eq!(reply.ar_sha, OUR_MAC);
        assert_eq!(reply.ar_sip, OUR_IP);
        assert_eq!(reply.ar_tha, PEER_MAC);
        assert_eq!(reply.ar_tip, PEER_IP);
    }

    #[test]
    fn test_rcv_request_not_for_us() {
        let mut arp = ArpTable::new();
        let mut dev = MemDevice::new(OUR_MAC);
        arp.set_local_ip(OUR_IP);

        let request = ArpPacket::request(PEER_MAC, PEER_IP, 0xC0A80163);
        arp.rcv(&request.to_bytes(), &mut dev);

        // 仍然学习发送方地址，但不回复
        assert_eq!(arp.lookup(PEER_IP), Some(PEER_MAC));
        assert_eq!(dev.tx_len(), 0);
    }

    #[test]
    fn test_rcv_reply_and_unknown_op() {
        let mut arp = ArpTable::new();
        let mut dev = MemDevice::new(OUR_MAC);

        let reply = ArpPacket::reply(PEER_MAC, PEER_IP, OUR_MAC, OUR_IP);
        arp.rcv(&reply.to_bytes(), &mut dev);
        assert_eq!(arp.lookup(PEER_IP), Some(PEER_MAC));
        assert_eq!(dev.tx_len(), 0);

        let mut bytes = ArpPacket::reply(mac(7), 0x0A000007, OUR_MAC, OUR_IP).to_bytes();
        bytes[7] = 3; // RARP 请求
        arp.rcv(&bytes, &mut dev);
        assert_eq!(arp.lookup(0x0A000007), None);
    }
}
