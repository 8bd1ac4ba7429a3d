//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! IPv4 协议
//!
//! 头部编解码、单包发送通道、分片与重组
//! 参考: net/ipv4/ip_output.c, net/ipv4/ip_input.c, include/uapi/linux/ip.h

pub mod checksum;
pub mod fragment;
pub mod route;

use core::fmt;

use bitflags::bitflags;
use log::{debug, warn};

use crate::config::{IP_DEFAULT_TTL, IP_IDENT_SEED, IP_MTU, IP_OPTIONS_MAX_LEN, IP_TX_BUF_SIZE};
use crate::errno::Errno;
use crate::net::arp::ArpTable;
use crate::net::device::NetDevice;
use crate::net::proto::{EthProtocol, IpProtocol};

pub use fragment::Reassembly;

/// IPv4 头部长度 (不含选项)
pub const IPHDR_LEN: usize = 20;

/// IPv4 头部最大长度
pub const IPHDR_MAX_LEN: usize = IPHDR_LEN + IP_OPTIONS_MAX_LEN;

/// IPv4 数据报最大长度
pub const IP_MAX_DATAGRAM: usize = 65535;

/// IPv4 版本号
pub const IPVERSION: u8 = 4;

/// 任意地址 0.0.0.0
pub const INADDR_ANY: u32 = 0x0000_0000;

/// 受限广播地址 255.255.255.255
pub const INADDR_BROADCAST: u32 = 0xFFFF_FFFF;

/// 分片偏移掩码 (以 8 字节为单位)
pub const IP_OFFSET_MASK: u16 = 0x1FFF;

/// 由点分十进制的四个字节构造地址
pub const fn ip_addr(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_be_bytes([a, b, c, d])
}

/// IPv4 地址格式化输出 (点分十进制)
pub struct IpAddrFmt(pub u32);

impl fmt::Display for IpAddrFmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0.to_be_bytes();
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

bitflags! {
    /// IPv4 分片标志 (frag_off 字段的高 3 位)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpFragFlags: u16 {
        /// 不分片 (Don't Fragment)
        const DF = 0x4000;
        /// 更多分片 (More Fragments)
        const MF = 0x2000;
    }
}

/// IPv4 头部
///
/// 对应 Linux 的 iphdr (include/uapi/linux/ip.h)，字段为主机字节序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpHdr {
    /// 版本 (4 bits) + 头部长度 (4 bits)
    pub version_ihl: u8,
    /// 服务类型 (DSCP + ECN)
    pub tos: u8,
    /// 总长度
    pub tot_len: u16,
    /// 标识
    pub id: u16,
    /// 分片标志 + 分片偏移
    pub frag_off: u16,
    /// TTL
    pub ttl: u8,
    /// 协议
    pub protocol: u8,
    /// 头部校验和
    pub check: u16,
    /// 源 IP 地址
    pub saddr: u32,
    /// 目标 IP 地址
    pub daddr: u32,
}

impl IpHdr {
    /// 从字节切片解析 IP 头部
    ///
    /// 版本不是 4、头部长度小于 20 或超出数据长度时返回 None
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < IPHDR_LEN {
            return None;
        }

        let be16 = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
        let be32 = |i: usize| u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

        let hdr = Self {
            version_ihl: data[0],
            tos: data[1],
            tot_len: be16(2),
            id: be16(4),
            frag_off: be16(6),
            ttl: data[8],
            protocol: data[9],
            check: be16(10),
            saddr: be32(12),
            daddr: be32(16),
        };

        if hdr.version() != IPVERSION || hdr.hdr_len() < IPHDR_LEN || hdr.hdr_len() > data.len() {
            return None;
        }
        Some(hdr)
    }

    /// 写入固定部分 (20 字节)
    pub fn write(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.len() < IPHDR_LEN {
            return None;
        }

        buf[0] = self.version_ihl;
        buf[1] = self.tos;
        buf[2..4].copy_from_slice(&self.tot_len.to_be_bytes());
        buf[4..6].copy_from_slice(&self.id.to_be_bytes());
        buf[6..8].copy_from_slice(&self.frag_off.to_be_bytes());
        buf[8] = self.ttl;
        buf[9] = self.protocol;
        buf[10..12].copy_from_slice(&self.check.to_be_bytes());
        buf[12..16].copy_from_slice(&self.saddr.to_be_bytes());
        buf[16..20].copy_from_slice(&self.daddr.to_be_bytes());
        Some(IPHDR_LEN)
    }

    /// 版本号
    pub fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    /// 头部长度 (字节)
    pub fn hdr_len(&self) -> usize {
        ((self.version_ihl & 0x0F) as usize) * 4
    }

    /// 分片标志
    pub fn flags(&self) -> IpFragFlags {
        IpFragFlags::from_bits_truncate(self.frag_off)
    }

    /// 分片偏移 (以 8 字节为单位)
    pub fn frag_offset(&self) -> u16 {
        self.frag_off & IP_OFFSET_MASK
    }
}

/// 选项类型字节：复制标志
pub const IPOPT_COPIED: u8 = 0x80;
/// 选项类型字节：类别掩码
pub const IPOPT_CLASS_MASK: u8 = 0x60;
/// 选项类型字节：编号掩码
pub const IPOPT_NUMBER_MASK: u8 = 0x1F;
/// 选项列表结束
pub const IPOPT_END: u8 = 0;
/// 空操作 (填充)
pub const IPOPT_NOOP: u8 = 1;

/// 单个选项的最大数据长度
pub const IPOPT_MAX_DATA: usize = IP_OPTIONS_MAX_LEN - 2;

/// IPv4 头部选项
///
/// 只支持一个选项。`length` 为数据部分长度，线上的长度字节为 `length + 2`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpOptions {
    /// 选项类型 (复制标志 | 类别 | 编号)
    pub opt_type: u8,
    /// 数据长度
    pub length: u8,
    /// 数据
    pub data: [u8; IPOPT_MAX_DATA],
    /// 是否随数据报发送
    pub send: bool,
}

impl IpOptions {
    /// 无选项
    pub const fn none() -> Self {
        Self {
            opt_type: IPOPT_END,
            length: 0,
            data: [0; IPOPT_MAX_DATA],
            send: false,
        }
    }

    /// 创建需要发送的选项
    pub fn new(opt_type: u8, data: &[u8]) -> Result<Self, Errno> {
        if data.len() > IPOPT_MAX_DATA {
            return Err(Errno::MessageTooLong);
        }

        let mut opt = Self::none();
        opt.opt_type = opt_type;
        opt.length = data.len() as u8;
        opt.data[..data.len()].copy_from_slice(data);
        opt.send = true;
        Ok(opt)
    }

    /// 复制标志：置位时每个分片都携带该选项
    pub fn copied(&self) -> bool {
        self.opt_type & IPOPT_COPIED != 0
    }

    /// 选项类别
    pub fn class(&self) -> u8 {
        (self.opt_type & IPOPT_CLASS_MASK) >> 5
    }

    /// 选项编号
    pub fn number(&self) -> u8 {
        self.opt_type & IPOPT_NUMBER_MASK
    }

    /// 是否写入头部
    ///
    /// 编号 0..=2 的选项和没有数据的选项不发送
    pub fn is_emitted(&self) -> bool {
        self.send && self.number() > 2 && self.length > 0
    }

    /// 选项在头部中占用的字节数 (补齐到 4 字节)
    pub fn wire_len(&self) -> usize {
        if self.is_emitted() {
            (self.length as usize + 2 + 3) & !3
        } else {
            0
        }
    }

    /// 写入选项，剩余部分用 0 (IPOPT_END) 填充
    ///
    /// # 返回
    /// 写入的字节数 (等于 `wire_len()`)
    pub fn write(&self, buf: &mut [u8]) -> usize {
        let len = self.wire_len();
        if len == 0 || buf.len() < len {
            return 0;
        }

        let data_len = self.length as usize;
        buf[0] = self.opt_type;
        buf[1] = self.length + 2;
        buf[2..2 + data_len].copy_from_slice(&self.data[..data_len]);
        buf[2 + data_len..len].fill(IPOPT_END);
        len
    }

    /// 解析接收到的选项区域
    ///
    /// # 返回
    /// 第一个非填充选项；没有选项时返回 `IpOptions::none()`；
    /// 长度字段越界时返回 None
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                IPOPT_END => break,
                IPOPT_NOOP => i += 1,
                opt_type => {
                    let len = *bytes.get(i + 1)? as usize;
                    if len < 2 || i + len > bytes.len() || len - 2 > IPOPT_MAX_DATA {
                        return None;
                    }
                    let mut opt = Self::none();
                    opt.opt_type = opt_type;
                    opt.length = (len - 2) as u8;
                    opt.data[..len - 2].copy_from_slice(&bytes[i + 2..i + len]);
                    return Some(opt);
                }
            }
        }
        Some(Self::none())
    }
}

impl Default for IpOptions {
    fn default() -> Self {
        Self::none()
    }
}

/// 待发送数据报描述符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4TxDesc {
    /// 源地址
    pub src: u32,
    /// 目标地址
    pub dst: u32,
    /// 上层协议
    pub protocol: IpProtocol,
    /// 发送缓冲区中的数据长度
    pub data_len: usize,
    /// 不分片
    pub dont_fragment: bool,
    /// 头部选项
    pub options: IpOptions,
}

impl Ipv4TxDesc {
    /// 创建不带选项、允许分片的描述符
    pub fn new(src: u32, dst: u32, protocol: IpProtocol, data_len: usize) -> Self {
        Self {
            src,
            dst,
            protocol,
            data_len,
            dont_fragment: false,
            options: IpOptions::none(),
        }
    }
}

/// 接收到的完整数据报
#[derive(Debug)]
pub struct Datagram<'a> {
    /// 源地址
    pub src: u32,
    /// 目标地址
    pub dst: u32,
    /// 协议号
    pub protocol: u8,
    /// 头部选项 (分片数据报取第一个分片的选项)
    pub options: IpOptions,
    /// 载荷
    pub data: &'a [u8],
}

/// IPv4 发送通道
///
/// 只有一个发送缓冲区，同一时刻最多一个数据报等待发送：
/// 上层通过 [`Ipv4Tx::data_buffer`] 取得缓冲区、写入载荷，
/// 再调用 [`Ipv4Tx::send_packet`] 提交；实际的地址解析和发送
/// 在周期任务 [`Ipv4Tx::flush`] 中完成。
pub struct Ipv4Tx {
    buf: [u8; IP_TX_BUF_SIZE],
    frame: [u8; IPHDR_MAX_LEN + IP_TX_BUF_SIZE],
    pending: Option<Ipv4TxDesc>,
    ident: u16,
}

impl Ipv4Tx {
    /// 创建发送通道
    pub const fn new() -> Self {
        Self {
            buf: [0; IP_TX_BUF_SIZE],
            frame: [0; IPHDR_MAX_LEN + IP_TX_BUF_SIZE],
            pending: None,
            ident: IP_IDENT_SEED,
        }
    }

    /// 获取发送缓冲区
    ///
    /// # 返回
    /// 上一个数据报尚未发出时返回 None，调用者不能写入
    pub fn data_buffer(&mut self) -> Option<&mut [u8]> {
        if self.pending.is_some() {
            return None;
        }
        Some(&mut self.buf)
    }

    /// 是否有数据报等待发送
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// 下一个数据报使用的标识
    pub fn next_ident(&self) -> u16 {
        self.ident
    }

    /// 提交数据报
    ///
    /// # 参数
    /// - `desc`: 描述符，载荷已经写入发送缓冲区
    ///
    /// # 说明
    /// 尚未发出的数据报会被覆盖
    pub fn send_packet(&mut self, desc: Ipv4TxDesc) -> Result<(), Errno> {
        if desc.data_len > IP_TX_BUF_SIZE
            || desc.data_len + IPHDR_LEN + desc.options.wire_len() > IP_MAX_DATAGRAM
        {
            return Err(Errno::MessageTooLong);
        }

        if let Some(old) = self.pending.replace(desc) {
            warn!("ipv4: unsent datagram to {} overwritten", IpAddrFmt(old.dst));
        }
        Ok(())
    }

    /// 发送等待中的数据报
    ///
    /// # 说明
    /// 目标地址未解析时保留数据报，下一个周期重试 (ARP 请求已经发出)
    pub fn flush<D: NetDevice>(&mut self, arp: &mut ArpTable, dev: &mut D) {
        let Some(desc) = self.pending else {
            return;
        };

        arp.set_local_ip(desc.src);
        let Some(mac) = arp.resolve(desc.src, desc.dst, dev) else {
            return;
        };

        let ident = self.ident;
        self.ident = self.ident.wrapping_add(1);
        self.pending = None;

        let payload = &self.buf[..desc.data_len];
        let result = fragment::ip_fragment(&desc, payload, ident, IP_MTU, &mut self.frame, |packet| {
            dev.send_frame(&mac, EthProtocol::ETH_P_IP, packet)
        });

        match result {
            Ok(count) if count > 1 => {
                debug!("ipv4: id {:#06x} to {} sent in {} fragments", ident, IpAddrFmt(desc.dst), count);
            }
            Ok(_) => {}
            Err(e) => warn!("ipv4: datagram to {} dropped: {:?}", IpAddrFmt(desc.dst), e),
        }
    }
}

impl Default for Ipv4Tx {
    fn default() -> Self {
        Self::new()
    }
}

/// 写入一个分片的 IPv4 头部 (含选项和校验和)
///
/// # 返回
/// 头部长度
pub(crate) fn ip_build_header(
    buf: &mut [u8],
    desc: &Ipv4TxDesc,
    options: &IpOptions,
    payload_len: usize,
    ident: u16,
    frag_off: u16,
) -> Result<usize, Errno> {
    let hdr_len = IPHDR_LEN + options.wire_len();
    if buf.len() < hdr_len + payload_len {
        return Err(Errno::NoBufferSpace);
    }

    let hdr = IpHdr {
        version_ihl: (IPVERSION << 4) | (hdr_len / 4) as u8,
        tos: 0,
        tot_len: (hdr_len + payload_len) as u16,
        id: ident,
        frag_off,
        ttl: IP_DEFAULT_TTL,
        protocol: desc.protocol.to_u8(),
        check: 0,
        saddr: desc.src,
        daddr: desc.dst,
    };
    hdr.write(buf).ok_or(Errno::NoBufferSpace)?;
    options.write(&mut buf[IPHDR_LEN..hdr_len]);

    let check = checksum::ip_checksum(&buf[..hdr_len]);
    buf[10..12].copy_from_slice(&check.to_be_bytes());
    Ok(hdr_len)
}

/// IPv4 层
///
/// 发送通道与重组上下文是两个独立字段，
/// 分发重组好的数据报时上层仍可以使用发送通道
pub struct Ipv4Layer {
    /// 发送通道
    pub tx: Ipv4Tx,
    /// 重组上下文
    pub rx: Reassembly,
    obtained_ip: u32,
}

impl Ipv4Layer {
    /// 创建 IPv4 层
    pub const fn new() -> Self {
        Self {
            tx: Ipv4Tx::new(),
            rx: Reassembly::new(),
            obtained_ip: INADDR_ANY,
        }
    }

    /// 设置本机地址
    ///
    /// 记录为获得的地址并加入 ARP 本地地址表
    pub fn set_local_ip(&mut self, arp: &mut ArpTable, ip: u32) {
        self.obtained_ip = ip;
        arp.set_local_ip(ip);
    }

    /// 获得的本机地址，未设置时为 0.0.0.0
    pub fn obtained_ip(&self) -> u32 {
        self.obtained_ip
    }

    /// 设置默认网关
    pub fn set_router_info(&mut self, arp: &mut ArpTable, gateway: u32, mask: u32) {
        arp.set_router_info(gateway, mask);
    }
}

impl Default for Ipv4Layer {
    fn default() -> Self {
        Self::new()
    }
}
