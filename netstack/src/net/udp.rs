//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! UDP 协议
//!
//! 固定大小的 Socket 表，每个 Socket 只有一个接收缓冲区
//! 参考: net/ipv4/udp.c, include/net/udp.h, include/uapi/linux/udp.h

use log::{debug, warn};
#[cfg(feature = "debug_log")]
use log::trace;

use crate::config::{IP_TX_BUF_SIZE, UDP_RX_BUF_SIZE, UDP_SOCKET_TABLE_SIZE};
use crate::errno::Errno;
use crate::net::ipv4::checksum::transport_checksum;
use crate::net::ipv4::{IpAddrFmt, Ipv4Tx, Ipv4TxDesc, INADDR_ANY, INADDR_BROADCAST};
use crate::net::proto::IpProtocol;

/// UDP 头部长度
pub const UDP_HLEN: usize = 8;

/// 单个数据报的最大数据长度 (受发送缓冲区限制)
pub const UDP_MAX_PAYLOAD: usize = IP_TX_BUF_SIZE - UDP_HLEN;

/// UDP 端口号
pub type UdpPort = u16;

/// UDP 头部
///
/// 对应 Linux 的 udphdr (include/uapi/linux/udp.h)，字段为主机字节序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UdpHdr {
    /// 源端口
    pub source: UdpPort,
    /// 目标端口
    pub dest: UdpPort,
    /// 长度 (头部 + 数据)
    pub len: u16,
    /// 校验和
    pub check: u16,
}

impl UdpHdr {
    /// 从字节切片解析 UDP 头部
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < UDP_HLEN {
            return None;
        }

        Some(Self {
            source: u16::from_be_bytes([data[0], data[1]]),
            dest: u16::from_be_bytes([data[2], data[3]]),
            len: u16::from_be_bytes([data[4], data[5]]),
            check: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// 写入 UDP 头部
    pub fn write(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.len() < UDP_HLEN {
            return None;
        }

        buf[0..2].copy_from_slice(&self.source.to_be_bytes());
        buf[2..4].copy_from_slice(&self.dest.to_be_bytes());
        buf[4..6].copy_from_slice(&self.len.to_be_bytes());
        buf[6..8].copy_from_slice(&self.check.to_be_bytes());
        Some(UDP_HLEN)
    }
}

/// UDP Socket
///
/// 记录四元组和一个接收缓冲区。新数据到达时覆盖尚未读取的旧数据。
pub struct UdpSocket {
    /// 本地 IP 地址，0.0.0.0 匹配任意目标地址
    pub local_ip: u32,
    /// 远程 IP 地址，255.255.255.255 匹配任意源地址
    pub remote_ip: u32,
    /// 本地端口
    pub local_port: UdpPort,
    /// 远程端口
    pub remote_port: UdpPort,
    open: bool,
    new_data: bool,
    rx_len: usize,
    rx_buf: [u8; UDP_RX_BUF_SIZE],
}

impl UdpSocket {
    const fn new() -> Self {
        Self {
            local_ip: INADDR_ANY,
            remote_ip: INADDR_ANY,
            local_port: 0,
            remote_port: 0,
            open: false,
            new_data: false,
            rx_len: 0,
            rx_buf: [0; UDP_RX_BUF_SIZE],
        }
    }

    /// 是否已打开
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 检查数据报是否属于此 Socket
    fn matches(&self, src: u32, dst: u32, hdr: &UdpHdr) -> bool {
        self.open
            && hdr.dest == self.local_port
            && hdr.source == self.remote_port
            && (self.local_ip == dst || self.local_ip == INADDR_ANY)
            && (self.remote_ip == src || self.remote_ip == INADDR_BROADCAST)
    }
}

/// UDP Socket 表
pub struct UdpTable {
    sockets: [UdpSocket; UDP_SOCKET_TABLE_SIZE],
}

impl UdpTable {
    /// 创建 Socket 表，所有 Socket 处于关闭状态
    pub const fn new() -> Self {
        const CLOSED: UdpSocket = UdpSocket::new();
        Self {
            sockets: [CLOSED; UDP_SOCKET_TABLE_SIZE],
        }
    }

    /// 获取 Socket
    pub fn get(&self, id: usize) -> Option<&UdpSocket> {
        self.sockets.get(id)
    }

    /// 检查 Socket 是否已打开
    pub fn is_open(&self, id: usize) -> bool {
        self.get(id).is_some_and(UdpSocket::is_open)
    }

    /// 打开 Socket
    ///
    /// # 参数
    /// - `id`: Socket 编号
    /// - `local_ip`: 本地地址
    /// - `remote_ip`: 远程地址
    /// - `local_port`: 本地端口
    /// - `remote_port`: 远程端口
    ///
    /// # 返回
    /// 编号越界返回 `InvalidArgument`，已打开返回 `AlreadyConnected`
    pub fn open(
        &mut self,
        id: usize,
        local_ip: u32,
        remote_ip: u32,
        local_port: UdpPort,
        remote_port: UdpPort,
    ) -> Result<(), Errno> {
        let sock = self.sockets.get_mut(id).ok_or(Errno::InvalidArgument)?;
        if sock.open {
            return Err(Errno::AlreadyConnected);
        }

        sock.local_ip = local_ip;
        sock.remote_ip = remote_ip;
        sock.local_port = local_port;
        sock.remote_port = remote_port;
        sock.new_data = false;
        sock.rx_len = 0;
        sock.open = true;

        debug!(
            "udp: socket {} open {}:{} <-> {}:{}",
            id,
            IpAddrFmt(local_ip),
            local_port,
            IpAddrFmt(remote_ip),
            remote_port
        );
        Ok(())
    }

    /// 关闭 Socket
    ///
    /// # 说明
    /// 尚未读取的数据直接丢弃
    pub fn close(&mut self, id: usize) -> Result<(), Errno> {
        let sock = self.sockets.get_mut(id).ok_or(Errno::InvalidArgument)?;
        if !sock.open {
            return Err(Errno::NotConnected);
        }

        sock.open = false;
        sock.new_data = false;
        sock.rx_len = 0;
        debug!("udp: socket {} closed", id);
        Ok(())
    }

    /// 发送数据
    ///
    /// # 参数
    /// - `id`: Socket 编号
    /// - `data`: 数据
    /// - `tx`: IPv4 发送通道
    ///
    /// # 返回
    /// 发送缓冲区正被占用时返回 `TryAgain`，数据不会排队，调用者需要重试
    pub fn send(&self, id: usize, data: &[u8], tx: &mut Ipv4Tx) -> Result<(), Errno> {
        let sock = self.sockets.get(id).ok_or(Errno::InvalidArgument)?;
        if !sock.open {
            return Err(Errno::NotConnected);
        }
        if data.len() > UDP_MAX_PAYLOAD {
            return Err(Errno::MessageTooLong);
        }

        let buf = tx.data_buffer().ok_or(Errno::TryAgain)?;
        let len = UDP_HLEN + data.len();

        let hdr = UdpHdr {
            source: sock.local_port,
            dest: sock.remote_port,
            len: len as u16,
            check: 0,
        };
        hdr.write(buf).ok_or(Errno::NoBufferSpace)?;
        buf[UDP_HLEN..len].copy_from_slice(data);

        // 校验和 0 表示未计算，用 0xFFFF 代替
        let check = match transport_checksum(
            sock.local_ip,
            sock.remote_ip,
            IpProtocol::IPPROTO_UDP.to_u8(),
            &buf[..len],
        ) {
            0 => 0xFFFF,
            check => check,
        };
        buf[6..8].copy_from_slice(&check.to_be_bytes());

        #[cfg(feature = "debug_log")]
        trace!("udp: socket {} sends {} bytes to {}:{}", id, data.len(), IpAddrFmt(sock.remote_ip), sock.remote_port);

        tx.send_packet(Ipv4TxDesc::new(
            sock.local_ip,
            sock.remote_ip,
            IpProtocol::IPPROTO_UDP,
            len,
        ))
    }

    /// 处理接收到的 UDP 数据报
    ///
    /// # 参数
    /// - `src`: IP 源地址
    /// - `dst`: IP 目标地址
    /// - `data`: UDP 报文 (头部 + 数据)
    ///
    /// # 说明
    /// 交给第一个匹配的 Socket；没有匹配的 Socket 或数据超过接收缓冲区时丢弃。
    /// 接收方向不验证校验和。
    pub fn unpack(&mut self, src: u32, dst: u32, data: &[u8]) {
        let Some(hdr) = UdpHdr::parse(data) else {
            return;
        };

        let len = hdr.len as usize;
        if len < UDP_HLEN || len > data.len() {
            debug!("udp: bad length {} from {}", len, IpAddrFmt(src));
            return;
        }
        let payload = &data[UDP_HLEN..len];

        let Some((id, sock)) = self
            .sockets
            .iter_mut()
            .enumerate()
            .find(|(_, sock)| sock.matches(src, dst, &hdr))
        else {
            #[cfg(feature = "debug_log")]
            trace!("udp: no socket for {}:{} -> port {}", IpAddrFmt(src), hdr.source, hdr.dest);
            return;
        };

        if payload.len() > UDP_RX_BUF_SIZE {
            warn!("udp: socket {} dropped {} bytes, buffer is {}", id, payload.len(), UDP_RX_BUF_SIZE);
            return;
        }

        sock.rx_buf[..payload.len()].copy_from_slice(payload);
        sock.rx_len = payload.len();
        sock.new_data = true;
    }

    /// 读取接收到的数据
    ///
    /// # 返回
    /// 有新数据时返回数据并清除新数据标志，否则返回 None
    pub fn recv(&mut self, id: usize) -> Option<&[u8]> {
        let sock = self.sockets.get_mut(id)?;
        if !sock.open || !sock.new_data {
            return None;
        }

        sock.new_data = false;
        Some(&sock.rx_buf[..sock.rx_len])
    }
}

impl Default for UdpTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ipv4::ip_addr;

    const OUR_IP: u32 = ip_addr(192, 168, 1, 100);
    const PEER_IP: u32 = ip_addr(192, 168, 1, 1);

    fn datagram(source: u16, dest: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; UDP_HLEN + payload.len()];
        UdpHdr {
            source,
            dest,
            len: buf.len() as u16,
            check: 0,
        }
        .write(&mut buf)
        .unwrap();
        buf[UDP_HLEN..].copy_from_slice(payload);
        buf
    }

    #[test]
    fn test_udphdr_layout() {
        let mut buf = [0u8; UDP_HLEN];
        let hdr = UdpHdr { source: 68, dest: 67, len: 264, check: 0xABCD };
        hdr.write(&mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x44, 0x00, 0x43, 0x01, 0x08, 0xAB, 0xCD]);
        assert_eq!(UdpHdr::parse(&buf), Some(hdr));
        assert!(UdpHdr::parse(&buf[..7]).is_none());
    }

    #[test]
    fn test_open_close() {
        let mut udp = UdpTable::new();
        assert!(!udp.is_open(0));
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();
        assert!(udp.is_open(0));
        assert_eq!(udp.open(0, OUR_IP, PEER_IP, 5000, 6000), Err(Errno::AlreadyConnected));
        assert_eq!(udp.open(UDP_SOCKET_TABLE_SIZE, OUR_IP, PEER_IP, 1, 1), Err(Errno::InvalidArgument));

        udp.close(0).unwrap();
        assert!(!udp.is_open(0));
        assert_eq!(udp.close(0), Err(Errno::NotConnected));
    }

    #[test]
    fn test_demux_by_port() {
        let mut udp = UdpTable::new();
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();
        udp.open(1, OUR_IP, PEER_IP, 5001, 6000).unwrap();

        udp.unpack(PEER_IP, OUR_IP, &datagram(6000, 5001, b"to one"));
        assert!(udp.recv(0).is_none());
        assert_eq!(udp.recv(1), Some(&b"to one"[..]));

        udp.unpack(PEER_IP, OUR_IP, &datagram(6000, 5000, b"to zero"));
        assert_eq!(udp.recv(0), Some(&b"to zero"[..]));
        assert!(udp.recv(1).is_none());

        // 未打开的端口
        udp.unpack(PEER_IP, OUR_IP, &datagram(6000, 7000, b"nobody"));
        assert!(udp.recv(0).is_none());
        assert!(udp.recv(1).is_none());
    }

    #[test]
    fn test_address_wildcards() {
        let mut udp = UdpTable::new();
        udp.open(0, INADDR_ANY, INADDR_BROADCAST, 68, 67).unwrap();
        udp.unpack(ip_addr(10, 0, 0, 1), INADDR_BROADCAST, &datagram(67, 68, b"offer"));
        assert_eq!(udp.recv(0), Some(&b"offer"[..]));

        udp.open(1, OUR_IP, PEER_IP, 5000, 6000).unwrap();
        // 源地址不匹配
        udp.unpack(ip_addr(192, 168, 1, 2), OUR_IP, &datagram(6000, 5000, b"x"));
        // 目标地址不匹配
        udp.unpack(PEER_IP, ip_addr(192, 168, 1, 101), &datagram(6000, 5000, b"x"));
        // 远程端口不匹配
        udp.unpack(PEER_IP, OUR_IP, &datagram(6001, 5000, b"x"));
        assert!(udp.recv(1).is_none());
    }

    #[test]
    fn test_single_buffering() {
        let mut udp = UdpTable::new();
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();

        udp.unpack(PEER_IP, OUR_IP, &datagram(6000, 5000, b"first"));
        udp.unpack(PEER_IP, OUR_IP, &datagram(6000, 5000, b"second"));
        assert_eq!(udp.recv(0), Some(&b"second"[..]));
        assert!(udp.recv(0).is_none());
    }

    #[test]
    fn test_oversized_and_malformed_dropped() {
        let mut udp = UdpTable::new();
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();

        udp.unpack(PEER_IP, OUR_IP, &datagram(6000, 5000, &[0u8; UDP_RX_BUF_SIZE + 1]));
        assert!(udp.recv(0).is_none());

        let mut bad = datagram(6000, 5000, b"abc");
        bad[4..6].copy_from_slice(&100u16.to_be_bytes());
        udp.unpack(PEER_IP, OUR_IP, &bad);
        assert!(udp.recv(0).is_none());

        // 长度字段之后的填充被忽略
        let mut padded = datagram(6000, 5000, b"abc");
        padded.extend_from_slice(&[0u8; 5]);
        udp.unpack(PEER_IP, OUR_IP, &padded);
        assert_eq!(udp.recv(0), Some(&b"abc"[..]));
    }

    #[test]
    fn test_close_discards_data() {
        let mut udp = UdpTable::new();
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();
        udp.unpack(PEER_IP, OUR_IP, &datagram(6000, 5000, b"unread"));
        udp.close(0).unwrap();
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();
        assert!(udp.recv(0).is_none());
    }

    #[test]
    fn test_send_builds_datagram() {
        let mut udp = UdpTable::new();
        let mut tx = Ipv4Tx::new();
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();

        udp.send(0, b"Hello", &mut tx).unwrap();
        assert!(tx.is_busy());

        // 发送缓冲区被占用
        assert_eq!(udp.send(0, b"again", &mut tx), Err(Errno::TryAgain));
    }

    #[test]
    fn test_send_errors() {
        let udp = UdpTable::new();
        let mut tx = Ipv4Tx::new();
        assert_eq!(udp.send(0, b"x", &mut tx), Err(Errno::NotConnected));
        assert_eq!(udp.send(99, b"x", &mut tx), Err(Errno::InvalidArgument));

        let mut udp = UdpTable::new();
        udp.open(0, OUR_IP, PEER_IP, 5000, 6000).unwrap();
        assert_eq!(
            udp.send(0, &[0u8; UDP_MAX_PAYLOAD + 1], &mut tx),
            Err(Errno::MessageTooLong)
        );
        assert!(!tx.is_busy());
    }
}
