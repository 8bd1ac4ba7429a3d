//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! DHCP 客户端
//!
//! DISCOVER/OFFER/REQUEST/ACK 四步协商，运行在 UDP 68 -> 67 上
//! 参考: RFC 2131 (DHCP), RFC 2132 (DHCP Options), net/ipv4/ipconfig.c

use log::{debug, info, warn};
#[cfg(feature = "debug_log")]
use log::trace;

use crate::config::{DHCP_DEFAULT_REQUESTED_IP, DHCP_SOCKET, DHCP_TIMEOUT_TICKS};
use crate::errno::Errno;
use crate::net::ethernet::ETH_ALEN;
use crate::net::ipv4::{IpAddrFmt, Ipv4Tx, INADDR_ANY, INADDR_BROADCAST};
use crate::net::udp::UdpTable;

/// 服务器端口
pub const DHCP_SERVER_PORT: u16 = 67;
/// 客户端端口
pub const DHCP_CLIENT_PORT: u16 = 68;

/// BOOTP 操作码：请求
pub const BOOTREQUEST: u8 = 1;
/// BOOTP 操作码：应答
pub const BOOTREPLY: u8 = 2;

/// 硬件类型：以太网
pub const DHCP_HTYPE_ETHER: u8 = 1;

/// 魔数
pub const DHCP_MAGIC_COOKIE: u32 = 0x6382_5363;

/// 固定头部中各字段的偏移
pub const DHCP_OP_OFF: usize = 0;
pub const DHCP_HTYPE_OFF: usize = 1;
pub const DHCP_HLEN_OFF: usize = 2;
pub const DHCP_HOPS_OFF: usize = 3;
pub const DHCP_XID_OFF: usize = 4;
pub const DHCP_CIADDR_OFF: usize = 12;
pub const DHCP_YIADDR_OFF: usize = 16;
pub const DHCP_SIADDR_OFF: usize = 20;
pub const DHCP_GIADDR_OFF: usize = 24;
pub const DHCP_CHADDR_OFF: usize = 28;
pub const DHCP_COOKIE_OFF: usize = 236;
pub const DHCP_OPTIONS_OFF: usize = 240;

/// 发送的 DISCOVER/REQUEST 报文长度
pub const DHCP_MSG_LEN: usize = 256;

/// 选项编号
pub const DHCP_OPT_PAD: u8 = 0;
pub const DHCP_OPT_SUBNET_MASK: u8 = 1;
pub const DHCP_OPT_ROUTER: u8 = 3;
pub const DHCP_OPT_DNS_SERVER: u8 = 6;
pub const DHCP_OPT_DOMAIN_NAME: u8 = 15;
pub const DHCP_OPT_BROADCAST: u8 = 28;
pub const DHCP_OPT_REQUESTED_IP: u8 = 50;
pub const DHCP_OPT_LEASE_TIME: u8 = 51;
pub const DHCP_OPT_MSG_TYPE: u8 = 53;
pub const DHCP_OPT_SERVER_ID: u8 = 54;
pub const DHCP_OPT_PARAM_REQUEST: u8 = 55;
pub const DHCP_OPT_RENEWAL_TIME: u8 = 58;
pub const DHCP_OPT_REBINDING_TIME: u8 = 59;
pub const DHCP_OPT_END: u8 = 255;

/// 域名最大长度
pub const DHCP_DOMAIN_NAME_MAX: usize = 32;

/// DHCP 消息类型 (选项 53)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DhcpMsgType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl DhcpMsgType {
    /// 从字节值转换
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            1 => Some(Self::Discover),
            2 => Some(Self::Offer),
            3 => Some(Self::Request),
            4 => Some(Self::Decline),
            5 => Some(Self::Ack),
            6 => Some(Self::Nak),
            7 => Some(Self::Release),
            8 => Some(Self::Inform),
            _ => None,
        }
    }
}

/// 客户端状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpState {
    /// 未初始化
    Deinit,
    /// 已初始化，等待开始协商
    Init,
    /// 发送 DISCOVER
    Discovery,
    /// 发送已准备好的报文 (REQUEST，或 DISCOVER 发送失败后重发)
    Request,
    /// 等待 OFFER 或 ACK/NAK
    WaitTimeout,
    /// 正在关闭
    Close,
}

/// 协商得到的网络参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpNetInfo {
    /// 服务器提供的地址
    pub requested_ip: u32,
    /// 服务器地址
    pub server_ip: u32,
    /// 子网掩码
    pub subnet_mask: u32,
    /// 广播地址
    pub broadcast: u32,
    /// DNS 服务器
    pub dns_server: u32,
    /// 网关
    pub router: u32,
    /// 租期 (秒)
    pub lease_time: u32,
    /// 续租时间 T1 (秒)
    pub renewal_time: u32,
    /// 重绑定时间 T2 (秒)
    pub rebinding_time: u32,
    /// 已发送 REQUEST，等待 ACK/NAK
    pub request_pending: bool,
    domain_name: [u8; DHCP_DOMAIN_NAME_MAX],
    domain_name_len: usize,
}

impl DhcpNetInfo {
    const fn new() -> Self {
        Self {
            requested_ip: INADDR_ANY,
            server_ip: INADDR_ANY,
            subnet_mask: 0,
            broadcast: INADDR_ANY,
            dns_server: INADDR_ANY,
            router: INADDR_ANY,
            lease_time: 0,
            renewal_time: 0,
            rebinding_time: 0,
            request_pending: false,
            domain_name: [0; DHCP_DOMAIN_NAME_MAX],
            domain_name_len: 0,
        }
    }

    /// 域名 (超过 DHCP_DOMAIN_NAME_MAX 的部分被截断)
    pub fn domain_name(&self) -> &[u8] {
        &self.domain_name[..self.domain_name_len]
    }

    /// 记录一个选项，未识别的选项忽略
    fn apply_option(&mut self, code: u8, value: &[u8]) {
        if code == DHCP_OPT_DOMAIN_NAME {
            let len = value.len().min(DHCP_DOMAIN_NAME_MAX);
            self.domain_name[..len].copy_from_slice(&value[..len]);
            self.domain_name_len = len;
            return;
        }

        // 其余识别的选项都取前 4 个字节
        let Some(word) = value.get(..4).map(|v| u32::from_be_bytes([v[0], v[1], v[2], v[3]])) else {
            return;
        };
        match code {
            DHCP_OPT_SUBNET_MASK => self.subnet_mask = word,
            DHCP_OPT_ROUTER => self.router = word,
            DHCP_OPT_DNS_SERVER => self.dns_server = word,
            DHCP_OPT_BROADCAST => self.broadcast = word,
            DHCP_OPT_LEASE_TIME => self.lease_time = word,
            DHCP_OPT_SERVER_ID => self.server_ip = word,
            DHCP_OPT_RENEWAL_TIME => self.renewal_time = word,
            DHCP_OPT_REBINDING_TIME => self.rebinding_time = word,
            _ => {}
        }
    }
}

impl Default for DhcpNetInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// 获得的租约，由协议栈写入 IPv4/ARP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpLease {
    /// 本机地址
    pub ip: u32,
    /// 网关
    pub router: u32,
    /// 子网掩码
    pub subnet_mask: u32,
}

/// DHCP 客户端
pub struct Dhcp {
    state: DhcpState,
    mac: [u8; ETH_ALEN],
    xid: u8,
    timeout: u32,
    info: DhcpNetInfo,
    msg: [u8; DHCP_MSG_LEN],
}

impl Dhcp {
    /// 创建客户端
    ///
    /// # 参数
    /// - `mac`: 本机 MAC 地址，写入 chaddr
    pub const fn new(mac: [u8; ETH_ALEN]) -> Self {
        Self {
            state: DhcpState::Deinit,
            mac,
            xid: 0,
            timeout: DHCP_TIMEOUT_TICKS,
            info: DhcpNetInfo::new(),
            msg: [0; DHCP_MSG_LEN],
        }
    }

    /// 当前状态
    pub fn state(&self) -> DhcpState {
        self.state
    }

    /// 协商得到的网络参数
    pub fn net_info(&self) -> &DhcpNetInfo {
        &self.info
    }

    /// 当前事务 ID
    pub fn xid(&self) -> u32 {
        self.xid as u32
    }

    /// 初始化客户端，打开 UDP Socket (0.0.0.0:68 <-> 255.255.255.255:67)
    ///
    /// # 返回
    /// 不处于 Deinit 状态时返回 `InvalidState`；Socket 打开失败时返回对应错误
    pub fn init(&mut self, udp: &mut UdpTable) -> Result<(), Errno> {
        if self.state != DhcpState::Deinit {
            return Err(Errno::InvalidState);
        }

        udp.open(DHCP_SOCKET, INADDR_ANY, INADDR_BROADCAST, DHCP_CLIENT_PORT, DHCP_SERVER_PORT)?;
        self.state = DhcpState::Init;
        debug!("dhcp: client initialized on socket {}", DHCP_SOCKET);
        Ok(())
    }

    /// 关闭客户端，在下一个周期释放 Socket
    pub fn deinit(&mut self) {
        self.state = DhcpState::Close;
    }

    /// 开始获取地址
    ///
    /// # 返回
    /// 不处于 Init 状态时返回 `InvalidState`
    pub fn start_request(&mut self) -> Result<(), Errno> {
        if self.state != DhcpState::Init {
            return Err(Errno::InvalidState);
        }

        self.state = DhcpState::Discovery;
        info!("dhcp: address request started");
        Ok(())
    }

    /// DHCP 周期任务
    ///
    /// # 返回
    /// 收到 ACK 时返回租约，调用者负责写入 IPv4/ARP
    pub fn periodic(&mut self, udp: &mut UdpTable, tx: &mut Ipv4Tx) -> Option<DhcpLease> {
        match self.state {
            DhcpState::Discovery => {
                self.build_discover();
                self.state = DhcpState::Request;
                self.send(udp, tx);
                None
            }
            DhcpState::Request => {
                self.send(udp, tx);
                None
            }
            DhcpState::WaitTimeout => self.wait(udp),
            DhcpState::Close => {
                match udp.close(DHCP_SOCKET) {
                    // Socket 可能已被应用关闭
                    Ok(()) | Err(Errno::NotConnected) => {}
                    Err(e) => warn!("dhcp: socket {} not closed: {:?}", DHCP_SOCKET, e),
                }
                self.timeout = DHCP_TIMEOUT_TICKS;
                self.info = DhcpNetInfo::new();
                self.state = DhcpState::Deinit;
                debug!("dhcp: client closed");
                None
            }
            DhcpState::Deinit | DhcpState::Init => None,
        }
    }

    /// 发送已准备好的报文，失败时下一个周期重试
    fn send(&mut self, udp: &mut UdpTable, tx: &mut Ipv4Tx) {
        match udp.send(DHCP_SOCKET, &self.msg, tx) {
            Ok(()) => {
                self.timeout = DHCP_TIMEOUT_TICKS;
                self.state = DhcpState::WaitTimeout;
            }
            Err(Errno::TryAgain) => {}
            Err(e) => warn!("dhcp: send failed: {:?}", e),
        }
    }

    /// 等待服务器应答
    fn wait(&mut self, udp: &mut UdpTable) -> Option<DhcpLease> {
        if let Some(data) = udp.recv(DHCP_SOCKET) {
            match self.unpack(data) {
                Some(DhcpMsgType::Offer) => {
                    info!(
                        "dhcp: offer {} from {}",
                        IpAddrFmt(self.info.requested_ip),
                        IpAddrFmt(self.info.server_ip)
                    );
                    self.build_request();
                    self.info.request_pending = true;
                    self.state = DhcpState::Request;
                    return None;
                }
                Some(DhcpMsgType::Ack) => {
                    self.info.request_pending = false;
                    self.state = DhcpState::Init;
                    let lease = DhcpLease {
                        ip: self.info.requested_ip,
                        router: self.info.router,
                        subnet_mask: self.info.subnet_mask,
                    };
                    info!(
                        "dhcp: lease {} router {} mask {}",
                        IpAddrFmt(lease.ip),
                        IpAddrFmt(lease.router),
                        IpAddrFmt(lease.subnet_mask)
                    );
                    return Some(lease);
                }
                Some(DhcpMsgType::Nak) => {
                    warn!("dhcp: request for {} refused", IpAddrFmt(self.info.requested_ip));
                    self.info.request_pending = false;
                    self.state = DhcpState::Init;
                    return None;
                }
                _ => {}
            }
        }

        self.timeout = self.timeout.saturating_sub(1);
        if self.timeout == 0 {
            self.timeout = DHCP_TIMEOUT_TICKS;
            if self.info.request_pending {
                debug!("dhcp: no answer, request resent");
                self.state = DhcpState::Request;
            } else {
                debug!("dhcp: no answer, discovery restarted");
                self.state = DhcpState::Discovery;
            }
        }
        None
    }

    /// 固定头部 (op/htype/hlen/hops/xid/chaddr) 和魔数
    fn build_header(&mut self) {
        let msg = &mut self.msg;
        msg.fill(0);
        msg[DHCP_OP_OFF] = BOOTREQUEST;
        msg[DHCP_HTYPE_OFF] = DHCP_HTYPE_ETHER;
        msg[DHCP_HLEN_OFF] = ETH_ALEN as u8;
        msg[DHCP_HOPS_OFF] = 0;
        msg[DHCP_XID_OFF..DHCP_XID_OFF + 4].copy_from_slice(&(self.xid as u32).to_be_bytes());
        msg[DHCP_CHADDR_OFF..DHCP_CHADDR_OFF + ETH_ALEN].copy_from_slice(&self.mac);
        msg[DHCP_COOKIE_OFF..DHCP_OPTIONS_OFF].copy_from_slice(&DHCP_MAGIC_COOKIE.to_be_bytes());
    }

    /// 准备 DISCOVER，事务 ID 加 1
    fn build_discover(&mut self) {
        self.xid = self.xid.wrapping_add(1);
        self.build_header();

        let [a, b, c, d] = DHCP_DEFAULT_REQUESTED_IP.to_be_bytes();
        let options = [
            DHCP_OPT_MSG_TYPE, 1, DhcpMsgType::Discover as u8,
            DHCP_OPT_REQUESTED_IP, 4, a, b, c, d,
            DHCP_OPT_PARAM_REQUEST, 4,
            DHCP_OPT_SUBNET_MASK, DHCP_OPT_ROUTER, DHCP_OPT_DOMAIN_NAME, DHCP_OPT_DNS_SERVER,
            DHCP_OPT_END,
        ];
        self.msg[DHCP_OPTIONS_OFF..DHCP_OPTIONS_OFF + options.len()].copy_from_slice(&options);

        #[cfg(feature = "debug_log")]
        trace!("dhcp: discover xid {}", self.xid);
    }

    /// 准备 REQUEST，沿用 DISCOVER 的事务 ID
    fn build_request(&mut self) {
        self.build_header();

        let server = self.info.server_ip.to_be_bytes();
        let requested = self.info.requested_ip.to_be_bytes();
        self.msg[DHCP_SIADDR_OFF..DHCP_SIADDR_OFF + 4].copy_from_slice(&server);

        let options = [
            DHCP_OPT_MSG_TYPE, 1, DhcpMsgType::Request as u8,
            DHCP_OPT_REQUESTED_IP, 4, requested[0], requested[1], requested[2], requested[3],
            DHCP_OPT_SERVER_ID, 4, server[0], server[1], server[2], server[3],
            DHCP_OPT_END,
        ];
        self.msg[DHCP_OPTIONS_OFF..DHCP_OPTIONS_OFF + options.len()].copy_from_slice(&options);
    }

    /// 解析服务器应答
    ///
    /// # 返回
    /// 消息类型。操作码、事务 ID、魔数不匹配或选项越界时返回 None，
    /// 此时网络参数不变
    fn unpack(&mut self, data: &[u8]) -> Option<DhcpMsgType> {
        if data.len() < DHCP_OPTIONS_OFF || data[DHCP_OP_OFF] != BOOTREPLY {
            return None;
        }

        let be32 = |off: usize| u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);
        if be32(DHCP_XID_OFF) != self.xid() {
            debug!("dhcp: reply xid {:#x} does not match {:#x}", be32(DHCP_XID_OFF), self.xid());
            return None;
        }
        if be32(DHCP_COOKIE_OFF) != DHCP_MAGIC_COOKIE {
            return None;
        }

        let mut info = self.info;
        info.requested_ip = be32(DHCP_YIADDR_OFF);
        let siaddr = be32(DHCP_SIADDR_OFF);
        let mut has_server_id = false;
        let mut msg_type = None;

        let options = &data[DHCP_OPTIONS_OFF..];
        let mut i = 0;
        while i < options.len() {
            let code = options[i];
            match code {
                DHCP_OPT_PAD => {
                    i += 1;
                    continue;
                }
                DHCP_OPT_END => break,
                _ => {}
            }

            let len = *options.get(i + 1)? as usize;
            let value = options.get(i + 2..i + 2 + len)?;
            match code {
                DHCP_OPT_MSG_TYPE => msg_type = value.first().copied().and_then(DhcpMsgType::from_u8),
                DHCP_OPT_SERVER_ID => has_server_id = value.len() >= 4,
                _ => {}
            }
            info.apply_option(code, value);
            i += 2 + len;
        }

        let msg_type = msg_type?;
        if !has_server_id && siaddr != INADDR_ANY {
            info.server_ip = siaddr;
        }
        if matches!(msg_type, DhcpMsgType::Offer | DhcpMsgType::Ack) {
            self.info = info;
        }
        Some(msg_type)
    }
}
