//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! ICMP 协议 (仅回显)
//!
//! 一个主动发起的回显会话，以及对收到的回显请求的应答
//! 参考: net/ipv4/icmp.c, include/uapi/linux/icmp.h

use log::{debug, info};
#[cfg(feature = "debug_log")]
use log::trace;

use crate::config::{ICMP_ECHO_PERIOD_TICKS, ICMP_ECHO_TIMEOUT_TICKS, ICMP_REPLY_MAX_LEN};
use crate::errno::Errno;
use crate::net::arp::ArpTable;
use crate::net::ipv4::checksum::{ip_checksum, verify_ip_checksum};
use crate::net::ipv4::{IpAddrFmt, Ipv4Tx, Ipv4TxDesc};
use crate::net::proto::IpProtocol;

/// 回显应答
pub const ICMP_ECHOREPLY: u8 = 0;
/// 回显请求
pub const ICMP_ECHO: u8 = 8;

/// ICMP 回显头部长度
pub const ICMP_HLEN: usize = 8;

/// 回显请求的固定载荷
pub const ICMP_ECHO_PAYLOAD: &[u8; 22] = b"MY PING! SEE YOU SOON!";

/// 回显请求总长度
pub const ICMP_ECHO_LEN: usize = ICMP_HLEN + ICMP_ECHO_PAYLOAD.len();

/// ICMP 回显头部
///
/// 对应 Linux 的 icmphdr (include/uapi/linux/icmp.h) 中的 echo 部分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IcmpHdr {
    /// 类型
    pub icmp_type: u8,
    /// 代码
    pub code: u8,
    /// 校验和
    pub checksum: u16,
    /// 标识
    pub id: u16,
    /// 序列号
    pub sequence: u16,
}

impl IcmpHdr {
    /// 从字节切片解析头部
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ICMP_HLEN {
            return None;
        }

        Some(Self {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            id: u16::from_be_bytes([data[4], data[5]]),
            sequence: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// 写入头部
    pub fn write(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.len() < ICMP_HLEN {
            return None;
        }

        buf[0] = self.icmp_type;
        buf[1] = self.code;
        buf[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[4..6].copy_from_slice(&self.id.to_be_bytes());
        buf[6..8].copy_from_slice(&self.sequence.to_be_bytes());
        Some(ICMP_HLEN)
    }
}

/// 计算报文校验和并写入偏移 2
fn icmp_fill_checksum(msg: &mut [u8]) {
    msg[2] = 0;
    msg[3] = 0;
    let check = ip_checksum(msg);
    msg[2..4].copy_from_slice(&check.to_be_bytes());
}

/// 回显会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoState {
    /// 等待发送请求
    Start,
    /// 收到应答，等待下一次请求
    Pending,
    /// 等待应答
    Await,
    /// 空闲
    Idle,
}

/// 回显会话统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoStats {
    /// 已发送请求数
    pub sent: u32,
    /// 超时丢失数
    pub lost: u32,
    /// 无效应答数
    pub invalid: u32,
    /// 有效应答百分比
    pub valid_ratio: u8,
}

/// 主动发起的回显请求
struct EchoRequest {
    src: u32,
    dst: u32,
    id: u16,
    sequence: u16,
    state: EchoState,
    timeout: u32,
    period: u32,
    sent: u32,
    lost: u32,
    invalid: u32,
}

/// 待发送的回显应答
struct EchoReply {
    src: u32,
    dst: u32,
    msg: [u8; ICMP_REPLY_MAX_LEN],
    len: usize,
    pending: bool,
}

/// ICMP 层
pub struct Icmp {
    request: EchoRequest,
    reply: EchoReply,
}

impl Icmp {
    /// 创建 ICMP 层，回显会话空闲
    pub const fn new() -> Self {
        Self {
            request: EchoRequest {
                src: 0,
                dst: 0,
                id: 0,
                sequence: 0,
                state: EchoState::Idle,
                timeout: ICMP_ECHO_TIMEOUT_TICKS,
                period: ICMP_ECHO_PERIOD_TICKS,
                sent: 0,
                lost: 0,
                invalid: 0,
            },
            reply: EchoReply {
                src: 0,
                dst: 0,
                msg: [0; ICMP_REPLY_MAX_LEN],
                len: 0,
                pending: false,
            },
        }
    }

    /// 开始回显会话
    ///
    /// # 参数
    /// - `src`: 本机地址
    /// - `dst`: 目标地址
    ///
    /// # 返回
    /// 会话不处于空闲状态时返回 `InvalidState`
    ///
    /// # 说明
    /// 每次开始新会话时标识加 1，序列号和统计清零
    pub fn start_echo(&mut self, src: u32, dst: u32) -> Result<(), Errno> {
        let req = &mut self.request;
        if req.state != EchoState::Idle {
            return Err(Errno::InvalidState);
        }

        req.src = src;
        req.dst = dst;
        req.id = req.id.wrapping_add(1);
        req.sequence = 0;
        req.timeout = ICMP_ECHO_TIMEOUT_TICKS;
        req.sent = 0;
        req.lost = 0;
        req.invalid = 0;
        req.state = EchoState::Start;

        info!("icmp: ping {} started (id {})", IpAddrFmt(dst), req.id);
        Ok(())
    }

    /// 停止回显会话
    pub fn stop_echo(&mut self) {
        if self.request.state != EchoState::Idle {
            info!("icmp: ping {} stopped", IpAddrFmt(self.request.dst));
        }
        self.request.state = EchoState::Idle;
    }

    /// 回显会话状态
    pub fn echo_state(&self) -> EchoState {
        self.request.state
    }

    /// 回显会话统计
    ///
    /// # 返回
    /// 会话空闲时返回统计，进行中返回 None
    pub fn echo_result(&self) -> Option<EchoStats> {
        let req = &self.request;
        if req.state != EchoState::Idle {
            return None;
        }

        let failed = (req.lost + req.invalid).saturating_mul(100);
        let valid_ratio = match failed.checked_div(req.sent) {
            Some(pct) => 100u32.saturating_sub(pct) as u8,
            None => 0,
        };

        Some(EchoStats {
            sent: req.sent,
            lost: req.lost,
            invalid: req.invalid,
            valid_ratio,
        })
    }

    /// 是否有回显应答等待发送
    pub fn reply_pending(&self) -> bool {
        self.reply.pending
    }

    /// ICMP 周期任务
    ///
    /// 推进回显会话，重发之前因发送缓冲区被占用而延迟的应答
    pub fn periodic(&mut self, tx: &mut Ipv4Tx) {
        let req = &mut self.request;
        match req.state {
            EchoState::Start => {
                if Self::send_request(req, tx) {
                    req.sent += 1;
                    req.timeout = ICMP_ECHO_TIMEOUT_TICKS;
                    req.state = EchoState::Await;
                }
            }
            EchoState::Await => {
                if req.timeout == 0 {
                    req.lost += 1;
                    debug!("icmp: echo seq {} to {} timed out", req.sequence, IpAddrFmt(req.dst));
                    req.state = EchoState::Start;
                } else {
                    req.timeout -= 1;
                }
            }
            EchoState::Pending => {
                if req.period == 0 {
                    req.state = EchoState::Start;
                } else {
                    req.period -= 1;
                }
            }
            EchoState::Idle => {}
        }

        if self.reply.pending && Self::send_reply(&self.reply, tx) {
            self.reply.pending = false;
        }
    }

    /// 处理接收到的 ICMP 报文
    ///
    /// # 参数
    /// - `src`: IP 源地址
    /// - `dst`: IP 目标地址
    /// - `msg`: ICMP 报文
    /// - `arp`: ARP 表，用于确认目标是本机地址
    /// - `tx`: IPv4 发送通道
    pub fn rcv(&mut self, src: u32, dst: u32, msg: &[u8], arp: &ArpTable, tx: &mut Ipv4Tx) {
        if !arp.is_local_ip(dst) {
            return;
        }
        let Some(hdr) = IcmpHdr::parse(msg) else {
            return;
        };
        if !verify_ip_checksum(msg) {
            debug!("icmp: bad checksum from {}", IpAddrFmt(src));
            return;
        }
        if hdr.code != 0 {
            return;
        }

        match hdr.icmp_type {
            ICMP_ECHO => {
                let len = msg.len().min(ICMP_REPLY_MAX_LEN);
                let reply = &mut self.reply;
                reply.src = src;
                reply.dst = dst;
                reply.msg[..len].copy_from_slice(&msg[..len]);
                reply.len = len;

                #[cfg(feature = "debug_log")]
                trace!("icmp: echo request from {} seq {}", IpAddrFmt(src), hdr.sequence);

                reply.pending = !Self::send_reply(reply, tx);
            }
            ICMP_ECHOREPLY => {
                let req = &mut self.request;
                if req.state != EchoState::Await {
                    return;
                }

                if hdr.id == req.id
                    && hdr.sequence == req.sequence
                    && &msg[ICMP_HLEN..] == ICMP_ECHO_PAYLOAD
                {
                    debug!("icmp: echo reply from {} seq {}", IpAddrFmt(src), hdr.sequence);
                    req.timeout = ICMP_ECHO_TIMEOUT_TICKS;
                    req.period = ICMP_ECHO_PERIOD_TICKS;
                    req.state = EchoState::Pending;
                } else {
                    req.invalid += 1;
                    debug!("icmp: unexpected echo reply from {} id {} seq {}", IpAddrFmt(src), hdr.id, hdr.sequence);
                }
            }
            _ => {}
        }
    }

    /// 发送一个回显请求
    ///
    /// # 返回
    /// 发送缓冲区被占用时返回 false
    fn send_request(req: &mut EchoRequest, tx: &mut Ipv4Tx) -> bool {
        let Some(buf) = tx.data_buffer() else {
            return false;
        };

        let sequence = req.sequence.wrapping_add(1);
        let hdr = IcmpHdr {
            icmp_type: ICMP_ECHO,
            code: 0,
            checksum: 0,
            id: req.id,
            sequence,
        };
        if hdr.write(buf).is_none() {
            return false;
        }
        buf[ICMP_HLEN..ICMP_ECHO_LEN].copy_from_slice(ICMP_ECHO_PAYLOAD);
        icmp_fill_checksum(&mut buf[..ICMP_ECHO_LEN]);

        let desc = Ipv4TxDesc::new(req.src, req.dst, IpProtocol::IPPROTO_ICMP, ICMP_ECHO_LEN);
        match tx.send_packet(desc) {
            Ok(()) => {
                req.sequence = sequence;
                true
            }
            Err(_) => false,
        }
    }

    /// 发送回显应答 (请求原样复制，类型改为应答)
    fn send_reply(reply: &EchoReply, tx: &mut Ipv4Tx) -> bool {
        let Some(buf) = tx.data_buffer() else {
            return false;
        };

        let msg = &mut buf[..reply.len];
        msg.copy_from_slice(&reply.msg[..reply.len]);
        msg[0] = ICMP_ECHOREPLY;
        icmp_fill_checksum(msg);

        let desc = Ipv4TxDesc::new(reply.dst, reply.src, IpProtocol::IPPROTO_ICMP, reply.len);
        tx.send_packet(desc).is_ok()
    }
}

impl Default for Icmp {
    fn default() -> Self {
        Self::new()
    }
}
