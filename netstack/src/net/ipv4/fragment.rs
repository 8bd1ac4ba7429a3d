//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! IPv4 分片与重组
//!
//! 发送方向按 IP_MTU 切分数据报；接收方向只维护一个重组上下文，
//! 同一时刻只能重组一个数据报。
//! 参考: net/ipv4/ip_fragment.c, net/ipv4/ip_output.c (ip_do_fragment)

use log::{debug, warn};
#[cfg(feature = "debug_log")]
use log::trace;

use super::checksum::verify_ip_checksum;
use super::{
    ip_build_header, Datagram, IpAddrFmt, IpFragFlags, IpHdr, IpOptions, Ipv4TxDesc, IPHDR_LEN,
};
use crate::config::IP_RX_BUF_SIZE;
use crate::errno::Errno;

/// 发送一个数据报，必要时分片
///
/// # 参数
/// - `desc`: 数据报描述符
/// - `payload`: 载荷
/// - `ident`: 数据报标识，所有分片相同
/// - `mtu`: 单个 IP 包的最大长度
/// - `out`: 组包缓冲区，至少能容纳一个完整的包
/// - `emit`: 发送一个组好的 IP 包
///
/// # 返回
/// 发出的包数
///
/// # 说明
/// 设置了 DF 的数据报不分片，整体发出 (DF 标志保留在头部)。
/// 每个分片的数据长度是 8 的倍数 (最后一片除外)。
/// 首片携带全部选项，后续分片只携带复制标志置位的选项。
pub fn ip_fragment<F>(
    desc: &Ipv4TxDesc,
    payload: &[u8],
    ident: u16,
    mtu: usize,
    out: &mut [u8],
    mut emit: F,
) -> Result<usize, Errno>
where
    F: FnMut(&[u8]) -> Result<(), Errno>,
{
    let first_hdr_len = IPHDR_LEN + desc.options.wire_len();

    if desc.dont_fragment || first_hdr_len + payload.len() <= mtu {
        let df = if desc.dont_fragment { IpFragFlags::DF.bits() } else { 0 };
        let hdr_len = ip_build_header(out, desc, &desc.options, payload.len(), ident, df)?;
        out[hdr_len..hdr_len + payload.len()].copy_from_slice(payload);
        emit(&out[..hdr_len + payload.len()])?;
        return Ok(1);
    }

    let rest_options = if desc.options.copied() {
        desc.options
    } else {
        IpOptions::none()
    };

    let mut offset = 0;
    let mut count = 0;
    while offset < payload.len() {
        let options = if offset == 0 { &desc.options } else { &rest_options };
        let hdr_len = IPHDR_LEN + options.wire_len();
        let chunk = (mtu.saturating_sub(hdr_len) / 8) * 8;
        if chunk == 0 {
            return Err(Errno::InvalidArgument);
        }

        let len = chunk.min(payload.len() - offset);
        let more = offset + len < payload.len();
        let mut frag_off = (offset / 8) as u16;
        if more {
            frag_off |= IpFragFlags::MF.bits();
        }

        let hdr_len = ip_build_header(out, desc, options, len, ident, frag_off)?;
        out[hdr_len..hdr_len + len].copy_from_slice(&payload[offset..offset + len]);
        emit(&out[..hdr_len + len])?;

        offset += len;
        count += 1;
    }
    Ok(count)
}

/// 正在重组的数据报
#[derive(Debug, Clone, Copy)]
struct FragContext {
    id: u16,
    src: u32,
    dst: u32,
    protocol: u8,
    options: IpOptions,
    /// 已收到的 8 字节块位图
    blocks: [u32; FRAG_BITMAP_WORDS],
    /// 总长度，收到最后一片后确定
    total: Option<usize>,
}

/// 重组缓冲区的 8 字节块数
const FRAG_BLOCKS: usize = IP_RX_BUF_SIZE.div_ceil(8);
const FRAG_BITMAP_WORDS: usize = FRAG_BLOCKS.div_ceil(32);

impl FragContext {
    fn matches(&self, hdr: &IpHdr) -> bool {
        self.id == hdr.id && self.src == hdr.saddr && self.dst == hdr.daddr && self.protocol == hdr.protocol
    }

    /// 标记 [start, end) 字节覆盖的块，重复或重叠的分片不会重复计数
    fn mark(&mut self, start: usize, end: usize) {
        for block in start / 8..end.div_ceil(8) {
            self.blocks[block / 32] |= 1 << (block % 32);
        }
    }

    /// 总长度已知且之前的每个块都已收到时返回总长度
    fn completed_len(&self) -> Option<usize> {
        let total = self.total?;
        (0..total.div_ceil(8))
            .all(|block| self.blocks[block / 32] & (1 << (block % 32)) != 0)
            .then_some(total)
    }
}

/// 重组上下文
///
/// 上下文在数据报完整时清除。没有超时：最后一片丢失时，
/// 重组一直挂起，之后的其它分片数据报全部丢弃 (不分片的数据报不受影响)。
pub struct Reassembly {
    pending: Option<FragContext>,
    buf: [u8; IP_RX_BUF_SIZE],
}

impl Reassembly {
    /// 创建空的重组上下文
    pub const fn new() -> Self {
        Self {
            pending: None,
            buf: [0; IP_RX_BUF_SIZE],
        }
    }

    /// 是否有数据报正在重组
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 解码一个接收到的 IP 包
    ///
    /// # 参数
    /// - `packet`: IP 包 (不含以太网头部，可能带有以太网填充)
    ///
    /// # 返回
    /// 完整的数据报。包无效、是未完成数据报的分片或被丢弃时返回 None
    pub fn decode<'a>(&'a mut self, packet: &'a [u8]) -> Option<Datagram<'a>> {
        let Some(hdr) = IpHdr::parse(packet) else {
            #[cfg(feature = "debug_log")]
            trace!("ipv4: malformed header dropped");
            return None;
        };

        let hdr_len = hdr.hdr_len();
        if !verify_ip_checksum(&packet[..hdr_len]) {
            debug!("ipv4: bad header checksum from {}", IpAddrFmt(hdr.saddr));
            return None;
        }

        let tot_len = hdr.tot_len as usize;
        if tot_len < hdr_len || tot_len > packet.len() {
            debug!("ipv4: bad total length {} from {}", tot_len, IpAddrFmt(hdr.saddr));
            return None;
        }

        let options = IpOptions::parse(&packet[IPHDR_LEN..hdr_len])?;
        let data = &packet[hdr_len..tot_len];

        let more = hdr.flags().contains(IpFragFlags::MF);
        let offset = hdr.frag_offset() as usize * 8;

        if !more && offset == 0 {
            return Some(Datagram {
                src: hdr.saddr,
                dst: hdr.daddr,
                protocol: hdr.protocol,
                options,
                data,
            });
        }

        match &self.pending {
            Some(ctx) if !ctx.matches(&hdr) => {
                debug!("ipv4: fragment id {:#06x} dropped, reassembly of {:#06x} pending", hdr.id, ctx.id);
                return None;
            }
            Some(_) => {}
            None if offset != 0 => {
                debug!("ipv4: fragment id {:#06x} without first fragment dropped", hdr.id);
                return None;
            }
            None => {
                #[cfg(feature = "debug_log")]
                trace!("ipv4: reassembly of id {:#06x} from {} started", hdr.id, IpAddrFmt(hdr.saddr));
                self.pending = Some(FragContext {
                    id: hdr.id,
                    src: hdr.saddr,
                    dst: hdr.daddr,
                    protocol: hdr.protocol,
                    options,
                    blocks: [0; FRAG_BITMAP_WORDS],
                    total: None,
                });
            }
        }

        let end = offset + data.len();
        if end > self.buf.len() {
            warn!("ipv4: datagram id {:#06x} exceeds reassembly buffer, aborted", hdr.id);
            self.pending = None;
            return None;
        }
        self.buf[offset..end].copy_from_slice(data);

        let ctx = self.pending.as_mut()?;
        ctx.mark(offset, end);
        if !more {
            ctx.total = Some(end);
        }

        let total = ctx.completed_len()?;
        let ctx = self.pending.take()?;

        Some(Datagram {
            src: ctx.src,
            dst: ctx.dst,
            protocol: ctx.protocol,
            options: ctx.options,
            data: &self.buf[..total],
        })
    }
}

impl Default for Reassembly {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IP_MTU;
    use crate::net::ipv4::{ip_addr, IPHDR_MAX_LEN};
    use crate::net::proto::IpProtocol;

    const SRC: u32 = ip_addr(192, 168, 1, 100);
    const DST: u32 = ip_addr(192, 168, 1, 1);

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn fragment(desc: &Ipv4TxDesc, payload: &[u8]) -> Vec<Vec<u8>> {
        let mut out = [0u8; IPHDR_MAX_LEN + 1500];
        let mut packets = Vec::new();
        let count = ip_fragment(desc, payload, 0x0501, IP_MTU, &mut out, |pkt| {
            packets.push(pkt.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(count, packets.len());
        packets
    }

    #[test]
    fn test_no_fragment_when_fits() {
        let payload = pattern(IP_MTU - IPHDR_LEN);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let packets = fragment(&desc, &payload);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), IP_MTU);
        assert_eq!(IpHdr::parse(&packets[0]).unwrap().frag_off, 0);
    }

    #[test]
    fn test_fragment_layout() {
        let payload = pattern(1200);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let packets = fragment(&desc, &payload);

        // (576 - 20) / 8 * 8 = 552
        assert_eq!(packets.len(), 3);
        let hdrs: Vec<IpHdr> = packets.iter().map(|p| IpHdr::parse(p).unwrap()).collect();
        assert_eq!(hdrs[0].tot_len, 572);
        assert_eq!(hdrs[0].frag_off, 0x2000);
        assert_eq!(hdrs[1].frag_off, 0x2000 | 69);
        assert_eq!(hdrs[2].frag_off, 138);
        assert_eq!(hdrs[2].tot_len as usize, IPHDR_LEN + 1200 - 2 * 552);
        assert!(hdrs.iter().all(|h| h.id == 0x0501));
        assert!(packets.iter().all(|p| verify_ip_checksum(&p[..IPHDR_LEN])));
    }

    #[test]
    fn test_dont_fragment_sent_whole() {
        let payload = pattern(1000);
        let mut desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        desc.dont_fragment = true;
        let packets = fragment(&desc, &payload);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), IPHDR_LEN + 1000);
        let hdr = IpHdr::parse(&packets[0]).unwrap();
        assert_eq!(hdr.flags(), IpFragFlags::DF);
    }

    #[test]
    fn test_options_copied_flag() {
        let payload = pattern(1200);

        let mut desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        desc.options = IpOptions::new(0x07, &[4, 0, 0]).unwrap();
        let packets = fragment(&desc, &payload);
        let ihl: Vec<usize> = packets.iter().map(|p| IpHdr::parse(p).unwrap().hdr_len()).collect();
        assert_eq!(ihl[0], 28);
        assert!(ihl[1..].iter().all(|&l| l == IPHDR_LEN));

        desc.options = IpOptions::new(0x87, &[4, 0, 0]).unwrap();
        let packets = fragment(&desc, &payload);
        assert!(packets.iter().all(|p| IpHdr::parse(p).unwrap().hdr_len() == 28));
        // 分片数据长度按实际头部长度计算：(576 - 28) / 8 * 8 = 544
        assert_eq!(IpHdr::parse(&packets[0]).unwrap().tot_len, 28 + 544);
    }

    #[test]
    fn test_reassemble_in_order() {
        let payload = pattern(1200);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let packets = fragment(&desc, &payload);

        let mut rx = Reassembly::new();
        assert!(rx.decode(&packets[0]).is_none());
        assert!(rx.is_pending());
        assert!(rx.decode(&packets[1]).is_none());

        let datagram = rx.decode(&packets[2]).unwrap();
        assert_eq!(datagram.src, SRC);
        assert_eq!(datagram.dst, DST);
        assert_eq!(datagram.protocol, 17);
        assert_eq!(datagram.data, &payload[..]);
        assert!(!rx.is_pending());
    }

    #[test]
    fn test_reassemble_out_of_order() {
        let payload = pattern(1200);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let packets = fragment(&desc, &payload);

        let mut rx = Reassembly::new();
        assert!(rx.decode(&packets[0]).is_none());
        assert!(rx.decode(&packets[2]).is_none());
        let datagram = rx.decode(&packets[1]).unwrap();
        assert_eq!(datagram.data, &payload[..]);
    }

    #[test]
    fn test_duplicate_fragment_not_counted_twice() {
        let payload = pattern(1200);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let packets = fragment(&desc, &payload);

        let mut rx = Reassembly::new();
        assert!(rx.decode(&packets[0]).is_none());
        assert!(rx.decode(&packets[0]).is_none());
        // 中间的分片还没有到达
        assert!(rx.decode(&packets[2]).is_none());
        assert!(rx.is_pending());

        let datagram = rx.decode(&packets[1]).unwrap();
        assert_eq!(datagram.data, &payload[..]);
    }

    #[test]
    fn test_first_fragment_options_kept() {
        let payload = pattern(1200);
        let mut desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        desc.options = IpOptions::new(0x07, &[4, 0, 0]).unwrap();
        let packets = fragment(&desc, &payload);

        let mut rx = Reassembly::new();
        for pkt in &packets[..packets.len() - 1] {
            assert!(rx.decode(pkt).is_none());
        }
        let datagram = rx.decode(&packets[packets.len() - 1]).unwrap();
        assert_eq!(datagram.options.opt_type, 0x07);
        assert_eq!(datagram.data.len(), 1200);
    }

    #[test]
    fn test_fragment_without_context_dropped() {
        let payload = pattern(1200);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let packets = fragment(&desc, &payload);

        let mut rx = Reassembly::new();
        assert!(rx.decode(&packets[1]).is_none());
        assert!(!rx.is_pending());
    }

    #[test]
    fn test_other_datagrams_while_pending() {
        let payload = pattern(1200);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let first = fragment(&desc, &payload);

        let other_desc = Ipv4TxDesc::new(DST, SRC, IpProtocol::IPPROTO_UDP, payload.len());
        let mut out = [0u8; 1500];
        let mut other = Vec::new();
        ip_fragment(&other_desc, &payload, 0x0777, IP_MTU, &mut out, |pkt| {
            other.push(pkt.to_vec());
            Ok(())
        })
        .unwrap();

        let mut rx = Reassembly::new();
        assert!(rx.decode(&first[0]).is_none());

        // 其它数据报的分片被丢弃
        assert!(rx.decode(&other[0]).is_none());

        // 不分片的数据报照常交付
        let small = pattern(10);
        let small_desc = Ipv4TxDesc::new(DST, SRC, IpProtocol::IPPROTO_ICMP, small.len());
        let mut whole = Vec::new();
        ip_fragment(&small_desc, &small, 0x0778, IP_MTU, &mut out, |pkt| {
            whole.push(pkt.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(rx.decode(&whole[0]).unwrap().data, &small[..]);

        assert!(rx.decode(&first[1]).is_none());
        assert_eq!(rx.decode(&first[2]).unwrap().data, &payload[..]);
    }

    #[test]
    fn test_overflow_aborts() {
        let payload = pattern(IP_RX_BUF_SIZE + 100);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let mut out = [0u8; 1500];
        let mut packets = Vec::new();
        ip_fragment(&desc, &payload, 1, IP_MTU, &mut out, |pkt| {
            packets.push(pkt.to_vec());
            Ok(())
        })
        .unwrap();

        let mut rx = Reassembly::new();
        for pkt in &packets {
            assert!(rx.decode(pkt).is_none());
        }
        assert!(!rx.is_pending());
    }

    #[test]
    fn test_decode_rejects() {
        let payload = pattern(10);
        let desc = Ipv4TxDesc::new(SRC, DST, IpProtocol::IPPROTO_UDP, payload.len());
        let mut packet = fragment(&desc, &payload).remove(0);

        let mut rx = Reassembly::new();
        // 以太网填充被忽略
        let mut padded = packet.clone();
        padded.resize(46, 0);
        assert_eq!(rx.decode(&padded).unwrap().data, &payload[..]);

        // 总长度超出
        assert!(rx.decode(&packet[..packet.len() - 1]).is_none());

        // 校验和错误
        packet[8] ^= 0xFF;
        assert!(rx.decode(&packet).is_none());
    }
}
