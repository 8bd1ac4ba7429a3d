//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! IP 校验和计算
//!
//! 完全遵循 RFC 1071 - Computing the Internet Checksum

/// 按 16 位大端字累加数据
///
/// # 参数
/// - `sum`: 已有的部分和
/// - `data`: 数据，长度为奇数时最后一个字节作为高 8 位补齐
///
/// # 返回
/// 未折叠的 32 位部分和
pub fn csum_partial(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    sum
}

/// 折叠进位并取反
pub fn csum_fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// 计算 IP 校验和
///
/// # 参数
/// - `data`: 数据 (校验和字段需先清零)
///
/// # 返回
/// 校验和 (主机字节序，写入时需转换为大端)
///
/// # 说明
/// 对已经填好校验和的数据再次计算，结果为 0
pub fn ip_checksum(data: &[u8]) -> u16 {
    csum_fold(csum_partial(0, data))
}

/// 验证 IP 校验和
pub fn verify_ip_checksum(data: &[u8]) -> bool {
    ip_checksum(data) == 0
}

/// 计算伪头部部分和 (用于 TCP/UDP)
///
/// # 参数
/// - `src_addr`: 源 IP 地址
/// - `dst_addr`: 目标 IP 地址
/// - `protocol`: 协议号
/// - `len`: TCP/UDP 报文长度 (头部 + 数据)
///
/// # 返回
/// 未折叠的部分和
pub fn pseudo_header_sum(src_addr: u32, dst_addr: u32, protocol: u8, len: u16) -> u32 {
    let mut pseudo_header = [0u8; 12];

    pseudo_header[0..4].copy_from_slice(&src_addr.to_be_bytes());
    pseudo_header[4..8].copy_from_slice(&dst_addr.to_be_bytes());
    // 保留 (1 字节) + 协议 (1 字节)
    pseudo_header[8] = 0;
    pseudo_header[9] = protocol;
    pseudo_header[10..12].copy_from_slice(&len.to_be_bytes());

    csum_partial(0, &pseudo_header)
}

/// 计算带伪头部的传输层校验和
///
/// # 参数
/// - `src_addr`: 源 IP 地址
/// - `dst_addr`: 目标 IP 地址
/// - `protocol`: 协议号
/// - `segment`: 传输层报文 (校验和字段需先清零)
pub fn transport_checksum(src_addr: u32, dst_addr: u32, protocol: u8, segment: &[u8]) -> u16 {
    let sum = pseudo_header_sum(src_addr, dst_addr, protocol, segment.len() as u16);
    csum_fold(csum_partial(sum, segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 1071 示例头部，校验和字段为 0xb861
    const HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11,
        0xb8, 0x61, 0xc0, 0xa8, 0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn test_ip_checksum() {
        let mut header = HEADER;
        header[10] = 0;
        header[11] = 0;
        assert_eq!(ip_checksum(&header), 0xb861);
        assert!(verify_ip_checksum(&HEADER));
    }

    #[test]
    fn test_checksum_round_trip() {
        let mut data = [0u8; 31];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        // 校验和字段放在偏移 2
        data[2] = 0;
        data[3] = 0;
        let csum = ip_checksum(&data);
        data[2..4].copy_from_slice(&csum.to_be_bytes());
        assert_eq!(ip_checksum(&data), 0);
    }

    #[test]
    fn test_odd_length() {
        // 奇数长度时最后一个字节作为高位
        assert_eq!(ip_checksum(&[0x12]), !0x1200);
        assert_eq!(ip_checksum(&[0x12, 0x34, 0x56]), !(0x1234u16 + 0x5600));
    }

    #[test]
    fn test_fold_carry() {
        // 0xFFFF + 0x0001 = 0x10000 -> 折叠为 0x0001 -> 取反 0xFFFE
        assert_eq!(ip_checksum(&[0xFF, 0xFF, 0x00, 0x01]), 0xFFFE);
        assert_eq!(ip_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_transport_checksum() {
        let src = 0xC0A80101; // 192.168.1.1
        let dst = 0xC0A80102; // 192.168.1.2
        let mut segment = [0u8; 13];
        segment[0..2].copy_from_slice(&1234u16.to_be_bytes());
        segment[2..4].copy_from_slice(&80u16.to_be_bytes());
        segment[4..6].copy_from_slice(&13u16.to_be_bytes());
        segment[8..13].copy_from_slice(b"Hello");

        let csum = transport_checksum(src, dst, 17, &segment);
        segment[6..8].copy_from_slice(&csum.to_be_bytes());

        // 带校验和重新计算，结果为 0
        let sum = pseudo_header_sum(src, dst, 17, segment.len() as u16);
        assert_eq!(csum_fold(csum_partial(sum, &segment)), 0);
    }
}
