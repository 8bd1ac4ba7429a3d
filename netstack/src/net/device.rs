//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 网络设备接口
//!
//! 协议栈与以太网 MAC 驱动之间的边界：
//! - [`NetDevice`]: 发送一帧、取出下一个接收帧、查询本机 MAC
//! - [`FrameRing`]: 中断中入队、任务中出队的接收环形队列
//! - [`MemDevice`]: 基于内存队列的设备，用于主机环境和测试
//!
//! 参考: include/linux/netdevice.h, drivers/net/loopback.c

use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

use crate::config::{ETH_MAC_ADDR, RX_RING_SIZE};
use crate::errno::Errno;
use crate::net::ethernet::{EthHdr, ETH_ALEN, ETH_DATA_LEN, ETH_FRAME_LEN, ETH_HLEN, ETH_ZLEN};
use crate::net::proto::EthProtocol;

/// 网络设备统计信息
///
/// 对应 Linux 的 net_device_stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// 接收包数
    pub rx_packets: u64,
    /// 发送包数
    pub tx_packets: u64,
    /// 接收字节数
    pub rx_bytes: u64,
    /// 发送字节数
    pub tx_bytes: u64,
    /// 接收错误数
    pub rx_errors: u64,
    /// 发送错误数
    pub tx_errors: u64,
    /// 接收丢弃数
    pub rx_dropped: u64,
    /// 发送丢弃数
    pub tx_dropped: u64,
}

/// 以太网设备操作
///
/// 对应 Linux 的 net_device_ops，只保留协议栈需要的部分
pub trait NetDevice {
    /// 本机 MAC 地址
    fn mac_addr(&self) -> [u8; ETH_ALEN];

    /// 发送一帧
    ///
    /// # 参数
    /// - `dst`: 目标 MAC 地址
    /// - `proto`: 以太网协议类型
    /// - `payload`: 帧载荷 (不含以太网头部)
    ///
    /// # 说明
    /// 设备负责添加以太网头部，源地址为本机 MAC
    fn send_frame(&mut self, dst: &[u8; ETH_ALEN], proto: EthProtocol, payload: &[u8]) -> Result<(), Errno>;

    /// 取出下一个接收到的帧
    ///
    /// # 参数
    /// - `buf`: 接收缓冲区，帧从以太网头部开始写入
    ///
    /// # 返回
    /// 帧长度，没有待处理的帧时返回 None
    fn recv_frame(&mut self, buf: &mut [u8]) -> Option<usize>;
}

/// 构造以太网帧
///
/// # 参数
/// - `buf`: 输出缓冲区
/// - `dst`: 目标 MAC 地址
/// - `src`: 源 MAC 地址
/// - `proto`: 协议类型
/// - `payload`: 载荷
///
/// # 返回
/// 帧长度，不足 ETH_ZLEN 的帧用 0 填充
pub fn eth_build_frame(
    buf: &mut [u8],
    dst: &[u8; ETH_ALEN],
    src: &[u8; ETH_ALEN],
    proto: EthProtocol,
    payload: &[u8],
) -> Result<usize, Errno> {
    if payload.len() > ETH_DATA_LEN {
        return Err(Errno::MessageTooLong);
    }

    let len = (ETH_HLEN + payload.len()).max(ETH_ZLEN);
    if buf.len() < len {
        return Err(Errno::NoBufferSpace);
    }

    EthHdr::new(*dst, *src, proto)
        .write(buf)
        .ok_or(Errno::NoBufferSpace)?;
    buf[ETH_HLEN..ETH_HLEN + payload.len()].copy_from_slice(payload);
    buf[ETH_HLEN + payload.len()..len].fill(0);

    Ok(len)
}

struct FrameRingInner {
    frames: [[u8; ETH_FRAME_LEN]; RX_RING_SIZE],
    lens: [usize; RX_RING_SIZE],
    head: usize,
    count: usize,
}

/// 帧环形队列
///
/// 固定 RX_RING_SIZE 个槽位，每个槽位可以容纳一个完整的以太网帧。
/// `push` 可以在中断上下文中调用，`pop` 在周期任务中调用，
/// 两者通过自旋锁互斥。`push` 不等待锁：中断打断了持有锁的 `pop` 时，
/// 该帧被丢弃并计数。丢弃计数器在锁外，无需加锁即可更新。
pub struct FrameRing {
    inner: Mutex<FrameRingInner>,
    dropped: AtomicU32,
}

impl FrameRing {
    /// 创建空队列
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(FrameRingInner {
                frames: [[0; ETH_FRAME_LEN]; RX_RING_SIZE],
                lens: [0; RX_RING_SIZE],
                head: 0,
                count: 0,
            }),
            dropped: AtomicU32::new(0),
        }
    }

    /// 帧入队
    ///
    /// # 返回
    /// 队列已满时丢弃该帧并返回 `Errno::NoBufferSpace`；
    /// 队列正被 `pop` 占用时丢弃该帧并返回 `Errno::TryAgain`
    pub fn push(&self, frame: &[u8]) -> Result<(), Errno> {
        if frame.len() > ETH_FRAME_LEN {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Errno::MessageTooLong);
        }
        let Some(mut ring) = self.inner.try_lock() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Errno::TryAgain);
        };
        if ring.count == RX_RING_SIZE {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Errno::NoBufferSpace);
        }

        let slot = (ring.head + ring.count) % RX_RING_SIZE;
        ring.frames[slot][..frame.len()].copy_from_slice(frame);
        ring.lens[slot] = frame.len();
        ring.count += 1;
        Ok(())
    }

    /// 帧出队
    ///
    /// # 返回
    /// 复制到 `buf` 的字节数，队列为空时返回 None。
    /// `buf` 小于帧长度时帧被截断。
    pub fn pop(&self, buf: &mut [u8]) -> Option<usize> {
        let mut ring = self.inner.lock();

        if ring.count == 0 {
            return None;
        }

        let slot = ring.head;
        let len = ring.lens[slot].min(buf.len());
        buf[..len].copy_from_slice(&ring.frames[slot][..len]);
        ring.head = (ring.head + 1) % RX_RING_SIZE;
        ring.count -= 1;
        Some(len)
    }

    /// 队列中的帧数
    pub fn len(&self) -> usize {
        self.inner.lock().count
    }

    /// 队列是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 因队列满、队列被占用或帧过长而丢弃的帧数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed) as u64
    }
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new()
    }
}

/// 内存网络设备
///
/// 接收方向由 [`MemDevice::inject`] 填充 (相当于 MAC 接收中断)，
/// 发送方向的帧保存在队列中，由 [`MemDevice::take_tx`] 取出。
pub struct MemDevice {
    mac: [u8; ETH_ALEN],
    rx: FrameRing,
    tx: FrameRing,
    stats: DeviceStats,
}

impl MemDevice {
    /// 创建内存设备
    pub fn new(mac: [u8; ETH_ALEN]) -> Self {
        Self {
            mac,
            rx: FrameRing::new(),
            tx: FrameRing::new(),
            stats: DeviceStats::default(),
        }
    }

    /// 注入一个接收帧
    pub fn inject(&self, frame: &[u8]) -> Result<(), Errno> {
        self.rx.push(frame)
    }

    /// 取出一个已发送的帧
    pub fn take_tx(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.tx.pop(buf)
    }

    /// 待取出的已发送帧数
    pub fn tx_len(&self) -> usize {
        self.tx.len()
    }

    /// 获取设备统计信息
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            rx_dropped: self.rx.dropped(),
            ..self.stats
        }
    }
}

impl Default for MemDevice {
    /// 使用配置的 MAC 地址 (Stack.toml 中的 network.mac_addr)
    fn default() -> Self {
        Self::new(ETH_MAC_ADDR)
    }
}

impl NetDevice for MemDevice {
    fn mac_addr(&self) -> [u8; ETH_ALEN] {
        self.mac
    }

    fn send_frame(&mut self, dst: &[u8; ETH_ALEN], proto: EthProtocol, payload: &[u8]) -> Result<(), Errno> {
        let mut frame = [0u8; ETH_FRAME_LEN];
        let len = match eth_build_frame(&mut frame, dst, &self.mac, proto, payload) {
            Ok(len) => len,
            Err(e) => {
                self.stats.tx_errors += 1;
                return Err(e);
            }
        };

        if let Err(e) = self.tx.push(&frame[..len]) {
            self.stats.tx_dropped += 1;
            return Err(e);
        }

        self.stats.tx_packets += 1;
        self.stats.tx_bytes += len as u64;
        Ok(())
    }

    fn recv_frame(&mut self, buf: &mut [u8]) -> Option<usize> {
        let len = self.rx.pop(buf)?;
        self.stats.rx_packets += 1;
        self.stats.rx_bytes += len as u64;
        Some(len)
    }
}
