//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 网络协议栈
//!
//! 各层状态由 [`Stack`] 持有，层与层之间通过参数传递引用。
//! 每个滴答按顺序执行 ARP、IPv4 (先接收后发送)、ICMP、DHCP 的周期任务，
//! 同一滴答内 ARP 学习到的地址对之后的 IPv4 发送立即可见。
//! 参考: net/core/dev.c, net/ipv4/

pub mod arp;
pub mod device;
pub mod dhcp;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod proto;
pub mod udp;


use log::info;
#[cfg(feature = "debug_log")]
use log::trace;

use crate::config::{STACK_NAME, STACK_VERSION, TASK_PERIOD_MS};
use crate::errno::Errno;
use arp::ArpTable;
use device::NetDevice;
use dhcp::{Dhcp, DhcpLease, DhcpNetInfo, DhcpState};
use ethernet::{EthHdr, MacFmt, ETH_FRAME_LEN, ETH_HLEN};
use icmp::{EchoState, EchoStats, Icmp};
use ipv4::{IpAddrFmt, Ipv4Layer, IPHDR_LEN};
use proto::{EthProtocol, IpProtocol};
use udp::{UdpPort, UdpTable};

/// UDP/IP 协议栈
pub struct Stack<D: NetDevice> {
    dev: D,
    frame: [u8; ETH_FRAME_LEN],
    arp: ArpTable,
    ipv4: Ipv4Layer,
    icmp: Icmp,
    udp: UdpTable,
    dhcp: Dhcp,
    ticks: u64,
}

impl<D: NetDevice> Stack<D> {
    /// 在网络设备上创建协议栈
    pub fn new(dev: D) -> Self {
        let mac = dev.mac_addr();
        info!("{} {}: stack on {}", STACK_NAME, STACK_VERSION, MacFmt(&mac));
        Self {
            dev,
            frame: [0; ETH_FRAME_LEN],
            arp: ArpTable::new(),
            ipv4: Ipv4Layer::new(),
            icmp: Icmp::new(),
            udp: UdpTable::new(),
            dhcp: Dhcp::new(mac),
            ticks: 0,
        }
    }

    /// 执行一个滴答
    pub fn poll(&mut self) {
        self.ticks += 1;

        self.arp.periodic();
        self.ipv4_periodic();
        self.icmp.periodic(&mut self.ipv4.tx);

        if let Some(lease) = self.dhcp.periodic(&mut self.udp, &mut self.ipv4.tx) {
            self.apply_lease(lease);
        }
    }

    /// 已执行的滴答数
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 按调度周期换算的运行时间 (毫秒)
    pub fn uptime_ms(&self) -> u64 {
        self.ticks * TASK_PERIOD_MS as u64
    }

    /// 网络设备
    pub fn device(&self) -> &D {
        &self.dev
    }

    /// 网络设备 (可变)
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    /// ARP 表
    pub fn arp(&self) -> &ArpTable {
        &self.arp
    }

    /// 设置本机地址
    pub fn set_local_ip(&mut self, ip: u32) {
        self.ipv4.set_local_ip(&mut self.arp, ip);
    }

    /// 获得的本机地址
    pub fn obtained_ip(&self) -> u32 {
        self.ipv4.obtained_ip()
    }

    /// 设置默认网关
    pub fn set_router_info(&mut self, gateway: u32, mask: u32) {
        self.ipv4.set_router_info(&mut self.arp, gateway, mask);
    }

    /// 打开 UDP Socket
    ///
    /// # 说明
    /// 非 0.0.0.0 的本地地址登记为 ARP 本地地址
    pub fn udp_open(
        &mut self,
        id: usize,
        local_ip: u32,
        remote_ip: u32,
        local_port: UdpPort,
        remote_port: UdpPort,
    ) -> Result<(), Errno> {
        self.udp.open(id, local_ip, remote_ip, local_port, remote_port)?;
        self.arp.set_local_ip(local_ip);
        Ok(())
    }

    /// 关闭 UDP Socket
    pub fn udp_close(&mut self, id: usize) -> Result<(), Errno> {
        self.udp.close(id)
    }

    /// 通过 UDP Socket 发送数据
    pub fn udp_send(&mut self, id: usize, data: &[u8]) -> Result<(), Errno> {
        self.udp.send(id, data, &mut self.ipv4.tx)
    }

    /// 读取 UDP Socket 收到的数据
    pub fn udp_recv(&mut self, id: usize) -> Option<&[u8]> {
        self.udp.recv(id)
    }

    /// 开始回显会话
    pub fn ping_start(&mut self, src: u32, dst: u32) -> Result<(), Errno> {
        self.icmp.start_echo(src, dst)
    }

    /// 停止回显会话
    pub fn ping_stop(&mut self) {
        self.icmp.stop_echo();
    }

    /// 回显会话状态
    pub fn ping_state(&self) -> EchoState {
        self.icmp.echo_state()
    }

    /// 回显会话统计，会话进行中返回 None
    pub fn ping_result(&self) -> Option<EchoStats> {
        self.icmp.echo_result()
    }

    /// 初始化 DHCP 客户端
    pub fn dhcp_init(&mut self) -> Result<(), Errno> {
        self.dhcp.init(&mut self.udp)
    }

    /// 关闭 DHCP 客户端
    pub fn dhcp_deinit(&mut self) {
        self.dhcp.deinit();
    }

    /// 开始获取地址
    pub fn dhcp_start(&mut self) -> Result<(), Errno> {
        self.dhcp.start_request()
    }

    /// DHCP 客户端状态
    pub fn dhcp_state(&self) -> DhcpState {
        self.dhcp.state()
    }

    /// DHCP 协商得到的网络参数
    pub fn dhcp_info(&self) -> &DhcpNetInfo {
        self.dhcp.net_info()
    }

    /// IPv4 周期任务：处理全部已接收的帧，然后发送等待中的数据报
    fn ipv4_periodic(&mut self) {
        while let Some(len) = self.dev.recv_frame(&mut self.frame) {
            self.handle_frame(len);
        }
        self.ipv4.tx.flush(&mut self.arp, &mut self.dev);
    }

    /// 按以太网协议类型分发一帧
    fn handle_frame(&mut self, len: usize) {
        let frame = &self.frame[..len.min(ETH_FRAME_LEN)];
        let Some(eth) = EthHdr::parse(frame) else {
            return;
        };
        if !eth.is_for_us(&self.dev.mac_addr()) {
            return;
        }
        let payload = &frame[ETH_HLEN..];

        match eth.protocol() {
            Some(EthProtocol::ETH_P_ARP) => self.arp.rcv(payload, &mut self.dev),
            Some(EthProtocol::ETH_P_IP) => {
                // 先学习发送方的地址映射
                if payload.len() >= IPHDR_LEN {
                    let src = u32::from_be_bytes([payload[12], payload[13], payload[14], payload[15]]);
                    self.arp.update(src, eth.h_source);
                }

                let Some(datagram) = self.ipv4.rx.decode(payload) else {
                    return;
                };
                match IpProtocol::from_u8(datagram.protocol) {
                    Some(IpProtocol::IPPROTO_UDP) => {
                        self.udp.unpack(datagram.src, datagram.dst, datagram.data);
                    }
                    Some(IpProtocol::IPPROTO_ICMP) => {
                        self.icmp.rcv(datagram.src, datagram.dst, datagram.data, &self.arp, &mut self.ipv4.tx);
                    }
                    _ => {
                        #[cfg(feature = "debug_log")]
                        trace!("ipv4: protocol {} from {} dropped", datagram.protocol, IpAddrFmt(datagram.src));
                    }
                }
            }
            None => {
                #[cfg(feature = "debug_log")]
                trace!("eth: ethertype {:#06x} dropped", eth.h_proto);
            }
        }
    }

    /// 写入 DHCP 租约
    fn apply_lease(&mut self, lease: DhcpLease) {
        self.ipv4.set_local_ip(&mut self.arp, lease.ip);
        self.ipv4.set_router_info(&mut self.arp, lease.router, lease.subnet_mask);
        info!(
            "net: address {} mask {} via {}",
            IpAddrFmt(lease.ip),
            IpAddrFmt(lease.subnet_mask),
            IpAddrFmt(lease.router)
        );
    }
}
