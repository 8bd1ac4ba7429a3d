//! netstack 配置（自动生成）
//!
//! 此文件由 build.rs 根据 Stack.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 协议栈名称
pub const STACK_NAME: &str = "netstack";

/// 协议栈版本
pub const STACK_VERSION: &str = "0.1.0";

// ============================================================
// 调度配置
// ============================================================

/// 周期任务调度周期 (毫秒)
pub const TASK_PERIOD_MS: u32 = 50;

// ============================================================
// 网络设备配置
// ============================================================

/// 本机 MAC 地址
pub const ETH_MAC_ADDR: [u8; 6] = [0x00, 0x04, 0xA3, 0x00, 0x00, 0x01];

/// 接收环形队列帧数
pub const RX_RING_SIZE: usize = 8;

// ============================================================
// ARP 配置
// ============================================================

/// 本地 IP 地址表大小
pub const ARP_LOCAL_IP_TABLE_SIZE: usize = 4;

/// ARP 缓存大小
pub const ARP_CACHE_SIZE: usize = 8;

// ============================================================
// IPv4 配置
// ============================================================

/// IPv4 MTU (超过时分片)
pub const IP_MTU: usize = 576;

/// IPv4 发送缓冲区大小
pub const IP_TX_BUF_SIZE: usize = 1440;

/// IPv4 重组缓冲区大小
pub const IP_RX_BUF_SIZE: usize = 1480;

/// IPv4 默认 TTL
pub const IP_DEFAULT_TTL: u8 = 255;

/// IPv4 标识计数器初值
pub const IP_IDENT_SEED: u16 = 0x0500;

/// IPv4 选项最大长度
pub const IP_OPTIONS_MAX_LEN: usize = 40;

// ============================================================
// ICMP 配置
// ============================================================

/// 回显请求间隔 (滴答数)
pub const ICMP_ECHO_PERIOD_TICKS: u32 = 10;

/// 回显应答超时 (滴答数)
pub const ICMP_ECHO_TIMEOUT_TICKS: u32 = 40;

/// 回显应答最大拷贝长度
pub const ICMP_REPLY_MAX_LEN: usize = 64;

// ============================================================
// UDP 配置
// ============================================================

/// UDP 套接字表大小
pub const UDP_SOCKET_TABLE_SIZE: usize = 8;

/// UDP 套接字接收缓冲区大小
pub const UDP_RX_BUF_SIZE: usize = 400;

// ============================================================
// DHCP 配置
// ============================================================

/// DHCP 使用的 UDP 套接字索引
pub const DHCP_SOCKET: usize = 2;

/// DHCP 应答超时 (滴答数)
pub const DHCP_TIMEOUT_TICKS: u32 = 140;

/// DISCOVER 中携带的期望 IP 地址
pub const DHCP_DEFAULT_REQUESTED_IP: u32 = 0xC0A80164;
