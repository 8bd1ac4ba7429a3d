//! netstack 构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Stack.toml 配置文件
//! 2. 生成 src/config.rs 配置代码

use std::env;
use std::fs;
use std::path::PathBuf;
use std::collections::HashMap;

/// 解析 build/.config 文件（简单 key=value 格式）
///
/// 键名使用第一个下划线分割为 section 和 key，例如 `ipv4_mtu=576`
fn parse_dot_config(content: &str) -> toml::Value {
    let mut sections: HashMap<String, toml::map::Map<String, toml::Value>> = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // 跳过注释和空行
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');

        let Some((section, config_key)) = key.trim().split_once('_') else {
            continue;
        };

        let parsed_value = if value == "true" {
            toml::Value::Boolean(true)
        } else if value == "false" {
            toml::Value::Boolean(false)
        } else if let Some(hex) = value.strip_prefix("0x") {
            match i64::from_str_radix(hex, 16) {
                Ok(v) => toml::Value::Integer(v),
                Err(_) => toml::Value::String(value.to_string()),
            }
        } else if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else {
            toml::Value::String(value.to_string())
        };

        sections.entry(section.to_string())
            .or_default()
            .insert(config_key.to_string(), parsed_value);
    }

    let mut root_map = toml::map::Map::new();
    for (name, table) in sections {
        root_map.insert(name, toml::Value::Table(table));
    }
    toml::Value::Table(root_map)
}

/// 读取整数配置项，缺省时使用默认值
fn int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config.get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

/// 读取字符串配置项
fn string<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config.get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

/// 解析点分十进制 IPv4 地址为主机字节序 u32
fn parse_ipv4(text: &str) -> u32 {
    let mut octets = [0u32; 4];
    let mut count = 0;
    for (i, part) in text.split('.').enumerate() {
        if i >= 4 {
            panic!("IPv4 地址格式错误: {}", text);
        }
        octets[i] = part.trim().parse::<u8>()
            .unwrap_or_else(|_| panic!("IPv4 地址格式错误: {}", text)) as u32;
        count += 1;
    }
    if count != 4 {
        panic!("IPv4 地址格式错误: {}", text);
    }
    (octets[0] << 24) | (octets[1] << 16) | (octets[2] << 8) | octets[3]
}

/// 读取 MAC 地址（6 个整数组成的数组）
fn mac_addr(config: &toml::Value) -> [u8; 6] {
    let mut mac = [0x00, 0x04, 0xA3, 0x00, 0x00, 0x01];
    if let Some(list) = config.get("network")
        .and_then(|n| n.get("mac_addr"))
        .and_then(|v| v.as_array())
    {
        if list.len() != 6 {
            panic!("network.mac_addr 必须包含 6 个字节");
        }
        for (i, byte) in list.iter().enumerate() {
            mac[i] = byte.as_integer()
                .filter(|b| (0..=255).contains(b))
                .unwrap_or_else(|| panic!("network.mac_addr 第 {} 个字节无效", i)) as u8;
        }
    }
    mac
}

fn main() {
    println!("cargo:rerun-if-changed=../Stack.toml");
    println!("cargo:rerun-if-changed=../build/.config");

    // 优先读取 build/.config，其次 Stack.toml，都不存在时使用默认值
    let config = if let Ok(content) = fs::read_to_string("../build/.config") {
        println!("cargo:warning=Using build/.config configuration");
        parse_dot_config(&content)
    } else if let Ok(content) = fs::read_to_string("../Stack.toml") {
        toml::from_str(&content).expect("Stack.toml 解析失败")
    } else {
        println!("cargo:warning=Stack.toml not found, using defaults");
        toml::Value::Table(toml::map::Map::new())
    };

    generate_config_code(&config);
}

fn generate_config_code(config: &toml::Value) {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR 未设置"));

    let task_period_ms = int(config, "timing", "task_period_ms", 50);
    if task_period_ms <= 0 {
        panic!("timing.task_period_ms 必须大于 0");
    }
    let ticks = |ms: i64| -> i64 { (ms / task_period_ms).max(1) };

    let mac = mac_addr(config);
    let requested_ip = parse_ipv4(string(config, "dhcp", "default_requested_ip", "192.168.1.100"));

    let ip_mtu = int(config, "ipv4", "mtu", 576);
    if ip_mtu < 68 {
        panic!("ipv4.mtu 不能小于 68 (RFC 791)");
    }

    let config_code = format!(
        r#"//! netstack 配置（自动生成）
//!
//! 此文件由 build.rs 根据 Stack.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 协议栈名称
pub const STACK_NAME: &str = "{name}";

/// 协议栈版本
pub const STACK_VERSION: &str = "{version}";

// ============================================================
// 调度配置
// ============================================================

/// 周期任务调度周期 (毫秒)
pub const TASK_PERIOD_MS: u32 = {task_period_ms};

// ============================================================
// 网络设备配置
// ============================================================

/// 本机 MAC 地址
pub const ETH_MAC_ADDR: [u8; 6] = [{mac0:#04X}, {mac1:#04X}, {mac2:#04X}, {mac3:#04X}, {mac4:#04X}, {mac5:#04X}];

/// 接收环形队列帧数
pub const RX_RING_SIZE: usize = {rx_ring_size};

// ============================================================
// ARP 配置
// ============================================================

/// 本地 IP 地址表大小
pub const ARP_LOCAL_IP_TABLE_SIZE: usize = {arp_local};

/// ARP 缓存大小
pub const ARP_CACHE_SIZE: usize = {arp_cache};

// ============================================================
// IPv4 配置
// ============================================================

/// IPv4 MTU (超过时分片)
pub const IP_MTU: usize = {ip_mtu};

/// IPv4 发送缓冲区大小
pub const IP_TX_BUF_SIZE: usize = {ip_tx};

/// IPv4 重组缓冲区大小
pub const IP_RX_BUF_SIZE: usize = {ip_rx};

/// IPv4 默认 TTL
pub const IP_DEFAULT_TTL: u8 = {ttl};

/// IPv4 标识计数器初值
pub const IP_IDENT_SEED: u16 = {ident:#06X};

/// IPv4 选项最大长度
pub const IP_OPTIONS_MAX_LEN: usize = {opt_max};

// ============================================================
// ICMP 配置
// ============================================================

/// 回显请求间隔 (滴答数)
pub const ICMP_ECHO_PERIOD_TICKS: u32 = {echo_period};

/// 回显应答超时 (滴答数)
pub const ICMP_ECHO_TIMEOUT_TICKS: u32 = {echo_timeout};

/// 回显应答最大拷贝长度
pub const ICMP_REPLY_MAX_LEN: usize = {reply_max};

// ============================================================
// UDP 配置
// ============================================================

/// UDP 套接字表大小
pub const UDP_SOCKET_TABLE_SIZE: usize = {udp_sockets};

/// UDP 套接字接收缓冲区大小
pub const UDP_RX_BUF_SIZE: usize = {udp_rx};

// ============================================================
// DHCP 配置
// ============================================================

/// DHCP 使用的 UDP 套接字索引
pub const DHCP_SOCKET: usize = {dhcp_socket};

/// DHCP 应答超时 (滴答数)
pub const DHCP_TIMEOUT_TICKS: u32 = {dhcp_timeout};

/// DISCOVER 中携带的期望 IP 地址
pub const DHCP_DEFAULT_REQUESTED_IP: u32 = {requested_ip:#010X};
"#,
        name = string(config, "general", "name", "netstack"),
        version = string(config, "general", "version", "0.1.0"),
        task_period_ms = task_period_ms,
        mac0 = mac[0], mac1 = mac[1], mac2 = mac[2],
        mac3 = mac[3], mac4 = mac[4], mac5 = mac[5],
        rx_ring_size = int(config, "network", "rx_ring_size", 8).max(1),
        arp_local = int(config, "arp", "local_ip_table_size", 4).max(1),
        arp_cache = int(config, "arp", "cache_size", 8).clamp(1, 255),
        ip_mtu = ip_mtu,
        ip_tx = int(config, "ipv4", "tx_buf_size", 1440),
        ip_rx = int(config, "ipv4", "rx_buf_size", 1480),
        ttl = int(config, "ipv4", "default_ttl", 255).clamp(1, 255),
        ident = int(config, "ipv4", "ident_seed", 0x0500) & 0xFFFF,
        opt_max = int(config, "ipv4", "options_max_len", 40).clamp(4, 40),
        echo_period = ticks(int(config, "icmp", "echo_period_ms", 500)),
        echo_timeout = ticks(int(config, "icmp", "echo_timeout_ms", 2000)),
        reply_max = int(config, "icmp", "reply_max_len", 64).max(8),
        udp_sockets = int(config, "udp", "socket_table_size", 8).max(1),
        udp_rx = int(config, "udp", "rx_buf_size", 400),
        dhcp_socket = int(config, "dhcp", "socket", 2),
        dhcp_timeout = ticks(int(config, "dhcp", "timeout_ms", 7000)),
        requested_ip = requested_ip,
    );

    let udp_sockets = int(config, "udp", "socket_table_size", 8).max(1);
    if int(config, "dhcp", "socket", 2) >= udp_sockets {
        panic!("dhcp.socket 超出 UDP 套接字表范围");
    }

    let config_file = manifest_dir.join("src").join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_code {
        fs::write(&config_file, &config_code)
            .expect("写入配置文件失败");
    }
}
