//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! IPv4 默认路由
//!
//! 协议栈只支持一个默认网关：同一子网内的目标直接投递，
//! 其余目标交给网关。
//! 参考: net/ipv4/route.c

/// 网关信息
///
/// 对应单条默认路由 (网关地址 + 子网掩码)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterInfo {
    /// 网关地址
    pub gateway: u32,
    /// 子网掩码
    pub mask: u32,
}

impl RouterInfo {
    /// 创建网关信息
    pub const fn new(gateway: u32, mask: u32) -> Self {
        Self { gateway, mask }
    }

    /// 检查目标地址是否与网关在同一子网
    ///
    /// 掩码为 0 (未配置) 时所有地址都视为同一子网
    pub fn is_on_link(&self, addr: u32) -> bool {
        (addr & self.mask) == (self.gateway & self.mask)
    }

    /// 计算下一跳地址
    ///
    /// # 参数
    /// - `dst`: 目标 IP 地址
    ///
    /// # 返回
    /// 同一子网返回 `dst` 本身，否则返回网关地址
    pub fn next_hop(&self, dst: u32) -> u32 {
        if self.is_on_link(dst) {
            dst
        } else {
            self.gateway
        }
    }
}
