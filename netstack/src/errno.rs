//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 协议栈错误代码定义
//!
//! 错误码数值与 include/uapi/asm-generic/errno.h 保持一致

/// 协议栈错误代码
///
/// 所有可失败的操作都返回 `Result<T, Errno>`。
/// 接收路径上的畸形数据直接丢弃，不会产生错误码。
///
/// 使用方法：
/// ```rust
/// use netstack::errno::Errno;
///
/// fn send() -> Result<(), Errno> {
///     // 发送缓冲区忙，调用者需要在下一个周期重试
///     Err(Errno::TryAgain)
/// }
///
/// assert_eq!(send().unwrap_err().as_neg_i32(), -11);
/// ```
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// Try again (EAGAIN, 11)
    ///
    /// 发送缓冲区被占用，或者目标地址尚未解析
    TryAgain = 11,

    /// Device or resource busy (EBUSY, 16)
    ///
    /// 状态机当前状态不接受该操作
    InvalidState = 16,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,

    /// Message too long (EMSGSIZE, 90)
    MessageTooLong = 90,

    /// No buffer space available (ENOBUFS, 105)
    NoBufferSpace = 105,

    /// Transport endpoint is already connected (EISCONN, 106)
    AlreadyConnected = 106,

    /// Transport endpoint is not connected (ENOTCONN, 107)
    NotConnected = 107,
}

impl Errno {
    /// 获取错误码数值
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// 获取负数形式的错误码
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }
}

/// 错误码常量
pub mod constants {
    pub const EAGAIN: i32 = 11;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const EMSGSIZE: i32 = 90;
    pub const ENOBUFS: i32 = 105;
    pub const EISCONN: i32 = 106;
    pub const ENOTCONN: i32 = 107;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(Errno::TryAgain.as_i32(), constants::EAGAIN);
        assert_eq!(Errno::InvalidArgument.as_i32(), constants::EINVAL);
        assert_eq!(Errno::AlreadyConnected.as_i32(), constants::EISCONN);
        assert_eq!(Errno::NotConnected.as_i32(), constants::ENOTCONN);
    }

    #[test]
    fn test_errno_negative() {
        assert_eq!(Errno::TryAgain.as_neg_i32(), -11);
        assert_eq!(Errno::MessageTooLong.as_neg_i32(), -90);
        assert_eq!(Errno::NoBufferSpace.as_neg_i32(), -105);
    }
}
