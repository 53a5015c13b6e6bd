//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为位级缓冲的全部公开操作提供集中的错误语义，调用方可以通过 `?` 直接传播；
//! - 越界读取统一“快速失败”，以显式错误代替读取垃圾数据。
//!
//! ## 设计要求（What）
//! - 所有变体派生 [`thiserror::Error`]，与 `std::error::Error` 生态兼容；
//! - 每个变体都有稳定的 `<领域>.<语义>` 错误码，便于日志检索与聚合。

use alloc::string::FromUtf8Error;

use thiserror::Error;

/// 稳定错误码集合，遵循 `<领域>.<语义>` 命名约定。
pub mod codes {
    /// 位宽超出类型允许的范围（严格模式）。
    pub const INVALID_WIDTH: &str = "bitbuf.invalid_width";
    /// 读取越过底层存储末尾。
    pub const OUT_OF_BOUNDS: &str = "bitbuf.out_of_bounds";
    /// 字符串的 UTF-8 长度超过单字节长度前缀的上限（严格模式）。
    pub const STRING_TOO_LONG: &str = "bitbuf.string_too_long";
    /// 字符串负载不是合法的 UTF-8。
    pub const INVALID_UTF8: &str = "bitbuf.invalid_utf8";
    /// 数组池无法提供所需容量。
    pub const ALLOCATION_FAILED: &str = "bitbuf.allocation_failed";
    /// 配置未通过校验。
    pub const INVALID_CONFIG: &str = "bitbuf.invalid_config";
}

/// 位级缓冲错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把位宽校验、边界检查、分配失败等路径收敛到一个枚举，
///   让编解码调用链只需处理一种错误类型。
/// - **契约 (What)**：
///   - 所有变体均为 `Send + Sync + 'static`，可安全跨线程传播；
///   - 变体只携带定位问题所需的数值上下文，不持有缓冲内容。
/// - **设计权衡 (Trade-offs)**：宽松模式下的位宽钳制、字符串长度截断不会产生错误，
///   只有在 [`WidthPolicy::Strict`](crate::WidthPolicy::Strict) /
///   [`StringPolicy::Reject`](crate::StringPolicy::Reject) 下才会返回对应变体。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BitBufError {
    /// 严格模式下请求的位宽不在 `1..=max` 内。
    #[error("bit width {requested} is outside the supported range 1..={max}")]
    InvalidWidth { requested: u32, max: u32 },

    /// 读写会越过底层存储的末尾。
    ///
    /// - `needed_bits`：本次操作完成后游标所在的绝对位置；
    /// - `available_bits`：底层存储可提供的总位数。
    #[error("cursor would reach bit {needed_bits} but storage only holds {available_bits} bits")]
    OutOfBounds {
        needed_bits: usize,
        available_bits: usize,
    },

    /// 严格模式下字符串的 UTF-8 长度超过 255 字节。
    #[error("string of {len} UTF-8 bytes does not fit a single-byte length prefix")]
    StringTooLong { len: usize },

    /// 读出的字符串负载不是合法 UTF-8。
    #[error("string payload is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    /// 数组池无法为 `requested` 字节分配存储；不会重试。
    #[error("array pool failed to allocate {requested} bytes")]
    AllocationFailed { requested: usize },

    /// 配置校验失败。
    #[error("invalid bit buffer configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

impl BitBufError {
    /// 返回稳定错误码，参见 [`codes`]。
    pub fn code(&self) -> &'static str {
        match self {
            BitBufError::InvalidWidth { .. } => codes::INVALID_WIDTH,
            BitBufError::OutOfBounds { .. } => codes::OUT_OF_BOUNDS,
            BitBufError::StringTooLong { .. } => codes::STRING_TOO_LONG,
            BitBufError::InvalidUtf8 { .. } => codes::INVALID_UTF8,
            BitBufError::AllocationFailed { .. } => codes::ALLOCATION_FAILED,
            BitBufError::InvalidConfig { .. } => codes::INVALID_CONFIG,
        }
    }
}

impl From<FromUtf8Error> for BitBufError {
    fn from(err: FromUtf8Error) -> Self {
        BitBufError::InvalidUtf8 {
            valid_up_to: err.utf8_error().valid_up_to(),
        }
    }
}

/// 位级缓冲操作的结果别名。
pub type Result<T, E = BitBufError> = core::result::Result<T, E>;
