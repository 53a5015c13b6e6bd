//! 位级缓冲的行为配置。
//!
//! # 设计背景（Why）
//! - 历史线格式对非法位宽、超长字符串一律静默容忍，导出字节时固定多带一个字节；
//!   三处取舍都做成显式开关，默认值与历史线格式一致。
//! - 配置需要能随宿主配置文件一起加载，所以全部类型实现 `serde` 序列化。
//!
//! # 契约说明（What）
//! - [`BitBufferConfig::default`] 与历史线格式完全兼容；
//! - 通过 [`BitBufferConfig::validate`] 的配置才会被 [`BitBufferPool`](crate::BitBufferPool) 接受。

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BitBufError, Result};

/// 非法位宽的处理策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidthPolicy {
    /// 位宽为 0 时写入为空操作、读取返回 0；超过类型自然宽度时钳制到自然宽度。
    #[default]
    Clamp,
    /// 位宽不在 `1..=自然宽度` 时返回 [`BitBufError::InvalidWidth`]。
    Strict,
}

impl WidthPolicy {
    /// 返回策略的稳定字符串，供日志字段使用。
    pub const fn as_str(self) -> &'static str {
        match self {
            WidthPolicy::Clamp => "clamp",
            WidthPolicy::Strict => "strict",
        }
    }
}

impl fmt::Display for WidthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字符串 UTF-8 长度超过 255 字节时的处理策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringPolicy {
    /// 长度前缀按 `len mod 256` 写入，负载字节仍全部写出（历史线格式行为）。
    #[default]
    Truncate,
    /// 返回 [`BitBufError::StringTooLong`]，缓冲保持不变。
    Reject,
}

/// `materialize` 导出的字节长度约定。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeLength {
    /// 导出 `byte_pointer + 1` 个字节（不超过存储长度）。
    ///
    /// 即使游标恰好位于字节边界，也会多带一个尾随字节；依赖精确长度的调用方需要自行处理。
    #[default]
    Padded,
    /// 导出 `ceil(已写位数 / 8)` 个字节。
    Exact,
}

/// 位级缓冲的完整配置。
///
/// # 契约说明（What）
/// - `width_policy` / `string_policy` / `materialize`：见各自枚举说明；
/// - `growth_factor`：扩容系数，新容量为 `floor(len * growth_factor) + 1`，必须为不小于 1 的有限值；
/// - `max_retained`：对象池自由链表最多保留的缓冲外壳数量，超过部分直接丢弃。
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitBufferConfig {
    pub width_policy: WidthPolicy,
    pub string_policy: StringPolicy,
    pub materialize: MaterializeLength,
    pub growth_factor: f32,
    pub max_retained: usize,
}

impl BitBufferConfig {
    /// 默认扩容系数。
    pub const DEFAULT_GROWTH_FACTOR: f32 = 1.5;
    /// 对象池默认保留的外壳数量。
    pub const DEFAULT_MAX_RETAINED: usize = 10;

    /// 与历史线格式兼容的默认配置。
    pub const fn new() -> Self {
        Self {
            width_policy: WidthPolicy::Clamp,
            string_policy: StringPolicy::Truncate,
            materialize: MaterializeLength::Padded,
            growth_factor: Self::DEFAULT_GROWTH_FACTOR,
            max_retained: Self::DEFAULT_MAX_RETAINED,
        }
    }

    /// 拒绝一切非法输入的严格配置，导出长度取精确值。
    pub const fn strict() -> Self {
        Self {
            width_policy: WidthPolicy::Strict,
            string_policy: StringPolicy::Reject,
            materialize: MaterializeLength::Exact,
            growth_factor: Self::DEFAULT_GROWTH_FACTOR,
            max_retained: Self::DEFAULT_MAX_RETAINED,
        }
    }

    pub const fn with_width_policy(mut self, policy: WidthPolicy) -> Self {
        self.width_policy = policy;
        self
    }

    pub const fn with_string_policy(mut self, policy: StringPolicy) -> Self {
        self.string_policy = policy;
        self
    }

    pub const fn with_materialize(mut self, length: MaterializeLength) -> Self {
        self.materialize = length;
        self
    }

    pub const fn with_growth_factor(mut self, factor: f32) -> Self {
        self.growth_factor = factor;
        self
    }

    pub const fn with_max_retained(mut self, max_retained: usize) -> Self {
        self.max_retained = max_retained;
        self
    }

    /// 校验配置取值。
    ///
    /// # 错误
    /// - `growth_factor` 非有限值或小于 1.0 时返回 [`BitBufError::InvalidConfig`]。
    pub fn validate(&self) -> Result<()> {
        if !self.growth_factor.is_finite() {
            return Err(BitBufError::InvalidConfig {
                reason: "growth_factor must be finite",
            });
        }
        if self.growth_factor < 1.0 {
            return Err(BitBufError::InvalidConfig {
                reason: "growth_factor must be at least 1.0",
            });
        }
        Ok(())
    }
}

impl Default for BitBufferConfig {
    fn default() -> Self {
        Self::new()
    }
}
