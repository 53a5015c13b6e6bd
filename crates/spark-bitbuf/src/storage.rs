//! 底层存储的容量管理与摊还扩容。
//!
//! # 设计背景（Why）
//! - 位游标引擎必须保持零分配，因此扩容在每次可能溢出的写入“之前”由访问器层触发，
//!   从不发生在引擎内部。
//! - 新数组一律从数组池租借，旧数组归还数组池，保证整个生命周期不绕过池。
//!
//! # 扩容策略（How）
//! - 新长度为 `floor(len * growth_factor) + 1`，即使从 0 长度起步也至少增长一个字节；
//! - 若单步增长仍放不下待写入的位（例如大块字节写入），按同一公式继续迭代直至放下，
//!   但只在最终长度上做一次分配和一次拷贝。

use tracing::debug;

use crate::cursor::BitCursor;
use crate::error::Result;
use crate::pool::ArrayPool;

/// 迭代步数上限；因子接近 1.0 时步长退化为 1 字节，超过上限后直接取所需长度。
const MAX_GROWTH_STEPS: usize = 64;

/// 计算扩容后的字节长度。
pub(crate) fn grown_len(current_len: usize, required_len: usize, growth_factor: f32) -> usize {
    let mut len = current_len;
    for _ in 0..MAX_GROWTH_STEPS {
        if len >= required_len {
            return len;
        }
        let stepped = ((len as f64) * f64::from(growth_factor)) as usize;
        len = stepped.saturating_add(1);
    }
    len.max(required_len)
}

/// 确保游标之后还能容纳 `additional_bits` 位，不足时通过 `arrays` 扩容。
///
/// # 契约说明（What）
/// - **前置条件**：`growth_factor` 已通过 [`BitBufferConfig::validate`](crate::BitBufferConfig::validate)；
/// - **后置条件**：`cursor.capacity_bits() >= cursor.bit_position() + additional_bits`，
///   原有内容完整保留在新数组的前缀中，游标位置不变；
/// - **错误**：数组池分配失败时原样返回 [`BitBufError::AllocationFailed`](crate::BitBufError::AllocationFailed)，
///   此时游标与旧存储保持不变。
pub(crate) fn ensure_space(
    cursor: &mut BitCursor,
    arrays: &dyn ArrayPool,
    additional_bits: usize,
    growth_factor: f32,
) -> Result<()> {
    let required_bits = cursor.bit_position() + additional_bits;
    if required_bits <= cursor.capacity_bits() {
        return Ok(());
    }

    let old_len = cursor.storage().len();
    let new_len = grown_len(old_len, required_bits.div_ceil(8), growth_factor);
    let mut grown = arrays.get(new_len)?;
    grown[..old_len].copy_from_slice(cursor.storage());
    let previous = cursor.replace_storage(grown);
    arrays.recycle(previous);

    debug!(
        target: "spark_bitbuf",
        old_len,
        new_len,
        pending_bits = additional_bits,
        "bit buffer storage grown"
    );
    Ok(())
}
