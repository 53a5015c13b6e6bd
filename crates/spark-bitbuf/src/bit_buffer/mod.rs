//! 位级缓冲本体。
//!
//! # 模块架构（Why）
//! - [`BitBuffer`] 把位游标引擎、可增长存储与数组池句柄组合在一起，对外提供定宽、变宽整数、
//!   布尔、浮点、字节块与字符串访问器；
//! - 写访问器位于 `write` 子模块，读访问器位于 `read` 子模块，整数位模式桥接位于 `packed`。
//!
//! # 数据流（How）
//! - 每次调用单向流动：类型化访问器 → 位游标原语 → 底层存储；
//! - 扩容只在写访问器入口、实际写入之前触发。

mod packed;
mod read;
mod write;

pub use packed::PackedInt;

use alloc::{sync::Arc, vec::Vec};

use bytes::{BufMut, Bytes};
use tracing::debug;

use crate::config::{BitBufferConfig, MaterializeLength, WidthPolicy};
use crate::cursor::BitCursor;
use crate::error::{BitBufError, Result};
use crate::pool::{ArrayPool, HeapArrayPool};
use crate::storage;

/// 长度前缀字符串可表示的最大 UTF-8 字节数。
pub const MAX_STRING_BYTES: usize = u8::MAX as usize;

/// `BitBuffer` 是以字节数组为后端、可按 1~64 任意位宽读写的序列化缓冲。
///
/// # 设计动机（Why）
/// - 网络负载常常需要把 3 位枚举标签、9 位计数等字段紧凑打包，按字节对齐会浪费大量带宽；
/// - 缓冲实例与底层数组都可经由池复用，稳态编解码无需任何堆分配。
///
/// # 架构关系（How）
/// - `cursor`：唯一持有存储并执行位运算的游标；
/// - `arrays`：扩容与回收时使用的数组池，缓冲析构时存储同样归还给它；
/// - `config`：位宽、字符串长度、导出长度三处宽严策略。
///
/// # 契约说明（What）
/// - **单一所有者**：所有变更都需要 `&mut self`，实例内部没有同步；跨线程转移所有权是安全的，
///   并发读写同一实例则由借用规则直接拒绝；
/// - **读写切换**：写完后调用 [`reset_cursor`](Self::reset_cursor) 即可原地切换为读取，无需拷贝；
/// - **线格式**：字段在字节内按最低位优先拼接，多字节整数按低字节在前，字符串为 `[u8 长度][UTF-8]`，
///   布尔为 1 位，浮点为 4/8 个平台原生字节。
///
/// # 风险与取舍（Trade-offs）
/// - 越过存储末尾的读取返回 [`BitBufError::OutOfBounds`] 而不是读出垃圾数据；
/// - 未经 [`BitBufferPool::recycle`](crate::BitBufferPool::recycle) 直接丢弃的缓冲，
///   其存储仍会在 `Drop` 中归还数组池，只是实例外壳不会被复用。
pub struct BitBuffer {
    cursor: BitCursor,
    arrays: Arc<dyn ArrayPool>,
    config: BitBufferConfig,
}

impl BitBuffer {
    /// 创建不经过对象池、容量为 `size` 字节的独立缓冲。
    pub fn with_capacity(size: usize) -> Result<Self> {
        let arrays = HeapArrayPool::new();
        let storage = arrays.get(size)?;
        Ok(Self::from_parts(
            storage,
            Arc::new(arrays),
            BitBufferConfig::default(),
        ))
    }

    /// 接管 `data` 作为存储的独立缓冲，游标位于起点，适合直接读取。
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::from_parts(data, Arc::new(HeapArrayPool::new()), BitBufferConfig::default())
    }

    /// 以指定存储、数组池与配置组装缓冲。
    pub fn from_parts(
        storage: Vec<u8>,
        arrays: Arc<dyn ArrayPool>,
        config: BitBufferConfig,
    ) -> Self {
        Self {
            cursor: BitCursor::new(storage),
            arrays,
            config,
        }
    }

    /// 替换配置，返回新的缓冲。
    pub fn with_config(mut self, config: BitBufferConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &BitBufferConfig {
        &self.config
    }

    /// 当前字节下标。
    pub fn byte_pointer(&self) -> usize {
        self.cursor.byte_pointer()
    }

    /// 当前字节内的位偏移，`0..=7`。
    pub fn bit_offset(&self) -> u32 {
        self.cursor.bit_offset()
    }

    /// 游标的绝对位位置，即写入模式下已写入的位数。
    pub fn bit_position(&self) -> usize {
        self.cursor.bit_position()
    }

    /// 底层存储的字节长度。
    pub fn capacity(&self) -> usize {
        self.cursor.storage().len()
    }

    /// 游标之后尚可读取（或无需扩容即可写入）的位数。
    pub fn remaining_bits(&self) -> usize {
        self.cursor.capacity_bits() - self.cursor.bit_position()
    }

    /// 底层存储的完整视图（包含未写入的尾部）。
    pub fn as_slice(&self) -> &[u8] {
        self.cursor.storage()
    }

    /// 游标回到起点并重新装载首字节缓存，用于把刚写完的缓冲切换到读取模式。
    pub fn reset_cursor(&mut self) {
        self.cursor.rewind();
    }

    /// 按配置的 [`MaterializeLength`] 导出已写入内容的拷贝。
    ///
    /// 默认的 `Padded` 约定导出 `byte_pointer + 1` 个字节：即使游标恰在字节边界，
    /// 也会带上一个尾随字节。长度不会超过底层存储。
    pub fn materialize(&self) -> Bytes {
        Bytes::copy_from_slice(self.materialized())
    }

    /// 导出恰好 `ceil(bit_position / 8)` 个字节，不受配置影响。
    pub fn materialize_exact(&self) -> Bytes {
        Bytes::copy_from_slice(self.exact_slice())
    }

    /// 把 [`materialize`](Self::materialize) 的内容追加到 `dst`。
    ///
    /// `dst` 的剩余空间不足时行为与 [`BufMut::put_slice`] 一致。
    pub fn materialize_into<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(self.materialized());
    }

    /// 按配置约定返回待导出的字节视图。
    pub(crate) fn materialized(&self) -> &[u8] {
        match self.config.materialize {
            MaterializeLength::Padded => {
                let storage = self.cursor.storage();
                let len = (self.cursor.byte_pointer() + 1).min(storage.len());
                &storage[..len]
            }
            MaterializeLength::Exact => self.exact_slice(),
        }
    }

    fn exact_slice(&self) -> &[u8] {
        let storage = self.cursor.storage();
        let len = self.cursor.bit_position().div_ceil(8).min(storage.len());
        &storage[..len]
    }

    /// 把请求的位宽按配置解析为实际位宽。
    ///
    /// - `Clamp`：超过 `natural` 的位宽钳制为 `natural`，0 原样返回（调用方视为空操作）；
    /// - `Strict`：不在 `1..=natural` 内返回 [`BitBufError::InvalidWidth`]。
    fn resolve_width(&self, requested: u32, natural: u32) -> Result<u32> {
        match self.config.width_policy {
            WidthPolicy::Clamp => {
                if requested > natural {
                    debug!(
                        target: "spark_bitbuf",
                        requested,
                        natural,
                        "bit width clamped"
                    );
                }
                Ok(requested.min(natural))
            }
            WidthPolicy::Strict => {
                if (1..=natural).contains(&requested) {
                    Ok(requested)
                } else {
                    Err(BitBufError::InvalidWidth {
                        requested,
                        max: natural,
                    })
                }
            }
        }
    }

    /// 写入前确保容量，不足时从数组池扩容。
    fn ensure_space(&mut self, additional_bits: usize) -> Result<()> {
        storage::ensure_space(
            &mut self.cursor,
            self.arrays.as_ref(),
            additional_bits,
            self.config.growth_factor,
        )
    }

    /// 由对象池调用：装入新存储、数组池与配置，游标归零。
    pub(crate) fn attach(
        &mut self,
        storage: Vec<u8>,
        arrays: Arc<dyn ArrayPool>,
        config: BitBufferConfig,
    ) {
        self.release_storage();
        self.cursor = BitCursor::new(storage);
        self.arrays = arrays;
        self.config = config;
    }

    /// 把存储归还给数组池并清零游标字段，实例变为空壳。
    pub(crate) fn release_storage(&mut self) {
        let storage = self.cursor.take_storage();
        if storage.capacity() > 0 {
            self.arrays.recycle(storage);
        }
    }
}

impl Default for BitBuffer {
    /// 空壳缓冲：无存储、使用平凡数组池，首次写入时按扩容策略分配。
    fn default() -> Self {
        Self::from_parts(Vec::new(), Arc::new(HeapArrayPool::new()), BitBufferConfig::default())
    }
}

impl Drop for BitBuffer {
    fn drop(&mut self) {
        self.release_storage();
    }
}

impl core::fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BitBuffer")
            .field("byte_pointer", &self.cursor.byte_pointer())
            .field("bit_offset", &self.cursor.bit_offset())
            .field("capacity", &self.capacity())
            .field("config", &self.config)
            .finish()
    }
}
