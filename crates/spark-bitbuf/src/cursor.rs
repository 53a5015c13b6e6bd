//! 位游标引擎。
//!
//! # 模块定位（Why）
//! - 整个 crate 中唯一直接做位运算、唯一修改 `byte_pointer` / `bit_offset` / 当前字节缓存的地方；
//!   上层的整数、浮点、字符串访问器都只通过 [`BitCursor::write_bits`] / [`BitCursor::read_bits`]
//!   以及两个按字节对齐的批量路径与存储交互。
//! - 引擎本身从不分配内存：扩容由 `storage` 模块在写入前完成。
//!
//! # 位序约定（What）
//! - 字节内按最低有效位优先：值的第 0 位落在当前 `bit_offset` 上；
//! - 跨字节时低位留在当前字节、高位进入下一字节的低端。

use alloc::vec::Vec;

use crate::error::{BitBufError, Result};

/// 单次位操作支持的最大位宽。
pub const MAX_CHUNK_BITS: u32 = 8;

/// 返回低 `bits` 位全为 1 的掩码，`bits` 取值 `0..=8`。
#[inline(always)]
const fn low_mask(bits: u32) -> u8 {
    ((1u16 << bits) - 1) as u8
}

/// 将位宽钳制到 `1..=8`；0 返回 `None`，表示空操作。
#[inline(always)]
pub const fn clamp_chunk_width(bits: u32) -> Option<u32> {
    match bits {
        0 => None,
        1..=MAX_CHUNK_BITS => Some(bits),
        _ => Some(MAX_CHUNK_BITS),
    }
}

/// 字节数组上的位游标。
///
/// # 契约说明（What）
/// - `bit_offset` 恒在 `0..=7`；写读推进到 8 时归零并前移 `byte_pointer`；
/// - 写入推进到新字节时缓存置 0，新字节从 0 开始组装；读取推进与 `rewind` 时缓存从存储装载，
///   游标位于存储末尾之后时为 0；
/// - 写入保留当前字节中游标之前已写入的低位，目标区间及其之上的位全部重写，
///   因此 `rewind` 后重写与在全新存储上写入得到相同的字节；
/// - 越过存储末尾的读写返回 [`BitBufError::OutOfBounds`]，游标不移动。
#[derive(Debug, Default)]
pub struct BitCursor {
    storage: Vec<u8>,
    byte_pointer: usize,
    bit_offset: u32,
    current: u8,
}

impl BitCursor {
    /// 以给定存储构造游标，游标位于起点。
    pub fn new(storage: Vec<u8>) -> Self {
        let mut cursor = Self {
            storage,
            byte_pointer: 0,
            bit_offset: 0,
            current: 0,
        };
        cursor.reload();
        cursor
    }

    /// 当前正在组装或消费的字节下标。
    #[inline]
    pub fn byte_pointer(&self) -> usize {
        self.byte_pointer
    }

    /// 当前字节内的位偏移，`0..=7`。
    #[inline]
    pub fn bit_offset(&self) -> u32 {
        self.bit_offset
    }

    /// 当前字节缓存。
    #[inline]
    pub fn current_byte(&self) -> u8 {
        self.current
    }

    /// 游标的绝对位位置。
    #[inline]
    pub fn bit_position(&self) -> usize {
        (self.byte_pointer << 3) + self.bit_offset as usize
    }

    /// 存储能容纳的总位数。
    #[inline]
    pub fn capacity_bits(&self) -> usize {
        self.storage.len() << 3
    }

    #[inline]
    pub fn storage(&self) -> &[u8] {
        &self.storage
    }

    /// 回到起点并重新装载首字节缓存。
    pub fn rewind(&mut self) {
        self.byte_pointer = 0;
        self.bit_offset = 0;
        self.reload();
    }

    /// 换入新的存储并返回旧存储，游标位置保持不变。
    ///
    /// 调用方负责保证新存储至少覆盖到当前 `byte_pointer` 之前的全部内容。
    pub(crate) fn replace_storage(&mut self, storage: Vec<u8>) -> Vec<u8> {
        let previous = core::mem::replace(&mut self.storage, storage);
        self.reload();
        previous
    }

    /// 取走存储并把游标字段全部清零。
    pub(crate) fn take_storage(&mut self) -> Vec<u8> {
        let storage = core::mem::take(&mut self.storage);
        self.byte_pointer = 0;
        self.bit_offset = 0;
        self.current = 0;
        storage
    }

    /// 写入 `value` 的低 `bits` 位。
    ///
    /// `bits` 为 0 时为空操作，大于 8 时钳制为 8。
    pub fn write_bits(&mut self, value: u8, bits: u32) -> Result<()> {
        let Some(bits) = clamp_chunk_width(bits) else {
            return Ok(());
        };
        self.check_span(bits as usize)?;

        if self.bit_offset == 0 && bits == MAX_CHUNK_BITS {
            self.storage[self.byte_pointer] = value;
            self.start_fresh_byte();
            return Ok(());
        }

        let free = MAX_CHUNK_BITS - self.bit_offset;
        if bits <= free {
            self.merge(value, bits);
            self.bit_offset += bits;
            if self.bit_offset == MAX_CHUNK_BITS {
                self.start_fresh_byte();
            }
        } else {
            // 低 `free` 位填满当前字节，剩余高位写入以 0 起始的下一字节低端。
            self.merge(value, free);
            self.start_fresh_byte();
            let left = bits - free;
            self.merge(value >> free, left);
            self.bit_offset = left;
        }
        Ok(())
    }

    /// 读取 `bits` 位并放在返回值的低端。
    ///
    /// 位宽钳制规则与 [`write_bits`](Self::write_bits) 对称：0 返回 0 且不移动游标，大于 8 按 8 处理。
    pub fn read_bits(&mut self, bits: u32) -> Result<u8> {
        let Some(bits) = clamp_chunk_width(bits) else {
            return Ok(0);
        };
        self.check_span(bits as usize)?;

        if self.bit_offset == 0 && bits == MAX_CHUNK_BITS {
            let value = self.current;
            self.advance_byte();
            return Ok(value);
        }

        let free = MAX_CHUNK_BITS - self.bit_offset;
        if bits <= free {
            let value = (self.current >> self.bit_offset) & low_mask(bits);
            self.bit_offset += bits;
            if self.bit_offset == MAX_CHUNK_BITS {
                self.advance_byte();
            }
            Ok(value)
        } else {
            let low = self.current >> self.bit_offset;
            self.advance_byte();
            let left = bits - free;
            let high = self.current & low_mask(left);
            self.bit_offset = left;
            Ok(low | (high << free))
        }
    }

    /// 按字节对齐批量写入，要求 `bit_offset == 0`。
    pub(crate) fn put_aligned(&mut self, src: &[u8]) -> Result<()> {
        debug_assert_eq!(self.bit_offset, 0, "批量写入要求字节对齐");
        self.check_span(src.len() << 3)?;
        let start = self.byte_pointer;
        self.storage[start..start + src.len()].copy_from_slice(src);
        self.byte_pointer += src.len();
        self.current = 0;
        Ok(())
    }

    /// 按字节对齐批量读取，要求 `bit_offset == 0`。
    pub(crate) fn take_aligned(&mut self, dst: &mut [u8]) -> Result<()> {
        debug_assert_eq!(self.bit_offset, 0, "批量读取要求字节对齐");
        self.check_span(dst.len() << 3)?;
        let start = self.byte_pointer;
        dst.copy_from_slice(&self.storage[start..start + dst.len()]);
        self.byte_pointer += dst.len();
        self.reload();
        Ok(())
    }

    /// 撤销刚刚完成的一次 8 位读取，`bit_offset` 保持不变。
    pub(crate) fn step_back_byte(&mut self) {
        debug_assert!(self.bit_position() >= 8, "只能回退已消费的整字节");
        self.byte_pointer -= 1;
        self.reload();
    }

    /// 校验从当前游标起 `bits` 位是否落在存储之内。
    pub(crate) fn check_span(&self, bits: usize) -> Result<()> {
        let needed_bits = self.bit_position() + bits;
        let available_bits = self.capacity_bits();
        if needed_bits > available_bits {
            return Err(BitBufError::OutOfBounds {
                needed_bits,
                available_bits,
            });
        }
        Ok(())
    }

    /// 把 `value` 的低 `bits` 位写到当前字节的 `bit_offset` 处并落盘。
    ///
    /// 只保留 `bit_offset` 之下已写入的位，之上的位全部由本次写入决定（目标区间之外为 0）。
    #[inline(always)]
    fn merge(&mut self, value: u8, bits: u32) {
        let written = low_mask(self.bit_offset);
        let region = low_mask(bits) << self.bit_offset;
        self.current = (self.current & written) | ((value << self.bit_offset) & region);
        self.storage[self.byte_pointer] = self.current;
    }

    /// 写入路径的推进：前移到下一字节并以 0 作为新字节的起点。
    #[inline(always)]
    fn start_fresh_byte(&mut self) {
        self.byte_pointer += 1;
        self.bit_offset = 0;
        self.current = 0;
    }

    #[inline(always)]
    fn advance_byte(&mut self) {
        self.byte_pointer += 1;
        self.bit_offset = 0;
        self.reload();
    }

    #[inline(always)]
    fn reload(&mut self) {
        self.current = self.storage.get(self.byte_pointer).copied().unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn assert_cache_consistent(cursor: &BitCursor) {
        let expected = cursor
            .storage()
            .get(cursor.byte_pointer())
            .copied()
            .unwrap_or(0);
        assert_eq!(cursor.current_byte(), expected, "当前字节缓存应与存储一致");
        assert!(cursor.bit_offset() < 8);
    }

    #[test]
    fn bits_are_packed_least_significant_first() {
        let mut cursor = BitCursor::new(vec![0; 2]);
        cursor.write_bits(0b1, 1).expect("写入 1 位");
        cursor.write_bits(0b101, 3).expect("写入 3 位");
        assert_eq!(cursor.storage()[0], 0b1011);
        assert_eq!(cursor.bit_offset(), 4);
        assert_cache_consistent(&cursor);
    }

    #[test]
    fn value_spanning_two_bytes_carries_high_bits() {
        let mut cursor = BitCursor::new(vec![0; 2]);
        cursor.write_bits(0b11_1111, 6).expect("写入 6 位");
        cursor.write_bits(0b1010_0101, 8).expect("跨字节写入");
        assert_eq!(cursor.storage(), &[0b0111_1111, 0b0010_1001]);
        assert_eq!(cursor.byte_pointer(), 1);
        assert_eq!(cursor.bit_offset(), 6);
        assert_cache_consistent(&cursor);

        cursor.rewind();
        assert_eq!(cursor.read_bits(6).expect("读取 6 位"), 0b11_1111);
        assert_eq!(cursor.read_bits(8).expect("跨字节读取"), 0b1010_0101);
        assert_cache_consistent(&cursor);
    }

    #[test]
    fn filling_a_byte_exactly_rolls_to_next_byte() {
        let mut cursor = BitCursor::new(vec![0; 2]);
        cursor.write_bits(0b111, 3).expect("写入 3 位");
        cursor.write_bits(0b10101, 5).expect("补满当前字节");
        assert_eq!(cursor.byte_pointer(), 1);
        assert_eq!(cursor.bit_offset(), 0);
        assert_cache_consistent(&cursor);
    }

    #[test]
    fn aligned_full_byte_takes_fast_path() {
        let mut cursor = BitCursor::new(vec![0; 1]);
        cursor.write_bits(0xAB, 8).expect("整字节写入");
        assert_eq!(cursor.storage(), &[0xAB]);
        assert_eq!(cursor.byte_pointer(), 1);
        assert_eq!(cursor.current_byte(), 0, "越过末尾后缓存为 0");
    }

    #[test]
    fn widths_clamp_symmetrically() {
        let mut cursor = BitCursor::new(vec![0; 2]);
        cursor.write_bits(0xFF, 0).expect("0 位写入为空操作");
        assert_eq!(cursor.bit_position(), 0);
        cursor.write_bits(0x5A, 12).expect("超宽写入钳制为 8 位");
        assert_eq!(cursor.bit_position(), 8);

        cursor.rewind();
        assert_eq!(cursor.read_bits(0).expect("0 位读取"), 0);
        assert_eq!(cursor.bit_position(), 0);
        assert_eq!(cursor.read_bits(40).expect("超宽读取钳制为 8 位"), 0x5A);
        assert_eq!(cursor.bit_position(), 8);
    }

    #[test]
    fn writes_over_stale_storage_start_new_bytes_from_zero() {
        let mut cursor = BitCursor::new(vec![0xFF; 3]);
        cursor.write_bits(0b101, 3).expect("写入低 3 位");
        assert_eq!(cursor.storage()[0], 0b0000_0101, "游标之上的旧位应被清除");
        cursor.write_bits(0x00, 7).expect("跨字节写入");
        assert_eq!(cursor.storage(), &[0b0000_0101, 0b0000_0000, 0xFF]);
        assert_eq!(cursor.current_byte(), 0);
    }

    #[test]
    fn rewrite_after_rewind_matches_fresh_write() {
        let mut cursor = BitCursor::new(vec![0; 2]);
        cursor.write_bits(0xFF, 8).expect("写满字节 0");
        cursor.write_bits(0xFF, 8).expect("写满字节 1");
        cursor.rewind();
        cursor.write_bits(0, 4).expect("重写 4 位");
        cursor.write_bits(0, 8).expect("跨字节重写");
        assert_eq!(cursor.storage(), &[0x00, 0x00]);
        assert_eq!(cursor.bit_offset(), 4);
    }

    #[test]
    fn value_bits_above_width_are_ignored() {
        let mut cursor = BitCursor::new(vec![0; 1]);
        cursor.write_bits(0xFF, 3).expect("只写入低 3 位");
        assert_eq!(cursor.storage()[0], 0b0000_0111);
    }

    #[test]
    fn reads_past_storage_fail_without_moving() {
        let mut cursor = BitCursor::new(vec![0x0F]);
        cursor.read_bits(5).expect("读取 5 位");
        let err = cursor.read_bits(4).expect_err("越界读取应失败");
        assert_eq!(
            err,
            BitBufError::OutOfBounds {
                needed_bits: 9,
                available_bits: 8
            }
        );
        assert_eq!(cursor.bit_position(), 5);
        assert!(cursor.write_bits(0, 4).is_err(), "越界写入同样失败");
    }

    #[test]
    fn empty_storage_has_zero_cache() {
        let mut cursor = BitCursor::new(vec![]);
        assert_eq!(cursor.current_byte(), 0);
        assert!(cursor.read_bits(1).is_err());
        cursor.rewind();
        assert_eq!(cursor.capacity_bits(), 0);
    }

    #[test]
    fn take_storage_zeroes_cursor_fields() {
        let mut cursor = BitCursor::new(vec![1, 2, 3]);
        cursor.read_bits(8).expect("读取首字节");
        cursor.read_bits(3).expect("读取 3 位");
        let storage = cursor.take_storage();
        assert_eq!(storage, vec![1, 2, 3]);
        assert_eq!(cursor.byte_pointer(), 0);
        assert_eq!(cursor.bit_offset(), 0);
        assert_eq!(cursor.current_byte(), 0);
        assert!(cursor.storage().is_empty());
    }
}
