//! 写访问器。
//!
//! 每个访问器先解析位宽、再按总位数调用一次扩容，最后把值拆成不超过 8 位的块，
//! 低位块在前逐个交给位游标引擎。

use tracing::debug;

use super::{BitBuffer, MAX_STRING_BYTES, PackedInt};
use crate::config::StringPolicy;
use crate::convert::ByteConverter;
use crate::cursor::MAX_CHUNK_BITS;
use crate::error::{BitBufError, Result};

macro_rules! int_writers {
    ($($ty:ty => $write:ident, $write_bits:ident;)*) => {
        $(
            #[doc = concat!("以自然宽度写入 `", stringify!($ty), "`。")]
            #[inline]
            pub fn $write(&mut self, value: $ty) -> Result<()> {
                self.write_int(value, <$ty>::BITS)
            }

            #[doc = concat!("以 `bits` 位写入 `", stringify!($ty), "` 的低位。")]
            #[inline]
            pub fn $write_bits(&mut self, value: $ty, bits: u32) -> Result<()> {
                self.write_int(value, bits)
            }
        )*
    };
}

impl BitBuffer {
    /// 写入 `value` 的低 `bits` 位（`bits` 的合法范围为 `1..=8`）。
    pub fn write_bits(&mut self, value: u8, bits: u32) -> Result<()> {
        self.write_int(value, bits)
    }

    /// 以 `width` 位写入任意定宽整数。
    ///
    /// # 契约说明（What）
    /// - 宽松模式下 `width == 0` 为空操作，超过自然宽度时钳制；严格模式下两者均返回错误；
    /// - 有符号整数按同宽无符号位模式写入；
    /// - 扩容失败时缓冲内容与游标均保持不变。
    pub fn write_int<T: PackedInt>(&mut self, value: T, width: u32) -> Result<()> {
        let width = self.resolve_width(width, T::BITS)?;
        self.ensure_space(width as usize)?;
        let bits = value.to_bits();
        let mut written = 0;
        while written < width {
            let chunk = (width - written).min(MAX_CHUNK_BITS);
            self.cursor.write_bits((bits >> written) as u8, chunk)?;
            written += chunk;
        }
        Ok(())
    }

    int_writers! {
        u8 => write_u8, write_u8_bits;
        i8 => write_i8, write_i8_bits;
        u16 => write_u16, write_u16_bits;
        i16 => write_i16, write_i16_bits;
        u32 => write_u32, write_u32_bits;
        i32 => write_i32, write_i32_bits;
        u64 => write_u64, write_u64_bits;
        i64 => write_i64, write_i64_bits;
    }

    /// 以单个位写入布尔值，`true` 记为 1。
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.ensure_space(1)?;
        self.cursor.write_bits(u8::from(value), 1)
    }

    /// 写入字节块。
    ///
    /// 游标字节对齐时整块拷贝；否则逐字节经位游标写入，两条路径产生的字节完全一致。
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_space(bytes.len() << 3)?;
        if self.cursor.bit_offset() == 0 {
            return self.cursor.put_aligned(bytes);
        }
        for &byte in bytes {
            self.cursor.write_bits(byte, MAX_CHUNK_BITS)?;
        }
        Ok(())
    }

    /// 把另一个缓冲导出的字节（见 [`BitBuffer::materialize`]）作为字节块写入。
    pub fn write_buffer(&mut self, other: &BitBuffer) -> Result<()> {
        self.write_bytes(other.materialized())
    }

    /// 以 4 个平台原生字节写入 `f32`。
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.ensure_space(ByteConverter::FLOAT_BYTES << 3)?;
        for byte in ByteConverter::float_to_bytes(value) {
            self.cursor.write_bits(byte, MAX_CHUNK_BITS)?;
        }
        Ok(())
    }

    /// 以 8 个平台原生字节写入 `f64`。
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.ensure_space(ByteConverter::DOUBLE_BYTES << 3)?;
        for byte in ByteConverter::double_to_bytes(value) {
            self.cursor.write_bits(byte, MAX_CHUNK_BITS)?;
        }
        Ok(())
    }

    /// 写入 `[u8 长度][UTF-8 字节]` 形式的字符串。
    ///
    /// # 契约说明（What）
    /// - UTF-8 长度不超过 255 字节时可精确往返；
    /// - 超过 255 字节时：`StringPolicy::Truncate` 写入 `len mod 256` 作为长度前缀，
    ///   负载字节仍全部写出；`StringPolicy::Reject` 返回 [`BitBufError::StringTooLong`] 且不写入任何内容。
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let len = bytes.len();
        if len > MAX_STRING_BYTES {
            match self.config.string_policy {
                StringPolicy::Reject => return Err(BitBufError::StringTooLong { len }),
                StringPolicy::Truncate => debug!(
                    target: "spark_bitbuf",
                    len,
                    prefix = len as u8,
                    "string length prefix truncated"
                ),
            }
        }
        self.ensure_space((len + 1) << 3)?;
        self.cursor.write_bits(len as u8, MAX_CHUNK_BITS)?;
        self.write_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use crate::{BitBuffer, BitBufferConfig, BitBufError, StringPolicy, WidthPolicy};

    #[test]
    fn multi_byte_integers_are_little_endian_by_chunk() {
        let mut buffer = BitBuffer::with_capacity(8).expect("分配缓冲");
        buffer.write_u32(0x1122_3344).expect("写入 u32");
        assert_eq!(&buffer.as_slice()[..4], &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn strict_mode_rejects_zero_and_oversized_widths() {
        let mut buffer = BitBuffer::with_capacity(8)
            .expect("分配缓冲")
            .with_config(BitBufferConfig::strict())
            .expect("配置合法");
        assert_eq!(
            buffer.write_u16_bits(1, 17),
            Err(BitBufError::InvalidWidth {
                requested: 17,
                max: 16
            })
        );
        assert_eq!(
            buffer.write_bits(1, 0),
            Err(BitBufError::InvalidWidth {
                requested: 0,
                max: 8
            })
        );
        assert_eq!(buffer.bit_position(), 0, "被拒绝的写入不得移动游标");
    }

    #[test]
    fn clamp_mode_caps_width_at_natural_size() {
        let mut buffer = BitBuffer::with_capacity(8).expect("分配缓冲");
        assert_eq!(buffer.config().width_policy, WidthPolicy::Clamp);
        buffer.write_u16_bits(0xBEEF, 40).expect("超宽写入被钳制");
        assert_eq!(buffer.bit_position(), 16);
        buffer.write_u64_bits(7, 0).expect("0 位写入为空操作");
        assert_eq!(buffer.bit_position(), 16);
    }

    #[test]
    fn unaligned_byte_block_goes_through_bit_engine() {
        let mut buffer = BitBuffer::with_capacity(4).expect("分配缓冲");
        buffer.write_bits(0b1, 1).expect("制造非对齐偏移");
        buffer.write_bytes(&[0xFF, 0x00]).expect("非对齐字节块");
        assert_eq!(&buffer.as_slice()[..3], &[0xFF, 0x01, 0x00]);
        assert_eq!(buffer.bit_offset(), 1);
    }

    #[test]
    fn rejected_long_string_leaves_buffer_untouched() {
        let mut buffer = BitBuffer::with_capacity(4)
            .expect("分配缓冲")
            .with_config(BitBufferConfig::new().with_string_policy(StringPolicy::Reject))
            .expect("配置合法");
        let long = "x".repeat(300);
        assert_eq!(
            buffer.write_str(&long),
            Err(BitBufError::StringTooLong { len: 300 })
        );
        assert_eq!(buffer.bit_position(), 0);
    }

    #[test]
    fn small_buffer_grows_before_write() {
        let mut buffer = BitBuffer::with_capacity(0).expect("分配空缓冲");
        buffer.write_u64(u64::MAX).expect("写入触发扩容");
        assert!(buffer.capacity() >= 8);
        assert_eq!(&buffer.as_slice()[..8], &[0xFF; 8]);
    }
}
