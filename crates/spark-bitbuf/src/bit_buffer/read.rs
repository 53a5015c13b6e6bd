//! 读访问器。
//!
//! 读取前先校验整段位区间是否在存储之内；校验失败时游标不移动，
//! 多块读取不会在中途留下半个值。

use alloc::{string::String, vec, vec::Vec};

use super::{BitBuffer, PackedInt};
use crate::convert::ByteConverter;
use crate::cursor::MAX_CHUNK_BITS;
use crate::error::Result;

macro_rules! int_readers {
    ($($ty:ty => $read:ident, $read_bits:ident;)*) => {
        $(
            #[doc = concat!("以自然宽度读取 `", stringify!($ty), "`。")]
            #[inline]
            pub fn $read(&mut self) -> Result<$ty> {
                self.read_int(<$ty>::BITS)
            }

            #[doc = concat!("读取 `bits` 位并转换为 `", stringify!($ty), "`，不做符号扩展。")]
            #[inline]
            pub fn $read_bits(&mut self, bits: u32) -> Result<$ty> {
                self.read_int(bits)
            }
        )*
    };
}

impl BitBuffer {
    /// 读取 `bits` 位（`1..=8`）并放在返回值的低端。
    pub fn read_bits(&mut self, bits: u32) -> Result<u8> {
        self.read_int(bits)
    }

    /// 以 `width` 位读取任意定宽整数。
    ///
    /// # 契约说明（What）
    /// - 位宽解析规则与 [`write_int`](Self::write_int) 相同；宽松模式下 0 位读取返回 0；
    /// - 读出的低 `width` 位按块拼接（低位块在前），高位补 0，有符号类型不做符号扩展；
    /// - 越界时返回 [`BitBufError::OutOfBounds`](crate::BitBufError::OutOfBounds)，游标不变。
    pub fn read_int<T: PackedInt>(&mut self, width: u32) -> Result<T> {
        let width = self.resolve_width(width, T::BITS)?;
        self.cursor.check_span(width as usize)?;
        let mut bits = 0u64;
        let mut read = 0;
        while read < width {
            let chunk = (width - read).min(MAX_CHUNK_BITS);
            bits |= u64::from(self.cursor.read_bits(chunk)?) << read;
            read += chunk;
        }
        Ok(T::from_bits(bits))
    }

    int_readers! {
        u8 => read_u8, read_u8_bits;
        i8 => read_i8, read_i8_bits;
        u16 => read_u16, read_u16_bits;
        i16 => read_i16, read_i16_bits;
        u32 => read_u32, read_u32_bits;
        i32 => read_i32, read_i32_bits;
        u64 => read_u64, read_u64_bits;
        i64 => read_i64, read_i64_bits;
    }

    /// 读取 1 位，非零即为 `true`。
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.cursor.read_bits(1)? == 1)
    }

    /// 读取 `dst.len()` 个字节填满 `dst`。
    ///
    /// 对齐时整块拷贝，否则逐字节经位游标读取。
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        self.cursor.check_span(dst.len() << 3)?;
        if self.cursor.bit_offset() == 0 {
            return self.cursor.take_aligned(dst);
        }
        for byte in dst.iter_mut() {
            *byte = self.cursor.read_bits(MAX_CHUNK_BITS)?;
        }
        Ok(())
    }

    /// 读取 `len` 个字节到新分配的数组。
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.cursor.check_span(len.saturating_mul(8))?;
        let mut out = vec![0u8; len];
        self.read_into(&mut out)?;
        Ok(out)
    }

    /// 读取 4 个平台原生字节并还原为 `f32`，位模式精确保留。
    pub fn read_f32(&mut self) -> Result<f32> {
        let mut raw = [0u8; ByteConverter::FLOAT_BYTES];
        self.read_into(&mut raw)?;
        Ok(ByteConverter::bytes_to_float(raw))
    }

    /// 读取 8 个平台原生字节并还原为 `f64`，位模式精确保留。
    pub fn read_f64(&mut self) -> Result<f64> {
        let mut raw = [0u8; ByteConverter::DOUBLE_BYTES];
        self.read_into(&mut raw)?;
        Ok(ByteConverter::bytes_to_double(raw))
    }

    /// 读取 `[u8 长度][UTF-8 字节]` 形式的字符串。
    ///
    /// 负载不是合法 UTF-8 时返回 [`BitBufError::InvalidUtf8`](crate::BitBufError::InvalidUtf8)，
    /// 此时长度与负载已被消费。
    pub fn read_string(&mut self) -> Result<String> {
        let len = usize::from(self.cursor.read_bits(MAX_CHUNK_BITS)?);
        if let Err(err) = self.cursor.check_span(len << 3) {
            // 负载不足时连同长度前缀一并回退。
            self.cursor.step_back_byte();
            return Err(err);
        }
        let payload = self.read_bytes(len)?;
        Ok(String::from_utf8(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{BitBufError, BitBuffer, BitBufferConfig, WidthPolicy};
    use alloc::vec;

    #[test]
    fn mixed_width_fields_roundtrip() {
        let mut buffer = BitBuffer::with_capacity(4).expect("分配缓冲");
        buffer.write_u32_bits(300, 9).expect("写入 9 位");
        buffer.write_bool(true).expect("写入布尔");
        buffer.write_u8_bits(7, 3).expect("写入 3 位");
        assert_eq!(buffer.bit_position(), 13);

        buffer.reset_cursor();
        assert_eq!(buffer.read_u32_bits(9).expect("读取 9 位"), 300);
        assert!(buffer.read_bool().expect("读取布尔"));
        assert_eq!(buffer.read_u8_bits(3).expect("读取 3 位"), 7);
    }

    #[test]
    fn signed_values_do_not_sign_extend_when_narrowed() {
        let mut buffer = BitBuffer::with_capacity(2).expect("分配缓冲");
        buffer.write_i8_bits(-1, 4).expect("写入 4 位");
        buffer.reset_cursor();
        assert_eq!(buffer.read_i8_bits(4).expect("读取 4 位"), 0x0F);

        buffer.reset_cursor();
        buffer.write_i16(-2).expect("写入 i16");
        buffer.reset_cursor();
        assert_eq!(buffer.read_i16().expect("自然宽度读取"), -2);
    }

    #[test]
    fn failed_multi_chunk_read_leaves_cursor_in_place() {
        let mut buffer = BitBuffer::from_vec(vec![0xFF, 0xFF]);
        buffer.read_bits(3).expect("读取 3 位");
        let err = buffer.read_u16().expect_err("剩余 13 位不足 16 位");
        assert_eq!(
            err,
            BitBufError::OutOfBounds {
                needed_bits: 19,
                available_bits: 16
            }
        );
        assert_eq!(buffer.bit_position(), 3);
    }

    #[test]
    fn strict_mode_rejects_zero_width_read() {
        let mut buffer = BitBuffer::from_vec(vec![0; 8])
            .with_config(BitBufferConfig::new().with_width_policy(WidthPolicy::Strict))
            .expect("配置合法");
        assert!(matches!(
            buffer.read_u64_bits(0),
            Err(BitBufError::InvalidWidth { requested: 0, max: 64 })
        ));
        assert_eq!(buffer.read_u64_bits(64).expect("满宽读取"), 0);
    }

    #[test]
    fn unaligned_bytes_and_floats_roundtrip() {
        let mut buffer = BitBuffer::with_capacity(0).expect("分配空缓冲");
        buffer.write_bits(0b11, 2).expect("制造非对齐偏移");
        buffer.write_f32(-0.0).expect("写入 f32");
        buffer.write_f64(f64::MIN_POSITIVE).expect("写入 f64");
        buffer.write_bytes(b"spark").expect("写入字节块");

        buffer.reset_cursor();
        assert_eq!(buffer.read_bits(2).expect("读取前缀"), 0b11);
        assert_eq!(buffer.read_f32().expect("读取 f32").to_bits(), (-0.0f32).to_bits());
        assert_eq!(buffer.read_f64().expect("读取 f64"), f64::MIN_POSITIVE);
        assert_eq!(buffer.read_bytes(5).expect("读取字节块"), b"spark".to_vec());
    }

    #[test]
    fn string_roundtrip_and_boundaries() {
        let mut buffer = BitBuffer::with_capacity(1).expect("分配缓冲");
        buffer.write_str("").expect("空串");
        buffer.write_str("héllo").expect("多字节字符");
        let max = "a".repeat(255);
        buffer.write_str(&max).expect("255 字节");

        buffer.reset_cursor();
        assert_eq!(buffer.read_string().expect("读取空串"), "");
        assert_eq!(buffer.read_string().expect("读取多字节字符"), "héllo");
        assert_eq!(buffer.read_string().expect("读取 255 字节"), max);
    }

    #[test]
    fn truncated_string_prefix_wraps_length() {
        let mut buffer = BitBuffer::with_capacity(0).expect("分配空缓冲");
        let long = "b".repeat(256);
        buffer.write_str(&long).expect("宽松模式写出全部负载");
        assert_eq!(buffer.bit_position(), (1 + 256) * 8);

        buffer.reset_cursor();
        assert_eq!(buffer.read_string().expect("长度前缀为 0"), "");
    }

    #[test]
    fn invalid_utf8_payload_is_reported() {
        let mut buffer = BitBuffer::from_vec(vec![2, b'o', 0xFF]);
        assert_eq!(
            buffer.read_string(),
            Err(BitBufError::InvalidUtf8 { valid_up_to: 1 })
        );
    }

    #[test]
    fn short_string_payload_rewinds_length_prefix() {
        let mut buffer = BitBuffer::from_vec(vec![9, b'a']);
        assert!(matches!(
            buffer.read_string(),
            Err(BitBufError::OutOfBounds { .. })
        ));
        assert_eq!(buffer.bit_position(), 0);
    }
}
