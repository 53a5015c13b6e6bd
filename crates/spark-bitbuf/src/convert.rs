//! 浮点数与原始字节之间的重解释。
//!
//! 字节序取平台原生顺序（主流目标均为小端）。跨平台传输浮点数时，
//! 收发双方必须运行在相同字节序的平台上，线格式本身不做转换。

/// 浮点数 ⇄ 原始字节的转换器。
///
/// 纯位模式重解释，不做任何校验：NaN 负载、`-0.0`、非规格化数原样保留。
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteConverter;

impl ByteConverter {
    /// `f32` 的字节宽度。
    pub const FLOAT_BYTES: usize = 4;
    /// `f64` 的字节宽度。
    pub const DOUBLE_BYTES: usize = 8;

    #[inline]
    pub const fn float_to_bytes(value: f32) -> [u8; 4] {
        value.to_ne_bytes()
    }

    #[inline]
    pub const fn bytes_to_float(bytes: [u8; 4]) -> f32 {
        f32::from_ne_bytes(bytes)
    }

    #[inline]
    pub const fn double_to_bytes(value: f64) -> [u8; 8] {
        value.to_ne_bytes()
    }

    #[inline]
    pub const fn bytes_to_double(bytes: [u8; 8]) -> f64 {
        f64::from_ne_bytes(bytes)
    }
}
