//! 定宽整数与无符号位模式之间的桥接。

mod sealed {
    pub trait Sealed {}
}

/// 可按任意位宽打包的整数类型。
///
/// 有符号整数以同宽无符号整数的位模式传输，读回时按截断后的位模式直接转换，不做符号扩展。
/// 该 trait 已封闭，只为 `u8/i8/u16/i16/u32/i32/u64/i64` 实现。
pub trait PackedInt: Copy + sealed::Sealed {
    /// 类型的自然位宽。
    const BITS: u32;

    /// 返回零扩展到 64 位的无符号位模式。
    fn to_bits(self) -> u64;

    /// 由位模式的低 `BITS` 位构造值。
    fn from_bits(bits: u64) -> Self;
}

macro_rules! impl_packed_int {
    ($($ty:ty => $unsigned:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl PackedInt for $ty {
                const BITS: u32 = <$ty>::BITS;

                #[inline(always)]
                #[allow(clippy::unnecessary_cast)]
                fn to_bits(self) -> u64 {
                    self as $unsigned as u64
                }

                #[inline(always)]
                #[allow(clippy::unnecessary_cast)]
                fn from_bits(bits: u64) -> Self {
                    bits as $unsigned as $ty
                }
            }
        )*
    };
}

impl_packed_int! {
    u8 => u8,
    i8 => u8,
    u16 => u16,
    i16 => u16,
    u32 => u32,
    i32 => u32,
    u64 => u64,
    i64 => u64,
}
