#![cfg_attr(not(feature = "std"), no_std)]

//! `spark-bitbuf` 提供按任意位宽读写的位级序列化缓冲。
//!
//! # 模块定位（Why）
//! - 网络负载中的小字段（3 位标签、9 位计数、单个布尔）按字节对齐会浪费带宽，
//!   本 crate 以字节数组为后端，把字段按 1~64 位紧凑打包成线格式；
//! - 缓冲实例与底层数组均可池化复用，稳态编解码无需堆分配。
//!
//! # 设计概要（How）
//! - `cursor`：位游标引擎，唯一执行位运算与游标推进的地方，本身不分配；
//! - `storage`：写入前的容量检查与摊还扩容，新数组来自注入的 [`ArrayPool`]；
//! - `bit_buffer`：[`BitBuffer`] 及其类型化读写访问器；
//! - `pool` / `buffer_pool`：数组池与缓冲对象池，两者都是可注入、线程安全的协作者；
//! - `config` / `error` / `convert`：宽严策略配置、错误语义与浮点字节重解释。
//!
//! # 线格式（What）
//! - 字节内最低位优先，多字节整数低字节在前；
//! - 布尔 1 位；浮点 4/8 个平台原生字节；字符串为 `[u8 长度][UTF-8 字节]`。
//!
//! ```
//! use spark_bitbuf::BitBufferPool;
//!
//! let pool = BitBufferPool::new();
//! let mut buffer = pool.create(4)?;
//! buffer.write_u32_bits(300, 9)?;
//! buffer.write_bool(true)?;
//! buffer.write_u8_bits(7, 3)?;
//!
//! buffer.reset_cursor();
//! assert_eq!(buffer.read_u32_bits(9)?, 300);
//! assert!(buffer.read_bool()?);
//! assert_eq!(buffer.read_u8_bits(3)?, 7);
//! pool.recycle(buffer);
//! # Ok::<(), spark_bitbuf::BitBufError>(())
//! ```

extern crate alloc;

mod bit_buffer;
mod buffer_pool;
mod config;
mod convert;
mod cursor;
mod error;
mod pool;
mod storage;

pub use bit_buffer::{BitBuffer, MAX_STRING_BYTES, PackedInt};
pub use buffer_pool::BitBufferPool;
pub use config::{BitBufferConfig, MaterializeLength, StringPolicy, WidthPolicy};
pub use convert::ByteConverter;
pub use cursor::{BitCursor, MAX_CHUNK_BITS, clamp_chunk_width};
pub use error::{BitBufError, Result, codes};
pub use pool::{ArrayPool, HeapArrayPool, PoolStatDimension, PoolStats, SlabArrayPool};
