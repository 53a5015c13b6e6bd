use alloc::{borrow::Cow, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;
use tracing::trace;

use crate::bit_buffer::BitBuffer;
use crate::config::BitBufferConfig;
use crate::error::Result;
use crate::pool::{ArrayPool, PoolStatDimension, PoolStats, SlabArrayPool};

/// `BitBufferPool` 是 [`BitBuffer`] 实例外壳的对象池，同时负责为外壳装配数组池中的存储。
///
/// # 设计背景（Why）
/// - 高频编解码路径上，每条消息都要求一个新的位缓冲；外壳与存储一并复用后，稳态下不再触发堆分配。
/// - 数组池以 `Arc<dyn ArrayPool>` 注入，测试可替换为记录型或平凡实现。
///
/// # 核心机制（How）
/// - 自由链表 `spin::Mutex<Vec<BitBuffer>>` 保存已回收的空壳，最多保留 `max_retained` 个；
/// - `create`/`copy_from`/`wrap` 先准备好存储再租借外壳，失败路径不会让外壳丢失或计数漂移；
/// - 原子计数跟踪活跃数量、累计租借与回收次数，以及自由链表未命中次数。
///
/// # 契约说明（What）
/// - **非别名**：[`recycle`](Self::recycle) 按值接收缓冲，调用方在回收后不可能再持有旧句柄；
///   再次租借得到的外壳游标字段全部为 0；
/// - **线程安全**：池可通过 `Clone` 在多个所有者之间共享，每个外壳在同一时刻只会交给一个所有者；
/// - 缓冲被直接丢弃而未回收时，其存储仍在 `Drop` 中归还数组池，只是活跃计数不会下降。
///
/// # 风险提示（Trade-offs）
/// - `max_retained` 之外的空壳直接释放；外壳本身很小，丢弃的代价只是一次小分配。
#[derive(Clone)]
pub struct BitBufferPool {
    inner: Arc<BufferPoolInner>,
}

impl BitBufferPool {
    /// 以默认配置与新的 [`SlabArrayPool`] 创建对象池。
    pub fn new() -> Self {
        Self::from_validated(Arc::new(SlabArrayPool::new()), BitBufferConfig::default())
    }

    /// 以指定配置创建对象池，数组池使用新的 [`SlabArrayPool`]。
    pub fn with_config(config: BitBufferConfig) -> Result<Self> {
        Self::with_array_pool(Arc::new(SlabArrayPool::new()), config)
    }

    /// 注入自定义数组池。
    pub fn with_array_pool(arrays: Arc<dyn ArrayPool>, config: BitBufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(arrays, config))
    }

    fn from_validated(arrays: Arc<dyn ArrayPool>, config: BitBufferConfig) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                arrays,
                config,
                free_list: Mutex::new(Vec::new()),
                metrics: BufferMetrics::default(),
            }),
        }
    }

    pub fn config(&self) -> &BitBufferConfig {
        &self.inner.config
    }

    /// 返回注入的数组池句柄。
    pub fn array_pool(&self) -> Arc<dyn ArrayPool> {
        Arc::clone(&self.inner.arrays)
    }

    /// 租借一个写入目标：存储为 `size` 个 0 字节，游标位于起点。
    pub fn create(&self, size: usize) -> Result<BitBuffer> {
        let storage = self.inner.arrays.get(size)?;
        Ok(self.inner.rent(storage))
    }

    /// 租借一个读取目标：从数组池取得 `data.len()` 字节的存储并拷入 `data`。
    pub fn copy_from(&self, data: &[u8]) -> Result<BitBuffer> {
        let mut storage = self.inner.arrays.get(data.len())?;
        storage.copy_from_slice(data);
        Ok(self.inner.rent(storage))
    }

    /// 租借一个读取目标并直接接管 `data`，不做分配或拷贝。
    ///
    /// 接管时 `data` 即计入数组池的租约与已分配字节，回收时像其他存储一样进入数组池。
    pub fn wrap(&self, data: Vec<u8>) -> BitBuffer {
        self.inner.arrays.adopt(data.capacity());
        self.inner.rent(data)
    }

    /// 回收缓冲：存储归还其所属数组池，游标清零，外壳放回自由链表。
    pub fn recycle(&self, mut buffer: BitBuffer) {
        buffer.release_storage();
        let metrics = &self.inner.metrics;
        saturating_decrement(&metrics.active_buffers);
        metrics.total_recycled.fetch_add(1, Ordering::Relaxed);

        let mut list = self.inner.free_list.lock();
        let retained = list.len() < self.inner.config.max_retained;
        if retained {
            list.push(buffer);
        }
        drop(list);
        trace!(target: "spark_bitbuf", retained, "bit buffer recycled");
    }

    /// 统计快照：数组池统计加上对象池维度。
    ///
    /// 附加维度：`active_buffers`、`total_rented`、`total_recycled`、`pool_misses`、`free_buffers`。
    pub fn statistics(&self) -> PoolStats {
        let mut stats = self.inner.arrays.statistics();
        let metrics = &self.inner.metrics;
        let free_buffers = self.inner.free_list.lock().len();
        stats.custom_dimensions.extend([
            dimension("active_buffers", metrics.active_buffers.load(Ordering::Relaxed)),
            dimension("total_rented", metrics.total_rented.load(Ordering::Relaxed)),
            dimension("total_recycled", metrics.total_recycled.load(Ordering::Relaxed)),
            dimension("pool_misses", metrics.pool_misses.load(Ordering::Relaxed)),
            dimension("free_buffers", free_buffers),
        ]);
        stats
    }

    /// 清空空壳自由链表并收缩数组池，返回数组池释放的字节数。
    pub fn shrink_to_fit(&self) -> usize {
        self.inner.free_list.lock().clear();
        self.inner.arrays.shrink_to_fit()
    }
}

impl Default for BitBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for BitBufferPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BitBufferPool")
            .field("config", &self.inner.config)
            .field("free_buffers", &self.inner.free_list.lock().len())
            .finish()
    }
}

struct BufferPoolInner {
    arrays: Arc<dyn ArrayPool>,
    config: BitBufferConfig,
    free_list: Mutex<Vec<BitBuffer>>,
    metrics: BufferMetrics,
}

impl BufferPoolInner {
    /// 取出空壳（自由链表为空时新建）并装入 `storage`。
    fn rent(&self, storage: Vec<u8>) -> BitBuffer {
        let shell = self.free_list.lock().pop();
        let mut buffer = match shell {
            Some(buffer) => buffer,
            None => {
                self.metrics.pool_misses.fetch_add(1, Ordering::Relaxed);
                BitBuffer::default()
            }
        };
        let capacity = storage.len();
        buffer.attach(storage, Arc::clone(&self.arrays), self.config);
        self.metrics.active_buffers.fetch_add(1, Ordering::Relaxed);
        self.metrics.total_rented.fetch_add(1, Ordering::Relaxed);
        trace!(target: "spark_bitbuf", capacity, "bit buffer rented");
        buffer
    }
}

#[derive(Default)]
struct BufferMetrics {
    active_buffers: AtomicUsize,
    total_rented: AtomicUsize,
    total_recycled: AtomicUsize,
    pool_misses: AtomicUsize,
}

fn dimension(key: &'static str, value: usize) -> PoolStatDimension {
    PoolStatDimension {
        key: Cow::Borrowed(key),
        value,
    }
}

fn saturating_decrement(target: &AtomicUsize) {
    let _ = target.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(1))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn recycled_shell_is_reused_with_zeroed_cursor() {
        let pool = BitBufferPool::new();
        let mut first = pool.create(4).expect("租借缓冲");
        first.write_u16_bits(0x3FF, 11).expect("写入 11 位");
        pool.recycle(first);

        let second = pool.create(2).expect("再次租借");
        assert_eq!(second.bit_position(), 0);
        assert_eq!(second.as_slice(), &[0, 0], "复用的存储必须清零");
        assert_eq!(pool.statistics().dimension("pool_misses"), Some(1));
    }

    #[test]
    fn free_list_respects_max_retained() {
        let pool = BitBufferPool::with_config(BitBufferConfig::new().with_max_retained(1))
            .expect("配置合法");
        let a = pool.create(1).expect("租借 a");
        let b = pool.create(1).expect("租借 b");
        pool.recycle(a);
        pool.recycle(b);
        assert_eq!(pool.statistics().dimension("free_buffers"), Some(1));
    }

    #[test]
    fn wrap_takes_ownership_without_copy() {
        let pool = BitBufferPool::new();
        let data = vec![0b0000_0110];
        let ptr = data.as_ptr();
        let mut buffer = pool.wrap(data);
        assert_eq!(buffer.as_slice().as_ptr(), ptr, "wrap 不应复制数据");
        assert_eq!(buffer.read_bits(3).expect("读取 3 位"), 0b110);
    }

    #[test]
    fn rented_buffer_inherits_pool_config() {
        let config = BitBufferConfig::strict();
        let pool = BitBufferPool::with_config(config).expect("配置合法");
        let buffer = pool.copy_from(&[1, 2]).expect("拷贝租借");
        assert_eq!(buffer.config(), &config);
        assert_eq!(buffer.as_slice(), &[1, 2]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = BitBufferPool::with_config(BitBufferConfig::new().with_growth_factor(f32::NAN));
        assert!(result.is_err());
    }
}
