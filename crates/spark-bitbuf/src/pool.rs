use alloc::{borrow::Cow, sync::Arc, vec, vec::Vec};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use spin::Mutex;
use tracing::trace;

use crate::error::{BitBufError, Result};

/// `ArrayPool` 规定字节数组租借与回收的统一接口。
///
/// # 设计背景（Why）
/// - 位级缓冲的存储来自外部数组池，扩容时新数组同样从池中租借、旧数组归还池，
///   从而在高频编解码场景下把堆分配次数压到最低。
/// - 以 trait 注入而非进程级单例，测试可以替换为 [`HeapArrayPool`] 这类平凡分配器。
///
/// # 契约说明（What）
/// - `get(size)`：返回长度恰为 `size`、内容全为 0 的数组，调用方独占所有权；
/// - `recycle(array)`：归还数组，调用方此后不得再访问；
/// - `adopt(capacity)`：登记一个并非经由 `get` 得到、随后会被 `recycle` 的外部数组，
///   使其与正常租借一样计入已分配字节与租约；
/// - **线程安全**：实现必须满足 `Send + Sync`，多个缓冲实例可并发租借与归还，
///   任何一次租借得到的数组在归还前都不会被其他租借观察到。
///
/// # 风险提示（Trade-offs）
/// - 分配失败以 [`BitBufError::AllocationFailed`] 返回，池不做重试。
pub trait ArrayPool: Send + Sync + 'static {
    /// 租借长度恰为 `size` 的清零数组。
    fn get(&self, size: usize) -> Result<Vec<u8>>;

    /// 归还数组。
    fn recycle(&self, array: Vec<u8>);

    /// 接管调用方自带的数组，视同一次新的租借。
    fn adopt(&self, capacity: usize) {
        let _ = capacity;
    }

    /// 主动收缩池内缓存，返回释放的字节数。
    fn shrink_to_fit(&self) -> usize {
        0
    }

    /// 返回池当前的统计快照。
    fn statistics(&self) -> PoolStats {
        PoolStats::default()
    }
}

/// 池统计快照。
///
/// # 契约说明（What）
/// - `allocated_bytes`：池向系统申请且尚未释放的总字节数，包含借出与待命容量；
/// - `available_bytes`：自由链表中无需再分配即可提供的容量；
/// - `active_leases`：正在被调用方持有的租借数量；
/// - `failed_acquisitions`：累计分配失败次数；
/// - `custom_dimensions`：实现特有的指标，键使用稳定的蛇形命名。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated_bytes: usize,
    pub available_bytes: usize,
    pub active_leases: usize,
    pub failed_acquisitions: u64,
    pub custom_dimensions: Vec<PoolStatDimension>,
}

impl PoolStats {
    /// 按键查找自定义维度。
    pub fn dimension(&self, key: &str) -> Option<usize> {
        self.custom_dimensions
            .iter()
            .find(|dim| dim.key == key)
            .map(|dim| dim.value)
    }
}

/// 扩展指标维度。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStatDimension {
    pub key: Cow<'static, str>,
    pub value: usize,
}

/// 以 `Vec::try_reserve_exact` 申请清零数组，把分配失败转换为显式错误。
fn allocate_zeroed(size: usize) -> Result<Vec<u8>> {
    let mut array = Vec::new();
    array
        .try_reserve_exact(size)
        .map_err(|_| BitBufError::AllocationFailed { requested: size })?;
    array.resize(size, 0);
    Ok(array)
}

/// 平凡数组池：每次租借直接分配，归还时直接释放。
///
/// 适合测试与一次性缓冲，不做任何缓存。
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapArrayPool;

impl HeapArrayPool {
    pub const fn new() -> Self {
        Self
    }
}

impl ArrayPool for HeapArrayPool {
    fn get(&self, size: usize) -> Result<Vec<u8>> {
        allocate_zeroed(size)
    }

    fn recycle(&self, array: Vec<u8>) {
        drop(array);
    }
}

/// `SlabArrayPool` 提供基于自由链表（Free List）的数组池实现，
/// 在高频编解码场景下复用 `Vec<u8>`，以减少堆分配次数。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<Vec<u8>>>` 作为自由链表，租借时首次适配（first-fit）容量足够的数组，
///   清空后按需补零到请求长度；
/// - `PoolMetrics` 通过原子计数跟踪 `allocated_bytes`、`available_bytes`、`active_leases`，
///   支撑 [`ArrayPool::statistics`] 快照；
/// - 克隆仅复制内部 `Arc`，多个缓冲池可共享同一组数组。
///
/// # 契约说明（What）
/// - **线程安全**：共享状态全部由 `spin::Mutex` 与原子计数保护；
/// - **后置条件**：`get(size)` 返回的数组长度恰为 `size` 且内容为 0，不会泄露上一任持有者的数据；
/// - 长度为 0 的租借与容量为 0 的归还都不经过自由链表，也不计入租约统计。
///
/// # 设计权衡（Trade-offs）
/// - 使用自旋锁以便在 `no_std` 环境中仍能工作，临界区只包含链表的 push / swap_remove；
/// - `shrink_to_fit` 采取“清空自由链表”的简单策略，便于在压测后快速归还峰值内存。
#[derive(Clone, Default)]
pub struct SlabArrayPool {
    inner: Arc<SlabInner>,
}

impl SlabArrayPool {
    /// 创建空池实例。
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArrayPool for SlabArrayPool {
    fn get(&self, size: usize) -> Result<Vec<u8>> {
        self.inner.acquire(size)
    }

    fn recycle(&self, array: Vec<u8>) {
        self.inner.release(array);
    }

    fn adopt(&self, capacity: usize) {
        self.inner.adopt(capacity);
    }

    fn shrink_to_fit(&self) -> usize {
        self.inner.shrink_free_list()
    }

    fn statistics(&self) -> PoolStats {
        self.inner.snapshot()
    }
}

#[derive(Default)]
struct SlabInner {
    free_list: Mutex<Vec<Vec<u8>>>,
    metrics: PoolMetrics,
}

impl SlabInner {
    /// 从自由链表或堆上获取一个满足长度的数组。
    fn acquire(&self, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let reused = {
            let mut list = self.free_list.lock();
            list.iter()
                .position(|array| array.capacity() >= size)
                .map(|index| list.swap_remove(index))
        };

        let array = match reused {
            Some(mut array) => {
                self.metrics.decrease_available(array.capacity());
                array.clear();
                array.resize(size, 0);
                array
            }
            None => match allocate_zeroed(size) {
                Ok(array) => {
                    self.metrics.increase_on_new_allocation(array.capacity());
                    array
                }
                Err(err) => {
                    self.metrics.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
                    return Err(err);
                }
            },
        };
        self.metrics.increase_active_leases();
        trace!(target: "spark_bitbuf", size, capacity = array.capacity(), "array rented");
        Ok(array)
    }

    /// 外部数组与新分配的数组一样计入 `allocated_bytes`，归还时才能与 `release` 对账。
    fn adopt(&self, capacity: usize) {
        if capacity == 0 {
            return;
        }
        self.metrics.increase_on_new_allocation(capacity);
        self.metrics.increase_active_leases();
        trace!(target: "spark_bitbuf", capacity, "array adopted");
    }

    fn release(&self, array: Vec<u8>) {
        let capacity = array.capacity();
        if capacity == 0 {
            return;
        }
        self.metrics.decrease_active_leases();
        self.metrics.increase_available(capacity);
        self.free_list.lock().push(array);
        trace!(target: "spark_bitbuf", capacity, "array recycled");
    }

    fn shrink_free_list(&self) -> usize {
        let mut list = self.free_list.lock();
        let reclaimed: usize = list.iter().map(Vec::capacity).sum();
        list.clear();
        self.metrics.decrease_on_shrink(reclaimed);
        reclaimed
    }

    fn snapshot(&self) -> PoolStats {
        let free_slots = self.free_list.lock().len();
        PoolStats {
            allocated_bytes: self.metrics.allocated_bytes.load(Ordering::Relaxed),
            available_bytes: self.metrics.available_bytes.load(Ordering::Relaxed),
            active_leases: self.metrics.active_leases.load(Ordering::Relaxed),
            failed_acquisitions: self.metrics.failed_acquisitions.load(Ordering::Relaxed),
            custom_dimensions: vec![PoolStatDimension {
                key: Cow::Borrowed("slab_free_slots"),
                value: free_slots,
            }],
        }
    }
}

#[derive(Default)]
struct PoolMetrics {
    allocated_bytes: AtomicUsize,
    available_bytes: AtomicUsize,
    active_leases: AtomicUsize,
    failed_acquisitions: AtomicU64,
}

impl PoolMetrics {
    fn increase_on_new_allocation(&self, capacity: usize) {
        self.allocated_bytes.fetch_add(capacity, Ordering::Relaxed);
    }

    fn increase_available(&self, capacity: usize) {
        self.available_bytes.fetch_add(capacity, Ordering::Relaxed);
    }

    fn decrease_available(&self, capacity: usize) {
        saturating_sub(&self.available_bytes, capacity);
    }

    fn decrease_on_shrink(&self, capacity: usize) {
        self.decrease_available(capacity);
        saturating_sub(&self.allocated_bytes, capacity);
    }

    fn increase_active_leases(&self) {
        self.active_leases.fetch_add(1, Ordering::Relaxed);
    }

    fn decrease_active_leases(&self) {
        saturating_sub(&self.active_leases, 1);
    }
}

fn saturating_sub(target: &AtomicUsize, value: usize) {
    let _ = target.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(value))
    });
}
