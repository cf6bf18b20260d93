//! 有界输入队列
//!
//! 总线侧非阻塞入队，满时丢弃并计数；调度周期内按当前深度一次性取空。

use dlink_core::QueueFull;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Shared<T> {
    name: &'static str,
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    dropped: AtomicU64,
}

/// 创建有界队列，返回发送端和接收端
pub fn bounded_queue<T>(name: &'static str, capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let shared = Arc::new(Shared {
        name,
        capacity,
        items: Mutex::new(VecDeque::with_capacity(capacity)),
        dropped: AtomicU64::new(0),
    });
    (
        QueueSender {
            shared: Arc::clone(&shared),
        },
        QueueReceiver { shared },
    )
}

/// 队列发送端（总线侧，可跨线程克隆）
pub struct QueueSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> QueueSender<T> {
    /// 非阻塞入队
    ///
    /// # 返回
    /// - `Ok(())`: 入队成功
    /// - `Err(QueueFull)`: 队列已满，消息被丢弃并计数
    pub fn try_send(&self, item: T) -> Result<(), QueueFull> {
        let mut items = self.shared.items.lock();
        if items.len() >= self.shared.capacity {
            drop(items);
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(QueueFull {
                queue: self.shared.name,
                depth: self.shared.capacity,
            });
        }
        items.push_back(item);
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }
}

/// 队列接收端（调度循环独占）
pub struct QueueReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueReceiver<T> {
    /// 取出当前队列中的全部条目
    ///
    /// 先记录当前深度，最多弹出该数量的条目；取空过程中新入队的条目留待下个周期。
    ///
    /// # 返回
    /// - 实际处理的条目数
    pub fn drain_current<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        let snapshot = self.len();
        let mut processed = 0;
        while processed < snapshot {
            // 每次只在弹出时持锁
            let next = self.shared.items.lock().pop_front();
            match next {
                Some(item) => {
                    handler(item);
                    processed += 1;
                }
                None => break,
            }
        }
        processed
    }

    /// 弹出单个条目
    pub fn try_recv(&self) -> Option<T> {
        self.shared.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.shared.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// 因队列满被丢弃的条目数
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// 清零溢出计数
    pub fn reset_dropped(&self) {
        self.shared.dropped.store(0, Ordering::Relaxed);
    }
}
