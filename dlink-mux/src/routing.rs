//! 路由表
//!
//! 消息标识到一个或多个输出通道的映射。路由表构造完成即不可变，
//! 更新时整体替换，读者不会看到部分更新的表。

use dlink_core::config::MAX_CHANNELS;
use dlink_core::{MessageId, RoutingEntry, TableError};
use std::collections::HashMap;

/// 通道集合（位图）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSet(u32);

impl ChannelSet {
    pub fn from_mask(mask: u32) -> Self {
        Self(mask)
    }

    pub fn mask(self) -> u32 {
        self.0
    }

    pub fn contains(self, channel: usize) -> bool {
        channel < 32 && self.0 & (1 << channel) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// 按通道索引升序遍历
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..32).filter(move |c| self.0 & (1 << c) != 0)
    }
}

/// 单个消息的路由结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub channels: ChannelSet,
    /// 按关键消息处理的通道，是 `channels` 的子集
    pub critical: ChannelSet,
}

impl Route {
    /// 该消息在指定通道上是否为关键消息
    pub fn is_critical_on(&self, channel: usize) -> bool {
        self.critical.contains(channel)
    }
}

/// 路由表
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
    index: HashMap<MessageId, Route>,
}

impl RoutingTable {
    /// 校验并构造路由表
    ///
    /// # 参数
    /// - `entries`: 路由条目
    /// - `channel_count`: 已配置的通道数
    /// - `capacity`: 路由表最大条目数
    /// - `max_critical`: 允许的关键消息标识数量
    ///
    /// # 返回
    /// - `Ok(RoutingTable)`: 校验通过的新表
    /// - `Err(TableError)`: 校验失败，调用方继续使用旧表
    pub fn load(
        entries: Vec<RoutingEntry>,
        channel_count: usize,
        capacity: usize,
        max_critical: usize,
    ) -> Result<Self, TableError> {
        if entries.len() > capacity {
            return Err(TableError::TooManyEntries {
                count: entries.len(),
                max: capacity,
            });
        }

        let limit = channel_count.min(MAX_CHANNELS);
        let mut index: HashMap<MessageId, Route> = HashMap::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            let mid = entry.mid.value();
            if entry.channel_mask == 0 {
                return Err(TableError::EmptyMask { index: i, mid });
            }
            if let Some(channel) = entry.channels().find(|&c| c >= limit) {
                return Err(TableError::ChannelOutOfRange {
                    index: i,
                    mid,
                    channel,
                    channel_count,
                });
            }

            let route = index.entry(entry.mid).or_insert(Route {
                channels: ChannelSet::default(),
                critical: ChannelSet::default(),
            });
            // 同一消息可分发到多个通道，但同一通道不能重复
            let overlap = route.channels.mask() & entry.channel_mask;
            if overlap != 0 {
                return Err(TableError::DuplicateRoute {
                    index: i,
                    mid,
                    channel: overlap.trailing_zeros() as usize,
                });
            }
            route.channels = ChannelSet(route.channels.mask() | entry.channel_mask);
            // 关键标志只作用于本条目的通道
            if entry.critical {
                route.critical = ChannelSet(route.critical.mask() | entry.channel_mask);
            }
        }

        let critical = index
            .values()
            .filter(|route| !route.critical.is_empty())
            .count();
        if critical > max_critical {
            return Err(TableError::TooManyCritical {
                count: critical,
                max: max_critical,
            });
        }

        Ok(Self { entries, index })
    }

    /// 查询消息的目的通道
    pub fn lookup(&self, mid: MessageId) -> Option<Route> {
        self.index.get(&mid).copied()
    }

    /// 需要在总线上订阅的消息标识（按表顺序去重）
    pub fn subscriptions(&self) -> Vec<MessageId> {
        let mut mids: Vec<MessageId> = Vec::with_capacity(self.index.len());
        for entry in &self.entries {
            if !mids.contains(&entry.mid) {
                mids.push(entry.mid);
            }
        }
        mids
    }

    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
