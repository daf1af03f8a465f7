//! 场景重建的合并调度：同一楼层在两次 tick 之间的所有改动只触发一次重建，
//! 且只有持有最新令牌的结果会被接受。

use std::collections::{BTreeMap, BTreeSet};

use floorscape_core::plan::FloorId;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RebuildToken {
    pub floor: FloorId,
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct RebuildScheduler {
    dirty: BTreeSet<FloorId>,
    latest: BTreeMap<FloorId, u64>,
    next_sequence: u64,
}

impl RebuildScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mark_dirty(&mut self, floor: FloorId) {
        self.dirty.insert(floor);
    }

    pub fn mark_all<I: IntoIterator<Item = FloorId>>(&mut self, floors: I) {
        self.dirty.extend(floors);
    }

    #[inline]
    pub fn is_dirty(&self, floor: FloorId) -> bool {
        self.dirty.contains(&floor)
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// 为某楼层签发新令牌，之前签发的令牌随之作废。
    pub fn issue(&mut self, floor: FloorId) -> RebuildToken {
        self.next_sequence += 1;
        self.latest.insert(floor, self.next_sequence);
        RebuildToken {
            floor,
            sequence: self.next_sequence,
        }
    }

    /// 取出全部脏楼层，每层签发一个令牌。
    pub fn begin(&mut self) -> Vec<RebuildToken> {
        let floors = std::mem::take(&mut self.dirty);
        floors.into_iter().map(|floor| self.issue(floor)).collect()
    }

    #[inline]
    pub fn accept(&self, token: RebuildToken) -> bool {
        self.latest.get(&token.floor) == Some(&token.sequence)
    }

    /// 并行执行本轮重建，返回令牌仍然有效的结果。
    pub fn run<T, F>(&mut self, build: F) -> Vec<(FloorId, T)>
    where
        T: Send,
        F: Fn(FloorId) -> T + Sync,
    {
        let tokens = self.begin();
        if tokens.is_empty() {
            return Vec::new();
        }
        debug!(floors = tokens.len(), "开始合并重建");
        let built: Vec<(RebuildToken, T)> = tokens
            .into_par_iter()
            .map(|token| {
                let output = build(token.floor);
                (token, output)
            })
            .collect();

        built
            .into_iter()
            .filter_map(|(token, output)| {
                if self.accept(token) {
                    Some((token.floor, output))
                } else {
                    debug!(floor = %token.floor, sequence = token.sequence, "丢弃过期的重建结果");
                    None
                }
            })
            .collect()
    }
}
