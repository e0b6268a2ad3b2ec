//! 受付番号分配器
//!
//! 在固定号码范围内按权重无放回抽取，小号码更容易被抽到。

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 分配器参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorSettings {
    /// 号码范围 1..=universe
    pub universe: u32,
    /// 权重步长：weight(i) = ceil((universe - i + 1) / weight_divisor)
    pub weight_divisor: u32,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            universe: 50,
            weight_divisor: 10,
        }
    }
}

/// 受付番号分配器
#[derive(Debug, Clone)]
pub struct ReceptionNumberAllocator {
    settings: AllocatorSettings,
    issued: BTreeSet<u32>,
}

impl ReceptionNumberAllocator {
    /// 创建新的分配器
    pub fn new(settings: AllocatorSettings) -> Self {
        Self {
            settings,
            issued: BTreeSet::new(),
        }
    }

    pub fn settings(&self) -> AllocatorSettings {
        self.settings
    }

    /// 候选号码的权重，范围外为 0
    pub fn weight(&self, candidate: u32) -> u32 {
        if candidate == 0 || candidate > self.settings.universe {
            return 0;
        }
        (self.settings.universe - candidate + 1).div_ceil(self.settings.weight_divisor.max(1))
    }

    /// 抽取一个尚未发放的号码，全部发放完毕时返回 None
    pub fn allocate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<u32> {
        let (candidates, cumulative) = self.cumulative_weights();
        let total = match cumulative.last() {
            Some(&total) => total,
            None => {
                tracing::debug!("Reception numbers exhausted ({} issued)", self.issued.len());
                return None;
            }
        };

        let draw = rng.gen_range(0..total);
        let number = candidates[cumulative.partition_point(|&upper| upper <= draw)];
        self.issued.insert(number);

        tracing::debug!("Allocated reception number {} ({} remaining)", number, self.remaining());
        Some(number)
    }

    /// 剩余候选及其累积权重
    fn cumulative_weights(&self) -> (Vec<u32>, Vec<u32>) {
        let mut candidates = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0;

        for candidate in 1..=self.settings.universe {
            if self.issued.contains(&candidate) {
                continue;
            }
            total += self.weight(candidate);
            candidates.push(candidate);
            cumulative.push(total);
        }

        (candidates, cumulative)
    }

    /// 新会话开始时归还全部号码
    pub fn reset(&mut self) {
        self.issued.clear();
        tracing::debug!("Reception number allocator reset");
    }

    /// 已发放的号码（升序）
    pub fn issued(&self) -> Vec<u32> {
        self.issued.iter().copied().collect()
    }

    pub fn is_issued(&self, number: u32) -> bool {
        self.issued.contains(&number)
    }

    pub fn remaining(&self) -> usize {
        self.settings.universe as usize - self.issued.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl Default for ReceptionNumberAllocator {
    fn default() -> Self {
        Self::new(AllocatorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_weight_table() {
        let allocator = ReceptionNumberAllocator::default();

        assert_eq!(allocator.weight(1), 5);
        assert_eq!(allocator.weight(10), 5);
        assert_eq!(allocator.weight(11), 4);
        assert_eq!(allocator.weight(41), 1);
        assert_eq!(allocator.weight(50), 1);
        assert_eq!(allocator.weight(0), 0);
        assert_eq!(allocator.weight(51), 0);

        for i in 1..50 {
            assert!(allocator.weight(i) >= allocator.weight(i + 1));
        }
    }

    #[test]
    fn test_exhaustion_after_universe() {
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(7);

        let mut drawn = Vec::new();
        for _ in 0..50 {
            drawn.push(allocator.allocate(&mut rng).unwrap());
        }

        assert_eq!(allocator.allocate(&mut rng), None);
        assert!(allocator.is_exhausted());

        drawn.sort_unstable();
        assert_eq!(drawn, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_reset_returns_numbers() {
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(1);

        let first = allocator.allocate(&mut rng).unwrap();
        assert!(allocator.is_issued(first));
        assert_eq!(allocator.remaining(), 49);

        allocator.reset();
        assert!(allocator.issued().is_empty());
        assert_eq!(allocator.remaining(), 50);
    }

    #[test]
    fn test_cumulative_search_matches_pool_expansion() {
        let mut allocator = ReceptionNumberAllocator::default();
        allocator.issued.extend([1, 2, 17, 33, 50]);

        let mut pool = Vec::new();
        for candidate in 1..=50 {
            if !allocator.is_issued(candidate) {
                for _ in 0..allocator.weight(candidate) {
                    pool.push(candidate);
                }
            }
        }

        let (candidates, cumulative) = allocator.cumulative_weights();
        assert_eq!(*cumulative.last().unwrap() as usize, pool.len());

        for (draw, expected) in pool.iter().enumerate() {
            let idx = cumulative.partition_point(|&upper| upper <= draw as u32);
            assert_eq!(candidates[idx], *expected);
        }
    }

    #[test]
    fn test_low_numbers_are_favoured() {
        let mut low = 0;
        let mut high = 0;

        for seed in 0..2000 {
            let mut allocator = ReceptionNumberAllocator::default();
            let mut rng = StdRng::seed_from_u64(seed);
            match allocator.allocate(&mut rng).unwrap() {
                1..=10 => low += 1,
                41..=50 => high += 1,
                _ => {}
            }
        }

        // 权重比 5:1
        assert!(low > high * 3, "low={} high={}", low, high);
    }

    proptest! {
        #[test]
        fn never_issues_a_number_twice(seed in any::<u64>(), draws in 1usize..60) {
            let mut allocator = ReceptionNumberAllocator::default();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut seen = BTreeSet::new();

            for _ in 0..draws {
                match allocator.allocate(&mut rng) {
                    Some(number) => {
                        prop_assert!((1..=50).contains(&number));
                        prop_assert!(seen.insert(number));
                    }
                    None => prop_assert_eq!(seen.len(), 50),
                }
            }
        }
    }
}
