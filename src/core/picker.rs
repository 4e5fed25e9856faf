//! 采集目标抽取：可注入的随机源（可设种子 / 可替换），保证测试确定性

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 从长度为 len（> 0）的目录中选出一个下标
pub trait TargetPicker: Send {
    fn pick(&mut self, len: usize) -> usize;
}

/// 均匀随机抽取（允许重复）
pub struct RandomPicker {
    rng: StdRng,
}

impl RandomPicker {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl TargetPicker for RandomPicker {
    fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng.random_range(0..len)
    }
}

/// 按给定序列循环取下标（测试用）
pub struct SequencePicker {
    sequence: Vec<usize>,
    pos: usize,
}

impl SequencePicker {
    pub fn new(sequence: Vec<usize>) -> Self {
        Self { sequence, pos: 0 }
    }
}

impl TargetPicker for SequencePicker {
    fn pick(&mut self, len: usize) -> usize {
        if self.sequence.is_empty() || len == 0 {
            return 0;
        }
        let idx = self.sequence[self.pos % self.sequence.len()] % len;
        self.pos += 1;
        idx
    }
}
