//! Bounded moving-average filter over recent classifier scores.
//!
//! A single noisy frame should neither fire nor suppress a trigger; the
//! rolling mean of the last K raw scores is what the decider sees. The
//! pre-push mean is retained so the decider can detect a rising edge.

use std::collections::VecDeque;

/// FIFO of the last K scores with a rolling arithmetic mean.
#[derive(Debug, Clone)]
pub struct ScoreSmoother {
    history: VecDeque<f32>,
    capacity: usize,
    /// Mean as it stood immediately before the most recent push.
    prev_average: f32,
}

impl ScoreSmoother {
    /// `capacity` is K, the number of scores averaged. Typical: 8.
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            prev_average: 0.0,
        }
    }

    /// Push a raw score, evicting the oldest entry once at capacity.
    pub fn push(&mut self, score: f32) {
        self.prev_average = self.average();
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(score);
    }

    /// Arithmetic mean of the current contents. 0.0 when empty.
    pub fn average(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    /// The mean before the most recent push (rising-edge support).
    pub fn previous_average(&self) -> f32 {
        self.prev_average
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
