//! # Training metrics
//!
//! Learners report one [`Metrics`] map per training step. A
//! [`MetricsTracker`] keeps bounded histories of those scalars together with
//! per-episode rewards and lengths.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

/// Named scalars emitted by a single `learn()` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    values: BTreeMap<String, f32>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, value: f32) {
        self.values.insert(name.into(), value);
    }

    pub fn with<S: Into<String>>(mut self, name: S, value: f32) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    /// Merge `other` into `self`, overwriting shared names.
    pub fn extend(&mut self, other: Metrics) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(name, &value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bounded history of learner metrics and episode outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsTracker {
    history_size: usize,
    series: HashMap<String, VecDeque<f32>>,
    episode_rewards: VecDeque<f32>,
    episode_lengths: VecDeque<usize>,

    current_episode_reward: f32,
    current_episode_length: usize,
    episode_count: usize,
    total_steps: usize,
}

impl MetricsTracker {
    pub fn new(history_size: usize) -> Self {
        MetricsTracker {
            history_size: history_size.max(1),
            series: HashMap::new(),
            episode_rewards: VecDeque::with_capacity(history_size),
            episode_lengths: VecDeque::with_capacity(history_size),
            current_episode_reward: 0.0,
            current_episode_length: 0,
            episode_count: 0,
            total_steps: 0,
        }
    }

    /// Append every scalar of a learn step to its series.
    pub fn record(&mut self, metrics: &Metrics) {
        for (name, value) in metrics.iter() {
            let history_size = self.history_size;
            let series = self
                .series
                .entry(name.to_string())
                .or_insert_with(|| VecDeque::with_capacity(history_size));
            if series.len() >= history_size {
                series.pop_front();
            }
            series.push_back(value);
        }
    }

    pub fn start_episode(&mut self) {
        self.current_episode_reward = 0.0;
        self.current_episode_length = 0;
    }

    /// Record one environment step within the current episode.
    pub fn step(&mut self, reward: f32) {
        self.current_episode_reward += reward;
        self.current_episode_length += 1;
        self.total_steps += 1;
    }

    /// Close the current episode, returning its `(reward, length)`.
    pub fn end_episode(&mut self) -> (f32, usize) {
        if self.episode_rewards.len() >= self.history_size {
            self.episode_rewards.pop_front();
        }
        self.episode_rewards.push_back(self.current_episode_reward);

        if self.episode_lengths.len() >= self.history_size {
            self.episode_lengths.pop_front();
        }
        self.episode_lengths.push_back(self.current_episode_length);

        self.episode_count += 1;
        (self.current_episode_reward, self.current_episode_length)
    }

    pub fn series(&self, name: &str) -> Option<&VecDeque<f32>> {
        self.series.get(name)
    }

    /// Mean of the last `window` values of a series.
    pub fn mean(&self, name: &str, window: usize) -> Option<f32> {
        self.series.get(name).and_then(|values| recent_mean(values, window))
    }

    pub fn avg_episode_reward(&self, window: usize) -> Option<f32> {
        recent_mean(&self.episode_rewards, window)
    }

    pub fn episode_rewards(&self) -> &VecDeque<f32> {
        &self.episode_rewards
    }

    pub fn episode_lengths(&self) -> &VecDeque<usize> {
        &self.episode_lengths
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Save metrics to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn recent_mean(values: &VecDeque<f32>, window: usize) -> Option<f32> {
    let n = window.min(values.len());
    if n == 0 {
        return None;
    }
    let sum: f32 = values.iter().rev().take(n).sum();
    Some(sum / n as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_are_bounded() {
        let mut tracker = MetricsTracker::new(3);
        for i in 0..5 {
            tracker.record(&Metrics::new().with("loss", i as f32));
        }
        let losses: Vec<f32> = tracker.series("loss").unwrap().iter().copied().collect();
        assert_eq!(losses, vec![2.0, 3.0, 4.0]);
        assert_eq!(tracker.mean("loss", 2), Some(3.5));
        assert_eq!(tracker.mean("value", 2), None);
    }

    #[test]
    fn test_episode_accounting() {
        let mut tracker = MetricsTracker::default();
        tracker.start_episode();
        tracker.step(1.0);
        tracker.step(-0.5);
        assert_eq!(tracker.end_episode(), (0.5, 2));
        assert_eq!(tracker.episode_count(), 1);
        assert_eq!(tracker.total_steps(), 2);
        assert_eq!(tracker.avg_episode_reward(10), Some(0.5));
    }

    #[test]
    fn test_save_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let mut tracker = MetricsTracker::new(4);
        tracker.record(&Metrics::new().with("loss", 0.25));
        tracker.start_episode();
        tracker.step(2.0);
        tracker.end_episode();
        tracker.save(&path).unwrap();

        let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["episode_count"], 1);
        assert_eq!(saved["series"]["loss"][0], 0.25);
        assert_eq!(saved["episode_rewards"][0], 2.0);
    }
}
