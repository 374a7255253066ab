//! Scheduler configuration
//!
//! The defaults match what a robot control loop wants; the struct is
//! serde-deserializable so an application can load it next to its other
//! settings.

use serde::{Deserialize, Serialize};

/// What happens to a task displaced by conflict resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Invoke `end(EndReason::Evicted)` so the task can release what it holds
    #[default]
    EndEvicted,
    /// Drop the task from the active set without calling `end()`
    Silent,
}

impl EvictionPolicy {
    /// Whether evicted tasks receive an `end()` call
    pub const fn ends_evicted(&self) -> bool {
        matches!(self, EvictionPolicy::EndEvicted)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Cleanup behaviour for evicted tasks
    pub eviction: EvictionPolicy,

    /// Soft cap on concurrently active tasks
    ///
    /// Exceeding it only logs a warning at admission time; admission is never
    /// refused.
    pub max_active_tasks: Option<usize>,
}

impl SchedulerConfig {
    /// Configuration with the given eviction policy and no task cap
    pub fn with_eviction(eviction: EvictionPolicy) -> Self {
        Self {
            eviction,
            ..Self::default()
        }
    }

    /// Whether `active` tasks exceeds the configured soft cap
    pub fn exceeds_cap(&self, active: usize) -> bool {
        self.max_active_tasks.is_some_and(|cap| active > cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ends_evicted() {
        let config = SchedulerConfig::default();
        assert_eq!(config.eviction, EvictionPolicy::EndEvicted);
        assert!(config.eviction.ends_evicted());
        assert!(config.max_active_tasks.is_none());
    }

    #[test]
    fn test_soft_cap() {
        let config = SchedulerConfig {
            max_active_tasks: Some(2),
            ..Default::default()
        };
        assert!(!config.exceeds_cap(2));
        assert!(config.exceeds_cap(3));
        assert!(!SchedulerConfig::default().exceeds_cap(1000));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"eviction":"silent"}"#).unwrap();
        assert_eq!(config.eviction, EvictionPolicy::Silent);
        assert_eq!(config.max_active_tasks, None);
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_serialize_roundtrip_names() {
        let config = SchedulerConfig {
            eviction: EvictionPolicy::EndEvicted,
            max_active_tasks: Some(8),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"end_evicted\""));
        assert!(json.contains("\"max_active_tasks\":8"));
    }
}
