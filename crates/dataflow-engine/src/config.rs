//! Engine configuration
//!
//! Every behavioral switch of a graph lives here and is owned by the graph
//! instance. Configs deserialize from JSON with defaults for missing keys.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values for engine settings
pub mod defaults {
    /// Maximum number of nodes a graph accepts
    pub const MAX_NODES: usize = 1000;
    /// Seconds added to the fixed clock per inner step iteration
    pub const FIXED_TIME_LAPSE: f64 = 0.01;
}

/// How new node and link ids are allocated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// Monotonic integers starting at 1
    #[default]
    Sequential,
    /// Random v4 UUIDs
    Uuid,
}

/// What `run_step` does when a node fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record the failure, log it and stop the graph
    #[default]
    Contain,
    /// Return the error to the caller
    Strict,
}

/// Graph engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Id allocation scheme for nodes and links
    #[serde(default)]
    pub id_scheme: IdScheme,
    /// Maximum number of nodes in one graph
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Queue actions on executable targets and drain them on the next pass
    #[serde(default = "default_true")]
    pub use_deferred_actions: bool,
    /// Allow an event output to fan out to several inputs
    #[serde(default = "default_true")]
    pub allow_multi_output_for_events: bool,
    /// Connecting to the event sentinel switches the target to trigger mode
    #[serde(default)]
    pub do_add_triggers_slots: bool,
    /// A node executes at most once per step
    #[serde(default)]
    pub ensure_node_single_execution: bool,
    /// A node handles a given action call at most once while busy
    #[serde(default)]
    pub ensure_node_single_action: bool,
    /// A node refuses a call id it has already completed
    #[serde(default)]
    pub ensure_unique_execution_and_action_call: bool,
    /// Recompute ancestors before executing a triggered node
    #[serde(default)]
    pub refresh_ancestors_on_triggers: bool,
    /// Recompute ancestors before delivering an action
    #[serde(default)]
    pub refresh_ancestors_on_actions: bool,
    /// Skip ancestor recomputation for nodes already refreshed this step
    #[serde(default = "default_true")]
    pub prevent_ancestor_recalculation: bool,
    /// Seconds added to the fixed clock per inner step iteration
    #[serde(default = "default_fixed_time_lapse")]
    pub fixed_time_lapse: f64,
    /// Failure handling used by `Graph::tick`
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

fn default_true() -> bool {
    true
}

fn default_max_nodes() -> usize {
    defaults::MAX_NODES
}

fn default_fixed_time_lapse() -> f64 {
    defaults::FIXED_TIME_LAPSE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_scheme: IdScheme::default(),
            max_nodes: defaults::MAX_NODES,
            use_deferred_actions: true,
            allow_multi_output_for_events: true,
            do_add_triggers_slots: false,
            ensure_node_single_execution: false,
            ensure_node_single_action: false,
            ensure_unique_execution_and_action_call: false,
            refresh_ancestors_on_triggers: false,
            refresh_ancestors_on_actions: false,
            prevent_ancestor_recalculation: true,
            fixed_time_lapse: defaults::FIXED_TIME_LAPSE,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON, filling missing keys with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_id_scheme(mut self, scheme: IdScheme) -> Self {
        self.id_scheme = scheme;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    pub fn with_deferred_actions(mut self, enabled: bool) -> Self {
        self.use_deferred_actions = enabled;
        self
    }

    pub fn with_trigger_slots(mut self, enabled: bool) -> Self {
        self.do_add_triggers_slots = enabled;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}
