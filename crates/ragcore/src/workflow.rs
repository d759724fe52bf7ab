use crate::{NodeError, ValidationError, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = Uuid;

/// Complete workflow definition as held by the definitions store.
///
/// `nodes` is the authoritative execution order (by `position`);
/// `connections` exist solely for the visual editor and are never consulted
/// during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub mode: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Workflow {
    pub fn new(name: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: mode.into(),
            name: name.into(),
            description: None,
            version: 1,
            is_active: true,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn add_node(&mut self, mut node: NodeSpec) -> NodeId {
        node.workflow_id = self.id;
        let id = node.id;
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, from_node: NodeId, to_node: NodeId) {
        self.connections.push(Connection {
            id: Uuid::new_v4(),
            workflow_id: self.id,
            from_node,
            to_node,
            condition: None,
        });
    }

    pub fn find_node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes in execution order. The store should already keep them sorted;
    /// re-sorting here guards against store inconsistency.
    pub fn sorted_nodes(&self) -> Vec<&NodeSpec> {
        let mut nodes: Vec<&NodeSpec> = self.nodes.iter().collect();
        nodes.sort_by_key(|n| n.position);
        nodes
    }

    /// Check the structural invariant: exactly one Input node at the lowest
    /// position, exactly one Output node at the highest, unique positions.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nodes.is_empty() {
            return Err(ValidationError::InvalidWorkflow(
                "workflow has no nodes".to_string(),
            ));
        }

        let mut positions = HashSet::new();
        for node in &self.nodes {
            if !positions.insert(node.position) {
                return Err(ValidationError::InvalidWorkflow(format!(
                    "duplicate node position {}",
                    node.position
                )));
            }
        }

        let inputs = self
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Input)
            .count();
        if inputs != 1 {
            return Err(ValidationError::InvalidWorkflow(format!(
                "expected exactly one input node, found {inputs}"
            )));
        }
        let outputs = self
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Output)
            .count();
        if outputs != 1 {
            return Err(ValidationError::InvalidWorkflow(format!(
                "expected exactly one output node, found {outputs}"
            )));
        }

        let ordered = self.sorted_nodes();
        if ordered.first().map(|n| n.node_type) != Some(NodeType::Input) {
            return Err(ValidationError::InvalidWorkflow(
                "the input node must occupy the lowest position".to_string(),
            ));
        }
        if ordered.last().map(|n| n.node_type) != Some(NodeType::Output) {
            return Err(ValidationError::InvalidWorkflow(
                "the output node must occupy the highest position".to_string(),
            ));
        }

        Ok(())
    }
}

/// The five built-in node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Input,
    Router,
    Retriever,
    Generator,
    Output,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Input => "input",
            NodeType::Router => "router",
            NodeType::Retriever => "retriever",
            NodeType::Generator => "generator",
            NodeType::Output => "output",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of a workflow.
///
/// `is_enabled` is a definitions-store concern: the engine executes every
/// node present in the loaded node list regardless of this flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default)]
    pub workflow_id: WorkflowId,
    pub node_type: NodeType,
    pub name: String,
    pub position: i32,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

impl NodeSpec {
    pub fn new(node_type: NodeType, position: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: Uuid::nil(),
            node_type,
            name: node_type.as_str().to_string(),
            position,
            config: HashMap::new(),
            is_enabled: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Visualization-only edge between two nodes; no execution semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: Uuid,
    #[serde(default)]
    pub workflow_id: WorkflowId,
    pub from_node: NodeId,
    pub to_node: NodeId,
    #[serde(default)]
    pub condition: Option<String>,
}

/// Typed per-node-type configuration, parsed once when a workflow is loaded
/// rather than re-read from the raw key/value blob on every run.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Input(InputConfig),
    Router(RouterConfig),
    Retriever(RetrieverConfig),
    Generator(GeneratorConfig),
    Output(OutputConfig),
}

impl NodeConfig {
    pub fn parse(node_type: NodeType, raw: &HashMap<String, Value>) -> Result<Self, NodeError> {
        match node_type {
            NodeType::Input => InputConfig::parse(raw).map(NodeConfig::Input),
            NodeType::Router => RouterConfig::parse(raw).map(NodeConfig::Router),
            NodeType::Retriever => RetrieverConfig::parse(raw).map(NodeConfig::Retriever),
            NodeType::Generator => GeneratorConfig::parse(raw).map(NodeConfig::Generator),
            NodeType::Output => OutputConfig::parse(raw).map(NodeConfig::Output),
        }
    }

    pub fn as_input(&self) -> Result<&InputConfig, NodeError> {
        match self {
            NodeConfig::Input(cfg) => Ok(cfg),
            other => Err(config_mismatch("input", other)),
        }
    }

    pub fn as_router(&self) -> Result<&RouterConfig, NodeError> {
        match self {
            NodeConfig::Router(cfg) => Ok(cfg),
            other => Err(config_mismatch("router", other)),
        }
    }

    pub fn as_retriever(&self) -> Result<&RetrieverConfig, NodeError> {
        match self {
            NodeConfig::Retriever(cfg) => Ok(cfg),
            other => Err(config_mismatch("retriever", other)),
        }
    }

    pub fn as_generator(&self) -> Result<&GeneratorConfig, NodeError> {
        match self {
            NodeConfig::Generator(cfg) => Ok(cfg),
            other => Err(config_mismatch("generator", other)),
        }
    }

    pub fn as_output(&self) -> Result<&OutputConfig, NodeError> {
        match self {
            NodeConfig::Output(cfg) => Ok(cfg),
            other => Err(config_mismatch("output", other)),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            NodeConfig::Input(_) => "input",
            NodeConfig::Router(_) => "router",
            NodeConfig::Retriever(_) => "retriever",
            NodeConfig::Generator(_) => "generator",
            NodeConfig::Output(_) => "output",
        }
    }
}

fn config_mismatch(expected: &str, got: &NodeConfig) -> NodeError {
    NodeError::Configuration(format!(
        "expected {expected} config, node carries {} config",
        got.type_name()
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    pub max_length: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { max_length: 4000 }
    }
}

impl InputConfig {
    fn parse(raw: &HashMap<String, Value>) -> Result<Self, NodeError> {
        let mut cfg = Self::default();
        if let Some(n) = optional_usize(raw, "maxLength")? {
            if n == 0 {
                return Err(NodeError::Configuration(
                    "'maxLength' must be greater than zero".to_string(),
                ));
            }
            cfg.max_length = n;
        }
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    pub question_keywords: Vec<String>,
    pub generation_keywords: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            question_keywords: [
                "what", "who", "when", "where", "why", "how", "which", "apa", "siapa",
                "kapan", "dimana", "mengapa", "bagaimana",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            generation_keywords: [
                "write", "generate", "create", "compose", "draft", "summarize", "buat",
                "tulis", "ringkas",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl RouterConfig {
    fn parse(raw: &HashMap<String, Value>) -> Result<Self, NodeError> {
        let mut cfg = Self::default();
        if let Some(words) = optional_string_list(raw, "questionKeywords")? {
            cfg.question_keywords = words;
        }
        if let Some(words) = optional_string_list(raw, "generationKeywords")? {
            cfg.generation_keywords = words;
        }
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrieverConfig {
    pub max_results: usize,
    pub source: Option<String>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            source: None,
        }
    }
}

impl RetrieverConfig {
    fn parse(raw: &HashMap<String, Value>) -> Result<Self, NodeError> {
        let mut cfg = Self::default();
        if let Some(n) = optional_usize(raw, "maxResults")? {
            if n == 0 {
                return Err(NodeError::Configuration(
                    "'maxResults' must be greater than zero".to_string(),
                ));
            }
            cfg.max_results = n;
        }
        cfg.source = optional_string(raw, "source")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub model: String,
    pub temperature: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: 0.7,
        }
    }
}

impl GeneratorConfig {
    fn parse(raw: &HashMap<String, Value>) -> Result<Self, NodeError> {
        let mut cfg = Self::default();
        if let Some(model) = optional_string(raw, "model")? {
            cfg.model = model;
        }
        if let Some(t) = optional_f64(raw, "temperature")? {
            if !(0.0..=2.0).contains(&t) {
                return Err(NodeError::Configuration(format!(
                    "'temperature' must be between 0 and 2, got {t}"
                )));
            }
            cfg.temperature = t;
        }
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

impl OutputConfig {
    fn parse(raw: &HashMap<String, Value>) -> Result<Self, NodeError> {
        let mut cfg = Self::default();
        if let Some(format) = optional_string(raw, "format")? {
            cfg.format = format;
        }
        Ok(cfg)
    }
}

fn optional_usize(raw: &HashMap<String, Value>, key: &str) -> Result<Option<usize>, NodeError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| NodeError::Configuration(format!(
                "'{key}' must be a non-negative integer"
            ))),
    }
}

fn optional_f64(raw: &HashMap<String, Value>, key: &str) -> Result<Option<f64>, NodeError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| NodeError::Configuration(format!("'{key}' must be a number"))),
    }
}

fn optional_string(raw: &HashMap<String, Value>, key: &str) -> Result<Option<String>, NodeError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| NodeError::Configuration(format!("'{key}' must be a string"))),
    }
}

fn optional_string_list(
    raw: &HashMap<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, NodeError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let items = value.as_array().ok_or_else(|| {
                NodeError::Configuration(format!("'{key}' must be an array of strings"))
            })?;
            let mut words = Vec::with_capacity(items.len());
            for item in items {
                let word = item.as_str().ok_or_else(|| {
                    NodeError::Configuration(format!("'{key}' must be an array of strings"))
                })?;
                words.push(word.to_string());
            }
            Ok(Some(words))
        }
    }
}
