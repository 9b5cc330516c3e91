//! Render output types
//!
//! [`RenderDocumentIR`] is the contract with downstream renderers: every
//! property resolved, every node carrying its path-based `nodeId` and the
//! refresh policy it was evaluated under. [`RenderDocument`] is the plain
//! tree without that metadata.

use std::collections::BTreeMap;
use serde::Serialize;

use flux_assets::ResolvedAsset;
use flux_kernel::GridLayout;
use flux_lang::{PageConfig, RefreshPolicy, Transition, Value};

/// Layout hints for `slot` / `inline_slot` nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve: Option<Value>,
    pub fit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNodeIR {
    pub node_id: String,
    pub id: String,
    pub kind: String,
    pub props: BTreeMap<String, Value>,
    pub refresh: RefreshPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridLayout>,
    pub children: Vec<RenderNodeIR>,
}

impl RenderNodeIR {
    /// First node with user id `id`, depth first
    pub fn find(&self, id: &str) -> Option<&RenderNodeIR> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderDocumentIR {
    pub meta: BTreeMap<String, String>,
    pub seed: u64,
    pub time: f64,
    pub docstep: u64,
    pub page_config: Option<PageConfig>,
    pub assets: Vec<ResolvedAsset>,
    pub body: Vec<RenderNodeIR>,
}

impl RenderDocumentIR {
    pub fn find(&self, id: &str) -> Option<&RenderNodeIR> {
        self.body.iter().find_map(|node| node.find(id))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderNode {
    pub id: String,
    pub kind: String,
    pub props: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridLayout>,
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn find(&self, id: &str) -> Option<&RenderNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

impl From<RenderNodeIR> for RenderNode {
    fn from(node: RenderNodeIR) -> Self {
        Self {
            id: node.id,
            kind: node.kind,
            props: node.props,
            grid: node.grid,
            children: node.children.into_iter().map(RenderNode::from).collect(),
        }
    }
}

/// Plain render result; grid-only documents carry their grids at top level
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderDocument {
    pub meta: BTreeMap<String, String>,
    pub seed: u64,
    pub time: f64,
    pub docstep: u64,
    pub page_config: Option<PageConfig>,
    pub body: Vec<RenderNode>,
    pub grids: Vec<GridLayout>,
}

impl RenderDocument {
    pub fn find(&self, id: &str) -> Option<&RenderNode> {
        self.body.iter().find_map(|node| node.find(id))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
