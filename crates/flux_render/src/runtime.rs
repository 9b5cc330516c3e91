//! Document runtimes: `render` / `tick` / `step` over one document
//!
//! A runtime owns the document, the resolved asset catalog, the node cache
//! and the kernel states it has computed so far. `tick` and `step` only move
//! its own clock; the document is never modified.

use std::collections::BTreeMap;
use std::path::PathBuf;

use flux_assets::{AssetCatalog, AssetResolver, FsResolver, ResolveContext};
use flux_kernel::{compute_grid_layout, init_runtime_state, run_docstep_once, GridLayout, KernelError, RuntimeState};
use flux_lang::check::grid_reference;
use flux_lang::{stable_hash, DocumentNode, FluxDocument, Mulberry32, NodePropValue, RefreshPolicy, Value};

use crate::cache::{node_path, CacheEntry, NodeCache};
use crate::config::RenderOptions;
use crate::eval::{EvalContext, Evaluator};
use crate::ir::{RenderDocument, RenderDocumentIR, RenderNode, RenderNodeIR, SlotMeta};
use crate::refresh::{effective_policy, refresh_window, RefreshWindow};
use crate::{EvalError, RenderError};

/// Kernel states by docstep, each derived from the closest earlier one
#[derive(Debug, Default)]
struct KernelMemo {
    states: BTreeMap<u64, RuntimeState>,
}

impl KernelMemo {
    fn state_at(&mut self, doc: &FluxDocument, docstep: u64) -> Result<&RuntimeState, KernelError> {
        if !self.states.contains_key(&docstep) {
            let (mut index, mut state) = match self.states.range(..docstep).next_back() {
                Some((index, state)) => (*index, state.clone()),
                None => (0, init_runtime_state(doc)),
            };
            while index < docstep {
                state = run_docstep_once(doc, &state)?;
                index += 1;
            }
            log::debug!("Kernel state for docstep {} computed", docstep);
            self.states.insert(docstep, state);
        }
        Ok(&self.states[&docstep])
    }
}

/// Render pipeline producing [`RenderDocumentIR`]
#[derive(Debug)]
pub struct DocumentRuntimeIR {
    doc: FluxDocument,
    seed: u64,
    time: f64,
    docstep: u64,
    params: BTreeMap<String, Value>,
    labels: BTreeMap<String, String>,
    catalog: AssetCatalog,
    cache: NodeCache,
    kernel: KernelMemo,
}

impl DocumentRuntimeIR {
    /// Create a runtime resolving banks from disk
    pub fn new(doc: FluxDocument, options: RenderOptions) -> Result<Self, RenderError> {
        Self::with_resolver(doc, options, &FsResolver)
    }

    pub fn with_resolver(doc: FluxDocument, options: RenderOptions, resolver: &dyn AssetResolver) -> Result<Self, RenderError> {
        let root = options.asset_root.clone().unwrap_or_else(|| PathBuf::from("."));
        let catalog = AssetCatalog::build(&doc, resolver, &ResolveContext::new(root))?;
        let params = init_runtime_state(&doc).params;
        let labels = collect_labels(&doc);

        Ok(Self {
            doc,
            seed: options.seed,
            time: options.time,
            docstep: options.docstep,
            params,
            labels,
            catalog,
            cache: NodeCache::new(),
            kernel: KernelMemo::default(),
        })
    }

    pub fn document(&self) -> &FluxDocument {
        &self.doc
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn docstep(&self) -> u64 {
        self.docstep
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    /// Render at the current `(time, docstep)`
    pub fn render(&mut self) -> Result<RenderDocumentIR, RenderError> {
        let mut pass = RenderPass {
            doc: &self.doc,
            seed: self.seed,
            time: self.time,
            docstep: self.docstep,
            params: &self.params,
            labels: &self.labels,
            catalog: &self.catalog,
            cache: &mut self.cache,
            kernel: &mut self.kernel,
        };

        let mut body = Vec::new();
        if let Some(nodes) = &self.doc.body {
            for (index, node) in nodes.iter().enumerate() {
                if let Some(rendered) = pass.node(node, "", index, RefreshPolicy::OnLoad)? {
                    body.push(rendered);
                }
            }
        }

        let (hits, misses) = self.cache.stats();
        log::debug!(
            "Rendered t={} docstep={}: {} top-level node(s), cache {} hit(s) / {} miss(es)",
            self.time,
            self.docstep,
            body.len(),
            hits,
            misses
        );

        Ok(RenderDocumentIR {
            meta: self.doc.meta.clone(),
            seed: self.seed,
            time: self.time,
            docstep: self.docstep,
            page_config: self.doc.page_config.clone(),
            assets: self.catalog.assets().to_vec(),
            body,
        })
    }

    /// Advance the clock by `seconds`, then render
    pub fn tick(&mut self, seconds: f64) -> Result<RenderDocumentIR, RenderError> {
        self.time += seconds;
        self.render()
    }

    /// Advance by `n` docsteps, then render
    pub fn step(&mut self, n: u64) -> Result<RenderDocumentIR, RenderError> {
        self.docstep += n;
        self.render()
    }

    /// Kernel state at the current docstep
    pub fn grid_state(&mut self) -> Result<&RuntimeState, KernelError> {
        self.kernel.state_at(&self.doc, self.docstep)
    }

    /// Layout of every grid-topology grid at the current docstep
    pub fn grid_layouts(&mut self) -> Result<Vec<GridLayout>, KernelError> {
        let state = self.kernel.state_at(&self.doc, self.docstep)?;
        Ok(compute_grid_layout(&self.doc, state))
    }
}

/// Render pipeline producing plain [`RenderDocument`]s
#[derive(Debug)]
pub struct DocumentRuntime {
    inner: DocumentRuntimeIR,
}

impl DocumentRuntime {
    pub fn new(doc: FluxDocument, options: RenderOptions) -> Result<Self, RenderError> {
        Ok(Self { inner: DocumentRuntimeIR::new(doc, options)? })
    }

    pub fn with_resolver(doc: FluxDocument, options: RenderOptions, resolver: &dyn AssetResolver) -> Result<Self, RenderError> {
        Ok(Self { inner: DocumentRuntimeIR::with_resolver(doc, options, resolver)? })
    }

    pub fn ir(&self) -> &DocumentRuntimeIR {
        &self.inner
    }

    pub fn render(&mut self) -> Result<RenderDocument, RenderError> {
        let ir = self.inner.render()?;
        // Grid-only documents expose their grids directly
        let grids = if self.inner.doc.body.is_none() {
            self.inner.grid_layouts()?
        } else {
            Vec::new()
        };

        Ok(RenderDocument {
            meta: ir.meta,
            seed: ir.seed,
            time: ir.time,
            docstep: ir.docstep,
            page_config: ir.page_config,
            body: ir.body.into_iter().map(RenderNode::from).collect(),
            grids,
        })
    }

    pub fn tick(&mut self, seconds: f64) -> Result<RenderDocument, RenderError> {
        self.inner.time += seconds;
        self.render()
    }

    pub fn step(&mut self, n: u64) -> Result<RenderDocument, RenderError> {
        self.inner.docstep += n;
        self.render()
    }
}

pub fn create_document_runtime_ir(doc: FluxDocument, options: RenderOptions) -> Result<DocumentRuntimeIR, RenderError> {
    DocumentRuntimeIR::new(doc, options)
}

pub fn create_document_runtime(doc: FluxDocument, options: RenderOptions) -> Result<DocumentRuntime, RenderError> {
    DocumentRuntime::new(doc, options)
}

/// One-shot IR render
pub fn render_document_ir(doc: &FluxDocument, options: RenderOptions) -> Result<RenderDocumentIR, RenderError> {
    DocumentRuntimeIR::new(doc.clone(), options)?.render()
}

/// One-shot plain render
pub fn render_document(doc: &FluxDocument, options: RenderOptions) -> Result<RenderDocument, RenderError> {
    DocumentRuntime::new(doc.clone(), options)?.render()
}

/// `label` to node id; the first node carrying a label wins
fn collect_labels(doc: &FluxDocument) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for root in doc.body.iter().flatten() {
        root.walk(&mut |node| {
            if let Some(NodePropValue::Literal(Value::String(label))) = node.props.get("label") {
                labels.entry(label.clone()).or_insert_with(|| node.id.clone());
            }
        });
    }
    labels
}

struct RenderPass<'a> {
    doc: &'a FluxDocument,
    seed: u64,
    time: f64,
    docstep: u64,
    params: &'a BTreeMap<String, Value>,
    labels: &'a BTreeMap<String, String>,
    catalog: &'a AssetCatalog,
    cache: &'a mut NodeCache,
    kernel: &'a mut KernelMemo,
}

impl<'a> RenderPass<'a> {
    fn node(
        &mut self,
        node: &DocumentNode,
        parent: &str,
        index: usize,
        inherited: RefreshPolicy,
    ) -> Result<Option<RenderNodeIR>, RenderError> {
        let path = node_path(parent, &node.kind, &node.id, index);
        let policy = effective_policy(node, inherited);
        let window = refresh_window(&policy, self.time, self.docstep)
            .map_err(|e| RenderError::property(node, "refresh", e))?;

        let mut props: BTreeMap<String, Value> = node.props.iter()
            .filter_map(|(key, value)| value.as_literal().map(|v| (key.clone(), v.clone())))
            .collect();
        props.extend(self.dynamic_props(node, &path, &window)?);

        match props.get("visibleIf") {
            None | Some(Value::Bool(true)) => {}
            Some(Value::Bool(false)) => {
                log::trace!("{} hidden by visibleIf", path);
                return Ok(None);
            }
            Some(other) => {
                let message = format!("visibleIf must be a boolean, got {}", other.type_name());
                return Err(RenderError::property(node, "visibleIf", EvalError::Type(message)));
            }
        }

        let slot = node.is_slot().then(|| SlotMeta {
            reserve: node.props.get("reserve").and_then(NodePropValue::as_literal).cloned(),
            fit: node.props.get("fit")
                .and_then(NodePropValue::as_literal)
                .map(Value::to_display_string)
                .unwrap_or_else(|| "clip".to_string()),
        });

        let grid = if node.kind == "grid" { self.grid(node)? } else { None };

        let mut children = Vec::with_capacity(node.children.len());
        for (i, child) in node.children.iter().enumerate() {
            if let Some(rendered) = self.node(child, &path, i, policy)? {
                children.push(rendered);
            }
        }

        Ok(Some(RenderNodeIR {
            node_id: path,
            id: node.id.clone(),
            kind: node.kind.clone(),
            props,
            refresh: policy,
            transition: node.transition.clone(),
            slot,
            grid,
            children,
        }))
    }

    fn dynamic_props(
        &mut self,
        node: &DocumentNode,
        path: &str,
        window: &RefreshWindow,
    ) -> Result<BTreeMap<String, Value>, RenderError> {
        if !node.props.values().any(NodePropValue::is_dynamic) {
            return Ok(BTreeMap::new());
        }
        if let Some(entry) = self.cache.lookup(path, window.key) {
            return Ok(entry.props.clone());
        }

        let ctx = EvalContext {
            params: self.params,
            meta: &self.doc.meta,
            time: window.time,
            docstep: window.docstep,
            labels: self.labels,
            catalog: self.catalog,
        };

        let mut props = BTreeMap::new();
        for (key, value) in &node.props {
            let NodePropValue::Dynamic(expr) = value else {
                continue;
            };
            // One stream per (seed, node, property, window)
            let seed = stable_hash(&[
                Value::Int(self.seed as i64),
                Value::str(path),
                Value::str(key.as_str()),
                Value::Int(window.key),
            ]);
            let value = Evaluator::new(ctx, Mulberry32::new(seed))
                .evaluate(expr)
                .map_err(|e| RenderError::property(node, key, e))?;
            props.insert(key.clone(), value);
        }

        self.cache.store(
            path.to_string(),
            CacheEntry {
                refresh_key: window.key,
                evaluated_time: window.time,
                evaluated_docstep: window.docstep,
                props: props.clone(),
            },
        );
        Ok(props)
    }

    fn grid(&mut self, node: &DocumentNode) -> Result<Option<GridLayout>, RenderError> {
        let name = grid_reference(node).ok_or_else(|| {
            RenderError::property(node, "grid", EvalError::Type("grid node needs a literal 'grid' property".to_string()))
        })?;
        if self.doc.grid(&name).is_none() {
            return Err(RenderError::property(node, "grid", EvalError::UnknownGrid(name)));
        }

        let state = self.kernel.state_at(self.doc, self.docstep)?;
        Ok(compute_grid_layout(self.doc, state).into_iter().find(|layout| layout.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_assets::FixedResolver;
    use flux_lang::parse_document;

    fn runtime(source: &str) -> DocumentRuntimeIR {
        let doc = parse_document(source).unwrap();
        DocumentRuntimeIR::with_resolver(doc, RenderOptions::default(), &FixedResolver::new()).unwrap()
    }

    fn content(ir: &RenderDocumentIR, id: &str) -> Value {
        ir.find(id).unwrap().props["content"].clone()
    }

    #[test]
    fn test_node_ids_are_paths() {
        let mut rt = runtime(r#"document { body { page p { text t { content = "a"; } text t { content = "b"; } } } }"#);
        let ir = rt.render().unwrap();
        let ids: Vec<_> = ir.body[0].children.iter().map(|c| c.node_id.as_str()).collect();
        assert_eq!(ids, vec!["/page:p:0/text:t:0", "/page:p:0/text:t:1"]);
    }

    #[test]
    fn test_refresh_is_inherited() {
        let mut rt = runtime(r#"document { body {
            section s { refresh = docstep;
                text t { content = @docstep; }
                slot frozen { refresh = never; content = @docstep; }
            }
        } }"#);
        let ir = rt.step(2).unwrap();
        assert_eq!(ir.find("t").unwrap().refresh, RefreshPolicy::OnDocstep);
        assert_eq!(content(&ir, "t"), Value::Int(2));
        assert_eq!(content(&ir, "frozen"), Value::Int(0));
    }

    #[test]
    fn test_cache_reused_within_window() {
        let mut rt = runtime(r#"document { body { slot s { refresh = every("10s"); content = @choose([1, 2, 3, 4, 5, 6]); } } }"#);
        let first = rt.render().unwrap();
        rt.tick(4.0).unwrap();
        let again = rt.tick(4.0).unwrap();
        assert_eq!(content(&first, "s"), content(&again, "s"));
        assert_eq!(rt.cache().stats(), (2, 1));
    }

    #[test]
    fn test_visible_if_hides_subtree() {
        let mut rt = runtime(r#"document {
            state { param open: bool @ false; }
            body { section s { visibleIf = @(params.open == true); text t { content = "x"; } } text u { content = "y"; } }
        }"#);
        let ir = rt.render().unwrap();
        assert!(ir.find("s").is_none());
        assert!(ir.find("t").is_none());
        assert!(ir.find("u").is_some());
    }

    #[test]
    fn test_visible_if_must_be_bool() {
        let mut rt = runtime(r#"document { body { text t { visibleIf = @docstep; } } }"#);
        let err = rt.render().unwrap_err();
        assert_eq!(err.to_string(), "visibleIf must be a boolean, got int (in text 't', property 'visibleIf')");
    }

    #[test]
    fn test_ref_resolves_label() {
        let mut rt = runtime(r#"document { body {
            text title { content = "Hello"; label = "title"; }
            text t2 { content = @("see " + ref("title")); }
        } }"#);
        assert_eq!(content(&rt.render().unwrap(), "t2"), Value::str("see title"));
    }

    #[test]
    fn test_slot_meta() {
        let mut rt = runtime(r#"document { body {
            slot a { reserve = 3; fit = shrink; content = "x"; }
            inline_slot b { content = "y"; }
            text c { content = "z"; }
        } }"#);
        let ir = rt.render().unwrap();
        let a = ir.find("a").unwrap().slot.clone().unwrap();
        assert_eq!(a.reserve, Some(Value::Int(3)));
        assert_eq!(a.fit, "shrink");
        assert_eq!(ir.find("b").unwrap().slot.as_ref().unwrap().fit, "clip");
        assert!(ir.find("c").unwrap().slot.is_none());
    }

    #[test]
    fn test_error_names_node_and_property() {
        let mut rt = runtime(r#"document { body { slot s { content = @neighbors.all(); } } }"#);
        match rt.render().unwrap_err() {
            RenderError::Property { node_id, kind, property, source } => {
                assert_eq!((node_id.as_str(), kind.as_str(), property.as_str()), ("s", "slot", "content"));
                assert_eq!(source, EvalError::NeighborsOutsideRule("all".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_musical_refresh_unit_is_error() {
        let mut rt = runtime(r#"document { body { slot s { refresh = every(1, beat); content = @time; } } }"#);
        let err = rt.render().unwrap_err();
        assert!(matches!(
            err,
            RenderError::Property { ref property, source: EvalError::UnsupportedRefreshUnit(_), .. } if property == "refresh"
        ));
    }

    #[test]
    fn test_grid_node_follows_docstep() {
        let mut rt = runtime(r#"document {
            grid field { size { rows = 1; cols = 2; } cell a { content = ""; } cell b { content = ""; } }
            rule fill(mode = docstep, grid = field) { when cell.content == "" then cell.content = "x"; }
            body { grid view { grid = field; } }
        }"#);
        let at0 = rt.render().unwrap();
        assert_eq!(at0.find("view").unwrap().grid.as_ref().unwrap().cells[0].content, "");
        let at1 = rt.step(1).unwrap();
        assert_eq!(at1.find("view").unwrap().grid.as_ref().unwrap().cells[1].content, "x");
    }

    #[test]
    fn test_grid_node_unknown_grid() {
        let mut rt = runtime(r#"document { body { grid view { grid = nowhere; } } }"#);
        assert_eq!(
            rt.render().unwrap_err().to_string(),
            "Unknown grid 'nowhere' (in grid 'view', property 'grid')"
        );
    }

    #[test]
    fn test_kernel_memo_reuses_earlier_states() {
        let doc = parse_document(r#"document {
            state { param n: int @ 0; }
            rule inc(mode = docstep) { when true then n = n + 1; }
        }"#).unwrap();
        let mut memo = KernelMemo::default();
        assert_eq!(memo.state_at(&doc, 3).unwrap().param("n"), Some(&Value::Int(3)));
        assert_eq!(memo.state_at(&doc, 5).unwrap().param("n"), Some(&Value::Int(5)));
        assert_eq!(memo.state_at(&doc, 0).unwrap().docstep_index, 0);
        assert_eq!(memo.states.len(), 3);
    }
}
