//! The resolved asset catalog
//!
//! Built once per runtime from inline `asset`s, `bank`s (through an
//! [`AssetResolver`]) and `material`s. Identity comes from a stable hash of
//! where an entry came from, so re-scanning the same tree yields the same ids.

use std::collections::BTreeMap;
use serde::Serialize;

use flux_lang::{stable_hash_hex, AssetDecl, BankDecl, FluxDocument, MaterialDecl, Mulberry32, Value};

use crate::pick::{pick, PickStrategy};
use crate::resolver::{AssetResolver, ResolveContext};
use crate::AssetError;

/// Where a catalog entry came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AssetSource {
    Asset { name: String },
    Bank { name: String, file: String },
    Material { name: String },
}

impl AssetSource {
    fn provenance(&self) -> Vec<Value> {
        match self {
            Self::Asset { name } => vec![Value::str("asset"), Value::str(name.as_str())],
            Self::Bank { name, file } => vec![Value::str("bank"), Value::str(name.as_str()), Value::str(file.as_str())],
            Self::Material { name } => vec![Value::str("material"), Value::str(name.as_str())],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAsset {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub path: String,
    pub tags: Vec<String>,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, Value>>,
    pub source: AssetSource,
}

impl ResolvedAsset {
    fn new(source: AssetSource, name: String, kind: String, path: String, tags: Vec<String>, weight: f64) -> Self {
        let id = format!("asset-{}", stable_hash_hex(&source.provenance()));
        Self {
            id,
            name,
            kind,
            path,
            tags,
            weight,
            meta: None,
            source,
        }
    }

    pub fn has_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|tag| self.tags.contains(tag))
    }

    /// Object form handed to render expressions
    pub fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), Value::str(self.id.as_str()));
        fields.insert("name".to_string(), Value::str(self.name.as_str()));
        fields.insert("kind".to_string(), Value::str(self.kind.as_str()));
        fields.insert("path".to_string(), Value::str(self.path.as_str()));
        fields.insert("tags".to_string(), Value::List(self.tags.iter().map(|t| Value::str(t.as_str())).collect()));
        fields.insert("weight".to_string(), Value::Float(self.weight));
        if let Some(meta) = &self.meta {
            fields.insert("meta".to_string(), Value::Object(meta.clone()));
        }
        Value::Object(fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetCatalog {
    assets: Vec<ResolvedAsset>,
}

impl AssetCatalog {
    /// Resolve every asset source declared by `doc`
    pub fn build(doc: &FluxDocument, resolver: &dyn AssetResolver, ctx: &ResolveContext) -> Result<Self, AssetError> {
        let mut assets: Vec<ResolvedAsset> = doc.assets.iter().map(inline_asset).collect();

        for bank in &doc.banks {
            let files = resolver.resolve(bank, ctx)?;
            assets.extend(files.iter().map(|file| bank_asset(bank, file)));
        }

        assets.extend(doc.materials.iter().map(material_asset));

        log::debug!(
            "Asset catalog: {} entries ({} inline, {} bank(s), {} material(s))",
            assets.len(),
            doc.assets.len(),
            doc.banks.len(),
            doc.materials.len()
        );
        Ok(Self { assets })
    }

    pub fn from_assets(assets: Vec<ResolvedAsset>) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &[ResolvedAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedAsset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&ResolvedAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// Entries carrying every tag in `tags`; an empty filter matches all
    pub fn filter(&self, tags: &[String]) -> Vec<&ResolvedAsset> {
        self.assets.iter().filter(|a| a.has_tags(tags)).collect()
    }

    /// Pick one entry among those matching `tags`
    pub fn pick(&self, tags: &[String], strategy: PickStrategy, rng: &mut Mulberry32) -> Option<&ResolvedAsset> {
        pick(&self.filter(tags), strategy, rng)
    }
}

fn inline_asset(asset: &AssetDecl) -> ResolvedAsset {
    let mut resolved = ResolvedAsset::new(
        AssetSource::Asset { name: asset.name.clone() },
        asset.name.clone(),
        asset.kind.clone(),
        asset.path.clone(),
        asset.tags.clone(),
        asset.weight,
    );
    if !asset.meta.is_empty() {
        resolved.meta = Some(asset.meta.clone());
    }
    resolved
}

fn bank_asset(bank: &BankDecl, file: &str) -> ResolvedAsset {
    let root = bank.root.trim_end_matches('/');
    let path = if root.is_empty() { file.to_string() } else { format!("{}/{}", root, file) };
    ResolvedAsset::new(
        AssetSource::Bank {
            name: bank.name.clone(),
            file: file.to_string(),
        },
        format!("{}/{}", bank.name, file),
        bank.kind.clone(),
        path,
        bank.tags.clone(),
        bank.weight,
    )
}

fn material_asset(material: &MaterialDecl) -> ResolvedAsset {
    let mut meta = BTreeMap::new();
    meta.insert("materialKind".to_string(), Value::str(material.material_kind.as_str()));
    if let Some(label) = &material.label {
        meta.insert("label".to_string(), Value::str(label.as_str()));
    }
    if let Some(color) = &material.color {
        meta.insert("color".to_string(), Value::str(color.as_str()));
    }
    for (key, payload) in [("score", &material.score), ("midi", &material.midi), ("video", &material.video)] {
        if let Some(payload) = payload {
            meta.insert(key.to_string(), Value::Object(payload.clone()));
        }
    }

    let mut resolved = ResolvedAsset::new(
        AssetSource::Material { name: material.name.clone() },
        material.name.clone(),
        "material".to_string(),
        String::new(),
        material.tags.clone(),
        material.weight,
    );
    resolved.meta = Some(meta);
    resolved
}
