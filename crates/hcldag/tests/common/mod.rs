//! dummy block kinds shared by the integration tests
#![allow(dead_code)]

use hcl::Value;
use hcldag::block::{ApplyBlock, BaseBlock, Block, BlockKind, PlanBlock, PlanContext};
use hcldag::config::{ConfigOptions, Configuration};
use hcldag::error::{Error, Errors};
use hcldag::hcl_documents;
use hcldag::registry::BlockRegistry;
use hcldag::schema::BlockSchema;
use hcldag::types::TypeConstraint;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static APPLY_SEQUENCE: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DummyData {
    #[serde(skip)]
    base: BaseBlock,
    pub data: Value,
    pub region: String,
}

impl DummyData {
    pub fn name(&self) -> &str {
        self.base.name()
    }
}

impl BlockKind for DummyData {
    const BLOCK_TYPE: &'static str = "data";
    const TYPE_LABEL: &'static str = "dummy";

    fn schema() -> BlockSchema {
        BlockSchema::new()
            .attribute("data", TypeConstraint::Any)
            .attribute_with_default("region", TypeConstraint::String, "eu")
    }

    fn base(&self) -> &BaseBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBlock {
        &mut self.base
    }
}

impl Block for DummyData {}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NestedBlock {
    pub id: String,
}

fn nested_block_schema() -> BlockSchema {
    BlockSchema::new().required_attribute("id", TypeConstraint::String)
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DummyResource {
    #[serde(skip)]
    base: BaseBlock,
    pub tags: Value,
    pub list: Vec<String>,
    pub nested_block: Vec<NestedBlock>,
    #[serde(skip)]
    pub planned: bool,
    /// position in the global apply sequence, 0 if never applied
    #[serde(skip)]
    pub applied: usize,
}

impl DummyResource {
    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn address(&self) -> String {
        self.base.address()
    }
}

impl BlockKind for DummyResource {
    const BLOCK_TYPE: &'static str = "resource";
    const TYPE_LABEL: &'static str = "dummy";

    fn schema() -> BlockSchema {
        BlockSchema::new()
            .attribute("tags", TypeConstraint::Any)
            .attribute("list", TypeConstraint::List(Box::new(TypeConstraint::String)))
            .blocks("nested_block", nested_block_schema)
    }

    fn base(&self) -> &BaseBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBlock {
        &mut self.base
    }
}

impl Block for DummyResource {
    fn as_plan(&mut self) -> Option<&mut dyn PlanBlock> {
        Some(self)
    }

    fn as_apply(&mut self) -> Option<&mut dyn ApplyBlock> {
        Some(self)
    }
}

impl PlanBlock for DummyResource {
    fn execute_during_plan(&mut self, _cx: &PlanContext) -> Result<(), Error> {
        self.planned = true;
        Ok(())
    }
}

impl ApplyBlock for DummyResource {
    fn apply(&mut self, _cx: &PlanContext) -> Result<(), Error> {
        self.applied = APPLY_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn registry() -> Arc<BlockRegistry> {
    let mut registry = BlockRegistry::with_common_kinds();
    registry.register::<DummyData>().register::<DummyResource>();
    Arc::new(registry)
}

/// Options reading no variable files, `basedir` does not exist
pub fn options() -> ConfigOptions {
    ConfigOptions::new(
        std::env::temp_dir().join("hcldag-tests-no-such-dir"),
        "hcldag".into(),
        "hdt".into(),
    )
}

pub fn load(source: &str) -> Result<Configuration, Errors> {
    load_with(source, options())
}

/// Build the graph and run the pre-plan pass
pub fn load_with(source: &str, options: ConfigOptions) -> Result<Configuration, Errors> {
    let mut config = graph(source, options)?;
    config.run_pre_plan()?;
    Ok(config)
}

/// Build the graph only
pub fn graph(source: &str, options: ConfigOptions) -> Result<Configuration, Errors> {
    Configuration::load(registry(), &hcl_documents!(source), options)
}

pub fn plan(source: &str) -> Configuration {
    let mut config = load(source).unwrap();
    config.run_plan().unwrap();
    config
}

pub fn resource<'c>(config: &'c Configuration, address: &str) -> &'c DummyResource {
    config
        .vertex(address)
        .and_then(|block| block.as_any().downcast_ref::<DummyResource>())
        .unwrap_or_else(|| panic!("no resource at {address}"))
}

pub fn addresses(config: &Configuration) -> Vec<String> {
    let mut addresses: Vec<_> = config.vertices().map(|(address, _)| address.to_string()).collect();
    addresses.sort();
    addresses
}
