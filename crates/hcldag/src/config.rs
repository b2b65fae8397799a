//! a loaded configuration: graph, input variables and evaluation context
//!
//! ```
//! use hcldag::config::{ConfigOptions, Configuration};
//! use hcldag::hcl_documents;
//! use hcldag::registry::BlockRegistry;
//! use std::sync::Arc;
//!
//! let documents = hcl_documents!(r#"
//!     variable "name" { default = "world" }
//!     locals { greeting = "hello ${var.name}" }
//! "#);
//! let options = ConfigOptions::new(".".into(), "hcldag".into(), "hd".into());
//! let registry = Arc::new(BlockRegistry::with_common_kinds());
//! let mut config = Configuration::load(registry, &documents, options).unwrap();
//! config.run_pre_plan().unwrap();
//! config.run_plan().unwrap();
//!
//! let ctx = config.eval_context();
//! let local = ctx.variable("local").unwrap();
//! assert_eq!(hcldag::value::to_json(local), serde_json::json!({ "greeting": "hello world" }));
//! ```
use crate::block::{Block, BlockKind};
use crate::dag::Dag;
use crate::error::{Error, Errors};
use crate::eval::EvalContext;
use crate::functions::Functions;
use crate::hcl_documents::HclDocuments;
use crate::registry::BlockRegistry;
use crate::runner;
use crate::value;
use crate::variables::{CliAssignment, InputVariables, Prompter, VariableSources};
use hcl::Value;
use indexmap::{IndexMap, IndexSet};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, derive_new::new)]
pub struct ConfigOptions {
    /// directory var files and relative `--var-file` paths are resolved against
    pub basedir: PathBuf,
    /// `<full>.<abbr>vars` is the default variable file
    pub dsl_full_name: String,
    /// prefix of environment variables (`<ABBR>_VAR_<name>`) and variable file extension
    pub dsl_abbreviation: String,
    /// where var files are looked up, `basedir` if unset
    #[new(default)]
    pub var_config_dir: Option<PathBuf>,
    #[new(default)]
    pub assignments: Vec<CliAssignment>,
    #[new(default)]
    pub ignore_unknown_variables: bool,
    #[new(default)]
    pub ignore_unsupported_blocks: bool,
    #[new(default)]
    pub prompter: Option<Arc<dyn Prompter>>,
    #[new(value = "Functions::builtin()")]
    pub functions: Functions,
}

impl ConfigOptions {
    pub fn with_var_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.var_config_dir = Some(dir.into());
        self
    }

    pub fn with_assignments(mut self, assignments: Vec<CliAssignment>) -> Self {
        self.assignments = assignments;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn with_functions(mut self, functions: Functions) -> Self {
        self.functions = functions;
        self
    }

    pub fn ignore_unknown_variables(mut self, ignore: bool) -> Self {
        self.ignore_unknown_variables = ignore;
        self
    }

    pub fn ignore_unsupported_blocks(mut self, ignore: bool) -> Self {
        self.ignore_unsupported_blocks = ignore;
        self
    }
}

#[derive(Debug)]
pub struct Configuration {
    pub(crate) registry: Arc<BlockRegistry>,
    pub(crate) dag: Dag,
    /// addresses as written, before any `for_each` expansion
    raw_addresses: IndexSet<String>,
    pub(crate) inputs: InputVariables,
    functions: Functions,
    /// the last pre-plan pass succeeded
    pre_planned: bool,
}

impl Configuration {
    /// Build the graph of all blocks in `documents`
    ///
    /// Only structural problems (unknown kinds, duplicate addresses, cycles) fail the load. Nothing
    /// is evaluated yet, see [Configuration::run_pre_plan].
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn load(
        registry: Arc<BlockRegistry>,
        documents: &HclDocuments,
        options: ConfigOptions,
    ) -> Result<Self, Errors> {
        let mut errors = Errors::new();
        let mut blocks = vec![];

        for raw in documents.raw_blocks()? {
            if options.ignore_unsupported_blocks
                && !registry.is_block_type_recognized(&raw.block_type)
            {
                tracing::debug!(block_type = %raw.block_type, "ignoring unsupported block");
                continue;
            }
            match registry.construct(raw) {
                Ok(block) => blocks.push(block),
                Err(e) => errors.log(e),
            }
        }
        errors.into_result()?;

        let raw_addresses = blocks.iter().map(|block| block.base().address()).collect();
        let declared = blocks
            .iter()
            .filter(|block| block.base().block_type() == "variable")
            .map(|block| block.base().name().to_string())
            .collect();

        let dag = Dag::build(&registry, blocks)?;

        let sources = VariableSources {
            basedir: options.basedir,
            var_config_dir: options.var_config_dir,
            dsl_full_name: options.dsl_full_name,
            dsl_abbreviation: options.dsl_abbreviation,
            assignments: options.assignments,
            ignore_unknown_variables: options.ignore_unknown_variables,
        };

        Ok(Self {
            registry,
            dag,
            raw_addresses,
            inputs: InputVariables::new(sources, declared, options.prompter),
            functions: options.functions,
            pre_planned: false,
        })
    }

    /// Resolve variables and locals, expand `for_each` collections that only depend on them
    ///
    /// On failure the graph stays as far as it got and can still be inspected.
    pub fn run_pre_plan(&mut self) -> Result<(), Errors> {
        let result = runner::run_pre_plan(self);
        self.pre_planned = result.is_ok();
        result
    }

    /// Decode and plan every block, runs the pre-plan pass first unless it already succeeded
    pub fn run_plan(&mut self) -> Result<(), Errors> {
        if !self.pre_planned {
            self.run_pre_plan()?;
        }
        runner::run_plan(self)
    }

    pub fn run_apply(&mut self) -> Result<(), Errors> {
        runner::run_apply(self)
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn inputs(&self) -> &InputVariables {
        &self.inputs
    }

    /// Functions only, no block values
    pub fn empty_eval_context(&self) -> EvalContext {
        EvalContext::new(self.functions.clone())
    }

    /// Values of all ready blocks, grouped by reference keyword
    ///
    /// - `local.<name>`, `var.<name>` for single value kinds
    /// - `<keyword>.<type label>.<name>` for the others
    /// - an expanded block is an object keyed by its instance keys, e.g. `data.a.b["key"]`
    pub fn eval_context(&self) -> EvalContext {
        // keyword -> type label ("" for untyped kinds) -> name -> value
        let mut groups: IndexMap<&str, IndexMap<&str, IndexMap<String, NamedValue>>> =
            IndexMap::new();

        for (_, block) in self.dag.vertices() {
            let base = block.base();
            if !base.is_ready() {
                continue;
            }

            let value = match block.value() {
                Ok(value) => value,
                Err(error) => {
                    tracing::warn!(address = %base.address(), %error, "value not available");
                    continue;
                }
            };

            let named = groups
                .entry(base.info().ref_keyword)
                .or_default()
                .entry(base.type_label())
                .or_default()
                .entry(base.name().to_string())
                .or_insert_with(|| match base.for_each() {
                    Some(_) => NamedValue::Instances(hcl::Map::new()),
                    None => NamedValue::Single(Value::Null),
                });

            match (named, base.for_each()) {
                (NamedValue::Instances(instances), Some(for_each)) => {
                    instances.insert(value::key_string(&for_each.key), value);
                }
                (named, _) => *named = NamedValue::Single(value),
            }
        }

        let mut ctx = self.empty_eval_context();
        for (keyword, labels) in groups {
            let mut object = hcl::Map::new();
            for (type_label, names) in labels {
                let names: hcl::Map<String, Value> = names
                    .into_iter()
                    .map(|(name, named)| (name, named.into_value()))
                    .collect();
                if type_label.is_empty() {
                    object.extend(names);
                } else {
                    object.insert(type_label.to_string(), Value::Object(names));
                }
            }
            ctx.declare_var(keyword, Value::Object(object));
        }
        ctx
    }

    /// The evaluation context as a single object, for inspection
    pub fn evaluation_value(&self) -> Value {
        self.eval_context().to_value()
    }

    /// A live vertex or an address that existed before expansion
    pub fn valid_address(&self, address: &str) -> bool {
        self.dag.contains(address) || self.raw_addresses.contains(address)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (&str, &dyn Block)> {
        self.dag.vertices()
    }

    pub fn vertex(&self, address: &str) -> Option<&dyn Block> {
        self.dag.vertex(address)
    }

    pub fn ancestors(&self, address: &str) -> Result<IndexSet<String>, Error> {
        self.dag.ancestors(address)
    }

    pub fn children(&self, address: &str) -> Result<IndexSet<String>, Error> {
        self.dag.children(address).cloned()
    }

    /// All instances of one kind
    pub fn blocks<T: BlockKind>(&self) -> Vec<&T> {
        self.dag
            .vertices()
            .filter_map(|(_, block)| block.as_any().downcast_ref::<T>())
            .collect()
    }

    /// All instances providing a capability, e.g. `config.blocks_with(|b| b.as_apply().is_some())`
    pub fn blocks_with(
        &mut self,
        mut capability: impl FnMut(&mut dyn Block) -> bool,
    ) -> Vec<String> {
        let addresses: Vec<String> = self
            .dag
            .vertices()
            .map(|(address, _)| address.to_string())
            .collect();
        addresses
            .into_iter()
            .filter(|address| match self.dag.vertex_mut(address) {
                Some(block) => capability(block),
                None => false,
            })
            .collect()
    }
}

enum NamedValue {
    Single(Value),
    /// expanded block, keyed by instance key
    Instances(hcl::Map<String, Value>),
}

impl NamedValue {
    fn into_value(self) -> Value {
        match self {
            NamedValue::Single(value) => value,
            NamedValue::Instances(instances) => Value::Object(instances),
        }
    }
}
