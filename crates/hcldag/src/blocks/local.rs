//! `locals { name = expression }`
//!
//! Every attribute of a `locals` block is loaded as a `local` block of its own, addressed as
//! `local.<name>`.
use crate::block::{
    BaseBlock, Block, BlockKind, PlanContext, PrePlanBlock, Resolution, SingleValueBlock,
};
use crate::error::Error;
use crate::schema::BlockSchema;
use crate::types::TypeConstraint;
use hcl::Value;

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocalBlock {
    #[serde(skip)]
    base: BaseBlock,
    pub value: Value,
}

impl BlockKind for LocalBlock {
    const BLOCK_TYPE: &'static str = "local";
    const SINGLE_VALUE: bool = true;

    fn schema() -> BlockSchema {
        BlockSchema::new().required_attribute("value", TypeConstraint::Any)
    }

    fn base(&self) -> &BaseBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBlock {
        &mut self.base
    }
}

impl Block for LocalBlock {
    fn as_pre_plan(&mut self) -> Option<&mut dyn PrePlanBlock> {
        Some(self)
    }

    fn as_single_value(&self) -> Option<&dyn SingleValueBlock> {
        Some(self)
    }
}

impl PrePlanBlock for LocalBlock {
    /// Not every local can be evaluated before planning (it may reference a data block), those wait
    /// for the plan
    fn execute_before_plan(&mut self, cx: &PlanContext) -> Result<Resolution, Error> {
        let Some(attribute) = self.base.raw().attribute("value") else {
            return Err(Error::MissingAttribute {
                name: "value".to_string(),
                range: self.base.raw().range.clone(),
            });
        };

        match cx.eval.evaluate(&attribute.expr) {
            Ok(value) => {
                self.value = value;
                Ok(Resolution::Ready)
            }
            Err(error) => {
                tracing::debug!(address = %self.base.address(), %error, "local deferred to plan");
                Ok(Resolution::Deferred)
            }
        }
    }
}

impl SingleValueBlock for LocalBlock {
    fn single_value(&self) -> Value {
        self.value.clone()
    }
}
