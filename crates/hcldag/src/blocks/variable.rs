//! `variable "name" { type = .. default = .. description = .. validation { .. } }`
//!
//! Values are resolved before planning, in this order: assigned input (environment, variable files,
//! command line), then `default`, then an interactive prompt.
use crate::block::{
    BaseBlock, Block, BlockKind, CustomDecode, PlanContext, PrePlanBlock, Resolution,
    SingleValueBlock,
};
use crate::error::{Error, Errors};
use crate::eval::EvalContext;
use crate::raw_block::RawBlock;
use crate::schema::BlockSchema;
use crate::types::TypeConstraint;
use crate::value;
use crate::variables::parse_raw_value;
use hcl::Value;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariableValidation {
    pub condition: bool,
    pub error_message: String,
}

fn validation_schema() -> BlockSchema {
    BlockSchema::new()
        .required_attribute("condition", TypeConstraint::Bool)
        .required_attribute("error_message", TypeConstraint::String)
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VariableBlock {
    #[serde(skip)]
    base: BaseBlock,
    pub description: Option<String>,
    pub validations: Vec<VariableValidation>,
    #[serde(skip)]
    constraint: Option<TypeConstraint>,
    #[serde(skip)]
    value: Value,
}

impl VariableBlock {
    /// declared `type`, `None` when the variable accepts anything
    pub fn constraint(&self) -> Option<&TypeConstraint> {
        self.constraint.as_ref()
    }

    fn parse_description(&mut self, ctx: &EvalContext) -> Result<(), Error> {
        let Some(attribute) = self.base.raw().attribute("description") else {
            return Ok(());
        };

        match ctx.evaluate(&attribute.expr) {
            Ok(Value::String(description)) => {
                self.description = Some(description);
                Ok(())
            }
            Ok(other) => Err(Error::DescriptionType {
                range: attribute.range.clone(),
                got: value::type_name(&other),
            }),
            Err(e) => Err(Error::evaluate(&attribute.range, e)),
        }
    }

    fn parse_type(&mut self) -> Result<(), Error> {
        self.constraint = match self.base.raw().attribute("type") {
            Some(attribute) => Some(TypeConstraint::parse(&attribute.expr).map_err(|error| {
                Error::AttributeType {
                    name: "type".to_string(),
                    range: attribute.range.clone(),
                    error,
                }
            })?),
            None => None,
        };
        Ok(())
    }

    fn read_value(&self, cx: &PlanContext, ctx: &EvalContext) -> Result<Value, Error> {
        let name = self.base.name();

        let reads = cx.inputs.read()?;
        if let Some(read) = reads.get(name) {
            return read.value.clone().map_err(|message| Error::VariableValue {
                name: name.to_string(),
                message,
            });
        }

        if let Some(default) = self.base.raw().attribute("default") {
            return ctx
                .evaluate(&default.expr)
                .map_err(|e| Error::evaluate(&default.range, e));
        }

        let Some(raw) = cx.inputs.prompt(name, self.description.as_deref())? else {
            return Err(Error::NoVariableValue(name.to_string()));
        };
        parse_raw_value(&raw).map_err(|message| Error::VariableValue {
            name: name.to_string(),
            message,
        })
    }

    fn convert(&self, value: Value) -> Result<Value, Error> {
        let Some(constraint) = &self.constraint else {
            return Ok(value);
        };

        let got = value::type_name(&value);
        constraint.convert(value).map_err(|_| Error::VariableType {
            name: self.base.name().to_string(),
            want: constraint.to_string(),
            got: got.to_string(),
        })
    }

    /// Every failed `validation` is reported, not just the first
    fn validate(&mut self, ctx: &EvalContext) -> Result<(), Error> {
        let name = self.base.name().to_string();

        let mut var = hcl::Map::new();
        var.insert(name.clone(), self.value.clone());
        let ctx = ctx.with_var("var", Value::Object(var));

        let mut errors = Errors::new();
        let mut validations: Vec<VariableValidation> = vec![];
        for block in self.base.raw().nested_blocks("validation") {
            match validation_schema().decode(block, &ctx) {
                Ok(decoded) => validations.push(value::deserialize(&decoded)?),
                Err(e) => errors.absorb(e),
            }
        }
        std::mem::take(&mut errors).into_result().map_err(Errors::into_error)?;

        for validation in &validations {
            if !validation.condition {
                errors.log(Error::Validation {
                    name: name.clone(),
                    range: self.base.raw().range.clone(),
                    message: validation.error_message.clone(),
                });
            }
        }
        self.validations = validations;

        errors.into_result().map_err(Errors::into_error)
    }
}

impl BlockKind for VariableBlock {
    const BLOCK_TYPE: &'static str = "variable";
    const REF_KEYWORD: Option<&'static str> = Some("var");
    const SINGLE_VALUE: bool = true;

    fn schema() -> BlockSchema {
        BlockSchema::new()
            .attribute("description", TypeConstraint::String)
            .attribute("type", TypeConstraint::Any)
            .attribute("default", TypeConstraint::Any)
            .blocks("validation", validation_schema)
    }

    fn base(&self) -> &BaseBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBlock {
        &mut self.base
    }
}

impl Block for VariableBlock {
    fn as_pre_plan(&mut self) -> Option<&mut dyn PrePlanBlock> {
        Some(self)
    }

    fn as_custom_decode(&mut self) -> Option<&mut dyn CustomDecode> {
        Some(self)
    }

    fn as_single_value(&self) -> Option<&dyn SingleValueBlock> {
        Some(self)
    }
}

impl PrePlanBlock for VariableBlock {
    #[tracing::instrument(level = "debug", skip_all, fields(variable = %self.base.name()))]
    fn execute_before_plan(&mut self, cx: &PlanContext) -> Result<Resolution, Error> {
        // `default`, `description` and validations see functions but no other blocks
        let ctx = EvalContext::new(cx.eval.functions().clone());

        self.parse_description(&ctx)?;
        self.parse_type()?;

        let value = self.read_value(cx, &ctx)?;
        self.value = self.convert(value)?;
        self.validate(&ctx)?;

        Ok(Resolution::Ready)
    }
}

impl CustomDecode for VariableBlock {
    /// everything was resolved before planning
    fn decode(&mut self, _raw: &RawBlock, _ctx: &EvalContext) -> Result<(), Error> {
        Ok(())
    }
}

impl SingleValueBlock for VariableBlock {
    fn single_value(&self) -> Value {
        self.value.clone()
    }
}
