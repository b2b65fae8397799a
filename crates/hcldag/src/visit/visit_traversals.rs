use super::Visit;
use crate::raw_block::RawBlock;
use hcl::{
    template::{Directive, Element},
    Expression, Operation, Template, Traversal, TraversalOperator,
};

/// Recursively visit all [hcl::Traversal]s
pub trait VisitTraversals {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>);
}

impl VisitTraversals for RawBlock {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        for attribute in self.attributes.values() {
            attribute.expr.visit_traversals(visitor);
        }
        for block in &self.blocks {
            block.visit_traversals(visitor);
        }
    }
}

impl VisitTraversals for Expression {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        match self {
            Expression::Variable(variable) => {
                // a standalone variable is a traversal with no operators...kind of
                let traversal = Traversal::new(
                    Expression::Variable(variable.clone()),
                    Vec::<TraversalOperator>::new(),
                );
                visitor.visit(&traversal);
            }
            Expression::Traversal(traversal) => {
                visitor.visit(traversal);
                // the root variable is part of the visited traversal already
                if !matches!(traversal.expr, Expression::Variable(_)) {
                    traversal.expr.visit_traversals(visitor);
                }
                for operator in &traversal.operators {
                    if let TraversalOperator::Index(index) = operator {
                        index.visit_traversals(visitor);
                    }
                }
            }
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_traversals(visitor);
                }
            }
            Expression::Object(object) => {
                for (key, value) in object {
                    if let hcl::ObjectKey::Expression(key) = key {
                        key.visit_traversals(visitor);
                    }
                    value.visit_traversals(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                // unparsable templates fail later, during evaluation
                if let Ok(template) = Template::from_expr(template_expr) {
                    template.visit_traversals(visitor);
                }
            }
            Expression::FuncCall(func_call) => {
                for arg in &func_call.args {
                    arg.visit_traversals(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_traversals(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_traversals(visitor);
                cond.true_expr.visit_traversals(visitor);
                cond.false_expr.visit_traversals(visitor);
            }
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_traversals(visitor);
                    binop.rhs_expr.visit_traversals(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_traversals(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr.collection_expr.visit_traversals(visitor);
                forexpr
                    .key_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(visitor));
                forexpr.value_expr.visit_traversals(visitor);
                forexpr
                    .cond_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(visitor));
            }
            _ => {}
        }
    }
}

impl VisitTraversals for Template {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        for element in self.elements() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_traversals(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_traversals(visitor);
                        ifdir.true_template.visit_traversals(visitor);
                        ifdir
                            .false_template
                            .iter()
                            .for_each(|t| t.visit_traversals(visitor));
                    }
                    Directive::For(fordir) => {
                        fordir.collection_expr.visit_traversals(visitor);
                        fordir.template.visit_traversals(visitor);
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::TraversalExt;
    use pretty_assertions::assert_eq;

    fn paths(source: &str) -> Vec<String> {
        let expr = crate::util::expression_from_edit(source.parse().unwrap());

        let mut found = vec![];
        expr.visit_traversals(&mut |traversal: &Traversal| {
            found.push(traversal.longest_path().join("."))
        });
        found
    }

    #[test]
    fn finds_traversals_everywhere() {
        assert_eq!(
            paths(r#"merge(local.a, { x = "${var.b}-%{ if data.c.d.ok }yes%{ endif }" })"#),
            ["local.a", "var.b", "data.c.d.ok"]
        );
        assert_eq!(
            paths("[for k, v in local.items : v.name if var.enabled]"),
            ["local.items", "v.name", "var.enabled"]
        );
        assert_eq!(paths("var.flag ? local.x : -local.y"), ["var.flag", "local.x", "local.y"]);
    }

    #[test]
    fn index_expressions_are_visited() {
        assert_eq!(
            paths("data.a.b[local.key].value"),
            ["data.a.b", "local.key"]
        );
    }
}
