use crate::registry::BlockRegistry;
use crate::visit;
use hcl::{Expression, Operation, Traversal, TraversalOperator};
use indexmap::IndexSet;

/// Collects the addresses of blocks referenced by the visited traversals
///
/// Only traversals rooted at a registered reference keyword count. The first `address length`
/// attribute names form the address, everything after that (attributes of the block, `[key]` of an
/// expanded block) is ignored.
#[derive(derive_new::new)]
pub(crate) struct ReferenceCollector<'r> {
    registry: &'r BlockRegistry,
    #[new(default)]
    pub addresses: IndexSet<String>,
}

impl<'r> visit::Visit<Traversal> for ReferenceCollector<'r> {
    #[tracing::instrument(level = "trace", skip_all)]
    fn visit(&mut self, traversal: &Traversal) {
        let path = traversal.longest_path();
        let Some(root) = path.first() else {
            return;
        };
        let Some(address_length) = self.registry.address_length(root) else {
            return;
        };
        if path.len() < address_length {
            return;
        }

        let address = path[..address_length].join(".");
        tracing::trace!(%address, "reference found");
        self.addresses.insert(address);
    }
}

pub(crate) trait TraversalExt {
    fn longest_path(&self) -> Vec<String>;
    fn as_address(&self) -> Option<String>;
}

impl TraversalExt for Traversal {
    /// Root variable followed by all leading attribute accesses
    fn longest_path(&self) -> Vec<String> {
        let Expression::Variable(var) = &self.expr else {
            return vec![];
        };

        let mut path = vec![var.to_string()];
        for operator in &self.operators {
            let TraversalOperator::GetAttr(ident) = operator else {
                break;
            };

            path.push(ident.to_string());
        }

        path
    }

    /// `a.b.c` for a plain attribute traversal, `None` if it contains anything else
    fn as_address(&self) -> Option<String> {
        let path = self.longest_path();
        if path.is_empty() || path.len() != self.operators.len() + 1 {
            return None;
        }
        Some(path.join("."))
    }
}

/// Convert a parsed expression, fixing the placement of unary operators
///
/// `-local.a` and `!var.b` are parsed as traversals of `-local` and `!var`. The operator is moved
/// in front of the whole traversal so the reference is found and the expression evaluates.
pub(crate) fn expression_from_edit(expr: hcl_edit::expr::Expression) -> Expression {
    let mut expr = expr.into();
    hoist_unary_operators(&mut expr);
    expr
}

fn hoist_unary_operators(expr: &mut Expression) {
    match expr {
        Expression::Traversal(traversal) => {
            hoist_unary_operators(&mut traversal.expr);
            for operator in traversal.operators.iter_mut() {
                if let TraversalOperator::Index(index) = operator {
                    hoist_unary_operators(index);
                }
            }

            let unary_root = match &traversal.expr {
                Expression::Operation(operation) => matches!(**operation, Operation::Unary(_)),
                _ => false,
            };
            if !unary_root {
                return;
            }

            let operators = std::mem::take(&mut traversal.operators);
            let Expression::Operation(operation) = &mut traversal.expr else {
                return;
            };
            let Operation::Unary(unary) = operation.as_mut() else {
                return;
            };
            let operand = std::mem::replace(&mut unary.expr, Expression::Null);
            unary.expr = Expression::Traversal(Box::new(Traversal::new(operand, operators)));

            let hoisted = std::mem::replace(&mut traversal.expr, Expression::Null);
            *expr = hoisted;
        }
        Expression::Array(array) => array.iter_mut().for_each(hoist_unary_operators),
        Expression::Object(object) => {
            for (_, value) in object.iter_mut() {
                hoist_unary_operators(value);
            }
        }
        Expression::FuncCall(func_call) => {
            func_call.args.iter_mut().for_each(hoist_unary_operators)
        }
        Expression::Parenthesis(inner) => hoist_unary_operators(inner),
        Expression::Conditional(cond) => {
            hoist_unary_operators(&mut cond.cond_expr);
            hoist_unary_operators(&mut cond.true_expr);
            hoist_unary_operators(&mut cond.false_expr);
        }
        Expression::Operation(operation) => match operation.as_mut() {
            Operation::Binary(binary) => {
                hoist_unary_operators(&mut binary.lhs_expr);
                hoist_unary_operators(&mut binary.rhs_expr);
            }
            Operation::Unary(unary) => hoist_unary_operators(&mut unary.expr),
        },
        Expression::ForExpr(for_expr) => {
            hoist_unary_operators(&mut for_expr.collection_expr);
            if let Some(key_expr) = &mut for_expr.key_expr {
                hoist_unary_operators(key_expr);
            }
            hoist_unary_operators(&mut for_expr.value_expr);
            if let Some(cond_expr) = &mut for_expr.cond_expr {
                hoist_unary_operators(cond_expr);
            }
        }
        _ => {}
    }
}
