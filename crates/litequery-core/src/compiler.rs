//! Translation of expression nodes into parameterized SQL.
//!
//! Every node compiles to a [`CompileResult`]: a SQL fragment plus, for
//! literal-like nodes, the value it stands for. Ancestors use the carried
//! value to detect comparisons against `null`, which SQL only expresses
//! with `is` / `is not`.

use tracing::trace;

use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::schema::TableMapping;
use crate::value::{MemberAccess, SqlValue, Value};

/// The output of compiling one node.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    /// SQL fragment.
    pub sql: String,
    /// Literal value the fragment stands for, if any.
    pub value: Option<Value>,
}

/// A compiled fragment with the arguments its placeholders consume.
///
/// Arguments travel with the fragment so that combining fragments keeps
/// placeholders and arguments in the same order.
#[derive(Debug)]
struct Fragment {
    sql: String,
    value: Option<Value>,
    args: Vec<SqlValue>,
    textual: bool,
}

impl Fragment {
    fn sql(sql: String, args: Vec<SqlValue>) -> Self {
        Self {
            sql,
            value: None,
            args,
            textual: false,
        }
    }

    fn is_null_placeholder(&self) -> bool {
        self.sql == "?" && self.value.as_ref().is_some_and(Value::is_null)
    }
}

/// Compiles expressions over the rows of one table.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    mapping: &'a TableMapping,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler resolving members against `mapping`.
    #[must_use]
    pub const fn new(mapping: &'a TableMapping) -> Self {
        Self { mapping }
    }

    /// Compiles `expr`, appending its arguments to `params`.
    ///
    /// Nothing is appended if compilation fails.
    pub fn compile(&self, expr: &Expr, params: &mut Vec<SqlValue>) -> Result<CompileResult> {
        let fragment = self.fragment(expr)?;
        trace!(sql = %fragment.sql, args = fragment.args.len(), "compiled expression");
        params.extend(fragment.args);
        Ok(CompileResult {
            sql: fragment.sql,
            value: fragment.value,
        })
    }

    /// Resolves a row member access to its quoted column name.
    pub fn column_name(&self, expr: &Expr) -> Option<Result<String>> {
        match expr {
            Expr::Member { target, member } if **target == Expr::Parameter => Some(
                self.mapping
                    .find_column_with_property_name(member)
                    .map(|c| c.quoted_name()),
            ),
            _ => None,
        }
    }

    fn fragment(&self, expr: &Expr) -> Result<Fragment> {
        match expr {
            Expr::Binary { op, left, right } => self.binary(expr, *op, left, right),
            Expr::Call {
                method,
                receiver,
                args,
            } => self.call(expr, method, receiver.as_deref(), args),
            Expr::Constant(value) => self.placeholder(value.clone()),
            Expr::Unary {
                op: UnaryOp::Convert(kind),
                operand,
            } => {
                let mut inner = self.fragment(operand)?;
                inner.value = inner.value.map(|v| v.convert_to(kind)).transpose()?;
                inner.textual |= kind.is_textual();
                Ok(inner)
            }
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.not(operand),
            Expr::Member { target, member } => {
                if **target == Expr::Parameter {
                    let column = self.mapping.find_column_with_property_name(member)?;
                    let mut fragment = Fragment::sql(column.quoted_name(), Vec::new());
                    fragment.textual = column.kind.is_textual();
                    return Ok(fragment);
                }
                let value = self.member_value(target, member)?;
                self.expand(value)
            }
            Expr::Captured { value, .. } => self.expand(value.clone()),
            Expr::Parameter | Expr::Lambda { .. } => Err(Error::UnsupportedExpression(
                format!("{} node {expr}", expr.kind_name()),
            )),
        }
    }

    fn binary(&self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Fragment> {
        let left = self.fragment(left)?;
        let right = self.fragment(right)?;
        if left.is_null_placeholder() {
            return null_comparison(expr, op, right, left.args);
        }
        if right.is_null_placeholder() {
            return null_comparison(expr, op, left, right.args);
        }
        let token = op
            .sql_token()
            .ok_or_else(|| Error::UnsupportedOperator(format!("{} in {expr}", op.symbol())))?;
        Ok(Fragment::sql(
            format!("({} {token} {})", left.sql, right.sql),
            concat(left.args, right.args),
        ))
    }

    fn call(
        &self,
        expr: &Expr,
        method: &str,
        receiver: Option<&Expr>,
        args: &[Expr],
    ) -> Result<Fragment> {
        let receiver = receiver.map(|r| self.fragment(r)).transpose()?;
        let mut args = args
            .iter()
            .map(|a| self.fragment(a))
            .collect::<Result<Vec<_>>>()?;

        let need_receiver = |receiver: Option<Fragment>| {
            receiver.ok_or_else(|| {
                Error::UnsupportedExpression(format!("{method} without a receiver in {expr}"))
            })
        };

        let fragment = match (method, args.len()) {
            ("like", 2) if receiver.is_none() => {
                let pattern = args.remove(1);
                let value = args.remove(0);
                Fragment::sql(
                    format!("({} like {})", value.sql, pattern.sql),
                    concat(value.args, pattern.args),
                )
            }
            ("contains", 2) if receiver.is_none() => {
                let item = args.remove(1);
                let collection = args.remove(0);
                Fragment::sql(
                    format!("({} in {})", item.sql, collection.sql),
                    concat(item.args, collection.args),
                )
            }
            ("contains", 1) => {
                let receiver = need_receiver(receiver)?;
                let item = args.remove(0);
                if receiver.textual {
                    Fragment::sql(
                        format!("({} like ('%' || {} || '%'))", receiver.sql, item.sql),
                        concat(receiver.args, item.args),
                    )
                } else {
                    Fragment::sql(
                        format!("({} in {})", item.sql, receiver.sql),
                        concat(item.args, receiver.args),
                    )
                }
            }
            ("starts_with", 1) => {
                let receiver = need_receiver(receiver)?;
                let prefix = args.remove(0);
                Fragment::sql(
                    format!("({} like ({} || '%'))", receiver.sql, prefix.sql),
                    concat(receiver.args, prefix.args),
                )
            }
            ("ends_with", 1) => {
                let receiver = need_receiver(receiver)?;
                let suffix = args.remove(0);
                Fragment::sql(
                    format!("({} like ('%' || {}))", receiver.sql, suffix.sql),
                    concat(receiver.args, suffix.args),
                )
            }
            ("equals", 1) => {
                let receiver = need_receiver(receiver)?;
                let other = args.remove(0);
                Fragment::sql(
                    format!("({} = ({}))", receiver.sql, other.sql),
                    concat(receiver.args, other.args),
                )
            }
            ("to_lower", 0) => {
                let receiver = need_receiver(receiver)?;
                let mut fragment =
                    Fragment::sql(format!("(lower({}))", receiver.sql), receiver.args);
                fragment.textual = true;
                fragment
            }
            _ => {
                let operands: Vec<Fragment> = receiver.into_iter().chain(args).collect();
                let mut sql = Vec::with_capacity(operands.len());
                let mut call_args = Vec::new();
                for operand in operands {
                    sql.push(operand.sql);
                    call_args.extend(operand.args);
                }
                Fragment::sql(
                    format!("{}({})", method.to_lowercase(), sql.join(",")),
                    call_args,
                )
            }
        };
        Ok(fragment)
    }

    fn not(&self, operand: &Expr) -> Result<Fragment> {
        let inner = self.fragment(operand)?;
        let sql = match operand {
            Expr::Member { .. } | Expr::Captured { .. } => format!("{} = 0", inner.sql),
            Expr::Call { .. } => negate_call(&inner.sql),
            _ => {
                return Err(Error::UnsupportedExpression(format!(
                    "negation of {} node {operand}",
                    operand.kind_name()
                )));
            }
        };
        Ok(Fragment::sql(sql, inner.args))
    }

    /// Evaluates `target.member` on a captured value.
    fn member_value(&self, target: &Expr, member: &str) -> Result<Value> {
        let base = self.evaluate(target)?;
        if base.is_null() {
            return Err(Error::NullReference {
                member: format!("{target}.{member}"),
            });
        }
        base.member_value(member)
            .ok_or_else(|| Error::UnknownMember(format!("{target}.{member}")))
    }

    /// Evaluates a node that does not depend on the row.
    fn evaluate(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Constant(value) | Expr::Captured { value, .. } => Ok(value.clone()),
            Expr::Member { target, member } if **target != Expr::Parameter => {
                self.member_value(target, member)
            }
            Expr::Unary {
                op: UnaryOp::Convert(kind),
                operand,
            } => self.evaluate(operand)?.convert_to(kind),
            _ => Err(Error::UnsupportedExpression(format!(
                "member access on {} node {expr}",
                expr.kind_name()
            ))),
        }
    }

    /// Binds a value read from the calling scope, expanding collections.
    fn expand(&self, value: Value) -> Result<Fragment> {
        match value {
            Value::List(items) => {
                let args = items
                    .iter()
                    .map(|item| self.mapping.bind(item))
                    .collect::<Result<Vec<_>>>()?;
                let sql = format!("({})", vec!["?"; args.len()].join(","));
                Ok(Fragment {
                    sql,
                    value: Some(Value::List(items)),
                    args,
                    textual: false,
                })
            }
            other => self.placeholder(other),
        }
    }

    fn placeholder(&self, value: Value) -> Result<Fragment> {
        let arg = self.mapping.bind(&value)?;
        Ok(Fragment {
            sql: String::from("?"),
            textual: matches!(value, Value::Text(_)),
            value: Some(value),
            args: vec![arg],
        })
    }
}

fn null_comparison(
    expr: &Expr,
    op: BinaryOp,
    other: Fragment,
    null_args: Vec<SqlValue>,
) -> Result<Fragment> {
    let keyword = match op {
        BinaryOp::Eq => "is",
        BinaryOp::Ne => "is not",
        _ => {
            return Err(Error::UnsupportedExpression(format!(
                "{} against null in {expr}",
                op.symbol()
            )));
        }
    };
    Ok(Fragment::sql(
        format!("({} {keyword} ?)", other.sql),
        concat(other.args, null_args),
    ))
}

/// Rewrites a compiled call into its negation.
///
/// Only the first operator class present is rewritten. The substitution
/// works on the rendered text, so it is only reliable for a single call.
fn negate_call(sql: &str) -> String {
    for (from, to) in [(" like ", " not like "), (" in ", " not in "), (" = ", " <> ")] {
        if sql.contains(from) {
            return sql.replace(from, to);
        }
    }
    sql.to_owned()
}

fn concat(mut first: Vec<SqlValue>, second: Vec<SqlValue>) -> Vec<SqlValue> {
    first.extend(second);
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{call, captured, constant, field, lambda, like, null};
    use crate::schema::{AttributeColumnInfo, ColumnAttribute, CreateFlags, MemberDescriptor, TypeDescriptor};
    use crate::types::{TypeMapper, ValueKind};

    fn mapping() -> TableMapping {
        let ty = TypeDescriptor::new("T")
            .member(MemberDescriptor::new("Id", ValueKind::I64).attribute(ColumnAttribute::PrimaryKey))
            .member(MemberDescriptor::new("Name", ValueKind::Text))
            .member(MemberDescriptor::new("Done", ValueKind::Bool))
            .member(
                MemberDescriptor::new("Datum", ValueKind::I32)
                    .attribute(ColumnAttribute::Name(String::from("datum"))),
            );
        TableMapping::resolve(
            &ty,
            CreateFlags::NONE,
            &TypeMapper::new(),
            &AttributeColumnInfo,
        )
        .unwrap()
    }

    fn compile(expr: &Expr) -> Result<(String, Vec<SqlValue>)> {
        let mapping = mapping();
        let mut params = Vec::new();
        let result = Compiler::new(&mapping).compile(expr, &mut params)?;
        Ok((result.sql, params))
    }

    #[test]
    fn test_member_uses_column_name() {
        let (sql, params) = compile(&field("Datum")).unwrap();
        assert_eq!(sql, "\"datum\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_unknown_member() {
        assert!(matches!(
            compile(&field("Missing")),
            Err(Error::UnknownMember(_))
        ));
    }

    #[test]
    fn test_comparison_operators() {
        let (sql, params) = compile(&field("Id").ge(3).and(field("Id").ne(7))).unwrap();
        assert_eq!(sql, "((\"Id\" >= ?) and (\"Id\" != ?))");
        assert_eq!(params, vec![SqlValue::Integer(3), SqlValue::Integer(7)]);
    }

    #[test]
    fn test_null_comparisons() {
        let (sql, params) = compile(&field("Id").eq(null())).unwrap();
        assert_eq!(sql, "(\"Id\" is ?)");
        assert_eq!(params, vec![SqlValue::Null]);

        let (sql, _) = compile(&null().ne(field("Name"))).unwrap();
        assert_eq!(sql, "(\"Name\" is not ?)");

        assert!(matches!(
            compile(&field("Id").gt(null())),
            Err(Error::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_unsupported_operator() {
        let expr = field("Id").binary(BinaryOp::Add, 1).eq(2);
        let err = compile(&expr).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperator(_)));
        assert!(err.to_string().contains('+'));
    }

    #[test]
    fn test_text_methods() {
        let (sql, params) = compile(&field("Name").starts_with("ab")).unwrap();
        assert_eq!(sql, "(\"Name\" like (? || '%'))");
        assert_eq!(params, vec![SqlValue::Text(String::from("ab"))]);

        let (sql, _) = compile(&field("Name").ends_with("z")).unwrap();
        assert_eq!(sql, "(\"Name\" like ('%' || ?))");

        let (sql, _) = compile(&field("Name").contains("mid")).unwrap();
        assert_eq!(sql, "(\"Name\" like ('%' || ? || '%'))");

        let (sql, _) = compile(&field("Name").to_lower().equals("bob")).unwrap();
        assert_eq!(sql, "((lower(\"Name\")) = (?))");

        let (sql, _) = compile(&like(field("Name"), "a_c")).unwrap();
        assert_eq!(sql, "(\"Name\" like ?)");
    }

    #[test]
    fn test_collection_contains() {
        let ids = captured("ids", Value::list([1, 2, 3]));
        let (sql, params) = compile(&ids.contains(field("Id"))).unwrap();
        assert_eq!(sql, "(\"Id\" in (?,?,?))");
        assert_eq!(
            params,
            vec![
                SqlValue::Integer(1),
                SqlValue::Integer(2),
                SqlValue::Integer(3)
            ]
        );

        let empty = captured("ids", Value::List(Vec::new()));
        let (sql, params) = compile(&empty.contains(field("Id"))).unwrap();
        assert_eq!(sql, "(\"Id\" in ())");
        assert!(params.is_empty());
    }

    #[test]
    fn test_free_contains_keeps_placeholder_order() {
        let expr = call(
            "contains",
            vec![captured("ids", Value::list([1, 2])), constant(9)],
        );
        let (sql, params) = compile(&expr).unwrap();
        assert_eq!(sql, "(? in (?,?))");
        assert_eq!(
            params,
            vec![
                SqlValue::Integer(9),
                SqlValue::Integer(1),
                SqlValue::Integer(2)
            ]
        );
    }

    #[test]
    fn test_captured_record_member() {
        let filter = captured(
            "filter",
            Value::record([
                ("name", Value::Text(String::from("bob"))),
                ("ids", Value::list([4, 5])),
            ]),
        );
        let (sql, params) = compile(&field("Name").eq(filter.clone().member("name"))).unwrap();
        assert_eq!(sql, "(\"Name\" = ?)");
        assert_eq!(params, vec![SqlValue::Text(String::from("bob"))]);

        let (sql, params) = compile(&filter.member("ids").contains(field("Id"))).unwrap();
        assert_eq!(sql, "(\"Id\" in (?,?))");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_member_of_null_capture_fails() {
        let expr = field("Name").eq(captured("filter", Value::Null).member("name"));
        assert!(matches!(
            compile(&expr),
            Err(Error::NullReference { .. })
        ));
    }

    #[test]
    fn test_not() {
        let (sql, _) = compile(&field("Done").not()).unwrap();
        assert_eq!(sql, "\"Done\" = 0");

        let (sql, _) = compile(&field("Name").starts_with("a").not()).unwrap();
        assert_eq!(sql, "(\"Name\" not like (? || '%'))");

        let ids = captured("ids", Value::list([1]));
        let (sql, _) = compile(&ids.contains(field("Id")).not()).unwrap();
        assert_eq!(sql, "(\"Id\" not in (?))");

        let (sql, _) = compile(&field("Id").equals(1).not()).unwrap();
        assert_eq!(sql, "(\"Id\" <> (?))");

        assert!(matches!(
            compile(&field("Id").eq(1).not()),
            Err(Error::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_conversion_carries_value() {
        let (sql, params) = compile(&field("Id").eq(constant(2.6).convert(ValueKind::I64))).unwrap();
        assert_eq!(sql, "(\"Id\" = ?)");
        assert_eq!(params, vec![SqlValue::Real(2.6)]);

        let (sql, _) = compile(&field("Id").eq(constant(Value::Null).convert(ValueKind::I32))).unwrap();
        assert_eq!(sql, "(\"Id\" is ?)");

        assert!(matches!(
            compile(&constant("x").convert(ValueKind::I32)),
            Err(Error::Conversion { .. })
        ));
    }

    #[test]
    fn test_generic_call_lowercases_name() {
        let (sql, params) = compile(&call("ABS", vec![field("Id")]).gt(3)).unwrap();
        assert_eq!(sql, "(abs(\"Id\") > ?)");
        assert_eq!(params, vec![SqlValue::Integer(3)]);

        let (sql, _) = compile(&field("Name").method("Length", Vec::new())).unwrap();
        assert_eq!(sql, "length(\"Name\")");
    }

    #[test]
    fn test_lambda_and_parameter_rejected() {
        assert!(matches!(
            compile(&lambda(field("Done"))),
            Err(Error::UnsupportedExpression(_))
        ));
        assert!(matches!(
            compile(&Expr::Parameter),
            Err(Error::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_failed_compile_leaves_params_untouched() {
        let mapping = mapping();
        let mut params = vec![SqlValue::Integer(1)];
        let expr = field("Id").eq(1).and(field("Id").lt(null()));
        assert!(Compiler::new(&mapping).compile(&expr, &mut params).is_err());
        assert_eq!(params, vec![SqlValue::Integer(1)]);
    }
}
