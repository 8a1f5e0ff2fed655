use aclkit_security::IdValue;
use aclkit_security::permission::{ALL, PREFIX_DELIMITER, Permission, READ};
use sea_orm::Condition;
use sea_orm::sea_query::{Alias, Expr, LikeExpr, SimpleExpr};

/// Escape character for LIKE patterns. Rendered verbatim by every backend.
const LIKE_ESCAPE: char = '!';

/// Build a deny-all condition (`WHERE false`).
pub fn deny_all() -> Condition {
    Condition::all().add(Expr::value(false))
}

/// Convert an [`IdValue`] to a bindable expression.
pub fn id_value_to_sea_expr(v: &IdValue) -> SimpleExpr {
    match v {
        IdValue::Uuid(u) => Expr::value(*u),
        IdValue::String(s) => Expr::value(s.clone()),
        IdValue::Int(n) => Expr::value(*n),
    }
}

/// Column reference qualified by a table name or join alias.
pub fn qualified(alias: &str, column: &str) -> Expr {
    Expr::col((Alias::new(alias), Alias::new(column)))
}

/// `left.left_col = right.right_col`
pub fn columns_eq(left: (&str, &str), right: (&str, &str)) -> SimpleExpr {
    qualified(left.0, left.1).equals((Alias::new(right.0), Alias::new(right.1)))
}

/// Escape LIKE metacharacters so a scope matches literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Condition on a permission-link column granting `requested`.
///
/// One disjunct per scope level of the request, innermost first:
///
/// | Scope | `read` | other base `b` |
/// |-------|--------|----------------|
/// | `""` | `NOT LIKE '%:%'` | `= 'all' OR = 'b'` |
/// | `p` | `LIKE 'p%'` | `= 'p' + 'all' OR = 'p' + 'b'` |
pub fn permission_grant_condition(alias: &str, field: &str, requested: &str) -> Condition {
    let requested = Permission::parse(requested);
    let base = requested.base();
    let column = || qualified(alias, field);

    requested.scopes().fold(Condition::any(), |any, scope| {
        if scope.is_empty() {
            if base == READ {
                any.add(column().not_like(format!("%{PREFIX_DELIMITER}%")))
            } else {
                any.add(column().eq(ALL)).add(column().eq(base))
            }
        } else if base == READ {
            let pattern = format!("{}%", escape_like(scope));
            any.add(column().like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)))
        } else {
            any.add(column().eq(format!("{scope}{ALL}")))
                .add(column().eq(format!("{scope}{base}")))
        }
    })
}
