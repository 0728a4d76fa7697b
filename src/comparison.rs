use crate::xpath::XValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// XPath 1.0 comparison. A node-set side compares true when any of its
/// members does; the other side decides how members are converted.
pub fn cmp_values(a: &XValue, b: &XValue, op: CmpOp) -> bool {
    match (a.node_strings(), b.node_strings()) {
        (Some(xs), Some(ys)) => xs.iter().any(|x| {
            ys.iter()
                .any(|y| cmp_scalars(&XValue::Str(x.clone()), &XValue::Str(y.clone()), op))
        }),
        (Some(xs), None) => match b {
            XValue::Bool(_) => cmp_scalars(&XValue::Bool(!xs.is_empty()), b, op),
            _ => xs.into_iter().any(|x| cmp_scalars(&XValue::Str(x), b, op)),
        },
        (None, Some(ys)) => match a {
            XValue::Bool(_) => cmp_scalars(a, &XValue::Bool(!ys.is_empty()), op),
            _ => ys.into_iter().any(|y| cmp_scalars(a, &XValue::Str(y), op)),
        },
        (None, None) => cmp_scalars(a, b, op),
    }
}

fn cmp_scalars(a: &XValue, b: &XValue, op: CmpOp) -> bool {
    match op {
        CmpOp::Eq | CmpOp::Ne => {
            let equal = match (a, b) {
                (XValue::Bool(_), _) | (_, XValue::Bool(_)) => a.to_bool() == b.to_bool(),
                (XValue::Num(_), _) | (_, XValue::Num(_)) => a.to_number() == b.to_number(),
                _ => a.to_string_value() == b.to_string_value(),
            };
            (op == CmpOp::Eq) == equal
        }
        CmpOp::Lt => a.to_number() < b.to_number(),
        CmpOp::Lte => a.to_number() <= b.to_number(),
        CmpOp::Gt => a.to_number() > b.to_number(),
        CmpOp::Gte => a.to_number() >= b.to_number(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_equality_picks_the_strongest_type() {
        assert!(cmp_values(&XValue::Num(1.0), &XValue::Str("1".into()), CmpOp::Eq));
        assert!(cmp_values(&XValue::Bool(true), &XValue::Str("x".into()), CmpOp::Eq));
        assert!(cmp_values(&XValue::Str("a".into()), &XValue::Str("b".into()), CmpOp::Ne));
    }

    #[test]
    fn relational_compares_numbers() {
        assert!(cmp_values(&XValue::Str("10".into()), &XValue::Num(9.0), CmpOp::Gt));
        assert!(!cmp_values(&XValue::Str("abc".into()), &XValue::Num(9.0), CmpOp::Gt));
        assert!(cmp_values(&XValue::Num(2.0), &XValue::Num(2.0), CmpOp::Lte));
    }

    #[test]
    fn nan_is_never_equal() {
        assert!(!cmp_values(&XValue::Num(f64::NAN), &XValue::Num(f64::NAN), CmpOp::Eq));
        assert!(cmp_values(&XValue::Num(f64::NAN), &XValue::Num(f64::NAN), CmpOp::Ne));
    }
}
