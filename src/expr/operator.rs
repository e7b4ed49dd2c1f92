use super::OperatorKind;

/// Render one condition fragment from already-registered placeholders.
///
/// `value2` is only read by `between`; when it is missing the lower bound is
/// reused so the fragment stays well formed.
pub fn translate(operator: OperatorKind, key: &str, value: &str, value2: Option<&str>) -> String {
    match operator {
        OperatorKind::BeginsWith => format!("begins_with({}, {})", key, value),
        OperatorKind::Contains => format!("contains({}, {})", key, value),
        OperatorKind::NotEqual => format!("{} <> {}", key, value),
        OperatorKind::LessThan => format!("{} < {}", key, value),
        OperatorKind::LessOrEqual => format!("{} <= {}", key, value),
        OperatorKind::GreaterThan => format!("{} > {}", key, value),
        OperatorKind::GreaterOrEqual => format!("{} >= {}", key, value),
        OperatorKind::Between => {
            format!("{} BETWEEN {} AND {}", key, value, value2.unwrap_or(value))
        }
        OperatorKind::AttributeNotExists => format!("attribute_not_exists({})", key),
        OperatorKind::AttributeExists => format!("attribute_exists({})", key),
        OperatorKind::AttributeType | OperatorKind::Size | OperatorKind::Equals => {
            format!("{} = {}", key, value)
        }
    }
}
