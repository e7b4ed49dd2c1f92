#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    UnsupportedValueType { value_type: String },
    UnknownLogicalOperator { operator: String },
    UnknownOperator { operator: String },
    UnknownSortOrder { sort: String },
    InvalidFieldName { field: String },
    MissingUpperBound { field: String },
    InvalidPartitionKey { message: String },
    InvalidUpdateDocument { message: String },
}

impl std::fmt::Display for ExprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprError::UnsupportedValueType { value_type } => {
                write!(f, "Unsupported value type '{}'", value_type)
            }
            ExprError::UnknownLogicalOperator { operator } => {
                write!(
                    f,
                    "Unknown logical operator '{}', expected AND or OR",
                    operator
                )
            }
            ExprError::UnknownOperator { operator } => {
                write!(f, "Unknown comparison operator '{}'", operator)
            }
            ExprError::UnknownSortOrder { sort } => {
                write!(f, "Unknown sort order '{}', expected ASC or DESC", sort)
            }
            ExprError::InvalidFieldName { field } => {
                write!(
                    f,
                    "Field '{}' has no characters usable in a placeholder",
                    field
                )
            }
            ExprError::MissingUpperBound { field } => {
                write!(f, "BETWEEN filter on '{}' is missing value2", field)
            }
            ExprError::InvalidPartitionKey { message } => {
                write!(f, "Invalid partition key: {}", message)
            }
            ExprError::InvalidUpdateDocument { message } => {
                write!(f, "Invalid update document: {}", message)
            }
        }
    }
}

impl std::error::Error for ExprError {}
