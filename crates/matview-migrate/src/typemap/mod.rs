//! Column type mapping from source metadata to target declarations.
//!
//! The reported type name is kept as-is; only a width qualifier is added,
//! chosen by the type's [`TypeFamily`].

use crate::core::ColumnDescriptor;

/// Numeric type names that take `(precision[,scale])`.
const DECIMAL_TYPES: &[&str] = &["number", "numeric", "decimal", "dec"];

/// Closed classification of reported column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// Any type whose name contains `CHAR` (char, varchar, nvarchar, bpchar...).
    Character,
    /// Decimal with digits after the point.
    FixedPoint,
    /// Decimal with an explicit width and no fractional digits.
    IntegerLike,
    /// Decimal without a reported width.
    UnboundedDecimal,
    /// Everything else.
    Other,
}

impl TypeFamily {
    /// Classify a reported type.
    pub fn classify(native_type: &str, precision: i32, scale: i32) -> Self {
        let lower = native_type.to_lowercase();

        if lower.contains("char") {
            return TypeFamily::Character;
        }

        if DECIMAL_TYPES.contains(&lower.as_str()) {
            return if precision <= 0 {
                TypeFamily::UnboundedDecimal
            } else if scale > 0 {
                TypeFamily::FixedPoint
            } else {
                TypeFamily::IntegerLike
            };
        }

        TypeFamily::Other
    }

    /// Width qualifier for this family, if any.
    fn qualifier(self, precision: i32, scale: i32) -> Option<String> {
        match self {
            // Unbounded character types report no length
            TypeFamily::Character if precision > 0 => Some(format!("({})", precision)),
            TypeFamily::Character => None,
            TypeFamily::FixedPoint => Some(format!("({},{})", precision, scale)),
            TypeFamily::IntegerLike => Some(format!("({})", precision)),
            TypeFamily::UnboundedDecimal | TypeFamily::Other => None,
        }
    }
}

/// Map a reported column type to a target column declaration.
///
/// Total over every input: unknown types pass through unqualified.
pub fn map_column_type(native_type: &str, precision: i32, scale: i32) -> String {
    let family = TypeFamily::classify(native_type, precision, scale);
    match family.qualifier(precision, scale) {
        Some(q) => format!("{}{}", native_type, q),
        None => native_type.to_string(),
    }
}

/// Map a column descriptor to its target declaration.
pub fn map_column(col: &ColumnDescriptor) -> String {
    map_column_type(&col.native_type, col.precision, col.scale)
}
