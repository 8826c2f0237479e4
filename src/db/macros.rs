/// Build a dynamic SQL SET clause field-by-field.
///
/// If the `Option` is `Some`, appends `"column = ?N"` to `sets` and
/// increments `param_idx`.
///
/// ```ignore
/// push_field!(input.amount, "amount", sets, param_idx);
/// ```
#[macro_export]
macro_rules! push_field {
    ($field:expr, $col:literal, $sets:expr, $param_idx:expr) => {
        if $field.is_some() {
            $sets.push(format!("{} = ?{}", $col, $param_idx));
            $param_idx += 1;
        }
    };
}

/// Push the boxed value of an `Option` field onto a parameter list, in the
/// same order the matching `push_field!` calls appended SET clauses.
///
/// ```ignore
/// push_value!(input.amount, param_values);
/// ```
#[macro_export]
macro_rules! push_value {
    ($field:expr, $values:expr) => {
        if let Some(ref v) = $field {
            $values.push(Box::new(v.clone()) as Box<dyn rusqlite::types::ToSql>);
        }
    };
}
