/// Prepared statements and the dynamic partial-update builder
///
/// Repositories describe every query as a [`PreparedStatement`]: a stable name
/// (used for logging and to tell statements apart in tests), the SQL text with
/// `$n` placeholders, and the positional parameter values.
///
/// [`build_update_query`] assembles an `UPDATE` for a sparse set of columns.
/// Only truthy values are written: `null`, `false`, `0` and `""` are skipped so
/// that an omitted or blank form field never clears a stored value. The price
/// is that this builder cannot set a column to one of those values; callers
/// that need that write a dedicated statement.
///
/// # Example
///
/// ```
/// use orgdesk_shared::db::{build_update_query, UpdateFields, WhereClause};
///
/// let fields = UpdateFields::new()
///     .set("first_name", "")
///     .set("last_name", "Doe");
///
/// let stmt = build_update_query("users", &fields, &WhereClause::new().eq("user_id", 7), 7, None).unwrap();
///
/// assert_eq!(stmt.name, "update-users");
/// assert_eq!(
///     stmt.text,
///     "UPDATE users SET last_name = $1, updated_by = $2 WHERE user_id = $3 RETURNING *"
/// );
/// assert_eq!(stmt.values.len(), 3);
/// ```

use serde_json::Value;

use super::{DbError, DbResult};

/// A named SQL statement with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    /// Statement label, e.g. `find-one-user` or `update-users-email`
    pub name: String,

    /// SQL text using `$1..$n` placeholders
    pub text: String,

    /// Parameter values; `values[i]` binds to `$(i + 1)`
    pub values: Vec<Value>,
}

impl PreparedStatement {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            values: Vec::new(),
        }
    }

    /// Appends the next positional parameter
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }
}

/// Ordered column → value mapping for a partial update
///
/// Only columns that were explicitly `set` are part of the mapping; that is the
/// difference between "not sent" and "sent empty".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateFields {
    entries: Vec<(String, Value)>,
}

impl UpdateFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a column value, keeping first-insertion order
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
        self
    }

    /// Adds the column only when a value is present
    pub fn set_some<T: Into<Value>>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }
}

/// Conjunction of `column = value` conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    conditions: Vec<(String, Value)>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Returns whether a value counts as "set" for partial updates
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Checks that a name can be spliced into SQL text as an identifier
pub fn validate_identifier(name: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Builds a parameterized partial `UPDATE ... RETURNING *`
///
/// # Arguments
///
/// * `table` - Table to update
/// * `fields` - Columns to update; falsy values are skipped
/// * `where_clause` - Row selector; must not be empty
/// * `acting_user_id` - Written to `updated_by` as an audit trail
/// * `label_suffix` - Distinguishes several update shapes on one table
///
/// # Errors
///
/// - `DbError::ParametersRequired` if `fields` is empty, holds no truthy
///   value, or `where_clause` is empty
/// - `DbError::InvalidIdentifier` if a table or column name is not a plain identifier
pub fn build_update_query(
    table: &str,
    fields: &UpdateFields,
    where_clause: &WhereClause,
    acting_user_id: i64,
    label_suffix: Option<&str>,
) -> DbResult<PreparedStatement> {
    if fields.is_empty() {
        return Err(DbError::ParametersRequired(format!(
            "No fields were supplied to update {}",
            table
        )));
    }
    if where_clause.is_empty() {
        return Err(DbError::ParametersRequired(format!(
            "Refusing to update {} without a WHERE condition",
            table
        )));
    }
    validate_identifier(table)?;

    let mut assignments = Vec::with_capacity(fields.len() + 1);
    let mut values = Vec::with_capacity(fields.len() + 1 + where_clause.conditions.len());

    for (column, value) in fields.iter() {
        validate_identifier(column)?;
        if !is_truthy(value) {
            continue;
        }
        values.push(value.clone());
        assignments.push(format!("{} = ${}", column, values.len()));
    }

    if assignments.is_empty() {
        return Err(DbError::ParametersRequired(format!(
            "None of the supplied fields for {} carry a value",
            table
        )));
    }

    values.push(Value::from(acting_user_id));
    assignments.push(format!("updated_by = ${}", values.len()));

    let mut conditions = Vec::with_capacity(where_clause.conditions.len());
    for (column, value) in &where_clause.conditions {
        validate_identifier(column)?;
        values.push(value.clone());
        conditions.push(format!("{} = ${}", column, values.len()));
    }

    let text = format!(
        "UPDATE {} SET {} WHERE {} RETURNING *",
        table,
        assignments.join(", "),
        conditions.join(" AND ")
    );

    let name = match label_suffix {
        Some(suffix) => format!("update-{}-{}", table, suffix),
        None => format!("update-{}", table),
    };

    Ok(PreparedStatement { name, text, values })
}
