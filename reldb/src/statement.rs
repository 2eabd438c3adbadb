//! Query descriptors: parameterized statement templates with a declared
//! result schema

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::value::Value;

/// An immutable parameterized statement plus its bound argument values.
///
/// Statement text uses named `:param` placeholders. Read statements declare
/// their result schema up front (an ordered list of column names) so the
/// result mapper never depends on driver-reported column metadata.
///
/// # Example
///
/// ```ignore
/// use reldb::Statement;
///
/// let stmt = Statement::read(
///     "SELECT USER_ID, USER_NAME FROM USERS WHERE USER_SOEID = :soeid",
///     &["USER_ID", "USER_NAME"],
/// )
/// .bind("soeid", "ab12345");
/// ```
#[derive(Debug, Clone)]
pub struct Statement {
    sql: Cow<'static, str>,
    columns: &'static [&'static str],
    params: Vec<(String, Value)>,
}

impl Statement {
    /// Create a read statement with its declared result schema.
    pub fn read(sql: impl Into<Cow<'static, str>>, columns: &'static [&'static str]) -> Self {
        Self {
            sql: sql.into(),
            columns,
            params: Vec::new(),
        }
    }

    /// Create a write statement (INSERT/UPDATE/DELETE); no result schema.
    pub fn write(sql: impl Into<Cow<'static, str>>) -> Self {
        Self {
            sql: sql.into(),
            columns: &[],
            params: Vec::new(),
        }
    }

    /// Bind a named value to the statement.
    ///
    /// Later binds shadow earlier binds of the same name.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if let Some(existing) = self.params.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value;
        } else {
            self.params.push((name.to_string(), value));
        }
        self
    }

    /// Get the statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Get the declared result schema (empty for writes and ad-hoc probes).
    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    /// Get the bound parameters.
    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    /// Rewrite named `:param` placeholders into positional `?` placeholders
    /// and produce the values in placeholder order.
    ///
    /// Placeholders inside single- or double-quoted literals are left alone.
    /// A placeholder with no bound value is an error; a repeated placeholder
    /// repeats its value.
    pub(crate) fn expand(&self) -> Result<(String, Vec<Value>)> {
        let sql = self.sql.as_ref();
        let mut out = String::with_capacity(sql.len());
        let mut values = Vec::with_capacity(self.params.len());
        let mut chars = sql.char_indices().peekable();
        let mut quote: Option<char> = None;

        while let Some((i, c)) = chars.next() {
            match quote {
                Some(q) => {
                    out.push(c);
                    if c == '\\' {
                        // Backslash escape inside the literal; the next
                        // character cannot close it.
                        if let Some((_, escaped)) = chars.next() {
                            out.push(escaped);
                        }
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => {
                        quote = Some(c);
                        out.push(c);
                    }
                    ':' => {
                        let start = i + c.len_utf8();
                        let mut end = start;
                        while let Some(&(j, n)) = chars.peek() {
                            if n.is_ascii_alphanumeric() || n == '_' {
                                end = j + n.len_utf8();
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        if end == start {
                            // Bare colon (e.g. Oracle's `::` cast has no use
                            // here, but don't mangle it either)
                            out.push(c);
                            continue;
                        }
                        let name = &sql[start..end];
                        let value = self
                            .params
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| Error::UnboundParameter(name.to_string()))?;
                        values.push(value);
                        out.push('?');
                    }
                    _ => out.push(c),
                },
            }
        }

        Ok((out, values))
    }
}
