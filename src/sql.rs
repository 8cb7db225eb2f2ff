// ABOUTME: SQL quoting helpers shared by the filter compiler and synchronizer
// ABOUTME: Double-quote identifiers, single-quote literals, escape by doubling

/// Quote a SQL identifier (table or column name).
///
/// Wraps the identifier in double quotes and escapes embedded double quotes
/// by doubling them. Valid for both SQLite and PostgreSQL.
pub fn quote_ident(identifier: &str) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push('"');
    for ch in identifier.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Quote a SQL string literal.
///
/// Escapes single quotes by doubling them and wraps the string in single
/// quotes.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push('\'');
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    quoted
}
