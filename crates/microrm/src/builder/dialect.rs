//! Identifier quoting and placeholder styles.
//!
//! A [`Dialect`] only decides how identifiers and placeholders are spelled.
//! Clause construction is the same for every dialect.

use std::collections::HashSet;

/// How identifiers are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentQuote {
    /// `` `name` `` (MySQL)
    Backtick,
    /// `"name"` (Postgres, ANSI)
    DoubleQuote,
}

impl IdentQuote {
    fn char(self) -> char {
        match self {
            IdentQuote::Backtick => '`',
            IdentQuote::DoubleQuote => '"',
        }
    }
}

/// How bound parameters are written into the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, bound by 1-based position.
    Positional,
    /// `:column`, bound by name. Repeated columns get `_2`, `_3`, ... suffixes.
    Named,
    /// `$1`, `$2`, ...
    Numbered,
}

/// SQL spelling rules for one database family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub quote: IdentQuote,
    pub placeholders: PlaceholderStyle,
    /// Operator comparing a column against a bound value that may be null.
    pub null_test: &'static str,
    /// Whether INSERT supports a `RETURNING` clause.
    pub returning: bool,
}

impl Dialect {
    /// Backtick identifiers, `?` placeholders.
    pub const MYSQL: Dialect = Dialect::new(IdentQuote::Backtick, PlaceholderStyle::Positional);

    /// Double-quoted identifiers, `$n` placeholders.
    ///
    /// Postgres does not accept `IS $n`, so null filters compare with
    /// `IS NOT DISTINCT FROM`. Generated ids come back through `RETURNING`.
    pub const POSTGRES: Dialect =
        Dialect::new(IdentQuote::DoubleQuote, PlaceholderStyle::Numbered)
            .with_null_test("IS NOT DISTINCT FROM")
            .with_returning();

    /// A dialect whose null filters render as `column IS <placeholder>`.
    pub const fn new(quote: IdentQuote, placeholders: PlaceholderStyle) -> Self {
        Self {
            quote,
            placeholders,
            null_test: "IS",
            returning: false,
        }
    }

    pub const fn with_null_test(mut self, operator: &'static str) -> Self {
        self.null_test = operator;
        self
    }

    pub const fn with_returning(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Quote an identifier, treating `.` as a part separator.
    ///
    /// The quote character is escaped by doubling it.
    pub fn quote_ident(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.write_ident(name, &mut out);
        out
    }

    pub(crate) fn write_ident(&self, name: &str, out: &mut String) {
        let q = self.quote.char();
        for (i, part) in name.split('.').enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push(q);
            for ch in part.chars() {
                if ch == q {
                    out.push(q);
                }
                out.push(ch);
            }
            out.push(q);
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::MYSQL
    }
}

/// Allocates placeholders for one statement.
#[derive(Debug)]
pub(crate) struct Placeholders {
    style: PlaceholderStyle,
    count: usize,
    used: HashSet<String>,
}

impl Placeholders {
    pub(crate) fn new(style: PlaceholderStyle) -> Self {
        Self {
            style,
            count: 0,
            used: HashSet::new(),
        }
    }

    /// Allocate the next placeholder for `column`.
    ///
    /// Returns `(sql, binding_name)`. Positional and numbered placeholders are
    /// named by their 1-based index.
    pub(crate) fn next(&mut self, column: &str) -> (String, String) {
        self.count += 1;
        match self.style {
            PlaceholderStyle::Positional => ("?".to_string(), self.count.to_string()),
            PlaceholderStyle::Numbered => (format!("${}", self.count), self.count.to_string()),
            PlaceholderStyle::Named => {
                let name = self.unique_name(column);
                (format!(":{name}"), name)
            }
        }
    }

    fn unique_name(&mut self, column: &str) -> String {
        let mut base: String = column
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() {
            base.push('p');
        }

        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.used.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_per_dialect() {
        assert_eq!(Dialect::MYSQL.quote_ident("users"), "`users`");
        assert_eq!(Dialect::POSTGRES.quote_ident("users"), "\"users\"");
    }

    #[test]
    fn quotes_dotted_parts() {
        assert_eq!(
            Dialect::POSTGRES.quote_ident("public.users"),
            "\"public\".\"users\""
        );
    }

    #[test]
    fn escapes_quote_char() {
        assert_eq!(Dialect::MYSQL.quote_ident("we`ird"), "`we``ird`");
        assert_eq!(Dialect::POSTGRES.quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn positional_and_numbered_names() {
        let mut p = Placeholders::new(PlaceholderStyle::Positional);
        assert_eq!(p.next("a"), ("?".into(), "1".into()));
        assert_eq!(p.next("b"), ("?".into(), "2".into()));

        let mut p = Placeholders::new(PlaceholderStyle::Numbered);
        assert_eq!(p.next("a"), ("$1".into(), "1".into()));
        assert_eq!(p.next("a"), ("$2".into(), "2".into()));
    }

    #[test]
    fn named_placeholders_are_deduplicated() {
        let mut p = Placeholders::new(PlaceholderStyle::Named);
        assert_eq!(p.next("status").0, ":status");
        assert_eq!(p.next("status").0, ":status_2");
        assert_eq!(p.next("status_2").0, ":status_2_2");
        assert_eq!(p.next("first name").0, ":first_name");
    }
}
