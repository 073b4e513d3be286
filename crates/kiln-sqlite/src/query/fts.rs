//! Full-text query conversion
//!
//! Users write search-engine style queries which FTS5 would mostly reject
//! or misread (e.g. `foo-bar` or `foo/bar`). Every bare term is quoted,
//! while the operators are kept:
//!
//! - `AND`, `OR`, `NOT` and parentheses are passed through
//! - `|` is `OR`, and a leading `-` is `NOT`
//! - a trailing `*` makes a prefix query: `ba*` becomes `"ba"*`
//! - `^` (first token) and `column:` filters are kept
//! - quoted phrases are kept as-is, and unterminated quotes are closed

/// Convert a user query to the FTS5 query syntax
pub fn convert_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 8);
    let mut term = String::new();
    let mut in_quote = false;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            out.push(c);
            if c == '"' {
                in_quote = false;
            }
            continue;
        }

        match c {
            '"' => {
                flush_term(&mut term, &mut out);
                out.push('"');
                in_quote = true;
            }
            '(' | ')' => {
                flush_term(&mut term, &mut out);
                out.push(c);
            }
            '|' => {
                flush_term(&mut term, &mut out);
                out.push_str(" OR ");
            }
            '-' if term.is_empty() => out.push_str(" NOT "),
            '+' if term.is_empty() => {}
            '^' if term.is_empty() => out.push('^'),
            ':' if !term.is_empty() => {
                // Column filter
                out.push_str(&term);
                out.push(':');
                term.clear();
            }
            '*' if !term.is_empty()
                && chars
                    .peek()
                    .map_or(true, |next| next.is_whitespace() || *next == ')') =>
            {
                flush_term(&mut term, &mut out);
                out.push('*');
            }
            '*' if term.is_empty() => out.push('*'),
            c if c.is_whitespace() => {
                flush_term(&mut term, &mut out);
                out.push(c);
            }
            c => term.push(c),
        }
    }

    flush_term(&mut term, &mut out);
    if in_quote {
        out.push('"');
    }
    out
}

fn flush_term(term: &mut String, out: &mut String) {
    if term.is_empty() {
        return;
    }
    match term.as_str() {
        "AND" | "OR" | "NOT" => out.push_str(term),
        _ => {
            out.push('"');
            out.push_str(term);
            out.push('"');
        }
    }
    term.clear();
}

#[cfg(test)]
mod tests {
    use super::convert_query;
    use test_case::test_case;

    // Quotes
    #[test_case(r#"foo"#, r#""foo""#)]
    #[test_case(r#"foo bar"#, r#""foo" "bar""#)]
    #[test_case(r#"foo   bar"#, r#""foo"   "bar""#)]
    #[test_case(r#""foo bar" qux"#, r#""foo bar" "qux""#)]
    #[test_case(r#"foo "bar qux"#, r#""foo" "bar qux""#)]
    // Operators
    #[test_case(r#"foo AND bar"#, r#""foo" AND "bar""#)]
    #[test_case(r#"foo AN bar"#, r#""foo" "AN" "bar""#)]
    #[test_case(r#"foo "AND" bar"#, r#""foo" "AND" "bar""#)]
    #[test_case(r#"foo OR bar"#, r#""foo" OR "bar""#)]
    #[test_case(r#"foo | bar"#, r#""foo"  OR  "bar""#)]
    #[test_case(r#"foo|bar"#, r#""foo" OR "bar""#)]
    #[test_case(r#""foo | bar""#, r#""foo | bar""#)]
    #[test_case(r#"foo NOT bar"#, r#""foo" NOT "bar""#)]
    #[test_case(r#"foo -bar"#, r#""foo"  NOT "bar""#)]
    #[test_case(r#"foo-bar"#, r#""foo-bar""#)]
    #[test_case(r#"(foo AND bar) OR qux"#, r#"("foo" AND "bar") OR "qux""#)]
    // Special characters
    #[test_case(r#"foo/bar"#, r#""foo/bar""#)]
    #[test_case(r#"foo's bar"#, r#""foo's" "bar""#)]
    // Prefix queries
    #[test_case(r#"foo ba*"#, r#""foo" "ba"*"#)]
    #[test_case(r#""foo ba"*"#, r#""foo ba"*"#)]
    #[test_case(r#"(foo ba*)"#, r#"("foo" "ba"*)"#)]
    #[test_case(r#"foo*bar"#, r#""foo*bar""#)]
    // Column filters
    #[test_case(r#"col:foo bar"#, r#"col:"foo" "bar""#)]
    #[test_case(r#"foo "col:bar""#, r#""foo" "col:bar""#)]
    #[test_case(r#"-col:foo bar"#, r#" NOT col:"foo" "bar""#)]
    #[test_case(r#"col:(foo bar)"#, r#"col:("foo" "bar")"#)]
    // First token
    #[test_case(r#"^foo bar"#, r#"^"foo" "bar""#)]
    #[test_case(r#"^"foo bar""#, r#"^"foo bar""#)]
    #[test_case(r#"col:^foo"#, r#"col:^"foo""#)]
    // `+` and NEAR are not supported
    #[test_case(r#"foo + bar"#, r#""foo"  "bar""#)]
    #[test_case(r#"NEAR(foo, bar, 4)"#, r#""NEAR"("foo," "bar," "4")"#)]
    fn test_convert_query(query: &str, expected: &str) {
        assert_eq!(convert_query(query), expected);
    }
}
