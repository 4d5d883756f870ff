//! Parser for the text form of one-dimensional SQL arrays (`{a,b,"c d"}`).

/// Parse an array literal into its elements.
///
/// Quoted elements may contain commas, braces and backslash escapes.
/// `NULL` elements and nested arrays are rejected.
pub fn parse_array_literal(raw: &str) -> Result<Vec<String>, String> {
    let inner = raw
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| "missing enclosing braces".to_string())?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut elements = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let element = if chars.next_if_eq(&'"').is_some() {
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => return Err("unterminated escape".to_string()),
                    },
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => return Err("unterminated quoted element".to_string()),
                }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            value
        } else {
            let mut value = String::new();
            while let Some(c) = chars.next_if(|c| *c != ',') {
                if matches!(c, '{' | '}' | '"' | '\\') {
                    return Err(format!("unexpected '{}' in unquoted element", c));
                }
                value.push(c);
            }
            let value = value.trim();
            if value.is_empty() {
                return Err("empty element".to_string());
            }
            if value.eq_ignore_ascii_case("null") {
                return Err("NULL element".to_string());
            }
            value.to_string()
        };

        elements.push(element);

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(c) => return Err(format!("unexpected '{}' after element", c)),
        }
    }

    Ok(elements)
}
