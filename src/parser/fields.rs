// Field tokenizer for one logical line.
// Lenient rather than strict RFC 4180: quotes toggle anywhere in a field,
// doubled quotes inside a quoted run become one quote, and each field is trimmed.

/// Split `line` into trimmed, unquoted fields.
///
/// If the whole line comes back as a single field that still contains the
/// delimiter, the line was most likely wrapped in one outer pair of quotes;
/// that field is tokenized again as if it were the line.
pub fn tokenize(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = split_fields(line, delimiter);
    if fields.len() == 1 && fields[0].contains(delimiter) && fields[0].len() < line.len() {
        let inner = fields.pop().unwrap_or_default();
        return tokenize(&inner, delimiter);
    }
    fields
}

fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                buf.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
            continue;
        }
        if c == delimiter && !in_quotes {
            fields.push(buf.trim().to_string());
            buf.clear();
            continue;
        }
        buf.push(c);
    }
    fields.push(buf.trim().to_string());
    fields
}
