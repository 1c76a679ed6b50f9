/// The CSV dialect used by every shard: comma separator, double-quote
/// quoting, backslash escape, quoting only when the field contains the
/// separator/quote/newline or leading/trailing whitespace, literal `\N`
/// for NULL, LF line terminator, UTF-8 payload.
pub fn format_header(columns: &[String]) -> String {
    let mut line = columns.join(",");
    line.push('\n');
    line
}

pub fn format_row(values: &[Option<String>]) -> String {
    let mut line: String = values
        .iter()
        .map(|v| format_field(v.as_deref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn format_field(value: Option<&str>) -> String {
    match value {
        None => "\\N".to_string(),
        Some(s) => {
            if needs_quoting(s) {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for ch in s.chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        _ => out.push(ch),
                    }
                }
                out.push('"');
                out
            } else {
                s.to_string()
            }
        }
    }
}

fn needs_quoting(s: &str) -> bool {
    s.contains(',')
        || s.contains('"')
        || s.contains('\n')
        || s.contains('\r')
        || s.starts_with(' ')
        || s.starts_with('\t')
        || s.ends_with(' ')
        || s.ends_with('\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_literal_backslash_n() {
        assert_eq!(format_row(&[None]), "\\N\n");
    }

    #[test]
    fn plain_field_is_unquoted() {
        assert_eq!(format_row(&[Some("hello".to_string())]), "hello\n");
    }

    #[test]
    fn field_with_separator_and_quote_is_quoted_and_escaped() {
        let value = "hello,\"world\"\nline2".to_string();
        let row = format_row(&[Some(value)]);
        assert_eq!(row, "\"hello,\\\"world\\\"\nline2\"\n");
    }

    #[test]
    fn leading_or_trailing_whitespace_forces_quoting() {
        assert_eq!(format_row(&[Some(" pad".to_string())]), "\" pad\"\n");
        assert_eq!(format_row(&[Some("pad ".to_string())]), "\"pad \"\n");
    }

    #[test]
    fn header_is_comma_joined_column_names() {
        assert_eq!(format_header(&["id".into(), "name".into()]), "id,name\n");
    }
}
