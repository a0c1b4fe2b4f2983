/// Split one raw line into exactly `max_cols` fields.
///
/// Surrounding whitespace (including a stray `\r`) is stripped before the
/// split. Short rows are right-padded with empty strings and long rows are
/// truncated, so column indices line up across rows even when hand-written
/// header fragments carry different field counts.
pub fn tokenize_line(line: &str, delimiter: char, max_cols: usize) -> Vec<String> {
    let mut fields: Vec<String> = line
        .trim()
        .split(delimiter)
        .take(max_cols)
        .map(str::to_string)
        .collect();
    fields.resize(max_cols, String::new());
    fields
}

/// Field count of a line before pad/truncate.
pub fn raw_width(line: &str, delimiter: char) -> usize {
    line.trim().split(delimiter).count()
}

/// Split `text` on `\r\n`, `\n` or a lone `\r`. A final terminator does
/// not produce an extra empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let (mut start, mut i) = (0, 0);
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Tokenize every line of `text` into a fixed-width field matrix.
pub fn tokenize_text(text: &str, delimiter: char, max_cols: usize) -> Vec<Vec<String>> {
    split_lines(text)
        .into_iter()
        .map(|line| tokenize_line(line, delimiter, max_cols))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_rows() {
        let row = tokenize_line("a;b", ';', 5);
        assert_eq!(row, vec!["a", "b", "", "", ""]);
    }

    #[test]
    fn truncates_long_rows() {
        let row = tokenize_line("1;2;3;4;5;6", ';', 4);
        assert_eq!(row, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn blank_line_is_all_empty() {
        let row = tokenize_line("   \r", ';', 3);
        assert_eq!(row, vec!["", "", ""]);
    }

    #[test]
    fn strips_line_terminator_only_at_edges() {
        let row = tokenize_line("x ; y ;z\r\n", ';', 3);
        assert_eq!(row, vec!["x ", " y ", "z"]);
    }

    #[test]
    fn every_row_has_fixed_width() {
        let text = "a\n;;;;;;;;;;;;;;;;\n\nb;c\r\n";
        let matrix = tokenize_text(text, ';', 174);
        assert_eq!(matrix.len(), 4);
        assert!(matrix.iter().all(|row| row.len() == 174));
    }

    #[test]
    fn splits_on_every_line_ending() {
        assert_eq!(split_lines("a\r\nb\nc\rd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\r\r\nb\r"), vec!["a", "", "b"]);
        assert_eq!(split_lines("héllo\rwörld\n"), vec!["héllo", "wörld"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn cr_only_text_keeps_its_rows() {
        let text = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join("\r");
        let matrix = tokenize_text(&text, ';', 2);
        assert_eq!(matrix.len(), 10);
        assert_eq!(matrix[9], vec!["10", ""]);
    }

    #[test]
    fn raw_width_counts_before_padding() {
        assert_eq!(raw_width("a;b;c\n", ';'), 3);
        assert_eq!(raw_width("", ';'), 1);
    }
}
