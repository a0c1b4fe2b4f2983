use std::ops::Range;

/// Collapse the header band rows of `matrix` into one synthetic header row.
///
/// Field *i* of the result is every non-empty value found in column *i* of
/// the band, in row order, joined by a single space. Missing rows or cells
/// count as empty. The result always has `max_cols` fields.
pub fn merge_header_band(matrix: &[Vec<String>], band: Range<usize>, max_cols: usize) -> Vec<String> {
    let rows: Vec<&Vec<String>> = band.filter_map(|idx| matrix.get(idx)).collect();

    (0..max_cols)
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(String::as_str)
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collapse::tokenize::tokenize_line;

    fn band(lines: &[&str], max_cols: usize) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|l| tokenize_line(l, ';', max_cols))
            .collect()
    }

    #[test]
    fn drops_empties_and_keeps_order() {
        let matrix = band(&["a", "", "b", "", "", "c"], 2);
        let merged = merge_header_band(&matrix, 0..6, 2);
        assert_eq!(merged, vec!["a b c", ""]);
    }

    #[test]
    fn all_empty_column_merges_to_empty_string() {
        let matrix = band(&[";", ";", ";", ";", ";", ";"], 2);
        let merged = merge_header_band(&matrix, 0..6, 2);
        assert_eq!(merged, vec!["", ""]);
    }

    #[test]
    fn only_band_rows_contribute() {
        let matrix = band(&["pre", "pre", "pre", "Temp", "C", "x", "y", "z", "w", "data"], 1);
        let merged = merge_header_band(&matrix, 3..9, 1);
        assert_eq!(merged, vec!["Temp C x y z w"]);
    }

    #[test]
    fn no_dedup_and_no_interior_trim() {
        let matrix = band(&["deg  C", "deg  C"], 1);
        let merged = merge_header_band(&matrix, 0..2, 1);
        assert_eq!(merged, vec!["deg  C deg  C"]);
    }

    #[test]
    fn width_is_fixed_even_for_short_matrix() {
        let matrix = band(&["a;b"], 174);
        let merged = merge_header_band(&matrix, 3..9, 174);
        assert_eq!(merged.len(), 174);
        assert!(merged.iter().all(String::is_empty));
    }
}
