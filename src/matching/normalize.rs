// src/matching/normalize.rs - Comparison forms for address components

/// Case-folded street name with hyphen variants collapsed, so that
/// `"Foo - Bar"`, `"Foo-Bar"` and `"FooBar"` compare equal.
pub fn normalize_street(street: &str) -> String {
    let lower = street.trim().to_lowercase().replace(" - ", "-").replace('-', "");
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// House numbers and units compare case- and whitespace-insensitively.
pub fn normalize_number(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized unit, with blank values treated as absent.
pub fn normalize_unit(unit: Option<&str>) -> Option<String> {
    unit.map(normalize_number).filter(|u| !u.is_empty())
}

/// Splits a combined `unit/number` house number into `(unit, number)`.
/// Returns `None` unless both sides are non-empty.
pub fn split_combined_house_number(house_number: &str) -> Option<(&str, &str)> {
    let (unit, number) = house_number.split_once('/')?;
    let (unit, number) = (unit.trim(), number.trim());
    if unit.is_empty() || number.is_empty() {
        return None;
    }
    Some((unit, number))
}

fn lcs_length<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Longest-common-subsequence similarity over whitespace-separated tokens,
/// `2·lcs / (|a| + |b|)`. A misspelt token counts as a mismatch.
/// Two empty strings are identical (1.0).
pub fn lcs_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<&str> = a.split_whitespace().collect();
    let b: Vec<&str> = b.split_whitespace().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    2.0 * lcs_length(&a, &b) as f64 / (a.len() + b.len()) as f64
}
