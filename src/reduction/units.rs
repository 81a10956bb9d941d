// src/reduction/units.rs - Compact unit lists ("1-3;5;7A") and house-number token parsing
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::DataQualityIssue;
use crate::utils::constants::MAX_EXPANDED_RANGE;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\D*)(\d+)(\D*)$").expect("valid regex"));

/// A house number or unit split into non-digit prefix, number and non-digit suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeToken {
    pub prefix: String,
    pub number: u64,
    pub suffix: String,
    /// Zero-padded width of the digits as written (`"01"` is 2), 0 when unpadded.
    pub pad: usize,
}

impl RangeToken {
    /// `None` unless the whole value is prefix + digits + suffix.
    pub fn parse(value: &str) -> Option<Self> {
        let caps = TOKEN_RE.captures(value.trim())?;
        let digits = &caps[2];
        let number = digits.parse::<u64>().ok()?;
        let pad = if digits.len() > 1 && digits.starts_with('0') {
            digits.len()
        } else {
            0
        };
        Some(Self {
            prefix: caps[1].to_string(),
            number,
            suffix: caps[3].to_string(),
            pad,
        })
    }

    pub fn same_affixes(&self, other: &RangeToken) -> bool {
        self.prefix == other.prefix && self.suffix == other.suffix
    }

    fn with_number(&self, number: u64) -> RangeToken {
        RangeToken {
            number,
            ..self.clone()
        }
    }

    pub fn is_even(&self) -> bool {
        self.number % 2 == 0
    }
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}{}",
            self.prefix,
            self.number,
            self.suffix,
            width = self.pad
        )
    }
}

/// A `from-to` house number such as `249-263` or `9B-9D`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseNumberRange {
    pub from: RangeToken,
    pub to: RangeToken,
}

impl HouseNumberRange {
    /// Exactly two parseable tokens joined by `-`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('-');
        let (from, to) = (parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            from: RangeToken::parse(from)?,
            to: RangeToken::parse(to)?,
        })
    }

    /// Both endpoints carry the same prefix and suffix.
    pub fn is_consistent(&self) -> bool {
        self.from.same_affixes(&self.to)
    }

    /// Inclusive numeric membership; prefixes and suffixes are ignored.
    pub fn contains(&self, number: u64) -> bool {
        number >= self.from.number && number <= self.to.number
    }

    /// Member count, `None` when reversed or when it does not fit a `u64`.
    pub fn span(&self) -> Option<u64> {
        self.to
            .number
            .checked_sub(self.from.number)
            .and_then(|d| d.checked_add(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Member {
    Numbered(RangeToken),
    Literal(String),
}

impl Member {
    fn into_string(self) -> String {
        match self {
            Member::Numbered(token) => token.to_string(),
            Member::Literal(value) => value,
        }
    }
}

fn expand_token(token: &str, issues: &mut Vec<DataQualityIssue>) -> Vec<Member> {
    if token.contains('-') {
        let Some(range) = HouseNumberRange::parse(token) else {
            debug!("Unsupported unit range {:?}, passing through", token);
            return vec![Member::Literal(token.to_string())];
        };
        if !range.is_consistent() {
            debug!("Unit range {:?} has different prefix/suffix on each end", token);
            issues.push(DataQualityIssue::InconsistentRangeEndpoints {
                value: token.to_string(),
            });
            return vec![Member::Literal(token.to_string())];
        }
        return match range.span() {
            Some(span) if span <= MAX_EXPANDED_RANGE => (range.from.number..=range.to.number)
                .map(|n| Member::Numbered(range.from.with_number(n)))
                .collect(),
            _ => {
                debug!("Unit range {:?} is reversed or too wide to expand", token);
                vec![Member::Literal(token.to_string())]
            }
        };
    }
    match RangeToken::parse(token) {
        Some(parsed) => vec![Member::Numbered(parsed)],
        None => vec![Member::Literal(token.to_string())],
    }
}

fn members<S: AsRef<str>>(values: &[S], issues: &mut Vec<DataQualityIssue>) -> Vec<Member> {
    values
        .iter()
        .flat_map(|v| v.as_ref().split(';').map(str::trim).collect::<Vec<_>>())
        .filter(|t| !t.is_empty())
        .flat_map(|t| expand_token(t, issues))
        .collect()
}

/// Encodes unit values into a compact `;`-separated list, collapsing
/// consecutive numbers that share a prefix and suffix into `from-to`.
/// Inputs may already be ranges or encoded lists. Returns `None` for no units.
pub fn encode_unit_ranges<S: AsRef<str>>(units: &[S]) -> Option<String> {
    let mut issues = Vec::new();
    encode_unit_ranges_with_issues(units, &mut issues)
}

/// `encode_unit_ranges`, collecting inconsistent-range issues into `issues`.
pub fn encode_unit_ranges_with_issues<S: AsRef<str>>(
    units: &[S],
    issues: &mut Vec<DataQualityIssue>,
) -> Option<String> {
    // (prefix, suffix, pad) -> numbers
    let mut groups: BTreeMap<(String, String, usize), BTreeSet<u64>> = BTreeMap::new();
    let mut literals: BTreeSet<String> = BTreeSet::new();

    for member in members(units, issues) {
        match member {
            Member::Numbered(t) => {
                groups
                    .entry((t.prefix, t.suffix, t.pad))
                    .or_default()
                    .insert(t.number);
            }
            Member::Literal(value) => {
                literals.insert(value);
            }
        }
    }

    let mut tokens: Vec<String> = Vec::new();
    for ((prefix, suffix, pad), numbers) in groups {
        let template = RangeToken {
            prefix,
            number: 0,
            suffix,
            pad,
        };
        let mut run: Option<(u64, u64)> = None;
        for n in numbers {
            run = match run {
                Some((start, end)) if end.checked_add(1) == Some(n) => Some((start, n)),
                Some(done) => {
                    tokens.push(format_run(&template, done));
                    Some((n, n))
                }
                None => Some((n, n)),
            };
        }
        if let Some(done) = run {
            tokens.push(format_run(&template, done));
        }
    }
    tokens.extend(literals);

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(";"))
    }
}

fn format_run(template: &RangeToken, (start, end): (u64, u64)) -> String {
    if start == end {
        template.with_number(start).to_string()
    } else {
        format!("{}-{}", template.with_number(start), template.with_number(end))
    }
}

/// Expands a compact unit list back into its member tokens, first occurrence order.
pub fn decode_unit_ranges(flats: &str) -> Vec<String> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();
    members(&[flats], &mut issues)
        .into_iter()
        .map(Member::into_string)
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

/// Set of member tokens across several unit or flats values.
pub fn unit_members<S: AsRef<str>>(values: &[S]) -> BTreeSet<String> {
    values
        .iter()
        .flat_map(|v| decode_unit_ranges(v.as_ref()))
        .collect()
}
