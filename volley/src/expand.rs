//! URL templating.
//!
//! A URL may carry a single `{...}` span describing how to generate many
//! concrete URLs from it:
//!
//! - `{S3,1-10}` yields 3 URLs with consecutive values `1`, `2` and `3`.
//! - `{R5,0-9}` yields 5 URLs with values drawn uniformly from `[0; 9]`.
//!
//! Selectors are case-insensitive. No more than [`MAX_EXPAND`] URLs are
//! produced from one template, whatever the requested count.

use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;

/// Hard cap on the number of URLs a single template may produce.
pub const MAX_EXPAND: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("invalid url expression \"{0}\": expected ',' after the count")]
    MissingComma(String),
    #[error("invalid url expression \"{0}\": expected range as <from>-<to>")]
    MissingDash(String),
    #[error("invalid url expression \"{expr}\": {field} \"{value}\" is not an integer")]
    InvalidNumber {
        expr: String,
        field: &'static str,
        value: String,
    },
    #[error("invalid url expression \"{0}\": count must be at least 1")]
    ZeroCount(String),
    #[error("invalid url expression \"{expr}\": range {from}-{to} is empty")]
    EmptyRange { expr: String, from: i64, to: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    Sequence,
    Random,
}

/// Parsed `<Sel><Count>,<From>-<To>` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Template {
    selector: Selector,
    count: usize,
    from: i64,
    to: i64,
}

impl Template {
    /// Parses the span content, without braces.
    ///
    /// Returns `Ok(None)` if the content does not start with a selector, in
    /// which case the braces are treated as literal text.
    fn parse(expr: &str) -> Result<Option<Self>, ExpandError> {
        let mut chars = expr.chars();
        let selector = match chars.next() {
            Some('S' | 's') => Selector::Sequence,
            Some('R' | 'r') => Selector::Random,
            _ => return Ok(None),
        };
        let rest = chars.as_str();

        let (count, range) = rest
            .split_once(',')
            .ok_or_else(|| ExpandError::MissingComma(expr.to_string()))?;
        let (from, to) = range
            .split_once('-')
            .ok_or_else(|| ExpandError::MissingDash(expr.to_string()))?;

        let count: usize = parse_field(expr, "count", count)?;
        let from: i64 = parse_field(expr, "from", from)?;
        let to: i64 = parse_field(expr, "to", to)?;

        if count == 0 {
            return Err(ExpandError::ZeroCount(expr.to_string()));
        }
        if from > to {
            return Err(ExpandError::EmptyRange { expr: expr.to_string(), from, to });
        }

        let m = Self { selector, count, from, to };

        Ok(Some(m))
    }
}

fn parse_field<T: core::str::FromStr>(expr: &str, field: &'static str, value: &str) -> Result<T, ExpandError> {
    value.trim().parse().map_err(|_| ExpandError::InvalidNumber {
        expr: expr.to_string(),
        field,
        value: value.to_string(),
    })
}

/// Expands URL templates into concrete URLs.
#[derive(Debug)]
pub struct Expander<R> {
    rng: R,
    max: usize,
}

impl Expander<StdRng> {
    /// Constructs a new [`Expander`].
    ///
    /// Random templates are reproducible across runs only when a seed is
    /// given.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self::with_rng(rng)
    }
}

impl<R> Expander<R>
where
    R: Rng,
{
    pub fn with_rng(rng: R) -> Self {
        Self { rng, max: MAX_EXPAND }
    }

    /// Overrides the expansion cap.
    #[cfg(test)]
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    /// Expands the given URL, preserving all text around the template span.
    ///
    /// A URL without a template span is returned as a single-element vector.
    pub fn expand(&mut self, url: &str) -> Result<Vec<String>, ExpandError> {
        let Some((lo, hi)) = find_span(url) else {
            return Ok(vec![url.to_string()]);
        };
        let Some(template) = Template::parse(&url[lo + 1..hi])? else {
            return Ok(vec![url.to_string()]);
        };

        let (head, tail) = (&url[..lo], &url[hi + 1..]);
        let limit = template.count.min(self.max);

        let values: Vec<i64> = match template.selector {
            Selector::Sequence => (template.from..=template.to).take(limit).collect(),
            Selector::Random => (0..limit)
                .map(|_| self.rng.gen_range(template.from..=template.to))
                .collect(),
        };

        let urls: Vec<String> = values.into_iter().map(|v| format!("{head}{v}{tail}")).collect();
        for (idx, url) in urls.iter().enumerate() {
            log::debug!("expanded url [{idx}]: {url}");
        }

        Ok(urls)
    }
}

/// Returns byte offsets of the first `{` and the first `}` following it.
fn find_span(url: &str) -> Option<(usize, usize)> {
    let lo = url.find('{')?;
    let hi = url[lo..].find('}')? + lo;

    Some((lo, hi))
}
