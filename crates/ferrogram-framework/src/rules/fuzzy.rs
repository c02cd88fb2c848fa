use async_trait::async_trait;

use ferrogram_core::Context;

use super::{MatchResult, Rule, subject_text};
use crate::context::DispatchContext;
use crate::error::BoxError;

/// Normalized Levenshtein similarity in `[0.0, 1.0]`, compared by characters.
///
/// Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    1.0 - previous[b.len()] as f64 / longest as f64
}

/// Matches when the text is similar enough to one of the candidates.
///
/// Comparison is case-insensitive. Binds the best score as `fuzzy_ratio` and
/// the winning candidate as `fuzzy_match`.
#[derive(Debug, Clone)]
pub struct Fuzzy {
    texts: Vec<String>,
    min_ratio: f64,
}

impl Fuzzy {
    /// Default minimum similarity.
    pub const DEFAULT_MIN_RATIO: f64 = 0.7;

    pub fn new(texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
            min_ratio: Self::DEFAULT_MIN_RATIO,
        }
    }

    pub fn min_ratio(mut self, ratio: f64) -> Self {
        self.min_ratio = ratio.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl Rule for Fuzzy {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let Some(text) = subject_text(ctx.update()) else {
            return Ok(MatchResult::False);
        };
        let text = text.trim().to_lowercase();

        let best = self
            .texts
            .iter()
            .map(|candidate| (candidate, similarity(&text, &candidate.to_lowercase())))
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        Ok(match best {
            Some((candidate, ratio)) if ratio >= self.min_ratio => MatchResult::Bindings(
                Context::new()
                    .with("fuzzy_ratio", ratio)
                    .with("fuzzy_match", candidate.as_str()),
            ),
            _ => MatchResult::False,
        })
    }

    fn describe(&self) -> String {
        format!("fuzzy{:?}>={}", self.texts, self.min_ratio)
    }
}
