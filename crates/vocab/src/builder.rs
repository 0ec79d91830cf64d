use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::error::Result;
use crate::pre_tokenize::tokenize;
use crate::vocab::Vocab;

/// Frequency-capped vocabulary construction.
///
/// Tokens seen fewer than `min_frequency` times are dropped, and at most
/// `max_size` regular tokens are kept (specials are not counted). Ties in
/// frequency are broken alphabetically so the result is deterministic.
pub struct VocabBuilder {
    max_size: Option<usize>,
    min_frequency: u32,
}

impl VocabBuilder {
    pub fn new(max_size: Option<usize>, min_frequency: u32) -> Self {
        Self {
            max_size,
            min_frequency: min_frequency.max(1),
        }
    }

    /// Counts token occurrences over `lines` in parallel.
    pub fn count<S: AsRef<str> + Sync>(lines: &[S]) -> HashMap<String, u32> {
        lines
            .par_iter()
            .fold(HashMap::new, |mut counts: HashMap<String, u32>, line| {
                for token in tokenize(line.as_ref()) {
                    *counts.entry(token.to_string()).or_insert(0) += 1;
                }
                counts
            })
            .reduce(HashMap::new, |mut a, b| {
                for (token, n) in b {
                    *a.entry(token).or_insert(0) += n;
                }
                a
            })
    }

    pub fn build_from_counts(&self, counts: &HashMap<String, u32>) -> Vocab {
        let mut ranked: Vec<(&String, u32)> = counts
            .iter()
            .filter(|(_, n)| **n >= self.min_frequency)
            .map(|(t, &n)| (t, n))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut vocab = Vocab::new();
        let limit = self.max_size.unwrap_or(usize::MAX);
        for (token, _) in ranked.into_iter().take(limit) {
            vocab.push(token.clone());
        }
        vocab
    }

    pub fn build_from_lines<S: AsRef<str> + Sync>(&self, lines: &[S]) -> Vocab {
        self.build_from_counts(&Self::count(lines))
    }

    pub fn build_from_files(&self, files: &[String]) -> Result<Vocab> {
        let mut lines = Vec::new();
        for path in files {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                lines.push(line?);
            }
        }
        Ok(self.build_from_lines(&lines))
    }
}
