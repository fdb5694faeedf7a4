// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use controller::ItemId;
use std::{collections::HashSet, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Measure {
    Auc,
    Map,
    Ndcg,
    Mrr,
    PrecisionAt5,
    PrecisionAt10,
    RecallAt5,
    RecallAt10,
}

impl Measure {
    pub const ALL: [Measure; 8] = [
        Measure::Auc,
        Measure::PrecisionAt5,
        Measure::PrecisionAt10,
        Measure::Map,
        Measure::RecallAt5,
        Measure::RecallAt10,
        Measure::Ndcg,
        Measure::Mrr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Measure::Auc => "AUC",
            Measure::Map => "MAP",
            Measure::Ndcg => "NDCG",
            Measure::Mrr => "MRR",
            Measure::PrecisionAt5 => "prec@5",
            Measure::PrecisionAt10 => "prec@10",
            Measure::RecallAt5 => "recall@5",
            Measure::RecallAt10 => "recall@10",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Area under the ROC curve of a ranking, counting `dropped` unranked
/// items as ranked below everything else
pub fn auc(ranked: &[ItemId], correct: &HashSet<ItemId>, dropped: usize) -> f64 {
    let eval_items = (ranked.len() + dropped) as i64;
    let n_correct = correct.len() as i64;
    let eval_pairs = (eval_items - n_correct) * n_correct;
    if eval_pairs <= 0 {
        return 0.5;
    }

    let mut correct_pairs: i64 = 0;
    let mut hit_count: i64 = 0;
    for item in ranked {
        if correct.contains(item) {
            hit_count += 1;
        } else {
            correct_pairs += hit_count;
        }
    }

    let missing = n_correct - hit_count;
    correct_pairs += hit_count * (dropped as i64 - missing).max(0);

    correct_pairs as f64 / eval_pairs as f64
}

/// Average precision
pub fn average_precision(ranked: &[ItemId], correct: &HashSet<ItemId>) -> f64 {
    let mut hit_count = 0;
    let mut precision_sum = 0.0;

    for (i, item) in ranked.iter().enumerate() {
        if correct.contains(item) {
            hit_count += 1;
            precision_sum += hit_count as f64 / (i + 1) as f64;
        }
    }

    if hit_count == 0 {
        0.0
    } else {
        precision_sum / correct.len() as f64
    }
}

fn ideal_dcg(n: usize) -> f64 {
    (0..n).map(|i| 1.0 / ((i + 2) as f64).log2()).sum()
}

/// Normalized discounted cumulative gain with binary relevance
pub fn ndcg(ranked: &[ItemId], correct: &HashSet<ItemId>) -> f64 {
    let dcg: f64 = ranked
        .iter()
        .enumerate()
        .filter(|(_, item)| correct.contains(item))
        .map(|(i, _)| 1.0 / ((i + 2) as f64).log2())
        .sum();

    let idcg = ideal_dcg(correct.len());
    if idcg == 0.0 {
        0.0
    } else {
        dcg / idcg
    }
}

pub fn reciprocal_rank(ranked: &[ItemId], correct: &HashSet<ItemId>) -> f64 {
    ranked
        .iter()
        .position(|item| correct.contains(item))
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

fn hits_at(ranked: &[ItemId], correct: &HashSet<ItemId>, n: usize) -> usize {
    ranked.iter().take(n).filter(|item| correct.contains(item)).count()
}

pub fn precision_at(ranked: &[ItemId], correct: &HashSet<ItemId>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }

    hits_at(ranked, correct, n) as f64 / n as f64
}

pub fn recall_at(ranked: &[ItemId], correct: &HashSet<ItemId>, n: usize) -> f64 {
    if correct.is_empty() {
        return 0.0;
    }

    hits_at(ranked, correct, n) as f64 / correct.len() as f64
}

/// One value per `Measure`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasureValues {
    values: [f64; 8],
}

impl MeasureValues {
    /// AUC only sees `ranked`, candidates cut off by the list length are
    /// not counted
    pub fn compute(ranked: &[ItemId], correct: &HashSet<ItemId>) -> Self {
        let mut values = Self::default();
        values.set(Measure::Auc, auc(ranked, correct, 0));
        values.set(Measure::Map, average_precision(ranked, correct));
        values.set(Measure::Ndcg, ndcg(ranked, correct));
        values.set(Measure::Mrr, reciprocal_rank(ranked, correct));
        values.set(Measure::PrecisionAt5, precision_at(ranked, correct, 5));
        values.set(Measure::PrecisionAt10, precision_at(ranked, correct, 10));
        values.set(Measure::RecallAt5, recall_at(ranked, correct, 5));
        values.set(Measure::RecallAt10, recall_at(ranked, correct, 10));

        values
    }

    pub fn get(&self, measure: Measure) -> f64 {
        self.values[measure.slot()]
    }

    pub fn set(&mut self, measure: Measure, value: f64) {
        self.values[measure.slot()] = value;
    }

    /// `(self + other) / 2`, measure by measure
    pub fn halve_with(&mut self, other: &Self) {
        for (acc, value) in self.values.iter_mut().zip(other.values.iter()) {
            *acc = (*acc + value) / 2.0;
        }
    }

    pub fn add(&mut self, other: &Self) {
        for (acc, value) in self.values.iter_mut().zip(other.values.iter()) {
            *acc += value;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for value in self.values.iter_mut() {
            *value *= factor;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Measure, f64)> + '_ {
        Measure::ALL.iter().map(move |&measure| (measure, self.get(measure)))
    }
}
