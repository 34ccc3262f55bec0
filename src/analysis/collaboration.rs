//! Collaboration metrics derived from which authors touch which files.
//!
//! A commit has exactly one author, so "collaboration" here always means
//! file-level co-occurrence: two authors collaborate when their commits touch
//! the same path somewhere in the range.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::engine::{Analyzer, AnalyzerKind, Metrics};
use crate::config::AnalyticsConfig;
use crate::error::AnalyzerError;
use crate::types::{RangeAggregate, RiskLevel};
use crate::utils::{mean, round_to};

/// Two authors who touched the same files. `authors.0 < authors.1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaborationPair {
    pub authors: (String, String),
    /// Number of paths both authors touched
    pub shared_files: usize,
    /// `shared_files` divided by the largest pair count in the range
    pub strength: f64,
}

/// A file type effectively owned by one author.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeSilo {
    pub extension: String,
    pub owner: String,
    /// Owner's share of the commits touching this extension
    pub concentration: f64,
    pub commits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollaborationMetrics {
    /// Every co-occurring pair, most shared files first
    pub pairs: Vec<CollaborationPair>,
    pub top_pairs: Vec<CollaborationPair>,
    /// author -> extension -> share of that extension's commits
    pub expertise: BTreeMap<String, BTreeMap<String, f64>>,
    pub knowledge_silos: Vec<KnowledgeSilo>,
    pub team_connectivity: f64,
    /// Share of commits (with files) that touch a path another author also touched
    pub file_collaboration_density: f64,
    pub knowledge_risk: RiskLevel,
}

#[derive(Debug, Clone)]
pub struct CollaborationAnalyzer {
    pub knowledge_silo_threshold: f64,
    pub min_collaboration_threshold: usize,
    pub top_pairs: usize,
}

impl Default for CollaborationAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl CollaborationAnalyzer {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            knowledge_silo_threshold: config.knowledge_silo_threshold,
            min_collaboration_threshold: config.min_collaboration_threshold,
            top_pairs: config.top_pairs,
        }
    }

    pub fn compute(&self, aggregate: &RangeAggregate) -> CollaborationMetrics {
        let path_authors = path_authors(aggregate);
        let pairs = co_authorship(&path_authors);
        let (expertise, knowledge_silos) = self.knowledge_distribution(aggregate);
        let team_connectivity = team_connectivity(&aggregate.authors);
        let file_collaboration_density = file_collaboration_density(aggregate, &path_authors);

        CollaborationMetrics {
            top_pairs: pairs.iter().take(self.top_pairs).cloned().collect(),
            pairs,
            expertise,
            knowledge_silos,
            team_connectivity,
            file_collaboration_density,
            knowledge_risk: knowledge_risk(team_connectivity, file_collaboration_density),
        }
    }

    fn knowledge_distribution(
        &self,
        aggregate: &RangeAggregate,
    ) -> (BTreeMap<String, BTreeMap<String, f64>>, Vec<KnowledgeSilo>) {
        let mut touches: BTreeMap<(&str, String), usize> = BTreeMap::new();
        let mut extension_totals: BTreeMap<String, usize> = BTreeMap::new();

        for commit in &aggregate.commits {
            let extensions: BTreeSet<String> = commit.files().iter().map(|f| f.extension()).collect();
            for extension in extensions {
                *extension_totals.entry(extension.clone()).or_insert(0) += 1;
                *touches.entry((commit.author(), extension)).or_insert(0) += 1;
            }
        }

        let mut expertise: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        // extension -> (owner, share), first author by name on ties
        let mut owners: BTreeMap<&str, (&str, f64)> = BTreeMap::new();
        for ((author, extension), count) in &touches {
            let total = extension_totals.get(extension).copied().unwrap_or(0).max(1);
            let share = *count as f64 / total as f64;
            expertise
                .entry(author.to_string())
                .or_default()
                .insert(extension.clone(), round_to(share, 4));

            let owner = owners.entry(extension.as_str()).or_insert((*author, share));
            if share > owner.1 {
                *owner = (*author, share);
            }
        }

        let mut silos: Vec<KnowledgeSilo> = owners
            .into_iter()
            .filter_map(|(extension, (owner, share))| {
                let commits = extension_totals.get(extension).copied().unwrap_or(0);
                (commits >= self.min_collaboration_threshold && share >= self.knowledge_silo_threshold).then(|| {
                    KnowledgeSilo {
                        extension: extension.to_string(),
                        owner: owner.to_string(),
                        concentration: round_to(share, 4),
                        commits,
                    }
                })
            })
            .collect();
        silos.sort_by(|a, b| {
            b.concentration
                .total_cmp(&a.concentration)
                .then_with(|| a.extension.cmp(&b.extension))
        });

        (expertise, silos)
    }
}

fn path_authors(aggregate: &RangeAggregate) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut map: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for commit in &aggregate.commits {
        for file in commit.files() {
            map.entry(file.path.as_str()).or_default().insert(commit.author());
        }
    }
    map
}

fn co_authorship(path_authors: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<CollaborationPair> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for authors in path_authors.values() {
        let authors: Vec<&str> = authors.iter().copied().collect();
        for (i, left) in authors.iter().enumerate() {
            for right in &authors[i + 1..] {
                *counts.entry((*left, *right)).or_insert(0) += 1;
            }
        }
    }

    let Some(max) = counts.values().copied().max() else {
        return Vec::new();
    };

    let mut pairs: Vec<CollaborationPair> = counts
        .into_iter()
        .map(|((left, right), shared_files)| CollaborationPair {
            authors: (left.to_string(), right.to_string()),
            shared_files,
            strength: round_to(shared_files as f64 / max as f64, 4),
        })
        .collect();
    pairs.sort_by(|a, b| {
        b.shared_files
            .cmp(&a.shared_files)
            .then_with(|| a.authors.cmp(&b.authors))
    });
    pairs
}

/// Mean closeness of each author's commit count to an even split, in [0, 1].
fn team_connectivity(authors: &BTreeMap<String, usize>) -> f64 {
    let total: usize = authors.values().sum();
    if authors.is_empty() || total == 0 {
        return 0.0;
    }
    let ideal = total as f64 / authors.len() as f64;
    let scores: Vec<f64> = authors
        .values()
        .map(|&commits| 1.0 - (commits as f64 - ideal).abs() / ideal)
        .collect();
    round_to(mean(&scores).clamp(0.0, 1.0), 4)
}

fn file_collaboration_density(
    aggregate: &RangeAggregate,
    path_authors: &BTreeMap<&str, BTreeSet<&str>>,
) -> f64 {
    let mut with_files = 0usize;
    let mut shared = 0usize;
    for commit in aggregate.commits.iter().filter(|c| !c.files().is_empty()) {
        with_files += 1;
        let touches_shared_path = commit.files().iter().any(|f| {
            path_authors
                .get(f.path.as_str())
                .is_some_and(|authors| authors.len() > 1)
        });
        if touches_shared_path {
            shared += 1;
        }
    }
    if with_files == 0 {
        return 0.0;
    }
    round_to(shared as f64 / with_files as f64, 4)
}

fn knowledge_risk(connectivity: f64, density: f64) -> RiskLevel {
    if connectivity > 0.7 && density > 0.6 {
        RiskLevel::Low
    } else if connectivity > 0.5 || density > 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

impl Analyzer for CollaborationAnalyzer {
    fn name(&self) -> &'static str {
        "collaboration"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Collaboration
    }

    fn analyze(&self, aggregate: &RangeAggregate) -> Result<Metrics, AnalyzerError> {
        Ok(Metrics::Collaboration(self.compute(aggregate)))
    }
}
