use tracing::debug;

use crate::config::{MapperConfig, MatchingSection, VocabularySection};
use crate::ir::{ContentBlock, MatchResult, MatchStrategy, SectionCandidate};
use crate::textutil::{bullet_plain, content_tokens, normalize_name};

const SUBSTRING_SECTION_CONTAINS: u8 = 80;
const SUBSTRING_BLOCK_CONTAINS: u8 = 75;
const TOKEN_OVERLAP_MAX: u32 = 70;

/// Bullets that say something: non-empty once markers are stripped and not an empty-content phrase.
pub fn valid_bullets<'b>(block: &'b ContentBlock, vocab: &VocabularySection) -> Vec<&'b str> {
    block
        .bullets
        .iter()
        .filter(|b| {
            let plain = bullet_plain(b);
            !plain.is_empty() && !vocab.empty_bullets.iter().any(|e| e.to_lowercase() == plain)
        })
        .map(String::as_str)
        .collect()
}

pub fn has_real_content(block: &ContentBlock, vocab: &VocabularySection) -> bool {
    !valid_bullets(block, vocab).is_empty()
}

/// Name used for the direct key lookup: the raw header text minus a trailing colon.
fn direct_key(name: &str) -> &str {
    name.trim().trim_end_matches(':').trim_end()
}

/// Substring score for two normalized names.
pub fn substring_score(section: &str, block: &str) -> Option<u8> {
    if section.is_empty() || block.is_empty() {
        return None;
    }
    if section.contains(block) {
        Some(SUBSTRING_SECTION_CONTAINS)
    } else if block.contains(section) {
        Some(SUBSTRING_BLOCK_CONTAINS)
    } else {
        None
    }
}

/// Shared content tokens over all content tokens, scaled to `0..=70`.
pub fn token_overlap_score(section: &str, block: &str, cfg: &MatchingSection) -> u8 {
    let a = content_tokens(section, &cfg.stopwords);
    let b = content_tokens(block, &cfg.stopwords);
    let union = a.union(&b).count();
    if union == 0 {
        return 0;
    }
    let shared = a.intersection(&b).count();
    let scaled = (shared as u32 * TOKEN_OVERLAP_MAX + union as u32 / 2) / union as u32;
    scaled.min(TOKEN_OVERLAP_MAX) as u8
}

/// Pairs every section with at most one block.
///
/// Exact matches are settled for all sections first, then direct-key matches, so a section
/// named exactly like a block always gets it. The fuzzy strategies only see blocks nobody has
/// claimed.
/// Results come back in section order.
pub fn match_sections<'a>(
    sections: &'a [SectionCandidate],
    blocks: &'a [ContentBlock],
    cfg: &MapperConfig,
) -> Vec<MatchResult<'a>> {
    let mut results: Vec<MatchResult<'a>> = sections.iter().map(MatchResult::unmatched).collect();
    let mut claimed = vec![false; blocks.len()];
    let block_norms: Vec<String> = blocks.iter().map(|b| normalize_name(&b.name)).collect();

    for (si, section) in sections.iter().enumerate() {
        let norm = normalize_name(&section.name);
        if let Some(bi) = (0..blocks.len()).find(|&bi| !claimed[bi] && block_norms[bi] == norm) {
            claimed[bi] = true;
            results[si] = accept(section, &blocks[bi], 100, MatchStrategy::Exact);
        }
    }

    for (si, section) in sections.iter().enumerate() {
        if results[si].block.is_some() {
            continue;
        }
        let key = direct_key(&section.name);
        if let Some(bi) = (0..blocks.len()).find(|&bi| !claimed[bi] && blocks[bi].name == key) {
            claimed[bi] = true;
            results[si] = accept(section, &blocks[bi], 100, MatchStrategy::DirectKey);
        }
    }

    let threshold = cfg.matching.threshold;
    for (si, section) in sections.iter().enumerate() {
        if results[si].block.is_some() {
            continue;
        }
        let norm = normalize_name(&section.name);

        let substring = best_unclaimed(&claimed, |bi| substring_score(&norm, &block_norms[bi]));
        let fuzzy = substring
            .filter(|&(_, score)| score >= threshold)
            .map(|(bi, score)| (bi, score, MatchStrategy::Substring))
            .or_else(|| {
                best_unclaimed(&claimed, |bi| {
                    Some(token_overlap_score(&section.name, &blocks[bi].name, &cfg.matching))
                })
                .filter(|&(_, score)| score > 0 && score >= threshold)
                .map(|(bi, score)| (bi, score, MatchStrategy::TokenOverlap))
            });

        match fuzzy {
            Some((bi, score, strategy)) => {
                claimed[bi] = true;
                results[si] = accept(section, &blocks[bi], score, strategy);
            }
            None => debug!("no block for section '{}'", section.name),
        }
    }
    results
}

/// Highest-scoring unclaimed block; the earliest block wins ties.
fn best_unclaimed(claimed: &[bool], mut score: impl FnMut(usize) -> Option<u8>) -> Option<(usize, u8)> {
    let mut best: Option<(usize, u8)> = None;
    for (bi, &taken) in claimed.iter().enumerate() {
        if taken {
            continue;
        }
        if let Some(s) = score(bi) {
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((bi, s));
            }
        }
    }
    best
}

fn accept<'a>(
    section: &'a SectionCandidate,
    block: &'a ContentBlock,
    score: u8,
    strategy: MatchStrategy,
) -> MatchResult<'a> {
    debug!(
        "section '{}' <- block '{}' ({:?}, {})",
        section.name, block.name, strategy, score
    );
    MatchResult {
        section,
        block: Some(block),
        score,
        strategy,
    }
}
