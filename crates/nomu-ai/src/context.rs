//! Rendering evidence into prompt context.

use nomu_core::EvidenceRecord;

const BLOCK_SEPARATOR: &str = "\n---\n";

/// Header plus text for each record, joined by `---`, within `budget` chars.
///
/// Stops at the first block that would overflow. A first block longer than
/// the budget is cut so the context is never empty while records exist.
pub fn render_context(records: &[EvidenceRecord], budget: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for record in records {
        let block = format!("{}\n{}", record.header(), record.text.trim());
        let block_chars = block.chars().count();
        let sep_chars = if out.is_empty() { 0 } else { BLOCK_SEPARATOR.chars().count() };
        if used + sep_chars + block_chars > budget {
            if out.is_empty() {
                out.push_str(truncate_chars(&block, budget));
            }
            break;
        }
        if !out.is_empty() {
            out.push_str(BLOCK_SEPARATOR);
        }
        out.push_str(&block);
        used += sep_chars + block_chars;
    }
    out
}

/// One header line per record: a compact summary of what was retrieved.
pub fn render_headers(records: &[EvidenceRecord]) -> String {
    records
        .iter()
        .map(|r| format!("- {}", r.header()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// At most `cap` records, taken round-robin across sources in first-seen order.
pub fn cap_round_robin(records: Vec<EvidenceRecord>, cap: usize) -> Vec<EvidenceRecord> {
    if records.len() <= cap {
        return records;
    }
    let mut queues: Vec<(String, std::collections::VecDeque<EvidenceRecord>)> = Vec::new();
    for record in records {
        match queues.iter_mut().find(|(s, _)| *s == record.source) {
            Some((_, q)) => q.push_back(record),
            None => queues.push((record.source.clone(), [record].into())),
        }
    }
    let mut out = Vec::with_capacity(cap);
    while out.len() < cap {
        let mut took = false;
        for (_, q) in queues.iter_mut() {
            if out.len() == cap {
                break;
            }
            if let Some(r) = q.pop_front() {
                out.push(r);
                took = true;
            }
        }
        if !took {
            break;
        }
    }
    out
}

/// Prefix of `s` with at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
