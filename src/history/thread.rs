use std::collections::{HashMap, HashSet};

use crate::record::ResponseRecord;

/// Rebuilds conversation threads from a flat set of records.
///
/// Each thread is oldest-first. Threads come out in the order their most
/// recent member is reached when walking records newest-first. A backlink to
/// a record that is not in `records` ends the thread there.
pub fn build_threads(mut records: Vec<ResponseRecord>) -> Vec<Vec<ResponseRecord>> {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    let index_by_id: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (record.id.as_str(), idx))
        .collect();

    let mut visited = vec![false; records.len()];
    let mut chains: Vec<Vec<usize>> = Vec::new();

    for start in 0..records.len() {
        if visited[start] {
            continue;
        }

        let mut chain = Vec::new();
        let mut in_chain = HashSet::new();
        let mut current = Some(start);
        while let Some(idx) = current {
            if !in_chain.insert(idx) {
                break;
            }
            visited[idx] = true;
            chain.push(idx);
            current = records[idx]
                .previous_response_id
                .as_deref()
                .and_then(|prev| index_by_id.get(prev).copied());
        }

        chain.reverse();
        chains.push(chain);
    }

    chains
        .into_iter()
        .map(|chain| chain.into_iter().map(|idx| records[idx].clone()).collect())
        .collect()
}
