use super::error::ResolveError;

/// Expands an abbreviated id by unique suffix match against `ids`.
///
/// Candidates at least `full_len` characters long are taken as complete and
/// returned unchanged, whether or not they are stored locally.
pub fn resolve<S: AsRef<str>>(
    candidate: &str,
    ids: &[S],
    full_len: usize,
) -> Result<String, ResolveError> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(ResolveError::NotFound {
            candidate: candidate.to_string(),
        });
    }
    if candidate.chars().count() >= full_len {
        return Ok(candidate.to_string());
    }

    let mut matches: Vec<String> = ids
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| id.ends_with(candidate))
        .map(str::to_string)
        .collect();

    match matches.len() {
        0 => Err(ResolveError::NotFound {
            candidate: candidate.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        _ => {
            matches.sort();
            Err(ResolveError::Ambiguous {
                candidate: candidate.to_string(),
                matches,
            })
        }
    }
}

/// Shortest suffix of `id`, at least `min_len` long, that no other id in
/// `ids` shares.
pub fn abbreviate<'a, S: AsRef<str>>(id: &'a str, ids: &[S], min_len: usize) -> &'a str {
    let boundaries: Vec<usize> = id.char_indices().map(|(idx, _)| idx).rev().collect();

    for (taken, start) in boundaries.iter().enumerate() {
        if taken + 1 < min_len {
            continue;
        }
        let suffix = &id[*start..];
        let shared = ids
            .iter()
            .map(AsRef::as_ref)
            .any(|other| other != id && other.ends_with(suffix));
        if !shared {
            return suffix;
        }
    }

    id
}
