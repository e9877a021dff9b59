/// Smallest non-negative id not present in `existing`. Ids freed by deletion
/// are handed out again before the id space grows.
pub fn next_quiz_id<I>(existing: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    let mut ids: Vec<u32> = existing.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let mut candidate = 0;
    for id in ids {
        if candidate < id {
            break;
        }
        candidate = id.saturating_add(1);
    }
    candidate
}
