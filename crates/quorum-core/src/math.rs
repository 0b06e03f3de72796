//! Shared math utilities.

/// Index of the largest value; the first one wins on ties.
///
/// Returns `None` for an empty slice. NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, top)) if v <= top || v.is_nan() => {}
            None if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Row-wise argmax of a logits matrix, as answer ids.
///
/// A row with no maximum (empty or all NaN) fails with that row's index.
pub fn argmax_rows(rows: &[Vec<f32>]) -> Result<Vec<u32>, usize> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| argmax(row).map(|id| id as u32).ok_or(i))
        .collect()
}

/// Concatenate feature vectors in order.
pub fn concat(parts: &[&[f32]]) -> Vec<f32> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}
