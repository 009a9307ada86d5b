use crate::RawSample;

/// Sort ascending by timestamp and drop duplicate timestamps, keeping the
/// last occurrence (the sort is stable, so equal timestamps keep source
/// delivery order and the newest write wins).
pub fn sort_and_dedup(mut samples: Vec<RawSample>) -> Vec<RawSample> {
    samples.sort_by_key(|sample| sample.ts);
    samples.reverse();
    samples.dedup_by_key(|sample| sample.ts);
    samples.reverse();
    samples
}

/// Reduce an over-long series to at most `max_points` samples by stepped
/// index selection. The chronologically last sample always survives: if the
/// stride did not land on it, the final selected slot is overwritten in
/// place (timestamp equality check, never an insertion, so the cap holds
/// and no duplicate timestamp can appear).
///
/// Spacing near the end of the series may be uneven because of that
/// correction; losing the newest point would be worse.
///
/// Input must already be sorted ascending with unique timestamps (see
/// [`sort_and_dedup`]).
pub fn downsample(samples: Vec<RawSample>, max_points: usize) -> Vec<RawSample> {
    if samples.len() <= max_points {
        return samples;
    }

    let step = samples.len().div_ceil(max_points);
    let mut selected = Vec::with_capacity(max_points);
    for index in (0..samples.len()).step_by(step) {
        selected.push(samples[index].clone());
        if selected.len() == max_points {
            break;
        }
    }

    if let (Some(slot), Some(last)) = (selected.last_mut(), samples.last()) {
        if slot.ts != last.ts {
            *slot = last.clone();
        }
    }

    selected
}
