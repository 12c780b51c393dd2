use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::core::error::RateError;

/// Picks the most trustworthy value out of candidate rates.
///
/// With one or two candidates the first one wins. With more, the pairs of
/// candidates closest to each other are taken: a single closest pair yields
/// its first member, several equally close pairs yield the value occurring
/// most often among them, earlier candidates winning ties.
pub fn pick_the_best(rates: &[Decimal]) -> Result<Decimal, RateError> {
    match rates {
        [] => return Err(RateError::NoCandidates),
        [first] | [first, _] => return Ok(*first),
        _ => {}
    }

    let mut pairs_by_difference: BTreeMap<Decimal, Vec<(usize, usize)>> = BTreeMap::new();
    for i in 0..rates.len() {
        for j in i + 1..rates.len() {
            let difference = rates[i]
                .checked_sub(rates[j])
                .map(|d| d.abs())
                .unwrap_or(Decimal::MAX);
            pairs_by_difference.entry(difference).or_default().push((i, j));
        }
    }

    let Some((_, closest)) = pairs_by_difference.into_iter().next() else {
        return Err(RateError::NoCandidates);
    };
    if let [(i, _)] = closest.as_slice() {
        return Ok(rates[*i]);
    }

    let mut counts: Vec<(Decimal, usize)> = Vec::new();
    for (i, j) in closest {
        for value in [rates[i], rates[j]] {
            match counts.iter_mut().find(|(v, _)| *v == value) {
                Some((_, count)) => *count += 1,
                None => counts.push((value, 1)),
            }
        }
    }
    // First maximum in encounter order.
    let mut best = counts[0];
    for candidate in &counts[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }
    Ok(best.0)
}
