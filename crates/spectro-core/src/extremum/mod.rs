use crate::domain::{AggregatedPoint, LocalMaximumQuery, QueryId, WaveRange};

/// Returns the point with the greatest mean absorbance whose integer
/// wavelength lies in `[start, end)`. Equal means resolve to the lowest
/// wavelength. NaN means never win. `None` when the range holds no point.
pub fn find_local_maximum(curve: &[AggregatedPoint], range: &WaveRange) -> Option<AggregatedPoint> {
    let maximum = curve
        .iter()
        .filter(|point| range.contains(point.wavelength_int as f64))
        .filter(|point| !point.mean_absorbance_au.is_nan())
        .fold(None::<AggregatedPoint>, |best, point| match best {
            Some(current) if outranks(&current, point) => Some(current),
            _ => Some(*point),
        });

    tracing::debug!(
        range = %range,
        wavelength = maximum.map(|point| point.wavelength_int),
        "local maximum lookup"
    );
    maximum
}

fn outranks(current: &AggregatedPoint, candidate: &AggregatedPoint) -> bool {
    current.mean_absorbance_au > candidate.mean_absorbance_au
        || (current.mean_absorbance_au == candidate.mean_absorbance_au
            && current.wavelength_int <= candidate.wavelength_int)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMaximumReport {
    pub query_id: QueryId,
    pub range: WaveRange,
    pub maximum: Option<AggregatedPoint>,
}

/// Evaluates every query against the same curve.
pub fn evaluate_queries<'a, I>(curve: &[AggregatedPoint], queries: I) -> Vec<LocalMaximumReport>
where
    I: IntoIterator<Item = &'a LocalMaximumQuery>,
{
    queries
        .into_iter()
        .map(|query| LocalMaximumReport {
            query_id: query.id,
            range: query.range,
            maximum: find_local_maximum(curve, &query.range),
        })
        .collect()
}
