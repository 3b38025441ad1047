//! Age and gender breakdowns.

use insights_core::types::InsightSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::extractor::MetricsExtractor;
use crate::hierarchy::{Rates, Totals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownDimension {
    Age,
    Gender,
}

impl BreakdownDimension {
    pub const ALL: [BreakdownDimension; 2] = [BreakdownDimension::Age, BreakdownDimension::Gender];

    /// Value of the `breakdowns` query parameter, also the row field name.
    pub fn as_param(&self) -> &'static str {
        match self {
            BreakdownDimension::Age => "age",
            BreakdownDimension::Gender => "gender",
        }
    }
}

impl fmt::Display for BreakdownDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicRow {
    pub dimension: BreakdownDimension,
    pub key: String,
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(flatten)]
    pub rates: Rates,
}

/// Merge breakdown rows by `(dimension, key)`. Output is sorted by
/// dimension then key. Rows missing the dimension field are dropped.
pub fn merge_breakdowns(
    extractor: &MetricsExtractor,
    batches: &[(BreakdownDimension, Vec<InsightSnapshot>)],
) -> Vec<DemographicRow> {
    let mut merged: BTreeMap<(BreakdownDimension, String), Totals> = BTreeMap::new();

    for (dimension, rows) in batches {
        for row in rows {
            let Some(key) = row.text(dimension.as_param()) else {
                continue;
            };
            let totals = Totals::from_ad(&extractor.extract(row));
            merged
                .entry((*dimension, key.to_string()))
                .or_default()
                .absorb(&totals);
        }
    }

    merged
        .into_iter()
        .map(|((dimension, key), totals)| DemographicRow {
            dimension,
            key,
            rates: totals.rates(),
            totals,
        })
        .collect()
}
