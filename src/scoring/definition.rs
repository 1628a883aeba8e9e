//! Static indicator configuration

use crate::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How a raw delta is expressed before bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// `delta / |baseline| * 100`, for flow indicators (payrolls, claims, sales)
    Percent,
    /// `delta` as is, for rates and levels (inflation, unemployment, PMI)
    Point,
}

impl Normalization {
    pub fn unit(&self) -> &'static str {
        match self {
            Normalization::Percent => "%",
            Normalization::Point => "pp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Employment,
    Inflation,
    Activity,
    Policy,
}

/// Cutoffs mapping a normalized surprise to a sub-score
///
/// `v <= strong_negative` -> -2, `v <= negative` -> -1, `v < positive` -> 0,
/// `v <= strong_positive` -> +1, above -> +2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLadder {
    pub strong_negative: f64,
    pub negative: f64,
    pub positive: f64,
    pub strong_positive: f64,
}

impl ThresholdLadder {
    pub fn new(strong_negative: f64, negative: f64, positive: f64, strong_positive: f64) -> Self {
        Self {
            strong_negative,
            negative,
            positive,
            strong_positive,
        }
    }

    /// Default ladder for percentage surprises
    pub fn percent() -> Self {
        Self::new(-30.0, -10.0, 10.0, 30.0)
    }

    /// Default ladder for percentage-point deltas
    pub fn point() -> Self {
        Self::new(-0.20, -0.10, 0.10, 0.20)
    }

    pub fn bucket(&self, value: f64) -> i8 {
        if value <= self.strong_negative {
            -2
        } else if value <= self.negative {
            -1
        } else if value < self.positive {
            0
        } else if value <= self.strong_positive {
            1
        } else {
            2
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = self.strong_negative <= self.negative
            && self.negative < self.positive
            && self.positive <= self.strong_positive;
        let finite = [self.strong_negative, self.negative, self.positive, self.strong_positive]
            .iter()
            .all(|v| v.is_finite());

        if !finite || !ordered {
            return Err(BotError::Config(format!(
                "threshold ladder must be finite and ascending: {:?}",
                self
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    /// Relative importance, non-negative
    pub weight: f64,
    /// Higher actual value is USD-negative (unemployment, claims)
    #[serde(default)]
    pub inverted: bool,
    pub normalization: Normalization,
    pub thresholds: ThresholdLadder,
    pub category: Category,
}

impl IndicatorDefinition {
    pub fn percent(weight: f64, category: Category) -> Self {
        Self {
            weight,
            inverted: false,
            normalization: Normalization::Percent,
            thresholds: ThresholdLadder::percent(),
            category,
        }
    }

    pub fn point(weight: f64, category: Category) -> Self {
        Self {
            weight,
            inverted: false,
            normalization: Normalization::Point,
            thresholds: ThresholdLadder::point(),
            category,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdLadder) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(BotError::Config(format!(
                "indicator {} has invalid weight {}",
                name, self.weight
            )));
        }
        self.thresholds.validate()
    }
}

/// Partial definition read from configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndicatorOverride {
    pub weight: Option<f64>,
    pub inverted: Option<bool>,
    pub normalization: Option<Normalization>,
    pub thresholds: Option<ThresholdLadder>,
    pub category: Option<Category>,
}

/// Indicator code -> definition, iterated in code order
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTable {
    definitions: BTreeMap<String, IndicatorDefinition>,
}

impl Default for IndicatorTable {
    /// US release set with the weights used by the live bot
    fn default() -> Self {
        use Category::*;

        let pmi = ThresholdLadder::new(-4.0, -2.0, 2.0, 4.0);
        let claims = ThresholdLadder::new(-15.0, -5.0, 5.0, 15.0);
        let rate_decision = ThresholdLadder::new(-0.25, -0.10, 0.10, 0.25);

        let definitions = [
            ("NFP", IndicatorDefinition::percent(1.2, Employment)),
            ("ADP", IndicatorDefinition::percent(0.5, Employment)),
            ("UNEMPLOYMENT", IndicatorDefinition::point(1.0, Employment).inverted()),
            ("AHE", IndicatorDefinition::point(0.6, Employment)),
            (
                "CLAIMS",
                IndicatorDefinition::percent(0.3, Employment)
                    .inverted()
                    .with_thresholds(claims),
            ),
            ("CPI", IndicatorDefinition::point(1.0, Inflation)),
            ("CORE_CPI", IndicatorDefinition::point(1.2, Inflation)),
            ("PCE", IndicatorDefinition::point(0.8, Inflation)),
            ("CORE_PCE", IndicatorDefinition::point(1.2, Inflation)),
            ("ISM_MFG", IndicatorDefinition::point(0.6, Activity).with_thresholds(pmi)),
            ("ISM_SERVICES", IndicatorDefinition::point(0.8, Activity).with_thresholds(pmi)),
            ("RETAIL_SALES", IndicatorDefinition::percent(0.5, Activity)),
            ("FOMC", IndicatorDefinition::point(1.4, Policy).with_thresholds(rate_decision)),
        ]
        .into_iter()
        .map(|(name, def)| (name.to_string(), def))
        .collect();

        Self { definitions }
    }
}

impl IndicatorTable {
    pub fn empty() -> Self {
        Self {
            definitions: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: IndicatorDefinition) {
        self.definitions.insert(name.into(), definition);
    }

    pub fn remove(&mut self, name: &str) -> Option<IndicatorDefinition> {
        self.definitions.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorDefinition> {
        self.definitions.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndicatorDefinition)> {
        self.definitions.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Apply configured overrides on top of this table.
    ///
    /// An override for an unknown code adds a new percent-style indicator
    /// in the activity category unless the override says otherwise.
    pub fn with_overrides(mut self, overrides: &HashMap<String, IndicatorOverride>) -> Result<Self> {
        for (raw_name, ov) in overrides {
            let name = raw_name.to_uppercase();
            let base = self.definitions.get(&name).cloned().unwrap_or_else(|| {
                let normalization = ov.normalization.unwrap_or(Normalization::Percent);
                let category = ov.category.unwrap_or(Category::Activity);
                match normalization {
                    Normalization::Percent => IndicatorDefinition::percent(1.0, category),
                    Normalization::Point => IndicatorDefinition::point(1.0, category),
                }
            });

            let mut def = base;
            if let Some(weight) = ov.weight {
                def.weight = weight;
            }
            if let Some(inverted) = ov.inverted {
                def.inverted = inverted;
            }
            if let Some(normalization) = ov.normalization {
                if normalization != def.normalization && ov.thresholds.is_none() {
                    def.thresholds = match normalization {
                        Normalization::Percent => ThresholdLadder::percent(),
                        Normalization::Point => ThresholdLadder::point(),
                    };
                }
                def.normalization = normalization;
            }
            if let Some(thresholds) = ov.thresholds {
                def.thresholds = thresholds;
            }
            if let Some(category) = ov.category {
                def.category = category;
            }

            def.validate(&name)?;
            tracing::debug!("Indicator {} configured: {:?}", name, def);
            self.definitions.insert(name, def);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, def) in &self.definitions {
            def.validate(name)?;
        }
        Ok(())
    }
}

/// Map a provider's event title to an indicator code.
///
/// Inflation indicators are scored on rates, so price index levels get
/// their own `*_INDEX` codes. Unknown titles are returned upper-cased with
/// spaces replaced by `_`.
pub fn canonical_indicator_name(title: &str) -> String {
    let lowered = title.trim().to_lowercase();

    let code = match lowered.as_str() {
        "nonfarm payrolls" | "non farm payrolls" | "non-farm payrolls" => "NFP",
        "unemployment rate" => "UNEMPLOYMENT",
        "average hourly earnings" | "average hourly earnings mom" => "AHE",
        "adp employment change" => "ADP",
        "inflation rate" | "inflation rate yoy" | "cpi yoy" => "CPI",
        "core inflation rate" | "core inflation rate yoy" | "core cpi yoy" => "CORE_CPI",
        "pce price index yoy" | "pce prices yoy" => "PCE",
        "core pce price index yoy" | "core pce prices yoy" => "CORE_PCE",
        "cpi" | "cpi s.a" | "consumer price index" => "CPI_INDEX",
        "core cpi" | "cpi core core" => "CORE_CPI_INDEX",
        "pce price index" | "personal consumption expenditures" => "PCE_INDEX",
        "core pce price index" | "core pce" => "CORE_PCE_INDEX",
        "ism manufacturing pmi" => "ISM_MFG",
        "ism services pmi" | "ism non-manufacturing pmi" => "ISM_SERVICES",
        "initial jobless claims" => "CLAIMS",
        "retail sales mom" | "retail sales" => "RETAIL_SALES",
        "fed interest rate decision" | "interest rate decision" | "fomc rate decision"
        | "federal funds rate" => "FOMC",
        _ => "",
    };

    if code.is_empty() {
        title.trim().to_uppercase().replace([' ', '-'], "_")
    } else {
        code.to_string()
    }
}
