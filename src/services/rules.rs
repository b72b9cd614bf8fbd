//! Rule correction of classifier probabilities.
//!
//! The classifier knows nothing about the tariff's hard constraints. This
//! module threads its raw `{blue, white, red}` vector through a fixed sequence
//! of stages, each a total function returning a new value:
//!
//! 1. seasonal red exclusion (red only November–March)
//! 2. Saturday red exclusion
//! 3. Sunday override (always blue)
//! 4. quota exhaustion, from confirmed history
//! 5. renormalization, with a fallback distribution when nothing is left
//! 6. confidence cap, except on Sundays
//!
//! Stage 1–2 only zero the red entry; the mass is redistributed by the
//! renormalization in stage 5. Colors zeroed by stages 1–4 stay excluded:
//! neither the fallback nor the cap may give them probability again.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::PolicyConfig;
use crate::services::quota::Remaining;
use crate::services::season::{is_saturday, is_sunday, is_winter};
use crate::services::tariff::Color;

/// Probability per color. Entries are not required to sum to 1 until the
/// renormalization stage has run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Probabilities {
    pub blue: f64,
    pub white: f64,
    pub red: f64,
}

impl Probabilities {
    pub const fn new(blue: f64, white: f64, red: f64) -> Self {
        Self { blue, white, red }
    }

    pub fn get(&self, color: Color) -> f64 {
        match color {
            Color::Blue => self.blue,
            Color::White => self.white,
            Color::Red => self.red,
        }
    }

    #[must_use]
    pub fn with(self, color: Color, value: f64) -> Self {
        let mut next = self;
        match color {
            Color::Blue => next.blue = value,
            Color::White => next.white = value,
            Color::Red => next.red = value,
        }
        next
    }

    pub fn sum(&self) -> f64 {
        self.blue + self.white + self.red
    }

    /// Most probable color; ties resolve in blue, white, red order.
    pub fn argmax(&self) -> Color {
        let mut best = Color::Blue;
        for color in [Color::White, Color::Red] {
            if self.get(color) > self.get(best) {
                best = color;
            }
        }
        best
    }

    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.blue * factor, self.white * factor, self.red * factor)
    }

    /// Build a vector from classifier `(label, probability)` pairs.
    ///
    /// Labels that are not a known color are ignored; negative or non-finite
    /// probabilities count as 0.
    pub fn from_labelled<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        pairs
            .into_iter()
            .fold(Self::new(0.0, 0.0, 0.0), |acc, (label, p)| {
                match Color::from_label(label) {
                    Some(color) => acc.with(color, sanitize(p)),
                    None => {
                        tracing::debug!("ignoring unknown classifier label '{}'", label);
                        acc
                    }
                }
            })
    }

    /// Integer percentages summing to exactly 100.
    ///
    /// Non-top colors are rounded to the nearest percent; the arg-max color
    /// absorbs the rounding remainder. A non-top color rounded above the
    /// arg-max hands points back until it no longer exceeds it.
    pub fn to_percentages(&self) -> Percentages {
        let top = self.argmax();
        let mut values = [0u32; 3];
        for color in Color::ALL {
            if color != top {
                values[color.index()] = (self.get(color) * 100.0).round().clamp(0.0, 100.0) as u32;
            }
        }
        let others = |values: &[u32; 3]| -> u32 {
            Color::ALL
                .iter()
                .filter(|c| **c != top)
                .map(|c| values[c.index()])
                .sum()
        };
        values[top.index()] = 100u32.saturating_sub(others(&values));

        while let Some(over) = Color::ALL
            .into_iter()
            .find(|c| *c != top && values[c.index()] > values[top.index()])
        {
            values[over.index()] -= 1;
            values[top.index()] = 100u32.saturating_sub(others(&values));
        }
        Percentages {
            blue: values[0],
            white: values[1],
            red: values[2],
        }
    }
}

fn sanitize(p: f64) -> f64 {
    if p.is_finite() && p > 0.0 {
        p
    } else {
        0.0
    }
}

/// Integer percentage per color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Percentages {
    pub blue: u32,
    pub white: u32,
    pub red: u32,
}

impl Percentages {
    pub fn get(&self, color: Color) -> u32 {
        match color {
            Color::Blue => self.blue,
            Color::White => self.white,
            Color::Red => self.red,
        }
    }

    pub fn sum(&self) -> u32 {
        self.blue + self.white + self.red
    }
}

/// Rule stages that can fire for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    SeasonalRedExclusion,
    SaturdayRedExclusion,
    SundayOverride,
    BlueQuotaExhausted,
    WhiteQuotaExhausted,
    RedQuotaExhausted,
    Fallback,
    ConfidenceCap,
}

impl Rule {
    fn quota_exhausted(color: Color) -> Self {
        match color {
            Color::Blue => Rule::BlueQuotaExhausted,
            Color::White => Rule::WhiteQuotaExhausted,
            Color::Red => Rule::RedQuotaExhausted,
        }
    }
}

/// What the pipeline needs to know about the day being corrected.
#[derive(Debug, Clone, Copy)]
pub struct DayContext {
    pub date: NaiveDate,
    /// Remaining quota from confirmed history only.
    pub remaining: Remaining,
}

/// A probability vector on its way through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    probabilities: Probabilities,
    fired: Vec<Rule>,
    calendar_excluded: [bool; 3],
    quota_excluded: [bool; 3],
}

impl Correction {
    pub fn new(raw: Probabilities) -> Self {
        Self {
            probabilities: Probabilities::new(
                sanitize(raw.blue),
                sanitize(raw.white),
                sanitize(raw.red),
            ),
            fired: Vec::new(),
            calendar_excluded: [false; 3],
            quota_excluded: [false; 3],
        }
    }

    pub fn probabilities(&self) -> Probabilities {
        self.probabilities
    }

    pub fn fired(&self) -> &[Rule] {
        &self.fired
    }

    pub fn into_fired(self) -> Vec<Rule> {
        self.fired
    }

    pub fn predicted_color(&self) -> Color {
        self.probabilities.argmax()
    }

    pub fn confidence(&self) -> f64 {
        self.probabilities.get(self.predicted_color())
    }

    fn is_eligible(&self, color: Color) -> bool {
        !self.calendar_excluded[color.index()] && !self.quota_excluded[color.index()]
    }

    fn exclude_by_calendar(mut self, color: Color, rule: Rule) -> Self {
        self.probabilities = self.probabilities.with(color, 0.0);
        self.calendar_excluded[color.index()] = true;
        self.fired.push(rule);
        self
    }
}

/// Stage 1: red is only possible in winter months.
pub(crate) fn seasonal_red_exclusion(c: Correction, date: NaiveDate) -> Correction {
    if is_winter(date.month()) {
        return c;
    }
    c.exclude_by_calendar(Color::Red, Rule::SeasonalRedExclusion)
}

/// Stage 2: red is never possible on a Saturday.
pub(crate) fn saturday_red_exclusion(c: Correction, date: NaiveDate) -> Correction {
    if !is_saturday(date) {
        return c;
    }
    c.exclude_by_calendar(Color::Red, Rule::SaturdayRedExclusion)
}

/// Stage 3: Sunday is always blue, whatever the classifier said.
pub(crate) fn sunday_override(mut c: Correction, date: NaiveDate) -> Correction {
    if !is_sunday(date) {
        return c;
    }
    c.probabilities = Probabilities::new(1.0, 0.0, 0.0);
    c.calendar_excluded[Color::White.index()] = true;
    c.calendar_excluded[Color::Red.index()] = true;
    c.fired.push(Rule::SundayOverride);
    c
}

/// Stage 4: zero every color whose confirmed quota is used up.
pub(crate) fn quota_exhaustion(mut c: Correction, day: &DayContext, sunday_exempt: bool) -> Correction {
    if sunday_exempt && is_sunday(day.date) {
        return c;
    }
    for color in Color::ALL {
        if day.remaining.is_exhausted(color) {
            c.probabilities = c.probabilities.with(color, 0.0);
            c.quota_excluded[color.index()] = true;
            c.fired.push(Rule::quota_exhausted(color));
        }
    }
    c
}

/// Stage 5: scale to a sum of 1, or fall back when every color is zero.
///
/// The fallback keeps the calendar exclusions of stages 1–3 so a summer or
/// Saturday fallback still has no red.
pub(crate) fn renormalize(mut c: Correction, fallback: Probabilities) -> Correction {
    let total = c.probabilities.sum();
    if total > 0.0 {
        c.probabilities = c.probabilities.scaled(1.0 / total);
        return c;
    }

    let mut masked = fallback;
    for color in Color::ALL {
        if c.calendar_excluded[color.index()] {
            masked = masked.with(color, 0.0);
        }
    }
    let base = if masked.sum() > 0.0 { masked } else { fallback };
    let base_total = base.sum();
    c.probabilities = if base_total > 0.0 {
        base.scaled(1.0 / base_total)
    } else {
        Probabilities::new(1.0, 0.0, 0.0)
    };
    c.fired.push(Rule::Fallback);
    c
}

/// Stage 6: clip the top color to `ceiling` and hand the excess to the other
/// eligible colors, proportionally to their weight (equally when they are
/// all zero). Sundays keep their certainty; a day with no other eligible
/// color is left as is.
pub(crate) fn confidence_cap(mut c: Correction, date: NaiveDate, ceiling: f64) -> Correction {
    if is_sunday(date) {
        return c;
    }
    let top = c.probabilities.argmax();
    let top_value = c.probabilities.get(top);
    if top_value <= ceiling {
        return c;
    }

    let receivers: Vec<Color> = Color::ALL
        .into_iter()
        .filter(|color| *color != top && c.is_eligible(*color))
        .collect();
    if receivers.is_empty() {
        return c;
    }

    let excess = top_value - ceiling;
    let weight: f64 = receivers.iter().map(|color| c.probabilities.get(*color)).sum();
    let mut next = c.probabilities.with(top, ceiling);
    for color in &receivers {
        let share = if weight > 0.0 {
            c.probabilities.get(*color) / weight
        } else {
            1.0 / receivers.len() as f64
        };
        next = next.with(*color, c.probabilities.get(*color) + excess * share);
    }

    c.probabilities = next;
    c.fired.push(Rule::ConfidenceCap);
    c
}

/// The ordered rule stages with their policy constants.
#[derive(Debug, Clone)]
pub struct RulePipeline {
    ceiling: f64,
    fallback: Probabilities,
    sunday_quota_exempt: bool,
}

impl RulePipeline {
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self {
            ceiling: policy.confidence_ceiling,
            fallback: policy.fallback,
            sunday_quota_exempt: policy.sunday_quota_exempt,
        }
    }

    /// Run every stage in order on a raw classifier vector.
    pub fn apply(&self, raw: Probabilities, day: &DayContext) -> Correction {
        let c = Correction::new(raw);
        let c = seasonal_red_exclusion(c, day.date);
        let c = saturday_red_exclusion(c, day.date);
        let c = sunday_override(c, day.date);
        let c = quota_exhaustion(c, day, self.sunday_quota_exempt);
        let c = renormalize(c, self.fallback);
        confidence_cap(c, day.date, self.ceiling)
    }
}
