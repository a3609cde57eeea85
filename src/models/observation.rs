use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One recorded gold rate: 22 karat, per gram, in rupees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observation {
    pub date: NaiveDate,
    pub price: Decimal,
}

impl Observation {
    pub fn new(date: NaiveDate, price: Decimal) -> Self {
        Self { date, price }
    }
}

/// Observations in the order they were recorded. Same-day duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }

    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Most recently recorded observation from a day before `date`.
    pub fn previous_before(&self, date: NaiveDate) -> Option<&Observation> {
        self.observations.iter().rev().find(|o| o.date < date)
    }

    /// Stable sort by date, so same-day entries keep their recorded order.
    pub fn sorted_by_date(&self) -> Vec<Observation> {
        let mut sorted = self.observations.clone();
        sorted.sort_by_key(|o| o.date);
        sorted
    }
}

impl From<Vec<Observation>> for Series {
    fn from(observations: Vec<Observation>) -> Self {
        Self { observations }
    }
}

impl FromIterator<Observation> for Series {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self { observations: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}
