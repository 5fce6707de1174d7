use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Converts a scalar JSON value; `null`, arrays and objects yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Float)),
            Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }
}

/// Field name/value pairs kept in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet(Vec<(&'static str, FieldValue)>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &'static str, value: FieldValue) {
        self.0.push((name, value));
    }

    pub fn extend(&mut self, other: &FieldSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.0.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSummary {
    pub sleep_time_hours: f64,
    pub sleep_start_time: NaiveDateTime,
    pub sleep_end_time: NaiveDateTime,
    pub sleep_score: i64,
}

impl SleepSummary {
    pub fn fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.push("sleepWindowConfirmed", FieldValue::Bool(true));
        fields.push("sleepTimeHours", FieldValue::Float(self.sleep_time_hours));
        fields.push("sleepStartTime", FieldValue::DateTime(self.sleep_start_time));
        fields.push("sleepEndTime", FieldValue::DateTime(self.sleep_end_time));
        fields.push("sleepScore", FieldValue::Int(self.sleep_score));
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SleepWindow {
    Confirmed(SleepSummary),
    Unconfirmed,
}

/// Service-sourced measurements for one record date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMetrics {
    pub sleep: SleepWindow,
    pub health: FieldSet,
    pub heart_rate: FieldSet,
    pub stress: FieldSet,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepsSummary {
    pub intervals: usize,
    pub total_steps: i64,
}

/// Subjective ratings entered at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRating {
    pub wakefulness: i64,
    pub cups_of_coffee: i64,
    pub modafanil: f64,
    pub exercise_yesterday: bool,
    pub exercise_today: bool,
    pub focus: i64,
    pub day_score: i64,
    pub enjoyability: i64,
}

impl UserRating {
    pub fn fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.push("wakefulness", FieldValue::Int(self.wakefulness));
        fields.push("cupsOfCoffee", FieldValue::Int(self.cups_of_coffee));
        fields.push("modafanil", FieldValue::Float(self.modafanil));
        fields.push("exerciseYesterday", FieldValue::Bool(self.exercise_yesterday));
        fields.push("exerciseToday", FieldValue::Bool(self.exercise_today));
        fields.push("focus", FieldValue::Int(self.focus));
        fields.push("dayScore", FieldValue::Int(self.day_score));
        fields.push("enjoyability", FieldValue::Int(self.enjoyability));
        fields
    }
}

/// One workbook row: date, ratings, then sleep, health, heart-rate and stress fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub fields: FieldSet,
}

impl DailyRecord {
    pub fn assemble(date: NaiveDate, rating: &UserRating, sleep: &SleepSummary, metrics: &DailyMetrics) -> Self {
        let mut fields = FieldSet::new();
        fields.push("date", FieldValue::Date(date));
        fields.extend(&rating.fields());
        fields.extend(&sleep.fields());
        fields.extend(&metrics.health);
        fields.extend(&metrics.heart_rate);
        fields.extend(&metrics.stress);
        Self { date, fields }
    }
}
