use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use super::medical::Abnormality;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct BmiDistribution {
    pub underweight: usize,
    pub normal: usize,
    pub overweight: usize,
    pub obese: usize,
}

/// Records created in one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub records: usize,
    pub healthy: usize,
    pub healthy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SymptomCount {
    pub symptom: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CohortHealth {
    pub cohort: String,
    pub records: usize,
    pub healthy: usize,
    pub healthy_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct HealthAnalytics {
    pub bmi_distribution: BmiDistribution,
    pub trends: Vec<MonthlyTrend>,
    pub symptoms: Vec<SymptomCount>,
    pub cohorts: Vec<CohortHealth>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Dashboard {
    pub doctors: i64,
    pub students: i64,
    pub exam_sessions: i64,
    pub abnormalities: i64,
    pub drugs: i64,
    pub news: i64,
    pub latest_abnormalities: Vec<Abnormality>,
}
