use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};

use school_health_data::repository::{
    AbnormalityRepositoryTrait, AccountRepositoryTrait, DoctorRepositoryTrait, DrugRepositoryTrait,
    ExamSessionRepositoryTrait, NewsRepositoryTrait, PhysicalFitnessRepositoryTrait,
};

use crate::entities::account::AccountRole;
use crate::entities::analytics::{BmiDistribution, CohortHealth, Dashboard, HealthAnalytics, MonthlyTrend, SymptomCount};
use crate::entities::conversions;
use crate::entities::medical::Abnormality;
use crate::entities::physical_fitness::PhysicalFitness;
use crate::entities::round2;
use crate::errors::ServiceError;

const TREND_MONTHS: usize = 6;
const TOP_SYMPTOMS: usize = 5;
const DASHBOARD_LATEST: usize = 5;

/// Coarse BMI bucket used by the charts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

pub fn bmi_category(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 24.9 {
        BmiCategory::Normal
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

pub fn is_healthy_bmi(bmi: f64) -> bool {
    (18.5..24.9).contains(&bmi)
}

pub fn is_valid_bmi(bmi: f64) -> bool {
    bmi > 0.0 && bmi < 100.0
}

fn healthy_rate(healthy: usize, records: usize) -> f64 {
    if records == 0 {
        0.0
    } else {
        round2(healthy as f64 * 100.0 / records as f64)
    }
}

fn valid_bmi(record: &PhysicalFitness) -> Option<f64> {
    record.bmi.filter(|b| is_valid_bmi(*b))
}

/// The `TREND_MONTHS` calendar months ending with `now`, oldest first
fn trend_months(now: DateTime<Utc>) -> Vec<(i32, u32)> {
    let mut months = Vec::with_capacity(TREND_MONTHS);
    let (mut year, mut month) = (now.year(), now.month());
    for _ in 0..TREND_MONTHS {
        months.push((year, month));
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    months.reverse();
    months
}

/// Aggregate fitness records and abnormalities into chart data
pub fn build_analytics(records: &[PhysicalFitness], abnormalities: &[Abnormality], now: DateTime<Utc>) -> HealthAnalytics {
    let mut distribution = BmiDistribution::default();
    for bmi in records.iter().filter_map(valid_bmi) {
        match bmi_category(bmi) {
            BmiCategory::Underweight => distribution.underweight += 1,
            BmiCategory::Normal => distribution.normal += 1,
            BmiCategory::Overweight => distribution.overweight += 1,
            BmiCategory::Obese => distribution.obese += 1,
        }
    }

    let trends = trend_months(now)
        .into_iter()
        .map(|(year, month)| {
            let in_month: Vec<&PhysicalFitness> = records
                .iter()
                .filter(|r| r.created_at.year() == year && r.created_at.month() == month)
                .collect();
            let healthy = in_month.iter().filter(|r| valid_bmi(r).map(is_healthy_bmi).unwrap_or(false)).count();
            MonthlyTrend {
                month: format!("{:04}-{:02}", year, month),
                records: in_month.len(),
                healthy,
                healthy_rate: healthy_rate(healthy, in_month.len()),
            }
        })
        .collect();

    let mut symptom_counts: HashMap<String, usize> = HashMap::new();
    for symptom in abnormalities.iter().flat_map(|a| a.symptoms.iter()) {
        let symptom = symptom.trim();
        if !symptom.is_empty() {
            *symptom_counts.entry(symptom.to_string()).or_insert(0) += 1;
        }
    }
    let mut symptoms: Vec<SymptomCount> = symptom_counts
        .into_iter()
        .map(|(symptom, count)| SymptomCount { symptom, count })
        .collect();
    symptoms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symptom.cmp(&b.symptom)));
    symptoms.truncate(TOP_SYMPTOMS);

    let mut by_cohort: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for record in records {
        let Some(cohort) = record.cohort.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        let entry = by_cohort.entry(cohort.to_string()).or_insert((0, 0));
        entry.0 += 1;
        if valid_bmi(record).map(is_healthy_bmi).unwrap_or(false) {
            entry.1 += 1;
        }
    }
    let cohorts = by_cohort
        .into_iter()
        .map(|(cohort, (records, healthy))| CohortHealth {
            cohort,
            records,
            healthy,
            healthy_rate: healthy_rate(healthy, records),
        })
        .collect();

    HealthAnalytics { bmi_distribution: distribution, trends, symptoms, cohorts }
}

/// Admin dashboard and health analytics
pub struct AnalyticsService {
    pub fitness: Arc<dyn PhysicalFitnessRepositoryTrait + Send + Sync>,
    pub abnormalities: Arc<dyn AbnormalityRepositoryTrait + Send + Sync>,
    pub accounts: Arc<dyn AccountRepositoryTrait + Send + Sync>,
    pub doctors: Arc<dyn DoctorRepositoryTrait + Send + Sync>,
    pub sessions: Arc<dyn ExamSessionRepositoryTrait + Send + Sync>,
    pub drugs: Arc<dyn DrugRepositoryTrait + Send + Sync>,
    pub news: Arc<dyn NewsRepositoryTrait + Send + Sync>,
}

impl AnalyticsService {
    pub async fn health_analytics(&self) -> Result<HealthAnalytics, ServiceError> {
        let records: Vec<PhysicalFitness> = self
            .fitness
            .list(None)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_fitness)
            .collect::<Result<_, _>>()?;
        let abnormalities: Vec<Abnormality> = self
            .abnormalities
            .list()
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_abnormality)
            .collect();

        Ok(build_analytics(&records, &abnormalities, Utc::now()))
    }

    pub async fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        Ok(Dashboard {
            doctors: self.doctors.count().await?,
            students: self.accounts.count_by_role(AccountRole::Student.as_str()).await?,
            exam_sessions: self.sessions.count().await?,
            abnormalities: self.abnormalities.count().await?,
            drugs: self.drugs.count().await?,
            news: self.news.count().await?,
            latest_abnormalities: self
                .abnormalities
                .latest(DASHBOARD_LATEST)
                .await?
                .into_iter()
                .map(conversions::convert_to_domain_abnormality)
                .collect(),
        })
    }
}
