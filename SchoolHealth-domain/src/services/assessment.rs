//! Growth and vital-sign assessment
//!
//! Z-scores use a fixed reference population (height 169.9 ± 5.7 cm,
//! weight 62.3 ± 10.2 kg). Every derived value is rounded to two decimals
//! before it is rated.

use crate::entities::physical_fitness::{BmiRating, HealthScores, HeightRating, PhysicalFitness, VitalRating, WeightRating};
use crate::entities::round2;

const HEIGHT_MEAN: f64 = 169.9;
const HEIGHT_SD: f64 = 5.7;
const WEIGHT_MEAN: f64 = 62.3;
const WEIGHT_SD: f64 = 10.2;

/// Raw measurements of one exam
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurements {
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub heart_rate: Option<f64>,
}

/// Everything derived from [`Measurements`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Assessment {
    pub z_score_height: Option<f64>,
    pub height_rating: Option<HeightRating>,
    pub z_score_weight: Option<f64>,
    pub weight_rating: Option<WeightRating>,
    pub z_score_weight_height: Option<f64>,
    pub bmi: Option<f64>,
    pub bmi_rating: Option<BmiRating>,
    pub blood_pressure_rating: Option<VitalRating>,
    pub heart_rate_rating: Option<VitalRating>,
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

pub fn z_score_height(height: Option<f64>) -> Option<f64> {
    positive(height).map(|h| round2((h - HEIGHT_MEAN) / HEIGHT_SD))
}

pub fn z_score_weight(weight: Option<f64>) -> Option<f64> {
    positive(weight).map(|w| round2((w - WEIGHT_MEAN) / WEIGHT_SD))
}

pub fn rate_height(z: f64) -> HeightRating {
    if z < -2.0 {
        HeightRating::VeryShort
    } else if z < -1.0 {
        HeightRating::Short
    } else if z < 1.0 {
        HeightRating::Normal
    } else {
        HeightRating::Tall
    }
}

pub fn rate_weight(z: f64) -> WeightRating {
    if z < -3.0 {
        WeightRating::SeverelyUnderweight
    } else if z < -2.0 {
        WeightRating::Underweight
    } else if z < 1.0 {
        WeightRating::Normal
    } else {
        WeightRating::Overweight
    }
}

/// BMI from centimetres and kilograms
pub fn bmi(height: Option<f64>, weight: Option<f64>) -> Option<f64> {
    let metres = positive(height)? / 100.0;
    let weight = positive(weight)?;
    Some(round2(weight / (metres * metres)))
}

pub fn rate_bmi(bmi: f64) -> BmiRating {
    if bmi < 18.5 {
        BmiRating::Underweight
    } else if bmi < 22.9 {
        BmiRating::Normal
    } else if bmi < 24.9 {
        BmiRating::Overweight
    } else if bmi < 29.9 {
        BmiRating::Obese1
    } else if bmi < 35.0 {
        BmiRating::Obese2
    } else {
        BmiRating::Obese3
    }
}

/// Low wins over high when a reading is both
pub fn rate_blood_pressure(systolic: f64, diastolic: f64) -> VitalRating {
    if systolic < 120.0 || diastolic < 80.0 {
        VitalRating::Low
    } else if systolic > 140.0 || diastolic > 90.0 {
        VitalRating::High
    } else {
        VitalRating::Normal
    }
}

pub fn rate_heart_rate(bpm: f64) -> VitalRating {
    if bpm < 60.0 {
        VitalRating::Low
    } else if bpm > 100.0 {
        VitalRating::High
    } else {
        VitalRating::Normal
    }
}

/// Derive every assessment field from raw measurements
pub fn assess(m: &Measurements) -> Assessment {
    let z_score_height = z_score_height(m.height);
    let z_score_weight = z_score_weight(m.weight);
    let z_score_weight_height = match (z_score_weight, z_score_height) {
        (Some(w), Some(h)) => Some(round2(w - h)),
        _ => None,
    };
    let bmi = bmi(m.height, m.weight);

    let blood_pressure_rating = match (positive(m.systolic), positive(m.diastolic)) {
        (Some(s), Some(d)) => Some(rate_blood_pressure(s, d)),
        _ => None,
    };

    Assessment {
        z_score_height,
        height_rating: z_score_height.map(rate_height),
        z_score_weight,
        weight_rating: z_score_weight.map(rate_weight),
        z_score_weight_height,
        bmi,
        bmi_rating: bmi.map(rate_bmi),
        blood_pressure_rating,
        heart_rate_rating: positive(m.heart_rate).map(rate_heart_rate),
    }
}

/// Scores from a student's latest record; all zero without one
pub fn health_scores(latest: Option<&PhysicalFitness>) -> HealthScores {
    let Some(record) = latest else {
        return HealthScores::default();
    };

    let mut physical: i32 = 70;
    let mut cardio: i32 = 70;
    let mut respiratory: i32 = 70;

    physical += match record.bmi_rating {
        Some(BmiRating::Normal) => 15,
        Some(BmiRating::Overweight) => 10,
        Some(BmiRating::Underweight) => 5,
        _ => 0,
    };

    cardio += match record.blood_pressure_rating {
        Some(VitalRating::Normal) => 20,
        Some(VitalRating::Low) => 15,
        Some(VitalRating::High) => -10,
        None => 0,
    };

    let (cardio_delta, respiratory_delta) = match record.heart_rate_rating {
        Some(VitalRating::Normal) => (10, 20),
        Some(VitalRating::Low) => (5, 10),
        Some(VitalRating::High) => (-5, -10),
        None => (0, 0),
    };
    cardio += cardio_delta;
    respiratory += respiratory_delta;

    if record.height_rating == Some(HeightRating::Normal) {
        physical += 10;
    }
    if record.weight_rating == Some(WeightRating::Normal) {
        physical += 10;
    }

    let physical = physical.clamp(0, 100);
    let cardio = cardio.clamp(0, 100);
    let respiratory = respiratory.clamp(0, 100);

    let mental = ((physical + cardio + respiratory) as f64 / 3.0).round() as i32;
    let mental = mental.clamp(60, 95);
    let overall = ((physical + cardio + respiratory + mental) as f64 / 4.0).round() as i32;

    HealthScores {
        physical: physical as u8,
        mental: mental as u8,
        cardio: cardio as u8,
        respiratory: respiratory as u8,
        overall: overall as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_z_scores_and_ratings() {
        assert_eq!(z_score_height(Some(169.9)), Some(0.0));
        assert_eq!(z_score_height(Some(158.0)), Some(-2.09));
        assert_eq!(z_score_height(Some(0.0)), None);
        assert_eq!(z_score_height(None), None);

        assert_eq!(rate_height(-2.09), HeightRating::VeryShort);
        assert_eq!(rate_height(-1.0), HeightRating::Normal);
        assert_eq!(rate_height(1.0), HeightRating::Tall);

        assert_eq!(z_score_weight(Some(72.5)), Some(1.0));
        assert_eq!(rate_weight(1.0), WeightRating::Overweight);
        assert_eq!(rate_weight(-3.01), WeightRating::SeverelyUnderweight);
        assert_eq!(rate_weight(-2.5), WeightRating::Underweight);
    }

    #[test]
    fn test_bmi_boundaries() {
        assert_eq!(bmi(Some(170.0), Some(65.0)), Some(22.49));
        assert_eq!(bmi(None, Some(65.0)), None);

        assert_eq!(rate_bmi(18.49), BmiRating::Underweight);
        assert_eq!(rate_bmi(18.5), BmiRating::Normal);
        assert_eq!(rate_bmi(22.9), BmiRating::Overweight);
        assert_eq!(rate_bmi(24.9), BmiRating::Obese1);
        assert_eq!(rate_bmi(29.9), BmiRating::Obese2);
        assert_eq!(rate_bmi(35.0), BmiRating::Obese3);
    }

    #[test]
    fn test_vital_ratings() {
        assert_eq!(rate_blood_pressure(118.0, 85.0), VitalRating::Low);
        assert_eq!(rate_blood_pressure(130.0, 85.0), VitalRating::Normal);
        assert_eq!(rate_blood_pressure(145.0, 85.0), VitalRating::High);
        assert_eq!(rate_blood_pressure(130.0, 95.0), VitalRating::High);

        assert_eq!(rate_heart_rate(59.0), VitalRating::Low);
        assert_eq!(rate_heart_rate(100.0), VitalRating::Normal);
        assert_eq!(rate_heart_rate(101.0), VitalRating::High);
    }

    #[test]
    fn test_assess_combines_fields() {
        let a = assess(&Measurements {
            height: Some(175.6),
            weight: Some(62.3),
            systolic: Some(125.0),
            diastolic: None,
            heart_rate: Some(72.0),
        });

        assert_eq!(a.z_score_height, Some(1.0));
        assert_eq!(a.height_rating, Some(HeightRating::Tall));
        assert_eq!(a.z_score_weight, Some(0.0));
        assert_eq!(a.z_score_weight_height, Some(-1.0));
        assert_eq!(a.bmi_rating, Some(BmiRating::Normal));
        assert_eq!(a.blood_pressure_rating, None);
        assert_eq!(a.heart_rate_rating, Some(VitalRating::Normal));
    }

    #[test]
    fn test_zero_and_negative_vitals_are_unrated() {
        for reading in [0.0, -80.0] {
            let a = assess(&Measurements {
                height: Some(170.0),
                weight: Some(65.0),
                systolic: Some(reading),
                diastolic: Some(85.0),
                heart_rate: Some(reading),
            });
            assert_eq!(a.blood_pressure_rating, None);
            assert_eq!(a.heart_rate_rating, None);
            assert_eq!(a.bmi_rating, Some(BmiRating::Normal));
        }

        let a = assess(&Measurements {
            height: None,
            weight: None,
            systolic: Some(125.0),
            diastolic: Some(0.0),
            heart_rate: None,
        });
        assert_eq!(a.blood_pressure_rating, None);
    }

    fn record_with(bmi: BmiRating, bp: VitalRating, hr: VitalRating) -> PhysicalFitness {
        PhysicalFitness {
            id: "r1".to_string(),
            exam_session_id: "s1".to_string(),
            student_id: "SV001".to_string(),
            cohort: None,
            gender: None,
            follow_date: String::new(),
            height: Some(170.0),
            weight: Some(62.0),
            z_score_height: Some(0.02),
            height_rating: Some(HeightRating::Normal),
            z_score_weight: Some(-0.03),
            weight_rating: Some(WeightRating::Normal),
            z_score_weight_height: Some(-0.05),
            bmi: Some(21.45),
            bmi_rating: Some(bmi),
            systolic: Some(125.0),
            diastolic: Some(85.0),
            blood_pressure_rating: Some(bp),
            heart_rate: Some(70.0),
            heart_rate_rating: Some(hr),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_health_scores() {
        assert_eq!(health_scores(None), HealthScores::default());

        let healthy = record_with(BmiRating::Normal, VitalRating::Normal, VitalRating::Normal);
        let scores = health_scores(Some(&healthy));
        // physical 70+15+10+10 clamps to 100, cardio 70+20+10, respiratory 70+20
        assert_eq!(scores.physical, 100);
        assert_eq!(scores.cardio, 100);
        assert_eq!(scores.respiratory, 90);
        assert_eq!(scores.mental, 95);
        assert_eq!(scores.overall, 96);

        let strained = record_with(BmiRating::Obese2, VitalRating::High, VitalRating::High);
        let scores = health_scores(Some(&strained));
        assert_eq!(scores.physical, 90);
        assert_eq!(scores.cardio, 55);
        assert_eq!(scores.respiratory, 60);
        assert_eq!(scores.mental, 68);
        assert_eq!(scores.overall, 68);
    }
}
