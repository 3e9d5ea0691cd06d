//! The built-in benchmark set every user can seed their custom benchmarks from.
//!
//! These are optimal ranges as commonly used in functional-medicine practice, narrower than the
//! lab reference ranges printed on reports. Users edit them freely after seeding.

/// One default optimal range.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBenchmark {
    pub name: &'static str,
    pub unit: &'static str,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
    pub category: &'static str,
}

const fn range(name: &'static str, unit: &'static str, min: f64, max: f64, category: &'static str) -> DefaultBenchmark {
    DefaultBenchmark {
        name,
        unit,
        optimal_min: Some(min),
        optimal_max: Some(max),
        category,
    }
}

const fn at_most(name: &'static str, unit: &'static str, max: f64, category: &'static str) -> DefaultBenchmark {
    DefaultBenchmark {
        name,
        unit,
        optimal_min: None,
        optimal_max: Some(max),
        category,
    }
}

const fn at_least(name: &'static str, unit: &'static str, min: f64, category: &'static str) -> DefaultBenchmark {
    DefaultBenchmark {
        name,
        unit,
        optimal_min: Some(min),
        optimal_max: None,
        category,
    }
}

pub const DEFAULT_BENCHMARKS: &[DefaultBenchmark] = &[
    // Metabolic
    range("Glucose", "mg/dL", 75.0, 90.0, "Metabolic"),
    range("HbA1c", "%", 4.6, 5.3, "Metabolic"),
    range("Insulin", "uIU/mL", 2.0, 5.0, "Metabolic"),
    // Lipids
    range("Total Cholesterol", "mg/dL", 150.0, 220.0, "Lipids"),
    at_least("HDL", "mg/dL", 55.0, "Lipids"),
    at_most("LDL", "mg/dL", 100.0, "Lipids"),
    at_most("Triglycerides", "mg/dL", 100.0, "Lipids"),
    // Thyroid
    range("TSH", "mIU/L", 1.0, 2.0, "Thyroid"),
    range("Free T4", "ng/dL", 1.0, 1.5, "Thyroid"),
    range("Free T3", "pg/mL", 3.0, 4.0, "Thyroid"),
    // Vitamins and minerals
    range("Vitamin D", "ng/mL", 50.0, 80.0, "Vitamins"),
    range("Vitamin B12", "pg/mL", 600.0, 1200.0, "Vitamins"),
    range("Folate", "ng/mL", 15.0, 25.0, "Vitamins"),
    range("Magnesium", "mg/dL", 2.2, 2.5, "Minerals"),
    range("Zinc", "ug/dL", 90.0, 120.0, "Minerals"),
    // Iron
    range("Ferritin", "ng/mL", 50.0, 150.0, "Iron"),
    range("Iron", "ug/dL", 85.0, 130.0, "Iron"),
    range("Transferrin Saturation", "%", 25.0, 35.0, "Iron"),
    // Inflammation
    at_most("hs-CRP", "mg/L", 1.0, "Inflammation"),
    range("Homocysteine", "umol/L", 5.0, 7.0, "Inflammation"),
    // Liver and kidney
    range("ALT", "U/L", 10.0, 26.0, "Liver"),
    range("AST", "U/L", 10.0, 26.0, "Liver"),
    range("Creatinine", "mg/dL", 0.8, 1.1, "Kidney"),
    at_least("eGFR", "mL/min/1.73m2", 90.0, "Kidney"),
];
