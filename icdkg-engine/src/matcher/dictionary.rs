//! Curated medical synonym dictionary

/// Lowercased concept → synonyms; entries refer back to each other
const MEDICAL_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "heart attack",
        &["myocardial infarction", "mi", "acute myocardial infarction", "cardiac infarction"],
    ),
    (
        "myocardial infarction",
        &["heart attack", "mi", "acute myocardial infarction", "cardiac infarction"],
    ),
    ("mi", &["myocardial infarction", "heart attack", "acute myocardial infarction"]),
    ("chest pain", &["thoracic pain", "precordial pain", "angina"]),
    (
        "shortness of breath",
        &["dyspnea", "difficulty breathing", "breathlessness"],
    ),
    (
        "dyspnea",
        &["shortness of breath", "difficulty breathing", "breathlessness"],
    ),
    (
        "hypertension",
        &["high blood pressure", "htn", "elevated blood pressure"],
    ),
    ("htn", &["hypertension", "high blood pressure"]),
    ("diabetes", &["dm", "diabetes mellitus", "diabetic"]),
    ("dm", &["diabetes", "diabetes mellitus"]),
    (
        "pneumonia",
        &["lung infection", "pulmonary infection", "respiratory infection"],
    ),
    ("fever", &["pyrexia", "elevated temperature", "hyperthermia"]),
    ("headache", &["cephalgia", "head pain", "migraine"]),
    ("nausea", &["queasiness", "feeling sick", "stomach upset"]),
    ("vomiting", &["emesis", "throwing up", "regurgitation"]),
];

/// Registered synonyms of a lowercased concept (empty if none)
pub fn synonyms_of(concept: &str) -> &'static [&'static str] {
    MEDICAL_SYNONYMS
        .iter()
        .find(|(term, _)| *term == concept)
        .map(|(_, synonyms)| *synonyms)
        .unwrap_or(&[])
}
