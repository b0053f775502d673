use serde::{Deserialize, Serialize};

/// One search hit, prior to detail resolution. Field names mirror the portal
/// wire format so the search response deserializes directly into this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "nm_pd")]
    pub name: String,
    #[serde(rename = "nipd", default)]
    pub nim: String,
    #[serde(rename = "namapt", default)]
    pub institution: String,
    #[serde(rename = "id_reg_pd")]
    pub registration_ref: String,
}

/// The full record behind a candidate: biographical data, per-term academic
/// history, and per-course grades. Immutable once fetched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentDetail {
    #[serde(rename = "dataumum", default)]
    pub general: GeneralRecord,
    #[serde(rename = "datakuliah", default)]
    pub terms: Vec<TermRecord>,
    #[serde(rename = "datakhs", default)]
    pub grades: Vec<GradeRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralRecord {
    #[serde(rename = "nm_pd", default)]
    pub name: String,
    #[serde(rename = "nipd", default)]
    pub nim: String,
    #[serde(rename = "nisn", default)]
    pub national_student_number: Option<String>,
    #[serde(rename = "namaprodi", default)]
    pub study_program: Option<String>,
    #[serde(rename = "namapt", default)]
    pub institution: String,
    #[serde(rename = "namajenjang", default)]
    pub degree_level: Option<String>,
    #[serde(rename = "jk", default)]
    pub gender: Option<String>,
    #[serde(rename = "tmpt_lahir", default)]
    pub birth_place: Option<String>,
    #[serde(rename = "tgl_lahir", default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "no_hp", default)]
    pub phone: Option<String>,
    #[serde(rename = "jln", default)]
    pub street: Option<String>,
    #[serde(rename = "rt", default)]
    pub rt: Option<String>,
    #[serde(rename = "rw", default)]
    pub rw: Option<String>,
    #[serde(rename = "kode_pos", default)]
    pub postal_code: Option<String>,
    #[serde(rename = "kewarganegaraan", default)]
    pub citizenship: Option<String>,
    #[serde(rename = "nik", default)]
    pub national_id: Option<String>,
    #[serde(rename = "nm_ayah", default)]
    pub father_name: Option<String>,
    #[serde(rename = "nm_ibu_kandung", default)]
    pub mother_name: Option<String>,
    #[serde(rename = "nm_wali", default)]
    pub guardian_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    #[serde(rename = "id_smt", default)]
    pub term_id: String,
    #[serde(rename = "nm_stat_mhs", default)]
    pub enrollment_status: Option<String>,
    #[serde(rename = "ips", default, deserialize_with = "lenient_f64")]
    pub term_gpa: Option<f64>,
    #[serde(rename = "ipke", default, deserialize_with = "lenient_f64")]
    pub cumulative_gpa: Option<f64>,
    #[serde(rename = "sks_smt", default, deserialize_with = "lenient_i64")]
    pub term_credits: Option<i64>,
    #[serde(rename = "sks_total", default, deserialize_with = "lenient_i64")]
    pub total_credits: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    #[serde(rename = "id_smt", default)]
    pub term_id: String,
    #[serde(rename = "nm_mk", default)]
    pub course_name: String,
    #[serde(rename = "kode_mk", default)]
    pub course_code: Option<String>,
    #[serde(rename = "sks_mk", default, deserialize_with = "lenient_i64")]
    pub credits: Option<i64>,
    #[serde(rename = "nilai_huruf", default)]
    pub letter_grade: Option<String>,
    #[serde(rename = "nilai_indeks", default, deserialize_with = "lenient_f64")]
    pub grade_index: Option<f64>,
}

// The portal serializes numeric fields inconsistently: sometimes as numbers,
// sometimes as strings, sometimes as the literal string "null".
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::{Candidate, StudentDetail};

    #[test]
    fn candidate_deserializes_from_portal_field_names() {
        let raw = r#"{
            "nm_pd": "Ahmad Fauzi",
            "nipd": "2020123456",
            "namapt": "Universitas Indonesia",
            "id_reg_pd": "reg-abc-123"
        }"#;

        let candidate: Candidate = serde_json::from_str(raw).expect("candidate should parse");
        assert_eq!(candidate.name, "Ahmad Fauzi");
        assert_eq!(candidate.nim, "2020123456");
        assert_eq!(candidate.institution, "Universitas Indonesia");
        assert_eq!(candidate.registration_ref, "reg-abc-123");
    }

    #[test]
    fn detail_tolerates_missing_groups() {
        let detail: StudentDetail =
            serde_json::from_str(r#"{"dataumum": {"nm_pd": "Siti"}}"#).expect("detail should parse");
        assert_eq!(detail.general.name, "Siti");
        assert!(detail.terms.is_empty());
        assert!(detail.grades.is_empty());
    }

    #[test]
    fn term_record_parses_numeric_gpa_fields() {
        let detail: StudentDetail = serde_json::from_str(
            r#"{
                "dataumum": {"nm_pd": "Siti", "nipd": "123", "namapt": "Univ"},
                "datakuliah": [
                    {"id_smt": "20231", "nm_stat_mhs": "Aktif", "ips": 3.5, "ipke": 3.42, "sks_smt": 20, "sks_total": 40}
                ]
            }"#,
        )
        .expect("detail should parse");

        assert_eq!(detail.terms.len(), 1);
        assert_eq!(detail.terms[0].term_id, "20231");
        assert_eq!(detail.terms[0].cumulative_gpa, Some(3.42));
    }

    #[test]
    fn numeric_fields_accept_string_and_null_spellings() {
        let detail: StudentDetail = serde_json::from_str(
            r#"{
                "datakuliah": [
                    {"id_smt": "20232", "ips": "3.75", "ipke": null, "sks_smt": "18"}
                ],
                "datakhs": [
                    {"id_smt": "20232", "nm_mk": "Kalkulus", "nilai_indeks": "not-a-number"}
                ]
            }"#,
        )
        .expect("detail should parse");

        assert_eq!(detail.terms[0].term_gpa, Some(3.75));
        assert_eq!(detail.terms[0].cumulative_gpa, None);
        assert_eq!(detail.terms[0].term_credits, Some(18));
        assert_eq!(detail.grades[0].grade_index, None);
    }
}
