/// Institution-name abbreviations applied to keep selection labels inside
/// Telegram's inline-button width. Order matters: "Sekolah Tinggi" must be
/// rewritten before any later rule could touch its parts.
const INSTITUTION_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Universitas", "Univ."),
    ("Institut", "Inst."),
    ("Sekolah Tinggi", "ST"),
    ("Politeknik", "Polit."),
];

const INSTITUTION_LABEL_MAX: usize = 20;

pub fn abbreviate_institution(name: &str) -> String {
    let mut label = name.to_string();
    for (long, short) in INSTITUTION_ABBREVIATIONS {
        label = label.replace(long, short);
    }

    if label.chars().count() > INSTITUTION_LABEL_MAX {
        let truncated: String = label.chars().take(INSTITUTION_LABEL_MAX - 3).collect();
        label = format!("{truncated}...");
    }

    label
}

/// `"{index}. {name} ({abbreviated institution})"`, 1-based.
pub fn candidate_label(index: usize, name: &str, institution: &str) -> String {
    format!("{index}. {name} ({})", abbreviate_institution(institution))
}
