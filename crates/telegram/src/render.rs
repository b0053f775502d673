//! Outbound message rendering for the student bot. Mirrors the Markdown
//! layout the operators already know: a brief card first, then the full
//! record split into three logical parts so no single message exceeds
//! Telegram's length limit.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use kampus_core::student::{GradeRecord, StudentDetail};

use crate::commands::CallbackAction;
use crate::keyboard::{InlineKeyboardButton, InlineKeyboardMarkup, OutboundMessage};

pub fn usage_message() -> OutboundMessage {
    OutboundMessage::plain(
        "🔍 Pencarian data mahasiswa seluruh Indonesia\n\n\
         📝 Cara pakai:\n\
         • Cari dengan nama: /cari [nama]\n\
         • Cari dengan NIM: /cari [nim]\n\n\
         📌 Contoh:\n\
         • /cari Ahmad Fauzi\n\
         • /cari 2020123456\n\n\
         💡 Pilih salah satu hasil untuk melihat detail lengkap.",
    )
}

pub fn access_denied_message() -> OutboundMessage {
    OutboundMessage::markdown(
        "⚠️ *Akses Terbatas*\n\n\
         Maaf, Anda belum memiliki akses untuk menggunakan fitur ini.\n\
         Silakan hubungi admin untuk mendapatkan akses.",
    )
}

pub fn blocked_warning_message() -> OutboundMessage {
    OutboundMessage::markdown(
        "⚠️ *PERINGATAN!*\n\nPermintaan terlarang, dilarang mencarinya atau anda terkena ban permanen!",
    )
}

pub fn not_found_message() -> OutboundMessage {
    OutboundMessage::plain("❌ Tidak ada mahasiswa ditemukan.")
}

pub fn login_failed_message() -> OutboundMessage {
    OutboundMessage::plain("❌ Gagal terhubung ke portal. Silakan coba lagi.")
}

pub fn search_failed_message() -> OutboundMessage {
    OutboundMessage::plain("❌ Terjadi kesalahan saat mencari. Silakan coba lagi.")
}

pub fn detail_failed_message() -> OutboundMessage {
    OutboundMessage::plain("❌ Gagal mengambil detail mahasiswa. Silakan pilih ulang.")
}

pub fn stale_state_message() -> OutboundMessage {
    OutboundMessage::plain("❌ Data tidak ditemukan. Silakan cari ulang dengan /cari.")
}

pub fn empty_query_message() -> OutboundMessage {
    OutboundMessage::plain(
        "Silakan masukkan nama atau NIM mahasiswa yang ingin dicari.\nContoh: /cari Ahmad Fauzi",
    )
}

pub fn prompt_search_message() -> OutboundMessage {
    OutboundMessage::markdown(
        "🔍 *Cari Mahasiswa*\n\n\
         Silakan masukkan nama lengkap atau NIM mahasiswa yang ingin dicari.\n\n\
         📌 Contoh:\n• Ahmad Fauzi\n• 2020123456",
    )
}

pub fn registration_success_message() -> OutboundMessage {
    OutboundMessage::plain(
        "✅ Registrasi berhasil!\n\n\
         Sekarang Anda dapat mencari data mahasiswa dengan /cari diikuti nama atau NIM.",
    )
}

pub fn registration_duplicate_message() -> OutboundMessage {
    OutboundMessage::plain("✅ Anda sudah terdaftar sebelumnya. Silakan gunakan bot dengan normal.")
}

pub fn registration_invalid_message() -> OutboundMessage {
    OutboundMessage::plain("❌ Token registrasi salah.")
}

/// Numbered selection list; button payloads are 1-based and must line up with
/// the stored result order.
pub fn results_message(labels: &[String]) -> OutboundMessage {
    let buttons = labels
        .iter()
        .enumerate()
        .map(|(position, label)| {
            InlineKeyboardButton::new(
                label.clone(),
                CallbackAction::SelectCandidate(position + 1).encode(),
            )
        })
        .collect();

    OutboundMessage::plain(
        "✅ Daftar Mahasiswa Ditemukan:\nSilakan pilih mahasiswa untuk melihat detail:",
    )
    .with_keyboard(InlineKeyboardMarkup::rows(buttons))
}

pub fn brief_detail_message(detail: &StudentDetail) -> OutboundMessage {
    let general = &detail.general;
    let mut text = String::from("👨‍🎓 *Detail Mahasiswa*\n\n");
    text.push_str("📌 *Data Umum:*\n");
    text.push_str(&format!("👤 Nama: `{}`\n", or_na(&general.name)));
    text.push_str(&format!("🎓 NIM: `{}`\n", or_na(&general.nim)));
    text.push_str(&format!("📚 Program Studi: `{}`\n", opt_or_na(&general.study_program)));
    text.push_str(&format!("🏫 Perguruan Tinggi: `{}`\n", or_na(&general.institution)));
    text.push_str(&format!("📊 Jenjang: `{}`\n", opt_or_na(&general.degree_level)));

    if let Some(latest) = detail.terms.last() {
        text.push_str("\n📊 *Status Terkini:*\n");
        text.push_str(&format!("📅 Semester: `{}`\n", or_na(&latest.term_id)));
        text.push_str(&format!("📋 Status: `{}`\n", opt_or_na(&latest.enrollment_status)));
        text.push_str(&format!("📈 IPK: `{}`\n", fmt_gpa(latest.cumulative_gpa)));
        text.push_str(&format!("📚 Total SKS: `{}`\n", fmt_count(latest.total_credits)));
    }

    OutboundMessage::markdown(text).with_keyboard(
        InlineKeyboardMarkup::new()
            .row(vec![InlineKeyboardButton::new(
                "📋 Lihat Detail Lengkap",
                CallbackAction::ViewFullDetail.encode(),
            )])
            .row(vec![InlineKeyboardButton::new(
                "🔍 Cari Lagi",
                CallbackAction::SearchAgain.encode(),
            )]),
    )
}

/// Full record in three logical parts: biographical data, per-term history,
/// then per-course grades grouped by term (one message per term so long
/// transcripts stay within message limits).
pub fn full_detail_messages(detail: &StudentDetail) -> Vec<OutboundMessage> {
    let mut messages = vec![
        OutboundMessage::markdown(render_general_part(detail)),
        OutboundMessage::markdown(render_terms_part(detail)),
    ];
    messages.extend(render_grade_parts(detail).into_iter().map(OutboundMessage::markdown));
    messages
}

fn render_general_part(detail: &StudentDetail) -> String {
    let general = &detail.general;
    let mut text = String::from("👨‍🎓 *Detail Lengkap Mahasiswa (1/3)*\n\n");
    text.push_str("📌 *Data Umum:*\n");
    text.push_str(&format!("👤 Nama Lengkap: `{}`\n", or_na(&general.name)));
    text.push_str(&format!("🎓 NIM: `{}`\n", or_na(&general.nim)));
    text.push_str(&format!("🆔 NISN: `{}`\n", opt_or_na(&general.national_student_number)));
    text.push_str(&format!("📚 Program Studi: `{}`\n", opt_or_na(&general.study_program)));
    text.push_str(&format!("🏫 Perguruan Tinggi: `{}`\n", or_na(&general.institution)));
    text.push_str(&format!("📊 Jenjang: `{}`\n", opt_or_na(&general.degree_level)));
    text.push_str(&format!("👥 Jenis Kelamin: `{}`\n", gender_label(&general.gender)));
    text.push_str(&format!("📍 Tempat Lahir: `{}`\n", opt_or_na(&general.birth_place)));
    text.push_str(&format!("📅 Tanggal Lahir: `{}`\n", opt_or_na(&general.birth_date)));
    text.push_str(&format!("📧 Email: `{}`\n", opt_or_na(&general.email)));
    text.push_str(&format!("📱 No. HP: `{}`\n", opt_or_na(&general.phone)));
    text.push_str(&format!("🏠 Alamat: `{}`\n", opt_or_na(&general.street)));
    text.push_str(&format!(
        "🏘️ RT/RW: `{}/{}`\n",
        opt_or_na(&general.rt),
        opt_or_na(&general.rw)
    ));
    text.push_str(&format!("📮 Kode Pos: `{}`\n", opt_or_na(&general.postal_code)));
    text.push_str(&format!("🌍 Kewarganegaraan: `{}`\n", opt_or_na(&general.citizenship)));
    text.push_str(&format!("🆔 NIK: `{}`\n", opt_or_na(&general.national_id)));

    text.push_str("\n👨‍👩‍👧‍👦 *Data Orang Tua:*\n");
    text.push_str(&format!("👨 Nama Ayah: `{}`\n", opt_or_na(&general.father_name)));
    text.push_str(&format!("👩 Nama Ibu: `{}`\n", opt_or_na(&general.mother_name)));
    if general.guardian_name.as_deref().is_some_and(|name| !name.is_empty()) {
        text.push_str(&format!("👤 Nama Wali: `{}`\n", opt_or_na(&general.guardian_name)));
    }

    text
}

fn render_terms_part(detail: &StudentDetail) -> String {
    let mut text = String::from("👨‍🎓 *Detail Lengkap Mahasiswa (2/3)*\n\n");
    if detail.terms.is_empty() {
        text.push_str("📚 Riwayat kuliah tidak tersedia.\n");
        return text;
    }

    text.push_str("📚 *Riwayat Kuliah:*\n");
    for (sequence, term) in detail.terms.iter().enumerate() {
        text.push_str(&format!("\n📅 *{}:*\n", term_label(sequence + 1, &term.term_id)));
        text.push_str(&format!("📊 Status: `{}`\n", opt_or_na(&term.enrollment_status)));
        text.push_str(&format!("📈 IPS: `{}`\n", fmt_gpa(term.term_gpa)));
        text.push_str(&format!("📊 IPK: `{}`\n", fmt_gpa(term.cumulative_gpa)));
        text.push_str(&format!("📚 SKS Semester: `{}`\n", fmt_count(term.term_credits)));
        text.push_str(&format!("📚 SKS Total: `{}`\n", fmt_count(term.total_credits)));
    }

    text
}

fn render_grade_parts(detail: &StudentDetail) -> Vec<String> {
    if detail.grades.is_empty() {
        return Vec::new();
    }

    let mut by_term: BTreeMap<&str, Vec<&GradeRecord>> = BTreeMap::new();
    for grade in &detail.grades {
        by_term.entry(grade.term_id.as_str()).or_default().push(grade);
    }

    by_term
        .into_iter()
        .enumerate()
        .map(|(sequence, (term_id, grades))| {
            let mut text = String::from("👨‍🎓 *Detail Lengkap Mahasiswa (3/3)*\n\n");
            text.push_str(&format!(
                "📝 *Riwayat Nilai {}*\n{}\n\n",
                term_label(sequence + 1, term_id),
                DIVIDER
            ));

            for grade in grades {
                text.push_str(&format!("📚 *{}*\n", or_na(&grade.course_name)));
                text.push_str(&format!("🆔 Kode: `{}`\n", opt_or_na(&grade.course_code)));
                text.push_str(&format!("📊 SKS: `{}`\n", fmt_count(grade.credits)));
                text.push_str(&format!("📈 Nilai: `{}`\n", letter_grade(&grade.letter_grade)));
                text.push_str(&format!("📊 Indeks: `{}`\n", fmt_gpa(grade.grade_index)));
                text.push_str(&format!("{DIVIDER}\n\n"));
            }

            text
        })
        .collect()
}

pub fn admin_notification(
    user_id: i64,
    username: &str,
    activity: &str,
    at: DateTime<Utc>,
) -> OutboundMessage {
    OutboundMessage::markdown(format!(
        "📱 *Pesan Baru dari User*\n\n\
         ⏰ Waktu: {}\n\
         👤 User ID: `{user_id}`\n\
         Username: @{username}\n\
         Pesan: {activity}",
        at.format("%Y-%m-%d %H:%M:%S"),
    ))
}

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

fn opt_or_na(value: &Option<String>) -> &str {
    value.as_deref().map(or_na).unwrap_or("N/A")
}

fn gender_label(raw: &Option<String>) -> &'static str {
    match raw.as_deref() {
        Some("L") => "Laki-laki",
        Some("P") => "Perempuan",
        _ => "N/A",
    }
}

/// GPA-style fields render with two decimals; zero means "not reported".
fn fmt_gpa(value: Option<f64>) -> String {
    match value {
        Some(gpa) if gpa != 0.0 => format!("{gpa:.2}"),
        _ => "N/A".to_string(),
    }
}

fn fmt_count(value: Option<i64>) -> String {
    value.map(|count| count.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn letter_grade(raw: &Option<String>) -> String {
    match raw.as_deref().map(str::trim) {
        Some(grade) if !grade.is_empty() && !grade.eq_ignore_ascii_case("null") => {
            grade.to_string()
        }
        _ => "N/A".to_string(),
    }
}

/// `"Semester {n} {year}"` where the year is the leading four digits of the
/// portal's term id (e.g. `20231`).
fn term_label(sequence: usize, term_id: &str) -> String {
    if term_id.len() >= 4 {
        format!("Semester {sequence} {}", &term_id[..4])
    } else {
        "N/A".to_string()
    }
}
