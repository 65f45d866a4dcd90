//! crates/register_assistant_core/src/normalize.rs
//!
//! Repairs loosely-typed records into fully populated [`StudentRecord`]s.
//!
//! This is the only place schema conformance is enforced. A field that is
//! present and passes its validity check is kept verbatim; anything else is
//! synthesized. Normalizing an already-normalized record is a no-op.

use crate::domain::{StudentRecord, KNOWN_GENDERS};
use chrono::{Datelike, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::warn;

const EMAIL_DOMAIN: &str = "example.com";
const FALLBACK_GENDERS: [&str; 3] = ["Male", "Female", "Not Specified"];
const SECTIONS: [char; 3] = ['A', 'B', 'C'];

// Canonical key first, then accepted spellings.
const ROLL_NUMBER: &[&str] = &["RollNumber", "rollNumber", "roll_number"];
const NAME: &[&str] = &["Name", "name"];
const MOBILE: &[&str] = &["Mobile", "mobile"];
const EMAIL: &[&str] = &["Gmail", "email", "Email", "gmail"];
const PASSWORD: &[&str] = &["Password", "password"];
const FATHER_NAME: &[&str] = &["FatherName", "fatherName", "father_name"];
const MOTHER_NAME: &[&str] = &["MotherName", "motherName", "mother_name"];
const CLASS: &[&str] = &["Class", "className", "class_name", "class"];
const ADDRESS: &[&str] = &["Address", "address"];
const PHOTO_URL: &[&str] = &["PhotoURL", "photoUrl", "photo_url", "PhotoUrl"];
const NATIONAL_ID: &[&str] = &["Aadhar", "nationalId", "national_id", "aadhar"];
const GENDER: &[&str] = &["Gender", "gender"];
const REGISTRATION_DATE: &[&str] = &["RegistrationDate", "registrationDate", "registration_date"];

/// Normalizes one raw record using the thread-local RNG for synthesized values.
pub fn normalize(raw: &Value, position: usize, today: NaiveDate) -> StudentRecord {
    normalize_with_rng(raw, position, today, &mut rand::thread_rng())
}

/// Normalizes one raw record. `position` is the record's index in its list and
/// seeds the positional placeholders.
pub fn normalize_with_rng<R: Rng + ?Sized>(
    raw: &Value,
    position: usize,
    today: NaiveDate,
    rng: &mut R,
) -> StudentRecord {
    let empty = Map::new();
    let fields = raw.as_object().unwrap_or(&empty);

    let roll_number = roll_number(lookup(fields, ROLL_NUMBER), position);
    let name = text(lookup(fields, NAME)).unwrap_or_else(|| format!("Student {roll_number}"));
    let first_name = name.split(' ').next().unwrap_or_default().to_string();

    let mobile = text_or_integer(lookup(fields, MOBILE))
        .unwrap_or_else(|| format!("9{:09}", rng.gen_range(0..1_000_000_000u64)));
    let email = text(lookup(fields, EMAIL))
        .filter(|email| email.contains('@'))
        .unwrap_or_else(|| fallback_email(&name, &roll_number));
    let password = text(lookup(fields, PASSWORD))
        .unwrap_or_else(|| format!("{}{}{}", today.year(), surname_slug(&name), roll_number));
    let father_name = text(lookup(fields, FATHER_NAME))
        .unwrap_or_else(|| format!("Mr. {first_name}'s Father"));
    let mother_name = text(lookup(fields, MOTHER_NAME))
        .unwrap_or_else(|| format!("Mrs. {first_name}'s Mother"));
    let class_name = text(lookup(fields, CLASS)).unwrap_or_else(|| {
        let grade = rng.gen_range(8..=12);
        let section = SECTIONS.choose(rng).copied().unwrap_or('A');
        format!("Standard {grade}th {section}")
    });
    let address = text(lookup(fields, ADDRESS))
        .unwrap_or_else(|| format!("{roll_number} Real Street, Plausible City, 12345{position}"));
    let photo_url = text(lookup(fields, PHOTO_URL))
        .filter(|url| is_photo_url(url))
        .unwrap_or_else(|| placeholder_photo_url(&roll_number));
    let national_id = text_or_integer(lookup(fields, NATIONAL_ID))
        .unwrap_or_else(|| format!("{:012}", rng.gen_range(0..1_000_000_000_000u64)));
    let gender = text(lookup(fields, GENDER)).map(canonical_gender).unwrap_or_else(|| {
        FALLBACK_GENDERS
            .choose(rng)
            .copied()
            .unwrap_or("Not Specified")
            .to_string()
    });
    let registration_date = text(lookup(fields, REGISTRATION_DATE))
        .filter(|date| is_iso_date(date))
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

    StudentRecord {
        roll_number,
        name,
        mobile,
        email,
        password,
        father_name,
        mother_name,
        class_name,
        address,
        photo_url,
        national_id,
        gender,
        registration_date,
    }
}

/// Known values get their canonical spelling; free text is kept as given.
fn canonical_gender(value: String) -> String {
    KNOWN_GENDERS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(value.trim()))
        .map_or(value, |known| known.to_string())
}

/// `"001"` for position 0, `"002"` for position 1, and so on.
pub fn positional_placeholder(position: usize) -> String {
    format!("{:03}", position + 1)
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn text_or_integer(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|n| n.to_string()),
        other => text(other),
    }
}

fn roll_number(raw: Option<&Value>, position: usize) -> String {
    let placeholder = positional_placeholder(position);
    match raw {
        Some(Value::String(original)) if !original.trim().is_empty() => {
            let trimmed = original.trim();
            // A placeholder from an earlier pass survives re-normalization.
            if trimmed == placeholder {
                return placeholder;
            }
            let stripped = match trimmed.trim_start_matches('0') {
                "" => "0",
                rest => rest,
            };
            if !stripped.chars().all(|c| c.is_ascii_digit()) {
                warn!(raw = %original, "Non-numeric RollNumber, using positional placeholder");
                return placeholder;
            }
            if stripped == "0" && original != "0" {
                return placeholder;
            }
            stripped.to_string()
        }
        Some(Value::Number(n)) => match n.as_u64() {
            Some(value) if value > 0 => value.to_string(),
            _ => {
                warn!(raw = %n, "Invalid numeric RollNumber, using positional placeholder");
                placeholder
            }
        },
        Some(other) if !other.is_string() => {
            warn!(raw = %other, "Invalid RollNumber type, using positional placeholder");
            placeholder
        }
        _ => placeholder,
    }
}

fn fallback_email(name: &str, roll_number: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '.' })
        .take(15)
        .collect();
    format!("{slug}.{roll_number}@{EMAIL_DOMAIN}")
}

fn surname_slug(name: &str) -> String {
    let slug: String = name
        .split(' ')
        .last()
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();
    if slug.is_empty() {
        "stud".to_string()
    } else {
        slug
    }
}

fn placeholder_photo_url(roll_number: &str) -> String {
    let seed: String = url::form_urlencoded::byte_serialize(roll_number.as_bytes()).collect();
    format!("https://picsum.photos/seed/{seed}/120/120")
}

fn is_photo_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:image/")
}

fn is_iso_date(date: &str) -> bool {
    date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}
