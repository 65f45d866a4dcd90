//! services/api/src/export/html.rs
//!
//! A single self-contained report page. The record list is embedded as inline
//! JSON and a small script renders a list plus a detail panel. All record text
//! is escaped before it reaches markup, both here and in the embedded script.

use crate::error::ApiError;
use register_assistant_core::StudentRecord;
use serde_json::Value;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>__TITLE__</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 0; background: #0f172a; color: #e2e8f0; }
  header { padding: 1rem 1.5rem; background: #1e293b; }
  h1 { margin: 0; font-size: 1.4rem; color: #7dd3fc; }
  main { display: flex; gap: 1rem; padding: 1rem 1.5rem; }
  #studentList { list-style: none; margin: 0; padding: 0; width: 18rem; }
  #studentList li { padding: .6rem .8rem; border-radius: .4rem; cursor: pointer; background: #1e293b; margin-bottom: .4rem; }
  #studentList li.active { background: #0369a1; }
  .roll-number { float: right; opacity: .7; font-size: .85em; }
  #profile { flex: 1; background: #1e293b; border-radius: .4rem; padding: 1rem 1.5rem; }
  .profile-photo { width: 120px; height: 120px; border-radius: 50%; object-fit: cover; }
  .profile-item { display: flex; gap: .5rem; padding: .3rem 0; border-bottom: 1px solid #334155; }
  .profile-item strong { width: 10rem; color: #94a3b8; }
</style>
</head>
<body>
<header><h1>__TITLE__</h1><p>__COUNT__ student record(s)</p></header>
<main>
  <ul id="studentList"></ul>
  <section id="profile"><p>Select a student to view their details.</p></section>
</main>
<script id="studentData" type="application/json">__DATA__</script>
<script>
  const students = JSON.parse(document.getElementById('studentData').textContent);
  const list = document.getElementById('studentList');
  const profile = document.getElementById('profile');
  const fields = [
    ['RollNumber', 'Roll Number'], ['Name', 'Name'], ['Mobile', 'Mobile'], ['Gmail', 'Email'],
    ['Password', 'Password'], ['FatherName', "Father's Name"], ['MotherName', "Mother's Name"],
    ['Class', 'Class'], ['Address', 'Address'], ['Aadhar', 'Aadhar'], ['Gender', 'Gender'],
    ['RegistrationDate', 'Registration Date']
  ];

  function escapeHtml(unsafe) {
    return String(unsafe ?? '').replace(/[&<>"']/g, function (c) {
      return { '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#039;' }[c];
    });
  }

  function show(id) {
    const student = students.find(s => s.id === id);
    if (!student) { profile.innerHTML = '<p>Student not found.</p>'; return; }
    let html = '<h2>' + escapeHtml(student.Name) + ' - Profile</h2>';
    if (student.PhotoURL) {
      html += '<img class="profile-photo" src="' + escapeHtml(student.PhotoURL) + '" alt="' + escapeHtml(student.Name) + '">';
    }
    for (const [key, label] of fields) {
      html += '<div class="profile-item"><strong>' + escapeHtml(label) + ':</strong><span>' + escapeHtml(student[key]) + '</span></div>';
    }
    profile.innerHTML = html;
    list.querySelectorAll('li').forEach(li => li.classList.toggle('active', li.dataset.id === id));
  }

  for (const student of students) {
    const item = document.createElement('li');
    item.dataset.id = student.id;
    item.innerHTML = escapeHtml(student.Name) + ' <span class="roll-number">Roll: ' + escapeHtml(student.RollNumber) + '</span>';
    item.addEventListener('click', () => show(student.id));
    list.appendChild(item);
  }
  if (students.length > 0) { show(students[0].id); }
</script>
</body>
</html>
"#;

pub fn to_html(records: &[StudentRecord], title: &str) -> Result<String, ApiError> {
    let embedded = records
        .iter()
        .enumerate()
        .map(|(index, record)| -> Result<Value, serde_json::Error> {
            let mut value = serde_json::to_value(record)?;
            if let Value::Object(fields) = &mut value {
                fields.insert("id".to_string(), Value::String(format!("student-{index}")));
            }
            Ok(value)
        })
        .collect::<Result<Vec<Value>, _>>()
        .and_then(|items| serde_json::to_string(&items))
        .map_err(|e| ApiError::Export(e.to_string()))?;

    Ok(TEMPLATE
        .replace("__TITLE__", &escape_html(title))
        .replace("__COUNT__", &records.len().to_string())
        .replace("__DATA__", &escape_script_json(&embedded)))
}

pub fn escape_html(unsafe_text: &str) -> String {
    let mut escaped = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// JSON inside a `<script>` element must not contain a closing tag. The
/// unicode escapes decode back to the same characters in `JSON.parse`.
fn escape_script_json(json: &str) -> String {
    json.replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use register_assistant_core::normalize;

    fn record(name: &str) -> StudentRecord {
        let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        normalize(&serde_json::json!({ "Name": name }), 0, today)
    }

    #[test]
    fn record_text_cannot_break_out_of_the_data_block() {
        let page = to_html(&[record("</script><script>alert(1)</script>")], "Class <9>").unwrap();
        assert!(!page.contains("alert(1)</script>"));
        assert!(page.contains("\\u003c/script\\u003e\\u003cscript\\u003ealert(1)"));
        assert!(page.contains("<title>Class &lt;9&gt;</title>"));
        assert_eq!(page.matches("</script>").count(), 2);
    }

    #[test]
    fn embeds_every_record_with_a_browsing_id() {
        let page = to_html(&[record("Ravi"), record("Asha")], "student data").unwrap();
        assert!(page.contains("\"id\":\"student-0\""));
        assert!(page.contains("\"id\":\"student-1\""));
        assert!(page.contains("2 student record(s)"));
    }

    #[test]
    fn escapes_all_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
    }
}
