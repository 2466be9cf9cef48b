//! Contacts, address validation and CSV/plain-text import/export.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Read, Write};
use std::sync::OnceLock;

use crate::address::Address;
use crate::error::ContactError;

/// One recipient in a contact list.
///
/// Identity is the email address. `fields` holds any extra columns
/// (company, phone, ...) available to templates as `{{column}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Contact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a free-form field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Whether the email passes [`validate_email`].
    pub fn is_valid(&self) -> bool {
        validate_email(&self.email)
    }

    /// Recipient address with the contact's name, if any.
    pub fn address(&self) -> Address {
        Address {
            name: self.display_name().map(str::to_string),
            email: self.email.clone(),
        }
    }

    fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// Values available to the template renderer.
    ///
    /// Free-form fields first, then `email` and `name` on top; a blank name
    /// becomes `default_name`.
    pub fn render_fields(&self, default_name: &str) -> HashMap<String, String> {
        let mut fields: HashMap<String, String> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.insert("email".to_string(), self.email.clone());
        fields.insert(
            "name".to_string(),
            self.display_name().unwrap_or(default_name).to_string(),
        );
        fields
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid")
    })
}

/// Basic syntax check used for contact lists.
///
/// ```
/// use mailshot::validate_email;
///
/// assert!(validate_email("ana@example.com"));
/// assert!(!validate_email("ana@localhost"));
/// assert!(!validate_email("not an email"));
/// ```
pub fn validate_email(email: &str) -> bool {
    email_re().is_match(email)
}

/// Outcome of a bulk import.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Accepted contacts, in input order
    pub contacts: Vec<Contact>,
    /// One note per rejected row
    pub rejected: Vec<String>,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.contacts.len()
    }
}

/// Import contacts from CSV with a header row.
///
/// Columns are matched case-insensitively: the first header containing
/// `email` is the address, the first containing `name` or `nombre` is the
/// display name, and every other column becomes a free-form field keyed by
/// its lowercased header.
pub fn import_csv<R: Read>(reader: R) -> Result<ImportReport, ContactError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let email_col = headers
        .iter()
        .position(|h| h.contains("email"))
        .ok_or(ContactError::MissingEmailColumn)?;
    let name_col = headers
        .iter()
        .enumerate()
        .position(|(i, h)| i != email_col && (h.contains("name") || h.contains("nombre")));

    let mut report = ImportReport::default();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let email = record.get(email_col).unwrap_or_default();
        if !validate_email(email) {
            // +2: header row and 1-based lines
            report
                .rejected
                .push(format!("line {}: invalid email '{}'", line + 2, email));
            continue;
        }

        let mut contact = Contact::new(email);
        for (i, value) in record.iter().enumerate() {
            if i == email_col {
                continue;
            }
            if Some(i) == name_col {
                if !value.is_empty() {
                    contact.name = Some(value.to_string());
                }
                continue;
            }
            if let Some(key) = headers.get(i) {
                contact.fields.insert(key.clone(), value.to_string());
            }
        }
        report.contacts.push(contact);
    }

    tracing::info!(
        imported = report.imported(),
        rejected = report.rejected.len(),
        "CSV import finished"
    );
    Ok(report)
}

/// Import one email per line; blank lines are skipped.
pub fn import_text(text: &str) -> ImportReport {
    let mut report = ImportReport::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if validate_email(line) {
            report.contacts.push(Contact::new(line));
        } else {
            report.rejected.push(format!("invalid email '{}'", line));
        }
    }
    report
}

/// Write contacts as CSV: `email,name,<field columns sorted>`.
pub fn export_csv<W: Write>(writer: W, contacts: &[Contact]) -> Result<(), ContactError> {
    let columns: BTreeSet<&str> = contacts
        .iter()
        .flat_map(|c| c.fields.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["email", "name"];
    header.extend(columns.iter().copied());
    wtr.write_record(&header)?;

    for contact in contacts {
        let mut row = vec![contact.email.as_str(), contact.name.as_deref().unwrap_or("")];
        row.extend(
            columns
                .iter()
                .map(|col| contact.fields.get(*col).map(String::as_str).unwrap_or("")),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}
