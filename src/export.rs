//! CSV export of registrations for the admin dashboard.

use crate::storage::RegistrationInfo;
use chrono::{NaiveDate, SecondsFormat};

pub const CSV_HEADER: [&str; 5] = ["ID", "Full Name", "Email", "Registered At", "IP Address"];

/// Placeholder for registrations without a captured address
pub const MISSING_IP: &str = "N/A";

pub fn export_filename(date: NaiveDate) -> String {
    format!("registrations_{}.csv", date.format("%Y-%m-%d"))
}

/// Header line plus one quoted row per registration, in the given order.
pub fn render_csv(registrations: &[RegistrationInfo]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');

    for reg in registrations {
        let cells = [
            reg.id.to_string(),
            reg.full_name.clone(),
            reg.email.clone(),
            reg.registered_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            reg.ip_address.clone().unwrap_or_else(|| MISSING_IP.to_string()),
        ];
        let row: Vec<String> = cells.iter().map(|cell| quote(cell)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
