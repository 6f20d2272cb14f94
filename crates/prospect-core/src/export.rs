//! CSV export of enriched leads.
//!
//! The column order is a contract with downstream consumers; append new
//! columns at the end, never reorder.

use std::io::Write;

use crate::error::AppError;
use crate::models::{EnrichedLead, Platform};

/// Fixed CSV header.
pub const CSV_HEADER: [&str; 16] = [
    "Name",
    "Email",
    "Phone",
    "Location",
    "Website",
    "Temperature",
    "Score",
    "Wealth Signal",
    "Estimated Revenue",
    "Role",
    "Instagram",
    "Facebook",
    "Twitter",
    "LinkedIn",
    "TikTok",
    "YouTube",
];

/// Stream `leads` as CSV into `writer`.
pub fn write_csv<W: Write>(leads: &[EnrichedLead], writer: W) -> Result<(), AppError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for lead in leads {
        let score = lead.lead_score.to_string();
        let mut record: Vec<&str> = vec![
            lead.raw.entity.as_str(),
            lead.email.as_deref().unwrap_or_default(),
            lead.phone.as_deref().unwrap_or_default(),
            lead.location.as_deref().unwrap_or_default(),
            lead.raw.website.as_str(),
            lead.temperature(),
            score.as_str(),
            lead.wealth_signal.as_str(),
            lead.estimated_revenue.as_deref().unwrap_or_default(),
            lead.raw.role.as_deref().unwrap_or_default(),
        ];
        record.extend(
            Platform::ALL
                .iter()
                .map(|platform| lead.profile(*platform).unwrap_or_default()),
        );
        csv.write_record(&record)?;
    }

    csv.flush()
        .map_err(|e| AppError::Generic(format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

/// Render `leads` as CSV bytes.
pub fn export_csv(leads: &[EnrichedLead]) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    write_csv(leads, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeadSource, RawLead, WealthSignal};

    fn parse(bytes: &[u8]) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn header_only_for_no_leads() {
        let rows = parse(&export_csv(&[]).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], CSV_HEADER);
    }

    #[test]
    fn columns_follow_the_contract() {
        let raw = RawLead::new(
            "Smile Dental, Austin",
            "https://smile.com",
            "Family dentistry",
            LeadSource::GeneralSearch,
        )
        .unwrap()
        .with_role("Owner")
        .with_profile(Platform::Instagram, "https://instagram.com/smile")
        .with_profile(Platform::YouTube, "https://www.youtube.com/@smile");
        let mut lead = EnrichedLead::ghost(raw);
        lead.email = Some("jane@gmail.com".into());
        lead.phone = Some("+1 512 555 0147".into());
        lead.location = Some("Austin".into());
        lead.lead_score = 82;
        lead.wealth_signal = WealthSignal::High;
        lead.estimated_revenue = Some("$1M+".into());

        let rows = parse(&export_csv(&[lead]).unwrap());
        assert_eq!(
            rows[1],
            vec![
                "Smile Dental, Austin",
                "jane@gmail.com",
                "+1 512 555 0147",
                "Austin",
                "https://smile.com",
                "Hot",
                "82",
                "High",
                "$1M+",
                "Owner",
                "https://instagram.com/smile",
                "",
                "",
                "",
                "",
                "https://www.youtube.com/@smile",
            ]
        );
    }

    #[test]
    fn ghost_lead_has_empty_enrichment_columns() {
        let raw = RawLead::new("Corner Bakery", "", "12 Main St", LeadSource::Maps).unwrap();
        let rows = parse(&export_csv(&[EnrichedLead::ghost(raw)]).unwrap());
        assert_eq!(rows[1][0], "Corner Bakery");
        assert_eq!(rows[1][5], "Cold");
        assert_eq!(rows[1][6], "0");
        assert_eq!(rows[1][7], "Unknown");
        assert!(rows[1][10..].iter().all(String::is_empty));
    }
}
