//! Spreadsheet projections of rosters, as CSV.

use crate::{enrollment::ClubRoster, error::AppResult, registration::ActivityRoster};
use csv::{Terminator, WriterBuilder};

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Renders a header and rows as UTF-8 CSV with a byte order mark, which
/// spreadsheet tools need to pick the right encoding.
pub fn render(header: &[&str], rows: &[Vec<String>]) -> AppResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(BOM.to_vec());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    Ok(writer.into_inner()?)
}

pub fn activity_roster(roster: &ActivityRoster) -> AppResult<Vec<u8>> {
    let has_fee = roster.activity.has_fee;
    let mut header = vec!["No.", "Name", "Class", "Contact", "Reason"];
    if has_fee {
        header.extend(["Payment", "Payment proof"]);
    }
    let rows = roster
        .participants
        .iter()
        .map(|p| {
            let mut row = vec![
                p.index.to_string(),
                p.name.clone(),
                p.class.clone(),
                p.contact.clone().unwrap_or_default(),
                p.reason.clone().unwrap_or_default(),
            ];
            if has_fee {
                row.push(p.payment_status.to_string());
                row.push(p.payment_proof.clone().unwrap_or_default());
            }
            row
        })
        .collect::<Vec<_>>();
    render(&header, &rows)
}

pub fn club_roster(roster: &ClubRoster) -> AppResult<Vec<u8>> {
    let rows = roster
        .members
        .iter()
        .map(|m| {
            vec![
                m.index.to_string(),
                m.name.clone(),
                m.class.clone(),
                m.joined_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render(&["No.", "Name", "Class", "Joined"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_starts_with_a_bom_and_uses_crlf() {
        let csv = String::from_utf8(render(&["a", "b"], &[vec!["1".into(), "2".into()]]).unwrap())
            .unwrap();
        assert_eq!(csv, "\u{feff}a,b\r\n1,2\r\n");
    }

    #[test]
    fn awkward_fields_are_quoted() {
        let csv = String::from_utf8(render(
            &["text"],
            &[vec!["say \"hi\", then\nleave".into()], vec!["plain".into()]],
        )
        .unwrap())
        .unwrap();
        assert!(csv.contains("\"say \"\"hi\"\", then\nleave\"\r\n"));
        assert!(csv.ends_with("plain\r\n"));
    }
}
