use crate::error::{FormularyError, Result};
use crate::model::DrugDraft;
use std::io::Read;

const COLUMNS: [&str; 4] = ["drug_code", "trade_name", "generic_name", "category"];

/// Parse a CSV export into drafts for [`crate::commands::save::import`].
///
/// The header row names the columns; order does not matter and extra columns
/// are ignored. Values are trimmed.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<DrugDraft>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let mut index = [0usize; 4];
    for (slot, name) in index.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                FormularyError::InvalidInput(format!("CSV header is missing column '{}'", name))
            })?;
    }

    let mut drafts = Vec::new();
    for row in csv.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        if row.iter().all(|f| f.is_empty()) {
            continue;
        }

        let field = |i: usize| row.get(index[i]).unwrap_or("");
        if row.len() <= *index.iter().max().unwrap_or(&0) {
            return Err(FormularyError::InvalidInput(format!(
                "Line {}: expected {} columns, found {}",
                line,
                headers.len(),
                row.len()
            )));
        }
        if field(0).is_empty() {
            return Err(FormularyError::InvalidInput(format!(
                "Line {}: drug_code is empty",
                line
            )));
        }
        drafts.push(DrugDraft::new(field(0), field(1), field(2), field(3)));
    }

    tracing::debug!(rows = drafts.len(), "parsed csv import");
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_in_any_column_order() {
        let data = "\
Category, Drug_Code ,generic_name,trade_name,notes
Analgesic,PARA500,Paracetamol,Tylenol,ignored
Antibiotic, AMOX250 ,Amoxicillin,Amoxil,
";
        let drafts = read_csv(data.as_bytes()).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(
            drafts[0],
            DrugDraft::new("PARA500", "Tylenol", "Paracetamol", "Analgesic")
        );
        assert_eq!(drafts[1].drug_code, "AMOX250");
        assert!(drafts[1].id.is_none());
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let data = "drug_code,trade_name,generic_name,category\n\
                    CO1,\"Co-codamol, 30/500\",Codeine,Analgesic\n";
        let drafts = read_csv(data.as_bytes()).unwrap();
        assert_eq!(drafts[0].trade_name, "Co-codamol, 30/500");
    }

    #[test]
    fn missing_header_column_is_rejected() {
        let data = "drug_code,trade_name,category\nA,B,C\n";
        let err = read_csv(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("generic_name"));
    }

    #[test]
    fn reports_line_of_blank_code() {
        let data = "drug_code,trade_name,generic_name,category\n\
                    A,a,a,x\n\
                    ,b,b,x\n";
        let err = read_csv(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 3"), "{}", err);
    }

    #[test]
    fn reports_line_of_short_row() {
        let data = "drug_code,trade_name,generic_name,category\n\
                    A,a,a,x\n\
                    B,b\n";
        let err = read_csv(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 3"), "{}", err);
    }

    #[test]
    fn header_only_yields_nothing() {
        let data = "drug_code,trade_name,generic_name,category\n";
        assert!(read_csv(data.as_bytes()).unwrap().is_empty());
    }
}
