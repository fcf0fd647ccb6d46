use crate::commands::{CmdMessage, CmdResult};
use crate::error::{FormularyError, Result};
use crate::gateway::{Gateway, StatusChange};
use crate::model::DrugRecord;
use chrono::Utc;

/// Move a record out of the active formulary.
///
/// Remarks are required: the decommissioned listing only shows rows with
/// remarks, so a blank reason would hide the record from both views.
pub fn decommission<G: Gateway>(
    gateway: &mut G,
    record: &DrugRecord,
    remarks: &str,
) -> Result<CmdResult> {
    let remarks = remarks.trim();
    if remarks.is_empty() {
        return Err(FormularyError::InvalidInput(
            "Remarks are required to decommission a drug".to_string(),
        ));
    }

    let change = StatusChange::decommission(remarks, Utc::now());
    gateway.update_status(record.id, &change)?;

    let mut result = CmdResult::default().with_affected_codes(vec![record.drug_code.clone()]);
    result.add_message(CmdMessage::success(format!(
        "Drug decommissioned ({}): {}",
        record.drug_code, record.trade_name
    )));
    Ok(result)
}

/// Return a decommissioned record to the active formulary.
pub fn recommission<G: Gateway>(gateway: &mut G, record: &DrugRecord) -> Result<CmdResult> {
    gateway.update_status(record.id, &StatusChange::recommission())?;

    let mut result = CmdResult::default().with_affected_codes(vec![record.drug_code.clone()]);
    result.add_message(CmdMessage::success(format!(
        "Drug restored ({}): {}",
        record.drug_code, record.trade_name
    )));
    Ok(result)
}
