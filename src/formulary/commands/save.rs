use crate::commands::{CmdMessage, CmdResult};
use crate::error::{FormularyError, Result};
use crate::gateway::Gateway;
use crate::model::DrugDraft;
use std::collections::HashMap;

fn normalize(draft: &DrugDraft) -> Result<DrugDraft> {
    let code = draft.drug_code.trim();
    if code.is_empty() {
        return Err(FormularyError::InvalidInput(
            "Drug code is required".to_string(),
        ));
    }
    Ok(DrugDraft {
        id: draft.id,
        drug_code: code.to_string(),
        trade_name: draft.trade_name.trim().to_string(),
        generic_name: draft.generic_name.trim().to_string(),
        category: draft.category.trim().to_string(),
    })
}

/// Update by id when the draft carries one, insert otherwise.
pub fn run<G: Gateway>(gateway: &mut G, draft: &DrugDraft) -> Result<CmdResult> {
    let draft = normalize(draft)?;
    let verb = match draft.id {
        Some(id) => {
            gateway.update_drug(id, &draft)?;
            "updated"
        }
        None => {
            gateway.insert_drug(&draft)?;
            "added"
        }
    };

    let mut result = CmdResult::default().with_affected_codes(vec![draft.drug_code.clone()]);
    result.add_message(CmdMessage::success(format!(
        "Drug {} ({}): {}",
        verb, draft.drug_code, draft.trade_name
    )));
    Ok(result)
}

/// Bulk insert-or-update keyed on `drug_code`.
///
/// Ids are dropped so every row resolves by code. A code repeated within the
/// batch keeps its last row, in the position of its first appearance.
pub fn import<G: Gateway>(gateway: &mut G, drafts: &[DrugDraft]) -> Result<CmdResult> {
    if drafts.is_empty() {
        return Err(FormularyError::InvalidInput(
            "Nothing to import".to_string(),
        ));
    }

    let mut rows: Vec<DrugDraft> = Vec::with_capacity(drafts.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (i, draft) in drafts.iter().enumerate() {
        let mut row = normalize(draft).map_err(|_| {
            FormularyError::InvalidInput(format!("Row {} has no drug code", i + 1))
        })?;
        row.id = None;
        match positions.get(&row.drug_code) {
            Some(&pos) => rows[pos] = row,
            None => {
                positions.insert(row.drug_code.clone(), rows.len());
                rows.push(row);
            }
        }
    }

    gateway.upsert_drugs(&rows)?;

    let mut result = CmdResult::default()
        .with_affected_codes(rows.iter().map(|r| r.drug_code.clone()).collect());
    result.add_message(CmdMessage::success(format!(
        "Imported {} drug(s)",
        rows.len()
    )));
    let collapsed = drafts.len() - rows.len();
    if collapsed > 0 {
        result.add_message(CmdMessage::warning(format!(
            "{} duplicate code(s) in the batch were merged (last row wins)",
            collapsed
        )));
    }
    Ok(result)
}
