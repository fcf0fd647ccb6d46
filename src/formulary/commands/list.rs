use crate::commands::ListParams;
use crate::error::Result;
use crate::gateway::{DrugPage, Gateway};

/// Fetch one page of the formulary plus the filtered total.
///
/// Gateway failures propagate; an empty page always means zero matches.
pub fn run<G: Gateway>(gateway: &G, params: &ListParams) -> Result<DrugPage> {
    let query = params.to_query()?;
    let page = gateway.select_drugs(&query)?;
    tracing::debug!(
        status = %params.status,
        page = params.page,
        returned = page.records.len(),
        total = page.total_count,
        "listed drugs"
    );
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::status;
    use crate::error::FormularyError;
    use crate::gateway::memory::fixtures::GatewayFixture;
    use crate::model::{CategoryFilter, StatusMode};
    use chrono::{Duration, Utc};

    fn params(status: StatusMode) -> ListParams {
        ListParams {
            status,
            ..ListParams::default()
        }
    }

    #[test]
    fn lists_active_in_code_order() {
        let fixture = GatewayFixture::new()
            .with_active("PARA500", "Tylenol", "Paracetamol", "Analgesic")
            .with_active("AMOX250", "Amoxil", "Amoxicillin", "Antibiotic")
            .with_decommissioned("RANI150", "Ranitidine", Some("Recalled"), Utc::now());

        let page = run(&fixture.gateway, &params(StatusMode::Active)).unwrap();
        let codes: Vec<_> = page.records.iter().map(|r| r.drug_code.as_str()).collect();
        assert_eq!(codes, vec!["AMOX250", "PARA500"]);
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn decommissioned_listing_never_returns_null_remarks() {
        let now = Utc::now();
        let fixture = GatewayFixture::new()
            .with_decommissioned("A", "Alpha", Some("Shortage"), now - Duration::hours(2))
            .with_decommissioned("B", "Beta", None, now)
            .with_decommissioned("C", "Gamma", Some("Recalled"), now);

        let page = run(&fixture.gateway, &params(StatusMode::Decommissioned)).unwrap();
        assert!(page.records.iter().all(|r| r.remarks.is_some()));
        let codes: Vec<_> = page.records.iter().map(|r| r.drug_code.as_str()).collect();
        assert_eq!(codes, vec!["C", "A"]);
    }

    #[test]
    fn search_is_trimmed_and_matches_any_column() {
        let fixture = GatewayFixture::new()
            .with_active("PARA500", "Tylenol", "Paracetamol", "Analgesic")
            .with_active("IBU400", "Brufen", "Ibuprofen", "Analgesic")
            .with_active("XPARA", "Other", "Other", "Misc");

        let params = ListParams {
            search_term: " Para ".into(),
            ..ListParams::default()
        };
        let page = run(&fixture.gateway, &params).unwrap();
        let codes: Vec<_> = page.records.iter().map(|r| r.drug_code.as_str()).collect();
        assert_eq!(codes, vec!["PARA500", "XPARA"]);
    }

    #[test]
    fn category_and_search_combine() {
        let fixture = GatewayFixture::new()
            .with_active("PARA500", "Tylenol", "Paracetamol", "Analgesic")
            .with_active("PARAX", "Paraxin", "Chloramphenicol", "Antibiotic");

        let params = ListParams {
            search_term: "para".into(),
            category: CategoryFilter::from("Antibiotic"),
            ..ListParams::default()
        };
        let page = run(&fixture.gateway, &params).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].drug_code, "PARAX");
    }

    #[test]
    fn third_page_of_forty_five() {
        let fixture = GatewayFixture::new().with_drugs(45, "Analgesic");
        let params = ListParams {
            page: 3,
            ..ListParams::default()
        };
        let page = run(&fixture.gateway, &params).unwrap();
        assert_eq!(page.total_count, 45);
        let codes: Vec<_> = page.records.iter().map(|r| r.drug_code.as_str()).collect();
        assert_eq!(codes, vec!["D041", "D042", "D043", "D044", "D045"]);
    }

    #[test]
    fn failure_is_an_error_not_an_empty_page() {
        let mut fixture = GatewayFixture::new().with_drugs(3, "X");
        fixture.gateway.set_failure(Some("network down"));
        match run(&fixture.gateway, &params(StatusMode::Active)) {
            Err(FormularyError::Gateway { message, .. }) => assert_eq!(message, "network down"),
            other => panic!("Expected gateway error, got {:?}", other),
        }
    }

    #[test]
    fn decommission_then_list_shows_record() {
        let mut fixture =
            GatewayFixture::new().with_active("PARA500", "Tylenol", "Paracetamol", "Analgesic");
        let record = fixture.find("PARA500");
        status::decommission(&mut fixture.gateway, &record, "reason").unwrap();

        let page = run(&fixture.gateway, &params(StatusMode::Decommissioned)).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].remarks.as_deref(), Some("reason"));
        assert!(page.records[0].decommissioned_at.is_some());

        let active = run(&fixture.gateway, &params(StatusMode::Active)).unwrap();
        assert_eq!(active.total_count, 0);
    }
}
