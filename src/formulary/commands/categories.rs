use crate::gateway::Gateway;
use crate::model::StatusMode;

/// Distinct categories of the active formulary, for the category picker.
///
/// A failed lookup degrades to no options; the listing itself stays usable.
pub fn run<G: Gateway>(gateway: &G) -> Vec<String> {
    match gateway.unique_categories(StatusMode::Active) {
        Ok(categories) => categories,
        Err(e) => {
            tracing::warn!(error = %e, "could not load categories");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::fixtures::GatewayFixture;
    use chrono::Utc;

    #[test]
    fn distinct_sorted_active_only() {
        let fixture = GatewayFixture::new()
            .with_active("A", "a", "a", "Antibiotic")
            .with_active("B", "b", "b", "Analgesic")
            .with_active("C", "c", "c", "Antibiotic")
            .with_decommissioned("D", "d", Some("gone"), Utc::now());

        assert_eq!(run(&fixture.gateway), vec!["Analgesic", "Antibiotic"]);
    }

    #[test]
    fn failure_degrades_to_empty() {
        let mut fixture = GatewayFixture::new().with_active("A", "a", "a", "Antibiotic");
        fixture.gateway.set_failure(Some("rpc missing"));
        assert!(run(&fixture.gateway).is_empty());
    }
}
