use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public-safe projection of an opportunity as returned by the data service.
/// Contact values are already obfuscated; raw contact columns never appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicOpportunity {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "nicho")]
    pub niche: String,
    pub instagram: String,
    pub whatsapp_public: String,
    pub email_public: String,
    #[serde(rename = "faturamento")]
    pub revenue: String,
    #[serde(rename = "como_ajudar")]
    pub how_to_help: String,
    #[serde(rename = "por_que_escolher")]
    pub why_choose: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contact_method: Option<String>,
    #[serde(default)]
    pub contact_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NicheFilter {
    #[default]
    All,
    Only(String),
}

impl NicheFilter {
    /// Empty input and "all" (any case) select every niche.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::All,
            Some(value) if value.eq_ignore_ascii_case("all") => Self::All,
            Some(value) => Self::Only(value.to_string()),
        }
    }

    pub fn selected(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Only(niche) => Some(niche.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpportunityFilter {
    pub search: String,
    pub niche: NicheFilter,
}

impl OpportunityFilter {
    pub fn matches(&self, opportunity: &PublicOpportunity) -> bool {
        let term = self.search.trim().to_lowercase();
        let matches_search = term.is_empty()
            || [&opportunity.name, &opportunity.instagram, &opportunity.niche]
                .iter()
                .any(|value| value.to_lowercase().contains(&term));

        let matches_niche = match &self.niche {
            NicheFilter::All => true,
            NicheFilter::Only(niche) => &opportunity.niche == niche,
        };

        matches_search && matches_niche
    }

    pub fn apply<'a>(&self, opportunities: &'a [PublicOpportunity]) -> Vec<&'a PublicOpportunity> {
        opportunities
            .iter()
            .filter(|opportunity| self.matches(opportunity))
            .collect()
    }
}

pub fn available_niches(opportunities: &[PublicOpportunity]) -> Vec<String> {
    let mut niches: Vec<String> = opportunities
        .iter()
        .map(|opportunity| opportunity.niche.clone())
        .filter(|niche| !niche.is_empty())
        .collect();
    niches.sort();
    niches.dedup();
    niches
}

/// Short "posted ... ago" label.
pub fn relative_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - created_at).num_seconds();
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3_600 {
        format!("{}min ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3_600)
    } else {
        format!("{}d ago", seconds / 86_400)
    }
}

pub fn results_summary(count: usize, niche: &NicheFilter) -> String {
    let noun = if count == 1 {
        "opportunity"
    } else {
        "opportunities"
    };
    match niche.selected() {
        Some(niche) => format!("{count} {noun} found in {niche}"),
        None => format!("{count} {noun} found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn opportunity(id: &str, name: &str, niche: &str, instagram: &str) -> PublicOpportunity {
        PublicOpportunity {
            id: id.to_string(),
            name: name.to_string(),
            niche: niche.to_string(),
            instagram: instagram.to_string(),
            whatsapp_public: "+55 81 9****-0973".to_string(),
            email_public: "in***@gmail.com".to_string(),
            revenue: "R$ 50.000,00".to_string(),
            how_to_help: "Automate the Instagram funnel".to_string(),
            why_choose: "Overloaded and need to delegate".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 9, 16, 22, 22, 0).unwrap(),
            updated_at: None,
            contact_method: None,
            contact_message: None,
        }
    }

    fn catalog() -> Vec<PublicOpportunity> {
        vec![
            opportunity("1", "Bruno Thorpe", "Education", "@pulseventos"),
            opportunity("2", "Carlos Mendes", "E-commerce", "@LojaVirtual_Pro"),
            opportunity("3", "Roberto Costa", "Technology", "@devtech_solutions"),
        ]
    }

    #[test]
    fn search_matches_handle_case_insensitively() {
        let filter = OpportunityFilter {
            search: "lojavirtual".to_string(),
            niche: NicheFilter::All,
        };
        let catalog = catalog();
        let found = filter.apply(&catalog);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");
    }

    #[test]
    fn niche_filter_is_exact_and_combines_with_search() {
        let catalog = catalog();
        let education = OpportunityFilter {
            search: String::new(),
            niche: NicheFilter::parse(Some("Education")),
        };
        assert_eq!(education.apply(&catalog).len(), 1);

        let mismatch = OpportunityFilter {
            search: "carlos".to_string(),
            niche: NicheFilter::parse(Some("Education")),
        };
        assert!(mismatch.apply(&catalog).is_empty());
    }

    #[test]
    fn all_niche_keywords_select_everything() {
        assert_eq!(NicheFilter::parse(None), NicheFilter::All);
        assert_eq!(NicheFilter::parse(Some(" ")), NicheFilter::All);
        assert_eq!(NicheFilter::parse(Some("ALL")), NicheFilter::All);
    }

    #[test]
    fn niches_are_sorted_and_distinct() {
        let mut catalog = catalog();
        catalog.push(opportunity("4", "Ana", "Education", "@ana"));
        assert_eq!(
            available_niches(&catalog),
            vec!["E-commerce", "Education", "Technology"]
        );
    }

    #[test]
    fn relative_age_buckets() {
        let created = Utc.with_ymd_and_hms(2025, 9, 16, 12, 0, 0).unwrap();
        assert_eq!(relative_age(created, created + Duration::seconds(59)), "just now");
        assert_eq!(relative_age(created, created + Duration::minutes(5)), "5min ago");
        assert_eq!(relative_age(created, created + Duration::hours(3)), "3h ago");
        assert_eq!(relative_age(created, created + Duration::days(2)), "2d ago");
    }

    #[test]
    fn summary_pluralizes_and_names_niche() {
        assert_eq!(results_summary(1, &NicheFilter::All), "1 opportunity found");
        assert_eq!(
            results_summary(3, &NicheFilter::Only("Health".to_string())),
            "3 opportunities found in Health"
        );
    }
}
