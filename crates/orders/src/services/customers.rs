//! Customer resolution.
//!
//! Precedence, first hit wins:
//!
//! 1. exact phone, exact customer code, or the code of an order that has a
//!    customer attached: resolved with confidence 1.0
//! 2. name-token similarity against first and last names: a candidate set
//!
//! The name path never resolves on its own. It resolves only when a verifier
//! (postal code, last four phone digits, or the code of an order the
//! candidate owns) corroborates exactly one of the top-scored candidates;
//! a lower-ranked match never attaches. Otherwise the caller gets masked
//! candidates and must confirm with [`CustomerResolver::select_by_id`].
//! The resolver never writes customer rows.

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;
use tracing::{debug, instrument};

use chatshop_core::{
    CustomerId, Phone,
    text::{digits_only, name_tokens},
};

use crate::models::Customer;
use crate::store::{OrderStore, StoreError};

/// Rows fetched per page while scanning name matches.
const CANDIDATE_PAGE_SIZE: usize = 50;

/// Tuning for the name path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverSettings {
    /// Maximum masked candidates returned.
    pub candidate_limit: usize,
    /// Minimum similarity for a query token to count as matched.
    pub token_threshold: f64,
    /// Minimum name score to be offered as a candidate.
    pub candidate_threshold: f64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            candidate_limit: 3,
            token_threshold: 0.75,
            candidate_threshold: 0.5,
        }
    }
}

/// How a customer was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Exact phone number.
    Phone,
    /// Exact customer code.
    CustomerCode,
    /// Code of an order attached to the customer.
    OrderReference,
    /// Name similarity.
    Name,
    /// Name similarity corroborated by a verifier.
    NameVerified,
}

/// A candidate shown for disambiguation. Carries no raw contact data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedCandidate {
    /// Internal id, the only handle accepted by `select_by_id`.
    pub id: CustomerId,
    /// First name and last-name initial, e.g. `علی ر.`.
    pub display_name: String,
    /// Last four phone digits, e.g. `***0442`.
    pub phone_hint: String,
    /// Name score in `0.0..=1.0`.
    pub score: f64,
    /// Always [`MatchType::Name`].
    pub match_type: MatchType,
}

impl MaskedCandidate {
    fn new(customer: &Customer, score: f64) -> Self {
        let initial: String = customer.last_name.chars().take(1).collect();
        let display_name = if initial.is_empty() {
            customer.first_name.clone()
        } else {
            format!("{} {initial}.", customer.first_name)
        };
        Self {
            id: customer.id,
            display_name,
            phone_hint: customer.phone.masked(),
            score,
            match_type: MatchType::Name,
        }
    }
}

/// Outcome of [`CustomerResolver::resolve`].
///
/// Serialized with a `status` tag and a `needs_confirmation` flag.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerResolution {
    /// One customer, safe to attach.
    Resolved {
        /// The customer.
        customer: Customer,
        /// 1.0 for exact identifiers, the name score otherwise.
        confidence: f64,
        /// Which identifier matched.
        match_type: MatchType,
    },
    /// Several or uncorroborated candidates; the caller must pick one.
    NeedsConfirmation {
        /// Best first, at most the configured limit.
        candidates: Vec<MaskedCandidate>,
    },
    /// Nothing matched.
    Unmatched,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ResolutionBody<'a> {
    Resolved {
        needs_confirmation: bool,
        customer: &'a Customer,
        confidence: f64,
        match_type: MatchType,
    },
    NeedsConfirmation {
        needs_confirmation: bool,
        candidates: &'a [MaskedCandidate],
    },
    Unmatched {
        needs_confirmation: bool,
    },
}

impl Serialize for CustomerResolution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let needs_confirmation = self.needs_confirmation();
        let body = match self {
            Self::Resolved {
                customer,
                confidence,
                match_type,
            } => ResolutionBody::Resolved {
                needs_confirmation,
                customer,
                confidence: *confidence,
                match_type: *match_type,
            },
            Self::NeedsConfirmation { candidates } => ResolutionBody::NeedsConfirmation {
                needs_confirmation,
                candidates,
            },
            Self::Unmatched => ResolutionBody::Unmatched { needs_confirmation },
        };
        body.serialize(serializer)
    }
}

impl CustomerResolution {
    /// Whether the caller has to disambiguate.
    #[must_use]
    pub const fn needs_confirmation(&self) -> bool {
        matches!(self, Self::NeedsConfirmation { .. })
    }

    /// The resolved customer, if any.
    #[must_use]
    pub const fn customer(&self) -> Option<&Customer> {
        match self {
            Self::Resolved { customer, .. } => Some(customer),
            _ => None,
        }
    }
}

/// Resolves identity queries to customer records.
pub struct CustomerResolver<'a> {
    store: &'a dyn OrderStore,
    settings: ResolverSettings,
}

impl<'a> CustomerResolver<'a> {
    /// Create a resolver over `store`.
    #[must_use]
    pub const fn new(store: &'a dyn OrderStore, settings: ResolverSettings) -> Self {
        Self { store, settings }
    }

    /// Resolve `query`, optionally corroborated by `verifier`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    #[instrument(skip_all, fields(has_verifier = verifier.is_some()))]
    pub async fn resolve(
        &self,
        query: &str,
        verifier: Option<&str>,
    ) -> Result<CustomerResolution, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(CustomerResolution::Unmatched);
        }

        if let Some((customer, match_type)) = self.exact(query).await? {
            debug!(customer_id = %customer.id, ?match_type, "Exact customer match");
            return Ok(CustomerResolution::Resolved {
                customer,
                confidence: 1.0,
                match_type,
            });
        }

        let scored = self.name_candidates(query).await?;
        if scored.is_empty() {
            debug!("No customer candidates");
            return Ok(CustomerResolution::Unmatched);
        }

        if let Some(verifier) = verifier.map(str::trim).filter(|v| !v.is_empty()) {
            // Only candidates sharing the best score may be attached
            let top_score = scored.first().map_or(0.0, |(_, score)| *score);
            let mut corroborated = Vec::new();
            for (customer, score) in scored
                .iter()
                .take_while(|(_, score)| score.total_cmp(&top_score).is_eq())
            {
                if self.corroborates(customer, verifier).await? {
                    corroborated.push((customer, *score));
                }
            }
            if let [(customer, score)] = corroborated.as_slice() {
                debug!(customer_id = %customer.id, score, "Name match corroborated");
                return Ok(CustomerResolution::Resolved {
                    customer: (*customer).clone(),
                    confidence: *score,
                    match_type: MatchType::NameVerified,
                });
            }
            debug!(corroborated = corroborated.len(), "Verifier did not single out a candidate");
        }

        let candidates = scored
            .iter()
            .take(self.settings.candidate_limit)
            .map(|(customer, score)| MaskedCandidate::new(customer, *score))
            .collect();
        Ok(CustomerResolution::NeedsConfirmation { candidates })
    }

    /// Complete a disambiguation by internal id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn select_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.store.customer_by_id(id).await
    }

    async fn exact(&self, query: &str) -> Result<Option<(Customer, MatchType)>, StoreError> {
        if let Ok(phone) = Phone::parse(query)
            && let Some(customer) = self.store.customer_by_phone(&phone).await?
        {
            return Ok(Some((customer, MatchType::Phone)));
        }

        if let Some(customer) = self.store.customer_by_code(query).await? {
            return Ok(Some((customer, MatchType::CustomerCode)));
        }

        if let Some(customer_id) = self
            .store
            .order_by_code(query)
            .await?
            .and_then(|order| order.customer_id)
            && let Some(customer) = self.store.customer_by_id(customer_id).await?
        {
            return Ok(Some((customer, MatchType::OrderReference)));
        }

        Ok(None)
    }

    /// Candidates at or above the candidate threshold, best first, ties by id.
    async fn name_candidates(&self, query: &str) -> Result<Vec<(Customer, f64)>, StoreError> {
        let tokens = name_tokens(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut fragments: Vec<String> = tokens
            .iter()
            .map(|t| t.chars().take(2).collect())
            .collect();
        fragments.sort();
        fragments.dedup();

        // Score every prefix match, one page at a time
        let mut scored: Vec<(Customer, f64)> = Vec::new();
        let mut after = None;
        let mut scanned = 0_usize;
        loop {
            let page = self
                .store
                .customers_by_name_fragments(&fragments, after, CANDIDATE_PAGE_SIZE)
                .await?;
            let full_page = page.len() == CANDIDATE_PAGE_SIZE;
            after = page.last().map(|customer| customer.id);
            scanned += page.len();

            scored.extend(
                page.into_iter()
                    .map(|customer| {
                        let score = name_score(
                            &tokens,
                            &name_tokens(&customer.full_name()),
                            self.settings.token_threshold,
                        );
                        (customer, score)
                    })
                    .filter(|(_, score)| *score >= self.settings.candidate_threshold),
            );

            if !full_page {
                break;
            }
        }
        debug!(scanned, matched = scored.len(), "Scored name candidates");

        scored.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.id.cmp(&b.id)));
        Ok(scored)
    }

    async fn corroborates(&self, customer: &Customer, verifier: &str) -> Result<bool, StoreError> {
        let digits = digits_only(verifier);
        if !digits.is_empty() {
            if digits == digits_only(&customer.postal_code) {
                return Ok(true);
            }
            if digits.len() == 4 && digits == customer.phone.last_four() {
                return Ok(true);
            }
        }

        let owned = self
            .store
            .order_by_code(verifier)
            .await?
            .is_some_and(|order| order.customer_id == Some(customer.id));
        Ok(owned)
    }
}

/// Token-based name similarity.
///
/// Each query token takes its best normalized Levenshtein similarity against
/// the name tokens; tokens below `token_threshold` count as zero. The score
/// is the mean over query tokens.
#[must_use]
pub fn name_score(query_tokens: &[String], name_tokens: &[String], token_threshold: f64) -> f64 {
    if query_tokens.is_empty() || name_tokens.is_empty() {
        return 0.0;
    }

    let matched: f64 = query_tokens
        .iter()
        .map(|q| {
            name_tokens
                .iter()
                .map(|n| normalized_levenshtein(q, n))
                .fold(0.0_f64, f64::max)
        })
        .filter(|best| *best >= token_threshold)
        .sum();

    let count = u32::try_from(query_tokens.len()).unwrap_or(u32::MAX);
    matched / f64::from(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn tokens(s: &str) -> Vec<String> {
        name_tokens(s)
    }

    #[test]
    fn test_name_score_exact_and_partial() {
        assert!((name_score(&tokens("علی"), &tokens("علی رضایی"), 0.75) - 1.0).abs() < 1e-9);
        let half = name_score(&tokens("علی کریمی"), &tokens("علی رضایی"), 0.75);
        assert!((half - 0.5).abs() < 1e-9);
        assert!(name_score(&tokens("مریم"), &tokens("علی رضایی"), 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_name_score_tolerates_typos() {
        let score = name_score(&tokens("mohammad"), &tokens("Mohamad Karimi"), 0.75);
        assert!(score > 0.8);
    }

    #[test]
    fn test_name_score_folds_arabic_letters() {
        let score = name_score(&tokens("علي"), &tokens("علی"), 0.75);
        assert!((score - 1.0).abs() < 1e-9);
    }

    async fn two_alis() -> (MemoryStore, Customer, Customer) {
        let store = MemoryStore::new();
        let first = store
            .add_customer(
                "علی",
                "رضایی",
                Phone::parse("09123450442").unwrap(),
                "Tehran",
                "1434863111",
                "CUST-0001",
            )
            .await;
        let second = store
            .add_customer(
                "علی",
                "کریمی",
                Phone::parse("09351239876").unwrap(),
                "Isfahan",
                "8174673441",
                "CUST-0002",
            )
            .await;
        (store, first, second)
    }

    #[tokio::test]
    async fn test_exact_phone_resolves() {
        let (store, first, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("۰۹۱۲ ۳۴۵ ۰۴۴۲", None).await.unwrap();
        match resolution {
            CustomerResolution::Resolved {
                customer,
                confidence,
                match_type,
            } => {
                assert_eq!(customer.id, first.id);
                assert!((confidence - 1.0).abs() < f64::EPSILON);
                assert_eq!(match_type, MatchType::Phone);
            }
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exact_code_resolves() {
        let (store, _, second) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("CUST-0002", None).await.unwrap();
        assert_eq!(resolution.customer().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_name_alone_needs_confirmation() {
        let (store, _, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("علی", None).await.unwrap();
        let CustomerResolution::NeedsConfirmation { candidates } = &resolution else {
            panic!("expected candidates, got {resolution:?}");
        };
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.phone_hint.starts_with("***")));

        let json = serde_json::to_value(&resolution).unwrap();
        assert!(json.get("customer").is_none());
        assert!(!json.to_string().contains("09123450442"));
        assert!(!json.to_string().contains("CUST-0001"));
    }

    #[tokio::test]
    async fn test_single_name_match_still_needs_confirmation() {
        let (store, _, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("علی رضایی", None).await.unwrap();
        assert!(resolution.needs_confirmation());
    }

    #[tokio::test]
    async fn test_last_four_verifier_attaches() {
        let (store, first, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("علی", Some("0442")).await.unwrap();
        match resolution {
            CustomerResolution::Resolved {
                customer,
                confidence,
                match_type,
            } => {
                assert_eq!(customer.id, first.id);
                assert!((confidence - 1.0).abs() < 1e-9);
                assert_eq!(match_type, MatchType::NameVerified);
            }
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verifier_for_lower_ranked_candidate_does_not_attach() {
        let (store, first, second) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        // کریمی scores 1.0, رضایی only 0.5; 0442 belongs to رضایی
        let resolution = resolver.resolve("علی کریمی", Some("0442")).await.unwrap();
        let CustomerResolution::NeedsConfirmation { candidates } = &resolution else {
            panic!("expected candidates, got {resolution:?}");
        };
        assert_eq!(candidates[0].id, second.id);
        assert!(candidates.iter().any(|c| c.id == first.id));
        assert!(resolution.customer().is_none());
    }

    #[tokio::test]
    async fn test_verifier_for_top_candidate_attaches_with_name_score() {
        let (store, _, second) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("علی کریمی", Some("9876")).await.unwrap();
        assert_eq!(resolution.customer().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_resolution_json_carries_confirmation_flag() {
        let (store, _, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());

        let ambiguous = serde_json::to_value(resolver.resolve("علی", None).await.unwrap()).unwrap();
        assert_eq!(ambiguous["status"], "needs_confirmation");
        assert_eq!(ambiguous["needs_confirmation"], true);
        assert_eq!(ambiguous["candidates"].as_array().unwrap().len(), 2);

        let resolved =
            serde_json::to_value(resolver.resolve("CUST-0001", None).await.unwrap()).unwrap();
        assert_eq!(resolved["status"], "resolved");
        assert_eq!(resolved["needs_confirmation"], false);
        assert_eq!(resolved["match_type"], "customer_code");

        let unmatched = serde_json::to_value(resolver.resolve("Zahra", None).await.unwrap()).unwrap();
        assert_eq!(unmatched["status"], "unmatched");
        assert_eq!(unmatched["needs_confirmation"], false);
    }

    #[tokio::test]
    async fn test_postal_code_verifier_attaches() {
        let (store, _, second) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("علی", Some("۸۱۷۴۶-۷۳۴۴۱")).await.unwrap();
        assert_eq!(resolution.customer().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_wrong_verifier_needs_confirmation() {
        let (store, _, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("علی", Some("9999")).await.unwrap();
        assert!(resolution.needs_confirmation());
    }

    #[tokio::test]
    async fn test_unknown_name_unmatched() {
        let (store, _, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let resolution = resolver.resolve("Zahra", None).await.unwrap();
        assert_eq!(resolution, CustomerResolution::Unmatched);
    }

    #[tokio::test]
    async fn test_candidate_limit() {
        let (store, _, _) = two_alis().await;
        let settings = ResolverSettings {
            candidate_limit: 1,
            ..ResolverSettings::default()
        };
        let resolver = CustomerResolver::new(&store, settings);
        let resolution = resolver.resolve("علی", None).await.unwrap();
        let CustomerResolution::NeedsConfirmation { candidates } = resolution else {
            panic!("expected candidates");
        };
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_select_by_id() {
        let (store, first, _) = two_alis().await;
        let resolver = CustomerResolver::new(&store, ResolverSettings::default());
        let selected = resolver.select_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(selected.customer_code, "CUST-0001");
        assert!(resolver
            .select_by_id(CustomerId::new(9999))
            .await
            .unwrap()
            .is_none());
    }
}
