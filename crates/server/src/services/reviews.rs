//! Review aggregation: per-product summaries and per-product statistics.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sqlx::PgPool;

use nextgen_core::{CustomerId, Pagination, ProductId, VariantId, average_rating};

use crate::db::{CatalogRepository, CustomerRepository, RepositoryError, ReviewRepository};
use crate::models::{Customer, ProductReview, ProductVariant};

/// One review as shown to shoppers, with the reviewer's name and avatar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub customer_id: CustomerId,
    pub customer_name: String,
    #[serde(rename = "profile_image")]
    pub profile_image: Option<String>,
    pub comment: String,
    pub rating: f64,
    pub variant: Option<ProductVariant>,
}

/// Aggregates over all of a product's reviews plus one page of them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub total_ratings: usize,
    pub average_rating: f64,
    pub total_comments: usize,
    pub reviews: Vec<ReviewView>,
    pub count: usize,
    pub offset: u32,
    pub limit: u32,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReviewStats {
    pub user_total_reviews: usize,
    pub avg_rating: f64,
}

/// Sort newest first. Ties keep a stable order by ID.
pub fn sort_newest_first(reviews: &mut [ProductReview]) {
    reviews.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Build the summary for `all` (already newest first) and `page`.
///
/// An out-of-range page yields zeroed aggregates with `count` still set to
/// the number of reviews.
#[must_use]
pub fn summarize(
    all: &[ProductReview],
    page: Pagination,
    customers: &HashMap<CustomerId, Customer>,
    variants: &HashMap<VariantId, ProductVariant>,
) -> ReviewSummary {
    let window = page.slice(all);

    if window.is_empty() {
        return ReviewSummary {
            total_ratings: 0,
            average_rating: 0.0,
            total_comments: 0,
            reviews: Vec::new(),
            count: all.len(),
            offset: page.offset,
            limit: page.limit,
            total: 0,
        };
    }

    let ratings: Vec<f64> = all.iter().map(|r| r.rating).collect();
    let reviews = window
        .iter()
        .map(|review| {
            let customer = customers.get(&review.customer_id);
            ReviewView {
                customer_id: review.customer_id.clone(),
                customer_name: customer
                    .map_or_else(|| "Unknown".to_string(), Customer::display_name),
                profile_image: customer.and_then(Customer::profile_image).map(String::from),
                comment: review.comment.clone(),
                rating: review.rating,
                variant: variants.get(&review.variant_id).cloned(),
            }
        })
        .collect();

    ReviewSummary {
        total_ratings: ratings.len(),
        average_rating: average_rating(&ratings),
        total_comments: all.len(),
        reviews,
        count: all.len(),
        offset: page.offset,
        limit: page.limit,
        total: all.len(),
    }
}

/// Review count and average rating per product. Products without reviews
/// are absent from the map.
#[must_use]
pub fn stats_by_product(reviews: &[ProductReview]) -> BTreeMap<ProductId, ReviewStats> {
    let mut grouped: BTreeMap<ProductId, Vec<f64>> = BTreeMap::new();
    for review in reviews {
        grouped
            .entry(review.product_id.clone())
            .or_default()
            .push(review.rating);
    }
    grouped
        .into_iter()
        .map(|(product_id, ratings)| {
            let stats = ReviewStats {
                user_total_reviews: ratings.len(),
                avg_rating: average_rating(&ratings),
            };
            (product_id, stats)
        })
        .collect()
}

/// Load a product's reviews and summarize one page, fetching reviewer and
/// variant details only for that page.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails.
pub async fn product_review_summary(
    pool: &PgPool,
    product_id: &ProductId,
    page: Pagination,
) -> Result<ReviewSummary, RepositoryError> {
    let mut all = ReviewRepository::new(pool).list_for_product(product_id).await?;
    sort_newest_first(&mut all);

    let window = page.slice(&all);
    let customer_ids: Vec<CustomerId> = window.iter().map(|r| r.customer_id.clone()).collect();
    let variant_ids: Vec<VariantId> = window.iter().map(|r| r.variant_id.clone()).collect();

    let customers = CustomerRepository::new(pool)
        .get_many(&customer_ids)
        .await?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();
    let variants = CatalogRepository::new(pool)
        .variants_by_ids(&variant_ids)
        .await?
        .into_iter()
        .map(|v| (v.id.clone(), v))
        .collect();

    Ok(summarize(&all, page, &customers, &variants))
}

/// Review statistics for a set of products.
///
/// # Errors
///
/// Returns `RepositoryError` if the query fails.
pub async fn review_stats(
    pool: &PgPool,
    product_ids: &[ProductId],
) -> Result<BTreeMap<ProductId, ReviewStats>, RepositoryError> {
    let reviews = ReviewRepository::new(pool)
        .list_for_products(product_ids)
        .await?;
    Ok(stats_by_product(&reviews))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use serde_json::json;

    use nextgen_core::{OrderId, ReviewId};

    use super::*;

    fn review(id: &str, product: &str, customer: &str, rating: f64, age_minutes: i64) -> ProductReview {
        let at = Utc::now() - TimeDelta::minutes(age_minutes);
        ProductReview {
            id: ReviewId::new(id),
            order_id: OrderId::new("order_1"),
            customer_id: CustomerId::new(customer),
            product_id: ProductId::new(product),
            variant_id: VariantId::new("variant_1"),
            rating,
            comment: format!("comment {id}"),
            created_at: at,
            updated_at: at,
        }
    }

    fn customer(id: &str) -> Customer {
        Customer {
            id: CustomerId::new(id),
            email: None,
            first_name: Some("Ada".to_string()),
            last_name: None,
            phone: None,
            has_account: true,
            metadata: json!({"profile_image": "https://img/ada.png"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_aggregates_all_and_pages_newest_first() {
        let mut all = vec![
            review("prv_1", "prod_1", "cus_1", 5.0, 30),
            review("prv_2", "prod_1", "cus_2", 4.0, 10),
            review("prv_3", "prod_1", "cus_1", 2.5, 20),
        ];
        sort_newest_first(&mut all);

        let customers = HashMap::from([(CustomerId::new("cus_1"), customer("cus_1"))]);
        let page = Pagination { limit: 2, offset: 0 };
        let summary = summarize(&all, page, &customers, &HashMap::new());

        assert_eq!(summary.total_ratings, 3);
        assert_eq!(summary.total_comments, 3);
        assert!((summary.average_rating - 3.83).abs() < f64::EPSILON);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.total, 3);

        let first = summary.reviews.first().unwrap();
        assert_eq!(first.comment, "comment prv_2");
        assert_eq!(first.customer_name, "Unknown");
        assert_eq!(first.profile_image, None);

        let second = summary.reviews.get(1).unwrap();
        assert_eq!(second.customer_name, "Ada Unknown");
        assert_eq!(second.profile_image.as_deref(), Some("https://img/ada.png"));
    }

    #[test]
    fn test_empty_page_zeroes_aggregates() {
        let all = vec![review("prv_1", "prod_1", "cus_1", 5.0, 1)];
        let page = Pagination { limit: 10, offset: 5 };
        let summary = summarize(&all, page, &HashMap::new(), &HashMap::new());

        assert_eq!(summary.total_ratings, 0);
        assert!(summary.average_rating.abs() < f64::EPSILON);
        assert!(summary.reviews.is_empty());
        assert_eq!(summary.count, 1);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.offset, 5);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let all = vec![review("prv_1", "prod_1", "cus_1", 5.0, 1)];
        let summary = summarize(&all, Pagination::default(), &HashMap::new(), &HashMap::new());
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["totalRatings"], 1);
        assert_eq!(value["averageRating"], 5.0);
        assert_eq!(value["reviews"][0]["customerId"], "cus_1");
        assert!(value["reviews"][0]["profile_image"].is_null());
    }

    #[test]
    fn test_stats_by_product() {
        let reviews = vec![
            review("prv_1", "prod_a", "cus_1", 5.0, 1),
            review("prv_2", "prod_a", "cus_2", 4.0, 1),
            review("prv_3", "prod_a", "cus_3", 4.0, 1),
            review("prv_4", "prod_b", "cus_1", 1.0, 1),
        ];
        let stats = stats_by_product(&reviews);

        let a = stats.get(&ProductId::new("prod_a")).unwrap();
        assert_eq!(a.user_total_reviews, 3);
        assert!((a.avg_rating - 4.33).abs() < f64::EPSILON);
        assert_eq!(stats.get(&ProductId::new("prod_b")).unwrap().user_total_reviews, 1);
        assert!(!stats.contains_key(&ProductId::new("prod_c")));
    }
}
