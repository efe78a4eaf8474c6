//! Cross-entity fallback searches.
//!
//! Titles are searched first. When they do not fill the requested page the
//! remainder is taken from products, so a page never holds more than `limit`
//! results and titles always come before products.

use crate::error::ApiError;
use crate::orm::{trim_joined, unwrap_joined, window, PUBLIC_USER_FIELDS};
use crate::query::{
    contains_all, contains_ci, deleted_clause, parse_optional_id, parse_tag_list, text_param,
    Page, Resource,
};
use crate::store::{Collection, DocumentStore, FindOptions, Stage};
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct QueryAllParams {
    /// Free text matched against titles, categories, tags, product names and owners
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleAndCategoryParams {
    pub name: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub tags: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Default)]
pub struct SearchResults {
    pub titles: Vec<Document>,
    pub products: Vec<Document>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.titles.len() + self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fields left out of product results.
const PRODUCT_HIDDEN_FIELDS: [&str; 5] = ["magnetLink", "othersUrl", "deleted", "createdAt", "updatedAt"];

/// The window left for products once titles have been served.
///
/// `titles_total` is the number of titles matching the query overall. It is
/// only consulted when the title page came back empty: the products window
/// then starts as far past the first product as the request's skip reaches
/// past the last title.
pub fn overflow_page(page: Page, titles_found: usize, titles_total: u64) -> Option<Page> {
    let remaining = page.limit - titles_found as i64;
    if remaining <= 0 {
        return None;
    }
    let skip = if titles_found > 0 {
        0
    } else {
        page.skip.saturating_sub(titles_total)
    };
    Some(Page {
        skip,
        limit: remaining,
    })
}

/// Search titles by title, category or tag text, then fill up with products
/// matched by name, tag or owner username.
pub async fn search_by_query_all(
    store: &dyn DocumentStore,
    params: &QueryAllParams,
) -> Result<SearchResults, ApiError> {
    let page = Page::for_resource(Resource::CrossSearch, params.limit, params.skip);
    let text = text_param(&params.query);

    let mut title_stages = vec![
        Stage::Match(deleted_clause(None)),
        Stage::lookup(Collection::Categories, "category", "_id", "category"),
        Stage::lookup(Collection::Tags, "tags", "_id", "tags"),
    ];
    if let Some(text) = text {
        title_stages.push(Stage::Match(any_of(&["titleSTR", "category.categorySTR", "tags.tagSTR"], text)));
    }

    let mut pipeline = title_stages.clone();
    if page.skip > 0 {
        pipeline.push(Stage::Skip(page.skip));
    }
    pipeline.push(Stage::Limit(page.limit));
    let mut titles = store.aggregate(Collection::Titles, pipeline).await?;
    for title in titles.iter_mut() {
        unwrap_joined(title, "category");
    }

    let titles_total = if titles.is_empty() && page.skip > 0 {
        count_stages(store, Collection::Titles, title_stages).await?
    } else {
        0
    };

    let products = match overflow_page(page, titles.len(), titles_total) {
        Some(rest) => {
            let mut pipeline = vec![
                Stage::Match(deleted_clause(None)),
                Stage::lookup(Collection::Tags, "tags", "_id", "tags"),
                Stage::lookup(Collection::Users, "owner", "_id", "owner"),
                Stage::Unwind("owner".to_string()),
            ];
            if let Some(text) = text {
                pipeline.push(Stage::Match(any_of(&["name", "tags.tagSTR", "owner.username"], text)));
            }
            pipeline.extend(window(rest.skip, rest.limit));
            let mut products = store.aggregate(Collection::Products, pipeline).await?;
            for product in products.iter_mut() {
                for field in PRODUCT_HIDDEN_FIELDS {
                    product.remove(field);
                }
                trim_joined(product, "owner", PUBLIC_USER_FIELDS);
            }
            products
        }
        None => Vec::new(),
    };

    log::debug!(
        "Query-all search {:?}: {} titles, {} products",
        text,
        titles.len(),
        products.len()
    );
    Ok(SearchResults { titles, products })
}

/// Search titles by name and category ranked by how many of the requested
/// tags they carry, then fill up with products carrying all of them. When a
/// `title` is given only that title's products are searched.
pub async fn search_by_title_and_category(
    store: &dyn DocumentStore,
    params: &TitleAndCategoryParams,
) -> Result<SearchResults, ApiError> {
    let page = Page::for_resource(Resource::CrossSearch, params.limit, params.skip);
    let name = text_param(&params.name);
    let category = parse_optional_id("category", params.category.as_deref())?;
    let title = parse_optional_id("title", params.title.as_deref())?;
    let tags = match text_param(&params.tags) {
        Some(raw) => parse_tag_list(raw)?,
        None => Vec::new(),
    };

    if let Some(title) = title {
        let products = find_products(store, name, Some(title), &tags, page).await?;
        return Ok(SearchResults {
            titles: Vec::new(),
            products,
        });
    }

    let mut filter = deleted_clause(None);
    if let Some(name) = name {
        filter.insert("titleSTR", contains_ci(name));
    }
    if let Some(category) = category {
        filter.insert("category", category);
    }

    let mut pipeline = vec![
        Stage::Match(filter.clone()),
        Stage::CountOverlap {
            field: "matchedTagsCount".to_string(),
            array: "tags".to_string(),
            values: tags.iter().copied().map(Bson::ObjectId).collect(),
        },
        Stage::Sort(doc! { "matchedTagsCount": -1, "createdAt": -1 }),
        Stage::Project(doc! { "_id": 1, "titleSTR": 1, "imageURL": 1 }),
    ];
    pipeline.extend(window(page.skip, page.limit));
    let titles = store.aggregate(Collection::Titles, pipeline).await?;

    let titles_total = if titles.is_empty() && page.skip > 0 {
        store.count(Collection::Titles, filter).await?
    } else {
        0
    };

    let products = match overflow_page(page, titles.len(), titles_total) {
        Some(rest) => find_products(store, name, None, &tags, rest).await?,
        None => Vec::new(),
    };

    Ok(SearchResults { titles, products })
}

async fn find_products(
    store: &dyn DocumentStore,
    name: Option<&str>,
    title: Option<ObjectId>,
    tags: &[ObjectId],
    page: Page,
) -> Result<Vec<Document>, ApiError> {
    let mut filter = deleted_clause(None);
    if let Some(name) = name {
        filter.insert("name", contains_ci(name));
    }
    if let Some(title) = title {
        filter.insert("title", title);
    }
    if !tags.is_empty() {
        filter.insert("tags", contains_all(tags));
    }
    let options = FindOptions::page(page.skip, page.limit)
        .projection(doc! { "_id": 1, "name": 1, "imageURL": 1 });
    Ok(store.find(Collection::Products, filter, options).await?)
}

/// `$or` of a case-insensitive substring match on each path.
fn any_of(paths: &[&str], text: &str) -> Document {
    let clauses: Vec<Bson> = paths
        .iter()
        .map(|path| {
            let mut clause = Document::new();
            clause.insert(*path, contains_ci(text));
            Bson::Document(clause)
        })
        .collect();
    doc! { "$or": clauses }
}

async fn count_stages(
    store: &dyn DocumentStore,
    collection: Collection,
    mut stages: Vec<Stage>,
) -> Result<u64, ApiError> {
    stages.push(Stage::Count("total".to_string()));
    let counted = store.aggregate(collection, stages).await?;
    let total = counted
        .first()
        .and_then(|doc| match doc.get("total") {
            Some(Bson::Int32(n)) => Some(*n as i64),
            Some(Bson::Int64(n)) => Some(*n),
            _ => None,
        })
        .unwrap_or(0);
    Ok(total.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_fill_the_remaining_quota() {
        let page = Page { skip: 0, limit: 10 };
        assert_eq!(overflow_page(page, 7, 0), Some(Page { skip: 0, limit: 3 }));
    }

    #[test]
    fn test_no_products_when_titles_fill_the_page() {
        let page = Page { skip: 0, limit: 10 };
        assert_eq!(overflow_page(page, 10, 0), None);
    }

    #[test]
    fn test_skip_past_titles_carries_into_products() {
        let page = Page { skip: 25, limit: 10 };
        assert_eq!(overflow_page(page, 0, 12), Some(Page { skip: 13, limit: 10 }));
        assert_eq!(overflow_page(page, 0, 40), Some(Page { skip: 0, limit: 10 }));
    }

    #[test]
    fn test_partial_title_page_starts_products_at_zero() {
        let page = Page { skip: 5, limit: 10 };
        assert_eq!(overflow_page(page, 4, 9), Some(Page { skip: 0, limit: 6 }));
    }

    #[test]
    fn test_any_of_builds_or_clause() {
        let filter = any_of(&["a", "b.c"], "x");
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);
    }
}
