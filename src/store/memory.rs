//! In-process document store.
//!
//! Collections are plain vectors of BSON documents kept in insertion order,
//! which is the "natural order" results come back in when no sort is given.

use super::{Collection, DocumentStore, FindOptions, Stage, StoreError};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use regex::RegexBuilder;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Collections {
    documents: HashMap<Collection, Vec<Document>>,
    unique: HashMap<Collection, Vec<Vec<String>>>,
}

impl Collections {
    fn docs(&self, collection: Collection) -> &[Document] {
        self.documents
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn docs_mut(&mut self, collection: Collection) -> &mut Vec<Document> {
        self.documents.entry(collection).or_default()
    }

    /// Name of the unique index `candidate` would violate, if any.
    fn unique_violation(
        &self,
        collection: Collection,
        candidate: &Document,
        ignore_id: Option<&Bson>,
    ) -> Option<String> {
        let indexes = self.unique.get(&collection)?;
        for fields in indexes {
            let clash = self.docs(collection).iter().any(|existing| {
                if ignore_id.is_some() && existing.get("_id") == ignore_id {
                    return false;
                }
                fields
                    .iter()
                    .all(|field| match (existing.get(field), candidate.get(field)) {
                        (Some(a), Some(b)) => bson_eq(a, b),
                        (None, None) => true,
                        _ => false,
                    })
            });
            if clash {
                return Some(format!("{}({})", collection, fields.join(", ")));
            }
        }
        None
    }
}

/// Document store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        let inner = self.read()?;
        for doc in inner.docs(collection) {
            if matches_filter(doc, &filter)? {
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let mut found = Vec::new();
        {
            let inner = self.read()?;
            for doc in inner.docs(collection) {
                if matches_filter(doc, &filter)? {
                    found.push(doc.clone());
                }
            }
        }

        if let Some(sort) = &options.sort {
            sort_documents(&mut found, sort);
        }
        let limit = options
            .limit
            .filter(|limit| *limit > 0)
            .map_or(usize::MAX, |limit| limit as usize);
        let page = found
            .into_iter()
            .skip(options.skip as usize)
            .take(limit);

        Ok(match &options.projection {
            Some(projection) => page.map(|doc| project(&doc, projection)).collect(),
            None => page.collect(),
        })
    }

    async fn count(&self, collection: Collection, filter: Document) -> Result<u64, StoreError> {
        let inner = self.read()?;
        let mut count = 0;
        for doc in inner.docs(collection) {
            if matches_filter(doc, &filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<ObjectId, StoreError> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document
            .get_object_id("_id")
            .map_err(|e| StoreError::InvalidId(e.to_string()))?;

        let mut inner = self.write()?;
        if let Some(index) = inner.unique_violation(collection, &document, None) {
            return Err(StoreError::Duplicate(index));
        }
        inner.docs_mut(collection).push(document);
        Ok(id)
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        set: Document,
    ) -> Result<Option<Document>, StoreError> {
        let key = Bson::ObjectId(id);
        let mut inner = self.write()?;
        let position = match inner
            .docs(collection)
            .iter()
            .position(|doc| doc.get("_id") == Some(&key))
        {
            Some(position) => position,
            None => return Ok(None),
        };

        let mut updated = inner.docs(collection)[position].clone();
        for (field, value) in set {
            updated.insert(field, value);
        }
        if let Some(index) = inner.unique_violation(collection, &updated, Some(&key)) {
            return Err(StoreError::Duplicate(index));
        }
        inner.docs_mut(collection)[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        let key = Bson::ObjectId(id);
        let mut inner = self.write()?;
        let docs = inner.docs_mut(collection);
        Ok(docs
            .iter()
            .position(|doc| doc.get("_id") == Some(&key))
            .map(|position| docs.remove(position)))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        // Holding the write lock across match and removal keeps the check atomic.
        let mut inner = self.write()?;
        let docs = inner.docs_mut(collection);
        let mut target = None;
        for (position, doc) in docs.iter().enumerate() {
            if matches_filter(doc, &filter)? {
                target = Some(position);
                break;
            }
        }
        Ok(target.map(|position| docs.remove(position)))
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Stage>,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.read()?;
        let mut docs: Vec<Document> = inner.docs(collection).to_vec();

        for stage in &pipeline {
            docs = match stage {
                Stage::Match(filter) => {
                    let mut kept = Vec::with_capacity(docs.len());
                    for doc in docs {
                        if matches_filter(&doc, filter)? {
                            kept.push(doc);
                        }
                    }
                    kept
                }
                Stage::Lookup {
                    from,
                    local_field,
                    foreign_field,
                    as_field,
                } => {
                    let foreign = inner.docs(*from);
                    for doc in docs.iter_mut() {
                        let joined = lookup(doc, local_field, foreign, foreign_field);
                        doc.insert(as_field.clone(), joined);
                    }
                    docs
                }
                Stage::Unwind(path) => docs
                    .into_iter()
                    .flat_map(|doc| unwind(doc, path))
                    .collect(),
                Stage::CountOverlap {
                    field,
                    array,
                    values,
                } => {
                    for doc in docs.iter_mut() {
                        let overlap = count_overlap(doc, array, values);
                        doc.insert(field.clone(), overlap);
                    }
                    docs
                }
                Stage::Sort(sort) => {
                    sort_documents(&mut docs, sort);
                    docs
                }
                Stage::Project(projection) => {
                    docs.iter().map(|doc| project(doc, projection)).collect()
                }
                Stage::Skip(n) => docs.into_iter().skip(*n as usize).collect(),
                Stage::Limit(n) => docs.into_iter().take((*n).max(0) as usize).collect(),
                Stage::Count(name) => {
                    if docs.is_empty() {
                        docs
                    } else {
                        let mut counted = Document::new();
                        counted.insert(name.clone(), docs.len() as i64);
                        vec![counted]
                    }
                }
            };
        }

        Ok(docs)
    }

    async fn ensure_unique_index(
        &self,
        collection: Collection,
        fields: &[&str],
    ) -> Result<(), StoreError> {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let mut inner = self.write()?;
        let indexes = inner.unique.entry(collection).or_default();
        if !indexes.contains(&fields) {
            indexes.push(fields);
        }
        Ok(())
    }
}

/// Every value reachable at a dotted path. Arrays along the way are walked
/// element by element; an array at the end of the path yields itself and
/// each of its elements.
pub(crate) fn field_values<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*head) {
            descend(value, rest, &mut out);
        }
    }
    out
}

fn descend<'a>(value: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    if rest.is_empty() {
        out.push(value);
        if let Bson::Array(items) = value {
            out.extend(items.iter());
        }
        return;
    }
    match value {
        Bson::Array(items) => {
            for item in items {
                descend(item, rest, out);
            }
        }
        Bson::Document(inner) => {
            if let Some(next) = inner.get(rest[0]) {
                descend(next, &rest[1..], out);
            }
        }
        _ => {}
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$or" => {
                let mut any = false;
                for sub in sub_filters(key, condition)? {
                    if matches_filter(doc, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$and" => {
                let mut all = true;
                for sub in sub_filters(key, condition)? {
                    if !matches_filter(doc, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            path => condition_matches(&field_values(doc, path), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(operator: &str, condition: &'a Bson) -> Result<Vec<&'a Document>, StoreError> {
    let items = match condition {
        Bson::Array(items) => items,
        _ => return Err(unsupported(operator, "expects an array")),
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => Ok(sub),
            _ => Err(unsupported(operator, "expects documents")),
        })
        .collect()
}

fn condition_matches(values: &[&Bson], condition: &Bson) -> Result<bool, StoreError> {
    match condition {
        Bson::Document(ops) if ops.keys().next().map_or(false, |k| k.starts_with('$')) => {
            let options = ops.get_str("$options").unwrap_or("");
            for (op, arg) in ops {
                let matched = match op.as_str() {
                    "$eq" => values.iter().any(|v| bson_eq(v, arg)),
                    "$ne" => !values.iter().any(|v| bson_eq(v, arg)),
                    "$in" => {
                        let list = array_arg(op, arg)?;
                        values.iter().any(|v| list.iter().any(|a| bson_eq(v, a)))
                    }
                    "$all" => {
                        let list = array_arg(op, arg)?;
                        !list.is_empty()
                            && list.iter().all(|a| values.iter().any(|v| bson_eq(v, a)))
                    }
                    "$exists" => !values.is_empty() == arg.as_bool().unwrap_or(true),
                    "$gt" | "$gte" | "$lt" | "$lte" => values.iter().any(|v| {
                        compare(v, arg).map_or(false, |ordering| match op.as_str() {
                            "$gt" => ordering == Ordering::Greater,
                            "$gte" => ordering != Ordering::Less,
                            "$lt" => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        })
                    }),
                    "$regex" => {
                        let (pattern, flags) = match arg {
                            Bson::String(pattern) => (pattern.as_str(), options),
                            Bson::RegularExpression(re) => (re.pattern.as_str(), re.options.as_str()),
                            _ => return Err(unsupported(op, "expects a string")),
                        };
                        regex_matches(values, pattern, flags)?
                    }
                    "$options" => true,
                    other => return Err(unsupported(other, "is not supported")),
                };
                if !matched {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Bson::RegularExpression(re) => regex_matches(values, &re.pattern, &re.options),
        Bson::Null => Ok(values.is_empty() || values.iter().any(|v| matches!(v, Bson::Null))),
        _ => Ok(values.iter().any(|v| bson_eq(v, condition))),
    }
}

fn regex_matches(values: &[&Bson], pattern: &str, flags: &str) -> Result<bool, StoreError> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .build()
        .map_err(|e| StoreError::Backend(format!("invalid regex: {}", e)))?;
    Ok(values
        .iter()
        .any(|v| matches!(v, Bson::String(s) if re.is_match(s))))
}

fn array_arg<'a>(operator: &str, arg: &'a Bson) -> Result<&'a Vec<Bson>, StoreError> {
    match arg {
        Bson::Array(list) => Ok(list),
        _ => Err(unsupported(operator, "expects an array")),
    }
}

fn unsupported(operator: &str, reason: &str) -> StoreError {
    StoreError::Backend(format!("query operator {} {}", operator, reason))
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Equality with numeric types compared by value.
fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Stable multi-key sort; missing values sort first.
fn sort_documents(docs: &mut [Document], sort: &Document) {
    docs.sort_by(|a, b| {
        for (path, direction) in sort {
            let left = field_values(a, path).first().copied();
            let right = field_values(b, path).first().copied();
            let ordering = match (left, right) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            };
            let descending = as_f64(direction).map_or(false, |d| d < 0.0);
            let ordering = if descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        other => as_f64(other).map_or(true, |n| n != 0.0),
    }
}

fn project(doc: &Document, projection: &Document) -> Document {
    let inclusive = projection
        .iter()
        .any(|(field, flag)| field != "_id" && truthy(flag));

    if inclusive {
        let mut out = Document::new();
        if projection.get("_id").map_or(true, truthy) {
            if let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
        }
        for (field, flag) in projection {
            if field != "_id" && truthy(flag) {
                if let Some(value) = doc.get(field) {
                    out.insert(field.clone(), value.clone());
                }
            }
        }
        out
    } else {
        let mut out = doc.clone();
        for (field, flag) in projection {
            if !truthy(flag) {
                out.remove(field);
            }
        }
        out
    }
}

fn lookup(doc: &Document, local_field: &str, foreign: &[Document], foreign_field: &str) -> Bson {
    let locals = field_values(doc, local_field);
    let joined: Vec<Bson> = foreign
        .iter()
        .filter(|candidate| {
            let remote = field_values(candidate, foreign_field);
            locals
                .iter()
                .any(|local| remote.iter().any(|value| bson_eq(local, value)))
        })
        .map(|candidate| Bson::Document(candidate.clone()))
        .collect();
    Bson::Array(joined)
}

fn unwind(doc: Document, path: &str) -> Vec<Document> {
    match doc.get(path).cloned() {
        Some(Bson::Array(items)) => items
            .into_iter()
            .map(|item| {
                let mut single = doc.clone();
                single.insert(path, item);
                single
            })
            .collect(),
        None | Some(Bson::Null) => Vec::new(),
        Some(_) => vec![doc],
    }
}

fn count_overlap(doc: &Document, array: &str, values: &[Bson]) -> i32 {
    let present = match doc.get(array) {
        Some(Bson::Array(items)) => items,
        _ => return 0,
    };
    let mut seen: Vec<&Bson> = Vec::new();
    for value in values {
        if seen.iter().any(|s| bson_eq(s, value)) {
            continue;
        }
        if present.iter().any(|p| bson_eq(p, value)) {
            seen.push(value);
        }
    }
    seen.len() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        {
            let mut inner = store.inner.write().unwrap();
            let tag_a = ObjectId::new();
            let tag_b = ObjectId::new();
            inner.docs_mut(Collection::Tags).extend([
                doc! { "_id": tag_a, "tagSTR": "action", "deleted": false },
                doc! { "_id": tag_b, "tagSTR": "war", "deleted": false },
            ]);
            inner.docs_mut(Collection::Titles).extend([
                doc! { "_id": ObjectId::new(), "titleSTR": "War and Peace", "tags": [tag_a, tag_b], "deleted": false, "rank": 3 },
                doc! { "_id": ObjectId::new(), "titleSTR": "Peace Treaty", "tags": [tag_a], "deleted": true, "rank": 1 },
                doc! { "_id": ObjectId::new(), "titleSTR": "Space Opera", "tags": [], "deleted": false, "rank": 2 },
            ]);
        }
        store
    }

    #[actix_rt::test]
    async fn test_case_insensitive_regex_match() {
        let store = seeded();
        let found = store
            .find(
                Collection::Titles,
                doc! { "titleSTR": { "$regex": "peace", "$options": "i" } },
                FindOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 2, "Both titles contain 'peace' ignoring case");
    }

    #[actix_rt::test]
    async fn test_equality_matches_array_membership() {
        let store = seeded();
        let tag = store
            .find_one(Collection::Tags, doc! { "tagSTR": "action" })
            .await
            .unwrap()
            .unwrap();
        let id = tag.get_object_id("_id").unwrap();
        let count = store
            .count(Collection::Titles, doc! { "tags": id, "deleted": false })
            .await
            .unwrap();
        assert_eq!(count, 1, "Only the live title references the tag");
    }

    #[actix_rt::test]
    async fn test_all_requires_every_value() {
        let store = seeded();
        let tags = store
            .find(Collection::Tags, doc! {}, FindOptions::default())
            .await
            .unwrap();
        let ids: Vec<Bson> = tags.iter().map(|t| t.get("_id").unwrap().clone()).collect();
        let found = store
            .find(
                Collection::Titles,
                doc! { "tags": { "$all": ids } },
                FindOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("titleSTR").unwrap(), "War and Peace");
    }

    #[actix_rt::test]
    async fn test_find_sorts_pages_and_projects() {
        let store = seeded();
        let found = store
            .find(
                Collection::Titles,
                doc! {},
                FindOptions::page(1, 1)
                    .sort(doc! { "rank": -1 })
                    .projection(doc! { "titleSTR": 1 }),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("titleSTR").unwrap(), "Space Opera");
        assert!(found[0].contains_key("_id"), "_id is kept by inclusion projections");
        assert!(!found[0].contains_key("rank"));
    }

    #[actix_rt::test]
    async fn test_lookup_then_dotted_regex() {
        let store = seeded();
        let found = store
            .aggregate(
                Collection::Titles,
                vec![
                    Stage::Match(doc! { "deleted": false }),
                    Stage::lookup(Collection::Tags, "tags", "_id", "tags"),
                    Stage::Match(doc! { "tags.tagSTR": { "$regex": "WAR", "$options": "i" } }),
                ],
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let joined = found[0].get_array("tags").unwrap();
        assert_eq!(joined.len(), 2, "Lookup joins every referenced tag");
    }

    #[actix_rt::test]
    async fn test_count_stage_is_empty_without_matches() {
        let store = seeded();
        let counted = store
            .aggregate(
                Collection::Titles,
                vec![
                    Stage::Match(doc! { "titleSTR": "missing" }),
                    Stage::Count("total".to_string()),
                ],
            )
            .await
            .unwrap();
        assert!(counted.is_empty());
    }

    #[actix_rt::test]
    async fn test_unique_index_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .ensure_unique_index(Collection::Reviews, &["owner", "product"])
            .await
            .unwrap();
        let owner = ObjectId::new();
        let product = ObjectId::new();
        store
            .insert(Collection::Reviews, doc! { "owner": owner, "product": product, "score": 5 })
            .await
            .unwrap();
        let second = store
            .insert(Collection::Reviews, doc! { "owner": owner, "product": product, "score": 7 })
            .await;
        assert!(matches!(second, Err(StoreError::Duplicate(_))));

        let other_product = store
            .insert(
                Collection::Reviews,
                doc! { "owner": owner, "product": ObjectId::new(), "score": 7 },
            )
            .await;
        assert!(other_product.is_ok(), "Index covers the pair, not each field");
    }

    #[actix_rt::test]
    async fn test_update_applies_set_and_returns_document() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Tags, doc! { "tagSTR": "old", "deleted": false })
            .await
            .unwrap();
        let updated = store
            .update_by_id(Collection::Tags, id, doc! { "deleted": true })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get_str("tagSTR").unwrap(), "old");
        assert!(updated.get_bool("deleted").unwrap());

        let missing = store
            .update_by_id(Collection::Tags, ObjectId::new(), doc! { "deleted": true })
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[actix_rt::test]
    async fn test_conditional_delete_checks_filter() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Tags, doc! { "tagSTR": "x", "deleted": false })
            .await
            .unwrap();
        let removed = store
            .delete_one(Collection::Tags, doc! { "_id": id, "deleted": true })
            .await
            .unwrap();
        assert!(removed.is_none(), "Live record must not be removed");
        assert!(store.exists(Collection::Tags, doc! { "_id": id }).await.unwrap());
    }

    #[actix_rt::test]
    async fn test_date_comparison() {
        let store = MemoryStore::new();
        let old = bson::DateTime::from_millis(1_000);
        let new = bson::DateTime::from_millis(9_000);
        store
            .insert(Collection::Users, doc! { "username": "old", "updatedAt": old })
            .await
            .unwrap();
        store
            .insert(Collection::Users, doc! { "username": "new", "updatedAt": new })
            .await
            .unwrap();
        let cutoff = bson::DateTime::from_millis(5_000);
        let found = store
            .find(
                Collection::Users,
                doc! { "updatedAt": { "$lt": cutoff } },
                FindOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("username").unwrap(), "old");
    }
}
