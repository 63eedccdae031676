//! In-process backend for tests.
//!
//! Mirrors the row-level security rules of the hosted schema: a note is
//! readable when it is public or owned by the principal, a sentence is
//! readable when its note is, and only owners may insert, update or delete.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::backend::{
    BackendError, BackendResult, Filter, Principal, RemoteBackend, SelectQuery, SelectResult,
    Table,
};

/// Kind of backend call, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug)]
struct PlannedFailure {
    operation: Operation,
    table: Table,
    remaining: usize,
    message: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    notes: Vec<Value>,
    sentences: Vec<Value>,
    principal: Option<Principal>,
    failures: Vec<PlannedFailure>,
    last_timestamp: Option<DateTime<Utc>>,
    calls: HashMap<(Table, Operation), usize>,
}

impl MemoryState {
    const fn rows(&self, table: Table) -> &Vec<Value> {
        match table {
            Table::Notes => &self.notes,
            Table::Sentences => &self.sentences,
        }
    }

    fn rows_mut(&mut self, table: Table) -> &mut Vec<Value> {
        match table {
            Table::Notes => &mut self.notes,
            Table::Sentences => &mut self.sentences,
        }
    }

    /// Strictly increasing timestamps, fixed-width so they sort as text.
    fn tick(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn record_call(&mut self, operation: Operation, table: Table) -> BackendResult<()> {
        *self.calls.entry((table, operation)).or_default() += 1;

        let position = self
            .failures
            .iter()
            .position(|plan| plan.operation == operation && plan.table == table);
        let Some(position) = position else {
            return Ok(());
        };
        let plan = &mut self.failures[position];
        plan.remaining = plan.remaining.saturating_sub(1);
        if plan.remaining == 0 {
            let plan = self.failures.remove(position);
            return Err(BackendError::Api(plan.message));
        }
        Ok(())
    }

    fn principal_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|principal| principal.id.as_str())
    }

    fn owns(&self, row: &Value) -> bool {
        match (self.principal_id(), row.get("created_by").and_then(Value::as_str)) {
            (Some(user), Some(owner)) => user == owner,
            _ => false,
        }
    }

    fn note_by_id(&self, id: &Value) -> Option<&Value> {
        self.notes.iter().find(|note| note.get("id") == Some(id))
    }

    fn note_visible(&self, note: &Value) -> bool {
        note.get("is_public").and_then(Value::as_bool) == Some(true) || self.owns(note)
    }

    fn visible(&self, table: Table, row: &Value) -> bool {
        match table {
            Table::Notes => self.note_visible(row),
            Table::Sentences => row
                .get("note_id")
                .and_then(|note_id| self.note_by_id(note_id))
                .is_some_and(|note| self.note_visible(note)),
        }
    }

    fn writable(&self, table: Table, row: &Value) -> bool {
        match table {
            Table::Notes => self.owns(row),
            Table::Sentences => {
                self.owns(row)
                    || row
                        .get("note_id")
                        .and_then(|note_id| self.note_by_id(note_id))
                        .is_some_and(|note| self.owns(note))
            }
        }
    }
}

/// Backend that keeps both tables in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with `user_id` already signed in.
    #[must_use]
    pub fn signed_in(user_id: &str) -> Self {
        let backend = Self::new();
        backend.set_principal(Some(Principal {
            id: user_id.to_string(),
            email: None,
        }));
        backend
    }

    pub fn set_principal(&self, principal: Option<Principal>) {
        self.lock().principal = principal;
    }

    /// Make the `nth` upcoming call of `operation` on `table` fail with `message`.
    ///
    /// `nth` is one-based: `1` fails the very next matching call.
    pub fn fail_on(&self, operation: Operation, table: Table, nth: usize, message: &str) {
        self.lock().failures.push(PlannedFailure {
            operation,
            table,
            remaining: nth.max(1),
            message: message.to_string(),
        });
    }

    /// Insert a row as-is, bypassing ownership checks.
    pub fn seed(&self, table: Table, row: Value) {
        self.lock().rows_mut(table).push(row);
    }

    /// Every stored row, ignoring visibility.
    #[must_use]
    pub fn all_rows(&self, table: Table) -> Vec<Value> {
        self.lock().rows(table).clone()
    }

    /// Number of calls of `operation` made on `table` so far.
    #[must_use]
    pub fn call_count(&self, operation: Operation, table: Table) -> usize {
        self.lock()
            .calls
            .get(&(table, operation))
            .copied()
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn select_rows(&self, table: Table, query: &SelectQuery) -> BackendResult<SelectResult> {
        let mut state = self.lock();
        state.record_call(Operation::Select, table)?;

        let mut rows = state
            .rows(table)
            .iter()
            .filter(|row| state.visible(table, row))
            .filter(|row| query.filters.iter().all(|filter| filter.matches(row)))
            .cloned()
            .collect::<Vec<_>>();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let total = query.count.then_some(rows.len());
        if query.head {
            return Ok(SelectResult {
                rows: Vec::new(),
                total,
            });
        }
        if let Some(range) = query.range {
            rows = rows.into_iter().skip(range.offset).take(range.limit).collect();
        }
        if let Some(related) = query.embed_count {
            if table != Table::Notes || related != Table::Sentences {
                return Err(BackendError::Api(format!(
                    "no relationship between {} and {}",
                    table.name(),
                    related.name()
                )));
            }
            for row in &mut rows {
                let count = row.get("id").map_or(0, |id| {
                    state
                        .sentences
                        .iter()
                        .filter(|sentence| sentence.get("note_id") == Some(id))
                        .filter(|sentence| state.visible(Table::Sentences, sentence))
                        .count()
                });
                if let Value::Object(fields) = row {
                    fields.insert(
                        related.name().to_string(),
                        serde_json::json!([{ "count": count }]),
                    );
                }
            }
        }
        Ok(SelectResult { rows, total })
    }

    async fn insert_rows(&self, table: Table, rows: Vec<Value>) -> BackendResult<Vec<Value>> {
        let mut state = self.lock();
        state.record_call(Operation::Insert, table)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut fields) = row else {
                return Err(BackendError::Api("row must be a JSON object".to_string()));
            };
            if !state.writable(table, &Value::Object(fields.clone())) {
                return Err(BackendError::Api(format!(
                    "new row violates row-level security policy for table \"{}\"",
                    table.name()
                )));
            }
            let now = state.tick();
            fields
                .entry("id")
                .or_insert_with(|| Value::String(Uuid::now_v7().to_string()));
            fields
                .entry("created_at")
                .or_insert_with(|| Value::String(now.clone()));
            fields.insert("updated_at".to_string(), Value::String(now));
            apply_column_defaults(table, &mut fields);
            stored.push(Value::Object(fields));
        }
        state.rows_mut(table).extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update_rows(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> BackendResult<Vec<Value>> {
        let mut state = self.lock();
        state.record_call(Operation::Update, table)?;

        let Value::Object(patch) = patch else {
            return Err(BackendError::Api("patch must be a JSON object".to_string()));
        };
        let targets = state
            .rows(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| filters.iter().all(|filter| filter.matches(row)))
            .filter(|(_, row)| state.writable(table, row))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        let mut updated = Vec::with_capacity(targets.len());
        for index in targets {
            let now = state.tick();
            let row = &mut state.rows_mut(table)[index];
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
                fields.insert("updated_at".to_string(), Value::String(now));
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete_rows(&self, table: Table, filters: &[Filter]) -> BackendResult<Vec<Value>> {
        let mut state = self.lock();
        state.record_call(Operation::Delete, table)?;

        let (deleted, kept): (Vec<Value>, Vec<Value>) =
            state.rows(table).iter().cloned().partition(|row| {
                filters.iter().all(|filter| filter.matches(row)) && state.writable(table, row)
            });
        *state.rows_mut(table) = kept;

        if table == Table::Notes {
            let removed_ids = deleted
                .iter()
                .filter_map(|row| row.get("id").cloned())
                .collect::<Vec<_>>();
            state.sentences.retain(|sentence| {
                !sentence
                    .get("note_id")
                    .is_some_and(|note_id| removed_ids.contains(note_id))
            });
        }
        Ok(deleted)
    }

    fn principal(&self) -> Option<Principal> {
        self.lock().principal.clone()
    }
}

fn apply_column_defaults(table: Table, fields: &mut Map<String, Value>) {
    match table {
        Table::Notes => {
            fields
                .entry("is_public")
                .or_insert(Value::Bool(false));
        }
        Table::Sentences => {
            fields.entry("description").or_insert(Value::Null);
            fields
                .entry("mastery_level")
                .or_insert_with(|| Value::from(1));
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_fills_server_columns() {
        let backend = MemoryBackend::signed_in("alice");
        let rows = backend
            .insert_rows(
                Table::Notes,
                vec![json!({ "title": "Idioms", "created_by": "alice" })],
            )
            .await
            .unwrap();
        let row = &rows[0];
        assert!(row["id"].is_string());
        assert_eq!(row["is_public"], json!(false));
        assert_eq!(row["created_at"], row["updated_at"]);
    }

    #[tokio::test]
    async fn insert_for_someone_else_is_rejected() {
        let backend = MemoryBackend::signed_in("alice");
        let error = backend
            .insert_rows(Table::Notes, vec![json!({ "title": "x", "created_by": "bob" })])
            .await
            .unwrap_err();
        assert!(error.to_string().contains("row-level security"));
    }

    #[tokio::test]
    async fn non_owner_update_affects_zero_rows() {
        let backend = MemoryBackend::signed_in("bob");
        backend.seed(
            Table::Notes,
            json!({ "id": "n1", "title": "Public", "is_public": true, "created_by": "alice" }),
        );
        let updated = backend
            .update_rows(Table::Notes, &[Filter::eq("id", "n1")], json!({ "title": "Mine" }))
            .await
            .unwrap();
        assert!(updated.is_empty());

        let visible = backend
            .select_rows(Table::Notes, &SelectQuery::new())
            .await
            .unwrap();
        assert_eq!(visible.rows.len(), 1);
    }

    #[tokio::test]
    async fn private_notes_are_hidden_from_others() {
        let backend = MemoryBackend::signed_in("bob");
        backend.seed(
            Table::Notes,
            json!({ "id": "n1", "title": "Secret", "is_public": false, "created_by": "alice" }),
        );
        let result = backend
            .select_rows(Table::Notes, &SelectQuery::new().with_count())
            .await
            .unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.total, Some(0));
    }

    #[tokio::test]
    async fn deleting_note_cascades() {
        let backend = MemoryBackend::signed_in("alice");
        let note = backend
            .insert_rows(Table::Notes, vec![json!({ "title": "n", "created_by": "alice" })])
            .await
            .unwrap()
            .remove(0);
        backend
            .insert_rows(
                Table::Sentences,
                vec![json!({ "note_id": note["id"], "title": "s", "created_by": "alice" })],
            )
            .await
            .unwrap();

        let deleted = backend
            .delete_rows(Table::Notes, &[Filter::Eq("id".into(), note["id"].clone())])
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(backend.all_rows(Table::Sentences).is_empty());
    }

    #[tokio::test]
    async fn planned_failure_hits_the_nth_call() {
        let backend = MemoryBackend::signed_in("alice");
        backend.fail_on(Operation::Insert, Table::Notes, 2, "boom");
        let row = || vec![json!({ "title": "n", "created_by": "alice" })];

        assert!(backend.insert_rows(Table::Notes, row()).await.is_ok());
        let error = backend.insert_rows(Table::Notes, row()).await.unwrap_err();
        assert_eq!(error.to_string(), "boom");
        assert!(backend.insert_rows(Table::Notes, row()).await.is_ok());
        assert_eq!(backend.call_count(Operation::Insert, Table::Notes), 3);
    }

    #[tokio::test]
    async fn embedded_count_only_sees_visible_sentences() {
        let backend = MemoryBackend::signed_in("alice");
        backend.seed(
            Table::Notes,
            json!({ "id": "n1", "title": "Mine", "is_public": false, "created_by": "alice" }),
        );
        backend.seed(Table::Notes, json!({ "id": "n2", "title": "Empty", "created_by": "alice" }));
        for title in ["a", "b"] {
            backend.seed(
                Table::Sentences,
                json!({ "note_id": "n1", "title": title, "created_by": "alice" }),
            );
        }

        let query = SelectQuery::new().count_related(Table::Sentences);
        let rows = backend.select_rows(Table::Notes, &query).await.unwrap().rows;
        assert_eq!(rows[0]["sentences"], json!([{ "count": 2 }]));
        assert_eq!(rows[1]["sentences"], json!([{ "count": 0 }]));

        let error = backend
            .select_rows(Table::Sentences, &query)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("no relationship"));
    }

    #[tokio::test]
    async fn ranged_select_reports_exact_total() {
        let backend = MemoryBackend::signed_in("alice");
        for i in 0..5 {
            backend
                .insert_rows(
                    Table::Notes,
                    vec![json!({ "title": format!("n{i}"), "created_by": "alice" })],
                )
                .await
                .unwrap();
        }
        let query = SelectQuery::new()
            .order_desc("updated_at")
            .range(1, 2)
            .with_count();
        let result = backend.select_rows(Table::Notes, &query).await.unwrap();
        assert_eq!(result.total, Some(5));
        let titles = result
            .rows
            .iter()
            .map(|row| row["title"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["n3", "n2"]);
    }
}
