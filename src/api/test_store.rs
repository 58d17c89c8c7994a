//! Implements the `Store` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets (see `GSHEETX_IN_TEST_MODE`).

use crate::api::{spreadsheet_id_from_url, Store};
use crate::error::Res;
use crate::model::{
    CellRef, Grid, InputMode, RenderMode, Spreadsheet, SpreadsheetRef, Worksheet,
};
use anyhow::{anyhow, bail, Context};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use uuid::Uuid;

/// The id of the `Budget` spreadsheet every shared test state starts with, so that
/// `--url https://docs.google.com/spreadsheets/d/gsheetx-test-budget` works in test mode.
pub(crate) const TEST_SPREADSHEET_ID: &str = "gsheetx-test-budget";

/// States shared by every `TestStore` created with the same key.
static SHARED: LazyLock<Mutex<HashMap<String, Arc<Mutex<TestState>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The store operations, used to record calls and to inject failures.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) enum Op {
    Resolve,
    List,
    GetOrCreate,
    Read,
    Write,
    Duplicate,
    Delete,
    Index,
}

impl Op {
    /// Whether the operation can change the spreadsheet.
    #[cfg(test)]
    pub(crate) fn is_mutation(self) -> bool {
        matches!(self, Op::GetOrCreate | Op::Write | Op::Duplicate | Op::Delete)
    }
}

/// Makes the `nth` call (1-based) of `op` fail.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct FailOn {
    pub(crate) op: Op,
    pub(crate) nth: usize,
}

/// A worksheet held in memory. `structure` stands in for everything that is not a value
/// (formatting, validation, ...) so that tests can see where a worksheet was copied from.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct TestWorksheet {
    pub(crate) sheet_id: i64,
    pub(crate) title: String,
    pub(crate) grid: Grid,
    pub(crate) structure: String,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct TestSpreadsheet {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) folder: Option<String>,
    pub(crate) worksheets: Vec<TestWorksheet>,
}

impl TestSpreadsheet {
    fn url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}/edit", self.id)
    }

    fn handle(&self) -> Spreadsheet {
        Spreadsheet {
            id: self.id.clone(),
            title: self.title.clone(),
            url: self.url(),
        }
    }

    fn worksheet_handle(&self, position: usize) -> Worksheet {
        let ws = &self.worksheets[position];
        Worksheet {
            spreadsheet_id: self.id.clone(),
            sheet_id: ws.sheet_id,
            title: ws.title.clone(),
            index: position,
        }
    }

    fn position_of(&self, sheet_id: i64) -> Option<usize> {
        self.worksheets.iter().position(|w| w.sheet_id == sheet_id)
    }
}

/// Everything a `TestStore` knows: the spreadsheets, the calls made so far (with the modes that
/// reads and writes were given), and any failure or hang that a test has asked for.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct TestState {
    pub(crate) spreadsheets: Vec<TestSpreadsheet>,
    pub(crate) calls: Vec<Op>,
    pub(crate) renders: Vec<RenderMode>,
    pub(crate) inputs: Vec<InputMode>,
    pub(crate) fail_on: Option<FailOn>,
    pub(crate) hang_on: Option<Op>,
    next_sheet_id: i64,
}

impl TestState {
    /// A state holding the `Budget` spreadsheet (`TEST_SPREADSHEET_ID`) with `Tmpl` (no values,
    /// structure "template"), `Jan` and `Feb`.
    pub(crate) fn with_default_data() -> Self {
        let mut state = Self::default();
        state.insert(
            TEST_SPREADSHEET_ID,
            "Budget",
            &[
                ("Tmpl", Grid::new(), "template"),
                ("Jan", rows(&[&["item", "amount"], &["rent", "900"]]), "old"),
                ("Feb", rows(&[&["item", "amount"], &["food", "-12.5"]]), "old"),
            ],
        );
        state
    }

    /// Adds a spreadsheet named `name` holding `worksheets` as (title, grid, structure), in order.
    /// Returns the new spreadsheet's id.
    #[cfg(test)]
    pub(crate) fn seed(&mut self, name: &str, worksheets: &[(&str, Grid, &str)]) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.insert(&id, name, worksheets);
        id
    }

    fn insert(&mut self, id: &str, name: &str, worksheets: &[(&str, Grid, &str)]) {
        let worksheets = worksheets
            .iter()
            .map(|(title, grid, structure)| TestWorksheet {
                sheet_id: self.next_id(),
                title: title.to_string(),
                grid: grid.clone(),
                structure: structure.to_string(),
            })
            .collect();
        self.spreadsheets.push(TestSpreadsheet {
            id: id.to_string(),
            title: name.to_string(),
            folder: None,
            worksheets,
        });
    }

    pub(crate) fn spreadsheet(&self, id: &str) -> Option<&TestSpreadsheet> {
        self.spreadsheets.iter().find(|s| s.id == id)
    }

    fn spreadsheet_mut(&mut self, id: &str) -> Res<&mut TestSpreadsheet> {
        self.spreadsheets
            .iter_mut()
            .find(|s| s.id == id)
            .with_context(|| format!("Spreadsheet '{id}' not found"))
    }

    /// The worksheet titles of spreadsheet `id`, in order.
    #[cfg(test)]
    pub(crate) fn titles(&self, id: &str) -> Vec<String> {
        self.spreadsheet(id)
            .map(|s| s.worksheets.iter().map(|w| w.title.clone()).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn worksheet(&self, id: &str, title: &str) -> Option<&TestWorksheet> {
        self.spreadsheet(id)?
            .worksheets
            .iter()
            .find(|w| w.title == title)
    }

    /// The number of recorded calls that can change a spreadsheet.
    #[cfg(test)]
    pub(crate) fn mutation_count(&self) -> usize {
        self.calls.iter().filter(|op| op.is_mutation()).count()
    }

    pub(crate) fn count(&self, op: Op) -> usize {
        self.calls.iter().filter(|o| **o == op).count()
    }

    fn next_id(&mut self) -> i64 {
        self.next_sheet_id += 1;
        self.next_sheet_id
    }

    /// Records `op`, returning an error if a failure was injected for this call.
    fn record(&mut self, op: Op) -> Res<()> {
        self.calls.push(op);
        if let Some(fail_on) = self.fail_on {
            if fail_on.op == op && self.count(op) == fail_on.nth {
                bail!("Simulated store failure on {op:?} call #{}", fail_on.nth);
            }
        }
        Ok(())
    }
}

fn rows(values: &[&[&str]]) -> Grid {
    values
        .iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// An implementation of the `Store` trait that does not use Google sheets.
#[derive(Debug, Clone)]
pub(crate) struct TestStore {
    state: Arc<Mutex<TestState>>,
}

impl TestStore {
    pub(crate) fn new(state: Arc<Mutex<TestState>>) -> Self {
        Self { state }
    }

    /// Returns a store whose state is shared with every other store created with `key`. The first
    /// store for a key starts from `TestState::with_default_data`.
    pub(crate) fn shared(key: &str) -> Res<Self> {
        let mut shared = SHARED
            .lock()
            .map_err(|_| anyhow!("The shared test store lock is poisoned"))?;
        let state = shared
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TestState::with_default_data())))
            .clone();
        Ok(Self::new(state))
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> Arc<Mutex<TestState>> {
        self.state.clone()
    }

    fn lock(&self) -> Res<MutexGuard<'_, TestState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("The test store lock is poisoned"))
    }

    /// Records the call and then waits forever if a hang was requested for `op`.
    async fn begin(&self, op: Op) -> Res<()> {
        let hang = {
            let mut state = self.lock()?;
            state.record(op)?;
            state.hang_on == Some(op)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for TestStore {
    async fn resolve_spreadsheet(&mut self, target: &SpreadsheetRef) -> Res<Spreadsheet> {
        self.begin(Op::Resolve).await?;
        let mut state = self.lock()?;
        match target {
            SpreadsheetRef::Url(url) => {
                let id = spreadsheet_id_from_url(url)?;
                state
                    .spreadsheet(id)
                    .map(TestSpreadsheet::handle)
                    .with_context(|| format!("Spreadsheet '{url}' not found"))
            }
            SpreadsheetRef::Name { name, folder } => {
                if let Some(existing) = state.spreadsheets.iter().find(|s| &s.title == name) {
                    return Ok(existing.handle());
                }
                if folder.as_deref().is_some_and(|f| f.trim().is_empty()) {
                    bail!("Folder '' not found");
                }
                let sheet_id = state.next_id();
                let created = TestSpreadsheet {
                    id: Uuid::new_v4().simple().to_string(),
                    title: name.clone(),
                    folder: folder.clone(),
                    worksheets: vec![TestWorksheet {
                        sheet_id,
                        title: "Sheet1".to_string(),
                        ..TestWorksheet::default()
                    }],
                };
                let handle = created.handle();
                state.spreadsheets.push(created);
                Ok(handle)
            }
        }
    }

    async fn list_worksheets(&mut self, spreadsheet: &Spreadsheet) -> Res<Vec<Worksheet>> {
        self.begin(Op::List).await?;
        let mut state = self.lock()?;
        let ss = state.spreadsheet_mut(&spreadsheet.id)?;
        Ok((0..ss.worksheets.len())
            .map(|ix| ss.worksheet_handle(ix))
            .collect())
    }

    async fn get_or_create_worksheet(
        &mut self,
        spreadsheet: &Spreadsheet,
        title: &str,
    ) -> Res<Worksheet> {
        self.begin(Op::GetOrCreate).await?;
        let mut state = self.lock()?;
        let sheet_id = state.next_id();
        let ss = state.spreadsheet_mut(&spreadsheet.id)?;
        if let Some(position) = ss.worksheets.iter().position(|w| w.title == title) {
            return Ok(ss.worksheet_handle(position));
        }
        ss.worksheets.push(TestWorksheet {
            sheet_id,
            title: title.to_string(),
            ..TestWorksheet::default()
        });
        Ok(ss.worksheet_handle(ss.worksheets.len() - 1))
    }

    async fn read_grid(&mut self, worksheet: &Worksheet, render: RenderMode) -> Res<Grid> {
        self.begin(Op::Read).await?;
        let mut state = self.lock()?;
        state.renders.push(render);
        let ss = state.spreadsheet_mut(&worksheet.spreadsheet_id)?;
        let position = ss
            .position_of(worksheet.sheet_id)
            .with_context(|| format!("Worksheet '{}' not found", worksheet.title))?;
        Ok(ss.worksheets[position].grid.clone())
    }

    async fn write_grid(
        &mut self,
        worksheet: &Worksheet,
        grid: &Grid,
        anchor: CellRef,
        input: InputMode,
    ) -> Res<()> {
        self.begin(Op::Write).await?;
        let mut state = self.lock()?;
        state.inputs.push(input);
        let ss = state.spreadsheet_mut(&worksheet.spreadsheet_id)?;
        let position = ss
            .position_of(worksheet.sheet_id)
            .with_context(|| format!("Worksheet '{}' not found", worksheet.title))?;
        let target = &mut ss.worksheets[position].grid;
        for (r, row) in grid.iter().enumerate() {
            let row_ix = anchor.row + r;
            if target.len() <= row_ix {
                target.resize_with(row_ix + 1, Vec::new);
            }
            let target_row = &mut target[row_ix];
            for (c, value) in row.iter().enumerate() {
                let col_ix = anchor.col + c;
                if target_row.len() <= col_ix {
                    target_row.resize(col_ix + 1, String::new());
                }
                target_row[col_ix] = value.clone();
            }
        }
        Ok(())
    }

    async fn duplicate_worksheet(
        &mut self,
        worksheet: &Worksheet,
        new_title: &str,
        index: usize,
    ) -> Res<Worksheet> {
        self.begin(Op::Duplicate).await?;
        let mut state = self.lock()?;
        let sheet_id = state.next_id();
        let ss = state.spreadsheet_mut(&worksheet.spreadsheet_id)?;
        if ss.worksheets.iter().any(|w| w.title == new_title) {
            bail!("A sheet with the name \"{new_title}\" already exists");
        }
        let position = ss
            .position_of(worksheet.sheet_id)
            .with_context(|| format!("Worksheet '{}' not found", worksheet.title))?;
        let copy = TestWorksheet {
            sheet_id,
            title: new_title.to_string(),
            ..ss.worksheets[position].clone()
        };
        let index = index.min(ss.worksheets.len());
        ss.worksheets.insert(index, copy);
        Ok(ss.worksheet_handle(index))
    }

    async fn delete_worksheet(&mut self, worksheet: &Worksheet) -> Res<()> {
        self.begin(Op::Delete).await?;
        let mut state = self.lock()?;
        let ss = state.spreadsheet_mut(&worksheet.spreadsheet_id)?;
        let position = ss
            .position_of(worksheet.sheet_id)
            .with_context(|| format!("Worksheet '{}' not found", worksheet.title))?;
        if ss.worksheets.len() == 1 {
            bail!("You can't remove all the sheets in a document");
        }
        ss.worksheets.remove(position);
        Ok(())
    }

    async fn worksheet_index(&mut self, worksheet: &Worksheet) -> Res<usize> {
        self.begin(Op::Index).await?;
        let mut state = self.lock()?;
        state
            .spreadsheet_mut(&worksheet.spreadsheet_id)?
            .position_of(worksheet.sheet_id)
            .with_context(|| format!("Worksheet '{}' not found", worksheet.title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: &[&[&str]]) -> Grid {
        rows(values)
    }

    fn seeded() -> (TestStore, Spreadsheet) {
        let mut state = TestState::default();
        let id = state.seed(
            "Book",
            &[
                ("Tmpl", Grid::new(), "template"),
                ("Jan", grid(&[&["a", "b"]]), ""),
            ],
        );
        let store = TestStore::new(Arc::new(Mutex::new(state)));
        let ss = store.lock().unwrap().spreadsheet(&id).unwrap().handle();
        (store, ss)
    }

    #[tokio::test]
    async fn test_resolve_by_name_creates_once() {
        let mut store = TestStore::new(Arc::default());
        let target = SpreadsheetRef::Name {
            name: "New".into(),
            folder: Some("F1".into()),
        };
        let first = store.resolve_spreadsheet(&target).await.unwrap();
        let second = store.resolve_spreadsheet(&target).await.unwrap();
        assert_eq!(first, second);
        let state = store.state();
        let state = state.lock().unwrap();
        assert_eq!(state.spreadsheets.len(), 1);
        assert_eq!(state.spreadsheets[0].folder.as_deref(), Some("F1"));
        assert_eq!(state.titles(&first.id), vec!["Sheet1".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_unknown_url_fails() {
        let mut store = TestStore::new(Arc::default());
        let target = SpreadsheetRef::Url("https://docs.google.com/spreadsheets/d/nope/edit".into());
        assert!(store.resolve_spreadsheet(&target).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_and_delete_reindex() {
        let (mut store, ss) = seeded();
        let jan = store.get_or_create_worksheet(&ss, "Jan").await.unwrap();
        let copy = store.duplicate_worksheet(&jan, "Jan copy", 0).await.unwrap();
        assert_eq!(copy.index, 0);
        assert_eq!(store.worksheet_index(&jan).await.unwrap(), 2);

        let dup = store.duplicate_worksheet(&jan, "Jan copy", 5).await;
        assert!(dup.unwrap_err().to_string().contains("already exists"));

        store.delete_worksheet(&copy).await.unwrap();
        assert_eq!(store.worksheet_index(&jan).await.unwrap(), 1);
        let grid_read = store.read_grid(&jan, RenderMode::Formatted).await.unwrap();
        assert_eq!(grid_read, grid(&[&["a", "b"]]));
    }

    #[tokio::test]
    async fn test_write_grid_at_anchor_extends() {
        let (mut store, ss) = seeded();
        let jan = store.get_or_create_worksheet(&ss, "Jan").await.unwrap();
        store
            .write_grid(&jan, &grid(&[&["x"], &["y", "z"]]), "B2".parse().unwrap(), InputMode::Raw)
            .await
            .unwrap();
        let read = store.read_grid(&jan, RenderMode::Formatted).await.unwrap();
        assert_eq!(read, grid(&[&["a", "b"], &["", "x"], &["", "y", "z"]]));
    }

    #[tokio::test]
    async fn test_get_or_create_appends_empty() {
        let (mut store, ss) = seeded();
        let new = store.get_or_create_worksheet(&ss, "New").await.unwrap();
        assert_eq!(new.index, 2);
        let read = store.read_grid(&new, RenderMode::Formatted).await.unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_and_call_counts() {
        let (mut store, ss) = seeded();
        store.lock().unwrap().fail_on = Some(FailOn {
            op: Op::List,
            nth: 2,
        });
        assert!(store.list_worksheets(&ss).await.is_ok());
        assert!(store.list_worksheets(&ss).await.is_err());
        assert!(store.list_worksheets(&ss).await.is_ok());
        let state = store.lock().unwrap();
        assert_eq!(state.count(Op::List), 3);
        assert_eq!(state.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_state_by_key() {
        let key = Uuid::new_v4().to_string();
        let mut a = TestStore::shared(&key).unwrap();
        let b = TestStore::shared(&key).unwrap();
        let target = SpreadsheetRef::Name {
            name: "Shared".into(),
            folder: None,
        };
        a.resolve_spreadsheet(&target).await.unwrap();
        assert_eq!(b.lock().unwrap().spreadsheets.len(), 2);
    }

    #[tokio::test]
    async fn test_shared_state_starts_with_default_data() {
        let mut store = TestStore::shared(&Uuid::new_v4().to_string()).unwrap();
        let target = SpreadsheetRef::Url(format!(
            "https://docs.google.com/spreadsheets/d/{TEST_SPREADSHEET_ID}/edit"
        ));
        let ss = store.resolve_spreadsheet(&target).await.unwrap();
        assert_eq!(ss.title, "Budget");
        let titles: Vec<String> = store
            .list_worksheets(&ss)
            .await
            .unwrap()
            .into_iter()
            .map(|ws| ws.title)
            .collect();
        assert_eq!(titles, vec!["Tmpl", "Jan", "Feb"]);
    }

    #[tokio::test]
    async fn test_modes_are_recorded() {
        let (mut store, ss) = seeded();
        let jan = store.get_or_create_worksheet(&ss, "Jan").await.unwrap();
        store.read_grid(&jan, RenderMode::Formula).await.unwrap();
        store
            .write_grid(&jan, &grid(&[&["x"]]), CellRef::origin(), InputMode::UserEntered)
            .await
            .unwrap();
        let state = store.lock().unwrap();
        assert_eq!(state.renders, vec![RenderMode::Formula]);
        assert_eq!(state.inputs, vec![InputMode::UserEntered]);
    }
}
