//! Wraps a `Store` so that every call has a deadline and a classified error.

use crate::api::Store;
use crate::error::{Error, ErrorType, IntoResult, Res};
use crate::model::{CellRef, Grid, InputMode, RenderMode, Spreadsheet, SpreadsheetRef, Worksheet};
use crate::Result;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// A `Store` whose calls fail with `ErrorType::Timeout` when they take longer than `timeout`, and
/// with `ErrorType::Remote` when the store itself fails. Resolving a spreadsheet fails with
/// `ErrorType::NotFound` instead.
pub(crate) struct TimedStore {
    inner: Box<dyn Store>,
    timeout: Duration,
}

impl TimedStore {
    pub(crate) fn new(inner: Box<dyn Store>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub(crate) async fn resolve_spreadsheet(&mut self, target: &SpreadsheetRef) -> Result<Spreadsheet> {
        let timeout = self.timeout;
        timed(timeout, "resolve spreadsheet", self.inner.resolve_spreadsheet(target))
            .await
            .map_err(|e| match e.error_type() {
                ErrorType::Remote => e.with_type(ErrorType::NotFound),
                _ => e,
            })
    }

    pub(crate) async fn list_worksheets(&mut self, spreadsheet: &Spreadsheet) -> Result<Vec<Worksheet>> {
        let timeout = self.timeout;
        timed(timeout, "list worksheets", self.inner.list_worksheets(spreadsheet)).await
    }

    pub(crate) async fn get_or_create_worksheet(
        &mut self,
        spreadsheet: &Spreadsheet,
        title: &str,
    ) -> Result<Worksheet> {
        let timeout = self.timeout;
        timed(
            timeout,
            "get or create worksheet",
            self.inner.get_or_create_worksheet(spreadsheet, title),
        )
        .await
    }

    pub(crate) async fn read_grid(&mut self, worksheet: &Worksheet, render: RenderMode) -> Result<Grid> {
        let timeout = self.timeout;
        timed(timeout, "read grid", self.inner.read_grid(worksheet, render)).await
    }

    pub(crate) async fn write_grid(
        &mut self,
        worksheet: &Worksheet,
        grid: &Grid,
        anchor: CellRef,
        input: InputMode,
    ) -> Result<()> {
        let timeout = self.timeout;
        timed(
            timeout,
            "write grid",
            self.inner.write_grid(worksheet, grid, anchor, input),
        )
        .await
    }

    pub(crate) async fn duplicate_worksheet(
        &mut self,
        worksheet: &Worksheet,
        new_title: &str,
        index: usize,
    ) -> Result<Worksheet> {
        let timeout = self.timeout;
        timed(
            timeout,
            "duplicate worksheet",
            self.inner.duplicate_worksheet(worksheet, new_title, index),
        )
        .await
    }

    pub(crate) async fn delete_worksheet(&mut self, worksheet: &Worksheet) -> Result<()> {
        let timeout = self.timeout;
        timed(timeout, "delete worksheet", self.inner.delete_worksheet(worksheet)).await
    }

    pub(crate) async fn worksheet_index(&mut self, worksheet: &Worksheet) -> Result<usize> {
        let timeout = self.timeout;
        timed(timeout, "worksheet index", self.inner.worksheet_index(worksheet)).await
    }
}

async fn timed<T>(timeout: Duration, what: &str, call: impl Future<Output = Res<T>>) -> Result<T> {
    trace!("Store call: {what}");
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.pub_result(ErrorType::Remote),
        Err(_) => Err(Error::new(
            ErrorType::Timeout,
            anyhow::anyhow!("The '{what}' call did not complete within {timeout:?}"),
        )),
    }
}
