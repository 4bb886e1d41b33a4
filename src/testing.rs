//! In-memory driver for exercising handlers without a query server.
//!
//! `FakeDriver` answers statements from a script and records every driver
//! call in a shared log. Clones share the same script and log, so a test
//! can hand one clone to a handler and inspect the other.
use crate::config::ConnectionParams;
use crate::core::db::driver::{ColumnDescriptor, Cursor, Driver, DriverConnection};
use crate::core::{HandlerError, Result, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A driver call observed by `FakeDriver`.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// `open` with every parameter the driver received
    Open(Vec<(&'static str, Option<String>)>),
    CursorOpen,
    Execute(String),
    Fetch,
    Commit,
    CursorClose,
    Close,
}

#[derive(Debug, Clone)]
enum Scripted {
    Rows {
        description: Vec<ColumnDescriptor>,
        rows: Vec<Vec<Value>>,
    },
    Fail(String),
}

#[derive(Debug, Default)]
struct FakeState {
    events: Vec<DriverEvent>,
    script: HashMap<String, Scripted>,
    open_error: Option<String>,
    cursor_error: Option<String>,
    fetch_error: Option<String>,
    commit_error: Option<String>,
    close_error: Option<String>,
}

/// Scripted driver that records its inputs.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    state: Rc<RefCell<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `sql` with the given columns (name, type) and rows.
    ///
    /// Statements without a scripted answer succeed with no rows.
    pub fn respond(&self, sql: &str, columns: &[(&str, &str)], rows: Vec<Vec<Value>>) {
        let description = columns
            .iter()
            .map(|(name, type_name)| ColumnDescriptor::new(*name, *type_name))
            .collect();
        self.state
            .borrow_mut()
            .script
            .insert(sql.trim().to_string(), Scripted::Rows { description, rows });
    }

    /// Makes executing `sql` fail with `message`.
    pub fn fail_on(&self, sql: &str, message: &str) {
        self.state
            .borrow_mut()
            .script
            .insert(sql.trim().to_string(), Scripted::Fail(message.to_string()));
    }

    /// Makes every subsequent `open` fail with `message`.
    pub fn fail_open(&self, message: &str) {
        self.state.borrow_mut().open_error = Some(message.to_string());
    }

    /// Makes every subsequent `cursor` fail with `message`.
    pub fn fail_cursor(&self, message: &str) {
        self.state.borrow_mut().cursor_error = Some(message.to_string());
    }

    /// Makes every subsequent `fetch_all` fail with `message`.
    pub fn fail_fetch(&self, message: &str) {
        self.state.borrow_mut().fetch_error = Some(message.to_string());
    }

    /// Makes every subsequent `commit` fail with `message`.
    pub fn fail_commit(&self, message: &str) {
        self.state.borrow_mut().commit_error = Some(message.to_string());
    }

    /// Makes every subsequent connection `close` fail with `message`.
    pub fn fail_close(&self, message: &str) {
        self.state.borrow_mut().close_error = Some(message.to_string());
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.state.borrow().events.clone()
    }

    fn count(&self, event: &DriverEvent) -> usize {
        self.state.borrow().events.iter().filter(|e| *e == event).count()
    }

    pub fn opens(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, DriverEvent::Open(_)))
            .count()
    }

    pub fn closes(&self) -> usize {
        self.count(&DriverEvent::Close)
    }

    pub fn commits(&self) -> usize {
        self.count(&DriverEvent::Commit)
    }

    pub fn cursor_closes(&self) -> usize {
        self.count(&DriverEvent::CursorClose)
    }

    /// Statement text of every `execute`, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                DriverEvent::Execute(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: DriverEvent) {
        self.state.borrow_mut().events.push(event);
    }
}

impl Driver for FakeDriver {
    type Connection = FakeConnection;

    fn open(&self, params: &ConnectionParams) -> Result<FakeConnection> {
        self.record(DriverEvent::Open(params.to_args()));
        let open_error = self.state.borrow().open_error.clone();
        if let Some(message) = open_error {
            return Err(HandlerError::Connection(message));
        }
        Ok(FakeConnection {
            driver: self.clone(),
        })
    }
}

/// Connection handed out by `FakeDriver`.
#[derive(Debug)]
pub struct FakeConnection {
    driver: FakeDriver,
}

impl DriverConnection for FakeConnection {
    type Cursor = FakeCursor;

    fn cursor(&mut self) -> Result<FakeCursor> {
        let cursor_error = self.driver.state.borrow().cursor_error.clone();
        if let Some(message) = cursor_error {
            return Err(HandlerError::Execution(message));
        }
        self.driver.record(DriverEvent::CursorOpen);
        Ok(FakeCursor {
            driver: self.driver.clone(),
            description: Vec::new(),
            pending: Vec::new(),
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.driver.record(DriverEvent::Commit);
        let commit_error = self.driver.state.borrow().commit_error.clone();
        match commit_error {
            Some(message) => Err(HandlerError::Execution(message)),
            None => Ok(()),
        }
    }

    fn close(self) -> Result<()> {
        self.driver.record(DriverEvent::Close);
        let close_error = self.driver.state.borrow().close_error.clone();
        match close_error {
            Some(message) => Err(HandlerError::Connection(message)),
            None => Ok(()),
        }
    }
}

/// Cursor handed out by `FakeConnection`.
#[derive(Debug)]
pub struct FakeCursor {
    driver: FakeDriver,
    description: Vec<ColumnDescriptor>,
    pending: Vec<Vec<Value>>,
}

impl Cursor for FakeCursor {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.driver.record(DriverEvent::Execute(sql.to_string()));
        let scripted = self.driver.state.borrow().script.get(sql.trim()).cloned();
        match scripted {
            Some(Scripted::Rows { description, rows }) => {
                self.description = description;
                self.pending = rows;
                Ok(())
            }
            Some(Scripted::Fail(message)) => Err(HandlerError::Execution(message)),
            None => {
                self.description.clear();
                self.pending.clear();
                Ok(())
            }
        }
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        self.driver.record(DriverEvent::Fetch);
        let fetch_error = self.driver.state.borrow().fetch_error.clone();
        if let Some(message) = fetch_error {
            return Err(HandlerError::Execution(message));
        }
        Ok(std::mem::take(&mut self.pending))
    }

    fn description(&self) -> &[ColumnDescriptor] {
        &self.description
    }

    fn close(&mut self) -> Result<()> {
        self.driver.record(DriverEvent::CursorClose);
        Ok(())
    }
}
