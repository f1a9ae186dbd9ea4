use codelist::{Query, QueryExecutionError, ResultTable, Warehouse};
use std::cell::Cell;

/// In-memory warehouse that counts how often it is asked
pub struct MockWarehouse {
    reply: Result<ResultTable, String>,
    calls: Cell<usize>,
}

impl MockWarehouse {
    pub fn returning(table: ResultTable) -> Self {
        Self {
            reply: Ok(table),
            calls: Cell::new(0),
        }
    }

    /// Every query is rejected with HTTP 400 and `message`
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Warehouse for MockWarehouse {
    fn execute(&self, _query: &Query) -> Result<ResultTable, QueryExecutionError> {
        self.calls.set(self.calls.get() + 1);
        match &self.reply {
            Ok(table) => Ok(table.clone()),
            Err(message) => Err(QueryExecutionError::Rejected {
                status: 400,
                message: message.clone(),
            }),
        }
    }
}
